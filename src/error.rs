use thiserror::Error;

/// Status reported by a failed decompression call.
///
/// Every failing path inside the decoder returns one of these variants up a
/// single chain; no error is recovered locally.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecompressError {
    /// The compressed stream is not valid DEFLATE.
    #[error("malformed deflate stream")]
    BadData,

    /// The caller's output buffer filled up before the stream ended.
    #[error("output buffer too small for decompressed data")]
    ShortOutput,

    /// The produced size did not match the size the caller required.
    #[error("decompressed size differs from expected size")]
    InsufficientSpace,
}
