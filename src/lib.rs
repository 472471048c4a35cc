//! Full-buffer DEFLATE (RFC 1951) decompression.
//!
//! The decompressor consumes a complete compressed byte sequence and produces
//! the decompressed output in a single call; there is no streaming interface.
//! Input is read through a word-sized bit buffer, symbols are decoded with
//! flat table+subtable Huffman lookups, and output goes through a sliding
//! window that periodically evicts finalized bytes to the caller's buffer.
//!
//! # Example
//!
//! ```rust
//! // A stored block holding "HELLO".
//! let data = [
//!     0x01, 0x05, 0x00, 0xFA, 0xFF,
//!     b'H', b'E', b'L', b'L', b'O',
//! ];
//!
//! let mut decompressor = rapidflate::Decompressor::new();
//! let out = decompressor.decompress_deflate(&data, 5).unwrap();
//! assert_eq!(out, b"HELLO");
//! ```

pub mod api;
pub mod batch;
pub mod bitstream;
pub mod common;
pub mod decompress;
pub mod error;

pub use api::Decompressor;
pub use error::DecompressError;
