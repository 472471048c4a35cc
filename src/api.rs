use crate::decompress::Decompressor as InternalDecompressor;
use std::io;

/// High-level decompression front end with io-flavored errors and allocation
/// guards.
pub struct Decompressor {
    inner: InternalDecompressor,
    max_memory_limit: usize,
    limit_ratio: usize,
}

impl Decompressor {
    pub fn new() -> Self {
        Self {
            inner: InternalDecompressor::new(),
            max_memory_limit: usize::MAX,
            limit_ratio: 2000,
        }
    }

    pub fn set_max_memory_limit(&mut self, limit: usize) {
        self.max_memory_limit = limit;
    }

    pub fn set_limit_ratio(&mut self, ratio: usize) {
        self.limit_ratio = ratio;
    }

    /// Decompress into a freshly allocated buffer of `expected_size` bytes,
    /// truncated to the produced size.
    pub fn decompress_deflate(&mut self, data: &[u8], expected_size: usize) -> io::Result<Vec<u8>> {
        // Security check: prevent massive allocations for small inputs (zip
        // bomb prevention). The maximum DEFLATE ratio is ~1032:1; a generous
        // 2000:1 plus overhead keeps honest callers unaffected.
        let limit = data
            .len()
            .saturating_mul(self.limit_ratio)
            .saturating_add(4096);
        if expected_size > limit {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "Expected size {} exceeds safety limit for input size {}",
                    expected_size,
                    data.len()
                ),
            ));
        }

        if expected_size > self.max_memory_limit {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "Expected size {} exceeds maximum memory limit {}",
                    expected_size, self.max_memory_limit
                ),
            ));
        }

        let mut output = Vec::new();
        output
            .try_reserve_exact(expected_size)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        output.resize(expected_size, 0);

        match self.inner.decompress(data, &mut output) {
            Ok(size) => {
                output.truncate(size);
                Ok(output)
            }
            Err(e) => Err(io::Error::new(io::ErrorKind::InvalidData, e)),
        }
    }

    /// Decompress into a caller-provided buffer, returning the produced size.
    pub fn decompress_deflate_into(&mut self, data: &[u8], output: &mut [u8]) -> io::Result<usize> {
        self.inner
            .decompress(data, output)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Decompress into a caller-provided buffer that the result must fill
    /// exactly.
    pub fn decompress_deflate_exact(&mut self, data: &[u8], output: &mut [u8]) -> io::Result<()> {
        self.inner
            .decompress_exact(data, output)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}
