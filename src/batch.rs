use crate::decompress::Decompressor;
use rayon::prelude::*;

/// Decompresses many independent DEFLATE streams in parallel, one scratch
/// state per worker thread.
pub struct BatchDecompressor;

impl BatchDecompressor {
    pub fn new() -> Self {
        Self
    }

    pub fn decompress_batch(
        &self,
        inputs: &[&[u8]],
        max_out_sizes: &[usize],
    ) -> Vec<Option<Vec<u8>>> {
        inputs
            .par_iter()
            .zip(max_out_sizes.par_iter())
            .map_init(Decompressor::new, |decompressor, (&input, &max_size)| {
                let mut output = vec![0u8; max_size];
                match decompressor.decompress(input, &mut output) {
                    Ok(size) => {
                        output.truncate(size);
                        Some(output)
                    }
                    Err(_) => None,
                }
            })
            .collect()
    }
}
