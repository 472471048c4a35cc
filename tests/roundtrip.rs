//! Round trips against a reference encoder across block types, offsets and
//! sizes that cross the window eviction threshold.

use flate2::write::DeflateEncoder;
use flate2::Compression;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rapidflate::decompress::Decompressor;
use std::io::Write;

fn deflate(data: &[u8], level: u32) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::new(level));
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn assert_roundtrip(data: &[u8], level: u32) {
    let compressed = deflate(data, level);
    let mut decompressor = Decompressor::new();
    let mut output = vec![0u8; data.len() + 64];
    let produced = decompressor
        .decompress(&compressed, &mut output)
        .unwrap_or_else(|e| panic!("decompress failed at level {level}: {e}"));
    assert_eq!(produced, data.len(), "length mismatch at level {level}");
    assert_eq!(&output[..produced], data, "content mismatch at level {level}");
}

#[test]
fn roundtrip_empty() {
    for level in [0, 1, 6, 9] {
        assert_roundtrip(b"", level);
    }
}

#[test]
fn roundtrip_short_strings() {
    for level in [0, 1, 6, 9] {
        assert_roundtrip(b"a", level);
        assert_roundtrip(b"Hello world! This is a test string for deflate.", level);
    }
}

#[test]
fn roundtrip_random_data() {
    let mut rng = StdRng::seed_from_u64(0x1951);
    for size in [1usize, 100, 4096, 65537, 1 << 20] {
        let data: Vec<u8> = (0..size).map(|_| rng.gen()).collect();
        for level in [0, 1, 6] {
            assert_roundtrip(&data, level);
        }
    }
}

#[test]
fn roundtrip_offset_patterns() {
    // Small repeat periods exercise every copy_match strategy: broadcast,
    // byte-wise overlap, and the word-granular paths.
    for period in 1..=19usize {
        let pattern: Vec<u8> = (b'A'..=b'Z').take(period).collect();
        let data: Vec<u8> = pattern.iter().cloned().cycle().take(10_000).collect();
        for level in [1, 6, 9] {
            assert_roundtrip(&data, level);
        }
    }
}

#[test]
fn roundtrip_stored_blocks() {
    // Level 0 emits stored blocks, including the 65535-byte maximum.
    let mut rng = StdRng::seed_from_u64(0xBEEF);
    let data: Vec<u8> = (0..200_000).map(|_| rng.gen()).collect();
    assert_roundtrip(&data, 0);
}

#[test]
fn roundtrip_text_like_data() {
    let sentence = b"the quick brown fox jumps over the lazy dog. ";
    let data: Vec<u8> = sentence.iter().cloned().cycle().take(500_000).collect();
    for level in [1, 6, 9] {
        assert_roundtrip(&data, level);
    }
}

#[test]
fn roundtrip_output_crossing_window_evictions() {
    // Several MiB of output forces repeated window evictions mid-stream;
    // long-range matches must still resolve afterwards.
    let mut rng = StdRng::seed_from_u64(0xACE);
    let chunk: Vec<u8> = (0..30_000).map(|_| rng.gen::<u8>()).collect();
    let mut data = Vec::with_capacity(6_000_000);
    while data.len() < 6_000_000 {
        data.extend_from_slice(&chunk);
    }
    for level in [1, 6] {
        assert_roundtrip(&data, level);
    }
}

#[test]
fn roundtrip_highly_compressible_giant_blocks() {
    // All-identical input makes the encoder emit blocks whose output far
    // exceeds the window, so eviction must make progress inside one block.
    let data = vec![b'a'; 8 * 1024 * 1024];
    for level in [1, 9] {
        assert_roundtrip(&data, level);
    }
}

#[test]
fn roundtrip_mixed_compressibility() {
    let mut rng = StdRng::seed_from_u64(0xD1CE);
    let mut data = Vec::new();
    for i in 0..40 {
        if i % 2 == 0 {
            data.extend(std::iter::repeat(i as u8).take(20_000));
        } else {
            data.extend((0..20_000).map(|_| rng.gen::<u8>()));
        }
    }
    for level in [1, 6] {
        assert_roundtrip(&data, level);
    }
}

#[test]
fn corrupted_streams_do_not_panic() {
    let data: Vec<u8> = (0..2_000u32).map(|i| (i * 31) as u8).collect();
    let compressed = deflate(&data, 6);
    let mut decompressor = Decompressor::new();
    let mut output = vec![0u8; data.len() + 64];
    let step = (compressed.len() / 20).max(1);

    // Flip one byte at a time; the result must be an error or a differing
    // output, never a crash.
    for pos in (0..compressed.len()).step_by(step) {
        let mut corrupted = compressed.clone();
        corrupted[pos] ^= 0x55;
        let _ = decompressor.decompress(&corrupted, &mut output);
    }

    // Truncations likewise.
    for cut in (0..compressed.len()).step_by(step) {
        let _ = decompressor.decompress(&compressed[..cut], &mut output);
    }
}
