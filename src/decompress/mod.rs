//! DEFLATE block parsing and the symbol decode loop.

mod tables;
mod window;

use std::sync::OnceLock;

use self::tables::*;
use self::window::{OutputWindow, OUTPUT_WINDOW_ORDER};
use crate::bitstream::{BitStream, MAX_ENSURE};
use crate::common::*;
use crate::error::DecompressError;

pub use self::tables::{
    LITLEN_ENOUGH, LITLEN_TABLEBITS, OFFSET_ENOUGH, OFFSET_TABLEBITS, PRECODE_ENOUGH,
    PRECODE_TABLEBITS,
};

/// Decompressor scratch state.
///
/// Holds the arrays that are too large to keep on the stack: the expanded
/// codeword lengths and the three decode tables. Everything is rewritten on
/// each call, so a value can be reused freely across calls; it must not be
/// shared between threads.
pub struct Decompressor {
    precode_lens: [u8; DEFLATE_NUM_PRECODE_SYMS],
    lens: [u8; DEFLATE_NUM_LITLEN_SYMS + DEFLATE_NUM_OFFSET_SYMS + DEFLATE_MAX_LENS_OVERRUN],

    precode_decode_table: [u32; PRECODE_ENOUGH],
    litlen_decode_table: [u32; LITLEN_ENOUGH],
    offset_decode_table: [u32; OFFSET_ENOUGH],

    working_space: [u16; 2 * (DEFLATE_MAX_CODEWORD_LEN + 1) + DEFLATE_MAX_NUM_SYMS],

    static_codes_loaded: bool,
    offset_code_is_empty: bool,
}

struct StaticHuffmanData {
    litlen_decode_table: [u32; LITLEN_ENOUGH],
    offset_decode_table: [u32; OFFSET_ENOUGH],
}

static STATIC_HUFFMAN_DATA: OnceLock<StaticHuffmanData> = OnceLock::new();

impl Decompressor {
    pub fn new() -> Self {
        Self {
            precode_lens: [0; DEFLATE_NUM_PRECODE_SYMS],
            lens: [0; DEFLATE_NUM_LITLEN_SYMS + DEFLATE_NUM_OFFSET_SYMS + DEFLATE_MAX_LENS_OVERRUN],
            precode_decode_table: [0; PRECODE_ENOUGH],
            litlen_decode_table: [0; LITLEN_ENOUGH],
            offset_decode_table: [0; OFFSET_ENOUGH],
            working_space: [0; 2 * (DEFLATE_MAX_CODEWORD_LEN + 1) + DEFLATE_MAX_NUM_SYMS],
            static_codes_loaded: false,
            offset_code_is_empty: false,
        }
    }

    /// Decompress the complete DEFLATE stream in `input` into `output`.
    ///
    /// Returns the number of bytes produced. `output` must be large enough
    /// for the whole decompressed result; if it fills up early the call fails
    /// with [`DecompressError::ShortOutput`].
    pub fn decompress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, DecompressError> {
        let mut in_stream = BitStream::new(input);
        let mut out = OutputWindow::new(OUTPUT_WINDOW_ORDER, output);

        loop {
            let is_final_block = self.decompress_block(&mut in_stream, &mut out)?;
            if in_stream.overread() {
                return Err(DecompressError::BadData);
            }
            if is_final_block {
                break;
            }
        }
        out.full_flush()
    }

    /// Like [`Self::decompress`], but the produced size must fill `output`
    /// exactly.
    pub fn decompress_exact(
        &mut self,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<(), DecompressError> {
        let expected = output.len();
        match self.decompress(input, output) {
            Ok(n) if n == expected => Ok(()),
            Ok(_) => Err(DecompressError::InsufficientSpace),
            Err(e) => Err(e),
        }
    }

    /// Decode one block. Returns the BFINAL flag.
    fn decompress_block(
        &mut self,
        in_stream: &mut BitStream,
        out: &mut OutputWindow,
    ) -> Result<bool, DecompressError> {
        // BFINAL, BTYPE, and (for dynamic blocks) the three symbol counts.
        in_stream.ensure::<17>();
        let is_final_block = in_stream.pop_bits(1) != 0;

        match in_stream.pop_bits(2) as u8 {
            DEFLATE_BLOCKTYPE_UNCOMPRESSED => {
                decompress_uncompressed_block(in_stream, out)?;
                out.notify_end_block();
                return Ok(is_final_block);
            }
            DEFLATE_BLOCKTYPE_STATIC_HUFFMAN => self.load_static_huffman_codes(),
            DEFLATE_BLOCKTYPE_DYNAMIC_HUFFMAN => self.read_dynamic_huffman_header(in_stream)?,
            _ => return Err(DecompressError::BadData),
        }

        self.decompress_huffman_block(in_stream, out)?;
        Ok(is_final_block)
    }

    /// Load the fixed litlen and offset codes of RFC 1951 section 3.2.6.
    /// The tables are built once per process and then copied.
    fn load_static_huffman_codes(&mut self) {
        self.offset_code_is_empty = false;
        if self.static_codes_loaded {
            return;
        }

        let data = STATIC_HUFFMAN_DATA.get_or_init(|| {
            let mut d = Decompressor::new();
            d.lens[..144].fill(8);
            d.lens[144..256].fill(9);
            d.lens[256..280].fill(7);
            d.lens[280..288].fill(8);
            d.lens[288..288 + DEFLATE_NUM_OFFSET_SYMS].fill(5);

            let offset_ok =
                d.build_offset_decode_table(DEFLATE_NUM_LITLEN_SYMS, DEFLATE_NUM_OFFSET_SYMS);
            let litlen_ok = d.build_litlen_decode_table(DEFLATE_NUM_LITLEN_SYMS);
            debug_assert!(offset_ok && litlen_ok);

            StaticHuffmanData {
                litlen_decode_table: d.litlen_decode_table,
                offset_decode_table: d.offset_decode_table,
            }
        });

        self.litlen_decode_table = data.litlen_decode_table;
        self.offset_decode_table = data.offset_decode_table;
        self.static_codes_loaded = true;
    }

    /// Parse a dynamic block header: read the precode, then use it to expand
    /// the litlen and offset codeword lengths and build both decode tables.
    fn read_dynamic_huffman_header(
        &mut self,
        in_stream: &mut BitStream,
    ) -> Result<(), DecompressError> {
        // The three counts were covered by the block-header ensure.
        let num_litlen_syms = in_stream.pop_bits(5) as usize + 257;
        let num_offset_syms = in_stream.pop_bits(5) as usize + 1;
        let num_explicit_precode_lens = in_stream.pop_bits(4) as usize + 4;

        in_stream.ensure::<{ (DEFLATE_NUM_PRECODE_SYMS * 3) as u32 }>();
        for i in 0..num_explicit_precode_lens {
            self.precode_lens[DEFLATE_PRECODE_LENS_PERMUTATION[i] as usize] =
                in_stream.pop_bits(3) as u8;
        }
        for i in num_explicit_precode_lens..DEFLATE_NUM_PRECODE_SYMS {
            self.precode_lens[DEFLATE_PRECODE_LENS_PERMUTATION[i] as usize] = 0;
        }

        if !self.build_precode_decode_table() {
            return Err(DecompressError::BadData);
        }

        // Expand the run-length-coded codeword lengths.
        let total_syms = num_litlen_syms + num_offset_syms;
        let mut i = 0;
        while i < total_syms {
            in_stream.ensure::<{ (DEFLATE_MAX_PRE_CODEWORD_LEN + 7) as u32 }>();
            // The precode table never has subtables: PRECODE_TABLEBITS equals
            // the maximum precode codeword length.
            let entry = self.precode_decode_table
                [in_stream.peek(DEFLATE_MAX_PRE_CODEWORD_LEN as u32) as usize];
            in_stream.drop_bits(entry & HUFFDEC_LENGTH_MASK);
            let presym = (entry >> HUFFDEC_RESULT_SHIFT) as usize;

            if presym < 16 {
                // Explicit codeword length.
                self.lens[i] = presym as u8;
                i += 1;
                continue;
            }

            // Repeat runs. `lens` has enough slack past `total_syms` that
            // writing the maximum repeat count is always in bounds, so the
            // small runs write a fixed number of entries branch-free.
            match presym {
                16 => {
                    if i == 0 {
                        return Err(DecompressError::BadData);
                    }
                    let rep_val = self.lens[i - 1];
                    let rep_count = 3 + in_stream.pop_bits(2) as usize;
                    self.lens[i..i + 6].fill(rep_val);
                    i += rep_count;
                }
                17 => {
                    let rep_count = 3 + in_stream.pop_bits(3) as usize;
                    self.lens[i..i + 10].fill(0);
                    i += rep_count;
                }
                _ => {
                    let rep_count = 11 + in_stream.pop_bits(7) as usize;
                    self.lens[i..i + rep_count].fill(0);
                    i += rep_count;
                }
            }
        }
        if i != total_syms {
            // A repeat run overflowed the declared symbol counts.
            return Err(DecompressError::BadData);
        }

        if !self.build_offset_decode_table(num_litlen_syms, num_offset_syms) {
            return Err(DecompressError::BadData);
        }
        if !self.build_litlen_decode_table(num_litlen_syms) {
            return Err(DecompressError::BadData);
        }
        self.offset_code_is_empty = self.lens[num_litlen_syms..num_litlen_syms + num_offset_syms]
            .iter()
            .all(|&len| len == 0);
        self.static_codes_loaded = false;
        Ok(())
    }

    /// The main decode loop for static and dynamic Huffman blocks.
    fn decompress_huffman_block(
        &self,
        in_stream: &mut BitStream,
        out: &mut OutputWindow,
    ) -> Result<(), DecompressError> {
        loop {
            // Decode a litlen symbol.
            in_stream.ensure::<{ DEFLATE_MAX_LITLEN_CODEWORD_LEN as u32 }>();
            let mut entry =
                self.litlen_decode_table[in_stream.peek(LITLEN_TABLEBITS as u32) as usize];
            if entry & HUFFDEC_SUBTABLE_POINTER != 0 {
                in_stream.drop_bits(LITLEN_TABLEBITS as u32);
                entry = self.litlen_decode_table[(((entry >> HUFFDEC_RESULT_SHIFT) & 0xFFFF)
                    as usize)
                    + in_stream.peek(entry & HUFFDEC_LENGTH_MASK) as usize];
            }
            in_stream.drop_bits(entry & HUFFDEC_LENGTH_MASK);

            if entry & HUFFDEC_LITERAL != 0 {
                if out.available() == 0 {
                    out.flush()?;
                    if out.available() == 0 {
                        return Err(DecompressError::BadData);
                    }
                }
                out.push((entry >> HUFFDEC_RESULT_SHIFT) as u8);
                continue;
            }

            // Match or end-of-block. One worst-case ensure covers the length
            // extra bits plus the whole offset decode below.
            let entry = entry >> HUFFDEC_RESULT_SHIFT;
            in_stream.ensure::<MAX_ENSURE>();
            let length = ((entry >> HUFFDEC_LENGTH_BASE_SHIFT) as usize)
                + in_stream.pop_bits(entry & HUFFDEC_EXTRA_LENGTH_BITS_MASK) as usize;

            // End-of-block decodes to length 0; the unsigned wrap to
            // usize::MAX folds its test into the output bounds check.
            if length.wrapping_sub(1) >= out.available() {
                if length == HUFFDEC_END_OF_BLOCK_LENGTH as usize {
                    out.notify_end_block();
                    return Ok(());
                }
                out.flush()?;
                if length > out.available() {
                    return Err(DecompressError::BadData);
                }
            }

            // Decode the match offset.
            if self.offset_code_is_empty {
                return Err(DecompressError::BadData);
            }
            let mut entry =
                self.offset_decode_table[in_stream.peek(OFFSET_TABLEBITS as u32) as usize];
            if entry & HUFFDEC_SUBTABLE_POINTER != 0 {
                in_stream.drop_bits(OFFSET_TABLEBITS as u32);
                entry = self.offset_decode_table[(((entry >> HUFFDEC_RESULT_SHIFT) & 0xFFFF)
                    as usize)
                    + in_stream.peek(entry & HUFFDEC_LENGTH_MASK) as usize];
            }
            in_stream.drop_bits(entry & HUFFDEC_LENGTH_MASK);
            let entry = entry >> HUFFDEC_RESULT_SHIFT;
            let offset = ((entry & HUFFDEC_OFFSET_BASE_MASK) as usize)
                + in_stream.pop_bits(entry >> HUFFDEC_EXTRA_OFFSET_BITS_SHIFT) as usize;

            // The match source must not start before the retained window.
            if offset > out.size() {
                return Err(DecompressError::BadData);
            }
            out.copy_match(length, offset);
        }
    }

    fn build_precode_decode_table(&mut self) -> bool {
        build_decode_table(
            &mut self.precode_decode_table,
            &self.precode_lens,
            &PRECODE_DECODE_RESULTS,
            PRECODE_TABLEBITS,
            DEFLATE_MAX_PRE_CODEWORD_LEN,
            &mut self.working_space,
        )
    }

    fn build_litlen_decode_table(&mut self, num_litlen_syms: usize) -> bool {
        build_decode_table(
            &mut self.litlen_decode_table,
            &self.lens[..num_litlen_syms],
            &LITLEN_DECODE_RESULTS,
            LITLEN_TABLEBITS,
            DEFLATE_MAX_LITLEN_CODEWORD_LEN,
            &mut self.working_space,
        )
    }

    fn build_offset_decode_table(
        &mut self,
        num_litlen_syms: usize,
        num_offset_syms: usize,
    ) -> bool {
        build_decode_table(
            &mut self.offset_decode_table,
            &self.lens[num_litlen_syms..num_litlen_syms + num_offset_syms],
            &OFFSET_DECODE_RESULTS,
            OFFSET_TABLEBITS,
            DEFLATE_MAX_OFFSET_CODEWORD_LEN,
            &mut self.working_space,
        )
    }
}

/// Stored block: re-align to a byte boundary, validate the LEN/NLEN header,
/// and copy the payload through the window.
fn decompress_uncompressed_block(
    in_stream: &mut BitStream,
    out: &mut OutputWindow,
) -> Result<(), DecompressError> {
    in_stream.align_to_byte();

    if in_stream.remaining() < 4 {
        return Err(DecompressError::BadData);
    }
    let len = in_stream.pop_u16() as usize;
    let nlen = in_stream.pop_u16() as usize;
    if len != (!nlen & 0xFFFF) {
        return Err(DecompressError::BadData);
    }
    if len > in_stream.remaining() {
        return Err(DecompressError::BadData);
    }
    if len > out.available() {
        out.flush()?;
        if len > out.available() {
            return Err(DecompressError::BadData);
        }
    }
    out.copy_from_input(in_stream, len);
    Ok(())
}
