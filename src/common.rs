pub const DEFLATE_BLOCKTYPE_UNCOMPRESSED: u8 = 0;
pub const DEFLATE_BLOCKTYPE_STATIC_HUFFMAN: u8 = 1;
pub const DEFLATE_BLOCKTYPE_DYNAMIC_HUFFMAN: u8 = 2;

pub const DEFLATE_MIN_MATCH_LEN: usize = 3;
pub const DEFLATE_MAX_MATCH_LEN: usize = 258;

pub const DEFLATE_MAX_MATCH_OFFSET: usize = 32768;
pub const DEFLATE_WINDOW_ORDER: usize = 15;

pub const DEFLATE_NUM_PRECODE_SYMS: usize = 19;
pub const DEFLATE_NUM_LITLEN_SYMS: usize = 288;
pub const DEFLATE_NUM_OFFSET_SYMS: usize = 32;

pub const DEFLATE_MAX_NUM_SYMS: usize = 288;

pub const DEFLATE_NUM_LITERALS: usize = 256;
pub const DEFLATE_END_OF_BLOCK: usize = 256;
pub const DEFLATE_FIRST_LEN_SYM: usize = 257;

pub const DEFLATE_MAX_PRE_CODEWORD_LEN: usize = 7;
pub const DEFLATE_MAX_LITLEN_CODEWORD_LEN: usize = 15;
pub const DEFLATE_MAX_OFFSET_CODEWORD_LEN: usize = 15;

pub const DEFLATE_MAX_CODEWORD_LEN: usize = 15;

// Worst-case overshoot of the codeword-length arrays: a repeat run of 138
// zeroes issued when only one length slot remained.
pub const DEFLATE_MAX_LENS_OVERRUN: usize = 137;

pub const DEFLATE_MAX_EXTRA_LENGTH_BITS: usize = 5;
pub const DEFLATE_MAX_EXTRA_OFFSET_BITS: usize = 13;

/// The order in which precode codeword lengths are stored in a dynamic
/// block header.
pub const DEFLATE_PRECODE_LENS_PERMUTATION: [u8; DEFLATE_NUM_PRECODE_SYMS] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];
