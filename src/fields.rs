//! Fixed-offset field access for raw BAM record buffers.
//!
//! A record buffer holds exactly one alignment record, *without* the 4-byte
//! little-endian `block_size` prefix that precedes it on disk (the stream
//! reader strips that). Everything here is plain byte arithmetic over the
//! fixed 32-byte header:
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0-3     4     ref_id (i32)
//! 4-7     4     pos (i32, 0-based leftmost)
//! 8       1     l_read_name (u8, name length incl. NUL)
//! 9       1     mapq (u8)
//! 10-11   2     bin (u16)
//! 12-13   2     n_cigar_op (u16)
//! 14-15   2     flag (u16)
//! 16-19   4     l_seq (u32)
//! 20-23   4     next_ref_id (i32)
//! 24-27   4     next_pos (i32)
//! 28-31   4     tlen (i32)
//! 32+     var   read_name, cigar, seq, qual, aux
//! ```
//!
//! Bytes 8-11 are the format's packed `bin_mq_nl` word and 12-15 its
//! `flag_nc` word; little-endian order makes the sub-fields individually
//! addressable. `n_cigar_op` is read at its full 16-bit width.

/// Length of the fixed record header. All primitives below assume the
/// buffer holds at least this many bytes; [`crate::record::BamRecord::new`]
/// enforces that before any of them run.
pub const FIXED_HEADER_LEN: usize = 32;

/// BAM flag bits.
pub mod flags {
    /// Read is paired in sequencing.
    pub const PAIRED: u16 = 0x1;
    /// Both segments properly aligned.
    pub const PROPER_PAIR: u16 = 0x2;
    /// Read is unmapped.
    pub const UNMAPPED: u16 = 0x4;
    /// Mate is unmapped.
    pub const MATE_UNMAPPED: u16 = 0x8;
    /// Read is reverse complemented.
    pub const REVERSE: u16 = 0x10;
    /// Mate is reverse complemented.
    pub const MATE_REVERSE: u16 = 0x20;
    /// First segment in template (R1).
    pub const FIRST_SEGMENT: u16 = 0x40;
    /// Last segment in template (R2).
    pub const LAST_SEGMENT: u16 = 0x80;
    /// Secondary alignment.
    pub const SECONDARY: u16 = 0x100;
    /// Not passing quality controls.
    pub const QC_FAIL: u16 = 0x200;
    /// PCR or optical duplicate.
    pub const DUPLICATE: u16 = 0x400;
    /// Supplementary alignment.
    pub const SUPPLEMENTARY: u16 = 0x800;
}

/// Extract reference sequence ID.
#[inline]
#[must_use]
pub fn ref_id(bam: &[u8]) -> i32 {
    i32::from_le_bytes([bam[0], bam[1], bam[2], bam[3]])
}

/// Extract the 0-based leftmost position.
#[inline]
#[must_use]
pub fn pos(bam: &[u8]) -> i32 {
    i32::from_le_bytes([bam[4], bam[5], bam[6], bam[7]])
}

/// Extract `l_read_name` (read name length including the NUL terminator).
#[inline]
#[must_use]
pub fn l_read_name(bam: &[u8]) -> u8 {
    bam[8]
}

/// Extract mapping quality.
#[inline]
#[must_use]
pub fn mapq(bam: &[u8]) -> u8 {
    bam[9]
}

/// Extract the BAM bin.
#[inline]
#[must_use]
pub fn bin(bam: &[u8]) -> u16 {
    u16::from_le_bytes([bam[10], bam[11]])
}

/// Extract the number of CIGAR operations (full 16-bit width).
#[inline]
#[must_use]
pub fn n_cigar_op(bam: &[u8]) -> u16 {
    u16::from_le_bytes([bam[12], bam[13]])
}

/// Extract the flag word.
#[inline]
#[must_use]
pub fn flag(bam: &[u8]) -> u16 {
    u16::from_le_bytes([bam[14], bam[15]])
}

/// Extract the sequence length.
#[inline]
#[must_use]
pub fn l_seq(bam: &[u8]) -> u32 {
    u32::from_le_bytes([bam[16], bam[17], bam[18], bam[19]])
}

/// Extract the mate's reference sequence ID.
#[inline]
#[must_use]
pub fn mate_ref_id(bam: &[u8]) -> i32 {
    i32::from_le_bytes([bam[20], bam[21], bam[22], bam[23]])
}

/// Extract the mate's 0-based position.
#[inline]
#[must_use]
pub fn mate_pos(bam: &[u8]) -> i32 {
    i32::from_le_bytes([bam[24], bam[25], bam[26], bam[27]])
}

/// Extract the template length.
#[inline]
#[must_use]
pub fn template_length(bam: &[u8]) -> i32 {
    i32::from_le_bytes([bam[28], bam[29], bam[30], bam[31]])
}

/// Extract the read name, without its NUL terminator.
#[inline]
#[must_use]
pub fn read_name(bam: &[u8]) -> &[u8] {
    let l = bam[8] as usize;
    if l > 1 { &bam[32..32 + l - 1] } else { &[] }
}

/// Offset of the CIGAR data within the record.
#[inline]
#[must_use]
pub fn cigar_offset(bam: &[u8]) -> usize {
    FIXED_HEADER_LEN + l_read_name(bam) as usize
}

/// Offset of the packed 4-bit sequence data within the record.
#[inline]
#[must_use]
pub fn seq_offset(bam: &[u8]) -> usize {
    cigar_offset(bam) + n_cigar_op(bam) as usize * 4
}

/// Offset of the quality data within the record.
#[inline]
#[must_use]
pub fn qual_offset(bam: &[u8]) -> usize {
    seq_offset(bam) + (l_seq(bam) as usize).div_ceil(2)
}

/// Offset of the auxiliary tag data within the record.
///
/// `aux_offset = 32 + l_read_name + n_cigar_op*4 + ceil(l_seq/2) + l_seq`
#[inline]
#[must_use]
pub fn aux_offset(bam: &[u8]) -> usize {
    qual_offset(bam) + l_seq(bam) as usize
}
