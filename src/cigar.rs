//! CIGAR model and genomic coordinate algebra.
//!
//! The functions in this module are pure: given an alignment position, a
//! CIGAR, a strand, and a read length they derive contiguous aligned blocks
//! and answer coordinate and indel queries. They never touch a record
//! buffer, which keeps them testable with synthetic inputs.
//!
//! Coordinates are whatever base the caller supplies: pass a 0-based
//! position and every reference coordinate that comes out is 0-based; pass
//! 1-based and they are 1-based. Read coordinates always count from 1 at the
//! 5' end of the original (un-reverse-complemented) read, so on the reverse
//! strand they count *down* from the read length.

use std::fmt;
use std::str::FromStr;

use crate::errors::{BamscopeError, Result};

/// A CIGAR operation kind, in BAM op-code order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CigarOp {
    /// `M`: alignment match (sequence match or mismatch)
    Match = 0,
    /// `I`: insertion to the reference
    Insertion = 1,
    /// `D`: deletion from the reference
    Deletion = 2,
    /// `N`: skipped region from the reference
    Skip = 3,
    /// `S`: soft clipping (clipped sequence present in SEQ)
    SoftClip = 4,
    /// `H`: hard clipping (clipped sequence absent from SEQ)
    HardClip = 5,
    /// `P`: padding (silent deletion from a padded reference)
    Pad = 6,
    /// `=`: sequence match
    SequenceMatch = 7,
    /// `X`: sequence mismatch
    SequenceMismatch = 8,
}

impl CigarOp {
    /// Map a 4-bit BAM op code to an operation, `None` for codes 9-15.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(CigarOp::Match),
            1 => Some(CigarOp::Insertion),
            2 => Some(CigarOp::Deletion),
            3 => Some(CigarOp::Skip),
            4 => Some(CigarOp::SoftClip),
            5 => Some(CigarOp::HardClip),
            6 => Some(CigarOp::Pad),
            7 => Some(CigarOp::SequenceMatch),
            8 => Some(CigarOp::SequenceMismatch),
            _ => None,
        }
    }

    /// The 4-bit BAM op code.
    #[inline]
    #[must_use]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// The SAM text character for this operation.
    #[must_use]
    pub fn as_char(self) -> char {
        match self {
            CigarOp::Match => 'M',
            CigarOp::Insertion => 'I',
            CigarOp::Deletion => 'D',
            CigarOp::Skip => 'N',
            CigarOp::SoftClip => 'S',
            CigarOp::HardClip => 'H',
            CigarOp::Pad => 'P',
            CigarOp::SequenceMatch => '=',
            CigarOp::SequenceMismatch => 'X',
        }
    }

    /// Map a SAM text character to an operation.
    #[must_use]
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'M' => Some(CigarOp::Match),
            'I' => Some(CigarOp::Insertion),
            'D' => Some(CigarOp::Deletion),
            'N' => Some(CigarOp::Skip),
            'S' => Some(CigarOp::SoftClip),
            'H' => Some(CigarOp::HardClip),
            'P' => Some(CigarOp::Pad),
            '=' => Some(CigarOp::SequenceMatch),
            'X' => Some(CigarOp::SequenceMismatch),
            _ => None,
        }
    }

    /// Whether this operation advances the read position (M/I/S/=/X).
    #[inline]
    #[must_use]
    pub fn consumes_read(self) -> bool {
        matches!(
            self,
            CigarOp::Match
                | CigarOp::Insertion
                | CigarOp::SoftClip
                | CigarOp::SequenceMatch
                | CigarOp::SequenceMismatch
        )
    }

    /// Whether this operation advances the reference position (M/D/N/=/X).
    #[inline]
    #[must_use]
    pub fn consumes_reference(self) -> bool {
        matches!(
            self,
            CigarOp::Match
                | CigarOp::Deletion
                | CigarOp::Skip
                | CigarOp::SequenceMatch
                | CigarOp::SequenceMismatch
        )
    }
}

/// One CIGAR element: an operation and its length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CigarElement {
    /// Operation length
    pub len: u32,
    /// Operation kind
    pub op: CigarOp,
}

impl CigarElement {
    /// Decode a raw 4-byte BAM CIGAR entry: length in the upper 28 bits,
    /// op code in the low 4. `None` for an unassigned op code.
    #[must_use]
    pub fn from_raw(raw: u32) -> Option<Self> {
        let op = CigarOp::from_code((raw & 0xF) as u8)?;
        Some(CigarElement { len: raw >> 4, op })
    }

    /// Re-encode to the raw 4-byte BAM form.
    #[inline]
    #[must_use]
    pub fn to_raw(self) -> u32 {
        (self.len << 4) | u32::from(self.op.code())
    }
}

/// An ordered sequence of CIGAR elements.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cigar(Vec<CigarElement>);

impl Cigar {
    /// Wrap a sequence of elements.
    #[must_use]
    pub fn new(elements: Vec<CigarElement>) -> Self {
        Cigar(elements)
    }

    /// The elements in order.
    #[must_use]
    pub fn elements(&self) -> &[CigarElement] {
        &self.0
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of read-consuming operation lengths (M/I/S/=/X).
    #[must_use]
    pub fn read_length(&self) -> u64 {
        self.0.iter().filter(|e| e.op.consumes_read()).map(|e| u64::from(e.len)).sum()
    }

    /// Sum of reference-consuming operation lengths (M/D/N/=/X).
    #[must_use]
    pub fn reference_length(&self) -> u64 {
        self.0.iter().filter(|e| e.op.consumes_reference()).map(|e| u64::from(e.len)).sum()
    }
}

impl fmt::Display for Cigar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "*");
        }
        for element in &self.0 {
            write!(f, "{}{}", element.len, element.op.as_char())?;
        }
        Ok(())
    }
}

impl FromStr for Cigar {
    type Err = BamscopeError;

    /// Parse a SAM text CIGAR such as `"8M2I4M1D3M"`. `"*"` parses as empty.
    fn from_str(s: &str) -> Result<Self> {
        if s == "*" {
            return Ok(Cigar::default());
        }
        let mut elements = Vec::new();
        let mut len: u32 = 0;
        let mut have_digits = false;
        for c in s.chars() {
            if let Some(d) = c.to_digit(10) {
                len = len
                    .checked_mul(10)
                    .and_then(|l| l.checked_add(d))
                    .ok_or_else(|| bad_cigar(s, "operation length overflows"))?;
                have_digits = true;
            } else {
                let op = CigarOp::from_char(c)
                    .ok_or_else(|| bad_cigar(s, format!("unknown operation '{c}'")))?;
                if !have_digits {
                    return Err(bad_cigar(s, "operation without a length"));
                }
                elements.push(CigarElement { len, op });
                len = 0;
                have_digits = false;
            }
        }
        if have_digits {
            return Err(bad_cigar(s, "trailing length without an operation"));
        }
        Ok(Cigar(elements))
    }
}

fn bad_cigar(text: &str, reason: impl fmt::Display) -> BamscopeError {
    BamscopeError::MalformedRecord {
        block_size: 0,
        reason: format!("invalid CIGAR string '{text}': {reason}"),
    }
}

/// A maximal run of consecutive alignment without insertion or deletion,
/// mapped between read and reference coordinates.
///
/// Intervals are half-open in the caller's coordinate base. For a
/// reverse-strand block `read_start > read_end` (read coordinates count
/// down) and the interval sense flips accordingly. The invariant
/// `offset = ref_start - direction * read_start` holds throughout the block,
/// so `ref = offset + direction * read` for every covered read coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContiguousBlock {
    /// Block start in read coordinates
    pub read_start: i64,
    /// Block end in read coordinates
    pub read_end: i64,
    /// Block start in reference coordinates
    pub ref_start: i64,
    /// Block end in reference coordinates
    pub ref_end: i64,
    /// Read-to-reference translation constant for this block
    pub offset: i64,
    /// +1 for the forward strand, -1 for reverse
    pub direction: i64,
}

/// An insertion or deletion in VCF-style anchoring: `pos` is the reference
/// base immediately preceding the event, `len` the number of inserted read
/// bases or deleted reference bases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Indel {
    /// Reference position of the base preceding the event
    pub pos: i64,
    /// Event length, excluding the anchoring base
    pub len: i64,
}

impl From<(i64, i64)> for Indel {
    fn from((pos, len): (i64, i64)) -> Self {
        Indel { pos, len }
    }
}

/// Derive the contiguous aligned blocks for one alignment.
///
/// `ref_pos` is the alignment position in the caller's coordinate base.
/// `read_len` is only consulted on the reverse strand, where read
/// coordinates start at the read length and count down to 1.
///
/// M/=/X advance both positions; I/S close the current block (if non-empty)
/// and advance only the read; D/N close the current block and advance only
/// the reference; H/P are no-ops.
#[must_use]
pub fn contiguous_blocks(
    ref_pos: i64,
    cigar: &Cigar,
    reverse: bool,
    read_len: i64,
) -> Vec<ContiguousBlock> {
    let direction: i64 = if reverse { -1 } else { 1 };
    let mut read_pos = if reverse { read_len } else { 1 };
    let mut ref_pos = ref_pos;
    let mut read_pos_start = read_pos;
    let mut ref_pos_start = ref_pos;
    let mut blocks = Vec::new();

    for element in cigar.elements() {
        let n = i64::from(element.len);
        match element.op {
            CigarOp::Match | CigarOp::SequenceMatch | CigarOp::SequenceMismatch => {
                ref_pos += n;
                read_pos += n * direction;
            }
            CigarOp::Insertion | CigarOp::SoftClip => {
                let offset = ref_pos - direction * read_pos;
                if read_pos_start != read_pos {
                    blocks.push(ContiguousBlock {
                        read_start: read_pos_start,
                        read_end: read_pos,
                        ref_start: ref_pos_start,
                        ref_end: ref_pos,
                        offset,
                        direction,
                    });
                }
                read_pos += n * direction;
                read_pos_start = read_pos;
                ref_pos_start = ref_pos;
            }
            CigarOp::Deletion | CigarOp::Skip => {
                let offset = ref_pos - direction * read_pos;
                blocks.push(ContiguousBlock {
                    read_start: read_pos_start,
                    read_end: read_pos,
                    ref_start: ref_pos_start,
                    ref_end: ref_pos,
                    offset,
                    direction,
                });
                ref_pos += n;
                read_pos_start = read_pos;
                ref_pos_start = ref_pos;
            }
            CigarOp::HardClip | CigarOp::Pad => {}
        }
    }

    let offset = ref_pos - direction * read_pos;
    if read_pos_start != read_pos {
        blocks.push(ContiguousBlock {
            read_start: read_pos_start,
            read_end: read_pos,
            ref_start: ref_pos_start,
            ref_end: ref_pos,
            offset,
            direction,
        });
    }
    blocks
}

/// Translate a read coordinate to a reference coordinate.
///
/// Returns `None` for read positions no block covers: bases inside
/// insertions and clipped bases have no reference mapping.
#[must_use]
pub fn to_ref_coord(blocks: &[ContiguousBlock], read_coord: i64) -> Option<i64> {
    for block in blocks {
        let hit = if block.direction == 1 {
            block.read_start <= read_coord && read_coord < block.read_end
        } else {
            block.read_end < read_coord && read_coord <= block.read_start
        };
        if hit {
            return Some(block.direction * read_coord + block.offset);
        }
    }
    None
}

/// Extract all indels from a block list, VCF-style anchored.
///
/// Consecutive blocks that abut in read coordinates are separated by a
/// deletion; blocks that abut in reference coordinates are separated by an
/// insertion. Reverse-strand blocks are scanned in reverse with interval
/// endpoint roles swapped, since those blocks store (larger, smaller)
/// endpoint pairs. Leading and trailing I/D operations do not appear (they
/// have no flanking block on one side); N counts as a deletion.
///
/// Returns `(insertions, deletions)`.
#[must_use]
pub fn indels(blocks: &[ContiguousBlock], reverse: bool) -> (Vec<Indel>, Vec<Indel>) {
    let mut insertions = Vec::new();
    let mut deletions = Vec::new();
    let mut last_read_end: Option<i64> = None;
    let mut last_ref_end: Option<i64> = None;

    if reverse {
        for block in blocks.iter().rev() {
            // Reverse blocks store (larger, smaller) endpoints: swap roles.
            let (read_end, read_start) = (block.read_start, block.read_end);
            let (ref_end, ref_start) = (block.ref_start, block.ref_end);
            if let (Some(last_read), Some(last_ref)) = (last_read_end, last_ref_end) {
                if read_start == last_read {
                    let del_len = last_ref - ref_start;
                    deletions.push(Indel { pos: last_ref - del_len - 1, len: del_len });
                } else {
                    insertions.push(Indel { pos: last_ref - 1, len: read_start - last_read });
                }
            }
            last_read_end = Some(read_end);
            last_ref_end = Some(ref_end);
        }
    } else {
        for block in blocks {
            if let (Some(last_read), Some(last_ref)) = (last_read_end, last_ref_end) {
                if block.read_start == last_read {
                    deletions.push(Indel { pos: last_ref - 1, len: block.ref_start - last_ref });
                } else {
                    insertions.push(Indel { pos: last_ref - 1, len: block.read_start - last_read });
                }
            }
            last_read_end = Some(block.read_end);
            last_ref_end = Some(block.ref_end);
        }
    }
    (insertions, deletions)
}

/// Does the alignment contain an indel at the given reference position?
///
/// True if `check_insertions` and `position` is exactly an insertion anchor
/// (the base before the inserted sequence), or if `check_deletions` and
/// `position` falls inside a deletion span.
#[must_use]
pub fn indel_at(
    position: i64,
    insertions: &[Indel],
    deletions: &[Indel],
    check_insertions: bool,
    check_deletions: bool,
) -> bool {
    if check_insertions && insertions.iter().any(|ins| ins.pos == position) {
        return true;
    }
    if check_deletions
        && deletions.iter().any(|del| del.pos < position && position < del.pos + del.len + 1)
    {
        return true;
    }
    false
}

/// The right-most aligned reference coordinate across all blocks, regardless
/// of strand. Clipped bases do not count. `None` if nothing aligned.
#[must_use]
pub fn end_position(blocks: &[ContiguousBlock]) -> Option<i64> {
    blocks.iter().map(|b| b.ref_start.max(b.ref_end)).max()
}
