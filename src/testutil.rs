//! Helpers for building raw BAM record buffers in tests.

use crate::cigar::CigarOp;
use crate::record::{pack_sequence_into, NO_QUAL};

/// Encode one raw CIGAR entry from an ASCII op character and a length,
/// e.g. `encode_op(b'M', 10)`.
///
/// # Panics
///
/// Panics on a character that is not one of `MIDNSHP=X`.
#[must_use]
pub fn encode_op(op: u8, len: u32) -> u32 {
    let op = CigarOp::from_char(char::from(op))
        .unwrap_or_else(|| panic!("not a CIGAR op character: {:?}", char::from(op)));
    (len << 4) | u32::from(op.code())
}

/// Build the raw bytes of one alignment record (no `block_size` prefix).
///
/// `cigar_ops` are raw 4-byte entries as produced by [`encode_op`]. `qual`
/// of `None` writes the no-quality sentinel fill; `Some` must match the
/// sequence length. `aux_data` is appended verbatim.
#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn make_record_bytes(
    ref_id: i32,
    pos: i32,
    mapq: u8,
    flag: u16,
    name: &[u8],
    cigar_ops: &[u32],
    seq: &[u8],
    qual: Option<&[u8]>,
    mate_ref_id: i32,
    mate_pos: i32,
    tlen: i32,
    aux_data: &[u8],
) -> Vec<u8> {
    if let Some(quals) = qual {
        assert_eq!(quals.len(), seq.len(), "quality length must match sequence length");
    }
    let mut data = Vec::with_capacity(
        32 + name.len() + 1 + cigar_ops.len() * 4 + seq.len().div_ceil(2) + seq.len()
            + aux_data.len(),
    );
    data.extend_from_slice(&ref_id.to_le_bytes());
    data.extend_from_slice(&pos.to_le_bytes());
    data.push(u8::try_from(name.len() + 1).expect("read name too long"));
    data.push(mapq);
    data.extend_from_slice(&0u16.to_le_bytes()); // bin
    data.extend_from_slice(&(cigar_ops.len() as u16).to_le_bytes());
    data.extend_from_slice(&flag.to_le_bytes());
    data.extend_from_slice(&(seq.len() as u32).to_le_bytes());
    data.extend_from_slice(&mate_ref_id.to_le_bytes());
    data.extend_from_slice(&mate_pos.to_le_bytes());
    data.extend_from_slice(&tlen.to_le_bytes());
    data.extend_from_slice(name);
    data.push(0);
    for &op in cigar_ops {
        data.extend_from_slice(&op.to_le_bytes());
    }
    pack_sequence_into(&mut data, seq);
    match qual {
        Some(quals) => data.extend_from_slice(quals),
        None => data.extend(std::iter::repeat(NO_QUAL).take(seq.len())),
    }
    data.extend_from_slice(aux_data);
    data
}

/// Build the bytes of one `B:s` (int16 array) aux tag.
#[must_use]
pub fn make_b_int16_array_tag(tag: [u8; 2], values: &[i16]) -> Vec<u8> {
    let mut data = Vec::with_capacity(8 + values.len() * 2);
    data.extend_from_slice(&tag);
    data.push(b'B');
    data.push(b's');
    data.extend_from_slice(&(values.len() as u32).to_le_bytes());
    for &value in values {
        data.extend_from_slice(&value.to_le_bytes());
    }
    data
}
