//! One alignment record, decoded lazily from its raw bytes.
//!
//! A [`BamRecord`] owns the byte buffer for exactly one record (no
//! `block_size` prefix; the stream reader strips that) and materializes
//! fields on demand. Construction validates every stage boundary against
//! the declared block size, so the variable-length accessors never walk
//! past the buffer; each decode stage runs once and is memoized in a
//! `OnceCell`.
//!
//! The memoization makes a record `!Sync`: decode distinct records per
//! thread, or force materialization before sharing.

use std::cell::OnceCell;

use bstr::{BStr, ByteSlice};

use crate::cigar::{self, Cigar, CigarElement, ContiguousBlock, Indel};
use crate::errors::{BamscopeError, Result};
use crate::fields::{self, flags, FIXED_HEADER_LEN};
use crate::tags::{decode_tags, encode_tags, AuxTag, TagValue};

/// Sentinel quality byte: a record whose first quality byte is `0xFF`
/// carries no quality sequence at all.
pub const NO_QUAL: u8 = 0xFF;

/// Rendered in place of the mate's reference name when it matches the
/// record's own reference.
pub const SAME_AS_PRIMARY: &str = "=";

/// 4-bit BAM base code -> ASCII base (high nibble is the earlier base).
pub const BASE_DECODE: [u8; 16] = *b"=ACMGRSVTWYHKDBN";

/// ASCII base -> 4-bit BAM code; unknown characters encode as N (0xF).
pub(crate) const SEQ_CODES: [u8; 256] = build_seq_codes();

const fn build_seq_codes() -> [u8; 256] {
    let mut codes = [0x0F_u8; 256];
    let mut i: u8 = 0;
    while (i as usize) < BASE_DECODE.len() {
        let base = BASE_DECODE[i as usize];
        codes[base as usize] = i;
        codes[base.to_ascii_lowercase() as usize] = i;
        i += 1;
    }
    codes
}

/// Pack ASCII bases two-per-byte into BAM 4-bit form, appending to `dst`.
/// An odd final base leaves the bottom nibble zero.
pub(crate) fn pack_sequence_into(dst: &mut Vec<u8>, bases: &[u8]) {
    let mut pairs = bases.chunks_exact(2);
    for pair in pairs.by_ref() {
        dst.push((SEQ_CODES[pair[0] as usize] << 4) | SEQ_CODES[pair[1] as usize]);
    }
    if let Some(&last) = pairs.remainder().first() {
        dst.push(SEQ_CODES[last as usize] << 4);
    }
}

/// Which coordinate base reference positions are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordBase {
    /// 0-based, as stored in the record
    ZeroBased,
    /// 1-based, as rendered in SAM text
    OneBased,
}

impl CoordBase {
    /// Amount added to a stored 0-based position.
    #[inline]
    #[must_use]
    pub fn offset(self) -> i64 {
        match self {
            CoordBase::ZeroBased => 0,
            CoordBase::OneBased => 1,
        }
    }

    fn index(self) -> usize {
        match self {
            CoordBase::ZeroBased => 0,
            CoordBase::OneBased => 1,
        }
    }
}

/// Resolves reference ids to names. The id->name table is owned by the
/// stream reader (it comes from the container header), so the record only
/// sees this seam.
pub trait ReferenceLookup {
    /// The name for a reference id, `None` for unmapped (`-1`) or unknown ids.
    fn name_by_id(&self, ref_id: i32) -> Option<&str>;
}

impl<S: AsRef<str>> ReferenceLookup for [S] {
    fn name_by_id(&self, ref_id: i32) -> Option<&str> {
        usize::try_from(ref_id).ok().and_then(|i| self.get(i)).map(AsRef::as_ref)
    }
}

impl<S: AsRef<str>> ReferenceLookup for Vec<S> {
    fn name_by_id(&self, ref_id: i32) -> Option<&str> {
        self.as_slice().name_by_id(ref_id)
    }
}

/// The insertions and deletions of one alignment, VCF-style anchored.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndelSet {
    /// Insertion anchors and inserted read-base counts
    pub insertions: Vec<Indel>,
    /// Deletion anchors and removed reference-base counts
    pub deletions: Vec<Indel>,
}

/// One decoded alignment record over an immutable raw buffer.
#[derive(Debug)]
pub struct BamRecord {
    data: Vec<u8>,
    cigar: OnceCell<Cigar>,
    seq: OnceCell<String>,
    qual: OnceCell<Option<Vec<u8>>>,
    aux: OnceCell<Vec<AuxTag>>,
    blocks: [OnceCell<Vec<ContiguousBlock>>; 2],
    indels: [OnceCell<IndelSet>; 2],
    end_position: OnceCell<Option<i64>>,
}

/// Memoized fallible initialization over a `OnceCell`.
fn try_cached<'a, T>(cell: &'a OnceCell<T>, init: impl FnOnce() -> Result<T>) -> Result<&'a T> {
    if let Some(value) = cell.get() {
        return Ok(value);
    }
    let value = init()?;
    Ok(cell.get_or_init(|| value))
}

impl BamRecord {
    /// Take ownership of one record's bytes.
    ///
    /// Validates the fixed header and every variable-stage boundary (read
    /// name, CIGAR, packed sequence, quality) against the buffer length,
    /// failing with [`BamscopeError::MalformedRecord`] on any shortfall.
    /// Aux data occupies whatever remains; its internal consistency is
    /// checked when first decoded.
    pub fn new(data: Vec<u8>) -> Result<Self> {
        let block_size = data.len();
        if block_size < FIXED_HEADER_LEN {
            return Err(BamscopeError::malformed(
                block_size,
                format!("buffer shorter than the fixed {FIXED_HEADER_LEN}-byte header"),
            ));
        }
        // Stage boundaries in u64 so a hostile l_seq cannot wrap on 32-bit.
        let name_end = FIXED_HEADER_LEN as u64 + u64::from(fields::l_read_name(&data));
        let cigar_end = name_end + u64::from(fields::n_cigar_op(&data)) * 4;
        let l_seq = u64::from(fields::l_seq(&data));
        let seq_end = cigar_end + l_seq.div_ceil(2);
        let qual_end = seq_end + l_seq;
        for (end, what) in [
            (name_end, "read name"),
            (cigar_end, "CIGAR"),
            (seq_end, "sequence"),
            (qual_end, "quality"),
        ] {
            if end > block_size as u64 {
                return Err(BamscopeError::malformed(
                    block_size,
                    format!("{what} overruns the declared block size"),
                ));
            }
        }
        Ok(BamRecord {
            data,
            cigar: OnceCell::new(),
            seq: OnceCell::new(),
            qual: OnceCell::new(),
            aux: OnceCell::new(),
            blocks: [OnceCell::new(), OnceCell::new()],
            indels: [OnceCell::new(), OnceCell::new()],
            end_position: OnceCell::new(),
        })
    }

    /// The raw record bytes.
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.data
    }

    /// Total record size in bytes (the declared block size).
    #[must_use]
    pub fn block_size(&self) -> usize {
        self.data.len()
    }

    // ------------------------------------------------------------------
    // Fixed header fields
    // ------------------------------------------------------------------

    /// Reference sequence id, `-1` for unmapped.
    #[must_use]
    pub fn ref_id(&self) -> i32 {
        fields::ref_id(&self.data)
    }

    /// Alignment position in the requested coordinate base.
    #[must_use]
    pub fn position(&self, base: CoordBase) -> i64 {
        i64::from(fields::pos(&self.data)) + base.offset()
    }

    /// Mapping quality.
    #[must_use]
    pub fn mapq(&self) -> u8 {
        fields::mapq(&self.data)
    }

    /// BAM bin.
    #[must_use]
    pub fn bin(&self) -> u16 {
        fields::bin(&self.data)
    }

    /// The 16-bit flag word.
    #[must_use]
    pub fn flag(&self) -> u16 {
        fields::flag(&self.data)
    }

    /// Declared sequence length.
    #[must_use]
    pub fn seq_len(&self) -> usize {
        fields::l_seq(&self.data) as usize
    }

    /// Mate's reference sequence id.
    #[must_use]
    pub fn mate_ref_id(&self) -> i32 {
        fields::mate_ref_id(&self.data)
    }

    /// Mate's alignment position in the requested coordinate base.
    #[must_use]
    pub fn mate_position(&self, base: CoordBase) -> i64 {
        i64::from(fields::mate_pos(&self.data)) + base.offset()
    }

    /// Template length.
    #[must_use]
    pub fn template_length(&self) -> i32 {
        fields::template_length(&self.data)
    }

    /// Whether the read aligned to the reverse strand.
    #[must_use]
    pub fn is_reverse(&self) -> bool {
        self.flag() & flags::REVERSE != 0
    }

    /// Whether the read is unmapped.
    #[must_use]
    pub fn is_unmapped(&self) -> bool {
        self.flag() & flags::UNMAPPED != 0
    }

    /// Whether the read was paired in sequencing.
    #[must_use]
    pub fn is_paired(&self) -> bool {
        self.flag() & flags::PAIRED != 0
    }

    // ------------------------------------------------------------------
    // Staged variable-length fields
    // ------------------------------------------------------------------

    /// The read name, NUL terminator trimmed.
    #[must_use]
    pub fn read_name(&self) -> &BStr {
        fields::read_name(&self.data).as_bstr()
    }

    /// The CIGAR, decoded once from its raw 4-byte entries.
    ///
    /// Fails with [`BamscopeError::MalformedRecord`] on an unassigned 4-bit
    /// op code (9-15).
    pub fn cigar(&self) -> Result<&Cigar> {
        try_cached(&self.cigar, || {
            let start = fields::cigar_offset(&self.data);
            let end = fields::seq_offset(&self.data);
            let mut elements = Vec::with_capacity(fields::n_cigar_op(&self.data) as usize);
            for chunk in self.data[start..end].chunks_exact(4) {
                let raw = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                let element = CigarElement::from_raw(raw).ok_or_else(|| {
                    BamscopeError::malformed(
                        self.data.len(),
                        format!("unassigned CIGAR op code {}", raw & 0xF),
                    )
                })?;
                elements.push(element);
            }
            Ok(Cigar::new(elements))
        })
    }

    /// The read bases, unpacked once from 4-bit nibbles.
    #[must_use]
    pub fn seq(&self) -> &str {
        self.seq.get_or_init(|| {
            let l_seq = self.seq_len();
            let off = fields::seq_offset(&self.data);
            let mut bases = String::with_capacity(l_seq);
            for i in 0..l_seq {
                let byte = self.data[off + i / 2];
                let code = if i % 2 == 0 { byte >> 4 } else { byte & 0x0F };
                bases.push(char::from(BASE_DECODE[code as usize]));
            }
            bases
        })
    }

    /// The quality scores, or `None` when the record carries the no-quality
    /// sentinel (first byte [`NO_QUAL`]).
    #[must_use]
    pub fn qual(&self) -> Option<&[u8]> {
        self.qual
            .get_or_init(|| {
                let off = fields::qual_offset(&self.data);
                let quals = &self.data[off..off + self.seq_len()];
                if quals.first() == Some(&NO_QUAL) { None } else { Some(quals.to_vec()) }
            })
            .as_deref()
    }

    /// The auxiliary tags, decoded once in record order.
    ///
    /// Fails with [`BamscopeError::MalformedRecord`] when a value overruns
    /// the declared block size and [`BamscopeError::UnsupportedTagType`] on
    /// an unrecognized type code.
    pub fn aux(&self) -> Result<&[AuxTag]> {
        try_cached(&self.aux, || {
            let off = fields::aux_offset(&self.data);
            decode_tags(&self.data[off..], self.data.len())
        })
        .map(Vec::as_slice)
    }

    /// The value of the first aux tag with the given id.
    pub fn tag(&self, tag: [u8; 2]) -> Result<Option<&TagValue>> {
        Ok(self.aux()?.iter().find(|t| t.tag == tag).map(|t| &t.value))
    }

    /// The record's read group (`RG` tag), if present as a string tag.
    pub fn read_group(&self) -> Result<Option<&BStr>> {
        Ok(self.tag(*b"RG")?.and_then(TagValue::as_str_bytes).map(ByteSlice::as_bstr))
    }

    // ------------------------------------------------------------------
    // Coordinate queries
    // ------------------------------------------------------------------

    /// The contiguous aligned blocks for this record, cached per base.
    pub fn contiguous_blocks(&self, base: CoordBase) -> Result<&[ContiguousBlock]> {
        try_cached(&self.blocks[base.index()], || {
            let cigar = self.cigar()?;
            Ok(cigar::contiguous_blocks(
                self.position(base),
                cigar,
                self.is_reverse(),
                self.seq_len() as i64,
            ))
        })
        .map(Vec::as_slice)
    }

    /// Translate a read coordinate to a reference coordinate; `None` for
    /// positions inside insertions or clips.
    pub fn to_ref_coord(&self, read_coord: i64, base: CoordBase) -> Result<Option<i64>> {
        Ok(cigar::to_ref_coord(self.contiguous_blocks(base)?, read_coord))
    }

    /// All indels in this alignment, cached per base.
    pub fn indels(&self, base: CoordBase) -> Result<&IndelSet> {
        let blocks = self.contiguous_blocks(base)?;
        try_cached(&self.indels[base.index()], || {
            let (insertions, deletions) = cigar::indels(blocks, self.is_reverse());
            Ok(IndelSet { insertions, deletions })
        })
    }

    /// Does the alignment contain an indel at the given reference position?
    pub fn indel_at(
        &self,
        position: i64,
        check_insertions: bool,
        check_deletions: bool,
        base: CoordBase,
    ) -> Result<bool> {
        let set = self.indels(base)?;
        Ok(cigar::indel_at(
            position,
            &set.insertions,
            &set.deletions,
            check_insertions,
            check_deletions,
        ))
    }

    /// The right-most aligned reference position regardless of strand;
    /// `None` when nothing aligned (e.g. a fully clipped or unmapped read).
    pub fn end_position(&self, base: CoordBase) -> Result<Option<i64>> {
        let end = try_cached(&self.end_position, || {
            Ok(cigar::end_position(self.contiguous_blocks(CoordBase::ZeroBased)?))
        })?;
        Ok(end.map(|e| e + base.offset()))
    }

    /// The 5' position: the alignment end for a reverse-strand read, the
    /// alignment start otherwise.
    pub fn five_prime_position(&self, base: CoordBase) -> Result<Option<i64>> {
        if self.is_reverse() {
            self.end_position(base)
        } else {
            Ok(Some(self.position(base)))
        }
    }

    /// The 3' position: the alignment start for a reverse-strand read, the
    /// alignment end otherwise.
    pub fn three_prime_position(&self, base: CoordBase) -> Result<Option<i64>> {
        if self.is_reverse() {
            Ok(Some(self.position(base)))
        } else {
            self.end_position(base)
        }
    }

    // ------------------------------------------------------------------
    // Name resolution and rendering
    // ------------------------------------------------------------------

    /// This record's reference name.
    pub fn reference_name<'a>(&self, lookup: &'a impl ReferenceLookup) -> Option<&'a str> {
        lookup.name_by_id(self.ref_id())
    }

    /// The mate's reference name, rendered as [`SAME_AS_PRIMARY`] when the
    /// mate shares this record's (valid) reference id.
    pub fn mate_reference_name<'a>(&self, lookup: &'a impl ReferenceLookup) -> Option<&'a str> {
        let mate_ref_id = self.mate_ref_id();
        if mate_ref_id >= 0 && mate_ref_id == self.ref_id() {
            Some(SAME_AS_PRIMARY)
        } else {
            lookup.name_by_id(mate_ref_id)
        }
    }

    /// Render the record as one SAM text line (no trailing newline).
    pub fn to_sam(&self, lookup: &impl ReferenceLookup) -> Result<String> {
        use std::fmt::Write as _;

        let name = self.read_name();
        let rname = self.reference_name(lookup).unwrap_or("*");
        let rnext = self.mate_reference_name(lookup).unwrap_or("*");
        let seq = self.seq();
        let qual: String = match self.qual() {
            // widen before the +33: quality bytes run to 255
            Some(quals) => quals
                .iter()
                .map(|&q| char::from_u32(u32::from(q) + 33).unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect(),
            None => "*".to_string(),
        };
        let mut line = format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            if name.is_empty() { "*".into() } else { name.to_string() },
            self.flag(),
            rname,
            self.position(CoordBase::OneBased),
            self.mapq(),
            self.cigar()?,
            rnext,
            self.mate_position(CoordBase::OneBased),
            self.template_length(),
            if seq.is_empty() { "*" } else { seq },
            qual,
        );
        for entry in self.aux()? {
            let _ = write!(
                line,
                "\t{}{}:{}:{}",
                char::from(entry.tag[0]),
                char::from(entry.tag[1]),
                entry.value.sam_type(),
                entry.value
            );
        }
        Ok(line)
    }

    /// Re-encode every decoded field back to the record's byte form.
    ///
    /// For a well-formed input this reproduces the original buffer exactly;
    /// it is the round-trip counterpart of [`BamRecord::new`]. The
    /// `block_size` prefix is the stream layer's concern and is not
    /// included.
    pub fn to_bam_bytes(&self) -> Result<Vec<u8>> {
        let cigar = self.cigar()?;
        let aux = self.aux()?;
        let seq = self.seq();
        let l_read_name = fields::l_read_name(&self.data);
        let l_seq = self.seq_len();

        let mut out = Vec::with_capacity(self.data.len());
        out.extend_from_slice(&self.ref_id().to_le_bytes());
        out.extend_from_slice(&fields::pos(&self.data).to_le_bytes());
        out.push(l_read_name);
        out.push(self.mapq());
        out.extend_from_slice(&self.bin().to_le_bytes());
        out.extend_from_slice(&(cigar.len() as u16).to_le_bytes());
        out.extend_from_slice(&self.flag().to_le_bytes());
        out.extend_from_slice(&(l_seq as u32).to_le_bytes());
        out.extend_from_slice(&self.mate_ref_id().to_le_bytes());
        out.extend_from_slice(&fields::mate_pos(&self.data).to_le_bytes());
        out.extend_from_slice(&self.template_length().to_le_bytes());
        // Name region verbatim: writers may pad with extra NULs, and
        // l_read_name counts them.
        out.extend_from_slice(&self.data[FIXED_HEADER_LEN..FIXED_HEADER_LEN + l_read_name as usize]);
        for element in cigar.elements() {
            out.extend_from_slice(&element.to_raw().to_le_bytes());
        }
        pack_sequence_into(&mut out, seq.as_bytes());
        match self.qual() {
            Some(quals) => out.extend_from_slice(quals),
            None => out.extend(std::iter::repeat(NO_QUAL).take(l_seq)),
        }
        encode_tags(aux, &mut out);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{encode_op, make_b_int16_array_tag, make_record_bytes};

    fn simple_record() -> BamRecord {
        let mut aux = Vec::new();
        aux.extend_from_slice(b"RGZgrp1\0");
        aux.extend_from_slice(&[b'N', b'M', b'c', 2]);
        let data = make_record_bytes(
            2,
            6,
            37,
            flags::PAIRED | flags::PROPER_PAIR,
            b"r001",
            &[
                encode_op(b'M', 8),
                encode_op(b'I', 2),
                encode_op(b'M', 4),
                encode_op(b'D', 1),
                encode_op(b'M', 3),
            ],
            b"TTAGATAAAGGATACTG",
            Some(&[25; 17]),
            2,
            100,
            180,
            &aux,
        );
        BamRecord::new(data).unwrap()
    }

    #[test]
    fn test_fixed_fields() {
        let rec = simple_record();
        assert_eq!(rec.ref_id(), 2);
        assert_eq!(rec.position(CoordBase::ZeroBased), 6);
        assert_eq!(rec.position(CoordBase::OneBased), 7);
        assert_eq!(rec.mapq(), 37);
        assert_eq!(rec.flag(), flags::PAIRED | flags::PROPER_PAIR);
        assert_eq!(rec.seq_len(), 17);
        assert_eq!(rec.mate_ref_id(), 2);
        assert_eq!(rec.mate_position(CoordBase::OneBased), 101);
        assert_eq!(rec.template_length(), 180);
        assert!(rec.is_paired());
        assert!(!rec.is_reverse());
        assert!(!rec.is_unmapped());
    }

    #[test]
    fn test_variable_fields() {
        let rec = simple_record();
        assert_eq!(rec.read_name(), "r001");
        assert_eq!(rec.cigar().unwrap().to_string(), "8M2I4M1D3M");
        assert_eq!(rec.seq(), "TTAGATAAAGGATACTG");
        assert_eq!(rec.qual(), Some([25u8; 17].as_slice()));
        let aux = rec.aux().unwrap();
        assert_eq!(aux.len(), 2);
        assert_eq!(rec.read_group().unwrap().unwrap(), "grp1");
        assert_eq!(rec.tag(*b"NM").unwrap().and_then(TagValue::as_int), Some(2));
        assert_eq!(rec.tag(*b"ZZ").unwrap(), None);
    }

    #[test]
    fn test_record_is_debug() {
        let rec = simple_record();
        assert!(format!("{rec:?}").contains("BamRecord"));
    }

    #[test]
    fn test_to_sam_with_maximum_quality_byte() {
        let data = make_record_bytes(
            0,
            0,
            0,
            0,
            b"r",
            &[encode_op(b'M', 2)],
            b"AC",
            Some(&[0, 255]),
            -1,
            -1,
            0,
            &[],
        );
        let rec = BamRecord::new(data).unwrap();
        let names = vec!["ref"];
        let sam = rec.to_sam(&names).unwrap();
        let fields: Vec<&str> = sam.split('\t').collect();
        let quals: Vec<char> = fields[10].chars().collect();
        assert_eq!(quals, vec!['!', char::from_u32(255 + 33).unwrap()]);
    }

    #[test]
    fn test_decode_is_memoized() {
        let rec = simple_record();
        assert!(std::ptr::eq(rec.cigar().unwrap(), rec.cigar().unwrap()));
        assert!(std::ptr::eq(rec.seq(), rec.seq()));
        assert!(std::ptr::eq(rec.aux().unwrap(), rec.aux().unwrap()));
        assert!(std::ptr::eq(
            rec.contiguous_blocks(CoordBase::OneBased).unwrap(),
            rec.contiguous_blocks(CoordBase::OneBased).unwrap()
        ));
    }

    #[test]
    fn test_odd_length_sequence() {
        let data = make_record_bytes(
            0,
            0,
            0,
            0,
            b"r",
            &[encode_op(b'M', 5)],
            b"ACGTN",
            Some(&[30; 5]),
            -1,
            -1,
            0,
            &[],
        );
        let rec = BamRecord::new(data).unwrap();
        assert_eq!(rec.seq(), "ACGTN");
    }

    #[test]
    fn test_missing_quality_sentinel() {
        let data =
            make_record_bytes(0, 0, 0, 0, b"r", &[], b"ACGT", None, -1, -1, 0, &[]);
        let rec = BamRecord::new(data).unwrap();
        assert_eq!(rec.qual(), None);
    }

    #[test]
    fn test_empty_record_fields() {
        let data = make_record_bytes(-1, -1, 0, flags::UNMAPPED, b"r", &[], b"", None, -1, -1, 0, &[]);
        let rec = BamRecord::new(data).unwrap();
        assert!(rec.cigar().unwrap().is_empty());
        assert_eq!(rec.seq(), "");
        assert_eq!(rec.qual(), Some([].as_slice()));
        assert!(rec.aux().unwrap().is_empty());
    }

    #[test]
    fn test_truncated_header() {
        let err = BamRecord::new(vec![0u8; 31]).unwrap_err();
        assert!(matches!(err, BamscopeError::MalformedRecord { block_size: 31, .. }));
    }

    #[test]
    fn test_stage_overruns_block_size() {
        // claim a 100-op CIGAR that the buffer cannot hold
        let mut data =
            make_record_bytes(0, 0, 0, 0, b"r", &[], b"ACGT", Some(&[30; 4]), -1, -1, 0, &[]);
        data[12..14].copy_from_slice(&100u16.to_le_bytes());
        assert!(matches!(
            BamRecord::new(data).unwrap_err(),
            BamscopeError::MalformedRecord { .. }
        ));

        // claim more sequence than the buffer holds
        let mut data =
            make_record_bytes(0, 0, 0, 0, b"r", &[], b"ACGT", Some(&[30; 4]), -1, -1, 0, &[]);
        data[16..20].copy_from_slice(&1000u32.to_le_bytes());
        assert!(matches!(
            BamRecord::new(data).unwrap_err(),
            BamscopeError::MalformedRecord { .. }
        ));
    }

    #[test]
    fn test_aux_disagreeing_with_block_size() {
        // one stray trailing byte that no tag accounts for
        let data = make_record_bytes(0, 0, 0, 0, b"r", &[], b"", None, -1, -1, 0, &[b'x']);
        let rec = BamRecord::new(data).unwrap();
        assert!(matches!(rec.aux().unwrap_err(), BamscopeError::MalformedRecord { .. }));
    }

    #[test]
    fn test_unassigned_cigar_op_code() {
        let data = make_record_bytes(
            0,
            0,
            0,
            0,
            b"r",
            &[(4 << 4) | 12],
            b"ACGT",
            Some(&[30; 4]),
            -1,
            -1,
            0,
            &[],
        );
        let rec = BamRecord::new(data).unwrap();
        assert!(matches!(rec.cigar().unwrap_err(), BamscopeError::MalformedRecord { .. }));
    }

    #[test]
    fn test_round_trip() {
        let rec = simple_record();
        assert_eq!(rec.to_bam_bytes().unwrap(), rec.raw());
    }

    #[test]
    fn test_round_trip_no_quality_odd_seq() {
        let mut aux = Vec::new();
        aux.extend_from_slice(&make_b_int16_array_tag(*b"XB", &[1, -2, 3]));
        let data = make_record_bytes(
            1,
            99,
            0,
            flags::REVERSE,
            b"frag",
            &[encode_op(b'S', 2), encode_op(b'M', 3)],
            b"ACGTN",
            None,
            -1,
            -1,
            0,
            &aux,
        );
        let rec = BamRecord::new(data).unwrap();
        assert_eq!(rec.to_bam_bytes().unwrap(), rec.raw());
    }

    #[test]
    fn test_coordinate_queries_via_facade() {
        // 8M2I4M1D3M at 1-based position 7, forward strand, 17 bp
        let rec = simple_record();
        assert_eq!(rec.to_ref_coord(8, CoordBase::OneBased).unwrap(), Some(14));
        assert_eq!(rec.to_ref_coord(9, CoordBase::OneBased).unwrap(), None);
        assert_eq!(rec.to_ref_coord(10, CoordBase::OneBased).unwrap(), None);
        assert_eq!(rec.to_ref_coord(11, CoordBase::OneBased).unwrap(), Some(15));

        let set = rec.indels(CoordBase::OneBased).unwrap();
        assert_eq!(set.insertions, vec![Indel { pos: 14, len: 2 }]);
        assert_eq!(set.deletions, vec![Indel { pos: 18, len: 1 }]);
        assert!(rec.indel_at(14, true, false, CoordBase::OneBased).unwrap());
        assert!(!rec.indel_at(14, false, true, CoordBase::OneBased).unwrap());
        assert!(rec.indel_at(19, false, true, CoordBase::OneBased).unwrap());

        assert_eq!(rec.end_position(CoordBase::OneBased).unwrap(), Some(23));
        assert_eq!(rec.end_position(CoordBase::ZeroBased).unwrap(), Some(22));
        assert_eq!(rec.five_prime_position(CoordBase::OneBased).unwrap(), Some(7));
        assert_eq!(rec.three_prime_position(CoordBase::OneBased).unwrap(), Some(23));
    }

    #[test]
    fn test_five_prime_reverse() {
        let data = make_record_bytes(
            0,
            36,
            0,
            flags::REVERSE,
            b"r001r",
            &[encode_op(b'M', 9)],
            b"CAGCGGCAT",
            Some(&[30; 9]),
            -1,
            -1,
            0,
            &[],
        );
        let rec = BamRecord::new(data).unwrap();
        assert_eq!(rec.end_position(CoordBase::OneBased).unwrap(), Some(46));
        assert_eq!(rec.five_prime_position(CoordBase::OneBased).unwrap(), Some(46));
        assert_eq!(rec.three_prime_position(CoordBase::OneBased).unwrap(), Some(37));
    }

    #[test]
    fn test_reference_names_and_sam() {
        let names = vec!["chr1", "chr2", "chr3"];
        let rec = simple_record();
        assert_eq!(rec.reference_name(&names), Some("chr3"));
        assert_eq!(rec.mate_reference_name(&names), Some("="));

        let sam = rec.to_sam(&names).unwrap();
        let fields: Vec<&str> = sam.split('\t').collect();
        let qual_col = ":".repeat(17);
        assert_eq!(
            &fields[..11],
            &[
                "r001",
                "3",
                "chr3",
                "7",
                "37",
                "8M2I4M1D3M",
                "=",
                "101",
                "180",
                "TTAGATAAAGGATACTG",
                qual_col.as_str(),
            ]
        );
        assert_eq!(&fields[11..], &["RG:Z:grp1", "NM:i:2"]);
    }

    #[test]
    fn test_mate_reference_name_distinct_and_unmapped() {
        let names = vec!["chr1", "chr2"];
        let data = make_record_bytes(
            0,
            10,
            0,
            flags::PAIRED,
            b"r",
            &[encode_op(b'M', 4)],
            b"ACGT",
            Some(&[30; 4]),
            1,
            50,
            0,
            &[],
        );
        let rec = BamRecord::new(data).unwrap();
        assert_eq!(rec.mate_reference_name(&names), Some("chr2"));

        let data = make_record_bytes(
            -1,
            -1,
            0,
            flags::UNMAPPED,
            b"r",
            &[],
            b"ACGT",
            Some(&[30; 4]),
            -1,
            -1,
            0,
            &[],
        );
        let rec = BamRecord::new(data).unwrap();
        // both ids are -1: no name and no "=" substitution
        assert_eq!(rec.mate_reference_name(&names), None);
        let sam = rec.to_sam(&names).unwrap();
        assert!(sam.contains("\t*\t0\t"));
    }
}
