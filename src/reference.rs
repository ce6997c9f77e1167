//! Indexed random access into a reference FASTA.
//!
//! A [`ReferenceIndex`] maps sequence names to their length, the byte
//! offset of their body, and their per-line geometry, either loaded from a
//! samtools-style `.fai` sidecar or built by a single forward scan of the
//! FASTA itself. Retrieval seeks straight to the computed byte offset and
//! reads forward, stripping line terminators.
//!
//! Unknown sequence names are not errors: retrieval degrades to a run of
//! `N` filler and [`ReferenceIndex::sequence_length`] to a large fixed
//! default, so callers can keep going without the reference on hand.
//!
//! The underlying file handle is seek-then-read stateful, which is why
//! [`ReferenceIndex::sequence_at`] takes `&mut self`; share one index
//! across threads only behind a lock, or give each worker its own.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use log::debug;

use crate::errors::BamscopeError;

/// Filler base returned for unknown sequence names.
pub const UNKNOWN_SEQUENCE_CHAR: char = 'N';

/// Stand-in length for unknown sequence names, large enough to act as
/// "unbounded" for any real chromosome.
pub const DEFAULT_SEQUENCE_LENGTH: u64 = 255_000_000;

const FAI_FIELD_COUNT: usize = 5;

/// One sequence's entry in the index: the five `.fai` fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaiEntry {
    /// Sequence name (first whitespace-delimited token of the header)
    pub name: String,
    /// Total bases in the sequence
    pub len: u64,
    /// Byte offset of the first body line
    pub offset: u64,
    /// Bases per body line
    pub line_bases: u64,
    /// Bytes per body line, terminator included
    pub line_width: u64,
}

/// Name-addressed random access over an indexed FASTA file.
#[derive(Debug)]
pub struct ReferenceIndex {
    reader: Option<BufReader<File>>,
    entries: Vec<FaiEntry>,
    by_name: HashMap<String, usize>,
}

impl ReferenceIndex {
    /// Open a FASTA, loading `<path>.fai` when present and scanning the
    /// FASTA itself otherwise.
    pub fn open(fasta: impl AsRef<Path>) -> Result<Self> {
        let fasta = fasta.as_ref();
        let mut fai = fasta.as_os_str().to_os_string();
        fai.push(".fai");
        Self::open_impl(fasta, Path::new(&fai))
    }

    /// Open a FASTA with an explicitly located index file.
    pub fn open_with_index(fasta: impl AsRef<Path>, index: impl AsRef<Path>) -> Result<Self> {
        Self::open_impl(fasta.as_ref(), index.as_ref())
    }

    fn open_impl(fasta: &Path, index: &Path) -> Result<Self> {
        let file = File::open(fasta)
            .with_context(|| format!("opening reference FASTA {}", fasta.display()))?;
        let mut reader = BufReader::new(file);
        let (entries, by_name) = if index.exists() {
            let loaded = load_fai(index)?;
            debug!("loaded {} sequences from FASTA index {}", loaded.0.len(), index.display());
            loaded
        } else {
            let scanned = scan_fasta(&mut reader)
                .with_context(|| format!("indexing reference FASTA {}", fasta.display()))?;
            debug!("indexed {} sequences from {}", scanned.0.len(), fasta.display());
            scanned
        };
        Ok(ReferenceIndex { reader: Some(reader), entries, by_name })
    }

    /// An index with no reference behind it. Every name is unknown, so
    /// every retrieval degrades to filler.
    #[must_use]
    pub fn empty() -> Self {
        ReferenceIndex { reader: None, entries: Vec::new(), by_name: HashMap::new() }
    }

    /// The indexed entry for a name, if any.
    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&FaiEntry> {
        self.by_name.get(name).map(|&i| &self.entries[i])
    }

    /// Sequence names in file order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Number of indexed sequences.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no sequences are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The recorded length of a sequence, or [`DEFAULT_SEQUENCE_LENGTH`]
    /// for unknown names.
    #[must_use]
    pub fn sequence_length(&self, name: &str) -> u64 {
        self.entry(name).map_or(DEFAULT_SEQUENCE_LENGTH, |e| e.len)
    }

    /// Retrieve `length` bases of `name` starting at 0-based `position`.
    ///
    /// Unknown names yield [`UNKNOWN_SEQUENCE_CHAR`] repeated `length`
    /// times. For known names the request must fit inside the recorded
    /// sequence length ([`BamscopeError::OutOfRange`] otherwise), and the
    /// file must actually hold the indexed bytes
    /// ([`BamscopeError::IndexCorruption`] on premature end of file).
    pub fn sequence_at(&mut self, name: &str, position: u64, length: u64) -> Result<String> {
        let Some(entry) = self.entry(name) else {
            return Ok(UNKNOWN_SEQUENCE_CHAR.to_string().repeat(length as usize));
        };
        let end = position.checked_add(length).ok_or_else(|| anyhow!("position overflow"))?;
        if end > entry.len {
            return Err(BamscopeError::OutOfRange {
                name: name.to_string(),
                position,
                length,
                sequence_length: entry.len,
            }
            .into());
        }
        if length == 0 {
            return Ok(String::new());
        }
        if entry.line_bases == 0 {
            return Err(BamscopeError::IndexCorruption {
                reason: format!("zero line length recorded for '{name}'"),
            }
            .into());
        }
        let byte_offset = entry.offset
            + (position / entry.line_bases) * entry.line_width
            + position % entry.line_bases;
        let (offset, len) = (entry.offset, entry.len);
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| anyhow!("no reference file behind index entry '{name}'"))?;
        reader
            .seek(SeekFrom::Start(byte_offset))
            .with_context(|| format!("seeking to {byte_offset} for '{name}' (body at {offset})"))?;

        let mut bases = String::with_capacity(length as usize);
        let mut chunk = vec![0u8; length as usize];
        while (bases.len() as u64) < length {
            let want = length as usize - bases.len();
            let n = reader
                .read(&mut chunk[..want])
                .with_context(|| format!("reading sequence body of '{name}'"))?;
            if n == 0 {
                return Err(BamscopeError::IndexCorruption {
                    reason: format!(
                        "end of file inside sequence body of '{name}' (recorded length {len})"
                    ),
                }
                .into());
            }
            bases.extend(
                chunk[..n].iter().filter(|b| !b.is_ascii_whitespace()).map(|&b| char::from(b)),
            );
        }
        Ok(bases)
    }
}

type IndexTables = (Vec<FaiEntry>, HashMap<String, usize>);

fn corrupt(reason: String) -> anyhow::Error {
    BamscopeError::IndexCorruption { reason }.into()
}

/// Parse a persisted `.fai` file: five tab-separated fields per line, the
/// name truncated at its first whitespace.
fn load_fai(path: &Path) -> Result<IndexTables> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading FASTA index {}", path.display()))?;
    let mut entries = Vec::new();
    let mut by_name = HashMap::new();
    for line in contents.lines() {
        let line = line.trim_end_matches(|c| c == '\r');
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != FAI_FIELD_COUNT {
            return Err(corrupt(format!("bad number of FAI fields: {line:?}")));
        }
        let name = fields[0].split_whitespace().next().unwrap_or("").to_string();
        let mut numbers = [0u64; 4];
        for (slot, field) in numbers.iter_mut().zip(&fields[1..]) {
            *slot = field
                .parse()
                .map_err(|_| corrupt(format!("unparseable FAI field {field:?} for '{name}'")))?;
        }
        let [len, offset, line_bases, line_width] = numbers;
        let entry = FaiEntry { name: name.clone(), len, offset, line_bases, line_width };
        upsert(&mut entries, &mut by_name, entry);
    }
    Ok((entries, by_name))
}

/// Build the index by scanning the FASTA once.
///
/// A `>` line opens a new sequence whose body starts at the following
/// byte. Body lines accumulate length; the first body line fixes the
/// expected per-line geometry, and a divergent line is an error only once
/// a further body line proves it was not the (legal) shorter final line.
/// A blank line closes the current sequence; body data after a blank line
/// but before the next header belongs to no sequence and is dropped.
/// Non-blank data before the first header is a format error.
fn scan_fasta(reader: &mut BufReader<File>) -> Result<IndexTables> {
    reader.seek(SeekFrom::Start(0)).context("rewinding FASTA")?;
    let mut entries: Vec<FaiEntry> = Vec::new();
    let mut by_name = HashMap::new();
    let mut offset: u64 = 0;
    let mut current: Option<usize> = None;
    let mut seen_header = false;
    let mut pending_mismatch: Option<String> = None;
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).context("reading FASTA line")?;
        if n == 0 {
            break;
        }
        let line_start = offset;
        offset += n as u64;
        if let Some(rest) = line.strip_prefix('>') {
            let name = rest.split_whitespace().next().unwrap_or("").to_string();
            let entry =
                FaiEntry { name: name.clone(), len: 0, offset, line_bases: 0, line_width: 0 };
            current = Some(upsert(&mut entries, &mut by_name, entry));
            seen_header = true;
            pending_mismatch = None;
        } else if let Some(idx) = current {
            let body = line.trim();
            if body.is_empty() {
                current = None;
                continue;
            }
            if let Some(reason) = pending_mismatch.take() {
                return Err(corrupt(reason));
            }
            let line_bases = body.len() as u64;
            let line_width = n as u64;
            let entry = &mut entries[idx];
            if entry.line_bases == 0 {
                entry.line_bases = line_bases;
                entry.line_width = line_width;
            }
            if entry.line_width != line_width {
                pending_mismatch = Some(format!(
                    "line width mismatch in '{}': {} != {}",
                    entry.name, line_width, entry.line_width
                ));
            }
            if entry.line_bases != line_bases {
                pending_mismatch = Some(format!(
                    "line length mismatch in '{}': {} != {}",
                    entry.name, line_bases, entry.line_bases
                ));
            }
            entry.len += line_bases;
        } else if !line.trim().is_empty() {
            if !seen_header {
                return Err(corrupt(format!(
                    "unexpected characters before first header at byte {line_start}"
                )));
            }
            debug!("dropping FASTA body line outside any sequence at byte {line_start}");
        }
    }
    Ok((entries, by_name))
}

/// Insert an entry, replacing an earlier one of the same name in place.
fn upsert(entries: &mut Vec<FaiEntry>, by_name: &mut HashMap<String, usize>, entry: FaiEntry) -> usize {
    match by_name.get(&entry.name) {
        Some(&i) => {
            entries[i] = entry;
            i
        }
        None => {
            entries.push(entry);
            let i = entries.len() - 1;
            by_name.insert(entries[i].name.clone(), i);
            i
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;
    use std::path::PathBuf;

    use tempfile::TempDir;

    use super::*;

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut fh = File::create(&path).unwrap();
        fh.write_all(contents.as_bytes()).unwrap();
        path
    }

    fn is_corruption(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref(), Some(BamscopeError::IndexCorruption { .. }))
    }

    const TWO_SEQS: &str = ">chr1 extra description\nACGTACGTAC\nACGTACGTAC\nACGT\n>chr2\nTTTT\n";

    #[test]
    fn test_scan_two_sequences() {
        let dir = TempDir::new().unwrap();
        let fasta = write_file(&dir, "ref.fa", TWO_SEQS);
        let index = ReferenceIndex::open(&fasta).unwrap();
        assert_eq!(index.names().collect::<Vec<_>>(), vec!["chr1", "chr2"]);
        assert_eq!(
            index.entry("chr1"),
            Some(&FaiEntry {
                name: "chr1".to_string(),
                len: 24,
                offset: 24,
                line_bases: 10,
                line_width: 11,
            })
        );
        assert_eq!(
            index.entry("chr2"),
            Some(&FaiEntry {
                name: "chr2".to_string(),
                len: 4,
                offset: 57,
                line_bases: 4,
                line_width: 5,
            })
        );
    }

    #[test]
    fn test_short_final_line_is_legal() {
        let dir = TempDir::new().unwrap();
        let fasta = write_file(&dir, "ref.fa", ">s\nACGTA\nACGTA\nAC\n");
        let index = ReferenceIndex::open(&fasta).unwrap();
        assert_eq!(index.sequence_length("s"), 12);
    }

    #[test]
    fn test_mid_sequence_geometry_mismatch_fails() {
        let dir = TempDir::new().unwrap();
        let fasta = write_file(&dir, "ref.fa", ">s\nACGTA\nAC\nACGTA\n");
        let err = ReferenceIndex::open(&fasta).unwrap_err();
        assert!(is_corruption(&err), "{err:#}");
    }

    #[test]
    fn test_divergent_line_directly_before_next_header_is_legal() {
        let dir = TempDir::new().unwrap();
        let fasta = write_file(&dir, "ref.fa", ">s\nACGTA\nAC\n>t\nGGGG\n");
        let index = ReferenceIndex::open(&fasta).unwrap();
        assert_eq!(index.sequence_length("s"), 7);
        assert_eq!(index.sequence_length("t"), 4);
    }

    #[test]
    fn test_blank_line_closes_sequence_and_orphan_data_is_dropped() {
        let dir = TempDir::new().unwrap();
        let fasta = write_file(&dir, "ref.fa", ">s\nACGTA\n\nGGGGGGGGGG\n>t\nTT\n");
        let index = ReferenceIndex::open(&fasta).unwrap();
        assert_eq!(index.sequence_length("s"), 5);
        assert_eq!(index.sequence_length("t"), 2);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_data_before_first_header_fails() {
        let dir = TempDir::new().unwrap();
        let fasta = write_file(&dir, "ref.fa", "ACGT\n>s\nACGT\n");
        let err = ReferenceIndex::open(&fasta).unwrap_err();
        assert!(is_corruption(&err), "{err:#}");
    }

    #[test]
    fn test_persisted_index_is_preferred() {
        let dir = TempDir::new().unwrap();
        let fasta = write_file(&dir, "ref.fa", TWO_SEQS);
        // deliberately different from what a scan would produce
        write_file(&dir, "ref.fa.fai", "chr1 description\t20\t24\t10\t11\n");
        let index = ReferenceIndex::open(&fasta).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.sequence_length("chr1"), 20);
    }

    #[test]
    fn test_fai_bad_field_count() {
        let dir = TempDir::new().unwrap();
        let fasta = write_file(&dir, "ref.fa", TWO_SEQS);
        let fai = write_file(&dir, "ref.fai", "chr1\t24\t24\t10\n");
        let err = ReferenceIndex::open_with_index(&fasta, &fai).unwrap_err();
        assert!(is_corruption(&err), "{err:#}");
    }

    #[test]
    fn test_fai_unparseable_number() {
        let dir = TempDir::new().unwrap();
        let fasta = write_file(&dir, "ref.fa", TWO_SEQS);
        let fai = write_file(&dir, "ref.fai", "chr1\ttwentyfour\t24\t10\t11\n");
        let err = ReferenceIndex::open_with_index(&fasta, &fai).unwrap_err();
        assert!(is_corruption(&err), "{err:#}");
    }

    #[test]
    fn test_retrieval_within_and_across_lines() {
        let dir = TempDir::new().unwrap();
        let fasta = write_file(&dir, "ref.fa", TWO_SEQS);
        let mut index = ReferenceIndex::open(&fasta).unwrap();
        assert_eq!(index.sequence_at("chr1", 0, 4).unwrap(), "ACGT");
        assert_eq!(index.sequence_at("chr1", 8, 4).unwrap(), "ACAC");
        assert_eq!(index.sequence_at("chr1", 10, 10).unwrap(), "ACGTACGTAC");
        assert_eq!(index.sequence_at("chr1", 0, 24).unwrap(), "ACGTACGTACACGTACGTACACGT");
        assert_eq!(index.sequence_at("chr2", 1, 3).unwrap(), "TTT");
        assert_eq!(index.sequence_at("chr1", 3, 0).unwrap(), "");
    }

    #[test]
    fn test_retrieval_out_of_range() {
        let dir = TempDir::new().unwrap();
        let fasta = write_file(&dir, "ref.fa", TWO_SEQS);
        let mut index = ReferenceIndex::open(&fasta).unwrap();
        let err = index.sequence_at("chr1", 20, 5).unwrap_err();
        match err.downcast_ref() {
            Some(BamscopeError::OutOfRange { position: 20, length: 5, sequence_length: 24, .. }) => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_name_degrades_to_filler() {
        let dir = TempDir::new().unwrap();
        let fasta = write_file(&dir, "ref.fa", TWO_SEQS);
        let mut index = ReferenceIndex::open(&fasta).unwrap();
        assert_eq!(index.sequence_at("chrX", 1000, 5).unwrap(), "NNNNN");
        assert_eq!(index.sequence_length("chrX"), DEFAULT_SEQUENCE_LENGTH);
    }

    #[test]
    fn test_index_is_debug() {
        let index = ReferenceIndex::empty();
        assert!(format!("{index:?}").contains("ReferenceIndex"));
    }

    #[test]
    fn test_empty_index() {
        let mut index = ReferenceIndex::empty();
        assert!(index.is_empty());
        assert_eq!(index.sequence_at("chr1", 0, 3).unwrap(), "NNN");
        assert_eq!(index.sequence_length("chr1"), DEFAULT_SEQUENCE_LENGTH);
    }

    #[test]
    fn test_index_longer_than_file_is_corruption() {
        let dir = TempDir::new().unwrap();
        let fasta = write_file(&dir, "ref.fa", ">s\nACGT\n");
        let fai = write_file(&dir, "ref.fai", "s\t100\t3\t4\t5\n");
        let mut index = ReferenceIndex::open_with_index(&fasta, &fai).unwrap();
        let err = index.sequence_at("s", 90, 8).unwrap_err();
        assert!(is_corruption(&err), "{err:#}");
    }
}
