//! Custom error types for bamscope operations.

use thiserror::Error;

/// Result type alias for bamscope operations
pub type Result<T> = std::result::Result<T, BamscopeError>;

/// Error type for bamscope operations
#[derive(Error, Debug)]
pub enum BamscopeError {
    /// A record buffer is truncated or its declared block size disagrees
    /// with the bytes actually consumed.
    #[error("Malformed BAM record ({block_size} bytes): {reason}")]
    MalformedRecord {
        /// Total size of the record buffer
        block_size: usize,
        /// Explanation of the problem
        reason: String,
    },

    /// An auxiliary tag carries a type code outside {A,c,C,s,S,i,I,f,Z,H,B}.
    #[error("Unsupported type '{}' for aux tag {}{}", char::from(*.type_code), char::from(.tag[0]), char::from(.tag[1]))]
    UnsupportedTagType {
        /// The two-character tag id
        tag: [u8; 2],
        /// The unrecognized type byte
        type_code: u8,
    },

    /// A persisted FASTA index line is malformed, or a fresh scan found
    /// inconsistent line geometry mid-sequence.
    #[error("Corrupt FASTA index: {reason}")]
    IndexCorruption {
        /// Explanation of the problem
        reason: String,
    },

    /// A retrieval request extends past the recorded sequence length.
    #[error("Requested position ({position}) and length ({length}) is greater than reference sequence length ({sequence_length}) for '{name}'")]
    OutOfRange {
        /// The reference sequence name
        name: String,
        /// 0-based start of the request
        position: u64,
        /// Number of bases requested
        length: u64,
        /// Recorded length of the sequence
        sequence_length: u64,
    },
}

impl BamscopeError {
    /// Shorthand for a [`BamscopeError::MalformedRecord`].
    pub(crate) fn malformed(block_size: usize, reason: impl Into<String>) -> Self {
        BamscopeError::MalformedRecord { block_size, reason: reason.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_record_message() {
        let error = BamscopeError::malformed(12, "buffer shorter than fixed header");
        let msg = format!("{error}");
        assert!(msg.contains("Malformed BAM record (12 bytes)"));
        assert!(msg.contains("buffer shorter than fixed header"));
    }

    #[test]
    fn test_unsupported_tag_type_message() {
        let error = BamscopeError::UnsupportedTagType { tag: *b"XY", type_code: b'?' };
        let msg = format!("{error}");
        assert!(msg.contains("Unsupported type '?'"));
        assert!(msg.contains("XY"));
    }

    #[test]
    fn test_index_corruption_message() {
        let error =
            BamscopeError::IndexCorruption { reason: "bad number of FAI fields: 3".to_string() };
        assert!(format!("{error}").contains("bad number of FAI fields"));
    }

    #[test]
    fn test_out_of_range_message() {
        let error = BamscopeError::OutOfRange {
            name: "chr1".to_string(),
            position: 90,
            length: 20,
            sequence_length: 100,
        };
        let msg = format!("{error}");
        assert!(msg.contains("position (90)"));
        assert!(msg.contains("length (20)"));
        assert!(msg.contains("(100)"));
        assert!(msg.contains("'chr1'"));
    }
}
