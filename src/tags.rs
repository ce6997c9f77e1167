//! Auxiliary tag decoding for raw BAM records.
//!
//! Aux data is a run of `tag(2) type(1) value(...)` entries filling the tail
//! of a record. Fixed-width types decode a single value; `Z`/`H` are
//! NUL-terminated; `B` is a sub-type byte, a little-endian u32 element
//! count, then that many sub-type-width values.

use bstr::{BString, ByteSlice};
use std::fmt;

use crate::errors::{BamscopeError, Result};

/// A decoded auxiliary tag: two-character id plus typed value.
#[derive(Debug, Clone, PartialEq)]
pub struct AuxTag {
    /// Two-character tag id, e.g. `RG`
    pub tag: [u8; 2],
    /// The decoded value
    pub value: TagValue,
}

/// A typed auxiliary tag value. The variant preserves the exact on-disk
/// type byte so records re-encode byte-for-byte.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    /// `A`: a single printable character
    Char(u8),
    /// `c`: signed 8-bit integer
    Int8(i8),
    /// `C`: unsigned 8-bit integer
    UInt8(u8),
    /// `s`: signed 16-bit integer
    Int16(i16),
    /// `S`: unsigned 16-bit integer
    UInt16(u16),
    /// `i`: signed 32-bit integer
    Int32(i32),
    /// `I`: unsigned 32-bit integer
    UInt32(u32),
    /// `f`: 32-bit float
    Float(f32),
    /// `Z`: NUL-terminated string
    String(BString),
    /// `H`: NUL-terminated hex string
    Hex(BString),
    /// `B`: typed array
    Array(TagArray),
}

/// Element storage for a `B`-type array tag.
#[derive(Debug, Clone, PartialEq)]
pub enum TagArray {
    /// sub-type `c`
    Int8(Vec<i8>),
    /// sub-type `C`
    UInt8(Vec<u8>),
    /// sub-type `s`
    Int16(Vec<i16>),
    /// sub-type `S`
    UInt16(Vec<u16>),
    /// sub-type `i`
    Int32(Vec<i32>),
    /// sub-type `I`
    UInt32(Vec<u32>),
    /// sub-type `f`
    Float(Vec<f32>),
}

impl TagArray {
    /// The on-disk sub-type byte.
    #[must_use]
    pub fn sub_type(&self) -> u8 {
        match self {
            TagArray::Int8(_) => b'c',
            TagArray::UInt8(_) => b'C',
            TagArray::Int16(_) => b's',
            TagArray::UInt16(_) => b'S',
            TagArray::Int32(_) => b'i',
            TagArray::UInt32(_) => b'I',
            TagArray::Float(_) => b'f',
        }
    }

    /// Element count.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            TagArray::Int8(v) => v.len(),
            TagArray::UInt8(v) => v.len(),
            TagArray::Int16(v) => v.len(),
            TagArray::UInt16(v) => v.len(),
            TagArray::Int32(v) => v.len(),
            TagArray::UInt32(v) => v.len(),
            TagArray::Float(v) => v.len(),
        }
    }

    /// Whether the array has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TagValue {
    /// The on-disk type byte for this value.
    #[must_use]
    pub fn type_code(&self) -> u8 {
        match self {
            TagValue::Char(_) => b'A',
            TagValue::Int8(_) => b'c',
            TagValue::UInt8(_) => b'C',
            TagValue::Int16(_) => b's',
            TagValue::UInt16(_) => b'S',
            TagValue::Int32(_) => b'i',
            TagValue::UInt32(_) => b'I',
            TagValue::Float(_) => b'f',
            TagValue::String(_) => b'Z',
            TagValue::Hex(_) => b'H',
            TagValue::Array(_) => b'B',
        }
    }

    /// The SAM text type character: all integer widths render as `i`.
    #[must_use]
    pub fn sam_type(&self) -> char {
        match self {
            TagValue::Char(_) => 'A',
            TagValue::Int8(_)
            | TagValue::UInt8(_)
            | TagValue::Int16(_)
            | TagValue::UInt16(_)
            | TagValue::Int32(_)
            | TagValue::UInt32(_) => 'i',
            TagValue::Float(_) => 'f',
            TagValue::String(_) => 'Z',
            TagValue::Hex(_) => 'H',
            TagValue::Array(_) => 'B',
        }
    }

    /// The value as an integer, if it is one of the integer types.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            TagValue::Int8(v) => Some(i64::from(*v)),
            TagValue::UInt8(v) => Some(i64::from(*v)),
            TagValue::Int16(v) => Some(i64::from(*v)),
            TagValue::UInt16(v) => Some(i64::from(*v)),
            TagValue::Int32(v) => Some(i64::from(*v)),
            TagValue::UInt32(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    /// The value as string bytes, if it is a `Z` or `H` tag.
    #[must_use]
    pub fn as_str_bytes(&self) -> Option<&[u8]> {
        match self {
            TagValue::String(s) | TagValue::Hex(s) => Some(s.as_bstr().as_bytes()),
            _ => None,
        }
    }
}

impl fmt::Display for TagValue {
    /// SAM text rendering of the value portion.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Char(c) => write!(f, "{}", char::from(*c)),
            TagValue::Int8(v) => write!(f, "{v}"),
            TagValue::UInt8(v) => write!(f, "{v}"),
            TagValue::Int16(v) => write!(f, "{v}"),
            TagValue::UInt16(v) => write!(f, "{v}"),
            TagValue::Int32(v) => write!(f, "{v}"),
            TagValue::UInt32(v) => write!(f, "{v}"),
            TagValue::Float(v) => write!(f, "{v}"),
            TagValue::String(s) | TagValue::Hex(s) => write!(f, "{}", s.as_bstr()),
            TagValue::Array(array) => {
                write!(f, "{}", char::from(array.sub_type()))?;
                match array {
                    TagArray::Int8(v) => write_elements(f, v),
                    TagArray::UInt8(v) => write_elements(f, v),
                    TagArray::Int16(v) => write_elements(f, v),
                    TagArray::UInt16(v) => write_elements(f, v),
                    TagArray::Int32(v) => write_elements(f, v),
                    TagArray::UInt32(v) => write_elements(f, v),
                    TagArray::Float(v) => write_elements(f, v),
                }
            }
        }
    }
}

fn write_elements<T: fmt::Display>(f: &mut fmt::Formatter<'_>, values: &[T]) -> fmt::Result {
    for value in values {
        write!(f, ",{value}")?;
    }
    Ok(())
}

/// Decode every tag in an aux data slice.
///
/// `block_size` is the full record size, used only for error messages.
/// Fails with [`BamscopeError::MalformedRecord`] if a value runs past the
/// end of the slice (the declared block size and the consumed bytes
/// disagree), and with [`BamscopeError::UnsupportedTagType`] on a type code
/// outside `{A,c,C,s,S,i,I,f,Z,H,B}`.
pub fn decode_tags(aux: &[u8], block_size: usize) -> Result<Vec<AuxTag>> {
    let mut tags = Vec::new();
    let mut p = 0;
    while p < aux.len() {
        if p + 3 > aux.len() {
            return Err(BamscopeError::malformed(block_size, "truncated aux tag header"));
        }
        let tag = [aux[p], aux[p + 1]];
        let type_code = aux[p + 2];
        p += 3;
        let value = decode_value(aux, &mut p, tag, type_code, block_size)?;
        tags.push(AuxTag { tag, value });
    }
    Ok(tags)
}

fn decode_value(
    aux: &[u8],
    p: &mut usize,
    tag: [u8; 2],
    type_code: u8,
    block_size: usize,
) -> Result<TagValue> {
    match type_code {
        b'A' => Ok(TagValue::Char(take(aux, p, 1, block_size)?[0])),
        b'c' => Ok(TagValue::Int8(take(aux, p, 1, block_size)?[0] as i8)),
        b'C' => Ok(TagValue::UInt8(take(aux, p, 1, block_size)?[0])),
        b's' => Ok(TagValue::Int16(i16::from_le_bytes(take_2(aux, p, block_size)?))),
        b'S' => Ok(TagValue::UInt16(u16::from_le_bytes(take_2(aux, p, block_size)?))),
        b'i' => Ok(TagValue::Int32(i32::from_le_bytes(take_4(aux, p, block_size)?))),
        b'I' => Ok(TagValue::UInt32(u32::from_le_bytes(take_4(aux, p, block_size)?))),
        b'f' => Ok(TagValue::Float(f32::from_le_bytes(take_4(aux, p, block_size)?))),
        b'Z' => Ok(TagValue::String(take_nul_terminated(aux, p, block_size)?)),
        b'H' => Ok(TagValue::Hex(take_nul_terminated(aux, p, block_size)?)),
        b'B' => {
            let sub_type = take(aux, p, 1, block_size)?[0];
            let count = u32::from_le_bytes(take_4(aux, p, block_size)?) as usize;
            // every element is at least one byte, so this also keeps the
            // width multiplications below from overflowing
            if count > aux.len() {
                return Err(BamscopeError::malformed(block_size, "aux array count overruns record"));
            }
            decode_array(aux, p, tag, sub_type, count, block_size)
        }
        _ => Err(BamscopeError::UnsupportedTagType { tag, type_code }),
    }
}

fn decode_array(
    aux: &[u8],
    p: &mut usize,
    tag: [u8; 2],
    sub_type: u8,
    count: usize,
    block_size: usize,
) -> Result<TagValue> {
    let array = match sub_type {
        b'c' => TagArray::Int8(take(aux, p, count, block_size)?.iter().map(|&b| b as i8).collect()),
        b'C' => TagArray::UInt8(take(aux, p, count, block_size)?.to_vec()),
        b's' => TagArray::Int16(
            take(aux, p, count * 2, block_size)?
                .chunks_exact(2)
                .map(|c| i16::from_le_bytes([c[0], c[1]]))
                .collect(),
        ),
        b'S' => TagArray::UInt16(
            take(aux, p, count * 2, block_size)?
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect(),
        ),
        b'i' => TagArray::Int32(
            take(aux, p, count * 4, block_size)?
                .chunks_exact(4)
                .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ),
        b'I' => TagArray::UInt32(
            take(aux, p, count * 4, block_size)?
                .chunks_exact(4)
                .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ),
        b'f' => TagArray::Float(
            take(aux, p, count * 4, block_size)?
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ),
        _ => return Err(BamscopeError::UnsupportedTagType { tag, type_code: sub_type }),
    };
    Ok(TagValue::Array(array))
}

fn take<'a>(aux: &'a [u8], p: &mut usize, n: usize, block_size: usize) -> Result<&'a [u8]> {
    let end = p
        .checked_add(n)
        .filter(|&end| end <= aux.len())
        .ok_or_else(|| BamscopeError::malformed(block_size, "aux tag value overruns record"))?;
    let slice = &aux[*p..end];
    *p = end;
    Ok(slice)
}

fn take_2(aux: &[u8], p: &mut usize, block_size: usize) -> Result<[u8; 2]> {
    let s = take(aux, p, 2, block_size)?;
    Ok([s[0], s[1]])
}

fn take_4(aux: &[u8], p: &mut usize, block_size: usize) -> Result<[u8; 4]> {
    let s = take(aux, p, 4, block_size)?;
    Ok([s[0], s[1], s[2], s[3]])
}

fn take_nul_terminated(aux: &[u8], p: &mut usize, block_size: usize) -> Result<BString> {
    let end = aux[*p..]
        .iter()
        .position(|&b| b == 0)
        .map(|offset| *p + offset)
        .ok_or_else(|| BamscopeError::malformed(block_size, "unterminated Z/H aux tag"))?;
    let value = BString::from(&aux[*p..end]);
    *p = end + 1;
    Ok(value)
}

/// Re-encode tags to their exact on-disk byte form, appending to `dst`.
pub fn encode_tags(tags: &[AuxTag], dst: &mut Vec<u8>) {
    for entry in tags {
        dst.extend_from_slice(&entry.tag);
        dst.push(entry.value.type_code());
        match &entry.value {
            TagValue::Char(c) => dst.push(*c),
            TagValue::Int8(v) => dst.push(*v as u8),
            TagValue::UInt8(v) => dst.push(*v),
            TagValue::Int16(v) => dst.extend_from_slice(&v.to_le_bytes()),
            TagValue::UInt16(v) => dst.extend_from_slice(&v.to_le_bytes()),
            TagValue::Int32(v) => dst.extend_from_slice(&v.to_le_bytes()),
            TagValue::UInt32(v) => dst.extend_from_slice(&v.to_le_bytes()),
            TagValue::Float(v) => dst.extend_from_slice(&v.to_le_bytes()),
            TagValue::String(s) | TagValue::Hex(s) => {
                dst.extend_from_slice(s.as_bstr().as_bytes());
                dst.push(0);
            }
            TagValue::Array(array) => {
                dst.push(array.sub_type());
                dst.extend_from_slice(&(array.len() as u32).to_le_bytes());
                match array {
                    TagArray::Int8(v) => dst.extend(v.iter().map(|&e| e as u8)),
                    TagArray::UInt8(v) => dst.extend_from_slice(v),
                    TagArray::Int16(v) => {
                        v.iter().for_each(|e| dst.extend_from_slice(&e.to_le_bytes()));
                    }
                    TagArray::UInt16(v) => {
                        v.iter().for_each(|e| dst.extend_from_slice(&e.to_le_bytes()));
                    }
                    TagArray::Int32(v) => {
                        v.iter().for_each(|e| dst.extend_from_slice(&e.to_le_bytes()));
                    }
                    TagArray::UInt32(v) => {
                        v.iter().for_each(|e| dst.extend_from_slice(&e.to_le_bytes()));
                    }
                    TagArray::Float(v) => {
                        v.iter().for_each(|e| dst.extend_from_slice(&e.to_le_bytes()));
                    }
                }
            }
        }
    }
}
