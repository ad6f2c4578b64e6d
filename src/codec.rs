//! Binary encoding of label sets, IDs and composite link keys.
//!
//! # Label set layout
//!
//! All lengths are big-endian `u16`:
//!
//! ```text
//! +-------+-----------------------------------------------------+
//! | count | label 0 | label 1 | ...                              |
//! +-------+-----------------------------------------------------+
//!
//! label := name_len:u16 | name | value_len:u16 | value
//! ```
//!
//! # ID layout
//!
//! IDs are unsigned LEB128 varints written into a zero-padded 8-byte field.
//! Eight bytes hold 56 payload bits, so IDs must stay below [`MAX_ID`].
//!
//! # Composite key layout
//!
//! Link tables are keyed by `component_len:u16 | component | id:[u8; 8]`.
//!
//! Encoders write into caller-supplied buffers (usually carved from an
//! [`Arena`]); [`encoded_len`] and [`composite_key_len`] give the exact size
//! to reserve. Decoders are exact inverses and reject trailing bytes.

use crate::arena::Arena;
use crate::error::{Error, Result};
use crate::labels::{Label, LabelSet};

/// Size of the fixed field holding a varint ID.
pub const ID_FIELD_LEN: usize = 8;

/// Largest ID that fits in [`ID_FIELD_LEN`] bytes of LEB128.
pub const MAX_ID: u64 = (1 << 56) - 1;

/// Largest name, value or component ID length, and largest label count.
pub const MAX_FIELD_LEN: usize = u16::MAX as usize;

// -----------------------------------------------------------------------------
// Varints
// -----------------------------------------------------------------------------

/// Write `value` as an unsigned LEB128 varint at the start of `buf`.
///
/// Returns the number of bytes written, or `None` if `buf` is too short.
pub fn put_uvarint(buf: &mut [u8], mut value: u64) -> Option<usize> {
    let mut i = 0;
    while value >= 0x80 {
        *buf.get_mut(i)? = (value as u8) | 0x80;
        value >>= 7;
        i += 1;
    }
    *buf.get_mut(i)? = value as u8;
    Some(i + 1)
}

/// Read an unsigned LEB128 varint from the start of `buf`.
///
/// Returns the value and the number of bytes consumed, or `None` if the
/// varint is truncated or overflows 64 bits.
pub fn uvarint(buf: &[u8]) -> Option<(u64, usize)> {
    let mut value = 0u64;
    let mut shift = 0u32;
    for (i, &byte) in buf.iter().enumerate() {
        if i == 10 || (i == 9 && byte > 1) {
            return None;
        }
        value |= u64::from(byte & 0x7f) << shift;
        if byte < 0x80 {
            return Some((value, i + 1));
        }
        shift += 7;
    }
    None
}

/// Encode an ID into its fixed 8-byte storage field.
pub fn encode_id(id: u64) -> Result<[u8; ID_FIELD_LEN]> {
    let mut field = [0u8; ID_FIELD_LEN];
    put_uvarint(&mut field, id).ok_or(Error::IdOverflow { id })?;
    Ok(field)
}

/// Decode an ID from its storage field. Zero padding after the varint is
/// ignored.
pub fn decode_id(field: &[u8]) -> Result<u64> {
    uvarint(field)
        .map(|(id, _)| id)
        .ok_or(Error::Corrupted("invalid id varint"))
}

// -----------------------------------------------------------------------------
// Label sets
// -----------------------------------------------------------------------------

/// Exact encoded size of `labels`, validating every length limit.
pub fn encoded_len(labels: &[Label]) -> Result<usize> {
    if labels.len() > MAX_FIELD_LEN {
        return Err(Error::TooManyLabels {
            count: labels.len(),
        });
    }
    let mut len = 2;
    for label in labels {
        len += field_len(&label.name)? + field_len(&label.value)?;
    }
    Ok(len)
}

fn field_len(s: &str) -> Result<usize> {
    if s.len() > MAX_FIELD_LEN {
        return Err(Error::LabelTooLong { len: s.len() });
    }
    Ok(2 + s.len())
}

/// Encode `labels` into the start of `out`, returning the bytes written.
///
/// # Panics
///
/// Panics if `out` is shorter than [`encoded_len`].
pub fn encode_labels(labels: &[Label], out: &mut [u8]) -> Result<usize> {
    let len = encoded_len(labels)?;
    assert!(out.len() >= len, "label buffer too small");

    let mut w = Writer::new(out);
    w.put_u16(labels.len() as u16);
    for label in labels {
        w.put_str(&label.name);
        w.put_str(&label.value);
    }
    Ok(w.pos)
}

/// Encode `labels` into a buffer allocated from `arena`.
pub fn encode_labels_in<'a>(labels: &[Label], arena: &'a Arena) -> Result<&'a [u8]> {
    let buf = arena.alloc_bytes(encoded_len(labels)?)?;
    encode_labels(labels, buf)?;
    Ok(buf)
}

/// Encode `labels` into a new vector.
pub fn encode_labels_to_vec(labels: &[Label]) -> Result<Vec<u8>> {
    let mut buf = vec![0; encoded_len(labels)?];
    encode_labels(labels, &mut buf)?;
    Ok(buf)
}

/// Decode a label set produced by [`encode_labels`].
///
/// Strings are validated and copied; the result does not borrow `bytes`.
pub fn decode_labels(bytes: &[u8]) -> Result<LabelSet> {
    let mut r = Reader::new(bytes);
    let count = r.u16()? as usize;
    let mut labels = LabelSet::with_capacity(count);
    for _ in 0..count {
        let name = r.string()?;
        let value = r.string()?;
        labels.push(Label { name, value });
    }
    if !r.is_empty() {
        return Err(Error::Corrupted("trailing bytes after label set"));
    }
    Ok(labels)
}

// -----------------------------------------------------------------------------
// Composite keys
// -----------------------------------------------------------------------------

/// Size of a composite link key for `component`.
pub fn composite_key_len(component: &str) -> Result<usize> {
    if component.len() > MAX_FIELD_LEN {
        return Err(Error::ComponentIdTooLong {
            len: component.len(),
        });
    }
    Ok(2 + component.len() + ID_FIELD_LEN)
}

/// Encode `component ++ id` into a buffer allocated from `arena`.
pub fn encode_composite_key<'a>(component: &str, id: u64, arena: &'a Arena) -> Result<&'a [u8]> {
    let id = encode_id(id)?;
    let buf = arena.alloc_bytes(composite_key_len(component)?)?;
    let mut w = Writer::new(buf);
    w.put_str(component);
    w.put_bytes(&id);
    Ok(buf)
}

// -----------------------------------------------------------------------------
// Cursors
// -----------------------------------------------------------------------------

struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn put_u16(&mut self, v: u16) {
        self.put_bytes(&v.to_be_bytes());
    }

    // Callers have validated the length against MAX_FIELD_LEN.
    fn put_str(&mut self, s: &str) {
        self.put_u16(s.len() as u16);
        self.put_bytes(s.as_bytes());
    }

    fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.buf.len() < n {
            return Err(Error::Corrupted("truncated label set"));
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn string(&mut self) -> Result<String> {
        let len = self.u16()? as usize;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| Error::Corrupted("label is not valid utf-8"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uvarint_known_encodings() {
        let mut buf = [0u8; 10];
        assert_eq!(put_uvarint(&mut buf, 0), Some(1));
        assert_eq!(buf[0], 0);

        assert_eq!(put_uvarint(&mut buf, 127), Some(1));
        assert_eq!(buf[0], 0x7f);

        assert_eq!(put_uvarint(&mut buf, 300), Some(2));
        assert_eq!(&buf[..2], &[0xac, 0x02]);

        assert_eq!(put_uvarint(&mut buf, u64::MAX), Some(10));
        assert_eq!(uvarint(&buf), Some((u64::MAX, 10)));
    }

    #[test]
    fn test_uvarint_rejects_truncated() {
        assert_eq!(uvarint(&[]), None);
        assert_eq!(uvarint(&[0x80, 0x80]), None);
        let mut small = [0u8; 1];
        assert_eq!(put_uvarint(&mut small, 128), None);
    }

    #[test]
    fn test_id_field() {
        for id in [1, 2, 127, 128, 300, 1 << 32, MAX_ID] {
            let field = encode_id(id).unwrap();
            assert_eq!(decode_id(&field).unwrap(), id);
        }
        // Zero padding follows a short varint.
        assert_eq!(encode_id(5).unwrap(), [5, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_id_overflow() {
        assert!(matches!(
            encode_id(MAX_ID + 1),
            Err(Error::IdOverflow { id }) if id == MAX_ID + 1
        ));
    }

    #[test]
    fn test_label_layout() {
        let set = LabelSet::from_pairs([("__name__", "up")]);
        let bytes = encode_labels_to_vec(&set).unwrap();
        let mut expected = vec![0, 1, 0, 8];
        expected.extend_from_slice(b"__name__");
        expected.extend_from_slice(&[0, 2]);
        expected.extend_from_slice(b"up");
        assert_eq!(bytes, expected);
        assert_eq!(encoded_len(&set).unwrap(), expected.len());
    }

    #[test]
    fn test_label_roundtrip() {
        let sets = [
            LabelSet::new(),
            LabelSet::from_pairs([("__name__", "test")]),
            LabelSet::from_pairs([("job", "node"), ("instance", "host:9100"), ("le", "")]),
            LabelSet::from_pairs([("emoji", "\u{1f980}"), ("", "empty name")]),
        ];
        let arena = Arena::new();
        for set in sets {
            let bytes = encode_labels_in(&set, &arena).unwrap();
            assert_eq!(decode_labels(bytes).unwrap(), set);
        }
    }

    #[test]
    fn test_label_too_long() {
        let long = "x".repeat(MAX_FIELD_LEN + 1);
        let set = LabelSet::from_pairs([("name", long.as_str())]);
        assert!(matches!(
            encoded_len(&set),
            Err(Error::LabelTooLong { len }) if len == MAX_FIELD_LEN + 1
        ));

        // Exactly at the limit is fine.
        let max = "x".repeat(MAX_FIELD_LEN);
        let set = LabelSet::from_pairs([(max.as_str(), "v")]);
        let bytes = encode_labels_to_vec(&set).unwrap();
        assert_eq!(decode_labels(&bytes).unwrap(), set);
    }

    #[test]
    fn test_too_many_labels() {
        let set: LabelSet = (0..=MAX_FIELD_LEN).map(|_| Label::new("a", "b")).collect();
        assert!(matches!(
            encoded_len(&set),
            Err(Error::TooManyLabels { count }) if count == MAX_FIELD_LEN + 1
        ));
    }

    #[test]
    fn test_decode_corrupted() {
        let set = LabelSet::from_pairs([("job", "node")]);
        let bytes = encode_labels_to_vec(&set).unwrap();

        assert!(matches!(
            decode_labels(&bytes[..bytes.len() - 1]),
            Err(Error::Corrupted(_))
        ));
        assert!(matches!(decode_labels(&[0]), Err(Error::Corrupted(_))));

        let mut trailing = bytes.clone();
        trailing.push(0);
        assert!(matches!(decode_labels(&trailing), Err(Error::Corrupted(_))));

        // count=1, name_len=1, name=0xff (invalid utf-8)
        let invalid = [0, 1, 0, 1, 0xff, 0, 0];
        assert!(matches!(decode_labels(&invalid), Err(Error::Corrupted(_))));
    }

    #[test]
    fn test_composite_key() {
        let arena = Arena::new();
        let key = encode_composite_key("rw", 300, &arena).unwrap();
        assert_eq!(key.len(), composite_key_len("rw").unwrap());
        assert_eq!(&key[..4], &[0, 2, b'r', b'w']);
        assert_eq!(decode_id(&key[4..]).unwrap(), 300);

        // Different components never share a key for the same id.
        let other = encode_composite_key("rw2", 300, &arena).unwrap();
        assert_ne!(key, other);
    }

    #[test]
    fn test_composite_key_too_long() {
        let arena = Arena::new();
        let component = "c".repeat(MAX_FIELD_LEN + 1);
        assert!(matches!(
            encode_composite_key(&component, 1, &arena),
            Err(Error::ComponentIdTooLong { .. })
        ));
    }
}
