//! Kind-erased value encoding.
//!
//! The engine stores every value as opaque bytes; the kind is known only to
//! the caller. Integers and booleans are varints, floats are little-endian
//! IEEE 754, strings and byte buffers are stored raw, and string lists are a
//! sequence of length-prefixed UTF-8 strings. A value that does not decode
//! exactly as the requested kind reads as absent.

/// A fixed-size value kind that round-trips through the codec.
pub trait Scalar: Copy + Sized {
    /// Appends the encoded value to `out`.
    fn encode(self, out: &mut Vec<u8>);

    /// Decodes a value, rejecting trailing or missing bytes.
    fn decode(bytes: &[u8]) -> Option<Self>;
}

fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

fn read_varint(bytes: &[u8], pos: &mut usize) -> Option<u64> {
    let mut result = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = *bytes.get(*pos)?;
        *pos += 1;
        if shift == 63 && byte > 1 {
            return None;
        }
        result |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Some(result);
        }
        shift += 7;
        if shift > 63 {
            return None;
        }
    }
}

fn read_whole_varint(bytes: &[u8]) -> Option<u64> {
    let mut pos = 0;
    let value = read_varint(bytes, &mut pos)?;
    (pos == bytes.len()).then_some(value)
}

impl Scalar for bool {
    fn encode(self, out: &mut Vec<u8>) {
        write_varint(out, u64::from(self));
    }

    fn decode(bytes: &[u8]) -> Option<Self> {
        read_whole_varint(bytes).map(|v| v != 0)
    }
}

impl Scalar for i32 {
    fn encode(self, out: &mut Vec<u8>) {
        write_varint(out, i64::from(self) as u64);
    }

    fn decode(bytes: &[u8]) -> Option<Self> {
        i32::try_from(read_whole_varint(bytes)? as i64).ok()
    }
}

impl Scalar for u32 {
    fn encode(self, out: &mut Vec<u8>) {
        write_varint(out, u64::from(self));
    }

    fn decode(bytes: &[u8]) -> Option<Self> {
        u32::try_from(read_whole_varint(bytes)?).ok()
    }
}

impl Scalar for i64 {
    fn encode(self, out: &mut Vec<u8>) {
        write_varint(out, self as u64);
    }

    fn decode(bytes: &[u8]) -> Option<Self> {
        read_whole_varint(bytes).map(|v| v as i64)
    }
}

impl Scalar for u64 {
    fn encode(self, out: &mut Vec<u8>) {
        write_varint(out, self);
    }

    fn decode(bytes: &[u8]) -> Option<Self> {
        read_whole_varint(bytes)
    }
}

impl Scalar for f32 {
    fn encode(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn decode(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(f32::from_le_bytes)
    }
}

impl Scalar for f64 {
    fn encode(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn decode(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(f64::from_le_bytes)
    }
}

/// Encodes a scalar into a fresh buffer.
pub(crate) fn encode_scalar<T: Scalar>(value: T) -> Vec<u8> {
    let mut out = Vec::with_capacity(10);
    value.encode(&mut out);
    out
}

/// Decodes a UTF-8 string value.
pub(crate) fn decode_string(bytes: &[u8]) -> Option<String> {
    std::str::from_utf8(bytes).ok().map(str::to_owned)
}

/// Encodes a string list as length-prefixed items.
pub(crate) fn encode_string_list<S: AsRef<str>>(items: &[S]) -> Vec<u8> {
    let total: usize = items.iter().map(|s| s.as_ref().len() + 2).sum();
    let mut out = Vec::with_capacity(total);
    for item in items {
        let item = item.as_ref();
        write_varint(&mut out, item.len() as u64);
        out.extend_from_slice(item.as_bytes());
    }
    out
}

/// Decodes a string list; any malformed item rejects the whole value.
pub(crate) fn decode_string_list(bytes: &[u8]) -> Option<Vec<String>> {
    let mut items = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let len = usize::try_from(read_varint(bytes, &mut pos)?).ok()?;
        let end = pos.checked_add(len)?;
        let item = bytes.get(pos..end)?;
        items.push(std::str::from_utf8(item).ok()?.to_owned());
        pos = end;
    }
    Some(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn negative_i32_sign_extends() {
        let bytes = encode_scalar(-1i32);
        assert_eq!(bytes.len(), 10);
        assert_eq!(i32::decode(&bytes), Some(-1));
        assert_eq!(i64::decode(&bytes), Some(-1));
    }

    #[test]
    fn i32_rejects_out_of_range_i64() {
        let bytes = encode_scalar(i64::from(i32::MAX) + 1);
        assert_eq!(i32::decode(&bytes), None);
        assert_eq!(i64::decode(&bytes), Some(i64::from(i32::MAX) + 1));
    }

    #[test]
    fn u32_rejects_wide_values() {
        let bytes = encode_scalar(u64::from(u32::MAX) + 1);
        assert_eq!(u32::decode(&bytes), None);
    }

    #[test]
    fn varint_rejects_trailing_bytes() {
        let mut bytes = encode_scalar(5u64);
        bytes.push(0);
        assert_eq!(u64::decode(&bytes), None);
    }

    #[test]
    fn varint_rejects_overlong() {
        let bytes = [0xffu8; 11];
        assert_eq!(u64::decode(&bytes), None);
        assert_eq!(u64::decode(&[]), None);
    }

    #[test]
    fn floats_need_exact_width() {
        assert_eq!(f32::decode(&1.5f32.to_le_bytes()), Some(1.5));
        assert_eq!(f32::decode(&[0, 0, 0]), None);
        assert_eq!(f64::decode(&1.5f32.to_le_bytes()), None);
    }

    #[test]
    fn bool_encodes_as_single_byte() {
        assert_eq!(encode_scalar(true), vec![1]);
        assert_eq!(encode_scalar(false), vec![0]);
        assert_eq!(bool::decode(&[1]), Some(true));
    }

    #[test]
    fn empty_string_list_is_empty_bytes() {
        let empty: [&str; 0] = [];
        assert!(encode_string_list(&empty).is_empty());
        assert_eq!(decode_string_list(&[]), Some(Vec::new()));
    }

    #[test]
    fn string_list_rejects_truncated_item() {
        let mut bytes = encode_string_list(&["hello"]);
        bytes.pop();
        assert_eq!(decode_string_list(&bytes), None);
    }

    #[test]
    fn string_rejects_invalid_utf8() {
        assert_eq!(decode_string(&[0xff, 0xfe]), None);
        assert_eq!(decode_string(b"ok").as_deref(), Some("ok"));
    }

    proptest! {
        #[test]
        fn string_list_preserves_order(items in proptest::collection::vec(".*", 0..16)) {
            let bytes = encode_string_list(&items);
            prop_assert_eq!(decode_string_list(&bytes), Some(items));
        }

        #[test]
        fn i64_survives_codec(value in any::<i64>()) {
            prop_assert_eq!(i64::decode(&encode_scalar(value)), Some(value));
        }
    }
}
