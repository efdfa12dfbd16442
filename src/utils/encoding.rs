//! Binary encoding for table files.
//!
//! Integers are LEB128 varints, strings are length-prefixed UTF-8 and
//! collections are a varint count followed by their elements.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Read, Write};

/// Encode a u32 as a variable-length integer
pub fn encode_varint(mut value: u32, buf: &mut Vec<u8>) {
    loop {
        if value < 0x80 {
            buf.push(value as u8);
            break;
        }
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
}

/// Decode a variable-length integer from a slice
/// Returns (value, bytes_consumed)
pub fn decode_varint(buf: &[u8]) -> Option<(u32, usize)> {
    let mut result: u32 = 0;
    let mut shift = 0;

    for (i, &byte) in buf.iter().enumerate() {
        if shift >= 32 {
            return None; // Overflow
        }

        result |= ((byte & 0x7F) as u32) << shift;

        if byte & 0x80 == 0 {
            return Some((result, i + 1));
        }

        shift += 7;
    }

    None // Incomplete
}

/// Encode a u64 as a variable-length integer
pub fn encode_varint_u64(mut value: u64, buf: &mut Vec<u8>) {
    loop {
        if value < 0x80 {
            buf.push(value as u8);
            break;
        }
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
}

/// Decode a u64 variable-length integer
pub fn decode_varint_u64(buf: &[u8]) -> Option<(u64, usize)> {
    let mut result: u64 = 0;
    let mut shift = 0;

    for (i, &byte) in buf.iter().enumerate() {
        if shift >= 64 {
            return None;
        }

        result |= ((byte & 0x7F) as u64) << shift;

        if byte & 0x80 == 0 {
            return Some((result, i + 1));
        }

        shift += 7;
    }

    None
}

/// Write a u32 in little-endian format
pub fn write_u32_le<W: Write>(writer: &mut W, value: u32) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

/// Read a u32 in little-endian format
pub fn read_u32_le<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Cursor over an encoded buffer
pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub fn varint(&mut self) -> Option<u32> {
        let (value, used) = decode_varint(&self.buf[self.pos..])?;
        self.pos += used;
        Some(value)
    }

    pub fn varint_u64(&mut self) -> Option<u64> {
        let (value, used) = decode_varint_u64(&self.buf[self.pos..])?;
        self.pos += used;
        Some(value)
    }

    pub fn bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(len)?;
        let slice = self.buf.get(self.pos..end)?;
        self.pos = end;
        Some(slice)
    }
}

/// A value that can be stored in a table file
pub trait Codec: Sized {
    fn encode(&self, buf: &mut Vec<u8>);

    /// Returns None on truncated or malformed input
    fn decode(dec: &mut Decoder<'_>) -> Option<Self>;
}

impl Codec for u32 {
    fn encode(&self, buf: &mut Vec<u8>) {
        encode_varint(*self, buf);
    }

    fn decode(dec: &mut Decoder<'_>) -> Option<Self> {
        dec.varint()
    }
}

impl Codec for u64 {
    fn encode(&self, buf: &mut Vec<u8>) {
        encode_varint_u64(*self, buf);
    }

    fn decode(dec: &mut Decoder<'_>) -> Option<Self> {
        dec.varint_u64()
    }
}

impl Codec for u16 {
    fn encode(&self, buf: &mut Vec<u8>) {
        encode_varint(*self as u32, buf);
    }

    fn decode(dec: &mut Decoder<'_>) -> Option<Self> {
        u16::try_from(dec.varint()?).ok()
    }
}

impl Codec for bool {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(*self as u8);
    }

    fn decode(dec: &mut Decoder<'_>) -> Option<Self> {
        match dec.bytes(1)?[0] {
            0 => Some(false),
            1 => Some(true),
            _ => None,
        }
    }
}

impl Codec for String {
    fn encode(&self, buf: &mut Vec<u8>) {
        encode_varint(self.len() as u32, buf);
        buf.extend_from_slice(self.as_bytes());
    }

    fn decode(dec: &mut Decoder<'_>) -> Option<Self> {
        let len = dec.varint()? as usize;
        let bytes = dec.bytes(len)?;
        String::from_utf8(bytes.to_vec()).ok()
    }
}

impl<T: Codec> Codec for Option<T> {
    fn encode(&self, buf: &mut Vec<u8>) {
        match self {
            Some(value) => {
                buf.push(1);
                value.encode(buf);
            }
            None => buf.push(0),
        }
    }

    fn decode(dec: &mut Decoder<'_>) -> Option<Self> {
        match dec.bytes(1)?[0] {
            0 => Some(None),
            1 => Some(Some(T::decode(dec)?)),
            _ => None,
        }
    }
}

impl<T: Codec> Codec for Vec<T> {
    fn encode(&self, buf: &mut Vec<u8>) {
        encode_varint(self.len() as u32, buf);
        for item in self {
            item.encode(buf);
        }
    }

    fn decode(dec: &mut Decoder<'_>) -> Option<Self> {
        let count = dec.varint()? as usize;
        // Counts come from disk and may be corrupt
        let mut items = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            items.push(T::decode(dec)?);
        }
        Some(items)
    }
}

impl<T: Codec + Ord> Codec for BTreeSet<T> {
    fn encode(&self, buf: &mut Vec<u8>) {
        encode_varint(self.len() as u32, buf);
        for item in self {
            item.encode(buf);
        }
    }

    fn decode(dec: &mut Decoder<'_>) -> Option<Self> {
        let count = dec.varint()?;
        let mut set = BTreeSet::new();
        for _ in 0..count {
            set.insert(T::decode(dec)?);
        }
        Some(set)
    }
}

impl<K: Codec + Ord, V: Codec> Codec for BTreeMap<K, V> {
    fn encode(&self, buf: &mut Vec<u8>) {
        encode_varint(self.len() as u32, buf);
        for (key, value) in self {
            key.encode(buf);
            value.encode(buf);
        }
    }

    fn decode(dec: &mut Decoder<'_>) -> Option<Self> {
        let count = dec.varint()?;
        let mut map = BTreeMap::new();
        for _ in 0..count {
            let key = K::decode(dec)?;
            let value = V::decode(dec)?;
            map.insert(key, value);
        }
        Some(map)
    }
}
