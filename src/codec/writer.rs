use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

/// Big-endian writer producing the same framing `DataReader` consumes.
///
/// Used to build map and schematic containers for tests and tooling;
/// it does not know how to serialize a whole save.
pub struct DataWriter {
    data: Vec<u8>,
}

impl DataWriter {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.data.push(v);
    }

    pub fn write_i8(&mut self, v: i8) {
        self.write_u8(v as u8);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.write_u8(if v { 1 } else { 0 });
    }

    pub fn write_u16(&mut self, v: u16) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_i16(&mut self, v: i16) {
        self.write_u16(v as u16);
    }

    pub fn write_i32(&mut self, v: i32) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_i64(&mut self, v: i64) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_f32(&mut self, v: f32) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    /// Write a u16-length-prefixed modified UTF-8 string
    pub fn write_utf(&mut self, s: &str) {
        let mut encoded = Vec::with_capacity(s.len());
        for unit in s.encode_utf16() {
            match unit {
                0x0001..=0x007F => encoded.push(unit as u8),
                0x0000 | 0x0080..=0x07FF => {
                    encoded.push(0xC0 | (unit >> 6) as u8);
                    encoded.push(0x80 | (unit & 0x3F) as u8);
                }
                _ => {
                    encoded.push(0xE0 | (unit >> 12) as u8);
                    encoded.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                    encoded.push(0x80 | (unit & 0x3F) as u8);
                }
            }
        }
        self.write_u16(encoded.len() as u16);
        self.write_bytes(&encoded);
    }

    /// Write an i32-length-framed region built by `f`
    pub fn write_region(&mut self, f: impl FnOnce(&mut Self)) {
        let mut inner = Self::new();
        f(&mut inner);
        self.write_i32(inner.len() as i32);
        self.write_bytes(inner.as_slice());
    }

    /// Write a u16-length-framed chunk built by `f`
    pub fn write_chunk(&mut self, f: impl FnOnce(&mut Self)) {
        let mut inner = Self::new();
        f(&mut inner);
        self.write_u16(inner.len() as u16);
        self.write_bytes(inner.as_slice());
    }
}

impl Default for DataWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl From<DataWriter> for Vec<u8> {
    fn from(writer: DataWriter) -> Self {
        writer.into_vec()
    }
}

/// zlib-compress a finished buffer
pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    // Writing into a Vec cannot fail.
    let _ = encoder.write_all(data);
    encoder.finish().unwrap_or_default()
}
