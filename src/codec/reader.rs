use std::io::{self, Read};

use byteorder::{BigEndian, ReadBytesExt};

use crate::error::{Error, Result};

/// Byte-counting layer with an optional hard limit.
///
/// Reads past the limit behave like end of stream, which surfaces as
/// `UnexpectedEof` from `read_exact`.
pub struct CountingReader<R> {
    inner: R,
    count: u64,
    limit: Option<u64>,
}

impl<R: Read> CountingReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, count: 0, limit: None }
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let max = match self.limit {
            Some(limit) => (limit.saturating_sub(self.count)).min(buf.len() as u64) as usize,
            None => buf.len(),
        };
        if max == 0 {
            return Ok(0);
        }
        let n = self.inner.read(&mut buf[..max])?;
        self.count += n as u64;
        Ok(n)
    }
}

/// Big-endian primitive reader over a counted stream
pub struct DataReader<R> {
    inner: CountingReader<R>,
}

impl<R: Read> DataReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner: CountingReader::new(inner) }
    }

    /// Bytes consumed so far
    pub fn position(&self) -> u64 {
        self.inner.count()
    }

    pub fn read_u8(&mut self) -> io::Result<u8> {
        self.inner.read_u8()
    }

    pub fn read_i8(&mut self) -> io::Result<i8> {
        self.inner.read_i8()
    }

    pub fn read_bool(&mut self) -> io::Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> io::Result<u16> {
        self.inner.read_u16::<BigEndian>()
    }

    pub fn read_i16(&mut self) -> io::Result<i16> {
        self.inner.read_i16::<BigEndian>()
    }

    pub fn read_i32(&mut self) -> io::Result<i32> {
        self.inner.read_i32::<BigEndian>()
    }

    pub fn read_i64(&mut self) -> io::Result<i64> {
        self.inner.read_i64::<BigEndian>()
    }

    pub fn read_f32(&mut self) -> io::Result<f32> {
        self.inner.read_f32::<BigEndian>()
    }

    pub fn read_f64(&mut self) -> io::Result<f64> {
        self.inner.read_f64::<BigEndian>()
    }

    pub fn read_bytes(&mut self, n: usize) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        (&mut self.inner).take(n as u64).read_to_end(&mut out)?;
        if out.len() != n {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        Ok(out)
    }

    pub fn skip(&mut self, n: u64) -> io::Result<()> {
        let skipped = io::copy(&mut (&mut self.inner).take(n), &mut io::sink())?;
        if skipped != n {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        Ok(())
    }

    /// Skip whatever is left of the innermost region or chunk
    pub fn skip_remaining(&mut self) -> io::Result<()> {
        match self.inner.limit {
            Some(limit) => self.skip(limit.saturating_sub(self.inner.count)),
            None => Ok(()),
        }
    }

    /// Read a length-prefixed (u16) modified UTF-8 string.
    ///
    /// NUL is encoded as `C0 80` and supplementary characters as surrogate
    /// pairs, so decoding goes through UTF-16 units.
    pub fn read_utf(&mut self) -> io::Result<String> {
        let len = self.read_u16()? as usize;
        let bytes = self.read_bytes(len)?;
        decode_modified_utf8(&bytes)
    }

    /// Run `f` against a sub-stream of exactly `length` bytes.
    ///
    /// Reads past `length` fail as end of stream; finishing short of
    /// `length` is a mismatch. Either way the region name is reported.
    pub fn limited<T>(
        &mut self,
        region: &'static str,
        length: u64,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let start = self.inner.count;
        let end = start + length;
        let outer = self.inner.limit;
        if outer.is_some_and(|outer| end > outer) {
            return Err(Error::corrupt(region, format!("declared length {length} exceeds enclosing region")));
        }
        self.inner.limit = Some(end);
        let result = f(self);
        self.inner.limit = outer;

        let value = result.map_err(|e| match e {
            Error::Io(reason) => Error::corrupt(region, reason),
            other => other,
        })?;
        let read = self.inner.count - start;
        if read != length {
            return Err(Error::corrupt(
                region,
                format!("read length mismatch. Expected: {length}; Actual: {read}"),
            ));
        }
        Ok(value)
    }

    /// Region framed by an i32 length
    pub fn region<T>(&mut self, name: &'static str, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let length = self.read_i32().map_err(|e| Error::corrupt(name, e.to_string()))?;
        if length < 0 {
            return Err(Error::corrupt(name, format!("negative region length {length}")));
        }
        self.limited(name, length as u64, f)
    }

    /// Chunk framed by a u16 length
    pub fn chunk<T>(&mut self, name: &'static str, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let length = self.read_u16().map_err(|e| Error::corrupt(name, e.to_string()))?;
        self.limited(name, length as u64, f)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

fn decode_modified_utf8(bytes: &[u8]) -> io::Result<String> {
    let invalid = || io::Error::new(io::ErrorKind::InvalidData, "malformed modified UTF-8 string");
    let continuation = |b: Option<&u8>| match b {
        Some(&b) if b & 0xC0 == 0x80 => Ok((b & 0x3F) as u16),
        _ => Err(invalid()),
    };

    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b & 0x80 == 0 {
            units.push(b as u16);
            i += 1;
        } else if b & 0xE0 == 0xC0 {
            let c1 = continuation(bytes.get(i + 1))?;
            units.push(((b & 0x1F) as u16) << 6 | c1);
            i += 2;
        } else if b & 0xF0 == 0xE0 {
            let c1 = continuation(bytes.get(i + 1))?;
            let c2 = continuation(bytes.get(i + 2))?;
            units.push(((b & 0x0F) as u16) << 12 | c1 << 6 | c2);
            i += 3;
        } else {
            return Err(invalid());
        }
    }
    Ok(char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect())
}
