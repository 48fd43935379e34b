//! Binary I/O primitives.
//!
//! Thin wrappers over buffered streams with tracked positions, little-endian
//! accessors, and "expect exact value" checks used throughout the codecs.
//! Every structural assumption in the format is validated through
//! [`Reader::check`] so a mismatch aborts the parse with the byte offset.

use std::io::{Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use half::f16;

use super::{Error, Result};

/// Input stream with a tracked position.
pub struct Reader<R> {
    inner: R,
    pos: u64,
}

impl<R: Read + Seek> Reader<R> {
    /// Wrap a seekable stream, assuming it is at position 0.
    pub fn new(inner: R) -> Self {
        Self { inner, pos: 0 }
    }

    /// Current read position.
    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// Seek to an absolute position.
    pub fn seek(&mut self, pos: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(pos))?;
        self.pos = pos;
        Ok(())
    }

    /// Seek relative to the current position.
    pub fn seek_relative(&mut self, delta: i64) -> Result<()> {
        let pos = self.inner.seek(SeekFrom::Current(delta))?;
        self.pos = pos;
        Ok(())
    }

    /// Total stream size, restoring the current position.
    pub fn size(&mut self) -> Result<u64> {
        let pos = self.pos;
        let size = self.inner.seek(SeekFrom::End(0))?;
        self.inner.seek(SeekFrom::Start(pos))?;
        Ok(size)
    }

    /// Fail with a parse error at the current offset unless the two values match.
    pub fn check<T: PartialEq + std::fmt::Debug>(&self, actual: T, expected: T, msg: &str) -> Result<()> {
        if actual != expected {
            return Err(Error::parse(
                self.pos,
                format!("{msg} (actual: {actual:?}, expected: {expected:?})"),
            ));
        }
        Ok(())
    }

    /// Read exactly `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.inner.read_exact(&mut buf)?;
        self.pos += len as u64;
        Ok(buf)
    }

    /// Read a fixed-size byte array.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.inner.read_exact(&mut buf)?;
        self.pos += N as u64;
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let v = self.inner.read_u8()?;
        self.pos += 1;
        Ok(v)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let v = self.inner.read_u16::<LittleEndian>()?;
        self.pos += 2;
        Ok(v)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let v = self.inner.read_u32::<LittleEndian>()?;
        self.pos += 4;
        Ok(v)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let v = self.inner.read_i32::<LittleEndian>()?;
        self.pos += 4;
        Ok(v)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let v = self.inner.read_u64::<LittleEndian>()?;
        self.pos += 8;
        Ok(v)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        let v = self.inner.read_f32::<LittleEndian>()?;
        self.pos += 4;
        Ok(v)
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        let v = self.inner.read_f64::<LittleEndian>()?;
        self.pos += 8;
        Ok(v)
    }

    pub fn read_f16(&mut self) -> Result<f32> {
        let bits = self.read_u16()?;
        Ok(f16::from_bits(bits).to_f32())
    }

    /// Read a u32-length-prefixed array of u16 values.
    pub fn read_u16_array(&mut self) -> Result<Vec<u16>> {
        let len = self.read_u32()? as usize;
        self.read_u16_array_len(len)
    }

    pub fn read_u16_array_len(&mut self, len: usize) -> Result<Vec<u16>> {
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            out.push(self.read_u16()?);
        }
        Ok(out)
    }

    /// Read a u32-length-prefixed array of u32 values.
    pub fn read_u32_array(&mut self) -> Result<Vec<u32>> {
        let len = self.read_u32()? as usize;
        self.read_u32_array_len(len)
    }

    pub fn read_u32_array_len(&mut self, len: usize) -> Result<Vec<u32>> {
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            out.push(self.read_u32()?);
        }
        Ok(out)
    }

    /// Read a u32-length-prefixed array of i32 values.
    pub fn read_i32_array(&mut self) -> Result<Vec<i32>> {
        let len = self.read_u32()? as usize;
        self.read_i32_array_len(len)
    }

    pub fn read_i32_array_len(&mut self, len: usize) -> Result<Vec<i32>> {
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            out.push(self.read_i32()?);
        }
        Ok(out)
    }

    pub fn read_f32_array_len(&mut self, len: usize) -> Result<Vec<f32>> {
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            out.push(self.read_f32()?);
        }
        Ok(out)
    }

    pub fn read_f64_array_len(&mut self, len: usize) -> Result<Vec<f64>> {
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            out.push(self.read_f64()?);
        }
        Ok(out)
    }

    /// Read a length-prefixed engine string.
    ///
    /// A negative length means UTF-16-LE, positive means ASCII; either way the
    /// terminator is consumed. Zero length yields `None`.
    pub fn read_str(&mut self) -> Result<Option<String>> {
        let num = self.read_i32()?;
        if num == 0 {
            return Ok(None);
        }
        if num < 0 {
            let len = (-num) as usize;
            let units = self.read_u16_array_len(len - 1)?;
            self.seek_relative(2)?;
            Ok(Some(String::from_utf16_lossy(&units)))
        } else {
            let bytes = self.read_bytes(num as usize - 1)?;
            self.seek_relative(1)?;
            Ok(Some(String::from_utf8(bytes)?))
        }
    }

    /// Read a u32 and fail unless it equals `expected`.
    pub fn expect_u32(&mut self, expected: u32, msg: &str) -> Result<()> {
        let v = self.read_u32()?;
        self.check(v, expected, msg)
    }

    /// Read a u32 and fail unless it is zero.
    pub fn expect_null(&mut self, msg: &str) -> Result<()> {
        self.expect_u32(0, msg)
    }

    /// Read `len` u32 zeros.
    pub fn expect_null_array(&mut self, len: usize, msg: &str) -> Result<()> {
        for _ in 0..len {
            self.expect_null(msg)?;
        }
        Ok(())
    }

    /// Read `expected.len()` bytes and fail unless they match.
    pub fn expect_bytes(&mut self, expected: &[u8], msg: &str) -> Result<()> {
        let actual = self.read_bytes(expected.len())?;
        if actual != expected {
            return Err(Error::parse(
                self.pos,
                format!("{msg} (actual: {actual:02x?}, expected: {expected:02x?})"),
            ));
        }
        Ok(())
    }

    /// Scan forward until `pattern` is found, returning all bytes consumed
    /// up to and including the pattern. The cursor stops right after it.
    ///
    /// `limit` bounds how far past the starting offset the scan may go.
    pub fn scan(&mut self, pattern: &[u8], limit: Option<u64>) -> Result<Vec<u8>> {
        let start = self.pos;
        let size = self.size()?;
        let mut consumed = self.read_bytes(pattern.len())?;
        while &consumed[consumed.len() - pattern.len()..] != pattern {
            if self.pos >= size {
                return Err(Error::parse(self.pos, "scan pattern not found"));
            }
            if let Some(limit) = limit {
                if self.pos - start > limit {
                    return Err(Error::parse(self.pos, "scan pattern not found within limit"));
                }
            }
            consumed.push(self.read_u8()?);
        }
        Ok(consumed)
    }
}

/// Output stream with a tracked position.
///
/// Supports the reserve-then-backfill pattern: remember `pos()`, write a
/// placeholder, and later `patch_u32`/`patch_u64` the real value in.
pub struct Writer<W> {
    inner: W,
    pos: u64,
}

impl<W: Write + Seek> Writer<W> {
    /// Wrap a seekable sink, assuming it is at position 0.
    pub fn new(inner: W) -> Self {
        Self { inner, pos: 0 }
    }

    /// Current write position.
    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// Seek to an absolute position.
    pub fn seek(&mut self, pos: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(pos))?;
        self.pos = pos;
        Ok(())
    }

    /// Seek to the end of the sink.
    pub fn seek_end(&mut self) -> Result<u64> {
        let pos = self.inner.seek(SeekFrom::End(0))?;
        self.pos = pos;
        Ok(pos)
    }

    /// Unwrap the inner sink.
    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.inner.write_all(data)?;
        self.pos += data.len() as u64;
        Ok(())
    }

    pub fn write_u8(&mut self, v: u8) -> Result<()> {
        self.inner.write_u8(v)?;
        self.pos += 1;
        Ok(())
    }

    pub fn write_u16(&mut self, v: u16) -> Result<()> {
        self.inner.write_u16::<LittleEndian>(v)?;
        self.pos += 2;
        Ok(())
    }

    pub fn write_u32(&mut self, v: u32) -> Result<()> {
        self.inner.write_u32::<LittleEndian>(v)?;
        self.pos += 4;
        Ok(())
    }

    pub fn write_i32(&mut self, v: i32) -> Result<()> {
        self.inner.write_i32::<LittleEndian>(v)?;
        self.pos += 4;
        Ok(())
    }

    pub fn write_u64(&mut self, v: u64) -> Result<()> {
        self.inner.write_u64::<LittleEndian>(v)?;
        self.pos += 8;
        Ok(())
    }

    pub fn write_f32(&mut self, v: f32) -> Result<()> {
        self.inner.write_f32::<LittleEndian>(v)?;
        self.pos += 4;
        Ok(())
    }

    pub fn write_f64(&mut self, v: f64) -> Result<()> {
        self.inner.write_f64::<LittleEndian>(v)?;
        self.pos += 8;
        Ok(())
    }

    pub fn write_f16(&mut self, v: f32) -> Result<()> {
        self.write_u16(f16::from_f32(v).to_bits())
    }

    pub fn write_u16_array(&mut self, ary: &[u16], with_length: bool) -> Result<()> {
        if with_length {
            self.write_u32(ary.len() as u32)?;
        }
        for v in ary {
            self.write_u16(*v)?;
        }
        Ok(())
    }

    pub fn write_u32_array(&mut self, ary: &[u32], with_length: bool) -> Result<()> {
        if with_length {
            self.write_u32(ary.len() as u32)?;
        }
        for v in ary {
            self.write_u32(*v)?;
        }
        Ok(())
    }

    pub fn write_i32_array(&mut self, ary: &[i32], with_length: bool) -> Result<()> {
        if with_length {
            self.write_u32(ary.len() as u32)?;
        }
        for v in ary {
            self.write_i32(*v)?;
        }
        Ok(())
    }

    pub fn write_f32_array(&mut self, ary: &[f32]) -> Result<()> {
        for v in ary {
            self.write_f32(*v)?;
        }
        Ok(())
    }

    pub fn write_f64_array(&mut self, ary: &[f64]) -> Result<()> {
        for v in ary {
            self.write_f64(*v)?;
        }
        Ok(())
    }

    /// Write a length-prefixed engine string (ASCII when possible).
    pub fn write_str(&mut self, s: &str) -> Result<()> {
        let num = s.chars().count() as i32 + 1;
        if s.is_ascii() {
            self.write_i32(num)?;
            self.write_bytes(s.as_bytes())?;
            self.write_u8(0)
        } else {
            self.write_i32(-num)?;
            for unit in s.encode_utf16() {
                self.write_u16(unit)?;
            }
            self.write_u16(0)
        }
    }

    /// Write a u32 zero.
    pub fn write_null(&mut self) -> Result<()> {
        self.write_u32(0)
    }

    /// Write `len` u32 zeros.
    pub fn write_null_array(&mut self, len: usize) -> Result<()> {
        for _ in 0..len {
            self.write_null()?;
        }
        Ok(())
    }

    /// Overwrite a u32 at `pos`, restoring the current position.
    pub fn patch_u32(&mut self, pos: u64, v: u32) -> Result<()> {
        let cur = self.pos;
        self.seek(pos)?;
        self.write_u32(v)?;
        self.seek(cur)
    }

    /// Overwrite a u64 at `pos`, restoring the current position.
    pub fn patch_u64(&mut self, pos: u64, v: u64) -> Result<()> {
        let cur = self.pos;
        self.seek(pos)?;
        self.write_u64(v)?;
        self.seek(cur)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_scalar_round_trip() -> Result<()> {
        let mut w = Writer::new(Cursor::new(Vec::new()));
        w.write_u32(0xdeadbeef)?;
        w.write_i32(-7)?;
        w.write_f32(1.5)?;
        w.write_f16(0.25)?;
        let buf = w.into_inner().into_inner();

        let mut r = Reader::new(Cursor::new(buf));
        assert_eq!(r.read_u32()?, 0xdeadbeef);
        assert_eq!(r.read_i32()?, -7);
        assert_eq!(r.read_f32()?, 1.5);
        assert_eq!(r.read_f16()?, 0.25);
        assert_eq!(r.pos(), 14);
        Ok(())
    }

    #[test]
    fn test_string_ascii_and_utf16() -> Result<()> {
        let mut w = Writer::new(Cursor::new(Vec::new()));
        w.write_str("Bone_01")?;
        w.write_str("素材")?;
        let buf = w.into_inner().into_inner();

        let mut r = Reader::new(Cursor::new(buf));
        assert_eq!(r.read_str()?.as_deref(), Some("Bone_01"));
        assert_eq!(r.read_str()?.as_deref(), Some("素材"));
        Ok(())
    }

    #[test]
    fn test_check_reports_offset() {
        let mut r = Reader::new(Cursor::new(vec![1u8, 0, 0, 0]));
        let v = r.read_u32().unwrap();
        let err = r.check(v, 2u32, "sentinel").unwrap_err();
        match err {
            Error::Parse { offset, .. } => assert_eq!(offset, 4),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_patch_u32() -> Result<()> {
        let mut w = Writer::new(Cursor::new(Vec::new()));
        let slot = w.pos();
        w.write_u32(0)?;
        w.write_u32(42)?;
        w.patch_u32(slot, 99)?;
        assert_eq!(w.pos(), 8);
        let buf = w.into_inner().into_inner();
        assert_eq!(&buf, &[99, 0, 0, 0, 42, 0, 0, 0]);
        Ok(())
    }

    #[test]
    fn test_scan_finds_pattern() -> Result<()> {
        let mut r = Reader::new(Cursor::new(vec![9, 9, 9, 0xff, 0xff, 0xff, 5]));
        let consumed = r.scan(&[0xff, 0xff, 0xff], None)?;
        assert_eq!(consumed.len(), 6);
        assert_eq!(r.pos(), 6);
        assert_eq!(r.read_u8()?, 5);
        Ok(())
    }
}
