//! Deduplicated, insertion-ordered string arena.
//!
//! Every other structure in the container references strings by index into
//! this table. Indices are stable once assigned; new strings are only ever
//! appended. The four hash bytes stored next to each string are re-derived
//! on write (see [`crate::util::crc`]).

use crate::util::crc::name_hash;
use crate::util::{Error, Reader, Result, Writer};
use std::io::{Read, Seek, Write};

/// The container's name table.
#[derive(Debug, Default, Clone)]
pub struct NameTable {
    names: Vec<String>,
    hashes: Vec<[u8; 4]>,
}

impl NameTable {
    /// Read `count` (string, hash) pairs.
    pub fn read<R: Read + Seek>(r: &mut Reader<R>, count: usize) -> Result<Self> {
        let mut names = Vec::with_capacity(count);
        let mut hashes = Vec::with_capacity(count);
        for _ in 0..count {
            let name = r
                .read_str()?
                .ok_or_else(|| Error::parse(r.pos(), "empty name table entry"))?;
            names.push(name);
            hashes.push(r.read_array::<4>()?);
        }
        Ok(Self { names, hashes })
    }

    /// Write all entries, re-deriving every hash from its string.
    pub fn write<W: Write + Seek>(&mut self, w: &mut Writer<W>) -> Result<()> {
        self.hashes = self.names.iter().map(|n| name_hash(n)).collect();
        for (name, hash) in self.names.iter().zip(&self.hashes) {
            w.write_str(name)?;
            w.write_bytes(hash)?;
        }
        Ok(())
    }

    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Look up a name by index.
    pub fn get(&self, id: u32) -> Result<&str> {
        self.names
            .get(id as usize)
            .map(String::as_str)
            .ok_or(Error::NameOutOfBounds { index: id as usize, count: self.names.len() })
    }

    /// Find the index of an exact name.
    pub fn find(&self, name: &str) -> Option<u32> {
        self.names.iter().position(|n| n == name).map(|i| i as u32)
    }

    /// Return the index for `name`, appending it if not present.
    pub fn intern(&mut self, name: &str) -> u32 {
        if let Some(id) = self.find(name) {
            return id;
        }
        self.names.push(name.to_string());
        self.hashes.push(name_hash(name));
        (self.names.len() - 1) as u32
    }

    /// Replace the string in an existing slot.
    ///
    /// Used for in-place mutations like a pixel-format swap, where the slot
    /// must keep its index because other structures reference it.
    pub fn set(&mut self, id: u32, name: &str) -> Result<()> {
        let slot = self
            .names
            .get_mut(id as usize)
            .ok_or(Error::NameOutOfBounds { index: id as usize, count: self.hashes.len() })?;
        *slot = name.to_string();
        self.hashes[id as usize] = name_hash(name);
        Ok(())
    }

    /// Iterate over the stored names in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_intern_is_stable_and_deduplicating() {
        let mut t = NameTable::default();
        let a = t.intern("Body");
        let b = t.intern("Face");
        assert_eq!(t.intern("Body"), a);
        assert_eq!(t.intern("Face"), b);
        assert_eq!(t.len(), 2);
        let c = t.intern("Hair");
        assert_eq!(c, 2);
        assert_eq!(t.get(a).unwrap(), "Body");
    }

    #[test]
    fn test_set_keeps_slot() {
        let mut t = NameTable::default();
        let id = t.intern("PF_DXT5");
        t.set(id, "PF_BC7").unwrap();
        assert_eq!(t.get(id).unwrap(), "PF_BC7");
        assert_eq!(t.len(), 1);
        assert!(t.set(9, "x").is_err());
    }

    #[test]
    fn test_round_trip_rehashes() -> Result<()> {
        let mut t = NameTable::default();
        t.intern("None");
        t.intern("SkeletalMesh");

        let mut w = Writer::new(Cursor::new(Vec::new()));
        t.write(&mut w)?;
        let buf = w.into_inner().into_inner();

        let mut r = Reader::new(Cursor::new(buf));
        let back = NameTable::read(&mut r, 2)?;
        assert_eq!(back.get(0)?, "None");
        assert_eq!(back.get(1)?, "SkeletalMesh");
        assert_eq!(back.hashes[1], name_hash("SkeletalMesh"));
        Ok(())
    }
}
