//! Container file header.
//!
//! A fixed-size record at the start of the container. The signed version
//! subfield (`-raw - 1`, 6 or 7) selects an alternate field set: version 7
//! carries an extra unknown-count block and four more leading null bytes.
//! Table offsets, the container size, and the combined file length are only
//! known after everything else has been written, so the writer skips this
//! record first and backfills it last.

use std::io::{Read, Seek, Write};

use crate::util::{Error, Reader, Result, Writer};

/// Package tag at the start of the container (also the payload signature).
pub const PACKAGE_TAG: [u8; 4] = [0xC1, 0x83, 0x2A, 0x9E];

/// Package flag bit marking an unversioned (property-tag-free) payload.
const PKG_FLAG_UNVERSIONED: u32 = 0x2000;

/// Fixed container header.
#[derive(Debug, Clone)]
pub struct PackageHeader {
    /// Decoded header version subfield (6 or 7)
    pub version: i32,
    leading_null: Vec<u8>,
    /// Total container size in bytes
    pub uasset_size: u32,
    pub package_flags: u32,
    pub name_count: u32,
    pub name_offset: u32,
    null2: [u8; 8],
    pub export_count: u32,
    pub export_offset: u32,
    pub import_count: u32,
    pub import_offset: u32,
    /// Stream offset right after the export table
    pub end_to_export: u32,
    null3: [u8; 16],
    pub guid: [u8; 16],
    pub unknown: u32,
    pub padding_count: u32,
    pub name_count2: u32,
    null4: [u8; 36],
    pub unknown2: u64,
    /// File-data offset minus the zero sentinel word
    pub padding_offset: u32,
    /// Container size + payload size - 4
    pub file_length: u32,
    null5: [u8; 12],
    pub file_data_count: u32,
    pub file_data_offset: u32,
    /// Unknown-count block present on header version 7
    pub unknown_count: Option<u32>,
}

impl PackageHeader {
    /// Blank header for building an asset from scratch. Every offset and
    /// count field is filled in by the container writer.
    pub fn template(version: i32) -> Self {
        Self {
            version,
            leading_null: vec![0; if version >= 7 { 20 } else { 16 }],
            uasset_size: 0,
            package_flags: 0,
            name_count: 0,
            name_offset: 0,
            null2: [0; 8],
            export_count: 0,
            export_offset: 0,
            import_count: 0,
            import_offset: 0,
            end_to_export: 0,
            null3: [0; 16],
            guid: [0; 16],
            unknown: 0,
            padding_count: 0,
            name_count2: 0,
            null4: [0; 36],
            unknown2: 0,
            padding_offset: 0,
            file_length: 0,
            null5: [0; 12],
            file_data_count: 0,
            file_data_offset: 0,
            unknown_count: if version >= 7 { Some(0) } else { None },
        }
    }

    pub fn read<R: Read + Seek>(r: &mut Reader<R>) -> Result<Self> {
        let tag = r.read_array::<4>()?;
        if tag != PACKAGE_TAG {
            return Err(Error::InvalidMagic);
        }
        let version = -r.read_i32()? - 1;
        if !(6..=7).contains(&version) {
            return Err(Error::unsupported(format!("header version {version}")));
        }
        let leading_null = r.read_bytes(if version >= 7 { 20 } else { 16 })?;

        let uasset_size = r.read_u32()?;
        r.expect_u32(5, "header string length")?;
        r.expect_bytes(b"None ", "header string")?;
        let package_flags = r.read_u32()?;
        let name_count = r.read_u32()?;
        let name_offset = r.read_u32()?;
        let null2 = r.read_array::<8>()?;
        let export_count = r.read_u32()?;
        let export_offset = r.read_u32()?;
        let import_count = r.read_u32()?;
        let import_offset = r.read_u32()?;
        let end_to_export = r.read_u32()?;
        let null3 = r.read_array::<16>()?;
        let guid = r.read_array::<16>()?;
        let unknown = r.read_u32()?;
        let padding_count = r.read_u32()?;
        let name_count2 = r.read_u32()?;
        let null4 = r.read_array::<36>()?;
        let unknown2 = r.read_u64()?;
        let padding_offset = r.read_u32()?;
        let file_length = r.read_u32()?;
        let null5 = r.read_array::<12>()?;
        let file_data_count = r.read_u32()?;
        let file_data_offset = r.read_u32()?;

        let unknown_count = if version >= 7 {
            let count = r.read_u32()?;
            let sentinel = r.read_i32()?;
            r.check(sentinel, -1, "header v7 sentinel")?;
            let sentinel = r.read_i32()?;
            r.check(sentinel, -1, "header v7 sentinel")?;
            Some(count)
        } else {
            None
        };

        Ok(Self {
            version,
            leading_null,
            uasset_size,
            package_flags,
            name_count,
            name_offset,
            null2,
            export_count,
            export_offset,
            import_count,
            import_offset,
            end_to_export,
            null3,
            guid,
            unknown,
            padding_count,
            name_count2,
            null4,
            unknown2,
            padding_offset,
            file_length,
            null5,
            file_data_count,
            file_data_offset,
            unknown_count,
        })
    }

    pub fn write<W: Write + Seek>(&self, w: &mut Writer<W>) -> Result<()> {
        w.write_bytes(&PACKAGE_TAG)?;
        w.write_i32(-self.version - 1)?;
        w.write_bytes(&self.leading_null)?;
        w.write_u32(self.uasset_size)?;
        w.write_u32(5)?;
        w.write_bytes(b"None ")?;
        w.write_u32(self.package_flags)?;
        w.write_u32(self.name_count)?;
        w.write_u32(self.name_offset)?;
        w.write_bytes(&self.null2)?;
        w.write_u32(self.export_count)?;
        w.write_u32(self.export_offset)?;
        w.write_u32(self.import_count)?;
        w.write_u32(self.import_offset)?;
        w.write_u32(self.end_to_export)?;
        w.write_bytes(&self.null3)?;
        w.write_bytes(&self.guid)?;
        w.write_u32(self.unknown)?;
        w.write_u32(self.padding_count)?;
        w.write_u32(self.name_count2)?;
        w.write_bytes(&self.null4)?;
        w.write_u64(self.unknown2)?;
        w.write_u32(self.padding_offset)?;
        w.write_u32(self.file_length)?;
        w.write_bytes(&self.null5)?;
        w.write_u32(self.file_data_count)?;
        w.write_u32(self.file_data_offset)?;
        if let Some(count) = self.unknown_count {
            w.write_u32(count)?;
            w.write_i32(-1)?;
            w.write_i32(-1)?;
        }
        Ok(())
    }

    /// Byte size of this header as serialized.
    pub fn byte_size(&self) -> u64 {
        let base = 4 + 4 + self.leading_null.len() as u64 + 169;
        if self.version >= 7 {
            base + 12
        } else {
            base
        }
    }

    /// True when the payload omits versioned property tags.
    #[inline]
    pub fn unversioned(&self) -> bool {
        self.package_flags & PKG_FLAG_UNVERSIONED != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_header() -> PackageHeader {
        PackageHeader {
            version: 6,
            leading_null: vec![0; 16],
            uasset_size: 1000,
            package_flags: PKG_FLAG_UNVERSIONED,
            name_count: 12,
            name_offset: 193,
            null2: [0; 8],
            export_count: 1,
            export_offset: 600,
            import_count: 4,
            import_offset: 500,
            end_to_export: 704,
            null3: [0; 16],
            guid: [7; 16],
            unknown: 1,
            padding_count: 0,
            name_count2: 12,
            null4: [0; 36],
            unknown2: 0,
            padding_offset: 704,
            file_length: 2000,
            null5: [0; 12],
            file_data_count: 2,
            file_data_offset: 708,
            unknown_count: None,
        }
    }

    #[test]
    fn test_round_trip_v6() -> Result<()> {
        let header = sample_header();
        let mut w = Writer::new(Cursor::new(Vec::new()));
        header.write(&mut w)?;
        let buf = w.into_inner().into_inner();
        assert_eq!(buf.len() as u64, header.byte_size());
        assert_eq!(header.byte_size(), 193);

        let mut r = Reader::new(Cursor::new(buf));
        let back = PackageHeader::read(&mut r)?;
        assert_eq!(back.version, 6);
        assert_eq!(back.uasset_size, 1000);
        assert_eq!(back.guid, [7; 16]);
        assert!(back.unversioned());
        Ok(())
    }

    #[test]
    fn test_round_trip_v7() -> Result<()> {
        let mut header = sample_header();
        header.version = 7;
        header.leading_null = vec![0; 20];
        header.unknown_count = Some(3);
        let mut w = Writer::new(Cursor::new(Vec::new()));
        header.write(&mut w)?;
        let buf = w.into_inner().into_inner();
        assert_eq!(buf.len() as u64, header.byte_size());

        let mut r = Reader::new(Cursor::new(buf));
        let back = PackageHeader::read(&mut r)?;
        assert_eq!(back.version, 7);
        assert_eq!(back.unknown_count, Some(3));
        Ok(())
    }

    #[test]
    fn test_bad_tag() {
        let mut r = Reader::new(Cursor::new(vec![0u8; 200]));
        assert!(matches!(PackageHeader::read(&mut r), Err(Error::InvalidMagic)));
    }
}
