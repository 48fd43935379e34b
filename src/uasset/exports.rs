//! Export table: objects this package defines.
//!
//! Each record names a class (through an import back-reference), a size, and
//! a byte offset into the payload file. Offsets are meaningless until the
//! payload has been fully re-serialized, so the writer rewrites this table
//! in place at the end of a save.

use std::io::{Read, Seek, Write};

use crate::uasset::imports::{import_by_ref, ImportRecord, NameRef};
use crate::uasset::NameTable;
use crate::util::{Caps, Error, OpaqueBlob, Reader, Result, Writer};

/// Classes whose single "main" export carries the typed asset payload.
pub const MAIN_CLASSES: &[&str] = &[
    "SkeletalMesh",
    "StaticMesh",
    "Skeleton",
    "AnimSequence",
    "Texture2D",
    "TextureCube",
    "Material",
    "MaterialInstanceConstant",
    "BlendSpace",
];

/// One export record (104 bytes, plus one u32 on 5.0).
#[derive(Debug, Clone)]
pub struct ExportRecord {
    pub class_id: i32,
    pub null: u32,
    /// Negative 1-based back-reference into the import table
    pub import_id: i32,
    pub null2: u32,
    pub name: NameRef,
    pub flags: u32,
    /// Object byte size within the payload file
    pub size: u64,
    /// Absolute byte offset (container size included)
    pub offset: u32,
    pub unknown: [u8; 64],
    pub extra: Option<u32>,

    // resolved after reading
    pub name_str: String,
    pub class_str: String,
    pub import_name: String,
    /// Stored verbatim when the export is not the typed main export
    pub ignore: bool,
    /// Payload bytes of an ignored export, kept byte-for-byte
    pub blob: Option<OpaqueBlob>,
}

impl ExportRecord {
    pub fn read<R: Read + Seek>(r: &mut Reader<R>, caps: &Caps) -> Result<Self> {
        let class_id = r.read_i32()?;
        let null = r.read_u32()?;
        let import_id = r.read_i32()?;
        let null2 = r.read_u32()?;
        let name = NameRef::read(r)?;
        let flags = r.read_u32()?;
        let size = r.read_u64()?;
        let offset = r.read_u32()?;
        let unknown = r.read_array::<64>()?;
        let extra = if caps.import_export_extra { Some(r.read_u32()?) } else { None };
        Ok(Self {
            class_id,
            null,
            import_id,
            null2,
            name,
            flags,
            size,
            offset,
            unknown,
            extra,
            ..Default::default()
        })
    }

    pub fn write<W: Write + Seek>(&self, w: &mut Writer<W>) -> Result<()> {
        w.write_i32(self.class_id)?;
        w.write_u32(self.null)?;
        w.write_i32(self.import_id)?;
        w.write_u32(self.null2)?;
        self.name.write(w)?;
        w.write_u32(self.flags)?;
        w.write_u64(self.size)?;
        w.write_u32(self.offset)?;
        w.write_bytes(&self.unknown)?;
        if let Some(extra) = self.extra {
            w.write_u32(extra)?;
        }
        Ok(())
    }

    /// Update the recomputed payload placement.
    pub fn update(&mut self, size: u64, offset: u32) {
        self.size = size;
        self.offset = offset;
    }
}

impl Default for ExportRecord {
    fn default() -> Self {
        Self {
            class_id: 0,
            null: 0,
            import_id: 0,
            null2: 0,
            name: NameRef::default(),
            flags: 0,
            size: 0,
            offset: 0,
            unknown: [0; 64],
            extra: None,
            name_str: String::new(),
            class_str: String::new(),
            import_name: String::new(),
            ignore: true,
            blob: None,
        }
    }
}

/// Resolve export names and find the main export's class and name.
pub fn resolve_exports(
    exports: &mut [ExportRecord],
    imports: &[ImportRecord],
    names: &NameTable,
) -> Result<(String, String)> {
    let mut asset_type = None;
    let mut asset_name = None;
    for exp in exports.iter_mut() {
        let imp = import_by_ref(imports, exp.import_id)
            .ok_or_else(|| Error::other("export references a missing import"))?;
        exp.import_name = imp.name_str.clone();
        exp.class_str = imp.class_str.clone();
        exp.name_str = names.get(exp.name.index)?.to_string();
        if MAIN_CLASSES.contains(&exp.class_str.as_str()) {
            asset_type = Some(exp.class_str.clone());
            asset_name = Some(exp.name_str.clone());
            exp.ignore = false;
        } else {
            exp.ignore = true;
        }
    }
    match (asset_type, asset_name) {
        (Some(t), Some(n)) => Ok((t, n)),
        _ => Err(Error::unsupported("no recognized main export class")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_record_round_trip() -> Result<()> {
        let caps = Caps::default();
        let rec = ExportRecord {
            class_id: 3,
            import_id: -1,
            name: NameRef::new(7),
            flags: 9,
            size: 4096,
            offset: 2000,
            ..Default::default()
        };
        let mut w = Writer::new(Cursor::new(Vec::new()));
        rec.write(&mut w)?;
        let buf = w.into_inner().into_inner();
        assert_eq!(buf.len(), 104);

        let mut r = Reader::new(Cursor::new(buf));
        let back = ExportRecord::read(&mut r, &caps)?;
        assert_eq!(back.size, 4096);
        assert_eq!(back.offset, 2000);
        assert_eq!(back.name.index, 7);
        Ok(())
    }

    #[test]
    fn test_record_extra_word() -> Result<()> {
        let caps = Caps { import_export_extra: true, ..Default::default() };
        let rec = ExportRecord { extra: Some(1), ..Default::default() };
        let mut w = Writer::new(Cursor::new(Vec::new()));
        rec.write(&mut w)?;
        let buf = w.into_inner().into_inner();
        assert_eq!(buf.len(), 108);
        let mut r = Reader::new(Cursor::new(buf));
        let back = ExportRecord::read(&mut r, &caps)?;
        assert_eq!(back.extra, Some(1));
        Ok(())
    }
}
