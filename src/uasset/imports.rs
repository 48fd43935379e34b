//! Import table: references to objects defined in other packages.
//!
//! Imports form a forest through negative 1-based parent indices
//! (`-index - 1` addresses a sibling import, 0 means no parent). Material
//! and skeleton linkage across files is resolved through this table.

use std::io::{Read, Seek, Write};

use crate::uasset::NameTable;
use crate::util::{Caps, Reader, Result, Writer};

/// A serialized name reference: table index plus instance number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NameRef {
    pub index: u32,
    pub number: u32,
}

impl NameRef {
    pub fn new(index: u32) -> Self {
        Self { index, number: 0 }
    }

    pub fn read<R: Read + Seek>(r: &mut Reader<R>) -> Result<Self> {
        Ok(Self { index: r.read_u32()?, number: r.read_u32()? })
    }

    pub fn write<W: Write + Seek>(&self, w: &mut Writer<W>) -> Result<()> {
        w.write_u32(self.index)?;
        w.write_u32(self.number)
    }
}

/// One import record (28 bytes, plus one u32 on 5.0).
#[derive(Debug, Clone, Default)]
pub struct ImportRecord {
    /// Package that declares the class (e.g. `/Script/Engine`)
    pub class_package: NameRef,
    /// Class name (e.g. `Material`, `Skeleton`)
    pub class: NameRef,
    /// Negative 1-based reference to the parent import, 0 for none
    pub parent_import_id: i32,
    /// Object name
    pub name: NameRef,
    pub extra: Option<u32>,

    // resolved from the name table after reading
    pub name_str: String,
    pub class_str: String,
    pub package_str: String,
    pub parent_name: String,
}

impl ImportRecord {
    pub fn read<R: Read + Seek>(r: &mut Reader<R>, caps: &Caps) -> Result<Self> {
        let class_package = NameRef::read(r)?;
        let class = NameRef::read(r)?;
        let parent_import_id = r.read_i32()?;
        let name = NameRef::read(r)?;
        let extra = if caps.import_export_extra { Some(r.read_u32()?) } else { None };
        Ok(Self {
            class_package,
            class,
            parent_import_id,
            name,
            extra,
            ..Default::default()
        })
    }

    pub fn write<W: Write + Seek>(&self, w: &mut Writer<W>) -> Result<()> {
        self.class_package.write(w)?;
        self.class.write(w)?;
        w.write_i32(self.parent_import_id)?;
        self.name.write(w)?;
        if let Some(extra) = self.extra {
            w.write_u32(extra)?;
        }
        Ok(())
    }

    /// True when this import references a material object.
    pub fn is_material(&self) -> bool {
        matches!(self.class_str.as_str(), "Material" | "MaterialInstanceConstant")
    }
}

/// Resolve name-table indices into cached strings for a whole import array.
pub fn resolve_imports(imports: &mut [ImportRecord], names: &NameTable) -> Result<()> {
    for imp in imports.iter_mut() {
        imp.name_str = names.get(imp.name.index)?.to_string();
        imp.class_str = names.get(imp.class.index)?.to_string();
        imp.package_str = names.get(imp.class_package.index)?.to_string();
    }
    let by_index: Vec<String> = imports.iter().map(|i| i.name_str.clone()).collect();
    for imp in imports.iter_mut() {
        imp.parent_name = if imp.parent_import_id == 0 {
            "None".to_string()
        } else {
            by_index[(-imp.parent_import_id - 1) as usize].clone()
        };
    }
    Ok(())
}

/// Follow a payload-side back-reference (`-id - 1`) into the import array.
pub fn import_by_ref(imports: &[ImportRecord], id: i32) -> Option<&ImportRecord> {
    let index = (-id - 1) as usize;
    imports.get(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_names() -> NameTable {
        let mut names = NameTable::default();
        names.intern("/Script/Engine"); // 0
        names.intern("Material"); // 1
        names.intern("MI_Body"); // 2
        names.intern("/Game/Ch/Materials"); // 3
        names.intern("Package"); // 4
        names
    }

    #[test]
    fn test_record_round_trip() -> Result<()> {
        let caps = Caps::default();
        let rec = ImportRecord {
            class_package: NameRef::new(0),
            class: NameRef::new(1),
            parent_import_id: -2,
            name: NameRef::new(2),
            extra: None,
            ..Default::default()
        };
        let mut w = Writer::new(Cursor::new(Vec::new()));
        rec.write(&mut w)?;
        let buf = w.into_inner().into_inner();
        assert_eq!(buf.len(), 28);

        let mut r = Reader::new(Cursor::new(buf));
        let back = ImportRecord::read(&mut r, &caps)?;
        assert_eq!(back.class.index, 1);
        assert_eq!(back.parent_import_id, -2);
        Ok(())
    }

    #[test]
    fn test_resolve_parents() -> Result<()> {
        let names = sample_names();
        let mut imports = vec![
            ImportRecord {
                class_package: NameRef::new(0),
                class: NameRef::new(4),
                parent_import_id: 0,
                name: NameRef::new(3),
                ..Default::default()
            },
            ImportRecord {
                class_package: NameRef::new(0),
                class: NameRef::new(1),
                parent_import_id: -1,
                name: NameRef::new(2),
                ..Default::default()
            },
        ];
        resolve_imports(&mut imports, &names)?;
        assert_eq!(imports[0].parent_name, "None");
        assert_eq!(imports[1].parent_name, "/Game/Ch/Materials");
        assert!(imports[1].is_material());

        let found = import_by_ref(&imports, -2).unwrap();
        assert_eq!(found.name_str, "MI_Body");
        Ok(())
    }
}
