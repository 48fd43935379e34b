//! Container (.uasset) codec.
//!
//! The container holds the header plus three tables: names, imports, and
//! exports, followed by a padding block and a signed "file data id" array.
//! Reading is strictly ordered and every offset the header claims is checked
//! against the actual stream position. Writing mirrors reading but runs in
//! three passes: skip the header, write the tables while recording real
//! offsets, then seek back and backfill the header and the export table.

pub mod exports;
pub mod header;
pub mod imports;
pub mod name_table;

pub use exports::{resolve_exports, ExportRecord, MAIN_CLASSES};
pub use header::{PackageHeader, PACKAGE_TAG};
pub use imports::{import_by_ref, resolve_imports, ImportRecord, NameRef};
pub use name_table::NameTable;

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::uexp::{PackageInfo, Uexp};
use crate::util::{Error, Reader, Result, VersionInfo, Writer};

/// File extensions making up one asset bundle.
pub const BUNDLE_EXTENSIONS: [&str; 3] = ["uasset", "uexp", "ubulk"];

/// Resolve the three bundle paths from any one of them.
pub fn bundle_paths(file: &Path) -> Result<(PathBuf, PathBuf, PathBuf)> {
    let ext = file
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    if !BUNDLE_EXTENSIONS.contains(&ext) {
        return Err(Error::other(format!("not an asset bundle path: {}", file.display())));
    }
    Ok((
        file.with_extension("uasset"),
        file.with_extension("uexp"),
        file.with_extension("ubulk"),
    ))
}

/// One loaded asset bundle.
///
/// Owns the decoded container tables and, unless skipped, the typed payload.
/// An instance is built by one load, optionally mutated, and consumed by one
/// save; nothing is cached across independent load/save cycles.
#[derive(Debug)]
pub struct Uasset {
    pub header: PackageHeader,
    pub names: NameTable,
    pub imports: Vec<ImportRecord>,
    pub exports: Vec<ExportRecord>,
    pub file_data_ids: Vec<i32>,
    pub version: VersionInfo,
    /// Class name of the main export (e.g. `SkeletalMesh`)
    pub asset_type: String,
    /// Object name of the main export
    pub asset_name: String,
    /// In-engine package path resolved from the name table
    pub asset_path: String,
    /// Container size in bytes as loaded
    pub size: u64,
    pub payload: Option<Uexp>,
    /// Path the container was loaded from
    pub source_path: PathBuf,
}

impl Uasset {
    /// Load a bundle, including its payload.
    pub fn open(file: impl AsRef<Path>, version_tag: &str) -> Result<Self> {
        Self::open_opts(file, version_tag, false, "")
    }

    /// Load a bundle with options.
    ///
    /// `ignore_payload` stops after the container tables. `expect_class`
    /// fails the load unless the main export class contains the given
    /// substring (empty accepts anything).
    pub fn open_opts(
        file: impl AsRef<Path>,
        version_tag: &str,
        ignore_payload: bool,
        expect_class: &str,
    ) -> Result<Self> {
        let version = VersionInfo::parse(version_tag)?;
        let (uasset_path, uexp_path, _) = bundle_paths(file.as_ref())?;
        info!("Loading {}", uasset_path.display());

        let f = File::open(&uasset_path)
            .map_err(|_| Error::FileNotFound(uasset_path.clone()))?;
        let mut r = Reader::new(BufReader::new(f));
        let size = r.size()?;

        let header = PackageHeader::read(&mut r)?;
        debug!(
            names = header.name_count,
            imports = header.import_count,
            exports = header.export_count,
            "container header"
        );

        let names = NameTable::read(&mut r, header.name_count as usize)?;

        r.check(header.import_offset as u64, r.pos(), "import table offset")?;
        let caps = *version.caps();
        let mut imports = Vec::with_capacity(header.import_count as usize);
        for _ in 0..header.import_count {
            imports.push(ImportRecord::read(&mut r, &caps)?);
        }
        resolve_imports(&mut imports, &names)?;

        r.check(header.export_offset as u64, r.pos(), "export table offset")?;
        let mut exports = Vec::with_capacity(header.export_count as usize);
        for _ in 0..header.export_count {
            exports.push(ExportRecord::read(&mut r, &caps)?);
        }
        let (asset_type, asset_name) = resolve_exports(&mut exports, &imports, &names)?;
        if !asset_type.contains(expect_class) {
            return Err(Error::unsupported(format!(
                "expected a {expect_class} asset, found {asset_type}"
            )));
        }

        let asset_path = resolve_asset_path(&names, &imports, &asset_name)
            .ok_or_else(|| Error::other("failed to resolve the asset path"))?;

        r.check(header.end_to_export as u64, r.pos(), "end of export table")?;
        r.expect_null_array(header.padding_count as usize, "container padding")?;
        r.check(header.padding_offset as u64, r.pos(), "padding offset")?;
        r.expect_null("container padding sentinel")?;
        r.check(header.file_data_offset as u64, r.pos(), "file data offset")?;
        let file_data_ids = r.read_i32_array_len(header.file_data_count as usize)?;

        r.check(r.pos(), size, "container end")?;
        r.check(header.uasset_size as u64, size, "container size field")?;

        let mut asset = Self {
            header,
            names,
            imports,
            exports,
            file_data_ids,
            version,
            asset_type,
            asset_name,
            asset_path,
            size,
            payload: None,
            source_path: uasset_path,
        };

        if !ignore_payload {
            let info = PackageInfo {
                version: &asset.version,
                names: &asset.names,
                imports: &asset.imports,
                uasset_size: asset.size,
                unversioned: asset.header.unversioned(),
                asset_type: &asset.asset_type,
            };
            asset.payload = Some(Uexp::read(&uexp_path, &info, &mut asset.exports)?);
        }
        Ok(asset)
    }

    /// Serialized container size for the current tables.
    pub fn container_size(&self) -> u64 {
        let caps = self.version.caps();
        let name_bytes: u64 = self
            .names
            .iter()
            .map(|n| serialized_str_size(n) + 4)
            .sum();
        let import_bytes = self.imports.len() as u64 * (28 + 4 * caps.import_export_extra as u64);
        let export_bytes = self.exports.len() as u64 * (104 + 4 * caps.import_export_extra as u64);
        self.header.byte_size()
            + name_bytes
            + import_bytes
            + export_bytes
            + 4 * (self.header.padding_count as u64 + 1)
            + 4 * self.file_data_ids.len() as u64
    }

    /// Save the bundle, writing every file the asset requires.
    ///
    /// Returns the total number of bytes written across the bundle.
    pub fn save(&mut self, file: impl AsRef<Path>) -> Result<u64> {
        let (uasset_path, uexp_path, _) = bundle_paths(file.as_ref())?;
        if let Some(dir) = uasset_path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }

        // The payload needs the final container size for its absolute
        // offsets, so compute it from the current tables up front.
        let new_size = self.container_size();
        self.size = new_size;

        let payload = self
            .payload
            .as_mut()
            .ok_or_else(|| Error::constraint("payload was not loaded; nothing to save"))?;
        let info = PackageInfo {
            version: &self.version,
            names: &self.names,
            imports: &self.imports,
            uasset_size: new_size,
            unversioned: self.header.unversioned(),
            asset_type: &self.asset_type,
        };
        let uexp_size = payload.save(&uexp_path, &info, &mut self.exports)?;

        info!("Saving {}", uasset_path.display());
        let f = File::create(&uasset_path)?;
        let mut w = Writer::new(std::io::BufWriter::new(f));

        // pass 1: leave room for the header
        w.seek(self.header.byte_size())?;

        // pass 2: tables, recording actual offsets
        self.header.name_count = self.names.len() as u32;
        self.header.name_count2 = self.names.len() as u32;
        self.header.name_offset = self.header.byte_size() as u32;
        self.names.write(&mut w)?;

        self.header.import_offset = w.pos() as u32;
        self.header.import_count = self.imports.len() as u32;
        for imp in &self.imports {
            imp.write(&mut w)?;
        }

        self.header.export_offset = w.pos() as u32;
        self.header.export_count = self.exports.len() as u32;
        for exp in &self.exports {
            exp.write(&mut w)?;
        }
        self.header.end_to_export = w.pos() as u32;

        w.write_null_array(self.header.padding_count as usize + 1)?;
        self.header.padding_offset = w.pos() as u32 - 4;
        self.header.file_data_offset = w.pos() as u32;
        self.header.file_data_count = self.file_data_ids.len() as u32;
        w.write_i32_array(&self.file_data_ids, false)?;

        self.header.uasset_size = w.pos() as u32;
        self.header.file_length = uexp_size as u32 + self.header.uasset_size - 4;
        if self.header.uasset_size as u64 != new_size {
            return Err(Error::other(format!(
                "container size drifted during write ({} != {})",
                self.header.uasset_size, new_size
            )));
        }

        // pass 3: backfill the header, then the export table with offsets
        // that are only now known
        w.seek(0)?;
        self.header.write(&mut w)?;

        w.seek(self.header.export_offset as u64)?;
        let mut offset = self.header.uasset_size;
        for exp in &mut self.exports {
            exp.update(exp.size, offset);
            offset += exp.size as u32;
        }
        for exp in &self.exports {
            exp.write(&mut w)?;
        }
        w.seek_end()?;

        Ok(new_size + uexp_size)
    }

    /// Embed an author string into the payload trailer.
    pub fn embed_author(&mut self, text: &str) -> Result<()> {
        let payload = self
            .payload
            .as_mut()
            .ok_or_else(|| Error::constraint("payload was not loaded"))?;
        payload.embed_author(text);
        Ok(())
    }

    /// Inject caller mesh/skeleton primitives into the payload, growing the
    /// container tables as needed for new material slots.
    pub fn import_primitives(
        &mut self,
        prims: &crate::primitives::MeshPrimitives,
        only_mesh: bool,
    ) -> Result<()> {
        let Self { payload, names, imports, file_data_ids, .. } = self;
        let payload = payload
            .as_mut()
            .ok_or_else(|| Error::constraint("payload was not loaded"))?;
        payload.import_primitives(prims, names, imports, file_data_ids, only_mesh)
    }

    /// Best-effort texture path resolution for every material slot.
    ///
    /// Failures degrade to warnings per slot and never abort the load.
    pub fn load_material_assets(&mut self) -> Result<()> {
        let Self { payload, version, source_path, asset_path, .. } = self;
        let Some(uexp) = payload.as_mut() else {
            return Ok(());
        };
        let materials = match &mut uexp.payload {
            crate::uexp::AssetPayload::SkeletalMesh(mesh) => &mut mesh.materials,
            crate::uexp::AssetPayload::StaticMesh(mesh) => &mut mesh.materials,
            _ => return Ok(()),
        };
        for mat in materials.iter_mut() {
            mat.load_asset(source_path, asset_path, version)?;
        }
        Ok(())
    }
}

/// Serialized size of an engine string including prefix and terminator.
fn serialized_str_size(s: &str) -> u64 {
    if s.is_ascii() {
        4 + s.len() as u64 + 1
    } else {
        4 + 2 * (s.chars().count() as u64 + 1)
    }
}

/// Find the asset's package path among the name table entries.
///
/// Path-like names that are not import names are candidates; the one whose
/// last segment matches the main export name wins. Exactly one match is
/// required.
fn resolve_asset_path(
    names: &NameTable,
    imports: &[ImportRecord],
    asset_name: &str,
) -> Option<String> {
    let import_names: Vec<&str> = imports.iter().map(|i| i.name_str.as_str()).collect();
    let paths: Vec<&str> = names
        .iter()
        .filter(|n| n.starts_with('/') && !import_names.contains(n))
        .collect();

    let last_segment = |p: &str| p.rsplit('/').next().unwrap_or(p).to_string();
    let matched: Vec<&str> = paths
        .iter()
        .copied()
        .filter(|p| asset_name.contains(&last_segment(p)))
        .collect();
    if matched.len() == 1 {
        return Some(matched[0].to_string());
    }
    let matched: Vec<&str> = paths
        .iter()
        .copied()
        .filter(|p| last_segment(p).contains(asset_name))
        .collect();
    if matched.len() == 1 {
        return Some(matched[0].to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_paths() {
        let (a, e, b) = bundle_paths(Path::new("dir/Ch01.uexp")).unwrap();
        assert_eq!(a, Path::new("dir/Ch01.uasset"));
        assert_eq!(e, Path::new("dir/Ch01.uexp"));
        assert_eq!(b, Path::new("dir/Ch01.ubulk"));
        assert!(bundle_paths(Path::new("dir/Ch01.txt")).is_err());
    }

    #[test]
    fn test_serialized_str_size() {
        assert_eq!(serialized_str_size("None"), 4 + 5);
        assert_eq!(serialized_str_size("素材"), 4 + 6);
    }

    #[test]
    fn test_resolve_asset_path() {
        let mut names = NameTable::default();
        names.intern("/Script/Engine");
        names.intern("/Game/Ch/SK_Body");
        names.intern("SK_Body");
        let mut imports = vec![ImportRecord {
            name: NameRef::new(0),
            ..Default::default()
        }];
        imports[0].name_str = "/Script/Engine".to_string();

        let path = resolve_asset_path(&names, &imports, "SK_Body").unwrap();
        assert_eq!(path, "/Game/Ch/SK_Body");
    }
}
