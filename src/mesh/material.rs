//! Material slots and identity resolution.
//!
//! Mesh exports begin with an opaque property region; the material slot
//! array is located by scanning for an import back-reference to a material
//! object. Matching caller materials onto source slots is a best-effort
//! three-pass name matcher run before any geometry import.

use std::io::{Read, Seek, Write};
use std::path::Path;

use tracing::{debug, warn};

use crate::primitives::MaterialInfo;
use crate::uasset::{import_by_ref, ImportRecord, NameTable, Uasset};
use crate::util::{Error, Reader, Result, VersionInfo, Writer};

/// One material slot on a mesh.
#[derive(Debug, Clone, Default)]
pub struct Material {
    /// Negative 1-based back-reference into the import table, 0 for none
    pub import_id: i32,
    pub slot_name_id: u32,
    /// Unparsed slot payload (shadow flags, uv density and the like)
    pub unknown: Vec<u8>,

    // resolved after reading
    pub slot_name: String,
    pub asset_name: String,
    pub class_name: String,
    pub asset_path: String,
    /// Package paths of textures referenced by this material, filled by
    /// [`Material::load_asset`]
    pub texture_asset_paths: Vec<String>,
}

impl Material {
    /// Serialized slot size for the given version and mesh kind.
    pub fn byte_size(version: &VersionInfo, skeletal: bool) -> usize {
        36 + 4 * (skeletal && version.caps().skeletal_material_extra) as usize
    }

    pub fn read<R: Read + Seek>(
        r: &mut Reader<R>,
        version: &VersionInfo,
        skeletal: bool,
    ) -> Result<Self> {
        let import_id = r.read_i32()?;
        let slot_name_id = r.read_u32()?;
        let unknown = r.read_bytes(Self::byte_size(version, skeletal) - 8)?;
        Ok(Self { import_id, slot_name_id, unknown, ..Default::default() })
    }

    pub fn write<W: Write + Seek>(&self, w: &mut Writer<W>) -> Result<()> {
        w.write_i32(self.import_id)?;
        w.write_u32(self.slot_name_id)?;
        w.write_bytes(&self.unknown)
    }

    /// Copy for a freshly added slot.
    pub fn duplicate(&self) -> Self {
        Self {
            import_id: self.import_id,
            slot_name_id: self.slot_name_id,
            unknown: self.unknown.clone(),
            ..Default::default()
        }
    }

    /// Resolve slot and asset names against the container tables.
    pub fn resolve_all(
        materials: &mut [Material],
        names: &NameTable,
        imports: &[ImportRecord],
    ) -> Result<()> {
        for mat in materials {
            mat.slot_name = names.get(mat.slot_name_id)?.to_string();
            if mat.import_id != 0 {
                let imp = import_by_ref(imports, mat.import_id)
                    .ok_or_else(|| Error::other("material references a missing import"))?;
                mat.asset_name = imp.name_str.clone();
                mat.class_name = imp.class_str.clone();
                mat.asset_path = imp.parent_name.clone();
            } else {
                mat.asset_name = mat.slot_name.clone();
                mat.class_name = "None".to_string();
                mat.asset_path = "None".to_string();
            }
        }
        Ok(())
    }

    /// Best-effort texture path lookup through the material's own container.
    ///
    /// Failure is not fatal: the slot just ends up with no texture paths and
    /// a warning, since a missing companion material file should not abort a
    /// mesh load.
    pub fn load_asset(
        &mut self,
        main_file_path: &Path,
        main_asset_path: &str,
        version: &VersionInfo,
    ) -> Result<()> {
        if self.asset_path == "None" {
            return Ok(());
        }
        let file_path = actual_path(&self.asset_path, main_asset_path, main_file_path);
        if !file_path.exists() {
            warn!("material file not found: {}", file_path.display());
            self.texture_asset_paths.clear();
            return Ok(());
        }
        match Uasset::open_opts(&file_path, &version.to_string(), true, "Material") {
            Ok(asset) => {
                self.texture_asset_paths = asset
                    .imports
                    .iter()
                    .filter(|imp| imp.class_str.contains("Texture"))
                    .map(|imp| imp.parent_name.clone())
                    .collect();
            }
            Err(err) => {
                warn!("failed to load material asset {}: {err}", file_path.display());
                self.texture_asset_paths.clear();
            }
        }
        Ok(())
    }
}

/// Map an in-engine package path to a file path relative to the loaded file.
pub fn actual_path(target_asset_path: &str, source_asset_path: &str, source_file: &Path) -> std::path::PathBuf {
    let source_dir = Path::new(source_asset_path).parent().unwrap_or(Path::new(""));
    let target = Path::new(target_asset_path);
    let target_dir = target.parent().unwrap_or(Path::new(""));
    let rel = pathdiff(target_dir, source_dir);
    let base = format!(
        "{}.uasset",
        target.file_name().and_then(|n| n.to_str()).unwrap_or_default()
    );
    let mut out = source_file.parent().unwrap_or(Path::new("")).to_path_buf();
    out.push(rel);
    out.push(base);
    out
}

/// Minimal relative-path computation for the slash-rooted engine paths.
fn pathdiff(target: &Path, base: &Path) -> std::path::PathBuf {
    let target: Vec<_> = target.components().collect();
    let base: Vec<_> = base.components().collect();
    let common = target
        .iter()
        .zip(base.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let mut out = std::path::PathBuf::new();
    for _ in common..base.len() {
        out.push("..");
    }
    for comp in &target[common..] {
        out.push(comp);
    }
    out
}

/// Scan forward until the material import back-reference pattern is found,
/// leaving the cursor at the slot-count word.
fn seek_materials<R: Read + Seek>(
    r: &mut Reader<R>,
    imports: &[ImportRecord],
    material_size: usize,
) -> Result<()> {
    let has_material = imports.iter().any(|imp| imp.is_material());
    let size = r.size()?;
    let mut window = r.read_bytes(3)?;
    loop {
        while window != [0xFF, 0xFF, 0xFF] {
            if !window.contains(&0xFF) {
                window = r.read_bytes(3)?;
            } else {
                window.remove(0);
                window.push(r.read_u8()?);
            }
            if r.pos() == size {
                return Err(Error::parse(r.pos(), "material properties not found"));
            }
        }
        r.seek_relative(-4)?;
        let import_id = -r.read_i32()? - 1;
        if (import_id as usize) < imports.len() && imports[import_id as usize].is_material() {
            break;
        }
        if import_id == 0 && !has_material {
            break;
        }
        window.remove(0);
        window.push(r.read_u8()?);
    }
    if has_material {
        r.seek_relative(-8)?;
    } else {
        // no material imports at all: walk back over the slot array until
        // its count word is found
        r.seek_relative(-20)?;
        let mut num = 0u32;
        loop {
            let value = r.read_u32()?;
            if value == num && num != 0 {
                break;
            }
            r.seek_relative(-4 - material_size as i64)?;
            num += 1;
        }
        r.seek_relative(-4)?;
    }
    Ok(())
}

/// Skip the opaque property region and read the material slot array.
///
/// Returns the opaque bytes and the resolved materials.
pub fn read_materials<R: Read + Seek>(
    r: &mut Reader<R>,
    version: &VersionInfo,
    names: &NameTable,
    imports: &[ImportRecord],
    skeletal: bool,
) -> Result<(Vec<u8>, Vec<Material>)> {
    let start = r.pos();
    let material_size = Material::byte_size(version, skeletal);
    seek_materials(r, imports, material_size)?;
    let unknown_size = (r.pos() - start) as usize;
    r.seek(start)?;
    let unknown = r.read_bytes(unknown_size)?;

    let offset = r.pos();
    let count = r.read_u32()? as usize;
    if count == 0 {
        return Err(Error::parse(offset, "material slot array is empty"));
    }
    let mut materials = Vec::with_capacity(count);
    for _ in 0..count {
        materials.push(Material::read(r, version, skeletal)?);
    }
    Material::resolve_all(&mut materials, names, imports)?;
    debug!(count = materials.len(), offset, "materials");
    Ok((unknown, materials))
}

/// Three-pass slot assignment for caller materials.
///
/// Pass 1 matches by slot name, pass 2 by asset name, pass 3 by asset name
/// with a trailing `.NNN` suffix stripped. Matching is greedy: a claimed
/// source slot is never reused. Whatever is left claims the next unused
/// slot, extending past the source count when necessary (the caller decides
/// whether extension is legal for the mesh kind).
pub fn assign_materials(source: &[Material], caller: &[MaterialInfo]) -> Vec<u32> {
    let mut new_ids: Vec<u32> = (0..caller.len() as u32).collect();
    let mut claimed_source = vec![false; source.len()];
    let mut assigned_caller = vec![false; caller.len()];

    let assign = |source_names: &[&str],
                      caller_names: &[String],
                      claimed_source: &mut Vec<bool>,
                      assigned_caller: &mut Vec<bool>,
                      new_ids: &mut Vec<u32>| {
        for (i, name) in caller_names.iter().enumerate() {
            if assigned_caller[i] {
                continue;
            }
            if let Some(id) = source_names.iter().position(|n| n == name) {
                if !claimed_source[id] {
                    new_ids[i] = id as u32;
                    assigned_caller[i] = true;
                    claimed_source[id] = true;
                }
            }
        }
    };

    let source_slots: Vec<&str> = source.iter().map(|m| m.slot_name.as_str()).collect();
    let caller_slots: Vec<String> = caller.iter().map(|m| m.slot_name.clone()).collect();
    assign(&source_slots, &caller_slots, &mut claimed_source, &mut assigned_caller, &mut new_ids);

    let source_assets: Vec<&str> = source.iter().map(|m| m.asset_name.as_str()).collect();
    let caller_assets: Vec<String> = caller.iter().map(|m| m.asset_name.clone()).collect();
    assign(&source_assets, &caller_assets, &mut claimed_source, &mut assigned_caller, &mut new_ids);

    let stripped: Vec<String> = caller_assets.iter().map(|n| strip_suffix(n)).collect();
    assign(&source_assets, &stripped, &mut claimed_source, &mut assigned_caller, &mut new_ids);

    for i in 0..caller.len() {
        if assigned_caller[i] {
            continue;
        }
        assigned_caller[i] = true;
        let id = match claimed_source.iter().position(|c| !c) {
            Some(id) => {
                claimed_source[id] = true;
                id
            }
            None => {
                claimed_source.push(true);
                claimed_source.len() - 1
            }
        };
        new_ids[i] = id as u32;
    }

    for (i, mat) in caller.iter().enumerate() {
        if (new_ids[i] as usize) < source.len() {
            debug!(
                "assigned {} to {}",
                mat.asset_name, source[new_ids[i] as usize].asset_name
            );
        } else {
            debug!("added {} to material slots", mat.asset_name);
        }
    }
    new_ids
}

/// Strip a numeric `.NNN` disambiguation suffix, if present.
fn strip_suffix(name: &str) -> String {
    if name.len() >= 4 {
        let bytes = name.as_bytes();
        let dot = name.len() - 4;
        if bytes[dot] == b'.' && name[dot + 1..].bytes().all(|b| b.is_ascii_digit()) {
            return name[..dot].to_string();
        }
    }
    name.to_string()
}
