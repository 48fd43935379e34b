//! Mesh payloads: static and skeletal.
//!
//! A mesh export is an opaque property region, a material slot array, an
//! optional embedded skeleton, and an array of LODs. Injection replaces
//! LOD0 from caller primitives after material identity resolution; higher
//! LODs are dropped (single-LOD re-export).

pub mod buffer;
pub mod lod;
pub mod material;
pub mod section;

use std::io::{Read, Seek, Write};

use tracing::{debug, info};

use crate::mesh::lod::{SkeletalLod, StaticLod};
use crate::mesh::material::{assign_materials, read_materials, Material};
use crate::primitives::{MeshPrimitives, MAX_BONE_INFLUENCES};
use crate::skeleton::Skeleton;
use crate::uasset::{ImportRecord, NameTable};
use crate::util::{Error, Reader, Result, VersionInfo, Writer};
use crate::util::version::V4_27;

/// Reject caller data whose per-vertex influence count cannot be encoded.
fn check_influences(prims: &MeshPrimitives) -> Result<()> {
    let max = prims.max_influences();
    if max > MAX_BONE_INFLUENCES {
        return Err(Error::constraint(format!(
            "{max} bone influences per vertex exceed the engine limit of {MAX_BONE_INFLUENCES}"
        )));
    }
    Ok(())
}

/// Append a material slot plus the import records backing it.
///
/// The new slot clones the last one's payload; the material object and its
/// package directory each get an import record, and the file-data id array
/// grows by the new back-reference.
fn add_material_slot(
    materials: &mut Vec<Material>,
    src: &crate::primitives::MaterialInfo,
    names: &mut NameTable,
    imports: &mut Vec<ImportRecord>,
    file_data_ids: &mut Vec<i32>,
) -> Result<()> {
    let last = materials
        .last()
        .ok_or_else(|| Error::constraint("cannot extend an empty material slot list"))?;
    let last_import_id = last.import_id;

    let mut slot = last.duplicate();
    slot.import_id = -(imports.len() as i32) - 1;
    slot.slot_name_id = names.intern(&src.slot_name);
    slot.slot_name = src.slot_name.clone();
    slot.asset_name = src.asset_name.clone();
    slot.asset_path = src.asset_path.clone();
    materials.push(slot);
    file_data_ids.push(-(imports.len() as i32) - 1);

    let sample_material = crate::uasset::import_by_ref(imports, last_import_id)
        .ok_or_else(|| Error::other("material slot references a missing import"))?
        .clone();
    let sample_dir = crate::uasset::import_by_ref(imports, sample_material.parent_import_id)
        .ok_or_else(|| Error::other("material import has no parent package"))?
        .clone();

    let mut material_import = sample_material;
    material_import.name.index = names.intern(&src.asset_name);
    material_import.name_str = src.asset_name.clone();
    imports.push(material_import);
    let material_slot = imports.len() - 1;
    imports[material_slot].parent_import_id = -(imports.len() as i32) - 1;

    let mut dir_import = sample_dir;
    dir_import.name.index = names.intern(&src.asset_path);
    dir_import.name_str = src.asset_path.clone();
    imports.push(dir_import);

    info!("added a material slot for {}", src.asset_name);
    Ok(())
}

/// Static mesh payload.
#[derive(Debug, Clone)]
pub struct StaticMesh {
    /// Opaque property region before the LOD array
    pub head: Vec<u8>,
    pub lods: Vec<StaticLod>,
    /// Opaque region between the LOD array and the material slots
    pub mid: Vec<u8>,
    pub materials: Vec<Material>,
}

impl StaticMesh {
    /// LOD array sentinel inside the static mesh property region.
    const LOD_SENTINEL: [u8; 6] = [0x01, 0x00, 0x01, 0x00, 0x00, 0x00];

    pub fn read<R: Read + Seek>(
        r: &mut Reader<R>,
        version: &VersionInfo,
        names: &NameTable,
        imports: &[ImportRecord],
    ) -> Result<Self> {
        let start = r.pos();
        r.scan(&Self::LOD_SENTINEL, None)?;
        let head_size = (r.pos() - start) as usize + 28;
        r.seek(start)?;
        let head = r.read_bytes(head_size)?;

        let lod_count = r.read_u32()? as usize;
        let mut lods = Vec::with_capacity(lod_count);
        for _ in 0..lod_count {
            lods.push(StaticLod::read(r, version)?);
        }

        let (mid, materials) = read_materials(r, version, names, imports, false)?;
        Ok(Self { head, lods, mid, materials })
    }

    pub fn write<W: Write + Seek>(&self, w: &mut Writer<W>) -> Result<()> {
        w.write_bytes(&self.head)?;
        w.write_u32(self.lods.len() as u32)?;
        for lod in &self.lods {
            lod.write(w)?;
        }
        w.write_bytes(&self.mid)?;
        w.write_u32(self.materials.len() as u32)?;
        for mat in &self.materials {
            mat.write(w)?;
        }
        Ok(())
    }

    /// Decode LOD0 into collaborator shape, with materials attached.
    pub fn parse_primitives(&self) -> Result<MeshPrimitives> {
        let lod = self
            .lods
            .first()
            .ok_or_else(|| Error::other("static mesh has no LODs"))?;
        let mut prims = lod.parse_primitives();
        prims.materials = self
            .materials
            .iter()
            .map(|m| crate::primitives::MaterialInfo {
                slot_name: m.slot_name.clone(),
                asset_name: m.asset_name.clone(),
                asset_path: m.asset_path.clone(),
            })
            .collect();
        Ok(prims)
    }

    /// Replace LOD0 with caller geometry. A static mesh cannot gain
    /// material slots.
    pub fn import_primitives(&mut self, prims: &MeshPrimitives) -> Result<()> {
        check_influences(prims)?;
        let new_ids = assign_materials(&self.materials, &prims.materials);
        if self.materials.len() < prims.materials.len() {
            return Err(Error::constraint(format!(
                "cannot add material slots to a static mesh (have {}, caller supplied {})",
                self.materials.len(),
                prims.materials.len()
            )));
        }
        self.remove_extra_lods();
        let lod = self
            .lods
            .first_mut()
            .ok_or_else(|| Error::other("static mesh has no LODs"))?;
        lod.import(prims);
        lod.update_material_ids(&new_ids);
        Ok(())
    }

    /// Drop every LOD beyond the first.
    pub fn remove_extra_lods(&mut self) {
        if self.lods.len() > 1 {
            debug!(removed = self.lods.len() - 1, "removed extra LODs");
            self.lods.truncate(1);
        }
    }
}

/// Extra low-poly mesh block carried by one customized variant.
///
/// Removing its buffers does not affect collision, so injection empties it.
#[derive(Debug, Clone)]
pub struct ExtraMesh {
    pub positions: Vec<u8>,
    pub weights: Vec<u8>,
    pub indices: Vec<u8>,
    pub tail: [u8; 8],
}

impl ExtraMesh {
    pub fn read<R: Read + Seek>(r: &mut Reader<R>) -> Result<Self> {
        let vertex_count = r.read_u32()? as usize;
        let positions = r.read_bytes(vertex_count * 12)?;
        r.expect_u32(vertex_count as u32, "extra mesh vertex count")?;
        let weights = r.read_bytes(vertex_count * 12)?;
        let face_count = r.read_u32()? as usize;
        let indices = r.read_bytes(face_count * 6)?;
        let tail = r.read_array::<8>()?;
        Ok(Self { positions, weights, indices, tail })
    }

    pub fn write<W: Write + Seek>(&self, w: &mut Writer<W>) -> Result<()> {
        let vertex_count = self.positions.len() as u32 / 12;
        w.write_u32(vertex_count)?;
        w.write_bytes(&self.positions)?;
        w.write_u32(vertex_count)?;
        w.write_bytes(&self.weights)?;
        w.write_u32(self.indices.len() as u32 / 6)?;
        w.write_bytes(&self.indices)?;
        w.write_bytes(&self.tail)
    }

    pub fn disable(&mut self) {
        self.positions.clear();
        self.weights.clear();
        self.indices.clear();
    }
}

/// Skeletal mesh payload.
#[derive(Debug, Clone)]
pub struct SkeletalMesh {
    /// Opaque property region before the material slots
    pub head: Vec<u8>,
    pub materials: Vec<Material>,
    pub skeleton: Skeleton,
    pub lods: Vec<SkeletalLod>,
    pub extra_mesh: Option<ExtraMesh>,
    at_least_4_27: bool,
    ff7r: bool,
}

impl SkeletalMesh {
    /// Assemble a skeletal mesh payload from parts, for building an asset
    /// from scratch.
    pub fn assemble(
        version: &VersionInfo,
        head: Vec<u8>,
        materials: Vec<Material>,
        skeleton: Skeleton,
        lods: Vec<SkeletalLod>,
        extra_mesh: Option<ExtraMesh>,
    ) -> Self {
        Self {
            head,
            materials,
            skeleton,
            lods,
            extra_mesh,
            at_least_4_27: version.at_least(V4_27),
            ff7r: version.is_ff7r(),
        }
    }

    pub fn read<R: Read + Seek>(
        r: &mut Reader<R>,
        version: &VersionInfo,
        names: &NameTable,
        imports: &[ImportRecord],
    ) -> Result<Self> {
        let (head, materials) = read_materials(r, version, names, imports, true)?;

        let mut skeleton = Skeleton::read(r, version)?;
        skeleton.array.name_bones(names)?;

        if version.at_least(V4_27) {
            r.expect_u32(1, "skeletal mesh sentinel")?;
        }

        let lod_count = r.read_u32()? as usize;
        let mut lods = Vec::with_capacity(lod_count);
        for _ in 0..lod_count {
            lods.push(SkeletalLod::read(r, version)?);
        }

        let extra_mesh = if version.is_ff7r() {
            r.expect_u32(1, "extra mesh sentinel")?;
            Some(ExtraMesh::read(r)?)
        } else {
            None
        };

        Ok(Self {
            head,
            materials,
            skeleton,
            lods,
            extra_mesh,
            at_least_4_27: version.at_least(V4_27),
            ff7r: version.is_ff7r(),
        })
    }

    pub fn write<W: Write + Seek>(&self, w: &mut Writer<W>, version: &VersionInfo) -> Result<()> {
        w.write_bytes(&self.head)?;
        w.write_u32(self.materials.len() as u32)?;
        for mat in &self.materials {
            mat.write(w)?;
        }
        self.skeleton.write(w, version)?;
        if self.at_least_4_27 {
            w.write_u32(1)?;
        }
        w.write_u32(self.lods.len() as u32)?;
        for lod in &self.lods {
            lod.write(w)?;
        }
        if self.ff7r {
            w.write_u32(1)?;
            if let Some(extra_mesh) = &self.extra_mesh {
                extra_mesh.write(w)?;
            }
        }
        Ok(())
    }

    /// Decode LOD0 into collaborator shape, with materials and bones.
    pub fn parse_primitives(&self) -> Result<MeshPrimitives> {
        let lod = self
            .lods
            .first()
            .ok_or_else(|| Error::other("skeletal mesh has no LODs"))?;
        let mut prims = lod.parse_primitives();
        prims.materials = self
            .materials
            .iter()
            .map(|m| crate::primitives::MaterialInfo {
                slot_name: m.slot_name.clone(),
                asset_name: m.asset_name.clone(),
                asset_path: m.asset_path.clone(),
            })
            .collect();
        prims.bones = self.skeleton.array.to_primitives();
        Ok(prims)
    }

    /// Replace LOD0 (and optionally the skeleton) with caller data.
    ///
    /// With `only_mesh` the caller skeleton must match the stored one in
    /// bone count; otherwise the skeleton is replaced first. Unmatched
    /// caller materials extend the slot list.
    pub fn import_primitives(
        &mut self,
        prims: &MeshPrimitives,
        names: &mut NameTable,
        imports: &mut Vec<ImportRecord>,
        file_data_ids: &mut Vec<i32>,
        only_mesh: bool,
    ) -> Result<()> {
        check_influences(prims)?;
        if only_mesh && prims.bones.len() != self.skeleton.bones().len() {
            return Err(Error::constraint(format!(
                "bone count mismatch (asset: {}, caller: {})",
                self.skeleton.bones().len(),
                prims.bones.len()
            )));
        }

        let new_ids = assign_materials(&self.materials, &prims.materials);
        if self.materials.len() < prims.materials.len() {
            let added = prims.materials.len() - self.materials.len();
            for _ in 0..added {
                let next_slot = self.materials.len() as u32;
                let caller_index = new_ids
                    .iter()
                    .position(|id| *id == next_slot)
                    .ok_or_else(|| Error::other("material assignment left a gap"))?;
                add_material_slot(
                    &mut self.materials,
                    &prims.materials[caller_index],
                    names,
                    imports,
                    file_data_ids,
                )?;
            }
            info!("added {added} material slots; edit the name table to use them");
        }

        if !only_mesh {
            self.skeleton.import_bones(&prims.bones, names);
            if let Some(extra_mesh) = &mut self.extra_mesh {
                extra_mesh.disable();
            }
        }

        self.remove_extra_lods();
        let lod = self
            .lods
            .first_mut()
            .ok_or_else(|| Error::other("skeletal mesh has no LODs"))?;
        lod.import(prims);
        lod.update_material_ids(&new_ids);
        Ok(())
    }

    /// Drop every LOD beyond the first.
    pub fn remove_extra_lods(&mut self) {
        if self.lods.len() > 1 {
            debug!(removed = self.lods.len() - 1, "removed extra LODs");
            self.lods.truncate(1);
        }
    }

    /// Strip the auxiliary per-vertex buffers of the customized variant.
    pub fn remove_kdi(&mut self) -> Result<()> {
        if !self.ff7r {
            return Err(Error::constraint("auxiliary buffers exist only in the ff7r variant"));
        }
        for lod in &mut self.lods {
            lod.remove_kdi();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{Influences, MaterialInfo};
    use glam::Vec3;

    fn caller_prims(materials: &[(&str, &str)], influences: usize) -> MeshPrimitives {
        let sections = materials.len();
        let total = sections * 3;
        MeshPrimitives {
            materials: materials
                .iter()
                .map(|(slot, asset)| MaterialInfo {
                    slot_name: slot.to_string(),
                    asset_name: asset.to_string(),
                    asset_path: "/Game/Materials".to_string(),
                })
                .collect(),
            material_ids: (0..sections as u32).collect(),
            positions: vec![Vec3::ZERO; total],
            normals: vec![[128; 8]; total],
            uv_maps: vec![vec![[0.0, 0.0]; total]],
            vertex_counts: vec![3; sections],
            indices: vec![vec![0, 1, 2]; sections],
            vertex_groups: vec![vec![0]; sections],
            joints: vec![Influences::from_vec(vec![0; influences]); total],
            weights: vec![Influences::from_vec(vec![255; influences]); total],
            ..Default::default()
        }
    }

    fn static_mesh(materials: &[(&str, &str)]) -> StaticMesh {
        StaticMesh {
            head: Vec::new(),
            lods: vec![StaticLod {
                unknown_byte: 0,
                sections: vec![Default::default()],
                flags: vec![0; 4],
                position_vb: Default::default(),
                vertex_data: lod::StaticVertexData::Combined(Default::default()),
                color_vb: Default::default(),
                ib: Default::default(),
                reversed_ib: Default::default(),
                depth_ib: Default::default(),
                reversed_depth_ib: Default::default(),
                adjacency_ib: Default::default(),
                tail: [0; 24],
            }],
            mid: Vec::new(),
            materials: materials
                .iter()
                .map(|(slot, asset)| Material {
                    slot_name: slot.to_string(),
                    asset_name: asset.to_string(),
                    ..Default::default()
                })
                .collect(),
        }
    }

    #[test]
    fn test_static_mesh_cannot_gain_slots() {
        let mut mesh = static_mesh(&[("s0", "Body")]);
        let mut prims = caller_prims(&[("s0", "Body"), ("s1", "Hair")], 0);
        prims.joints.clear();
        prims.weights.clear();
        let err = mesh.import_primitives(&prims).unwrap_err();
        assert!(matches!(err, Error::Constraint(_)));
    }

    #[test]
    fn test_influence_bound_rejected_before_mutation() {
        let mut mesh = static_mesh(&[("s0", "Body")]);
        let before = mesh.lods[0].position_vb.vertex_count();
        let prims = caller_prims(&[("s0", "Body")], 9);
        let err = mesh.import_primitives(&prims).unwrap_err();
        assert!(matches!(err, Error::Constraint(_)));
        assert_eq!(mesh.lods[0].position_vb.vertex_count(), before);
    }

    fn skeletal_mesh(materials: &[(&str, &str)], names: &mut NameTable) -> (SkeletalMesh, Vec<ImportRecord>) {
        use crate::mesh::lod::SkeletalLod4;
        use crate::skeleton::BoneArray;
        use crate::uasset::NameRef;

        let mut imports = Vec::new();
        let mut slots = Vec::new();
        for (slot, asset) in materials {
            let dir_id = names.intern("/Game/Materials");
            let asset_id = names.intern(asset);
            imports.push(ImportRecord {
                name: NameRef::new(dir_id),
                parent_import_id: 0,
                name_str: "/Game/Materials".to_string(),
                class_str: "Package".to_string(),
                ..Default::default()
            });
            let dir_index = imports.len() as i32;
            imports.push(ImportRecord {
                name: NameRef::new(asset_id),
                parent_import_id: -dir_index,
                name_str: asset.to_string(),
                class_str: "MaterialInstanceConstant".to_string(),
                ..Default::default()
            });
            slots.push(Material {
                import_id: -(imports.len() as i32),
                slot_name_id: names.intern(slot),
                slot_name: slot.to_string(),
                asset_name: asset.to_string(),
                ..Default::default()
            });
        }

        let mut skeleton = Skeleton { array: BoneArray::default() };
        skeleton.array.bones.push(crate::skeleton::Bone {
            name_id: names.intern("Root") as i32,
            instance: 0,
            parent: -1,
            name: "Root".to_string(),
            parent_name: "None".to_string(),
            children: Vec::new(),
            rotation: glam::DQuat::IDENTITY,
            position: glam::DVec3::ZERO,
            scale: glam::DVec3::ONE,
        });

        let mut lod = SkeletalLod4 {
            sections: vec![Default::default()],
            ib: Default::default(),
            active_bone_ids: vec![0],
            required_bone_ids: vec![0],
            vertex_map: Vec::new(),
            max_vertex_map_id: 0,
            uv_count: 1,
            vertex_vb: Default::default(),
            weight_vb: Default::default(),
            color_vb: None,
            tessellation_ib: None,
            kdi_buffer: None,
            kdi_vb: None,
        };
        lod.import(&caller_prims(materials, 1));

        let mesh = SkeletalMesh {
            head: Vec::new(),
            materials: slots,
            skeleton,
            lods: vec![SkeletalLod::V4(lod)],
            extra_mesh: None,
            at_least_4_27: false,
            ff7r: false,
        };
        (mesh, imports)
    }

    #[test]
    fn test_skeletal_mesh_extends_slots() {
        let mut names = NameTable::default();
        let (mut mesh, mut imports) = skeletal_mesh(&[("s_Body", "Body"), ("s_Face", "Face")], &mut names);
        let mut file_data_ids = Vec::new();
        let import_count = imports.len();

        let mut prims = caller_prims(
            &[("x", "Body"), ("y", "Face.001"), ("z", "Brand_New")],
            1,
        );
        prims.bones = mesh.skeleton.array.to_primitives();
        mesh.import_primitives(&prims, &mut names, &mut imports, &mut file_data_ids, true)
            .unwrap();

        // one genuinely new material: one slot, two imports, one file data id
        assert_eq!(mesh.materials.len(), 3);
        assert_eq!(imports.len(), import_count + 2);
        assert_eq!(file_data_ids.len(), 1);

        // the suffixed caller material landed on the existing Face slot
        if let SkeletalLod::V4(lod) = &mesh.lods[0] {
            assert_eq!(lod.sections[0].material_id, 0);
            assert_eq!(lod.sections[1].material_id, 1);
            assert_eq!(lod.sections[2].material_id, 2);
        } else {
            panic!("expected the older LOD layout");
        }
    }

    #[test]
    fn test_only_mesh_bone_count_check() {
        let mut names = NameTable::default();
        let (mut mesh, mut imports) = skeletal_mesh(&[("s_Body", "Body")], &mut names);
        let mut file_data_ids = Vec::new();
        let prims = caller_prims(&[("s_Body", "Body")], 1);
        // caller has no bones at all, asset has one
        let err = mesh
            .import_primitives(&prims, &mut names, &mut imports, &mut file_data_ids, true)
            .unwrap_err();
        assert!(matches!(err, Error::Constraint(_)));
    }

    #[test]
    fn test_static_mesh_import() {
        let mut mesh = static_mesh(&[("s0", "Body"), ("s1", "Face")]);
        let mut prims = caller_prims(&[("s1", "X"), ("s0", "Y")], 0);
        prims.joints.clear();
        prims.weights.clear();
        mesh.import_primitives(&prims).unwrap();
        // caller section 0 carries slot name s1, so it maps onto slot 1
        assert_eq!(mesh.lods[0].sections[0].material_id, 1);
        assert_eq!(mesh.lods[0].sections[1].material_id, 0);
    }
}
