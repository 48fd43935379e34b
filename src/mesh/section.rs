//! LOD sections: one material's contiguous vertex/index range.
//!
//! Section ranges partition the LOD buffers in order. Skinned sections also
//! carry a bone palette mapping section-local joint indices onto skeleton
//! bone indices.

use std::io::{Read, Seek, Write};

use crate::util::version::V5_0;
use crate::util::{Reader, Result, VersionInfo, Writer};

/// Section of a static mesh LOD.
#[derive(Debug, Clone, Default)]
pub struct StaticSection {
    pub material_id: u32,
    pub first_index_id: u32,
    pub face_count: u32,
    pub first_vertex_id: u32,
    pub last_vertex_id: u32,
    pub enable_collision: u32,
    pub cast_shadow: u32,
    /// Two extra flags on newer versions (force opaque, ray tracing)
    pub extra: Option<[u32; 2]>,
}

impl StaticSection {
    pub fn read<R: Read + Seek>(r: &mut Reader<R>, version: &VersionInfo) -> Result<Self> {
        let material_id = r.read_u32()?;
        let first_index_id = r.read_u32()?;
        let face_count = r.read_u32()?;
        let first_vertex_id = r.read_u32()?;
        let last_vertex_id = r.read_u32()?;
        let enable_collision = r.read_u32()?;
        let cast_shadow = r.read_u32()?;
        let extra = if version.caps().static_section_extra {
            Some([r.read_u32()?, r.read_u32()?])
        } else {
            None
        };
        Ok(Self {
            material_id,
            first_index_id,
            face_count,
            first_vertex_id,
            last_vertex_id,
            enable_collision,
            cast_shadow,
            extra,
        })
    }

    pub fn write<W: Write + Seek>(&self, w: &mut Writer<W>) -> Result<()> {
        w.write_u32(self.material_id)?;
        w.write_u32(self.first_index_id)?;
        w.write_u32(self.face_count)?;
        w.write_u32(self.first_vertex_id)?;
        w.write_u32(self.last_vertex_id)?;
        w.write_u32(self.enable_collision)?;
        w.write_u32(self.cast_shadow)?;
        if let Some(extra) = self.extra {
            w.write_u32(extra[0])?;
            w.write_u32(extra[1])?;
        }
        Ok(())
    }

    /// Overwrite the range fields from a rebuilt buffer layout.
    pub fn import(
        &mut self,
        material_id: u32,
        first_vertex_id: u32,
        vertex_count: u32,
        first_index_id: u32,
        face_count: u32,
    ) {
        self.material_id = material_id;
        self.first_index_id = first_index_id;
        self.face_count = face_count;
        self.first_vertex_id = first_vertex_id;
        self.last_vertex_id = first_vertex_id + vertex_count - 1;
    }
}

/// Section of a skeletal mesh LOD (pre-split-buffer layout).
#[derive(Debug, Clone, Default)]
pub struct SkeletalSection {
    pub material_id: u16,
    pub first_index_id: u32,
    pub face_count: u32,
    pub unknown_byte: u8,
    pub recompute_tangent: u32,
    pub cast_shadow: u32,
    pub first_vertex_id: u32,
    /// Bone palette: section-local joint index -> skeleton bone index
    pub vertex_group: Vec<u16>,
    pub vertex_count: u32,
    pub max_bone_influences: u32,
    /// Extra per-section block carried by the customized variants
    pub kdi_flag: Option<u32>,
    pub kdi_data: Vec<u8>,
}

impl SkeletalSection {
    const CLOTH_ASSET_SENTINEL: [u8; 2] = [0xCD, 0xCD];

    pub fn read<R: Read + Seek>(r: &mut Reader<R>, version: &VersionInfo) -> Result<Self> {
        let one = r.read_u16()?;
        r.check(one, 1, "section strip flags")?;
        let material_id = r.read_u16()?;
        let first_index_id = r.read_u32()?;
        let face_count = r.read_u32()?;
        r.expect_null("section padding")?;
        r.expect_bytes(&[0x00, 0xFF, 0xFF], "section sentinel")?;
        let unknown_byte = r.read_u8()?;
        let recompute_tangent = r.read_u32()?;
        let cast_shadow = r.read_u32()?;
        let first_vertex_id = r.read_u32()?;
        let vertex_group = r.read_u16_array()?;
        let vertex_count = r.read_u32()?;
        let max_bone_influences = r.read_u32()?;
        r.expect_null_array(3, "section cloth padding")?;
        r.expect_bytes(&Self::CLOTH_ASSET_SENTINEL, "cloth asset index")?;
        r.expect_null_array(4, "clothing section guid")?;
        let lod_index = r.read_i32()?;
        r.check(lod_index, -1, "clothing section lod index")?;

        let (kdi_flag, kdi_data) = if version.is_custom() {
            let flag = r.read_u32()?;
            let count = r.read_u32()?;
            r.check(flag == 1, count > 0, "per-section data flag")?;
            let data = r.read_bytes(count as usize * 16)?;
            (Some(flag), data)
        } else {
            (None, Vec::new())
        };

        Ok(Self {
            material_id,
            first_index_id,
            face_count,
            unknown_byte,
            recompute_tangent,
            cast_shadow,
            first_vertex_id,
            vertex_group,
            vertex_count,
            max_bone_influences,
            kdi_flag,
            kdi_data,
        })
    }

    pub fn write<W: Write + Seek>(&self, w: &mut Writer<W>) -> Result<()> {
        w.write_u16(1)?;
        w.write_u16(self.material_id)?;
        w.write_u32(self.first_index_id)?;
        w.write_u32(self.face_count)?;
        w.write_null()?;
        w.write_bytes(&[0x00, 0xFF, 0xFF])?;
        w.write_u8(self.unknown_byte)?;
        w.write_u32(self.recompute_tangent)?;
        w.write_u32(self.cast_shadow)?;
        w.write_u32(self.first_vertex_id)?;
        w.write_u16_array(&self.vertex_group, true)?;
        w.write_u32(self.vertex_count)?;
        w.write_u32(self.max_bone_influences)?;
        w.write_null_array(3)?;
        w.write_bytes(&Self::CLOTH_ASSET_SENTINEL)?;
        w.write_null_array(4)?;
        w.write_i32(-1)?;
        if let Some(flag) = self.kdi_flag {
            w.write_u32(flag)?;
            w.write_u32(self.kdi_data.len() as u32 / 16)?;
            w.write_bytes(&self.kdi_data)?;
        }
        Ok(())
    }

    /// Copy for a cloned trailing section; auxiliary per-vertex data does
    /// not survive the clone.
    pub fn duplicate(&self) -> Self {
        let mut out = self.clone();
        if out.kdi_flag.is_some() {
            out.kdi_flag = Some(0);
        }
        out.kdi_data = Vec::new();
        out
    }

    pub fn remove_kdi(&mut self) {
        if self.kdi_flag.is_some() {
            self.kdi_flag = Some(0);
        }
        self.kdi_data.clear();
    }

    /// Overwrite the range and palette fields from a rebuilt layout.
    #[allow(clippy::too_many_arguments)]
    pub fn import(
        &mut self,
        vertex_group: Vec<u16>,
        material_id: u16,
        first_vertex_id: u32,
        vertex_count: u32,
        first_index_id: u32,
        face_count: u32,
        max_bone_influences: u32,
    ) {
        self.material_id = material_id;
        self.vertex_group = vertex_group;
        self.first_index_id = first_index_id;
        self.face_count = face_count;
        self.first_vertex_id = first_vertex_id;
        self.vertex_count = vertex_count;
        self.max_bone_influences = max_bone_influences;
    }
}

/// Section of a skeletal mesh LOD (split-buffer layout, 4.27 and later).
#[derive(Debug, Clone, Default)]
pub struct SkeletalSection5 {
    pub material_id: u16,
    pub first_index_id: u32,
    pub face_count: u64,
    pub unknown_byte: u8,
    pub cast_shadow: u32,
    /// Present from 5.0 on
    pub ray_tracing: Option<u32>,
    pub first_vertex_id: u64,
    pub vertex_group: Vec<u16>,
    pub vertex_count: u32,
    pub max_bone_influences: u32,
    pub unknown_ids: Vec<u32>,
    pub unknown_vertex_data: Vec<u8>,
}

impl SkeletalSection5 {
    pub fn read<R: Read + Seek>(r: &mut Reader<R>, version: &VersionInfo) -> Result<Self> {
        let one = r.read_u16()?;
        r.check(one, 1, "section strip flags")?;
        let material_id = r.read_u16()?;
        let first_index_id = r.read_u32()?;
        let face_count = r.read_u64()?;
        let unknown_byte = r.read_u8()?;
        let cast_shadow = r.read_u32()?;
        let ray_tracing = if version.at_least(V5_0) {
            Some(r.read_u32()?)
        } else {
            None
        };
        let first_vertex_id = r.read_u64()?;
        let vertex_group = r.read_u16_array()?;
        let vertex_count = r.read_u32()?;
        let max_bone_influences = r.read_u32()?;
        r.expect_bytes(&[0xFF, 0xFF], "cloth asset index")?;
        r.expect_null_array(4, "clothing section guid")?;
        let lod_index = r.read_i32()?;
        r.check(lod_index, -1, "clothing section lod index")?;
        let unknown_ids = r.read_u32_array()?;
        r.expect_u32(vertex_count, "section vertex count")?;
        let unknown_vertex_data = r.read_bytes(vertex_count as usize * 8)?;
        r.expect_null("section tail")?;
        Ok(Self {
            material_id,
            first_index_id,
            face_count,
            unknown_byte,
            cast_shadow,
            ray_tracing,
            first_vertex_id,
            vertex_group,
            vertex_count,
            max_bone_influences,
            unknown_ids,
            unknown_vertex_data,
        })
    }

    pub fn write<W: Write + Seek>(&self, w: &mut Writer<W>) -> Result<()> {
        w.write_u16(1)?;
        w.write_u16(self.material_id)?;
        w.write_u32(self.first_index_id)?;
        w.write_u64(self.face_count)?;
        w.write_u8(self.unknown_byte)?;
        w.write_u32(self.cast_shadow)?;
        if let Some(ray_tracing) = self.ray_tracing {
            w.write_u32(ray_tracing)?;
        }
        w.write_u64(self.first_vertex_id)?;
        w.write_u16_array(&self.vertex_group, true)?;
        w.write_u32(self.vertex_count)?;
        w.write_u32(self.max_bone_influences)?;
        w.write_bytes(&[0xFF, 0xFF])?;
        w.write_null_array(4)?;
        w.write_i32(-1)?;
        w.write_u32_array(&self.unknown_ids, true)?;
        w.write_u32(self.vertex_count)?;
        w.write_bytes(&self.unknown_vertex_data)?;
        w.write_null()
    }

    pub fn duplicate(&self) -> Self {
        self.clone()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn import(
        &mut self,
        vertex_group: Vec<u16>,
        material_id: u16,
        first_vertex_id: u64,
        vertex_count: u32,
        first_index_id: u32,
        face_count: u64,
        max_bone_influences: u32,
    ) {
        self.material_id = material_id;
        self.vertex_group = vertex_group;
        self.first_index_id = first_index_id;
        self.face_count = face_count;
        self.first_vertex_id = first_vertex_id;
        self.vertex_count = vertex_count;
        self.max_bone_influences = max_bone_influences;
        self.unknown_vertex_data = vec![0; vertex_count as usize * 8];
    }
}
