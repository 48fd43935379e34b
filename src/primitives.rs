//! Plain nested-array model exchanged with external callers.
//!
//! The codecs decode buffers into these structures and accept them back for
//! injection. Everything here is deliberately free of file-format framing:
//! flat vertex arrays, section-contiguous ranges, names instead of indices.

use glam::{DQuat, DVec3, Vec3};
use smallvec::SmallVec;

/// Per-vertex joint influences. The engine weight format holds at most
/// eight, so callers supplying more are rejected before injection.
pub type Influences = SmallVec<[u8; 8]>;

/// Maximum joint influences one vertex may carry.
pub const MAX_BONE_INFLUENCES: usize = 8;

/// One material as known to the caller.
#[derive(Debug, Clone, Default)]
pub struct MaterialInfo {
    /// Slot name on the mesh (e.g. `slot_Body`)
    pub slot_name: String,
    /// Material asset object name (e.g. `MI_Body`, possibly `MI_Body.001`)
    pub asset_name: String,
    /// In-engine package path of the material asset
    pub asset_path: String,
}

/// One bone supplied by or handed to the caller.
#[derive(Debug, Clone)]
pub struct BonePrimitive {
    pub name: String,
    /// Parent bone name; `None` for the root
    pub parent: Option<String>,
    pub rotation: DQuat,
    pub position: DVec3,
    pub scale: DVec3,
}

/// Mesh data in collaborator shape.
///
/// Vertex-indexed arrays (`positions`, `normals`, `uv_maps`, `joints`,
/// `weights`) cover all sections back to back; `vertex_counts` gives the
/// per-section split. `indices` are section-local and re-based on import.
#[derive(Debug, Clone, Default)]
pub struct MeshPrimitives {
    pub materials: Vec<MaterialInfo>,
    /// Caller-side material index per section
    pub material_ids: Vec<u32>,
    pub positions: Vec<Vec3>,
    /// Packed tangent (3), bitangent sign (1), normal (3), padding (1)
    pub normals: Vec<[u8; 8]>,
    /// Per channel, one entry per vertex
    pub uv_maps: Vec<Vec<[f32; 2]>>,
    pub vertex_counts: Vec<u32>,
    /// Per section, vertex ids local to the section
    pub indices: Vec<Vec<u32>>,
    /// Per section bone palette: local index -> skeleton bone index
    pub vertex_groups: Vec<Vec<u16>>,
    /// Per vertex, palette-local joint indices (skinned meshes)
    pub joints: Vec<Influences>,
    /// Per vertex, weights normalized to 0..=255 (skinned meshes)
    pub weights: Vec<Influences>,
    pub bones: Vec<BonePrimitive>,
}

impl MeshPrimitives {
    /// Number of sections described by the caller.
    pub fn section_count(&self) -> usize {
        self.material_ids.len()
    }

    /// Total vertex count across sections.
    pub fn vertex_count(&self) -> usize {
        self.vertex_counts.iter().map(|c| *c as usize).sum()
    }

    /// Largest influence count any vertex carries, 0 when not skinned.
    pub fn max_influences(&self) -> usize {
        self.joints.iter().map(|j| j.len()).max().unwrap_or(0)
    }
}

/// Decoded animation for one bone, one sample per frame and attribute.
#[derive(Debug, Clone, Default)]
pub struct BoneTrackPrimitive {
    pub rotations: Vec<DQuat>,
    pub positions: Vec<DVec3>,
    pub scales: Vec<DVec3>,
}

/// Animation data in collaborator shape.
#[derive(Debug, Clone, Default)]
pub struct AnimPrimitives {
    /// Indexes into the skeleton's bone id array
    pub tracks: Vec<BoneTrackPrimitive>,
    pub frame_count: u32,
    pub sample_rate: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let prims = MeshPrimitives {
            material_ids: vec![0, 1],
            vertex_counts: vec![3, 5],
            joints: vec![Influences::from_slice(&[0, 1]), Influences::from_slice(&[2])],
            ..Default::default()
        };
        assert_eq!(prims.section_count(), 2);
        assert_eq!(prims.vertex_count(), 8);
        assert_eq!(prims.max_influences(), 2);
    }
}
