//! Skeleton codecs.
//!
//! Bones serialize as a flat array of (name id, instance, parent index)
//! followed by a second pass of local TRS values and a redundant
//! name-to-index table that only exists as a consistency check. Parent and
//! child links are resolved by name rather than index, which tolerates
//! reordering between the stored skeleton and a caller-supplied one.

use std::io::{Read, Seek, Write};

use glam::{DQuat, DVec3};
use tracing::debug;

use crate::primitives::BonePrimitive;
use crate::uasset::NameTable;
use crate::util::{Reader, Result, VersionInfo, Writer};

/// One joint.
#[derive(Debug, Clone)]
pub struct Bone {
    /// Name table index; -1 marks a bone created by an import that has not
    /// been interned yet
    pub name_id: i32,
    /// Disambiguator appended as `.NNN` when the same base name recurs
    pub instance: i32,
    /// Parent bone index, -1 for the root
    pub parent: i32,
    pub name: String,
    pub parent_name: String,
    pub children: Vec<usize>,
    pub rotation: DQuat,
    pub position: DVec3,
    pub scale: DVec3,
}

impl Bone {
    fn new(name_id: i32, instance: i32, parent: i32) -> Self {
        Self {
            name_id,
            instance,
            parent,
            name: String::new(),
            parent_name: String::new(),
            children: Vec::new(),
            rotation: DQuat::IDENTITY,
            position: DVec3::ZERO,
            scale: DVec3::ONE,
        }
    }

    fn read<R: Read + Seek>(r: &mut Reader<R>) -> Result<Self> {
        let name_id = r.read_i32()?;
        let instance = r.read_i32()?;
        let parent = r.read_i32()?;
        Ok(Self::new(name_id, instance, parent))
    }

    fn write<W: Write + Seek>(&self, w: &mut Writer<W>) -> Result<()> {
        w.write_i32(self.name_id)?;
        w.write_i32(self.instance)?;
        w.write_i32(self.parent)
    }

    /// TRS values: rotation (x,y,z,w), position, scale. Float width is a
    /// property of the asset version.
    fn read_trs<R: Read + Seek>(&mut self, r: &mut Reader<R>, version: &VersionInfo) -> Result<()> {
        let ary = if version.caps().wide_bone_floats {
            r.read_f64_array_len(10)?
        } else {
            r.read_f32_array_len(10)?.iter().map(|v| *v as f64).collect()
        };
        self.rotation = DQuat::from_xyzw(ary[0], ary[1], ary[2], ary[3]);
        self.position = DVec3::new(ary[4], ary[5], ary[6]);
        self.scale = DVec3::new(ary[7], ary[8], ary[9]);
        Ok(())
    }

    fn write_trs<W: Write + Seek>(&self, w: &mut Writer<W>, version: &VersionInfo) -> Result<()> {
        let ary = [
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
            self.rotation.w,
            self.position.x,
            self.position.y,
            self.position.z,
            self.scale.x,
            self.scale.y,
            self.scale.z,
        ];
        if version.caps().wide_bone_floats {
            w.write_f64_array(&ary)
        } else {
            let narrow: Vec<f32> = ary.iter().map(|v| *v as f32).collect();
            w.write_f32_array(&narrow)
        }
    }

    /// Copy caller-supplied data into this bone, keeping serialized ids.
    fn update(&mut self, src: &BonePrimitive) {
        self.rotation = src.rotation;
        self.position = src.position;
        self.scale = src.scale;
        self.name = src.name.clone();
        self.parent_name = src.parent.clone().unwrap_or_else(|| "None".to_string());
    }

    /// Make sure the bone's name exists in the name table.
    fn update_name_id(&mut self, names: &mut NameTable) {
        if self.name_id >= 0 {
            let _ = names.set(self.name_id as u32, &self.name);
        } else {
            self.name_id = names.intern(&self.name) as i32;
        }
    }
}

/// The shared bone-array codec body.
#[derive(Debug, Clone, Default)]
pub struct BoneArray {
    pub bones: Vec<Bone>,
}

impl BoneArray {
    pub fn read<R: Read + Seek>(r: &mut Reader<R>, version: &VersionInfo) -> Result<Self> {
        let count = r.read_u32()? as usize;
        let mut bones = Vec::with_capacity(count);
        for _ in 0..count {
            bones.push(Bone::read(r)?);
        }

        let trs_count = r.read_u32()? as usize;
        r.check(trs_count, bones.len(), "bone transform count")?;
        for bone in &mut bones {
            bone.read_trs(r, version)?;
        }

        // redundant name-to-index table, verified entry by entry
        let map_count = r.read_u32()? as usize;
        r.check(map_count, bones.len(), "bone name map count")?;
        for (i, bone) in bones.iter().enumerate() {
            let name_id = r.read_i32()?;
            r.check(name_id, bone.name_id, "bone name map id")?;
            let instance = r.read_i32()?;
            r.check(instance, bone.instance, "bone name map instance")?;
            let index = r.read_u32()?;
            r.check(index as usize, i, "bone name map index")?;
        }
        Ok(Self { bones })
    }

    pub fn write<W: Write + Seek>(&self, w: &mut Writer<W>, version: &VersionInfo) -> Result<()> {
        w.write_u32(self.bones.len() as u32)?;
        for bone in &self.bones {
            bone.write(w)?;
        }
        w.write_u32(self.bones.len() as u32)?;
        for bone in &self.bones {
            bone.write_trs(w, version)?;
        }
        w.write_u32(self.bones.len() as u32)?;
        for (i, bone) in self.bones.iter().enumerate() {
            w.write_i32(bone.name_id)?;
            w.write_i32(bone.instance)?;
            w.write_u32(i as u32)?;
        }
        Ok(())
    }

    /// Resolve bone names from the name table and link parents/children by
    /// name equality.
    pub fn name_bones(&mut self, names: &NameTable) -> Result<()> {
        for bone in &mut self.bones {
            let mut name = names.get(bone.name_id as u32)?.to_string();
            if bone.instance != 0 {
                name = format!("{name}.{:03}", bone.instance);
            }
            bone.name = name;
        }
        let by_index: Vec<String> = self.bones.iter().map(|b| b.name.clone()).collect();
        for bone in &mut self.bones {
            bone.parent_name = if bone.parent >= 0 {
                by_index[bone.parent as usize].clone()
            } else {
                "None".to_string()
            };
        }
        self.record_children();
        Ok(())
    }

    fn record_children(&mut self) {
        let names: Vec<String> = self.bones.iter().map(|b| b.name.clone()).collect();
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); self.bones.len()];
        for (i, bone) in self.bones.iter().enumerate() {
            if bone.parent_name == "None" {
                continue;
            }
            if let Some(parent) = names.iter().position(|n| *n == bone.parent_name) {
                children[parent].push(i);
            }
        }
        for (bone, c) in self.bones.iter_mut().zip(children) {
            bone.children = c;
        }
    }

    /// Recompute every parent index from parent names.
    fn update_parent_ids(&mut self) {
        let names: Vec<String> = self.bones.iter().map(|b| b.name.clone()).collect();
        for bone in &mut self.bones {
            bone.parent = if bone.parent_name == "None" {
                -1
            } else {
                names
                    .iter()
                    .position(|n| *n == bone.parent_name)
                    .map_or(-1, |i| i as i32)
            };
        }
    }

    /// Bone index by name, if present.
    pub fn bone_id(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    /// Export bones in collaborator shape.
    pub fn to_primitives(&self) -> Vec<BonePrimitive> {
        self.bones
            .iter()
            .map(|b| BonePrimitive {
                name: b.name.clone(),
                parent: (b.parent_name != "None").then(|| b.parent_name.clone()),
                rotation: b.rotation,
                position: b.position,
                scale: b.scale,
            })
            .collect()
    }
}

/// Skeleton embedded in a skeletal mesh export.
#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    pub array: BoneArray,
}

impl Skeleton {
    pub fn read<R: Read + Seek>(r: &mut Reader<R>, version: &VersionInfo) -> Result<Self> {
        Ok(Self { array: BoneArray::read(r, version)? })
    }

    pub fn write<W: Write + Seek>(&self, w: &mut Writer<W>, version: &VersionInfo) -> Result<()> {
        self.array.write(w, version)
    }

    pub fn bones(&self) -> &[Bone] {
        &self.array.bones
    }

    /// Replace bone data pairwise with caller bones; extra caller bones are
    /// appended, extra stored bones are dropped. Parent indices are
    /// recomputed for the merged array afterwards.
    pub fn import_bones(&mut self, incoming: &[BonePrimitive], names: &mut NameTable) {
        let old = self.array.bones.len();
        while self.array.bones.len() < incoming.len() {
            self.array.bones.push(Bone::new(-1, 0, -1));
        }
        for (bone, src) in self.array.bones.iter_mut().zip(incoming) {
            bone.update(src);
        }
        self.array.bones.truncate(incoming.len());
        debug!(from = old, to = self.array.bones.len(), "updated skeleton");

        for bone in &mut self.array.bones {
            bone.update_name_id(names);
        }
        self.array.update_parent_ids();
    }
}

/// Skeleton stored as its own asset (`*_Skeleton.uexp`).
///
/// The export begins with an opaque property block; the bone array is found
/// by scanning for the `FF FF FF FF` marker that precedes it.
#[derive(Debug, Clone)]
pub struct SkeletonAsset {
    /// Opaque bytes before the bone array
    pub head: Vec<u8>,
    pub array: BoneArray,
}

impl SkeletonAsset {
    pub fn read<R: Read + Seek>(
        r: &mut Reader<R>,
        version: &VersionInfo,
        names: &NameTable,
    ) -> Result<Self> {
        let start = r.pos();
        r.scan(&[0xFF, 0xFF, 0xFF, 0xFF], Some(500_000))?;
        if r.pos() < start + 16 {
            return Err(crate::util::Error::parse(r.pos(), "bone array marker too early"));
        }
        let head_size = r.pos() - 16 - start;
        r.seek(start)?;
        let head = r.read_bytes(head_size as usize)?;

        let mut array = BoneArray::read(r, version)?;
        array.name_bones(names)?;
        Ok(Self { head, array })
    }

    pub fn write<W: Write + Seek>(&self, w: &mut Writer<W>, version: &VersionInfo) -> Result<()> {
        w.write_bytes(&self.head)?;
        self.array.write(w, version)
    }

    /// Merge caller bones by name: matches update in place, unmatched caller
    /// bones are appended as new bones (names interned), then parent indices
    /// are recomputed.
    pub fn import_bones(&mut self, incoming: &[BonePrimitive], names: &mut NameTable) {
        let old = self.array.bones.len();
        for src in incoming {
            if let Some(id) = self.array.bone_id(&src.name) {
                self.array.bones[id].update(src);
            } else {
                let mut bone = Bone::new(-1, 0, -1);
                bone.update(src);
                bone.update_name_id(names);
                self.array.bones.push(bone);
            }
        }
        self.array.update_parent_ids();
        debug!(from = old, to = self.array.bones.len(), "updated skeleton");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::VersionInfo;
    use std::io::Cursor;

    fn names_with(bones: &[&str]) -> NameTable {
        let mut names = NameTable::default();
        for b in bones {
            names.intern(b);
        }
        names
    }

    fn sample_array() -> BoneArray {
        let mut root = Bone::new(0, 0, -1);
        root.position = DVec3::new(0.0, 0.0, 1.0);
        let spine = Bone::new(1, 0, 0);
        let spine_dup = Bone::new(1, 1, 0);
        BoneArray { bones: vec![root, spine, spine_dup] }
    }

    #[test]
    fn test_round_trip_f32() -> Result<()> {
        let version = VersionInfo::parse("4.18")?;
        let array = sample_array();

        let mut w = Writer::new(Cursor::new(Vec::new()));
        array.write(&mut w, &version)?;
        let buf = w.into_inner().into_inner();
        // 3 counts + 3 * (12 id bytes + 40 trs bytes + 12 map bytes)
        assert_eq!(buf.len(), 12 + 3 * (12 + 40 + 12));

        let mut r = Reader::new(Cursor::new(buf));
        let back = BoneArray::read(&mut r, &version)?;
        assert_eq!(back.bones.len(), 3);
        assert_eq!(back.bones[0].position, DVec3::new(0.0, 0.0, 1.0));
        Ok(())
    }

    #[test]
    fn test_round_trip_f64() -> Result<()> {
        let version = VersionInfo::parse("5.0")?;
        let array = sample_array();
        let mut w = Writer::new(Cursor::new(Vec::new()));
        array.write(&mut w, &version)?;
        let buf = w.into_inner().into_inner();
        assert_eq!(buf.len(), 12 + 3 * (12 + 80 + 12));
        let mut r = Reader::new(Cursor::new(buf));
        let back = BoneArray::read(&mut r, &version)?;
        assert_eq!(back.bones[2].instance, 1);
        Ok(())
    }

    #[test]
    fn test_name_bones_instance_suffix() -> Result<()> {
        let names = names_with(&["Root", "Spine"]);
        let mut array = sample_array();
        array.name_bones(&names)?;
        assert_eq!(array.bones[0].name, "Root");
        assert_eq!(array.bones[1].name, "Spine");
        assert_eq!(array.bones[2].name, "Spine.001");
        assert_eq!(array.bones[1].parent_name, "Root");
        assert_eq!(array.bones[0].children, vec![1, 2]);
        Ok(())
    }

    #[test]
    fn test_skeleton_asset_merge_by_name() -> Result<()> {
        let mut names = names_with(&["Root", "Spine"]);
        let mut array = BoneArray {
            bones: vec![Bone::new(0, 0, -1), Bone::new(1, 0, 0)],
        };
        array.name_bones(&names)?;
        let mut asset = SkeletonAsset { head: Vec::new(), array };

        let incoming = vec![
            BonePrimitive {
                name: "Spine".into(),
                parent: Some("Root".into()),
                rotation: DQuat::IDENTITY,
                position: DVec3::new(9.0, 0.0, 0.0),
                scale: DVec3::ONE,
            },
            BonePrimitive {
                name: "Tail".into(),
                parent: Some("Spine".into()),
                rotation: DQuat::IDENTITY,
                position: DVec3::ZERO,
                scale: DVec3::ONE,
            },
        ];
        asset.import_bones(&incoming, &mut names);

        assert_eq!(asset.array.bones.len(), 3);
        assert_eq!(asset.array.bones[1].position.x, 9.0);
        let tail = &asset.array.bones[2];
        assert_eq!(tail.name, "Tail");
        assert_eq!(tail.parent, 1);
        assert!(names.find("Tail").is_some());
        Ok(())
    }
}
