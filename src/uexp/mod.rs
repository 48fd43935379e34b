//! Payload (.uexp) dispatcher.
//!
//! The payload file holds one byte region per export, in export-table
//! order. The single main export dispatches to a typed reader by class
//! name; every other export is kept as an opaque blob. After the last
//! export comes an encrypted author string of variable length and a fixed
//! 4-byte signature.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::anim::AnimSequence;
use crate::mesh::{SkeletalMesh, StaticMesh};
use crate::primitives::MeshPrimitives;
use crate::skeleton::SkeletonAsset;
use crate::texture::Texture;
use crate::uasset::{ExportRecord, ImportRecord, NameTable, PACKAGE_TAG};
use crate::util::{cipher, Error, OpaqueBlob, Reader, Result, VersionInfo, Writer};

/// Container-side context handed to the payload codecs.
pub struct PackageInfo<'a> {
    pub version: &'a VersionInfo,
    pub names: &'a NameTable,
    pub imports: &'a [ImportRecord],
    /// Container size; payload export offsets are relative to it
    pub uasset_size: u64,
    pub unversioned: bool,
    /// Class name of the main export
    pub asset_type: &'a str,
}

/// Typed payload of the main export.
#[derive(Debug, Clone)]
pub enum AssetPayload {
    SkeletalMesh(SkeletalMesh),
    StaticMesh(StaticMesh),
    Skeleton(SkeletonAsset),
    Texture(Texture),
    Anim(AnimSequence),
    /// Recognized main class kept verbatim (materials and the like)
    Opaque,
}

/// One loaded payload file.
#[derive(Debug)]
pub struct Uexp {
    pub payload: AssetPayload,
    /// Bytes of the main export past the typed payload
    pub trailer: OpaqueBlob,
    /// Encrypted author trailer as stored
    author_bytes: Vec<u8>,
    author: String,
}

impl Uexp {
    /// Wrap a typed payload built from scratch.
    pub fn new(payload: AssetPayload) -> Self {
        Self {
            payload,
            trailer: OpaqueBlob::default(),
            author_bytes: Vec::new(),
            author: String::new(),
        }
    }

    /// Read the payload file, filling ignored exports' blobs in place.
    pub fn read(path: &Path, info: &PackageInfo, exports: &mut [ExportRecord]) -> Result<Self> {
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        debug!("Loading {}", path.display());
        let f = File::open(path)?;
        let mut r = Reader::new(BufReader::new(f));
        let size = r.size()?;

        let mut payload = None;
        let mut trailer = OpaqueBlob::default();
        let export_count = exports.len();
        for export in exports.iter_mut() {
            r.check(
                r.pos() + info.uasset_size,
                export.offset as u64,
                "export offset",
            )?;
            if export.ignore {
                export.blob = Some(OpaqueBlob::new(r.pos(), r.read_bytes(export.size as usize)?));
                continue;
            }

            let parsed = match info.asset_type {
                "SkeletalMesh" => AssetPayload::SkeletalMesh(SkeletalMesh::read(
                    &mut r,
                    info.version,
                    info.names,
                    info.imports,
                )?),
                "StaticMesh" => AssetPayload::StaticMesh(StaticMesh::read(
                    &mut r,
                    info.version,
                    info.names,
                    info.imports,
                )?),
                "Skeleton" => {
                    AssetPayload::Skeleton(SkeletonAsset::read(&mut r, info.version, info.names)?)
                }
                t if t.contains("Texture") => {
                    if export_count != 1 {
                        return Err(Error::parse(r.pos(), "texture bundles hold a single export"));
                    }
                    let mut texture = Texture::read(&mut r, info)?;
                    texture.load_bulk(&path.with_extension("ubulk"))?;
                    AssetPayload::Texture(texture)
                }
                "AnimSequence" => AssetPayload::Anim(AnimSequence::read(&mut r, info)?),
                _ => AssetPayload::Opaque,
            };

            let end = export.offset as u64 + export.size - info.uasset_size;
            let remaining = (end - r.pos()) as usize;
            trailer = OpaqueBlob::new(r.pos(), r.read_bytes(remaining)?);
            payload = Some(parsed);
        }
        let payload =
            payload.ok_or_else(|| Error::unsupported("payload has no main export"))?;

        let author_bytes = r.read_bytes((size - r.pos() - 4) as usize)?;
        let author = cipher::decrypt(&author_bytes);
        if !author.is_empty() {
            debug!(author = %author, "embedded author string");
        }
        let mut foot = [0u8; 4];
        foot.copy_from_slice(&r.read_bytes(4)?);
        r.check(foot, PACKAGE_TAG, "payload signature")?;

        Ok(Self { payload, trailer, author_bytes, author })
    }

    /// Write the payload file (and the overflow file when required),
    /// updating every export's size and payload-local offset.
    ///
    /// Returns the payload byte count.
    pub fn save(&mut self, path: &Path, info: &PackageInfo, exports: &mut [ExportRecord]) -> Result<u64> {
        info!("Saving {}", path.display());
        let f = File::create(path)?;
        let mut w = Writer::new(BufWriter::new(f));

        for export in exports.iter_mut() {
            let offset = w.pos();
            let size = if export.ignore {
                let blob = export
                    .blob
                    .as_ref()
                    .ok_or_else(|| Error::other("ignored export lost its payload bytes"))?;
                w.write_bytes(&blob.bytes)?;
                export.size
            } else {
                match &mut self.payload {
                    AssetPayload::SkeletalMesh(mesh) => mesh.write(&mut w, info.version)?,
                    AssetPayload::StaticMesh(mesh) => mesh.write(&mut w)?,
                    AssetPayload::Skeleton(skeleton) => skeleton.write(&mut w, info.version)?,
                    AssetPayload::Texture(texture) => {
                        texture.write(&mut w, info)?;
                        texture.write_bulk(&path.with_extension("ubulk"))?;
                    }
                    AssetPayload::Anim(anim) => anim.write(&mut w)?,
                    AssetPayload::Opaque => {}
                }
                w.write_bytes(&self.trailer.bytes)?;
                w.pos() - offset
            };
            export.update(size, offset as u32);
        }

        w.write_bytes(&self.author_bytes)?;
        w.write_bytes(&PACKAGE_TAG)?;
        Ok(w.pos())
    }

    /// Decoded author string, empty when none was embedded.
    pub fn author(&self) -> &str {
        &self.author
    }

    /// Embed an author string into the trailer.
    pub fn embed_author(&mut self, text: &str) {
        self.author = text.to_string();
        self.author_bytes = cipher::encrypt(text);
        info!(size = self.author_bytes.len(), "embedded a string into the payload");
    }

    /// Inject caller mesh/skeleton primitives into the payload.
    pub fn import_primitives(
        &mut self,
        prims: &MeshPrimitives,
        names: &mut NameTable,
        imports: &mut Vec<ImportRecord>,
        file_data_ids: &mut Vec<i32>,
        only_mesh: bool,
    ) -> Result<()> {
        match &mut self.payload {
            AssetPayload::SkeletalMesh(mesh) => {
                mesh.import_primitives(prims, names, imports, file_data_ids, only_mesh)
            }
            AssetPayload::StaticMesh(mesh) => mesh.import_primitives(prims),
            AssetPayload::Skeleton(skeleton) => {
                if only_mesh {
                    return Err(Error::constraint(
                        "only-mesh injection requested but the asset has no mesh",
                    ));
                }
                skeleton.import_bones(&prims.bones, names);
                Ok(())
            }
            _ => Err(Error::constraint("injection is not supported for this asset type")),
        }
    }

    pub fn texture_mut(&mut self) -> Option<&mut Texture> {
        match &mut self.payload {
            AssetPayload::Texture(texture) => Some(texture),
            _ => None,
        }
    }

    pub fn anim_mut(&mut self) -> Option<&mut AnimSequence> {
        match &mut self.payload {
            AssetPayload::Anim(anim) => Some(anim),
            _ => None,
        }
    }

    pub fn skeletal_mesh(&self) -> Option<&SkeletalMesh> {
        match &self.payload {
            AssetPayload::SkeletalMesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn static_mesh(&self) -> Option<&StaticMesh> {
        match &self.payload {
            AssetPayload::StaticMesh(mesh) => Some(mesh),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_author_round_trip() {
        let mut uexp = Uexp {
            payload: AssetPayload::Opaque,
            trailer: OpaqueBlob::default(),
            author_bytes: Vec::new(),
            author: String::new(),
        };
        uexp.embed_author("someone");
        assert_eq!(uexp.author(), "someone");
        assert_eq!(cipher::decrypt(&uexp.author_bytes), "someone");
    }
}
