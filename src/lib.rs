//! # uasset
//!
//! Rust reader/writer for Unreal Engine asset bundles: a metadata container
//! (.uasset), a payload file (.uexp), and an optional overflow file
//! (.ubulk) holding large texture mips.
//!
//! The goal is lossless round-trip parsing: every structural field decodes
//! into a typed model, callers may mutate mesh/skeleton/texture/animation
//! data, and re-encoding produces a bundle the engine accepts, byte
//! identical to the input wherever nothing changed (the name-table hashes
//! are always re-derived). Regions whose meaning is unconfirmed are
//! carried as opaque blobs rather than interpreted.
//!
//! ## Modules
//!
//! - [`util`] - errors, binary I/O, version capabilities, hashing
//! - [`uasset`] - container codec (header, name/import/export tables)
//! - [`uexp`] - payload dispatcher and trailer
//! - [`mesh`] - static/skeletal meshes, LODs, sections, buffers, materials
//! - [`skeleton`] - bone hierarchy codecs
//! - [`texture`] - mip chain codec and overflow split
//! - [`anim`] - animation sequences and the compressed clip bit-unpacker
//! - [`primitives`] - plain nested-array model exchanged with callers
//!
//! ## Example
//!
//! ```ignore
//! use uasset::Uasset;
//!
//! let mut asset = Uasset::open("SK_Body.uasset", "4.18")?;
//! let prims = asset.payload.as_ref().unwrap().skeletal_mesh().unwrap().parse_primitives()?;
//! asset.save("out/SK_Body.uasset")?;
//! ```

pub mod anim;
pub mod mesh;
pub mod primitives;
pub mod skeleton;
pub mod texture;
pub mod uasset;
pub mod uexp;
pub mod util;

pub use crate::uasset::Uasset;
pub use crate::uexp::{AssetPayload, Uexp};
pub use crate::util::{Error, Result, VersionInfo};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::anim::{AnimSequence, CompressedClip};
    pub use crate::mesh::{SkeletalMesh, StaticMesh};
    pub use crate::primitives::{AnimPrimitives, MaterialInfo, MeshPrimitives};
    pub use crate::skeleton::{Skeleton, SkeletonAsset};
    pub use crate::texture::Texture;
    pub use crate::uasset::Uasset;
    pub use crate::uexp::{AssetPayload, Uexp};
    pub use crate::util::{Error, Result, VersionInfo};
}
