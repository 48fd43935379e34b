//! Engine version model.
//!
//! Assets do not record which engine serialized them, so the caller supplies
//! a version tag. A tag is either a plain base version (`"4.18"`, `"5.0"`)
//! or a named custom variant for a game that ships a modified layout.
//! Field presence throughout the codecs is driven by [`Caps`], resolved once
//! per asset rather than re-compared at every branch.

use std::fmt;

use super::{Error, Result};

/// Base version encoded as an integer: `4.27` is 42700, `5.0.2` is 50002.
pub type BaseVersion = u32;

pub const V4_13: BaseVersion = 41300;
pub const V4_17: BaseVersion = 41700;
pub const V4_18: BaseVersion = 41800;
pub const V4_20: BaseVersion = 42000;
pub const V4_23: BaseVersion = 42300;
pub const V4_25: BaseVersion = 42500;
pub const V4_26: BaseVersion = 42600;
pub const V4_27: BaseVersion = 42700;
pub const V5_0: BaseVersion = 50000;

/// Named custom variants for games that customize the base layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomVersion {
    /// Final Fantasy VII Remake (base 4.18 with extra mesh/texture blocks)
    Ff7r,
    /// Kingdom Hearts III (base 4.17)
    Kh3,
}

/// Capability set resolved from a version tag.
///
/// Codecs take these flags instead of comparing version numbers inline.
#[derive(Debug, Clone, Copy, Default)]
pub struct Caps {
    /// Bone TRS values are f64 instead of f32
    pub wide_bone_floats: bool,
    /// Import and export records carry one extra u32
    pub import_export_extra: bool,
    /// Skeletal LOD uses the split-buffer layout introduced in 4.27
    pub lod5_layout: bool,
    /// Static sections carry two extra u32 flags
    pub static_section_extra: bool,
    /// Skeletal material records carry four extra bytes
    pub skeletal_material_extra: bool,
    /// Mip records end with a 1-word (4.20 and later)
    pub mip_tail_word: bool,
    /// Payload texture block has a null word after the end offset (4.20+)
    pub tex_null_after_end: bool,
    /// Null word between the mip list and the closing name id (4.23+)
    pub tex_null_before_none: bool,
    /// Overflow mip offsets are rebased and rewritten in place (before 4.26)
    pub ubulk_offset_rebase: bool,
}

/// Parsed engine version: base number plus optional custom variant.
#[derive(Debug, Clone, Copy)]
pub struct VersionInfo {
    base: BaseVersion,
    custom: Option<CustomVersion>,
    caps: Caps,
}

impl VersionInfo {
    /// Parse a version tag like `"4.18"`, `"5.0"`, `"ff7r"`, or `"kh3"`.
    pub fn parse(tag: &str) -> Result<Self> {
        let (base, custom) = match tag {
            "ff7r" => (V4_18, Some(CustomVersion::Ff7r)),
            "kh3" => (V4_17, Some(CustomVersion::Kh3)),
            other => (parse_base(other)?, None),
        };
        if !(V4_13..=V5_0).contains(&base) {
            return Err(Error::UnsupportedVersion(tag.to_string()));
        }
        Ok(Self::from_parts(base, custom))
    }

    fn from_parts(base: BaseVersion, custom: Option<CustomVersion>) -> Self {
        let caps = Caps {
            wide_bone_floats: base >= V5_0,
            import_export_extra: base >= V5_0,
            lod5_layout: base >= V4_27,
            static_section_extra: base >= V4_27,
            skeletal_material_extra: base >= V4_27,
            mip_tail_word: base >= V4_20,
            tex_null_after_end: base >= V4_20,
            tex_null_before_none: base >= V4_23,
            ubulk_offset_rebase: base < V4_26 && custom != Some(CustomVersion::Ff7r),
        };
        Self { base, custom, caps }
    }

    /// Base version as an integer.
    #[inline]
    pub fn base(&self) -> BaseVersion {
        self.base
    }

    /// Resolved capability set.
    #[inline]
    pub fn caps(&self) -> &Caps {
        &self.caps
    }

    #[inline]
    pub fn is_ff7r(&self) -> bool {
        self.custom == Some(CustomVersion::Ff7r)
    }

    #[inline]
    pub fn is_kh3(&self) -> bool {
        self.custom == Some(CustomVersion::Kh3)
    }

    /// Any custom variant at all.
    #[inline]
    pub fn is_custom(&self) -> bool {
        self.custom.is_some()
    }

    /// Base-version comparison, inclusive.
    #[inline]
    pub fn at_least(&self, base: BaseVersion) -> bool {
        self.base >= base
    }

    #[inline]
    pub fn below(&self, base: BaseVersion) -> bool {
        self.base < base
    }
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.custom {
            Some(CustomVersion::Ff7r) => write!(f, "ff7r"),
            Some(CustomVersion::Kh3) => write!(f, "kh3"),
            None => write!(f, "{}.{}", self.base / 10000, (self.base / 100) % 100),
        }
    }
}

fn parse_base(tag: &str) -> Result<BaseVersion> {
    let parts: Vec<&str> = tag.split('.').collect();
    if parts.is_empty() || parts.len() > 3 {
        return Err(Error::UnsupportedVersion(tag.to_string()));
    }
    let mut value: BaseVersion = 0;
    for (i, part) in parts.iter().enumerate() {
        let digit: BaseVersion = part
            .parse()
            .map_err(|_| Error::UnsupportedVersion(tag.to_string()))?;
        value += digit * 10u32.pow((2 - i as u32) * 2);
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_base_versions() {
        assert_eq!(VersionInfo::parse("4.18").unwrap().base(), V4_18);
        assert_eq!(VersionInfo::parse("4.27").unwrap().base(), V4_27);
        assert_eq!(VersionInfo::parse("5.0").unwrap().base(), V5_0);
        assert!(VersionInfo::parse("3.0").is_err());
        assert!(VersionInfo::parse("banana").is_err());
    }

    #[test]
    fn test_custom_variants() {
        let v = VersionInfo::parse("ff7r").unwrap();
        assert!(v.is_ff7r());
        assert_eq!(v.base(), V4_18);
        assert!(!v.caps().lod5_layout);

        let v = VersionInfo::parse("kh3").unwrap();
        assert!(v.is_kh3());
        assert_eq!(v.base(), V4_17);
    }

    #[test]
    fn test_caps_boundaries() {
        let v = VersionInfo::parse("4.26").unwrap();
        assert!(!v.caps().lod5_layout);
        assert!(v.caps().tex_null_before_none);
        assert!(!v.caps().ubulk_offset_rebase);

        let v = VersionInfo::parse("4.25").unwrap();
        assert!(v.caps().ubulk_offset_rebase);

        let v = VersionInfo::parse("ff7r").unwrap();
        assert!(!v.caps().ubulk_offset_rebase);

        let v = VersionInfo::parse("5.0").unwrap();
        assert!(v.caps().wide_bone_floats);
        assert!(v.caps().import_export_extra);
        assert!(v.caps().lod5_layout);
    }

    #[test]
    fn test_display() {
        assert_eq!(VersionInfo::parse("4.18").unwrap().to_string(), "4.18");
        assert_eq!(VersionInfo::parse("ff7r").unwrap().to_string(), "ff7r");
    }
}
