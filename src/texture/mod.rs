//! Texture payload codec.
//!
//! A texture export is an opaque property region followed by metadata and a
//! mip chain. The chain is split between the payload file and the overflow
//! file by a size threshold: overflow-resident mips are contiguous below the
//! payload-resident ones. One customized variant additionally packs every
//! payload-resident mip's pixels into a single shared bulk record.

pub mod mipmap;

pub use mipmap::Mipmap;

use std::io::{Read, Seek, Write};
use std::path::Path;

use tracing::{debug, warn};

use crate::uexp::PackageInfo;
use crate::util::version::V5_0;
use crate::util::{Error, Reader, Result, VersionInfo, Writer};

/// Supported pixel formats: engine tag, short name, bytes per pixel.
const PIXEL_FORMATS: &[(&str, &str, f64)] = &[
    ("PF_DXT1", "DXT1/BC1", 0.5),
    ("PF_DXT5", "DXT5/BC3", 1.0),
    ("PF_BC4", "BC4/ATI1", 0.5),
    ("PF_BC5", "BC5/ATI2", 1.0),
    ("PF_BC6H", "BC6H(unsigned)", 1.0),
    ("PF_BC7", "BC7", 1.0),
    ("PF_FloatRGBA", "FloatRGBA", 8.0),
    ("PF_B8G8R8A8", "B8G8R8A8", 4.0),
];

/// Look up a pixel format by engine tag or short name.
pub fn pixel_format(name: &str) -> Option<(&'static str, &'static str, f64)> {
    PIXEL_FORMATS
        .iter()
        .find(|(tag, short, _)| *tag == name || *short == name)
        .copied()
}

/// Flag word values marking overflow usage in the customized variant.
const UBULK_FLAG: [u16; 2] = [0, 16384];

/// Property scan sentinel preceding the texture metadata.
const PROPERTY_SENTINEL: [u8; 8] = [0x01, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00];

/// Texture payload (2D or cube).
#[derive(Debug, Clone)]
pub struct Texture {
    /// Leading bytes up to the imported-size field, when present
    pub head: Vec<u8>,
    pub imported_size: Option<(u32, u32)>,
    /// Opaque property region up to the metadata sentinel
    pub properties: Vec<u8>,
    /// Name id of the pixel-format string
    pub format_name_id: u64,
    pub original_width: u32,
    pub original_height: u32,
    /// 1 for 2D textures, 6 for cube maps
    pub cube_flag: u16,
    pub flag_word: u16,
    pub format: String,
    pub extra_mip_count: u32,
    /// Shared bulk record holding packed payload-resident pixels (variant)
    pub packed_bulk: Option<Mipmap>,
    pub mipmaps: Vec<Mipmap>,
    pub has_ubulk: bool,
    pub none_name_id: u64,
    bytes_per_pixel: f64,
    end_offset_slot: u64,
}

impl Texture {
    pub fn read<R: Read + Seek>(r: &mut Reader<R>, info: &PackageInfo) -> Result<Self> {
        let version = info.version;
        let is_cube = info.asset_type == "TextureCube";
        let start = r.pos();

        // leading block: either unversioned header pairs or a named
        // ImportedSize property
        let mut head = Vec::new();
        let mut imported_size = None;
        if info.unversioned {
            skip_unversioned_headers(r)?;
            let size = (r.pos() - start) as usize;
            r.seek(start)?;
            head = r.read_bytes(size)?;
            let probe = r.read_array::<8>()?;
            r.seek_relative(-8)?;
            let zeros = probe.iter().filter(|b| **b == 0).count();
            if zeros > 2 {
                imported_size = Some((r.read_u32()?, r.read_u32()?));
            }
        } else {
            let first_property_id = r.read_u64()?;
            if first_property_id >= info.names.len() as u64 {
                return Err(Error::parse(r.pos(), "property name id out of range; check the version tag"));
            }
            let first_property = info.names.get(first_property_id as u32)?.to_string();
            r.seek(start)?;
            if first_property == "ImportedSize" {
                head = r.read_bytes(49)?;
                imported_size = Some((r.read_u32()?, r.read_u32()?));
            }
        }

        let property_start = r.pos();
        r.scan(&PROPERTY_SENTINEL, Some(1000))?;
        let property_size = (r.pos() - property_start) as usize;
        r.seek(property_start)?;
        let properties = r.read_bytes(property_size)?;

        let format_name_id = r.read_u64()?;
        let end_offset_slot = r.pos();
        let _end_offset = r.read_u32()?;
        if version.caps().tex_null_after_end {
            r.expect_null("texture metadata padding")?;
        }
        if version.at_least(V5_0) {
            r.expect_null_array(4, "texture metadata padding")?;
        }
        let original_width = r.read_u32()?;
        let original_height = r.read_u32()?;
        let cube_flag = r.read_u16()?;
        let flag_word = r.read_u16()?;
        match cube_flag {
            1 if !is_cube => {}
            6 if is_cube => {}
            1 | 6 => return Err(Error::parse(r.pos(), "texture kind does not match its class")),
            _ => return Err(Error::parse(r.pos(), "bad cube flag; check the version tag")),
        }
        let format = r
            .read_str()?
            .ok_or_else(|| Error::parse(r.pos(), "missing pixel format name"))?;

        if version.is_ff7r() && flag_word == UBULK_FLAG[1] {
            r.expect_null("texture variant padding")?;
            r.expect_null("texture variant padding")?;
            let _bulk_map_count = r.read_u32()?;
        }
        let extra_mip_count = r.read_u32()?;
        let mip_count = r.read_u32()? as usize;

        let packed_bulk = if version.is_ff7r() {
            let bulk = Mipmap::read(r, version)?;
            r.expect_u32(cube_flag as u32, "packed bulk cube flag")?;
            let _uexp_mip_count = r.read_u32()?;
            Some(bulk)
        } else {
            None
        };

        let mut mipmaps = Vec::with_capacity(mip_count);
        for _ in 0..mip_count {
            mipmaps.push(Mipmap::read(r, version)?);
        }

        let (tag, _, bytes_per_pixel) = pixel_format(&format)
            .ok_or_else(|| Error::unsupported(format!("pixel format {format}")))?;
        debug_assert_eq!(tag, format);

        let mut texture = Self {
            head,
            imported_size,
            properties,
            format_name_id,
            original_width,
            original_height,
            cube_flag,
            flag_word,
            format,
            extra_mip_count,
            packed_bulk,
            mipmaps,
            has_ubulk: false,
            none_name_id: 0,
            bytes_per_pixel,
            end_offset_slot,
        };
        texture.has_ubulk = texture.mipmap_counts().1 > 0;

        // the variant stores payload-resident pixels in the shared bulk
        // record; slice them back out per mip
        if let Some(bulk) = &texture.packed_bulk {
            let mut cursor = 0usize;
            let data = bulk.data.clone();
            for mip in texture.mipmaps.iter_mut().filter(|m| m.uexp) {
                let size = (mip.pixel_count() as f64 * texture.bytes_per_pixel) as usize
                    * texture.cube_flag as usize;
                mip.data = data[cursor..cursor + size].to_vec();
                cursor += size;
            }
            if cursor != data.len() {
                return Err(Error::parse(r.pos(), "packed mip bulk was not fully consumed"));
            }
        }

        if version.caps().tex_null_before_none {
            r.expect_null("texture tail padding")?;
        }
        texture.none_name_id = r.read_u64()?;
        Ok(texture)
    }

    /// Load overflow-resident mip pixels from the overflow file.
    pub fn load_bulk(&mut self, ubulk_path: &Path) -> Result<()> {
        if !self.has_ubulk {
            return Ok(());
        }
        let f = std::fs::File::open(ubulk_path)
            .map_err(|_| Error::FileNotFound(ubulk_path.to_path_buf()))?;
        let mut r = Reader::new(std::io::BufReader::new(f));
        let size = r.size()?;
        for mip in self.mipmaps.iter_mut().filter(|m| !m.uexp) {
            mip.data = r.read_bytes(mip.data_size as usize)?;
        }
        r.check(r.pos(), size, "overflow file end")?;
        Ok(())
    }

    /// Write overflow-resident mip pixels to the overflow file.
    pub fn write_bulk(&self, ubulk_path: &Path) -> Result<()> {
        if !self.has_ubulk {
            return Ok(());
        }
        let f = std::fs::File::create(ubulk_path)?;
        let mut w = Writer::new(std::io::BufWriter::new(f));
        for mip in self.mipmaps.iter().filter(|m| !m.uexp) {
            w.write_bytes(&mip.data)?;
        }
        Ok(())
    }

    /// Count (payload-resident, overflow-resident) mips.
    pub fn mipmap_counts(&self) -> (usize, usize) {
        let uexp = self.mipmaps.iter().filter(|m| m.uexp).count();
        (uexp, self.mipmaps.len() - uexp)
    }

    /// Dimensions of the largest mip.
    pub fn max_size(&self) -> (u32, u32) {
        self.mipmaps
            .first()
            .map_or((0, 0), |m| (m.width, m.height))
    }

    /// Dimensions of the largest payload-resident mip.
    pub fn max_uexp_size(&self) -> (u32, u32) {
        self.mipmaps
            .iter()
            .find(|m| m.uexp)
            .map_or((0, 0), |m| (m.width, m.height))
    }

    pub fn write<W: Write + Seek>(&mut self, w: &mut Writer<W>, info: &PackageInfo) -> Result<()> {
        let version = info.version;
        let (max_width, max_height) = self.max_size();
        let (uexp_count, ubulk_count) = self.mipmap_counts();

        w.write_bytes(&self.head)?;
        if let Some((iw, ih)) = self.imported_size {
            let iw = iw.max(self.original_width).max(max_width);
            let ih = ih.max(self.original_height).max(max_height);
            self.imported_size = Some((iw, ih));
            w.write_u32(iw)?;
            w.write_u32(ih)?;
        }
        self.original_width = max_width;
        self.original_height = max_height;

        w.write_bytes(&self.properties)?;
        w.write_u64(self.format_name_id)?;
        self.end_offset_slot = w.pos();
        w.write_u32(0)?;
        if version.caps().tex_null_after_end {
            w.write_null()?;
        }
        if version.at_least(V5_0) {
            w.write_null_array(4)?;
        }
        w.write_u32(self.original_width)?;
        w.write_u32(self.original_height)?;
        w.write_u16(self.cube_flag)?;
        w.write_u16(self.flag_word)?;
        w.write_str(&self.format)?;

        if version.is_ff7r() && self.flag_word == UBULK_FLAG[1] {
            w.write_null()?;
            w.write_null()?;
            w.write_u32((ubulk_count + self.extra_mip_count as usize) as u32)?;
        }
        w.write_u32(self.extra_mip_count)?;
        w.write_u32(self.mipmaps.len() as u32)?;

        if version.is_ff7r() {
            let mut packed = Vec::new();
            for mip in &mut self.mipmaps {
                mip.meta = true;
                if mip.uexp {
                    packed.extend_from_slice(&mip.data);
                }
            }
            let (bw, bh) = self.max_uexp_size();
            let mut bulk = Mipmap::default();
            bulk.update(packed, bw, bh, true);
            bulk.offset = info.uasset_size + w.pos() + 24;
            bulk.write(w, version)?;
            self.packed_bulk = Some(bulk);

            w.write_u32(self.cube_flag as u32)?;
            w.write_u32(uexp_count as u32)?;
        }

        let mut ubulk_offset = 0u64;
        for mip in &mut self.mipmaps {
            if mip.uexp {
                mip.offset = info.uasset_size + w.pos() + 24
                    - 4 * version.at_least(V5_0) as u64;
            } else {
                mip.offset = ubulk_offset;
                ubulk_offset += mip.data_size as u64;
            }
            mip.write(w, version)?;
        }

        if version.caps().tex_null_before_none {
            w.write_null()?;
        }
        let end_offset = if version.at_least(V5_0) {
            w.pos() - self.end_offset_slot
        } else {
            w.pos() + info.uasset_size
        };
        w.write_u64(self.none_name_id)?;

        // older versions store overflow offsets rebased against the end of
        // the payload, which is only known now
        if version.caps().ubulk_offset_rebase {
            let base = -((info.uasset_size + w.pos()) as i64);
            for mip in &mut self.mipmaps {
                if !mip.uexp {
                    mip.offset = (mip.offset as i64 + base) as u64;
                    mip.rewrite_offset(w)?;
                }
            }
        }

        w.patch_u32(self.end_offset_slot, end_offset as u32)?;
        Ok(())
    }

    /// Rebuild the mip chain from ordered (pixels, width, height) levels,
    /// largest first.
    ///
    /// A level stays in the payload file unless the chain already used the
    /// overflow file, the level is not the last, and its pixel count
    /// exceeds the current largest payload-resident level.
    pub fn inject_mipmaps(&mut self, levels: &[(Vec<u8>, u32, u32)]) -> Result<()> {
        if levels.is_empty() {
            return Err(Error::constraint("cannot inject an empty mip chain"));
        }
        let (uexp_width, uexp_height) = self.max_uexp_size();
        let uexp_pixels = uexp_width as u64 * uexp_height as u64;
        let old_count = self.mipmaps.len();

        let mut mipmaps = Vec::with_capacity(levels.len());
        for (i, (data, width, height)) in levels.iter().enumerate() {
            let mut mip = Mipmap::default();
            let to_bulk = self.has_ubulk
                && i + 1 < levels.len()
                && (*width as u64 * *height as u64) > uexp_pixels;
            mip.update(data.clone(), *width, *height, !to_bulk);
            mipmaps.push(mip);
        }
        self.mipmaps = mipmaps;

        if self.mipmap_counts().1 == 0 {
            self.has_ubulk = false;
        }
        self.flag_word = UBULK_FLAG[self.has_ubulk as usize];

        let (width, height) = self.max_size();
        if self.mipmaps.len() > 1 && (!width.is_power_of_two() || !height.is_power_of_two()) {
            warn!("mip chain dimensions are not powers of two ({width}, {height})");
        }
        if self.mipmaps.len() > 1 && old_count == 1 {
            warn!("source texture had a single mip but the injected chain has several");
        }
        debug!(mips = self.mipmaps.len(), width, height, "injected mip chain");
        Ok(())
    }

    /// Drop every mip but the largest, forcing payload residency.
    pub fn remove_mipmaps(&mut self) {
        if self.mipmaps.len() <= 1 {
            return;
        }
        self.mipmaps.truncate(1);
        self.mipmaps[0].uexp = true;
        self.has_ubulk = false;
    }

    /// Swap the pixel-format tag in place.
    ///
    /// Only the name-table slot referenced by the format name id changes;
    /// the table does not grow.
    pub fn change_format(&mut self, names: &mut crate::uasset::NameTable, format: &str) -> Result<()> {
        let (tag, _, bytes_per_pixel) = pixel_format(format)
            .ok_or_else(|| Error::unsupported(format!("pixel format {format}")))?;
        names.set(self.format_name_id as u32, tag)?;
        self.format = tag.to_string();
        self.bytes_per_pixel = bytes_per_pixel;
        Ok(())
    }
}

/// Skip the compact two-byte header pairs of an unversioned property block.
pub fn skip_unversioned_headers<R: Read + Seek>(r: &mut Reader<R>) -> Result<()> {
    let start = r.pos();
    let mut pair = r.read_array::<2>()?;
    while pair[1] % 2 == 0 {
        pair = r.read_array::<2>()?;
        if r.pos() - start > 100 {
            return Err(Error::parse(r.pos(), "unversioned header does not terminate"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_format_lookup() {
        assert_eq!(pixel_format("PF_DXT5").unwrap().1, "DXT5/BC3");
        assert_eq!(pixel_format("BC7").unwrap().0, "PF_BC7");
        assert!(pixel_format("PF_ASTC_4x4").is_none());
    }

    fn sample_texture(mips: &[(u32, u32, bool)]) -> Texture {
        let mipmaps = mips
            .iter()
            .map(|(w, h, uexp)| {
                let mut mip = Mipmap::default();
                mip.update(vec![0; (w * h) as usize], *w, *h, *uexp);
                mip
            })
            .collect::<Vec<_>>();
        let has_ubulk = mipmaps.iter().any(|m| !m.uexp);
        Texture {
            head: Vec::new(),
            imported_size: None,
            properties: Vec::new(),
            format_name_id: 0,
            original_width: mips[0].0,
            original_height: mips[0].1,
            cube_flag: 1,
            flag_word: 0,
            format: "PF_DXT5".to_string(),
            extra_mip_count: 0,
            packed_bulk: None,
            mipmaps,
            has_ubulk,
            none_name_id: 0,
            bytes_per_pixel: 1.0,
            end_offset_slot: 0,
        }
    }

    #[test]
    fn test_mipmap_counts() {
        let tex = sample_texture(&[(8, 8, false), (4, 4, true), (2, 2, true)]);
        assert_eq!(tex.mipmap_counts(), (2, 1));
        assert_eq!(tex.max_size(), (8, 8));
        assert_eq!(tex.max_uexp_size(), (4, 4));
    }

    #[test]
    fn test_inject_residency_rule() {
        let mut tex = sample_texture(&[(8, 8, false), (4, 4, true), (2, 2, true)]);
        let levels = vec![
            (vec![0u8; 256], 16, 16),
            (vec![0u8; 64], 8, 8),
            (vec![0u8; 16], 4, 4),
            (vec![0u8; 4], 2, 2),
        ];
        tex.inject_mipmaps(&levels).unwrap();
        // 16x16 and 8x8 exceed the old 4x4 payload threshold; the last mip
        // always stays in the payload
        let residency: Vec<bool> = tex.mipmaps.iter().map(|m| m.uexp).collect();
        assert_eq!(residency, vec![false, false, true, true]);
        assert!(tex.has_ubulk);
    }

    #[test]
    fn test_inject_all_payload_when_no_bulk() {
        let mut tex = sample_texture(&[(4, 4, true)]);
        let levels = vec![(vec![0u8; 64], 8, 8), (vec![0u8; 16], 4, 4)];
        tex.inject_mipmaps(&levels).unwrap();
        assert!(tex.mipmaps.iter().all(|m| m.uexp));
        assert!(!tex.has_ubulk);
    }

    #[test]
    fn test_remove_mipmaps() {
        let mut tex = sample_texture(&[(8, 8, false), (4, 4, true)]);
        tex.remove_mipmaps();
        assert_eq!(tex.mipmaps.len(), 1);
        assert!(tex.mipmaps[0].uexp);
        assert!(!tex.has_ubulk);
    }

    #[test]
    fn test_change_format_swaps_in_place() {
        let mut names = crate::uasset::NameTable::default();
        let id = names.intern("PF_DXT5");
        let mut tex = sample_texture(&[(4, 4, true)]);
        tex.format_name_id = id as u64;
        tex.change_format(&mut names, "BC7").unwrap();
        assert_eq!(names.get(id).unwrap(), "PF_BC7");
        assert_eq!(names.len(), 1);
        assert_eq!(tex.format, "PF_BC7");
    }
}
