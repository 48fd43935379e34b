//! Animation sequence payload.
//!
//! The export wraps an opaque property region, a notify block located by
//! scanning for the skeleton import back-reference, track/scale offset
//! arrays, bone ids, and a compressed data blob in one of two key formats:
//! the legacy per-track compression (decoded read-only, rewritten verbatim)
//! or the compressed clip handled by [`clip`].

pub mod clip;

pub use clip::CompressedClip;

use std::io::{Cursor, Read, Seek, Write};

use glam::{DQuat, DVec3};
use tracing::debug;

use crate::primitives::AnimPrimitives;
use crate::texture::skip_unversioned_headers;
use crate::uexp::PackageInfo;
use crate::util::{Error, Reader, Result, Writer};

/// Animation key encodings.
const KEY_FORMATS: [&str; 6] = [
    "AKF_ConstantKeyLerp",
    "AKF_VariableKeyLerp",
    "AKF_PerTrackCompression",
    "AKF_ACLDefault",
    "AKF_ACLCustom",
    "AKF_ACLSafe",
];

/// Per-track value encodings of the legacy compression.
const COMPRESSION_FORMATS: [&str; 7] = [
    "ACF_None",
    "ACF_Float96NoW",
    "ACF_Fixed48NoW",
    "ACF_IntervalFixed32NoW",
    "ACF_Fixed32NoW",
    "ACF_Float32NoW",
    "ACF_Identity",
];

/// Compressed animation payload in either key format.
#[derive(Debug, Clone)]
pub enum AnimData {
    Acl(CompressedClip),
    PerTrack(PerTrackData),
}

impl AnimData {
    pub fn byte_size(&self) -> usize {
        match self {
            Self::Acl(clip) => clip.byte_size(),
            Self::PerTrack(data) => data.raw.len(),
        }
    }
}

/// Animation sequence payload.
#[derive(Debug, Clone)]
pub struct AnimSequence {
    /// Opaque leading property bytes
    pub head: Vec<u8>,
    pub frame_count: u32,
    /// Opaque notify block ending at the skeleton back-reference
    pub notifies: Vec<u8>,
    pub guid: [u8; 16],
    /// Key format plus rotation/translation/scale format bytes
    pub format_bytes: [u8; 4],
    pub track_offsets: Vec<i32>,
    pub scale_offsets: Vec<u32>,
    pub scale_offsets_strip_size: u32,
    pub bone_ids: Vec<u32>,
    /// Opaque curve block
    pub curves: Vec<u8>,
    pub raw_size: u32,
    pub compressed_size: u32,
    pub data: AnimData,
    none_name_id: u64,
    ff7r: bool,
    kh3: bool,
}

impl AnimSequence {
    pub fn read<R: Read + Seek>(r: &mut Reader<R>, info: &PackageInfo) -> Result<Self> {
        let version = info.version;
        let start = r.pos();
        if info.unversioned {
            skip_unversioned_headers(r)?;
        } else {
            r.seek(start + 25)?;
        }
        let head_size = (r.pos() - start) as usize;
        r.seek(start)?;
        let head = r.read_bytes(head_size)?;

        let frame_count = r.read_u32()?;

        let skeleton_import = info
            .imports
            .iter()
            .position(|imp| imp.class_str == "Skeleton")
            .ok_or_else(|| Error::other("animation has no skeleton import"))?;
        let notifies = seek_import_ref(r, skeleton_import as u32)?;

        let none_name_id = info
            .names
            .find("None")
            .ok_or_else(|| Error::other("name table has no None entry"))? as u64;
        if !version.is_ff7r() {
            let id = r.read_u64()?;
            r.check(id, none_name_id, "closing property id")?;
        }
        r.expect_null("animation padding")?;
        let guid = r.read_array::<16>()?;
        let strip_flags = r.read_u16()?;
        r.check(strip_flags, 1, "strip flags")?;
        r.expect_u32(1, "compressed data marker")?;

        let format_bytes = r.read_array::<4>()?;
        let key_format = KEY_FORMATS
            .get(format_bytes[0] as usize)
            .copied()
            .ok_or_else(|| Error::unsupported(format!("key format {}", format_bytes[0])))?;
        if !matches!(key_format, "AKF_PerTrackCompression" | "AKF_ACLDefault") {
            return Err(Error::unsupported(format!("key format {key_format}")));
        }

        let track_offsets = r.read_i32_array()?;
        let scale_offsets = r.read_u32_array()?;
        let scale_offsets_strip_size = r.read_u32()?;
        let bone_ids = r.read_u32_array()?;

        // the curve block is kept opaque; parsing it only locates its end
        let curve_start = r.pos();
        if version.is_ff7r() {
            let probe = r.read_array::<2>()?;
            if probe == [0x00, 0x03] {
                let count = r.read_u32()?;
                for _ in 0..count {
                    skip_curve_entry(r)?;
                }
            } else {
                let byte = r.read_u8()?;
                r.check(byte, 1, "curve block marker")?;
            }
        } else {
            r.scan(&none_name_id.to_le_bytes(), None)?;
        }
        let curve_size = (r.pos() - curve_start) as usize;
        r.seek(curve_start)?;
        let curves = r.read_bytes(curve_size)?;

        let raw_size = r.read_u32()?;
        let compressed_size = r.read_u32()?;
        if !version.is_custom() {
            r.expect_null("compressed data padding")?;
        }

        let data = if format_bytes[0] >= 3 {
            AnimData::Acl(CompressedClip::read(r)?)
        } else {
            AnimData::PerTrack(PerTrackData::read(
                r,
                compressed_size,
                frame_count,
                &track_offsets,
                &scale_offsets,
            )?)
        };
        debug!(
            frames = frame_count,
            bones = bone_ids.len(),
            format = key_format,
            "animation sequence"
        );

        Ok(Self {
            head,
            frame_count,
            notifies,
            guid,
            format_bytes,
            track_offsets,
            scale_offsets,
            scale_offsets_strip_size,
            bone_ids,
            curves,
            raw_size,
            compressed_size,
            data,
            none_name_id,
            ff7r: version.is_ff7r(),
            kh3: version.is_kh3(),
        })
    }

    pub fn write<W: Write + Seek>(&mut self, w: &mut Writer<W>) -> Result<()> {
        w.write_bytes(&self.head)?;
        w.write_u32(self.frame_count)?;
        w.write_bytes(&self.notifies)?;
        if !self.ff7r {
            w.write_u64(self.none_name_id)?;
        }
        w.write_null()?;
        w.write_bytes(&self.guid)?;
        w.write_u16(1)?;
        w.write_u32(1)?;
        w.write_bytes(&self.format_bytes)?;
        w.write_i32_array(&self.track_offsets, true)?;
        w.write_u32_array(&self.scale_offsets, true)?;
        w.write_u32(self.scale_offsets_strip_size)?;
        w.write_u32_array(&self.bone_ids, true)?;
        w.write_bytes(&self.curves)?;
        w.write_u32(self.raw_size)?;
        self.compressed_size = self.data.byte_size() as u32;
        w.write_u32(self.compressed_size)?;
        if !self.ff7r && !self.kh3 {
            w.write_u32(0)?;
        }
        match &self.data {
            AnimData::Acl(clip) => clip.write(w)?,
            AnimData::PerTrack(data) => w.write_bytes(&data.raw)?,
        }
        Ok(())
    }

    /// Decoded tracks in collaborator shape.
    pub fn to_primitives(&self) -> AnimPrimitives {
        match &self.data {
            AnimData::Acl(clip) => clip.to_primitives(),
            AnimData::PerTrack(data) => data.to_primitives(self.frame_count),
        }
    }

    /// Replace the compressed payload with caller tracks.
    ///
    /// Only the compressed-clip format can be re-encoded; the legacy
    /// per-track payload is read-only.
    pub fn import_tracks(&mut self, prims: &AnimPrimitives) -> Result<()> {
        match &mut self.data {
            AnimData::Acl(clip) => {
                clip.import_tracks(prims)?;
                self.frame_count = prims.frame_count;
                Ok(())
            }
            AnimData::PerTrack(_) => Err(Error::unsupported(
                "re-encoding the legacy per-track compression",
            )),
        }
    }
}

/// Scan for the 4-byte back-reference encoding of an import index, leaving
/// the cursor right after it. Returns the bytes consumed.
fn seek_import_ref<R: Read + Seek>(r: &mut Reader<R>, import_index: u32) -> Result<Vec<u8>> {
    let start = r.pos();
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
                return Err(Error::parse(r.pos(), "skeleton reference not found"));
            }
        }
        r.seek_relative(-4)?;
        let id = (-r.read_i32()? - 1) as u32;
        if id == import_index {
            break;
        }
        window = r.read_bytes(3)?;
    }
    let consumed = (r.pos() - start) as usize;
    r.seek(start)?;
    r.read_bytes(consumed)
}

/// Skip one structured curve entry of the customized variant.
fn skip_curve_entry<R: Read + Seek>(r: &mut Reader<R>) -> Result<()> {
    r.expect_bytes(&[0x00, 0x02, 0x01, 0x05], "curve entry tag")?;
    let head = r.read_array::<8>()?;
    if head[0] != 0x80 {
        let count = r.read_u32()?;
        let _ = r.read_bytes(count as usize * 27)?;
    } else {
        let byte = r.read_u8()?;
        if byte != 0x7F {
            r.seek_relative(-1)?;
        }
    }
    let _ = r.read_u32()?;
    let _ = r.read_u32()?;
    r.expect_u32(4, "curve entry tail")?;
    Ok(())
}

/// One decoded sub-track of the legacy per-track compression.
#[derive(Debug, Clone, Default)]
pub struct LegacyTrack {
    pub keys: Vec<[f32; 3]>,
    pub times: Vec<f32>,
    pub default: bool,
}

/// Decoded legacy per-track payload, with the raw bytes retained for
/// verbatim rewrite.
#[derive(Debug, Clone)]
pub struct PerTrackData {
    pub raw: Vec<u8>,
    /// Per bone: rotation, translation, scale tracks
    pub tracks: Vec<[LegacyTrack; 3]>,
}

impl PerTrackData {
    pub fn read<R: Read + Seek>(
        r: &mut Reader<R>,
        size: u32,
        frame_count: u32,
        track_offsets: &[i32],
        scale_offsets: &[u32],
    ) -> Result<Self> {
        let raw = r.read_bytes(size as usize)?;
        let mut c = Reader::new(Cursor::new(raw.as_slice()));

        let mut tracks = Vec::with_capacity(scale_offsets.len());
        for (pair, scale_offset) in track_offsets.chunks_exact(2).zip(scale_offsets) {
            let offsets = [pair[0], pair[1], *scale_offset as i32];
            let mut bone = [
                LegacyTrack::default(),
                LegacyTrack::default(),
                LegacyTrack::default(),
            ];
            for (i, offset) in offsets.iter().enumerate() {
                if *offset == -1 {
                    bone[i].default = true;
                    continue;
                }
                let (keys, times) = read_legacy_track(&mut c, frame_count, i == 1)?;
                bone[i].keys = keys;
                bone[i].times = times;
            }
            // stored order is translation first; expose rotation first
            bone.swap(0, 1);
            tracks.push(bone);
        }
        let consumed = c.pos();
        if consumed != size as u64 {
            return Err(Error::parse(
                r.pos(),
                format!("legacy track data not fully consumed ({consumed} of {size})"),
            ));
        }
        Ok(Self { raw, tracks })
    }

    /// Expand the decoded keys into uniform per-frame samples.
    pub fn to_primitives(&self, frame_count: u32) -> AnimPrimitives {
        let tracks = self
            .tracks
            .iter()
            .map(|bone| {
                let sample = |track: &LegacyTrack, frame: u32| -> [f32; 3] {
                    if track.keys.is_empty() {
                        return [0.0; 3];
                    }
                    // nearest stored key at or before the frame time
                    let mut index = 0;
                    for (i, t) in track.times.iter().enumerate() {
                        if *t <= frame as f32 {
                            index = i;
                        }
                    }
                    track.keys[index]
                };
                let mut out = crate::primitives::BoneTrackPrimitive::default();
                for frame in 0..frame_count {
                    let rot = sample(&bone[0], frame);
                    out.rotations.push(quat_from_xyz_f32(rot));
                    let pos = sample(&bone[1], frame);
                    out.positions.push(DVec3::new(pos[0] as f64, pos[1] as f64, pos[2] as f64));
                    let scale = if bone[2].default {
                        DVec3::ONE
                    } else {
                        let s = sample(&bone[2], frame);
                        DVec3::new(s[0] as f64, s[1] as f64, s[2] as f64)
                    };
                    out.scales.push(scale);
                }
                out
            })
            .collect();
        AnimPrimitives { tracks, frame_count, sample_rate: 30 }
    }
}

fn quat_from_xyz_f32(v: [f32; 3]) -> DQuat {
    let (x, y, z) = (v[0] as f64, v[1] as f64, v[2] as f64);
    let w2 = 1.0 - x * x - y * y - z * z;
    DQuat::from_xyzw(x, y, z, w2.max(0.0).sqrt())
}

/// Decode one legacy sub-track at the cursor.
fn read_legacy_track<R: Read + Seek>(
    r: &mut Reader<R>,
    frame_count: u32,
    quat: bool,
) -> Result<(Vec<[f32; 3]>, Vec<f32>)> {
    let info = r.read_u32()?;
    let format = COMPRESSION_FORMATS
        .get((info >> 28) as usize)
        .copied()
        .ok_or_else(|| Error::unsupported(format!("track format {}", info >> 28)))?;
    let component_mask = (info >> 24) & 0xF;
    let key_count = info & 0x00FF_FFFF;
    let has_time_track = component_mask & 8 != 0;
    if format == "ACF_None" {
        return Err(Error::unsupported(format!("track format {format}")));
    }

    let mut range = [[0f32; 3], [0f32; 3]];
    if format == "ACF_IntervalFixed32NoW" {
        for c in 0..3 {
            if component_mask & (1 << c) != 0 {
                range[0][c] = r.read_f32()?;
                range[1][c] = r.read_f32()?;
            }
        }
    }

    let mut keys = Vec::with_capacity(key_count as usize);
    for _ in 0..key_count {
        let mut vec = [0f32; 3];
        match format {
            "ACF_Float96NoW" => {
                for c in 0..3 {
                    if component_mask & (1 << c) != 0 {
                        vec[c] = r.read_f32()?;
                    }
                }
            }
            "ACF_Fixed48NoW" => {
                for c in 0..3 {
                    if component_mask & (1 << c) != 0 {
                        let v = r.read_u16()? as f32;
                        vec[c] = if quat { (v - 32767.0) / 32767.0 } else { v - 255.0 };
                    }
                }
            }
            "ACF_IntervalFixed32NoW" => {
                let packed = r.read_u32()?;
                let parts = if quat {
                    [
                        ((packed >> 21) & 0x7FF) as f32 / 1023.0 - 1.0,
                        ((packed >> 10) & 0x7FF) as f32 / 1023.0 - 1.0,
                        (packed & 0x3FF) as f32 / 511.0 - 1.0,
                    ]
                } else {
                    [
                        (packed & 0x3FF) as f32 / 511.0 - 1.0,
                        ((packed >> 10) & 0x7FF) as f32 / 1023.0 - 1.0,
                        ((packed >> 21) & 0x7FF) as f32 / 1023.0 - 1.0,
                    ]
                };
                for c in 0..3 {
                    vec[c] = parts[c] * range[1][c] + range[0][c];
                }
            }
            "ACF_Identity" => {}
            other => return Err(Error::unsupported(format!("track format {other}"))),
        }
        keys.push(vec);
    }

    skip_alignment(r)?;

    let times = if has_time_track {
        let times: Vec<f32> = if frame_count < 256 {
            (0..key_count)
                .map(|_| r.read_u8().map(|v| v as f32))
                .collect::<Result<_>>()?
        } else {
            (0..key_count)
                .map(|_| r.read_u16().map(|v| v as f32))
                .collect::<Result<_>>()?
        };
        skip_alignment(r)?;
        times
    } else {
        let interval = if key_count > 1 {
            frame_count as f32 / (key_count - 1) as f32
        } else {
            0.0
        };
        (0..key_count).map(|i| interval * i as f32).collect()
    };
    Ok((keys, times))
}

/// Consume 0x55 padding up to 4-byte alignment.
fn skip_alignment<R: Read + Seek>(r: &mut Reader<R>) -> Result<()> {
    while r.pos() % 4 != 0 {
        let pad = r.read_u8()?;
        r.check(pad, 0x55, "track padding")?;
    }
    Ok(())
}
