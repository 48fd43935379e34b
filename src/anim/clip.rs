//! Compressed animation clip codec.
//!
//! Decodes the bit-packed, range-reduced per-bone track format (one
//! supported scheme: variable-rate quaternion-drop-w rotations and
//! variable-rate vectors). The decode is a strict pipeline with early
//! hard-fail branches; anything but the supported variant aborts.
//!
//! Re-encoding does not reproduce the original packing: the only write path
//! for modified data forces every track to full 32-bit precision in a
//! single segment with both range-reduction layers disabled. This is a
//! known fidelity loss, not an attempt to match the source encoding.
//! Unmodified clips round-trip verbatim from the retained raw buffer.

use std::io::{Cursor, Read, Seek, Write};

use glam::{DQuat, DVec3};

use crate::primitives::{AnimPrimitives, BoneTrackPrimitive};
use crate::util::{Error, Reader, Result, Writer};

/// Buffer tag of the supported clip container.
const BUFFER_TAG: [u8; 4] = [0x10, 0xAC, 0x10, 0xAC];
/// Supported serialized clip version.
const CLIP_VERSION: u16 = 3;

/// Allowed per-track bit widths; the byte stored in the file indexes this
/// table. 0 means constant within the segment, 32 is raw full precision.
const BIT_RATES: [u8; 19] = [0, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 32];

const ROTATION_QUAT_DROP_W_VARIABLE: u8 = 4;
const VECTOR_VARIABLE: u8 = 3;

/// Sub-track attributes per bone, in serialized order.
const ATTRIBUTES: usize = 3; // rotation, translation, scale

/// Fixed clip header.
#[derive(Debug, Clone, Default)]
pub struct ClipHeader {
    pub num_bones: u16,
    pub num_segments: u16,
    pub rotation_format: u8,
    pub translation_format: u8,
    pub scale_format: u8,
    pub clip_range_reduction: u8,
    pub segment_range_reduction: u8,
    pub has_scale: u8,
    pub default_scale: u8,
    pub num_samples: u32,
    pub sample_rate: u32,
    pub segment_headers_offset: u16,
    pub default_tracks_bitset_offset: u16,
    pub constant_tracks_bitset_offset: u16,
    pub constant_tracks_data_offset: u16,
    pub clip_range_data_offset: u16,
}

impl ClipHeader {
    fn read<R: Read + Seek>(r: &mut Reader<R>) -> Result<Self> {
        let num_bones = r.read_u16()?;
        let num_segments = r.read_u16()?;
        let rotation_format = r.read_u8()?;
        let translation_format = r.read_u8()?;
        let scale_format = r.read_u8()?;
        let clip_range_reduction = r.read_u8()?;
        let segment_range_reduction = r.read_u8()?;
        let has_scale = r.read_u8()?;
        let default_scale = r.read_u8()?;
        let _padding = r.read_u8()?;
        let num_samples = r.read_u32()?;
        let sample_rate = r.read_u32()?;
        let segment_headers_offset = r.read_u16()?;
        let default_tracks_bitset_offset = r.read_u16()?;
        let constant_tracks_bitset_offset = r.read_u16()?;
        let constant_tracks_data_offset = r.read_u16()?;
        let clip_range_data_offset = r.read_u16()?;
        let _padding2 = r.read_u16()?;
        Ok(Self {
            num_bones,
            num_segments,
            rotation_format,
            translation_format,
            scale_format,
            clip_range_reduction,
            segment_range_reduction,
            has_scale,
            default_scale,
            num_samples,
            sample_rate,
            segment_headers_offset,
            default_tracks_bitset_offset,
            constant_tracks_bitset_offset,
            constant_tracks_data_offset,
            clip_range_data_offset,
        })
    }

    fn write<W: Write + Seek>(&self, w: &mut Writer<W>) -> Result<()> {
        w.write_u16(self.num_bones)?;
        w.write_u16(self.num_segments)?;
        w.write_u8(self.rotation_format)?;
        w.write_u8(self.translation_format)?;
        w.write_u8(self.scale_format)?;
        w.write_u8(self.clip_range_reduction)?;
        w.write_u8(self.segment_range_reduction)?;
        w.write_u8(self.has_scale)?;
        w.write_u8(self.default_scale)?;
        w.write_u8(0)?;
        w.write_u32(self.num_samples)?;
        w.write_u32(self.sample_rate)?;
        w.write_u16(self.segment_headers_offset)?;
        w.write_u16(self.default_tracks_bitset_offset)?;
        w.write_u16(self.constant_tracks_bitset_offset)?;
        w.write_u16(self.constant_tracks_data_offset)?;
        w.write_u16(self.clip_range_data_offset)?;
        w.write_u16(0)
    }
}

/// Per-segment header.
#[derive(Debug, Clone, Default)]
pub struct SegmentHeader {
    pub num_samples: u32,
    pub animated_pose_bit_size: i32,
    pub format_per_track_data_offset: i32,
    pub range_data_offset: i32,
    pub track_data_offset: i32,
}

impl SegmentHeader {
    fn read<R: Read + Seek>(r: &mut Reader<R>) -> Result<Self> {
        Ok(Self {
            num_samples: r.read_u32()?,
            animated_pose_bit_size: r.read_i32()?,
            format_per_track_data_offset: r.read_i32()?,
            range_data_offset: r.read_i32()?,
            track_data_offset: r.read_i32()?,
        })
    }

    fn write<W: Write + Seek>(&self, w: &mut Writer<W>) -> Result<()> {
        w.write_u32(self.num_samples)?;
        w.write_i32(self.animated_pose_bit_size)?;
        w.write_i32(self.format_per_track_data_offset)?;
        w.write_i32(self.range_data_offset)?;
        w.write_i32(self.track_data_offset)
    }
}

/// MSB-first bit cursor over 32-bit words.
struct BitReader {
    words: Vec<u32>,
    bit: usize,
}

impl BitReader {
    fn new(words: Vec<u32>) -> Self {
        Self { words, bit: 0 }
    }

    fn read(&mut self, bits: u32) -> Result<u32> {
        let mut out: u32 = 0;
        for _ in 0..bits {
            let word = self.bit / 32;
            let shift = 31 - (self.bit % 32);
            let b = self
                .words
                .get(word)
                .ok_or_else(|| Error::parse(0, "track data exhausted"))?;
            out = (out << 1) | ((b >> shift) & 1);
            self.bit += 1;
        }
        Ok(out)
    }
}

/// MSB-first bit sink producing 32-bit words.
struct BitWriter {
    words: Vec<u32>,
    bit: usize,
}

impl BitWriter {
    fn new() -> Self {
        Self { words: Vec::new(), bit: 0 }
    }

    fn write(&mut self, value: u32, bits: u32) {
        for i in (0..bits).rev() {
            let word = self.bit / 32;
            if word == self.words.len() {
                self.words.push(0);
            }
            let shift = 31 - (self.bit % 32);
            self.words[word] |= ((value >> i) & 1) << shift;
            self.bit += 1;
        }
    }
}

/// Per-sub-track state resolved from the bitsets.
#[derive(Debug, Clone, Copy, PartialEq)]
enum TrackKind {
    Default,
    Constant,
    Animated,
}

/// A parsed compressed clip.
///
/// The raw buffer is retained so an unmodified clip writes back verbatim;
/// [`CompressedClip::import_tracks`] rebuilds it.
#[derive(Debug, Clone)]
pub struct CompressedClip {
    /// Entire clip buffer, size field included
    pub raw: Vec<u8>,
    /// Stored content hash, preserved through re-encodes
    pub stored_hash: [u8; 4],
    pub header: ClipHeader,
    pub segments: Vec<SegmentHeader>,
    /// Decoded per-bone tracks
    pub tracks: Vec<BoneTrackPrimitive>,
}

impl CompressedClip {
    /// Total serialized size in bytes.
    #[inline]
    pub fn byte_size(&self) -> usize {
        self.raw.len()
    }

    pub fn read<R: Read + Seek>(r: &mut Reader<R>) -> Result<Self> {
        let start = r.pos();
        let size = r.read_u32()?;
        r.seek(start)?;
        let raw = r.read_bytes(size as usize)?;
        let mut clip = Self::parse(&raw, start)?;
        clip.raw = raw;
        Ok(clip)
    }

    pub fn write<W: Write + Seek>(&self, w: &mut Writer<W>) -> Result<()> {
        w.write_bytes(&self.raw)
    }

    /// Decode a clip buffer. `origin` is only used for error offsets.
    fn parse(raw: &[u8], origin: u64) -> Result<Self> {
        let mut r = Reader::new(Cursor::new(raw));

        let size = r.read_u32()?;
        if size as usize != raw.len() {
            return Err(Error::parse(origin + r.pos(), "clip size does not match buffer"));
        }
        let stored_hash = r.read_array::<4>()?;
        let tag = r.read_array::<4>()?;
        if tag != BUFFER_TAG {
            return Err(Error::unsupported("animation buffer tag"));
        }
        let version = r.read_u16()?;
        if version != CLIP_VERSION {
            return Err(Error::unsupported(format!("animation clip version {version}")));
        }
        let algorithm = r.read_u8()?;
        if algorithm != 0 {
            return Err(Error::unsupported("only uniformly sampled clips are supported"));
        }
        let padding = r.read_u8()?;
        r.check(padding, 0, "clip header padding")?;

        let header = ClipHeader::read(&mut r)?;
        if header.rotation_format != ROTATION_QUAT_DROP_W_VARIABLE {
            return Err(Error::unsupported(format!(
                "rotation format {}",
                header.rotation_format
            )));
        }
        if header.translation_format != VECTOR_VARIABLE || header.scale_format != VECTOR_VARIABLE {
            return Err(Error::unsupported("translation/scale format"));
        }
        if header.has_scale == 0 {
            return Err(Error::unsupported("clips without scale tracks"));
        }

        r.check(r.pos(), header.segment_headers_offset as u64, "segment headers offset")?;
        let mut segments = Vec::with_capacity(header.num_segments as usize);
        for _ in 0..header.num_segments {
            segments.push(SegmentHeader::read(&mut r)?);
        }

        r.check(
            r.pos(),
            header.default_tracks_bitset_offset as u64,
            "default bitset offset",
        )?;
        let track_bits = header.num_bones as usize * ATTRIBUTES;
        let bitset_words = (header.constant_tracks_bitset_offset
            - header.default_tracks_bitset_offset) as usize
            / 4;
        let default_bitset = r.read_u32_array_len(bitset_words)?;
        let constant_bitset = r.read_u32_array_len(bitset_words)?;

        let kind_of = |index: usize| -> TrackKind {
            let word = index / 32;
            let bit = 31 - (index % 32);
            if default_bitset[word] >> bit & 1 == 1 {
                TrackKind::Default
            } else if constant_bitset[word] >> bit & 1 == 1 {
                TrackKind::Constant
            } else {
                TrackKind::Animated
            }
        };
        let kinds: Vec<TrackKind> = (0..track_bits).map(kind_of).collect();

        r.check(
            r.pos(),
            header.constant_tracks_data_offset as u64,
            "constant pool offset",
        )?;
        let constant_floats = (header.clip_range_data_offset
            - header.constant_tracks_data_offset) as usize
            / 4;
        let constant_pool = r.read_f32_array_len(constant_floats)?;

        // clip-wide range data, one (min, extent) vec3 pair per animated
        // sub-track, present only when clip range reduction is enabled
        r.check(r.pos(), header.clip_range_data_offset as u64, "clip range data offset")?;
        let animated: Vec<usize> = (0..track_bits)
            .filter(|i| kinds[*i] != TrackKind::Constant && kinds[*i] != TrackKind::Default)
            .collect();
        let constant_only: Vec<usize> = (0..track_bits)
            .filter(|i| kinds[*i] == TrackKind::Constant)
            .collect();
        let mut clip_ranges = vec![([0f32; 3], [0f32; 3]); animated.len()];
        if header.clip_range_reduction != 0 {
            for range in clip_ranges.iter_mut() {
                for v in range.0.iter_mut() {
                    *v = r.read_f32()?;
                }
                for v in range.1.iter_mut() {
                    *v = r.read_f32()?;
                }
            }
        }

        // per-segment decode: bit-rate table, optional fixed-point segment
        // ranges, then the packed samples
        let mut samples: Vec<Vec<[f64; 3]>> = vec![Vec::new(); animated.len()];
        for segment in &segments {
            r.check(
                r.pos(),
                segment.format_per_track_data_offset as u64,
                "per-track data offset",
            )?;
            let mut bit_rates = Vec::with_capacity(animated.len());
            for _ in 0..animated.len() {
                let index = r.read_u8()? as usize;
                let rate = *BIT_RATES
                    .get(index)
                    .ok_or_else(|| Error::unsupported(format!("bit rate index {index}")))?;
                bit_rates.push(rate);
            }
            while r.pos() % 4 != 0 {
                let pad = r.read_u8()?;
                r.check(pad, 0xCD, "per-track data padding")?;
            }

            let mut segment_ranges = vec![([0u8; 3], [0u8; 3]); animated.len()];
            if header.segment_range_reduction != 0 {
                r.check(r.pos(), segment.range_data_offset as u64, "segment range data offset")?;
                for range in segment_ranges.iter_mut() {
                    range.0 = r.read_array::<3>()?;
                    range.1 = r.read_array::<3>()?;
                }
            }

            r.check(r.pos(), segment.track_data_offset as u64, "track data offset")?;
            let frame_bits: usize = bit_rates.iter().map(|b| *b as usize * 3).sum();
            let total_bits = frame_bits * segment.num_samples as usize;
            let words = r.read_u32_array_len(total_bits.div_ceil(32))?;
            let mut bits = BitReader::new(words);

            for _ in 0..segment.num_samples {
                for (t, rate) in bit_rates.iter().enumerate() {
                    let mut value = [0f64; 3];
                    for (c, v) in value.iter_mut().enumerate() {
                        match *rate {
                            32 => {
                                // raw full precision, no normalization and
                                // no range expansion
                                *v = f32::from_bits(bits.read(32)?) as f64;
                                continue;
                            }
                            0 => {
                                // constant within the segment, stored in the
                                // segment range data
                                *v = segment_ranges[t].0[c] as f64 / 255.0;
                            }
                            rate => {
                                let max = (1u64 << rate) - 1;
                                *v = bits.read(rate as u32)? as f64 / max as f64;
                                if header.segment_range_reduction != 0 {
                                    let min = segment_ranges[t].0[c] as f64 / 255.0;
                                    let extent = segment_ranges[t].1[c] as f64 / 255.0;
                                    *v = *v * extent + min;
                                }
                            }
                        }
                        if header.clip_range_reduction != 0 {
                            let (min, extent) = clip_ranges[t];
                            *v = *v * extent[c] as f64 + min[c] as f64;
                        }
                    }
                    samples[t].push(value);
                }
            }
        }

        // assemble per-bone tracks: defaults are identity, constants come
        // from the pool, animated tracks concatenate their segment runs
        let mut constant_cursor = 0usize;
        let mut constants = vec![[0f64; 3]; track_bits];
        for index in &constant_only {
            for c in 0..3 {
                constants[*index][c] = constant_pool
                    .get(constant_cursor + c)
                    .copied()
                    .ok_or_else(|| Error::parse(origin + r.pos(), "constant pool exhausted"))?
                    as f64;
            }
            constant_cursor += 3;
        }

        let animated_index: std::collections::HashMap<usize, usize> =
            animated.iter().enumerate().map(|(i, t)| (*t, i)).collect();

        let num_samples = header.num_samples as usize;
        let mut tracks = Vec::with_capacity(header.num_bones as usize);
        for bone in 0..header.num_bones as usize {
            let mut track = BoneTrackPrimitive::default();
            for attr in 0..ATTRIBUTES {
                let index = bone * ATTRIBUTES + attr;
                let values: Vec<[f64; 3]> = match kinds[index] {
                    TrackKind::Default => {
                        let identity = if attr == 2 { [1.0, 1.0, 1.0] } else { [0.0; 3] };
                        vec![identity; num_samples]
                    }
                    TrackKind::Constant => vec![constants[index]; num_samples],
                    TrackKind::Animated => samples[animated_index[&index]].clone(),
                };
                match attr {
                    0 => track.rotations = values.iter().map(|v| quat_from_xyz(v)).collect(),
                    1 => track.positions = values.iter().map(|v| DVec3::from_array(*v)).collect(),
                    _ => track.scales = values.iter().map(|v| DVec3::from_array(*v)).collect(),
                }
            }
            tracks.push(track);
        }

        Ok(Self {
            raw: Vec::new(),
            stored_hash,
            header,
            segments,
            tracks,
        })
    }

    /// Decoded tracks in collaborator shape.
    pub fn to_primitives(&self) -> AnimPrimitives {
        AnimPrimitives {
            tracks: self.tracks.clone(),
            frame_count: self.header.num_samples,
            sample_rate: self.header.sample_rate,
        }
    }

    /// Rebuild the clip from caller tracks at full precision.
    ///
    /// Every track becomes animated at bit rate 32 in a single segment with
    /// clip and segment range reduction disabled. The original packing is
    /// not reproduced; this is the documented fidelity loss of the write
    /// path.
    pub fn import_tracks(&mut self, prims: &AnimPrimitives) -> Result<()> {
        let num_bones = prims.tracks.len() as u16;
        let num_samples = prims.frame_count;
        for track in &prims.tracks {
            if track.rotations.len() != num_samples as usize
                || track.positions.len() != num_samples as usize
                || track.scales.len() != num_samples as usize
            {
                return Err(Error::constraint("every track must have one sample per frame"));
            }
        }

        let track_bits = num_bones as usize * ATTRIBUTES;
        let bitset_bytes = track_bits.div_ceil(32) * 4;
        let headers_end = 16 + 32;
        let default_offset = headers_end + 20;
        let constant_bitset_offset = default_offset + bitset_bytes;
        let constant_data_offset = constant_bitset_offset + bitset_bytes;
        let clip_range_offset = constant_data_offset; // empty pool
        if clip_range_offset > u16::MAX as usize {
            return Err(Error::constraint("clip has too many bones to re-encode"));
        }

        let header = ClipHeader {
            num_bones,
            num_segments: 1,
            rotation_format: ROTATION_QUAT_DROP_W_VARIABLE,
            translation_format: VECTOR_VARIABLE,
            scale_format: VECTOR_VARIABLE,
            clip_range_reduction: 0,
            segment_range_reduction: 0,
            has_scale: 1,
            default_scale: self.header.default_scale,
            num_samples,
            sample_rate: prims.sample_rate,
            segment_headers_offset: headers_end as u16,
            default_tracks_bitset_offset: default_offset as u16,
            constant_tracks_bitset_offset: constant_bitset_offset as u16,
            constant_tracks_data_offset: constant_data_offset as u16,
            clip_range_data_offset: clip_range_offset as u16,
        };

        // per-track byte table (all rate 32), padded to a word boundary
        let rate_index = BIT_RATES.iter().position(|b| *b == 32).unwrap() as u8;
        let mut rate_table = vec![rate_index; track_bits];
        while (clip_range_offset + rate_table.len()) % 4 != 0 {
            rate_table.push(0xCD);
        }
        let track_data_offset = clip_range_offset + rate_table.len();

        let segment = SegmentHeader {
            num_samples,
            animated_pose_bit_size: (track_bits * 3 * 32) as i32,
            format_per_track_data_offset: clip_range_offset as i32,
            range_data_offset: -1,
            track_data_offset: track_data_offset as i32,
        };

        let mut bits = BitWriter::new();
        for sample in 0..num_samples as usize {
            for track in &prims.tracks {
                let rot = track.rotations[sample];
                let pos = track.positions[sample];
                let scale = track.scales[sample];
                for v in [rot.x, rot.y, rot.z, pos.x, pos.y, pos.z, scale.x, scale.y, scale.z] {
                    bits.write((v as f32).to_bits(), 32);
                }
            }
        }

        let size = track_data_offset + bits.words.len() * 4;
        let mut w = Writer::new(Cursor::new(Vec::with_capacity(size)));
        w.write_u32(size as u32)?;
        w.write_bytes(&self.stored_hash)?;
        w.write_bytes(&BUFFER_TAG)?;
        w.write_u16(CLIP_VERSION)?;
        w.write_u8(0)?;
        w.write_u8(0)?;
        header.write(&mut w)?;
        segment.write(&mut w)?;
        w.write_null_array(bitset_bytes / 4)?; // default bitset
        w.write_null_array(bitset_bytes / 4)?; // constant bitset
        w.write_bytes(&rate_table)?;
        for word in &bits.words {
            w.write_u32(*word)?;
        }

        self.raw = w.into_inner().into_inner();
        self.header = header;
        self.segments = vec![segment];
        self.tracks = prims.tracks.clone();
        Ok(())
    }
}

/// Reconstruct the dropped quaternion w component.
fn quat_from_xyz(v: &[f64; 3]) -> DQuat {
    let w2 = 1.0 - v[0] * v[0] - v[1] * v[1] - v[2] * v[2];
    DQuat::from_xyzw(v[0], v[1], v[2], w2.max(0.0).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_prims(bones: usize, frames: u32) -> AnimPrimitives {
        let tracks = (0..bones)
            .map(|b| BoneTrackPrimitive {
                rotations: (0..frames)
                    .map(|f| quat_from_xyz(&[0.125 * b as f64, 0.25, 0.0625 * f as f64]))
                    .collect(),
                positions: (0..frames)
                    .map(|f| DVec3::new(f as f64, -1.5, b as f64 * 10.0))
                    .collect(),
                scales: vec![DVec3::ONE; frames as usize],
            })
            .collect();
        AnimPrimitives { tracks, frame_count: frames, sample_rate: 30 }
    }

    fn empty_clip() -> CompressedClip {
        CompressedClip {
            raw: Vec::new(),
            stored_hash: [1, 2, 3, 4],
            header: ClipHeader::default(),
            segments: Vec::new(),
            tracks: Vec::new(),
        }
    }

    #[test]
    fn test_bit_reader_msb_first() {
        let mut bits = BitReader::new(vec![0x8000_0001, 0xFFFF_FFFF]);
        assert_eq!(bits.read(1).unwrap(), 1);
        assert_eq!(bits.read(30).unwrap(), 0);
        assert_eq!(bits.read(2).unwrap(), 0b11);
        assert_eq!(bits.read(8).unwrap(), 0xFF);
    }

    #[test]
    fn test_bit_writer_round_trip() {
        let mut w = BitWriter::new();
        w.write(0b101, 3);
        w.write(0x1234_5678, 32);
        w.write(1, 1);
        let mut r = BitReader::new(w.words.clone());
        assert_eq!(r.read(3).unwrap(), 0b101);
        assert_eq!(r.read(32).unwrap(), 0x1234_5678);
        assert_eq!(r.read(1).unwrap(), 1);
    }

    #[test]
    fn test_full_precision_round_trip() -> Result<()> {
        let prims = synthetic_prims(2, 3);
        let mut clip = empty_clip();
        clip.import_tracks(&prims)?;

        let mut r = Reader::new(Cursor::new(clip.raw.clone()));
        let back = CompressedClip::read(&mut r)?;
        assert_eq!(back.header.num_bones, 2);
        assert_eq!(back.header.num_segments, 1);
        assert_eq!(back.stored_hash, [1, 2, 3, 4]);

        // bit rate 32 with both range reductions disabled is lossless for
        // f32 values
        for (a, b) in back.tracks.iter().zip(&prims.tracks) {
            for (x, y) in a.positions.iter().zip(&b.positions) {
                assert_eq!(*x, DVec3::new(y.x as f32 as f64, y.y as f32 as f64, y.z as f32 as f64));
            }
            for (x, y) in a.rotations.iter().zip(&b.rotations) {
                assert!((x.x - y.x as f32 as f64).abs() < 1e-7);
                assert!((x.w - y.w).abs() < 1e-6);
            }
        }
        Ok(())
    }

    #[test]
    fn test_single_bone_raw_floats_exact() -> Result<()> {
        // one bone, one segment, bit rate 32, no range reduction: decoded
        // samples must equal the raw values exactly
        let values = [0.25f32, -3.5, 1024.125];
        let prims = AnimPrimitives {
            tracks: vec![BoneTrackPrimitive {
                rotations: vec![DQuat::IDENTITY],
                positions: vec![DVec3::new(values[0] as f64, values[1] as f64, values[2] as f64)],
                scales: vec![DVec3::ONE],
            }],
            frame_count: 1,
            sample_rate: 60,
        };
        let mut clip = empty_clip();
        clip.import_tracks(&prims)?;
        let mut r = Reader::new(Cursor::new(clip.raw.clone()));
        let back = CompressedClip::read(&mut r)?;
        let pos = back.tracks[0].positions[0];
        assert_eq!(pos, DVec3::new(0.25, -3.5, 1024.125));
        assert_eq!(back.tracks[0].scales[0], DVec3::ONE);
        Ok(())
    }

    #[test]
    fn test_rejects_wrong_tag() {
        let mut raw = vec![0u8; 64];
        raw[0] = 64; // size
        let mut r = Reader::new(Cursor::new(raw));
        let err = CompressedClip::read(&mut r).unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }
}
