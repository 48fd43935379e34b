//! Fixed-stride vertex and index buffer codecs.
//!
//! Every buffer is a (stride, count, raw bytes) triple with a typed
//! parse/build pair. Parsing returns flat column arrays; sections split
//! them by contiguous vertex-id ranges. Building flattens per-section data
//! back into one buffer and recomputes the framing fields.

use std::io::{Read, Seek, Write};

use glam::Vec3;
use half::f16;
use smallvec::SmallVec;

use crate::primitives::Influences;
use crate::util::{Error, Reader, Result, Writer};

/// Raw framed buffer: u32 stride, u32 count, `stride * count` bytes.
#[derive(Debug, Clone, Default)]
pub struct RawBuffer {
    pub stride: u32,
    pub count: u32,
    pub data: Vec<u8>,
}

impl RawBuffer {
    pub fn read<R: Read + Seek>(r: &mut Reader<R>) -> Result<Self> {
        let stride = r.read_u32()?;
        let count = r.read_u32()?;
        let data = r.read_bytes((stride * count) as usize)?;
        Ok(Self { stride, count, data })
    }

    pub fn write<W: Write + Seek>(&self, w: &mut Writer<W>) -> Result<()> {
        w.write_u32(self.stride)?;
        w.write_u32(self.count)?;
        w.write_bytes(&self.data)
    }
}

fn f32_at(data: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

fn uv_at(data: &[u8], offset: usize, use_float32: bool) -> [f32; 2] {
    if use_float32 {
        [f32_at(data, offset), f32_at(data, offset + 4)]
    } else {
        [
            f16::from_le_bytes([data[offset], data[offset + 1]]).to_f32(),
            f16::from_le_bytes([data[offset + 2], data[offset + 3]]).to_f32(),
        ]
    }
}

fn push_uv(out: &mut Vec<u8>, uv: [f32; 2], use_float32: bool) {
    if use_float32 {
        out.extend_from_slice(&uv[0].to_le_bytes());
        out.extend_from_slice(&uv[1].to_le_bytes());
    } else {
        out.extend_from_slice(&f16::from_f32(uv[0]).to_le_bytes());
        out.extend_from_slice(&f16::from_f32(uv[1]).to_le_bytes());
    }
}

/// Positions: 12 bytes per vertex, three f32. The framing repeats stride and
/// count before the buffer body.
#[derive(Debug, Clone, Default)]
pub struct PositionBuffer {
    pub raw: RawBuffer,
}

impl PositionBuffer {
    pub fn read<R: Read + Seek>(r: &mut Reader<R>) -> Result<Self> {
        let stride = r.read_u32()?;
        let count = r.read_u32()?;
        let raw = RawBuffer::read(r)?;
        r.check(stride, raw.stride, "position buffer stride")?;
        r.check(count, raw.count, "position buffer count")?;
        Ok(Self { raw })
    }

    pub fn write<W: Write + Seek>(&self, w: &mut Writer<W>) -> Result<()> {
        w.write_u32(self.raw.stride)?;
        w.write_u32(self.raw.count)?;
        self.raw.write(w)
    }

    #[inline]
    pub fn vertex_count(&self) -> u32 {
        self.raw.count
    }

    pub fn parse(&self) -> Vec<Vec3> {
        (0..self.raw.count as usize)
            .map(|i| {
                let o = i * 12;
                Vec3::new(
                    f32_at(&self.raw.data, o),
                    f32_at(&self.raw.data, o + 4),
                    f32_at(&self.raw.data, o + 8),
                )
            })
            .collect()
    }

    pub fn build(&mut self, positions: &[Vec3]) {
        let mut data = Vec::with_capacity(positions.len() * 12);
        for p in positions {
            data.extend_from_slice(bytemuck::bytes_of(p));
        }
        self.raw = RawBuffer { stride: 12, count: positions.len() as u32, data };
    }
}

/// Packed tangent-frame entries: tangent xyz, bitangent sign, normal xyz,
/// one padding byte. Components map [-1, 1] onto 0..=255.
pub type PackedNormal = [u8; 8];

/// Standalone packed-normal buffer (split-buffer layouts).
#[derive(Debug, Clone, Default)]
pub struct PackedNormalBuffer {
    pub raw: RawBuffer,
}

impl PackedNormalBuffer {
    pub fn read<R: Read + Seek>(r: &mut Reader<R>) -> Result<Self> {
        let raw = RawBuffer::read(r)?;
        r.check(raw.stride, 8, "normal buffer stride")?;
        Ok(Self { raw })
    }

    pub fn write<W: Write + Seek>(&self, w: &mut Writer<W>) -> Result<()> {
        self.raw.write(w)
    }

    pub fn parse(&self) -> Vec<PackedNormal> {
        self.raw
            .data
            .chunks_exact(8)
            .map(|c| <[u8; 8]>::try_from(c).unwrap())
            .collect()
    }

    pub fn build(&mut self, normals: &[PackedNormal]) {
        let mut data = Vec::with_capacity(normals.len() * 8);
        for n in normals {
            data.extend_from_slice(n);
        }
        self.raw = RawBuffer { stride: 8, count: normals.len() as u32, data };
    }
}

/// Unpack the normal word of a packed entry into biased xyz bytes.
pub fn unpack_normal_word(entry: &PackedNormal) -> [u8; 3] {
    let word = u32::from_le_bytes([entry[4], entry[5], entry[6], entry[7]]) ^ 0x8080_8080;
    [(word & 0xFF) as u8, ((word >> 8) & 0xFF) as u8, ((word >> 16) & 0xFF) as u8]
}

/// UV channels: 2 half or single floats per channel per vertex, channel
/// count explicit, interleaved per vertex.
#[derive(Debug, Clone, Default)]
pub struct UvBuffer {
    pub uv_count: u32,
    pub use_float32: bool,
    pub raw: RawBuffer,
}

impl UvBuffer {
    pub fn read<R: Read + Seek>(r: &mut Reader<R>, uv_count: u32, use_float32: bool) -> Result<Self> {
        let raw = RawBuffer::read(r)?;
        r.check(raw.stride, 4 * (1 + use_float32 as u32), "uv buffer stride")?;
        Ok(Self { uv_count, use_float32, raw })
    }

    pub fn write<W: Write + Seek>(&self, w: &mut Writer<W>) -> Result<()> {
        self.raw.write(w)
    }

    /// Per-channel vertex UV lists.
    pub fn parse(&self) -> Vec<Vec<[f32; 2]>> {
        let pair = 4 * (1 + self.use_float32 as usize);
        let uv_count = self.uv_count.max(1) as usize;
        let vertex_count = self.raw.count as usize / uv_count;
        (0..uv_count)
            .map(|channel| {
                (0..vertex_count)
                    .map(|v| {
                        let o = (v * uv_count + channel) * pair;
                        uv_at(&self.raw.data, o, self.use_float32)
                    })
                    .collect()
            })
            .collect()
    }

    pub fn build(&mut self, channels: &[Vec<[f32; 2]>]) {
        let vertex_count = channels.first().map_or(0, Vec::len);
        self.uv_count = channels.len() as u32;
        let pair = 4 * (1 + self.use_float32 as usize);
        let mut data = Vec::with_capacity(vertex_count * channels.len() * pair);
        for v in 0..vertex_count {
            for channel in channels {
                push_uv(&mut data, channel[v], self.use_float32);
            }
        }
        self.raw = RawBuffer {
            stride: pair as u32,
            count: (vertex_count * channels.len()) as u32,
            data,
        };
    }
}

/// Combined skeletal vertex buffer (older single-buffer layout): packed
/// normals, position, and UV channels share one stride.
#[derive(Debug, Clone, Default)]
pub struct CombinedVertexBuffer {
    pub uv_count: u32,
    pub use_float32: bool,
    pub raw: RawBuffer,
}

impl CombinedVertexBuffer {
    pub fn read<R: Read + Seek>(r: &mut Reader<R>) -> Result<Self> {
        let one = r.read_u16()?;
        r.check(one, 1, "vertex buffer strip flags")?;
        let uv_count = r.read_u32()?;
        let use_float32 = r.read_u32()? != 0;
        for _ in 0..3 {
            let ext = r.read_f32()?;
            r.check(ext, 1.0, "mesh extension must be one")?;
        }
        r.expect_null_array(3, "mesh origin must be zero")?;
        let raw = RawBuffer::read(r)?;
        Ok(Self { uv_count, use_float32, raw })
    }

    pub fn write<W: Write + Seek>(&self, w: &mut Writer<W>) -> Result<()> {
        w.write_u16(1)?;
        w.write_u32(self.uv_count)?;
        w.write_u32(self.use_float32 as u32)?;
        w.write_f32_array(&[1.0, 1.0, 1.0])?;
        w.write_null_array(3)?;
        self.raw.write(w)
    }

    #[inline]
    pub fn vertex_count(&self) -> u32 {
        self.raw.count
    }

    fn stride_for(&self, uv_count: u32) -> usize {
        20 + (1 + self.use_float32 as usize) * 4 * uv_count as usize
    }

    /// Split into packed normals, positions, and per-channel UV lists.
    pub fn parse(&self) -> (Vec<PackedNormal>, Vec<Vec3>, Vec<Vec<[f32; 2]>>) {
        let stride = self.stride_for(self.uv_count);
        let count = self.raw.count as usize;
        let mut normals = Vec::with_capacity(count);
        let mut positions = Vec::with_capacity(count);
        let mut uvs: Vec<Vec<[f32; 2]>> = vec![Vec::with_capacity(count); self.uv_count as usize];
        for i in 0..count {
            let base = i * stride;
            normals.push(<[u8; 8]>::try_from(&self.raw.data[base..base + 8]).unwrap());
            positions.push(Vec3::new(
                f32_at(&self.raw.data, base + 8),
                f32_at(&self.raw.data, base + 12),
                f32_at(&self.raw.data, base + 16),
            ));
            for (j, channel) in uvs.iter_mut().enumerate() {
                let o = base + 20 + j * 4 * (1 + self.use_float32 as usize);
                channel.push(uv_at(&self.raw.data, o, self.use_float32));
            }
        }
        (normals, positions, uvs)
    }

    pub fn build(&mut self, normals: &[PackedNormal], positions: &[Vec3], uvs: &[Vec<[f32; 2]>]) {
        self.uv_count = uvs.len() as u32;
        let stride = self.stride_for(self.uv_count);
        let mut data = Vec::with_capacity(normals.len() * stride);
        for i in 0..normals.len() {
            data.extend_from_slice(&normals[i]);
            data.extend_from_slice(bytemuck::bytes_of(&positions[i]));
            for channel in uvs {
                push_uv(&mut data, channel[i], self.use_float32);
            }
        }
        self.raw = RawBuffer { stride: stride as u32, count: normals.len() as u32, data };
    }
}

/// Combined static-mesh vertex buffer: packed normals plus UV channels.
#[derive(Debug, Clone, Default)]
pub struct StaticCombinedBuffer {
    pub uv_count: u32,
    pub use_float32: bool,
    pub raw: RawBuffer,
}

impl StaticCombinedBuffer {
    pub fn read<R: Read + Seek>(r: &mut Reader<R>) -> Result<Self> {
        let one = r.read_u16()?;
        r.check(one, 1, "vertex buffer strip flags")?;
        let uv_count = r.read_u32()?;
        let stride = r.read_u32()?;
        let count = r.read_u32()?;
        let use_float32 = r.read_u32()? != 0;
        r.expect_null("vertex buffer padding")?;
        let raw = RawBuffer::read(r)?;
        r.check(stride, raw.stride, "vertex buffer stride")?;
        r.check(count, raw.count, "vertex buffer count")?;
        r.check(stride, 8 + uv_count * 4 * (1 + use_float32 as u32), "vertex buffer layout")?;
        Ok(Self { uv_count, use_float32, raw })
    }

    pub fn write<W: Write + Seek>(&self, w: &mut Writer<W>) -> Result<()> {
        w.write_u16(1)?;
        w.write_u32(self.uv_count)?;
        w.write_u32(self.raw.stride)?;
        w.write_u32(self.raw.count)?;
        w.write_u32(self.use_float32 as u32)?;
        w.write_null()?;
        self.raw.write(w)
    }

    pub fn parse(&self) -> (Vec<PackedNormal>, Vec<Vec<[f32; 2]>>) {
        let stride = self.raw.stride as usize;
        let count = self.raw.count as usize;
        let mut normals = Vec::with_capacity(count);
        let mut uvs: Vec<Vec<[f32; 2]>> = vec![Vec::with_capacity(count); self.uv_count as usize];
        for i in 0..count {
            let base = i * stride;
            normals.push(<[u8; 8]>::try_from(&self.raw.data[base..base + 8]).unwrap());
            for (j, channel) in uvs.iter_mut().enumerate() {
                let o = base + 8 + j * 4 * (1 + self.use_float32 as usize);
                channel.push(uv_at(&self.raw.data, o, self.use_float32));
            }
        }
        (normals, uvs)
    }

    pub fn build(&mut self, normals: &[PackedNormal], uvs: &[Vec<[f32; 2]>]) {
        self.uv_count = uvs.len() as u32;
        let stride = 8 + (1 + self.use_float32 as usize) * 4 * uvs.len();
        let mut data = Vec::with_capacity(normals.len() * stride);
        for i in 0..normals.len() {
            data.extend_from_slice(&normals[i]);
            for channel in uvs {
                push_uv(&mut data, channel[i], self.use_float32);
            }
        }
        self.raw = RawBuffer { stride: stride as u32, count: normals.len() as u32, data };
    }
}

/// Vertex colors. The body is absent when the stride is zero.
#[derive(Debug, Clone, Default)]
pub struct ColorBuffer {
    pub stride: u32,
    pub count: u32,
    pub raw: Option<RawBuffer>,
}

impl ColorBuffer {
    pub fn read<R: Read + Seek>(r: &mut Reader<R>) -> Result<Self> {
        let one = r.read_u16()?;
        r.check(one, 1, "color buffer strip flags")?;
        let stride = r.read_u32()?;
        let count = r.read_u32()?;
        if stride > 0 {
            let raw = RawBuffer::read(r)?;
            r.check(stride, raw.stride, "color buffer stride")?;
            r.check(count, raw.count, "color buffer count")?;
            Ok(Self { stride, count, raw: Some(raw) })
        } else {
            Ok(Self { stride, count, raw: None })
        }
    }

    pub fn write<W: Write + Seek>(&self, w: &mut Writer<W>) -> Result<()> {
        w.write_u16(1)?;
        w.write_u32(self.stride)?;
        w.write_u32(self.count)?;
        if let Some(raw) = &self.raw {
            raw.write(w)?;
        }
        Ok(())
    }

    /// Drop the colors entirely.
    pub fn disable(&mut self) {
        self.raw = None;
        self.stride = 0;
        self.count = 0;
    }
}

/// Skin weights, older framing: fixed 4 or 8 influences selected by the
/// extra-bone flag, joint bytes then weight bytes per vertex.
#[derive(Debug, Clone, Default)]
pub struct SkinWeightBuffer {
    pub extra_bone_flag: bool,
    pub raw: RawBuffer,
}

impl SkinWeightBuffer {
    pub fn read<R: Read + Seek>(r: &mut Reader<R>) -> Result<Self> {
        let one = r.read_u16()?;
        r.check(one, 1, "weight buffer strip flags")?;
        let extra_bone_flag = r.read_u32()? != 0;
        let count = r.read_u32()?;
        let raw = RawBuffer::read(r)?;
        r.check(count, raw.count, "weight buffer count")?;
        r.check(extra_bone_flag, raw.stride == 16, "weight buffer stride flag")?;
        Ok(Self { extra_bone_flag, raw })
    }

    pub fn write<W: Write + Seek>(&self, w: &mut Writer<W>) -> Result<()> {
        w.write_u16(1)?;
        w.write_u32(self.extra_bone_flag as u32)?;
        w.write_u32(self.raw.count)?;
        self.raw.write(w)
    }

    /// Per-vertex joint index and weight lists.
    pub fn parse(&self) -> (Vec<Influences>, Vec<Influences>) {
        let stride = self.raw.stride as usize;
        let half = stride / 2;
        let mut joints = Vec::with_capacity(self.raw.count as usize);
        let mut weights = Vec::with_capacity(self.raw.count as usize);
        for chunk in self.raw.data.chunks_exact(stride) {
            joints.push(SmallVec::from_slice(&chunk[..half]));
            weights.push(SmallVec::from_slice(&chunk[half..]));
        }
        (joints, weights)
    }

    /// Rebuild from per-vertex influences, zero-padded to the fixed width.
    pub fn build(&mut self, joints: &[Influences], weights: &[Influences], extra_bone: bool) {
        self.extra_bone_flag = extra_bone;
        let half = if extra_bone { 8 } else { 4 };
        let mut data = Vec::with_capacity(joints.len() * half * 2);
        for (j, w) in joints.iter().zip(weights) {
            let mut row = [0u8; 16];
            row[..j.len()].copy_from_slice(j);
            row[half..half + w.len()].copy_from_slice(w);
            data.extend_from_slice(&row[..half * 2]);
        }
        self.raw = RawBuffer { stride: half as u32 * 2, count: joints.len() as u32, data };
    }
}

/// Skin weights, newer framing: explicit influence count with a
/// count-times-vertices cross-check.
#[derive(Debug, Clone, Default)]
pub struct SkinWeightBuffer5 {
    pub influence_count: u32,
    pub raw: RawBuffer,
}

impl SkinWeightBuffer5 {
    pub fn read<R: Read + Seek>(r: &mut Reader<R>) -> Result<Self> {
        let one = r.read_u16()?;
        r.check(one, 1, "weight buffer strip flags")?;
        r.expect_null("weight buffer padding")?;
        let influence_count = r.read_u32()?;
        let influence_x_vertex = r.read_u32()?;
        let vertex_count = r.read_u32()?;
        r.check(influence_count * vertex_count, influence_x_vertex, "weight buffer counts")?;
        r.expect_null("weight buffer padding")?;
        let raw = RawBuffer::read(r)?;
        Ok(Self { influence_count, raw })
    }

    pub fn write<W: Write + Seek>(&self, w: &mut Writer<W>) -> Result<()> {
        w.write_u16(1)?;
        w.write_null()?;
        w.write_u32(self.influence_count)?;
        w.write_u32(self.raw.count / 2)?;
        w.write_u32(self.raw.count / 2 / self.influence_count.max(1))?;
        w.write_null()?;
        self.raw.write(w)
    }

    pub fn parse(&self) -> (Vec<Influences>, Vec<Influences>) {
        let stride = self.influence_count as usize * 2;
        let count = self.raw.data.len() / stride.max(1);
        let mut joints = Vec::with_capacity(count);
        let mut weights = Vec::with_capacity(count);
        for chunk in self.raw.data.chunks_exact(stride) {
            joints.push(SmallVec::from_slice(&chunk[..stride / 2]));
            weights.push(SmallVec::from_slice(&chunk[stride / 2..]));
        }
        (joints, weights)
    }

    pub fn build(&mut self, joints: &[Influences], weights: &[Influences]) {
        self.influence_count = joints.first().map_or(0, |j| j.len() as u32);
        let mut data = Vec::new();
        for (j, w) in joints.iter().zip(weights) {
            data.extend_from_slice(j);
            data.extend_from_slice(w);
        }
        let count = data.len() as u32;
        self.raw = RawBuffer { stride: self.raw.stride.max(1), count, data };
    }
}

fn indices_from_bytes(data: &[u8], width: usize) -> Vec<u32> {
    match width {
        2 => data
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]) as u32)
            .collect(),
        _ => data
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    }
}

fn indices_to_bytes(indices: &[u32], width: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(indices.len() * width);
    for i in indices {
        if width == 2 {
            data.extend_from_slice(&(*i as u16).to_le_bytes());
        } else {
            data.extend_from_slice(&i.to_le_bytes());
        }
    }
    data
}

/// Pick the index width for a vertex set: 16-bit iff it fits.
pub fn index_width_for(vertex_count: usize) -> usize {
    if vertex_count <= u16::MAX as usize {
        2
    } else {
        4
    }
}

/// Triangle list for static meshes. The raw buffer is byte-granular
/// (stride 1); the logical width lives in the u32 flag.
#[derive(Debug, Clone, Default)]
pub struct StaticIndexBuffer {
    pub use_u32: bool,
    pub raw: RawBuffer,
    pub tail_null: bool,
}

impl StaticIndexBuffer {
    pub fn read<R: Read + Seek>(r: &mut Reader<R>, tail_null: bool) -> Result<Self> {
        let use_u32 = r.read_u32()? != 0;
        let raw = RawBuffer::read(r)?;
        if tail_null {
            r.expect_null("index buffer tail")?;
        }
        Ok(Self { use_u32, raw, tail_null })
    }

    pub fn write<W: Write + Seek>(&self, w: &mut Writer<W>) -> Result<()> {
        w.write_u32(self.use_u32 as u32)?;
        self.raw.write(w)?;
        if self.tail_null {
            w.write_null()?;
        }
        Ok(())
    }

    #[inline]
    pub fn index_count(&self) -> usize {
        self.raw.data.len() / (2 + 2 * self.use_u32 as usize)
    }

    pub fn parse(&self) -> Vec<u32> {
        indices_from_bytes(&self.raw.data, 2 + 2 * self.use_u32 as usize)
    }

    pub fn build(&mut self, indices: &[u32], vertex_count: usize) {
        let width = index_width_for(vertex_count);
        self.use_u32 = width == 4;
        let data = indices_to_bytes(indices, width);
        self.raw = RawBuffer { stride: 1, count: data.len() as u32, data };
    }

    pub fn disable(&mut self) {
        self.build(&[], 0);
    }
}

/// Triangle list for skeletal meshes: a leading stride byte (2 or 4).
#[derive(Debug, Clone, Default)]
pub struct SkeletalIndexBuffer {
    pub raw: RawBuffer,
}

impl SkeletalIndexBuffer {
    pub fn read<R: Read + Seek>(r: &mut Reader<R>) -> Result<Self> {
        let stride = r.read_u8()?;
        let raw = RawBuffer::read(r)?;
        r.check(stride as u32, raw.stride, "index buffer stride")?;
        Ok(Self { raw })
    }

    pub fn write<W: Write + Seek>(&self, w: &mut Writer<W>) -> Result<()> {
        w.write_u8(self.raw.stride as u8)?;
        self.raw.write(w)
    }

    #[inline]
    pub fn index_count(&self) -> usize {
        self.raw.count as usize
    }

    pub fn parse(&self) -> Vec<u32> {
        indices_from_bytes(&self.raw.data, self.raw.stride as usize)
    }

    pub fn build(&mut self, indices: &[u32], vertex_count: usize) {
        let width = index_width_for(vertex_count);
        let data = indices_to_bytes(indices, width);
        self.raw = RawBuffer { stride: width as u32, count: indices.len() as u32, data };
    }
}

/// Opaque auxiliary buffers found in one customized variant, kept verbatim.
#[derive(Debug, Clone, Default)]
pub struct KdiBuffer {
    pub raw: RawBuffer,
}

impl KdiBuffer {
    pub fn read<R: Read + Seek>(r: &mut Reader<R>) -> Result<Self> {
        let one = r.read_u16()?;
        r.check(one, 1, "auxiliary buffer strip flags")?;
        Ok(Self { raw: RawBuffer::read(r)? })
    }

    pub fn write<W: Write + Seek>(&self, w: &mut Writer<W>) -> Result<()> {
        w.write_u16(1)?;
        self.raw.write(w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn round_trip<F, T>(write: F) -> Vec<u8>
    where
        F: FnOnce(&mut Writer<Cursor<Vec<u8>>>) -> Result<T>,
    {
        let mut w = Writer::new(Cursor::new(Vec::new()));
        write(&mut w).unwrap();
        w.into_inner().into_inner()
    }

    #[test]
    fn test_position_buffer() -> Result<()> {
        let mut vb = PositionBuffer::default();
        let points = vec![Vec3::new(1.0, 2.0, 3.0), Vec3::new(-1.0, 0.5, 0.0)];
        vb.build(&points);
        assert_eq!(vb.raw.stride, 12);
        assert_eq!(vb.vertex_count(), 2);

        let buf = round_trip(|w| vb.write(w));
        let mut r = Reader::new(Cursor::new(buf));
        let back = PositionBuffer::read(&mut r)?;
        assert_eq!(back.parse(), points);
        Ok(())
    }

    #[test]
    fn test_uv_buffer_half_precision() -> Result<()> {
        let mut vb = UvBuffer { use_float32: false, ..Default::default() };
        let channels = vec![
            vec![[0.0, 1.0], [0.5, 0.25]],
            vec![[1.0, 1.0], [0.0, 0.0]],
        ];
        vb.build(&channels);
        assert_eq!(vb.raw.stride, 4);
        assert_eq!(vb.raw.count, 4);

        let buf = round_trip(|w| vb.write(w));
        let mut r = Reader::new(Cursor::new(buf));
        let back = UvBuffer::read(&mut r, 2, false)?;
        assert_eq!(back.parse(), channels);
        Ok(())
    }

    #[test]
    fn test_combined_vertex_buffer() -> Result<()> {
        let mut vb = CombinedVertexBuffer { use_float32: true, ..Default::default() };
        let normals = vec![[128u8, 0, 0, 255, 0, 128, 0, 0]; 3];
        let positions = vec![Vec3::X, Vec3::Y, Vec3::Z];
        let uvs = vec![vec![[0.0, 0.0], [0.5, 0.5], [1.0, 1.0]]];
        vb.build(&normals, &positions, &uvs);
        assert_eq!(vb.raw.stride, 28);

        let buf = round_trip(|w| vb.write(w));
        let mut r = Reader::new(Cursor::new(buf));
        let back = CombinedVertexBuffer::read(&mut r)?;
        let (n, p, uv) = back.parse();
        assert_eq!(n, normals);
        assert_eq!(p, positions);
        assert_eq!(uv, uvs);
        Ok(())
    }

    #[test]
    fn test_skin_weight_buffer_widths() -> Result<()> {
        let joints = vec![Influences::from_slice(&[0, 1]), Influences::from_slice(&[2, 3])];
        let weights = vec![Influences::from_slice(&[200, 55]), Influences::from_slice(&[255, 0])];

        let mut vb = SkinWeightBuffer::default();
        vb.build(&joints, &weights, false);
        assert_eq!(vb.raw.stride, 8);
        let buf = round_trip(|w| vb.write(w));
        let mut r = Reader::new(Cursor::new(buf));
        let back = SkinWeightBuffer::read(&mut r)?;
        let (j, w) = back.parse();
        assert_eq!(j[0][..2], [0, 1]);
        assert_eq!(w[1][..2], [255, 0]);

        vb.build(&joints, &weights, true);
        assert_eq!(vb.raw.stride, 16);
        Ok(())
    }

    #[test]
    fn test_index_width_law() {
        assert_eq!(index_width_for(65535), 2);
        assert_eq!(index_width_for(65536), 4);

        let mut ib = SkeletalIndexBuffer::default();
        ib.build(&[0, 1, 2], 65535);
        assert_eq!(ib.raw.stride, 2);
        ib.build(&[0, 1, 2], 65536);
        assert_eq!(ib.raw.stride, 4);

        let mut ib = StaticIndexBuffer::default();
        ib.build(&[0, 1, 2], 10);
        assert!(!ib.use_u32);
        assert_eq!(ib.index_count(), 3);
        ib.build(&[0, 1, 2], 70000);
        assert!(ib.use_u32);
    }

    #[test]
    fn test_static_index_round_trip() -> Result<()> {
        let mut ib = StaticIndexBuffer { tail_null: true, ..Default::default() };
        ib.build(&[0, 2, 1, 2, 3, 1], 4);
        let buf = round_trip(|w| ib.write(w));
        let mut r = Reader::new(Cursor::new(buf));
        let back = StaticIndexBuffer::read(&mut r, true)?;
        assert_eq!(back.parse(), vec![0, 2, 1, 2, 3, 1]);
        Ok(())
    }

    #[test]
    fn test_color_buffer_empty_body() -> Result<()> {
        let mut cb = ColorBuffer { stride: 4, count: 2, raw: Some(RawBuffer { stride: 4, count: 2, data: vec![0xFF; 8] }) };
        cb.disable();
        let buf = round_trip(|w| cb.write(w));
        assert_eq!(buf.len(), 10);
        let mut r = Reader::new(Cursor::new(buf));
        let back = ColorBuffer::read(&mut r)?;
        assert!(back.raw.is_none());
        Ok(())
    }

    #[test]
    fn test_unpack_normal_word() {
        let entry = [0, 0, 0, 0, 0x80, 0x80, 0x80, 0];
        assert_eq!(unpack_normal_word(&entry), [0, 0, 0]);
        let entry = [0, 0, 0, 0, 0xFF, 0x80, 0x00, 0];
        assert_eq!(unpack_normal_word(&entry), [0x7F, 0, 0x80]);
    }
}
