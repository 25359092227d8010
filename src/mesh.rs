// mesh.rs — 半球网格 (hemisphere mesh) with fisheye texture coordinates

use crate::fisheye;
use bytemuck::{Pod, Zeroable};
use std::f32::consts::{FRAC_PI_2, TAU};

/// Interleaved vertex uploaded to the GPU.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct DomeVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

impl DomeVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2];

    pub fn buffer_layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Upper half of a parametric sphere, pole at +Y.
///
/// Positions are fixed once built. Texture coordinates are recomputed
/// wholesale by [`HemisphereMesh::rescale`]; every recomputation bumps
/// `uv_generation` so the renderer can tell when to re-upload.
#[derive(Debug, Clone)]
pub struct HemisphereMesh {
    radius: f32,
    positions: Vec<[f32; 3]>,
    uvs: Vec<[f32; 2]>,
    indices: Vec<u32>,
    uv_generation: u64,
}

impl HemisphereMesh {
    #[cfg(test)]
    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    #[cfg(test)]
    pub fn uvs(&self) -> &[[f32; 2]] {
        &self.uvs
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn uv_generation(&self) -> u64 {
        self.uv_generation
    }

    /// Replace all texture coordinates with the fisheye mapping for `scale`.
    pub fn rescale(&mut self, scale: f32) {
        fisheye::remap_into(&self.positions, self.radius, scale, &mut self.uvs);
        self.uv_generation += 1;
    }

    pub fn vertices(&self) -> Vec<DomeVertex> {
        self.positions
            .iter()
            .zip(&self.uvs)
            .map(|(&position, &uv)| DomeVertex { position, uv })
            .collect()
    }
}

/// Build the hemisphere with `width_segments` around the azimuth and
/// `height_segments` from the pole down to the equator.
///
/// UVs start out as the plain parametric grid; call
/// [`HemisphereMesh::rescale`] to apply the fisheye mapping.
pub fn build_hemisphere(radius: f32, width_segments: usize, height_segments: usize) -> HemisphereMesh {
    let width_segments = width_segments.max(3);
    let height_segments = height_segments.max(2);

    let count = (width_segments + 1) * (height_segments + 1);
    let mut positions = Vec::with_capacity(count);
    let mut uvs = Vec::with_capacity(count);
    let mut indices = Vec::with_capacity(width_segments * height_segments * 6);

    for iy in 0..=height_segments {
        let v = iy as f32 / height_segments as f32;
        let polar = v * FRAC_PI_2;
        let (sin_p, cos_p) = polar.sin_cos();

        for ix in 0..=width_segments {
            let u = ix as f32 / width_segments as f32;
            let azimuth = u * TAU;

            let x = -radius * azimuth.cos() * sin_p;
            let y = radius * cos_p;
            let z = radius * azimuth.sin() * sin_p;

            positions.push([x, y, z]);
            uvs.push([u, 1.0 - v]);
        }
    }

    // 外侧为正面 (CCW seen from outside); the pole row has degenerate
    // first triangles, skip them
    let row = width_segments + 1;
    for iy in 0..height_segments {
        for ix in 0..width_segments {
            let a = (iy * row + ix + 1) as u32;
            let b = (iy * row + ix) as u32;
            let c = ((iy + 1) * row + ix) as u32;
            let d = ((iy + 1) * row + ix + 1) as u32;

            if iy != 0 {
                indices.extend_from_slice(&[a, b, d]);
            }
            indices.extend_from_slice(&[b, c, d]);
        }
    }

    HemisphereMesh {
        radius,
        positions,
        uvs,
        indices,
        uv_generation: 0,
    }
}
