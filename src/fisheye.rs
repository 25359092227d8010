// fisheye.rs — fisheye-to-hemisphere texture coordinate mapping
//
// An equidistant fisheye frame stores the zenith at the image centre and the
// horizon on the inscribed circle. Each hemisphere vertex is mapped by its
// polar angle (distance from the centre) and its azimuth (angle around it).

use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_2;

/// How the sampler treats coordinates that leave the unit square (scale > 1).
/// Vertex UVs are never altered; clamping per vertex would bend triangles
/// that straddle the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UvEdge {
    /// Edge texels are stretched outwards.
    #[default]
    Clamp,
    /// The texture tiles.
    Repeat,
}

impl UvEdge {
    pub fn address_mode(self) -> wgpu::AddressMode {
        match self {
            UvEdge::Clamp => wgpu::AddressMode::ClampToEdge,
            UvEdge::Repeat => wgpu::AddressMode::Repeat,
        }
    }
}

/// Texture coordinate for a single vertex on a hemisphere of `radius`.
pub fn fisheye_uv(position: [f32; 3], radius: f32, scale: f32) -> [f32; 2] {
    let [x, y, z] = position;

    // y / R can drift slightly past ±1 for vertices generated with sin/cos
    let phi = (y / radius).clamp(-1.0, 1.0).acos();
    let theta = z.atan2(x);
    let r = (phi / FRAC_PI_2) * scale * 0.5;

    [0.5 + r * theta.cos(), 0.5 + r * theta.sin()]
}

/// Compute fresh texture coordinates for every position.
pub fn remap(positions: &[[f32; 3]], radius: f32, scale: f32) -> Vec<[f32; 2]> {
    positions
        .iter()
        .map(|&p| fisheye_uv(p, radius, scale))
        .collect()
}

/// Same as [`remap`] but writes into an existing buffer, replacing its contents.
pub fn remap_into(
    positions: &[[f32; 3]],
    radius: f32,
    scale: f32,
    uvs: &mut Vec<[f32; 2]>,
) {
    uvs.clear();
    uvs.extend(positions.iter().map(|&p| fisheye_uv(p, radius, scale)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::build_hemisphere;

    const EPS: f32 = 1e-5;

    #[test]
    fn unit_scale_stays_inside_unit_square() {
        let mesh = build_hemisphere(100.0, 64, 64);
        let uvs = remap(mesh.positions(), 100.0, 1.0);
        assert_eq!(uvs.len(), mesh.positions().len());
        for [u, v] in uvs {
            assert!((-EPS..=1.0 + EPS).contains(&u), "u = {u}");
            assert!((-EPS..=1.0 + EPS).contains(&v), "v = {v}");
        }
    }

    #[test]
    fn pole_maps_to_centre() {
        let [u, v] = fisheye_uv([0.0, 100.0, 0.0], 100.0, 1.0);
        assert!((u - 0.5).abs() < EPS);
        assert!((v - 0.5).abs() < EPS);
    }

    #[test]
    fn equator_maps_to_inscribed_circle() {
        for i in 0..16 {
            let a = i as f32 / 16.0 * std::f32::consts::TAU;
            let p = [100.0 * a.cos(), 0.0, 100.0 * a.sin()];
            let [u, v] = fisheye_uv(p, 100.0, 1.0);
            let r = ((u - 0.5).powi(2) + (v - 0.5).powi(2)).sqrt();
            assert!((r - 0.5).abs() < 1e-4, "radius {r} at azimuth {a}");
        }
    }

    #[test]
    fn remap_is_deterministic() {
        let mesh = build_hemisphere(100.0, 32, 16);
        let a = remap(mesh.positions(), 100.0, 1.7);
        let b = remap(mesh.positions(), 100.0, 1.7);
        let bits = |uvs: &[[f32; 2]]| -> Vec<(u32, u32)> {
            uvs.iter().map(|[u, v]| (u.to_bits(), v.to_bits())).collect()
        };
        assert_eq!(bits(&a), bits(&b));
    }

    #[test]
    fn remap_into_does_not_drift() {
        let mesh = build_hemisphere(100.0, 16, 16);
        let expected = remap(mesh.positions(), 100.0, 2.5);
        let mut uvs = Vec::new();
        for _ in 0..5 {
            remap_into(mesh.positions(), 100.0, 2.5, &mut uvs);
        }
        assert_eq!(uvs, expected);
    }

    #[test]
    fn large_scale_leaves_coordinates_raw() {
        // one vertex on the equator, its neighbour just above it
        let a = fisheye_uv([100.0, 0.0, 0.0], 100.0, 2.0);
        let b = fisheye_uv([99.0, 14.1, 0.0], 100.0, 2.0);
        assert!((a[0] - 1.5).abs() < EPS);
        assert!(b[0] > 1.0 && b[0] < a[0]);
        assert!((a[1] - 0.5).abs() < EPS);
    }

    #[test]
    fn edge_policy_only_picks_address_mode() {
        assert_eq!(UvEdge::default(), UvEdge::Clamp);
        assert_eq!(UvEdge::Clamp.address_mode(), wgpu::AddressMode::ClampToEdge);
        assert_eq!(UvEdge::Repeat.address_mode(), wgpu::AddressMode::Repeat);
    }
}
