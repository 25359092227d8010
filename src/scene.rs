// scene.rs — dome scene: one hemisphere shared by the main dome and the minimap dome

use crate::config::DomeConfig;
use crate::error::ScaleError;
use crate::fisheye::UvEdge;
use crate::mesh::{build_hemisphere, HemisphereMesh};

/// Fisheye stretch factor. Always positive and finite.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Scale(f32);

impl Scale {
    pub const DEFAULT: Scale = Scale(1.0);

    pub fn new(value: f32) -> Result<Self, ScaleError> {
        if value.is_finite() && value > 0.0 {
            Ok(Self(value))
        } else {
            Err(ScaleError::OutOfRange(value))
        }
    }

    pub fn parse(input: &str) -> Result<Self, ScaleError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ScaleError::Empty);
        }
        let value: f32 = trimmed
            .parse()
            .map_err(|_| ScaleError::NotANumber(trimmed.to_string()))?;
        Self::new(value)
    }

    pub fn get(self) -> f32 {
        self.0
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl std::fmt::Display for Scale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which faces of the dome are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Outer surface, for a camera outside the shell.
    Front,
    /// Inner surface, for a camera inside the shell.
    Back,
}

impl Side {
    /// Faces wgpu has to discard to show this side.
    pub fn cull_mode(self) -> wgpu::Face {
        match self {
            Side::Front => wgpu::Face::Back,
            Side::Back => wgpu::Face::Front,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Material {
    side: Side,
    needs_update: bool,
}

impl Material {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            needs_update: true,
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn set_side(&mut self, side: Side) {
        self.side = side;
        self.needs_update = true;
    }

    #[cfg(test)]
    pub fn needs_update(&self) -> bool {
        self.needs_update
    }

    /// Returns whether a refresh was pending and clears it.
    pub fn take_update(&mut self) -> bool {
        std::mem::take(&mut self.needs_update)
    }
}

/// Result of feeding the scale text field into the scene.
#[derive(Debug, Clone, PartialEq)]
pub enum ScaleOutcome {
    /// New scale accepted and UVs recomputed.
    Applied(Scale),
    /// Same as the current scale; nothing recomputed.
    Unchanged,
    /// Input rejected; the field now shows the current scale again.
    Rejected(ScaleError),
}

pub struct DomeScene {
    mesh: HemisphereMesh,
    scale: Scale,
    edge: UvEdge,
    dome_material: Material,
    minimap_material: Material,
    default_source: Option<String>,
    placeholder_source: Option<String>,
}

impl DomeScene {
    pub fn new(config: &DomeConfig) -> Self {
        let scale = Scale::new(config.scale).unwrap_or_default();
        let mut mesh = build_hemisphere(
            config.dome_radius,
            config.width_segments,
            config.height_segments,
        );
        mesh.rescale(scale.get());

        Self {
            mesh,
            scale,
            edge: config.uv_edge,
            dome_material: Material::new(Side::Back),
            minimap_material: Material::new(Side::Front),
            default_source: non_empty(config.video_source.as_deref()),
            placeholder_source: non_empty(config.placeholder_source.as_deref()),
        }
    }

    pub fn mesh(&self) -> &HemisphereMesh {
        &self.mesh
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }

    pub fn uv_edge(&self) -> UvEdge {
        self.edge
    }

    pub fn dome_material(&self) -> &Material {
        &self.dome_material
    }

    pub fn dome_material_mut(&mut self) -> &mut Material {
        &mut self.dome_material
    }

    pub fn minimap_material(&self) -> &Material {
        &self.minimap_material
    }

    /// Recompute UVs for `scale` unless it is already in effect.
    pub fn set_scale(&mut self, scale: Scale) -> bool {
        if scale == self.scale {
            return false;
        }
        self.mesh.rescale(scale.get());
        self.scale = scale;
        log::info!("dome scale set to {scale}");
        true
    }

    /// Apply the contents of the scale input field.
    pub fn apply_scale_input(&mut self, field: &mut String) -> ScaleOutcome {
        match Scale::parse(field) {
            Ok(scale) => {
                if self.set_scale(scale) {
                    ScaleOutcome::Applied(scale)
                } else {
                    ScaleOutcome::Unchanged
                }
            }
            Err(e) => {
                log::warn!("rejected scale input: {e}; keeping {}", self.scale);
                *field = self.scale.to_string();
                ScaleOutcome::Rejected(e)
            }
        }
    }

    pub fn default_source(&self) -> Option<&str> {
        self.default_source.as_deref()
    }

    /// Pick the source to load for `requested`, falling back to the
    /// placeholder when the request is blank.
    pub fn resolve_source(&self, requested: Option<&str>) -> Option<String> {
        if let Some(src) = non_empty(requested) {
            return Some(src);
        }
        match &self.placeholder_source {
            Some(p) => {
                log::info!("video source is empty, using placeholder {p}");
                Some(p.clone())
            }
            None => {
                log::warn!("video source is empty and no placeholder is configured");
                None
            }
        }
    }

    pub fn placeholder_source(&self) -> Option<&str> {
        self.placeholder_source.as_deref()
    }
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}
