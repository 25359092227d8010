// minimap.rs — outside-view inset shown while the viewer is inside the dome
//
// The minimap camera sits on the main camera's forward ray, `standoff` units
// from the origin, and looks back at the dome centre. The ray is not negated:
// the inset shows the outside of the patch the viewer is currently facing.

use crate::config::DomeConfig;
use crate::controls::CameraPose;
use crate::view::{ViewController, ViewMode};
use glam::{Mat4, Vec3};

/// Screen rectangle in physical pixels, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

pub struct MinimapCompositor {
    standoff: f32,
    size: f32,
    margin: f32,
    fov_y: f32,
    near: f32,
    far: f32,
}

impl MinimapCompositor {
    pub fn new(config: &DomeConfig) -> Self {
        Self {
            standoff: config.minimap_standoff,
            size: config.minimap_size,
            margin: config.minimap_margin,
            fov_y: config.fov_degrees.to_radians(),
            near: 0.1,
            far: 500.0,
        }
    }

    /// Minimap camera for this frame, or `None` while the minimap is hidden.
    pub fn compose(&self, view: &ViewController) -> Option<CameraPose> {
        if view.mode() == ViewMode::Outside {
            return None;
        }
        let main = view.pose();
        Some(CameraPose {
            position: main.forward() * self.standoff,
            target: Vec3::ZERO,
            up: main.up,
        })
    }

    pub fn view_projection(&self, pose: &CameraPose) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, 1.0, self.near, self.far) * pose.view_matrix()
    }

    /// Inset rectangle anchored to the bottom-right corner of a surface.
    /// `scale_factor` converts the logical size and margin to physical pixels.
    pub fn viewport(&self, surface_width: u32, surface_height: u32, scale_factor: f32) -> Option<Viewport> {
        let size = self.size * scale_factor;
        let margin = self.margin * scale_factor;
        let (w, h) = (surface_width as f32, surface_height as f32);
        if size <= 0.0 || size + margin > w || size + margin > h {
            return None;
        }
        Some(Viewport {
            x: w - margin - size,
            y: h - margin - size,
            width: size,
            height: size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Material, Side};

    fn setup() -> (ViewController, MinimapCompositor) {
        let config = DomeConfig::default();
        (ViewController::new(&config), MinimapCompositor::new(&config))
    }

    #[test]
    fn follows_main_view_direction() {
        let (view, minimap) = setup();
        let pose = minimap.compose(&view).unwrap();
        assert!(pose.position.distance(Vec3::new(0.0, 0.0, -200.0)) < 1e-3);
        assert_eq!(pose.target, Vec3::ZERO);
        assert_eq!(pose.up, view.pose().up);
    }

    #[test]
    fn tracks_rotation_nudges() {
        let (mut view, minimap) = setup();
        view.rotate_left();
        view.rotate_left();
        let pose = minimap.compose(&view).unwrap();
        assert!((pose.position.length() - 200.0).abs() < 1e-2);
        let expected = view.pose().forward() * 200.0;
        assert!(pose.position.distance(expected) < 1e-3);
    }

    #[test]
    fn hidden_outside() {
        let (mut view, minimap) = setup();
        let mut material = Material::new(Side::Back);
        view.toggle(&mut material);
        assert!(minimap.compose(&view).is_none());
        view.toggle(&mut material);
        assert!(minimap.compose(&view).is_some());
    }

    #[test]
    fn view_projection_is_finite_when_looking_straight_up() {
        let (_, minimap) = setup();
        let pose = CameraPose {
            position: Vec3::new(0.0, 200.0, 0.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
        };
        let m = minimap.view_projection(&pose);
        assert!(m.is_finite());
    }

    #[test]
    fn viewport_in_bottom_right_corner() {
        let (_, minimap) = setup();
        let vp = minimap.viewport(1280, 720, 1.0).unwrap();
        assert_eq!(vp, Viewport { x: 1120.0, y: 560.0, width: 150.0, height: 150.0 });

        let hidpi = minimap.viewport(2560, 1440, 2.0).unwrap();
        assert_eq!(hidpi.width, 300.0);
        assert_eq!(hidpi.x, 2560.0 - 20.0 - 300.0);

        assert!(minimap.viewport(100, 100, 1.0).is_none());
    }
}
