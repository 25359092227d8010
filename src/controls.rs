// controls.rs — orbit controls: the camera circles its target on a sphere
//
// Zoom and pan are disabled; only the polar/azimuth angles change.

use glam::{Mat4, Vec3};
use std::f32::consts::{PI, TAU};

const EPS: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
}

impl CameraPose {
    pub fn new(position: Vec3, target: Vec3) -> Self {
        Self {
            position,
            target,
            up: Vec3::Y,
        }
    }

    /// Unit vector from the camera towards its target.
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).try_normalize().unwrap_or(Vec3::NEG_Z)
    }

    /// Camera-local right axis. Falls back to +X when looking along `up`.
    pub fn right(&self) -> Vec3 {
        self.forward().cross(self.up).try_normalize().unwrap_or(Vec3::X)
    }

    /// Up vector usable by `look_at`; swapped for +Z when parallel to the view.
    pub fn safe_up(&self) -> Vec3 {
        if self.forward().cross(self.up).length_squared() < EPS {
            Vec3::Z
        } else {
            self.up
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward(), self.safe_up())
    }
}

/// Spherical coordinates with +Y as the polar axis.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Spherical {
    radius: f32,
    /// Angle from +Y.
    phi: f32,
    /// Angle around +Y, measured from +Z towards +X.
    theta: f32,
}

impl Spherical {
    fn from_vec(v: Vec3) -> Self {
        let radius = v.length();
        if radius < EPS {
            return Self {
                radius: 0.0,
                phi: 0.0,
                theta: 0.0,
            };
        }
        Self {
            radius,
            phi: (v.y / radius).clamp(-1.0, 1.0).acos(),
            theta: v.x.atan2(v.z),
        }
    }

    fn to_vec(self) -> Vec3 {
        let sin_phi = self.phi.sin();
        Vec3::new(
            self.radius * sin_phi * self.theta.sin(),
            self.radius * self.phi.cos(),
            self.radius * sin_phi * self.theta.cos(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub target: Vec3,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    pub rotate_speed: f32,
    /// Fraction of the pending rotation applied per update; `None` applies it all.
    pub damping: Option<f32>,
    pub enabled: bool,
    delta_theta: f32,
    delta_phi: f32,
}

impl OrbitControls {
    pub fn new(target: Vec3) -> Self {
        Self {
            target,
            min_polar_angle: 0.0,
            max_polar_angle: PI,
            rotate_speed: 1.0,
            damping: None,
            enabled: true,
            delta_theta: 0.0,
            delta_phi: 0.0,
        }
    }

    pub fn set_polar_limits(&mut self, min: f32, max: f32) {
        self.min_polar_angle = min;
        self.max_polar_angle = max;
    }

    pub fn polar_limits(&self) -> (f32, f32) {
        (self.min_polar_angle, self.max_polar_angle)
    }

    pub fn rotate_left(&mut self, angle: f32) {
        self.delta_theta -= angle;
    }

    pub fn rotate_up(&mut self, angle: f32) {
        self.delta_phi -= angle;
    }

    /// Pointer drag in physical pixels over a viewport `height` pixels tall.
    pub fn on_drag(&mut self, dx: f32, dy: f32, height: f32) {
        if !self.enabled || height <= 0.0 {
            return;
        }
        self.rotate_left(TAU * dx / height * self.rotate_speed);
        self.rotate_up(TAU * dy / height * self.rotate_speed);
    }

    /// Discard any rotation still waiting to be applied.
    pub fn reset_motion(&mut self) {
        self.delta_theta = 0.0;
        self.delta_phi = 0.0;
    }

    /// Move `pose` according to pending rotation and the polar limits.
    /// Returns whether the camera moved.
    pub fn update(&mut self, pose: &mut CameraPose) -> bool {
        let offset = pose.position - self.target;
        let mut s = Spherical::from_vec(offset);

        let factor = self.damping.map_or(1.0, |d| d.clamp(0.0, 1.0));
        s.theta += self.delta_theta * factor;
        s.phi += self.delta_phi * factor;

        s.phi = s.phi.clamp(self.min_polar_angle, self.max_polar_angle);
        s.phi = s.phi.clamp(EPS, PI - EPS);

        let position = self.target + s.to_vec();
        pose.target = self.target;

        match self.damping {
            Some(_) => {
                self.delta_theta *= 1.0 - factor;
                self.delta_phi *= 1.0 - factor;
            }
            None => self.reset_motion(),
        }

        let moved = position.distance_squared(pose.position) > EPS;
        pose.position = position;
        moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn close(a: Vec3, b: Vec3) -> bool {
        a.distance(b) < 1e-4
    }

    #[test]
    fn spherical_round_trip() {
        let v = Vec3::new(3.0, -2.0, 5.0);
        assert!(close(Spherical::from_vec(v).to_vec(), v));
    }

    #[test]
    fn update_without_input_keeps_pose() {
        let mut controls = OrbitControls::new(Vec3::ZERO);
        let mut pose = CameraPose::new(Vec3::new(0.0, 0.0, 200.0), Vec3::ZERO);
        assert!(!controls.update(&mut pose));
        assert!(close(pose.position, Vec3::new(0.0, 0.0, 200.0)));
    }

    #[test]
    fn polar_angle_is_clamped() {
        let mut controls = OrbitControls::new(Vec3::new(0.0, 0.0, -1.0));
        controls.set_polar_limits(FRAC_PI_2, PI);
        let mut pose = CameraPose::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0));

        // Try to drag the camera above its target.
        controls.rotate_up(1.0);
        controls.update(&mut pose);
        let offset = pose.position - controls.target;
        let phi = (offset.y / offset.length()).acos();
        assert!(phi >= FRAC_PI_2 - 1e-4);
    }

    #[test]
    fn drag_orbits_at_constant_distance() {
        let mut controls = OrbitControls::new(Vec3::ZERO);
        let mut pose = CameraPose::new(Vec3::new(0.0, 0.0, 200.0), Vec3::ZERO);
        controls.on_drag(120.0, 40.0, 600.0);
        assert!(controls.update(&mut pose));
        assert!((pose.position.length() - 200.0).abs() < 1e-2);
    }

    #[test]
    fn damping_spreads_rotation_over_updates() {
        let mut controls = OrbitControls::new(Vec3::ZERO);
        controls.damping = Some(0.5);
        let mut pose = CameraPose::new(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO);
        controls.rotate_left(1.0);
        controls.update(&mut pose);
        let first = pose.position;
        assert!(controls.update(&mut pose));
        assert!(!close(first, pose.position));
    }

    #[test]
    fn disabled_controls_ignore_drag() {
        let mut controls = OrbitControls::new(Vec3::ZERO);
        controls.enabled = false;
        let mut pose = CameraPose::new(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO);
        controls.on_drag(300.0, 0.0, 600.0);
        assert!(!controls.update(&mut pose));
    }

    #[test]
    fn right_axis_fallback() {
        let pose = CameraPose::new(Vec3::ZERO, Vec3::Y);
        assert_eq!(pose.right(), Vec3::X);
        let pose = CameraPose::new(Vec3::ZERO, Vec3::NEG_Z);
        assert!(close(pose.right(), Vec3::X));
    }
}
