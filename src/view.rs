// view.rs — inside/outside view state machine and the main camera

use crate::config::DomeConfig;
use crate::controls::{CameraPose, OrbitControls};
use crate::scene::{Material, Side};
use glam::{Mat4, Quat, Vec3};
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

const INSIDE_TARGET: Vec3 = Vec3::new(0.0, 0.0, -1.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    /// Camera at the dome centre, looking at the inner surface.
    #[default]
    Inside,
    /// Camera orbiting the dome, looking at the outer surface.
    Outside,
}

impl ViewMode {
    pub fn other(self) -> Self {
        match self {
            ViewMode::Inside => ViewMode::Outside,
            ViewMode::Outside => ViewMode::Inside,
        }
    }
}

/// Main camera, its orbit controls and everything that depends on the view mode.
pub struct ViewController {
    mode: ViewMode,
    pose: CameraPose,
    controls: OrbitControls,
    dome_rotation: Quat,

    outside_distance: f32,
    outside_tilt: f32,

    fov_y: f32,
    aspect: f32,
    near: f32,
    far: f32,
}

impl ViewController {
    pub fn new(config: &DomeConfig) -> Self {
        let mut controls = OrbitControls::new(INSIDE_TARGET);
        controls.rotate_speed = config.rotate_speed;
        controls.damping = config.damping;

        let mut view = Self {
            mode: ViewMode::Inside,
            pose: CameraPose::new(Vec3::ZERO, INSIDE_TARGET),
            controls,
            dome_rotation: Quat::IDENTITY,
            outside_distance: config.outside_distance,
            outside_tilt: config.outside_tilt_degrees.to_radians(),
            fov_y: config.fov_degrees.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        };
        view.enter(ViewMode::Inside);
        view
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn pose(&self) -> &CameraPose {
        &self.pose
    }

    #[cfg(test)]
    pub fn controls(&self) -> &OrbitControls {
        &self.controls
    }

    #[cfg(test)]
    pub fn dome_rotation(&self) -> Quat {
        self.dome_rotation
    }

    pub fn rotation_controls_visible(&self) -> bool {
        self.mode == ViewMode::Inside
    }

    /// i18n key for the toggle button: it names the view it switches to.
    pub fn toggle_label_key(&self) -> &'static str {
        match self.mode {
            ViewMode::Inside => "view.outside",
            ViewMode::Outside => "view.inside",
        }
    }

    /// Switch between inside and outside. All mode-dependent state changes
    /// together, including the dome material's culled side.
    pub fn toggle(&mut self, material: &mut Material) -> ViewMode {
        let next = self.mode.other();
        self.enter(next);
        material.set_side(match next {
            ViewMode::Inside => Side::Back,
            ViewMode::Outside => Side::Front,
        });
        log::debug!("view mode -> {next:?}");
        next
    }

    fn enter(&mut self, mode: ViewMode) {
        self.mode = mode;
        self.controls.reset_motion();
        match mode {
            ViewMode::Inside => {
                self.pose = CameraPose::new(Vec3::ZERO, INSIDE_TARGET);
                self.controls.target = INSIDE_TARGET;
                // 水平 .. 天顶
                self.controls.set_polar_limits(FRAC_PI_2, PI);
                self.dome_rotation = Quat::IDENTITY;
            }
            ViewMode::Outside => {
                self.pose = CameraPose::new(Vec3::new(0.0, 0.0, self.outside_distance), Vec3::ZERO);
                self.controls.target = Vec3::ZERO;
                self.controls.set_polar_limits(0.0, PI);
                self.dome_rotation = Quat::from_rotation_x(self.outside_tilt);
            }
        }
    }

    pub fn rotate_left(&mut self) -> bool {
        self.nudge(Vec3::Y, -FRAC_PI_4)
    }

    pub fn rotate_right(&mut self) -> bool {
        self.nudge(Vec3::Y, FRAC_PI_4)
    }

    pub fn rotate_up(&mut self) -> bool {
        let axis = self.pose.right();
        self.nudge(axis, -FRAC_PI_4)
    }

    pub fn rotate_down(&mut self) -> bool {
        let axis = self.pose.right();
        self.nudge(axis, FRAC_PI_4)
    }

    /// Rotate the look target about `axis` through the origin. Inside only.
    fn nudge(&mut self, axis: Vec3, angle: f32) -> bool {
        if self.mode == ViewMode::Outside {
            return false;
        }
        self.controls.target = Quat::from_axis_angle(axis, angle) * self.controls.target;
        self.controls.update(&mut self.pose);
        true
    }

    /// Advance the orbit controls for this frame.
    pub fn update(&mut self) -> bool {
        self.controls.update(&mut self.pose)
    }

    pub fn on_drag(&mut self, dx: f32, dy: f32, height: f32) {
        self.controls.on_drag(dx, dy, height);
    }

    /// Pointer drags over the overlay must not turn the camera.
    pub fn set_drag_enabled(&mut self, enabled: bool) {
        self.controls.enabled = enabled;
    }

    pub fn set_aspect(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    #[cfg(test)]
    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.pose.view_matrix()
    }

    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_quat(self.dome_rotation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec3, b: Vec3) -> bool {
        a.distance(b) < 1e-4
    }

    fn setup() -> (ViewController, Material) {
        let config = DomeConfig {
            outside_tilt_degrees: 30.0,
            ..DomeConfig::default()
        };
        (ViewController::new(&config), Material::new(Side::Back))
    }

    #[test]
    fn starts_inside() {
        let (view, _) = setup();
        assert_eq!(view.mode(), ViewMode::Inside);
        assert_eq!(view.pose().position, Vec3::ZERO);
        assert_eq!(view.controls().target, INSIDE_TARGET);
        assert_eq!(view.controls().polar_limits(), (FRAC_PI_2, PI));
        assert!(view.rotation_controls_visible());
    }

    #[test]
    fn toggle_to_outside() {
        let (mut view, mut material) = setup();
        material.take_update();

        assert_eq!(view.toggle(&mut material), ViewMode::Outside);
        assert_eq!(view.pose().position, Vec3::new(0.0, 0.0, 200.0));
        assert_eq!(view.controls().target, Vec3::ZERO);
        assert_eq!(view.controls().polar_limits(), (0.0, PI));
        assert_eq!(material.side(), Side::Front);
        assert!(material.needs_update());
        assert!(!view.rotation_controls_visible());
        assert_eq!(view.toggle_label_key(), "view.inside");
        assert_ne!(view.dome_rotation(), Quat::IDENTITY);
    }

    #[test]
    fn toggle_twice_restores_state() {
        let (mut view, mut material) = setup();
        let pose = *view.pose();
        let target = view.controls().target;
        let limits = view.controls().polar_limits();
        let side = material.side();
        let visible = view.rotation_controls_visible();
        let label = view.toggle_label_key();

        view.toggle(&mut material);
        view.toggle(&mut material);

        assert_eq!(view.mode(), ViewMode::Inside);
        assert_eq!(*view.pose(), pose);
        assert_eq!(view.controls().target, target);
        assert_eq!(view.controls().polar_limits(), limits);
        assert_eq!(material.side(), side);
        assert_eq!(view.rotation_controls_visible(), visible);
        assert_eq!(view.toggle_label_key(), label);
        assert_eq!(view.dome_rotation(), Quat::IDENTITY);
    }

    #[test]
    fn four_left_nudges_make_a_half_turn() {
        let (mut view, _) = setup();
        for _ in 0..4 {
            assert!(view.rotate_left());
        }
        assert!(close(view.controls().target, -INSIDE_TARGET));
    }

    #[test]
    fn eight_left_nudges_make_a_full_turn() {
        let (mut view, _) = setup();
        for _ in 0..8 {
            view.rotate_left();
        }
        assert!(close(view.controls().target, INSIDE_TARGET));
        assert!(close(view.pose().position, Vec3::ZERO));
    }

    #[test]
    fn left_and_right_cancel() {
        let (mut view, _) = setup();
        view.rotate_left();
        view.rotate_right();
        assert!(close(view.controls().target, INSIDE_TARGET));
    }

    #[test]
    fn rotate_right_swings_target_to_negative_x() {
        let (mut view, _) = setup();
        view.rotate_right();
        let t = view.controls().target;
        assert!(t.x < 0.0 && t.z < 0.0, "target {t}");
    }

    #[test]
    fn vertical_nudges_pivot_about_camera_right() {
        let (mut view, _) = setup();
        view.rotate_up();
        let t = view.controls().target;
        assert!((t.length() - 1.0).abs() < 1e-4);
        assert!(t.x.abs() < 1e-4);
        assert!(t.y.abs() > 0.5);
    }

    #[test]
    fn nudges_do_nothing_outside() {
        let (mut view, mut material) = setup();
        view.toggle(&mut material);
        let pose = *view.pose();
        let target = view.controls().target;

        assert!(!view.rotate_up());
        assert!(!view.rotate_down());
        assert!(!view.rotate_left());
        assert!(!view.rotate_right());
        assert_eq!(*view.pose(), pose);
        assert_eq!(view.controls().target, target);
    }

    #[test]
    fn rotation_controls_follow_mode() {
        let (mut view, mut material) = setup();
        view.toggle(&mut material);
        assert!(!view.rotation_controls_visible());
        view.toggle(&mut material);
        assert!(view.rotation_controls_visible());
    }

    #[test]
    fn drag_ignored_while_disabled() {
        let (mut view, mut material) = setup();
        view.toggle(&mut material);
        let start = view.pose().position;

        view.set_drag_enabled(false);
        view.on_drag(120.0, 0.0, 720.0);
        view.update();
        assert!(close(view.pose().position, start));

        view.set_drag_enabled(true);
        view.on_drag(120.0, 0.0, 720.0);
        view.update();
        assert!(!close(view.pose().position, start));
    }

    #[test]
    fn aspect_ignores_zero_size() {
        let (mut view, _) = setup();
        view.set_aspect(800, 400);
        assert_eq!(view.aspect(), 2.0);
        view.set_aspect(0, 400);
        assert_eq!(view.aspect(), 2.0);
    }
}
