// ui.rs — egui 控件层: playback buttons, view toggle, rotation nudges, inputs
//
// The overlay never touches scene state directly. It reports what was
// clicked as `UiAction`s and the application applies them between frames.

use crate::i18n::{tr, tr_with};
use crate::minimap::Viewport;
use crate::scene::Scale;
use crate::view::ViewMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Play,
    Pause,
    Stop,
    ToggleView,
    RotateLeft,
    RotateRight,
    RotateUp,
    RotateDown,
    VideoSource,
    Scale,
}

impl ControlKind {
    pub const ALL: [ControlKind; 10] = [
        ControlKind::Play,
        ControlKind::Pause,
        ControlKind::Stop,
        ControlKind::ToggleView,
        ControlKind::RotateLeft,
        ControlKind::RotateRight,
        ControlKind::RotateUp,
        ControlKind::RotateDown,
        ControlKind::VideoSource,
        ControlKind::Scale,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ControlKind::Play => "play",
            ControlKind::Pause => "pause",
            ControlKind::Stop => "stop",
            ControlKind::ToggleView => "toggle_view",
            ControlKind::RotateLeft => "rotate_left",
            ControlKind::RotateRight => "rotate_right",
            ControlKind::RotateUp => "rotate_up",
            ControlKind::RotateDown => "rotate_down",
            ControlKind::VideoSource => "video_source",
            ControlKind::Scale => "scale",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name.trim())
    }

    pub fn is_rotation(self) -> bool {
        matches!(
            self,
            ControlKind::RotateLeft
                | ControlKind::RotateRight
                | ControlKind::RotateUp
                | ControlKind::RotateDown
        )
    }
}

/// Resolve configured control names. Unknown names are reported and
/// skipped; the remaining controls keep working.
pub fn parse_controls(names: &[String]) -> Vec<ControlKind> {
    let mut controls = Vec::with_capacity(names.len());
    for name in names {
        match ControlKind::from_name(name) {
            Some(c) if !controls.contains(&c) => controls.push(c),
            Some(_) => log::warn!("control {name:?} listed twice, ignoring the repeat"),
            None => log::warn!("unknown control {name:?}, skipping it"),
        }
    }
    controls
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    Play,
    Pause,
    Stop,
    ToggleView,
    RotateLeft,
    RotateRight,
    RotateUp,
    RotateDown,
    ApplyScale,
    LoadSource,
    BrowseSource,
    ToggleFullscreen,
}

impl ControlKind {
    /// Action fired by this control's button; text inputs have none.
    pub fn action(self) -> Option<UiAction> {
        match self {
            ControlKind::Play => Some(UiAction::Play),
            ControlKind::Pause => Some(UiAction::Pause),
            ControlKind::Stop => Some(UiAction::Stop),
            ControlKind::ToggleView => Some(UiAction::ToggleView),
            ControlKind::RotateLeft => Some(UiAction::RotateLeft),
            ControlKind::RotateRight => Some(UiAction::RotateRight),
            ControlKind::RotateUp => Some(UiAction::RotateUp),
            ControlKind::RotateDown => Some(UiAction::RotateDown),
            ControlKind::VideoSource | ControlKind::Scale => None,
        }
    }
}

/// Text fields and control layout owned by the overlay.
#[derive(Debug, Clone)]
pub struct UiState {
    pub controls: Vec<ControlKind>,
    pub scale_field: String,
    pub source_field: String,
}

impl UiState {
    pub fn new(controls: Vec<ControlKind>, scale: Scale, source: Option<&str>) -> Self {
        Self {
            controls,
            scale_field: scale.to_string(),
            source_field: source.unwrap_or_default().to_string(),
        }
    }
}

/// Read-only view of the application for one frame of the overlay.
pub struct Overlay {
    pub mode: ViewMode,
    pub rotation_visible: bool,
    pub toggle_label_key: &'static str,
    pub paused: bool,
    pub has_source: bool,
    pub current_time: f64,
    pub scale: Scale,
    /// Minimap rectangle in physical pixels, when it is shown.
    pub minimap: Option<Viewport>,
    pub loading: bool,
}

fn button_label(kind: ControlKind, overlay: &Overlay) -> String {
    match kind {
        ControlKind::Play => tr("control.play"),
        ControlKind::Pause => tr("control.pause"),
        ControlKind::Stop => tr("control.stop"),
        ControlKind::ToggleView => tr(overlay.toggle_label_key),
        ControlKind::RotateLeft => tr("control.rotate_left"),
        ControlKind::RotateRight => tr("control.rotate_right"),
        ControlKind::RotateUp => tr("control.rotate_up"),
        ControlKind::RotateDown => tr("control.rotate_down"),
        ControlKind::VideoSource => tr("control.video_source"),
        ControlKind::Scale => tr("control.scale"),
    }
}

pub fn draw_ui(ctx: &egui::Context, state: &mut UiState, overlay: &Overlay) -> Vec<UiAction> {
    let mut actions = Vec::new();

    egui::TopBottomPanel::top("controls").show(ctx, |ui| {
        ui.horizontal_wrapped(|ui| {
            for &kind in &state.controls {
                if kind.is_rotation() && !overlay.rotation_visible {
                    continue;
                }
                match kind {
                    ControlKind::VideoSource => {
                        ui.separator();
                        ui.label(button_label(kind, overlay));
                        let response = ui.add(
                            egui::TextEdit::singleline(&mut state.source_field).desired_width(220.0),
                        );
                        if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                            actions.push(UiAction::LoadSource);
                        }
                        if ui.button(tr("control.load")).clicked() {
                            actions.push(UiAction::LoadSource);
                        }
                        if ui.button(tr("control.browse")).clicked() {
                            actions.push(UiAction::BrowseSource);
                        }
                    }
                    ControlKind::Scale => {
                        ui.separator();
                        ui.label(button_label(kind, overlay));
                        let response = ui.add(
                            egui::TextEdit::singleline(&mut state.scale_field).desired_width(48.0),
                        );
                        if response.lost_focus() {
                            actions.push(UiAction::ApplyScale);
                        }
                    }
                    _ => {
                        if ui.button(button_label(kind, overlay)).clicked() {
                            if let Some(action) = kind.action() {
                                actions.push(action);
                            }
                        }
                    }
                }
            }
        });
    });

    egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
        ui.horizontal(|ui| {
            if overlay.loading {
                ui.label(egui::RichText::new(tr("status.loading")).color(egui::Color32::YELLOW));
                ui.label("|");
            }
            let mode = match overlay.mode {
                ViewMode::Inside => tr("status.mode_inside"),
                ViewMode::Outside => tr("status.mode_outside"),
            };
            ui.label(mode);
            ui.label("|");
            ui.label(tr_with("status.scale", &[("scale", overlay.scale.to_string())]));
            ui.label("|");
            if overlay.has_source {
                let key = if overlay.paused { "status.paused" } else { "status.playing" };
                ui.label(tr_with(key, &[("time", format!("{:.2}", overlay.current_time))]));
            } else {
                ui.label(tr("status.no_source"));
            }
        });
    });

    if let Some(vp) = overlay.minimap {
        let ppp = ctx.pixels_per_point();
        let rect = egui::Rect::from_min_size(
            egui::pos2(vp.x / ppp, vp.y / ppp),
            egui::vec2(vp.width / ppp, vp.height / ppp),
        );
        ctx.layer_painter(egui::LayerId::new(
            egui::Order::Foreground,
            egui::Id::new("minimap_border"),
        ))
        .rect_stroke(rect, 0.0, egui::Stroke::new(2.0, egui::Color32::RED));
    }

    actions
}
