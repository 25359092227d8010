// main.rs — 窗口、事件循环和拖拽交互

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // 在 Release 模式下隐藏控制台窗口

mod app;
mod config;
mod controls;
mod decoder;
mod error;
mod fisheye;
mod i18n;
mod media;
mod mesh;
mod minimap;
mod renderer;
mod scene;
mod ui;
mod view;

use app::App;
use config::DomeConfig;
use media::FramePlayer;
use renderer::Renderer;
use ui::UiAction;

use anyhow::Context as _;
use std::path::PathBuf;
use std::sync::Arc;
use winit::{
    dpi::{LogicalSize, PhysicalPosition},
    event::*,
    event_loop::{ControlFlow, EventLoop},
    window::{Fullscreen, Window, WindowBuilder},
};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    i18n::init(i18n::resolve_lang(args.iter().cloned()));
    let config = DomeConfig::from_args(args);

    let event_loop = EventLoop::new();
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(i18n::tr("app.title"))
            .with_inner_size(LogicalSize::new(1280, 720))
            .build(&event_loop)
            .context("failed to create window")?,
    );

    let media = FramePlayer::new(config.frame_rate, config.autoplay);
    let mut app = App::new(&config, Box::new(media));
    let mut renderer = pollster::block_on(Renderer::new(
        window.clone(),
        app.scene.mesh(),
        app.scene.uv_edge(),
    ))?;

    let size = window.inner_size();
    app.resize(size.width, size.height);

    // 拖拽状态
    let mut mouse_pressed = false;
    let mut last_mouse_pos: Option<PhysicalPosition<f64>> = None;

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Poll;

        match event {
            Event::WindowEvent { event, .. } => {
                // 先让 egui 处理事件
                let response = renderer.egui_state.on_event(&renderer.egui_ctx, &event);
                if response.consumed {
                    return;
                }

                match event {
                    WindowEvent::CloseRequested => {
                        *control_flow = ControlFlow::Exit;
                    }

                    WindowEvent::Resized(new_size) => {
                        renderer.resize(new_size);
                        app.resize(new_size.width, new_size.height);
                    }

                    WindowEvent::ScaleFactorChanged { new_inner_size, .. } => {
                        renderer.resize(*new_inner_size);
                        app.resize(new_inner_size.width, new_inner_size.height);
                    }

                    WindowEvent::KeyboardInput { input, .. } => {
                        if input.state == ElementState::Pressed {
                            if let Some(action) = input.virtual_keycode.and_then(|k| app.key_action(k)) {
                                handle_action(&mut app, &window, action);
                            }
                        }
                    }

                    WindowEvent::MouseInput { state, button, .. } => {
                        if button == MouseButton::Left {
                            mouse_pressed = state == ElementState::Pressed;
                            if !mouse_pressed {
                                last_mouse_pos = None;
                            }
                        }
                    }

                    WindowEvent::CursorMoved { position, .. } => {
                        if mouse_pressed {
                            app.view.set_drag_enabled(!renderer.egui_ctx.is_pointer_over_area());
                            if let Some(last_pos) = last_mouse_pos {
                                let dx = (position.x - last_pos.x) as f32;
                                let dy = (position.y - last_pos.y) as f32;
                                app.view.on_drag(dx, dy, renderer.size.height as f32);
                            }
                            last_mouse_pos = Some(position);
                        }
                    }

                    WindowEvent::DroppedFile(path) => {
                        let location = path.display().to_string();
                        app.ui.source_field = location.clone();
                        app.load_source(Some(&location));
                    }

                    _ => {}
                }
            }

            Event::RedrawRequested(_) => {
                if let Some(frame) = app.media.take_frame() {
                    renderer.upload_frame(frame);
                    app.loading = false;
                }
                renderer.sync_mesh(app.scene.mesh());
                renderer.refresh_material(app.scene.dome_material_mut());

                let plan = app.frame();
                let size = renderer.size;
                let minimap_viewport =
                    app.minimap_viewport(size.width, size.height, window.scale_factor() as f32);
                let overlay = app.overlay(minimap_viewport);
                let dome_side = app.scene.dome_material().side();
                let minimap_side = app.scene.minimap_material().side();

                let mut actions = Vec::new();
                let ui_state = &mut app.ui;
                let render_result = renderer.render_with_ui(
                    &window,
                    &plan,
                    dome_side,
                    minimap_side,
                    minimap_viewport,
                    |ctx| actions = ui::draw_ui(ctx, ui_state, &overlay),
                );

                for action in actions {
                    handle_action(&mut app, &window, action);
                }

                match render_result {
                    Ok(_) => {}
                    Err(wgpu::SurfaceError::Lost) => renderer.resize(renderer.size),
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("GPU out of memory, exiting");
                        *control_flow = ControlFlow::Exit;
                    }
                    Err(e) => log::error!("render error: {e:?}"),
                }
            }

            Event::MainEventsCleared => {
                window.request_redraw();
            }

            _ => {}
        }
    });
}

/// Route an action to the app, handling the window-level ones here.
fn handle_action(app: &mut App, window: &Window, action: UiAction) {
    match action {
        UiAction::ToggleFullscreen => {
            if window.fullscreen().is_some() {
                window.set_fullscreen(None);
            } else {
                window.set_fullscreen(Some(Fullscreen::Borderless(None)));
            }
        }
        UiAction::BrowseSource => {
            if let Some(path) = pick_source() {
                let location = path.display().to_string();
                app.ui.source_field = location.clone();
                app.load_source(Some(&location));
            }
        }
        other => app.apply(&other),
    }
}

/// A video or image file first; cancelling offers a frame folder instead.
fn pick_source() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title(i18n::tr("file.pick_video"))
        .add_filter(
            i18n::tr("file.filter.videos"),
            &["mp4", "mov", "mkv", "webm", "avi", "m4v"],
        )
        .add_filter(i18n::tr("file.filter.images"), &["jpg", "jpeg", "png", "bmp"])
        .pick_file()
        .or_else(|| {
            rfd::FileDialog::new()
                .set_title(i18n::tr("file.pick_frames"))
                .pick_folder()
        })
}
