// renderer.rs — 核心渲染器: dome mesh, minimap inset and egui overlay

use crate::app::FramePlan;
use crate::fisheye::UvEdge;
use crate::mesh::HemisphereMesh;
use crate::minimap::Viewport;
use crate::scene::{Material, Side};
use anyhow::Context as _;
use image::RgbaImage;
use wgpu::util::DeviceExt;
use winit::window::Window;

/// Load a system font covering CJK glyphs when the UI language needs one.
/// ab_glyph rejects some .ttc collections; those candidates are skipped.
fn setup_egui_ui_fonts(ctx: &egui::Context, lang: &str) {
    if lang == crate::i18n::FALLBACK_LANG {
        return;
    }

    let mut candidates: Vec<std::path::PathBuf> = Vec::new();
    if cfg!(windows) {
        let fonts = std::path::PathBuf::from(r"C:\Windows\Fonts");
        for f in ["msyh.ttf", "simhei.ttf", "simsun.ttf", "meiryo.ttf", "malgun.ttf"] {
            candidates.push(fonts.join(f));
        }
    } else if cfg!(target_os = "macos") {
        for f in [
            "/System/Library/Fonts/PingFang.ttc",
            "/System/Library/Fonts/STHeiti Light.ttc",
            "/Library/Fonts/Arial Unicode.ttf",
        ] {
            candidates.push(f.into());
        }
    } else {
        for f in [
            "/usr/share/fonts/truetype/noto/NotoSansCJK-Regular.ttc",
            "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
            "/usr/share/fonts/truetype/wqy/wqy-microhei.ttc",
            "/usr/share/fonts/truetype/droid/DroidSansFallbackFull.ttf",
        ] {
            candidates.push(f.into());
        }
    }
    candidates.push(std::path::PathBuf::from("assets").join("NotoSansSC-Regular.otf"));

    let chosen = candidates.into_iter().find_map(|p| {
        let bytes = std::fs::read(&p).ok()?;
        ab_glyph::FontRef::try_from_slice(&bytes).ok()?;
        Some((p, bytes))
    });

    let Some((font_path, font_bytes)) = chosen else {
        log::warn!("no font with CJK coverage found; non-Latin labels may not render");
        return;
    };
    log::info!("using UI font {}", font_path.display());

    let mut fonts = egui::FontDefinitions::default();
    fonts
        .font_data
        .insert("ui".to_owned(), egui::FontData::from_owned(font_bytes));
    for family in [egui::FontFamily::Proportional, egui::FontFamily::Monospace] {
        if let Some(list) = fonts.families.get_mut(&family) {
            list.insert(0, "ui".to_owned());
        }
    }
    ctx.set_fonts(fonts);
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct DomeUniform {
    view_proj: [[f32; 4]; 4],
    model: [[f32; 4]; 4],
}

impl DomeUniform {
    fn new(view_proj: glam::Mat4, model: glam::Mat4) -> Self {
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            model: model.to_cols_array_2d(),
        }
    }
}

/// One camera's uniform buffer plus the bind group that samples the video.
struct CameraBinding {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

pub struct Renderer {
    surface: wgpu::Surface,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pub size: winit::dpi::PhysicalSize<u32>,

    // front faces culled / back faces culled
    inside_pipeline: wgpu::RenderPipeline,
    outside_pipeline: wgpu::RenderPipeline,

    // 视频纹理
    bind_group_layout: wgpu::BindGroupLayout,
    texture: wgpu::Texture,
    texture_size: (u32, u32),
    sampler: wgpu::Sampler,

    main_camera: CameraBinding,
    minimap_camera: CameraBinding,

    // 网格
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    uploaded_generation: u64,

    // UI
    pub egui_ctx: egui::Context,
    pub egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

impl Renderer {
    pub async fn new(
        window: std::sync::Arc<Window>,
        mesh: &HemisphereMesh,
        uv_edge: UvEdge,
    ) -> anyhow::Result<Self> {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = unsafe { instance.create_surface(window.as_ref()) }
            .context("failed to create rendering surface")?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no compatible GPU adapter")?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    features: wgpu::Features::empty(),
                    limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                    label: None,
                },
                None,
            )
            .await
            .context("failed to open GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("surface reports no texture formats")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        // --- 1. 默认棋盘格纹理, shown until the first video frame arrives ---
        let texture = Self::create_video_texture(&device, 2, 2);
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &[
                60, 60, 60, 255, 200, 200, 200, 255, 200, 200, 200, 255, 60, 60, 60, 255,
            ],
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(8),
                rows_per_image: Some(2),
            },
            wgpu::Extent3d {
                width: 2,
                height: 2,
                depth_or_array_layers: 1,
            },
        );

        let address_mode = uv_edge.address_mode();
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("video_sampler"),
            address_mode_u: address_mode,
            address_mode_v: address_mode,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        // --- 2. Uniforms / bind groups ---
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
            label: Some("dome_bind_group_layout"),
        });

        let texture_view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let main_camera =
            Self::create_camera_binding(&device, &bind_group_layout, &texture_view, &sampler, "main");
        let minimap_camera =
            Self::create_camera_binding(&device, &bind_group_layout, &texture_view, &sampler, "minimap");

        // --- 3. Pipelines ---
        let shader = device.create_shader_module(wgpu::include_wgsl!("shader_dome.wgsl"));
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Dome Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let inside_pipeline =
            Self::create_pipeline(&device, &pipeline_layout, &shader, config.format, Side::Back);
        let outside_pipeline =
            Self::create_pipeline(&device, &pipeline_layout, &shader, config.format, Side::Front);

        // --- 4. Mesh buffers ---
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Dome Vertex Buffer"),
            contents: bytemuck::cast_slice(&mesh.vertices()),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Dome Index Buffer"),
            contents: bytemuck::cast_slice(mesh.indices()),
            usage: wgpu::BufferUsages::INDEX,
        });

        // --- 5. Egui ---
        let egui_ctx = egui::Context::default();
        setup_egui_ui_fonts(&egui_ctx, &crate::i18n::current_lang());
        let mut egui_state = egui_winit::State::new(window.as_ref());
        egui_state.set_pixels_per_point(window.scale_factor() as f32);
        let egui_renderer = egui_wgpu::Renderer::new(&device, config.format, None, 1);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            inside_pipeline,
            outside_pipeline,
            bind_group_layout,
            texture,
            texture_size: (2, 2),
            sampler,
            main_camera,
            minimap_camera,
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices().len() as u32,
            uploaded_generation: mesh.uv_generation(),
            egui_ctx,
            egui_state,
            egui_renderer,
        })
    }

    fn create_video_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::Texture {
        device.create_texture(&wgpu::TextureDescriptor {
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            label: Some("video_texture"),
            view_formats: &[],
        })
    }

    fn create_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        buffer: &wgpu::Buffer,
        view: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
        label: &str,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
            label: Some(label),
        })
    }

    fn create_camera_binding(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        view: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
        label: &str,
    ) -> CameraBinding {
        let uniform = DomeUniform::new(glam::Mat4::IDENTITY, glam::Mat4::IDENTITY);
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}_camera_buffer")),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = Self::create_bind_group(
            device,
            layout,
            &buffer,
            view,
            sampler,
            &format!("{label}_bind_group"),
        );
        CameraBinding { buffer, bind_group }
    }

    fn create_pipeline(
        device: &wgpu::Device,
        layout: &wgpu::PipelineLayout,
        shader: &wgpu::ShaderModule,
        format: wgpu::TextureFormat,
        side: Side,
    ) -> wgpu::RenderPipeline {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(match side {
                Side::Back => "Dome Pipeline (inner surface)",
                Side::Front => "Dome Pipeline (outer surface)",
            }),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: "vs_main",
                buffers: &[crate::mesh::DomeVertex::buffer_layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(side.cull_mode()),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            // a single convex shell never overlaps itself once one side is culled
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        })
    }

    fn pipeline_for(&self, side: Side) -> &wgpu::RenderPipeline {
        match side {
            Side::Back => &self.inside_pipeline,
            Side::Front => &self.outside_pipeline,
        }
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Re-upload vertex data when the mesh UVs were recomputed.
    pub fn sync_mesh(&mut self, mesh: &HemisphereMesh) {
        if mesh.uv_generation() == self.uploaded_generation {
            return;
        }
        self.queue
            .write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(&mesh.vertices()));
        self.uploaded_generation = mesh.uv_generation();
        log::debug!("uploaded dome UVs (generation {})", self.uploaded_generation);
    }

    /// Pipelines are prebuilt per side; switching just needs acknowledging.
    pub fn refresh_material(&mut self, material: &mut Material) {
        if material.take_update() {
            log::debug!("dome material now shows {:?} faces", material.side());
        }
    }

    /// Copy a decoded video frame into the texture, recreating it when the
    /// frame size changes.
    pub fn upload_frame(&mut self, img: RgbaImage) {
        let max = self.device.limits().max_texture_dimension_2d;
        let (src_w, src_h) = img.dimensions();
        let img = if src_w > max || src_h > max {
            let scale = max as f32 / src_w.max(src_h) as f32;
            let new_w = ((src_w as f32 * scale) as u32).max(1);
            let new_h = ((src_h as f32 * scale) as u32).max(1);
            log::warn!("frame {src_w}x{src_h} exceeds GPU limit {max}, scaling to {new_w}x{new_h}");
            image::imageops::resize(&img, new_w, new_h, image::imageops::FilterType::Triangle)
        } else {
            img
        };

        let (width, height) = img.dimensions();
        if (width, height) != self.texture_size {
            self.texture = Self::create_video_texture(&self.device, width, height);
            self.texture_size = (width, height);

            let view = self.texture.create_view(&wgpu::TextureViewDescriptor::default());
            for (binding, label) in [
                (&mut self.main_camera, "main_bind_group"),
                (&mut self.minimap_camera, "minimap_bind_group"),
            ] {
                binding.bind_group = Self::create_bind_group(
                    &self.device,
                    &self.bind_group_layout,
                    &binding.buffer,
                    &view,
                    &self.sampler,
                    label,
                );
            }
            log::info!("video texture resized to {width}x{height}");
        }

        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &img,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    pub fn render_with_ui(
        &mut self,
        window: &Window,
        plan: &FramePlan,
        dome_side: Side,
        minimap_side: Side,
        minimap_viewport: Option<Viewport>,
        run_ui: impl FnOnce(&egui::Context),
    ) -> Result<(), wgpu::SurfaceError> {
        self.queue.write_buffer(
            &self.main_camera.buffer,
            0,
            bytemuck::cast_slice(&[DomeUniform::new(plan.main, plan.model)]),
        );
        if let Some(minimap) = plan.minimap {
            self.queue.write_buffer(
                &self.minimap_camera.buffer,
                0,
                bytemuck::cast_slice(&[DomeUniform::new(minimap, plan.model)]),
            );
        }

        let output = self.surface.get_current_texture()?;
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        // 1. 主视图
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Dome Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r: 0.1, g: 0.1, b: 0.1, a: 1.0 }),
                        store: true,
                    },
                })],
                depth_stencil_attachment: None,
            });

            render_pass.set_pipeline(self.pipeline_for(dome_side));
            render_pass.set_bind_group(0, &self.main_camera.bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..self.index_count, 0, 0..1);
        }

        // 2. 小地图 (inside view only)
        if let (Some(_), Some(vp)) = (plan.minimap, minimap_viewport) {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Minimap Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations { load: wgpu::LoadOp::Load, store: true },
                })],
                depth_stencil_attachment: None,
            });

            render_pass.set_viewport(vp.x, vp.y, vp.width, vp.height, 0.0, 1.0);
            render_pass.set_scissor_rect(
                vp.x as u32,
                vp.y as u32,
                vp.width as u32,
                vp.height as u32,
            );
            render_pass.set_pipeline(self.pipeline_for(minimap_side));
            render_pass.set_bind_group(0, &self.minimap_camera.bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..self.index_count, 0, 0..1);
        }

        // 3. UI
        let raw_input = self.egui_state.take_egui_input(window);
        let full_output = self.egui_ctx.run(raw_input, run_ui);

        self.egui_state
            .handle_platform_output(window, &self.egui_ctx, full_output.platform_output);
        let clipped_primitives = self.egui_ctx.tessellate(full_output.shapes);

        let screen_descriptor = egui_wgpu::renderer::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: window.scale_factor() as f32,
        };

        for (id, delta) in &full_output.textures_delta.set {
            self.egui_renderer.update_texture(&self.device, &self.queue, *id, delta);
        }
        self.egui_renderer.update_buffers(
            &self.device,
            &self.queue,
            &mut encoder,
            &clipped_primitives,
            &screen_descriptor,
        );

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Egui Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations { load: wgpu::LoadOp::Load, store: true },
                })],
                depth_stencil_attachment: None,
            });
            self.egui_renderer
                .render(&mut render_pass, &clipped_primitives, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}
