use std::rc::Rc;
use std::sync::mpsc;

use image::RgbaImage;
use skinshot_proto::RenderMode;
use wgpu::util::DeviceExt;

use super::pipeline::{Globals, Pipelines, COLOR_FORMAT, DEPTH_FORMAT};
use super::readback::{downsample, padded_bytes_per_row, unpad_rows};
use crate::device::Gpu;
use crate::scene::{avatar_scene, shadow_texture, DrawBatch, SceneMesh, TextureBinding};
use crate::skin::{BodyModel, SKIN_SIZE};
use crate::RenderError;

/// Largest output a renderer accepts, before supersampling.
///
/// The off-screen targets are allocated at `max × ss` once per `init`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct RendererLimits {
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for RendererLimits {
    fn default() -> Self {
        Self { max_width: 512, max_height: 512 }
    }
}

/// Off-screen renderer for one 3D view mode.
///
/// Lifecycle: [`Renderer::new`] builds the scene meshes without touching the
/// GPU; [`init`](Renderer::init) allocates targets at a supersampling factor;
/// each job then runs inside a [`Frame`]; [`destroy`](Renderer::destroy)
/// releases everything. A renderer holds an `Rc<Gpu>` and so stays on the
/// thread that created its GPU context.
pub struct Renderer {
    gpu: Rc<Gpu>,
    mode: RenderMode,
    limits: RendererLimits,

    standard: SceneMesh,
    slim: SceneMesh,

    supersampling: u32,
    resources: Option<Resources>,

    // per-job state, cleared by `finish`
    bound: Option<BodyModel>,
    pending: Option<(u32, u32)>,
    mapped: bool,
}

impl Renderer {
    /// Creates an uninitialized renderer for a 3D `mode`.
    pub fn new(gpu: Rc<Gpu>, mode: RenderMode, limits: RendererLimits) -> Result<Self, RenderError> {
        let (Some(standard), Some(slim)) = (
            avatar_scene(mode, BodyModel::Standard),
            avatar_scene(mode, BodyModel::Slim),
        ) else {
            return Err(RenderError::render_fault(format!("{mode} is not a 3D mode")));
        };

        Ok(Self {
            gpu,
            mode,
            limits,
            standard: SceneMesh::build(&standard, BodyModel::Standard),
            slim: SceneMesh::build(&slim, BodyModel::Slim),
            supersampling: 0,
            resources: None,
            bound: None,
            pending: None,
            mapped: false,
        })
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn limits(&self) -> RendererLimits {
        self.limits
    }

    pub fn is_initialized(&self) -> bool {
        self.resources.is_some()
    }

    /// Supersampling factor of the current allocation, if initialized.
    pub fn supersampling(&self) -> Option<u32> {
        self.resources.as_ref().map(|_| self.supersampling)
    }

    /// Allocates GPU state for supersampling factor `ss`.
    ///
    /// No-op when already initialized at `ss`; a different factor releases the
    /// current allocation first.
    pub fn init(&mut self, ss: u8) -> Result<(), RenderError> {
        let ss = u32::from(ss.max(1));
        if self.resources.is_some() {
            if self.supersampling == ss {
                return Ok(());
            }
            log::debug!(
                "{} renderer: supersampling {} -> {ss}, re-initializing",
                self.mode,
                self.supersampling
            );
            self.destroy();
        }

        let too_large = || {
            RenderError::render_fault(format!(
                "{}x{} at ss {ss} exceeds device limits",
                self.limits.max_width, self.limits.max_height
            ))
            .with_detail("supersampling", ss.to_string())
        };

        let width = self.limits.max_width.checked_mul(ss).ok_or_else(too_large)?;
        let height = self.limits.max_height.checked_mul(ss).ok_or_else(too_large)?;
        let max_dim = self.gpu.max_texture_dimension();
        let readback_len = u64::from(padded_bytes_per_row(width)) * u64::from(height);
        if width == 0
            || height == 0
            || width > max_dim
            || height > max_dim
            || readback_len > self.gpu.max_buffer_size()
        {
            return Err(too_large().with_detail("max_texture_dimension", max_dim.to_string()));
        }

        self.resources = Some(Resources::new(&self.gpu, width, height, readback_len, [&self.standard, &self.slim]));
        self.supersampling = ss;
        log::info!("{} renderer initialized at {width}x{height} (ss {ss})", self.mode);
        Ok(())
    }

    /// Starts one job. The returned guard releases job state when dropped.
    pub fn begin(&mut self) -> Result<Frame<'_>, RenderError> {
        if self.resources.is_none() {
            return Err(RenderError::render_fault(format!("{} renderer not initialized", self.mode)));
        }
        Ok(Frame { renderer: self })
    }

    /// Releases per-job bindings. Runs when a [`Frame`] drops.
    pub fn finish(&mut self) {
        self.bound = None;
        self.pending = None;
        if self.mapped {
            if let Some(res) = &self.resources {
                res.readback.unmap();
            }
            self.mapped = false;
        }
    }

    /// Releases every GPU resource. The renderer may be initialized again.
    pub fn destroy(&mut self) {
        self.finish();
        if let Some(res) = self.resources.take() {
            res.destroy();
            log::debug!("{} renderer destroyed", self.mode);
        }
        self.supersampling = 0;
    }

    fn set_skin(&mut self, skin: &RgbaImage, model: BodyModel) -> Result<(), RenderError> {
        let res = self.resources()?;
        if skin.dimensions() != (SKIN_SIZE, SKIN_SIZE) {
            let (w, h) = skin.dimensions();
            return Err(RenderError::decode(format!("skin must be 64x64, got {w}x{h}")));
        }
        write_rgba(self.gpu.queue(), &res.skin, skin);
        self.bound = Some(model);
        log::trace!("{} renderer: skin uploaded ({model:?})", self.mode);
        Ok(())
    }

    fn render(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        let res = self.resources()?;
        let model = self
            .bound
            .ok_or_else(|| RenderError::render_fault("render without a bound skin"))?;
        self.check_size(width, height)?;

        let ss = self.supersampling;
        let (pw, ph) = (width * ss, height * ss);
        let device = self.gpu.device();
        let queue = self.gpu.queue();

        queue.write_buffer(&res.globals, 0, bytemuck::bytes_of(&Globals::for_viewport(width, height)));

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("skinshot frame encoder"),
        });

        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("skinshot avatar pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &res.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &res.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            rpass.set_viewport(0.0, 0.0, pw as f32, ph as f32, 0.0, 1.0);
            rpass.set_scissor_rect(0, 0, pw, ph);

            let mesh = res.mesh(model);
            rpass.set_bind_group(0, &res.globals_bg, &[]);
            rpass.set_vertex_buffer(0, mesh.vbo.slice(..));
            rpass.set_index_buffer(mesh.ibo.slice(..), wgpu::IndexFormat::Uint32);

            for batch in &mesh.batches {
                rpass.set_pipeline(res.pipelines.for_alpha(batch.alpha));
                let textures = match batch.binding {
                    TextureBinding::Skin => &res.skin_bg,
                    TextureBinding::Shadow => &res.shadow_bg,
                };
                rpass.set_bind_group(1, textures, &[]);
                rpass.draw_indexed(batch.indices.clone(), 0, 0..1);
            }
        }

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &res.color,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &res.readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row(pw)),
                    rows_per_image: Some(ph),
                },
            },
            wgpu::Extent3d { width: pw, height: ph, depth_or_array_layers: 1 },
        );

        queue.submit(Some(encoder.finish()));
        self.pending = Some((width, height));
        log::trace!("{} renderer: drew {pw}x{ph}", self.mode);
        Ok(())
    }

    fn read_pixels(&mut self, width: u32, height: u32) -> Result<RgbaImage, RenderError> {
        if self.pending != Some((width, height)) {
            return Err(RenderError::render_fault(format!(
                "read_pixels({width}, {height}) does not match the last render"
            )));
        }
        let res = self
            .resources
            .as_ref()
            .ok_or_else(|| RenderError::render_fault("renderer not initialized"))?;

        let ss = self.supersampling;
        let (pw, ph) = (width * ss, height * ss);
        let len = u64::from(padded_bytes_per_row(pw)) * u64::from(ph);
        let slice = res.readback.slice(..len);

        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.mapped = true;

        self.gpu.wait_idle()?;
        let mapped = rx
            .recv()
            .map_err(|_| RenderError::render_fault("readback callback dropped"))?;
        if let Err(e) = mapped {
            self.mapped = false;
            return Err(RenderError::render_fault(format!("readback map failed: {e}")));
        }

        let full = {
            let view = slice.get_mapped_range();
            unpad_rows(&view, pw, ph)
        };
        res.readback.unmap();
        self.mapped = false;
        self.pending = None;

        let full = full.ok_or_else(|| RenderError::render_fault("readback shorter than frame"))?;
        Ok(downsample(&full, ss, width, height))
    }

    fn resources(&self) -> Result<&Resources, RenderError> {
        self.resources
            .as_ref()
            .ok_or_else(|| RenderError::render_fault(format!("{} renderer not initialized", self.mode)))
    }

    fn check_size(&self, width: u32, height: u32) -> Result<(), RenderError> {
        let RendererLimits { max_width, max_height } = self.limits;
        if width == 0 || height == 0 || width > max_width || height > max_height {
            return Err(RenderError::render_fault(format!(
                "output {width}x{height} outside 1x1..={max_width}x{max_height}"
            ))
            .with_detail("width", width.to_string())
            .with_detail("height", height.to_string()));
        }
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// One job's use of a [`Renderer`].
///
/// Dropping the frame runs [`Renderer::finish`], on success and on every error
/// path alike.
pub struct Frame<'r> {
    renderer: &'r mut Renderer,
}

impl Frame<'_> {
    /// Uploads a normalized 64×64 skin and selects the mesh for `model`.
    pub fn set_skin(&mut self, skin: &RgbaImage, model: BodyModel) -> Result<(), RenderError> {
        self.renderer.set_skin(skin, model)
    }

    /// Draws the scene at `width·ss × height·ss`.
    pub fn render(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        self.renderer.render(width, height)
    }

    /// Reads the last render back, reduced to exactly `width × height`.
    pub fn read_pixels(&mut self, width: u32, height: u32) -> Result<RgbaImage, RenderError> {
        self.renderer.read_pixels(width, height)
    }
}

impl Drop for Frame<'_> {
    fn drop(&mut self) {
        self.renderer.finish();
    }
}

// ── GPU resources ─────────────────────────────────────────────────────────

struct GpuMesh {
    vbo: wgpu::Buffer,
    ibo: wgpu::Buffer,
    batches: Vec<DrawBatch>,
}

struct Resources {
    pipelines: Pipelines,

    color: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth: wgpu::Texture,
    depth_view: wgpu::TextureView,
    readback: wgpu::Buffer,

    globals: wgpu::Buffer,
    globals_bg: wgpu::BindGroup,

    skin: wgpu::Texture,
    skin_bg: wgpu::BindGroup,
    shadow: wgpu::Texture,
    shadow_bg: wgpu::BindGroup,

    standard: GpuMesh,
    slim: GpuMesh,
}

impl Resources {
    fn new(gpu: &Gpu, width: u32, height: u32, readback_len: u64, meshes: [&SceneMesh; 2]) -> Self {
        let device = gpu.device();
        let pipelines = Pipelines::new(device);

        let target = |label: &str, format: wgpu::TextureFormat, usage: wgpu::TextureUsages| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage,
                view_formats: &[],
            })
        };

        let color = target(
            "skinshot color target",
            COLOR_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        );
        let depth = target("skinshot depth target", DEPTH_FORMAT, wgpu::TextureUsages::RENDER_ATTACHMENT);
        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());

        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("skinshot readback buffer"),
            size: readback_len,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let globals = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("skinshot globals ubo"),
            size: std::mem::size_of::<Globals>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let globals_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("skinshot globals bind group"),
            layout: &pipelines.globals_layout,
            entries: &[wgpu::BindGroupEntry { binding: 0, resource: globals.as_entire_binding() }],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("skinshot nearest sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let sampled = |label: &str, size: u32| {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d { width: size, height: size, depth_or_array_layers: 1 },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: COLOR_FORMAT,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &pipelines.texture_layout,
                entries: &[
                    wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(&view) },
                    wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(&sampler) },
                ],
            });
            (texture, bind_group)
        };

        let (skin, skin_bg) = sampled("skinshot skin texture", SKIN_SIZE);
        let shadow_image = shadow_texture();
        let (shadow, shadow_bg) = sampled("skinshot shadow texture", shadow_image.width());
        write_rgba(gpu.queue(), &shadow, &shadow_image);

        let upload = |mesh: &SceneMesh| GpuMesh {
            vbo: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("skinshot avatar vbo"),
                contents: bytemuck::cast_slice(&mesh.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            }),
            ibo: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("skinshot avatar ibo"),
                contents: bytemuck::cast_slice(&mesh.indices),
                usage: wgpu::BufferUsages::INDEX,
            }),
            batches: mesh.batches.clone(),
        };
        let [standard_mesh, slim_mesh] = meshes;

        Self {
            standard: upload(standard_mesh),
            slim: upload(slim_mesh),
            pipelines,
            color,
            color_view,
            depth,
            depth_view,
            readback,
            globals,
            globals_bg,
            skin,
            skin_bg,
            shadow,
            shadow_bg,
        }
    }

    fn mesh(&self, model: BodyModel) -> &GpuMesh {
        match model {
            BodyModel::Standard => &self.standard,
            BodyModel::Slim => &self.slim,
        }
    }

    fn destroy(self) {
        self.color.destroy();
        self.depth.destroy();
        self.skin.destroy();
        self.shadow.destroy();
        self.readback.destroy();
        self.globals.destroy();
        for mesh in [&self.standard, &self.slim] {
            mesh.vbo.destroy();
            mesh.ibo.destroy();
        }
    }
}

fn write_rgba(queue: &wgpu::Queue, texture: &wgpu::Texture, image: &RgbaImage) {
    let (width, height) = image.dimensions();
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        image.as_raw(),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(width * 4),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
    );
}
