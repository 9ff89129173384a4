//! Pipelines and uniform layout shared by every avatar renderer.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::scene::{AlphaMode, Vertex};

pub(super) const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub(super) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

const FOV_Y_DEGREES: f32 = 45.0;
const Z_NEAR: f32 = 0.1;
const Z_FAR: f32 = 100.0;
const AMBIENT: f32 = 0.55;

/// Straight-alpha colour over a cleared target. Alpha accumulates as
/// `src + dst * (1 - src)` so a blended texel over transparency reads back
/// with its own alpha.
const BLEND: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
        operation: wgpu::BlendOperation::Add,
    },
};

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(super) struct Globals {
    pub view_proj: [[f32; 4]; 4],
    pub light: [f32; 4],
}

impl Globals {
    /// Camera at the origin looking down -Z; model space is flipped to y-up.
    pub fn for_viewport(width: u32, height: u32) -> Self {
        let aspect = width.max(1) as f32 / height.max(1) as f32;
        let proj = Mat4::perspective_rh(FOV_Y_DEGREES.to_radians(), aspect, Z_NEAR, Z_FAR);
        let view_proj = proj * Mat4::from_scale(Vec3::new(1.0, -1.0, 1.0));
        // Upper left, towards the viewer (y-down).
        let light = Vec3::new(-0.35, -0.55, 0.75).normalize();
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            light: [light.x, light.y, light.z, AMBIENT],
        }
    }
}

/// Opaque, alpha-tested and blended variants of the avatar pipeline.
pub(super) struct Pipelines {
    pub globals_layout: wgpu::BindGroupLayout,
    pub texture_layout: wgpu::BindGroupLayout,
    opaque: wgpu::RenderPipeline,
    mask: wgpu::RenderPipeline,
    blend: wgpu::RenderPipeline,
}

impl Pipelines {
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("skinshot avatar shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/avatar.wgsl").into()),
        });

        let globals_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("skinshot globals bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<Globals>() as u64),
                },
                count: None,
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("skinshot texture bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("skinshot avatar pipeline layout"),
            bind_group_layouts: &[&globals_layout, &texture_layout],
            immediate_size: 0,
        });

        let build = |label: &str, entry: &str, blend: Option<wgpu::BlendState>, depth_write: bool| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[Vertex::layout()],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some(entry),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: COLOR_FORMAT,
                        blend,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    // faces are wound for texture orientation, not facing
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: depth_write,
                    depth_compare: wgpu::CompareFunction::LessEqual,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            })
        };

        let opaque = build("skinshot opaque pipeline", "fs_opaque", None, true);
        let mask = build("skinshot mask pipeline", "fs_mask", None, true);
        let blend = build(
            "skinshot blend pipeline",
            "fs_blend",
            Some(BLEND),
            false,
        );

        Self { globals_layout, texture_layout, opaque, mask, blend }
    }

    pub fn for_alpha(&self, alpha: AlphaMode) -> &wgpu::RenderPipeline {
        match alpha {
            AlphaMode::None => &self.opaque,
            AlphaMode::Mask => &self.mask,
            AlphaMode::Full => &self.blend,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn camera_flips_y_and_looks_down_negative_z() {
        let g = Globals::for_viewport(100, 100);
        let m = Mat4::from_cols_array_2d(&g.view_proj);

        // y-down model space: a point below the centre ends up in the lower half.
        let below = m * Vec4::new(0.0, 1.0, -10.0, 1.0);
        assert!(below.y / below.w < 0.0);

        // Inside the depth range.
        let z = below.z / below.w;
        assert!((0.0..=1.0).contains(&z));
    }

    #[test]
    fn light_is_normalized_with_ambient() {
        let g = Globals::for_viewport(1, 1);
        let l = Vec3::new(g.light[0], g.light[1], g.light[2]);
        assert!((l.length() - 1.0).abs() < 1e-5);
        assert_eq!(g.light[3], AMBIENT);
    }

    /// Evaluates `factor * value` for the factors the blend state uses.
    fn apply(factor: wgpu::BlendFactor, src_alpha: f32, value: f32) -> f32 {
        match factor {
            wgpu::BlendFactor::One => value,
            wgpu::BlendFactor::SrcAlpha => src_alpha * value,
            wgpu::BlendFactor::OneMinusSrcAlpha => (1.0 - src_alpha) * value,
            other => panic!("unexpected factor {other:?}"),
        }
    }

    #[test]
    fn blended_alpha_over_clear_target_is_not_squared() {
        let src_alpha = 0.5;
        let dst_alpha = 0.0;
        let out = apply(BLEND.alpha.src_factor, src_alpha, src_alpha)
            + apply(BLEND.alpha.dst_factor, src_alpha, dst_alpha);
        assert_eq!(out, 0.5);
        assert_eq!(BLEND.alpha.operation, wgpu::BlendOperation::Add);

        // over an opaque texel alpha stays opaque
        let out = apply(BLEND.alpha.src_factor, src_alpha, src_alpha)
            + apply(BLEND.alpha.dst_factor, src_alpha, 1.0);
        assert_eq!(out, 1.0);
    }
}
