use std::ops::Range;

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec2, Vec3};

use super::{AlphaMode, Node, Stage, TextureType};
use crate::skin::{BodyModel, SKIN_SIZE};

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub uv: [f32; 2],
    pub normal: [f32; 3],
    /// 1.0 for lit geometry, 0.0 for unlit.
    pub lit: f32,
}

impl Vertex {
    const ATTRS: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
        0 => Float32x3, // pos
        1 => Float32x2, // uv
        2 => Float32x3, // normal
        3 => Float32    // lit
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

/// Which texture a batch samples.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TextureBinding {
    Skin,
    Shadow,
}

/// A run of consecutive leaves sharing alpha mode and texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawBatch {
    pub alpha: AlphaMode,
    pub binding: TextureBinding,
    pub indices: Range<u32>,
}

/// World-space triangles of one scene, in draw order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneMesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub batches: Vec<DrawBatch>,
}

// Corners of each face, ordered top-left, top-right, bottom-right, bottom-left
// in texture space. Model space is y-down with +Z towards the camera.
const FRONT: [[f32; 3]; 4] = [[-1., -1., 1.], [1., -1., 1.], [1., 1., 1.], [-1., 1., 1.]];
const BACK: [[f32; 3]; 4] = [[1., -1., -1.], [-1., -1., -1.], [-1., 1., -1.], [1., 1., -1.]];
const RIGHT: [[f32; 3]; 4] = [[-1., -1., -1.], [-1., -1., 1.], [-1., 1., 1.], [-1., 1., -1.]];
const LEFT: [[f32; 3]; 4] = [[1., -1., 1.], [1., -1., -1.], [1., 1., -1.], [1., 1., 1.]];
const TOP: [[f32; 3]; 4] = [[-1., -1., -1.], [1., -1., -1.], [1., -1., 1.], [-1., -1., 1.]];
const BOTTOM: [[f32; 3]; 4] = [[-1., 1., 1.], [1., 1., 1.], [1., 1., -1.], [-1., 1., -1.]];
const PLANE: [[f32; 3]; 4] = [[-1., 0., -1.], [1., 0., -1.], [1., 0., 1.], [-1., 0., 1.]];

const QUAD_INDICES: [u32; 6] = [0, 1, 2, 0, 2, 3];

impl SceneMesh {
    /// Bakes every leaf of `stage` into world space.
    ///
    /// `model` selects the arm texture width; geometry already reflects it.
    pub fn build(stage: &Stage, model: BodyModel) -> Self {
        let mut mesh = SceneMesh::default();
        stage.walk(Mat4::IDENTITY, &mut |node, world| mesh.push_leaf(node, world, model));
        mesh
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    fn push_leaf(&mut self, node: &Node, world: Mat4, model: BodyModel) {
        let start = self.indices.len() as u32;
        let (binding, alpha) = match node {
            Node::Stage(_) => return,
            Node::Cube(cube) => {
                let Some(uv) = cube.texture.box_uv(model.is_slim()) else {
                    log::warn!("cube with non-skin texture {:?} skipped", cube.texture);
                    return;
                };
                let faces = [
                    (FRONT, uv.front()),
                    (BACK, uv.back()),
                    (RIGHT, uv.right()),
                    (LEFT, uv.left()),
                    (TOP, uv.top()),
                    (BOTTOM, uv.bottom()),
                ];
                for (corners, (x, y, w, h)) in faces {
                    let size = SKIN_SIZE as f32;
                    let min = Vec2::new(x as f32, y as f32) / size;
                    let max = Vec2::new((x + w) as f32, (y + h) as f32) / size;
                    self.push_quad(world, corners, min, max, true);
                }
                (TextureBinding::Skin, cube.alpha)
            }
            Node::Plane(plane) => {
                let binding = match plane.texture {
                    TextureType::Shadow => TextureBinding::Shadow,
                    other => {
                        log::warn!("plane with skin texture {other:?} skipped");
                        return;
                    }
                };
                self.push_quad(world, PLANE, Vec2::ZERO, Vec2::ONE, plane.lit);
                (binding, plane.alpha)
            }
        };

        let end = self.indices.len() as u32;
        match self.batches.last_mut() {
            Some(last) if last.alpha == alpha && last.binding == binding => last.indices.end = end,
            _ => self.batches.push(DrawBatch { alpha, binding, indices: start..end }),
        }
    }

    fn push_quad(&mut self, world: Mat4, corners: [[f32; 3]; 4], min: Vec2, max: Vec2, lit: bool) {
        let uvs = [
            [min.x, min.y],
            [max.x, min.y],
            [max.x, max.y],
            [min.x, max.y],
        ];

        let local_normal = face_normal(&corners);
        let normal_matrix = Mat3::from_mat4(world).inverse().transpose();
        let normal = (normal_matrix * local_normal).normalize_or_zero();

        let base = self.vertices.len() as u32;
        for (corner, uv) in corners.into_iter().zip(uvs) {
            self.vertices.push(Vertex {
                pos: world.transform_point3(Vec3::from(corner)).to_array(),
                uv,
                normal: normal.to_array(),
                lit: if lit { 1.0 } else { 0.0 },
            });
        }
        self.indices.extend(QUAD_INDICES.iter().map(|i| base + i));
    }
}

/// Outward normal of a unit-cube face, or the up side of a plane.
fn face_normal(corners: &[[f32; 3]; 4]) -> Vec3 {
    let centre = corners.iter().map(|&c| Vec3::from(c)).sum::<Vec3>() / 4.0;
    if centre == Vec3::ZERO {
        // planes pass through the origin; up is -Y
        Vec3::NEG_Y
    } else {
        centre.normalize()
    }
}
