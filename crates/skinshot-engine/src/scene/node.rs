use glam::{Mat4, Quat, Vec3};

use super::TextureType;

/// How a leaf's texels combine with what is already drawn.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum AlphaMode {
    /// Alpha ignored, always opaque.
    #[default]
    None,
    /// Alpha tested: texels below half coverage are discarded.
    Mask,
    /// Alpha blended over the scene, no depth writes.
    Full,
}

/// Position, rotation (degrees per axis) and non-uniform scale.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Local-to-parent matrix: translate, then rotate X, Y, Z, then scale.
    pub fn matrix(&self) -> Mat4 {
        let r = self.rotation;
        let rotation = Quat::from_rotation_x(r.x.to_radians())
            * Quat::from_rotation_y(r.y.to_radians())
            * Quat::from_rotation_z(r.z.to_radians());
        Mat4::from_scale_rotation_translation(self.scale, rotation, self.position)
    }
}

/// A textured box spanning `[-1, 1]` on every axis before its transform.
#[derive(Debug, Clone, PartialEq)]
pub struct Cube {
    pub transform: Transform,
    pub texture: TextureType,
    pub alpha: AlphaMode,
}

impl Cube {
    pub fn new(texture: TextureType, alpha: AlphaMode) -> Self {
        Self { transform: Transform::default(), texture, alpha }
    }

    #[inline]
    pub fn at(mut self, x: f32, y: f32, z: f32) -> Self {
        self.transform.position = Vec3::new(x, y, z);
        self
    }

    #[inline]
    pub fn scaled(mut self, x: f32, y: f32, z: f32) -> Self {
        self.transform.scale = Vec3::new(x, y, z);
        self
    }

    #[inline]
    pub fn rotated(mut self, x: f32, y: f32, z: f32) -> Self {
        self.transform.rotation = Vec3::new(x, y, z);
        self
    }
}

/// A flat quad in the XZ plane spanning `[-1, 1]`, textured with a non-skin texture.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    pub transform: Transform,
    pub texture: TextureType,
    pub alpha: AlphaMode,
    /// Unlit planes ignore the scene light.
    pub lit: bool,
}

impl Plane {
    pub fn new(texture: TextureType, alpha: AlphaMode) -> Self {
        Self { transform: Transform::default(), texture, alpha, lit: true }
    }

    #[inline]
    pub fn at(mut self, x: f32, y: f32, z: f32) -> Self {
        self.transform.position = Vec3::new(x, y, z);
        self
    }

    #[inline]
    pub fn scaled(mut self, x: f32, y: f32, z: f32) -> Self {
        self.transform.scale = Vec3::new(x, y, z);
        self
    }

    #[inline]
    pub fn unlit(mut self) -> Self {
        self.lit = false;
        self
    }
}

/// Transform group. Members are drawn in insertion order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Stage {
    pub transform: Transform,
    pub members: Vec<Node>,
}

impl Stage {
    pub fn new(transform: Transform) -> Self {
        Self { transform, members: Vec::new() }
    }

    pub fn push(&mut self, node: impl Into<Node>) {
        self.members.push(node.into());
    }

    /// Visits every leaf depth-first in draw order with its world matrix.
    pub fn walk<F: FnMut(&Node, Mat4)>(&self, parent: Mat4, f: &mut F) {
        let world = parent * self.transform.matrix();
        for member in &self.members {
            match member {
                Node::Stage(child) => child.walk(world, f),
                leaf => f(leaf, world * leaf.local_matrix()),
            }
        }
    }

    /// Number of leaves under this stage, nested stages included.
    pub fn leaf_count(&self) -> usize {
        let mut n = 0;
        self.walk(Mat4::IDENTITY, &mut |_, _| n += 1);
        n
    }
}

/// One scene graph node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Stage(Stage),
    Cube(Cube),
    Plane(Plane),
}

impl Node {
    fn local_matrix(&self) -> Mat4 {
        match self {
            Node::Stage(s) => s.transform.matrix(),
            Node::Cube(c) => c.transform.matrix(),
            Node::Plane(p) => p.transform.matrix(),
        }
    }

    /// Texture region of a leaf. Stages carry none.
    pub fn texture(&self) -> Option<TextureType> {
        match self {
            Node::Stage(_) => None,
            Node::Cube(c) => Some(c.texture),
            Node::Plane(p) => Some(p.texture),
        }
    }

    pub fn alpha(&self) -> AlphaMode {
        match self {
            Node::Stage(_) => AlphaMode::None,
            Node::Cube(c) => c.alpha,
            Node::Plane(p) => p.alpha,
        }
    }
}

impl From<Stage> for Node {
    fn from(s: Stage) -> Self {
        Node::Stage(s)
    }
}

impl From<Cube> for Node {
    fn from(c: Cube) -> Self {
        Node::Cube(c)
    }
}

impl From<Plane> for Node {
    fn from(p: Plane) -> Self {
        Node::Plane(p)
    }
}
