use image::{Rgba, RgbaImage};

/// Texture region a scene leaf samples.
///
/// Skin regions use the standard box unwrap; the `2` variants are the overlay
/// layer of the same body part. `Shadow` is a procedural texture, not part of
/// the skin.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TextureType {
    Head,
    Head2,
    Body,
    Body2,
    RArm,
    RArm2,
    LArm,
    LArm2,
    RLeg,
    RLeg2,
    LLeg,
    LLeg2,
    Shadow,
}

/// Box unwrap of one cuboid on the 64×64 skin, in texels.
///
/// `(u, v)` is the top-left corner; `w`, `h`, `d` are the width, height and
/// depth of the box.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BoxUv {
    pub u: u32,
    pub v: u32,
    pub w: u32,
    pub h: u32,
    pub d: u32,
}

/// A texel rectangle `(x, y, w, h)` on the skin.
pub type FaceRect = (u32, u32, u32, u32);

impl BoxUv {
    const fn new(u: u32, v: u32, w: u32, h: u32, d: u32) -> Self {
        Self { u, v, w, h, d }
    }

    pub fn top(&self) -> FaceRect {
        (self.u + self.d, self.v, self.w, self.d)
    }

    pub fn bottom(&self) -> FaceRect {
        (self.u + self.d + self.w, self.v, self.w, self.d)
    }

    pub fn right(&self) -> FaceRect {
        (self.u, self.v + self.d, self.d, self.h)
    }

    pub fn front(&self) -> FaceRect {
        (self.u + self.d, self.v + self.d, self.w, self.h)
    }

    pub fn left(&self) -> FaceRect {
        (self.u + self.d + self.w, self.v + self.d, self.d, self.h)
    }

    pub fn back(&self) -> FaceRect {
        (self.u + 2 * self.d + self.w, self.v + self.d, self.w, self.h)
    }
}

impl TextureType {
    /// Skin unwrap of this region, or `None` for non-skin textures.
    ///
    /// Arms are 3 texels wide when `slim` is set.
    pub fn box_uv(self, slim: bool) -> Option<BoxUv> {
        let arm = if slim { 3 } else { 4 };
        let uv = match self {
            TextureType::Head => BoxUv::new(0, 0, 8, 8, 8),
            TextureType::Head2 => BoxUv::new(32, 0, 8, 8, 8),
            TextureType::Body => BoxUv::new(16, 16, 8, 12, 4),
            TextureType::Body2 => BoxUv::new(16, 32, 8, 12, 4),
            TextureType::RArm => BoxUv::new(40, 16, arm, 12, 4),
            TextureType::RArm2 => BoxUv::new(40, 32, arm, 12, 4),
            TextureType::LArm => BoxUv::new(32, 48, arm, 12, 4),
            TextureType::LArm2 => BoxUv::new(48, 48, arm, 12, 4),
            TextureType::RLeg => BoxUv::new(0, 16, 4, 12, 4),
            TextureType::RLeg2 => BoxUv::new(0, 32, 4, 12, 4),
            TextureType::LLeg => BoxUv::new(16, 48, 4, 12, 4),
            TextureType::LLeg2 => BoxUv::new(0, 48, 4, 12, 4),
            TextureType::Shadow => return None,
        };
        Some(uv)
    }

    pub fn is_arm(self) -> bool {
        matches!(
            self,
            TextureType::RArm | TextureType::RArm2 | TextureType::LArm | TextureType::LArm2
        )
    }
}

/// Side length of the procedural shadow texture.
pub const SHADOW_TEXTURE_SIZE: u32 = 64;

/// Soft radial drop shadow: black, densest in the middle, fading to clear at the rim.
pub fn shadow_texture() -> RgbaImage {
    let half = SHADOW_TEXTURE_SIZE as f32 / 2.0;
    RgbaImage::from_fn(SHADOW_TEXTURE_SIZE, SHADOW_TEXTURE_SIZE, |x, y| {
        let dx = (x as f32 + 0.5 - half) / half;
        let dy = (y as f32 + 0.5 - half) / half;
        let falloff = (1.0 - (dx * dx + dy * dy).sqrt()).clamp(0.0, 1.0);
        Rgba([0, 0, 0, (falloff * falloff * 160.0) as u8])
    })
}
