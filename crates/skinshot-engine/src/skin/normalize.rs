//! Canonicalizes skins into the 64×64 layout.
//!
//! Two historical quirks are reconciled here:
//! - 64×32 skins predate separate left limbs; those are synthesized by mirroring
//!   the right limbs into the bottom half of a 64×64 canvas.
//! - Many skins fill the overlay (helm) region with one solid colour instead of
//!   leaving it transparent; such a helm is erased so it does not hide the head.

use image::{imageops, ImageFormat, RgbaImage};

use crate::RenderError;

/// Side length of a canonical skin.
pub const SKIN_SIZE: u32 = 64;

const LEGACY_HEIGHT: u32 = 32;

/// Decodes a PNG skin payload into RGBA8.
pub fn decode_skin(png: &[u8]) -> Result<RgbaImage, RenderError> {
    if png.is_empty() {
        return Err(RenderError::decode("empty skin payload"));
    }
    let img = image::load_from_memory_with_format(png, ImageFormat::Png)?;
    Ok(img.to_rgba8())
}

/// Returns the canonical 64×64 form of `skin`.
pub fn normalize(skin: RgbaImage) -> Result<RgbaImage, RenderError> {
    let mut skin = match skin.dimensions() {
        (SKIN_SIZE, SKIN_SIZE) => skin,
        (SKIN_SIZE, LEGACY_HEIGHT) => {
            log::debug!("legacy 64x32 skin, synthesizing left limbs");
            upgrade_legacy(&skin)
        }
        (w, h) => {
            return Err(RenderError::decode(format!("unsupported skin size {w}x{h}"))
                .with_detail("width", w.to_string())
                .with_detail("height", h.to_string()));
        }
    };

    if strip_solid_helm(&mut skin) {
        log::debug!("skin has solid colored helm, stripping");
    }
    Ok(skin)
}

/// Expands a 64×32 skin into the 64×64 layout.
///
/// The left leg at (16,48) is mirrored from the right leg window at (0,16),
/// the left arm at (32,48) from the right arm window at (40,16). Everything
/// else in the new bottom half stays transparent.
pub fn upgrade_legacy(legacy: &RgbaImage) -> RgbaImage {
    let mut canvas = RgbaImage::new(SKIN_SIZE, SKIN_SIZE);
    imageops::replace(&mut canvas, legacy, 0, 0);

    let leg = mirror_limb(&imageops::crop_imm(legacy, 0, 16, 16, 16).to_image());
    let arm = mirror_limb(&imageops::crop_imm(legacy, 40, 16, 16, 16).to_image());
    imageops::replace(&mut canvas, &leg, 16, 48);
    imageops::replace(&mut canvas, &arm, 32, 48);
    canvas
}

/// Mirrors one 16×16 limb window so it reads as the opposite limb.
///
/// Front, back, top and bottom faces flip in place; the two side strips trade
/// places unflipped. The unused corners come out transparent.
fn mirror_limb(limb: &RgbaImage) -> RgbaImage {
    let mut out = RgbaImage::new(16, 16);

    // (x, y, w, h) regions flipped in place
    for (x, y, w, h) in [(4, 4, 4, 12), (12, 4, 4, 12), (4, 0, 4, 4), (8, 0, 4, 4)] {
        let face = imageops::crop_imm(limb, x, y, w, h).to_image();
        imageops::replace(&mut out, &imageops::flip_horizontal(&face), x as i64, y as i64);
    }

    let outer = imageops::crop_imm(limb, 8, 4, 4, 12).to_image();
    let inner = imageops::crop_imm(limb, 0, 4, 4, 12).to_image();
    imageops::replace(&mut out, &outer, 0, 4);
    imageops::replace(&mut out, &inner, 8, 4);
    out
}

/// Zeroes the 32×16 overlay window at (32,0) when it is one solid colour.
///
/// The reference colour is the pixel at (32,8). The two unused 8×8 corners of
/// the head overlay (x<40 and x>54 in the top row of faces) are not compared.
/// Returns whether the helm was stripped.
pub fn strip_solid_helm(skin: &mut RgbaImage) -> bool {
    let reference = *skin.get_pixel(32, 8);

    for x in 32..64 {
        for y in 0..16 {
            if y < 8 && (x < 40 || x > 54) {
                continue;
            }
            if *skin.get_pixel(x, y) != reference {
                return false;
            }
        }
    }

    imageops::replace(skin, &RgbaImage::new(32, 16), 32, 0);
    true
}
