//! Modes that crop the skin directly instead of drawing the avatar.

use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::RenderError;

/// Renders the FACE mode: the face with the helm composited over it.
///
/// `width`/`height` are divided by `ss` first; flat output is never supersampled.
/// The face is inset by `width / 24` on every side, the helm covers the whole
/// output. Both are scaled nearest-neighbour.
pub fn render_face(skin: &RgbaImage, width: u32, height: u32, ss: u32) -> Result<RgbaImage, RenderError> {
    let ss = ss.max(1);
    let (w, h) = (width / ss, height / ss);
    if w == 0 || h == 0 {
        return Err(RenderError::render_fault(format!(
            "face output {width}x{height} at ss {ss} has no pixels"
        )));
    }

    let border = w / 24;
    let mut out = RgbaImage::new(w, h);

    let (fw, fh) = (w.saturating_sub(border * 2), h.saturating_sub(border * 2));
    if fw > 0 && fh > 0 {
        let face = imageops::crop_imm(skin, 8, 8, 8, 8).to_image();
        let face = imageops::resize(&face, fw, fh, FilterType::Nearest);
        imageops::replace(&mut out, &face, border as i64, border as i64);
    }

    let helm = imageops::crop_imm(skin, 40, 8, 8, 8).to_image();
    let helm = imageops::resize(&helm, w, h, FilterType::Nearest);
    imageops::overlay(&mut out, &helm, 0, 0);

    Ok(out)
}

/// Renders the SKIN mode: the normalized skin itself.
pub fn render_skin(skin: &RgbaImage) -> RgbaImage {
    skin.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const FACE: Rgba<u8> = Rgba([200, 150, 100, 255]);
    const HELM: Rgba<u8> = Rgba([0, 0, 255, 255]);

    fn skin_with_face() -> RgbaImage {
        let mut skin = RgbaImage::new(64, 64);
        for y in 8..16 {
            for x in 8..16 {
                skin.put_pixel(x, y, FACE);
            }
        }
        skin
    }

    #[test]
    fn face_divides_by_supersampling() {
        let out = render_face(&skin_with_face(), 48, 48, 2).unwrap();
        assert_eq!(out.dimensions(), (24, 24));
    }

    #[test]
    fn face_is_inset_by_border() {
        let out = render_face(&skin_with_face(), 48, 48, 1).unwrap();
        // border = 48 / 24 = 2
        assert_eq!(out.get_pixel(0, 0).0[3], 0);
        assert_eq!(out.get_pixel(1, 47).0[3], 0);
        assert_eq!(*out.get_pixel(2, 2), FACE);
        assert_eq!(*out.get_pixel(45, 45), FACE);
        assert_eq!(out.get_pixel(46, 46).0[3], 0);
    }

    #[test]
    fn helm_covers_face_and_border() {
        let mut skin = skin_with_face();
        // top-left helm texel is opaque
        skin.put_pixel(40, 8, HELM);
        let out = render_face(&skin, 64, 64, 1).unwrap();
        assert_eq!(*out.get_pixel(0, 0), HELM);
        assert_eq!(*out.get_pixel(7, 7), HELM);
        assert_eq!(*out.get_pixel(8, 8), FACE);
    }

    #[test]
    fn zero_sized_face_is_a_fault() {
        let err = render_face(&skin_with_face(), 3, 3, 4).unwrap_err();
        assert_eq!(err.kind, skinshot_proto::ErrorKind::RenderFault);
    }

    #[test]
    fn skin_mode_is_identity() {
        let skin = skin_with_face();
        assert_eq!(render_skin(&skin), skin);
    }
}
