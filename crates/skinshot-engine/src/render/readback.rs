//! CPU side of pixel readback: row unpadding and supersample reduction.

use image::RgbaImage;

/// Bytes per row of a `width`-texel RGBA8 copy, padded for buffer copies.
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Copies a padded readback into a tightly packed image.
///
/// Returns `None` when `padded` is too short for `width × height`.
pub fn unpad_rows(padded: &[u8], width: u32, height: u32) -> Option<RgbaImage> {
    let stride = padded_bytes_per_row(width) as usize;
    let row = width as usize * 4;
    let mut pixels = Vec::with_capacity(row * height as usize);
    for y in 0..height as usize {
        let start = y * stride;
        pixels.extend_from_slice(padded.get(start..start + row)?);
    }
    RgbaImage::from_raw(width, height, pixels)
}

/// Area-averages every `ss × ss` block of `src` into one output pixel.
///
/// Each channel, alpha included, is the plain mean of the block's samples.
/// The output is exactly `width × height`; samples falling outside `src`
/// count as transparent black.
pub fn downsample(src: &RgbaImage, ss: u32, width: u32, height: u32) -> RgbaImage {
    let ss = ss.max(1);
    if ss == 1 && src.dimensions() == (width, height) {
        return src.clone();
    }

    let samples = (ss * ss) as f32;
    RgbaImage::from_fn(width, height, |ox, oy| {
        let mut sum = [0.0f32; 4];
        for sy in oy * ss..(oy + 1) * ss {
            for sx in ox * ss..(ox + 1) * ss {
                let Some(p) = src.get_pixel_checked(sx, sy) else { continue };
                for (acc, c) in sum.iter_mut().zip(p.0) {
                    *acc += f32::from(c);
                }
            }
        }
        image::Rgba(sum.map(|c| (c / samples).round().clamp(0.0, 255.0) as u8))
    })
}
