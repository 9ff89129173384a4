//! The per-job pipeline: decode, classify, normalize, render, encode.

use std::collections::HashMap;
use std::io::Cursor;
use std::rc::Rc;

use image::{ImageFormat, RgbaImage};
use skinshot_engine::device::{Gpu, GpuInit};
use skinshot_engine::render::{render_face, render_skin, Renderer, RendererLimits};
use skinshot_engine::skin::{classify, decode_skin, normalize, BodyModel};
use skinshot_engine::RenderError;
use skinshot_proto::{RenderJob, RenderMode};

use crate::SkinResolver;

/// GPU context and renderers owned by one worker thread.
///
/// The context is created on first use (or up front via [`start_gpu`]); each
/// 3D mode gets its renderer the first time a job asks for it.
///
/// [`start_gpu`]: Renderers::start_gpu
pub struct Renderers {
    limits: RendererLimits,
    gpu_init: GpuInit,
    gpu: Option<Rc<Gpu>>,
    by_mode: HashMap<RenderMode, Renderer>,
}

impl Renderers {
    pub fn new(limits: RendererLimits, gpu_init: GpuInit) -> Self {
        Self { limits, gpu_init, gpu: None, by_mode: HashMap::new() }
    }

    /// Creates the GPU context now instead of on the first 3D job.
    pub fn start_gpu(&mut self) -> anyhow::Result<()> {
        if self.gpu.is_none() {
            self.gpu = Some(Rc::new(Gpu::new_blocking(self.gpu_init.clone())?));
        }
        Ok(())
    }

    pub fn has_gpu(&self) -> bool {
        self.gpu.is_some()
    }

    /// Modes with a renderer that currently holds GPU resources.
    pub fn initialized_modes(&self) -> Vec<RenderMode> {
        let mut modes: Vec<_> = self
            .by_mode
            .iter()
            .filter(|(_, r)| r.is_initialized())
            .map(|(mode, _)| *mode)
            .collect();
        modes.sort_by_key(|m| m.ordinal());
        modes
    }

    /// Returns the renderer for a 3D `mode`, creating it if needed.
    pub fn renderer(&mut self, mode: RenderMode) -> Result<&mut Renderer, RenderError> {
        self.start_gpu()?;
        let Some(gpu) = self.gpu.clone() else {
            return Err(RenderError::render_fault("no GPU context"));
        };

        if !self.by_mode.contains_key(&mode) {
            let renderer = Renderer::new(gpu, mode, self.limits)?;
            self.by_mode.insert(mode, renderer);
        }
        self.by_mode
            .get_mut(&mode)
            .ok_or_else(|| RenderError::render_fault(format!("no renderer for {mode}")))
    }

    /// Destroys every renderer, then the GPU context.
    pub fn destroy_all(&mut self) {
        for (mode, mut renderer) in self.by_mode.drain() {
            if renderer.is_initialized() {
                log::debug!("destroying {mode} renderer");
            }
            renderer.destroy();
        }
        self.gpu = None;
    }
}

/// Runs one compressed request frame through the whole pipeline and returns
/// the PNG to publish.
pub fn render_job(
    renderers: &mut Renderers,
    resolver: &dyn SkinResolver,
    body: &[u8],
) -> Result<Vec<u8>, RenderError> {
    let mut job = RenderJob::decode(body)?;
    log::info!(
        "received a job to render a {}x{} {} ({}x supersampling) for {}",
        job.width,
        job.height,
        job.mode,
        job.supersampling,
        job.profile.name
    );

    let model = classify(&job.profile);
    log::trace!("body model {model:?}");

    let png = if job.skin.is_empty() {
        resolver.resolve(&job.profile, model)?
    } else {
        std::mem::take(&mut job.skin)
    };
    let skin = normalize(decode_skin(&png)?)?;
    log::trace!("skin normalized");

    let image = draw(renderers, &job, &skin, model)?;
    encode_png(&image)
}

/// Produces the output image of `job` from a normalized skin.
pub fn draw(
    renderers: &mut Renderers,
    job: &RenderJob,
    skin: &RgbaImage,
    model: BodyModel,
) -> Result<RgbaImage, RenderError> {
    let (w, h) = (u32::from(job.width), u32::from(job.height));
    match job.mode {
        RenderMode::Face => render_face(skin, w, h, u32::from(job.supersampling)),
        RenderMode::Skin => Ok(render_skin(skin)),
        mode => {
            let renderer = renderers.renderer(mode)?;
            renderer.init(job.supersampling)?;

            let mut frame = renderer.begin()?;
            frame.set_skin(skin, model)?;
            frame.render(w, h)?;
            frame.read_pixels(w, h)
        }
    }
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, RenderError> {
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| RenderError::render_fault(format!("png encode failed: {e}")))?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NoSkinResolver;
    use image::Rgba;
    use skinshot_proto::ErrorKind;

    fn renderers() -> Renderers {
        Renderers::new(RendererLimits::default(), GpuInit::default())
    }

    fn png(img: &RgbaImage) -> Vec<u8> {
        encode_png(img).unwrap()
    }

    fn legacy_skin() -> RgbaImage {
        RgbaImage::from_fn(64, 32, |x, y| Rgba([x as u8 * 4, y as u8 * 8, 7, 255]))
    }

    #[test]
    fn skin_mode_returns_normalized_skin() {
        let job = RenderJob::new(RenderMode::Skin, 64, 64, 1, png(&legacy_skin()));
        let out = render_job(&mut renderers(), &NoSkinResolver, &job.encode().unwrap()).unwrap();
        let decoded = image::load_from_memory(&out).unwrap().to_rgba8();
        assert_eq!(decoded, normalize(legacy_skin()).unwrap());
    }

    #[test]
    fn flat_modes_never_touch_the_gpu() {
        let mut r = renderers();
        let job = RenderJob::new(RenderMode::Face, 48, 48, 2, png(&legacy_skin()));
        let out = render_job(&mut r, &NoSkinResolver, &job.encode().unwrap()).unwrap();
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (24, 24));
        assert!(!r.has_gpu());
    }

    #[test]
    fn missing_skin_goes_to_resolver() {
        let job = RenderJob::new(RenderMode::Skin, 64, 64, 1, Vec::new());
        let err = render_job(&mut renderers(), &NoSkinResolver, &job.encode().unwrap()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DecodeError);
    }

    #[test]
    fn bad_png_is_decode_error() {
        let job = RenderJob::new(RenderMode::Skin, 64, 64, 1, b"not a png".to_vec());
        let err = render_job(&mut renderers(), &NoSkinResolver, &job.encode().unwrap()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DecodeError);
    }

    #[test]
    fn garbage_frame_is_malformed() {
        let err = render_job(&mut renderers(), &NoSkinResolver, b"\x00\x01").unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedJob);
    }
}
