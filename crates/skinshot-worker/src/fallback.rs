//! Default skins for profiles that have none.

use std::path::Path;

use anyhow::Context;
use image::{Rgba, RgbaImage, imageops};
use skinshot_engine::RenderError;
use skinshot_engine::skin::{BodyModel, SKIN_SIZE};
use skinshot_proto::Profile;

use crate::SkinResolver;
use crate::draw::encode_png;

/// Answers skinless jobs with one of two stock skins, picked by body model.
///
/// The model handed to [`SkinResolver::resolve`] is the classified one, so a
/// profile without a model override gets the skin its id hashes to.
#[derive(Debug, Clone)]
pub struct DefaultSkinResolver {
    standard: Vec<u8>,
    slim: Vec<u8>,
}

impl DefaultSkinResolver {
    /// Uses the given PNGs as is.
    pub fn new(standard: Vec<u8>, slim: Vec<u8>) -> Self {
        Self { standard, slim }
    }

    /// Reads both stock skins from disk.
    pub fn from_files(standard: &Path, slim: &Path) -> anyhow::Result<Self> {
        let read = |path: &Path| {
            std::fs::read(path).with_context(|| format!("reading default skin {}", path.display()))
        };
        Ok(Self::new(read(standard)?, read(slim)?))
    }

    /// Plain placeholder skins drawn in code, for deployments without stock
    /// skin files.
    pub fn builtin() -> Result<Self, RenderError> {
        Ok(Self::new(
            encode_png(&placeholder_skin(BodyModel::Standard))?,
            encode_png(&placeholder_skin(BodyModel::Slim))?,
        ))
    }

    /// The PNG handed out for `model`.
    pub fn skin(&self, model: BodyModel) -> &[u8] {
        match model {
            BodyModel::Standard => &self.standard,
            BodyModel::Slim => &self.slim,
        }
    }
}

impl SkinResolver for DefaultSkinResolver {
    fn resolve(&self, profile: &Profile, model: BodyModel) -> Result<Vec<u8>, RenderError> {
        log::debug!("no skin for {}, using the default {model:?} skin", profile.name);
        Ok(self.skin(model).to_vec())
    }
}

const SKIN: Rgba<u8> = Rgba([198, 142, 110, 255]);
const HAIR: Rgba<u8> = Rgba([70, 45, 30, 255]);
const SHIRT: Rgba<u8> = Rgba([60, 150, 170, 255]);
const TROUSERS: Rgba<u8> = Rgba([60, 60, 140, 255]);

/// Base layer only; the overlay windows stay transparent.
fn placeholder_skin(model: BodyModel) -> RgbaImage {
    let mut skin = RgbaImage::new(SKIN_SIZE, SKIN_SIZE);
    // Box-UV strips are two depths plus two widths across.
    let arm = if model.is_slim() { 4 + 3 + 4 + 3 } else { 16 };

    fill(&mut skin, (0, 0, 32, 16), SKIN);
    fill(&mut skin, (8, 0, 8, 8), HAIR);
    fill(&mut skin, (16, 16, 24, 16), SHIRT);
    fill(&mut skin, (40, 16, arm, 16), SKIN);
    fill(&mut skin, (32, 48, arm, 16), SKIN);
    fill(&mut skin, (0, 16, 16, 16), TROUSERS);
    fill(&mut skin, (16, 48, 16, 16), TROUSERS);
    skin
}

fn fill(skin: &mut RgbaImage, (x, y, w, h): (u32, u32, u32, u32), colour: Rgba<u8>) {
    imageops::replace(skin, &RgbaImage::from_pixel(w, h, colour), i64::from(x), i64::from(y));
}
