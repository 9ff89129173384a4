use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use skinshot_proto::Profile;
use uuid::Uuid;

/// Avatar body proportions.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum BodyModel {
    /// 4-texel wide arms.
    #[default]
    Standard,
    /// 3-texel wide arms.
    Slim,
}

impl BodyModel {
    pub fn is_slim(self) -> bool {
        self == BodyModel::Slim
    }
}

/// Determines the body model for `profile`.
///
/// An explicit `textures.SKIN.metadata.model` inside the base64 `textures`
/// property wins (`"slim"` means slim, any other value standard). Without an
/// override, or when the property cannot be read, the id-derived default applies.
pub fn classify(profile: &Profile) -> BodyModel {
    let Some(textures) = profile.property("textures") else {
        return default_model(profile.id);
    };

    match model_override(&textures.value) {
        Ok(Some(model)) => model,
        Ok(None) => default_model(profile.id),
        Err(reason) => {
            log::warn!(
                "unreadable textures property for {} ({}): {reason}",
                profile.name,
                profile.id
            );
            default_model(profile.id)
        }
    }
}

fn model_override(encoded: &str) -> Result<Option<BodyModel>, String> {
    let json = STANDARD
        .decode(encoded.trim())
        .map_err(|e| format!("bad base64: {e}"))?;
    let value: serde_json::Value =
        serde_json::from_slice(&json).map_err(|e| format!("bad json: {e}"))?;

    let model = value
        .pointer("/textures/SKIN/metadata/model")
        .map(|m| match m.as_str() {
            Some("slim") => BodyModel::Slim,
            _ => BodyModel::Standard,
        });
    Ok(model)
}

/// The platform's default model for profiles that do not choose one.
///
/// Folds the id into 32 bits and looks at the lowest bit: odd means slim.
pub fn default_model(id: Uuid) -> BodyModel {
    let (msb, lsb) = id.as_u64_pair();
    let hilo = msb ^ lsb;
    let hash = ((hilo >> 32) as i32) ^ (hilo as i32);
    if hash & 1 == 1 {
        BodyModel::Slim
    } else {
        BodyModel::Standard
    }
}
