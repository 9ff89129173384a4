use std::collections::BTreeMap;
use std::fmt;

use skinshot_proto::{ErrorDescription, ErrorKind, ProtoError};

/// Per-job failure surfaced by the engine.
///
/// Every variant ends up as the payload of an outcome-1 response via
/// [`RenderError::to_description`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderError {
    pub kind: ErrorKind,
    pub message: String,
    pub detail: BTreeMap<String, String>,
}

impl RenderError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), detail: BTreeMap::new() }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedJob, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DecodeError, message)
    }

    pub fn render_fault(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RenderFault, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransportFault, message)
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.detail.insert(key.into(), value.into());
        self
    }

    pub fn to_description(&self) -> ErrorDescription {
        let mut desc = ErrorDescription::new(self.kind, self.message.clone());
        desc.detail = self.detail.clone();
        desc
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for RenderError {}

impl From<ProtoError> for RenderError {
    fn from(err: ProtoError) -> Self {
        match err {
            ProtoError::Malformed(msg) => Self::malformed(msg),
            ProtoError::UnsupportedMode(ordinal) => {
                Self::new(ErrorKind::UnsupportedMode, format!("unsupported render mode {ordinal}"))
                    .with_detail("ordinal", ordinal.to_string())
            }
        }
    }
}

impl From<image::ImageError> for RenderError {
    fn from(err: image::ImageError) -> Self {
        Self::decode(format!("skin image: {err}"))
    }
}

/// GPU-side failures carry their whole context chain.
impl From<anyhow::Error> for RenderError {
    fn from(err: anyhow::Error) -> Self {
        Self::render_fault(format!("{err:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn unsupported_mode_keeps_ordinal() {
        let err = RenderError::from(ProtoError::UnsupportedMode(9));
        assert_eq!(err.kind, ErrorKind::UnsupportedMode);
        let desc = err.to_description();
        assert_eq!(desc.detail.get("ordinal").map(String::as_str), Some("9"));
        assert_eq!(desc.version, 1);
    }

    #[test]
    fn anyhow_chain_is_flattened() {
        let res: anyhow::Result<()> = Err(anyhow::anyhow!("out of memory")).context("allocating target");
        let err = RenderError::from(res.unwrap_err());
        assert_eq!(err.kind, ErrorKind::RenderFault);
        assert_eq!(err.message, "allocating target: out of memory");
    }

    #[test]
    fn display_names_kind() {
        let err = RenderError::decode("not a png");
        assert_eq!(err.to_string(), "DecodeError: not a png");
    }
}
