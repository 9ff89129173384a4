use std::fmt;

/// A failure to read or write a skinshot frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtoError {
    /// The frame violates the field-order / length contract.
    Malformed(String),
    /// The mode byte is outside the known enumeration.
    UnsupportedMode(u8),
}

impl ProtoError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }
}

impl fmt::Display for ProtoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(msg) => write!(f, "malformed job frame: {msg}"),
            Self::UnsupportedMode(ordinal) => write!(f, "unsupported render mode ordinal {ordinal}"),
        }
    }
}

impl std::error::Error for ProtoError {}
