use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::ProtoError;
use crate::wire::{FrameReader, FrameWriter};

/// Current version of the serialized [`ErrorDescription`].
pub const ERROR_DESCRIPTION_VERSION: u32 = 1;

/// Outcome tag carried by every response frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum Outcome {
    /// Payload is a PNG image.
    Success = 0,
    /// Payload is a JSON [`ErrorDescription`].
    Failure = 1,
}

impl Outcome {
    fn from_tag(tag: u8) -> Result<Self, ProtoError> {
        match tag {
            0 => Ok(Outcome::Success),
            1 => Ok(Outcome::Failure),
            other => Err(ProtoError::malformed(format!("unknown outcome tag {other}"))),
        }
    }
}

/// Classification of a failed job.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    MalformedJob,
    UnsupportedMode,
    DecodeError,
    RenderFault,
    TransportFault,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::MalformedJob => "MalformedJob",
            ErrorKind::UnsupportedMode => "UnsupportedMode",
            ErrorKind::DecodeError => "DecodeError",
            ErrorKind::RenderFault => "RenderFault",
            ErrorKind::TransportFault => "TransportFault",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Language-neutral description of a failed job, sent as the failure payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescription {
    pub version: u32,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub detail: BTreeMap<String, String>,
}

impl ErrorDescription {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            version: ERROR_DESCRIPTION_VERSION,
            kind,
            message: message.into(),
            detail: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.detail.insert(key.into(), value.into());
        self
    }

    pub fn to_json(&self) -> Vec<u8> {
        // Only strings and integers; serialization cannot fail.
        serde_json::to_vec(self).unwrap_or_default()
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, ProtoError> {
        serde_json::from_slice(bytes)
            .map_err(|e| ProtoError::malformed(format!("bad error description: {e}")))
    }
}

/// One response frame: `utf worker | u8 outcome | payload...`.
///
/// The payload is not length-prefixed; it runs to the end of the message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    pub worker: String,
    pub outcome: Outcome,
    pub payload: Vec<u8>,
}

impl ResponseFrame {
    pub fn success(worker: impl Into<String>, png: Vec<u8>) -> Self {
        Self { worker: worker.into(), outcome: Outcome::Success, payload: png }
    }

    pub fn failure(worker: impl Into<String>, error: &ErrorDescription) -> Self {
        Self {
            worker: worker.into(),
            outcome: Outcome::Failure,
            payload: error.to_json(),
        }
    }

    /// Writes the frame to `sink`. Only sink faults (or an unencodable worker
    /// name) make this fail.
    pub fn write_to<W: Write>(&self, sink: &mut W) -> io::Result<()> {
        let mut head = FrameWriter::new();
        head.put_utf(&self.worker, "worker name")
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        head.put_u8(self.outcome as u8);
        sink.write_all(&head.into_inner())?;
        sink.write_all(&self.payload)
    }

    pub fn encode(&self) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.worker.len() + 3 + self.payload.len());
        self.write_to(&mut out)?;
        Ok(out)
    }

    pub fn decode(body: &[u8]) -> Result<Self, ProtoError> {
        let mut r = FrameReader::new(body);
        let worker = r.utf("worker name")?;
        let outcome = Outcome::from_tag(r.u8("outcome")?)?;
        let payload = r.rest().to_vec();
        Ok(Self { worker, outcome, payload })
    }

    /// Parses the payload of a failure frame.
    pub fn error(&self) -> Option<ErrorDescription> {
        match self.outcome {
            Outcome::Failure => ErrorDescription::from_json(&self.payload).ok(),
            Outcome::Success => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_layout() {
        let frame = ResponseFrame::success("w1", vec![9, 8]);
        assert_eq!(frame.encode().unwrap(), vec![0, 2, b'w', b'1', 0, 9, 8]);
    }

    #[test]
    fn failure_roundtrip() {
        let desc = ErrorDescription::new(ErrorKind::UnsupportedMode, "mode 9")
            .with_detail("ordinal", "9");
        let frame = ResponseFrame::failure("render-2", &desc);
        let back = ResponseFrame::decode(&frame.encode().unwrap()).unwrap();
        assert_eq!(back, frame);
        assert_eq!(back.error(), Some(desc));
    }

    #[test]
    fn error_description_is_versioned_json() {
        let desc = ErrorDescription::new(ErrorKind::RenderFault, "boom");
        let v: serde_json::Value = serde_json::from_slice(&desc.to_json()).unwrap();
        assert_eq!(v["version"], 1);
        assert_eq!(v["kind"], "RenderFault");
        assert_eq!(v["message"], "boom");
        assert!(v.get("detail").is_none());
    }

    #[test]
    fn unknown_outcome_is_malformed() {
        assert!(ResponseFrame::decode(&[0, 0, 2]).is_err());
    }

    #[test]
    fn empty_payload_is_allowed() {
        let frame = ResponseFrame::decode(&[0, 1, b'x', 0]).unwrap();
        assert_eq!(frame.worker, "x");
        assert!(frame.payload.is_empty());
    }
}
