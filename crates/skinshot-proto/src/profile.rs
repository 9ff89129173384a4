use uuid::Uuid;

use crate::ProtoError;
use crate::wire::{FrameReader, FrameWriter};

/// Display name used when a frame carries no profile.
pub const UNKNOWN_NAME: &str = "<unknown>";

/// One profile property, optionally signed by the issuing platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub name: String,
    pub value: String,
    pub signature: Option<String>,
}

impl Property {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into(), signature: None }
    }

    pub fn signed(
        name: impl Into<String>,
        value: impl Into<String>,
        signature: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            signature: Some(signature.into()),
        }
    }
}

/// Identity of the player whose skin is being rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: Uuid,
    pub name: String,
    pub properties: Vec<Property>,
}

impl Profile {
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self { id, name: name.into(), properties: Vec::new() }
    }

    /// The identity synthesized for frames without a profile record.
    pub fn unknown() -> Self {
        Self::new(Uuid::nil(), UNKNOWN_NAME)
    }

    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    /// Returns the first property named `name`.
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub(crate) fn read(r: &mut FrameReader<'_>) -> Result<Self, ProtoError> {
        if !r.bool("profile presence flag")? {
            return Ok(Self::unknown());
        }

        let msb = r.i64("profile id")?;
        let lsb = r.i64("profile id")?;
        let id = Uuid::from_u64_pair(msb as u64, lsb as u64);
        let name = r.utf("profile name")?;

        let count = r.u16("property count")? as usize;
        // Each property needs at least a flag and two empty strings.
        if count * 5 > r.remaining() {
            return Err(ProtoError::malformed(format!(
                "property count {count} exceeds frame"
            )));
        }

        let mut properties = Vec::with_capacity(count);
        for _ in 0..count {
            let signed = r.bool("property signed flag")?;
            let name = r.utf("property name")?;
            let value = r.utf("property value")?;
            let signature = if signed {
                Some(r.utf("property signature")?)
            } else {
                None
            };
            properties.push(Property { name, value, signature });
        }

        Ok(Self { id, name, properties })
    }

    pub(crate) fn write(&self, w: &mut FrameWriter) -> Result<(), ProtoError> {
        w.put_bool(true);
        let (msb, lsb) = self.id.as_u64_pair();
        w.put_i64(msb as i64);
        w.put_i64(lsb as i64);
        w.put_utf(&self.name, "profile name")?;
        w.put_count_u16(self.properties.len(), "profile properties")?;
        for p in &self.properties {
            w.put_bool(p.signature.is_some());
            w.put_utf(&p.name, "property name")?;
            w.put_utf(&p.value, "property value")?;
            if let Some(sig) = &p.signature {
                w.put_utf(sig, "property signature")?;
            }
        }
        Ok(())
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::unknown()
    }
}
