use core::fmt;

use crate::ProtoError;

/// View mode requested by a job.
///
/// The discriminant is the wire ordinal. New modes must be appended, never
/// inserted, or every dispatcher in the farm starts asking for the wrong view.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum RenderMode {
    /// Flat crop of the face with the helm composited on top.
    Face = 0,
    /// Head and torso, facing the camera.
    Front = 1,
    /// Whole body, facing the camera.
    FrontFull = 2,
    /// Head only, three-quarter view.
    Head = 3,
    /// Head and torso, three-quarter view.
    Bust = 4,
    /// Whole body, three-quarter view.
    Full = 5,
    /// The normalized skin texture itself.
    Skin = 6,
}

impl RenderMode {
    /// Every mode in ordinal order.
    pub const ALL: [RenderMode; 7] = [
        RenderMode::Face,
        RenderMode::Front,
        RenderMode::FrontFull,
        RenderMode::Head,
        RenderMode::Bust,
        RenderMode::Full,
        RenderMode::Skin,
    ];

    #[inline]
    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn from_ordinal(ordinal: u8) -> Result<Self, ProtoError> {
        Self::ALL
            .get(ordinal as usize)
            .copied()
            .ok_or(ProtoError::UnsupportedMode(ordinal))
    }

    /// Returns `true` for modes produced without the GPU renderer.
    #[inline]
    pub const fn is_flat(self) -> bool {
        matches!(self, RenderMode::Face | RenderMode::Skin)
    }

    /// Lower-case name used in logs.
    pub const fn name(self) -> &'static str {
        match self {
            RenderMode::Face => "face",
            RenderMode::Front => "front",
            RenderMode::FrontFull => "frontfull",
            RenderMode::Head => "head",
            RenderMode::Bust => "bust",
            RenderMode::Full => "full",
            RenderMode::Skin => "skin",
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinals_match_position() {
        for (i, mode) in RenderMode::ALL.iter().enumerate() {
            assert_eq!(mode.ordinal() as usize, i);
            assert_eq!(RenderMode::from_ordinal(i as u8).unwrap(), *mode);
        }
    }

    #[test]
    fn out_of_range_ordinal_is_unsupported() {
        assert_eq!(
            RenderMode::from_ordinal(7),
            Err(ProtoError::UnsupportedMode(7))
        );
        assert_eq!(
            RenderMode::from_ordinal(255),
            Err(ProtoError::UnsupportedMode(255))
        );
    }

    #[test]
    fn only_face_and_skin_are_flat() {
        let flat: Vec<_> = RenderMode::ALL.iter().filter(|m| m.is_flat()).collect();
        assert_eq!(flat, [&RenderMode::Face, &RenderMode::Skin]);
    }
}
