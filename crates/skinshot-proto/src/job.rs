use std::collections::BTreeMap;
use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use crate::wire::{FrameReader, FrameWriter};
use crate::{Profile, ProtoError, RenderMode};

/// Upper bound on an inflated request frame.
///
/// Skins are a few kilobytes; anything near this size is garbage or hostile.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// One decoded render request.
///
/// Wire layout (big-endian, zlib-compressed as a whole):
///
/// ```text
/// u8   mode ordinal
/// u16  width
/// u16  height
/// u8   supersampling (>= 1)
/// ...  profile record
/// u16  parameter count, then per entry: utf key, u8 n, n * utf value
/// i32  skin length, then that many PNG bytes
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderJob {
    pub mode: RenderMode,
    pub width: u16,
    pub height: u16,
    pub supersampling: u8,
    pub profile: Profile,
    /// Forward-compatible extension parameters.
    pub params: BTreeMap<String, Vec<String>>,
    /// PNG-encoded skin. Empty when the worker is expected to resolve it.
    pub skin: Vec<u8>,
}

impl RenderJob {
    pub fn new(mode: RenderMode, width: u16, height: u16, supersampling: u8, skin: Vec<u8>) -> Self {
        Self {
            mode,
            width,
            height,
            supersampling,
            profile: Profile::unknown(),
            params: BTreeMap::new(),
            skin,
        }
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, values: Vec<String>) -> Self {
        self.params.insert(key.into(), values);
        self
    }

    /// Inflates and decodes a request body.
    pub fn decode(body: &[u8]) -> Result<Self, ProtoError> {
        Self::decode_with_limit(body, MAX_FRAME_LEN)
    }

    /// Like [`decode`](Self::decode) with a custom cap on the inflated size.
    pub fn decode_with_limit(body: &[u8], limit: usize) -> Result<Self, ProtoError> {
        let frame = inflate(body, limit)?;
        Self::decode_frame(&frame)
    }

    /// Decodes an already-inflated frame.
    pub fn decode_frame(frame: &[u8]) -> Result<Self, ProtoError> {
        let mut r = FrameReader::new(frame);

        let mode = RenderMode::from_ordinal(r.u8("mode")?)?;
        let width = r.u16("width")?;
        let height = r.u16("height")?;
        let supersampling = r.u8("supersampling")?;
        if supersampling == 0 {
            return Err(ProtoError::malformed("supersampling must be at least 1"));
        }

        let profile = Profile::read(&mut r)?;
        let params = read_params(&mut r)?;

        let skin_len = r.i32("skin length")?;
        let skin_len = usize::try_from(skin_len)
            .map_err(|_| ProtoError::malformed(format!("negative skin length {skin_len}")))?;
        let skin = r.take(skin_len, "skin")?.to_vec();

        Ok(Self {
            mode,
            width,
            height,
            supersampling,
            profile,
            params,
            skin,
        })
    }

    /// Encodes and compresses this job into a request body.
    pub fn encode(&self) -> Result<Vec<u8>, ProtoError> {
        let frame = self.encode_frame()?;
        let mut z = ZlibEncoder::new(Vec::new(), Compression::default());
        z.write_all(&frame)
            .and_then(|_| z.finish())
            .map_err(|e| ProtoError::malformed(format!("compression failed: {e}")))
    }

    /// Encodes this job without compression.
    pub fn encode_frame(&self) -> Result<Vec<u8>, ProtoError> {
        if self.supersampling == 0 {
            return Err(ProtoError::malformed("supersampling must be at least 1"));
        }

        let mut w = FrameWriter::new();
        w.put_u8(self.mode.ordinal());
        w.put_u16(self.width);
        w.put_u16(self.height);
        w.put_u8(self.supersampling);
        self.profile.write(&mut w)?;

        w.put_count_u16(self.params.len(), "parameters")?;
        for (key, values) in &self.params {
            w.put_utf(key, "parameter key")?;
            let n = u8::try_from(values.len())
                .map_err(|_| ProtoError::malformed(format!("too many values for parameter {key}")))?;
            w.put_u8(n);
            for v in values {
                w.put_utf(v, "parameter value")?;
            }
        }

        let skin_len = i32::try_from(self.skin.len())
            .map_err(|_| ProtoError::malformed("skin payload too large"))?;
        w.put_i32(skin_len);
        w.put_bytes(&self.skin);
        Ok(w.into_inner())
    }
}

fn read_params(r: &mut FrameReader<'_>) -> Result<BTreeMap<String, Vec<String>>, ProtoError> {
    let count = r.u16("parameter count")? as usize;
    // Smallest entry is an empty key plus a zero value count.
    if count * 3 > r.remaining() {
        return Err(ProtoError::malformed(format!(
            "parameter count {count} exceeds frame"
        )));
    }

    let mut params = BTreeMap::new();
    for _ in 0..count {
        let key = r.utf("parameter key")?;
        let n = r.u8("parameter value count")? as usize;
        if n * 2 > r.remaining() {
            return Err(ProtoError::malformed(format!(
                "value count {n} for parameter {key} exceeds frame"
            )));
        }
        let mut values = Vec::with_capacity(n);
        for _ in 0..n {
            values.push(r.utf("parameter value")?);
        }
        params.insert(key, values);
    }
    Ok(params)
}

fn inflate(body: &[u8], limit: usize) -> Result<Vec<u8>, ProtoError> {
    let mut out = Vec::new();
    ZlibDecoder::new(body)
        .take(limit as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| ProtoError::malformed(format!("bad deflate stream: {e}")))?;
    if out.len() > limit {
        return Err(ProtoError::malformed(format!(
            "inflated frame exceeds {limit} bytes"
        )));
    }
    Ok(out)
}
