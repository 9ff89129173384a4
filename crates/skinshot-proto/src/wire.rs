//! Big-endian primitive readers/writers shared by the request and response frames.
//!
//! Strings are a u16 byte length followed by UTF-8 bytes.

use crate::ProtoError;

/// Bounds-checked cursor over a fully inflated frame.
///
/// Every read checks the remaining length first, so a count that points past
/// the end of the frame surfaces as `Malformed` instead of a partial value.
pub(crate) struct FrameReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FrameReader<'a> {
    #[inline]
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    #[inline]
    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub(crate) fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8], ProtoError> {
        if n > self.remaining() {
            return Err(ProtoError::malformed(format!(
                "truncated reading {what}: need {n} bytes, {} left",
                self.remaining()
            )));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Consumes and returns everything after the cursor.
    pub(crate) fn rest(&mut self) -> &'a [u8] {
        let out = &self.buf[self.pos..];
        self.pos = self.buf.len();
        out
    }

    fn array<const N: usize>(&mut self, what: &str) -> Result<[u8; N], ProtoError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, what)?);
        Ok(out)
    }

    pub(crate) fn u8(&mut self, what: &str) -> Result<u8, ProtoError> {
        Ok(self.array::<1>(what)?[0])
    }

    pub(crate) fn bool(&mut self, what: &str) -> Result<bool, ProtoError> {
        Ok(self.u8(what)? != 0)
    }

    pub(crate) fn u16(&mut self, what: &str) -> Result<u16, ProtoError> {
        Ok(u16::from_be_bytes(self.array(what)?))
    }

    pub(crate) fn i32(&mut self, what: &str) -> Result<i32, ProtoError> {
        Ok(i32::from_be_bytes(self.array(what)?))
    }

    pub(crate) fn i64(&mut self, what: &str) -> Result<i64, ProtoError> {
        Ok(i64::from_be_bytes(self.array(what)?))
    }

    pub(crate) fn utf(&mut self, what: &str) -> Result<String, ProtoError> {
        let len = self.u16(what)? as usize;
        let bytes = self.take(len, what)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| ProtoError::malformed(format!("{what} is not valid UTF-8")))
    }
}

/// Append-only writer producing the same encoding `FrameReader` consumes.
#[derive(Debug, Default)]
pub(crate) struct FrameWriter {
    buf: Vec<u8>,
}

impl FrameWriter {
    #[inline]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    #[inline]
    pub(crate) fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    #[inline]
    pub(crate) fn put_bool(&mut self, v: bool) {
        self.buf.push(v as u8);
    }

    #[inline]
    pub(crate) fn put_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    #[inline]
    pub(crate) fn put_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    #[inline]
    pub(crate) fn put_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    #[inline]
    pub(crate) fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub(crate) fn put_utf(&mut self, s: &str, what: &str) -> Result<(), ProtoError> {
        let len = u16::try_from(s.len())
            .map_err(|_| ProtoError::malformed(format!("{what} longer than {} bytes", u16::MAX)))?;
        self.put_u16(len);
        self.buf.extend_from_slice(s.as_bytes());
        Ok(())
    }

    /// Writes a u16 element count, rejecting collections that cannot be represented.
    pub(crate) fn put_count_u16(&mut self, n: usize, what: &str) -> Result<(), ProtoError> {
        let n = u16::try_from(n)
            .map_err(|_| ProtoError::malformed(format!("too many {what}: {n}")))?;
        self.put_u16(n);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian() {
        let bytes = [0x01, 0x02, 0xff, 0xff, 0xff, 0xfe];
        let mut r = FrameReader::new(&bytes);
        assert_eq!(r.u16("a").unwrap(), 0x0102);
        assert_eq!(r.i32("b").unwrap(), -2);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn truncated_read_is_malformed_and_consumes_nothing() {
        let bytes = [0x00, 0x05, b'a', b'b'];
        let mut r = FrameReader::new(&bytes);
        assert!(matches!(r.utf("name"), Err(ProtoError::Malformed(_))));
        let mut r = FrameReader::new(&bytes[..1]);
        assert!(r.u16("count").is_err());
        assert_eq!(r.remaining(), 1);
    }

    #[test]
    fn invalid_utf8_is_malformed() {
        let bytes = [0x00, 0x02, 0xc3, 0x28];
        let mut r = FrameReader::new(&bytes);
        assert!(matches!(r.utf("key"), Err(ProtoError::Malformed(_))));
    }

    #[test]
    fn writer_matches_reader() {
        let mut w = FrameWriter::new();
        w.put_utf("héllo", "s").unwrap();
        w.put_i64(-7);
        w.put_bool(true);
        let bytes = w.into_inner();
        let mut r = FrameReader::new(&bytes);
        assert_eq!(r.utf("s").unwrap(), "héllo");
        assert_eq!(r.i64("n").unwrap(), -7);
        assert!(r.bool("b").unwrap());
    }

    #[test]
    fn oversized_string_is_rejected() {
        let long = "x".repeat(u16::MAX as usize + 1);
        let mut w = FrameWriter::new();
        assert!(w.put_utf(&long, "name").is_err());
    }
}
