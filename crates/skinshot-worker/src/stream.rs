//! Length-delimited request/response streams for running a worker pool over
//! plain pipes (stdin/stdout) instead of a broker.
//!
//! Request records (big-endian):
//! - u32 LEN
//! - [u8; LEN] compressed request frame
//!
//! Response records (big-endian):
//! - u16 LEN, correlation id bytes (UTF-8)
//! - u32 LEN
//! - [u8; LEN] response frame
//!
//! Requests get sequential delivery tags starting at 1; the tag doubles as the
//! correlation id when the caller does not supply one.

use std::io::{self, ErrorKind, Read, Write};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result, anyhow, bail};
use skinshot_proto::MAX_FRAME_LEN;

use crate::{Delivery, Transport};

/// Reply queue name given to deliveries read from a stream.
pub const STREAM_REPLY_TO: &str = "stream";

/// Reads one request record. Returns `Ok(None)` on a clean end of stream.
pub fn read_delivery<R: Read>(input: &mut R, delivery_tag: u64) -> io::Result<Option<Delivery>> {
    let Some(lenb) = read_header::<_, 4>(input)? else {
        return Ok(None);
    };

    let len = u32::from_be_bytes(lenb) as usize;
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            ErrorKind::InvalidData,
            format!("request record too large: {len} > {MAX_FRAME_LEN}"),
        ));
    }

    let mut body = vec![0u8; len];
    input.read_exact(&mut body)?;
    Ok(Some(Delivery {
        body,
        reply_to: STREAM_REPLY_TO.to_string(),
        correlation_id: Some(delivery_tag.to_string()),
        delivery_tag,
    }))
}

/// Reads the leading field of a record.
///
/// `Ok(None)` only when the stream ends before the first byte; a header cut
/// off partway is `UnexpectedEof`.
fn read_header<R: Read, const N: usize>(input: &mut R) -> io::Result<Option<[u8; N]>> {
    let mut buf = [0u8; N];
    let mut filled = 0;
    while filled < N {
        match input.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                return Err(io::Error::new(
                    ErrorKind::UnexpectedEof,
                    format!("record header truncated after {filled} of {N} bytes"),
                ));
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(Some(buf))
}

/// Appends one request record to `out`.
pub fn write_request(out: &mut Vec<u8>, body: &[u8]) -> Result<()> {
    let len = u32::try_from(body.len()).context("request body too large")?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(body);
    Ok(())
}

/// One response record read back from a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamResponse {
    pub correlation_id: String,
    pub body: Vec<u8>,
}

/// Reads one response record. Returns `Ok(None)` on a clean end of stream.
pub fn read_response<R: Read>(input: &mut R) -> io::Result<Option<StreamResponse>> {
    let Some(idlen) = read_header::<_, 2>(input)? else {
        return Ok(None);
    };
    let mut id = vec![0u8; u16::from_be_bytes(idlen) as usize];
    input.read_exact(&mut id)?;
    let correlation_id = String::from_utf8(id)
        .map_err(|_| io::Error::new(ErrorKind::InvalidData, "correlation id is not UTF-8"))?;

    let mut lenb = [0u8; 4];
    input.read_exact(&mut lenb)?;
    let mut body = vec![0u8; u32::from_be_bytes(lenb) as usize];
    input.read_exact(&mut body)?;
    Ok(Some(StreamResponse { correlation_id, body }))
}

/// Transport writing response records to a byte sink.
///
/// Records from concurrent workers never interleave; each one is written
/// under the sink lock and flushed.
pub struct StreamTransport<W: Write + Send> {
    sink: Mutex<W>,
    acked: AtomicU64,
}

impl<W: Write + Send> StreamTransport<W> {
    pub fn new(sink: W) -> Self {
        Self { sink: Mutex::new(sink), acked: AtomicU64::new(0) }
    }

    /// Number of deliveries acknowledged so far.
    pub fn acked(&self) -> u64 {
        self.acked.load(Ordering::Acquire)
    }

    pub fn into_inner(self) -> Result<W> {
        self.sink
            .into_inner()
            .map_err(|_| anyhow!("stream sink poisoned"))
    }
}

impl<W: Write + Send> Transport for StreamTransport<W> {
    fn publish(&self, _reply_to: &str, correlation_id: Option<&str>, body: Vec<u8>) -> Result<()> {
        let id = correlation_id.unwrap_or_default();
        let Ok(idlen) = u16::try_from(id.len()) else {
            bail!("correlation id longer than {} bytes", u16::MAX);
        };
        let len = u32::try_from(body.len()).context("response body too large")?;

        let mut record = Vec::with_capacity(6 + id.len() + body.len());
        record.extend_from_slice(&idlen.to_be_bytes());
        record.extend_from_slice(id.as_bytes());
        record.extend_from_slice(&len.to_be_bytes());
        record.extend_from_slice(&body);

        let mut sink = self
            .sink
            .lock()
            .map_err(|_| anyhow!("stream sink poisoned"))?;
        sink.write_all(&record).context("writing response record")?;
        sink.flush().context("flushing response stream")
    }

    fn ack(&self, delivery_tag: u64) -> Result<()> {
        self.acked.fetch_add(1, Ordering::AcqRel);
        log::trace!("acked delivery {delivery_tag}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn request_records_read_in_order() {
        let mut buf = Vec::new();
        write_request(&mut buf, b"first").unwrap();
        write_request(&mut buf, b"").unwrap();
        let mut input = Cursor::new(buf);

        let a = read_delivery(&mut input, 1).unwrap().unwrap();
        assert_eq!(a.body, b"first");
        assert_eq!(a.correlation_id.as_deref(), Some("1"));
        let b = read_delivery(&mut input, 2).unwrap().unwrap();
        assert!(b.body.is_empty());
        assert_eq!(b.delivery_tag, 2);
        assert!(read_delivery(&mut input, 3).unwrap().is_none());
    }

    #[test]
    fn truncated_request_is_an_error() {
        let mut buf = Vec::new();
        write_request(&mut buf, b"hello").unwrap();
        buf.truncate(6);
        assert!(read_delivery(&mut Cursor::new(buf), 1).is_err());
    }

    #[test]
    fn truncated_header_is_not_end_of_stream() {
        let err = read_delivery(&mut Cursor::new(vec![0u8, 0]), 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
        let err = read_response(&mut Cursor::new(vec![0u8])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
        assert!(read_response(&mut Cursor::new(Vec::new())).unwrap().is_none());
    }

    #[test]
    fn oversized_request_is_rejected() {
        let buf = u32::MAX.to_be_bytes().to_vec();
        let err = read_delivery(&mut Cursor::new(buf), 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn published_records_read_back() {
        let transport = StreamTransport::new(Vec::new());
        transport.publish(STREAM_REPLY_TO, Some("7"), vec![1, 2, 3]).unwrap();
        transport.publish(STREAM_REPLY_TO, None, vec![]).unwrap();
        transport.ack(7).unwrap();
        assert_eq!(transport.acked(), 1);

        let mut out = Cursor::new(transport.into_inner().unwrap());
        let first = read_response(&mut out).unwrap().unwrap();
        assert_eq!(first, StreamResponse { correlation_id: "7".into(), body: vec![1, 2, 3] });
        let second = read_response(&mut out).unwrap().unwrap();
        assert_eq!(second.correlation_id, "");
        assert!(second.body.is_empty());
        assert!(read_response(&mut out).unwrap().is_none());
    }
}
