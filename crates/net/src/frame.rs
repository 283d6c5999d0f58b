//! Length-prefixed frame encoding/decoding
//!
//! Wire format: [4-byte big-endian length][JSON payload]
//! The length counts payload bytes exactly.
//! Maximum frame size: 1MB (sanity limit)

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::protocol::Request;

/// Maximum allowed frame size (1MB)
pub const MAX_FRAME_SIZE: u32 = 1024 * 1024;

/// Width of the length prefix in bytes
pub const PREFIX_LEN: usize = 4;

/// Read one length-prefixed payload from a stream
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>> {
    // Read 4-byte length prefix
    let mut len_buf = [0u8; PREFIX_LEN];
    reader.read_exact(&mut len_buf).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::BrokenConnection
        } else {
            Error::Io(e)
        }
    })?;

    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_SIZE {
        return Err(Error::Protocol(format!(
            "Frame too large: {} bytes (max {})",
            len, MAX_FRAME_SIZE
        )));
    }

    // Read payload, tracking how much arrived so a short stream is reported
    let expected = len as usize;
    let mut payload = vec![0u8; expected];
    let mut received = 0;
    while received < expected {
        let n = reader.read(&mut payload[received..]).await?;
        if n == 0 {
            return Err(Error::PartialRead { expected, received });
        }
        received += n;
    }

    Ok(payload)
}

/// Write one length-prefixed payload to a stream
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, payload: &[u8]) -> Result<()> {
    let len = checked_len(payload)?;

    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;

    // Flush to ensure delivery
    writer.flush().await?;

    Ok(())
}

/// Encode a request into framed bytes (prefix included)
pub fn encode_request(request: &Request) -> Result<Vec<u8>> {
    let payload = request
        .to_bytes()
        .map_err(|e| Error::Protocol(format!("Serialization failed: {}", e)))?;
    let len = checked_len(&payload)?;

    let mut framed = Vec::with_capacity(PREFIX_LEN + payload.len());
    framed.extend_from_slice(&len.to_be_bytes());
    framed.extend_from_slice(&payload);
    Ok(framed)
}

/// Decode framed bytes (prefix included) back into a request
pub fn decode_request(framed: &[u8]) -> Result<Request> {
    let payload = unframe(framed)?;
    Request::from_bytes(payload).map_err(|e| Error::Protocol(format!("Invalid JSON: {}", e)))
}

/// Decode a response payload; an empty payload reads as an empty object
pub fn decode_response(payload: &[u8]) -> Result<Value> {
    if payload.is_empty() {
        return Ok(Value::Object(Default::default()));
    }

    serde_json::from_slice(payload).map_err(|e| Error::Protocol(format!("Invalid JSON: {}", e)))
}

fn checked_len(payload: &[u8]) -> Result<u32> {
    u32::try_from(payload.len())
        .ok()
        .filter(|len| *len <= MAX_FRAME_SIZE)
        .ok_or_else(|| {
            Error::Protocol(format!(
                "Message too large: {} bytes (max {})",
                payload.len(),
                MAX_FRAME_SIZE
            ))
        })
}

fn unframe(framed: &[u8]) -> Result<&[u8]> {
    if framed.len() < PREFIX_LEN {
        return Err(Error::Protocol("Missing length prefix".into()));
    }

    let (prefix, rest) = framed.split_at(PREFIX_LEN);
    let mut len_buf = [0u8; PREFIX_LEN];
    len_buf.copy_from_slice(prefix);
    let len = u32::from_be_bytes(len_buf) as usize;

    if rest.len() != len {
        return Err(Error::Protocol(format!(
            "Length prefix says {} bytes, frame carries {}",
            len,
            rest.len()
        )));
    }

    Ok(rest)
}
