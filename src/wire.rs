//! Length-prefixed wire protocol shared between the driver (S) and the
//! oracle handler (C) (§6).
//!
//! Every framed message is `uint32 length` (big-endian, length of the
//! payload only) followed by `uint32 type` followed by `length` bytes of
//! payload. The lone exception is the termination sentinel: four zero
//! bytes with no type field and no payload.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug, Error)]
pub enum WireError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("truncated message: expected {expected} bytes, got {got}")]
    Truncated { expected: u32, got: usize },
    #[error("unknown message type: {0}")]
    UnknownMessageType(u32),
    #[error("serialization failed: {0}")]
    Serialization(#[from] bincode::Error),
}

pub type WireResult<T> = Result<T, WireError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    VertexSimilarity = 1,
    TopKPaths = 2,
    PathSimilarity = 3,
    LineageRequest = 4,
    Enrichment = 5,
}

impl MessageType {
    pub fn from_u32(value: u32) -> WireResult<Self> {
        match value {
            1 => Ok(Self::VertexSimilarity),
            2 => Ok(Self::TopKPaths),
            3 => Ok(Self::PathSimilarity),
            4 => Ok(Self::LineageRequest),
            5 => Ok(Self::Enrichment),
            other => Err(WireError::UnknownMessageType(other)),
        }
    }
}

/// A decoded incoming frame, or the termination sentinel.
pub enum Envelope {
    Message { kind: MessageType, payload: Vec<u8> },
    Terminate,
}

pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    kind: MessageType,
    payload: &[u8],
) -> WireResult<()> {
    writer.write_u32(payload.len() as u32).await?;
    writer.write_u32(kind as u32).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Writes the bare termination sentinel: `uint32 0` and nothing else.
pub async fn write_terminate<W: AsyncWrite + Unpin>(writer: &mut W) -> WireResult<()> {
    writer.write_u32(0).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> WireResult<Envelope> {
    let length = reader.read_u32().await?;
    // A length of zero with no further bytes available is the
    // termination sentinel (§6). A genuine zero-length payload message
    // still carries a type field, so we distinguish by trying to read it;
    // eof here means the peer really did just send the sentinel.
    let kind_raw = match reader.read_u32().await {
        Ok(v) => v,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof && length == 0 => {
            return Ok(Envelope::Terminate);
        }
        Err(e) => return Err(e.into()),
    };
    let kind = MessageType::from_u32(kind_raw)?;
    let mut payload = vec![0u8; length as usize];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|_| WireError::Truncated {
            expected: length,
            got: 0,
        })?;
    Ok(Envelope::Message { kind, payload })
}

pub fn encode<T: Serialize>(value: &T) -> WireResult<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

pub fn decode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> WireResult<T> {
    Ok(bincode::deserialize(bytes)?)
}

/// The one-time key-setup handshake (§2 step 1): sent by C over the main
/// session socket before any of the numbered oracle message types flow.
/// Not part of the §6 taxonomy table itself — it precedes it — but framed
/// the same way (length-prefixed, here as a single bincode blob rather
/// than a typed envelope, since there is only ever one of these per
/// session and no reply is expected).
///
/// `vertices` is a `Vec`, not a `HashMap`, so the insertion order C built
/// its encrypted map in survives the wire: §5 requires vertex-pair
/// iteration to follow "the insertion order of the respective encrypted
/// maps", which a hash map cannot preserve.
#[derive(Debug, Serialize, Deserialize)]
pub struct KeySetupPayload {
    pub dimension: u32,
    pub server_key: Vec<u8>,
    pub public_key: Vec<u8>,
    pub vertices: Vec<(String, Vec<u8>)>,
}

pub async fn write_key_setup<W: AsyncWrite + Unpin>(writer: &mut W, payload: &KeySetupPayload) -> WireResult<()> {
    let bytes = encode(payload)?;
    writer.write_u32(bytes.len() as u32).await?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_key_setup<R: AsyncRead + Unpin>(reader: &mut R) -> WireResult<KeySetupPayload> {
    let length = reader.read_u32().await?;
    let mut buf = vec![0u8; length as usize];
    reader
        .read_exact(&mut buf)
        .await
        .map_err(|_| WireError::Truncated { expected: length, got: 0 })?;
    decode(&buf)
}

/// Payload of a type-2 request (`S -> C`, §6).
#[derive(Debug, Serialize, Deserialize)]
pub struct TopKRequest {
    pub vertex_uri: String,
    pub k: u32,
}

/// Payload of a type-2 reply.
#[derive(Debug, Serialize, Deserialize)]
pub struct TopKReply {
    pub uris: Vec<String>,
    pub vectors: Vec<Vec<u8>>,
    pub edges: Vec<Vec<u8>>,
    pub length: Vec<Vec<u8>>,
}

/// Payload of a type-5 enrichment push.
#[derive(Debug, Serialize, Deserialize)]
pub struct EnrichmentPush {
    pub uri: String,
    pub subgraph: Vec<u8>,
}
