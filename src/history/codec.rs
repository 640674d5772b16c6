//! Codecs turning page JSON into compact history blobs.

use crate::error::{NavigationError, Result};
use async_trait::async_trait;
use serde_json::Value;

/// Magic bytes for encoded history blobs.
const FRAME_MAGIC: &[u8; 4] = b"PGT\0";

/// Current blob format version.
const FRAME_VERSION: u8 = 1;

/// Header: magic + version + payload length.
const FRAME_HEADER_LEN: usize = 4 + 1 + 4;

/// Largest payload accepted on decode.
const MAX_FRAME_PAYLOAD: usize = 64 * 1024 * 1024;

/// Encoding capability used for large or encrypted history entries.
///
/// Implementations may be asynchronous (e.g. backed by a crypto API).
#[async_trait]
pub trait StateCodec: Send + Sync {
    async fn encode(&self, value: &Value) -> Result<Vec<u8>>;
    async fn decode(&self, blob: &[u8]) -> Result<Value>;
}

/// MessagePack payload in a checksummed frame.
///
/// Layout: `PGT\0` | version (u8) | payload length (u32 LE) | payload | CRC32 (u32 LE)
#[derive(Clone, Copy, Debug, Default)]
pub struct MessagePackCodec;

impl MessagePackCodec {
    pub fn new() -> Self {
        Self
    }

    fn write_frame(payload: &[u8]) -> Result<Vec<u8>> {
        let len = u32::try_from(payload.len())
            .map_err(|_| NavigationError::Serialization("history payload too large".into()))?;

        let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len() + 4);
        frame.extend_from_slice(FRAME_MAGIC);
        frame.push(FRAME_VERSION);
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(payload);
        frame.extend_from_slice(&crc32fast::hash(payload).to_le_bytes());
        Ok(frame)
    }

    fn read_frame(frame: &[u8]) -> Result<&[u8]> {
        if frame.len() < FRAME_HEADER_LEN + 4 {
            return Err(NavigationError::Corruption("history blob truncated".into()));
        }

        if &frame[0..4] != FRAME_MAGIC {
            return Err(NavigationError::InvalidFormat("Invalid blob magic".into()));
        }

        if frame[4] != FRAME_VERSION {
            return Err(NavigationError::InvalidFormat(format!(
                "Unsupported blob version: {}",
                frame[4]
            )));
        }

        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&frame[5..9]);
        let len = u32::from_le_bytes(len_bytes) as usize;

        if len > MAX_FRAME_PAYLOAD {
            return Err(NavigationError::Corruption("history blob too large".into()));
        }
        if frame.len() != FRAME_HEADER_LEN + len + 4 {
            return Err(NavigationError::Corruption(format!(
                "history blob length mismatch: header says {len}, frame has {}",
                frame.len() - FRAME_HEADER_LEN - 4
            )));
        }

        let payload = &frame[FRAME_HEADER_LEN..FRAME_HEADER_LEN + len];

        let mut checksum_bytes = [0u8; 4];
        checksum_bytes.copy_from_slice(&frame[FRAME_HEADER_LEN + len..]);
        let stored = u32::from_le_bytes(checksum_bytes);
        let computed = crc32fast::hash(payload);
        if stored != computed {
            return Err(NavigationError::ChecksumMismatch {
                expected: stored,
                got: computed,
            });
        }

        Ok(payload)
    }
}

#[async_trait]
impl StateCodec for MessagePackCodec {
    async fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        let payload = rmp_serde::to_vec(value)?;
        Self::write_frame(&payload)
    }

    async fn decode(&self, blob: &[u8]) -> Result<Value> {
        let payload = Self::read_frame(blob)?;
        Ok(rmp_serde::from_slice(payload)?)
    }
}
