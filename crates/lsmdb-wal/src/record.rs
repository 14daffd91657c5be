// WAL record format and encoding/decoding
//
// Record format (binary):
// [length: u32 LE] [type: u8] [lsn: u64 LE] [payload bytes] [crc32: u32 LE]
//
// `length` covers type + lsn + payload. The CRC covers the same bytes.
//
// Types:
// - PUT (1): key-value insert/update
// - DELETE (2): key deletion
// - BEGIN_TX (3): start of an atomic group
// - COMMIT_TX (4): end of an atomic group

use crc32fast::Hasher;
use lsmdb_core::validate::{MAX_KEY_SIZE, MAX_VALUE_SIZE};
use lsmdb_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Bytes of framing around a payload: length, type, lsn and crc.
pub const FRAME_OVERHEAD: usize = 4 + 1 + 8 + 4;

/// Upper bound on `length`; anything larger is garbage, not a record.
pub const MAX_CONTENT_LEN: usize = 1 + 8 + MAX_KEY_SIZE + MAX_VALUE_SIZE + 64;

/// WAL record types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum RecordType {
    Put = 1,
    Delete = 2,
    BeginTx = 3,
    CommitTx = 4,
}

impl TryFrom<u8> for RecordType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(RecordType::Put),
            2 => Ok(RecordType::Delete),
            3 => Ok(RecordType::BeginTx),
            4 => Ok(RecordType::CommitTx),
            _ => Err(Error::Serialization(format!(
                "Unknown WAL record type: {}",
                value
            ))),
        }
    }
}

/// WAL record payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordPayload {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
    BeginTx { tx_id: u64 },
    CommitTx { tx_id: u64 },
}

/// A WAL record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalRecord {
    pub record_type: RecordType,
    /// Log sequence number, assigned by the writer
    pub lsn: u64,
    pub payload: RecordPayload,
}

impl WalRecord {
    /// Create a PUT record
    pub fn put(key: Vec<u8>, value: Vec<u8>) -> Self {
        Self {
            record_type: RecordType::Put,
            lsn: 0,
            payload: RecordPayload::Put { key, value },
        }
    }

    /// Create a DELETE record
    pub fn delete(key: Vec<u8>) -> Self {
        Self {
            record_type: RecordType::Delete,
            lsn: 0,
            payload: RecordPayload::Delete { key },
        }
    }

    /// Create a BEGIN_TX record
    pub fn begin_tx(tx_id: u64) -> Self {
        Self {
            record_type: RecordType::BeginTx,
            lsn: 0,
            payload: RecordPayload::BeginTx { tx_id },
        }
    }

    /// Create a COMMIT_TX record
    pub fn commit_tx(tx_id: u64) -> Self {
        Self {
            record_type: RecordType::CommitTx,
            lsn: 0,
            payload: RecordPayload::CommitTx { tx_id },
        }
    }

    /// Returns the record with `lsn` set.
    pub fn with_lsn(mut self, lsn: u64) -> Self {
        self.lsn = lsn;
        self
    }

    /// Encode record to bytes with framing and CRC
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload_bytes = bincode::serialize(&self.payload)
            .map_err(|e| Error::Serialization(format!("Failed to serialize payload: {}", e)))?;

        let type_byte = self.record_type as u8;
        let lsn_bytes = self.lsn.to_le_bytes();
        let content_len = 1 + lsn_bytes.len() + payload_bytes.len();

        let mut hasher = Hasher::new();
        hasher.update(&[type_byte]);
        hasher.update(&lsn_bytes);
        hasher.update(&payload_bytes);
        let crc = hasher.finalize();

        let mut frame = Vec::with_capacity(4 + content_len + 4);
        frame.extend_from_slice(&(content_len as u32).to_le_bytes());
        frame.push(type_byte);
        frame.extend_from_slice(&lsn_bytes);
        frame.extend_from_slice(&payload_bytes);
        frame.extend_from_slice(&crc.to_le_bytes());

        Ok(frame)
    }

    /// Total frame size announced by a frame's length prefix, or `None` if
    /// the prefix cannot start a valid frame.
    pub fn frame_len(prefix: [u8; 4]) -> Option<usize> {
        let length = u32::from_le_bytes(prefix) as usize;
        if length < 9 || length > MAX_CONTENT_LEN {
            return None;
        }
        Some(4 + length + 4)
    }

    /// Decode record from bytes with validation
    pub fn decode(data: &[u8]) -> Result<(Self, usize)> {
        if data.len() < FRAME_OVERHEAD {
            return Err(Error::Serialization("Incomplete record frame".to_string()));
        }

        let total_size = Self::frame_len([data[0], data[1], data[2], data[3]])
            .ok_or_else(|| Error::Serialization("Invalid record length".to_string()))?;
        if data.len() < total_size {
            return Err(Error::Serialization(format!(
                "Incomplete record: expected {} bytes, got {}",
                total_size,
                data.len()
            )));
        }

        let crc_offset = total_size - 4;
        let content = &data[4..crc_offset];
        let expected_crc = u32::from_le_bytes([
            data[crc_offset],
            data[crc_offset + 1],
            data[crc_offset + 2],
            data[crc_offset + 3],
        ]);

        let mut hasher = Hasher::new();
        hasher.update(content);
        let actual_crc = hasher.finalize();
        if actual_crc != expected_crc {
            return Err(Error::Corruption(format!(
                "WAL CRC mismatch: expected {}, got {}",
                expected_crc, actual_crc
            )));
        }

        let record_type = RecordType::try_from(content[0])?;
        let mut lsn_bytes = [0u8; 8];
        lsn_bytes.copy_from_slice(&content[1..9]);
        let lsn = u64::from_le_bytes(lsn_bytes);

        let payload: RecordPayload = bincode::deserialize(&content[9..])
            .map_err(|e| Error::Serialization(format!("Failed to deserialize payload: {}", e)))?;

        let consistent = matches!(
            (record_type, &payload),
            (RecordType::Put, RecordPayload::Put { .. })
                | (RecordType::Delete, RecordPayload::Delete { .. })
                | (RecordType::BeginTx, RecordPayload::BeginTx { .. })
                | (RecordType::CommitTx, RecordPayload::CommitTx { .. })
        );
        if !consistent {
            return Err(Error::Serialization(
                "Record type does not match payload".to_string(),
            ));
        }

        Ok((
            WalRecord {
                record_type,
                lsn,
                payload,
            },
            total_size,
        ))
    }
}
