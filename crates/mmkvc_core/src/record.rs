//! Append-log record types and framing.
//!
//! Frame layout: `len: u32 | type: u8 | body | crc32: u32`, where `len`
//! counts `type` and `body`, and the CRC covers the same bytes. With a
//! crypt key the body is sealed by [`CryptoManager`]; the type byte stays
//! in the clear.

use crate::crypto::CryptoManager;
use crate::error::{CoreError, CoreResult};
use crate::log::ErrorKind;

/// Bytes preceding the record type: the frame length.
const LEN_SIZE: usize = 4;

/// CRC size.
const CRC_SIZE: usize = 4;

/// Type of log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// Insert or overwrite a key.
    Put = 1,
    /// Remove a key.
    Remove = 2,
}

impl RecordType {
    /// Converts a byte to a record type.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Put),
            2 => Some(Self::Remove),
            _ => None,
        }
    }

    /// Converts the record type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A log record describing one mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// Insert or overwrite a key.
    Put {
        /// The key.
        key: String,
        /// Absolute expiry in Unix seconds (0 = never).
        expire_at: u64,
        /// Encoded value bytes.
        value: Vec<u8>,
    },

    /// Remove a key.
    Remove {
        /// The key.
        key: String,
    },
}

impl Record {
    /// Returns the record type.
    #[must_use]
    pub fn record_type(&self) -> RecordType {
        match self {
            Self::Put { .. } => RecordType::Put,
            Self::Remove { .. } => RecordType::Remove,
        }
    }

    /// Serializes the record body (without envelope).
    pub fn encode_body(&self) -> CoreResult<Vec<u8>> {
        let mut buf = Vec::new();

        match self {
            Self::Put {
                key,
                expire_at,
                value,
            } => {
                push_len_prefixed(&mut buf, key.as_bytes())?;
                buf.extend_from_slice(&expire_at.to_le_bytes());
                push_len_prefixed(&mut buf, value)?;
            }
            Self::Remove { key } => {
                push_len_prefixed(&mut buf, key.as_bytes())?;
            }
        }

        Ok(buf)
    }

    /// Deserializes a record from its type and body.
    pub fn decode_body(record_type: RecordType, body: &[u8]) -> CoreResult<Self> {
        let mut cursor = 0;

        let key = read_len_prefixed(body, &mut cursor)?;
        let key = String::from_utf8(key.to_vec())
            .map_err(|_| CoreError::log_corruption("record key is not UTF-8"))?;

        let record = match record_type {
            RecordType::Put => {
                let expire_at = read_u64(body, &mut cursor)?;
                let value = read_len_prefixed(body, &mut cursor)?.to_vec();
                Self::Put {
                    key,
                    expire_at,
                    value,
                }
            }
            RecordType::Remove => Self::Remove { key },
        };

        if cursor != body.len() {
            return Err(CoreError::log_corruption(format!(
                "trailing bytes in {record_type:?} record: expected {cursor} bytes, got {}",
                body.len()
            )));
        }

        Ok(record)
    }

    /// Builds the full frame, sealing the body when a cipher is given.
    pub fn encode_frame(&self, cipher: Option<&CryptoManager>) -> CoreResult<Vec<u8>> {
        let body = self.encode_body()?;
        let body = match cipher {
            Some(cipher) => cipher.encrypt(&body)?,
            None => body,
        };

        let len = u32::try_from(body.len() + 1)
            .map_err(|_| CoreError::invalid_argument("record too large"))?;

        let mut frame = Vec::with_capacity(LEN_SIZE + 1 + body.len() + CRC_SIZE);
        frame.extend_from_slice(&len.to_le_bytes());
        frame.push(self.record_type().as_byte());
        frame.extend_from_slice(&body);
        let crc = compute_crc32(&frame[LEN_SIZE..]);
        frame.extend_from_slice(&crc.to_le_bytes());

        Ok(frame)
    }
}

/// Why a frame could not be read.
#[derive(Debug)]
pub enum FrameError {
    /// The frame runs past the end of the log.
    Truncated,
    /// The frame is complete but its contents are bad.
    Corrupt(CoreError),
}

impl FrameError {
    /// Maps the failure onto the kind reported to the error handler.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Truncated => ErrorKind::FileLength,
            Self::Corrupt(_) => ErrorKind::CrcCheckFail,
        }
    }
}

/// Decodes the frame at the start of `buf`, returning it and its length.
pub fn decode_frame(
    buf: &[u8],
    cipher: Option<&CryptoManager>,
) -> Result<(Record, usize), FrameError> {
    let len_bytes: [u8; LEN_SIZE] = buf
        .get(..LEN_SIZE)
        .and_then(|b| b.try_into().ok())
        .ok_or(FrameError::Truncated)?;
    let len = u32::from_le_bytes(len_bytes) as usize;
    if len == 0 {
        return Err(FrameError::Corrupt(CoreError::log_corruption(
            "zero-length record",
        )));
    }

    let total = LEN_SIZE + len + CRC_SIZE;
    if buf.len() < total {
        return Err(FrameError::Truncated);
    }

    let checked = &buf[LEN_SIZE..LEN_SIZE + len];
    let crc_bytes: [u8; CRC_SIZE] = buf[LEN_SIZE + len..total]
        .try_into()
        .map_err(|_| FrameError::Truncated)?;
    let stored_crc = u32::from_le_bytes(crc_bytes);
    let computed_crc = compute_crc32(checked);
    if stored_crc != computed_crc {
        return Err(FrameError::Corrupt(CoreError::ChecksumMismatch {
            expected: stored_crc,
            actual: computed_crc,
        }));
    }

    let record_type = RecordType::from_byte(checked[0]).ok_or_else(|| {
        FrameError::Corrupt(CoreError::log_corruption(format!(
            "unknown record type {}",
            checked[0]
        )))
    })?;

    let body = match cipher {
        Some(cipher) => cipher.decrypt(&checked[1..]).map_err(FrameError::Corrupt)?,
        None => checked[1..].to_vec(),
    };

    let record = Record::decode_body(record_type, &body).map_err(FrameError::Corrupt)?;
    Ok((record, total))
}

fn push_len_prefixed(buf: &mut Vec<u8>, data: &[u8]) -> CoreResult<()> {
    let len = u32::try_from(data.len())
        .map_err(|_| CoreError::invalid_argument("field exceeds 4 GiB"))?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(data);
    Ok(())
}

fn read_u64(body: &[u8], cursor: &mut usize) -> CoreResult<u64> {
    let bytes: [u8; 8] = body
        .get(*cursor..*cursor + 8)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| CoreError::log_corruption("unexpected end of record"))?;
    *cursor += 8;
    Ok(u64::from_le_bytes(bytes))
}

fn read_len_prefixed<'a>(body: &'a [u8], cursor: &mut usize) -> CoreResult<&'a [u8]> {
    let len_bytes: [u8; 4] = body
        .get(*cursor..*cursor + 4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| CoreError::log_corruption("unexpected end of record"))?;
    *cursor += 4;
    let len = u32::from_le_bytes(len_bytes) as usize;
    let data = body
        .get(*cursor..*cursor + len)
        .ok_or_else(|| CoreError::log_corruption("field runs past end of record"))?;
    *cursor += len;
    Ok(data)
}

/// Computes CRC32 checksum for data (IEEE polynomial).
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}
