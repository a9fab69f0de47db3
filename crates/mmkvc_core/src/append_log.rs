//! The page-granular append log backing one instance.
//!
//! ```text
//! 0      4        5      6          8              16           24
//! | MMKC | version | flags | reserved | actual size | sequence | records ... | zero fill |
//! ```
//!
//! `actual size` counts record bytes after the header; everything past it up
//! to the page-aligned file end is free space. `sequence` increases on every
//! write so that other processes can detect a stale view.

use crate::crypto::CryptoManager;
use crate::error::{CoreError, CoreResult};
use crate::log::ErrorKind;
use crate::record::{decode_frame, Record};
use mmkvc_storage::{align_up, LockKind, StorageBackend};

const MAGIC: [u8; 4] = *b"MMKC";
const FORMAT_VERSION: u8 = 1;

/// Size of the fixed header at offset 0.
pub(crate) const HEADER_SIZE: u64 = 24;

/// Header flag: record bodies are sealed.
pub(crate) const FLAG_ENCRYPTED: u8 = 0x01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Header {
    flags: u8,
    actual_size: u64,
    sequence: u64,
}

impl Header {
    fn encode(&self) -> [u8; HEADER_SIZE as usize] {
        let mut buf = [0u8; HEADER_SIZE as usize];
        buf[..4].copy_from_slice(&MAGIC);
        buf[4] = FORMAT_VERSION;
        buf[5] = self.flags;
        buf[8..16].copy_from_slice(&self.actual_size.to_le_bytes());
        buf[16..24].copy_from_slice(&self.sequence.to_le_bytes());
        buf
    }

    fn decode(bytes: &[u8]) -> CoreResult<Self> {
        if bytes.len() < HEADER_SIZE as usize || bytes[..4] != MAGIC {
            return Err(CoreError::log_corruption("bad header magic"));
        }
        if bytes[4] != FORMAT_VERSION {
            return Err(CoreError::log_corruption(format!(
                "unsupported format version {}",
                bytes[4]
            )));
        }

        let u64_at = |at: usize| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes[at..at + 8]);
            u64::from_le_bytes(raw)
        };

        Ok(Self {
            flags: bytes[5],
            actual_size: u64_at(8),
            sequence: u64_at(16),
        })
    }
}

/// Result of replaying the log.
#[derive(Debug, Default)]
pub(crate) struct Scan {
    /// Records in log order, up to the first bad one.
    pub records: Vec<Record>,
    /// The first inconsistency and the length of the valid prefix.
    pub failure: Option<(ErrorKind, u64)>,
}

/// Header-framed append log over a storage backend.
pub(crate) struct AppendLog {
    backend: Box<dyn StorageBackend>,
    page_size: u64,
    header: Header,
    damaged: bool,
}

impl AppendLog {
    /// Opens the log, formatting an empty backend.
    ///
    /// A backend with an unreadable header opens in a damaged state that
    /// [`scan`](Self::scan) reports; nothing is overwritten until the caller
    /// decides what to do.
    pub fn open(
        mut backend: Box<dyn StorageBackend>,
        page_size: u64,
        flags: u8,
    ) -> CoreResult<Self> {
        let size = backend.size()?;

        if size == 0 {
            backend.resize(page_size)?;
            let header = Header {
                flags,
                ..Header::default()
            };
            backend.write_at(0, &header.encode())?;
            return Ok(Self {
                backend,
                page_size,
                header,
                damaged: false,
            });
        }

        let decoded = if size >= HEADER_SIZE {
            Header::decode(&backend.read_at(0, HEADER_SIZE as usize)?)
        } else {
            Err(CoreError::log_corruption("file shorter than header"))
        };

        let (header, damaged) = match decoded {
            Ok(header) => (header, false),
            Err(_) => (Header::default(), true),
        };

        Ok(Self {
            backend,
            page_size,
            header,
            damaged,
        })
    }

    /// Replays every record, stopping at the first bad frame.
    pub fn scan(&self, cipher: Option<&CryptoManager>) -> CoreResult<Scan> {
        if self.damaged {
            return Ok(Scan {
                records: Vec::new(),
                failure: Some((ErrorKind::FileLength, 0)),
            });
        }

        let room = self.backend.size()?.saturating_sub(HEADER_SIZE);
        let readable = self.header.actual_size.min(room);
        let bytes = self.backend.read_at(HEADER_SIZE, readable as usize)?;

        let mut scan = Scan::default();
        let mut pos = 0usize;
        while pos < bytes.len() {
            match decode_frame(&bytes[pos..], cipher) {
                Ok((record, used)) => {
                    scan.records.push(record);
                    pos += used;
                }
                Err(err) => {
                    scan.failure = Some((err.kind(), pos as u64));
                    return Ok(scan);
                }
            }
        }

        if self.header.actual_size > room {
            scan.failure = Some((ErrorKind::FileLength, pos as u64));
        }

        Ok(scan)
    }

    /// Returns true when `len` more bytes fit without growing the file.
    pub fn fits(&self, len: usize) -> CoreResult<bool> {
        let needed = HEADER_SIZE + self.header.actual_size + len as u64;
        Ok(needed <= self.backend.size()?)
    }

    /// Appends one frame. The caller checks [`fits`](Self::fits) first.
    pub fn append(&mut self, frame: &[u8]) -> CoreResult<()> {
        self.backend
            .write_at(HEADER_SIZE + self.header.actual_size, frame)?;
        self.header.actual_size += frame.len() as u64;
        self.header.sequence += 1;
        self.write_header()
    }

    /// Replaces all records with `body`, growing the file by doubling.
    pub fn rewrite(&mut self, body: &[u8], flags: u8) -> CoreResult<()> {
        let needed = HEADER_SIZE + body.len() as u64;
        let capacity = self.backend.size()?;
        if needed > capacity {
            let mut grown = capacity.max(self.page_size);
            while grown < needed {
                grown *= 2;
            }
            self.backend.resize(grown)?;
        }

        self.backend.write_at(HEADER_SIZE, body)?;
        self.header.flags = flags;
        self.header.actual_size = body.len() as u64;
        self.header.sequence += 1;
        self.damaged = false;
        self.write_header()
    }

    /// Drops records past `valid_len`.
    pub fn truncate_to(&mut self, valid_len: u64) -> CoreResult<()> {
        self.header.actual_size = valid_len.min(self.header.actual_size);
        self.header.sequence += 1;
        self.write_header()
    }

    /// Empties the log and shrinks the file to one zeroed page.
    pub fn reset(&mut self, flags: u8) -> CoreResult<()> {
        self.backend.resize(0)?;
        self.backend.resize(self.page_size)?;
        self.header = Header {
            flags,
            actual_size: 0,
            sequence: self.header.sequence + 1,
        };
        self.damaged = false;
        self.write_header()
    }

    /// Shrinks the file to the smallest page multiple holding the log.
    pub fn shrink_to_fit(&mut self) -> CoreResult<()> {
        let target = align_up(HEADER_SIZE + self.header.actual_size, self.page_size);
        if target < self.backend.size()? {
            self.backend.resize(target)?;
        }
        Ok(())
    }

    /// Re-reads the header written by another process.
    ///
    /// Returns true when the on-disk log changed since this view was taken.
    pub fn refresh(&mut self) -> CoreResult<bool> {
        let size = self.backend.refresh_size()?;
        if size < HEADER_SIZE {
            let changed = !self.damaged;
            self.damaged = true;
            return Ok(changed);
        }

        let on_disk = match Header::decode(&self.backend.read_at(0, HEADER_SIZE as usize)?) {
            Ok(header) => header,
            Err(_) => {
                let changed = !self.damaged;
                self.damaged = true;
                return Ok(changed);
            }
        };

        let changed = self.damaged || on_disk != self.header;
        self.header = on_disk;
        self.damaged = false;
        Ok(changed)
    }

    pub fn lock(&self, kind: LockKind) -> CoreResult<()> {
        Ok(self.backend.lock(kind)?)
    }

    pub fn unlock(&self) -> CoreResult<()> {
        Ok(self.backend.unlock()?)
    }

    pub fn flush(&mut self) -> CoreResult<()> {
        Ok(self.backend.flush()?)
    }

    pub fn sync(&mut self) -> CoreResult<()> {
        Ok(self.backend.sync()?)
    }

    pub fn flags(&self) -> u8 {
        self.header.flags
    }

    pub fn actual_size(&self) -> u64 {
        self.header.actual_size
    }

    pub fn total_size(&self) -> CoreResult<u64> {
        Ok(self.backend.size()?)
    }

    fn write_header(&mut self) -> CoreResult<()> {
        self.backend.write_at(0, &self.header.encode())?;
        Ok(())
    }
}
