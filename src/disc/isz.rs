//! ISZ container decoder (UltraISO zipped image).
//!
//! An ISZ file is a fixed header followed by the image data split into
//! fixed-size chunks. The header (all little-endian):
//!
//! ```text
//! 0x00  magic "IsZ!"
//! 0x04  u8  header size
//! 0x05  u8  format version
//! 0x06  u32 volume serial number
//! 0x0A  u16 sector size
//! 0x0C  u32 total sectors
//! 0x10  u8  encryption type
//! 0x11  i64 segment size
//! 0x19  u32 chunk count
//! 0x1D  u32 chunk size (plaintext bytes)
//! 0x21  u8  chunk pointer width
//! 0x22  i8  segment number
//! 0x23  u32 chunk pointer table offset
//! 0x27  u32 segment table offset
//! 0x2B  u32 data offset
//! ```
//!
//! Supported subset: stored (uncompressed) chunks in a single segment,
//! either plain or AES-256 encrypted. Encrypted images keep each chunk as
//! ciphertext plus a 16-byte authentication tag; the per-chunk nonce is the
//! chunk index as 8 little-endian bytes padded with 4 zero bytes, and the
//! key is the SHA-256 digest of the passphrase. The first chunk's tag is
//! verified at open time so a wrong passphrase fails before any extraction
//! starts. Compressed or multi-segment images are rejected at open.

use std::path::Path;

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use sha2::{Digest, Sha256};

use crate::disc::model::{SectorMode, SectorRead, Session, Track, TrackLocation};
use crate::disc::source::{ByteSource, FileSource};
use crate::error::{DiscError, DiscResult};
use crate::password::PassphraseSource;

const ISZ_MAGIC: &[u8; 4] = b"IsZ!";
const HEADER_LEN: usize = 0x2F;

/// Appended GCM authentication tag per encrypted chunk
const TAG_LEN: u64 = 16;

const ENCRYPTION_NONE: u8 = 0;
const ENCRYPTION_AES256: u8 = 4;

/// Top two bits of a chunk pointer select the storage method.
const CHUNK_STORED: u8 = 1;

struct IszHeader {
    sect_size: u16,
    total_sectors: u32,
    encryption_type: u8,
    nblocks: u32,
    block_size: u32,
    ptr_len: u8,
    seg_no: i8,
    seg_offs: u32,
    ptr_offs: u32,
    data_offs: u32,
}

/// Decode an ISZ image, prompting for a passphrase if the header says the
/// data is encrypted.
pub(crate) fn open(
    path: &Path,
    passphrase: &mut dyn PassphraseSource,
) -> DiscResult<(Vec<Session>, Box<dyn SectorRead>)> {
    let mut file = FileSource::open(path)?;

    let mut raw_header = [0u8; HEADER_LEN];
    if file.read_at(0, &mut raw_header)? != HEADER_LEN {
        return Err(bad("file shorter than the header"));
    }
    let header = parse_header(&raw_header)?;
    check_supported_layout(&mut file, &header)?;

    let mode = match header.sect_size {
        2048 | 2352 => SectorMode::Mode1,
        2336 => SectorMode::Mode2Form1,
        other => return Err(bad(&format!("unhandled sector size {}", other))),
    };

    let cipher = match header.encryption_type {
        ENCRYPTION_NONE => None,
        ENCRYPTION_AES256 => {
            let key = Sha256::digest(passphrase.passphrase()?);
            let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
            Some(cipher)
        }
        other => return Err(bad(&format!("unhandled encryption type {}", other))),
    };

    let mut reader = IszReader {
        file,
        cipher,
        sect_size: u32::from(header.sect_size),
        total_sectors: header.total_sectors,
        nblocks: header.nblocks,
        block_size: header.block_size,
        data_offs: u64::from(header.data_offs),
        cached: None,
    };

    // Authenticate the passphrase up front rather than on the first read.
    if reader.cipher.is_some() {
        reader
            .chunk(0)
            .map_err(|e| match e {
                DiscError::Parse(..) => DiscError::AuthFailed,
                other => other,
            })
            .map(|_| ())?;
        log::debug!("isz: passphrase accepted");
    }

    let track = Track {
        index: 0,
        mode,
        raw_sector_size: u32::from(header.sect_size),
        start: 0,
        length: header.total_sectors,
        location: TrackLocation {
            file: 0,
            byte_offset: 0,
        },
    };
    let sessions = vec![Session {
        index: 0,
        tracks: vec![track],
    }];

    Ok((sessions, Box::new(reader)))
}

fn parse_header(data: &[u8; HEADER_LEN]) -> DiscResult<IszHeader> {
    if &data[..4] != ISZ_MAGIC {
        return Err(bad("missing IsZ! signature"));
    }
    let u16_at = |at: usize| u16::from_le_bytes([data[at], data[at + 1]]);
    let u32_at = |at: usize| u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]);

    let header = IszHeader {
        sect_size: u16_at(0x0A),
        total_sectors: u32_at(0x0C),
        encryption_type: data[0x10],
        nblocks: u32_at(0x19),
        block_size: u32_at(0x1D),
        ptr_len: data[0x21],
        seg_no: data[0x22] as i8,
        ptr_offs: u32_at(0x23),
        seg_offs: u32_at(0x27),
        data_offs: u32_at(0x2B),
    };

    if header.total_sectors == 0 {
        return Err(bad("image declares zero sectors"));
    }
    if header.block_size == 0 || header.nblocks == 0 {
        return Err(bad("image declares zero chunks"));
    }
    log::debug!(
        "isz: {} sectors of {} bytes, {} chunk(s) of {}, encryption {}",
        header.total_sectors,
        header.sect_size,
        header.nblocks,
        header.block_size,
        header.encryption_type
    );
    Ok(header)
}

/// Reject the layouts outside the stored single-segment subset.
fn check_supported_layout(file: &mut FileSource, header: &IszHeader) -> DiscResult<()> {
    if header.seg_no != 0 || header.seg_offs != 0 {
        return Err(bad("multi-segment images are not supported"));
    }
    if header.ptr_offs != 0 && header.ptr_len > 0 {
        // A pointer table is present; every chunk must use the stored method.
        let width = header.ptr_len as usize;
        let mut table = vec![0u8; width * header.nblocks as usize];
        if file.read_at(u64::from(header.ptr_offs), &mut table)? != table.len() {
            return Err(bad("chunk pointer table truncated"));
        }
        for (i, ptr) in table.chunks_exact(width).enumerate() {
            // pointers are little-endian, method bits live at the top
            let method = ptr[width - 1] >> 6;
            if method != CHUNK_STORED {
                return Err(bad(&format!(
                    "chunk {} uses storage method {} (compressed images are not supported)",
                    i, method
                )));
            }
        }
    }
    Ok(())
}

fn bad(detail: &str) -> DiscError {
    DiscError::Parse("ISZ", detail.to_string())
}

/// Sector reader over the chunked data area.
struct IszReader {
    file: FileSource,
    cipher: Option<Aes256Gcm>,
    sect_size: u32,
    total_sectors: u32,
    nblocks: u32,
    block_size: u32,
    data_offs: u64,
    /// Last decrypted chunk; sequential extraction hits this every time.
    cached: Option<(u32, Vec<u8>)>,
}

impl IszReader {
    fn image_len(&self) -> u64 {
        u64::from(self.total_sectors) * u64::from(self.sect_size)
    }

    /// Plaintext length of chunk `index` (the last chunk may run short).
    fn chunk_len(&self, index: u32) -> u64 {
        let start = u64::from(index) * u64::from(self.block_size);
        (self.image_len() - start).min(u64::from(self.block_size))
    }

    /// Decrypt (or plainly read) chunk `index` into the cache.
    fn chunk(&mut self, index: u32) -> DiscResult<&[u8]> {
        if index >= self.nblocks {
            return Err(DiscError::Invariant(format!(
                "chunk {} requested of {}",
                index, self.nblocks
            )));
        }
        if self.cached.as_ref().map(|(i, _)| *i) != Some(index) {
            let plain_len = self.chunk_len(index);
            let stored = u64::from(index) * (u64::from(self.block_size) + TAG_LEN);
            let mut buf = vec![0u8; (plain_len + TAG_LEN) as usize];
            let got = self.file.read_at(self.data_offs + stored, &mut buf)?;
            if got != buf.len() {
                return Err(DiscError::SizeMismatch {
                    expected: buf.len(),
                    got,
                });
            }

            let cipher = match self.cipher.as_ref() {
                Some(c) => c,
                // plain images are not chunk-aligned on disk; handled in
                // read_sector, never here
                None => {
                    return Err(DiscError::Invariant(
                        "chunk decrypt requested for a plain image".to_string(),
                    ))
                }
            };
            let mut nonce = [0u8; 12];
            nonce[..8].copy_from_slice(&u64::from(index).to_le_bytes());
            let plain = cipher
                .decrypt(Nonce::from_slice(&nonce), buf.as_slice())
                .map_err(|_| bad(&format!("chunk {} failed authentication", index)))?;
            self.cached = Some((index, plain));
        }
        Ok(self.cached.as_ref().map(|(_, d)| d.as_slice()).unwrap_or(&[]))
    }
}

impl SectorRead for IszReader {
    fn read_sector(&mut self, track: &Track, sector: u32, buf: &mut Vec<u8>) -> DiscResult<usize> {
        let size = self.sect_size as usize;
        buf.clear();
        buf.resize(size, 0);

        let pos = u64::from(sector - track.start) * self.sect_size as u64;
        if self.cipher.is_none() {
            return Ok(self.file.read_at(self.data_offs + pos, buf)?);
        }

        // Copy out of decrypted chunks; a sector may straddle two of them.
        let mut filled = 0usize;
        while filled < size {
            let at = pos + filled as u64;
            let index = (at / u64::from(self.block_size)) as u32;
            let within = (at % u64::from(self.block_size)) as usize;
            let chunk = self.chunk(index)?;
            if within >= chunk.len() {
                break;
            }
            let take = (size - filled).min(chunk.len() - within);
            buf[filled..filled + take].copy_from_slice(&chunk[within..within + take]);
            filled += take;
        }
        Ok(filled)
    }
}

impl Drop for IszReader {
    fn drop(&mut self) {
        if let Some((_, data)) = self.cached.as_mut() {
            for b in data.iter_mut() {
                *b = 0;
            }
        }
    }
}
