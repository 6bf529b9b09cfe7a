//! MDS/MDF container decoder (Alcohol 120% media descriptor).
//!
//! The `.mds` sidecar is a little-endian binary descriptor; payload sectors
//! live in the companion `.mdf`. Layout handled here (version 1.x):
//!
//! ```text
//! 0x00  signature "MEDIA DESCRIPTOR"
//! 0x10  version (major, minor)
//! 0x12  u16 medium type
//! 0x14  u16 session count
//! 0x50  u32 offset of session blocks
//! ```
//!
//! Each 0x18-byte session block carries a track count and an offset to its
//! 0x50-byte track blocks; each track block carries the mode byte, stored
//! sector size, the track's byte offset into the MDF, and an offset to an
//! 8-byte extra block holding (pregap, length) in sectors. Entries with a
//! point byte of 0xA0 and up describe lead-in areas and are skipped. Pregap
//! sectors are not stored in the MDF; the engine never reads them.

use std::path::Path;

use crate::disc::model::{SectorMode, SectorRead, Session, Track, TrackLocation};
use crate::disc::source::{FileSource, LinearReader};
use crate::error::{DiscError, DiscResult};

const MDS_MAGIC: &[u8; 16] = b"MEDIA DESCRIPTOR";

const SESSION_BLOCK_SIZE: usize = 0x18;
const TRACK_BLOCK_SIZE: usize = 0x50;

/// Track mode bytes used by the descriptor
const TRACKMODE_AUDIO: u8 = 0xA9;
const TRACKMODE_MODE1: u8 = 0xAA;
const TRACKMODE_MODE2: u8 = 0xAB;
const TRACKMODE_MODE2_FORM1: u8 = 0xAC;
const TRACKMODE_MODE2_FORM2: u8 = 0xAD;

/// Decode an MDS descriptor and open the companion MDF.
pub(crate) fn open(path: &Path) -> DiscResult<(Vec<Session>, Box<dyn SectorRead>)> {
    let descriptor = std::fs::read(path)?;
    let sessions = parse_descriptor(&descriptor)?;

    let mdf_path = resolve_mdf_path(path)?;
    let mdf = FileSource::open(&mdf_path)?;

    Ok((sessions, Box::new(LinearReader::new(vec![mdf]))))
}

fn parse_descriptor(data: &[u8]) -> DiscResult<Vec<Session>> {
    if data.len() < 0x58 || &data[..16] != MDS_MAGIC {
        return Err(DiscError::Parse(
            "MDS",
            "missing MEDIA DESCRIPTOR signature".to_string(),
        ));
    }

    let version = (data[0x10], data[0x11]);
    if version.0 != 1 {
        return Err(DiscError::Parse(
            "MDS",
            format!("unsupported descriptor version {}.{}", version.0, version.1),
        ));
    }

    let medium_type = u16_at(data, 0x12)?;
    let num_sessions = u16_at(data, 0x14)? as usize;
    let sessions_offset = u32_at(data, 0x50)? as usize;
    log::debug!(
        "mds v{}.{}: medium type {:#06x}, {} session(s)",
        version.0,
        version.1,
        medium_type,
        num_sessions
    );

    let mut sessions = Vec::with_capacity(num_sessions);
    for i in 0..num_sessions {
        let block = sessions_offset + i * SESSION_BLOCK_SIZE;
        let num_all_blocks = *data
            .get(block + 10)
            .ok_or_else(|| truncated("session block"))? as usize;
        let tracks_offset = u32_at(data, block + 20)? as usize;

        let mut tracks = Vec::new();
        for j in 0..num_all_blocks {
            let tb = tracks_offset + j * TRACK_BLOCK_SIZE;
            if let Some(track) = parse_track_block(data, tb, tracks.len() as u32)? {
                tracks.push(track);
            }
        }

        sessions.push(Session {
            index: i as u32,
            tracks,
        });
    }

    Ok(sessions)
}

/// Parse one 0x50-byte track block; `None` for lead-in/non-track entries.
fn parse_track_block(data: &[u8], at: usize, index: u32) -> DiscResult<Option<Track>> {
    if data.len() < at + TRACK_BLOCK_SIZE {
        return Err(truncated("track block"));
    }

    let point = data[at + 4];
    if point == 0 || point >= 0xA0 {
        return Ok(None);
    }

    let mode_byte = data[at];
    let extra_offset = u32_at(data, at + 0x0C)? as usize;
    let sector_size = u16_at(data, at + 0x10)?;
    let start_sector = u32_at(data, at + 0x24)?;
    let start_offset = u64_at(data, at + 0x28)?;

    if sector_size == 0 {
        return Err(DiscError::Parse(
            "MDS",
            format!("track {} declares a zero sector size", index),
        ));
    }

    // extra block: pregap and user-data length, both in sectors
    let (pregap, user_sectors) = if extra_offset != 0 {
        (u32_at(data, extra_offset)?, u32_at(data, extra_offset + 4)?)
    } else {
        (0, 0)
    };
    if user_sectors == 0 {
        return Err(DiscError::Parse(
            "MDS",
            format!("track {} has an empty sector range", index),
        ));
    }

    let mode = match mode_byte {
        TRACKMODE_AUDIO => SectorMode::Audio,
        TRACKMODE_MODE1 => SectorMode::Mode1,
        TRACKMODE_MODE2 => SectorMode::Mode2,
        TRACKMODE_MODE2_FORM1 => SectorMode::Mode2Form1,
        TRACKMODE_MODE2_FORM2 => SectorMode::Mode2Form2,
        // kept raw so open succeeds and extraction can report the value
        other => SectorMode::Unknown(other),
    };

    log::debug!(
        "track {}: point {}, mode byte {:#04x}, start sector {}, {} user sectors, pregap {}",
        index,
        point,
        mode_byte,
        start_sector,
        user_sectors,
        pregap
    );

    Ok(Some(Track {
        index,
        mode,
        raw_sector_size: u32::from(sector_size),
        start: pregap,
        length: pregap + user_sectors,
        location: TrackLocation {
            file: 0,
            byte_offset: start_offset,
        },
    }))
}

/// The companion data file is the descriptor's stem with `.mdf`.
fn resolve_mdf_path(mds_path: &Path) -> DiscResult<std::path::PathBuf> {
    for ext in &["mdf", "MDF"] {
        let candidate = mds_path.with_extension(ext);
        if candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(DiscError::FileNotFound(mds_path.with_extension("mdf")))
}

fn truncated(what: &str) -> DiscError {
    DiscError::Parse("MDS", format!("descriptor truncated in {}", what))
}

fn u16_at(data: &[u8], at: usize) -> DiscResult<u16> {
    data.get(at..at + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or_else(|| truncated("header field"))
}

fn u32_at(data: &[u8], at: usize) -> DiscResult<u32> {
    data.get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| truncated("header field"))
}

fn u64_at(data: &[u8], at: usize) -> DiscResult<u64> {
    data.get(at..at + 8)
        .map(|b| u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
        .ok_or_else(|| truncated("header field"))
}
