//! In-memory model of a decoded disc image.
//!
//! A [`Disc`] owns its sessions, which own their tracks; the structure is
//! built once by a container decoder and is read-only afterwards. Dropping
//! the disc releases the decoder's data-file handles.

use std::path::{Path, PathBuf};

use crate::disc::formats::DiscFormat;
use crate::disc::sector;
use crate::error::{DiscError, DiscResult};

/// Encoding scheme of a track's sector data area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorMode {
    /// Mode 0 (2336 bytes of zeroed data)
    Mode0,
    /// Mode 1: 2048 bytes user data + EDC/ECC
    Mode1,
    /// Plain Mode 2 (2336 bytes, no subheader distinction)
    Mode2,
    /// Mode 2 Form 1: 2048 bytes user data, XA subheader
    Mode2Form1,
    /// Mode 2 Form 2: 2324 bytes user area, reduced error correction
    Mode2Form2,
    /// Mode 2 with mixed Form 1/Form 2 sectors
    Mode2Mixed,
    /// Red Book audio
    Audio,
    /// Raw 2352-byte sectors of undeclared layout
    Raw,
    /// Raw sectors still scrambled
    RawScrambled,
    /// Mode value the engine does not recognize; the raw descriptor byte is
    /// kept so extraction can report it
    Unknown(u8),
}

impl SectorMode {
    /// Short description used in diagnostics ("an audio track", etc.)
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Mode0 => "a Mode 0",
            Self::Mode1 => "a Mode 1",
            Self::Mode2 => "a Mode 2",
            Self::Mode2Form1 => "a Mode 2 Form 1",
            Self::Mode2Form2 => "a Mode 2 Form 2",
            Self::Mode2Mixed => "a mixed Mode 2",
            Self::Audio => "an audio",
            Self::Raw => "a raw",
            Self::RawScrambled => "a scrambled raw",
            Self::Unknown(_) => "an unknown",
        }
    }
}

/// Where a track's payload lives inside the decoder's data files.
///
/// `byte_offset` addresses the first *user-data* sector (`Track::start`), not
/// the layout start: pregap sectors may not be stored in the container at all
/// (MDF) and are never read by the engine.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TrackLocation {
    /// Index into the decoder's data-file table
    pub file: usize,
    /// Byte offset of sector `Track::start` within that file
    pub byte_offset: u64,
}

/// One track within a session.
#[derive(Debug, Clone)]
pub struct Track {
    /// 0-based index within its session
    pub index: u32,
    /// Sector encoding declared by the descriptor
    pub mode: SectorMode,
    /// Bytes stored per sector in the container (2048, 2336, 2352, ...)
    pub raw_sector_size: u32,
    /// First user-data sector; pregap sectors lie in `[0, start)`
    pub start: u32,
    /// Layout length in sectors, pregap included
    pub length: u32,
    pub(crate) location: TrackLocation,
}

impl Track {
    /// Number of user-data sectors, i.e. the usable range `[start, length)`.
    pub fn sector_count(&self) -> u32 {
        self.length - self.start
    }
}

/// A recording session: an ordered run of tracks.
#[derive(Debug, Clone)]
pub struct Session {
    /// 0-based index within the disc
    pub index: u32,
    pub(crate) tracks: Vec<Track>,
}

impl Session {
    /// Tracks in on-disc order.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Track by 0-based index.
    pub fn track(&self, index: u32) -> Option<&Track> {
        self.tracks.get(index as usize)
    }
}

/// Sector-level read access a container decoder provides for its disc.
///
/// `buf` is resized to the track's raw sector size; the returned count must
/// equal it, anything else is surfaced as a size mismatch by the caller.
pub(crate) trait SectorRead {
    fn read_sector(&mut self, track: &Track, sector: u32, buf: &mut Vec<u8>) -> DiscResult<usize>;
}

/// Root handle for one opened disc image.
pub struct Disc {
    pub(crate) format: DiscFormat,
    pub(crate) path: PathBuf,
    pub(crate) sessions: Vec<Session>,
    /// Resolved index of the session selected at open time
    pub(crate) selected: usize,
    pub(crate) reader: Box<dyn SectorRead>,
}

impl Disc {
    /// Container format this image was decoded as.
    pub fn format(&self) -> DiscFormat {
        self.format
    }

    /// Path to the primary descriptor file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All sessions, in on-disc order.
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    /// The session selected at open time.
    pub fn session(&self) -> &Session {
        &self.sessions[self.selected]
    }

    /// Number of tracks in the selected session.
    pub fn track_count(&self) -> u32 {
        self.session().tracks.len() as u32
    }

    /// Total payload bytes a supported track will emit:
    /// `user_data_size(mode) * sector_count`.
    ///
    /// Fails with `Unsupported`/`UnknownMode` instead of computing a bogus
    /// size for tracks the codec cannot decode.
    pub fn track_payload_size(&self, track_index: u32) -> DiscResult<u64> {
        let track = self
            .session()
            .track(track_index)
            .ok_or(DiscError::TrackNotFound(track_index))?;
        let payload = sector::user_data_size(track.mode)?;
        Ok(u64::from(payload) * u64::from(track.sector_count()))
    }

    pub(crate) fn read_sector(
        &mut self,
        track: &Track,
        sector: u32,
        buf: &mut Vec<u8>,
    ) -> DiscResult<usize> {
        if sector < track.start {
            return Err(DiscError::Invariant(format!(
                "sector {} precedes track start {}",
                sector, track.start
            )));
        }
        self.reader.read_sector(track, sector, buf)
    }
}
