//! Error taxonomy shared by the decoders and the extraction pipeline.
//!
//! Every fault that crosses the public API is one of these variants; decoder
//! internals convert parsing anomalies into them at the module boundary so no
//! raw platform error codes leak out.

use std::path::PathBuf;
use thiserror::Error;

use crate::disc::model::SectorMode;

/// Result type used throughout the engine
pub type DiscResult<T> = Result<T, DiscError>;

/// Errors that can occur when opening or extracting a disc image
#[derive(Error, Debug)]
pub enum DiscError {
    /// Input descriptor file does not exist
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    /// Neither magic bytes nor file extension matched a known container format
    #[error("unrecognized image format: {0}")]
    UnknownFormat(PathBuf),

    /// Descriptor file is malformed for its format; fatal to open
    #[error("{0} parse error: {1}")]
    Parse(&'static str, String),

    /// Image contains no sessions
    #[error("input file doesn't contain any session")]
    NoSessions,

    /// Requested session index does not resolve
    #[error("session {0} not found")]
    SessionNotFound(i32),

    /// Selected session contains no tracks
    #[error("input session doesn't contain any track")]
    NoTracks,

    /// Track index outside the selected session
    #[error("track {0} not found")]
    TrackNotFound(u32),

    /// Every track in the session was skipped as unsupported
    #[error("no supported track found")]
    NoSupportedTrack,

    /// Descriptor declared a sector mode this engine does not know about.
    /// Always surfaced, even at quiet verbosity: it usually means the image
    /// was produced by a newer mastering tool.
    #[error("unknown sector mode ({0})")]
    UnknownMode(u8),

    /// Track uses a recognized mode with no ISO payload to extract.
    /// Expected and recoverable: callers skip the track and try the next one.
    #[error("{} track (unsupported)", .0.describe())]
    Unsupported(SectorMode),

    /// Read or decoded size disagrees with the size the mode mandates.
    /// Treated as container corruption; fatal to the current extraction.
    #[error("data read returned {got} bytes while {expected} was expected")]
    SizeMismatch { expected: usize, got: usize },

    /// Encrypted image and no passphrase could be obtained
    #[error("passphrase required to open the encrypted image")]
    AuthRequired,

    /// Passphrase was rejected by the encrypted image
    #[error("passphrase rejected by the encrypted image")]
    AuthFailed,

    /// Internal invariant violated; indicates a decoder bug or corruption
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// Underlying storage or sink failure, original cause preserved
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DiscError {
    /// True for the one fault class callers are expected to recover from by
    /// moving on to the next track.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }
}
