//! Decode optical disc images and extract their data track as a plain ISO.
//!
//! Supported containers are CUE/BIN cue sheets, Alcohol 120% MDS/MDF pairs
//! and UltraISO ISZ wrappers (including AES-256 protected ones). The engine
//! decodes the container's track layout, picks a session, and streams the
//! 2048-byte user-data payload of a data track into any [`sink::PayloadSink`].
//!
//! ```no_run
//! use disc2iso::{extract_track, open_disc, CachedPassphrase, WriterSink};
//!
//! let mut creds = CachedPassphrase::empty();
//! let mut disc = open_disc("game.cue".as_ref(), None, &mut creds)?;
//! let mut sink = WriterSink::new(std::fs::File::create("game.iso")?);
//! extract_track(&mut disc, 0, &mut sink, None)?;
//! sink.finish()?.sync_all()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod disc;
pub mod error;
pub mod extract;
pub mod password;
pub mod sink;

pub use disc::{open_disc, Disc, DiscFormat, SectorMode, Session, Track};
pub use error::{DiscError, DiscResult};
pub use extract::{extract_track, ExtractProgress, ProgressFn};
pub use password::{CachedPassphrase, PassphraseSource};
pub use sink::{PayloadSink, SliceSink, WriterSink};

/// Crate version, for CLI `--version` output.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
