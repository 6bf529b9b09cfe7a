//! Disc image decoding.
//!
//! [`open_disc`] sniffs the container format, runs the matching decoder and
//! returns a [`Disc`] positioned on the requested session. Everything after
//! that goes through the model: sessions, tracks and sector reads.

pub mod formats;
pub mod iso9660;
pub mod model;
pub mod sector;

mod cue;
mod isz;
mod mds;
pub(crate) mod source;

use std::path::Path;

pub use formats::DiscFormat;
pub use model::{Disc, SectorMode, Session, Track};

use crate::error::{DiscError, DiscResult};
use crate::password::PassphraseSource;

/// Open a disc image and select a session.
///
/// `session` is a 0-based index; `None` or `-1` selects the last session,
/// which is where multi-session discs keep their current filesystem. The
/// passphrase source is consulted only for containers that are actually
/// encrypted.
pub fn open_disc(
    path: &Path,
    session: Option<i32>,
    passphrase: &mut dyn PassphraseSource,
) -> DiscResult<Disc> {
    let format = formats::sniff(path)?;
    log::info!("{}: {} image", path.display(), format.display_name());

    let (sessions, reader) = match format {
        DiscFormat::CueBin => cue::open(path)?,
        DiscFormat::MdsMdf => mds::open(path)?,
        DiscFormat::Isz => isz::open(path, passphrase)?,
    };

    if sessions.is_empty() {
        return Err(DiscError::NoSessions);
    }
    let selected = match session {
        None | Some(-1) => sessions.len() - 1,
        Some(n) if n >= 0 && (n as usize) < sessions.len() => n as usize,
        Some(n) => return Err(DiscError::SessionNotFound(n)),
    };
    log::debug!("session {} of {} selected", selected, sessions.len());

    if sessions[selected].tracks().is_empty() {
        return Err(DiscError::NoTracks);
    }

    Ok(Disc {
        format,
        path: path.to_path_buf(),
        sessions,
        selected,
        reader,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::CachedPassphrase;
    use std::io::Write;

    /// Two-session MDS/MDF pair: an audio session followed by a Mode 1 data
    /// session of 100 cooked sectors.
    fn two_session_image(dir: &Path) -> std::path::PathBuf {
        use crate::disc::mds::tests::{build_mds, TrackSpec};

        let descriptor = build_mds(&[
            vec![TrackSpec {
                mode_byte: 0xA9,
                sector_size: 2352,
                pregap: 0,
                length: 1000,
                start_offset: 0,
            }],
            vec![TrackSpec {
                mode_byte: 0xAA,
                sector_size: 2048,
                pregap: 0,
                length: 100,
                start_offset: 2352 * 1000,
            }],
        ]);

        let mds_path = dir.join("disc.mds");
        std::fs::File::create(&mds_path)
            .unwrap()
            .write_all(&descriptor)
            .unwrap();

        let mut mdf = vec![0u8; 2352 * 1000 + 2048 * 100];
        for s in 0..100u32 {
            let at = 2352 * 1000 + s as usize * 2048;
            mdf[at..at + 4].copy_from_slice(&s.to_le_bytes());
        }
        std::fs::File::create(dir.join("disc.mdf"))
            .unwrap()
            .write_all(&mdf)
            .unwrap();

        mds_path
    }

    #[test]
    fn default_session_is_the_last() {
        let dir = tempfile::tempdir().unwrap();
        let path = two_session_image(dir.path());
        let mut creds = CachedPassphrase::empty();

        let disc = open_disc(&path, None, &mut creds).unwrap();
        assert_eq!(disc.format(), DiscFormat::MdsMdf);
        assert_eq!(disc.sessions().len(), 2);
        assert_eq!(disc.session().index, 1);
        assert_eq!(disc.session().tracks()[0].mode, SectorMode::Mode1);
        assert_eq!(disc.track_payload_size(0).unwrap(), 204800);
    }

    #[test]
    fn minus_one_also_selects_the_last_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = two_session_image(dir.path());
        let mut creds = CachedPassphrase::empty();

        let disc = open_disc(&path, Some(-1), &mut creds).unwrap();
        assert_eq!(disc.session().index, 1);
    }

    #[test]
    fn explicit_session_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = two_session_image(dir.path());
        let mut creds = CachedPassphrase::empty();

        let disc = open_disc(&path, Some(0), &mut creds).unwrap();
        assert_eq!(disc.session().index, 0);
        assert_eq!(disc.session().tracks()[0].mode, SectorMode::Audio);
    }

    #[test]
    fn out_of_range_session_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = two_session_image(dir.path());
        let mut creds = CachedPassphrase::empty();

        assert!(matches!(
            open_disc(&path, Some(5), &mut creds),
            Err(DiscError::SessionNotFound(5))
        ));
        assert!(matches!(
            open_disc(&path, Some(-2), &mut creds),
            Err(DiscError::SessionNotFound(-2))
        ));
    }

    #[test]
    fn extraction_over_a_real_mdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = two_session_image(dir.path());
        let mut creds = CachedPassphrase::empty();

        let mut disc = open_disc(&path, None, &mut creds).unwrap();
        let mut sink = crate::sink::WriterSink::new(Vec::new());
        crate::extract::extract_track(&mut disc, 0, &mut sink, None).unwrap();

        let out = sink.finish().unwrap();
        assert_eq!(out.len(), 204800);
        for s in [0u32, 42, 99] {
            let at = s as usize * 2048;
            assert_eq!(u32::from_le_bytes(out[at..at + 4].try_into().unwrap()), s);
        }
    }

    #[test]
    fn missing_file_reported_before_decoding() {
        let mut creds = CachedPassphrase::empty();
        assert!(matches!(
            open_disc(Path::new("/nonexistent/disc.cue"), None, &mut creds),
            Err(DiscError::FileNotFound(_))
        ));
    }
}
