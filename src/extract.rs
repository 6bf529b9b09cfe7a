//! Streaming track extraction.
//!
//! Walks a track's user-data sector range in ascending order, decodes each
//! sector and appends the payload to a caller-supplied sink. The emitted byte
//! stream is the exact concatenation of the per-sector payloads; any fault
//! aborts immediately with no retry and no partial-output cleanup (that
//! decision belongs to the caller).

use crate::disc::model::Disc;
use crate::disc::sector;
use crate::error::{DiscError, DiscResult};
use crate::sink::PayloadSink;

/// Sectors between two progress callbacks
pub const PROGRESS_INTERVAL: u32 = 64;

/// Progress updates delivered during one extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractProgress {
    /// Position within the track; emitted at a bounded cadence and once more
    /// at completion with `sector == last`.
    Sector { track: u32, sector: u32, last: u32 },
    /// Reporting has ended (success or failure); lets the caller finalize or
    /// clear a progress line.
    Finished,
}

/// Callback receiving [`ExtractProgress`] updates.
pub type ProgressFn<'a> = dyn FnMut(ExtractProgress) + 'a;

/// Extract one track's payload into `sink`.
///
/// Unsupported and unknown modes are rejected before the first read, so a
/// caller probing for the first usable track pays nothing for the misses.
/// Progress reporting is optional and has no effect on extraction behavior.
pub fn extract_track(
    disc: &mut Disc,
    track_index: u32,
    sink: &mut dyn PayloadSink,
    mut progress: Option<&mut ProgressFn>,
) -> DiscResult<()> {
    let track = disc
        .session()
        .track(track_index)
        .ok_or(DiscError::TrackNotFound(track_index))?
        .clone();

    // Cheap rejection: the mode is fixed per track, so an unsupported or
    // unknown mode fails here with no bytes read and none written.
    let expected_payload = sector::user_data_size(track.mode)? as usize;
    let raw_size = track.raw_sector_size as usize;
    let last = track.length - 1;

    log::debug!(
        "extracting track {}: sectors {}..={}, {} raw bytes/sector",
        track.index,
        track.start,
        last,
        raw_size
    );

    let mut report = |update: ExtractProgress| {
        if let Some(cb) = progress.as_mut() {
            cb(update);
        }
    };

    let mut buf = Vec::with_capacity(raw_size);
    let result = {
        let mut run = || -> DiscResult<()> {
            for s in track.start..=last {
                if s % PROGRESS_INTERVAL == 0 {
                    report(ExtractProgress::Sector {
                        track: track.index,
                        sector: s,
                        last,
                    });
                }

                let got = disc.read_sector(&track, s, &mut buf)?;
                if got != raw_size {
                    log::error!(
                        "track {}: sector {}: read {} bytes, expected {}",
                        track.index,
                        s,
                        got,
                        raw_size
                    );
                    return Err(DiscError::SizeMismatch {
                        expected: raw_size,
                        got,
                    });
                }

                let payload = match sector::decode(&buf, track.mode) {
                    Ok(p) => p,
                    // the mode was validated before the loop; a per-sector mode
                    // fault past that point means the model lied to us
                    Err(e @ (DiscError::Unsupported(_) | DiscError::UnknownMode(_))) => {
                        return Err(DiscError::Invariant(format!(
                            "track {} mode changed mid-stream: {}",
                            track.index, e
                        )));
                    }
                    Err(e) => {
                        log::error!("track {}: sector {}: {}", track.index, s, e);
                        return Err(e);
                    }
                };

                if payload.len() != expected_payload {
                    return Err(DiscError::Invariant(format!(
                        "decoded {} bytes for sector {}, codec promised {}",
                        payload.len(),
                        s,
                        expected_payload
                    )));
                }

                sink.put(payload).map_err(|e| {
                    log::error!("track {}: write failed on sector {}", track.index, s);
                    DiscError::Io(e)
                })?;
            }
            Ok(())
        };
        run()
    };
    if result.is_ok() {
        report(ExtractProgress::Sector {
            track: track.index,
            sector: last,
            last,
        });
    }
    report(ExtractProgress::Finished);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disc::formats::DiscFormat;
    use crate::disc::model::{SectorMode, Session, Track, TrackLocation};
    use crate::sink::WriterSink;
    use std::path::PathBuf;
    use std::rc::Rc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Reader yielding raw Mode 1 sectors whose payload encodes the sector
    /// index, and counting how many reads were issued.
    struct PatternReader {
        reads: Arc<AtomicU32>,
    }

    impl crate::disc::model::SectorRead for PatternReader {
        fn read_sector(
            &mut self,
            track: &Track,
            sector: u32,
            buf: &mut Vec<u8>,
        ) -> DiscResult<usize> {
            self.reads.fetch_add(1, Ordering::Relaxed);
            let size = track.raw_sector_size as usize;
            buf.clear();
            buf.resize(size, 0);
            // payload starts at byte 16 of a raw Mode 1 sector
            buf[16..20].copy_from_slice(&sector.to_le_bytes());
            Ok(size)
        }
    }

    fn disc_with(track: Track, reads: &Arc<AtomicU32>) -> Disc {
        Disc {
            format: DiscFormat::CueBin,
            path: PathBuf::from("test.cue"),
            sessions: vec![Session {
                index: 0,
                tracks: vec![track],
            }],
            selected: 0,
            reader: Box::new(PatternReader {
                reads: Arc::clone(reads),
            }),
        }
    }

    fn mode1_track(start: u32, length: u32) -> Track {
        Track {
            index: 0,
            mode: SectorMode::Mode1,
            raw_sector_size: 2352,
            start,
            length,
            location: TrackLocation {
                file: 0,
                byte_offset: 0,
            },
        }
    }

    #[test]
    fn emits_sectors_in_ascending_order_with_exact_length() {
        let reads = Arc::new(AtomicU32::new(0));
        let mut disc = disc_with(mode1_track(0, 100), &reads);
        let mut sink = WriterSink::new(Vec::new());

        extract_track(&mut disc, 0, &mut sink, None).unwrap();

        let out = sink.finish().unwrap();
        assert_eq!(out.len() as u64, disc.track_payload_size(0).unwrap());
        assert_eq!(out.len(), 204800);
        for s in 0..100u32 {
            let at = s as usize * 2048;
            let tag = u32::from_le_bytes(out[at..at + 4].try_into().unwrap());
            assert_eq!(tag, s);
        }
        assert_eq!(reads.load(Ordering::Relaxed), 100);
    }

    #[test]
    fn starts_at_first_user_data_sector() {
        let reads = Arc::new(AtomicU32::new(0));
        let mut disc = disc_with(mode1_track(150, 160), &reads);
        let mut sink = WriterSink::new(Vec::new());

        extract_track(&mut disc, 0, &mut sink, None).unwrap();

        let out = sink.finish().unwrap();
        assert_eq!(out.len(), 10 * 2048);
        let tag = u32::from_le_bytes(out[..4].try_into().unwrap());
        assert_eq!(tag, 150);
    }

    #[test]
    fn audio_track_is_rejected_before_any_read() {
        let reads = Arc::new(AtomicU32::new(0));
        let mut track = mode1_track(0, 100);
        track.mode = SectorMode::Audio;
        let mut disc = disc_with(track, &reads);
        let mut sink = WriterSink::new(Vec::new());

        let err = extract_track(&mut disc, 0, &mut sink, None).unwrap_err();
        assert!(matches!(err, DiscError::Unsupported(SectorMode::Audio)));
        assert_eq!(reads.load(Ordering::Relaxed), 0);
        assert!(sink.finish().unwrap().is_empty());
    }

    #[test]
    fn unknown_mode_is_surfaced_from_extraction() {
        let reads = Arc::new(AtomicU32::new(0));
        let mut track = mode1_track(0, 100);
        track.mode = SectorMode::Unknown(99);
        let mut disc = disc_with(track, &reads);
        let mut sink = WriterSink::new(Vec::new());

        let err = extract_track(&mut disc, 0, &mut sink, None).unwrap_err();
        assert!(matches!(err, DiscError::UnknownMode(99)));
        assert_eq!(reads.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn sink_failure_aborts_without_reading_further() {
        struct FailingSink {
            accepted: usize,
        }
        impl PayloadSink for FailingSink {
            fn put(&mut self, _payload: &[u8]) -> std::io::Result<()> {
                if self.accepted == 50 {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        "disk full",
                    ));
                }
                self.accepted += 1;
                Ok(())
            }
        }

        let reads = Arc::new(AtomicU32::new(0));
        let mut disc = disc_with(mode1_track(0, 100), &reads);
        let mut sink = FailingSink { accepted: 0 };

        let err = extract_track(&mut disc, 0, &mut sink, None).unwrap_err();
        assert!(matches!(err, DiscError::Io(_)));
        // sectors 0..=50 were read, 51..=99 never touched
        assert_eq!(reads.load(Ordering::Relaxed), 51);
    }

    #[test]
    fn progress_has_bounded_cadence_and_sentinel() {
        let reads = Arc::new(AtomicU32::new(0));
        let mut disc = disc_with(mode1_track(0, 200), &reads);
        let mut sink = WriterSink::new(Vec::new());

        let updates = Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink_updates = Rc::clone(&updates);
        let mut cb = move |p: ExtractProgress| sink_updates.borrow_mut().push(p);

        extract_track(&mut disc, 0, &mut sink, Some(&mut cb)).unwrap();

        let updates = updates.borrow();
        // 0, 64, 128, 192, final 199, sentinel
        assert_eq!(
            updates.as_slice(),
            &[
                ExtractProgress::Sector {
                    track: 0,
                    sector: 0,
                    last: 199
                },
                ExtractProgress::Sector {
                    track: 0,
                    sector: 64,
                    last: 199
                },
                ExtractProgress::Sector {
                    track: 0,
                    sector: 128,
                    last: 199
                },
                ExtractProgress::Sector {
                    track: 0,
                    sector: 192,
                    last: 199
                },
                ExtractProgress::Sector {
                    track: 0,
                    sector: 199,
                    last: 199
                },
                ExtractProgress::Finished,
            ]
        );
    }

    #[test]
    fn short_read_is_size_mismatch() {
        struct ShortReader;
        impl crate::disc::model::SectorRead for ShortReader {
            fn read_sector(
                &mut self,
                _track: &Track,
                _sector: u32,
                buf: &mut Vec<u8>,
            ) -> DiscResult<usize> {
                buf.clear();
                buf.resize(100, 0);
                Ok(100)
            }
        }

        let mut disc = Disc {
            format: DiscFormat::CueBin,
            path: PathBuf::from("test.cue"),
            sessions: vec![Session {
                index: 0,
                tracks: vec![mode1_track(0, 10)],
            }],
            selected: 0,
            reader: Box::new(ShortReader),
        };
        let mut sink = WriterSink::new(Vec::new());

        let err = extract_track(&mut disc, 0, &mut sink, None).unwrap_err();
        assert!(matches!(
            err,
            DiscError::SizeMismatch {
                expected: 2352,
                got: 100
            }
        ));
    }
}
