//! CUE/BIN container decoder.
//!
//! Parses a cue sheet into the disc model and reads track sectors from the
//! referenced binary image(s). Cue sheets describe a single session; track
//! extents are derived from `INDEX` positions and the data file length, with
//! `INDEX 00` marking stored pregap (the track's layout start) and `INDEX 01`
//! the first user-data sector. All tracks sharing one data file must use the
//! same stored sector size; mixed-size files are rejected as malformed.

use std::path::{Path, PathBuf};

use cue_sheet::parser::{parse_cue, Command, TrackType};

use crate::disc::model::{SectorMode, SectorRead, Session, Track, TrackLocation};
use crate::disc::source::{ByteSource, FileSource, LinearReader};
use crate::error::{DiscError, DiscResult};

/// Frames (sectors) per second in cue `MM:SS:FF` positions
const FRAMES_PER_SECOND: u32 = 75;

/// One `TRACK` entry while the sheet is being walked
struct ParsedTrack {
    file: usize,
    mode: SectorMode,
    sector_size: u32,
    /// `INDEX 00` frame, when the pregap is stored in the data file
    index00: Option<u32>,
    /// `INDEX 01` frame: first user-data sector
    index01: Option<u32>,
}

/// Decode a cue sheet and open its data files.
pub(crate) fn open(path: &Path) -> DiscResult<(Vec<Session>, Box<dyn SectorRead>)> {
    let bytes = std::fs::read(path)?;
    // cue sheets in the wild are frequently Latin-1
    let content = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            log::debug!("cue sheet is not UTF-8, converting lossily");
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    };

    let commands = parse_cue(&normalize_cue_keywords(&content))
        .map_err(|e| DiscError::Parse("CUE", format!("{:?}", e)))?;

    let mut file_names: Vec<String> = Vec::new();
    let mut tracks: Vec<ParsedTrack> = Vec::new();

    for cmd in &commands {
        match cmd {
            Command::File(filename, _format) => {
                file_names.push(filename.clone());
            }
            Command::Track(_number, track_type) => {
                if file_names.is_empty() {
                    return Err(DiscError::Parse(
                        "CUE",
                        "TRACK before any FILE entry".to_string(),
                    ));
                }
                let (mode, sector_size) = track_params(track_type);
                tracks.push(ParsedTrack {
                    file: file_names.len() - 1,
                    mode,
                    sector_size,
                    index00: None,
                    index01: None,
                });
            }
            Command::Index(number, time) => {
                let track = tracks.last_mut().ok_or_else(|| {
                    DiscError::Parse("CUE", "INDEX before any TRACK entry".to_string())
                })?;
                let frames = parse_msf(&time.to_string()).ok_or_else(|| {
                    DiscError::Parse("CUE", format!("bad INDEX time '{}'", time))
                })?;
                if *number == 0 {
                    track.index00 = Some(frames);
                } else if *number == 1 {
                    track.index01 = Some(frames);
                }
            }
            _ => {}
        }
    }

    if file_names.is_empty() {
        return Err(DiscError::Parse("CUE", "no FILE entry".to_string()));
    }
    if tracks.is_empty() {
        return Err(DiscError::NoTracks);
    }

    let cue_dir = path.parent().unwrap_or(Path::new("."));
    let mut files = Vec::with_capacity(file_names.len());
    let mut file_lengths = Vec::with_capacity(file_names.len());
    for name in &file_names {
        let resolved = resolve_data_path(cue_dir, name, path)?;
        let mut source = FileSource::open(&resolved)?;
        file_lengths.push(source.len()?);
        files.push(source);
    }

    let model = build_tracks(&tracks, &file_lengths)?;
    log::debug!("cue sheet: {} file(s), {} track(s)", files.len(), model.len());

    Ok((
        vec![Session {
            index: 0,
            tracks: model,
        }],
        Box::new(LinearReader::new(files)),
    ))
}

/// Turn parsed entries into model tracks, deriving extents from neighbor
/// tracks within the same data file (the last track runs to end of file).
fn build_tracks(tracks: &[ParsedTrack], file_lengths: &[u64]) -> DiscResult<Vec<Track>> {
    let mut model = Vec::with_capacity(tracks.len());

    for (i, t) in tracks.iter().enumerate() {
        let index01 = t
            .index01
            .ok_or_else(|| DiscError::Parse("CUE", format!("track {} has no INDEX 01", i)))?;
        let layout_start = t.index00.unwrap_or(index01);
        if index01 < layout_start {
            return Err(DiscError::Parse(
                "CUE",
                format!("track {}: INDEX 01 precedes INDEX 00", i),
            ));
        }

        let next_in_file = tracks[i + 1..]
            .iter()
            .find(|n| n.file == t.file)
            .map(|n| {
                if n.sector_size != t.sector_size {
                    return Err(DiscError::Parse(
                        "CUE",
                        format!("file {} mixes stored sector sizes", t.file),
                    ));
                }
                n.index01
                    .map(|i01| n.index00.unwrap_or(i01))
                    .ok_or_else(|| DiscError::Parse("CUE", "track has no INDEX 01".to_string()))
            })
            .transpose()?;

        let file_frames = (file_lengths[t.file] / u64::from(t.sector_size)) as u32;
        let extent_end = next_in_file.unwrap_or(file_frames);
        if extent_end <= index01 {
            return Err(DiscError::Parse(
                "CUE",
                format!("track {} has an empty sector range", i),
            ));
        }

        model.push(Track {
            index: i as u32,
            mode: t.mode,
            raw_sector_size: t.sector_size,
            // sector indices are layout-relative: 0 = INDEX 00 position
            start: index01 - layout_start,
            length: extent_end - layout_start,
            location: TrackLocation {
                file: t.file,
                byte_offset: u64::from(index01) * u64::from(t.sector_size),
            },
        });
    }

    Ok(model)
}

/// Map a cue `TRACK` type to a sector mode and stored sector size.
///
/// `MODE2/2352` and `MODE2/2336` are CD-ROM XA as written by every mainstream
/// ripper, so they carry Form 1 payload; `CDG` and `CDI` have no ISO payload.
fn track_params(track_type: &TrackType) -> (SectorMode, u32) {
    match track_type {
        TrackType::Audio => (SectorMode::Audio, 2352),
        TrackType::Cdg => (SectorMode::Raw, 2448),
        TrackType::Mode(mode, size) => {
            let size = *size as u32;
            if *mode == 0 {
                (SectorMode::Mode0, size)
            } else if *mode == 1 {
                (SectorMode::Mode1, size)
            } else if *mode == 2 {
                (SectorMode::Mode2Form1, size)
            } else {
                (SectorMode::Unknown(*mode as u8), size)
            }
        }
        TrackType::Cdi(size) => (SectorMode::Mode2Mixed, *size as u32),
    }
}

/// Parse a cue `MM:SS:FF` position into a frame count.
fn parse_msf(msf: &str) -> Option<u32> {
    let mut parts = msf.split(':');
    let minutes: u32 = parts.next()?.trim().parse().ok()?;
    let seconds: u32 = parts.next()?.trim().parse().ok()?;
    let frames: u32 = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() || seconds >= 60 || frames >= FRAMES_PER_SECOND {
        return None;
    }
    Some((minutes * 60 + seconds) * FRAMES_PER_SECOND + frames)
}

/// Normalize cue keywords for parser compatibility: strip quotes from FILE
/// names, drop CATALOG lines, and fix the case of file-format keywords.
fn normalize_cue_keywords(content: &str) -> String {
    let mut result = String::new();

    for line in content.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with("CATALOG") {
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix("FILE ") {
            let rest = rest.trim();
            if rest.starts_with('"') {
                if let Some(end_quote) = rest[1..].find('"') {
                    let filename = &rest[1..1 + end_quote];
                    let format = rest[1 + end_quote + 1..].trim();
                    result.push_str(&format!("FILE {} {}\n", filename, format));
                    continue;
                }
            }
        }

        result.push_str(line);
        result.push('\n');
    }

    result
        .replace("BINARY", "Binary")
        .replace("MOTOROLA", "Motorola")
        .replace(" WAVE", " Wave")
        .replace(" MP3", " Mp3")
        .replace(" AIFF", " Aiff")
}

/// Resolve a referenced data file, trying the name as written, the bare
/// filename, common extension variants, and finally the cue's own stem.
fn resolve_data_path(cue_dir: &Path, name: &str, cue_path: &Path) -> DiscResult<PathBuf> {
    let direct = cue_dir.join(name);
    if direct.exists() {
        return Ok(direct);
    }

    if let Some(filename) = Path::new(name).file_name() {
        let candidate = cue_dir.join(filename);
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    let base = Path::new(name).file_stem().unwrap_or_default();
    for ext in &["bin", "BIN", "img", "IMG"] {
        let candidate = cue_dir.join(format!("{}.{}", base.to_string_lossy(), ext));
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    if let Some(stem) = cue_path.file_stem() {
        for ext in &["bin", "BIN", "img", "IMG"] {
            let candidate = cue_dir.join(format!("{}.{}", stem.to_string_lossy(), ext));
            if candidate.exists() {
                return Ok(candidate);
            }
        }
    }

    Err(DiscError::FileNotFound(direct))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents).unwrap();
        path
    }

    /// Raw Mode 1 sectors where every payload byte is `sector % 251`.
    fn raw_mode1_image(sectors: u32) -> Vec<u8> {
        let mut image = Vec::with_capacity(sectors as usize * 2352);
        for s in 0..sectors {
            let mut sector = vec![0u8; 2352];
            sector[16..2064].fill((s % 251) as u8);
            image.extend_from_slice(&sector);
        }
        image
    }

    #[test]
    fn parses_single_data_track() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "game.bin", &raw_mode1_image(5));
        let cue = write_file(
            dir.path(),
            "game.cue",
            b"FILE \"game.bin\" BINARY\n  TRACK 01 MODE1/2352\n    INDEX 01 00:00:00\n",
        );

        let (sessions, _reader) = open(&cue).unwrap();
        assert_eq!(sessions.len(), 1);
        let track = &sessions[0].tracks()[0];
        assert_eq!(track.mode, SectorMode::Mode1);
        assert_eq!(track.raw_sector_size, 2352);
        assert_eq!(track.start, 0);
        assert_eq!(track.length, 5);
    }

    #[test]
    fn multi_track_sheet_with_stored_pregap() {
        let dir = tempfile::tempdir().unwrap();
        // 450 sectors: 150 audio, 150 stored pregap, 150 data
        write_file(dir.path(), "disc.bin", &raw_mode1_image(450));
        let cue = write_file(
            dir.path(),
            "disc.cue",
            b"FILE \"disc.bin\" BINARY\n\
              \x20 TRACK 01 AUDIO\n\
              \x20   INDEX 01 00:00:00\n\
              \x20 TRACK 02 MODE1/2352\n\
              \x20   INDEX 00 00:02:00\n\
              \x20   INDEX 01 00:04:00\n",
        );

        let (sessions, _reader) = open(&cue).unwrap();
        let tracks = sessions[0].tracks();
        assert_eq!(tracks.len(), 2);

        assert_eq!(tracks[0].mode, SectorMode::Audio);
        assert_eq!(tracks[0].start, 0);
        assert_eq!(tracks[0].length, 150);

        // layout of track 2 spans INDEX 00..end of file: 300 sectors,
        // of which the first 150 are pregap
        assert_eq!(tracks[1].mode, SectorMode::Mode1);
        assert_eq!(tracks[1].start, 150);
        assert_eq!(tracks[1].length, 450 - 150);
        assert_eq!(tracks[1].sector_count(), 150);
        assert_eq!(tracks[1].location.byte_offset, 300 * 2352);
    }

    #[test]
    fn reads_sectors_through_the_linear_reader() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "game.bin", &raw_mode1_image(4));
        let cue = write_file(
            dir.path(),
            "game.cue",
            b"FILE \"game.bin\" BINARY\n  TRACK 01 MODE1/2352\n    INDEX 01 00:00:00\n",
        );

        let (sessions, mut reader) = open(&cue).unwrap();
        let track = sessions[0].track(0).unwrap();
        let mut buf = Vec::new();
        let got = reader.read_sector(track, 2, &mut buf).unwrap();
        assert_eq!(got, 2352);
        assert!(buf[16..2064].iter().all(|&b| b == 2));
    }

    #[test]
    fn missing_data_file() {
        let dir = tempfile::tempdir().unwrap();
        let cue = write_file(
            dir.path(),
            "lost.cue",
            b"FILE \"lost.bin\" BINARY\n  TRACK 01 MODE1/2352\n    INDEX 01 00:00:00\n",
        );
        assert!(matches!(open(&cue), Err(DiscError::FileNotFound(_))));
    }

    #[test]
    fn sheet_without_tracks() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "empty.bin", &[]);
        let cue = write_file(dir.path(), "empty.cue", b"FILE \"empty.bin\" BINARY\n");
        assert!(matches!(open(&cue), Err(DiscError::NoTracks)));
    }

    #[test]
    fn msf_arithmetic() {
        assert_eq!(parse_msf("00:00:00"), Some(0));
        assert_eq!(parse_msf("00:02:00"), Some(150));
        assert_eq!(parse_msf("01:00:00"), Some(4500));
        assert_eq!(parse_msf("74:59:74"), Some(337499));
        assert_eq!(parse_msf("00:00:75"), None);
        assert_eq!(parse_msf("garbage"), None);
    }
}
