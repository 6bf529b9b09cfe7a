//! Sector codec: maps a raw on-disc sector to its user-data payload.
//!
//! Pure functions over the sector bytes and the track's declared mode. The
//! framing layout is derived from the stored sector size: containers may keep
//! sectors cooked (2048 bytes, payload only) or raw (2352 bytes with sync,
//! header and error-correction fields around the payload).

use crate::disc::model::SectorMode;
use crate::error::{DiscError, DiscResult};

/// User-data payload per sector for every mode this engine extracts
pub const USER_DATA_SIZE: u32 = 2048;

/// Raw CD sector size (sync + header + payload + EDC/ECC)
pub const RAW_SECTOR_SIZE: u32 = 2352;

/// Sync (12) + header (4) bytes preceding the payload in a raw Mode 1 sector
const MODE1_DATA_OFFSET: usize = 16;

/// Sync + header + XA subheader (8) preceding the payload in raw Mode 2 Form 1
const MODE2_FORM1_DATA_OFFSET: usize = 24;

/// Payload bytes per sector for `mode`, or why the mode cannot be extracted.
///
/// `Unsupported` is the expected answer for recognized non-data modes and
/// callers treat it as "skip this track". `UnknownMode` means the descriptor
/// declared a value outside the known set and is always worth surfacing.
pub fn user_data_size(mode: SectorMode) -> DiscResult<u32> {
    match mode {
        SectorMode::Mode1 | SectorMode::Mode2Form1 => Ok(USER_DATA_SIZE),
        SectorMode::Mode0
        | SectorMode::Mode2
        | SectorMode::Mode2Form2
        | SectorMode::Mode2Mixed
        | SectorMode::Audio
        | SectorMode::Raw
        | SectorMode::RawScrambled => Err(DiscError::Unsupported(mode)),
        SectorMode::Unknown(raw) => Err(DiscError::UnknownMode(raw)),
    }
}

/// Slice the user-data payload out of one raw sector.
///
/// The stored layout is inferred from `raw.len()`; a length that matches no
/// known layout for the mode is a `SizeMismatch` (container corruption or a
/// descriptor lying about its sector size, never tolerated).
pub fn decode(raw: &[u8], mode: SectorMode) -> DiscResult<&[u8]> {
    let payload = USER_DATA_SIZE as usize;
    match mode {
        SectorMode::Mode1 => match raw.len() {
            2048 => Ok(raw),
            // 2448 = raw sector with 96 subchannel bytes appended
            2352 | 2448 => Ok(&raw[MODE1_DATA_OFFSET..MODE1_DATA_OFFSET + payload]),
            got => Err(DiscError::SizeMismatch {
                expected: 2352,
                got,
            }),
        },
        SectorMode::Mode2Form1 => match raw.len() {
            2048 => Ok(raw),
            // stored without sync/header, subheader kept
            2336 => Ok(&raw[8..8 + payload]),
            2352 | 2448 => Ok(&raw[MODE2_FORM1_DATA_OFFSET..MODE2_FORM1_DATA_OFFSET + payload]),
            got => Err(DiscError::SizeMismatch {
                expected: 2352,
                got,
            }),
        },
        SectorMode::Unknown(raw_mode) => Err(DiscError::UnknownMode(raw_mode)),
        other => Err(DiscError::Unsupported(other)),
    }
}
