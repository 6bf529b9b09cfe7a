//! Container format identification.
//!
//! Formats are always selected by sniffing (magic bytes first, file extension
//! as a fallback for the text-based cue sheet); callers never name a format
//! explicitly.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{DiscError, DiscResult};

/// MDS descriptor signature
const MDS_MAGIC: &[u8; 16] = b"MEDIA DESCRIPTOR";

/// ISZ descriptor signature
const ISZ_MAGIC: &[u8; 4] = b"IsZ!";

/// Supported disc image container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscFormat {
    /// Cue sheet referencing one or more binary track images
    CueBin,
    /// Alcohol 120% media descriptor (.mds) with companion data file (.mdf)
    MdsMdf,
    /// UltraISO ISO wrapper (.isz), optionally password protected
    Isz,
}

impl DiscFormat {
    /// Display name for diagnostics
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::CueBin => "CUE/BIN",
            Self::MdsMdf => "MDS/MDF",
            Self::Isz => "ISZ",
        }
    }
}

/// Identify the container format of a descriptor file.
///
/// Binary descriptors are recognized by magic bytes; `.cue` only by
/// extension since cue sheets are free-form text.
pub fn sniff(path: &Path) -> DiscResult<DiscFormat> {
    if !path.exists() {
        return Err(DiscError::FileNotFound(path.to_path_buf()));
    }

    let mut head = [0u8; 16];
    let mut file = File::open(path)?;
    let got = file.read(&mut head)?;

    if got >= MDS_MAGIC.len() && &head[..16] == MDS_MAGIC {
        return Ok(DiscFormat::MdsMdf);
    }
    if got >= ISZ_MAGIC.len() && &head[..4] == ISZ_MAGIC {
        return Ok(DiscFormat::Isz);
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    match ext.as_deref() {
        Some("cue") => Ok(DiscFormat::CueBin),
        // extension says mds/isz but the magic didn't match: corrupt header
        Some("mds") => Err(DiscError::Parse(
            "MDS",
            "missing MEDIA DESCRIPTOR signature".to_string(),
        )),
        Some("isz") => Err(DiscError::Parse("ISZ", "missing IsZ! signature".to_string())),
        _ => Err(DiscError::UnknownFormat(path.to_path_buf())),
    }
}
