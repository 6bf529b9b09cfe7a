//! ISO 9660 Primary Volume Descriptor peek.
//!
//! Used on the extracted image to report the volume label; the descriptor
//! sits at sector 16 of the filesystem (byte offset 32768).

use std::io::{Read, Seek, SeekFrom};

use crate::error::{DiscError, DiscResult};

const SECTOR_SIZE: usize = 2048;
const PVD_OFFSET: u64 = 16 * SECTOR_SIZE as u64;

const PVD_TYPE: u8 = 1;
const STANDARD_ID: &[u8; 5] = b"CD001";

/// Identification fields of an ISO 9660 volume (ECMA-119).
#[derive(Debug, Clone)]
pub struct VolumeDescriptor {
    pub system_id: String,
    pub volume_id: String,
    pub publisher_id: String,
    pub application_id: String,
}

impl VolumeDescriptor {
    /// Seek to the descriptor and parse it.
    pub fn read_from<R: Read + Seek>(reader: &mut R) -> DiscResult<Self> {
        reader.seek(SeekFrom::Start(PVD_OFFSET))?;
        let mut sector = [0u8; SECTOR_SIZE];
        reader.read_exact(&mut sector)?;
        Self::parse(&sector)
    }

    /// Parse one 2048-byte descriptor sector.
    pub fn parse(sector: &[u8]) -> DiscResult<Self> {
        if sector.len() < SECTOR_SIZE {
            return Err(DiscError::Parse(
                "ISO9660",
                format!("descriptor sector is {} bytes", sector.len()),
            ));
        }
        if sector[0] != PVD_TYPE || &sector[1..6] != STANDARD_ID {
            return Err(DiscError::Parse(
                "ISO9660",
                "no primary volume descriptor at sector 16".to_string(),
            ));
        }

        Ok(Self {
            system_id: field(&sector[8..40]),
            volume_id: field(&sector[40..72]),
            publisher_id: field(&sector[318..446]),
            application_id: field(&sector[574..702]),
        })
    }
}

/// Fields are space-padded a/d-characters; non-UTF-8 bytes are replaced.
fn field(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches([' ', '\0'])
        .to_string()
}
