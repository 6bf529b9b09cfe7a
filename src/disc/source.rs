//! Random-access byte source over a container's data files.
//!
//! Decoders consume this narrow interface instead of touching `File`
//! directly, which keeps sector arithmetic testable against in-memory
//! buffers.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::DiscResult;

/// Read-at-offset access to one data file.
pub(crate) trait ByteSource {
    /// Fill `buf` starting at `offset`, returning how many bytes were read.
    /// Short counts happen only at end of file.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Total length in bytes.
    fn len(&mut self) -> io::Result<u64>;
}

/// File-backed source; the handle is owned until the disc is dropped.
pub(crate) struct FileSource {
    file: File,
}

impl FileSource {
    pub fn open(path: &Path) -> DiscResult<Self> {
        let file = File::open(path)?;
        log::debug!("opened data file {}", path.display());
        Ok(Self { file })
    }
}

impl ByteSource for FileSource {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    fn len(&mut self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }
}

/// Sector reader for containers that store track data as a plain run of
/// fixed-size raw sectors (BIN, MDF). Sector-to-byte arithmetic is anchored
/// at the track's first user-data sector.
pub(crate) struct LinearReader {
    files: Vec<FileSource>,
}

impl LinearReader {
    pub fn new(files: Vec<FileSource>) -> Self {
        Self { files }
    }
}

impl crate::disc::model::SectorRead for LinearReader {
    fn read_sector(
        &mut self,
        track: &crate::disc::model::Track,
        sector: u32,
        buf: &mut Vec<u8>,
    ) -> DiscResult<usize> {
        let size = track.raw_sector_size as usize;
        buf.clear();
        buf.resize(size, 0);

        let nfiles = self.files.len();
        let file = self.files.get_mut(track.location.file).ok_or_else(|| {
            crate::error::DiscError::Invariant(format!(
                "track {} references data file {} of {}",
                track.index, track.location.file, nfiles
            ))
        })?;
        let offset =
            track.location.byte_offset + u64::from(sector - track.start) * size as u64;
        Ok(file.read_at(offset, buf)?)
    }
}

/// In-memory source used by unit tests.
#[cfg(test)]
pub(crate) struct MemSource(pub Vec<u8>);

#[cfg(test)]
impl ByteSource for MemSource {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let start = (offset as usize).min(self.0.len());
        let end = (start + buf.len()).min(self.0.len());
        buf[..end - start].copy_from_slice(&self.0[start..end]);
        Ok(end - start)
    }

    fn len(&mut self) -> io::Result<u64> {
        Ok(self.0.len() as u64)
    }
}
