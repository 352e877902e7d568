//! Memory-mapped xclbin file
//!
//! Container images routinely run to tens of megabytes (the bitstream
//! section dominates), while the parser only reads the header, the section
//! table and a few small sections. Mapping the file lets the OS page in just
//! those parts; the program loader later hands the whole mapping to the
//! device runtime without an intermediate copy.

use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::{ForgeResult, FpgaForgeError};

/// Memory-mapped container file
///
/// `MmapXclbin` is `Send + Sync` because `memmap2::Mmap` is `Send + Sync`
/// and only read-only access is exposed.
#[derive(Debug)]
pub struct MmapXclbin {
    _file: File,
    mmap: Mmap,
    path: PathBuf,
}

impl MmapXclbin {
    /// Open and memory-map a container file
    pub fn open(path: &Path) -> ForgeResult<Self> {
        tracing::info!("Loading {}", path.display());

        let file = File::open(path).map_err(|e| {
            FpgaForgeError::ContainerLoadFailed(format!(
                "failed to open '{}': {}",
                path.display(),
                e
            ))
        })?;

        // SAFETY: the mapping is read-only and never outlives `file`.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| {
            FpgaForgeError::MmapError(format!(
                "failed to memory-map '{}': {}",
                path.display(),
                e
            ))
        })?;

        tracing::debug!("Memory-mapped container: {} bytes", mmap.len());

        Ok(Self {
            _file: file,
            mmap,
            path: path.to_path_buf(),
        })
    }

    /// Get slice of file bytes without copying
    pub fn get_slice(&self, offset: u64, size: usize) -> ForgeResult<&[u8]> {
        let start = offset as usize;
        let end = start.saturating_add(size);

        if end > self.mmap.len() {
            return Err(FpgaForgeError::MmapError(format!(
                "slice out of bounds: {}..{} in '{}' ({} bytes)",
                start,
                end,
                self.path.display(),
                self.mmap.len()
            )));
        }

        Ok(&self.mmap[start..end])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }
}
