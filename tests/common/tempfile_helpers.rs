//! Temp file helpers for tests
//!
//! Wrappers around the tempfile crate with consistent error context.

use anyhow::Context;
use std::io::Write;

/// Write `bytes` to a fresh `.xclbin` temp file.
pub fn write_temp_xclbin(bytes: &[u8]) -> anyhow::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::NamedTempFile::with_suffix(".xclbin")
        .context("Failed to create temporary xclbin file")?;
    file.write_all(bytes).context("Failed to write xclbin image")?;
    file.flush().context("Failed to flush xclbin image")?;
    Ok(file)
}
