//! Bounds-checked little-endian readers over the container image
//!
//! Every multi-byte field in an xclbin is little-endian. Reads never index
//! past the slice they were given; a short slice is reported as
//! [`XclbinError::Truncated`] naming the region being decoded.

use super::XclbinError;

/// Read-only cursor-free view used to pull fixed-offset fields out of a region
#[derive(Debug, Clone, Copy)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    region: &'static str,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8], region: &'static str) -> Self {
        Self { data, region }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow `len` bytes starting at `offset`
    pub fn bytes_at(&self, offset: usize, len: usize) -> Result<&'a [u8], XclbinError> {
        let end = offset.checked_add(len).ok_or(XclbinError::Truncated {
            region: self.region,
            offset,
            needed: len,
            available: self.data.len(),
        })?;
        self.data.get(offset..end).ok_or(XclbinError::Truncated {
            region: self.region,
            offset,
            needed: len,
            available: self.data.len(),
        })
    }

    fn array_at<const N: usize>(&self, offset: usize) -> Result<[u8; N], XclbinError> {
        let bytes = self.bytes_at(offset, N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn u8_at(&self, offset: usize) -> Result<u8, XclbinError> {
        Ok(self.array_at::<1>(offset)?[0])
    }

    pub fn u16_at(&self, offset: usize) -> Result<u16, XclbinError> {
        Ok(u16::from_le_bytes(self.array_at(offset)?))
    }

    pub fn u32_at(&self, offset: usize) -> Result<u32, XclbinError> {
        Ok(u32::from_le_bytes(self.array_at(offset)?))
    }

    pub fn i32_at(&self, offset: usize) -> Result<i32, XclbinError> {
        Ok(i32::from_le_bytes(self.array_at(offset)?))
    }

    pub fn u64_at(&self, offset: usize) -> Result<u64, XclbinError> {
        Ok(u64::from_le_bytes(self.array_at(offset)?))
    }

    /// Read a fixed-width, NUL-padded character field
    pub fn c_str_at(&self, offset: usize, width: usize) -> Result<String, XclbinError> {
        let bytes = self.bytes_at(offset, width)?;
        let len = bytes.iter().position(|&c| c == 0).unwrap_or(width);
        Ok(String::from_utf8_lossy(&bytes[..len]).into_owned())
    }

    /// Iterate `count` fixed-size records laid out from `base` with `stride`
    ///
    /// The whole record array is validated against the region length before
    /// the first record is handed out.
    pub fn records(
        &self,
        base: usize,
        stride: usize,
        count: usize,
    ) -> Result<impl Iterator<Item = ByteReader<'a>> + 'a, XclbinError> {
        let total = stride.checked_mul(count).ok_or(XclbinError::Truncated {
            region: self.region,
            offset: base,
            needed: usize::MAX,
            available: self.data.len(),
        })?;
        let array = self.bytes_at(base, total)?;
        let region = self.region;
        Ok(array
            .chunks_exact(stride.max(1))
            .take(count)
            .map(move |record| ByteReader::new(record, region)))
    }
}
