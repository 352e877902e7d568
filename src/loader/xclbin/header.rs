//! xclbin header parsing and validation
//!
//! This module handles the fixed `axlf` prefix of a container:
//! - Magic signature validation
//! - Build mode decoding
//! - Platform (device identity) string extraction
//! - Section count

use super::reader::ByteReader;
use super::XclbinError;

/// xclbin container magic signature (NUL included)
pub const XCLBIN_MAGIC: &[u8; 8] = b"xclbin2\0";

/// Vendor identity implied by the `xclbin2` signature
pub const XCLBIN_VENDOR: &str = "Xilinx";

/// Byte offset of the `axlf_header` inside the image
pub const HEADER_OFFSET: usize = 304;

const MODE_OFFSET: usize = HEADER_OFFSET + 28;
const VERSION_PATCH_OFFSET: usize = HEADER_OFFSET + 24;
const PLATFORM_VBNV_OFFSET: usize = HEADER_OFFSET + 48;
const PLATFORM_VBNV_LEN: usize = 64;
const NUM_SECTIONS_OFFSET: usize = HEADER_OFFSET + 144;

/// Byte offset of the first section header
pub const SECTION_TABLE_OFFSET: usize = HEADER_OFFSET + 152;

/// Build mode recorded in `axlf_header::m_mode`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum XclbinMode {
    Flat = 0,
    PartialReconfiguration = 1,
    TandemStage2 = 2,
    TandemStage2WithPr = 3,
    HardwareEmulation = 4,
    SoftwareEmulation = 5,
}

impl XclbinMode {
    pub fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            0 => Some(XclbinMode::Flat),
            1 => Some(XclbinMode::PartialReconfiguration),
            2 => Some(XclbinMode::TandemStage2),
            3 => Some(XclbinMode::TandemStage2WithPr),
            4 => Some(XclbinMode::HardwareEmulation),
            5 => Some(XclbinMode::SoftwareEmulation),
            _ => None,
        }
    }

    /// Emulation flavour implied by this mode, if any
    pub fn emulation_mode(&self) -> Option<crate::config::EmulationMode> {
        match self {
            XclbinMode::HardwareEmulation => Some(crate::config::EmulationMode::Hardware),
            XclbinMode::SoftwareEmulation => Some(crate::config::EmulationMode::Software),
            _ => None,
        }
    }
}

/// Decoded container header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XclbinHeader {
    pub mode: XclbinMode,
    pub version: (u8, u8, u16),
    /// Target platform name, e.g. `xilinx_u250_xdma_201830_2`
    pub platform_vbnv: String,
    pub section_count: u32,
}

/// Validate the 8-byte signature at offset 0
pub fn validate_xclbin_magic(data: &[u8]) -> Result<(), XclbinError> {
    if data.len() < XCLBIN_MAGIC.len() || &data[..XCLBIN_MAGIC.len()] != XCLBIN_MAGIC {
        let found = &data[..data.len().min(XCLBIN_MAGIC.len())];
        return Err(XclbinError::UnsupportedFormat(format!(
            "expected signature {:?}, found {:?}",
            String::from_utf8_lossy(XCLBIN_MAGIC),
            String::from_utf8_lossy(found)
        )));
    }
    Ok(())
}

/// Parse the complete header
///
/// Reads magic, mode, version, platform VBNV and section count in sequence.
pub fn parse_xclbin_header(data: &[u8]) -> Result<XclbinHeader, XclbinError> {
    validate_xclbin_magic(data)?;
    let reader = ByteReader::new(data, "header");

    let raw_mode = reader.u16_at(MODE_OFFSET)?;
    let mode = XclbinMode::from_raw(raw_mode).ok_or(XclbinError::UnknownMode(raw_mode))?;

    let patch = reader.u16_at(VERSION_PATCH_OFFSET)?;
    let major = reader.u8_at(VERSION_PATCH_OFFSET + 2)?;
    let minor = reader.u8_at(VERSION_PATCH_OFFSET + 3)?;

    let platform_vbnv = reader.c_str_at(PLATFORM_VBNV_OFFSET, PLATFORM_VBNV_LEN)?;
    let section_count = reader.u32_at(NUM_SECTIONS_OFFSET)?;

    Ok(XclbinHeader {
        mode,
        version: (major, minor, patch),
        platform_vbnv,
        section_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_with_mode(mode: u16, vbnv: &str) -> Vec<u8> {
        let mut data = vec![0u8; SECTION_TABLE_OFFSET];
        data[..8].copy_from_slice(XCLBIN_MAGIC);
        data[MODE_OFFSET..MODE_OFFSET + 2].copy_from_slice(&mode.to_le_bytes());
        data[VERSION_PATCH_OFFSET + 2] = 2;
        data[VERSION_PATCH_OFFSET + 3] = 1;
        data[PLATFORM_VBNV_OFFSET..PLATFORM_VBNV_OFFSET + vbnv.len()]
            .copy_from_slice(vbnv.as_bytes());
        data
    }

    #[test]
    fn test_magic_bytes() {
        assert_eq!(XCLBIN_MAGIC, b"xclbin2\0");
    }

    #[test]
    fn test_validate_magic_rejects_other_signature() {
        let data = b"notxcl1\0 and some more bytes".to_vec();
        let err = validate_xclbin_magic(&data).unwrap_err();
        assert!(matches!(err, XclbinError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_validate_magic_rejects_short_input() {
        assert!(validate_xclbin_magic(b"xcl").is_err());
    }

    #[test]
    fn test_parse_header_flat() {
        let data = image_with_mode(0, "xilinx_u250_xdma_201830_2");
        let header = parse_xclbin_header(&data).unwrap();
        assert_eq!(header.mode, XclbinMode::Flat);
        assert_eq!(header.platform_vbnv, "xilinx_u250_xdma_201830_2");
        assert_eq!(header.version, (2, 1, 0));
        assert_eq!(header.section_count, 0);
        assert_eq!(header.mode.emulation_mode(), None);
    }

    #[test]
    fn test_parse_header_unknown_mode() {
        let data = image_with_mode(42, "dev");
        assert!(matches!(
            parse_xclbin_header(&data),
            Err(XclbinError::UnknownMode(42))
        ));
    }

    #[test]
    fn test_mode_emulation_flavours() {
        use crate::config::EmulationMode;
        assert_eq!(
            XclbinMode::from_raw(4).and_then(|m| m.emulation_mode()),
            Some(EmulationMode::Hardware)
        );
        assert_eq!(
            XclbinMode::from_raw(5).and_then(|m| m.emulation_mode()),
            Some(EmulationMode::Software)
        );
        assert_eq!(XclbinMode::from_raw(6), None);
    }

    #[test]
    fn test_truncated_header() {
        let mut data = vec![0u8; 100];
        data[..8].copy_from_slice(XCLBIN_MAGIC);
        assert!(matches!(
            parse_xclbin_header(&data),
            Err(XclbinError::Truncated { .. })
        ));
    }
}
