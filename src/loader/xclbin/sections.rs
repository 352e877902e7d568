//! xclbin section table
//!
//! The section table follows the header as an array of 40-byte
//! `axlf_section_header` entries: kind (u32), name (16 bytes), 4 bytes of
//! padding, then offset and size (u64 each).

use super::header::SECTION_TABLE_OFFSET;
use super::reader::ByteReader;
use super::XclbinError;

/// Size of one `axlf_section_header`
pub const SECTION_HEADER_SIZE: usize = 40;

/// Section kinds from `xclbin.h` (`enum axlf_section_kind`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Bitstream,
    ClearingBitstream,
    EmbeddedMetadata,
    Firmware,
    DebugData,
    SchedFirmware,
    MemTopology,
    Connectivity,
    IpLayout,
    DebugIpLayout,
    DesignCheckPoint,
    ClockFreqTopology,
    BuildMetadata,
    KeyValueMetadata,
    UserMetadata,
    Pdi,
    PartitionMetadata,
    EmulationData,
    SystemMetadata,
    SoftKernel,
    AieMetadata,
    GroupTopology,
    GroupConnectivity,
    Other(u32),
}

impl SectionKind {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => SectionKind::Bitstream,
            1 => SectionKind::ClearingBitstream,
            2 => SectionKind::EmbeddedMetadata,
            3 => SectionKind::Firmware,
            4 => SectionKind::DebugData,
            5 => SectionKind::SchedFirmware,
            6 => SectionKind::MemTopology,
            7 => SectionKind::Connectivity,
            8 => SectionKind::IpLayout,
            9 => SectionKind::DebugIpLayout,
            10 => SectionKind::DesignCheckPoint,
            11 => SectionKind::ClockFreqTopology,
            14 => SectionKind::BuildMetadata,
            15 => SectionKind::KeyValueMetadata,
            16 => SectionKind::UserMetadata,
            18 => SectionKind::Pdi,
            20 => SectionKind::PartitionMetadata,
            21 => SectionKind::EmulationData,
            22 => SectionKind::SystemMetadata,
            23 => SectionKind::SoftKernel,
            25 => SectionKind::AieMetadata,
            26 => SectionKind::GroupTopology,
            27 => SectionKind::GroupConnectivity,
            other => SectionKind::Other(other),
        }
    }

    pub fn as_raw(&self) -> u32 {
        match self {
            SectionKind::Bitstream => 0,
            SectionKind::ClearingBitstream => 1,
            SectionKind::EmbeddedMetadata => 2,
            SectionKind::Firmware => 3,
            SectionKind::DebugData => 4,
            SectionKind::SchedFirmware => 5,
            SectionKind::MemTopology => 6,
            SectionKind::Connectivity => 7,
            SectionKind::IpLayout => 8,
            SectionKind::DebugIpLayout => 9,
            SectionKind::DesignCheckPoint => 10,
            SectionKind::ClockFreqTopology => 11,
            SectionKind::BuildMetadata => 14,
            SectionKind::KeyValueMetadata => 15,
            SectionKind::UserMetadata => 16,
            SectionKind::Pdi => 18,
            SectionKind::PartitionMetadata => 20,
            SectionKind::EmulationData => 21,
            SectionKind::SystemMetadata => 22,
            SectionKind::SoftKernel => 23,
            SectionKind::AieMetadata => 25,
            SectionKind::GroupTopology => 26,
            SectionKind::GroupConnectivity => 27,
            SectionKind::Other(raw) => *raw,
        }
    }

    pub fn label(&self) -> String {
        match self {
            SectionKind::EmbeddedMetadata => "EMBEDDED_METADATA".to_string(),
            SectionKind::MemTopology => "MEM_TOPOLOGY".to_string(),
            SectionKind::Connectivity => "CONNECTIVITY".to_string(),
            SectionKind::IpLayout => "IP_LAYOUT".to_string(),
            SectionKind::Bitstream => "BITSTREAM".to_string(),
            SectionKind::Other(raw) => format!("KIND_{}", raw),
            other => format!("{:?}", other),
        }
    }
}

/// One entry of the section table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionHeader {
    pub kind: SectionKind,
    pub name: String,
    pub offset: u64,
    pub size: u64,
}

/// Parse `count` section headers and validate each against the image length
pub fn parse_section_table(data: &[u8], count: u32) -> Result<Vec<SectionHeader>, XclbinError> {
    let reader = ByteReader::new(data, "section table");
    let records = reader.records(SECTION_TABLE_OFFSET, SECTION_HEADER_SIZE, count as usize)?;
    let mut sections = Vec::new();

    for record in records {
        let kind = SectionKind::from_raw(record.u32_at(0)?);
        let name = record.c_str_at(4, 16)?;
        let offset = record.u64_at(24)?;
        let size = record.u64_at(32)?;

        let end = offset.checked_add(size);
        if end.map_or(true, |end| end > data.len() as u64) {
            return Err(XclbinError::Truncated {
                region: "section payload",
                offset: offset as usize,
                needed: size as usize,
                available: data.len(),
            });
        }

        tracing::trace!(
            "xclbin section {} ({}) at offset {} size {}",
            kind.label(),
            name,
            offset,
            size
        );
        sections.push(SectionHeader {
            kind,
            name,
            offset,
            size,
        });
    }

    Ok(sections)
}

/// Find the first section of `kind` and borrow its payload
pub fn find_section<'a>(
    data: &'a [u8],
    sections: &[SectionHeader],
    kind: SectionKind,
) -> Option<&'a [u8]> {
    sections
        .iter()
        .find(|s| s.kind == kind)
        .and_then(|s| {
            let start = usize::try_from(s.offset).ok()?;
            let end = start.checked_add(usize::try_from(s.size).ok()?)?;
            data.get(start..end)
        })
}
