//! MEM_TOPOLOGY and CONNECTIVITY record parsing
//!
//! Both sections are a 32-bit count followed by fixed-size records:
//!
//! | section      | records at | stride | fields                                   |
//! |--------------|------------|--------|------------------------------------------|
//! | MEM_TOPOLOGY | 8          | 40     | type, used, pad[6], size, base, tag[16]  |
//! | CONNECTIVITY | 4          | 12     | arg_index, ip_layout_index, mem_index    |

use super::reader::ByteReader;
use super::types::{ArgInfo, ConnectivityEdge, MemoryRegion, ParseWarning};
use super::XclbinError;

pub const MEM_DATA_OFFSET: usize = 8;
pub const MEM_DATA_SIZE: usize = 40;
pub const CONNECTION_OFFSET: usize = 4;
pub const CONNECTION_SIZE: usize = 12;

const MEM_TAG_LEN: usize = 16;

fn record_count(reader: &ByteReader<'_>, section: &str) -> Result<usize, XclbinError> {
    let count = reader.i32_at(0)?;
    if count < 0 {
        return Err(XclbinError::MalformedSection(format!(
            "{} declares a negative record count ({})",
            section, count
        )));
    }
    Ok(count as usize)
}

/// Parse every region of the memory topology, used or not
pub fn parse_mem_topology(payload: &[u8]) -> Result<Vec<MemoryRegion>, XclbinError> {
    let reader = ByteReader::new(payload, "MEM_TOPOLOGY");
    let count = record_count(&reader, "MEM_TOPOLOGY")?;

    reader
        .records(MEM_DATA_OFFSET, MEM_DATA_SIZE, count)?
        .map(|mem| {
            Ok(MemoryRegion {
                used: mem.u8_at(1)? != 0,
                size_kb: mem.u64_at(8)?,
                base_address: mem.u64_at(16)?,
                tag: mem.c_str_at(24, MEM_TAG_LEN)?,
            })
        })
        .collect()
}

/// Parse the connectivity edges in section order
pub fn parse_connectivity(payload: &[u8]) -> Result<Vec<ConnectivityEdge>, XclbinError> {
    let reader = ByteReader::new(payload, "CONNECTIVITY");
    let count = record_count(&reader, "CONNECTIVITY")?;

    reader
        .records(CONNECTION_OFFSET, CONNECTION_SIZE, count)?
        .map(|conn| {
            Ok(ConnectivityEdge {
                arg_index: conn.i32_at(0)?,
                ip_layout_index: conn.i32_at(4)?,
                mem_data_index: conn.i32_at(8)?,
            })
        })
        .collect()
}

/// Apply connectivity edges to the argument table
///
/// Edges are applied in input order, so the last edge naming an argument
/// decides its tag. Edges pointing at unknown arguments are skipped, and an
/// edge pointing at an unused or missing region clears the tag.
pub fn apply_connectivity(
    args: &mut [ArgInfo],
    regions: &[MemoryRegion],
    edges: &[ConnectivityEdge],
    warnings: &mut Vec<ParseWarning>,
) {
    for edge in edges {
        let arg = match usize::try_from(edge.arg_index)
            .ok()
            .and_then(|i| args.get_mut(i))
        {
            Some(arg) => arg,
            None => {
                tracing::warn!(
                    "Connectivity references unknown argument {} (table has {})",
                    edge.arg_index,
                    args.len()
                );
                warnings.push(ParseWarning::DanglingConnectivity {
                    arg_index: edge.arg_index,
                });
                continue;
            }
        };

        let region = usize::try_from(edge.mem_data_index)
            .ok()
            .and_then(|i| regions.get(i))
            .filter(|r| r.used);

        let tag = match region {
            Some(region) => Some(region.tag.clone()),
            None => {
                tracing::warn!(
                    "Argument {} connected to unused or unknown memory region {}",
                    arg.index,
                    edge.mem_data_index
                );
                warnings.push(ParseWarning::UnmappedMemoryRegion {
                    arg_index: arg.index,
                    mem_data_index: edge.mem_data_index,
                });
                None
            }
        };

        if let (Some(previous), Some(next)) = (&arg.tag, &tag) {
            if previous != next {
                tracing::debug!(
                    "Argument {} ('{}') re-tagged from {} to {}",
                    arg.index,
                    arg.name,
                    previous,
                    next
                );
            }
        }
        arg.tag = tag;
    }
}
