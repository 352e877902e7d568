//! Core xclbin container types

use std::fmt;

use crate::config::EmulationMode;

use super::header::XclbinHeader;
use super::sections::SectionHeader;

/// How a kernel argument is passed, decoded from `addressQualifier`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ArgCategory {
    /// Passed by value (`addressQualifier = 0`)
    Scalar,
    /// Global memory pointer (`addressQualifier = 1`)
    MemoryMapped,
    /// AXI stream (`addressQualifier = 4`)
    Stream,
    /// Code not understood by this runtime
    #[default]
    Unspecified,
}

impl ArgCategory {
    /// Decode an `addressQualifier` code; unknown codes yield `None`
    pub fn from_address_qualifier(code: i64) -> Option<Self> {
        match code {
            0 => Some(ArgCategory::Scalar),
            1 => Some(ArgCategory::MemoryMapped),
            4 => Some(ArgCategory::Stream),
            _ => None,
        }
    }
}

impl fmt::Display for ArgCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArgCategory::Scalar => "scalar",
            ArgCategory::MemoryMapped => "mmap",
            ArgCategory::Stream => "stream",
            ArgCategory::Unspecified => "unspecified",
        };
        f.write_str(s)
    }
}

/// One entry of the flat argument table
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArgInfo {
    /// Position in the flat table (kernel offset + declaration order)
    pub index: usize,
    pub name: String,
    /// Declared C type, e.g. `int*`
    pub ty: String,
    pub category: ArgCategory,
    /// Physical memory bank this argument is connected to
    pub tag: Option<String>,
}

/// A kernel declared in the embedded metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelInfo {
    pub name: String,
    /// Index of this kernel's first argument in the flat table
    pub arg_offset: usize,
    pub arg_count: usize,
}

impl KernelInfo {
    pub fn arg_range(&self) -> std::ops::Range<usize> {
        self.arg_offset..self.arg_offset + self.arg_count
    }
}

/// Named physical memory region from MEM_TOPOLOGY
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRegion {
    pub tag: String,
    pub used: bool,
    pub size_kb: u64,
    pub base_address: u64,
}

/// One CONNECTIVITY record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityEdge {
    pub arg_index: i32,
    pub ip_layout_index: i32,
    pub mem_data_index: i32,
}

/// Non-fatal anomalies found while parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseWarning {
    UnrecognizedArgumentCategory { arg_index: usize, code: String },
    DanglingConnectivity { arg_index: i32 },
    UnmappedMemoryRegion { arg_index: usize, mem_data_index: i32 },
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseWarning::UnrecognizedArgumentCategory { arg_index, code } => {
                write!(f, "unknown argument category {:?} for argument {}", code, arg_index)
            }
            ParseWarning::DanglingConnectivity { arg_index } => {
                write!(f, "connectivity references unknown argument {}", arg_index)
            }
            ParseWarning::UnmappedMemoryRegion {
                arg_index,
                mem_data_index,
            } => write!(
                f,
                "argument {} connected to unused or unknown memory region {}",
                arg_index, mem_data_index
            ),
        }
    }
}

/// Fully parsed container
///
/// Produced once by [`super::parse_xclbin`] and immutable afterwards.
#[derive(Debug, Clone)]
pub struct XclbinContainer {
    pub header: XclbinHeader,
    pub sections: Vec<SectionHeader>,
    pub vendor: String,
    pub kernels: Vec<KernelInfo>,
    pub args: Vec<ArgInfo>,
    pub memory_regions: Vec<MemoryRegion>,
    pub connectivity: Vec<ConnectivityEdge>,
    /// `target` attribute of the metadata `core` element
    pub target: Option<String>,
    pub emulation_mode: Option<EmulationMode>,
    pub warnings: Vec<ParseWarning>,
}

impl XclbinContainer {
    /// Target device identity (platform VBNV)
    pub fn device_name(&self) -> &str {
        &self.header.platform_vbnv
    }

    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    /// Emulation mode derived from header and metadata
    pub fn emulation_mode(&self) -> Option<EmulationMode> {
        self.emulation_mode
    }

    pub fn kernel_names(&self) -> impl Iterator<Item = &str> {
        self.kernels.iter().map(|k| k.name.as_str())
    }

    pub fn arg(&self, index: usize) -> Option<&ArgInfo> {
        self.args.get(index)
    }

    /// Kernel owning flat argument `index`, with the kernel-local position
    pub fn kernel_for_arg(&self, index: usize) -> Option<(usize, u32)> {
        self.kernels
            .iter()
            .position(|k| k.arg_range().contains(&index))
            .map(|k| (k, (index - self.kernels[k].arg_offset) as u32))
    }
}
