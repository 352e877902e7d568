//! Container loaders module

pub mod mmap;
pub mod xclbin;

pub use mmap::MmapXclbin;
pub use xclbin::{parse_xclbin, parse_xclbin_binaries, XclbinContainer, XclbinError};
