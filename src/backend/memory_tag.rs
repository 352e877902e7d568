//! Memory tag to buffer placement resolution
//!
//! Connectivity tags name the memory bank a kernel port is wired to. The
//! vendor runtime expects a bank flag in the extended-pointer descriptor:
//!
//! | tag              | flag                      |
//! |------------------|---------------------------|
//! | `bank0`..`bank3` | DDR bank 0..3 (`1 << n`)  |
//! | `DDR[0]`..`DDR[3]` | DDR bank 0..3 (`1 << n`)|
//! | `HBM[0]`..`HBM[31]` | `n | XCL_MEM_TOPOLOGY`  |

/// DDR bank flags
pub const XCL_MEM_DDR_BANK0: u32 = 1 << 0;
pub const XCL_MEM_DDR_BANK1: u32 = 1 << 1;
pub const XCL_MEM_DDR_BANK2: u32 = 1 << 2;
pub const XCL_MEM_DDR_BANK3: u32 = 1 << 3;

/// Marks the low bits of the flag as a memory topology index
pub const XCL_MEM_TOPOLOGY: u32 = 1 << 31;

pub const DDR_BANK_COUNT: u32 = 4;
pub const HBM_BANK_COUNT: u32 = 32;

/// Placement requested for a buffer through the extended-pointer descriptor
///
/// `flags == 0` means the argument is known but carries no usable tag; the
/// runtime then picks the bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BankPlacement {
    pub flags: u32,
}

impl BankPlacement {
    pub fn new(flags: u32) -> Self {
        BankPlacement { flags }
    }

    pub fn unplaced() -> Self {
        BankPlacement::default()
    }

    pub fn is_placed(&self) -> bool {
        self.flags != 0
    }
}

/// Resolve a memory tag into a bank flag
///
/// Empty tags are not looked up. Unknown tags are logged and yield `None`.
pub fn resolve_memory_tag(tag: &str) -> Option<u32> {
    if tag.is_empty() {
        return None;
    }
    let flag = lookup(tag);
    if flag.is_none() {
        tracing::warn!("Unknown argument memory tag: {}", tag);
    }
    flag
}

/// Placement for an argument with an optional tag
pub fn placement_for_tag(tag: Option<&str>) -> BankPlacement {
    tag.and_then(resolve_memory_tag)
        .map(BankPlacement::new)
        .unwrap_or_default()
}

fn lookup(tag: &str) -> Option<u32> {
    if let Some(bank) = tag.strip_prefix("bank") {
        return ddr_flag(bank);
    }
    if let Some(bank) = bracketed(tag, "DDR") {
        return ddr_flag(bank);
    }
    if let Some(bank) = bracketed(tag, "HBM") {
        let index = parse_index(bank)?;
        return (index < HBM_BANK_COUNT).then_some(index | XCL_MEM_TOPOLOGY);
    }
    None
}

fn bracketed<'a>(tag: &'a str, prefix: &str) -> Option<&'a str> {
    tag.strip_prefix(prefix)?.strip_prefix('[')?.strip_suffix(']')
}

fn ddr_flag(bank: &str) -> Option<u32> {
    let index = parse_index(bank)?;
    (index < DDR_BANK_COUNT).then(|| 1 << index)
}

/// Plain decimal without sign or leading zeros, so `bank01` stays unknown
fn parse_index(digits: &str) -> Option<u32> {
    let canonical = !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && (digits == "0" || !digits.starts_with('0'));
    if canonical {
        digits.parse().ok()
    } else {
        None
    }
}
