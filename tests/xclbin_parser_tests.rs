//! Container parsing against built images

mod common;

use common::*;
use fpgaforge::backend::memory_tag::{XCL_MEM_DDR_BANK0, XCL_MEM_DDR_BANK1, XCL_MEM_TOPOLOGY};
use fpgaforge::backend::{placement_for_tag, resolve_memory_tag};
use fpgaforge::loader::xclbin::{ArgCategory, ParseWarning, XclbinMode};
use fpgaforge::loader::{parse_xclbin, parse_xclbin_binaries, MmapXclbin, XclbinError};
use fpgaforge::EmulationMode;

#[test]
fn test_vadd_argument_table() {
    let container = parse_xclbin(&VADD_XCLBIN).unwrap();

    assert_eq!(container.device_name(), U250);
    assert_eq!(container.vendor(), "Xilinx");
    assert_eq!(container.header.mode, XclbinMode::Flat);
    assert_eq!(container.emulation_mode(), None);
    assert_eq!(container.kernel_names().collect::<Vec<_>>(), ["vadd"]);

    assert_eq!(container.args.len(), 3);
    let a = &container.args[0];
    assert_eq!(a.name, "a");
    assert_eq!(a.ty, "int*");
    assert_eq!(a.category, ArgCategory::MemoryMapped);
    assert_eq!(a.tag.as_deref(), Some("bank0"));
    assert_eq!(resolve_memory_tag(a.tag.as_deref().unwrap()), Some(XCL_MEM_DDR_BANK0));
    assert_eq!(
        resolve_memory_tag(container.args[1].tag.as_deref().unwrap()),
        Some(XCL_MEM_DDR_BANK1)
    );

    let n = &container.args[2];
    assert_eq!(n.category, ArgCategory::Scalar);
    assert_eq!(n.tag, None);
    assert!(!placement_for_tag(n.tag.as_deref()).is_placed());
    assert!(container.warnings.is_empty());
}

#[test]
fn test_software_emulation_from_header_mode() {
    let image = vadd_builder().mode(MODE_SW_EMU).target(None).build();
    let container = parse_xclbin(&image).unwrap();
    assert_eq!(container.target, None);
    assert_eq!(container.emulation_mode(), Some(EmulationMode::Software));
}

#[test]
fn test_metadata_target_overrides_header_mode() {
    let image = vadd_builder().mode(MODE_SW_EMU).target(Some("hw_em")).build();
    let container = parse_xclbin(&image).unwrap();
    assert_eq!(container.emulation_mode(), Some(EmulationMode::Hardware));

    let image = vadd_builder().mode(MODE_FLAT).target(Some("csim")).build();
    assert_eq!(
        parse_xclbin(&image).unwrap().emulation_mode(),
        Some(EmulationMode::Software)
    );
}

#[test]
fn test_hardware_emulation_from_header_mode() {
    let image = vadd_builder().mode(MODE_HW_EMU).target(Some("hw")).build();
    assert_eq!(
        parse_xclbin(&image).unwrap().emulation_mode(),
        Some(EmulationMode::Hardware)
    );
}

#[test]
fn test_bad_magic_is_unsupported() {
    let mut image = VADD_XCLBIN.clone();
    image[..8].copy_from_slice(b"notxcl1\0");
    assert!(matches!(
        parse_xclbin(&image),
        Err(XclbinError::UnsupportedFormat(_))
    ));
}

#[test]
fn test_unknown_mode() {
    let image = vadd_builder().mode(42).build();
    assert_eq!(parse_xclbin(&image).unwrap_err(), XclbinError::UnknownMode(42));
}

#[test]
fn test_missing_metadata_section() {
    let image = build_image(MODE_FLAT, U250, &[(0, "bitstream".to_string(), vec![0xAA; 64])]);
    assert!(matches!(
        parse_xclbin(&image),
        Err(XclbinError::MissingMetadata(_))
    ));
}

#[test]
fn test_metadata_without_kernels() {
    let image = XclbinBuilder::new().build();
    assert!(matches!(
        parse_xclbin(&image),
        Err(XclbinError::MissingMetadata(_))
    ));
}

#[test]
fn test_malformed_metadata_xml() {
    let image = XclbinBuilder::new().metadata("<project><platform>").build();
    assert!(matches!(
        parse_xclbin(&image),
        Err(XclbinError::MalformedMetadata(_))
    ));
}

#[test]
fn test_truncated_image() {
    let image = VADD_XCLBIN.clone();
    let cut = &image[..image.len() - 16];
    assert!(matches!(parse_xclbin(cut), Err(XclbinError::Truncated { .. })));
}

#[test]
fn test_huge_section_count_is_truncated() {
    let mut image = vec![0u8; 456];
    image[..8].copy_from_slice(b"xclbin2\0");
    image[448..452].copy_from_slice(&u32::MAX.to_le_bytes());
    assert!(matches!(parse_xclbin(&image), Err(XclbinError::Truncated { .. })));
}

#[test]
fn test_multi_kernel_offsets_and_tags() {
    let container = parse_xclbin(&two_kernel_builder().build()).unwrap();

    assert_eq!(container.kernels.len(), 2);
    assert_eq!(container.kernels[0].arg_offset, 0);
    assert_eq!(container.kernels[0].arg_count, 3);
    assert_eq!(container.kernels[1].arg_offset, 3);
    assert_eq!(container.kernels[1].arg_count, 2);
    assert_eq!(container.args[4].name, "out");
    assert_eq!(container.args[4].index, 4);

    assert_eq!(container.kernel_for_arg(0), Some((0, 0)));
    assert_eq!(container.kernel_for_arg(4), Some((1, 1)));
    assert_eq!(container.kernel_for_arg(5), None);

    assert_eq!(container.args[0].tag.as_deref(), Some("DDR[0]"));
    assert_eq!(container.args[1].tag.as_deref(), Some("HBM[7]"));
    assert_eq!(
        placement_for_tag(container.args[3].tag.as_deref()).flags,
        7 | XCL_MEM_TOPOLOGY
    );
    // DDR[1] is declared but unused.
    assert_eq!(container.args[4].tag, None);
    assert!(container.warnings.contains(&ParseWarning::UnmappedMemoryRegion {
        arg_index: 4,
        mem_data_index: 1
    }));
}

#[test]
fn test_last_connectivity_edge_wins() {
    let image = vadd_builder().connect(0, 1).build();
    let container = parse_xclbin(&image).unwrap();
    assert_eq!(container.args[0].tag.as_deref(), Some("bank1"));
}

#[test]
fn test_dangling_edge_is_a_warning() {
    let image = vadd_builder().connect(9, 0).build();
    let container = parse_xclbin(&image).unwrap();
    assert_eq!(container.args.len(), 3);
    assert!(container
        .warnings
        .contains(&ParseWarning::DanglingConnectivity { arg_index: 9 }));
}

#[test]
fn test_unknown_address_qualifier_is_unspecified() {
    let image = XclbinBuilder::new()
        .kernel("k", &[("a", "int*", MMAP)])
        .raw_arg("p", "pipe", "2")
        .raw_arg("q", "int", "")
        .raw_arg("s", "stream<int>", &STREAM.to_string())
        .build();
    let container = parse_xclbin(&image).unwrap();

    assert_eq!(container.args[1].category, ArgCategory::Unspecified);
    assert_eq!(container.args[2].category, ArgCategory::Unspecified);
    assert_eq!(container.args[3].category, ArgCategory::Stream);
    assert_eq!(container.warnings.len(), 2);
}

#[test]
fn test_unrelated_sections_are_ignored() {
    let image = vadd_builder()
        .section(8, "ip_layout", vec![0u8; 24])
        .section(11, "clock_freq", vec![1u8; 8])
        .build();
    let container = parse_xclbin(&image).unwrap();
    assert_eq!(container.sections.len(), 5);
    assert_eq!(container.args.len(), 3);
}

#[test]
fn test_exactly_one_binary() {
    assert!(parse_xclbin_binaries(&[VADD_XCLBIN.as_slice()]).is_ok());
    assert!(matches!(
        parse_xclbin_binaries(&[VADD_XCLBIN.as_slice(), VADD_XCLBIN.as_slice()]),
        Err(XclbinError::UnsupportedFormat(_))
    ));
}

#[test]
fn test_parse_from_memory_map() -> anyhow::Result<()> {
    let file = write_temp_xclbin(&VADD_XCLBIN)?;
    let mapped = MmapXclbin::open(file.path())?;
    assert_eq!(mapped.len(), VADD_XCLBIN.len());

    let container = parse_xclbin(mapped.as_bytes())?;
    assert_eq!(container.kernels[0].name, "vadd");
    Ok(())
}
