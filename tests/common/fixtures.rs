//! In-memory xclbin images for tests
//!
//! `XclbinBuilder` lays out a minimal but valid container: the fixed header,
//! a section table, the metadata XML and optional memory topology and
//! connectivity sections. Offsets follow the `axlf` layout.

#![allow(dead_code)]

const MAGIC: &[u8; 8] = b"xclbin2\0";
const HEADER: usize = 304;
const VERSION_OFFSET: usize = HEADER + 24;
const MODE_OFFSET: usize = HEADER + 28;
const VBNV_OFFSET: usize = HEADER + 48;
const SECTION_COUNT_OFFSET: usize = HEADER + 144;
const SECTION_TABLE: usize = HEADER + 152;
const SECTION_ENTRY: usize = 40;

pub const KIND_METADATA: u32 = 2;
pub const KIND_MEM_TOPOLOGY: u32 = 6;
pub const KIND_CONNECTIVITY: u32 = 7;

pub const MODE_FLAT: u16 = 0;
pub const MODE_HW_EMU: u16 = 4;
pub const MODE_SW_EMU: u16 = 5;

pub const U250: &str = "xilinx_u250_xdma_201830_2";

/// `addressQualifier` codes
pub const SCALAR: u32 = 0;
pub const MMAP: u32 = 1;
pub const STREAM: u32 = 4;

#[derive(Debug, Clone)]
struct FixtureKernel {
    name: String,
    args: Vec<(String, String, String)>,
}

#[derive(Debug, Clone)]
pub struct XclbinBuilder {
    mode: u16,
    vbnv: String,
    target: Option<String>,
    kernels: Vec<FixtureKernel>,
    raw_metadata: Option<String>,
    regions: Vec<(String, bool)>,
    edges: Vec<(i32, i32)>,
    extra: Vec<(u32, String, Vec<u8>)>,
}

impl Default for XclbinBuilder {
    fn default() -> Self {
        XclbinBuilder {
            mode: MODE_FLAT,
            vbnv: U250.to_string(),
            target: Some("hw".to_string()),
            kernels: Vec::new(),
            raw_metadata: None,
            regions: Vec::new(),
            edges: Vec::new(),
            extra: Vec::new(),
        }
    }
}

impl XclbinBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(mut self, mode: u16) -> Self {
        self.mode = mode;
        self
    }

    pub fn device(mut self, vbnv: &str) -> Self {
        self.vbnv = vbnv.to_string();
        self
    }

    pub fn target(mut self, target: Option<&str>) -> Self {
        self.target = target.map(str::to_string);
        self
    }

    /// Declare a kernel with `(name, type, addressQualifier)` arguments
    pub fn kernel(mut self, name: &str, args: &[(&str, &str, u32)]) -> Self {
        self.kernels.push(FixtureKernel {
            name: name.to_string(),
            args: args
                .iter()
                .map(|(n, t, q)| (n.to_string(), t.to_string(), q.to_string()))
                .collect(),
        });
        self
    }

    /// Declare an argument with a verbatim `addressQualifier` attribute
    pub fn raw_arg(mut self, name: &str, ty: &str, qualifier: &str) -> Self {
        if let Some(kernel) = self.kernels.last_mut() {
            kernel
                .args
                .push((name.to_string(), ty.to_string(), qualifier.to_string()));
        }
        self
    }

    /// Replace the generated metadata XML
    pub fn metadata(mut self, xml: &str) -> Self {
        self.raw_metadata = Some(xml.to_string());
        self
    }

    pub fn region(mut self, tag: &str, used: bool) -> Self {
        self.regions.push((tag.to_string(), used));
        self
    }

    /// Connect flat argument `arg` to memory region `mem`
    pub fn connect(mut self, arg: i32, mem: i32) -> Self {
        self.edges.push((arg, mem));
        self
    }

    pub fn section(mut self, kind: u32, name: &str, payload: Vec<u8>) -> Self {
        self.extra.push((kind, name.to_string(), payload));
        self
    }

    pub fn metadata_xml(&self) -> String {
        if let Some(xml) = &self.raw_metadata {
            return xml.clone();
        }
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<project name=\"fixture\">\n");
        xml.push_str("  <platform vendor=\"xilinx\" boardid=\"u250\" name=\"xdma\">\n");
        xml.push_str("    <device name=\"fpga0\" fpgaDevice=\"virtexuplus\">\n");
        match &self.target {
            Some(target) => xml.push_str(&format!("      <core name=\"OCL_REGION_0\" target=\"{}\">\n", target)),
            None => xml.push_str("      <core name=\"OCL_REGION_0\">\n"),
        }
        for kernel in &self.kernels {
            xml.push_str(&format!("        <kernel name=\"{}\" language=\"c\">\n", kernel.name));
            for (id, (name, ty, qualifier)) in kernel.args.iter().enumerate() {
                xml.push_str(&format!(
                    "          <arg name=\"{}\" addressQualifier=\"{}\" id=\"{}\" port=\"M_AXI_GMEM\" size=\"0x8\" offset=\"0x10\" hostOffset=\"0x0\" hostSize=\"0x8\" type=\"{}\"/>\n",
                    name, qualifier, id, ty
                ));
            }
            xml.push_str("        </kernel>\n");
        }
        xml.push_str("      </core>\n    </device>\n  </platform>\n</project>\n");
        xml
    }

    fn mem_topology(&self) -> Vec<u8> {
        let mut data = vec![0u8; 8 + self.regions.len() * 40];
        data[..4].copy_from_slice(&(self.regions.len() as i32).to_le_bytes());
        for (i, (tag, used)) in self.regions.iter().enumerate() {
            let rec = 8 + i * 40;
            data[rec + 1] = u8::from(*used);
            data[rec + 8..rec + 16].copy_from_slice(&(16 * 1024 * 1024u64).to_le_bytes());
            data[rec + 16..rec + 24].copy_from_slice(&((i as u64) << 34).to_le_bytes());
            let tag = &tag.as_bytes()[..tag.len().min(15)];
            data[rec + 24..rec + 24 + tag.len()].copy_from_slice(tag);
        }
        data
    }

    fn connectivity(&self) -> Vec<u8> {
        let mut data = vec![0u8; 4 + self.edges.len() * 12];
        data[..4].copy_from_slice(&(self.edges.len() as i32).to_le_bytes());
        for (i, (arg, mem)) in self.edges.iter().enumerate() {
            let rec = 4 + i * 12;
            data[rec..rec + 4].copy_from_slice(&arg.to_le_bytes());
            data[rec + 8..rec + 12].copy_from_slice(&mem.to_le_bytes());
        }
        data
    }

    pub fn build(&self) -> Vec<u8> {
        let mut sections: Vec<(u32, String, Vec<u8>)> = vec![(
            KIND_METADATA,
            "metadata".to_string(),
            self.metadata_xml().into_bytes(),
        )];
        if !self.regions.is_empty() {
            sections.push((KIND_MEM_TOPOLOGY, "mem_topology".to_string(), self.mem_topology()));
        }
        if !self.edges.is_empty() {
            sections.push((KIND_CONNECTIVITY, "connectivity".to_string(), self.connectivity()));
        }
        sections.extend(self.extra.iter().cloned());
        build_image(self.mode, &self.vbnv, &sections)
    }
}

/// Assemble header, section table and payloads
pub fn build_image(mode: u16, vbnv: &str, sections: &[(u32, String, Vec<u8>)]) -> Vec<u8> {
    let table_end = SECTION_TABLE + sections.len().max(1) * SECTION_ENTRY;
    let mut data = vec![0u8; table_end];
    data[..8].copy_from_slice(MAGIC);
    data[VERSION_OFFSET..VERSION_OFFSET + 2].copy_from_slice(&1u16.to_le_bytes());
    data[VERSION_OFFSET + 2] = 2;
    data[VERSION_OFFSET + 3] = 14;
    data[MODE_OFFSET..MODE_OFFSET + 2].copy_from_slice(&mode.to_le_bytes());
    let vbnv = &vbnv.as_bytes()[..vbnv.len().min(63)];
    data[VBNV_OFFSET..VBNV_OFFSET + vbnv.len()].copy_from_slice(vbnv);
    data[SECTION_COUNT_OFFSET..SECTION_COUNT_OFFSET + 4]
        .copy_from_slice(&(sections.len() as u32).to_le_bytes());

    for (i, (kind, name, payload)) in sections.iter().enumerate() {
        // Payloads start 8-byte aligned.
        while data.len() % 8 != 0 {
            data.push(0);
        }
        let offset = data.len() as u64;
        data.extend_from_slice(payload);

        let entry = SECTION_TABLE + i * SECTION_ENTRY;
        data[entry..entry + 4].copy_from_slice(&kind.to_le_bytes());
        let name = &name.as_bytes()[..name.len().min(15)];
        data[entry + 4..entry + 4 + name.len()].copy_from_slice(name);
        data[entry + 24..entry + 32].copy_from_slice(&offset.to_le_bytes());
        data[entry + 32..entry + 40].copy_from_slice(&(payload.len() as u64).to_le_bytes());
    }
    data
}

/// `vadd(a: int*, b: int*, n: int)` on the U250 with `a`/`b` on bank0/bank1
pub fn vadd_builder() -> XclbinBuilder {
    XclbinBuilder::new()
        .kernel("vadd", &[("a", "int*", MMAP), ("b", "int*", MMAP), ("n", "int", SCALAR)])
        .region("bank0", true)
        .region("bank1", true)
        .connect(0, 0)
        .connect(1, 1)
}

/// Two kernels sharing one flat argument table
pub fn two_kernel_builder() -> XclbinBuilder {
    XclbinBuilder::new()
        .kernel("scale", &[("src", "float*", MMAP), ("dst", "float*", MMAP), ("k", "float", SCALAR)])
        .kernel("sum", &[("in", "float*", MMAP), ("out", "float*", MMAP)])
        .region("DDR[0]", true)
        .region("DDR[1]", false)
        .region("HBM[7]", true)
        .connect(0, 0)
        .connect(1, 2)
        .connect(3, 2)
        .connect(4, 1)
}
