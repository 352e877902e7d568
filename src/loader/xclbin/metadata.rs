//! EMBEDDED_METADATA parsing
//!
//! The metadata section is a small XML document:
//!
//! ```text
//! project > platform > device > core[target]
//!     > kernel[name]
//!         > arg[id, name, type, addressQualifier]*
//! ```
//!
//! Every kernel's arguments are appended to one flat table in declaration
//! order, so kernel `k` owns the contiguous range starting at its offset.

use roxmltree::{Document, Node};

use super::types::{ArgCategory, ArgInfo, KernelInfo, ParseWarning};
use super::XclbinError;

/// Kernel and argument information extracted from the metadata XML
#[derive(Debug, Clone, Default)]
pub struct KernelMetadata {
    pub kernels: Vec<KernelInfo>,
    pub args: Vec<ArgInfo>,
    /// `core/@target`, e.g. `hw`, `hw_em` or `csim`
    pub target: Option<String>,
    pub warnings: Vec<ParseWarning>,
}

fn child<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.is_element() && n.has_tag_name(tag))
}

fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    tag: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |n| n.is_element() && n.has_tag_name(tag))
}

/// Parse the raw metadata section payload
///
/// The payload may carry trailing NUL padding, which is ignored.
pub fn parse_kernel_metadata(payload: &[u8]) -> Result<KernelMetadata, XclbinError> {
    let end = payload.iter().position(|&b| b == 0).unwrap_or(payload.len());
    let text = std::str::from_utf8(&payload[..end])
        .map_err(|e| XclbinError::MalformedMetadata(format!("metadata is not UTF-8: {}", e)))?;

    let doc = Document::parse(text)
        .map_err(|e| XclbinError::MalformedMetadata(format!("invalid XML: {}", e)))?;

    let project = doc.root_element();
    if !project.has_tag_name("project") {
        return Err(XclbinError::MalformedMetadata(format!(
            "expected root element <project>, found <{}>",
            project.tag_name().name()
        )));
    }

    let core = child(project, "platform")
        .and_then(|platform| child(platform, "device"))
        .and_then(|device| child(device, "core"))
        .ok_or_else(|| {
            XclbinError::MalformedMetadata(
                "missing project/platform/device/core element".to_string(),
            )
        })?;

    let mut metadata = KernelMetadata {
        target: core.attribute("target").map(str::to_string),
        ..Default::default()
    };

    for xml_kernel in children(core, "kernel") {
        let name = xml_kernel.attribute("name").ok_or_else(|| {
            XclbinError::MalformedMetadata("kernel element without a name".to_string())
        })?;

        let arg_offset = metadata.args.len();
        for xml_arg in children(xml_kernel, "arg") {
            let index = metadata.args.len();
            let arg = parse_arg(xml_arg, index, &mut metadata.warnings);
            metadata.args.push(arg);
        }

        let arg_count = metadata.args.len() - arg_offset;
        tracing::debug!(
            "Kernel '{}' declares {} argument(s) at offset {}",
            name,
            arg_count,
            arg_offset
        );
        metadata.kernels.push(KernelInfo {
            name: name.to_string(),
            arg_offset,
            arg_count,
        });
    }

    if metadata.kernels.is_empty() {
        return Err(XclbinError::MissingMetadata(
            "metadata declares no kernel".to_string(),
        ));
    }

    Ok(metadata)
}

fn parse_arg(xml_arg: Node<'_, '_>, index: usize, warnings: &mut Vec<ParseWarning>) -> ArgInfo {
    let name = xml_arg.attribute("name").unwrap_or_default().to_string();
    let ty = xml_arg.attribute("type").unwrap_or_default().to_string();

    let code = xml_arg.attribute("addressQualifier").unwrap_or_default();
    let category = match code.trim().parse::<i64>().ok().and_then(ArgCategory::from_address_qualifier) {
        Some(category) => category,
        None => {
            tracing::warn!(
                "Unknown argument category {:?} for argument {} ('{}')",
                code,
                index,
                name
            );
            warnings.push(ParseWarning::UnrecognizedArgumentCategory {
                arg_index: index,
                code: code.to_string(),
            });
            ArgCategory::Unspecified
        }
    };

    if let Some(id) = xml_arg.attribute("id") {
        tracing::trace!("Argument '{}' (id={}) mapped to table index {}", name, id, index);
    }

    ArgInfo {
        index,
        name,
        ty,
        category,
        tag: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VADD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<project name="vadd">
  <platform vendor="xilinx" boardid="u250" name="xdma">
    <device name="fpga0" fpgaDevice="virtexuplus">
      <core name="OCL_REGION_0" target="hw">
        <kernel name="vadd" language="c">
          <arg name="a" addressQualifier="1" id="0" type="int*"/>
          <arg name="b" addressQualifier="1" id="1" type="int*"/>
          <arg name="n" addressQualifier="0" id="2" type="unsigned int"/>
        </kernel>
      </core>
    </device>
  </platform>
</project>
"#;

    #[test]
    fn test_parse_single_kernel() {
        let metadata = parse_kernel_metadata(VADD.as_bytes()).unwrap();
        assert_eq!(metadata.target.as_deref(), Some("hw"));
        assert_eq!(metadata.kernels.len(), 1);
        assert_eq!(metadata.kernels[0].name, "vadd");
        assert_eq!(metadata.args.len(), 3);
        assert_eq!(metadata.args[0].category, ArgCategory::MemoryMapped);
        assert_eq!(metadata.args[2].category, ArgCategory::Scalar);
        assert_eq!(metadata.args[2].ty, "unsigned int");
        assert!(metadata.warnings.is_empty());
    }

    #[test]
    fn test_trailing_nul_padding_ignored() {
        let mut payload = VADD.as_bytes().to_vec();
        payload.extend_from_slice(&[0, 0, 0, 0]);
        assert!(parse_kernel_metadata(&payload).is_ok());
    }

    #[test]
    fn test_unknown_address_qualifier_is_warning() {
        let xml = r#"<project><platform><device><core>
            <kernel name="k"><arg name="x" addressQualifier="2" id="0" type="int"/></kernel>
        </core></device></platform></project>"#;
        let metadata = parse_kernel_metadata(xml.as_bytes()).unwrap();
        assert_eq!(metadata.args[0].category, ArgCategory::Unspecified);
        assert_eq!(metadata.target, None);
        assert_eq!(
            metadata.warnings,
            vec![ParseWarning::UnrecognizedArgumentCategory {
                arg_index: 0,
                code: "2".to_string()
            }]
        );
    }

    #[test]
    fn test_missing_core_is_malformed() {
        let xml = "<project><platform><device/></platform></project>";
        assert!(matches!(
            parse_kernel_metadata(xml.as_bytes()),
            Err(XclbinError::MalformedMetadata(_))
        ));
    }

    #[test]
    fn test_no_kernel_is_missing_metadata() {
        let xml = "<project><platform><device><core target=\"hw\"/></device></platform></project>";
        assert!(matches!(
            parse_kernel_metadata(xml.as_bytes()),
            Err(XclbinError::MissingMetadata(_))
        ));
    }

    #[test]
    fn test_invalid_xml() {
        assert!(matches!(
            parse_kernel_metadata(b"<project><platform>"),
            Err(XclbinError::MalformedMetadata(_))
        ));
    }
}
