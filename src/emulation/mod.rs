//! Emulation bootstrap
//!
//! Before a container can be bound in hardware or software emulation, the
//! vendor emulator needs an `emconfig.json` describing the target device and
//! a few environment variables. [`EmconfigBootstrap`] validates the file,
//! runs `emconfigutil` when the device is missing from it, and exports the
//! variables the caller has not set already.

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;
use thiserror::Error;

use crate::config::RuntimeConfig;

pub const EMCONFIG_FILE: &str = "emconfig.json";
pub const EMCONFIGUTIL: &str = "emconfigutil";

#[derive(Error, Debug)]
pub enum EmulationError {
    #[error("Failed to create {path}: {source}")]
    WorkDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to run {tool}: {source}")]
    ToolNotFound {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} failed with {status}")]
    ToolFailed { tool: String, status: String },
    #[error("{path} does not list device '{device}'")]
    DeviceMissing { path: PathBuf, device: String },
}

/// Prepares the process for binding a device in emulation
pub trait EmulationBootstrap {
    fn prepare(&self, config: &RuntimeConfig, device: &str) -> Result<(), EmulationError>;
}

/// No preparation; used with the simulated accelerator and on hardware
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEmulation;

impl EmulationBootstrap for NoEmulation {
    fn prepare(&self, _config: &RuntimeConfig, _device: &str) -> Result<(), EmulationError> {
        Ok(())
    }
}

/// `emconfigutil`-based bootstrap
#[derive(Debug, Clone)]
pub struct EmconfigBootstrap {
    tool: PathBuf,
    export_environment: bool,
}

impl Default for EmconfigBootstrap {
    fn default() -> Self {
        EmconfigBootstrap {
            tool: PathBuf::from(EMCONFIGUTIL),
            export_environment: true,
        }
    }
}

impl EmconfigBootstrap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `emconfigutil` from the configured toolchain root when present
    pub fn for_config(config: &RuntimeConfig) -> Self {
        let mut bootstrap = Self::default();
        if let Some(root) = &config.toolchain_root {
            let candidate = root.join("bin").join(EMCONFIGUTIL);
            if candidate.exists() {
                bootstrap.tool = candidate;
            }
        }
        bootstrap
    }

    pub fn with_tool(mut self, tool: impl Into<PathBuf>) -> Self {
        self.tool = tool.into();
        self
    }

    /// Skip exporting variables into the process environment
    pub fn with_export_environment(mut self, export: bool) -> Self {
        self.export_environment = export;
        self
    }

    pub fn tool(&self) -> &Path {
        &self.tool
    }

    fn run_tool(&self, device: &str, out_dir: &Path) -> Result<(), EmulationError> {
        let tool = self.tool.display().to_string();
        tracing::info!("Running {} --platform {} --od {}", tool, device, out_dir.display());

        let output = Command::new(&self.tool)
            .arg("--platform")
            .arg(device)
            .arg("--od")
            .arg(out_dir)
            .output()
            .map_err(|source| EmulationError::ToolNotFound {
                tool: tool.clone(),
                source,
            })?;

        if !output.status.success() {
            tracing::error!(
                "{} failed: {}",
                tool,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Err(EmulationError::ToolFailed {
                tool,
                status: output.status.to_string(),
            });
        }
        Ok(())
    }
}

impl EmulationBootstrap for EmconfigBootstrap {
    fn prepare(&self, config: &RuntimeConfig, device: &str) -> Result<(), EmulationError> {
        let Some(mode) = config.emulation_mode else {
            return Ok(());
        };
        tracing::info!("Preparing {} emulation for {}", mode, device);

        for dir in [config.work_dir(), config.em_run_dir()] {
            create_dir(&dir)?;
        }
        let emconfig_dir = config.emconfig_dir_for(device);
        create_dir(&emconfig_dir)?;

        let emconfig = emconfig_dir.join(EMCONFIG_FILE);
        if emconfig_lists_device(&emconfig, device) {
            tracing::debug!("{} already lists {}", emconfig.display(), device);
        } else {
            self.run_tool(device, &emconfig_dir)?;
            if !emconfig_lists_device(&emconfig, device) {
                return Err(EmulationError::DeviceMissing {
                    path: emconfig,
                    device: device.to_string(),
                });
            }
        }

        if self.export_environment {
            export_missing(&config.emulation_environment(device));
        }
        Ok(())
    }
}

fn create_dir(path: &Path) -> Result<(), EmulationError> {
    std::fs::create_dir_all(path).map_err(|source| EmulationError::WorkDir {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Deserialize)]
struct Emconfig {
    #[serde(rename = "Platform")]
    platform: EmconfigPlatform,
}

#[derive(Debug, Deserialize)]
struct EmconfigPlatform {
    #[serde(rename = "Boards", default)]
    boards: Vec<EmconfigBoard>,
}

#[derive(Debug, Deserialize)]
struct EmconfigBoard {
    #[serde(rename = "Devices", default)]
    devices: Vec<EmconfigDevice>,
}

#[derive(Debug, Deserialize)]
struct EmconfigDevice {
    #[serde(rename = "Name")]
    name: String,
}

/// Whether `path` is an emconfig file listing `device`
///
/// A missing or unreadable file counts as not listing it.
pub fn emconfig_lists_device(path: &Path, device: &str) -> bool {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(_) => return false,
    };
    match serde_json::from_str::<Emconfig>(&text) {
        Ok(emconfig) => emconfig
            .platform
            .boards
            .iter()
            .flat_map(|b| &b.devices)
            .any(|d| d.name == device),
        Err(e) => {
            tracing::warn!("Ignoring malformed {}: {}", path.display(), e);
            false
        }
    }
}

/// Set each variable that is not already present in the environment
pub fn export_missing(vars: &[(String, String)]) {
    for (key, value) in vars {
        if std::env::var_os(key).is_none() {
            tracing::debug!("export {}={}", key, value);
            std::env::set_var(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmulationMode;
    use serial_test::serial;

    const DEVICE: &str = "xilinx_u250_xdma_201830_2";

    fn emconfig_json(device: &str) -> String {
        format!(
            r#"{{"Platform":{{"Boards":[{{"Devices":[{{"Name":"{}","NumComputeUnits":60}}]}}]}}}}"#,
            device
        )
    }

    fn emu_config(tmp: &Path) -> RuntimeConfig {
        RuntimeConfig::new()
            .with_tmp_dir(tmp.to_path_buf())
            .with_user_id("1000")
            .with_emulation_mode(Some(EmulationMode::Software))
    }

    #[test]
    fn test_emconfig_lists_device() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(EMCONFIG_FILE);
        assert!(!emconfig_lists_device(&path, DEVICE));

        std::fs::write(&path, emconfig_json(DEVICE)).unwrap();
        assert!(emconfig_lists_device(&path, DEVICE));
        assert!(!emconfig_lists_device(&path, "other"));

        std::fs::write(&path, "{ not json").unwrap();
        assert!(!emconfig_lists_device(&path, DEVICE));
    }

    #[test]
    fn test_hardware_needs_nothing() {
        let config = RuntimeConfig::new().with_tmp_dir(PathBuf::from("/nonexistent"));
        let bootstrap = EmconfigBootstrap::new().with_tool("/nonexistent/emconfigutil");
        assert!(bootstrap.prepare(&config, DEVICE).is_ok());
    }

    #[test]
    fn test_valid_emconfig_skips_tool() {
        let tmp = tempfile::tempdir().unwrap();
        let config = emu_config(tmp.path());
        let dir = config.emconfig_dir_for(DEVICE);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(EMCONFIG_FILE), emconfig_json(DEVICE)).unwrap();

        let bootstrap = EmconfigBootstrap::new()
            .with_tool("/nonexistent/emconfigutil")
            .with_export_environment(false);
        bootstrap.prepare(&config, DEVICE).unwrap();
        assert!(config.work_dir().is_dir());
    }

    #[test]
    fn test_missing_tool_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let bootstrap = EmconfigBootstrap::new()
            .with_tool("/nonexistent/emconfigutil")
            .with_export_environment(false);
        let err = bootstrap.prepare(&emu_config(tmp.path()), DEVICE).unwrap_err();
        assert!(matches!(err, EmulationError::ToolNotFound { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_tool_generates_emconfig() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let script = tmp.path().join("fake-emconfigutil");
        std::fs::write(
            &script,
            "#!/bin/sh\n# invoked as: --platform <device> --od <dir>\n\
             printf '{\"Platform\":{\"Boards\":[{\"Devices\":[{\"Name\":\"%s\"}]}]}}' \"$2\" > \"$4/emconfig.json\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let config = emu_config(tmp.path());
        let bootstrap = EmconfigBootstrap::new()
            .with_tool(&script)
            .with_export_environment(false);
        bootstrap.prepare(&config, DEVICE).unwrap();
        assert!(emconfig_lists_device(
            &config.emconfig_dir_for(DEVICE).join(EMCONFIG_FILE),
            DEVICE
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_tool_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let bootstrap = EmconfigBootstrap::new()
            .with_tool("false")
            .with_export_environment(false);
        let err = bootstrap.prepare(&emu_config(tmp.path()), DEVICE).unwrap_err();
        assert!(matches!(err, EmulationError::ToolFailed { .. }));
    }

    #[test]
    #[serial]
    fn test_export_missing_keeps_existing_values() {
        let key_set = "FPGAFORGE_TEST_EXPORT_SET";
        let key_new = "FPGAFORGE_TEST_EXPORT_NEW";
        std::env::set_var(key_set, "caller");
        std::env::remove_var(key_new);

        export_missing(&[
            (key_set.to_string(), "bootstrap".to_string()),
            (key_new.to_string(), "bootstrap".to_string()),
        ]);
        assert_eq!(std::env::var(key_set).unwrap(), "caller");
        assert_eq!(std::env::var(key_new).unwrap(), "bootstrap");

        std::env::remove_var(key_set);
        std::env::remove_var(key_new);
    }
}
