//! Runtime configuration
//!
//! [`RuntimeConfig`] is read from the process environment once and then
//! passed around by value. Nothing in the parser or the device layer reads
//! or writes environment variables; the only place that exports variables
//! for the vendor runtime is the emulation bootstrap
//! (see [`crate::emulation`]).

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Environment variable selecting the emulation flavour
pub const XCL_EMULATION_MODE: &str = "XCL_EMULATION_MODE";
/// Directory the emulator uses for its `.run` files
pub const SDACCEL_EM_RUN_DIR: &str = "SDACCEL_EM_RUN_DIR";
/// Directory holding `emconfig.json`
pub const EMCONFIG_PATH: &str = "EMCONFIG_PATH";
/// XRT installation root
pub const XILINX_XRT: &str = "XILINX_XRT";

/// Toolchain root variables, in lookup order
pub const TOOLCHAIN_ROOT_VARS: [&str; 4] =
    ["XILINX_VITIS", "XILINX_SDX", "XILINX_HLS", "XILINX_VIVADO"];

/// Emulation flavour of the target device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmulationMode {
    /// RTL simulation (`hw_emu`)
    Hardware,
    /// C simulation (`sw_emu`)
    Software,
}

impl EmulationMode {
    /// Value understood by `XCL_EMULATION_MODE`
    pub fn as_env_value(&self) -> &'static str {
        match self {
            EmulationMode::Hardware => "hw_emu",
            EmulationMode::Software => "sw_emu",
        }
    }
}

impl fmt::Display for EmulationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_env_value())
    }
}

impl FromStr for EmulationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "hw_emu" => Ok(EmulationMode::Hardware),
            "sw_emu" => Ok(EmulationMode::Software),
            other => Err(format!("unknown emulation mode '{}'", other)),
        }
    }
}

/// Immutable configuration of one runtime instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Emulation flavour; `None` targets real hardware
    pub emulation_mode: Option<EmulationMode>,
    /// First of `XILINX_VITIS`, `XILINX_SDX`, `XILINX_HLS`, `XILINX_VIVADO`
    pub toolchain_root: Option<PathBuf>,
    pub xrt_root: Option<PathBuf>,
    /// `$TMPDIR`, `/tmp` when unset
    pub tmp_dir: PathBuf,
    /// Caller-provided `EMCONFIG_PATH`
    pub emconfig_dir: Option<PathBuf>,
    /// Caller-provided `SDACCEL_EM_RUN_DIR`
    pub em_run_dir: Option<PathBuf>,
    /// Effective user id used to name per-user work directories
    pub user_id: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            emulation_mode: None,
            toolchain_root: None,
            xrt_root: None,
            tmp_dir: PathBuf::from("/tmp"),
            emconfig_dir: None,
            em_run_dir: None,
            user_id: "0".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup
    ///
    /// Empty values are treated as unset. An unrecognised
    /// `XCL_EMULATION_MODE` is logged and ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let emulation_mode = get(XCL_EMULATION_MODE).and_then(|v| match v.parse() {
            Ok(mode) => Some(mode),
            Err(e) => {
                tracing::warn!("Ignoring {}: {}", XCL_EMULATION_MODE, e);
                None
            }
        });

        let toolchain_root = TOOLCHAIN_ROOT_VARS
            .iter()
            .find_map(|key| get(key))
            .map(PathBuf::from);

        RuntimeConfig {
            emulation_mode,
            toolchain_root,
            xrt_root: get(XILINX_XRT).map(PathBuf::from),
            tmp_dir: get("TMPDIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/tmp")),
            emconfig_dir: get(EMCONFIG_PATH).map(PathBuf::from),
            em_run_dir: get(SDACCEL_EM_RUN_DIR).map(PathBuf::from),
            user_id: get("FPGAFORGE_UID")
                .or_else(|| get("UID"))
                .or_else(|| get("USER"))
                .unwrap_or_else(|| "0".to_string()),
        }
    }

    /// Set the emulation mode
    pub fn with_emulation_mode(mut self, mode: Option<EmulationMode>) -> Self {
        self.emulation_mode = mode;
        self
    }

    /// Set the toolchain root searched for `emconfigutil`
    pub fn with_toolchain_root(mut self, root: PathBuf) -> Self {
        self.toolchain_root = Some(root);
        self
    }

    /// Set the temp directory
    pub fn with_tmp_dir(mut self, tmp_dir: PathBuf) -> Self {
        self.tmp_dir = tmp_dir;
        self
    }

    /// Set the emconfig directory
    pub fn with_emconfig_dir(mut self, dir: PathBuf) -> Self {
        self.emconfig_dir = Some(dir);
        self
    }

    /// Set the user id
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// Fold in the emulation mode derived from a container
    ///
    /// A mode already present (set by the caller or the environment) wins.
    pub fn with_derived_emulation_mode(mut self, derived: Option<EmulationMode>) -> Self {
        match (self.emulation_mode, derived) {
            (None, Some(mode)) => {
                tracing::debug!("Emulation mode {} derived from container", mode);
                self.emulation_mode = Some(mode);
            }
            (Some(current), Some(mode)) if current != mode => {
                tracing::debug!(
                    "Keeping configured emulation mode {} (container suggests {})",
                    current,
                    mode
                );
            }
            _ => {}
        }
        self
    }

    pub fn is_emulation(&self) -> bool {
        self.emulation_mode.is_some()
    }

    /// Per-user scratch directory: `<tmp>/.fpgaforge.<uid>`
    pub fn work_dir(&self) -> PathBuf {
        self.tmp_dir.join(format!(".fpgaforge.{}", self.user_id))
    }

    /// Directory holding `emconfig.json` for `device`
    pub fn emconfig_dir_for(&self, device: &str) -> PathBuf {
        self.emconfig_dir
            .clone()
            .unwrap_or_else(|| self.work_dir().join(format!("emconfig.{}", device)))
    }

    pub fn em_run_dir(&self) -> PathBuf {
        self.em_run_dir.clone().unwrap_or_else(|| self.work_dir())
    }

    /// Variables the vendor emulator expects for `device`
    ///
    /// Empty when targeting hardware.
    pub fn emulation_environment(&self, device: &str) -> Vec<(String, String)> {
        let Some(mode) = self.emulation_mode else {
            return Vec::new();
        };
        vec![
            (XCL_EMULATION_MODE.to_string(), mode.as_env_value().to_string()),
            (
                SDACCEL_EM_RUN_DIR.to_string(),
                self.em_run_dir().display().to_string(),
            ),
            (
                EMCONFIG_PATH.to_string(),
                self.emconfig_dir_for(device).display().to_string(),
            ),
            ("USER".to_string(), self.user_id.clone()),
        ]
    }
}
