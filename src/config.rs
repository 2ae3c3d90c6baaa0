/// Scan configuration
///
/// Layered with the `config` crate: built-in defaults, then a TOML file
/// (an explicit path, or `sedscan.toml` in the platform config directory),
/// then `SEDSCAN_*` environment variables.
use crate::DiscoveryResult;
use ::config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "SEDSCAN";
pub const CONFIG_FILE_NAME: &str = "sedscan.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Query ATA/NVMe identify data when the device advertises SMART support.
    pub identify_fallback: bool,
    /// Registry class enumerated as candidate devices.
    pub device_class: String,
    /// Registry class of the media object below each device.
    pub media_class: String,
    /// Registry class of the vendor security-subsystem (TPer) driver.
    pub driver_class: String,
    /// Upper bound, in bytes, for reference and display names.
    pub max_name_len: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            identify_fallback: false,
            device_class: "IOBlockStorageDevice".to_string(),
            media_class: "IOMedia".to_string(),
            driver_class: "com_brightplaza_BPTperDriver".to_string(),
            max_name_len: 128,
        }
    }
}

impl ScanConfig {
    /// Load defaults, the config file and the environment.
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> DiscoveryResult<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        match path {
            Some(path) => {
                builder = builder.add_source(File::from(path.to_path_buf()).required(true));
            }
            None => {
                if let Some(default_path) = Self::default_path() {
                    builder = builder.add_source(File::from(default_path).required(false));
                }
            }
        }

        let config = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let loaded: ScanConfig = config.try_deserialize()?;
        tracing::debug!(?loaded, "Scan configuration loaded");
        Ok(loaded)
    }

    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("io", "sedscan", "sedscan")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }
}
