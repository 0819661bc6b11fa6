use crate::error::{BridgeError, BridgeResult};
use crate::handles::{HandleTable, MAX_HANDLE};
use crate::logging;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable prefix, e.g. `INVOKE_BRIDGE_LOG_LEVEL`
pub const ENV_PREFIX: &str = "INVOKE_BRIDGE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Initial logging filter level
    pub log_level: String,
    /// Wrap bound for handle tables created from this configuration
    pub max_handle: i32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            max_handle: MAX_HANDLE,
        }
    }
}

impl BridgeConfig {
    /// Defaults overridden by `INVOKE_BRIDGE_*` environment variables
    pub fn from_env() -> BridgeResult<Self> {
        Self::load_with_prefix(None, ENV_PREFIX)
    }

    /// Defaults, then the TOML file at `path`, then environment variables
    pub fn load_from(path: &Path) -> BridgeResult<Self> {
        Self::load_with_prefix(Some(path), ENV_PREFIX)
    }

    pub fn load_with_prefix(path: Option<&Path>, prefix: &str) -> BridgeResult<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let config: Self = builder
            .add_source(Environment::with_prefix(prefix).try_parsing(true))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> BridgeResult<()> {
        if self.max_handle < 1 {
            return Err(BridgeError::configuration(format!(
                "max_handle must be positive, got {}",
                self.max_handle
            )));
        }
        logging::parse_level(&self.log_level)?;
        Ok(())
    }

    /// Install the callback-backed subscriber at `log_level`
    pub fn init_logging(&self) -> BridgeResult<()> {
        logging::init_logging(&self.log_level)
    }

    /// Empty handle table honouring `max_handle`
    pub fn handle_table<T>(&self) -> HandleTable<T> {
        HandleTable::with_max_handle(self.max_handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = BridgeConfig::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.max_handle, i32::MAX);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "log_level = \"debug\"\nmax_handle = 16").unwrap();

        let config =
            BridgeConfig::load_with_prefix(Some(file.path()), "INVOKE_BRIDGE_TEST_FILE").unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.max_handle, 16);

        let table = config.handle_table::<u8>();
        for i in 0..16 {
            table.add(i);
        }
        assert_eq!(table.len(), 16);
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "log_level = \"debug\"").unwrap();

        std::env::set_var("INVOKE_BRIDGE_TEST_ENV_LOG_LEVEL", "warn");
        let config =
            BridgeConfig::load_with_prefix(Some(file.path()), "INVOKE_BRIDGE_TEST_ENV").unwrap();
        std::env::remove_var("INVOKE_BRIDGE_TEST_ENV_LOG_LEVEL");

        assert_eq!(config.log_level, "warn");
        assert_eq!(config.max_handle, i32::MAX);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "max_handle = 0").unwrap();
        let err = BridgeConfig::load_with_prefix(Some(file.path()), "INVOKE_BRIDGE_TEST_BAD")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let config = BridgeConfig {
            log_level: "shouty".to_string(),
            ..BridgeConfig::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(
            config.init_logging().unwrap_err().kind(),
            ErrorKind::Configuration
        );
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = BridgeConfig::load_with_prefix(
            Some(Path::new("/nonexistent/invoke-bridge.toml")),
            "INVOKE_BRIDGE_TEST_MISSING",
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
