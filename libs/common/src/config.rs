//! Layered configuration loading
//!
//! Priority (highest to lowest):
//! 1. Environment variables `{PREFIX}_...`, `__` separating nested keys
//! 2. The YAML file
//! 3. `T::default()`

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::error::{ConfigError, Result};

/// Build the figment behind [`load_config`] without extracting it
pub fn layered<T>(path: &Path, env_prefix: &str) -> Figment
where
    T: Serialize + Default,
{
    Figment::from(Serialized::defaults(T::default()))
        .merge(Yaml::file(path))
        .merge(Env::prefixed(&format!("{}_", env_prefix)).split("__"))
}

/// Load `T` from a YAML file layered over its defaults and under the environment
pub fn load_config<T>(path: impl AsRef<Path>, env_prefix: &str) -> Result<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    let path = path.as_ref();
    if !path.is_file() {
        return Err(ConfigError::load(format!(
            "Config file not found: {}",
            path.display()
        )));
    }
    debug!("Loading config {} (env prefix {}_)", path.display(), env_prefix);

    layered::<T>(path, env_prefix)
        .extract()
        .map_err(|e| ConfigError::load(format!("Failed to load {}: {}", path.display(), e)))
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::logging::LogConfig;
    use serde::Deserialize;
    use std::io::Write;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Settings {
        name: String,
        port: u16,
        log: LogConfig,
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                name: "flow".to_string(),
                port: 502,
                log: LogConfig::default(),
            }
        }
    }

    fn write_yaml(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_file_over_defaults() {
        let file = write_yaml("name: plant\nlog:\n  json: true\n");
        let settings: Settings = load_config(file.path(), "PFCOMMON_FILE").unwrap();
        assert_eq!(settings.name, "plant");
        assert_eq!(settings.port, 502);
        assert!(settings.log.json);
        assert_eq!(settings.log.level, "info");
    }

    #[test]
    fn test_env_over_file() {
        let file = write_yaml("port: 1502\nlog:\n  level: warn\n");
        std::env::set_var("PFCOMMON_ENV_PORT", "5020");
        std::env::set_var("PFCOMMON_ENV_LOG__LEVEL", "debug");

        let settings: Settings = load_config(file.path(), "PFCOMMON_ENV").unwrap();
        assert_eq!(settings.port, 5020);
        assert_eq!(settings.log.level, "debug");

        std::env::remove_var("PFCOMMON_ENV_PORT");
        std::env::remove_var("PFCOMMON_ENV_LOG__LEVEL");
    }

    #[test]
    fn test_missing_and_invalid_files() {
        let result: Result<Settings> = load_config("/nonexistent/pointflow.yaml", "PFCOMMON_BAD");
        assert!(matches!(result, Err(ConfigError::Load(_))));

        let file = write_yaml("port: not-a-port\n");
        let result: Result<Settings> = load_config(file.path(), "PFCOMMON_BAD");
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }
}
