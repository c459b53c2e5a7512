mod defaults;
mod env;
pub mod types;
mod validation;

use std::path::Path;

pub use env::interpolate_env;
pub use types::*;
pub use validation::{MAX_IN_FLIGHT, MAX_RATE};

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Missing environment variables: {0:?}")]
    MissingEnvVars(Vec<String>),

    #[error("Invalid value in environment variable {0}: {1}")]
    InvalidEnvVar(String, String),

    #[error("Invalid value for '{0}': {1}")]
    InvalidValue(String, String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl LoadConfig {
    /// Parse a configuration from a YAML string.
    /// Environment variables in the format `${VAR_NAME}` will be interpolated.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let interpolated = env::interpolate_env(yaml)?;

        // An empty document means "all defaults"
        if interpolated.trim().is_empty() {
            return Ok(LoadConfig::default());
        }

        let config: LoadConfig = serde_yaml::from_str(&interpolated)?;
        Ok(config)
    }

    /// Load a configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_parse_minimal_config() {
        let yaml = r#"
rate: 30
window: 300
"#;

        let config = LoadConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.rate, 30);
        assert_eq!(config.window, 300);
        assert_eq!(config.keyspace, 1000);
        assert_eq!(config.timeout.as_duration(), Duration::from_secs(1));
        assert_eq!(config.store.kind, "memory");
    }

    #[test]
    fn test_parse_empty_document() {
        let config = LoadConfig::from_yaml("").unwrap();
        assert_eq!(config, LoadConfig::default());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
rate: 10
window: 100
timeout: 750ms
keyspace: 500
max_in_flight: 64
workload: versioned
check: true
scan_pause: 50ms
store:
  kind: cassandra
  endpoint: cass.svc.cluster.local:9042
  user: cassandra
  password: hunter2
  params:
    keyspace: test
    consistency: quorum
"#;

        let config = LoadConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.timeout.as_duration(), Duration::from_millis(750));
        assert_eq!(config.scan_pause.as_duration(), Duration::from_millis(50));
        assert_eq!(config.max_in_flight, 64);
        assert_eq!(config.store.kind, "cassandra");
        assert_eq!(config.store.params.get("consistency").map(String::as_str), Some("quorum"));
        let keys: Vec<_> = config.store.params.keys().cloned().collect();
        assert_eq!(keys, vec!["keyspace", "consistency"]);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_parse_with_env_vars() {
        std::env::set_var("LAGCHECK_TEST_MONGO_PASSWORD", "s3cret");

        let yaml = r#"
store:
  kind: mongodb
  user: root
  password: ${LAGCHECK_TEST_MONGO_PASSWORD}
"#;

        let config = LoadConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.store.password.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_parse_rejects_bad_duration() {
        let result = LoadConfig::from_yaml("timeout: soon\n");
        assert!(matches!(result, Err(ConfigError::YamlError(_))));
    }

    #[test]
    fn test_parse_rejects_overflowing_duration() {
        let result = LoadConfig::from_yaml("timeout: 300000000000000d\n");
        assert!(matches!(result, Err(ConfigError::YamlError(_))));
    }

    #[test]
    fn test_roundtrip_through_yaml() {
        let config = LoadConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("timeout: 1s"));
        assert_eq!(LoadConfig::from_yaml(&yaml).unwrap(), config);
    }
}
