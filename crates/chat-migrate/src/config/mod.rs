//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_yaml_applies_defaults() {
        let yaml = r#"
source:
  uri: mongodb://localhost:27017
  database: quckapp
postgres:
  host: localhost
  database: quckapp
  user: quckapp
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.source.read_batch_size, 1000);
        assert_eq!(config.migration.batch_size, 500);
        assert_eq!(config.migration.progress_interval, 500);
        assert!(!config.migration.verify);

        let pg = config.postgres.unwrap();
        assert_eq!(pg.port, 5432);
        assert_eq!(pg.schema, "messaging");
        assert_eq!(pg.ssl_mode, "disable");
        assert!(config.scylla.is_none());
    }

    #[test]
    fn test_from_yaml_rejects_invalid() {
        let yaml = r#"
source:
  uri: ""
  database: quckapp
"#;
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "source:\n  uri: mongodb://localhost\n  database: quckapp\nmigration:\n  batch_size: 2\n  verify: true\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.migration.batch_size, 2);
        assert!(config.migration.verify);
    }
}
