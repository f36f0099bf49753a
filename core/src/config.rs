use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;


/// Tunables for an observed tree.
///
/// Every field has a default, so an empty document is a valid config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TreeConfig {
    /// Deepest path (in keys) at which a composite may be stored.
    pub max_depth: usize,
    /// Report a one-line summary of every mutation through the logger.
    pub trace_mutations: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        TreeConfig {
            max_depth: 128,
            trace_mutations: false,
        }
    }
}

impl TreeConfig {
    /// Load from a file. `.json` files are read as JSON, anything else as YAML.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        // serde_yaml reads an empty document as null, not as an empty map
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: TreeConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: TreeConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth == 0 {
            return Err(ConfigError::Invalid("max_depth must be at least 1".into()));
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = TreeConfig::default();
        assert_eq!(config.max_depth, 128);
        assert!(!config.trace_mutations);
    }

    #[test]
    fn empty_yaml_gives_defaults() {
        assert_eq!(TreeConfig::from_yaml_str("").unwrap(), TreeConfig::default());
        assert_eq!(TreeConfig::from_yaml_str("\n  \n").unwrap(), TreeConfig::default());
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let config = TreeConfig::from_yaml_str("trace_mutations: true\n").unwrap();
        assert!(config.trace_mutations);
        assert_eq!(config.max_depth, 128);
    }

    #[test]
    fn json_config() {
        let config = TreeConfig::from_json_str(r#"{"max_depth": 8}"#).unwrap();
        assert_eq!(config.max_depth, 8);
    }

    #[test]
    fn zero_depth_rejected() {
        assert!(matches!(
            TreeConfig::from_yaml_str("max_depth: 0"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn malformed_yaml_rejected() {
        assert!(matches!(
            TreeConfig::from_yaml_str("max_depth: [nope"),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn load_from_file_by_extension() {
        let dir = std::env::temp_dir().join("treewatch-config-test");
        let _ = std::fs::create_dir_all(&dir);

        let yaml = dir.join("tree.yaml");
        std::fs::write(&yaml, "max_depth: 4\n").unwrap();
        assert_eq!(TreeConfig::load(&yaml).unwrap().max_depth, 4);

        let json = dir.join("tree.json");
        std::fs::write(&json, r#"{"trace_mutations": true}"#).unwrap();
        assert!(TreeConfig::load(&json).unwrap().trace_mutations);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = TreeConfig::load(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
