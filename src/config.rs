use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::analysis::ExplorerConfig;
use crate::relaxed::Weights;

/// Which phases run and how they are bounded.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct AnalysisConfig {
    #[serde(default = "default_true")]
    pub explicit: bool,
    #[serde(default)]
    pub state_limit: Option<usize>,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default = "default_true")]
    pub symbolic: bool,
    #[serde(default = "default_true")]
    pub deadlock: bool,
    #[serde(default = "default_true")]
    pub optimize: bool,
    #[serde(default)]
    pub weights: Weights,
    #[serde(default)]
    pub max_cuts: Option<usize>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            explicit: default_true(),
            state_limit: None,
            parallel: false,
            symbolic: default_true(),
            deadlock: default_true(),
            optimize: default_true(),
            weights: Weights::default(),
            max_cuts: None,
        }
    }
}

impl AnalysisConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AnalysisConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }

    pub fn explorer(&self) -> ExplorerConfig {
        ExplorerConfig {
            state_limit: self.state_limit,
            parallel: self.parallel,
        }
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AnalysisConfig::load_from_file(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AnalysisConfig::default());
        assert!(config.explicit && config.symbolic && config.deadlock && config.optimize);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pn.toml");
        fs::write(
            &path,
            r#"
explicit = false
state_limit = 1000
max_cuts = 64

[weights]
default = 0

[weights.places]
P3 = 4
"#,
        )
        .unwrap();

        let config = AnalysisConfig::load_from_file(&path).unwrap();
        assert!(!config.explicit);
        assert!(config.symbolic);
        assert_eq!(config.explorer().state_limit, Some(1000));
        assert_eq!(config.max_cuts, Some(64));
        assert_eq!(config.weights, Weights::uniform(0).with("P3", 4));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pn.toml");
        fs::write(&path, "explicit = \"maybe\"").unwrap();

        let err = AnalysisConfig::load_from_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config file"));
    }
}
