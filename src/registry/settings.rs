use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::dd::ForestConfig;
use crate::error::{Error, Result};

/// Process configuration.
///
/// ```toml
/// [engines]
/// ctl = "SYMBOLIC"
/// proc_generate = "MDD"
///
/// [report]
/// fixpoints = true
///
/// [dd]
/// node_limit = 1000000
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Selected engine per category name.
    pub engines: BTreeMap<String, String>,
    pub report: ReportSettings,
    pub dd: DdSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportSettings {
    /// Log every fixpoint round and completion line.
    pub fixpoints: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DdSettings {
    pub node_limit: usize,
    pub cache_capacity: usize,
}

impl Default for DdSettings {
    fn default() -> Self {
        let config = ForestConfig::default();
        Self {
            node_limit: config.node_limit,
            cache_capacity: config.cache_capacity,
        }
    }
}

impl Settings {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Settings(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Settings(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml(&text)
    }

    /// Selects `engine` for `category`, replacing an earlier selection.
    pub fn select(mut self, category: impl Into<String>, engine: impl Into<String>) -> Self {
        self.engines.insert(category.into(), engine.into());
        self
    }

    pub fn forest_config(&self) -> ForestConfig {
        ForestConfig {
            node_limit: self.dd.node_limit,
            cache_capacity: self.dd.cache_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let settings = Settings::from_toml(
            r#"
            [engines]
            ctl = "SYMBOLIC"

            [report]
            fixpoints = true

            [dd]
            node_limit = 4096
            "#,
        )
        .unwrap();
        assert_eq!(settings.engines.get("ctl").map(String::as_str), Some("SYMBOLIC"));
        assert!(settings.report.fixpoints);
        assert_eq!(settings.forest_config().node_limit, 4096);
        assert_eq!(settings.dd.cache_capacity, ForestConfig::default().cache_capacity);
    }

    #[test]
    fn test_defaults_and_errors() {
        assert_eq!(Settings::from_toml("").unwrap(), Settings::default());
        assert!(matches!(Settings::from_toml("[engine]\nctl = 1"), Err(Error::Settings(_))));
        let s = Settings::default().select("ctl", "EXPLICIT").select("ctl", "SYMBOLIC");
        assert_eq!(s.engines.len(), 1);
        assert_eq!(s.engines["ctl"], "SYMBOLIC");
    }
}
