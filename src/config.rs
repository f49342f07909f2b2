use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::CatalogResult;

pub const DEFAULT_MARKETS: &[&str] = &["台灣", "美國", "中國", "香港"];
pub const DEFAULT_ASPECTS: &[&str] = &["基本面", "技術面", "籌碼面", "消息面"];
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.5;
pub const DEFAULT_MAX_CANDIDATES: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub valid_markets: Vec<String>,
    pub valid_aspects: Vec<String>,
    pub default_market: String,
    pub default_aspect: String,
    pub matching: MatchConfig,
    pub export: ExportConfig,
}

/// Tuning for the fuzzy candidate search of the reconciliation engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Candidates must score strictly above this similarity.
    pub threshold: f64,
    pub max_candidates: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub pretty: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            valid_markets: DEFAULT_MARKETS.iter().map(|s| s.to_string()).collect(),
            valid_aspects: DEFAULT_ASPECTS.iter().map(|s| s.to_string()).collect(),
            default_market: DEFAULT_MARKETS[0].to_string(),
            default_aspect: DEFAULT_ASPECTS[0].to_string(),
            matching: MatchConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_MATCH_THRESHOLD,
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self { pretty: true }
    }
}

impl CatalogConfig {
    pub fn load(path: &Path) -> CatalogResult<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> CatalogResult<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn save(&self, path: &Path) -> CatalogResult<()> {
        let serialized = serde_yaml::to_string(self)?;
        fs::write(path, serialized)?;
        Ok(())
    }

    pub fn is_valid_market(&self, market: &str) -> bool {
        self.valid_markets.iter().any(|m| m == market)
    }

    pub fn is_valid_aspect(&self, aspect: &str) -> bool {
        self.valid_aspects.iter().any(|a| a == aspect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_remaining_defaults() {
        let config = CatalogConfig::from_yaml_str("matching:\n  threshold: 0.7\n").expect("parse");
        assert_eq!(config.matching.threshold, 0.7);
        assert_eq!(config.matching.max_candidates, DEFAULT_MAX_CANDIDATES);
        assert_eq!(config.default_market, "台灣");
        assert!(config.is_valid_aspect("籌碼面"));
    }

    #[test]
    fn empty_yaml_is_default() {
        let config = CatalogConfig::from_yaml_str("  \n").expect("parse");
        assert_eq!(config, CatalogConfig::default());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("catalog.yaml");
        let mut config = CatalogConfig::default();
        config.valid_markets.push("日本".to_string());
        config.matching.max_candidates = 5;
        config.save(&path).expect("save");
        assert_eq!(CatalogConfig::load(&path).expect("load"), config);
    }

    #[test]
    fn unknown_market_is_rejected() {
        let config = CatalogConfig::default();
        assert!(config.is_valid_market("美國"));
        assert!(!config.is_valid_market("日本"));
    }
}
