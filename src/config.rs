//! Dashboard Configuration
//! Site definitions, file-matching rules and column labels, loaded from JSON.

use crate::data::normalize_nfc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Placeholder replaced by the site name in file patterns.
pub const SITE_PLACEHOLDER: &str = "{site}";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// How a target string is compared against candidate names after NFC normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Normalized names must be equal
    #[default]
    Exact,
    /// Normalized target must occur inside the normalized candidate
    Contains,
}

/// One experimental site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub name: String,
    pub target_ec: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Site {
    pub fn new(name: &str, target_ec: f64, color: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            target_ec,
            color: color.map(str::to_string),
        }
    }

    /// Name in NFC form, used as the collection key.
    pub fn key(&self) -> String {
        normalize_nfc(&self.name)
    }

    /// Parse `#rrggbb` into RGB components.
    pub fn rgb(&self) -> Option<[u8; 3]> {
        self.color.as_deref().and_then(parse_hex_color)
    }
}

fn parse_hex_color(s: &str) -> Option<[u8; 3]> {
    let hex = s.strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

/// Where the per-site environment CSV files come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentSource {
    /// File name or keyword; `{site}` is replaced by the site name
    pub pattern: String,
    pub match_mode: MatchMode,
}

impl Default for EnvironmentSource {
    fn default() -> Self {
        Self {
            pattern: "{site}_환경데이터.csv".to_string(),
            match_mode: MatchMode::Exact,
        }
    }
}

/// Where the growth-result workbook comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkbookSource {
    pub name: String,
    pub match_mode: MatchMode,
}

impl Default for WorkbookSource {
    fn default() -> Self {
        Self {
            name: "4개교_생육결과데이터.xlsx".to_string(),
            match_mode: MatchMode::Exact,
        }
    }
}

/// Column labels of the growth sheets, and the labels stamped onto every row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrowthColumns {
    pub fresh_weight: String,
    pub leaf_count: String,
    pub shoot_length: String,
    pub root_length: String,
    pub site: String,
    pub target_ec: String,
}

impl Default for GrowthColumns {
    fn default() -> Self {
        Self {
            fresh_weight: "생중량(g)".to_string(),
            leaf_count: "잎 수(장)".to_string(),
            shoot_length: "지상부 길이(mm)".to_string(),
            root_length: "지하부길이(mm)".to_string(),
            site: "학교".to_string(),
            target_ec: "설정EC".to_string(),
        }
    }
}

/// Font used for Hangul labels. Unset fields fall back to a search over
/// common Korean system fonts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontSettings {
    /// `.ttf`/`.otf`/`.ttc` file loaded into the dashboard
    pub path: Option<PathBuf>,
    /// System family name tried first, for the dashboard and chart images
    pub family: Option<String>,
}

/// Complete dashboard configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub data_dir: PathBuf,
    pub sites: Vec<Site>,
    pub environment: EnvironmentSource,
    pub workbook: WorkbookSource,
    pub growth_columns: GrowthColumns,
    pub export_file_name: String,
    pub fonts: FontSettings,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            sites: vec![
                Site::new("동산고", 1.0, Some("#636efa")),
                Site::new("송도고", 2.0, Some("#ef553b")),
                Site::new("아라고", 8.0, Some("#00cc96")),
                Site::new("하늘고", 4.0, Some("#ab63fa")),
            ],
            environment: EnvironmentSource::default(),
            workbook: WorkbookSource::default(),
            growth_columns: GrowthColumns::default(),
            export_file_name: "극지식물_생육분석_결과.xlsx".to_string(),
            fonts: FontSettings::default(),
        }
    }
}

impl DashboardConfig {
    /// Load and validate a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sites.is_empty() {
            return Err(ConfigError::Invalid("at least one site is required".into()));
        }

        let mut seen = HashSet::new();
        for site in &self.sites {
            if site.name.trim().is_empty() {
                return Err(ConfigError::Invalid("site name must not be empty".into()));
            }
            if !seen.insert(site.key()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate site name '{}'",
                    site.name
                )));
            }
            if !site.target_ec.is_finite() || site.target_ec <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "site '{}' needs a positive target EC, got {}",
                    site.name, site.target_ec
                )));
            }
            if site.color.is_some() && site.rgb().is_none() {
                return Err(ConfigError::Invalid(format!(
                    "site '{}' has color {:?}, expected #rrggbb",
                    site.name, site.color
                )));
            }
        }

        if self.environment.pattern.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "environment file pattern must not be empty".into(),
            ));
        }
        if self.workbook.name.trim().is_empty() {
            return Err(ConfigError::Invalid("workbook name must not be empty".into()));
        }
        if self.growth_columns.fresh_weight.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "fresh weight column label must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Look a site up by name, ignoring normalization differences.
    pub fn site(&self, name: &str) -> Option<&Site> {
        let key = normalize_nfc(name);
        self.sites.iter().find(|s| s.key() == key)
    }

    /// Keyword handed to the locator for a site's environment file.
    pub fn environment_keyword(&self, site: &Site) -> String {
        self.environment.pattern.replace(SITE_PLACEHOLDER, &site.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = DashboardConfig::default();
        config.validate().unwrap();
        assert_eq!(config.sites.len(), 4);
        assert_eq!(config.fonts, FontSettings::default());
        assert_eq!(config.site("아라고").unwrap().target_ec, 8.0);
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let json = r#"{ "data_dir": "/srv/farm", "environment": { "pattern": "{site}", "match_mode": "contains" } }"#;
        let config: DashboardConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/farm"));
        assert_eq!(config.environment.match_mode, MatchMode::Contains);
        assert_eq!(config.workbook, WorkbookSource::default());
        assert_eq!(config.sites.len(), 4);

        let json = r#"{ "fonts": { "path": "/usr/share/fonts/NanumGothic.ttf" } }"#;
        let config: DashboardConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.fonts.path, Some(PathBuf::from("/usr/share/fonts/NanumGothic.ttf")));
        assert_eq!(config.fonts.family, None);
    }

    #[test]
    fn test_environment_keyword() {
        let config = DashboardConfig::default();
        let site = config.site("송도고").unwrap();
        assert_eq!(config.environment_keyword(site), "송도고_환경데이터.csv");
    }

    #[test]
    fn test_site_lookup_ignores_normalization() {
        let config = DashboardConfig::default();
        let decomposed: String = unicode_normalization::UnicodeNormalization::nfd("하늘고").collect();
        assert_ne!(decomposed, "하늘고");
        assert_eq!(config.site(&decomposed).unwrap().name, "하늘고");
    }

    #[test]
    fn test_rejects_duplicate_sites() {
        let mut config = DashboardConfig::default();
        config.sites.push(Site::new("동산고", 3.0, None));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_non_positive_target() {
        let mut config = DashboardConfig::default();
        config.sites[0].target_ec = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_color_parsing() {
        let site = Site::new("a", 1.0, Some("#ff8000"));
        assert_eq!(site.rgb(), Some([255, 128, 0]));
        assert_eq!(Site::new("b", 1.0, Some("orange")).rgb(), None);
        assert_eq!(Site::new("c", 1.0, None).rgb(), None);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dashboard.json");
        std::fs::write(
            &path,
            r#"{ "sites": [ { "name": "north", "target_ec": 1.5 } ] }"#,
        )
        .unwrap();
        let config = DashboardConfig::load(&path).unwrap();
        assert_eq!(config.sites, vec![Site::new("north", 1.5, None)]);

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            DashboardConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
