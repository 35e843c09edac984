//! File-based settings. Every field has a default matching the original
//! project spreadsheet, so an empty (or absent) config file is valid.
//!
//! ```toml
//! [source]
//! path = "data/projects.xlsx"
//! sheet = "Final"
//! header_row = 1
//!
//! [source.columns]
//! total_units = "Total Units"
//!
//! [pipeline]
//! launch_after = "2022-10-01"
//! top_n = 20
//!
//! [pipeline.asset_synonyms]
//! "Row House" = "Villa"
//! ```
use crate::error::Result;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub pipeline: PipelineSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub path: Option<PathBuf>,
    /// Workbook sheet; the first sheet when unset. Ignored for CSV.
    pub sheet: Option<String>,
    /// Number of lines above the header line.
    pub header_row: usize,
    pub columns: ColumnMap,
}

/// Source column name for each schema field.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ColumnMap {
    pub launch_date: String,
    pub handover_date: String,
    pub developer_name: String,
    pub area: String,
    pub asset_type: String,
    pub configuration: String,
    pub total_units: String,
    pub project_area_acres: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        ColumnMap {
            launch_date: "Launch Date".to_string(),
            handover_date: "Handover date".to_string(),
            developer_name: "Developer Name".to_string(),
            area: "Area".to_string(),
            asset_type: "Asset Type".to_string(),
            configuration: "BHK".to_string(),
            total_units: "Total no. of units".to_string(),
            project_area_acres: "Project Area (Acres)".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Only projects launched strictly after this date are considered.
    pub launch_after: Option<NaiveDate>,
    /// Group count kept by ranked (dominance) views.
    pub top_n: usize,
    /// Extra asset-type spellings, title-cased key to canonical name.
    pub asset_synonyms: BTreeMap<String, String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        PipelineSettings {
            launch_after: NaiveDate::from_ymd_opt(2022, 10, 1),
            top_n: 20,
            asset_synonyms: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let cfg = Config::from_toml_str("").unwrap();
        assert_eq!(cfg.source.header_row, 0);
        assert_eq!(cfg.source.columns.configuration, "BHK");
        assert_eq!(cfg.pipeline.top_n, 20);
        assert_eq!(
            cfg.pipeline.launch_after,
            NaiveDate::from_ymd_opt(2022, 10, 1)
        );
    }

    #[test]
    fn partial_overrides() {
        let cfg = Config::from_toml_str(
            r#"
            [source]
            sheet = "Final"
            header_row = 1

            [source.columns]
            total_units = "Units"

            [pipeline]
            launch_after = "2023-01-01"
            top_n = 5

            [pipeline.asset_synonyms]
            "Row House" = "Villa"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.source.sheet.as_deref(), Some("Final"));
        assert_eq!(cfg.source.header_row, 1);
        assert_eq!(cfg.source.columns.total_units, "Units");
        assert_eq!(cfg.source.columns.area, "Area");
        assert_eq!(cfg.pipeline.top_n, 5);
        assert_eq!(cfg.pipeline.launch_after, NaiveDate::from_ymd_opt(2023, 1, 1));
        assert_eq!(cfg.pipeline.asset_synonyms["Row House"], "Villa");
    }

    #[test]
    fn malformed_config_is_an_error() {
        assert!(Config::from_toml_str("[source]\nheader_row = \"one\"").is_err());
    }
}
