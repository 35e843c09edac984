use crate::error::PipelineError;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tabled::Tabled;

/// A single source cell, as read from CSV text or a workbook.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl RawCell {
    pub fn is_empty(&self) -> bool {
        matches!(self, RawCell::Empty)
    }

    /// Text rendering used in warnings.
    pub fn display(&self) -> String {
        match self {
            RawCell::Empty => String::new(),
            RawCell::Text(s) => s.clone(),
            RawCell::Number(n) => n.to_string(),
            RawCell::Date(d) => d.to_string(),
        }
    }
}

/// One source row mapped onto the schema contract, still uncleaned.
#[derive(Debug, Clone)]
pub struct RawRecord {
    /// 1-based line number in the source, header included.
    pub row: usize,
    pub developer_name: RawCell,
    pub area: RawCell,
    pub asset_type: RawCell,
    pub configuration: RawCell,
    pub launch_date: RawCell,
    pub handover_date: RawCell,
    pub total_units: RawCell,
    pub project_area_acres: RawCell,
}

impl RawRecord {
    pub fn is_blank(&self) -> bool {
        [
            &self.developer_name,
            &self.area,
            &self.asset_type,
            &self.configuration,
            &self.launch_date,
            &self.handover_date,
            &self.total_units,
            &self.project_area_acres,
        ]
        .iter()
        .all(|c| c.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AssetType {
    Apartment,
    Villa,
    Plot,
}

impl AssetType {
    pub const ALL: [AssetType; 3] = [AssetType::Apartment, AssetType::Villa, AssetType::Plot];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Apartment => "Apartment",
            AssetType::Villa => "Villa",
            AssetType::Plot => "Plot",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetType {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        AssetType::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(t))
            .ok_or_else(|| PipelineError::InvalidAssetType(s.to_string()))
    }
}

/// Calendar quarter. Field order gives chronological ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearQuarter {
    pub year: i32,
    pub quarter: u8,
}

impl YearQuarter {
    pub fn new(year: i32, quarter: u8) -> Option<Self> {
        (1..=4).contains(&quarter).then_some(YearQuarter { year, quarter })
    }

    pub fn of(date: NaiveDate) -> Self {
        YearQuarter {
            year: date.year(),
            quarter: (date.month0() / 3 + 1) as u8,
        }
    }
}

impl fmt::Display for YearQuarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Q{}", self.year, self.quarter)
    }
}

impl FromStr for YearQuarter {
    type Err = PipelineError;

    /// Accepts `2023 Q1`, `2023Q1` and `2023-Q1`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || PipelineError::InvalidQuarter(s.to_string());
        let upper = s.trim().to_ascii_uppercase();
        let (year, quarter) = upper.split_once('Q').ok_or_else(err)?;
        let year = year
            .trim_end_matches(|c: char| c == ' ' || c == '-')
            .parse::<i32>()
            .map_err(|_| err())?;
        let quarter = quarter.trim().parse::<u8>().map_err(|_| err())?;
        YearQuarter::new(year, quarter).ok_or_else(err)
    }
}

impl Serialize for YearQuarter {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Schema fields, used for non-null predicates and warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Field {
    DeveloperName,
    Area,
    AssetType,
    Configuration,
    LaunchDate,
    HandoverDate,
    TotalUnits,
    ProjectAreaAcres,
    HandoverMonths,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Field::DeveloperName => "Developer Name",
            Field::Area => "Area",
            Field::AssetType => "Asset Type",
            Field::Configuration => "BHK",
            Field::LaunchDate => "Launch Date",
            Field::HandoverDate => "Handover date",
            Field::TotalUnits => "Total no. of units",
            Field::ProjectAreaAcres => "Project Area (Acres)",
            Field::HandoverMonths => "Handover Time (Months)",
        };
        f.write_str(s)
    }
}

/// A normalized project row. Immutable once built by the normalizer.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub row: usize,
    pub developer_name: Option<String>,
    pub area: String,
    pub asset_type: Option<AssetType>,
    /// Bedroom count; only ever set for apartments.
    pub configuration: Option<f64>,
    pub launch_date: Option<NaiveDate>,
    pub handover_date: Option<NaiveDate>,
    pub total_units: Option<u64>,
    pub project_area_acres: Option<f64>,
    pub handover_months: Option<i64>,
    pub year_quarter: Option<YearQuarter>,
}

impl Record {
    pub fn handover_quarter(&self) -> Option<YearQuarter> {
        self.handover_date.map(YearQuarter::of)
    }

    pub fn launch_year(&self) -> Option<i32> {
        self.launch_date.map(|d| d.year())
    }

    pub fn has(&self, field: Field) -> bool {
        match field {
            Field::DeveloperName => self.developer_name.is_some(),
            Field::Area => true,
            Field::AssetType => self.asset_type.is_some(),
            Field::Configuration => self.configuration.is_some(),
            Field::LaunchDate => self.launch_date.is_some(),
            Field::HandoverDate => self.handover_date.is_some(),
            Field::TotalUnits => self.total_units.is_some(),
            Field::ProjectAreaAcres => self.project_area_acres.is_some(),
            Field::HandoverMonths => self.handover_months.is_some(),
        }
    }
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ViewCatalogRow {
    #[serde(rename = "No")]
    #[tabled(rename = "No")]
    pub number: usize,
    #[serde(rename = "Id")]
    #[tabled(rename = "Id")]
    pub id: String,
    #[serde(rename = "Title")]
    #[tabled(rename = "Title")]
    pub title: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct WarningCountRow {
    #[serde(rename = "Warning")]
    #[tabled(rename = "Warning")]
    pub kind: String,
    #[serde(rename = "Count")]
    #[tabled(rename = "Count")]
    pub count: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarter_of_date() {
        let d = NaiveDate::from_ymd_opt(2023, 4, 10).unwrap();
        assert_eq!(YearQuarter::of(d), YearQuarter::new(2023, 2).unwrap());
        let d = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        assert_eq!(YearQuarter::of(d).quarter, 4);
    }

    #[test]
    fn quarter_parsing_and_order() {
        let a: YearQuarter = "2023 Q4".parse().unwrap();
        let b: YearQuarter = "2024Q1".parse().unwrap();
        let c: YearQuarter = "2024-q2".parse().unwrap();
        assert!(a < b && b < c);
        assert_eq!(a.to_string(), "2023 Q4");
        assert!("2023 Q5".parse::<YearQuarter>().is_err());
        assert!("Q1".parse::<YearQuarter>().is_err());
    }

    #[test]
    fn quarters_sort_chronologically_not_lexically() {
        let mut qs = vec![
            YearQuarter::new(2024, 1).unwrap(),
            YearQuarter::new(2023, 10 / 3).unwrap(),
            YearQuarter::new(2023, 4).unwrap(),
        ];
        qs.sort();
        let labels: Vec<String> = qs.iter().map(|q| q.to_string()).collect();
        assert_eq!(labels, ["2023 Q3", "2023 Q4", "2024 Q1"]);
    }

    #[test]
    fn asset_type_from_str_is_case_insensitive() {
        assert_eq!("villa".parse::<AssetType>().unwrap(), AssetType::Villa);
        assert!("Flat".parse::<AssetType>().is_err());
    }
}
