use crate::types::{AssetType, Field, RawCell, RawRecord, Record, YearQuarter};
use crate::util::{
    days_diff, excel_serial_to_date, extract_first_number, parse_date_safe, parse_f64_safe,
    title_case,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

/// Spellings seen in the source, already title-cased.
const DEFAULT_SYNONYMS: &[(&str, AssetType)] = &[
    ("Land", AssetType::Plot),
    ("Plot/Land", AssetType::Plot),
    ("Plot Land", AssetType::Plot),
    ("Flat", AssetType::Apartment),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum WarningKind {
    UnparsableDate,
    UnparsableNumber,
    NegativeValue,
    UnknownAssetType,
    UnparsableConfiguration,
    HandoverBeforeLaunch,
    MissingArea,
}

/// A non-fatal problem with one field of one source row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseWarning {
    pub row: usize,
    pub field: Field,
    pub kind: WarningKind,
    pub raw: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub total_rows: usize,
    pub kept_rows: usize,
    pub dropped_rows: usize,
    pub warnings: Vec<ParseWarning>,
}

impl LoadReport {
    pub fn counts_by_kind(&self) -> BTreeMap<WarningKind, usize> {
        let mut counts = BTreeMap::new();
        for w in &self.warnings {
            *counts.entry(w.kind).or_insert(0) += 1;
        }
        counts
    }
}

/// Turns raw rows into canonical [`Record`]s.
#[derive(Debug, Clone)]
pub struct Normalizer {
    synonyms: HashMap<String, AssetType>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Normalizer {
            synonyms: DEFAULT_SYNONYMS
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
        }
    }
}

impl Normalizer {
    /// Default synonym table extended with `extra` (spelling to canonical
    /// name). Entries naming an unknown canonical type are ignored.
    pub fn with_synonyms(extra: &BTreeMap<String, String>) -> Self {
        let mut normalizer = Normalizer::default();
        for (spelling, canonical) in extra {
            match canonical.parse::<AssetType>() {
                Ok(asset) => {
                    normalizer.synonyms.insert(title_case(spelling.trim()), asset);
                }
                Err(_) => warn!(%spelling, %canonical, "ignoring synonym with unknown asset type"),
            }
        }
        normalizer
    }

    pub fn asset_type(&self, raw: &str) -> Option<AssetType> {
        let cleaned = title_case(raw.trim());
        if let Ok(asset) = cleaned.parse::<AssetType>() {
            return Some(asset);
        }
        self.synonyms.get(&cleaned).copied()
    }

    pub fn normalize(&self, raw: &[RawRecord]) -> (Vec<Record>, LoadReport) {
        let mut report = LoadReport {
            total_rows: raw.len(),
            ..LoadReport::default()
        };
        let mut records = Vec::with_capacity(raw.len());
        for r in raw {
            match self.normalize_one(r, &mut report.warnings) {
                Some(rec) => records.push(rec),
                None => report.dropped_rows += 1,
            }
        }
        report.kept_rows = records.len();

        for w in &report.warnings {
            debug!(row = w.row, field = %w.field, kind = ?w.kind, raw = %w.raw, "parse warning");
        }
        for (kind, count) in report.counts_by_kind() {
            warn!(?kind, count, "records with parse warnings");
        }
        info!(
            total = report.total_rows,
            kept = report.kept_rows,
            dropped = report.dropped_rows,
            "normalized records"
        );
        (records, report)
    }

    fn normalize_one(&self, r: &RawRecord, warnings: &mut Vec<ParseWarning>) -> Option<Record> {
        let mut warn = |field: Field, kind: WarningKind, cell: &RawCell| {
            warnings.push(ParseWarning {
                row: r.row,
                field,
                kind,
                raw: cell.display(),
            })
        };

        let area = match text(&r.area) {
            Some(a) => title_case(&a),
            None => {
                warn(Field::Area, WarningKind::MissingArea, &r.area);
                return None;
            }
        };
        let developer_name = text(&r.developer_name).map(|d| title_case(&d));

        let asset_type = match text(&r.asset_type) {
            Some(raw) => {
                let mapped = self.asset_type(&raw);
                if mapped.is_none() {
                    warn(Field::AssetType, WarningKind::UnknownAssetType, &r.asset_type);
                }
                mapped
            }
            None => None,
        };

        let configuration = if asset_type == Some(AssetType::Apartment) && !r.configuration.is_empty() {
            let value = match &r.configuration {
                RawCell::Number(n) if *n >= 0.0 => Some(*n),
                RawCell::Text(s) => extract_first_number(s),
                _ => None,
            };
            if value.is_none() {
                warn(Field::Configuration, WarningKind::UnparsableConfiguration, &r.configuration);
            }
            value
        } else {
            None
        };

        let mut date = |field: Field, cell: &RawCell| {
            let parsed = date_cell(cell);
            if parsed.is_none() && !cell.is_empty() {
                warn(field, WarningKind::UnparsableDate, cell);
            }
            parsed
        };
        let launch_date = date(Field::LaunchDate, &r.launch_date);
        let handover_date = date(Field::HandoverDate, &r.handover_date);

        let mut non_negative = |field: Field, cell: &RawCell| match number_cell(cell) {
            Some(v) if v >= 0.0 => Some(v),
            Some(_) => {
                warn(field, WarningKind::NegativeValue, cell);
                None
            }
            None => {
                if !cell.is_empty() {
                    warn(field, WarningKind::UnparsableNumber, cell);
                }
                None
            }
        };
        let total_units = non_negative(Field::TotalUnits, &r.total_units).map(|v| v.round() as u64);
        let project_area_acres = non_negative(Field::ProjectAreaAcres, &r.project_area_acres);

        let handover_months = match (launch_date, handover_date) {
            (Some(launch), Some(handover)) => {
                if handover < launch {
                    warn(Field::HandoverDate, WarningKind::HandoverBeforeLaunch, &r.handover_date);
                }
                Some(days_diff(launch, handover).div_euclid(30))
            }
            _ => None,
        };

        Some(Record {
            row: r.row,
            developer_name,
            area,
            asset_type,
            configuration,
            launch_date,
            handover_date,
            total_units,
            project_area_acres,
            handover_months,
            year_quarter: launch_date.map(YearQuarter::of),
        })
    }
}

fn text(cell: &RawCell) -> Option<String> {
    match cell {
        RawCell::Empty => None,
        RawCell::Text(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        RawCell::Number(n) if n.fract() == 0.0 => Some(format!("{}", *n as i64)),
        RawCell::Number(n) => Some(n.to_string()),
        RawCell::Date(d) => Some(d.to_string()),
    }
}

fn date_cell(cell: &RawCell) -> Option<NaiveDate> {
    match cell {
        RawCell::Date(d) => Some(*d),
        RawCell::Number(n) => excel_serial_to_date(*n),
        RawCell::Text(s) => parse_date_safe(Some(s)),
        RawCell::Empty => None,
    }
}

fn number_cell(cell: &RawCell) -> Option<f64> {
    match cell {
        RawCell::Number(n) => Some(*n),
        RawCell::Text(s) => parse_f64_safe(Some(s)),
        _ => None,
    }
}
