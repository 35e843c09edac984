//! Group-by, reduce, and the reshaping variants built on top of a grouped
//! table: pivot, running totals, percentage-of-total and top-N ranking.
use crate::error::{PipelineError, Result};
use crate::types::{Record, YearQuarter};
use crate::util::{median, round2};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A grouping key that can be read off a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Dimension {
    LaunchQuarter,
    HandoverQuarter,
    LaunchYear,
    Area,
    AssetType,
    Developer,
    Configuration,
}

impl Dimension {
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            Dimension::LaunchQuarter | Dimension::HandoverQuarter | Dimension::LaunchYear
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            Dimension::LaunchQuarter => "Launch Quarter",
            Dimension::HandoverQuarter => "Handover Quarter",
            Dimension::LaunchYear => "Year",
            Dimension::Area => "Area",
            Dimension::AssetType => "Asset Type",
            Dimension::Developer => "Developer Name",
            Dimension::Configuration => "Configuration",
        }
    }

    pub fn key(&self, r: &Record) -> Option<KeyValue> {
        match self {
            Dimension::LaunchQuarter => r.year_quarter.map(KeyValue::Quarter),
            Dimension::HandoverQuarter => r.handover_quarter().map(KeyValue::Quarter),
            Dimension::LaunchYear => r.launch_year().map(KeyValue::Year),
            Dimension::Area => Some(KeyValue::Text(r.area.clone())),
            Dimension::AssetType => r.asset_type.map(|a| KeyValue::Text(a.to_string())),
            Dimension::Developer => r.developer_name.clone().map(KeyValue::Text),
            Dimension::Configuration => r
                .configuration
                .map(|c| KeyValue::Bedrooms((c * 100.0).round() as i64)),
        }
    }
}

/// One value of a [`Dimension`]. All keys of one dimension share a variant,
/// so the derived ordering is chronological for temporal keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyValue {
    Quarter(YearQuarter),
    Year(i32),
    Text(String),
    /// Bedroom count in hundredths.
    Bedrooms(i64),
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Quarter(q) => write!(f, "{}", q),
            KeyValue::Year(y) => write!(f, "{}", y),
            KeyValue::Text(s) => f.write_str(s),
            KeyValue::Bedrooms(h) => write!(f, "{} BHK", *h as f64 / 100.0),
        }
    }
}

impl Serialize for KeyValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Measure {
    /// Every record counts once.
    Projects,
    TotalUnits,
    ProjectAreaAcres,
    HandoverMonths,
}

impl Measure {
    pub fn label(&self) -> &'static str {
        match self {
            Measure::Projects => "Projects",
            Measure::TotalUnits => "Total no. of units",
            Measure::ProjectAreaAcres => "Project Area (Acres)",
            Measure::HandoverMonths => "Handover Time (Months)",
        }
    }

    pub fn value(&self, r: &Record) -> Option<f64> {
        match self {
            Measure::Projects => Some(1.0),
            Measure::TotalUnits => r.total_units.map(|u| u as f64),
            Measure::ProjectAreaAcres => r.project_area_acres,
            Measure::HandoverMonths => r.handover_months.map(|m| m as f64),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Reducer {
    Sum,
    Count,
    Median,
}

impl Reducer {
    pub fn reduce(&self, values: Vec<f64>) -> f64 {
        match self {
            Reducer::Sum => values.iter().sum(),
            Reducer::Count => values.len() as f64,
            Reducer::Median => median(values),
        }
    }

    /// Value of a pivot cell with no observations. Zero for additive
    /// reducers; a median of nothing has no value.
    pub fn fill_value(&self) -> Option<f64> {
        match self {
            Reducer::Sum | Reducer::Count => Some(0.0),
            Reducer::Median => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Axis {
    Row,
    Column,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRow {
    pub key: Vec<KeyValue>,
    pub value: f64,
}

/// One row per group, ordered by key unless re-ranked by [`LongTable::top_n`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LongTable {
    pub keys: Vec<Dimension>,
    pub measure: Measure,
    pub reducer: Reducer,
    pub cumulative: bool,
    pub rows: Vec<GroupRow>,
}

/// Group `records` by up to two dimensions and reduce `measure` per group.
///
/// A record missing any key, or the measure, is left out of this table only.
pub fn aggregate<'a, I>(
    records: I,
    keys: &[Dimension],
    measure: Measure,
    reducer: Reducer,
) -> Result<LongTable>
where
    I: IntoIterator<Item = &'a Record>,
{
    if keys.is_empty() || keys.len() > 2 {
        return Err(PipelineError::InvalidGrouping(format!(
            "expected one or two grouping keys, got {}",
            keys.len()
        )));
    }
    let mut groups: BTreeMap<Vec<KeyValue>, Vec<f64>> = BTreeMap::new();
    for r in records {
        let Some(key) = keys.iter().map(|d| d.key(r)).collect::<Option<Vec<_>>>() else {
            continue;
        };
        let Some(value) = measure.value(r) else {
            continue;
        };
        groups.entry(key).or_default().push(value);
    }
    let rows = groups
        .into_iter()
        .map(|(key, values)| GroupRow {
            key,
            value: reducer.reduce(values),
        })
        .collect();
    Ok(LongTable {
        keys: keys.to_vec(),
        measure,
        reducer,
        cumulative: false,
        rows,
    })
}

impl LongTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.rows.iter().map(|r| r.value).sum()
    }

    /// Largest `n` groups, descending by value; ties keep key order.
    pub fn top_n(&self, n: usize) -> LongTable {
        let mut rows = self.rows.clone();
        rows.sort_by(|a, b| {
            b.value
                .partial_cmp(&a.value)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.key.cmp(&b.key))
        });
        rows.truncate(n);
        LongTable {
            rows,
            ..self.clone()
        }
    }

    /// Running total along the temporal key, restarted for every combination
    /// of the other keys. Row order is kept.
    pub fn cumulative(&self) -> Result<LongTable> {
        let t = self
            .keys
            .iter()
            .position(Dimension::is_temporal)
            .ok_or_else(|| {
                PipelineError::InvalidGrouping("cumulative totals need a temporal key".into())
            })?;
        let others = |row: &GroupRow| -> Vec<KeyValue> {
            row.key
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != t)
                .map(|(_, k)| k.clone())
                .collect()
        };

        let mut order: Vec<usize> = (0..self.rows.len()).collect();
        order.sort_by(|&a, &b| {
            let (ra, rb) = (&self.rows[a], &self.rows[b]);
            others(ra)
                .cmp(&others(rb))
                .then_with(|| ra.key[t].cmp(&rb.key[t]))
        });

        let mut rows = self.rows.clone();
        let mut current: Option<Vec<KeyValue>> = None;
        let mut running = 0.0;
        for i in order {
            let group = others(&self.rows[i]);
            if current.as_ref() != Some(&group) {
                running = 0.0;
                current = Some(group);
            }
            running += self.rows[i].value;
            rows[i].value = running;
        }
        Ok(LongTable {
            rows,
            cumulative: true,
            ..self.clone()
        })
    }

    /// Reshape a two-key table: first key down, second key across.
    pub fn pivot(&self) -> Result<PivotTable> {
        if self.keys.len() != 2 {
            return Err(PipelineError::InvalidGrouping(format!(
                "pivot needs two grouping keys, got {}",
                self.keys.len()
            )));
        }
        let rows: Vec<KeyValue> = self
            .rows
            .iter()
            .map(|r| r.key[0].clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let columns: Vec<KeyValue> = self
            .rows
            .iter()
            .map(|r| r.key[1].clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let fill = self.reducer.fill_value();
        let mut cells = vec![vec![fill; columns.len()]; rows.len()];
        for r in &self.rows {
            // Both lookups succeed: the axes were built from these rows.
            if let (Ok(i), Ok(j)) = (rows.binary_search(&r.key[0]), columns.binary_search(&r.key[1])) {
                cells[i][j] = Some(r.value);
            }
        }
        Ok(PivotTable {
            row_key: self.keys[0],
            column_key: self.keys[1],
            measure: self.measure,
            reducer: self.reducer,
            cumulative: self.cumulative,
            percentage_of: None,
            rows,
            columns,
            cells,
        })
    }
}

/// Row key × column key matrix. `None` cells mean "no data".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotTable {
    pub row_key: Dimension,
    pub column_key: Dimension,
    pub measure: Measure,
    pub reducer: Reducer,
    pub cumulative: bool,
    pub percentage_of: Option<Axis>,
    pub rows: Vec<KeyValue>,
    pub columns: Vec<KeyValue>,
    pub cells: Vec<Vec<Option<f64>>>,
}

impl PivotTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns.is_empty()
    }

    pub fn get(&self, row: &KeyValue, column: &KeyValue) -> Option<f64> {
        let i = self.rows.iter().position(|k| k == row)?;
        let j = self.columns.iter().position(|k| k == column)?;
        self.cells[i][j]
    }

    pub fn row_total(&self, i: usize) -> f64 {
        self.cells[i].iter().flatten().sum()
    }

    pub fn column_total(&self, j: usize) -> f64 {
        self.cells.iter().filter_map(|row| row[j]).sum()
    }

    /// Running total down each column. The row key must be temporal.
    /// Cells before a column's first observation stay empty.
    pub fn cumulative(&self) -> Result<PivotTable> {
        if !self.row_key.is_temporal() {
            return Err(PipelineError::InvalidGrouping(
                "cumulative totals need a temporal row key".into(),
            ));
        }
        let mut cells = self.cells.clone();
        for j in 0..self.columns.len() {
            let mut running: Option<f64> = None;
            for row in cells.iter_mut() {
                if let Some(v) = row[j] {
                    running = Some(running.unwrap_or(0.0) + v);
                }
                row[j] = running;
            }
        }
        Ok(PivotTable {
            cells,
            cumulative: true,
            ..self.clone()
        })
    }

    /// Each cell as a percentage of its row (or column) total, rounded to
    /// two decimals. A zero total gives 0.0 cells.
    pub fn percentages(&self, axis: Axis) -> PivotTable {
        let totals: Vec<f64> = match axis {
            Axis::Row => (0..self.rows.len()).map(|i| self.row_total(i)).collect(),
            Axis::Column => (0..self.columns.len()).map(|j| self.column_total(j)).collect(),
        };
        let cells = self
            .cells
            .iter()
            .enumerate()
            .map(|(i, row)| {
                row.iter()
                    .enumerate()
                    .map(|(j, cell)| {
                        let total = match axis {
                            Axis::Row => totals[i],
                            Axis::Column => totals[j],
                        };
                        cell.map(|v| if total == 0.0 { 0.0 } else { round2(v / total * 100.0) })
                    })
                    .collect()
            })
            .collect();
        PivotTable {
            cells,
            percentage_of: Some(axis),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AssetType;
    use chrono::NaiveDate;

    fn rec(area: &str, dev: &str, asset: AssetType, units: u64, launch: (i32, u32, u32)) -> Record {
        let launch_date = NaiveDate::from_ymd_opt(launch.0, launch.1, launch.2);
        Record {
            row: 0,
            developer_name: Some(dev.to_string()),
            area: area.to_string(),
            asset_type: Some(asset),
            configuration: None,
            launch_date,
            handover_date: None,
            total_units: Some(units),
            project_area_acres: None,
            handover_months: None,
            year_quarter: launch_date.map(YearQuarter::of),
        }
    }

    fn sample() -> Vec<Record> {
        vec![
            rec("North", "Acme", AssetType::Apartment, 100, (2023, 1, 10)),
            rec("North", "Brigade", AssetType::Villa, 20, (2023, 2, 10)),
            rec("South", "Acme", AssetType::Apartment, 60, (2023, 4, 10)),
            rec("East", "Sobha", AssetType::Plot, 0, (2023, 11, 10)),
            rec("South", "Sobha", AssetType::Villa, 30, (2022, 12, 1)),
        ]
    }

    fn q(y: i32, n: u8) -> KeyValue {
        KeyValue::Quarter(YearQuarter::new(y, n).unwrap())
    }

    fn text(s: &str) -> KeyValue {
        KeyValue::Text(s.to_string())
    }

    #[test]
    fn sum_partitions_the_total() {
        let data = sample();
        let by_area = aggregate(&data, &[Dimension::Area], Measure::TotalUnits, Reducer::Sum).unwrap();
        let whole: f64 = data.iter().filter_map(|r| r.total_units).map(|u| u as f64).sum();
        assert_eq!(by_area.total(), whole);
        assert_eq!(by_area.rows.len(), 3);
    }

    #[test]
    fn temporal_keys_sort_chronologically() {
        let data = sample();
        let t = aggregate(&data, &[Dimension::LaunchQuarter], Measure::Projects, Reducer::Count).unwrap();
        let keys: Vec<String> = t.rows.iter().map(|r| r.key[0].to_string()).collect();
        assert_eq!(keys, ["2022 Q4", "2023 Q1", "2023 Q2", "2023 Q4"]);
        assert_eq!(t.rows[1].value, 2.0);
    }

    #[test]
    fn missing_keys_and_measures_only_skip_that_table() {
        let mut data = sample();
        data[0].developer_name = None;
        data[1].total_units = None;
        let by_dev = aggregate(&data, &[Dimension::Developer], Measure::Projects, Reducer::Count).unwrap();
        assert_eq!(by_dev.total(), 4.0);
        let units = aggregate(&data, &[Dimension::Area], Measure::TotalUnits, Reducer::Sum).unwrap();
        assert_eq!(units.total(), 190.0);
        let projects = aggregate(&data, &[Dimension::Area], Measure::Projects, Reducer::Count).unwrap();
        assert_eq!(projects.total(), 5.0);
    }

    #[test]
    fn grouping_key_count_is_checked() {
        let data = sample();
        assert!(aggregate(&data, &[], Measure::Projects, Reducer::Count).is_err());
        let three = [Dimension::Area, Dimension::AssetType, Dimension::Developer];
        assert!(aggregate(&data, &three, Measure::Projects, Reducer::Count).is_err());
    }

    #[test]
    fn pivot_fills_zero_for_sums() {
        let data = sample();
        let p = aggregate(&data, &[Dimension::LaunchQuarter, Dimension::Area], Measure::TotalUnits, Reducer::Sum)
            .unwrap()
            .pivot()
            .unwrap();
        assert_eq!(p.columns, [text("East"), text("North"), text("South")]);
        assert_eq!(p.get(&q(2023, 1), &text("North")), Some(120.0));
        assert_eq!(p.get(&q(2023, 1), &text("South")), Some(0.0));
    }

    #[test]
    fn pivot_leaves_median_gaps_empty() {
        let mut data = sample();
        for (r, m) in data.iter_mut().zip([10, 20, 30, 40, 50]) {
            r.handover_months = Some(m);
        }
        let p = aggregate(&data, &[Dimension::Developer, Dimension::AssetType], Measure::HandoverMonths, Reducer::Median)
            .unwrap()
            .pivot()
            .unwrap();
        assert_eq!(p.get(&text("Acme"), &text("Apartment")), Some(20.0));
        assert_eq!(p.get(&text("Acme"), &text("Villa")), None);
    }

    #[test]
    fn pivot_needs_two_keys() {
        let data = sample();
        let t = aggregate(&data, &[Dimension::Area], Measure::Projects, Reducer::Count).unwrap();
        assert!(t.pivot().is_err());
    }

    #[test]
    fn long_cumulative_is_per_group_and_monotone() {
        let data = sample();
        let t = aggregate(&data, &[Dimension::LaunchQuarter, Dimension::Area], Measure::TotalUnits, Reducer::Sum)
            .unwrap()
            .cumulative()
            .unwrap();
        let south: Vec<f64> = t
            .rows
            .iter()
            .filter(|r| r.key[1] == text("South"))
            .map(|r| r.value)
            .collect();
        assert_eq!(south, [30.0, 90.0]);
        let north: Vec<f64> = t
            .rows
            .iter()
            .filter(|r| r.key[1] == text("North"))
            .map(|r| r.value)
            .collect();
        assert_eq!(north, [120.0]);
        assert!(t.cumulative);
    }

    #[test]
    fn cumulative_needs_a_temporal_key() {
        let data = sample();
        let t = aggregate(&data, &[Dimension::Area], Measure::Projects, Reducer::Count).unwrap();
        assert!(t.cumulative().is_err());
        let p = aggregate(&data, &[Dimension::Area, Dimension::AssetType], Measure::Projects, Reducer::Count)
            .unwrap()
            .pivot()
            .unwrap();
        assert!(p.cumulative().is_err());
    }

    #[test]
    fn pivot_cumulative_runs_down_columns() {
        let data = sample();
        let p = aggregate(&data, &[Dimension::LaunchQuarter, Dimension::Area], Measure::Projects, Reducer::Count)
            .unwrap()
            .pivot()
            .unwrap()
            .cumulative()
            .unwrap();
        for j in 0..p.columns.len() {
            let col: Vec<f64> = p.cells.iter().map(|row| row[j].unwrap()).collect();
            assert!(col.windows(2).all(|w| w[0] <= w[1]));
        }
        let last = p.rows.len() - 1;
        assert_eq!(p.cells[last].iter().flatten().sum::<f64>(), 5.0);
    }

    #[test]
    fn pivot_cumulative_keeps_leading_gaps() {
        let p = PivotTable {
            row_key: Dimension::LaunchQuarter,
            column_key: Dimension::Area,
            measure: Measure::HandoverMonths,
            reducer: Reducer::Median,
            cumulative: false,
            percentage_of: None,
            rows: vec![q(2023, 1), q(2023, 2), q(2023, 3)],
            columns: vec![text("North")],
            cells: vec![vec![None], vec![Some(2.0)], vec![None]],
        };
        let c = p.cumulative().unwrap();
        assert_eq!(c.cells, vec![vec![None], vec![Some(2.0)], vec![Some(2.0)]]);
    }

    #[test]
    fn row_percentages_sum_to_100_or_zero() {
        let mut data = sample();
        data.push(rec("West", "Acme", AssetType::Villa, 0, (2023, 5, 1)));
        data.push(rec("North", "Acme", AssetType::Plot, 7, (2023, 5, 1)));
        let p = aggregate(&data, &[Dimension::Area, Dimension::AssetType], Measure::TotalUnits, Reducer::Sum)
            .unwrap()
            .pivot()
            .unwrap()
            .percentages(Axis::Row);
        for (i, row) in p.cells.iter().enumerate() {
            let sum: f64 = row.iter().flatten().sum();
            if p.rows[i] == text("East") || p.rows[i] == text("West") {
                assert!(row.iter().flatten().all(|v| *v == 0.0));
            } else {
                assert!((sum - 100.0).abs() <= 0.05, "row {} sums to {}", p.rows[i], sum);
            }
            assert!(row.iter().flatten().all(|v| v.is_finite()));
        }
        assert_eq!(p.get(&text("North"), &text("Villa")), Some(15.75));
        assert_eq!(p.percentage_of, Some(Axis::Row));
    }

    #[test]
    fn column_percentages() {
        let data = sample();
        let p = aggregate(&data, &[Dimension::Area, Dimension::AssetType], Measure::Projects, Reducer::Count)
            .unwrap()
            .pivot()
            .unwrap()
            .percentages(Axis::Column);
        assert_eq!(p.get(&text("North"), &text("Villa")), Some(50.0));
        assert_eq!(p.get(&text("South"), &text("Villa")), Some(50.0));
        assert_eq!(p.get(&text("East"), &text("Plot")), Some(100.0));
    }

    #[test]
    fn top_n_ranks_descending() {
        let data = sample();
        let t = aggregate(&data, &[Dimension::Developer], Measure::TotalUnits, Reducer::Sum)
            .unwrap()
            .top_n(2);
        let ranked: Vec<(String, f64)> = t.rows.iter().map(|r| (r.key[0].to_string(), r.value)).collect();
        assert_eq!(ranked, [("Acme".to_string(), 160.0), ("Sobha".to_string(), 30.0)]);
    }

    #[test]
    fn configuration_keys() {
        let mut data = sample();
        data[0].configuration = Some(2.5);
        data[2].configuration = Some(3.0);
        let t = aggregate(&data, &[Dimension::Configuration], Measure::Projects, Reducer::Count).unwrap();
        let keys: Vec<String> = t.rows.iter().map(|r| r.key[0].to_string()).collect();
        assert_eq!(keys, ["2.5 BHK", "3 BHK"]);
    }
}
