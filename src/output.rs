use crate::aggregate::{Axis, LongTable, PivotTable};
use crate::error::Result;
use crate::util::{format_number, round2};
use crate::views::{ViewBody, ViewOutput};
use serde::Serialize;
use std::path::Path;
use tabled::{builder::Builder, settings::Style, Table, Tabled};

/// How numeric cells are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellStyle {
    /// Plain numbers for files.
    Raw,
    /// Thousands separators for the terminal.
    Display,
}

fn cell(v: Option<f64>, style: CellStyle) -> String {
    let Some(v) = v else {
        return match style {
            CellStyle::Raw => String::new(),
            CellStyle::Display => "n/a".to_string(),
        };
    };
    let decimals = if v.fract() == 0.0 { 0 } else { 2 };
    match style {
        CellStyle::Raw => format!("{}", round2(v)),
        CellStyle::Display => format_number(v, decimals),
    }
}

fn measure_header(t: &LongTable) -> String {
    if t.cumulative {
        format!("{} (cumulative)", t.measure.label())
    } else {
        t.measure.label().to_string()
    }
}

fn long_rows(t: &LongTable, style: CellStyle) -> (Vec<String>, Vec<Vec<String>>) {
    let mut header: Vec<String> = t.keys.iter().map(|k| k.label().to_string()).collect();
    header.push(measure_header(t));
    let rows = t
        .rows
        .iter()
        .map(|r| {
            let mut row: Vec<String> = r.key.iter().map(|k| k.to_string()).collect();
            row.push(cell(Some(r.value), style));
            row
        })
        .collect();
    (header, rows)
}

fn pivot_rows(p: &PivotTable, style: CellStyle) -> (Vec<String>, Vec<Vec<String>>) {
    let mut header = vec![p.row_key.label().to_string()];
    header.extend(p.columns.iter().map(|c| c.to_string()));
    let rows = p
        .rows
        .iter()
        .zip(&p.cells)
        .map(|(key, cells)| {
            let mut row = vec![key.to_string()];
            row.extend(cells.iter().map(|v| cell(*v, style)));
            row
        })
        .collect();
    (header, rows)
}

/// Header and body rows of a view result. Empty for a no-data result.
pub fn table_rows(out: &ViewOutput, style: CellStyle) -> (Vec<String>, Vec<Vec<String>>) {
    match &out.body {
        ViewBody::Long(t) => long_rows(t, style),
        ViewBody::Pivot(p) => pivot_rows(p, style),
        ViewBody::NoData { .. } => (Vec::new(), Vec::new()),
    }
}

/// One-line description of what the numbers in a view mean.
pub fn caption(out: &ViewOutput) -> Option<String> {
    match &out.body {
        ViewBody::Pivot(p) => {
            let mut s = format!("{} by {} ({:?})", p.measure.label(), p.column_key.label(), p.reducer);
            if p.cumulative {
                s.push_str(", cumulative");
            }
            match p.percentage_of {
                Some(Axis::Row) => s.push_str(", % of row total"),
                Some(Axis::Column) => s.push_str(", % of column total"),
                None => {}
            }
            Some(s)
        }
        ViewBody::Long(t) => Some(format!("{} ({:?})", t.measure.label(), t.reducer)),
        ViewBody::NoData { .. } => None,
    }
}

pub fn write_csv(path: &Path, out: &ViewOutput) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    let (header, rows) = table_rows(out, CellStyle::Raw);
    if !header.is_empty() {
        wtr.write_record(&header)?;
    }
    for r in rows {
        wtr.write_record(&r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// Write the requested CSV and JSON exports of a view. A no-data result
/// writes nothing and returns `false`.
pub fn export_view(out: &ViewOutput, csv: Option<&Path>, json: Option<&Path>) -> Result<bool> {
    if out.is_empty() {
        return Ok(false);
    }
    if let Some(path) = csv {
        write_csv(path, out)?;
    }
    if let Some(path) = json {
        write_json(path, out)?;
    }
    Ok(true)
}

/// Render a view as a markdown table, at most `max_rows` body rows.
pub fn render_view(out: &ViewOutput, max_rows: usize) -> String {
    let mut s = format!("{}\n", out.title);
    if let ViewBody::NoData { message } = &out.body {
        s.push_str(&format!("({})\n", message));
        return s;
    }
    if let Some(c) = caption(out) {
        s.push_str(&format!("({})\n", c));
    }
    s.push('\n');
    let (header, rows) = table_rows(out, CellStyle::Display);
    let total = rows.len();
    let mut builder = Builder::default();
    builder.push_record(header);
    for r in rows.into_iter().take(max_rows) {
        builder.push_record(r);
    }
    s.push_str(&builder.build().with(Style::markdown()).to_string());
    s.push('\n');
    if total > max_rows {
        s.push_str(&format!("({} of {} rows shown)\n", max_rows, total));
    }
    s
}

pub fn preview_view(out: &ViewOutput, max_rows: usize) {
    println!("{}", render_view(out, max_rows));
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{Dimension, GroupRow, KeyValue, Measure, Reducer};
    use crate::views::NO_DATA_MESSAGE;

    fn long_output() -> ViewOutput {
        ViewOutput {
            id: "developer_unit_volume".into(),
            title: "Developer Dominance in Unit Volume".into(),
            body: ViewBody::Long(LongTable {
                keys: vec![Dimension::Developer],
                measure: Measure::TotalUnits,
                reducer: Reducer::Sum,
                cumulative: false,
                rows: vec![
                    GroupRow { key: vec![KeyValue::Text("Acme".into())], value: 1500.0 },
                    GroupRow { key: vec![KeyValue::Text("Sobha".into())], value: 12.5 },
                ],
            }),
        }
    }

    #[test]
    fn cells_by_style() {
        assert_eq!(cell(Some(1500.0), CellStyle::Raw), "1500");
        assert_eq!(cell(Some(1500.0), CellStyle::Display), "1,500");
        assert_eq!(cell(Some(33.333), CellStyle::Raw), "33.33");
        assert_eq!(cell(None, CellStyle::Raw), "");
        assert_eq!(cell(None, CellStyle::Display), "n/a");
    }

    #[test]
    fn long_table_rows() {
        let (header, rows) = table_rows(&long_output(), CellStyle::Raw);
        assert_eq!(header, ["Developer Name", "Total no. of units"]);
        assert_eq!(rows[1], ["Sobha", "12.5"]);
    }

    #[test]
    fn rendering_truncates_and_reports() {
        let s = render_view(&long_output(), 1);
        assert!(s.starts_with("Developer Dominance in Unit Volume\n"));
        assert!(s.contains("| Acme"));
        assert!(s.contains("1,500"));
        assert!(!s.contains("Sobha"));
        assert!(s.contains("(1 of 2 rows shown)"));
    }

    #[test]
    fn no_data_renders_the_notice() {
        let out = ViewOutput {
            id: "x".into(),
            title: "X".into(),
            body: ViewBody::NoData { message: NO_DATA_MESSAGE.into() },
        };
        assert_eq!(render_view(&out, 5), format!("X\n({})\n", NO_DATA_MESSAGE));
        assert!(table_rows(&out, CellStyle::Raw).0.is_empty());
    }

    #[test]
    fn no_data_is_not_exported() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("view.csv");
        let json_path = dir.path().join("view.json");
        let out = ViewOutput {
            id: "x".into(),
            title: "X".into(),
            body: ViewBody::NoData { message: NO_DATA_MESSAGE.into() },
        };
        assert!(!export_view(&out, Some(&csv_path), Some(&json_path)).unwrap());
        assert!(!csv_path.exists());
        assert!(!json_path.exists());

        assert!(export_view(&long_output(), Some(&csv_path), None).unwrap());
        let written = std::fs::read_to_string(&csv_path).unwrap();
        assert_eq!(written, "Developer Name,Total no. of units\nAcme,1500\nSobha,12.5\n");
        assert!(!json_path.exists());
    }
}
