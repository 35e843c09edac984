use crate::config::{ColumnMap, SourceConfig};
use crate::error::{PipelineError, Result};
use crate::types::{RawCell, RawRecord};
use calamine::{open_workbook_auto, Data, Range, Reader};
use csv::ReaderBuilder;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];
const CSV_EXTENSIONS: &[&str] = &["csv", "txt"];

/// A source line number paired with its cells.
type SourceRow = (usize, Vec<RawCell>);

/// Load the configured source file, picking the reader from its extension.
pub fn load_path(path: &Path, config: &SourceConfig) -> Result<Vec<RawRecord>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let records = if CSV_EXTENSIONS.contains(&ext.as_str()) {
        let file = std::fs::File::open(path)?;
        load_csv(file, config)?
    } else if WORKBOOK_EXTENSIONS.contains(&ext.as_str()) {
        load_workbook(path, config)?
    } else {
        return Err(PipelineError::UnsupportedFormat {
            path: path.to_path_buf(),
        });
    };
    info!(path = %path.display(), rows = records.len(), "loaded source");
    Ok(records)
}

/// Read CSV text. `header_row` counts non-blank lines above the header.
pub fn load_csv<R: Read>(reader: R, config: &SourceConfig) -> Result<Vec<RawRecord>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    let mut rows: Vec<SourceRow> = Vec::new();
    for (idx, result) in rdr.byte_records().enumerate() {
        let record = result?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(idx + 1);
        // Legacy exports are often Latin-1; bad bytes become U+FFFD.
        let cells = record
            .iter()
            .map(|field| match std::str::from_utf8(field) {
                Ok(s) => text_cell(s),
                Err(_) => {
                    warn!(line, "invalid UTF-8 in field, replaced undecodable bytes");
                    text_cell(&String::from_utf8_lossy(field))
                }
            })
            .collect();
        rows.push((line, cells));
    }
    from_rows(rows, config.header_row, &config.columns)
}

/// Read one sheet of a spreadsheet workbook (xlsx, xls, xlsb, ods).
/// `header_row` is the zero-based sheet row of the header, so empty rows
/// at the top of the sheet count.
pub fn load_workbook(path: &Path, config: &SourceConfig) -> Result<Vec<RawRecord>> {
    let mut workbook = open_workbook_auto(path)?;
    let range = match &config.sheet {
        Some(name) => {
            if !workbook.sheet_names().iter().any(|n| n == name) {
                return Err(PipelineError::SheetNotFound(name.clone()));
            }
            workbook.worksheet_range(name)?
        }
        None => workbook
            .worksheet_range_at(0)
            .ok_or(PipelineError::EmptyWorkbook)??,
    };
    range_records(&range, config)
}

fn range_records(range: &Range<Data>, config: &SourceConfig) -> Result<Vec<RawRecord>> {
    // The range starts at the first used cell, not at A1.
    let first = range.start().map(|(r, _)| r as usize).unwrap_or(0);
    let rows: Vec<SourceRow> = range
        .rows()
        .enumerate()
        .map(|(i, row)| (first + i + 1, row.iter().map(workbook_cell).collect()))
        .collect();
    let header_row = config.header_row.saturating_sub(first);
    from_rows(rows, header_row, &config.columns)
}

fn text_cell(s: &str) -> RawCell {
    let s = s.trim();
    if s.is_empty() {
        RawCell::Empty
    } else {
        RawCell::Text(s.to_string())
    }
}

fn workbook_cell(cell: &Data) -> RawCell {
    match cell {
        Data::Empty => RawCell::Empty,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => text_cell(s),
        Data::Float(f) => RawCell::Number(*f),
        Data::Int(i) => RawCell::Number(*i as f64),
        Data::Bool(b) => RawCell::Text(b.to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(dt) => RawCell::Date(dt.date()),
            None => RawCell::Number(dt.as_f64()),
        },
        Data::Error(e) => {
            debug!(error = ?e, "workbook cell error treated as empty");
            RawCell::Empty
        }
    }
}

/// Column positions of every schema field in the header line.
struct ColumnIndex {
    developer_name: usize,
    area: usize,
    asset_type: usize,
    configuration: usize,
    launch_date: usize,
    handover_date: usize,
    total_units: usize,
    project_area_acres: usize,
}

impl ColumnIndex {
    fn resolve(headers: &[String], columns: &ColumnMap) -> Result<Self> {
        let mut missing = Vec::new();
        let mut find = |name: &str| {
            let pos = headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name.trim()));
            if pos.is_none() {
                missing.push(name.to_string());
            }
            pos.unwrap_or(usize::MAX)
        };
        let index = ColumnIndex {
            developer_name: find(&columns.developer_name),
            area: find(&columns.area),
            asset_type: find(&columns.asset_type),
            configuration: find(&columns.configuration),
            launch_date: find(&columns.launch_date),
            handover_date: find(&columns.handover_date),
            total_units: find(&columns.total_units),
            project_area_acres: find(&columns.project_area_acres),
        };
        if !missing.is_empty() {
            return Err(PipelineError::Schema { missing });
        }
        Ok(index)
    }
}

fn from_rows(rows: Vec<SourceRow>, header_row: usize, columns: &ColumnMap) -> Result<Vec<RawRecord>> {
    let mut rows = rows.into_iter().skip(header_row);
    let (header_line, header) = rows.next().ok_or(PipelineError::MissingHeader {
        line: header_row + 1,
    })?;
    let headers: Vec<String> = header.iter().map(RawCell::display).collect();
    debug!(line = header_line, columns = headers.len(), "header found");
    let idx = ColumnIndex::resolve(&headers, columns)?;

    let cell = |cells: &[RawCell], i: usize| cells.get(i).cloned().unwrap_or(RawCell::Empty);
    let records = rows
        .map(|(line, cells)| RawRecord {
            row: line,
            developer_name: cell(&cells, idx.developer_name),
            area: cell(&cells, idx.area),
            asset_type: cell(&cells, idx.asset_type),
            configuration: cell(&cells, idx.configuration),
            launch_date: cell(&cells, idx.launch_date),
            handover_date: cell(&cells, idx.handover_date),
            total_units: cell(&cells, idx.total_units),
            project_area_acres: cell(&cells, idx.project_area_acres),
        })
        .filter(|r| !r.is_blank())
        .collect();
    Ok(records)
}
