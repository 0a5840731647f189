//! Workbook Reader Module
//! Opens the growth-result workbook and turns sheets into typed Polars columns.

use super::loader::parse_timestamp;
use super::locator::{match_sheet, normalize_nfc};
use super::LoadError;
use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use chrono::NaiveDateTime;
use polars::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Trim a column label and bring it to NFC form.
pub fn clean_label(raw: &str) -> String {
    normalize_nfc(raw.trim_start_matches('\u{feff}').trim())
}

/// Parsed sheet: columns in sheet order, all of the same height.
#[derive(Debug, Clone)]
pub struct SheetColumns {
    pub columns: Vec<Column>,
    pub height: usize,
}

const DATETIME_TEXT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Cell content after dropping spreadsheet-specific types.
///
/// Text cells stay text even when they look numeric ("001" is an ID, not 1.0).
#[derive(Debug, Clone, PartialEq)]
enum CellValue {
    Empty,
    Number(f64),
    DateTime(NaiveDateTime),
    Text(String),
}

impl CellValue {
    fn from_data(cell: &Data) -> Self {
        match cell {
            Data::Empty => CellValue::Empty,
            Data::Float(v) => CellValue::Number(*v),
            Data::Int(v) => CellValue::Number(*v as f64),
            Data::DateTime(dt) if dt.is_duration() => CellValue::Number(dt.as_f64()),
            Data::DateTime(dt) => match dt.as_datetime() {
                Some(value) => CellValue::DateTime(value),
                None => CellValue::Number(dt.as_f64()),
            },
            Data::DateTimeIso(raw) => match parse_timestamp(raw) {
                Some(value) => CellValue::DateTime(value),
                None => CellValue::Text(raw.clone()),
            },
            Data::String(s) if s.trim().is_empty() => CellValue::Empty,
            Data::String(s) => CellValue::Text(s.clone()),
            other => CellValue::Text(other.to_string()),
        }
    }

    fn into_text(self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Number(n) => Some(n.to_string()),
            CellValue::DateTime(dt) => Some(dt.format(DATETIME_TEXT_FORMAT).to_string()),
            CellValue::Text(s) => Some(s),
        }
    }
}

/// An opened growth-result workbook.
pub struct SiteWorkbook {
    path: PathBuf,
    inner: Xlsx<BufReader<File>>,
    sheet_names: Vec<String>,
}

impl SiteWorkbook {
    pub fn open(path: &Path) -> Result<Self, LoadError> {
        let inner: Xlsx<BufReader<File>> = open_workbook(path)?;
        let sheet_names = inner.sheet_names();
        Ok(Self {
            path: path.to_path_buf(),
            inner,
            sheet_names,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sheet_names(&self) -> &[String] {
        &self.sheet_names
    }

    /// Sheet whose name equals the site name after NFC normalization.
    pub fn find_sheet(&self, site: &str) -> Option<String> {
        match_sheet(&self.sheet_names, site).map(str::to_string)
    }

    pub fn read_sheet(&mut self, name: &str) -> Result<SheetColumns, LoadError> {
        let range = self.inner.worksheet_range(name)?;
        range_to_columns(name, &range)
    }
}

/// Convert a sheet range into columns. The first row holds the labels; fully
/// empty rows are skipped. A column becomes Float64 when every non-empty cell
/// is a numeric cell, Datetime when every one is a date cell, String otherwise.
fn range_to_columns(sheet: &str, range: &Range<Data>) -> Result<SheetColumns, LoadError> {
    let mut rows = range.rows();
    let header = rows.next().ok_or_else(|| LoadError::EmptySheet {
        sheet: sheet.to_string(),
    })?;

    let mut labels = Vec::with_capacity(header.len());
    let mut seen = HashSet::new();
    for (idx, cell) in header.iter().enumerate() {
        let label = match CellValue::from_data(cell).into_text() {
            None => format!("column_{}", idx + 1),
            Some(text) => clean_label(&text),
        };
        if !seen.insert(label.clone()) {
            return Err(LoadError::DuplicateColumn { column: label });
        }
        labels.push(label);
    }

    let mut cells: Vec<Vec<CellValue>> = vec![Vec::new(); labels.len()];
    for row in rows {
        let values: Vec<CellValue> = (0..labels.len())
            .map(|i| row.get(i).map(CellValue::from_data).unwrap_or(CellValue::Empty))
            .collect();
        if values.iter().all(|v| *v == CellValue::Empty) {
            continue;
        }
        for (column, value) in cells.iter_mut().zip(values) {
            column.push(value);
        }
    }

    let height = cells.first().map(Vec::len).unwrap_or(0);
    let columns = labels
        .into_iter()
        .zip(cells)
        .map(|(label, values)| build_column(label, values))
        .collect();

    Ok(SheetColumns { columns, height })
}

fn build_column(label: String, values: Vec<CellValue>) -> Column {
    let numeric = values
        .iter()
        .all(|v| matches!(v, CellValue::Empty | CellValue::Number(_)));
    let dates = values
        .iter()
        .all(|v| matches!(v, CellValue::Empty | CellValue::DateTime(_)));

    if numeric {
        let data: Vec<Option<f64>> = values
            .into_iter()
            .map(|v| match v {
                CellValue::Number(n) => Some(n),
                _ => None,
            })
            .collect();
        Column::new(label.into(), data)
    } else if dates {
        let data: Vec<Option<NaiveDateTime>> = values
            .into_iter()
            .map(|v| match v {
                CellValue::DateTime(dt) => Some(dt),
                _ => None,
            })
            .collect();
        Column::new(label.into(), data)
    } else {
        let data: Vec<Option<String>> = values.into_iter().map(CellValue::into_text).collect();
        Column::new(label.into(), data)
    }
}
