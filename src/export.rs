//! XLSX Export Module
//! Writes the growth collection as a workbook, one sheet per site.
//!
//! The package is assembled directly as ZIP/XML parts (SpreadsheetML), the same
//! way the chart report parts are generated, so no spreadsheet writer crate is needed.

use crate::data::GrowthTable;
use polars::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Seek, Write};
use std::path::Path;
use thiserror::Error;
use tracing::info;
use ::zip::write::FileOptions;
use ::zip::{CompressionMethod, ZipWriter};

/// Excel's sheet name length limit
const MAX_SHEET_NAME_LEN: usize = 31;
const FORBIDDEN_SHEET_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];
const MS_PER_DAY: f64 = 86_400_000.0;
/// Serial number of 1970-01-01 in the 1900 date system
const UNIX_EPOCH_SERIAL: f64 = 25_569.0;
/// Index of the date-time entry in `cellXfs`
const DATETIME_STYLE: usize = 1;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Nothing to export")]
    Empty,
    #[error("Invalid sheet name '{0}'")]
    InvalidSheetName(String),
    #[error("Duplicate sheet name '{0}'")]
    DuplicateSheet(String),
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("ZIP error: {0}")]
    ZipError(#[from] ::zip::result::ZipError),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Single cell of an exported sheet.
#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Empty,
    Number(f64),
    /// Serial date, written with the date-time number format
    Date(f64),
    /// Index into the shared string table
    Text(usize),
}

/// Deduplicated string table shared by all sheets.
#[derive(Default)]
struct SharedStrings {
    index: HashMap<String, usize>,
    strings: Vec<String>,
    references: usize,
}

impl SharedStrings {
    fn intern(&mut self, s: &str) -> usize {
        self.references += 1;
        if let Some(&idx) = self.index.get(s) {
            return idx;
        }
        let idx = self.strings.len();
        self.strings.push(s.to_string());
        self.index.insert(s.to_string(), idx);
        idx
    }
}

/// Writes growth tables to `.xlsx`.
pub struct XlsxExporter;

impl XlsxExporter {
    /// Build the workbook in memory.
    pub fn to_bytes(tables: &[&GrowthTable]) -> Result<Vec<u8>, ExportError> {
        let mut buffer = Cursor::new(Vec::new());
        Self::write_package(tables, &mut buffer)?;
        Ok(buffer.into_inner())
    }

    /// Build the workbook and write it to `path`.
    pub fn write_to(tables: &[&GrowthTable], path: &Path) -> Result<(), ExportError> {
        let bytes = Self::to_bytes(tables)?;
        fs::write(path, &bytes)?;
        info!(
            path = %path.display(),
            sheets = tables.len(),
            bytes = bytes.len(),
            "workbook exported"
        );
        Ok(())
    }

    fn write_package<W: Write + Seek>(
        tables: &[&GrowthTable],
        writer: W,
    ) -> Result<(), ExportError> {
        if tables.is_empty() {
            return Err(ExportError::Empty);
        }
        Self::validate_sheet_names(tables)?;

        let mut shared = SharedStrings::default();
        let sheets: Vec<String> = tables
            .iter()
            .map(|table| Self::sheet_xml(table, &mut shared))
            .collect::<Result<_, _>>()?;

        let mut zip = ZipWriter::new(writer);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        // 1. [Content_Types].xml
        zip.start_file("[Content_Types].xml", options)?;
        zip.write_all(Self::content_types_xml(sheets.len()).as_bytes())?;

        // 2. _rels/.rels
        zip.start_file("_rels/.rels", options)?;
        zip.write_all(Self::rels_xml().as_bytes())?;

        // 3. xl/workbook.xml and its relationships
        zip.start_file("xl/workbook.xml", options)?;
        zip.write_all(Self::workbook_xml(tables).as_bytes())?;

        zip.start_file("xl/_rels/workbook.xml.rels", options)?;
        zip.write_all(Self::workbook_rels_xml(sheets.len()).as_bytes())?;

        // 4. Styles and shared strings
        zip.start_file("xl/styles.xml", options)?;
        zip.write_all(Self::styles_xml().as_bytes())?;

        zip.start_file("xl/sharedStrings.xml", options)?;
        zip.write_all(Self::shared_strings_xml(&shared).as_bytes())?;

        // 5. Worksheets
        for (idx, sheet) in sheets.iter().enumerate() {
            zip.start_file(format!("xl/worksheets/sheet{}.xml", idx + 1), options)?;
            zip.write_all(sheet.as_bytes())?;
        }

        zip.finish()?;
        Ok(())
    }

    fn validate_sheet_names(tables: &[&GrowthTable]) -> Result<(), ExportError> {
        let mut seen = Vec::with_capacity(tables.len());
        for table in tables {
            let name = &table.site;
            let invalid = name.trim().is_empty()
                || name.chars().count() > MAX_SHEET_NAME_LEN
                || name.contains(&FORBIDDEN_SHEET_CHARS[..])
                || name.starts_with('\'')
                || name.ends_with('\'');
            if invalid {
                return Err(ExportError::InvalidSheetName(name.clone()));
            }
            let lower = name.to_lowercase();
            if seen.contains(&lower) {
                return Err(ExportError::DuplicateSheet(name.clone()));
            }
            seen.push(lower);
        }
        Ok(())
    }

    /// Extract one column as cells: numbers for numeric dtypes, serial dates for
    /// date-time dtypes and text otherwise.
    fn column_cells(column: &Column, shared: &mut SharedStrings) -> Result<Vec<Cell>, ExportError> {
        if matches!(column.dtype(), DataType::Datetime(_, _) | DataType::Date) {
            let millis = column
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
                .cast(&DataType::Int64)?;
            return Ok(millis
                .i64()?
                .into_iter()
                .map(|v| match v {
                    Some(ms) => Cell::Date(ms as f64 / MS_PER_DAY + UNIX_EPOCH_SERIAL),
                    None => Cell::Empty,
                })
                .collect());
        }

        let numeric = matches!(
            column.dtype(),
            DataType::Float32
                | DataType::Float64
                | DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::UInt64
        );

        if numeric {
            let values = column.cast(&DataType::Float64)?;
            Ok(values
                .f64()?
                .into_iter()
                .map(|v| match v {
                    Some(n) if n.is_finite() => Cell::Number(n),
                    _ => Cell::Empty,
                })
                .collect())
        } else {
            let values = column.cast(&DataType::String)?;
            Ok(values
                .str()?
                .into_iter()
                .map(|v| match v {
                    Some(s) => Cell::Text(shared.intern(s)),
                    None => Cell::Empty,
                })
                .collect())
        }
    }

    fn sheet_xml(table: &GrowthTable, shared: &mut SharedStrings) -> Result<String, ExportError> {
        let frame = table.frame();
        let header: Vec<Cell> = frame
            .get_column_names()
            .iter()
            .map(|name| Cell::Text(shared.intern(name.as_str())))
            .collect();
        let columns: Vec<Vec<Cell>> = frame
            .get_columns()
            .iter()
            .map(|column| Self::column_cells(column, shared))
            .collect::<Result<_, _>>()?;

        let mut rows = String::new();
        Self::push_row(&mut rows, 1, header.iter());
        for row_idx in 0..frame.height() {
            Self::push_row(
                &mut rows,
                row_idx + 2,
                columns.iter().map(|column| &column[row_idx]),
            );
        }

        let last_cell = format!(
            "{}{}",
            Self::column_letters(columns.len().max(1) - 1),
            frame.height() + 1
        );

        Ok(format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<dimension ref="A1:{}"/>
<sheetData>{}</sheetData>
</worksheet>"#,
            last_cell, rows
        ))
    }

    fn push_row<'a>(out: &mut String, row_number: usize, cells: impl Iterator<Item = &'a Cell>) {
        out.push_str(&format!(r#"<row r="{}">"#, row_number));
        for (col_idx, cell) in cells.enumerate() {
            let reference = format!("{}{}", Self::column_letters(col_idx), row_number);
            match cell {
                Cell::Empty => {}
                Cell::Number(n) => {
                    out.push_str(&format!(r#"<c r="{}"><v>{}</v></c>"#, reference, n));
                }
                Cell::Date(serial) => {
                    out.push_str(&format!(
                        r#"<c r="{}" s="{}"><v>{}</v></c>"#,
                        reference, DATETIME_STYLE, serial
                    ));
                }
                Cell::Text(idx) => {
                    out.push_str(&format!(r#"<c r="{}" t="s"><v>{}</v></c>"#, reference, idx));
                }
            }
        }
        out.push_str("</row>");
    }

    /// Zero-based column index to spreadsheet letters (0 → A, 26 → AA).
    fn column_letters(mut index: usize) -> String {
        let mut letters = Vec::new();
        loop {
            letters.push(b'A' + (index % 26) as u8);
            if index < 26 {
                break;
            }
            index = index / 26 - 1;
        }
        letters.reverse();
        String::from_utf8(letters).unwrap_or_default()
    }

    fn escape_xml(s: &str) -> String {
        let mut escaped = String::with_capacity(s.len());
        for ch in s.chars() {
            match ch {
                '&' => escaped.push_str("&amp;"),
                '<' => escaped.push_str("&lt;"),
                '>' => escaped.push_str("&gt;"),
                '"' => escaped.push_str("&quot;"),
                '\'' => escaped.push_str("&apos;"),
                c if (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r') => {}
                c => escaped.push(c),
            }
        }
        escaped
    }

    fn content_types_xml(sheet_count: usize) -> String {
        let mut xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
<Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>
"#
        .to_string();

        for i in 1..=sheet_count {
            xml.push_str(&format!(
                r#"<Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
                i
            ));
            xml.push('\n');
        }
        xml.push_str("</Types>");
        xml
    }

    fn rels_xml() -> &'static str {
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#
    }

    fn workbook_xml(tables: &[&GrowthTable]) -> String {
        let sheets: String = tables
            .iter()
            .enumerate()
            .map(|(idx, table)| {
                format!(
                    r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
                    Self::escape_xml(&table.site),
                    idx + 1,
                    idx + 1
                )
            })
            .collect();

        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets>{}</sheets>
</workbook>"#,
            sheets
        )
    }

    fn workbook_rels_xml(sheet_count: usize) -> String {
        let mut xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
"#
        .to_string();

        for i in 1..=sheet_count {
            xml.push_str(&format!(
                r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{}.xml"/>"#,
                i, i
            ));
            xml.push('\n');
        }

        // Styles and shared strings follow the sheets
        xml.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>
</Relationships>"#,
            sheet_count + 1,
            sheet_count + 2
        ));
        xml
    }

    fn styles_xml() -> &'static str {
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts>
<fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>
<borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>
<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
<cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="22" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/></cellXfs>
<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>
</styleSheet>"#
    }

    fn shared_strings_xml(shared: &SharedStrings) -> String {
        let items: String = shared
            .strings
            .iter()
            .map(|s| format!(r#"<si><t xml:space="preserve">{}</t></si>"#, Self::escape_xml(s)))
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{}" uniqueCount="{}">{}</sst>"#,
            shared.references,
            shared.strings.len(),
            items
        )
    }
}
