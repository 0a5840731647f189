//! Site Data Loader Module
//! Discovers the per-site environment CSVs and growth sheets, parses them with
//! Polars and assembles the two site-keyed collections.

use super::locator::{normalize_nfc, Locator};
use super::table::{ec_deltas, EnvironmentRecord, EnvironmentTable, GrowthTable};
use super::workbook::{clean_label, SiteWorkbook};
use crate::config::{DashboardConfig, Site};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const TIME_COLUMN: &str = "time";
pub const EC_COLUMN: &str = "ec";
pub const TEMPERATURE_COLUMN: &str = "temperature";
pub const HUMIDITY_COLUMN: &str = "humidity";
pub const PH_COLUMN: &str = "ph";

const DATETIME_FORMATS: [&str; 10] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y.%m.%d %H:%M:%S",
    "%Y.%m.%d %H:%M",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"];

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to read CSV: {0}")]
    CsvError(#[from] PolarsError),
    #[error("Failed to read workbook: {0}")]
    WorkbookError(#[from] calamine::XlsxError),
    #[error("Missing required column '{column}'")]
    MissingColumn { column: String },
    #[error("Column '{column}' is not numeric")]
    NonNumericColumn { column: String },
    #[error("Duplicate column label '{column}'")]
    DuplicateColumn { column: String },
    #[error("Row {row}: empty value in required column '{column}'")]
    MissingValue { column: String, row: usize },
    #[error("Row {row}: cannot parse '{value}' in column '{column}' as a number")]
    InvalidNumber {
        column: String,
        row: usize,
        value: String,
    },
    #[error("Row {row}: cannot parse timestamp '{value}'")]
    InvalidTimestamp { row: usize, value: String },
    #[error("Sheet '{sheet}' has no header row")]
    EmptySheet { sheet: String },
}

/// Result of loading one site's table.
#[derive(Debug)]
pub enum SiteOutcome<T> {
    Loaded(T),
    /// No file or sheet matched the site
    Absent,
    /// A source was found but could not be parsed
    Failed(LoadError),
}

/// Non-fatal problem met while loading one site.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadWarning {
    MissingEnvironmentFile { site: String, keyword: String },
    EnvironmentParse { site: String, path: PathBuf, error: String },
    MissingSheet { site: String },
    SheetParse { site: String, error: String },
}

impl LoadWarning {
    pub fn site(&self) -> &str {
        match self {
            LoadWarning::MissingEnvironmentFile { site, .. }
            | LoadWarning::EnvironmentParse { site, .. }
            | LoadWarning::MissingSheet { site }
            | LoadWarning::SheetParse { site, .. } => site,
        }
    }
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadWarning::MissingEnvironmentFile { site, keyword } => {
                write!(f, "{site}: no environment file matching '{keyword}'")
            }
            LoadWarning::EnvironmentParse { site, path, error } => {
                write!(f, "{site}: failed to load {}: {error}", path.display())
            }
            LoadWarning::MissingSheet { site } => {
                write!(f, "{site}: no sheet with this name in the workbook")
            }
            LoadWarning::SheetParse { site, error } => {
                write!(f, "{site}: failed to load growth sheet: {error}")
            }
        }
    }
}

/// Condition that leaves the growth collection empty.
#[derive(Debug, Clone, PartialEq)]
pub enum FatalError {
    WorkbookNotFound { dir: PathBuf, name: String },
    WorkbookUnreadable { path: PathBuf, error: String },
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FatalError::WorkbookNotFound { dir, name } => {
                write!(f, "growth workbook '{name}' not found in {}", dir.display())
            }
            FatalError::WorkbookUnreadable { path, error } => {
                write!(f, "growth workbook {} cannot be read: {error}", path.display())
            }
        }
    }
}

/// Everything one load cycle produced. Keys are NFC site names.
#[derive(Debug, Default)]
pub struct Dataset {
    pub environment: BTreeMap<String, EnvironmentTable>,
    pub growth: BTreeMap<String, GrowthTable>,
    pub warnings: Vec<LoadWarning>,
    pub fatal: Option<FatalError>,
    pub workbook_path: Option<PathBuf>,
}

impl Dataset {
    pub fn environment_for(&self, site: &str) -> Option<&EnvironmentTable> {
        self.environment.get(&normalize_nfc(site))
    }

    pub fn growth_for(&self, site: &str) -> Option<&GrowthTable> {
        self.growth.get(&normalize_nfc(site))
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal.is_some()
    }

    /// Growth tables in the configured site order.
    pub fn growth_in_order<'a>(&'a self, sites: &[Site]) -> Vec<&'a GrowthTable> {
        sites
            .iter()
            .filter_map(|site| self.growth_for(&site.name))
            .collect()
    }
}

/// Loads site data from the configured directory.
pub struct DataLoader {
    config: DashboardConfig,
}

impl DataLoader {
    pub fn new(config: DashboardConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Run a full load cycle: environment files, then workbook, then sheets.
    pub fn load(&self) -> Dataset {
        let locator = Locator::new(&self.config.data_dir);
        let mut dataset = Dataset::default();

        info!(dir = %locator.dir().display(), sites = self.config.sites.len(), "loading site data");

        for site in &self.config.sites {
            match self.load_environment_site(&locator, site) {
                SiteOutcome::Loaded(table) => {
                    debug!(site = %site.name, rows = table.len(), "environment table loaded");
                    dataset.environment.insert(site.key(), table);
                }
                SiteOutcome::Absent => {
                    let warning = LoadWarning::MissingEnvironmentFile {
                        site: site.name.clone(),
                        keyword: self.config.environment_keyword(site),
                    };
                    warn!("{}", warning);
                    dataset.warnings.push(warning);
                }
                SiteOutcome::Failed(e) => {
                    let warning = LoadWarning::EnvironmentParse {
                        site: site.name.clone(),
                        path: self
                            .locate_environment(&locator, site)
                            .unwrap_or_default(),
                        error: e.to_string(),
                    };
                    warn!("{}", warning);
                    dataset.warnings.push(warning);
                }
            }
        }

        let workbook_source = &self.config.workbook;
        let Some(workbook_path) = locator.find(&workbook_source.name, workbook_source.match_mode)
        else {
            let fatal = FatalError::WorkbookNotFound {
                dir: self.config.data_dir.clone(),
                name: workbook_source.name.clone(),
            };
            warn!("{}", fatal);
            dataset.fatal = Some(fatal);
            return dataset;
        };

        let mut workbook = match SiteWorkbook::open(&workbook_path) {
            Ok(workbook) => workbook,
            Err(e) => {
                let fatal = FatalError::WorkbookUnreadable {
                    path: workbook_path,
                    error: e.to_string(),
                };
                warn!("{}", fatal);
                dataset.fatal = Some(fatal);
                return dataset;
            }
        };
        debug!(path = %workbook.path().display(), sheets = ?workbook.sheet_names(), "workbook opened");

        for site in &self.config.sites {
            match self.load_growth_site(&mut workbook, site) {
                SiteOutcome::Loaded(table) => {
                    debug!(
                        site = %site.name,
                        rows = table.height(),
                        columns = ?table.column_names(),
                        "growth table loaded"
                    );
                    dataset.growth.insert(site.key(), table);
                }
                SiteOutcome::Absent => {
                    let warning = LoadWarning::MissingSheet {
                        site: site.name.clone(),
                    };
                    warn!("{}", warning);
                    dataset.warnings.push(warning);
                }
                SiteOutcome::Failed(e) => {
                    let warning = LoadWarning::SheetParse {
                        site: site.name.clone(),
                        error: e.to_string(),
                    };
                    warn!("{}", warning);
                    dataset.warnings.push(warning);
                }
            }
        }

        dataset.workbook_path = Some(workbook_path);
        info!(
            environment = dataset.environment.len(),
            growth = dataset.growth.len(),
            warnings = dataset.warnings.len(),
            "load complete"
        );
        dataset
    }

    fn locate_environment(&self, locator: &Locator, site: &Site) -> Option<PathBuf> {
        let keyword = self.config.environment_keyword(site);
        locator.find(&keyword, self.config.environment.match_mode)
    }

    /// Locate and parse one site's environment CSV.
    pub fn load_environment_site(
        &self,
        locator: &Locator,
        site: &Site,
    ) -> SiteOutcome<EnvironmentTable> {
        let Some(path) = self.locate_environment(locator, site) else {
            return SiteOutcome::Absent;
        };
        match load_environment_csv(&path, &site.name) {
            Ok(table) => SiteOutcome::Loaded(table),
            Err(e) => SiteOutcome::Failed(e),
        }
    }

    /// Locate and parse one site's growth sheet, stamping site and target EC.
    pub fn load_growth_site(
        &self,
        workbook: &mut SiteWorkbook,
        site: &Site,
    ) -> SiteOutcome<GrowthTable> {
        let Some(sheet) = workbook.find_sheet(&site.name) else {
            return SiteOutcome::Absent;
        };
        match self.build_growth_table(workbook, &sheet, site) {
            Ok(table) => SiteOutcome::Loaded(table),
            Err(e) => SiteOutcome::Failed(e),
        }
    }

    fn build_growth_table(
        &self,
        workbook: &mut SiteWorkbook,
        sheet: &str,
        site: &Site,
    ) -> Result<GrowthTable, LoadError> {
        let labels = &self.config.growth_columns;
        let parsed = workbook.read_sheet(sheet)?;

        let fresh_weight = parsed
            .columns
            .iter()
            .find(|c| c.name().as_str() == labels.fresh_weight)
            .ok_or_else(|| LoadError::MissingColumn {
                column: labels.fresh_weight.clone(),
            })?;
        if fresh_weight.dtype() != &DataType::Float64 {
            return Err(LoadError::NonNumericColumn {
                column: labels.fresh_weight.clone(),
            });
        }

        // Stamped columns replace any same-named columns, e.g. from an exported workbook
        let mut columns: Vec<Column> = parsed
            .columns
            .into_iter()
            .filter(|c| {
                let name = c.name().as_str();
                name != labels.site && name != labels.target_ec
            })
            .collect();
        columns.push(Column::new(
            labels.site.as_str().into(),
            vec![site.name.clone(); parsed.height],
        ));
        columns.push(Column::new(
            labels.target_ec.as_str().into(),
            vec![site.target_ec; parsed.height],
        ));

        let frame = DataFrame::new(columns)?;
        Ok(GrowthTable::new(
            site.name.clone(),
            site.target_ec,
            frame,
            labels.clone(),
        ))
    }
}

/// Parse an environment CSV. Every column is read as text and converted here so
/// that bad values are reported with their row.
pub fn load_environment_csv(path: &Path, site: &str) -> Result<EnvironmentTable, LoadError> {
    let df = LazyCsvReader::new(path)
        .with_infer_schema_length(Some(0))
        .finish()?
        .collect()?;

    let find = |label: &str| {
        df.get_columns()
            .iter()
            .find(|c| clean_label(c.name().as_str()) == label)
    };
    let required = |label: &str| {
        find(label).ok_or_else(|| LoadError::MissingColumn {
            column: label.to_string(),
        })
    };

    let times = text_values(required(TIME_COLUMN)?)?;
    let ec = required_numbers(EC_COLUMN, text_values(required(EC_COLUMN)?)?)?;
    let temperature = optional_numbers(TEMPERATURE_COLUMN, find(TEMPERATURE_COLUMN), df.height())?;
    let humidity = optional_numbers(HUMIDITY_COLUMN, find(HUMIDITY_COLUMN), df.height())?;
    let ph = optional_numbers(PH_COLUMN, find(PH_COLUMN), df.height())?;
    let deltas = ec_deltas(&ec);

    let mut records = Vec::with_capacity(df.height());
    for (i, raw_time) in times.into_iter().enumerate() {
        let row = i + 1;
        let raw_time = raw_time.ok_or_else(|| LoadError::MissingValue {
            column: TIME_COLUMN.to_string(),
            row,
        })?;
        let time = parse_timestamp(&raw_time)
            .ok_or(LoadError::InvalidTimestamp { row, value: raw_time })?;
        records.push(EnvironmentRecord {
            time,
            ec: ec[i],
            temperature: temperature[i],
            humidity: humidity[i],
            ph: ph[i],
            ec_delta: deltas[i],
        });
    }

    Ok(EnvironmentTable {
        site: site.to_string(),
        records,
    })
}

fn text_values(column: &Column) -> Result<Vec<Option<String>>, LoadError> {
    let as_text = column.cast(&DataType::String)?;
    let ca = as_text.str()?;
    Ok(ca
        .into_iter()
        .map(|v| v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string))
        .collect())
}

fn required_numbers(label: &str, values: Vec<Option<String>>) -> Result<Vec<f64>, LoadError> {
    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| {
            let raw = v.ok_or_else(|| LoadError::MissingValue {
                column: label.to_string(),
                row: i + 1,
            })?;
            parse_number(label, i + 1, raw)
        })
        .collect()
}

fn optional_numbers(
    label: &str,
    column: Option<&Column>,
    height: usize,
) -> Result<Vec<Option<f64>>, LoadError> {
    let Some(column) = column else {
        return Ok(vec![None; height]);
    };
    text_values(column)?
        .into_iter()
        .enumerate()
        .map(|(i, v)| v.map(|raw| parse_number(label, i + 1, raw)).transpose())
        .collect()
}

fn parse_number(label: &str, row: usize, raw: String) -> Result<f64, LoadError> {
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(LoadError::InvalidNumber {
            column: label.to_string(),
            row,
            value: raw,
        }),
    }
}

/// Parse the timestamp layouts seen in sensor exports.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchMode;
    use crate::export::XlsxExporter;
    use std::fs;
    use unicode_normalization::UnicodeNormalization;

    fn write_env(dir: &Path, file_name: &str, body: &str) {
        fs::write(dir.join(file_name), body).unwrap();
    }

    fn env_body(values: &[f64]) -> String {
        let mut body = String::from("time,ec,temperature,humidity,ph\n");
        for (i, v) in values.iter().enumerate() {
            body.push_str(&format!("2025-05-26 {:02}:00:00,{v},21.5,60.0,6.1\n", i % 24));
        }
        body
    }

    fn config_for(dir: &Path) -> DashboardConfig {
        DashboardConfig {
            data_dir: dir.to_path_buf(),
            ..DashboardConfig::default()
        }
    }

    /// Build a growth workbook through the exporter, one sheet per given site.
    fn write_growth_workbook(dir: &Path, config: &DashboardConfig, sites: &[(&str, usize)]) {
        let labels = &config.growth_columns;
        let tables: Vec<GrowthTable> = sites
            .iter()
            .map(|(name, rows)| {
                let weights: Vec<Option<f64>> = (0..*rows).map(|i| Some(1.0 + i as f64 * 0.5)).collect();
                let leaves: Vec<Option<f64>> = (0..*rows).map(|i| Some((3 + i % 4) as f64)).collect();
                let frame = DataFrame::new(vec![
                    Column::new(labels.fresh_weight.as_str().into(), weights),
                    Column::new(labels.leaf_count.as_str().into(), leaves),
                ])
                .unwrap();
                GrowthTable::new(name.to_string(), 1.0, frame, labels.clone())
            })
            .collect();
        let refs: Vec<&GrowthTable> = tables.iter().collect();
        XlsxExporter::write_to(&refs, &dir.join(&config.workbook.name)).unwrap();
    }

    #[test]
    fn test_parse_timestamp_layouts() {
        let expected = NaiveDate::from_ymd_opt(2025, 5, 26)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        for raw in [
            "2025-05-26 09:30:00",
            "2025-05-26T09:30:00",
            "2025-05-26 09:30",
            "2025/05/26 09:30",
            " 2025-05-26 09:30:00.000 ",
            "2025-05-26T09:30:00+00:00",
        ] {
            assert_eq!(parse_timestamp(raw), Some(expected), "{raw}");
        }
        assert_eq!(
            parse_timestamp("2025-05-26"),
            NaiveDate::from_ymd_opt(2025, 5, 26).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_load_environment_csv_with_padded_labels() {
        let dir = tempfile::tempdir().unwrap();
        write_env(
            dir.path(),
            "site.csv",
            "time , ec ,temperature\n2025-05-26 10:00:00,1.0,20\n2025-05-26 11:00:00,1.5,\n2025-05-26 12:00:00,1.25,22\n",
        );
        let table = load_environment_csv(&dir.path().join("site.csv"), "동산고").unwrap();
        assert_eq!(table.ec_values(), vec![1.0, 1.5, 1.25]);
        assert_eq!(table.ec_deltas(), vec![0.0, 0.5, 0.25]);
        assert_eq!(table.records[1].temperature, None);
        assert_eq!(table.records[2].temperature, Some(22.0));
        assert_eq!(table.records[0].humidity, None);
    }

    #[test]
    fn test_single_row_delta_is_zero() {
        let dir = tempfile::tempdir().unwrap();
        write_env(dir.path(), "one.csv", "time,ec\n2025-05-26 10:00:00,3.3\n");
        let table = load_environment_csv(&dir.path().join("one.csv"), "s").unwrap();
        assert_eq!(table.ec_deltas(), vec![0.0]);
    }

    #[test]
    fn test_malformed_values_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        write_env(dir.path(), "bad_ec.csv", "time,ec\n2025-05-26 10:00:00,1.0\n2025-05-26 11:00:00,high\n");
        write_env(dir.path(), "bad_time.csv", "time,ec\nnot a time,1.0\n");
        write_env(dir.path(), "no_ec.csv", "time,temperature\n2025-05-26 10:00:00,20\n");

        match load_environment_csv(&dir.path().join("bad_ec.csv"), "s") {
            Err(LoadError::InvalidNumber { column, row, value }) => {
                assert_eq!((column.as_str(), row, value.as_str()), ("ec", 2, "high"));
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(
            load_environment_csv(&dir.path().join("bad_time.csv"), "s"),
            Err(LoadError::InvalidTimestamp { row: 1, .. })
        ));
        match load_environment_csv(&dir.path().join("no_ec.csv"), "s") {
            Err(LoadError::MissingColumn { column }) => assert_eq!(column, "ec"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_absent_site_is_omitted() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        for site in &config.sites[..3] {
            write_env(dir.path(), &config.environment_keyword(site), &env_body(&[1.0, 1.2]));
        }
        write_growth_workbook(dir.path(), &config, &[("동산고", 3), ("송도고", 3), ("아라고", 3), ("하늘고", 3)]);

        let dataset = DataLoader::new(config.clone()).load();
        assert_eq!(dataset.environment.len(), 3);
        assert!(dataset.environment_for("하늘고").is_none());
        assert!(dataset.environment_for("동산고").is_some());
        assert_eq!(
            dataset.warnings,
            vec![LoadWarning::MissingEnvironmentFile {
                site: "하늘고".into(),
                keyword: "하늘고_환경데이터.csv".into(),
            }]
        );
        assert!(!dataset.is_fatal());
    }

    #[test]
    fn test_parse_failure_does_not_stop_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        write_env(dir.path(), "동산고_환경데이터.csv", "time,ec\n2025-05-26 10:00:00,oops\n");
        write_env(dir.path(), "송도고_환경데이터.csv", &env_body(&[2.0, 2.1, 1.9]));

        let dataset = DataLoader::new(config).load();
        assert_eq!(dataset.environment.keys().collect::<Vec<_>>(), vec!["송도고"]);
        assert!(dataset.warnings.iter().any(|w| matches!(
            w,
            LoadWarning::EnvironmentParse { site, .. } if site == "동산고"
        )));
    }

    #[test]
    fn test_decomposed_file_names_are_found() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        let stored: String = "아라고_환경데이터.csv".nfd().collect();
        write_env(dir.path(), &stored, &env_body(&[8.0, 7.5]));

        let dataset = DataLoader::new(config).load();
        assert_eq!(dataset.environment_for("아라고").unwrap().len(), 2);
    }

    #[test]
    fn test_contains_mode_matches_keyword() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_for(dir.path());
        config.environment.pattern = "{site}".into();
        config.environment.match_mode = MatchMode::Contains;
        write_env(dir.path(), "20250526_송도고_환경데이터.csv.csv", &env_body(&[2.0]));

        let dataset = DataLoader::new(config).load();
        assert!(dataset.environment_for("송도고").is_some());
    }

    #[test]
    fn test_missing_workbook_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        write_env(dir.path(), "동산고_환경데이터.csv", &env_body(&[1.0]));

        let dataset = DataLoader::new(config).load();
        assert!(dataset.growth.is_empty());
        assert!(matches!(dataset.fatal, Some(FatalError::WorkbookNotFound { .. })));
        assert_eq!(dataset.environment.len(), 1);
    }

    #[test]
    fn test_missing_directory_degrades_to_fatal_empty() {
        let config = config_for(Path::new("/no/such/data/dir"));
        let dataset = DataLoader::new(config).load();
        assert!(dataset.environment.is_empty());
        assert!(dataset.growth.is_empty());
        assert!(dataset.is_fatal());
        assert_eq!(dataset.warnings.len(), 4);
    }

    #[test]
    fn test_missing_sheet_is_recoverable() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        write_growth_workbook(dir.path(), &config, &[("동산고", 4), ("송도고", 5), ("하늘고", 6)]);

        let dataset = DataLoader::new(config).load();
        assert!(!dataset.is_fatal());
        assert_eq!(dataset.growth.len(), 3);
        assert!(dataset.growth_for("아라고").is_none());
        assert!(dataset
            .warnings
            .contains(&LoadWarning::MissingSheet { site: "아라고".into() }));
    }

    #[test]
    fn test_growth_rows_are_stamped() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        write_growth_workbook(dir.path(), &config, &[("아라고", 3)]);

        let dataset = DataLoader::new(config.clone()).load();
        let table = dataset.growth_for("아라고").unwrap();
        let labels = &config.growth_columns;
        assert_eq!(table.target_ec, 8.0);
        assert_eq!(
            table.numeric_column(&labels.target_ec).unwrap(),
            vec![Some(8.0); 3]
        );
        let sites = table.frame().column(&labels.site).unwrap();
        let sites: Vec<Option<&str>> = sites.str().unwrap().into_iter().collect();
        assert_eq!(sites, vec![Some("아라고"); 3]);
        assert_eq!(table.fresh_weights(), vec![1.0, 1.5, 2.0]);
        assert_eq!(table.column_names().len(), 4);
    }

    #[test]
    fn test_sheet_without_fresh_weight_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_for(dir.path());
        write_growth_workbook(dir.path(), &config, &[("동산고", 2)]);
        config.growth_columns.fresh_weight = "건중량(g)".into();

        let dataset = DataLoader::new(config).load();
        assert!(dataset.growth.is_empty());
        assert!(dataset.warnings.iter().any(|w| matches!(
            w,
            LoadWarning::SheetParse { site, .. } if site == "동산고"
        )));
    }
}
