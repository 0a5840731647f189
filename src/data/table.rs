//! Site Tables
//! Environment time series and growth outcome tables produced by the loader.

use crate::config::GrowthColumns;
use chrono::NaiveDateTime;
use polars::prelude::*;

/// Absolute change between consecutive readings; the first entry is always 0.
pub fn ec_deltas(values: &[f64]) -> Vec<f64> {
    let mut deltas = Vec::with_capacity(values.len());
    if let Some(first) = values.first() {
        deltas.push(0.0);
        let mut prev = *first;
        for &v in &values[1..] {
            deltas.push((v - prev).abs());
            prev = v;
        }
    }
    deltas
}

/// One sensor reading.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentRecord {
    pub time: NaiveDateTime,
    pub ec: f64,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub ph: Option<f64>,
    pub ec_delta: f64,
}

/// Time series for one site, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentTable {
    pub site: String,
    pub records: Vec<EnvironmentRecord>,
}

impl EnvironmentTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ec_values(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.ec).collect()
    }

    pub fn ec_deltas(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.ec_delta).collect()
    }

    /// Timestamps as seconds since the epoch, for plotting.
    pub fn time_axis(&self) -> Vec<f64> {
        self.records
            .iter()
            .map(|r| r.time.and_utc().timestamp() as f64)
            .collect()
    }
}

/// Growth results for one site.
///
/// The frame keeps the sheet's columns in sheet order, followed by the stamped
/// site and target EC columns.
#[derive(Debug, Clone)]
pub struct GrowthTable {
    pub site: String,
    pub target_ec: f64,
    frame: DataFrame,
    columns: GrowthColumns,
}

impl GrowthTable {
    pub(crate) fn new(site: String, target_ec: f64, frame: DataFrame, columns: GrowthColumns) -> Self {
        Self {
            site,
            target_ec,
            frame,
            columns,
        }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Values of a column as reals; `None` if the column does not exist.
    pub fn numeric_column(&self, label: &str) -> Option<Vec<Option<f64>>> {
        let column = self.frame.column(label).ok()?;
        let cast = column.cast(&DataType::Float64).ok()?;
        let ca = cast.f64().ok()?;
        Some(ca.into_iter().collect())
    }

    /// Non-null fresh weights in row order.
    pub fn fresh_weights(&self) -> Vec<f64> {
        self.present_values(&self.columns.fresh_weight)
            .unwrap_or_default()
    }

    pub fn leaf_counts(&self) -> Option<Vec<i64>> {
        self.present_values(&self.columns.leaf_count)
            .map(|values| values.into_iter().map(|v| v.round() as i64).collect())
    }

    pub fn shoot_lengths(&self) -> Option<Vec<f64>> {
        self.present_values(&self.columns.shoot_length)
    }

    pub fn root_lengths(&self) -> Option<Vec<f64>> {
        self.present_values(&self.columns.root_length)
    }

    fn present_values(&self, label: &str) -> Option<Vec<f64>> {
        self.numeric_column(label)
            .map(|values| values.into_iter().flatten().filter(|v| !v.is_nan()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ec_deltas() {
        assert_eq!(ec_deltas(&[1.0, 1.5, 1.25, 1.25]), vec![0.0, 0.5, 0.25, 0.0]);
        assert_eq!(ec_deltas(&[2.0]), vec![0.0]);
        assert!(ec_deltas(&[]).is_empty());
    }

    #[test]
    fn test_ec_deltas_are_exact_differences() {
        let values = [0.9, 2.4, 1.1, 1.1, 7.75];
        let deltas = ec_deltas(&values);
        assert_eq!(deltas[0], 0.0);
        for i in 1..values.len() {
            assert_eq!(deltas[i], (values[i] - values[i - 1]).abs());
        }
    }

    #[test]
    fn test_growth_accessors() {
        let columns = GrowthColumns::default();
        let frame = DataFrame::new(vec![
            Column::new(columns.fresh_weight.as_str().into(), vec![Some(1.5), None, Some(2.5)]),
            Column::new(columns.leaf_count.as_str().into(), vec![Some(4.0), Some(5.0), Some(6.0)]),
            Column::new("memo".into(), vec![Some("a".to_string()), None, Some("c".to_string())]),
        ])
        .unwrap();
        let table = GrowthTable::new("동산고".into(), 1.0, frame, columns);

        assert_eq!(table.height(), 3);
        assert_eq!(table.fresh_weights(), vec![1.5, 2.5]);
        assert_eq!(table.leaf_counts(), Some(vec![4, 5, 6]));
        assert_eq!(table.shoot_lengths(), None);
        assert_eq!(table.column_names()[2], "memo");
    }
}
