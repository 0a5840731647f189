//! Statistics Calculator Module
//! EC stability summaries, growth descriptive statistics and the EC-volatility
//! versus fresh-weight correlation table.

use crate::config::Site;
use crate::data::{Dataset, EnvironmentRecord, EnvironmentTable, GrowthTable};
use statrs::statistics::Statistics;

/// Minimum number of sites before a correlation coefficient is reported.
pub const MIN_CORRELATION_POINTS: usize = 3;

/// Which sites a view should consider.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SiteFilter {
    #[default]
    All,
    Only(String),
}

impl SiteFilter {
    /// Sites passing the filter, in configured order.
    pub fn apply<'a>(&self, sites: &'a [Site]) -> Vec<&'a Site> {
        match self {
            SiteFilter::All => sites.iter().collect(),
            SiteFilter::Only(name) => sites.iter().filter(|s| &s.name == name).collect(),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            SiteFilter::All => "All sites",
            SiteFilter::Only(name) => name,
        }
    }
}

/// Descriptive statistics for one sample.
#[derive(Debug, Clone)]
pub struct DescriptiveStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub variance: f64,
    pub min: f64,
    pub max: f64,
    pub p95: f64,
    pub p05: f64,
}

impl Default for DescriptiveStats {
    fn default() -> Self {
        Self {
            count: 0,
            mean: f64::NAN,
            median: f64::NAN,
            std: f64::NAN,
            variance: f64::NAN,
            min: f64::NAN,
            max: f64::NAN,
            p95: f64::NAN,
            p05: f64::NAN,
        }
    }
}

/// EC stability for one site.
#[derive(Debug, Clone)]
pub struct EcStats {
    pub site: String,
    pub samples: usize,
    pub mean_ec: f64,
    pub ec_std: f64,
    /// Readings whose delta is non-zero; the first reading never counts
    pub change_count: usize,
    pub max_delta: f64,
    pub mean_delta: f64,
    /// Means over the readings that carry the optional sensor column
    pub mean_temperature: Option<f64>,
    pub mean_humidity: Option<f64>,
    pub mean_ph: Option<f64>,
}

/// Growth outcome for one site.
#[derive(Debug, Clone)]
pub struct GrowthSummary {
    pub site: String,
    pub target_ec: f64,
    pub fresh_weight: DescriptiveStats,
    pub mean_leaf_count: Option<f64>,
    pub mean_shoot_length: Option<f64>,
    pub mean_root_length: Option<f64>,
}

/// One point of the EC volatility vs fresh weight comparison.
#[derive(Debug, Clone)]
pub struct CorrelationRow {
    pub site: String,
    pub mean_fresh_weight: f64,
    pub ec_std: f64,
    pub mean_delta: f64,
    pub target_ec: f64,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        f64::NAN
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Handles statistical calculations for the dashboard views.
pub struct StatsCalculator;

impl StatsCalculator {
    /// Compute descriptive statistics for an array of values.
    pub fn compute_descriptive_stats(values: &[f64]) -> DescriptiveStats {
        let n = values.len();
        if n == 0 {
            return DescriptiveStats::default();
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let median = if n % 2 == 0 {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        } else {
            sorted[n / 2]
        };

        let (variance, std) = if n > 1 {
            (values.iter().variance(), values.iter().std_dev())
        } else {
            (0.0, 0.0)
        };

        DescriptiveStats {
            count: n,
            mean: mean(values),
            median,
            std,
            variance,
            min: sorted[0],
            max: sorted[n - 1],
            p95: Self::percentile(&sorted, 95.0),
            p05: Self::percentile(&sorted, 5.0),
        }
    }

    /// Calculate percentile using linear interpolation (NumPy compatible).
    fn percentile(sorted_values: &[f64], p: f64) -> f64 {
        let n = sorted_values.len();
        if n == 0 {
            return f64::NAN;
        }
        if n == 1 {
            return sorted_values[0];
        }

        let rank = (p / 100.0) * (n - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = (rank.ceil() as usize).min(n - 1);
        let frac = rank - lower as f64;

        if lower == upper {
            sorted_values[lower]
        } else {
            sorted_values[lower] * (1.0 - frac) + sorted_values[upper] * frac
        }
    }

    pub fn ec_stats(table: &EnvironmentTable) -> EcStats {
        let ec = table.ec_values();
        let deltas = table.ec_deltas();

        let ec_std = if ec.len() > 1 {
            ec.iter().std_dev()
        } else {
            f64::NAN
        };

        EcStats {
            site: table.site.clone(),
            samples: ec.len(),
            mean_ec: mean(&ec),
            ec_std,
            change_count: deltas.iter().filter(|&&d| d > 0.0).count(),
            max_delta: deltas.iter().copied().fold(f64::NAN, f64::max),
            mean_delta: mean(&deltas),
            mean_temperature: Self::mean_reading(table, |r| r.temperature),
            mean_humidity: Self::mean_reading(table, |r| r.humidity),
            mean_ph: Self::mean_reading(table, |r| r.ph),
        }
    }

    fn mean_reading(
        table: &EnvironmentTable,
        field: impl Fn(&EnvironmentRecord) -> Option<f64>,
    ) -> Option<f64> {
        let values: Vec<f64> = table.records.iter().filter_map(field).collect();
        (!values.is_empty()).then(|| mean(&values))
    }

    pub fn growth_summary(table: &GrowthTable) -> GrowthSummary {
        let mean_of = |values: Option<Vec<f64>>| {
            values.filter(|v| !v.is_empty()).map(|v| mean(&v))
        };

        GrowthSummary {
            site: table.site.clone(),
            target_ec: table.target_ec,
            fresh_weight: Self::compute_descriptive_stats(&table.fresh_weights()),
            mean_leaf_count: mean_of(
                table
                    .leaf_counts()
                    .map(|counts| counts.into_iter().map(|c| c as f64).collect()),
            ),
            mean_shoot_length: mean_of(table.shoot_lengths()),
            mean_root_length: mean_of(table.root_lengths()),
        }
    }

    /// EC stats for the filtered sites that have environment data.
    pub fn ec_stats_for(dataset: &Dataset, sites: &[&Site]) -> Vec<EcStats> {
        sites
            .iter()
            .filter_map(|site| dataset.environment_for(&site.name))
            .map(Self::ec_stats)
            .collect()
    }

    /// Growth summaries for the filtered sites that have growth data.
    pub fn growth_summaries_for(dataset: &Dataset, sites: &[&Site]) -> Vec<GrowthSummary> {
        sites
            .iter()
            .filter_map(|site| dataset.growth_for(&site.name))
            .map(Self::growth_summary)
            .collect()
    }

    /// Correlation rows for sites present in both collections; others are skipped.
    pub fn correlation_rows(dataset: &Dataset, sites: &[&Site]) -> Vec<CorrelationRow> {
        sites
            .iter()
            .filter_map(|site| {
                let env = dataset.environment_for(&site.name)?;
                let growth = dataset.growth_for(&site.name)?;
                let ec = Self::ec_stats(env);
                let weights = growth.fresh_weights();
                if weights.is_empty() {
                    return None;
                }
                Some(CorrelationRow {
                    site: site.name.clone(),
                    mean_fresh_weight: mean(&weights),
                    ec_std: ec.ec_std,
                    mean_delta: ec.mean_delta,
                    target_ec: growth.target_ec,
                })
            })
            .collect()
    }

    /// Pearson correlation coefficient; `None` for fewer than
    /// `MIN_CORRELATION_POINTS` pairs or zero variance.
    pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
        if xs.len() != ys.len() || xs.len() < MIN_CORRELATION_POINTS {
            return None;
        }
        if xs.iter().chain(ys).any(|v| !v.is_finite()) {
            return None;
        }
        let sx = xs.iter().std_dev();
        let sy = ys.iter().std_dev();
        if sx == 0.0 || sy == 0.0 {
            return None;
        }
        let cov = xs.iter().covariance(ys.iter());
        Some((cov / (sx * sy)).clamp(-1.0, 1.0))
    }

    /// Correlation between mean EC delta and mean fresh weight across sites.
    pub fn delta_weight_correlation(rows: &[CorrelationRow]) -> Option<f64> {
        let xs: Vec<f64> = rows.iter().map(|r| r.mean_delta).collect();
        let ys: Vec<f64> = rows.iter().map(|r| r.mean_fresh_weight).collect();
        Self::pearson(&xs, &ys)
    }
}
