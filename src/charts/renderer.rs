//! Static Chart Renderer
//! Renders the dashboard charts to PNG files with plotters.
//!
//! Charts:
//! 1. EC time series, one line per site
//! 2. Per-site EC with the absolute delta bars underneath
//! 3. Average fresh weight per site
//! 4. Mean EC delta vs mean fresh weight scatter

use super::plotter::format_epoch;
use crate::config::{DashboardConfig, Site};
use crate::data::{Dataset, EnvironmentTable};
use crate::fonts::chart_font_family;
use crate::stats::{CorrelationRow, GrowthSummary, SiteFilter, StatsCalculator};
use image::{ImageFormat, RgbImage};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

const CHART_SIZE: (u32, u32) = (1280, 720);
const DELTA_COLOR: RGBColor = RGBColor(220, 53, 69);

const PALETTE: [RGBColor; 10] = [
    RGBColor(99, 110, 250),
    RGBColor(239, 85, 59),
    RGBColor(0, 204, 150),
    RGBColor(171, 99, 250),
    RGBColor(255, 161, 90),
    RGBColor(25, 211, 243),
    RGBColor(255, 102, 146),
    RGBColor(182, 232, 128),
    RGBColor(255, 151, 255),
    RGBColor(254, 203, 82),
];

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Drawing error: {0}")]
    Drawing(String),
    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Nothing to draw for {0}")]
    NoData(String),
}

impl<E: std::error::Error + Send + Sync> From<DrawingAreaErrorKind<E>> for RenderError {
    fn from(err: DrawingAreaErrorKind<E>) -> Self {
        RenderError::Drawing(err.to_string())
    }
}

fn site_color(site: &Site, index: usize) -> RGBColor {
    site.rgb()
        .map(|[r, g, b]| RGBColor(r, g, b))
        .unwrap_or(PALETTE[index % PALETTE.len()])
}

/// Range with some padding; degenerate ranges are widened.
fn padded_range(values: impl Iterator<Item = f64>, floor_zero: bool) -> std::ops::Range<f64> {
    let (mut lo, mut hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() || !hi.is_finite() {
        return 0.0..1.0;
    }
    if floor_zero {
        lo = lo.min(0.0);
    }
    if hi - lo < f64::EPSILON {
        lo -= 0.5;
        hi += 0.5;
    }
    let pad = (hi - lo) * 0.08;
    let lo = if floor_zero && lo >= 0.0 { lo } else { lo - pad };
    lo..(hi + pad)
}

/// Renders charts with one font family for every label.
pub struct StaticChartRenderer {
    family: String,
}

impl StaticChartRenderer {
    pub fn new(family: impl Into<String>) -> Self {
        Self {
            family: family.into(),
        }
    }

    /// Renderer using the configured or first installed Hangul family.
    pub fn for_config(config: &DashboardConfig) -> Self {
        Self::new(chart_font_family(&config.fonts))
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    fn font(&self, size: u32) -> FontDesc<'_> {
        (self.family.as_str(), size).into_font()
    }

    /// Render with a drawing closure into PNG bytes.
    fn render_png<F>(size: (u32, u32), draw: F) -> Result<Vec<u8>, RenderError>
    where
        F: FnOnce(DrawingArea<BitMapBackend, Shift>) -> Result<(), RenderError>,
    {
        let (width, height) = size;
        let mut buffer = vec![0u8; (width * height * 3) as usize];
        {
            let root = BitMapBackend::with_buffer(&mut buffer, size).into_drawing_area();
            root.fill(&WHITE)?;
            draw(root.clone())?;
            root.present()?;
        }

        let image = RgbImage::from_raw(width, height, buffer)
            .ok_or_else(|| RenderError::Drawing("pixel buffer size mismatch".to_string()))?;
        let mut png = Cursor::new(Vec::new());
        image.write_to(&mut png, ImageFormat::Png)?;
        Ok(png.into_inner())
    }

    /// EC over time, one line per site.
    pub fn ec_timeseries_png(&self, series: &[(&Site, usize, &EnvironmentTable)]) -> Result<Vec<u8>, RenderError> {
        if series.iter().all(|(_, _, t)| t.is_empty()) {
            return Err(RenderError::NoData("EC time series".to_string()));
        }
        Self::render_png(CHART_SIZE, |root| {
            let x_range = padded_range(series.iter().flat_map(|(_, _, t)| t.time_axis()), false);
            let y_range = padded_range(series.iter().flat_map(|(_, _, t)| t.ec_values()), false);

            let mut chart = ChartBuilder::on(&root)
                .caption("EC over time", self.font(28))
                .margin(25)
                .set_label_area_size(LabelAreaPosition::Left, 60)
                .set_label_area_size(LabelAreaPosition::Bottom, 50)
                .build_cartesian_2d(x_range, y_range)?;

            chart
                .configure_mesh()
                .x_label_formatter(&|v| format_epoch(*v))
                .y_desc("EC (dS/m)")
                .draw()?;

            for (site, index, table) in series {
                let color = site_color(site, *index);
                chart
                    .draw_series(LineSeries::new(
                        table.time_axis().into_iter().zip(table.ec_values()),
                        color.stroke_width(2),
                    ))?
                    .label(site.name.as_str())
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 30, y)], color));
            }

            chart
                .configure_series_labels()
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()?;
            Ok(())
        })
    }

    /// EC readings on top, absolute deltas below, for one site.
    pub fn ec_delta_png(&self, site: &Site, index: usize, table: &EnvironmentTable) -> Result<Vec<u8>, RenderError> {
        if table.is_empty() {
            return Err(RenderError::NoData(format!("EC delta of {}", site.name)));
        }
        let times = table.time_axis();
        let ec = table.ec_values();
        let deltas = table.ec_deltas();
        let color = site_color(site, index);

        Self::render_png(CHART_SIZE, |root| {
            let (upper, lower) = root.split_vertically((CHART_SIZE.1 / 2) as i32);
            let x_range = padded_range(times.iter().copied(), false);

            let mut top = ChartBuilder::on(&upper)
                .caption(format!("{} EC", site.name), self.font(24))
                .margin(20)
                .set_label_area_size(LabelAreaPosition::Left, 60)
                .set_label_area_size(LabelAreaPosition::Bottom, 30)
                .build_cartesian_2d(x_range.clone(), padded_range(ec.iter().copied(), false))?;
            top.configure_mesh()
                .x_label_formatter(&|v| format_epoch(*v))
                .y_desc("EC")
                .draw()?;
            top.draw_series(LineSeries::new(
                times.iter().copied().zip(ec.iter().copied()),
                color.stroke_width(2),
            ))?;

            let mut bottom = ChartBuilder::on(&lower)
                .caption("EC delta", self.font(20))
                .margin(20)
                .set_label_area_size(LabelAreaPosition::Left, 60)
                .set_label_area_size(LabelAreaPosition::Bottom, 40)
                .build_cartesian_2d(x_range.clone(), padded_range(deltas.iter().copied(), true))?;
            bottom
                .configure_mesh()
                .x_label_formatter(&|v| format_epoch(*v))
                .y_desc("|ΔEC|")
                .draw()?;

            let half_width = (x_range.end - x_range.start) / (times.len().max(1) as f64) * 0.4;
            bottom.draw_series(times.iter().zip(deltas.iter()).map(|(&x, &d)| {
                Rectangle::new([(x - half_width, 0.0), (x + half_width, d)], DELTA_COLOR.filled())
            }))?;
            Ok(())
        })
    }

    /// Mean fresh weight bar per site.
    pub fn fresh_weight_png(&self, summaries: &[(&Site, usize, &GrowthSummary)]) -> Result<Vec<u8>, RenderError> {
        let bars: Vec<_> = summaries
            .iter()
            .filter(|(_, _, s)| s.fresh_weight.count > 0)
            .collect();
        if bars.is_empty() {
            return Err(RenderError::NoData("fresh weight".to_string()));
        }
        let labels: Vec<String> = bars
            .iter()
            .map(|(site, _, s)| format!("{} (EC {})", site.name, s.target_ec))
            .collect();

        Self::render_png(CHART_SIZE, |root| {
            let y_range = padded_range(bars.iter().map(|(_, _, s)| s.fresh_weight.mean), true);
            let mut chart = ChartBuilder::on(&root)
                .caption("Average fresh weight by site", self.font(28))
                .margin(25)
                .set_label_area_size(LabelAreaPosition::Left, 60)
                .set_label_area_size(LabelAreaPosition::Bottom, 50)
                .build_cartesian_2d(-0.5..(bars.len() as f64 - 0.5), y_range)?;

            chart
                .configure_mesh()
                .disable_x_mesh()
                .x_labels(bars.len())
                .x_label_formatter(&|v| {
                    let idx = v.round();
                    if (v - idx).abs() > 1e-6 || idx < 0.0 {
                        return String::new();
                    }
                    labels.get(idx as usize).cloned().unwrap_or_default()
                })
                .y_desc("Fresh weight (g)")
                .draw()?;

            for (i, (site, index, summary)) in bars.iter().enumerate() {
                let x = i as f64;
                let color = site_color(site, *index);
                let mean = summary.fresh_weight.mean;
                chart.draw_series(std::iter::once(Rectangle::new(
                    [(x - 0.3, 0.0), (x + 0.3, mean)],
                    color.filled(),
                )))?;
                chart.draw_series(std::iter::once(Text::new(
                    format!("{:.2}", mean),
                    (x - 0.1, mean),
                    self.font(16),
                )))?;
            }
            Ok(())
        })
    }

    /// Mean EC delta against mean fresh weight; marker size follows target EC.
    pub fn correlation_png(&self, rows: &[(&Site, usize, &CorrelationRow)]) -> Result<Vec<u8>, RenderError> {
        if rows.is_empty() {
            return Err(RenderError::NoData("correlation".to_string()));
        }
        let max_target = rows
            .iter()
            .map(|(_, _, r)| r.target_ec)
            .fold(0.0_f64, f64::max)
            .max(f64::EPSILON);

        Self::render_png(CHART_SIZE, |root| {
            let x_range = padded_range(rows.iter().map(|(_, _, r)| r.mean_delta), false);
            let y_range = padded_range(rows.iter().map(|(_, _, r)| r.mean_fresh_weight), false);
            let mut chart = ChartBuilder::on(&root)
                .caption("EC volatility vs fresh weight", self.font(28))
                .margin(25)
                .set_label_area_size(LabelAreaPosition::Left, 60)
                .set_label_area_size(LabelAreaPosition::Bottom, 50)
                .build_cartesian_2d(x_range, y_range)?;

            chart
                .configure_mesh()
                .x_desc("Mean EC delta")
                .y_desc("Mean fresh weight (g)")
                .draw()?;

            for (site, index, row) in rows {
                let color = site_color(site, *index);
                let radius = 6 + (16.0 * row.target_ec / max_target) as i32;
                let point = (row.mean_delta, row.mean_fresh_weight);
                chart.draw_series(std::iter::once(Circle::new(point, radius, color.filled())))?;
                chart.draw_series(std::iter::once(Text::new(
                    site.name.clone(),
                    point,
                    self.font(16),
                )))?;
            }
            Ok(())
        })
    }
}

/// Write every chart with data for the filtered sites into `dir`.
pub fn export_chart_images(
    dataset: &Dataset,
    config: &DashboardConfig,
    filter: &SiteFilter,
    dir: &Path,
) -> Result<Vec<PathBuf>, RenderError> {
    std::fs::create_dir_all(dir)?;
    let renderer = StaticChartRenderer::for_config(config);
    let sites = filter.apply(&config.sites);
    let indexed: Vec<(&Site, usize)> = sites
        .iter()
        .map(|site| {
            let index = config.sites.iter().position(|s| s.name == site.name).unwrap_or(0);
            (*site, index)
        })
        .collect();

    let mut written = Vec::new();
    let mut save = |name: String, result: Result<Vec<u8>, RenderError>| -> Result<(), RenderError> {
        match result {
            Ok(bytes) => {
                let path = dir.join(name);
                std::fs::write(&path, bytes)?;
                debug!(path = %path.display(), "chart written");
                written.push(path);
                Ok(())
            }
            Err(RenderError::NoData(what)) => {
                info!("skipping chart without data: {}", what);
                Ok(())
            }
            Err(err) => Err(err),
        }
    };

    let series: Vec<_> = indexed
        .iter()
        .filter_map(|&(site, i)| dataset.environment_for(&site.name).map(|t| (site, i, t)))
        .collect();
    if !series.is_empty() {
        save("ec_timeseries.png".to_string(), renderer.ec_timeseries_png(&series))?;
    }
    for (site, index, table) in &series {
        save(
            format!("ec_delta_{}.png", site.key()),
            renderer.ec_delta_png(site, *index, table),
        )?;
    }

    let summaries: Vec<GrowthSummary> = StatsCalculator::growth_summaries_for(dataset, &sites);
    let growth: Vec<_> = indexed
        .iter()
        .filter_map(|&(site, i)| {
            summaries
                .iter()
                .find(|s| s.site == site.name)
                .map(|s| (site, i, s))
        })
        .collect();
    if !growth.is_empty() {
        save("fresh_weight.png".to_string(), renderer.fresh_weight_png(&growth))?;
    }

    let rows = StatsCalculator::correlation_rows(dataset, &sites);
    let correlation: Vec<_> = indexed
        .iter()
        .filter_map(|&(site, i)| rows.iter().find(|r| r.site == site.name).map(|r| (site, i, r)))
        .collect();
    if !correlation.is_empty() {
        save("correlation.png".to_string(), renderer.correlation_png(&correlation))?;
    }

    info!(
        count = written.len(),
        dir = %dir.display(),
        font = renderer.family(),
        "chart images exported"
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataLoader, GrowthTable};
    use crate::export::XlsxExporter;
    use crate::fonts::FALLBACK_CHART_FAMILY;
    use polars::prelude::{Column, DataFrame};
    use std::collections::BTreeSet;

    const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

    /// Two sites with environment logs and growth sheets on disk.
    fn sample_dataset(dir: &Path) -> (DashboardConfig, Dataset) {
        let mut config = DashboardConfig {
            data_dir: dir.to_path_buf(),
            ..DashboardConfig::default()
        };
        config.sites.truncate(2);

        let mut tables = Vec::new();
        for (n, site) in config.sites.iter().enumerate() {
            let mut body = String::from("time,ec\n");
            for (hour, ec) in [1.0, 1.4, 1.1, 1.6].iter().enumerate() {
                body.push_str(&format!("2025-05-26 {:02}:00:00,{}\n", hour, ec * site.target_ec));
            }
            std::fs::write(dir.join(config.environment_keyword(site)), body).unwrap();

            let labels = config.growth_columns.clone();
            let weights: Vec<Option<f64>> = (0..3).map(|i| Some(2.0 + n as f64 + i as f64 * 0.5)).collect();
            let frame = DataFrame::new(vec![Column::new(labels.fresh_weight.as_str().into(), weights)]).unwrap();
            tables.push(GrowthTable::new(site.name.clone(), site.target_ec, frame, labels));
        }
        let refs: Vec<&GrowthTable> = tables.iter().collect();
        XlsxExporter::write_to(&refs, &dir.join(&config.workbook.name)).unwrap();

        let dataset = DataLoader::new(config.clone()).load();
        assert!(!dataset.is_fatal());
        (config, dataset)
    }

    #[test]
    fn test_padded_range_widens_flat_values() {
        let range = padded_range([2.0, 2.0].into_iter(), false);
        assert!(range.start < 2.0 && range.end > 2.0);
    }

    #[test]
    fn test_padded_range_floor_zero() {
        let range = padded_range([3.0, 5.0].into_iter(), true);
        assert_eq!(range.start, 0.0);
        assert!(range.end > 5.0);
    }

    #[test]
    fn test_padded_range_ignores_nan() {
        let range = padded_range([f64::NAN, 1.0, 3.0].into_iter(), false);
        assert!(range.start < 1.0 && range.end > 3.0);
        assert_eq!(padded_range(std::iter::empty(), false), 0.0..1.0);
    }

    #[test]
    fn test_empty_inputs_have_no_data() {
        let renderer = StaticChartRenderer::new(FALLBACK_CHART_FAMILY);
        assert!(matches!(
            renderer.correlation_png(&[]),
            Err(RenderError::NoData(_))
        ));
        assert!(matches!(
            renderer.fresh_weight_png(&[]),
            Err(RenderError::NoData(_))
        ));
    }

    #[test]
    fn test_renders_every_chart_as_png() {
        let dir = tempfile::tempdir().unwrap();
        let (config, dataset) = sample_dataset(dir.path());
        let renderer = StaticChartRenderer::for_config(&config);
        assert!(!renderer.family().is_empty());

        let sites: Vec<&Site> = config.sites.iter().collect();
        let series: Vec<_> = config
            .sites
            .iter()
            .enumerate()
            .map(|(i, site)| (site, i, dataset.environment_for(&site.name).unwrap()))
            .collect();
        let summaries = StatsCalculator::growth_summaries_for(&dataset, &sites);
        let bars: Vec<_> = config
            .sites
            .iter()
            .zip(&summaries)
            .enumerate()
            .map(|(i, (site, summary))| (site, i, summary))
            .collect();
        let rows = StatsCalculator::correlation_rows(&dataset, &sites);
        let points: Vec<_> = config
            .sites
            .iter()
            .zip(&rows)
            .enumerate()
            .map(|(i, (site, row))| (site, i, row))
            .collect();
        assert_eq!(bars.len(), 2);
        assert_eq!(points.len(), 2);

        let (site, index, table) = series[0];
        let images = [
            renderer.ec_timeseries_png(&series).unwrap(),
            renderer.ec_delta_png(site, index, table).unwrap(),
            renderer.fresh_weight_png(&bars).unwrap(),
            renderer.correlation_png(&points).unwrap(),
        ];
        for png in &images {
            assert!(png.len() > PNG_SIGNATURE.len());
            assert_eq!(&png[..PNG_SIGNATURE.len()], PNG_SIGNATURE);
        }
    }

    #[test]
    fn test_export_writes_expected_file_names() {
        let dir = tempfile::tempdir().unwrap();
        let (config, dataset) = sample_dataset(dir.path());
        let out = dir.path().join("charts");

        let written = export_chart_images(&dataset, &config, &SiteFilter::All, &out).unwrap();
        let names: BTreeSet<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        let expected: BTreeSet<String> = [
            "ec_timeseries.png",
            "ec_delta_동산고.png",
            "ec_delta_송도고.png",
            "fresh_weight.png",
            "correlation.png",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        assert_eq!(names, expected);
        for path in &written {
            let bytes = std::fs::read(path).unwrap();
            assert_eq!(&bytes[..PNG_SIGNATURE.len()], PNG_SIGNATURE);
        }

        let only = export_chart_images(
            &dataset,
            &config,
            &SiteFilter::Only("송도고".to_string()),
            &dir.path().join("one"),
        )
        .unwrap();
        assert!(only.iter().any(|p| p.ends_with("ec_delta_송도고.png")));
        assert!(!only.iter().any(|p| p.ends_with("ec_delta_동산고.png")));
    }

    #[test]
    fn test_export_with_no_data_writes_nothing() {
        let out = tempfile::tempdir().unwrap();
        let dataset = Dataset::default();
        let config = DashboardConfig::default();
        let written =
            export_chart_images(&dataset, &config, &SiteFilter::All, &out.path().join("charts")).unwrap();
        assert!(written.is_empty());
        assert!(out.path().join("charts").is_dir());
    }
}
