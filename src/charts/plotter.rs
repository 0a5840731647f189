//! Chart Plotter Module
//! Creates the interactive dashboard charts and tables using egui_plot.

use crate::config::Site;
use crate::data::EnvironmentTable;
use crate::stats::{CorrelationRow, EcStats, GrowthSummary};
use chrono::DateTime;
use egui::{Color32, RichText};
use egui_plot::{Bar, BarChart, Legend, Line, Plot, PlotPoint, PlotPoints, Points, Text};

pub const PALETTE: [Color32; 10] = [
    Color32::from_rgb(99, 110, 250),  // Indigo
    Color32::from_rgb(239, 85, 59),   // Red
    Color32::from_rgb(0, 204, 150),   // Green
    Color32::from_rgb(171, 99, 250),  // Purple
    Color32::from_rgb(255, 161, 90),  // Orange
    Color32::from_rgb(25, 211, 243),  // Cyan
    Color32::from_rgb(255, 102, 146), // Pink
    Color32::from_rgb(182, 232, 128), // Lime
    Color32::from_rgb(255, 151, 255), // Magenta
    Color32::from_rgb(254, 203, 82),  // Yellow
];

pub const DELTA_COLOR: Color32 = Color32::from_rgb(220, 53, 69);

/// Format epoch seconds as a short date-time label.
pub fn format_epoch(secs: f64) -> String {
    DateTime::from_timestamp(secs as i64, 0)
        .map(|dt| dt.naive_utc().format("%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

/// Creates dashboard charts using egui_plot.
pub struct ChartPlotter;

impl ChartPlotter {
    /// Configured color of a site, or a palette color by its position.
    pub fn site_color(site: &Site, index: usize) -> Color32 {
        site.rgb()
            .map(|[r, g, b]| Color32::from_rgb(r, g, b))
            .unwrap_or(PALETTE[index % PALETTE.len()])
    }

    /// EC readings over time, one line per site.
    pub fn draw_ec_timeseries(
        ui: &mut egui::Ui,
        series: &[(&Site, usize, &EnvironmentTable)],
        height: f32,
    ) {
        Plot::new("ec_timeseries")
            .height(height)
            .legend(Legend::default())
            .x_axis_label("Time")
            .y_axis_label("EC (dS/m)")
            .x_axis_formatter(|mark, _range| format_epoch(mark.value))
            .label_formatter(|name, value| {
                format!("{}\n{}\nEC {:.2}", name, format_epoch(value.x), value.y)
            })
            .show(ui, |plot_ui| {
                for (site, index, table) in series {
                    let points: PlotPoints = table
                        .time_axis()
                        .into_iter()
                        .zip(table.ec_values())
                        .map(|(x, y)| [x, y])
                        .collect();
                    plot_ui.line(
                        Line::new(points)
                            .color(Self::site_color(site, *index))
                            .width(1.5)
                            .name(&site.name),
                    );
                }
            });
    }

    /// EC readings and their absolute deltas for one site, stacked.
    pub fn draw_ec_delta(ui: &mut egui::Ui, site: &Site, index: usize, table: &EnvironmentTable) {
        let times = table.time_axis();
        let color = Self::site_color(site, index);
        let half = (ui.available_height() / 2.0).clamp(160.0, 260.0);

        ui.label(RichText::new("EC").size(13.0).strong());
        Plot::new(format!("ec_focus_{}", site.name))
            .height(half)
            .x_axis_formatter(|mark, _range| format_epoch(mark.value))
            .y_axis_label("EC (dS/m)")
            .show(ui, |plot_ui| {
                let points: PlotPoints = times
                    .iter()
                    .copied()
                    .zip(table.ec_values())
                    .map(|(x, y)| [x, y])
                    .collect();
                plot_ui.line(Line::new(points).color(color).width(1.5).name("EC"));
            });

        ui.add_space(6.0);
        ui.label(RichText::new("EC delta (absolute change)").size(13.0).strong());

        // Bars are as wide as the typical sampling interval
        let bar_width = Self::median_step(&times).unwrap_or(60.0) * 0.8;
        Plot::new(format!("ec_delta_{}", site.name))
            .height(half)
            .x_axis_formatter(|mark, _range| format_epoch(mark.value))
            .y_axis_label("|ΔEC|")
            .show(ui, |plot_ui| {
                let bars: Vec<Bar> = times
                    .iter()
                    .zip(table.ec_deltas())
                    .map(|(&x, d)| Bar::new(x, d).width(bar_width).fill(DELTA_COLOR))
                    .collect();
                plot_ui.bar_chart(BarChart::new(bars).color(DELTA_COLOR).name("delta"));
            });
    }

    fn median_step(times: &[f64]) -> Option<f64> {
        let mut steps: Vec<f64> = times
            .windows(2)
            .map(|w| w[1] - w[0])
            .filter(|s| *s > 0.0)
            .collect();
        if steps.is_empty() {
            return None;
        }
        steps.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        Some(steps[steps.len() / 2])
    }

    /// Average fresh weight per site as bars, labelled with the target EC.
    pub fn draw_fresh_weight_bars(
        ui: &mut egui::Ui,
        summaries: &[(&Site, usize, &GrowthSummary)],
        height: f32,
    ) {
        let labels: Vec<String> = summaries
            .iter()
            .map(|(site, _, s)| format!("{} (EC {})", site.name, s.target_ec))
            .collect();

        Plot::new("fresh_weight_bars")
            .height(height)
            .legend(Legend::default())
            .allow_drag(false)
            .allow_zoom(false)
            .allow_scroll(false)
            .include_y(0.0)
            .y_axis_label("Fresh weight (g)")
            .x_axis_formatter(move |mark, _range| {
                let idx = mark.value.round();
                if (mark.value - idx).abs() > 1e-6 || idx < 0.0 {
                    return String::new();
                }
                labels.get(idx as usize).cloned().unwrap_or_default()
            })
            .show(ui, |plot_ui| {
                for (i, (site, index, summary)) in summaries.iter().enumerate() {
                    if summary.fresh_weight.count == 0 {
                        continue;
                    }
                    let color = Self::site_color(site, *index);
                    let bar = Bar::new(i as f64, summary.fresh_weight.mean)
                        .width(0.6)
                        .fill(color)
                        .name(&site.name);
                    plot_ui.bar_chart(BarChart::new(vec![bar]).color(color).name(&site.name));
                }
            });
    }

    /// Mean EC delta against mean fresh weight; marker size follows the target EC.
    pub fn draw_correlation_scatter(
        ui: &mut egui::Ui,
        rows: &[(&Site, usize, &CorrelationRow)],
        height: f32,
    ) {
        let max_target = rows
            .iter()
            .map(|(_, _, r)| r.target_ec)
            .fold(0.0_f64, f64::max)
            .max(f64::EPSILON);

        Plot::new("correlation_scatter")
            .height(height)
            .legend(Legend::default())
            .x_axis_label("Mean EC delta")
            .y_axis_label("Mean fresh weight (g)")
            .show(ui, |plot_ui| {
                for (site, index, row) in rows {
                    let color = Self::site_color(site, *index);
                    let radius = 4.0 + 10.0 * (row.target_ec / max_target) as f32;
                    plot_ui.points(
                        Points::new(vec![[row.mean_delta, row.mean_fresh_weight]])
                            .radius(radius)
                            .color(color)
                            .name(&site.name),
                    );
                    plot_ui.text(
                        Text::new(
                            PlotPoint::new(row.mean_delta, row.mean_fresh_weight),
                            RichText::new(&site.name).size(12.0),
                        )
                        .anchor(egui::Align2::CENTER_BOTTOM)
                        .color(color),
                    );
                }
            });
    }

    fn value_cell(ui: &mut egui::Ui, value: f64, decimals: usize) {
        let text = if value.is_finite() {
            format!("{:.*}", decimals, value)
        } else {
            "-".to_string()
        };
        ui.label(RichText::new(text).size(11.0));
    }

    fn header(ui: &mut egui::Ui, labels: &[&str]) {
        for label in labels {
            ui.label(RichText::new(*label).strong().size(11.0));
        }
        ui.end_row();
    }

    /// EC stability table.
    pub fn draw_ec_stats_table(ui: &mut egui::Ui, stats: &[EcStats]) {
        egui::Frame::none()
            .fill(ui.visuals().widgets.noninteractive.bg_fill)
            .rounding(5.0)
            .inner_margin(8.0)
            .show(ui, |ui| {
                egui::Grid::new("ec_stats_table")
                    .striped(true)
                    .min_col_width(70.0)
                    .spacing([10.0, 4.0])
                    .show(ui, |ui| {
                        Self::header(
                            ui,
                            &["Site", "Samples", "Mean EC", "EC std", "Changes", "Max Δ", "Mean Δ", "Temp (°C)", "RH (%)", "pH"],
                        );
                        for s in stats {
                            ui.label(RichText::new(&s.site).size(11.0));
                            ui.label(RichText::new(s.samples.to_string()).size(11.0));
                            Self::value_cell(ui, s.mean_ec, 2);
                            Self::value_cell(ui, s.ec_std, 3);
                            ui.label(RichText::new(s.change_count.to_string()).size(11.0));
                            Self::value_cell(ui, s.max_delta, 2);
                            Self::value_cell(ui, s.mean_delta, 4);
                            Self::value_cell(ui, s.mean_temperature.unwrap_or(f64::NAN), 1);
                            Self::value_cell(ui, s.mean_humidity.unwrap_or(f64::NAN), 1);
                            Self::value_cell(ui, s.mean_ph.unwrap_or(f64::NAN), 2);
                            ui.end_row();
                        }
                    });
            });
    }

    /// Fresh weight descriptive statistics per site.
    pub fn draw_growth_table(ui: &mut egui::Ui, summaries: &[GrowthSummary]) {
        egui::Frame::none()
            .fill(ui.visuals().widgets.noninteractive.bg_fill)
            .rounding(5.0)
            .inner_margin(8.0)
            .show(ui, |ui| {
                egui::Grid::new("growth_table")
                    .striped(true)
                    .min_col_width(60.0)
                    .spacing([10.0, 4.0])
                    .show(ui, |ui| {
                        Self::header(
                            ui,
                            &["Site", "Target EC", "N", "Mean (g)", "Median", "Std", "P05", "P95", "Leaves", "Shoot (mm)", "Root (mm)"],
                        );
                        for s in summaries {
                            let fw = &s.fresh_weight;
                            ui.label(RichText::new(&s.site).size(11.0));
                            Self::value_cell(ui, s.target_ec, 1);
                            ui.label(RichText::new(fw.count.to_string()).size(11.0));
                            Self::value_cell(ui, fw.mean, 3);
                            Self::value_cell(ui, fw.median, 3);
                            Self::value_cell(ui, fw.std, 3);
                            Self::value_cell(ui, fw.p05, 3);
                            Self::value_cell(ui, fw.p95, 3);
                            Self::value_cell(ui, s.mean_leaf_count.unwrap_or(f64::NAN), 1);
                            Self::value_cell(ui, s.mean_shoot_length.unwrap_or(f64::NAN), 1);
                            Self::value_cell(ui, s.mean_root_length.unwrap_or(f64::NAN), 1);
                            ui.end_row();
                        }
                    });
            });
    }

    /// Correlation table with the Pearson coefficient underneath.
    pub fn draw_correlation_table(ui: &mut egui::Ui, rows: &[CorrelationRow], pearson: Option<f64>) {
        egui::Frame::none()
            .fill(ui.visuals().widgets.noninteractive.bg_fill)
            .rounding(5.0)
            .inner_margin(8.0)
            .show(ui, |ui| {
                egui::Grid::new("correlation_table")
                    .striped(true)
                    .min_col_width(80.0)
                    .spacing([10.0, 4.0])
                    .show(ui, |ui| {
                        Self::header(
                            ui,
                            &["Site", "Mean fresh weight", "EC std", "Mean Δ", "Target EC"],
                        );
                        for r in rows {
                            ui.label(RichText::new(&r.site).size(11.0));
                            Self::value_cell(ui, r.mean_fresh_weight, 3);
                            Self::value_cell(ui, r.ec_std, 3);
                            Self::value_cell(ui, r.mean_delta, 4);
                            Self::value_cell(ui, r.target_ec, 1);
                            ui.end_row();
                        }
                    });

                ui.add_space(6.0);
                let text = match pearson {
                    Some(r) => format!("Pearson r (mean Δ vs fresh weight): {:.3}", r),
                    None => "Pearson r: not enough sites".to_string(),
                };
                ui.label(RichText::new(text).size(12.0).italics());
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_epoch() {
        // 2025-05-26 09:30:00 UTC
        assert_eq!(format_epoch(1_748_251_800.0), "05-26 09:30");
    }

    #[test]
    fn test_site_color_prefers_configured() {
        let site = Site::new("a", 1.0, Some("#010203"));
        assert_eq!(ChartPlotter::site_color(&site, 3), Color32::from_rgb(1, 2, 3));
        let plain = Site::new("b", 1.0, None);
        assert_eq!(ChartPlotter::site_color(&plain, 11), PALETTE[1]);
    }

    #[test]
    fn test_median_step() {
        assert_eq!(ChartPlotter::median_step(&[0.0, 60.0, 120.0, 300.0]), Some(60.0));
        assert_eq!(ChartPlotter::median_step(&[5.0]), None);
    }
}
