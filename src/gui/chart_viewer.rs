//! Chart Viewer Widget
//! Central panel with the three dashboard tabs drawn with egui_plot.

use crate::charts::ChartPlotter;
use crate::config::{DashboardConfig, Site};
use crate::data::{Dataset, LoadWarning};
use crate::gui::control_panel::UserSettings;
use crate::stats::StatsCalculator;
use egui::{Color32, RichText, ScrollArea};
use std::sync::Arc;

const CHART_HEIGHT: f32 = 380.0;
const ERROR_COLOR: Color32 = Color32::from_rgb(220, 53, 69);
const WARNING_COLOR: Color32 = Color32::from_rgb(255, 193, 7);

/// Dashboard tabs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DashboardTab {
    #[default]
    EcTrend,
    SiteFocus,
    Correlation,
}

impl DashboardTab {
    pub const ALL: [DashboardTab; 3] = [
        DashboardTab::EcTrend,
        DashboardTab::SiteFocus,
        DashboardTab::Correlation,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            DashboardTab::EcTrend => "📈 EC over time",
            DashboardTab::SiteFocus => "🔍 Site detail",
            DashboardTab::Correlation => "🔗 EC vs growth",
        }
    }
}

/// Tabbed chart display for the loaded dataset.
#[derive(Default)]
pub struct ChartViewer {
    pub dataset: Option<Arc<Dataset>>,
    pub tab: DashboardTab,
}

impl ChartViewer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_dataset(&mut self, dataset: Arc<Dataset>) {
        self.dataset = Some(dataset);
    }

    pub fn clear(&mut self) {
        self.dataset = None;
    }

    /// Sites that pass the filter, paired with their configured position.
    fn indexed_sites<'a>(config: &'a DashboardConfig, settings: &UserSettings) -> Vec<(&'a Site, usize)> {
        settings
            .filter
            .apply(&config.sites)
            .into_iter()
            .map(|site| {
                let index = config
                    .sites
                    .iter()
                    .position(|s| s.name == site.name)
                    .unwrap_or(0);
                (site, index)
            })
            .collect()
    }

    pub fn show(&mut self, ui: &mut egui::Ui, config: &DashboardConfig, settings: &UserSettings) {
        let Some(dataset) = self.dataset.clone() else {
            ui.centered_and_justified(|ui| {
                ui.label(RichText::new("No Data").size(20.0));
            });
            return;
        };

        if let Some(fatal) = &dataset.fatal {
            Self::draw_error_panel(ui, &fatal.to_string());
            return;
        }

        ui.horizontal(|ui| {
            for tab in DashboardTab::ALL {
                ui.selectable_value(&mut self.tab, tab, RichText::new(tab.title()).size(15.0));
            }
        });
        ui.separator();

        let sites = Self::indexed_sites(config, settings);
        ScrollArea::vertical()
            .auto_shrink([false, false])
            .show(ui, |ui| match self.tab {
                DashboardTab::EcTrend => Self::draw_ec_trend(ui, &dataset, &sites),
                DashboardTab::SiteFocus => Self::draw_site_focus(ui, &dataset, config, settings, &sites),
                DashboardTab::Correlation => Self::draw_correlation(ui, &dataset, &sites),
            });
    }

    fn draw_error_panel(ui: &mut egui::Ui, message: &str) {
        ui.add_space(40.0);
        egui::Frame::none()
            .rounding(8.0)
            .stroke(egui::Stroke::new(2.0, ERROR_COLOR))
            .fill(ui.visuals().widgets.noninteractive.bg_fill)
            .inner_margin(16.0)
            .show(ui, |ui| {
                ui.label(
                    RichText::new("⚠ Growth data could not be loaded")
                        .size(18.0)
                        .strong()
                        .color(ERROR_COLOR),
                );
                ui.add_space(8.0);
                ui.label(RichText::new(message).size(13.0));
                ui.add_space(4.0);
                ui.label(
                    RichText::new("Check the data directory and press Reload.")
                        .size(11.0)
                        .color(Color32::GRAY),
                );
            });
    }

    /// Load warnings raised for one site.
    fn site_warnings<'a>(dataset: &'a Dataset, site: &str) -> Vec<&'a LoadWarning> {
        dataset.warnings.iter().filter(|w| w.site() == site).collect()
    }

    fn no_data(ui: &mut egui::Ui, what: &str) {
        ui.label(RichText::new(format!("No data: {}", what)).size(13.0).color(Color32::GRAY));
    }

    fn draw_ec_trend(ui: &mut egui::Ui, dataset: &Dataset, sites: &[(&Site, usize)]) {
        let series: Vec<_> = sites
            .iter()
            .filter_map(|&(site, i)| dataset.environment_for(&site.name).map(|t| (site, i, t)))
            .collect();
        if series.is_empty() {
            Self::no_data(ui, "no environment data for the selected sites");
            return;
        }

        ChartPlotter::draw_ec_timeseries(ui, &series, CHART_HEIGHT);
        ui.add_space(10.0);
        ui.label(RichText::new("EC stability").size(14.0).strong());
        let selected: Vec<&Site> = sites.iter().map(|(s, _)| *s).collect();
        ChartPlotter::draw_ec_stats_table(ui, &StatsCalculator::ec_stats_for(dataset, &selected));
    }

    fn draw_site_focus(
        ui: &mut egui::Ui,
        dataset: &Dataset,
        config: &DashboardConfig,
        settings: &UserSettings,
        sites: &[(&Site, usize)],
    ) {
        let focus = config
            .sites
            .iter()
            .enumerate()
            .find(|(_, s)| s.name == settings.focus_site)
            .or_else(|| config.sites.iter().enumerate().next());

        if let Some((index, site)) = focus {
            ui.label(RichText::new(format!("{} (target EC {})", site.name, site.target_ec)).size(16.0).strong());
            for warning in Self::site_warnings(dataset, &site.name) {
                ui.label(RichText::new(format!("⚠ {}", warning)).size(11.0).color(WARNING_COLOR));
            }
            ui.add_space(6.0);
            match dataset.environment_for(&site.name) {
                Some(table) if !table.is_empty() => ChartPlotter::draw_ec_delta(ui, site, index, table),
                _ => Self::no_data(ui, &format!("no environment data for {}", site.name)),
            }
        }

        ui.add_space(12.0);
        ui.separator();
        ui.label(RichText::new("Average fresh weight").size(14.0).strong());

        let selected: Vec<&Site> = sites.iter().map(|(s, _)| *s).collect();
        let summaries = StatsCalculator::growth_summaries_for(dataset, &selected);
        let bars: Vec<_> = sites
            .iter()
            .filter_map(|&(site, i)| summaries.iter().find(|s| s.site == site.name).map(|s| (site, i, s)))
            .collect();
        if bars.is_empty() {
            Self::no_data(ui, "no growth data for the selected sites");
            return;
        }
        ChartPlotter::draw_fresh_weight_bars(ui, &bars, CHART_HEIGHT * 0.8);
        ui.add_space(10.0);
        ChartPlotter::draw_growth_table(ui, &summaries);
    }

    fn draw_correlation(ui: &mut egui::Ui, dataset: &Dataset, sites: &[(&Site, usize)]) {
        let selected: Vec<&Site> = sites.iter().map(|(s, _)| *s).collect();
        let rows = StatsCalculator::correlation_rows(dataset, &selected);
        if rows.is_empty() {
            Self::no_data(ui, "no site has both environment and growth data");
            return;
        }
        let points: Vec<_> = sites
            .iter()
            .filter_map(|&(site, i)| rows.iter().find(|r| r.site == site.name).map(|r| (site, i, r)))
            .collect();

        ChartPlotter::draw_correlation_scatter(ui, &points, CHART_HEIGHT);
        ui.add_space(10.0);
        ChartPlotter::draw_correlation_table(ui, &rows, StatsCalculator::delta_weight_correlation(&rows));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::SiteFilter;

    #[test]
    fn test_indexed_sites_keep_configured_position() {
        let config = DashboardConfig::default();
        let settings = UserSettings {
            filter: SiteFilter::Only("아라고".to_string()),
            ..UserSettings::default()
        };
        let sites = ChartViewer::indexed_sites(&config, &settings);
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].0.name, "아라고");
        assert_eq!(sites[0].1, 2);

        let all = ChartViewer::indexed_sites(&config, &UserSettings::default());
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn test_site_warnings_only_for_that_site() {
        let dataset = Dataset {
            warnings: vec![
                LoadWarning::MissingSheet {
                    site: "아라고".to_string(),
                },
                LoadWarning::MissingEnvironmentFile {
                    site: "하늘고".to_string(),
                    keyword: "하늘고_환경데이터.csv".to_string(),
                },
                LoadWarning::SheetParse {
                    site: "아라고".to_string(),
                    error: "column '생중량(g)' not found".to_string(),
                },
            ],
            ..Dataset::default()
        };
        let warnings = ChartViewer::site_warnings(&dataset, "아라고");
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().all(|w| w.site() == "아라고"));
        assert!(ChartViewer::site_warnings(&dataset, "동산고").is_empty());
    }
}
