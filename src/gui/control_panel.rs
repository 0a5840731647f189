//! Control Panel Widget
//! Left side panel with data source, site filter, export controls and load status.

use crate::data::LoadWarning;
use crate::stats::SiteFilter;
use egui::{Color32, ComboBox, RichText, ScrollArea};
use std::path::PathBuf;

/// User settings for the dashboard views
#[derive(Default, Clone)]
pub struct UserSettings {
    pub data_dir: PathBuf,
    pub filter: SiteFilter,
    pub focus_site: String,
    pub open_after_export: bool,
}

/// Left side control panel with data source selection and export controls.
pub struct ControlPanel {
    pub settings: UserSettings,
    pub site_names: Vec<String>,
    pub warnings: Vec<String>,
    pub progress: f32,
    pub status: String,
    pub export_enabled: bool,
}

impl Default for ControlPanel {
    fn default() -> Self {
        Self {
            settings: UserSettings::default(),
            site_names: Vec::new(),
            warnings: Vec::new(),
            progress: 0.0,
            status: "Ready".to_string(),
            export_enabled: false,
        }
    }
}

impl ControlPanel {
    pub fn new(data_dir: PathBuf, site_names: Vec<String>) -> Self {
        let focus_site = site_names.first().cloned().unwrap_or_default();
        Self {
            settings: UserSettings {
                data_dir,
                focus_site,
                ..UserSettings::default()
            },
            site_names,
            ..Self::default()
        }
    }

    /// Replace the warning list after a load
    pub fn set_warnings(&mut self, warnings: &[LoadWarning]) {
        self.warnings = warnings.iter().map(ToString::to_string).collect();
    }

    /// Draw the control panel
    pub fn show(&mut self, ui: &mut egui::Ui) -> ControlPanelAction {
        let mut action = ControlPanelAction::None;

        // Title
        ui.vertical_centered(|ui| {
            ui.add_space(5.0);
            ui.label(
                RichText::new("🌱 EC Growth Dashboard")
                    .size(22.0)
                    .color(Color32::from_rgb(100, 149, 237)),
            );
            ui.label(
                RichText::new("EC stability vs. plant growth")
                    .size(11.0)
                    .color(Color32::GRAY),
            );
        });
        ui.add_space(10.0);
        ui.separator();
        ui.add_space(5.0);

        // ===== Data Source Section =====
        ui.label(RichText::new("📁 Data Source").size(14.0).strong());
        ui.add_space(5.0);

        egui::Frame::none()
            .fill(ui.visuals().widgets.noninteractive.bg_fill)
            .rounding(5.0)
            .inner_margin(8.0)
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    let dir_text = self.settings.data_dir.display().to_string();
                    ui.label(RichText::new(&dir_text).size(12.0));

                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.button("🔄 Reload").clicked() {
                            action = ControlPanelAction::Reload;
                        }
                        if ui.button("📂 Browse").clicked() {
                            action = ControlPanelAction::PickDataDir;
                        }
                    });
                });
            });

        ui.add_space(15.0);
        ui.separator();
        ui.add_space(10.0);

        // ===== Site Selection Section =====
        ui.label(RichText::new("🏫 Sites").size(14.0).strong());
        ui.add_space(8.0);

        let label_width = 90.0;
        let combo_width = 170.0;

        ui.horizontal(|ui| {
            ui.add_sized([label_width, 20.0], egui::Label::new("Show:"));
            ComboBox::from_id_salt("site_filter")
                .width(combo_width)
                .selected_text(self.settings.filter.label())
                .show_ui(ui, |ui| {
                    if ui
                        .selectable_label(self.settings.filter == SiteFilter::All, "All sites")
                        .clicked()
                    {
                        self.settings.filter = SiteFilter::All;
                    }
                    for name in &self.site_names {
                        let selected = self.settings.filter == SiteFilter::Only(name.clone());
                        if ui.selectable_label(selected, name).clicked() {
                            self.settings.filter = SiteFilter::Only(name.clone());
                            self.settings.focus_site = name.clone();
                        }
                    }
                });
        });

        ui.add_space(5.0);

        ui.horizontal(|ui| {
            ui.add_sized([label_width, 20.0], egui::Label::new("Focus site:"));
            ComboBox::from_id_salt("focus_site")
                .width(combo_width)
                .selected_text(&self.settings.focus_site)
                .show_ui(ui, |ui| {
                    for name in &self.site_names {
                        if ui
                            .selectable_label(self.settings.focus_site == *name, name)
                            .clicked()
                        {
                            self.settings.focus_site = name.clone();
                        }
                    }
                });
        });

        ui.add_space(15.0);
        ui.separator();
        ui.add_space(10.0);

        // ===== Action Buttons =====
        ui.vertical_centered(|ui| {
            ui.add_enabled_ui(self.export_enabled, |ui| {
                let button = egui::Button::new(RichText::new("📄 Export XLSX").size(16.0))
                    .min_size(egui::vec2(200.0, 35.0));
                if ui.add(button).clicked() {
                    action = ControlPanelAction::ExportXlsx;
                }

                ui.add_space(8.0);

                let charts_button = egui::Button::new(RichText::new("🖼 Export Charts").size(14.0))
                    .min_size(egui::vec2(150.0, 30.0));
                if ui.add(charts_button).clicked() {
                    action = ControlPanelAction::ExportCharts;
                }
            });
            ui.checkbox(&mut self.settings.open_after_export, "Open after export");
        });

        ui.add_space(15.0);
        ui.separator();
        ui.add_space(10.0);

        // ===== Progress Section =====
        ui.label(RichText::new("📊 Status").size(14.0).strong());
        ui.add_space(5.0);

        ui.add(
            egui::ProgressBar::new(self.progress / 100.0)
                .show_percentage()
                .animate(self.progress > 0.0 && self.progress < 100.0),
        );

        ui.add_space(5.0);

        let status_color = if self.status.contains("Error") {
            Color32::from_rgb(220, 53, 69)
        } else if self.status.contains("Loaded") || self.status.contains("exported") {
            Color32::from_rgb(40, 167, 69)
        } else {
            Color32::GRAY
        };
        ui.label(RichText::new(&self.status).size(11.0).color(status_color));

        // ===== Warnings Section =====
        if !self.warnings.is_empty() {
            ui.add_space(10.0);
            ui.label(
                RichText::new(format!("⚠ Warnings ({})", self.warnings.len()))
                    .size(14.0)
                    .strong()
                    .color(Color32::from_rgb(255, 193, 7)),
            );
            egui::Frame::none()
                .fill(ui.visuals().widgets.noninteractive.bg_fill)
                .rounding(5.0)
                .inner_margin(5.0)
                .show(ui, |ui| {
                    ScrollArea::vertical().max_height(160.0).show(ui, |ui| {
                        for warning in &self.warnings {
                            ui.label(RichText::new(warning).size(11.0));
                        }
                    });
                });
        }

        action
    }

    /// Set progress and status
    pub fn set_progress(&mut self, progress: f32, status: &str) {
        self.progress = progress;
        self.status = status.to_string();
    }
}

/// Actions triggered by control panel
#[derive(Debug, Clone, PartialEq)]
pub enum ControlPanelAction {
    None,
    PickDataDir,
    Reload,
    ExportXlsx,
    ExportCharts,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_focuses_first_site() {
        let panel = ControlPanel::new(
            PathBuf::from("data"),
            vec!["동산고".to_string(), "송도고".to_string()],
        );
        assert_eq!(panel.settings.focus_site, "동산고");
        assert_eq!(panel.settings.filter, SiteFilter::All);
        assert!(!panel.export_enabled);
    }

    #[test]
    fn test_set_warnings_formats_messages() {
        let mut panel = ControlPanel::default();
        panel.set_warnings(&[LoadWarning::MissingSheet {
            site: "아라고".to_string(),
        }]);
        assert_eq!(panel.warnings.len(), 1);
        assert!(panel.warnings[0].contains("아라고"));
    }
}
