//! EC Growth Dashboard Main Application
//! Main window with control panel and chart viewer.

use crate::charts::export_chart_images;
use crate::config::DashboardConfig;
use crate::data::{DataLoader, Dataset, LoadCache};
use crate::export::XlsxExporter;
use crate::fonts::install_hangul_font;
use crate::gui::{ChartViewer, ControlPanel, ControlPanelAction};
use anyhow::{Context, Result};
use egui::SidePanel;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{debug, error, info, warn};

/// Loading result from background thread, tagged with the directory it read
enum LoadResult {
    Complete(PathBuf, Arc<Dataset>),
    Error(PathBuf, String),
}

/// What to do with a finished load.
#[derive(Debug, PartialEq)]
struct LoadCompletion {
    /// The result belongs to the directory currently selected
    accept: bool,
    /// A reload requested while loading; `Some(force)` starts it now
    queued: Option<bool>,
}

/// Tracks the load in flight and at most one queued reload.
#[derive(Debug, Default)]
struct LoadTracker {
    in_flight: Option<PathBuf>,
    queued: Option<bool>,
}

impl LoadTracker {
    fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Returns true when the load may start now. Otherwise it is queued; a
    /// queued forced reload stays forced.
    fn begin(&mut self, dir: &Path, force: bool) -> bool {
        if self.in_flight.is_some() {
            self.queued = Some(force || self.queued.unwrap_or(false));
            return false;
        }
        self.in_flight = Some(dir.to_path_buf());
        true
    }

    fn finish(&mut self, loaded: &Path, current: &Path) -> LoadCompletion {
        self.in_flight = None;
        LoadCompletion {
            accept: loaded == current,
            queued: self.queued.take(),
        }
    }
}

/// Main application window.
pub struct DashboardApp {
    config: DashboardConfig,
    cache: Arc<Mutex<LoadCache>>,
    control_panel: ControlPanel,
    chart_viewer: ChartViewer,

    // Async loading
    load_rx: Option<Receiver<LoadResult>>,
    loads: LoadTracker,
}

impl DashboardApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: DashboardConfig) -> Self {
        install_hangul_font(&cc.egui_ctx, &config.fonts);

        let site_names = config.sites.iter().map(|s| s.name.clone()).collect();
        let mut app = Self {
            control_panel: ControlPanel::new(config.data_dir.clone(), site_names),
            config,
            cache: Arc::new(Mutex::new(LoadCache::new())),
            chart_viewer: ChartViewer::new(),
            load_rx: None,
            loads: LoadTracker::default(),
        };
        app.start_load(false);
        app
    }

    /// Load the data directory in a background thread. A forced load skips the
    /// cache. Requests made while a load runs are queued until it finishes.
    fn start_load(&mut self, force: bool) {
        let dir = self.config.data_dir.clone();
        if !self.loads.begin(&dir, force) {
            info!(dir = %dir.display(), "load in progress, reload queued");
            self.control_panel
                .set_progress(self.control_panel.progress, "Reload queued until the current load finishes");
            return;
        }

        let (tx, rx) = channel();
        self.load_rx = Some(rx);
        self.control_panel.export_enabled = false;
        self.control_panel.set_progress(10.0, "Loading data directory...");

        let loader = DataLoader::new(self.config.clone());
        let cache = Arc::clone(&self.cache);

        thread::spawn(move || {
            let result = match cache.lock() {
                Ok(mut cache) => {
                    if force {
                        cache.invalidate();
                    }
                    debug!(cold = cache.is_empty(), force, "background load started");
                    LoadResult::Complete(dir, cache.get_or_load(&loader))
                }
                Err(_) => LoadResult::Error(dir, "load cache is unavailable".to_string()),
            };
            let _ = tx.send(result);
        });
    }

    /// Check for loading results
    fn check_load_results(&mut self) {
        let Some(rx) = self.load_rx.take() else {
            return;
        };
        let Ok(result) = rx.try_recv() else {
            self.load_rx = Some(rx);
            return;
        };

        let loaded_dir = match &result {
            LoadResult::Complete(dir, _) | LoadResult::Error(dir, _) => dir.clone(),
        };
        let completion = self.loads.finish(&loaded_dir, &self.config.data_dir);

        if !completion.accept {
            debug!(dir = %loaded_dir.display(), "discarding result for a previous data directory");
        } else {
            match result {
                LoadResult::Complete(_, dataset) => self.apply_dataset(dataset),
                LoadResult::Error(_, error) => {
                    error!("{}", error);
                    self.control_panel
                        .set_progress(0.0, &format!("Error: {}", error));
                }
            }
        }

        if let Some(force) = completion.queued {
            self.start_load(force);
        }
    }

    fn apply_dataset(&mut self, dataset: Arc<Dataset>) {
        self.control_panel.set_warnings(&dataset.warnings);
        let status = match (&dataset.fatal, &dataset.workbook_path) {
            (Some(fatal), _) => format!("Error: {}", fatal),
            (None, workbook) => format!(
                "Loaded {} environment, {} growth tables from {}",
                dataset.environment.len(),
                dataset.growth.len(),
                workbook
                    .as_deref()
                    .and_then(Path::file_name)
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "the data directory".to_string())
            ),
        };
        self.control_panel.export_enabled = !dataset.growth.is_empty();
        self.control_panel.set_progress(100.0, &status);
        self.chart_viewer.set_dataset(dataset);
    }

    /// Handle data directory selection
    fn handle_pick_data_dir(&mut self) {
        if let Some(dir) = rfd::FileDialog::new()
            .set_directory(&self.config.data_dir)
            .pick_folder()
        {
            info!(dir = %dir.display(), "data directory changed");
            self.chart_viewer.clear();
            self.config.data_dir = dir.clone();
            self.control_panel.settings.data_dir = dir;
            self.start_load(false);
        }
    }

    /// Write the growth tables to a workbook chosen by the user
    fn export_xlsx(&mut self) -> Result<Option<String>> {
        let Some(dataset) = self.chart_viewer.dataset.clone() else {
            return Ok(Some("No data to export".to_string()));
        };

        let tables = dataset.growth_in_order(&self.config.sites);
        if tables.is_empty() {
            return Ok(Some("No growth tables to export".to_string()));
        }

        let Some(path) = rfd::FileDialog::new()
            .add_filter("Excel Workbook", &["xlsx"])
            .set_file_name(&self.config.export_file_name)
            .save_file()
        else {
            return Ok(None);
        };

        XlsxExporter::write_to(&tables, &path)
            .with_context(|| format!("writing {}", path.display()))?;

        if self.control_panel.settings.open_after_export {
            Self::open_exported(&path);
        }
        Ok(Some(format!("Workbook exported: {} sheets", tables.len())))
    }

    /// Render chart images into a folder chosen by the user
    fn export_charts(&mut self) -> Result<Option<String>> {
        let Some(dataset) = self.chart_viewer.dataset.clone() else {
            return Ok(Some("No data to export".to_string()));
        };

        let Some(dir) = rfd::FileDialog::new().pick_folder() else {
            return Ok(None);
        };

        let written = export_chart_images(
            &dataset,
            &self.config,
            &self.control_panel.settings.filter,
            &dir,
        )
        .with_context(|| format!("rendering charts into {}", dir.display()))?;

        if self.control_panel.settings.open_after_export && !written.is_empty() {
            Self::open_exported(&dir);
        }
        Ok(Some(format!("Charts exported: {} images", written.len())))
    }

    fn open_exported(path: &Path) {
        if let Err(e) = open::that(path) {
            warn!(path = %path.display(), "could not open exported file: {}", e);
        }
    }

    fn report(&mut self, outcome: Result<Option<String>>) {
        match outcome {
            Ok(Some(status)) => self.control_panel.set_progress(100.0, &status),
            Ok(None) => {}
            Err(e) => {
                error!("{:#}", e);
                self.control_panel
                    .set_progress(0.0, &format!("Error: {:#}", e));
            }
        }
    }
}

impl eframe::App for DashboardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Check for background results
        self.check_load_results();

        // Request repaint while loading
        if self.loads.is_loading() {
            ctx.request_repaint();
        }

        // Left panel - Control Panel
        SidePanel::left("control_panel")
            .min_width(300.0)
            .max_width(350.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    let action = self.control_panel.show(ui);

                    match action {
                        ControlPanelAction::PickDataDir => self.handle_pick_data_dir(),
                        ControlPanelAction::Reload => self.start_load(true),
                        ControlPanelAction::ExportXlsx => {
                            let outcome = self.export_xlsx();
                            self.report(outcome);
                        }
                        ControlPanelAction::ExportCharts => {
                            let outcome = self.export_charts();
                            self.report(outcome);
                        }
                        ControlPanelAction::None => {}
                    }
                });
            });

        // Central panel - Chart Viewer
        egui::CentralPanel::default().show(ctx, |ui| {
            self.chart_viewer
                .show(ui, &self.config, &self.control_panel.settings);
        });
    }
}
