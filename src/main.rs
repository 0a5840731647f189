//! EC Growth Dashboard - EC stability vs. plant growth across experiment sites
//!
//! Discovers each site's environment log and growth sheet, normalizes them into
//! consistently keyed tables, and shows them in an interactive dashboard or
//! prints and exports them from the command line.

mod charts;
mod config;
mod data;
mod export;
mod fonts;
mod gui;
mod stats;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueHint};
use config::DashboardConfig;
use data::{DataLoader, Dataset, LoadCache};
use eframe::egui;
use export::XlsxExporter;
use gui::DashboardApp;
use stats::{SiteFilter, StatsCalculator};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "EC stability vs. plant growth dashboard", long_about = None)]
struct Cli {
    /// JSON configuration file; built-in defaults are used when omitted
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Override the configured data directory
    #[arg(long, global = true, value_hint = ValueHint::DirPath)]
    data_dir: Option<PathBuf>,

    /// Debug level logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the interactive dashboard (default)
    Gui,
    /// Print EC, growth and correlation tables
    Summary {
        /// Only this site
        #[arg(long)]
        site: Option<String>,
    },
    /// Write the growth tables to an .xlsx workbook
    Export {
        #[arg(value_hint = ValueHint::FilePath)]
        out: Option<PathBuf>,
    },
    /// Render chart images into a directory
    Charts {
        #[arg(value_hint = ValueHint::DirPath)]
        dir: PathBuf,
        /// Only this site
        #[arg(long)]
        site: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let config = load_config(&cli)?;

    match cli.command.unwrap_or(Command::Gui) {
        Command::Gui => run_gui(config),
        Command::Summary { site } => handle_summary(&config, site_filter(&config, site)?),
        Command::Export { out } => handle_export(&config, out),
        Command::Charts { dir, site } => handle_charts(&config, site_filter(&config, site)?, dir),
    }
}

fn load_config(cli: &Cli) -> Result<DashboardConfig> {
    let mut config = match &cli.config {
        Some(path) => DashboardConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => DashboardConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn site_filter(config: &DashboardConfig, site: Option<String>) -> Result<SiteFilter> {
    match site {
        None => Ok(SiteFilter::All),
        Some(name) => match config.site(&name) {
            Some(site) => Ok(SiteFilter::Only(site.name.clone())),
            None => bail!("unknown site '{}'", name),
        },
    }
}

fn load_dataset(config: &DashboardConfig) -> Arc<Dataset> {
    LoadCache::new().get_or_load(&DataLoader::new(config.clone()))
}

fn run_gui(config: DashboardConfig) -> Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 850.0])
            .with_min_inner_size([1100.0, 700.0])
            .with_title("EC Growth Dashboard"),
        ..Default::default()
    };

    eframe::run_native(
        "EC Growth Dashboard",
        options,
        Box::new(|cc| Ok(Box::new(DashboardApp::new(cc, config)))),
    )
    .map_err(|e| anyhow!("dashboard window failed: {}", e))
}

fn fmt_value(value: f64, decimals: usize) -> String {
    if value.is_finite() {
        format!("{:.*}", decimals, value)
    } else {
        "-".to_string()
    }
}

fn handle_summary(config: &DashboardConfig, filter: SiteFilter) -> Result<()> {
    let dataset = load_dataset(config);
    let sites = filter.apply(&config.sites);

    println!("== EC stability ({}) ==", filter.label());
    println!(
        "{:<10} {:>8} {:>8} {:>8} {:>8} {:>8} {:>10}",
        "site", "samples", "mean", "std", "changes", "max Δ", "mean Δ"
    );
    for s in StatsCalculator::ec_stats_for(&dataset, &sites) {
        println!(
            "{:<10} {:>8} {:>8} {:>8} {:>8} {:>8} {:>10}",
            s.site,
            s.samples,
            fmt_value(s.mean_ec, 2),
            fmt_value(s.ec_std, 3),
            s.change_count,
            fmt_value(s.max_delta, 2),
            fmt_value(s.mean_delta, 4)
        );
    }

    if let Some(fatal) = &dataset.fatal {
        bail!("{}", fatal);
    }

    println!();
    if let Some(path) = &dataset.workbook_path {
        println!("Growth workbook: {}", path.display());
    }
    println!("== Fresh weight ==");
    println!(
        "{:<10} {:>6} {:>4} {:>9} {:>9} {:>9} {:>9} {:>9}",
        "site", "EC", "n", "mean", "median", "std", "p05", "p95"
    );
    for g in StatsCalculator::growth_summaries_for(&dataset, &sites) {
        let fw = &g.fresh_weight;
        println!(
            "{:<10} {:>6} {:>4} {:>9} {:>9} {:>9} {:>9} {:>9}",
            g.site,
            fmt_value(g.target_ec, 1),
            fw.count,
            fmt_value(fw.mean, 3),
            fmt_value(fw.median, 3),
            fmt_value(fw.std, 3),
            fmt_value(fw.p05, 3),
            fmt_value(fw.p95, 3)
        );
    }

    let rows = StatsCalculator::correlation_rows(&dataset, &sites);
    println!();
    println!("== EC volatility vs fresh weight ==");
    println!(
        "{:<10} {:>12} {:>8} {:>10} {:>6}",
        "site", "fresh (g)", "EC std", "mean Δ", "EC"
    );
    for r in &rows {
        println!(
            "{:<10} {:>12} {:>8} {:>10} {:>6}",
            r.site,
            fmt_value(r.mean_fresh_weight, 3),
            fmt_value(r.ec_std, 3),
            fmt_value(r.mean_delta, 4),
            fmt_value(r.target_ec, 1)
        );
    }
    match StatsCalculator::delta_weight_correlation(&rows) {
        Some(r) => println!("Pearson r (mean Δ vs fresh weight): {:.3}", r),
        None => println!("Pearson r: not enough sites"),
    }
    Ok(())
}

fn handle_export(config: &DashboardConfig, out: Option<PathBuf>) -> Result<()> {
    let dataset = load_dataset(config);
    if let Some(fatal) = &dataset.fatal {
        bail!("{}", fatal);
    }

    let tables = dataset.growth_in_order(&config.sites);
    if tables.is_empty() {
        bail!("no growth tables to export");
    }

    let path = out.unwrap_or_else(|| PathBuf::from(&config.export_file_name));
    XlsxExporter::write_to(&tables, &path)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn handle_charts(config: &DashboardConfig, filter: SiteFilter, dir: PathBuf) -> Result<()> {
    let dataset = load_dataset(config);
    let written = charts::export_chart_images(&dataset, config, &filter, &dir)
        .with_context(|| format!("rendering charts into {}", dir.display()))?;
    for path in &written {
        println!("{}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_to_gui() {
        let cli = Cli::try_parse_from(["ec_growth_dashboard"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "ec_growth_dashboard",
            "summary",
            "--site",
            "송도고",
            "--data-dir",
            "/tmp/data",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/data")));
        assert!(matches!(cli.command, Some(Command::Summary { site: Some(ref s) }) if s == "송도고"));
    }

    #[test]
    fn test_data_dir_override() {
        let cli = Cli::try_parse_from(["ec_growth_dashboard", "--data-dir", "elsewhere"]).unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("elsewhere"));
    }

    #[test]
    fn test_site_filter_rejects_unknown_site() {
        let config = DashboardConfig::default();
        assert_eq!(site_filter(&config, None).unwrap(), SiteFilter::All);
        assert_eq!(
            site_filter(&config, Some("하늘고".to_string())).unwrap(),
            SiteFilter::Only("하늘고".to_string())
        );
        assert!(site_filter(&config, Some("없는학교".to_string())).is_err());
    }

    #[test]
    fn test_export_without_workbook_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = DashboardConfig {
            data_dir: dir.path().to_path_buf(),
            ..DashboardConfig::default()
        };
        let err = handle_export(&config, Some(dir.path().join("out.xlsx"))).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
