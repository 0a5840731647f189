//! Charts module - interactive plots and static chart images

mod plotter;
mod renderer;

pub use plotter::ChartPlotter;
pub use renderer::export_chart_images;
