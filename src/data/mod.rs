//! Data module - site file discovery, loading and caching

mod cache;
mod loader;
mod locator;
mod table;
mod workbook;

pub use cache::LoadCache;
pub use loader::{DataLoader, Dataset, LoadError, LoadWarning};
pub use locator::normalize_nfc;
pub use table::{EnvironmentRecord, EnvironmentTable, GrowthTable};
