//! Everything that leaves the process: day files and the run summary.
//!
//! # Submodules
//!
//! - [`json`]: writes each [`DailyMenu`](crate::models::DailyMenu) as
//!   `<base_dir>/<cafeteria>/<YYYYMMDD>.json`
//! - [`summary`]: renders and logs the per-cafeteria outcome of a run

pub mod json;
pub mod summary;
