//! The coverage aggregator: fold per-sample, per-region depth records into
//! cross-sample summary statistics, stratified by each sample's extraction
//! protocol.

pub mod command;
pub mod record;
pub mod summarize;

pub use record::{CoverageRecord, Region};
pub use summarize::{summarize, RegionSummary, SampleCoverage};
