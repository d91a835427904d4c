// src/report/mod.rs
mod aggregator;
mod artifact;
mod summary;

pub use aggregator::{aggregate, Report, Summary};
pub use artifact::{load_artifact, write_artifact, write_atomic, write_json, Artifact, ReportError};
pub use summary::render_summary;
