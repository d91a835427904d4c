// src/health/mod.rs
mod checker;
mod endpoint;
mod json_path;
mod probe;

pub use checker::{check, HealthProbe};
pub use endpoint::{Endpoint, EndpointKind, HttpExpectation, Target};
pub use json_path::{JsonPath, JsonPathError};
pub use probe::{FnProbe, Probe, ProbeError};
