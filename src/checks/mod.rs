// src/checks/mod.rs
mod builtin;
mod suite;

pub use builtin::{EndpointCheck, FileCheck, ToolCheck};
pub use suite::{Check, CheckResult, CheckStatus, CheckSuite};
