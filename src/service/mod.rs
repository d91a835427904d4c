// src/service/mod.rs
mod action;
mod plan;
mod unit;

pub use action::{CommandAction, StartAction, StartActionError};
pub use plan::DependencyPlan;
pub use unit::ServiceUnit;
