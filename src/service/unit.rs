// src/service/unit.rs
use super::{CommandAction, StartAction};
use crate::config::{ConfigError, UnitConfig};
use crate::health::{HealthProbe, Probe};
use reqwest::Client;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// One independently startable service and the probes that define "ready".
#[derive(Clone)]
pub struct ServiceUnit {
    id: String,
    display_name: String,
    action: Arc<dyn StartAction>,
    probes: Vec<Arc<dyn Probe>>,
    depends_on: BTreeSet<String>,
}

impl ServiceUnit {
    pub fn new(id: impl Into<String>, action: Arc<dyn StartAction>) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            action,
            probes: Vec::new(),
            depends_on: BTreeSet::new(),
        }
    }

    pub fn from_config(config: &UnitConfig, client: &Client) -> Result<Self, ConfigError> {
        let action = Arc::new(CommandAction::new(config.start.clone(), config.stop.clone()));
        let mut unit = Self::new(config.id.clone(), action);
        if let Some(name) = &config.display_name {
            unit = unit.with_display_name(name.clone());
        }

        for probe in &config.probes {
            probe.retry.validate()?;
            let endpoint = probe.endpoint.to_endpoint()?;
            unit = unit.with_probe(Arc::new(HealthProbe::new(
                probe.name.clone(),
                endpoint,
                probe.retry.clone(),
                client.clone(),
            )));
        }

        for dependency in &config.depends_on {
            unit = unit.depends_on(dependency.clone());
        }

        Ok(unit)
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn Probe>) -> Self {
        self.probes.push(probe);
        self
    }

    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        self.depends_on.insert(id.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn action(&self) -> &dyn StartAction {
        self.action.as_ref()
    }

    pub fn probes(&self) -> &[Arc<dyn Probe>] {
        &self.probes
    }

    pub fn dependencies(&self) -> &BTreeSet<String> {
        &self.depends_on
    }
}

impl fmt::Debug for ServiceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceUnit")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field(
                "probes",
                &self.probes.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field("depends_on", &self.depends_on)
            .finish()
    }
}
