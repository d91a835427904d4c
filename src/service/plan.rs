// src/service/plan.rs
use super::ServiceUnit;
use crate::config::{ConfigError, PlanConfig};
use reqwest::Client;
use std::collections::{BTreeSet, HashMap};

/// Units in start order: every unit comes after everything it depends on.
///
/// The order is computed once, here. Among units whose dependencies are
/// satisfied, the one declared first goes first, so a plan that is already
/// ordered keeps its order.
#[derive(Debug, Clone)]
pub struct DependencyPlan {
    units: Vec<ServiceUnit>,
}

impl DependencyPlan {
    pub fn new(units: Vec<ServiceUnit>) -> Result<Self, ConfigError> {
        let order = Self::validate(&units)?;

        let mut slots: Vec<Option<ServiceUnit>> = units.into_iter().map(Some).collect();
        let units = order
            .into_iter()
            .filter_map(|index| slots[index].take())
            .collect();

        Ok(Self { units })
    }

    pub fn from_config(config: &PlanConfig, client: &Client) -> Result<Self, ConfigError> {
        let units = config
            .units
            .iter()
            .map(|unit| ServiceUnit::from_config(unit, client))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(units)
    }

    /// Check ids and dependencies and return a topological order as indices
    /// into `units`.
    pub fn validate(units: &[ServiceUnit]) -> Result<Vec<usize>, ConfigError> {
        let mut index = HashMap::with_capacity(units.len());
        for (position, unit) in units.iter().enumerate() {
            if index.insert(unit.id(), position).is_some() {
                return Err(ConfigError::DuplicateUnit(unit.id().to_string()));
            }
        }

        let mut pending_deps = vec![0usize; units.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); units.len()];
        for (position, unit) in units.iter().enumerate() {
            for dependency in unit.dependencies() {
                let Some(&target) = index.get(dependency.as_str()) else {
                    return Err(ConfigError::UnknownDependency {
                        unit: unit.id().to_string(),
                        dependency: dependency.clone(),
                    });
                };
                pending_deps[position] += 1;
                dependents[target].push(position);
            }
        }

        // Kahn's algorithm; the ready set is ordered by declaration position.
        let mut ready: BTreeSet<usize> = (0..units.len())
            .filter(|&position| pending_deps[position] == 0)
            .collect();
        let mut order = Vec::with_capacity(units.len());

        while let Some(next) = ready.pop_first() {
            order.push(next);
            for &dependent in &dependents[next] {
                pending_deps[dependent] -= 1;
                if pending_deps[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() != units.len() {
            let cycle = units
                .iter()
                .enumerate()
                .filter(|(position, _)| pending_deps[*position] > 0)
                .map(|(_, unit)| unit.id().to_string())
                .collect();
            return Err(ConfigError::CyclicDependency(cycle));
        }

        Ok(order)
    }

    pub fn units(&self) -> &[ServiceUnit] {
        &self.units
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.units.iter().map(|unit| unit.id())
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
