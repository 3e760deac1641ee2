//! Editable simulation parameters and their default baseline.

use serde::{Deserialize, Serialize};
use tracing::trace;

/// Recognized parameter field names, in edit-surface display order.
pub const FIELD_NAMES: [&str; 7] = [
    "num_agents",
    "idea_probability",
    "initial_infected",
    "facility_capacity",
    "facility_probability",
    "commuter_ratio",
    "avg_transfers",
];

/// Flat record of the numeric knobs a run is launched with.
///
/// Serde field names match the simulation service's wire contract exactly;
/// the request body is this struct serialized as-is. Probability fields are
/// kept in `[0, 1]` by whatever renders the edit surface (slider bounds),
/// not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationParameters {
    pub num_agents: f64,
    pub idea_probability: f64,
    pub initial_infected: f64,
    pub facility_capacity: f64,
    pub facility_probability: f64,
    pub commuter_ratio: f64,
    pub avg_transfers: f64,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            num_agents: 1000.0,
            idea_probability: 0.05,
            initial_infected: 5.0,
            facility_capacity: 50.0,
            facility_probability: 0.3,
            commuter_ratio: 0.7,
            avg_transfers: 2.0,
        }
    }
}

impl SimulationParameters {
    /// Read a field by its wire name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<f64> {
        match name {
            "num_agents" => Some(self.num_agents),
            "idea_probability" => Some(self.idea_probability),
            "initial_infected" => Some(self.initial_infected),
            "facility_capacity" => Some(self.facility_capacity),
            "facility_probability" => Some(self.facility_probability),
            "commuter_ratio" => Some(self.commuter_ratio),
            "avg_transfers" => Some(self.avg_transfers),
            _ => None,
        }
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut f64> {
        match name {
            "num_agents" => Some(&mut self.num_agents),
            "idea_probability" => Some(&mut self.idea_probability),
            "initial_infected" => Some(&mut self.initial_infected),
            "facility_capacity" => Some(&mut self.facility_capacity),
            "facility_probability" => Some(&mut self.facility_probability),
            "commuter_ratio" => Some(&mut self.commuter_ratio),
            "avg_transfers" => Some(&mut self.avg_transfers),
            _ => None,
        }
    }
}

/// Descriptor for a single parameter, for edit-surface discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamEntry {
    pub name: &'static str,
    pub value: f64,
    pub default: f64,
}

/// Holds the current edit state alongside the injected default baseline.
///
/// The store is purely in-memory and has no semantic-range policy of its own.
#[derive(Debug, Clone)]
pub struct ParameterStore {
    current: SimulationParameters,
    defaults: SimulationParameters,
}

impl ParameterStore {
    #[must_use]
    pub fn new(defaults: SimulationParameters) -> Self {
        Self {
            current: defaults.clone(),
            defaults,
        }
    }

    /// Replace a single field from raw edit-surface text.
    ///
    /// Raw input that does not parse as a finite number, or a name that is
    /// not a recognized field, leaves the store untouched. Mid-edit
    /// keystrokes like `"0."` therefore never wedge the state; the return
    /// value reports whether the edit applied.
    pub fn set_field(&mut self, name: &str, raw: &str) -> bool {
        let trimmed = raw.trim();
        // f64::from_str accepts trailing-dot literals like "0."; those are
        // incomplete mid-edit input, not a committed value.
        if trimmed.ends_with('.') {
            trace!(name, raw, "ignoring incomplete parameter edit");
            return false;
        }
        let Ok(value) = trimmed.parse::<f64>() else {
            trace!(name, raw, "ignoring non-numeric parameter edit");
            return false;
        };
        if !value.is_finite() {
            trace!(name, raw, "ignoring non-finite parameter edit");
            return false;
        }
        let Some(slot) = self.current.field_mut(name) else {
            trace!(name, "ignoring edit to unknown parameter");
            return false;
        };
        *slot = value;
        true
    }

    #[must_use]
    pub fn current(&self) -> &SimulationParameters {
        &self.current
    }

    #[must_use]
    pub fn defaults(&self) -> &SimulationParameters {
        &self.defaults
    }

    /// Restore the default baseline, dropping any edits.
    pub fn reset(&mut self) {
        self.current = self.defaults.clone();
    }

    /// Flatten the store into per-field descriptors.
    #[must_use]
    pub fn entries(&self) -> Vec<ParamEntry> {
        FIELD_NAMES
            .iter()
            .map(|name| ParamEntry {
                name,
                value: self.current.field(name).unwrap_or_default(),
                default: self.defaults.field(name).unwrap_or_default(),
            })
            .collect()
    }
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new(SimulationParameters::default())
    }
}
