//! Scenario files
//!
//! A scenario is a JSON description of one system, tagged by `"kind"`:
//!
//! ```json
//! {"kind": "single", "resource_count": 2,
//!  "processes": [{"name": "P1", "held": ["R1"], "wanted": ["R2"]}]}
//!
//! {"kind": "multi", "resources": [{"name": "R1", "total": 10}],
//!  "processes": [{"name": "P1", "allocation": {"R1": 5}, "max": {"R1": 7}}]}
//! ```
//!
//! A multi-instance scenario may also carry an `"available"` map; without it
//! the free instances are derived from the totals. Parsing only checks the
//! JSON shape. Everything else is validated by the state constructors, so a
//! count map naming a resource twice is passed through as written and
//! rejected there.
//!
//! A single-instance process contributes to the `held` and `wanted` mappings
//! only through the fields it actually lists. An omitted field and an empty
//! list are different inputs: a system whose processes never list `wanted`
//! gets an advisory, while `"wanted": []` is searched.

use crate::state::{ProcessMatrix, ResourceCounts};
use crate::{DetectionError, MultiInstanceState, ProcessId, ResourceId, SingleInstanceState};
use anyhow::{Context, Result};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scenario {
    Single(SingleScenario),
    Multi(MultiScenario),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleScenario {
    pub resource_count: usize,
    pub processes: Vec<SingleProcess>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleProcess {
    pub name: ProcessId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub held: Option<Vec<ResourceId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wanted: Option<Vec<ResourceId>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiScenario {
    pub resources: Vec<ResourceSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<CountEntries>,
    #[serde(default)]
    pub processes: Vec<MultiProcess>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub name: ResourceId,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiProcess {
    pub name: ProcessId,
    pub allocation: CountEntries,
    pub max: CountEntries,
}

/// A JSON object of resource -> instance count, kept in file order
///
/// Repeated keys are kept rather than collapsed, so the state constructor can
/// report them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CountEntries(pub ResourceCounts);

impl Serialize for CountEntries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (resource, count) in &self.0 {
            map.serialize_entry(resource, count)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CountEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = CountEntries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of resource names to instance counts")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((resource, count)) = access.next_entry::<ResourceId, u32>()? {
                    entries.push((resource, count));
                }
                Ok(CountEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

/// A scenario turned into a validated state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum System {
    Single(SingleInstanceState),
    Multi(MultiInstanceState),
}

impl Scenario {
    /// Load a scenario from a JSON file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        Self::from_json(&json)
            .with_context(|| format!("Failed to load scenario from {}", path.display()))
    }

    /// Parse a scenario from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Malformed scenario JSON")
    }

    /// Validate the scenario into a system state
    pub fn into_system(self) -> Result<System, DetectionError> {
        match self {
            Scenario::Single(single) => single.into_state().map(System::Single),
            Scenario::Multi(multi) => multi.into_state().map(System::Multi),
        }
    }
}

impl SingleScenario {
    pub fn into_state(self) -> Result<SingleInstanceState, DetectionError> {
        let mut held = Vec::with_capacity(self.processes.len());
        let mut wanted = Vec::with_capacity(self.processes.len());
        for process in self.processes {
            if let Some(resources) = process.held {
                held.push((process.name.clone(), resources));
            }
            if let Some(resources) = process.wanted {
                wanted.push((process.name, resources));
            }
        }
        SingleInstanceState::new(held, wanted, self.resource_count)
    }
}

impl MultiScenario {
    pub fn into_state(self) -> Result<MultiInstanceState, DetectionError> {
        let total: ResourceCounts = self
            .resources
            .into_iter()
            .map(|spec| (spec.name, spec.total))
            .collect();
        let mut allocation: ProcessMatrix = Vec::with_capacity(self.processes.len());
        let mut max: ProcessMatrix = Vec::with_capacity(self.processes.len());
        for process in self.processes {
            allocation.push((process.name.clone(), process.allocation.0));
            max.push((process.name, process.max.0));
        }
        let available = self.available.map(|counts| counts.0);
        MultiInstanceState::new(allocation, max, available, total)
    }
}
