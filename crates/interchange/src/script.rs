//! Simulation scripts: a sequence of UI events replayed against a
//! template by `traceviz simulate`.
//!
//! ```json
//! {
//!   "string_table": ["thing1"],
//!   "steps": [
//!     { "update": { "target": "item", "type": "click", "local": { "num": ["int", 1] } } },
//!     { "set": { "key": "mode", "value": ["string", "edit"] } },
//!     { "match": { "target": "item", "type": "highlight", "local": { "name": ["string_index", 0] } } },
//!     { "advance": { "ms": 250 } }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::wire::WireValue;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    /// Table that `*_index` / `*_indices` wire values refer into.
    #[serde(default)]
    pub string_table: Vec<String>,
    pub steps: Vec<ScriptStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptStep {
    /// Fire the action registered for (target, type).
    Update {
        target: String,
        #[serde(rename = "type")]
        kind: String,
        #[serde(default)]
        local: BTreeMap<String, WireValue>,
    },
    /// Assign a global state value directly.
    Set { key: String, value: WireValue },
    /// Evaluate the reaction registered for (target, type).
    Match {
        target: String,
        #[serde(rename = "type")]
        kind: String,
        #[serde(default)]
        local: BTreeMap<String, WireValue>,
    },
    /// Move the virtual clock forward, firing due timers.
    Advance { ms: u64 },
}

impl ScriptStep {
    /// Short label used in simulation reports.
    pub fn describe(&self) -> String {
        match self {
            ScriptStep::Update { target, kind, .. } => format!("update {}/{}", target, kind),
            ScriptStep::Set { key, .. } => format!("set {}", key),
            ScriptStep::Match { target, kind, .. } => format!("match {}/{}", target, kind),
            ScriptStep::Advance { ms } => format!("advance {}ms", ms),
        }
    }
}
