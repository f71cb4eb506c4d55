//! Shared document vocabulary: object metadata, lifecycle states, and the
//! container spec nested inside a Cell (containers never get their own
//! top-level document).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The current schema version written to every document's `apiVersion`
/// field. Only this exact value is accepted on read; anything else is
/// `StoreError::ConversionFailed`.
pub const CURRENT_API_VERSION: &str = "orchestrator.kukeon.io/v1";

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ObjectMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Stamp `created_at` (if unset) and `updated_at` to the current time.
    /// Called by the Store immediately before every write.
    pub fn touch(&mut self) {
        let now = Utc::now();
        if self.created_at.is_none() {
            self.created_at = Some(now);
        }
        self.updated_at = Some(now);
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum State {
    Creating,
    Ready,
    Failed,
    Unknown,
}

impl Default for State {
    fn default() -> Self {
        State::Creating
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum CellState {
    Creating,
    Ready,
    Stopped,
    Unknown,
}

impl Default for CellState {
    fn default() -> Self {
        CellState::Creating
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ContainerState {
    Unknown,
    Pending,
    Ready,
    Paused,
    Pausing,
    Stopped,
}

impl Default for ContainerState {
    fn default() -> Self {
        ContainerState::Unknown
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContainerSpec {
    pub id: String,
    pub image: String,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub args: Vec<String>,
    pub cell_name: String,
    #[serde(default)]
    pub root: bool,
    /// Blank until first create; once set it round-trips through
    /// Stop/Start/Refresh unchanged.
    #[serde(default)]
    pub containerd_id: String,
    #[serde(default)]
    pub cni_config_path: String,
}

impl ContainerSpec {
    /// Whether the two specs would produce the same running container: same
    /// image, command and args. Used by `UpdateCell`/`UpdateContainer` to
    /// decide whether a change is breaking (requires stop+delete+recreate)
    /// or cosmetic.
    pub fn runtime_equivalent(&self, other: &ContainerSpec) -> bool {
        self.image == other.image && self.command == other.command && self.args == other.args
    }
}
