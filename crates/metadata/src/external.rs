//! The external (disk/wire) document shapes. Parent references are IDs
//! (`RealmID`, `SpaceID`, `StackID`); at the current schema version these
//! are simply the parent's `metadata.name`, but the field is distinct from
//! the name so a future version can introduce generated parent IDs without
//! another full schema rewrite.

use crate::schema::{CellState, ContainerSpec, ObjectMeta, State, CURRENT_API_VERSION};
use serde::{Deserialize, Serialize};

/// Minimal prefix used by `DetectMetadataVersion` to read `apiVersion`
/// before committing to a full parse.
#[derive(Deserialize)]
pub struct VersionPrefix {
    #[serde(rename = "apiVersion")]
    pub api_version: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RealmDocument {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: RealmSpecExternal,
    #[serde(default)]
    pub status: RealmStatusExternal,
}

impl RealmDocument {
    pub fn new(name: impl Into<String>, spec: RealmSpecExternal) -> Self {
        Self {
            api_version: CURRENT_API_VERSION.to_string(),
            kind: "Realm".to_string(),
            metadata: ObjectMeta::new(name),
            spec,
            status: RealmStatusExternal::default(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RealmSpecExternal {
    pub namespace: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RealmStatusExternal {
    pub state: State,
    #[serde(default, rename = "cgroupPath")]
    pub cgroup_path: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpaceDocument {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: SpaceSpecExternal,
    #[serde(default)]
    pub status: SpaceStatusExternal,
}

impl SpaceDocument {
    pub fn new(name: impl Into<String>, spec: SpaceSpecExternal) -> Self {
        Self {
            api_version: CURRENT_API_VERSION.to_string(),
            kind: "Space".to_string(),
            metadata: ObjectMeta::new(name),
            spec,
            status: SpaceStatusExternal::default(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SpaceSpecExternal {
    #[serde(rename = "realmID")]
    pub realm_id: String,
    #[serde(default, rename = "cniConfigPath")]
    pub cni_config_path: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SpaceStatusExternal {
    pub state: State,
    #[serde(default, rename = "cgroupPath")]
    pub cgroup_path: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StackDocument {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: StackSpecExternal,
    #[serde(default)]
    pub status: StackStatusExternal,
}

impl StackDocument {
    pub fn new(name: impl Into<String>, spec: StackSpecExternal) -> Self {
        Self {
            api_version: CURRENT_API_VERSION.to_string(),
            kind: "Stack".to_string(),
            metadata: ObjectMeta::new(name),
            spec,
            status: StackStatusExternal::default(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StackSpecExternal {
    #[serde(rename = "realmID")]
    pub realm_id: String,
    #[serde(rename = "spaceID")]
    pub space_id: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StackStatusExternal {
    pub state: State,
    #[serde(default, rename = "cgroupPath")]
    pub cgroup_path: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CellDocument {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: CellSpecExternal,
    #[serde(default)]
    pub status: CellStatusExternal,
}

impl CellDocument {
    pub fn new(name: impl Into<String>, spec: CellSpecExternal) -> Self {
        Self {
            api_version: CURRENT_API_VERSION.to_string(),
            kind: "Cell".to_string(),
            metadata: ObjectMeta::new(name),
            spec,
            status: CellStatusExternal::default(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CellSpecExternal {
    /// Immutable ULID-like identifier, assigned at first persist.
    pub id: String,
    #[serde(rename = "realmID")]
    pub realm_id: String,
    #[serde(rename = "spaceID")]
    pub space_id: String,
    #[serde(rename = "stackID")]
    pub stack_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_container: Option<ContainerSpec>,
    #[serde(default)]
    pub containers: Vec<ContainerSpec>,
    #[serde(default, rename = "rootContainerID")]
    pub root_container_id: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CellStatusExternal {
    pub state: CellState,
    #[serde(default, rename = "cgroupPath")]
    pub cgroup_path: String,
}
