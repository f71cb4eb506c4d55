//! The reconciler's typed error vocabulary. Validation and not-found
//! variants are stable sentinels callers match on by identity; dependency
//! failures wrap the owning crate's error with the subject identifiers
//! attached so every log record names what it was operating on.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("realm {0:?} not found")]
    RealmNotFound(String),
    #[error("space {0:?} not found")]
    SpaceNotFound(String),
    #[error("stack {0:?} not found")]
    StackNotFound(String),
    #[error("cell {0:?} not found")]
    CellNotFound(String),

    #[error("realm name is required")]
    RealmNameRequired,
    #[error("space name is required")]
    SpaceNameRequired,
    #[error("stack name is required")]
    StackNameRequired,
    #[error("cell name is required")]
    CellNameRequired,
    #[error("cell id is required")]
    CellIdRequired,

    #[error(transparent)]
    InvalidName(#[from] naming::NamingError),

    #[error("connect to container runtime: {0}")]
    ConnectContainerd(#[source] anyhow::Error),

    #[error("namespace {0:?} already exists")]
    NamespaceAlreadyExists(String),

    #[error("create realm cgroup for {realm:?}: {source}")]
    CreateRealmCgroup {
        realm: String,
        #[source]
        source: cgroup::CgroupError,
    },
    #[error("create space cgroup for {realm:?}/{space:?}: {source}")]
    CreateSpaceCgroup {
        realm: String,
        space: String,
        #[source]
        source: cgroup::CgroupError,
    },
    #[error("create stack cgroup for {realm:?}/{space:?}/{stack:?}: {source}")]
    CreateStackCgroup {
        realm: String,
        space: String,
        stack: String,
        #[source]
        source: cgroup::CgroupError,
    },
    #[error("create cell cgroup for {realm:?}/{space:?}/{stack:?}/{cell:?}: {source}")]
    CreateCellCgroup {
        realm: String,
        space: String,
        stack: String,
        cell: String,
        #[source]
        source: cgroup::CgroupError,
    },

    #[error("update realm {0:?} metadata: {1}")]
    UpdateRealmMetadata(String, #[source] metadata::StoreError),
    #[error("update space {0:?} metadata: {1}")]
    UpdateSpaceMetadata(String, #[source] metadata::StoreError),
    #[error("update stack {0:?} metadata: {1}")]
    UpdateStackMetadata(String, #[source] metadata::StoreError),
    #[error("update cell {0:?} metadata: {1}")]
    UpdateCellMetadata(String, #[source] metadata::StoreError),

    #[error(transparent)]
    Schema(#[from] metadata::SchemaError),
    #[error(transparent)]
    Store(#[from] metadata::StoreError),

    #[error("network {0:?} not found")]
    NetworkNotFound(String),
    #[error("network {0:?} already exists")]
    NetworkAlreadyExists(String),
    #[error(transparent)]
    Cni(#[from] network::CniError),

    #[error("create root container for cell {0:?}: {1}")]
    CreateRootContainer(String, #[source] runtime::RuntimeError),
    #[error("container {0:?} not found")]
    ContainerNotFound(String),
    #[error(transparent)]
    Runtime(#[from] runtime::RuntimeError),

    #[error(transparent)]
    Cgroup(#[from] cgroup::CgroupError),

    #[error("root container cannot be killed directly; kill the cell instead")]
    KillRootDirectly,
}

impl ReconcileError {
    /// Whether this error represents structural input validation that must
    /// never be logged as a warning or error (returned immediately instead).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ReconcileError::RealmNameRequired
                | ReconcileError::SpaceNameRequired
                | ReconcileError::StackNameRequired
                | ReconcileError::CellNameRequired
                | ReconcileError::CellIdRequired
                | ReconcileError::InvalidName(_)
        )
    }
}
