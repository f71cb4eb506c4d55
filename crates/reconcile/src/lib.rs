//! Resource Reconciler: wires the `metadata`, `cgroup`, `network` and
//! `runtime` crates together into the Get/Create/Ensure/Refresh/Delete/Purge
//! operations described for each level of the Realm -> Space -> Stack -> Cell
//! hierarchy, plus the Cell Lifecycle Engine's start/stop/kill/recreate.

pub mod cell;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod purge;
pub mod realm;
pub mod space;
pub mod stack;

pub use engine::Engine;
pub use error::ReconcileError;
