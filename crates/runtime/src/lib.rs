//! Runtime Client Facade (C6): namespaces, containers, and tasks over the
//! containerd gRPC API, scoped to what only the container runtime can
//! answer — cgroup operations live in the `cgroup` crate instead.

mod client;
mod containerd;
mod error;
mod fake;
mod oci;
mod types;

pub use client::RuntimeClient;
pub use containerd::ContainerdRuntimeClient;
pub use error::RuntimeError;
pub use fake::FakeRuntimeClient;
pub use types::{ContainerInfo, StopOptions, TaskStatus};
