use crate::error::RuntimeError;
use crate::types::{ContainerInfo, StopOptions, TaskStatus};
use async_trait::async_trait;
use common::SharedNamespaces;
use metadata::schema::ContainerSpec;

/// Operations only the container runtime can answer: namespaces, containers,
/// tasks, and snapshot cleanup. Cgroup-facing operations belong to the
/// Cgroup Manager crate, not here, since it already owns transient manager
/// handles end to end.
#[async_trait]
pub trait RuntimeClient: Send + Sync {
    async fn exists_namespace(&self, namespace: &str) -> Result<bool, RuntimeError>;
    async fn create_namespace(&self, namespace: &str) -> Result<(), RuntimeError>;
    async fn delete_namespace(&self, namespace: &str) -> Result<(), RuntimeError>;

    async fn exists_container(&self, namespace: &str, id: &str) -> Result<bool, RuntimeError>;
    async fn get_container(&self, namespace: &str, id: &str) -> Result<ContainerInfo, RuntimeError>;
    /// List every container ID registered in `namespace`. Used only by the
    /// Purge scrubber to discover containers with no surviving metadata.
    async fn list_containers(&self, namespace: &str) -> Result<Vec<String>, RuntimeError>;
    /// Registers the container with a fresh net/ipc/uts namespace set. A
    /// workload container that must join its Cell's root namespaces instead
    /// calls [`RuntimeClient::join_namespaces`] afterward, once the root's
    /// PID is known (namespace joining cannot be expressed before the root
    /// container has started).
    async fn create_container_from_spec(
        &self,
        namespace: &str,
        spec: &ContainerSpec,
    ) -> Result<(), RuntimeError>;

    /// Rewrite a registered container's namespace set to join `shared`,
    /// in place. Called on a workload container right before its task is
    /// started, once the Cell's root container has a live PID.
    async fn join_namespaces(
        &self,
        namespace: &str,
        id: &str,
        shared: &SharedNamespaces,
    ) -> Result<(), RuntimeError>;
    async fn delete_container(
        &self,
        namespace: &str,
        id: &str,
        cleanup_snapshot: bool,
    ) -> Result<(), RuntimeError>;
    async fn stop_container(
        &self,
        namespace: &str,
        id: &str,
        opts: StopOptions,
    ) -> Result<(), RuntimeError>;

    /// Create and start the container's task, returning its PID. Callers
    /// must assert the returned PID is nonzero before deriving namespace
    /// paths from it.
    async fn start_task(&self, namespace: &str, container_id: &str) -> Result<u32, RuntimeError>;
    async fn task_status(
        &self,
        namespace: &str,
        container_id: &str,
    ) -> Result<TaskStatus, RuntimeError>;
    /// The task's current PID, needed to resolve a running root container's
    /// netns path before stopping it.
    async fn task_pid(&self, namespace: &str, container_id: &str) -> Result<u32, RuntimeError>;
    async fn kill_task(
        &self,
        namespace: &str,
        container_id: &str,
        force: bool,
    ) -> Result<(), RuntimeError>;

    async fn cleanup_namespace_resources(
        &self,
        namespace: &str,
        snapshotter: &str,
    ) -> Result<(), RuntimeError>;
}
