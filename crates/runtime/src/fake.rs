//! In-memory `RuntimeClient` used by reconciler tests, mirroring the
//! `Exec`/`DefaultExec` split used for CNI plugin execution.

use crate::client::RuntimeClient;
use crate::error::RuntimeError;
use crate::types::{ContainerInfo, StopOptions, TaskStatus};
use async_trait::async_trait;
use common::SharedNamespaces;
use metadata::schema::ContainerSpec;
use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

struct TaskState {
    status: TaskStatus,
    pid: u32,
}

struct State {
    namespaces: HashSet<String>,
    containers: HashMap<String, ContainerInfo>,
    tasks: HashMap<String, TaskState>,
    joined: HashMap<String, SharedNamespaces>,
    next_pid: u32,
}

impl Default for State {
    fn default() -> Self {
        Self {
            namespaces: HashSet::new(),
            containers: HashMap::new(),
            tasks: HashMap::new(),
            joined: HashMap::new(),
            next_pid: 1000,
        }
    }
}

#[derive(Default)]
pub struct FakeRuntimeClient {
    state: Mutex<State>,
}

impl FakeRuntimeClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect which namespaces a container was last joined to, for test
    /// assertions; not part of the `RuntimeClient` trait.
    pub fn joined_namespaces(&self, id: &str) -> Option<SharedNamespaces> {
        self.state.lock().unwrap().joined.get(id).cloned()
    }
}

#[async_trait]
impl RuntimeClient for FakeRuntimeClient {
    async fn exists_namespace(&self, namespace: &str) -> Result<bool, RuntimeError> {
        Ok(self.state.lock().unwrap().namespaces.contains(namespace))
    }

    async fn create_namespace(&self, namespace: &str) -> Result<(), RuntimeError> {
        let mut state = self.state.lock().unwrap();
        if !state.namespaces.insert(namespace.to_string()) {
            return Err(RuntimeError::NamespaceExists(namespace.to_string()));
        }
        Ok(())
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<(), RuntimeError> {
        let mut state = self.state.lock().unwrap();
        if !state.namespaces.remove(namespace) {
            return Err(RuntimeError::NamespaceNotFound(namespace.to_string()));
        }
        Ok(())
    }

    async fn exists_container(&self, _namespace: &str, id: &str) -> Result<bool, RuntimeError> {
        Ok(self.state.lock().unwrap().containers.contains_key(id))
    }

    async fn get_container(&self, _namespace: &str, id: &str) -> Result<ContainerInfo, RuntimeError> {
        self.state
            .lock()
            .unwrap()
            .containers
            .get(id)
            .cloned()
            .ok_or_else(|| RuntimeError::ContainerNotFound(id.to_string()))
    }

    async fn list_containers(&self, _namespace: &str) -> Result<Vec<String>, RuntimeError> {
        Ok(self.state.lock().unwrap().containers.keys().cloned().collect())
    }

    async fn create_container_from_spec(
        &self,
        _namespace: &str,
        spec: &ContainerSpec,
    ) -> Result<(), RuntimeError> {
        let mut state = self.state.lock().unwrap();
        if state.containers.contains_key(&spec.containerd_id) {
            return Err(RuntimeError::ContainerExists(spec.containerd_id.clone()));
        }
        state.containers.insert(
            spec.containerd_id.clone(),
            ContainerInfo {
                id: spec.containerd_id.clone(),
                image: spec.image.clone(),
                has_task: false,
            },
        );
        Ok(())
    }

    async fn join_namespaces(
        &self,
        _namespace: &str,
        id: &str,
        shared: &SharedNamespaces,
    ) -> Result<(), RuntimeError> {
        let mut state = self.state.lock().unwrap();
        if !state.containers.contains_key(id) {
            return Err(RuntimeError::ContainerNotFound(id.to_string()));
        }
        state.joined.insert(id.to_string(), shared.clone());
        Ok(())
    }

    async fn delete_container(
        &self,
        _namespace: &str,
        id: &str,
        _cleanup_snapshot: bool,
    ) -> Result<(), RuntimeError> {
        let mut state = self.state.lock().unwrap();
        state.tasks.remove(id);
        if state.containers.remove(id).is_none() {
            return Err(RuntimeError::ContainerNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn stop_container(
        &self,
        namespace: &str,
        id: &str,
        opts: StopOptions,
    ) -> Result<(), RuntimeError> {
        self.kill_task(namespace, id, opts.force).await
    }

    async fn start_task(&self, _namespace: &str, container_id: &str) -> Result<u32, RuntimeError> {
        let mut state = self.state.lock().unwrap();
        if !state.containers.contains_key(container_id) {
            return Err(RuntimeError::ContainerNotFound(container_id.to_string()));
        }
        if let Some(task) = state.tasks.get(container_id) {
            if task.status == TaskStatus::Running {
                return Ok(task.pid);
            }
        }
        let pid = state.next_pid;
        state.next_pid += 1;
        state.containers.get_mut(container_id).unwrap().has_task = true;
        state
            .tasks
            .insert(container_id.to_string(), TaskState { status: TaskStatus::Running, pid });
        Ok(pid)
    }

    async fn task_status(
        &self,
        _namespace: &str,
        container_id: &str,
    ) -> Result<TaskStatus, RuntimeError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .tasks
            .get(container_id)
            .map(|t| t.status)
            .unwrap_or(TaskStatus::Unknown))
    }

    async fn task_pid(&self, _namespace: &str, container_id: &str) -> Result<u32, RuntimeError> {
        self.state
            .lock()
            .unwrap()
            .tasks
            .get(container_id)
            .map(|t| t.pid)
            .ok_or_else(|| RuntimeError::TaskNotFound(container_id.to_string()))
    }

    async fn kill_task(
        &self,
        _namespace: &str,
        container_id: &str,
        _force: bool,
    ) -> Result<(), RuntimeError> {
        let mut state = self.state.lock().unwrap();
        if let Some(task) = state.tasks.get_mut(container_id) {
            task.status = TaskStatus::Stopped;
        }
        Ok(())
    }

    async fn cleanup_namespace_resources(
        &self,
        _namespace: &str,
        _snapshotter: &str,
    ) -> Result<(), RuntimeError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metadata::schema::ContainerSpec;

    fn spec(id: &str) -> ContainerSpec {
        ContainerSpec {
            id: id.to_string(),
            image: "registry.k8s.io/pause:3.9".to_string(),
            command: vec![],
            args: vec![],
            cell_name: "cA".to_string(),
            root: true,
            containerd_id: id.to_string(),
            cni_config_path: String::new(),
        }
    }

    #[tokio::test]
    async fn namespace_lifecycle() {
        let client = FakeRuntimeClient::new();
        assert!(!client.exists_namespace("rA").await.unwrap());
        client.create_namespace("rA").await.unwrap();
        assert!(client.exists_namespace("rA").await.unwrap());
        assert!(matches!(
            client.create_namespace("rA").await,
            Err(RuntimeError::NamespaceExists(_))
        ));
        client.delete_namespace("rA").await.unwrap();
        assert!(!client.exists_namespace("rA").await.unwrap());
    }

    #[tokio::test]
    async fn container_and_task_lifecycle() {
        let client = FakeRuntimeClient::new();
        let container = spec("cA-root");
        client
            .create_container_from_spec("rA", &container)
            .await
            .unwrap();
        assert!(client.exists_container("rA", "cA-root").await.unwrap());

        let pid = client.start_task("rA", "cA-root").await.unwrap();
        assert!(pid > 0);
        assert_eq!(client.task_pid("rA", "cA-root").await.unwrap(), pid);
        assert_eq!(
            client.task_status("rA", "cA-root").await.unwrap(),
            TaskStatus::Running
        );

        client.kill_task("rA", "cA-root", true).await.unwrap();
        assert_eq!(
            client.task_status("rA", "cA-root").await.unwrap(),
            TaskStatus::Stopped
        );

        client
            .delete_container("rA", "cA-root", true)
            .await
            .unwrap();
        assert!(!client.exists_container("rA", "cA-root").await.unwrap());
    }

    #[tokio::test]
    async fn join_namespaces_records_paths_and_requires_existing_container() {
        let client = FakeRuntimeClient::new();
        assert!(matches!(
            client
                .join_namespaces("rA", "cA-app", &common::SharedNamespaces::for_root_pid(7))
                .await,
            Err(RuntimeError::ContainerNotFound(_))
        ));

        client
            .create_container_from_spec("rA", &spec("cA-app"))
            .await
            .unwrap();
        let shared = common::SharedNamespaces::for_root_pid(7);
        client.join_namespaces("rA", "cA-app", &shared).await.unwrap();
        assert_eq!(client.joined_namespaces("cA-app"), Some(shared));
    }
}
