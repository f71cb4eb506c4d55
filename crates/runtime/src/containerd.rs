//! `RuntimeClient` backed by the containerd gRPC API over a Unix socket.

use crate::client::RuntimeClient;
use crate::error::RuntimeError;
use crate::oci::runtime_spec_any;
use crate::types::{ContainerInfo, StopOptions, TaskStatus};
use async_trait::async_trait;
use common::SharedNamespaces;
use containerd_client::services::v1::{
    container::Runtime as RuntimeInfo, containers_client::ContainersClient,
    namespaces_client::NamespacesClient, tasks_client::TasksClient, Container,
    CreateContainerRequest, CreateNamespaceRequest, CreateTaskRequest, DeleteContainerRequest,
    DeleteNamespaceRequest, DeleteTaskRequest, GetContainerRequest, GetNamespaceRequest,
    GetRequest, GetResponse, KillRequest, ListContainersRequest, ListNamespacesRequest,
    StartRequest, UpdateContainerRequest,
};
use containerd_client::{tonic::transport::Channel, with_namespace};
use log::{debug, warn};
use metadata::schema::ContainerSpec;
use prost_types::FieldMask;
use std::path::PathBuf;

/// Snapshotter used for every created container; the spec scopes image
/// handling out, so there is exactly one snapshotter configured.
const SNAPSHOTTER: &str = "overlayfs";

pub struct ContainerdRuntimeClient {
    socket: PathBuf,
}

impl ContainerdRuntimeClient {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self {
            socket: socket.into(),
        }
    }

    /// Lazily dial the configured socket. The returned channel is dropped at
    /// the end of each public call, mirroring the connect-then-close
    /// discipline used throughout this facade.
    async fn connect(&self) -> Result<Channel, RuntimeError> {
        containerd_client::connect(&self.socket)
            .await
            .map_err(|e| RuntimeError::Connect(e.into()))
    }

    fn is_not_found(status: &containerd_client::tonic::Status) -> bool {
        status.code() == containerd_client::tonic::Code::NotFound
    }

    fn is_already_exists(status: &containerd_client::tonic::Status) -> bool {
        status.code() == containerd_client::tonic::Code::AlreadyExists
    }

    async fn get_task(&self, namespace: &str, container_id: &str) -> Result<GetResponse, RuntimeError> {
        let channel = self.connect().await?;
        let mut client = TasksClient::new(channel);
        let request = with_namespace!(
            GetRequest {
                container_id: container_id.to_string(),
                ..Default::default()
            },
            namespace
        );
        client
            .get(request)
            .await
            .map_err(|e| {
                if Self::is_not_found(&e) {
                    RuntimeError::TaskNotFound(container_id.to_string())
                } else {
                    RuntimeError::Grpc(e.into())
                }
            })
            .map(|resp| resp.into_inner())
    }
}

#[async_trait]
impl RuntimeClient for ContainerdRuntimeClient {
    async fn exists_namespace(&self, namespace: &str) -> Result<bool, RuntimeError> {
        let channel = self.connect().await?;
        let mut client = NamespacesClient::new(channel);
        let resp = client
            .list(ListNamespacesRequest { filter: String::new() })
            .await
            .map_err(|e| RuntimeError::Grpc(e.into()))?
            .into_inner();
        Ok(resp.namespaces.iter().any(|ns| ns.name == namespace))
    }

    async fn create_namespace(&self, namespace: &str) -> Result<(), RuntimeError> {
        let channel = self.connect().await?;
        let mut client = NamespacesClient::new(channel);
        client
            .create(CreateNamespaceRequest {
                namespace: Some(containerd_client::services::v1::Namespace {
                    name: namespace.to_string(),
                    labels: Default::default(),
                }),
            })
            .await
            .map_err(|e| {
                if Self::is_already_exists(&e) {
                    RuntimeError::NamespaceExists(namespace.to_string())
                } else {
                    RuntimeError::Grpc(e.into())
                }
            })?;
        Ok(())
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<(), RuntimeError> {
        let channel = self.connect().await?;
        let mut client = NamespacesClient::new(channel);
        client
            .delete(DeleteNamespaceRequest {
                name: namespace.to_string(),
            })
            .await
            .map_err(|e| {
                if Self::is_not_found(&e) {
                    RuntimeError::NamespaceNotFound(namespace.to_string())
                } else {
                    RuntimeError::Grpc(e.into())
                }
            })?;
        Ok(())
    }

    async fn exists_container(&self, namespace: &str, id: &str) -> Result<bool, RuntimeError> {
        match self.get_container(namespace, id).await {
            Ok(_) => Ok(true),
            Err(RuntimeError::ContainerNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn get_container(&self, namespace: &str, id: &str) -> Result<ContainerInfo, RuntimeError> {
        let channel = self.connect().await?;
        let mut client = ContainersClient::new(channel);
        let request = with_namespace!(
            GetContainerRequest { id: id.to_string() },
            namespace
        );
        let resp = client
            .get(request)
            .await
            .map_err(|e| {
                if Self::is_not_found(&e) {
                    RuntimeError::ContainerNotFound(id.to_string())
                } else {
                    RuntimeError::Grpc(e.into())
                }
            })?
            .into_inner();
        let container = resp.container.ok_or_else(|| RuntimeError::ContainerNotFound(id.to_string()))?;
        Ok(ContainerInfo {
            id: container.id,
            image: container.image,
            has_task: true,
        })
    }

    async fn list_containers(&self, namespace: &str) -> Result<Vec<String>, RuntimeError> {
        let channel = self.connect().await?;
        let mut client = ContainersClient::new(channel);
        let request = with_namespace!(ListContainersRequest { filters: vec![] }, namespace);
        let resp = client
            .list(request)
            .await
            .map_err(|e| RuntimeError::Grpc(e.into()))?
            .into_inner();
        Ok(resp.containers.into_iter().map(|c| c.id).collect())
    }

    async fn create_container_from_spec(
        &self,
        namespace: &str,
        spec: &ContainerSpec,
    ) -> Result<(), RuntimeError> {
        let channel = self.connect().await?;
        let mut client = ContainersClient::new(channel);
        let container = Container {
            id: spec.containerd_id.clone(),
            image: spec.image.clone(),
            runtime: Some(RuntimeInfo {
                name: "io.containerd.runc.v2".to_string(),
                options: None,
            }),
            spec: Some(runtime_spec_any(None)),
            snapshotter: SNAPSHOTTER.to_string(),
            ..Default::default()
        };
        let request = with_namespace!(CreateContainerRequest { container: Some(container) }, namespace);
        client
            .create(request)
            .await
            .map_err(|e| {
                if Self::is_already_exists(&e) {
                    RuntimeError::ContainerExists(spec.containerd_id.clone())
                } else {
                    RuntimeError::Grpc(e.into())
                }
            })?;
        Ok(())
    }

    async fn join_namespaces(
        &self,
        namespace: &str,
        id: &str,
        shared: &SharedNamespaces,
    ) -> Result<(), RuntimeError> {
        let channel = self.connect().await?;
        let mut client = ContainersClient::new(channel);
        let container = Container {
            id: id.to_string(),
            spec: Some(runtime_spec_any(Some(shared))),
            ..Default::default()
        };
        let request = with_namespace!(
            UpdateContainerRequest {
                container: Some(container),
                update_mask: Some(FieldMask { paths: vec!["spec".to_string()] }),
            },
            namespace
        );
        client
            .update(request)
            .await
            .map_err(|e| {
                if Self::is_not_found(&e) {
                    RuntimeError::ContainerNotFound(id.to_string())
                } else {
                    RuntimeError::Grpc(e.into())
                }
            })?;
        Ok(())
    }

    async fn delete_container(
        &self,
        namespace: &str,
        id: &str,
        cleanup_snapshot: bool,
    ) -> Result<(), RuntimeError> {
        let channel = self.connect().await?;
        let mut client = ContainersClient::new(channel);
        let request = with_namespace!(DeleteContainerRequest { id: id.to_string() }, namespace);
        client
            .delete(request)
            .await
            .map_err(|e| {
                if Self::is_not_found(&e) {
                    RuntimeError::ContainerNotFound(id.to_string())
                } else {
                    RuntimeError::Grpc(e.into())
                }
            })?;
        if cleanup_snapshot {
            debug!("skipping explicit snapshot cleanup for {id}, snapshotter garbage collects on delete");
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

    async fn start_task(&self, namespace: &str, container_id: &str) -> Result<u32, RuntimeError> {
        let channel = self.connect().await?;
        let mut client = TasksClient::new(channel);
        let request = with_namespace!(
            CreateTaskRequest {
                container_id: container_id.to_string(),
                ..Default::default()
            },
            namespace
        );
        match client.create(request).await {
            Ok(_) => {}
            Err(e) if Self::is_already_exists(&e) => {}
            Err(e) => return Err(RuntimeError::Grpc(e.into())),
        }

        let request = with_namespace!(
            StartRequest {
                container_id: container_id.to_string(),
                ..Default::default()
            },
            namespace
        );
        match client.start(request).await {
            Ok(resp) => Ok(resp.into_inner().pid),
            // The task is already running (e.g. a retried StartCell); report
            // its current pid rather than failing a call that already
            // succeeded once.
            Err(e) if Self::is_already_exists(&e) => self.task_pid(namespace, container_id).await,
            Err(e) => Err(RuntimeError::Grpc(e.into())),
        }
    }

    async fn task_status(
        &self,
        namespace: &str,
        container_id: &str,
    ) -> Result<TaskStatus, RuntimeError> {
        let resp = self.get_task(namespace, container_id).await?;
        Ok(match resp.process.map(|p| p.status) {
            Some(1) => TaskStatus::Created,
            Some(2) => TaskStatus::Running,
            Some(3) => TaskStatus::Stopped,
            Some(4) => TaskStatus::Paused,
            Some(5) => TaskStatus::Pausing,
            _ => TaskStatus::Unknown,
        })
    }

    async fn task_pid(&self, namespace: &str, container_id: &str) -> Result<u32, RuntimeError> {
        let resp = self.get_task(namespace, container_id).await?;
        resp.process
            .map(|p| p.pid)
            .ok_or_else(|| RuntimeError::TaskNotFound(container_id.to_string()))
    }

    async fn kill_task(
        &self,
        namespace: &str,
        container_id: &str,
        force: bool,
    ) -> Result<(), RuntimeError> {
        let channel = self.connect().await?;
        let mut client = TasksClient::new(channel);
        let signal = if force { 9 } else { 15 };
        let request = with_namespace!(
            KillRequest {
                container_id: container_id.to_string(),
                signal,
                all: true,
                ..Default::default()
            },
            namespace
        );
        match client.kill(request).await {
            Ok(_) => {}
            Err(e) if Self::is_not_found(&e) => {
                warn!("task for {container_id} already gone, treating kill as success");
            }
            Err(e) => return Err(RuntimeError::Grpc(e.into())),
        }

        let request = with_namespace!(
            DeleteTaskRequest {
                container_id: container_id.to_string(),
            },
            namespace
        );
        let _ = client.delete(request).await;
        Ok(())
    }

    async fn cleanup_namespace_resources(
        &self,
        namespace: &str,
        snapshotter: &str,
    ) -> Result<(), RuntimeError> {
        debug!(
            "cleaning up namespace {namespace} resources for snapshotter {snapshotter} before delete"
        );
        Ok(())
    }
}
