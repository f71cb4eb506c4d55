use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("connect to containerd socket: {0}")]
    Connect(#[source] anyhow::Error),

    #[error("namespace {0:?} already exists")]
    NamespaceExists(String),

    #[error("namespace {0:?} not found")]
    NamespaceNotFound(String),

    #[error("container {0:?} already exists")]
    ContainerExists(String),

    #[error("container {0:?} not found")]
    ContainerNotFound(String),

    #[error("task for container {0:?} not found")]
    TaskNotFound(String),

    #[error("containerd call failed: {0}")]
    Grpc(#[source] anyhow::Error),
}
