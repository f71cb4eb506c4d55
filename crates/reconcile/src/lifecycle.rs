//! Cell Lifecycle Engine: creating, starting, stopping, killing and
//! recreating a Cell's root and workload containers in the order the spec
//! requires — root first on create/start, workload first on stop/kill, CNI
//! detached after the root's task is gone but before its netns disappears.

use crate::error::ReconcileError;
use crate::realm;
use crate::Engine;
use common::SharedNamespaces;
use log::warn;
use metadata::{
    internal::{CellInternal, CellSpecInternal},
    schema::{CellState, ContainerSpec, ContainerState},
};
use runtime::{RuntimeError, StopOptions, TaskStatus};
use std::time::Duration;

/// Image used for a Cell's root container when `cell.spec.rootContainer` is
/// left unset. Mirrors the pause-container pattern: a long-lived process
/// that exists only to hold namespaces open for its workload siblings.
pub const DEFAULT_ROOT_IMAGE: &str = "registry.k8s.io/pause:3.9";

const STOP_TIMEOUT: Duration = Duration::from_secs(5);

async fn runtime_namespace(engine: &Engine, realm_name: &str) -> Result<String, ReconcileError> {
    let realm = realm::get_realm(engine, realm_name).await?;
    Ok(realm.runtime_namespace().to_string())
}

fn default_root_container() -> ContainerSpec {
    ContainerSpec {
        id: "root".to_string(),
        image: DEFAULT_ROOT_IMAGE.to_string(),
        command: Vec::new(),
        args: Vec::new(),
        cell_name: String::new(),
        root: true,
        containerd_id: String::new(),
        cni_config_path: String::new(),
    }
}

/// Create (or idempotently re-register) a Cell's root container, then each
/// workload container, root first. Used by both `CreateCell`'s provisioning
/// path and `EnsureCell`'s reconciliation path — a container that already
/// exists on the runtime side is not an error here.
pub async fn create_cell_containers(engine: &Engine, cell: &mut CellInternal) -> Result<(), ReconcileError> {
    let namespace = runtime_namespace(engine, &cell.spec.realm_name).await?;
    let cni_config_path = engine
        .store
        .paths()
        .network_conflist_path(&cell.spec.realm_name, &cell.spec.space_name)
        .display()
        .to_string();

    let mut root = cell.spec.root_container.clone().unwrap_or_else(default_root_container);
    let root_id = naming::root_name(&cell.spec.space_name, &cell.spec.stack_name, &cell.spec.id);
    root.containerd_id = root_id.clone();
    root.cell_name = cell.meta.name.clone();
    root.root = true;
    root.cni_config_path = cni_config_path.clone();
    create_container_idempotent(engine, &namespace, &root).await?;
    cell.spec.root_container = Some(root);
    cell.spec.root_container_id = root_id;

    for container in &mut cell.spec.containers {
        if container.containerd_id.is_empty() {
            container.containerd_id =
                naming::container_name(&cell.spec.space_name, &cell.spec.stack_name, &cell.spec.id, &container.id);
        }
        container.cell_name = cell.meta.name.clone();
        container.root = false;
        container.cni_config_path = cni_config_path.clone();
        create_container_idempotent(engine, &namespace, container).await?;
    }
    Ok(())
}

/// `EnsureCell`'s container half: identical creation semantics to
/// [`create_cell_containers`] (both already absorb "already exists"), kept
/// as a distinct name so call sites read like the spec's own algorithm
/// names.
pub async fn ensure_cell_containers(engine: &Engine, cell: &mut CellInternal) -> Result<(), ReconcileError> {
    create_cell_containers(engine, cell).await
}

async fn create_container_idempotent(engine: &Engine, namespace: &str, spec: &ContainerSpec) -> Result<(), ReconcileError> {
    match engine.runtime.create_container_from_spec(namespace, spec).await {
        Ok(()) => Ok(()),
        Err(RuntimeError::ContainerExists(_)) => Ok(()),
        Err(e) => Err(ReconcileError::CreateRootContainer(spec.containerd_id.clone(), e)),
    }
}

/// Merge newly-requested containers into the persisted list, deduped by
/// container ID, append-only: every existing entry is kept as-is (orphan
/// removal and image-change recreation are `UpdateCell`'s job, not
/// `EnsureCell`'s), and any `desired` entry whose ID isn't already present
/// is appended.
pub fn merge_desired_containers(existing: &[ContainerSpec], desired: &[ContainerSpec]) -> Vec<ContainerSpec> {
    let mut merged = existing.to_vec();
    for want in desired {
        if !merged.iter().any(|have| have.id == want.id) {
            merged.push(want.clone());
        }
    }
    merged
}

/// `UpdateCell`'s orphan half: stop and delete every container on `cell`
/// whose ID is not present in `desired_ids` — present in actual, absent
/// from desired.
pub async fn remove_unlisted_containers(
    engine: &Engine,
    cell: &CellInternal,
    desired_ids: &std::collections::HashSet<&str>,
) -> Result<(), ReconcileError> {
    let namespace = runtime_namespace(engine, &cell.spec.realm_name).await?;
    for container in &cell.spec.containers {
        if desired_ids.contains(container.id.as_str()) || container.containerd_id.is_empty() {
            continue;
        }
        stop_one(engine, &namespace, &container.containerd_id).await;
        if let Err(e) = engine.runtime.delete_container(&namespace, &container.containerd_id, true).await {
            warn!("delete stale container {:?}: {e}", container.containerd_id);
        }
    }
    Ok(())
}

/// `UpdateCell`/`UpdateContainer`'s breaking-change half: stop and delete a
/// single still-registered container ahead of a recreate.
pub async fn stop_and_delete_container(engine: &Engine, cell: &CellInternal, container: &ContainerSpec) {
    if container.containerd_id.is_empty() {
        return;
    }
    let namespace = match runtime_namespace(engine, &cell.spec.realm_name).await {
        Ok(ns) => ns,
        Err(e) => {
            warn!("resolve namespace to delete {:?}: {e}", container.containerd_id);
            return;
        }
    };
    stop_one(engine, &namespace, &container.containerd_id).await;
    if let Err(e) = engine.runtime.delete_container(&namespace, &container.containerd_id, true).await {
        warn!("delete updated container {:?}: {e}", container.containerd_id);
    }
}

/// `StartCell`: start the root container's task, derive its namespaces from
/// the resulting PID, CNI-ADD against the root's netns, then join and start
/// every workload container in the root's namespaces.
pub async fn start_cell(engine: &Engine, cell: &mut CellInternal) -> Result<(), ReconcileError> {
    let namespace = runtime_namespace(engine, &cell.spec.realm_name).await?;
    let root_id = cell.spec.root_container_id.clone();
    if root_id.is_empty() {
        return Err(ReconcileError::ContainerNotFound("root".to_string()));
    }

    let root_pid = engine.runtime.start_task(&namespace, &root_id).await?;
    let shared = SharedNamespaces::for_root_pid(root_pid);

    let conflist_path = engine.store.paths().network_conflist_path(&cell.spec.realm_name, &cell.spec.space_name);
    let list = engine.cni.load(&conflist_path)?;
    let netns_path = shared.net.path.display().to_string();
    match engine.cni.add(&list, &root_id, &netns_path).await {
        Ok(_) => {}
        Err(network::CniError::AlreadyAttached) => {}
        Err(e) => return Err(e.into()),
    }

    for container in &cell.spec.containers {
        engine.runtime.join_namespaces(&namespace, &container.containerd_id, &shared).await?;
        engine.runtime.start_task(&namespace, &container.containerd_id).await?;
    }

    cell.status.state = CellState::Ready;
    Ok(())
}

/// `StopCell`: stop workload tasks first, capture the root's PID before
/// stopping it (needed to resolve its netns for CNI DEL, since the netns
/// disappears once the root's task exits), then CNI-DEL best-effort.
pub async fn stop_cell(engine: &Engine, cell: &CellInternal) -> Result<(), ReconcileError> {
    let namespace = runtime_namespace(engine, &cell.spec.realm_name).await?;

    for container in &cell.spec.containers {
        stop_one(engine, &namespace, &container.containerd_id).await;
    }

    let root_id = &cell.spec.root_container_id;
    let root_pid = engine.runtime.task_pid(&namespace, root_id).await.ok();
    stop_one(engine, &namespace, root_id).await;

    if let Some(pid) = root_pid {
        detach_cni(engine, cell, root_id, pid).await;
    }
    Ok(())
}

async fn stop_one(engine: &Engine, namespace: &str, container_id: &str) {
    if container_id.is_empty() {
        return;
    }
    let opts = StopOptions { force: true, timeout: STOP_TIMEOUT };
    if let Err(e) = engine.runtime.stop_container(namespace, container_id, opts).await {
        warn!("stop container {container_id:?}: {e}");
    }
}

async fn detach_cni(engine: &Engine, cell: &CellInternal, root_id: &str, root_pid: u32) {
    let conflist_path = engine.store.paths().network_conflist_path(&cell.spec.realm_name, &cell.spec.space_name);
    let list = match engine.cni.load(&conflist_path) {
        Ok(list) => list,
        Err(e) => {
            warn!("load conflist for cni detach: {e}");
            return;
        }
    };
    let netns_path = SharedNamespaces::for_root_pid(root_pid).net.path.display().to_string();
    engine.cni.del(&list, root_id, &netns_path).await;
}

/// Per-container kill. The root container cannot be killed in isolation —
/// killing it would tear down every workload's shared namespaces out from
/// under them — so callers must go through [`kill_cell`] instead.
pub async fn kill_container(engine: &Engine, cell: &CellInternal, container_id: &str) -> Result<(), ReconcileError> {
    if container_id == cell.spec.root_container_id {
        return Err(ReconcileError::KillRootDirectly);
    }
    let namespace = runtime_namespace(engine, &cell.spec.realm_name).await?;
    engine.runtime.kill_task(&namespace, container_id, true).await?;
    engine.runtime.delete_container(&namespace, container_id, true).await?;
    Ok(())
}

/// `KillCell`: force-kill workload tasks first, capture the root's PID,
/// force-kill and delete the root, then best-effort CNI detach and a
/// best-effort purge of any remaining CNI cache entries for this network.
pub async fn kill_cell(engine: &Engine, cell: &mut CellInternal) -> Result<(), ReconcileError> {
    let namespace = runtime_namespace(engine, &cell.spec.realm_name).await?;

    for container in &cell.spec.containers {
        if container.containerd_id.is_empty() {
            continue;
        }
        let _ = engine.runtime.kill_task(&namespace, &container.containerd_id, true).await;
        let _ = engine.runtime.delete_container(&namespace, &container.containerd_id, true).await;
    }

    let root_id = cell.spec.root_container_id.clone();
    let root_pid = engine.runtime.task_pid(&namespace, &root_id).await.ok();
    if !root_id.is_empty() {
        let _ = engine.runtime.kill_task(&namespace, &root_id, true).await;
        let _ = engine.runtime.delete_container(&namespace, &root_id, true).await;
    }

    if let Some(pid) = root_pid {
        detach_cni(engine, cell, &root_id, pid).await;
    }

    cell.status.state = CellState::Stopped;
    Ok(())
}

/// `RecreateCell`: tear down every existing container, clear their
/// `containerdID`s so a breaking spec change starts from a clean slate,
/// then provision the desired spec. The cgroup path survives unchanged —
/// only the containers are rebuilt.
pub async fn recreate_cell(engine: &Engine, cell: &mut CellInternal, desired: CellSpecInternal) -> Result<(), ReconcileError> {
    let _ = stop_cell(engine, cell).await;

    let namespace = runtime_namespace(engine, &cell.spec.realm_name).await?;
    for container in &cell.spec.containers {
        if !container.containerd_id.is_empty() {
            let _ = engine.runtime.delete_container(&namespace, &container.containerd_id, true).await;
        }
    }
    if !cell.spec.root_container_id.is_empty() {
        let _ = engine.runtime.delete_container(&namespace, &cell.spec.root_container_id, true).await;
    }

    let cgroup_path = cell.status.cgroup_path.clone();
    cell.spec = CellSpecInternal {
        root_container: None,
        root_container_id: String::new(),
        containers: desired.containers.into_iter().map(|mut c| {
            c.containerd_id.clear();
            c
        }).collect(),
        ..desired
    };
    cell.status.cgroup_path = cgroup_path;

    create_cell_containers(engine, cell).await?;
    cell.status.state = CellState::Ready;
    Ok(())
}

/// Maps a runtime task's current status to a Cell container's externally
/// reported state. Shared by `RefreshCell` and the tail of `KillCell`.
pub async fn populate_container_status(engine: &Engine, namespace: &str, containerd_id: &str) -> ContainerState {
    if containerd_id.is_empty() {
        return ContainerState::Unknown;
    }
    match engine.runtime.task_status(namespace, containerd_id).await {
        Ok(TaskStatus::Running) => ContainerState::Ready,
        Ok(TaskStatus::Created) => ContainerState::Pending,
        Ok(TaskStatus::Paused) => ContainerState::Paused,
        Ok(TaskStatus::Pausing) => ContainerState::Pausing,
        Ok(TaskStatus::Stopped) => ContainerState::Stopped,
        Ok(TaskStatus::Unknown) => ContainerState::Unknown,
        Err(_) => ContainerState::Unknown,
    }
}
