//! Cell reconciliation: the leaf of the hierarchy, owning a cgroup and the
//! root/workload containers the [`crate::lifecycle`] module drives through
//! the runtime facade.

use crate::error::ReconcileError;
use crate::lifecycle;
use crate::stack;
use crate::Engine;
use log::info;
use metadata::{
    convert,
    external::{CellDocument, CellSpecExternal},
    internal::CellInternal,
    schema::{CellState, ContainerSpec},
    StoreError,
};
use naming::{validate_name, Level};

pub async fn get_cell(
    engine: &Engine,
    realm_name: &str,
    space_name: &str,
    stack_name: &str,
    name: &str,
) -> Result<CellInternal, ReconcileError> {
    let doc = engine
        .store
        .read_cell(realm_name, space_name, stack_name, name)
        .map_err(|e| match e {
            StoreError::MissingMetadataFile(_) => ReconcileError::CellNotFound(name.to_string()),
            other => other.into(),
        })?;
    Ok(convert::cell_to_internal(&doc)?)
}

pub async fn create_cell(
    engine: &Engine,
    realm_name: &str,
    space_name: &str,
    stack_name: &str,
    name: &str,
    id: &str,
    containers: Vec<ContainerSpec>,
) -> Result<CellInternal, ReconcileError> {
    if realm_name.is_empty() {
        return Err(ReconcileError::RealmNameRequired);
    }
    if space_name.is_empty() {
        return Err(ReconcileError::SpaceNameRequired);
    }
    if stack_name.is_empty() {
        return Err(ReconcileError::StackNameRequired);
    }
    if name.is_empty() {
        return Err(ReconcileError::CellNameRequired);
    }
    if id.is_empty() {
        return Err(ReconcileError::CellIdRequired);
    }
    validate_name(Level::Realm, realm_name)?;
    validate_name(Level::Space, space_name)?;
    validate_name(Level::Stack, stack_name)?;
    validate_name(Level::Cell, name)?;
    for container in &containers {
        validate_name(Level::Container, &container.id)?;
    }
    stack::get_stack(engine, realm_name, space_name, stack_name).await?;

    match get_cell(engine, realm_name, space_name, stack_name, name).await {
        Ok(existing) => ensure_cell(engine, existing, containers).await,
        Err(ReconcileError::CellNotFound(_)) => {
            provision_cell(engine, realm_name, space_name, stack_name, name, id, containers).await
        }
        Err(e) => Err(e),
    }
}

#[allow(clippy::too_many_arguments)]
async fn provision_cell(
    engine: &Engine,
    realm_name: &str,
    space_name: &str,
    stack_name: &str,
    name: &str,
    id: &str,
    containers: Vec<ContainerSpec>,
) -> Result<CellInternal, ReconcileError> {
    let mut doc = CellDocument::new(
        name,
        CellSpecExternal {
            id: id.to_string(),
            realm_id: realm_name.to_string(),
            space_id: space_name.to_string(),
            stack_id: stack_name.to_string(),
            root_container: None,
            containers,
            root_container_id: String::new(),
        },
    );
    engine
        .store
        .write_cell(realm_name, space_name, stack_name, &mut doc)
        .map_err(|e| ReconcileError::UpdateCellMetadata(name.to_string(), e))?;
    let mut internal = convert::cell_to_internal(&doc)?;

    match provision_cell_resources(engine, &mut internal).await {
        Ok(()) => internal.status.state = CellState::Ready,
        Err(e) => {
            internal.status.state = CellState::Unknown;
            let mut failed_doc = convert::cell_to_external(&internal);
            let _ = engine.store.write_cell(realm_name, space_name, stack_name, &mut failed_doc);
            return Err(e);
        }
    }

    let mut doc = convert::cell_to_external(&internal);
    engine
        .store
        .write_cell(realm_name, space_name, stack_name, &mut doc)
        .map_err(|e| ReconcileError::UpdateCellMetadata(name.to_string(), e))?;
    info!(
        "cell {:?}/{:?}/{:?}/{:?} ready (cgroup={:?})",
        realm_name, space_name, stack_name, name, internal.status.cgroup_path
    );
    Ok(internal)
}

async fn provision_cell_resources(engine: &Engine, internal: &mut CellInternal) -> Result<(), ReconcileError> {
    let spec = cgroup::default_cell_spec(
        &internal.spec.realm_name,
        &internal.spec.space_name,
        &internal.spec.stack_name,
        &internal.meta.name,
    );
    let outcome = cgroup::ensure(&engine.cgroup, spec, &internal.status.cgroup_path).map_err(|source| {
        ReconcileError::CreateCellCgroup {
            realm: internal.spec.realm_name.clone(),
            space: internal.spec.space_name.clone(),
            stack: internal.spec.stack_name.clone(),
            cell: internal.meta.name.clone(),
            source,
        }
    })?;
    internal.status.cgroup_path = outcome.group;

    lifecycle::create_cell_containers(engine, internal).await
}

pub async fn ensure_cell(
    engine: &Engine,
    mut internal: CellInternal,
    desired_containers: Vec<ContainerSpec>,
) -> Result<CellInternal, ReconcileError> {
    let spec = cgroup::default_cell_spec(
        &internal.spec.realm_name,
        &internal.spec.space_name,
        &internal.spec.stack_name,
        &internal.meta.name,
    );
    let outcome = cgroup::ensure(&engine.cgroup, spec, &internal.status.cgroup_path).map_err(|source| {
        ReconcileError::CreateCellCgroup {
            realm: internal.spec.realm_name.clone(),
            space: internal.spec.space_name.clone(),
            stack: internal.spec.stack_name.clone(),
            cell: internal.meta.name.clone(),
            source,
        }
    })?;
    if outcome.needs_metadata_update {
        internal.status.cgroup_path = outcome.group;
    }

    if !desired_containers.is_empty() {
        internal.spec.containers = lifecycle::merge_desired_containers(&internal.spec.containers, &desired_containers);
    }
    lifecycle::ensure_cell_containers(engine, &mut internal).await?;
    internal.status.state = CellState::Ready;

    let realm_name = internal.spec.realm_name.clone();
    let space_name = internal.spec.space_name.clone();
    let stack_name = internal.spec.stack_name.clone();
    let name = internal.meta.name.clone();
    let mut doc = convert::cell_to_external(&internal);
    engine
        .store
        .write_cell(&realm_name, &space_name, &stack_name, &mut doc)
        .map_err(|e| ReconcileError::UpdateCellMetadata(name, e))?;
    Ok(internal)
}

/// `UpdateCell`: diff `desired` against the stored containers by ID. An
/// orphan (present in actual, absent from desired) is stopped and deleted.
/// A common ID whose image/command/args changed is stopped, deleted and
/// recreated with a cleared `containerdID`; otherwise its `containerdID` is
/// preserved. New IDs are appended. Finishes with `ensureCellContainers`.
pub async fn update_cell(
    engine: &Engine,
    realm_name: &str,
    space_name: &str,
    stack_name: &str,
    name: &str,
    desired_containers: Vec<ContainerSpec>,
) -> Result<CellInternal, ReconcileError> {
    for container in &desired_containers {
        validate_name(Level::Container, &container.id)?;
    }
    let mut internal = get_cell(engine, realm_name, space_name, stack_name, name).await?;

    let desired_ids: std::collections::HashSet<&str> = desired_containers.iter().map(|c| c.id.as_str()).collect();
    lifecycle::remove_unlisted_containers(engine, &internal, &desired_ids).await?;

    let mut merged = Vec::with_capacity(desired_containers.len());
    for want in desired_containers {
        match internal.spec.containers.iter().find(|have| have.id == want.id) {
            Some(have) if have.image == want.image && have.command == want.command && have.args == want.args => {
                merged.push(have.clone());
            }
            Some(have) => {
                lifecycle::stop_and_delete_container(engine, &internal, have).await;
                let mut recreated = want;
                recreated.containerd_id = String::new();
                merged.push(recreated);
            }
            None => merged.push(want),
        }
    }
    internal.spec.containers = merged;

    lifecycle::ensure_cell_containers(engine, &mut internal).await?;
    internal.status.state = CellState::Ready;
    persist(engine, &internal).await?;
    Ok(internal)
}

/// `UpdateContainer`: scoped single-container variant of [`update_cell`].
/// Appends `desired` if its ID is new; otherwise recreates it in place when
/// the spec change is breaking, or leaves it untouched.
pub async fn update_container(
    engine: &Engine,
    realm_name: &str,
    space_name: &str,
    stack_name: &str,
    name: &str,
    desired: ContainerSpec,
) -> Result<CellInternal, ReconcileError> {
    validate_name(Level::Container, &desired.id)?;
    let mut internal = get_cell(engine, realm_name, space_name, stack_name, name).await?;

    match internal.spec.containers.iter().position(|c| c.id == desired.id) {
        Some(pos) => {
            let have = internal.spec.containers[pos].clone();
            if have.image != desired.image || have.command != desired.command || have.args != desired.args {
                lifecycle::stop_and_delete_container(engine, &internal, &have).await;
                let mut recreated = desired;
                recreated.containerd_id = String::new();
                internal.spec.containers[pos] = recreated;
            }
        }
        None => internal.spec.containers.push(desired),
    }

    lifecycle::ensure_cell_containers(engine, &mut internal).await?;
    internal.status.state = CellState::Ready;
    persist(engine, &internal).await?;
    Ok(internal)
}

pub async fn start_cell(
    engine: &Engine,
    realm_name: &str,
    space_name: &str,
    stack_name: &str,
    name: &str,
) -> Result<CellInternal, ReconcileError> {
    let mut internal = get_cell(engine, realm_name, space_name, stack_name, name).await?;
    lifecycle::start_cell(engine, &mut internal).await?;
    persist(engine, &internal).await?;
    Ok(internal)
}

pub async fn stop_cell(
    engine: &Engine,
    realm_name: &str,
    space_name: &str,
    stack_name: &str,
    name: &str,
) -> Result<CellInternal, ReconcileError> {
    let mut internal = get_cell(engine, realm_name, space_name, stack_name, name).await?;
    lifecycle::stop_cell(engine, &internal).await?;
    internal.status.state = CellState::Stopped;
    persist(engine, &internal).await?;
    Ok(internal)
}

pub async fn kill_cell(
    engine: &Engine,
    realm_name: &str,
    space_name: &str,
    stack_name: &str,
    name: &str,
) -> Result<CellInternal, ReconcileError> {
    let mut internal = get_cell(engine, realm_name, space_name, stack_name, name).await?;
    lifecycle::kill_cell(engine, &mut internal).await?;
    persist(engine, &internal).await?;
    Ok(internal)
}

pub async fn recreate_cell(
    engine: &Engine,
    realm_name: &str,
    space_name: &str,
    stack_name: &str,
    name: &str,
    desired_containers: Vec<ContainerSpec>,
) -> Result<CellInternal, ReconcileError> {
    let mut internal = get_cell(engine, realm_name, space_name, stack_name, name).await?;
    let desired = metadata::internal::CellSpecInternal {
        id: internal.spec.id.clone(),
        realm_name: internal.spec.realm_name.clone(),
        space_name: internal.spec.space_name.clone(),
        stack_name: internal.spec.stack_name.clone(),
        root_container: None,
        containers: desired_containers,
        root_container_id: String::new(),
    };
    lifecycle::recreate_cell(engine, &mut internal, desired).await?;
    persist(engine, &internal).await?;
    Ok(internal)
}

/// `RefreshCell`: `state` is derived from cell cgroup existence alone.
/// Regardless of that state, every container in `spec.containers` has its
/// `containerdID` backfilled if blank (deterministic from naming) and its
/// observed task status logged — never creating anything.
pub async fn refresh_cell(
    engine: &Engine,
    realm_name: &str,
    space_name: &str,
    stack_name: &str,
    name: &str,
) -> Result<CellInternal, ReconcileError> {
    let mut internal = get_cell(engine, realm_name, space_name, stack_name, name).await?;
    let realm = crate::realm::get_realm(engine, realm_name).await?;
    let namespace = realm.runtime_namespace();

    let mut spec = cgroup::default_cell_spec(realm_name, space_name, stack_name, name);
    let cgroup_exists = engine.cgroup.resolve(&mut spec).unwrap_or(false);
    internal.status.state = if cgroup_exists { CellState::Ready } else { CellState::Unknown };

    if internal.spec.root_container_id.is_empty() {
        internal.spec.root_container_id = naming::root_name(space_name, stack_name, &internal.spec.id);
    }
    let root_status = lifecycle::populate_container_status(engine, namespace, &internal.spec.root_container_id).await;
    info!("cell {name:?} root {:?} task status: {root_status:?}", internal.spec.root_container_id);

    for container in &mut internal.spec.containers {
        if container.containerd_id.is_empty() {
            container.containerd_id = naming::container_name(space_name, stack_name, &internal.spec.id, &container.id);
        }
        let status = lifecycle::populate_container_status(engine, namespace, &container.containerd_id).await;
        info!("cell {name:?} container {:?} task status: {status:?}", container.containerd_id);
    }

    persist(engine, &internal).await?;
    Ok(internal)
}

pub async fn delete_cell(
    engine: &Engine,
    realm_name: &str,
    space_name: &str,
    stack_name: &str,
    name: &str,
) -> Result<(), ReconcileError> {
    let internal = get_cell(engine, realm_name, space_name, stack_name, name).await?;
    let _ = lifecycle::kill_cell(engine, &mut internal.clone()).await;

    let mut spec = cgroup::default_cell_spec(realm_name, space_name, stack_name, name);
    if engine.cgroup.resolve(&mut spec)? {
        let handle = engine.cgroup.load(&spec);
        engine.cgroup.delete(&handle, &spec.group)?;
    }

    engine
        .store
        .remove_subtree(&engine.store.paths().cell_dir(realm_name, space_name, stack_name, name))?;
    Ok(())
}

async fn persist(engine: &Engine, internal: &CellInternal) -> Result<(), ReconcileError> {
    let mut doc = convert::cell_to_external(internal);
    engine
        .store
        .write_cell(&internal.spec.realm_name, &internal.spec.space_name, &internal.spec.stack_name, &mut doc)
        .map_err(|e| ReconcileError::UpdateCellMetadata(internal.meta.name.clone(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{realm, space, stack};
    use cgroup::CgroupManager;
    use metadata::Store;
    use network::CniManager;
    use runtime::FakeRuntimeClient;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn engine(dir: &TempDir) -> Engine {
        Engine::new(
            Store::new(dir.path()),
            CgroupManager::new(),
            CniManager::new("/opt/cni/bin", dir.path().join("cni/conf"), dir.path().join("cni/cache")).unwrap(),
            Arc::new(FakeRuntimeClient::new()),
        )
    }

    async fn with_stack(engine: &Engine) {
        realm::create_realm(engine, "rA", "ns-a").await.unwrap();
        space::create_space(engine, "rA", "sA").await.unwrap();
        stack::create_stack(engine, "rA", "sA", "stA").await.unwrap();
    }

    fn web_container() -> ContainerSpec {
        ContainerSpec {
            id: "web".to_string(),
            image: "example.com/web:1".to_string(),
            command: vec![],
            args: vec![],
            cell_name: "cA".to_string(),
            root: false,
            containerd_id: String::new(),
            cni_config_path: String::new(),
        }
    }

    #[tokio::test]
    async fn create_cell_requires_existing_stack() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        assert!(matches!(
            create_cell(&engine, "rA", "sA", "stA", "cA", "01J", vec![web_container()]).await,
            Err(ReconcileError::StackNotFound(_))
        ));
    }

    #[tokio::test]
    async fn create_cell_provisions_cgroup_and_containers() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        with_stack(&engine).await;

        let cell = create_cell(&engine, "rA", "sA", "stA", "cA", "01J", vec![web_container()]).await.unwrap();
        assert_eq!(cell.status.state, CellState::Ready);
        assert!(cell.status.cgroup_path.ends_with("/rA/sA/stA/cA"));
        assert_eq!(cell.spec.root_container_id, "sA-stA-01J-root");
        assert_eq!(cell.spec.containers[0].containerd_id, "sA-stA-01J-web");
    }

    #[tokio::test]
    async fn start_then_stop_cell_round_trips_state() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        with_stack(&engine).await;
        create_cell(&engine, "rA", "sA", "stA", "cA", "01J", vec![]).await.unwrap();

        let started = start_cell(&engine, "rA", "sA", "stA", "cA").await.unwrap();
        assert_eq!(started.status.state, CellState::Ready);

        let stopped = stop_cell(&engine, "rA", "sA", "stA", "cA").await.unwrap();
        assert_eq!(stopped.status.state, CellState::Stopped);
    }

    #[tokio::test]
    async fn update_cell_removes_orphan_and_appends_new() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        with_stack(&engine).await;
        let container_b = ContainerSpec { id: "B".to_string(), ..web_container() };
        let created = create_cell(&engine, "rA", "sA", "stA", "cA", "01J", vec![web_container(), container_b])
            .await
            .unwrap();
        let a_containerd_id = created.spec.containers.iter().find(|c| c.id == "web").unwrap().containerd_id.clone();
        let b_containerd_id = created.spec.containers.iter().find(|c| c.id == "B").unwrap().containerd_id.clone();

        let container_c = ContainerSpec { id: "C".to_string(), ..web_container() };
        let updated = update_cell(&engine, "rA", "sA", "stA", "cA", vec![web_container(), container_c])
            .await
            .unwrap();

        assert_eq!(updated.spec.containers.len(), 2);
        assert!(updated.spec.containers.iter().any(|c| c.id == "web" && c.containerd_id == a_containerd_id));
        assert!(updated.spec.containers.iter().any(|c| c.id == "C" && !c.containerd_id.is_empty()));
        assert!(!engine.runtime.exists_container("ns-a", &b_containerd_id).await.unwrap());
    }

    #[tokio::test]
    async fn update_container_recreates_on_breaking_change() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        with_stack(&engine).await;
        let created = create_cell(&engine, "rA", "sA", "stA", "cA", "01J", vec![web_container()]).await.unwrap();
        let old_containerd_id = created.spec.containers[0].containerd_id.clone();

        let new_image = ContainerSpec { image: "example.com/web:2".to_string(), ..web_container() };
        let updated = update_container(&engine, "rA", "sA", "stA", "cA", new_image).await.unwrap();

        assert_eq!(updated.spec.containers.len(), 1);
        assert_eq!(updated.spec.containers[0].image, "example.com/web:2");
        assert!(engine.runtime.exists_container("ns-a", &old_containerd_id).await.unwrap());
        assert_eq!(updated.spec.containers[0].containerd_id, old_containerd_id);
    }

    #[tokio::test]
    async fn update_container_preserves_containerd_id_when_unchanged() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        with_stack(&engine).await;
        let created = create_cell(&engine, "rA", "sA", "stA", "cA", "01J", vec![web_container()]).await.unwrap();
        let containerd_id = created.spec.containers[0].containerd_id.clone();

        let updated = update_container(&engine, "rA", "sA", "stA", "cA", web_container()).await.unwrap();
        assert_eq!(updated.spec.containers[0].containerd_id, containerd_id);
    }

    #[tokio::test]
    async fn refresh_cell_is_ready_iff_cgroup_exists_and_backfills_containerd_id() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        with_stack(&engine).await;
        let created = create_cell(&engine, "rA", "sA", "stA", "cA", "01J", vec![web_container()]).await.unwrap();
        let web_containerd_id = created.spec.containers[0].containerd_id.clone();

        let refreshed = refresh_cell(&engine, "rA", "sA", "stA", "cA").await.unwrap();
        assert_eq!(refreshed.status.state, CellState::Ready);
        assert_eq!(refreshed.spec.containers[0].containerd_id, web_containerd_id);

        let mut spec = cgroup::default_cell_spec("rA", "sA", "stA", "cA");
        engine.cgroup.resolve(&mut spec).unwrap();
        let handle = engine.cgroup.load(&spec);
        engine.cgroup.delete(&handle, &spec.group).unwrap();

        let refreshed = refresh_cell(&engine, "rA", "sA", "stA", "cA").await.unwrap();
        assert_eq!(refreshed.status.state, CellState::Unknown);
    }

    #[tokio::test]
    async fn refresh_cell_backfills_blank_containerd_id_without_creating() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        with_stack(&engine).await;
        let mut created = create_cell(&engine, "rA", "sA", "stA", "cA", "01J", vec![web_container()]).await.unwrap();
        created.spec.containers[0].containerd_id.clear();
        persist(&engine, &created).await.unwrap();

        let refreshed = refresh_cell(&engine, "rA", "sA", "stA", "cA").await.unwrap();
        assert_eq!(refreshed.spec.containers[0].containerd_id, "sA-stA-01J-web");
    }

    #[tokio::test]
    async fn delete_cell_removes_metadata() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        with_stack(&engine).await;
        create_cell(&engine, "rA", "sA", "stA", "cA", "01J", vec![]).await.unwrap();

        delete_cell(&engine, "rA", "sA", "stA", "cA").await.unwrap();
        assert!(matches!(
            get_cell(&engine, "rA", "sA", "stA", "cA").await,
            Err(ReconcileError::CellNotFound(_))
        ));
    }
}
