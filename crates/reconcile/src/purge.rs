//! Best-effort forced cleanup. Unlike `delete_*`, every step here tolerates
//! missing preconditions and is attempted regardless of earlier failures;
//! only the last unrecoverable error (if any) is returned.

use crate::lifecycle;
use crate::{cell, realm, space, stack};
use crate::{Engine, ReconcileError};
use log::warn;
use naming::split_realm_space;

/// `PurgeRealm`: stop/delete every container in the realm's runtime
/// namespace, scrub leftover CNI network state by realm-name prefix, tear
/// down the runtime namespace, remove the metadata subtree, force-delete
/// the realm cgroup.
pub async fn purge_realm(engine: &Engine, realm_name: &str) -> Result<(), ReconcileError> {
    let mut last_err = None;

    let namespace = match realm::get_realm(engine, realm_name).await {
        Ok(r) => r.runtime_namespace().to_string(),
        Err(_) => realm_name.to_string(),
    };

    if let Ok(ids) = engine.runtime.list_containers(&namespace).await {
        for id in ids {
            purge_container(engine, &namespace, &id).await;
        }
    }

    scrub_cni_prefix(engine, realm_name).await;

    let _ = engine.runtime.cleanup_namespace_resources(&namespace, "overlayfs").await;
    if let Err(e) = engine.runtime.delete_namespace(&namespace).await {
        if !matches!(e, runtime::RuntimeError::NamespaceNotFound(_)) {
            warn!("purge realm {realm_name:?}: delete namespace: {e}");
            last_err = Some(ReconcileError::Runtime(e));
        }
    }

    if let Err(e) = engine.store.remove_subtree(&engine.store.paths().realm_dir(realm_name)) {
        warn!("purge realm {realm_name:?}: remove metadata: {e}");
        last_err = Some(e.into());
    }

    let mut spec = cgroup::default_realm_spec(realm_name);
    if let Ok(true) = engine.cgroup.resolve(&mut spec) {
        let handle = engine.cgroup.load(&spec);
        if let Err(e) = engine.cgroup.delete(&handle, &spec.group) {
            warn!("purge realm {realm_name:?}: delete cgroup: {e}");
            last_err = Some(e.into());
        }
    }

    match last_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// `PurgeSpace`: analogous to [`purge_realm`] but scoped to containers and
/// CNI state whose identifiers are prefixed `<realm>-<space>`.
pub async fn purge_space(engine: &Engine, realm_name: &str, space_name: &str) -> Result<(), ReconcileError> {
    let mut last_err = None;
    let namespace = match realm::get_realm(engine, realm_name).await {
        Ok(r) => r.runtime_namespace().to_string(),
        Err(_) => realm_name.to_string(),
    };
    let prefix = naming::network_name(realm_name, space_name);

    if let Ok(ids) = engine.runtime.list_containers(&namespace).await {
        for id in ids.into_iter().filter(|id| id.starts_with(&format!("{prefix}-"))) {
            purge_container(engine, &namespace, &id).await;
        }
    }

    let _ = std::fs::remove_file(engine.store.paths().network_conflist_path(realm_name, space_name));
    if let Ok(entries) = engine.store.list_children(engine.cni.cache_dir()) {
        for entry in entries.into_iter().filter(|e| e.starts_with(&prefix)) {
            let _ = engine.store.remove_subtree(&engine.cni.cache_dir().join(entry));
        }
    }

    let mut spec = cgroup::default_space_spec(realm_name, space_name);
    if let Ok(true) = engine.cgroup.resolve(&mut spec) {
        let handle = engine.cgroup.load(&spec);
        if let Err(e) = engine.cgroup.delete(&handle, &spec.group) {
            warn!("purge space {realm_name:?}/{space_name:?}: delete cgroup: {e}");
            last_err = Some(e.into());
        }
    }

    if let Err(e) = engine.store.remove_subtree(&engine.store.paths().space_dir(realm_name, space_name)) {
        warn!("purge space {realm_name:?}/{space_name:?}: remove metadata: {e}");
        last_err = Some(e.into());
    }

    match last_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// `PurgeStack`: force-clean every Cell directory under the stack via
/// [`purge_cell`], then force-delete the stack cgroup.
pub async fn purge_stack(engine: &Engine, realm_name: &str, space_name: &str, stack_name: &str) -> Result<(), ReconcileError> {
    let mut last_err = None;
    let stack_dir = engine.store.paths().stack_dir(realm_name, space_name, stack_name);
    if let Ok(children) = engine.store.list_children(&stack_dir) {
        for cell_name in children {
            if let Err(e) = purge_cell(engine, realm_name, space_name, stack_name, &cell_name).await {
                warn!("purge stack {realm_name:?}/{space_name:?}/{stack_name:?}: cell {cell_name:?}: {e}");
                last_err = Some(e);
            }
        }
    }

    let mut spec = cgroup::default_stack_spec(realm_name, space_name, stack_name);
    if let Ok(true) = engine.cgroup.resolve(&mut spec) {
        let handle = engine.cgroup.load(&spec);
        if let Err(e) = engine.cgroup.delete(&handle, &spec.group) {
            warn!("purge stack {realm_name:?}/{space_name:?}/{stack_name:?}: delete cgroup: {e}");
            last_err = Some(e.into());
        }
    }

    if let Err(e) = engine.store.remove_subtree(&stack_dir) {
        last_err = Some(e.into());
    }

    match last_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// `PurgeCell`: the terminal case every other purge level bottoms out at —
/// force-kill whatever containers exist, remove metadata, force-delete the
/// cgroup.
pub async fn purge_cell(engine: &Engine, realm_name: &str, space_name: &str, stack_name: &str, name: &str) -> Result<(), ReconcileError> {
    let mut last_err = None;

    if let Ok(mut internal) = cell::get_cell(engine, realm_name, space_name, stack_name, name).await {
        if let Err(e) = lifecycle::kill_cell(engine, &mut internal).await {
            warn!("purge cell {realm_name:?}/{space_name:?}/{stack_name:?}/{name:?}: kill: {e}");
            last_err = Some(e);
        }
    }

    let mut spec = cgroup::default_cell_spec(realm_name, space_name, stack_name, name);
    if let Ok(true) = engine.cgroup.resolve(&mut spec) {
        let handle = engine.cgroup.load(&spec);
        if let Err(e) = engine.cgroup.delete(&handle, &spec.group) {
            warn!("purge cell {realm_name:?}/{space_name:?}/{stack_name:?}/{name:?}: delete cgroup: {e}");
            last_err = Some(e.into());
        }
    }

    if let Err(e) = engine
        .store
        .remove_subtree(&engine.store.paths().cell_dir(realm_name, space_name, stack_name, name))
    {
        last_err = Some(e.into());
    }

    match last_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

async fn purge_container(engine: &Engine, namespace: &str, id: &str) {
    let pid = engine.runtime.task_pid(namespace, id).await.ok();
    let _ = engine.runtime.kill_task(namespace, id, true).await;
    let _ = engine.runtime.delete_container(namespace, id, true).await;

    if let Some(pid) = pid {
        if let Some((realm_name, space_name)) = split_realm_space(id) {
            let conflist_path = engine.store.paths().network_conflist_path(realm_name, space_name);
            if let Ok(list) = engine.cni.load(&conflist_path) {
                let netns_path = common::SharedNamespaces::for_root_pid(pid).net.path.display().to_string();
                engine.cni.del(&list, id, &netns_path).await;
            }
        }
    }
}

/// Scrub leftover CNI state (cache entries, conflist files) whose owning
/// network name is prefixed with `realm_name`. Used by [`purge_realm`] since
/// a realm can own several Spaces' worth of network directories.
async fn scrub_cni_prefix(engine: &Engine, realm_name: &str) {
    if let Ok(entries) = engine.store.list_children(engine.cni.cache_dir()) {
        for entry in entries.into_iter().filter(|e| e.starts_with(&format!("{realm_name}-")) || e == realm_name) {
            let _ = engine.store.remove_subtree(&engine.cni.cache_dir().join(entry));
        }
    }
    if let Ok(entries) = engine.store.list_children(engine.store.paths().realm_dir(realm_name).as_path()) {
        for space_name in entries {
            let _ = std::fs::remove_file(engine.store.paths().network_conflist_path(realm_name, &space_name));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    #[tokio::test]
    async fn purge_realm_with_no_metadata_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        purge_realm(&engine, "rA").await.unwrap();
    }

    #[tokio::test]
    async fn purge_realm_removes_metadata_and_namespace() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        realm::create_realm(&engine, "rA", "ns-a").await.unwrap();
        space::create_space(&engine, "rA", "sA").await.unwrap();

        purge_realm(&engine, "rA").await.unwrap();
        assert!(!engine.store.paths().realm_dir("rA").exists());
        assert!(!engine.runtime.exists_namespace("ns-a").await.unwrap());
    }

    #[tokio::test]
    async fn purge_cell_kills_orphan_container_and_removes_metadata() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        realm::create_realm(&engine, "rA", "ns-a").await.unwrap();
        space::create_space(&engine, "rA", "sA").await.unwrap();
        stack::create_stack(&engine, "rA", "sA", "stA").await.unwrap();
        let mut created = cell::create_cell(&engine, "rA", "sA", "stA", "cA", "01J", vec![]).await.unwrap();
        lifecycle::start_cell(&engine, &mut created).await.unwrap();

        purge_cell(&engine, "rA", "sA", "stA", "cA").await.unwrap();
        assert!(!engine.store.paths().cell_dir("rA", "sA", "stA", "cA").exists());
    }

    #[tokio::test]
    async fn purge_stack_purges_every_cell() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        realm::create_realm(&engine, "rA", "ns-a").await.unwrap();
        space::create_space(&engine, "rA", "sA").await.unwrap();
        stack::create_stack(&engine, "rA", "sA", "stA").await.unwrap();
        cell::create_cell(&engine, "rA", "sA", "stA", "cA", "01J", vec![]).await.unwrap();
        cell::create_cell(&engine, "rA", "sA", "stA", "cB", "01K", vec![]).await.unwrap();

        purge_stack(&engine, "rA", "sA", "stA").await.unwrap();
        assert!(!engine.store.paths().stack_dir("rA", "sA", "stA").exists());
    }
}
