//! Space reconciliation: owns one CNI network (one conflist file) and a
//! cgroup nested under its parent Realm's.

use crate::error::ReconcileError;
use crate::realm;
use crate::Engine;
use log::info;
use metadata::{
    convert,
    external::{SpaceDocument, SpaceSpecExternal},
    internal::SpaceInternal,
    schema::State,
    StoreError,
};
use naming::{network_name, validate_name, Level};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

pub async fn get_space(engine: &Engine, realm_name: &str, name: &str) -> Result<SpaceInternal, ReconcileError> {
    let doc = engine.store.read_space(realm_name, name).map_err(|e| match e {
        StoreError::MissingMetadataFile(_) => ReconcileError::SpaceNotFound(name.to_string()),
        other => other.into(),
    })?;
    Ok(convert::space_to_internal(&doc)?)
}

pub async fn create_space(engine: &Engine, realm_name: &str, name: &str) -> Result<SpaceInternal, ReconcileError> {
    if realm_name.is_empty() {
        return Err(ReconcileError::RealmNameRequired);
    }
    if name.is_empty() {
        return Err(ReconcileError::SpaceNameRequired);
    }
    validate_name(Level::Realm, realm_name)?;
    validate_name(Level::Space, name)?;
    realm::get_realm(engine, realm_name).await?;

    match get_space(engine, realm_name, name).await {
        Ok(existing) => ensure_space(engine, existing).await,
        Err(ReconcileError::SpaceNotFound(_)) => provision_space(engine, realm_name, name).await,
        Err(e) => Err(e),
    }
}

async fn provision_space(engine: &Engine, realm_name: &str, name: &str) -> Result<SpaceInternal, ReconcileError> {
    let mut doc = SpaceDocument::new(
        name,
        SpaceSpecExternal { realm_id: realm_name.to_string(), cni_config_path: String::new() },
    );
    engine
        .store
        .write_space(realm_name, &mut doc)
        .map_err(|e| ReconcileError::UpdateSpaceMetadata(name.to_string(), e))?;
    let mut internal = convert::space_to_internal(&doc)?;

    match provision_space_resources(engine, &mut internal).await {
        Ok(()) => internal.status.state = State::Ready,
        Err(e) => {
            internal.status.state = State::Failed;
            let mut failed_doc = convert::space_to_external(&internal, engine.store.paths());
            let _ = engine.store.write_space(realm_name, &mut failed_doc);
            return Err(e);
        }
    }

    let mut doc = convert::space_to_external(&internal, engine.store.paths());
    engine
        .store
        .write_space(realm_name, &mut doc)
        .map_err(|e| ReconcileError::UpdateSpaceMetadata(name.to_string(), e))?;
    info!(
        "space {:?}/{:?} ready (cgroup={:?})",
        realm_name, name, internal.status.cgroup_path
    );
    Ok(internal)
}

async fn provision_space_resources(engine: &Engine, internal: &mut SpaceInternal) -> Result<(), ReconcileError> {
    let realm_name = internal.spec.realm_name.clone();
    let name = internal.meta.name.clone();

    let path = engine.store.paths().network_conflist_path(&realm_name, &name);
    if engine.cni.config_exists(&path) {
        return Err(ReconcileError::NetworkAlreadyExists(network_name(&realm_name, &name)));
    }
    let net_name = network_name(&realm_name, &name);
    engine.cni.write_default_if_missing(&path, &net_name, &derive_subnet(&net_name))?;

    let spec = cgroup::default_space_spec(&realm_name, &name);
    let outcome = cgroup::ensure(&engine.cgroup, spec, &internal.status.cgroup_path)
        .map_err(|source| ReconcileError::CreateSpaceCgroup { realm: realm_name, space: name, source })?;
    internal.status.cgroup_path = outcome.group;
    Ok(())
}

pub async fn ensure_space(engine: &Engine, mut internal: SpaceInternal) -> Result<SpaceInternal, ReconcileError> {
    let realm_name = internal.spec.realm_name.clone();
    let name = internal.meta.name.clone();

    let path = engine.store.paths().network_conflist_path(&realm_name, &name);
    if !engine.cni.config_exists(&path) {
        let net_name = network_name(&realm_name, &name);
        engine.cni.write_default_if_missing(&path, &net_name, &derive_subnet(&net_name))?;
    }

    let spec = cgroup::default_space_spec(&realm_name, &name);
    let outcome = cgroup::ensure(&engine.cgroup, spec, &internal.status.cgroup_path)
        .map_err(|source| ReconcileError::CreateSpaceCgroup { realm: realm_name.clone(), space: name.clone(), source })?;
    if outcome.needs_metadata_update {
        internal.status.cgroup_path = outcome.group;
    }

    internal.status.state = State::Ready;
    let mut doc = convert::space_to_external(&internal, engine.store.paths());
    engine
        .store
        .write_space(&realm_name, &mut doc)
        .map_err(|e| ReconcileError::UpdateSpaceMetadata(name, e))?;
    Ok(internal)
}

pub async fn refresh_space(engine: &Engine, realm_name: &str, name: &str) -> Result<SpaceInternal, ReconcileError> {
    let mut internal = get_space(engine, realm_name, name).await?;
    let path = engine.store.paths().network_conflist_path(realm_name, name);
    let cni_exists = engine.cni.config_exists(&path);
    let mut spec = cgroup::default_space_spec(realm_name, name);
    let cgroup_exists = engine.cgroup.resolve(&mut spec).unwrap_or(false);
    internal.status.state = if cni_exists && cgroup_exists { State::Ready } else { State::Unknown };

    let mut doc = convert::space_to_external(&internal, engine.store.paths());
    engine
        .store
        .write_space(realm_name, &mut doc)
        .map_err(|e| ReconcileError::UpdateSpaceMetadata(name.to_string(), e))?;
    Ok(internal)
}

pub async fn delete_space(engine: &Engine, realm_name: &str, name: &str) -> Result<(), ReconcileError> {
    get_space(engine, realm_name, name).await?;

    let mut spec = cgroup::default_space_spec(realm_name, name);
    if engine.cgroup.resolve(&mut spec)? {
        let handle = engine.cgroup.load(&spec);
        engine.cgroup.delete(&handle, &spec.group)?;
    }

    let _ = std::fs::remove_file(engine.store.paths().network_conflist_path(realm_name, name));
    engine.store.remove_subtree(&engine.store.paths().space_dir(realm_name, name))?;
    Ok(())
}

/// The spec carries no explicit per-Space subnet field, so the CNI host-local
/// IPAM subnet is derived deterministically from the network name: stable
/// across restarts, collision-free in practice across a realm's spaces, and
/// needing no extra state to track.
fn derive_subnet(net_name: &str) -> String {
    let mut hasher = DefaultHasher::new();
    net_name.hash(&mut hasher);
    let h = hasher.finish();
    let second = ((h >> 8) % 256) as u8;
    let third = (h % 256) as u8;
    format!("10.{}.{}.0/24", second, third)
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

    #[test]
    fn derive_subnet_is_deterministic_and_scoped_to_private_range() {
        let a = derive_subnet("rA-sA");
        let b = derive_subnet("rA-sA");
        assert_eq!(a, b);
        assert!(a.starts_with("10."));
        assert!(a.ends_with(".0/24"));
        assert_ne!(derive_subnet("rA-sA"), derive_subnet("rA-sB"));
    }

    #[tokio::test]
    async fn create_space_requires_existing_realm() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        assert!(matches!(
            create_space(&engine, "rA", "sA").await,
            Err(ReconcileError::RealmNotFound(_))
        ));
    }

    #[tokio::test]
    async fn create_space_writes_conflist_and_cgroup() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        realm::create_realm(&engine, "rA", "ns-a").await.unwrap();

        let space = create_space(&engine, "rA", "sA").await.unwrap();
        assert_eq!(space.status.state, State::Ready);
        assert!(engine
            .store
            .paths()
            .network_conflist_path("rA", "sA")
            .exists());
        assert!(space.status.cgroup_path.ends_with("/rA/sA"));
    }

    #[tokio::test]
    async fn create_space_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        realm::create_realm(&engine, "rA", "ns-a").await.unwrap();
        create_space(&engine, "rA", "sA").await.unwrap();
        let second = create_space(&engine, "rA", "sA").await.unwrap();
        assert_eq!(second.status.state, State::Ready);
    }

    #[tokio::test]
    async fn delete_space_removes_conflist_and_metadata() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        realm::create_realm(&engine, "rA", "ns-a").await.unwrap();
        create_space(&engine, "rA", "sA").await.unwrap();

        delete_space(&engine, "rA", "sA").await.unwrap();
        assert!(!engine
            .store
            .paths()
            .network_conflist_path("rA", "sA")
            .exists());
        assert!(matches!(
            get_space(&engine, "rA", "sA").await,
            Err(ReconcileError::SpaceNotFound(_))
        ));
    }
}
