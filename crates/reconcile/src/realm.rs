//! Realm reconciliation: the outermost level, owning a container-runtime
//! namespace and a root cgroup. No network or container concerns live here.

use crate::error::ReconcileError;
use crate::Engine;
use log::info;
use metadata::{
    convert,
    external::{RealmDocument, RealmSpecExternal},
    internal::RealmInternal,
    schema::State,
    StoreError,
};
use naming::{validate_name, Level};

pub async fn get_realm(engine: &Engine, name: &str) -> Result<RealmInternal, ReconcileError> {
    let doc = engine.store.read_realm(name).map_err(|e| match e {
        StoreError::MissingMetadataFile(_) => ReconcileError::RealmNotFound(name.to_string()),
        other => other.into(),
    })?;
    Ok(convert::realm_to_internal(&doc)?)
}

/// `CreateRealm`: get-or-provision. An existing Realm is reconciled in place
/// rather than rejected, matching the Ensure semantics the rest of the
/// hierarchy shares.
pub async fn create_realm(engine: &Engine, name: &str, namespace: &str) -> Result<RealmInternal, ReconcileError> {
    if name.is_empty() {
        return Err(ReconcileError::RealmNameRequired);
    }
    validate_name(Level::Realm, name)?;

    match get_realm(engine, name).await {
        Ok(existing) => ensure_realm(engine, existing).await,
        Err(ReconcileError::RealmNotFound(_)) => provision_realm(engine, name, namespace).await,
        Err(e) => Err(e),
    }
}

async fn provision_realm(engine: &Engine, name: &str, namespace: &str) -> Result<RealmInternal, ReconcileError> {
    let mut doc = RealmDocument::new(
        name,
        RealmSpecExternal { namespace: namespace.to_string() },
    );
    engine
        .store
        .write_realm(&mut doc)
        .map_err(|e| ReconcileError::UpdateRealmMetadata(name.to_string(), e))?;
    let mut internal = convert::realm_to_internal(&doc)?;

    match provision_realm_resources(engine, &mut internal).await {
        Ok(()) => internal.status.state = State::Ready,
        Err(e) => {
            internal.status.state = State::Failed;
            let mut failed_doc = convert::realm_to_external(&internal);
            let _ = engine.store.write_realm(&mut failed_doc);
            return Err(e);
        }
    }

    let mut doc = convert::realm_to_external(&internal);
    engine
        .store
        .write_realm(&mut doc)
        .map_err(|e| ReconcileError::UpdateRealmMetadata(name.to_string(), e))?;
    info!(
        "realm {:?} ready (namespace={:?}, cgroup={:?})",
        name, internal.spec.namespace, internal.status.cgroup_path
    );
    Ok(internal)
}

async fn provision_realm_resources(engine: &Engine, internal: &mut RealmInternal) -> Result<(), ReconcileError> {
    let runtime_ns = internal.runtime_namespace().to_string();
    if engine.runtime.exists_namespace(&runtime_ns).await? {
        return Err(ReconcileError::NamespaceAlreadyExists(runtime_ns));
    }
    engine.runtime.create_namespace(&runtime_ns).await?;

    let spec = cgroup::default_realm_spec(&internal.meta.name);
    let outcome = cgroup::ensure(&engine.cgroup, spec, &internal.status.cgroup_path)
        .map_err(|source| ReconcileError::CreateRealmCgroup { realm: internal.meta.name.clone(), source })?;
    internal.status.cgroup_path = outcome.group;
    Ok(())
}

/// `EnsureRealm`: recreate any owned resource found missing, backfill
/// `status.cgroupPath` if it was never recorded, and mark `Ready`.
pub async fn ensure_realm(engine: &Engine, mut internal: RealmInternal) -> Result<RealmInternal, ReconcileError> {
    let runtime_ns = internal.runtime_namespace().to_string();
    if !engine.runtime.exists_namespace(&runtime_ns).await? {
        engine.runtime.create_namespace(&runtime_ns).await?;
    }

    let spec = cgroup::default_realm_spec(&internal.meta.name);
    let outcome = cgroup::ensure(&engine.cgroup, spec, &internal.status.cgroup_path)
        .map_err(|source| ReconcileError::CreateRealmCgroup { realm: internal.meta.name.clone(), source })?;
    if outcome.needs_metadata_update {
        internal.status.cgroup_path = outcome.group;
    }

    internal.status.state = State::Ready;
    let mut doc = convert::realm_to_external(&internal);
    engine
        .store
        .write_realm(&mut doc)
        .map_err(|e| ReconcileError::UpdateRealmMetadata(internal.meta.name.clone(), e))?;
    Ok(internal)
}

/// `RefreshRealm`: derive `status.state` purely from probing, never creating.
pub async fn refresh_realm(engine: &Engine, name: &str) -> Result<RealmInternal, ReconcileError> {
    let mut internal = get_realm(engine, name).await?;
    let mut spec = cgroup::default_realm_spec(name);
    let cgroup_exists = engine.cgroup.resolve(&mut spec).unwrap_or(false);
    let ns_exists = engine.runtime.exists_namespace(internal.runtime_namespace()).await.unwrap_or(false);
    internal.status.state = if cgroup_exists && ns_exists { State::Ready } else { State::Unknown };

    let mut doc = convert::realm_to_external(&internal);
    engine
        .store
        .write_realm(&mut doc)
        .map_err(|e| ReconcileError::UpdateRealmMetadata(name.to_string(), e))?;
    Ok(internal)
}

/// `DeleteRealm`: delete the runtime namespace and cgroup, then the metadata
/// subtree. Callers are responsible for having purged children first; this
/// does not cascade.
pub async fn delete_realm(engine: &Engine, name: &str) -> Result<(), ReconcileError> {
    let internal = get_realm(engine, name).await?;
    engine.runtime.delete_namespace(internal.runtime_namespace()).await?;

    let mut spec = cgroup::default_realm_spec(name);
    if engine.cgroup.resolve(&mut spec)? {
        let handle = engine.cgroup.load(&spec);
        engine.cgroup.delete(&handle, &spec.group)?;
    }

    engine.store.remove_subtree(&engine.store.paths().realm_dir(name))?;
    Ok(())
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
    async fn get_missing_realm_is_not_found() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        assert!(matches!(
            get_realm(&engine, "rA").await,
            Err(ReconcileError::RealmNotFound(_))
        ));
    }

    #[tokio::test]
    async fn create_realm_rejects_empty_name() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        assert!(matches!(
            create_realm(&engine, "", "ns-a").await,
            Err(ReconcileError::RealmNameRequired)
        ));
    }

    #[tokio::test]
    async fn create_realm_rejects_dash_in_name() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        assert!(matches!(
            create_realm(&engine, "my-realm", "ns-a").await,
            Err(ReconcileError::InvalidName(_))
        ));
    }

    #[tokio::test]
    async fn create_realm_provisions_namespace_and_cgroup() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let realm = create_realm(&engine, "rA", "ns-a").await.unwrap();
        assert_eq!(realm.status.state, State::Ready);
        assert!(engine.runtime.exists_namespace("ns-a").await.unwrap());
        assert!(realm.status.cgroup_path.ends_with("/rA"));

        let reread = get_realm(&engine, "rA").await.unwrap();
        assert_eq!(reread.status.state, State::Ready);
    }

    #[tokio::test]
    async fn create_realm_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        create_realm(&engine, "rA", "ns-a").await.unwrap();
        let second = create_realm(&engine, "rA", "ns-a").await.unwrap();
        assert_eq!(second.status.state, State::Ready);
    }

    #[tokio::test]
    async fn refresh_realm_reports_unknown_when_namespace_missing() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        create_realm(&engine, "rA", "ns-a").await.unwrap();
        engine.runtime.delete_namespace("ns-a").await.unwrap();

        let refreshed = refresh_realm(&engine, "rA").await.unwrap();
        assert_eq!(refreshed.status.state, State::Unknown);
    }

    #[tokio::test]
    async fn delete_realm_removes_namespace_and_metadata() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        create_realm(&engine, "rA", "ns-a").await.unwrap();

        delete_realm(&engine, "rA").await.unwrap();
        assert!(!engine.runtime.exists_namespace("ns-a").await.unwrap());
        assert!(matches!(
            get_realm(&engine, "rA").await,
            Err(ReconcileError::RealmNotFound(_))
        ));
    }
}
