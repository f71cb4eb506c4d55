//! Stack reconciliation: a cgroup nested under its parent Space's, with no
//! network or container concerns of its own.

use crate::error::ReconcileError;
use crate::space;
use crate::Engine;
use log::info;
use metadata::{
    convert,
    external::{StackDocument, StackSpecExternal},
    internal::StackInternal,
    schema::State,
    StoreError,
};
use naming::{validate_name, Level};

pub async fn get_stack(engine: &Engine, realm_name: &str, space_name: &str, name: &str) -> Result<StackInternal, ReconcileError> {
    let doc = engine.store.read_stack(realm_name, space_name, name).map_err(|e| match e {
        StoreError::MissingMetadataFile(_) => ReconcileError::StackNotFound(name.to_string()),
        other => other.into(),
    })?;
    Ok(convert::stack_to_internal(&doc)?)
}

pub async fn create_stack(engine: &Engine, realm_name: &str, space_name: &str, name: &str) -> Result<StackInternal, ReconcileError> {
    if realm_name.is_empty() {
        return Err(ReconcileError::RealmNameRequired);
    }
    if space_name.is_empty() {
        return Err(ReconcileError::SpaceNameRequired);
    }
    if name.is_empty() {
        return Err(ReconcileError::StackNameRequired);
    }
    validate_name(Level::Realm, realm_name)?;
    validate_name(Level::Space, space_name)?;
    validate_name(Level::Stack, name)?;
    space::get_space(engine, realm_name, space_name).await?;

    match get_stack(engine, realm_name, space_name, name).await {
        Ok(existing) => ensure_stack(engine, existing).await,
        Err(ReconcileError::StackNotFound(_)) => provision_stack(engine, realm_name, space_name, name).await,
        Err(e) => Err(e),
    }
}

async fn provision_stack(engine: &Engine, realm_name: &str, space_name: &str, name: &str) -> Result<StackInternal, ReconcileError> {
    let mut doc = StackDocument::new(
        name,
        StackSpecExternal { realm_id: realm_name.to_string(), space_id: space_name.to_string() },
    );
    engine
        .store
        .write_stack(realm_name, space_name, &mut doc)
        .map_err(|e| ReconcileError::UpdateStackMetadata(name.to_string(), e))?;
    let mut internal = convert::stack_to_internal(&doc)?;

    match provision_stack_cgroup(engine, &mut internal) {
        Ok(()) => internal.status.state = State::Ready,
        Err(e) => {
            internal.status.state = State::Failed;
            let mut failed_doc = convert::stack_to_external(&internal);
            let _ = engine.store.write_stack(realm_name, space_name, &mut failed_doc);
            return Err(e);
        }
    }

    let mut doc = convert::stack_to_external(&internal);
    engine
        .store
        .write_stack(realm_name, space_name, &mut doc)
        .map_err(|e| ReconcileError::UpdateStackMetadata(name.to_string(), e))?;
    info!(
        "stack {:?}/{:?}/{:?} ready (cgroup={:?})",
        realm_name, space_name, name, internal.status.cgroup_path
    );
    Ok(internal)
}

fn provision_stack_cgroup(engine: &Engine, internal: &mut StackInternal) -> Result<(), ReconcileError> {
    let spec = cgroup::default_stack_spec(&internal.spec.realm_name, &internal.spec.space_name, &internal.meta.name);
    let outcome = cgroup::ensure(&engine.cgroup, spec, &internal.status.cgroup_path).map_err(|source| {
        ReconcileError::CreateStackCgroup {
            realm: internal.spec.realm_name.clone(),
            space: internal.spec.space_name.clone(),
            stack: internal.meta.name.clone(),
            source,
        }
    })?;
    internal.status.cgroup_path = outcome.group;
    Ok(())
}

pub async fn ensure_stack(engine: &Engine, mut internal: StackInternal) -> Result<StackInternal, ReconcileError> {
    let spec = cgroup::default_stack_spec(&internal.spec.realm_name, &internal.spec.space_name, &internal.meta.name);
    let outcome = cgroup::ensure(&engine.cgroup, spec, &internal.status.cgroup_path).map_err(|source| {
        ReconcileError::CreateStackCgroup {
            realm: internal.spec.realm_name.clone(),
            space: internal.spec.space_name.clone(),
            stack: internal.meta.name.clone(),
            source,
        }
    })?;
    if outcome.needs_metadata_update {
        internal.status.cgroup_path = outcome.group;
    }

    internal.status.state = State::Ready;
    let realm_name = internal.spec.realm_name.clone();
    let space_name = internal.spec.space_name.clone();
    let name = internal.meta.name.clone();
    let mut doc = convert::stack_to_external(&internal);
    engine
        .store
        .write_stack(&realm_name, &space_name, &mut doc)
        .map_err(|e| ReconcileError::UpdateStackMetadata(name, e))?;
    Ok(internal)
}

pub async fn refresh_stack(engine: &Engine, realm_name: &str, space_name: &str, name: &str) -> Result<StackInternal, ReconcileError> {
    let mut internal = get_stack(engine, realm_name, space_name, name).await?;
    let mut spec = cgroup::default_stack_spec(realm_name, space_name, name);
    let cgroup_exists = engine.cgroup.resolve(&mut spec).unwrap_or(false);
    internal.status.state = if cgroup_exists { State::Ready } else { State::Unknown };

    let mut doc = convert::stack_to_external(&internal);
    engine
        .store
        .write_stack(realm_name, space_name, &mut doc)
        .map_err(|e| ReconcileError::UpdateStackMetadata(name.to_string(), e))?;
    Ok(internal)
}

pub async fn delete_stack(engine: &Engine, realm_name: &str, space_name: &str, name: &str) -> Result<(), ReconcileError> {
    get_stack(engine, realm_name, space_name, name).await?;

    let mut spec = cgroup::default_stack_spec(realm_name, space_name, name);
    if engine.cgroup.resolve(&mut spec)? {
        let handle = engine.cgroup.load(&spec);
        engine.cgroup.delete(&handle, &spec.group)?;
    }

    engine.store.remove_subtree(&engine.store.paths().stack_dir(realm_name, space_name, name))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realm;
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

    async fn with_space(engine: &Engine) {
        realm::create_realm(engine, "rA", "ns-a").await.unwrap();
        space::create_space(engine, "rA", "sA").await.unwrap();
    }

    #[tokio::test]
    async fn create_stack_requires_existing_space() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        assert!(matches!(
            create_stack(&engine, "rA", "sA", "stA").await,
            Err(ReconcileError::SpaceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn create_stack_provisions_cgroup() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        with_space(&engine).await;

        let stack = create_stack(&engine, "rA", "sA", "stA").await.unwrap();
        assert_eq!(stack.status.state, State::Ready);
        assert!(stack.status.cgroup_path.ends_with("/rA/sA/stA"));
    }

    #[tokio::test]
    async fn delete_stack_removes_metadata() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        with_space(&engine).await;
        create_stack(&engine, "rA", "sA", "stA").await.unwrap();

        delete_stack(&engine, "rA", "sA", "stA").await.unwrap();
        assert!(matches!(
            get_stack(&engine, "rA", "sA", "stA").await,
            Err(ReconcileError::StackNotFound(_))
        ));
    }
}
