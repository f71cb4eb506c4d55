//! Internal <-> external conversion. Every read converts external -> internal;
//! every write converts internal -> external. A Space's `cniConfigPath` is
//! re-derived on the external -> internal direction rather than trusted, and
//! recomputed fresh on the internal -> external direction, since it is a
//! pure function of `(realmName, spaceName)` and the run-root.

use crate::error::SchemaError;
use crate::external::{
    CellDocument, CellSpecExternal, CellStatusExternal, RealmDocument, RealmSpecExternal,
    RealmStatusExternal, SpaceDocument, SpaceSpecExternal, SpaceStatusExternal, StackDocument,
    StackSpecExternal, StackStatusExternal,
};
use crate::internal::{
    CellInternal, CellSpecInternal, CellStatusInternal, RealmInternal, RealmSpecInternal,
    RealmStatusInternal, SpaceInternal, SpaceSpecInternal, SpaceStatusInternal, StackInternal,
    StackSpecInternal, StackStatusInternal,
};
use crate::paths::Paths;
use crate::schema::CURRENT_API_VERSION;

fn check_version(doc_version: &str) -> Result<(), SchemaError> {
    if doc_version != CURRENT_API_VERSION {
        return Err(SchemaError::ConversionFailed(format!(
            "unsupported apiVersion {:?}",
            doc_version
        )));
    }
    Ok(())
}

pub fn realm_to_internal(doc: &RealmDocument) -> Result<RealmInternal, SchemaError> {
    check_version(&doc.api_version)?;
    Ok(RealmInternal {
        meta: doc.metadata.clone(),
        spec: RealmSpecInternal {
            namespace: doc.spec.namespace.clone(),
        },
        status: RealmStatusInternal {
            state: doc.status.state,
            cgroup_path: doc.status.cgroup_path.clone(),
        },
    })
}

pub fn realm_to_external(internal: &RealmInternal) -> RealmDocument {
    RealmDocument {
        api_version: CURRENT_API_VERSION.to_string(),
        kind: "Realm".to_string(),
        metadata: internal.meta.clone(),
        spec: RealmSpecExternal {
            namespace: internal.spec.namespace.clone(),
        },
        status: RealmStatusExternal {
            state: internal.status.state,
            cgroup_path: internal.status.cgroup_path.clone(),
        },
    }
}

pub fn space_to_internal(doc: &SpaceDocument) -> Result<SpaceInternal, SchemaError> {
    check_version(&doc.api_version)?;
    Ok(SpaceInternal {
        meta: doc.metadata.clone(),
        spec: SpaceSpecInternal {
            // At the current schema version RealmID is the realm's
            // metadata.name; see crate docs in external.rs.
            realm_name: doc.spec.realm_id.clone(),
        },
        status: SpaceStatusInternal {
            state: doc.status.state,
            cgroup_path: doc.status.cgroup_path.clone(),
        },
    })
}

pub fn space_to_external(internal: &SpaceInternal, paths: &Paths) -> SpaceDocument {
    let cni_config_path = paths
        .network_conflist_path(&internal.spec.realm_name, &internal.meta.name)
        .display()
        .to_string();
    SpaceDocument {
        api_version: CURRENT_API_VERSION.to_string(),
        kind: "Space".to_string(),
        metadata: internal.meta.clone(),
        spec: SpaceSpecExternal {
            realm_id: internal.spec.realm_name.clone(),
            cni_config_path,
        },
        status: SpaceStatusExternal {
            state: internal.status.state,
            cgroup_path: internal.status.cgroup_path.clone(),
        },
    }
}

pub fn stack_to_internal(doc: &StackDocument) -> Result<StackInternal, SchemaError> {
    check_version(&doc.api_version)?;
    Ok(StackInternal {
        meta: doc.metadata.clone(),
        spec: StackSpecInternal {
            realm_name: doc.spec.realm_id.clone(),
            space_name: doc.spec.space_id.clone(),
        },
        status: StackStatusInternal {
            state: doc.status.state,
            cgroup_path: doc.status.cgroup_path.clone(),
        },
    })
}

pub fn stack_to_external(internal: &StackInternal) -> StackDocument {
    StackDocument {
        api_version: CURRENT_API_VERSION.to_string(),
        kind: "Stack".to_string(),
        metadata: internal.meta.clone(),
        spec: StackSpecExternal {
            realm_id: internal.spec.realm_name.clone(),
            space_id: internal.spec.space_name.clone(),
        },
        status: StackStatusExternal {
            state: internal.status.state,
            cgroup_path: internal.status.cgroup_path.clone(),
        },
    }
}

pub fn cell_to_internal(doc: &CellDocument) -> Result<CellInternal, SchemaError> {
    check_version(&doc.api_version)?;
    Ok(CellInternal {
        meta: doc.metadata.clone(),
        spec: CellSpecInternal {
            id: doc.spec.id.clone(),
            realm_name: doc.spec.realm_id.clone(),
            space_name: doc.spec.space_id.clone(),
            stack_name: doc.spec.stack_id.clone(),
            root_container: doc.spec.root_container.clone(),
            containers: doc.spec.containers.clone(),
            root_container_id: doc.spec.root_container_id.clone(),
        },
        status: CellStatusInternal {
            state: doc.status.state,
            cgroup_path: doc.status.cgroup_path.clone(),
        },
    })
}

pub fn cell_to_external(internal: &CellInternal) -> CellDocument {
    CellDocument {
        api_version: CURRENT_API_VERSION.to_string(),
        kind: "Cell".to_string(),
        metadata: internal.meta.clone(),
        spec: CellSpecExternal {
            id: internal.spec.id.clone(),
            realm_id: internal.spec.realm_name.clone(),
            space_id: internal.spec.space_name.clone(),
            stack_id: internal.spec.stack_name.clone(),
            root_container: internal.spec.root_container.clone(),
            containers: internal.spec.containers.clone(),
            root_container_id: internal.spec.root_container_id.clone(),
        },
        status: CellStatusExternal {
            state: internal.status.state,
            cgroup_path: internal.status.cgroup_path.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ObjectMeta, State};

    #[test]
    fn realm_round_trips() {
        let internal = RealmInternal {
            meta: ObjectMeta::new("rA"),
            spec: RealmSpecInternal {
                namespace: "ns-a".into(),
            },
            status: RealmStatusInternal {
                state: State::Ready,
                cgroup_path: "/rA".into(),
            },
        };
        let doc = realm_to_external(&internal);
        let back = realm_to_internal(&doc).expect("convert back");
        assert_eq!(back.meta.name, internal.meta.name);
        assert_eq!(back.spec.namespace, internal.spec.namespace);
        assert_eq!(back.status.cgroup_path, internal.status.cgroup_path);
    }

    #[test]
    fn rejects_unknown_api_version() {
        let mut doc = realm_to_external(&RealmInternal {
            meta: ObjectMeta::new("rA"),
            spec: RealmSpecInternal::default(),
            status: RealmStatusInternal::default(),
        });
        doc.api_version = "v0".into();
        assert!(realm_to_internal(&doc).is_err());
    }

    #[test]
    fn space_cni_config_path_is_derived_not_trusted() {
        let internal = SpaceInternal {
            meta: ObjectMeta::new("sA"),
            spec: SpaceSpecInternal {
                realm_name: "rA".into(),
            },
            status: SpaceStatusInternal::default(),
        };
        let paths = Paths::new("/run/kukeon");
        let doc = space_to_external(&internal, &paths);
        assert_eq!(
            doc.spec.cni_config_path,
            "/run/kukeon/rA/sA/network.conflist"
        );
    }
}
