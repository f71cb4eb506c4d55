use crate::error::CgroupError;
use crate::path::build_cgroup_path;
use crate::spec::CgroupSpec;
use cgroups_rs::cgroup_builder::CgroupBuilder;
use cgroups_rs::{hierarchies, Cgroup};
use log::warn;

/// Thin wrapper over `cgroups-rs` scoped to the create/load/delete/exists
/// operations the reconciler needs. Handles are transient: callers build one
/// per call and drop it when done (see C4's ownership note).
#[derive(Default)]
pub struct CgroupManager;

impl CgroupManager {
    pub fn new() -> Self {
        Self
    }

    /// Resolve `spec` to its absolute path and report whether it already
    /// exists on disk, without constructing a handle.
    pub fn resolve(&self, spec: &mut CgroupSpec) -> Result<bool, CgroupError> {
        let full_path = build_cgroup_path(spec)?;
        Ok(full_path.exists())
    }

    pub fn load(&self, spec: &CgroupSpec) -> Cgroup {
        Cgroup::load(hierarchies::auto(), spec.group.as_str())
    }

    pub fn create(&self, spec: &CgroupSpec) -> Result<Cgroup, CgroupError> {
        CgroupBuilder::new(&spec.group)
            .build(hierarchies::auto())
            .map_err(|source| CgroupError::Build {
                group: spec.group.clone(),
                source,
            })
    }

    pub fn delete(&self, cgroup: &Cgroup, group: &str) -> Result<(), CgroupError> {
        cgroup.delete().map_err(|source| CgroupError::Delete {
            group: group.to_string(),
            source,
        })
    }
}

/// Outcome of [`ensure`]: the final absolute group path, and whether the
/// caller must persist a metadata backfill because the recorded path was
/// empty.
pub struct EnsureOutcome {
    pub group: String,
    pub needs_metadata_update: bool,
}

/// Common create-or-load-then-persist routine shared by every reconciler
/// level: resolve `spec`, load if the path already exists on disk
/// (backfilling when `recorded_path` is empty), otherwise create it.
/// `cgroupPath` is append-only once populated: a non-empty `recorded_path`
/// is never treated as stale here, even if it differs from the freshly
/// resolved `spec.group`.
pub fn ensure(manager: &CgroupManager, mut spec: CgroupSpec, recorded_path: &str) -> Result<EnsureOutcome, CgroupError> {
    let exists = manager.resolve(&mut spec)?;
    if exists {
        let _ = manager.load(&spec);
        return Ok(EnsureOutcome {
            needs_metadata_update: recorded_path.is_empty(),
            group: spec.group,
        });
    }

    let _cgroup = manager.create(&spec)?;
    if !spec.full_fs_path().exists() {
        warn!(
            "cgroup {:?} reported created but not found on disk after stat",
            spec.group
        );
    }
    Ok(EnsureOutcome {
        needs_metadata_update: true,
        group: spec.group,
    })
}
