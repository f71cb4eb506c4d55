use std::path::PathBuf;

/// An abstract cgroup group path together with the mountpoint it was
/// resolved against. `group` starts out relative (`/realm/space/...`) and is
/// rewritten in place by [`crate::build_cgroup_path`] to the absolute path
/// under the caller's own cgroup.
#[derive(Clone, Debug, Default)]
pub struct CgroupSpec {
    pub group: String,
    pub mountpoint: PathBuf,
}

impl CgroupSpec {
    fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            mountpoint: PathBuf::new(),
        }
    }

    pub fn full_fs_path(&self) -> PathBuf {
        self.mountpoint.join(self.group.trim_start_matches('/'))
    }
}

pub fn default_realm_spec(realm: &str) -> CgroupSpec {
    CgroupSpec::new(format!("/{}", realm))
}

pub fn default_space_spec(realm: &str, space: &str) -> CgroupSpec {
    CgroupSpec::new(format!("/{}/{}", realm, space))
}

pub fn default_stack_spec(realm: &str, space: &str, stack: &str) -> CgroupSpec {
    CgroupSpec::new(format!("/{}/{}/{}", realm, space, stack))
}

pub fn default_cell_spec(realm: &str, space: &str, stack: &str, cell: &str) -> CgroupSpec {
    CgroupSpec::new(format!("/{}/{}/{}/{}", realm, space, stack, cell))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_specs_nest_by_level() {
        assert_eq!(default_realm_spec("rA").group, "/rA");
        assert_eq!(default_space_spec("rA", "sA").group, "/rA/sA");
        assert_eq!(default_stack_spec("rA", "sA", "stA").group, "/rA/sA/stA");
        assert_eq!(
            default_cell_spec("rA", "sA", "stA", "cA").group,
            "/rA/sA/stA/cA"
        );
    }

    #[test]
    fn full_fs_path_joins_mountpoint_and_group() {
        let spec = CgroupSpec {
            group: "/rA/sA".into(),
            mountpoint: PathBuf::from("/sys/fs/cgroup"),
        };
        assert_eq!(spec.full_fs_path(), PathBuf::from("/sys/fs/cgroup/rA/sA"));
    }
}
