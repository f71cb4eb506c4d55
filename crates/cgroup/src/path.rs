//! Resolving an abstract [`crate::CgroupSpec`] into the absolute path the
//! host actually uses, anchored under whatever cgroup the calling process
//! already lives in.

use crate::error::CgroupError;
use crate::spec::CgroupSpec;
use cgroups_rs::hierarchies;
use std::fs;
use std::path::PathBuf;

const PROC_SELF_CGROUP: &str = "/proc/self/cgroup";

pub fn discover_mountpoint() -> Result<PathBuf, CgroupError> {
    if !hierarchies::is_cgroup2_unified_mode() {
        return Err(CgroupError::NotUnifiedMode);
    }
    Ok(PathBuf::from("/sys/fs/cgroup"))
}

pub fn current_cgroup_path() -> Result<String, CgroupError> {
    let contents =
        fs::read_to_string(PROC_SELF_CGROUP).map_err(CgroupError::CurrentCgroupRead)?;
    parse_current_cgroup_path(&contents)
}

fn parse_current_cgroup_path(contents: &str) -> Result<String, CgroupError> {
    contents
        .lines()
        .find_map(|line| line.strip_prefix("0::"))
        .map(str::to_string)
        .ok_or(CgroupError::CurrentCgroupMissing)
}

/// Mutates `spec.group` into the absolute path under the caller's current
/// cgroup and `spec.mountpoint` into the discovered mountpoint; returns the
/// full filesystem path for existence checks.
pub fn build_cgroup_path(spec: &mut CgroupSpec) -> Result<PathBuf, CgroupError> {
    let mountpoint = discover_mountpoint()?;
    let current = current_cgroup_path()?;
    let relative = spec.group.trim_start_matches('/');
    let joined = format!("{}/{}", current.trim_end_matches('/'), relative);
    let absolute = if joined.starts_with('/') {
        joined
    } else {
        format!("/{}", joined)
    };
    spec.group = absolute;
    spec.mountpoint = mountpoint;
    Ok(spec.full_fs_path())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_unified_line() {
        let contents = "0::/user.slice/user-1000.slice\n";
        assert_eq!(
            parse_current_cgroup_path(contents).unwrap(),
            "/user.slice/user-1000.slice"
        );
    }

    #[test]
    fn rejects_cgroup_without_unified_line() {
        let contents = "1:cpu,cpuacct:/\n";
        assert!(matches!(
            parse_current_cgroup_path(contents),
            Err(CgroupError::CurrentCgroupMissing)
        ));
    }
}
