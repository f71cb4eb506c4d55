use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CgroupError {
    #[error("host cgroup hierarchy is not mounted in unified (v2) mode")]
    NotUnifiedMode,

    #[error("failed to read /proc/self/cgroup: {0}")]
    CurrentCgroupRead(#[source] io::Error),

    #[error("/proc/self/cgroup has no unified (0::) entry")]
    CurrentCgroupMissing,

    #[error("failed to build cgroup {group:?}: {source}")]
    Build {
        group: String,
        source: cgroups_rs::error::Error,
    },

    #[error("failed to delete cgroup {group:?}: {source}")]
    Delete {
        group: String,
        source: cgroups_rs::error::Error,
    },
}
