//! Cgroup v2 manager (C4): builds per-level cgroup specs anchored under the
//! calling process's own cgroup, and creates/loads/deletes them.

mod error;
mod manager;
mod path;
mod spec;

pub use error::CgroupError;
pub use manager::{ensure, CgroupManager, EnsureOutcome};
pub use path::{build_cgroup_path, current_cgroup_path, discover_mountpoint};
pub use spec::{
    default_cell_spec, default_realm_spec, default_space_spec, default_stack_spec, CgroupSpec,
};
