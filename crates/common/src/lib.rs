//! Shared vocabulary used by the network and runtime crates to describe
//! `/proc/<pid>/ns/*` namespace paths.

use std::{fmt, path::PathBuf};

#[derive(Clone, Debug, PartialEq, Eq)]
/// A single Linux namespace, identified by its kind and its `/proc` path.
pub struct Namespace {
    pub typ: NamespaceType,
    pub path: PathBuf,
}

impl Namespace {
    /// Build the namespace path `/proc/<pid>/ns/<kind>` for a running process.
    pub fn for_pid(typ: NamespaceType, pid: u32) -> Self {
        let path = PathBuf::from(format!("/proc/{}/ns/{}", pid, typ.proc_name()));
        Self { typ, path }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NamespaceType {
    Uts,
    Ipc,
    User,
    Net,
    Mount,
    Pid,
}

impl NamespaceType {
    /// The name of the namespace's symlink under `/proc/<pid>/ns/`.
    pub fn proc_name(&self) -> &'static str {
        match self {
            NamespaceType::Uts => "uts",
            NamespaceType::Ipc => "ipc",
            NamespaceType::User => "user",
            NamespaceType::Net => "net",
            NamespaceType::Mount => "mnt",
            NamespaceType::Pid => "pid",
        }
    }
}

impl fmt::Display for NamespaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.proc_name())
    }
}

/// The three namespaces a Cell's root container holds open for its workload
/// containers to join.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SharedNamespaces {
    pub net: Namespace,
    pub ipc: Namespace,
    pub uts: Namespace,
}

impl SharedNamespaces {
    /// Derive the three namespace paths from a root container's PID.
    pub fn for_root_pid(pid: u32) -> Self {
        Self {
            net: Namespace::for_pid(NamespaceType::Net, pid),
            ipc: Namespace::for_pid(NamespaceType::Ipc, pid),
            uts: Namespace::for_pid(NamespaceType::Uts, pid),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_for_pid_builds_proc_path() {
        let ns = Namespace::for_pid(NamespaceType::Net, 42);
        assert_eq!(ns.path, PathBuf::from("/proc/42/ns/net"));
    }

    #[test]
    fn shared_namespaces_for_root_pid() {
        let shared = SharedNamespaces::for_root_pid(7);
        assert_eq!(shared.net.path, PathBuf::from("/proc/7/ns/net"));
        assert_eq!(shared.ipc.path, PathBuf::from("/proc/7/ns/ipc"));
        assert_eq!(shared.uts.path, PathBuf::from("/proc/7/ns/uts"));
    }
}
