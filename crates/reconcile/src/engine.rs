//! Wires the four resource crates together behind one handle the `realm`,
//! `space`, `stack`, `cell`, `lifecycle` and `purge` modules all operate on.

use cgroup::CgroupManager;
use metadata::Store;
use network::CniManager;
use runtime::RuntimeClient;
use std::sync::Arc;

pub struct Engine {
    pub store: Store,
    pub cgroup: CgroupManager,
    pub cni: CniManager,
    pub runtime: Arc<dyn RuntimeClient>,
}

impl Engine {
    pub fn new(store: Store, cgroup: CgroupManager, cni: CniManager, runtime: Arc<dyn RuntimeClient>) -> Self {
        Self { store, cgroup, cni, runtime }
    }
}
