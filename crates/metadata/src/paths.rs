//! Directory layout under the configurable run-root `R`:
//!
//! ```text
//! R/<realm>/metadata.json
//! R/<realm>/<space>/metadata.json
//! R/<realm>/<space>/<stack>/metadata.json
//! R/<realm>/<space>/<stack>/<cell>/metadata.json
//! R/<realm>/<space>/network.conflist
//! ```

use std::path::{Path, PathBuf};

const METADATA_FILE: &str = "metadata.json";
const NETWORK_CONFLIST_FILE: &str = "network.conflist";

#[derive(Clone, Debug)]
pub struct Paths {
    run_root: PathBuf,
}

impl Paths {
    pub fn new(run_root: impl Into<PathBuf>) -> Self {
        Self {
            run_root: run_root.into(),
        }
    }

    pub fn run_root(&self) -> &Path {
        &self.run_root
    }

    pub fn realm_dir(&self, realm: &str) -> PathBuf {
        self.run_root.join(realm)
    }

    pub fn space_dir(&self, realm: &str, space: &str) -> PathBuf {
        self.realm_dir(realm).join(space)
    }

    pub fn stack_dir(&self, realm: &str, space: &str, stack: &str) -> PathBuf {
        self.space_dir(realm, space).join(stack)
    }

    pub fn cell_dir(&self, realm: &str, space: &str, stack: &str, cell: &str) -> PathBuf {
        self.stack_dir(realm, space, stack).join(cell)
    }

    pub fn realm_metadata_path(&self, realm: &str) -> PathBuf {
        self.realm_dir(realm).join(METADATA_FILE)
    }

    pub fn space_metadata_path(&self, realm: &str, space: &str) -> PathBuf {
        self.space_dir(realm, space).join(METADATA_FILE)
    }

    pub fn stack_metadata_path(&self, realm: &str, space: &str, stack: &str) -> PathBuf {
        self.stack_dir(realm, space, stack).join(METADATA_FILE)
    }

    pub fn cell_metadata_path(&self, realm: &str, space: &str, stack: &str, cell: &str) -> PathBuf {
        self.cell_dir(realm, space, stack, cell).join(METADATA_FILE)
    }

    pub fn network_conflist_path(&self, realm: &str, space: &str) -> PathBuf {
        self.space_dir(realm, space).join(NETWORK_CONFLIST_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_nested_paths() {
        let p = Paths::new("/run/kukeon");
        assert_eq!(
            p.cell_metadata_path("rA", "sA", "tA", "cA"),
            PathBuf::from("/run/kukeon/rA/sA/tA/cA/metadata.json")
        );
        assert_eq!(
            p.network_conflist_path("rA", "sA"),
            PathBuf::from("/run/kukeon/rA/sA/network.conflist")
        );
    }
}
