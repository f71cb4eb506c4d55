use crate::config::Config;
use anyhow::{Context, Result};
use cgroup::CgroupManager;
use clap::crate_name;
use log::info;
use metadata::Store;
use network::CniManager;
use reconcile::Engine;
use runtime::{ContainerdRuntimeClient, RuntimeClient};
use std::{env, sync::Arc};

/// Owns the configuration and builds a ready-to-use reconciler [`Engine`].
/// There is no gRPC/CLI surface here: wiring a working `Engine` is as far as
/// the root package goes, the same way `containrs`'s `Server` wired its CRI
/// services from `Config` before serving them.
pub struct Server {
    config: Config,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: Config) -> Self {
        Server { config }
    }

    /// Initialize logging and build the [`Engine`] this configuration
    /// describes.
    pub fn build(self) -> Result<Engine> {
        self.set_logging_verbosity()
            .context("set logging verbosity")?;

        let run_path = self.config.run_path();
        info!(
            "wiring engine (run_path={}, containerd_socket={}, cni_bin_dir={})",
            run_path.display(),
            self.config.containerd_socket().display(),
            self.config.cni_bin_dir().display()
        );

        let store = Store::new(run_path);
        let cgroup = CgroupManager::new();
        let cni = CniManager::new(
            self.config.cni_bin_dir(),
            self.config.cni_config_dir(),
            self.config.cni_cache_dir(),
        )
        .context("construct CNI manager")?;
        let runtime: Arc<dyn RuntimeClient> =
            Arc::new(ContainerdRuntimeClient::new(self.config.containerd_socket()));

        Ok(Engine::new(store, cgroup, cni, runtime))
    }

    /// Initialize the logger and set the verbosity to the provided level.
    fn set_logging_verbosity(&self) -> Result<()> {
        env::set_var(
            "RUST_LOG",
            format!("{}={}", crate_name!(), self.config.log_level()),
        );
        env_logger::try_init().context("init env logger")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_wires_an_engine() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = crate::config::ConfigBuilder::default()
            .run_path(dir.path())
            .cni_bin_dir("/opt/cni/bin")
            .build()
            .unwrap();

        let server = Server::new(config);
        assert!(server.build().is_ok());
    }
}
