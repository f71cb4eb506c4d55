//! Configuration related structures

use clap::Parser;
use derive_builder::Builder;
use getset::{CopyGetters, Getters};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Builder, Parser, CopyGetters, Getters, Deserialize, Serialize)]
#[builder(default, pattern = "owned", setter(into))]
#[serde(rename_all = "kebab-case")]
/// kukeon - a user-space container orchestrator reconciling Realm/Space/Stack/Cell objects
pub struct Config {
    #[get_copy = "pub"]
    #[clap(
        default_value("info"),
        env("KUKEON_LOG_LEVEL"),
        long("log-level"),
        possible_values(&["trace", "debug", "info", "warn", "error", "off"]),
        short('l'),
        value_name("LEVEL")
    )]
    /// The logging level of the application
    log_level: LevelFilter,

    #[get = "pub"]
    #[clap(
        default_value("/run/kukeon"),
        env("KUKEON_RUN_PATH"),
        long("run-path")
    )]
    /// The run-root directory metadata, cgroup backfill state and CNI
    /// config files are kept under
    run_path: PathBuf,

    #[get = "pub"]
    #[clap(
        default_value("/run/containerd/containerd.sock"),
        env("KUKEON_CONTAINERD_SOCKET"),
        long("containerd-socket")
    )]
    /// Unix socket of the containerd instance backing the Runtime Client Facade
    containerd_socket: PathBuf,

    #[get = "pub"]
    #[clap(
        default_value("/opt/cni/bin"),
        env("KUKEON_CNI_BIN_DIR"),
        long("cni-bin-dir")
    )]
    /// Directory CNI plugin binaries are resolved from
    cni_bin_dir: PathBuf,

    #[get = "pub"]
    #[clap(
        default_value("/etc/cni/net.d"),
        env("KUKEON_CNI_CONFIG_DIR"),
        long("cni-config-dir")
    )]
    /// Directory per-Space CNI conflist files are written to
    cni_config_dir: PathBuf,

    #[get = "pub"]
    #[clap(
        default_value("/var/lib/cni/cache"),
        env("KUKEON_CNI_CACHE_DIR"),
        long("cni-cache-dir")
    )]
    /// Directory the CNI plugin chain persists its own ADD/DEL state in
    cni_cache_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn default_config() {
        let c = Config::default();
        assert_eq!(c.log_level(), LevelFilter::Info);
        assert_eq!(c.run_path(), &PathBuf::from("/run/kukeon"));
    }

    #[test]
    fn build_config() -> Result<()> {
        let c = ConfigBuilder::default()
            .log_level(LevelFilter::Warn)
            .run_path("/tmp/kukeon")
            .build()?;

        assert_eq!(c.log_level(), LevelFilter::Warn);
        assert_eq!(&c.run_path().display().to_string(), "/tmp/kukeon");

        Ok(())
    }
}
