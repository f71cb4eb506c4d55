//! Per-Space CNI manager (C5): one conflist per Space, loaded into memory and
//! driven plugin-by-plugin for ADD/DEL against a container's netns path.

use crate::config::{default_conflist, ConfigListFile};
use crate::error::CniError;
use crate::plugin::{CNIResult, Plugin, PluginBuilder};
use log::{debug, warn};
use std::path::{Path, PathBuf};

pub struct CniManager {
    bin_dir: PathBuf,
    config_dir: PathBuf,
    cache_dir: PathBuf,
}

impl CniManager {
    /// Fails fast with [`CniError::BinDirRequired`] rather than deferring to
    /// a downstream plugin-lookup failure when `bin_dir` is blank.
    pub fn new(
        bin_dir: impl Into<PathBuf>,
        config_dir: impl Into<PathBuf>,
        cache_dir: impl Into<PathBuf>,
    ) -> Result<Self, CniError> {
        let bin_dir = bin_dir.into();
        if bin_dir.as_os_str().is_empty() {
            return Err(CniError::BinDirRequired);
        }
        Ok(Self {
            bin_dir,
            config_dir: config_dir.into(),
            cache_dir: cache_dir.into(),
        })
    }

    pub fn config_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    /// Write the default conflist to `path` if it is not already present.
    pub fn write_default_if_missing(
        &self,
        path: &Path,
        name: &str,
        subnet: &str,
    ) -> Result<(), CniError> {
        if self.config_exists(path) {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CniError::WriteConfig(path.to_path_buf(), e.into()))?;
        }
        let list = default_conflist(name, subnet);
        let content = serde_json::to_string_pretty(&list)
            .map_err(|e| CniError::WriteConfig(path.to_path_buf(), e.into()))?;
        std::fs::write(path, content)
            .map_err(|e| CniError::WriteConfig(path.to_path_buf(), e.into()))?;
        debug!("Wrote default CNI conflist to {}", path.display());
        Ok(())
    }

    pub fn load(&self, path: &Path) -> Result<ConfigListFile, CniError> {
        ConfigListFile::from_path(path).map_err(|e| CniError::ReadConfig(path.to_path_buf(), e))
    }

    fn plugins(&self, list: &ConfigListFile) -> Result<Vec<Plugin>, CniError> {
        if list.plugins().is_empty() {
            return Err(CniError::EmptyConfigList(self.config_dir.clone()));
        }
        list.plugins()
            .iter()
            .map(|config| {
                PluginBuilder::default()
                    .binary(config.typ().clone())
                    .build()
                    .expect("build plugin")
                    .find_binary(&self.bin_dir.display().to_string())
                    .map_err(|source| CniError::Plugin {
                        plugin: config.typ().clone(),
                        source,
                    })
            })
            .collect()
    }

    /// Run every plugin in the list's order against the container's netns.
    /// An `ErrAlreadyAttached` from any plugin is treated as success by the
    /// caller, not swallowed here.
    pub async fn add(
        &self,
        list: &ConfigListFile,
        container_id: &str,
        netns_path: &str,
    ) -> Result<Vec<CNIResult>, CniError> {
        let plugins = self.plugins(list)?;
        let mut results = Vec::with_capacity(plugins.len());
        for (plugin, config) in plugins.iter().zip(list.plugins()) {
            let raw = serde_json::to_vec(config)
                .map_err(|e| CniError::Plugin {
                    plugin: config.typ().clone(),
                    source: e.into(),
                })?;
            results.push(plugin.add(container_id, netns_path, &raw).await?);
        }
        Ok(results)
    }

    /// Best-effort detach: run DEL for every plugin in reverse order,
    /// logging but not stopping on a single plugin's failure.
    pub async fn del(&self, list: &ConfigListFile, container_id: &str, netns_path: &str) {
        let plugins = match self.plugins(list) {
            Ok(p) => p,
            Err(e) => {
                warn!("cni del: resolve plugin binaries: {}", e);
                return;
            }
        };
        for (plugin, config) in plugins.iter().zip(list.plugins()).rev() {
            let raw = match serde_json::to_vec(config) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!("cni del: serialize plugin config: {}", e);
                    continue;
                }
            };
            if let Err(e) = plugin.del(container_id, netns_path, &raw).await {
                warn!("cni del: plugin {} failed: {}", config.typ(), e);
            }
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }
}
