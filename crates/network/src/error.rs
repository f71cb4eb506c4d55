use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CniError {
    #[error("cni_bin_dir must not be empty")]
    BinDirRequired,

    #[error("read config list {0}: {1}")]
    ReadConfig(PathBuf, #[source] anyhow::Error),

    #[error("write config list {0}: {1}")]
    WriteConfig(PathBuf, #[source] anyhow::Error),

    #[error("no plugins in config list {0}")]
    EmptyConfigList(PathBuf),

    #[error("network already attached")]
    AlreadyAttached,

    #[error("plugin {plugin} exec failed: {source}")]
    Plugin {
        plugin: String,
        #[source]
        source: anyhow::Error,
    },
}
