//! Error taxonomy for the metadata store and schema bridge.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("metadata file {0} does not exist")]
    MissingMetadataFile(PathBuf),

    #[error("read metadata file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("write metadata file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("remove metadata subtree {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("list children of {path}: {source}")]
    ListChildren {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse metadata file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialize metadata document: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error(
        "unsupported apiVersion {found:?} in {path} (expected {expected:?})"
    )]
    ConversionFailed {
        path: PathBuf,
        found: Option<String>,
        expected: &'static str,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("conversion failed: {0}")]
    ConversionFailed(String),
}
