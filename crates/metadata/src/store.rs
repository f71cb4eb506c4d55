//! Durable on-disk representation of every object under the run-root.
//! Writes go through a temp-file-then-rename so a reader never observes a
//! partially written document; there is no cross-process locking, so
//! concurrent writers to the same document race (documented limitation).

use crate::error::StoreError;
use crate::external::{
    CellDocument, RealmDocument, SpaceDocument, StackDocument, VersionPrefix,
};
use crate::paths::Paths;
use crate::schema::CURRENT_API_VERSION;
use log::trace;
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(Clone, Debug)]
pub struct Store {
    paths: Paths,
}

impl Store {
    pub fn new(run_root: impl Into<PathBuf>) -> Self {
        Self {
            paths: Paths::new(run_root),
        }
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    /// Read a small prefix of the document to recover `apiVersion` without
    /// committing to a full parse of a possibly-incompatible schema.
    pub fn detect_metadata_version(&self, path: &Path) -> Result<Option<String>, StoreError> {
        let content = fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let prefix: VersionPrefix =
            serde_json::from_str(&content).map_err(|source| StoreError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(prefix.api_version)
    }

    fn read_document<T: DeserializeOwned>(&self, path: &Path) -> Result<T, StoreError> {
        if !path.exists() {
            return Err(StoreError::MissingMetadataFile(path.to_path_buf()));
        }
        let version = self.detect_metadata_version(path)?;
        if version.as_deref() != Some(CURRENT_API_VERSION) {
            return Err(StoreError::ConversionFailed {
                path: path.to_path_buf(),
                found: version,
                expected: CURRENT_API_VERSION,
            });
        }
        let content = fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write-to-temp-then-rename, creating missing parent directories.
    fn write_document<T: Serialize>(&self, path: &Path, doc: &T) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let content = serde_json::to_string_pretty(doc).map_err(StoreError::Serialize)?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, content).map_err(|source| StoreError::Write {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, path).map_err(|source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        trace!("Wrote metadata document {}", path.display());
        Ok(())
    }

    pub fn read_realm(&self, realm: &str) -> Result<RealmDocument, StoreError> {
        self.read_document(&self.paths.realm_metadata_path(realm))
    }

    pub fn write_realm(&self, doc: &mut RealmDocument) -> Result<(), StoreError> {
        doc.metadata.touch();
        self.write_document(&self.paths.realm_metadata_path(&doc.metadata.name), doc)
    }

    pub fn read_space(&self, realm: &str, space: &str) -> Result<SpaceDocument, StoreError> {
        self.read_document(&self.paths.space_metadata_path(realm, space))
    }

    pub fn write_space(&self, realm: &str, doc: &mut SpaceDocument) -> Result<(), StoreError> {
        doc.metadata.touch();
        self.write_document(
            &self.paths.space_metadata_path(realm, &doc.metadata.name),
            doc,
        )
    }

    pub fn read_stack(
        &self,
        realm: &str,
        space: &str,
        stack: &str,
    ) -> Result<StackDocument, StoreError> {
        self.read_document(&self.paths.stack_metadata_path(realm, space, stack))
    }

    pub fn write_stack(
        &self,
        realm: &str,
        space: &str,
        doc: &mut StackDocument,
    ) -> Result<(), StoreError> {
        doc.metadata.touch();
        self.write_document(
            &self
                .paths
                .stack_metadata_path(realm, space, &doc.metadata.name),
            doc,
        )
    }

    pub fn read_cell(
        &self,
        realm: &str,
        space: &str,
        stack: &str,
        cell: &str,
    ) -> Result<CellDocument, StoreError> {
        self.read_document(&self.paths.cell_metadata_path(realm, space, stack, cell))
    }

    pub fn write_cell(
        &self,
        realm: &str,
        space: &str,
        stack: &str,
        doc: &mut CellDocument,
    ) -> Result<(), StoreError> {
        doc.metadata.touch();
        self.write_document(
            &self
                .paths
                .cell_metadata_path(realm, space, stack, &doc.metadata.name),
            doc,
        )
    }

    /// Recursively remove an object's directory. Tolerates the directory
    /// already being gone (idempotent, used by Purge).
    pub fn remove_subtree(&self, path: &Path) -> Result<(), StoreError> {
        match fs::remove_dir_all(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Remove {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// List the immediate child directory names of `path`. Used by the
    /// Purge scrubber's orphan-directory walk.
    pub fn list_children(&self, path: &Path) -> Result<Vec<String>, StoreError> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(path).map_err(|source| StoreError::ListChildren {
            path: path.to_path_buf(),
            source,
        })? {
            let entry = entry.map_err(|source| StoreError::ListChildren {
                path: path.to_path_buf(),
                source,
            })?;
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}
