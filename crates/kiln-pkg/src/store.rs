//! The process-wide package registry.

use crate::manifest::{Manifest, ManifestError};
use crate::package::{Package, PackageId, MANIFEST_FILE};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from registry operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("package '{0}' is already loaded")]
    AlreadyLoaded(String),

    #[error("manifest for package '{name}': {source}")]
    Manifest {
        name: String,
        #[source]
        source: ManifestError,
    },
}

/// Owns every [`Package`] seen by this process.
///
/// Packages live in a dense arena; everything else refers to them through
/// copyable [`PackageId`] handles issued at load time. A name maps to at
/// most one package for the lifetime of the store, which is what
/// deduplicates shared dependencies across the whole run.
#[derive(Debug)]
pub struct PackageStore {
    root: PathBuf,
    packages: Vec<Package>,
    by_name: HashMap<String, PackageId>,
}

impl PackageStore {
    /// Create an empty store over a packages root directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            packages: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// The packages root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read, validate, and register the named package's manifest.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyLoaded`] without side effects when the
    /// name is already registered, or the manifest failure otherwise.
    pub fn load(&mut self, name: &str) -> Result<PackageId, StoreError> {
        if self.by_name.contains_key(name) {
            return Err(StoreError::AlreadyLoaded(name.to_string()));
        }

        let path = self.root.join(name);
        let manifest =
            Manifest::from_path(path.join(MANIFEST_FILE), &self.root).map_err(|source| {
                StoreError::Manifest {
                    name: name.to_string(),
                    source,
                }
            })?;

        let id = PackageId(self.packages.len());
        self.packages.push(Package::from_manifest(name, path, manifest));
        self.by_name.insert(name.to_string(), id);
        log::debug!("store: registered '{name}'");
        Ok(id)
    }

    /// Handle of a registered package.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<PackageId> {
        self.by_name.get(name).copied()
    }

    /// Shared access to a package.
    ///
    /// # Panics
    ///
    /// Panics if the handle was not issued by this store.
    #[must_use]
    pub fn get(&self, id: PackageId) -> &Package {
        &self.packages[id.index()]
    }

    /// Exclusive access to a package.
    ///
    /// # Panics
    ///
    /// Panics if the handle was not issued by this store.
    pub fn get_mut(&mut self, id: PackageId) -> &mut Package {
        &mut self.packages[id.index()]
    }

    /// Number of registered packages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether the store holds no packages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Iterate over registered packages in load order.
    pub fn iter(&self) -> impl Iterator<Item = (PackageId, &Package)> {
        self.packages
            .iter()
            .enumerate()
            .map(|(index, pkg)| (PackageId(index), pkg))
    }

    /// Drop every package and start empty.
    ///
    /// Previously issued handles are invalidated.
    pub fn clear(&mut self) {
        log::debug!("store: clearing {} package(s)", self.packages.len());
        self.packages.clear();
        self.by_name.clear();
    }
}
