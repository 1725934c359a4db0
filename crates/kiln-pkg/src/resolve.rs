//! Dependency resolution.
//!
//! Expands a root package's manifest-declared dependencies depth-first into
//! a deduplicated, dependency-first compilation order.

use crate::package::PackageId;
use crate::store::{PackageStore, StoreError};
use thiserror::Error;

/// Errors that can occur during resolution.
#[derive(Error, Debug)]
pub enum GraphError {
    /// A manifest somewhere in the tree failed to load or validate. The
    /// source names the offending package; nothing is compiled.
    #[error("resolution halted: {0}")]
    UnsatisfiedManifest(#[from] StoreError),

    /// The dependency tree reaches back into a package still being
    /// expanded.
    #[error("circular dependency detected: {}", .cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },
}

/// Deduplicated dependency-first ordering produced by [`resolve`].
///
/// Every dependency of a member appears at a strictly earlier index than
/// the member itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompilationOrder {
    ids: Vec<PackageId>,
}

impl CompilationOrder {
    /// Handles in compile order.
    #[must_use]
    pub fn ids(&self) -> &[PackageId] {
        &self.ids
    }

    /// Number of packages in the order.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the order contains no packages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<'a> IntoIterator for &'a CompilationOrder {
    type Item = PackageId;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, PackageId>>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.iter().copied()
    }
}

/// Resolve the root package and its transitive dependencies.
///
/// Walks manifests depth-first in declaration order, registering each
/// package in the store the first time it is seen. A name already present
/// in the store is reused without re-expanding its subtree, so every
/// package is registered, compiled, and initialized at most once per
/// process run; that is also what collapses diamond-shaped graphs.
///
/// # Errors
///
/// Fails on the first manifest error or dependency cycle. No partial order
/// escapes: the caller gets either the full ordering or the error.
pub fn resolve(store: &mut PackageStore, root: &str) -> Result<CompilationOrder, GraphError> {
    let mut order = CompilationOrder::default();
    let mut expanding = Vec::new();
    visit(store, root, &mut expanding, &mut order.ids)?;
    log::debug!("resolve: '{root}' -> {} package(s)", order.len());
    Ok(order)
}

fn visit(
    store: &mut PackageStore,
    name: &str,
    expanding: &mut Vec<String>,
    order: &mut Vec<PackageId>,
) -> Result<PackageId, GraphError> {
    if let Some(pos) = expanding.iter().position(|n| n == name) {
        let mut cycle = expanding[pos..].to_vec();
        cycle.push(name.to_string());
        return Err(GraphError::CircularDependency { cycle });
    }

    // Shared subtree: already registered, already at an earlier index.
    if let Some(id) = store.lookup(name) {
        return Ok(id);
    }

    let id = store.load(name)?;
    let dependency_names = store.get(id).dependency_names.clone();

    expanding.push(name.to_string());
    let mut dependencies = Vec::with_capacity(dependency_names.len());
    for dep in &dependency_names {
        dependencies.push(visit(store, dep, expanding, order)?);
    }
    expanding.pop();

    store.get_mut(id).dependencies = dependencies;
    order.push(id);
    Ok(id)
}

/// The post-order transitive closure of one package, the package itself
/// last.
///
/// Drives include-path computation and the initializer chain. Assumes the
/// edges were produced by [`resolve`], so it does not re-check for cycles.
#[must_use]
pub fn dependency_chain(store: &PackageStore, root: PackageId) -> Vec<PackageId> {
    let mut seen = vec![false; store.len()];
    let mut chain = Vec::new();
    walk(store, root, &mut seen, &mut chain);
    chain
}

fn walk(store: &PackageStore, id: PackageId, seen: &mut [bool], chain: &mut Vec<PackageId>) {
    if seen[id.index()] {
        return;
    }
    seen[id.index()] = true;
    for dep in &store.get(id).dependencies {
        walk(store, *dep, seen, chain);
    }
    chain.push(id);
}
