// Build dependency aggregation.
//
// One `DependencyMap` per build handle. The registry is owned by whoever
// drives the build and mutated through `&mut self`, so a handle's map has a
// single writer and needs no locking.

use crate::core::models::{BuildHandle, DependencyMap, Metafile};
use crate::utils::Result;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

#[derive(Debug, Default)]
pub struct DependencyRegistry {
    sessions: HashMap<BuildHandle, DependencyMap>,
    next_id: u64,
}

impl DependencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a fresh handle for a new build configuration. Its map comes
    /// into existence with the first `collect`.
    pub fn register(&mut self) -> BuildHandle {
        let handle = BuildHandle(self.next_id);
        self.next_id += 1;
        handle
    }

    /// Drops everything recorded for `handle`.
    pub fn release(&mut self, handle: BuildHandle) -> Option<DependencyMap> {
        self.sessions.remove(&handle)
    }

    /// Appends `dependencies` under `importer`. Repeated calls concatenate;
    /// nothing is deduplicated.
    pub fn collect<I, P>(&mut self, handle: BuildHandle, importer: impl Into<PathBuf>, dependencies: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.sessions
            .entry(handle)
            .or_default()
            .entry(importer.into())
            .or_default()
            .extend(dependencies.into_iter().map(Into::into));
    }

    /// Removes and returns the map for `handle`, leaving it empty.
    pub fn flush(&mut self, handle: BuildHandle) -> DependencyMap {
        match self.sessions.get_mut(&handle) {
            Some(map) => std::mem::take(map),
            None => {
                debug!("Flush for unknown build handle {}", handle.id());
                DependencyMap::new()
            }
        }
    }

    /// Appends the inputs of every entry-point output in `metafile` under
    /// that entry point, both resolved against `root`. Prior state is kept;
    /// the returned map is a snapshot of the updated state.
    ///
    /// A handle that never collected anything is left alone and yields an
    /// empty map.
    pub fn merge(&mut self, handle: BuildHandle, metafile: &Metafile, root: &Path) -> DependencyMap {
        let Some(map) = self.sessions.get_mut(&handle) else {
            debug!("Merge for build handle {} with no collected dependencies", handle.id());
            return DependencyMap::new();
        };

        for output in metafile.outputs.values() {
            let Some(entry_point) = output.entry_point.as_deref() else {
                continue;
            };
            let entry = resolve_path(root, entry_point);
            let inputs = output.inputs.keys().map(|input| resolve_path(root, input));
            map.entry(entry).or_default().extend(inputs);
        }

        map.clone()
    }

    /// Parses a metafile JSON document and merges it.
    pub fn merge_json(&mut self, handle: BuildHandle, metafile: &str, root: &Path) -> Result<DependencyMap> {
        let metafile = Metafile::from_json(metafile)?;
        Ok(self.merge(handle, &metafile, root))
    }

    /// Read-only view of what is currently recorded for `handle`.
    pub fn dependencies(&self, handle: BuildHandle) -> Option<&DependencyMap> {
        self.sessions.get(&handle)
    }
}

/// Serializes a dependency map as the JSON manifest handed back to the host.
pub fn manifest_json(map: &DependencyMap) -> Result<String> {
    Ok(serde_json::to_string_pretty(map)?)
}

/// Joins `path` onto `root` (absolute paths win) and removes `.`/`..`
/// components without touching the file system.
pub fn resolve_path(root: &Path, path: impl AsRef<Path>) -> PathBuf {
    normalize_path(&root.join(path))
}

pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other),
        }
    }

    normalized
}
