//! Multi-mount routing
//!
//! A [`DbafsManager`] serves several DBAFS instances under virtual path
//! prefixes. Lookups go to the most specific mount; syncs fan out to every
//! mount touched by the requested paths.

use crate::dbafs::DbafsBackend;
use crate::error::DbafsError;
use crate::paths;
use crate::sync::ChangeSet;
use crate::types::{Features, Record};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

struct Mount {
    prefix: String,
    backend: Arc<dyn DbafsBackend>,
}

/// Routes paths to the DBAFS mounted at the longest matching prefix
#[derive(Default)]
pub struct DbafsManager {
    /// Sorted most specific first
    mounts: Vec<Mount>,
}

impl DbafsManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount `backend` at `prefix` (`""` for the root).
    ///
    /// Fails if the prefix is taken, or if a transitive feature advertised by
    /// an enclosing mount is withheld by a mount nested inside it.
    pub fn register(
        &mut self,
        prefix: &str,
        backend: Arc<dyn DbafsBackend>,
    ) -> Result<(), DbafsError> {
        let prefix = paths::canonicalize(prefix)?;
        if self.mounts.iter().any(|mount| mount.prefix == prefix) {
            return Err(DbafsError::Config(format!(
                "A DBAFS is already registered for prefix \"{}\"",
                prefix
            )));
        }

        let features = backend.supported_features();
        for mount in &self.mounts {
            let existing = mount.backend.supported_features();
            if paths::is_base_path(&mount.prefix, &prefix) {
                check_transitive(&mount.prefix, existing, &prefix, features)?;
            } else if paths::is_base_path(&prefix, &mount.prefix) {
                check_transitive(&prefix, features, &mount.prefix, existing)?;
            }
        }

        info!(prefix = %prefix, features = ?features, "Registered DBAFS");
        self.mounts.push(Mount { prefix, backend });
        self.mounts.sort_by(|a, b| {
            b.prefix
                .len()
                .cmp(&a.prefix.len())
                .then_with(|| a.prefix.cmp(&b.prefix))
        });
        Ok(())
    }

    /// Registered prefixes, most specific first
    pub fn prefixes(&self) -> Vec<&str> {
        self.mounts.iter().map(|mount| mount.prefix.as_str()).collect()
    }

    /// Whether some DBAFS is responsible for `path`
    pub fn matches(&self, path: &str) -> bool {
        paths::canonicalize(path)
            .map(|path| self.route(&path).is_some())
            .unwrap_or(false)
    }

    /// Whether a record exists at `path`
    pub fn has(&self, path: &str) -> Result<bool, DbafsError> {
        Ok(self.get_record(path)?.is_some())
    }

    pub fn get_record(&self, path: &str) -> Result<Option<Record>, DbafsError> {
        let path = paths::canonicalize(path)?;
        let Some((mount, relative)) = self.route(&path) else {
            return Ok(None);
        };
        Ok(mount
            .backend
            .get_record(relative)?
            .map(|record| reattach(&mount.prefix, record)))
    }

    /// Records below `path` across all mounts, ordered by path.
    ///
    /// Where mounts overlap, the most specific mount's record wins.
    pub fn get_records(&self, path: &str, deep: bool) -> Result<Vec<Record>, DbafsError> {
        let path = paths::canonicalize(path)?;
        let mut seen = HashSet::new();
        let mut records = Vec::new();

        for mount in &self.mounts {
            let listed = if let Some(relative) = paths::make_relative(&path, &mount.prefix) {
                mount.backend.get_records(relative, deep)?
            } else if deep && paths::is_base_path(&path, &mount.prefix) {
                mount.backend.get_records("", true)?
            } else {
                continue;
            };

            for record in listed {
                let record = reattach(&mount.prefix, record);
                if seen.insert(record.path.clone()) {
                    records.push(record);
                }
            }
        }

        records.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(records)
    }

    /// Full path of the record with `uuid`, optionally restricted to the mount at `prefix`
    pub fn resolve_uuid(
        &self,
        uuid: Uuid,
        prefix: Option<&str>,
    ) -> Result<Option<String>, DbafsError> {
        let prefix = prefix.map(paths::canonicalize).transpose()?;
        for mount in &self.mounts {
            if prefix.as_deref().is_some_and(|p| p != mount.prefix) {
                continue;
            }
            if let Some(path) = mount.backend.get_path_from_uuid(uuid)? {
                return Ok(Some(paths::join(&mount.prefix, &path)));
            }
        }
        Ok(None)
    }

    /// Features guaranteed for records at `path`
    pub fn supported_features(&self, path: &str) -> Features {
        paths::canonicalize(path)
            .ok()
            .and_then(|path| self.route(&path).map(|(mount, _)| mount.backend.supported_features()))
            .unwrap_or_else(Features::empty)
    }

    /// Synchronize every mount touched by `paths` (all mounts if empty)
    pub fn sync(&self, paths: &[String]) -> Result<ChangeSet, DbafsError> {
        self.fan_out(paths, |backend, scope| backend.sync(scope))
    }

    /// Dry-run counterpart of [`DbafsManager::sync`]
    pub fn compute_change_set(&self, paths: &[String]) -> Result<ChangeSet, DbafsError> {
        self.fan_out(paths, |backend, scope| backend.compute_change_set(scope))
    }

    pub fn reset(&self) {
        for mount in &self.mounts {
            mount.backend.reset();
        }
    }

    fn route<'m, 'p>(&'m self, path: &'p str) -> Option<(&'m Mount, &'p str)> {
        self.mounts.iter().find_map(|mount| {
            paths::make_relative(path, &mount.prefix).map(|relative| (mount, relative))
        })
    }

    fn fan_out<F>(&self, requested: &[String], run: F) -> Result<ChangeSet, DbafsError>
    where
        F: Fn(&dyn DbafsBackend, &[String]) -> Result<ChangeSet, DbafsError>,
    {
        let requested = requested
            .iter()
            .map(|path| paths::canonicalize(path))
            .collect::<Result<Vec<_>, _>>()?;

        let mut change_set = ChangeSet::empty();
        for mount in &self.mounts {
            let scope: Vec<String> = if requested.is_empty() {
                Vec::new()
            } else {
                let scope: Vec<String> = requested
                    .iter()
                    .filter_map(|path| {
                        if let Some(relative) = paths::make_relative(path, &mount.prefix) {
                            Some(relative.to_string())
                        } else if paths::is_base_path(path, &mount.prefix) {
                            Some(String::new())
                        } else {
                            None
                        }
                    })
                    .collect();
                if scope.is_empty() {
                    continue;
                }
                scope
            };

            debug!(prefix = %mount.prefix, paths = scope.len(), "Synchronizing mount");
            let result = run(mount.backend.as_ref(), &scope)?;
            change_set = change_set.with_other(result, &mount.prefix);
        }
        Ok(change_set)
    }
}

fn reattach(prefix: &str, record: Record) -> Record {
    let path = paths::join(prefix, &record.path);
    record.with_path(path)
}

fn check_transitive(
    outer_prefix: &str,
    outer: Features,
    inner_prefix: &str,
    inner: Features,
) -> Result<(), DbafsError> {
    let missing = (outer & Features::TRANSITIVE).difference(inner);
    match missing.iter().next() {
        Some(feature) => Err(DbafsError::FeatureConflict {
            feature: feature.name().to_string(),
            prefix: outer_prefix.to_string(),
            child_prefix: inner_prefix.to_string(),
        }),
        None => Ok(()),
    }
}
