//! Local disk adapter backed by `std::fs` and `walkdir`.

use super::{FilesystemAdapter, FilesystemItem};
use crate::error::{FilesystemError, FsOperation};
use chrono::{DateTime, Utc};
use std::fs;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{trace, warn};
use walkdir::WalkDir;

/// Adapter exposing a local directory as a DBAFS filesystem
#[derive(Debug, Clone)]
pub struct LocalFilesystemAdapter {
    root: PathBuf,
}

impl LocalFilesystemAdapter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        if path.is_empty() {
            self.root.clone()
        } else {
            self.root.join(path)
        }
    }

    fn metadata(&self, path: &str) -> Result<Option<fs::Metadata>, FilesystemError> {
        match fs::metadata(self.resolve(path)) {
            Ok(meta) => Ok(Some(meta)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FilesystemError::new(FsOperation::Metadata, path, e)),
        }
    }

    fn relative_path(&self, absolute: &Path) -> Option<String> {
        let relative = absolute.strip_prefix(&self.root).ok()?;
        let segments: Option<Vec<&str>> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect();
        segments.map(|s| s.join("/"))
    }
}

fn timestamp(meta: &fs::Metadata) -> Option<i64> {
    meta.modified()
        .ok()
        .map(|t| DateTime::<Utc>::from(t).timestamp())
}

impl FilesystemAdapter for LocalFilesystemAdapter {
    fn file_exists(&self, path: &str) -> Result<bool, FilesystemError> {
        Ok(self.metadata(path)?.map(|m| m.is_file()).unwrap_or(false))
    }

    fn directory_exists(&self, path: &str) -> Result<bool, FilesystemError> {
        Ok(self.metadata(path)?.map(|m| m.is_dir()).unwrap_or(false))
    }

    fn list_contents(&self, path: &str, deep: bool) -> Result<Vec<FilesystemItem>, FilesystemError> {
        let mut walker = WalkDir::new(self.resolve(path))
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name();
        if !deep {
            walker = walker.max_depth(1);
        }

        let mut items = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| {
                let err = e
                    .into_io_error()
                    .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "filesystem loop"));
                FilesystemError::new(FsOperation::List, path, err)
            })?;

            if entry.file_type().is_symlink() {
                trace!(path = %entry.path().display(), "Skipping symbolic link");
                continue;
            }

            let Some(relative) = self.relative_path(entry.path()) else {
                warn!(path = %entry.path().display(), "Skipping entry with non UTF-8 path");
                continue;
            };

            let meta = entry
                .metadata()
                .map_err(|e| {
                    let err = e
                        .into_io_error()
                        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "metadata"));
                    FilesystemError::new(FsOperation::Metadata, relative.clone(), err)
                })?;

            if meta.is_file() {
                items.push(FilesystemItem::file(relative, meta.len(), timestamp(&meta)));
            } else if meta.is_dir() {
                items.push(FilesystemItem::directory(relative, timestamp(&meta)));
            }
        }

        items.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(items)
    }

    fn read(&self, path: &str) -> Result<Box<dyn Read + '_>, FilesystemError> {
        let file = fs::File::open(self.resolve(path))
            .map_err(|e| FilesystemError::new(FsOperation::Read, path, e))?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn last_modified(&self, path: &str) -> Result<Option<i64>, FilesystemError> {
        Ok(self.metadata(path)?.as_ref().and_then(timestamp))
    }

    fn file_size(&self, path: &str) -> Result<Option<u64>, FilesystemError> {
        Ok(self
            .metadata(path)?
            .filter(|m| m.is_file())
            .map(|m| m.len()))
    }
}
