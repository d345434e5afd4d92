//! DBAFS façade
//!
//! A [`Dbafs`] ties one filesystem adapter to one datastore table. Record
//! lookups are cached per instance, misses included; a sync pass evicts only
//! the entries it touched, [`Dbafs::reset`] evicts everything.

use crate::error::DbafsError;
use crate::filesystem::FilesystemAdapter;
use crate::hash::HashGenerator;
use crate::paths;
use crate::store::{Datastore, RecordRow, RowFilter};
use crate::sync::{
    ChangeSet, ChangeSetApplier, ChangeSetComputer, DatabaseEntryReader, DatabaseSnapshot,
    FilesystemWalker, SyncScope, DEFAULT_BULK_INSERT_SIZE,
};
use crate::types::{ExtraMetadata, Features, Record};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Extension point attaching extra metadata to records as they are materialized.
///
/// The returned metadata lives on the in-memory [`Record`] only; it is never
/// written back to the datastore.
pub trait MetadataProvider: Send + Sync {
    fn enrich(&self, row: &RecordRow) -> ExtraMetadata;
}

/// Construction options for a [`Dbafs`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbafsOptions {
    pub hash_algorithm: String,
    pub bulk_insert_size: usize,
    /// Files larger than this many bytes are not synchronized; `None` disables the ceiling
    pub max_file_size: Option<u64>,
    pub use_last_modified: bool,
    /// Prefix under which rows are stored in the table, stripped from exposed paths
    pub database_path_prefix: String,
}

impl Default for DbafsOptions {
    fn default() -> Self {
        Self {
            hash_algorithm: "blake3".to_string(),
            bulk_insert_size: DEFAULT_BULK_INSERT_SIZE,
            max_file_size: None,
            use_last_modified: false,
            database_path_prefix: String::new(),
        }
    }
}

/// Operations a mount in a [`crate::manager::DbafsManager`] must provide
pub trait DbafsBackend: Send + Sync {
    fn get_record(&self, path: &str) -> Result<Option<Record>, DbafsError>;

    fn get_records(&self, path: &str, deep: bool) -> Result<Vec<Record>, DbafsError>;

    fn get_path_from_uuid(&self, uuid: Uuid) -> Result<Option<String>, DbafsError>;

    fn sync(&self, paths: &[String]) -> Result<ChangeSet, DbafsError>;

    fn compute_change_set(&self, paths: &[String]) -> Result<ChangeSet, DbafsError>;

    fn supported_features(&self) -> Features;

    fn reset(&self);
}

#[derive(Default)]
struct RecordCache {
    records: HashMap<String, Option<Record>>,
    path_by_uuid: HashMap<Uuid, Option<String>>,
    path_by_id: HashMap<u64, Option<String>>,
}

impl RecordCache {
    fn remember(&mut self, id: u64, record: &Record) {
        self.path_by_uuid.insert(record.uuid, Some(record.path.clone()));
        self.path_by_id.insert(id, Some(record.path.clone()));
        self.records.insert(record.path.clone(), Some(record.clone()));
    }

    fn invalidate(&mut self, affected: &HashSet<String>) {
        self.records.retain(|path, _| !affected.contains(path));
        let keep = |path: &mut Option<String>| matches!(path, Some(p) if !affected.contains(p));
        self.path_by_uuid.retain(|_, path| keep(path));
        self.path_by_id.retain(|_, path| keep(path));
    }
}

/// Database assisted filesystem over one table
pub struct Dbafs {
    filesystem: Arc<dyn FilesystemAdapter>,
    store: Arc<dyn Datastore>,
    hasher: HashGenerator,
    options: DbafsOptions,
    metadata_providers: Vec<Arc<dyn MetadataProvider>>,
    cache: RwLock<RecordCache>,
    sync_lock: Mutex<()>,
}

impl Dbafs {
    /// Create a DBAFS; fails on an unknown hash algorithm or a zero bulk insert size
    pub fn new(
        filesystem: Arc<dyn FilesystemAdapter>,
        store: Arc<dyn Datastore>,
        mut options: DbafsOptions,
    ) -> Result<Self, DbafsError> {
        let hasher = HashGenerator::new(&options.hash_algorithm, options.use_last_modified)?;
        if options.bulk_insert_size == 0 {
            return Err(DbafsError::Config(
                "bulk_insert_size must be greater than zero".to_string(),
            ));
        }
        options.database_path_prefix = paths::canonicalize(&options.database_path_prefix)?;
        options.max_file_size = options.max_file_size.filter(|max| *max > 0);

        Ok(Self {
            filesystem,
            store,
            hasher,
            options,
            metadata_providers: Vec::new(),
            cache: RwLock::new(RecordCache::default()),
            sync_lock: Mutex::new(()),
        })
    }

    pub fn with_metadata_provider(mut self, provider: Arc<dyn MetadataProvider>) -> Self {
        self.metadata_providers.push(provider);
        self
    }

    pub fn options(&self) -> &DbafsOptions {
        &self.options
    }

    pub fn filesystem(&self) -> &dyn FilesystemAdapter {
        self.filesystem.as_ref()
    }

    /// Record at `path`, or `None` if the database does not know it
    pub fn get_record(&self, path: &str) -> Result<Option<Record>, DbafsError> {
        let path = paths::canonicalize(path)?;
        if path.is_empty() {
            return Ok(None);
        }
        if let Some(cached) = self.cache.read().records.get(&path) {
            return Ok(cached.clone());
        }

        let row = self
            .store
            .fetch_one(&RowFilter::Path(self.database_path(&path)))?;
        match row {
            Some(row) => {
                let record = self.materialize(&row, &path)?;
                self.cache.write().remember(row.id, &record);
                Ok(Some(record))
            }
            None => {
                self.cache.write().records.insert(path, None);
                Ok(None)
            }
        }
    }

    /// Records below `path`, ordered by path; `deep` includes all descendants
    pub fn get_records(&self, path: &str, deep: bool) -> Result<Vec<Record>, DbafsError> {
        let path = paths::canonicalize(path)?;
        let rows = self.store.fetch_all(&RowFilter::Children {
            parent: self.database_path(&path),
            deep,
        })?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(relative) = paths::make_relative(&row.path, &self.options.database_path_prefix)
            else {
                continue;
            };
            let record = self.materialize(&row, relative)?;
            self.cache.write().remember(row.id, &record);
            records.push(record);
        }
        records.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(records)
    }

    pub fn get_path_from_uuid(&self, uuid: Uuid) -> Result<Option<String>, DbafsError> {
        if let Some(cached) = self.cache.read().path_by_uuid.get(&uuid) {
            return Ok(cached.clone());
        }
        let row = self.store.fetch_one(&RowFilter::Uuid(uuid))?;
        let path = self.remember_row(row)?;
        self.cache.write().path_by_uuid.insert(uuid, path.clone());
        Ok(path)
    }

    /// Path of the record with datastore id `id`
    pub fn get_path_from_id(&self, id: u64) -> Result<Option<String>, DbafsError> {
        if let Some(cached) = self.cache.read().path_by_id.get(&id) {
            return Ok(cached.clone());
        }
        let row = self.store.fetch_one(&RowFilter::Id(id))?;
        let path = self.remember_row(row)?;
        self.cache.write().path_by_id.insert(id, path.clone());
        Ok(path)
    }

    /// Synchronize the given paths (all of them if empty) and return what changed
    pub fn sync(&self, paths: &[String]) -> Result<ChangeSet, DbafsError> {
        let _guard = self.sync_lock.lock();
        let (change_set, snapshot) = self.diff(paths)?;

        if change_set.is_empty(self.options.use_last_modified) {
            debug!("Nothing to synchronize");
            return Ok(change_set);
        }

        let mut uuids = snapshot.uuids;
        ChangeSetApplier::new(
            self.store.as_ref(),
            &self.options.database_path_prefix,
            self.options.bulk_insert_size,
        )
        .apply(&change_set, &mut uuids)?;

        self.invalidate(&change_set);
        info!(changes = change_set.len(), "Synchronized");
        Ok(change_set)
    }

    /// Compute the change set a sync of `paths` would apply, without writing anything
    pub fn compute_change_set(&self, paths: &[String]) -> Result<ChangeSet, DbafsError> {
        Ok(self.diff(paths)?.0)
    }

    pub fn supported_features(&self) -> Features {
        if self.options.use_last_modified {
            Features::FILE_SIZE | Features::LAST_MODIFIED
        } else {
            Features::FILE_SIZE
        }
    }

    /// Drop every cached lookup
    pub fn reset(&self) {
        *self.cache.write() = RecordCache::default();
    }

    fn diff(&self, paths: &[String]) -> Result<(ChangeSet, DatabaseSnapshot), DbafsError> {
        let scope = SyncScope::normalize(paths)?;
        let snapshot =
            DatabaseEntryReader::new(self.store.as_ref(), &self.options.database_path_prefix)
                .read(&scope)?;

        let walker = FilesystemWalker::new(
            self.filesystem.as_ref(),
            &self.hasher,
            &snapshot,
            &scope,
            self.options.max_file_size,
        );
        let change_set =
            ChangeSetComputer::new(&self.hasher, &snapshot, &scope, self.options.use_last_modified)
                .compute(walker)?;
        Ok((change_set, snapshot))
    }

    fn invalidate(&self, change_set: &ChangeSet) {
        let affected: HashSet<String> = change_set
            .items_to_create()
            .iter()
            .map(|item| item.path.clone())
            .chain(change_set.items_to_update().iter().flat_map(|item| {
                std::iter::once(item.existing_path.clone()).chain(item.new_path.clone())
            }))
            .chain(
                change_set
                    .items_to_delete()
                    .iter()
                    .map(|item| item.path.clone()),
            )
            .collect();
        debug!(paths = affected.len(), "Invalidating cached records");
        self.cache.write().invalidate(&affected);
    }

    fn remember_row(&self, row: Option<RecordRow>) -> Result<Option<String>, DbafsError> {
        let Some(row) = row else {
            return Ok(None);
        };
        let Some(relative) = paths::make_relative(&row.path, &self.options.database_path_prefix)
        else {
            return Ok(None);
        };
        if relative.is_empty() {
            return Ok(None);
        }
        let record = self.materialize(&row, relative)?;
        self.cache.write().remember(row.id, &record);
        Ok(Some(record.path))
    }

    fn materialize(&self, row: &RecordRow, path: &str) -> Result<Record, DbafsError> {
        let file_size = if row.kind.is_file() && self.filesystem.file_exists(path)? {
            self.filesystem.file_size(path)?
        } else {
            None
        };

        let mut extra = ExtraMetadata::new();
        for provider in &self.metadata_providers {
            extra.extend(provider.enrich(row));
        }

        Ok(Record {
            path: path.to_string(),
            uuid: row.uuid,
            kind: row.kind,
            hash: row.hash.clone(),
            last_modified: row.last_modified,
            file_size,
            extra,
        })
    }

    fn database_path(&self, path: &str) -> String {
        paths::join(&self.options.database_path_prefix, path)
    }
}

impl DbafsBackend for Dbafs {
    fn get_record(&self, path: &str) -> Result<Option<Record>, DbafsError> {
        Dbafs::get_record(self, path)
    }

    fn get_records(&self, path: &str, deep: bool) -> Result<Vec<Record>, DbafsError> {
        Dbafs::get_records(self, path, deep)
    }

    fn get_path_from_uuid(&self, uuid: Uuid) -> Result<Option<String>, DbafsError> {
        Dbafs::get_path_from_uuid(self, uuid)
    }

    fn sync(&self, paths: &[String]) -> Result<ChangeSet, DbafsError> {
        Dbafs::sync(self, paths)
    }

    fn compute_change_set(&self, paths: &[String]) -> Result<ChangeSet, DbafsError> {
        Dbafs::compute_change_set(self, paths)
    }

    fn supported_features(&self) -> Features {
        Dbafs::supported_features(self)
    }

    fn reset(&self) {
        Dbafs::reset(self)
    }
}
