use dbafs::filesystem::InMemoryFilesystemAdapter;
use dbafs::store::MemoryDatastore;
use dbafs::{ChangeSet, Dbafs, DbafsOptions};
use std::sync::Arc;

pub struct Harness {
    pub fs: Arc<InMemoryFilesystemAdapter>,
    pub store: Arc<MemoryDatastore>,
    pub dbafs: Dbafs,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_options(DbafsOptions {
            hash_algorithm: "sha256".to_string(),
            ..DbafsOptions::default()
        })
    }

    pub fn with_options(options: DbafsOptions) -> Self {
        let fs = Arc::new(InMemoryFilesystemAdapter::new());
        let store = Arc::new(MemoryDatastore::new());
        let dbafs = Dbafs::new(fs.clone(), store.clone(), options).unwrap();
        Self { fs, store, dbafs }
    }

    pub fn sync(&self) -> ChangeSet {
        self.dbafs.sync(&[]).unwrap()
    }

    pub fn sync_paths(&self, paths: &[&str]) -> ChangeSet {
        let paths: Vec<String> = paths.iter().map(|p| p.to_string()).collect();
        self.dbafs.sync(&paths).unwrap()
    }

    pub fn hash(&self, path: &str) -> String {
        self.dbafs.get_record(path).unwrap().unwrap().hash
    }
}

pub fn created_paths(change_set: &ChangeSet) -> Vec<&str> {
    change_set
        .items_to_create()
        .iter()
        .map(|item| item.path.as_str())
        .collect()
}

pub fn deleted_paths(change_set: &ChangeSet) -> Vec<&str> {
    change_set
        .items_to_delete()
        .iter()
        .map(|item| item.path.as_str())
        .collect()
}
