use dbafs::filesystem::LocalFilesystemAdapter;
use dbafs::store::SledDatastore;
use dbafs::{Dbafs, DbafsOptions, Features};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn open(root: &Path, db: &Path, options: DbafsOptions) -> Dbafs {
    let filesystem = Arc::new(LocalFilesystemAdapter::new(root));
    let store = Arc::new(SledDatastore::open(db, "files").unwrap());
    Dbafs::new(filesystem, store, options).unwrap()
}

fn write(root: &Path, path: &str, content: &str) {
    let target = root.join(path);
    fs::create_dir_all(target.parent().unwrap()).unwrap();
    fs::write(target, content).unwrap();
}

#[test]
fn records_survive_reopening_the_store() {
    let root = TempDir::new().unwrap();
    let db = TempDir::new().unwrap();
    write(root.path(), "docs/readme.md", "# hello");
    write(root.path(), "docs/img/logo.svg", "<svg/>");

    let uuid = {
        let dbafs = open(root.path(), db.path(), DbafsOptions::default());
        let change_set = dbafs.sync(&[]).unwrap();
        assert_eq!(change_set.items_to_create().len(), 4);
        dbafs.get_record("docs/readme.md").unwrap().unwrap().uuid
    };

    let dbafs = open(root.path(), db.path(), DbafsOptions::default());
    assert!(dbafs.compute_change_set(&[]).unwrap().is_empty(true));

    let record = dbafs.get_record("docs/readme.md").unwrap().unwrap();
    assert_eq!(record.uuid, uuid);
    assert_eq!(record.file_size, Some(7));
    assert_eq!(
        dbafs.get_path_from_uuid(uuid).unwrap().as_deref(),
        Some("docs/readme.md")
    );

    let listed: Vec<String> = dbafs
        .get_records("docs", false)
        .unwrap()
        .into_iter()
        .map(|r| r.path)
        .collect();
    assert_eq!(listed, vec!["docs/img", "docs/readme.md"]);
}

#[test]
fn disk_rename_is_detected_as_move() {
    let root = TempDir::new().unwrap();
    let db = TempDir::new().unwrap();
    write(root.path(), "a/one.txt", "one");
    let dbafs = open(root.path(), db.path(), DbafsOptions::default());
    dbafs.sync(&[]).unwrap();
    let uuid = dbafs.get_record("a").unwrap().unwrap().uuid;

    fs::rename(root.path().join("a"), root.path().join("b")).unwrap();
    let change_set = dbafs.sync(&[]).unwrap();
    assert!(change_set.items_to_create().is_empty());
    assert!(change_set.items_to_delete().is_empty());
    assert_eq!(dbafs.get_record("b").unwrap().unwrap().uuid, uuid);
    assert!(dbafs.get_record("a").unwrap().is_none());
}

#[test]
fn size_ceiling_and_markers_are_honored_on_disk() {
    let root = TempDir::new().unwrap();
    let db = TempDir::new().unwrap();
    write(root.path(), "small.txt", "tiny");
    write(root.path(), "big.bin", &"x".repeat(64));
    write(root.path(), "hidden/.nosync", "");
    write(root.path(), "hidden/secret.txt", "s");

    let options = DbafsOptions {
        max_file_size: Some(16),
        ..DbafsOptions::default()
    };
    let dbafs = open(root.path(), db.path(), options);
    dbafs.sync(&[]).unwrap();

    assert!(dbafs.get_record("small.txt").unwrap().is_some());
    assert!(dbafs.get_record("big.bin").unwrap().is_none());
    assert!(dbafs.get_record("hidden").unwrap().is_none());
}

#[test]
fn last_modified_is_recorded_when_enabled() {
    let root = TempDir::new().unwrap();
    let db = TempDir::new().unwrap();
    write(root.path(), "file.txt", "content");

    let options = DbafsOptions {
        use_last_modified: true,
        ..DbafsOptions::default()
    };
    let dbafs = open(root.path(), db.path(), options);
    assert!(dbafs.supported_features().contains(Features::LAST_MODIFIED));
    dbafs.sync(&[]).unwrap();

    let record = dbafs.get_record("file.txt").unwrap().unwrap();
    assert!(record.last_modified.is_some());
    assert!(dbafs.compute_change_set(&[]).unwrap().is_empty(true));
}
