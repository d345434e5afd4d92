use dbafs::filesystem::InMemoryFilesystemAdapter;
use dbafs::store::MemoryDatastore;
use dbafs::{Dbafs, DbafsError, DbafsManager, DbafsOptions, Features};
use std::sync::Arc;

fn mount(use_last_modified: bool) -> (Arc<InMemoryFilesystemAdapter>, Arc<Dbafs>) {
    let fs = Arc::new(InMemoryFilesystemAdapter::new());
    let options = DbafsOptions {
        use_last_modified,
        ..DbafsOptions::default()
    };
    let dbafs = Dbafs::new(fs.clone(), Arc::new(MemoryDatastore::new()), options).unwrap();
    (fs, Arc::new(dbafs))
}

#[test]
fn sync_and_lookup_across_mounts() {
    let (root_fs, root) = mount(false);
    let (media_fs, media) = mount(false);
    root_fs.write("notes/todo.md", "milk");
    media_fs.write("photos/cat.jpg", "meow");

    let mut manager = DbafsManager::new();
    manager.register("", root).unwrap();
    manager.register("files/media", media).unwrap();

    let change_set = manager.sync(&[]).unwrap();
    let mut created: Vec<&str> = change_set
        .items_to_create()
        .iter()
        .map(|item| item.path.as_str())
        .collect();
    created.sort();
    assert_eq!(
        created,
        vec![
            "files/media/photos",
            "files/media/photos/cat.jpg",
            "notes",
            "notes/todo.md"
        ]
    );

    let cat = manager.get_record("files/media/photos/cat.jpg").unwrap().unwrap();
    assert_eq!(cat.path, "files/media/photos/cat.jpg");
    assert!(manager.has("notes/todo.md").unwrap());
    assert_eq!(
        manager.resolve_uuid(cat.uuid, None).unwrap().as_deref(),
        Some("files/media/photos/cat.jpg")
    );
    assert_eq!(manager.resolve_uuid(cat.uuid, Some("")).unwrap(), None);
    assert!(manager.compute_change_set(&[]).unwrap().is_empty(true));
}

#[test]
fn scoped_sync_only_touches_matching_mount() {
    let (root_fs, root) = mount(false);
    let (media_fs, media) = mount(false);
    let mut manager = DbafsManager::new();
    manager.register("", root).unwrap();
    manager.register("media", media).unwrap();

    root_fs.write("a.txt", "a");
    media_fs.write("b.txt", "b");
    let change_set = manager.sync(&["media/b.txt".to_string()]).unwrap();
    assert_eq!(change_set.items_to_create().len(), 1);
    assert_eq!(change_set.items_to_create()[0].path, "media/b.txt");
    assert!(!manager.has("a.txt").unwrap());
}

#[test]
fn nested_mount_must_keep_transitive_features() {
    let (_, outer) = mount(true);
    let (_, inner) = mount(false);
    let mut manager = DbafsManager::new();
    manager.register("data", outer).unwrap();

    let err = manager.register("data/nested", inner).unwrap_err();
    assert!(matches!(err, DbafsError::FeatureConflict { .. }));

    assert!(manager
        .supported_features("data/file.txt")
        .contains(Features::LAST_MODIFIED));
    assert!(manager.supported_features("elsewhere").is_empty());
    assert!(!manager.matches("elsewhere"));
}
