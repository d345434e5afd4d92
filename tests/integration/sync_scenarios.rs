use crate::integration::support::{created_paths, deleted_paths, Harness};
use dbafs::hash::HashGenerator;
use dbafs::store::{Datastore, RowFilter};
use dbafs::RecordKind;

#[test]
fn simple_creation_aggregates_folder_hash() {
    let h = Harness::new();
    h.fs.write("a/b.txt", "hi");

    let change_set = h.sync();
    assert_eq!(created_paths(&change_set), vec!["a", "a/b.txt"]);

    let hasher = HashGenerator::new("sha256", false).unwrap();
    let file_hash = hasher.hash_string("hi");
    let creates = change_set.items_to_create();
    assert_eq!(creates[1].hash, file_hash);
    assert_eq!(creates[0].kind, RecordKind::Folder);
    assert_eq!(creates[0].hash, hasher.hash_string(&format!("{}b.txt", file_hash)));

    let folder = h.dbafs.get_record("a").unwrap().unwrap();
    assert_eq!(folder.hash, creates[0].hash);
}

#[test]
fn empty_folder_hashes_empty_string() {
    let h = Harness::new();
    h.fs.create_directory("empty");
    h.sync();

    let hasher = HashGenerator::new("sha256", false).unwrap();
    assert_eq!(h.hash("empty"), hasher.hash_string(""));
}

#[test]
fn deletion_without_move_target() {
    let h = Harness::new();
    h.fs.write("old.txt", "unique");
    h.fs.write("keep.txt", "keep");
    h.sync();

    h.fs.delete("old.txt");
    let change_set = h.sync();
    assert!(change_set.items_to_create().is_empty());
    assert!(change_set.items_to_update().is_empty());
    assert_eq!(deleted_paths(&change_set), vec!["old.txt"]);
    assert!(h.dbafs.get_record("old.txt").unwrap().is_none());
}

#[test]
fn content_update_changes_hash_and_ancestors() {
    let h = Harness::new();
    h.fs.write("dir/sub/f.txt", "before");
    h.sync();
    let dir_before = h.hash("dir");
    let uuid = h.dbafs.get_record("dir/sub/f.txt").unwrap().unwrap().uuid;

    h.fs.write("dir/sub/f.txt", "after");
    let change_set = h.sync();
    assert!(change_set.items_to_create().is_empty());
    assert!(change_set.items_to_delete().is_empty());

    let updated: Vec<&str> = change_set
        .items_to_update()
        .iter()
        .map(|item| item.existing_path.as_str())
        .collect();
    assert_eq!(updated, vec!["dir", "dir/sub", "dir/sub/f.txt"]);
    assert!(change_set
        .items_to_update()
        .iter()
        .all(|item| item.new_path.is_none() && item.new_hash.is_some()));

    assert_ne!(h.hash("dir"), dir_before);
    assert_eq!(h.dbafs.get_record("dir/sub/f.txt").unwrap().unwrap().uuid, uuid);
}

#[test]
fn computing_twice_without_changes_is_empty() {
    let h = Harness::new();
    h.fs.write("x/y/z.txt", "z");
    h.fs.write("x/w.txt", "w");
    h.fs.write("top.md", "t");

    assert!(!h.dbafs.compute_change_set(&[]).unwrap().is_empty(true));
    h.sync();
    assert!(h.dbafs.compute_change_set(&[]).unwrap().is_empty(true));
    assert!(h.dbafs.compute_change_set(&[]).unwrap().is_empty(true));
}

#[test]
fn excluded_subtree_is_removed_once_marked() {
    let h = Harness::new();
    h.fs.write("private/secret.txt", "s");
    h.fs.write("public/page.html", "p");
    h.fs.write("public/.public", "");
    h.sync();
    assert!(h.dbafs.get_record("private/secret.txt").unwrap().is_some());
    assert!(h.dbafs.get_record("public/.public").unwrap().is_none());

    h.fs.write("private/.nosync", "");
    let change_set = h.sync();
    let mut deleted = deleted_paths(&change_set);
    deleted.sort();
    assert_eq!(deleted, vec!["private", "private/secret.txt"]);
}

#[test]
fn type_change_replaces_record() {
    let h = Harness::new();
    h.fs.create_directory("thing");
    h.sync();

    h.fs.delete("thing");
    h.fs.write("thing", "now a file");
    let change_set = h.sync();
    assert_eq!(created_paths(&change_set), vec!["thing"]);
    assert_eq!(deleted_paths(&change_set), vec!["thing"]);

    let record = h.dbafs.get_record("thing").unwrap().unwrap();
    assert_eq!(record.kind, RecordKind::File);
}

#[test]
fn every_child_points_to_its_parent() {
    let h = Harness::new();
    h.fs.write("a/b/c/d.txt", "d");
    h.fs.write("a/e.txt", "e");
    h.sync();

    for record in h.dbafs.get_records("", true).unwrap() {
        let row = h
            .store
            .fetch_one(&RowFilter::Path(record.path.clone()))
            .unwrap()
            .unwrap();
        let parent = dbafs::paths::parent(&record.path);
        match row.pid {
            None => assert!(parent.is_empty(), "{} has no parent", record.path),
            Some(pid) => {
                let parent_record = h.dbafs.get_record(parent).unwrap().unwrap();
                assert_eq!(parent_record.uuid, pid);
                assert!(parent_record.is_directory());
            }
        }
    }
}
