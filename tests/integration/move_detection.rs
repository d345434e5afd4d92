use crate::integration::support::{created_paths, deleted_paths, Harness};
use dbafs::store::{Datastore, RowFilter};

#[test]
fn renamed_file_becomes_path_update() {
    let h = Harness::new();
    h.fs.write("a.txt", "payload");
    h.sync();
    let uuid = h.dbafs.get_record("a.txt").unwrap().unwrap().uuid;

    h.fs.rename("a.txt", "b.txt");
    let change_set = h.sync();
    assert!(change_set.items_to_create().is_empty());
    assert!(change_set.items_to_delete().is_empty());
    assert_eq!(change_set.items_to_update().len(), 1);
    let update = &change_set.items_to_update()[0];
    assert_eq!(update.existing_path, "a.txt");
    assert_eq!(update.new_path.as_deref(), Some("b.txt"));
    assert_eq!(update.new_hash, None);

    assert_eq!(h.dbafs.get_record("b.txt").unwrap().unwrap().uuid, uuid);
    assert_eq!(
        h.dbafs.get_path_from_uuid(uuid).unwrap().as_deref(),
        Some("b.txt")
    );
}

#[test]
fn ambiguous_duplicates_are_not_matched() {
    let h = Harness::new();
    h.fs.write("x/one.txt", "same");
    h.fs.write("y/two.txt", "same");
    h.sync();

    h.fs.delete("x/one.txt");
    h.fs.delete("y/two.txt");
    h.fs.write("x/three.txt", "same");
    let change_set = h.sync();

    assert_eq!(created_paths(&change_set), vec!["x/three.txt"]);
    let mut deleted = deleted_paths(&change_set);
    deleted.sort();
    assert_eq!(deleted, vec!["x/one.txt", "y/two.txt"]);
}

#[test]
fn duplicates_are_matched_by_name() {
    let h = Harness::new();
    h.fs.write("src/one.txt", "same");
    h.fs.write("src/two.txt", "same");
    h.fs.write("dst/.keep", "k");
    h.sync();
    let uuid = h.dbafs.get_record("src/two.txt").unwrap().unwrap().uuid;

    h.fs.rename("src/two.txt", "dst/two.txt");
    h.fs.delete("src/one.txt");
    let change_set = h.sync();

    assert!(change_set.items_to_create().is_empty());
    assert_eq!(deleted_paths(&change_set), vec!["src/one.txt"]);
    assert_eq!(h.dbafs.get_record("dst/two.txt").unwrap().unwrap().uuid, uuid);
}

#[test]
fn moved_folder_keeps_identity_of_whole_subtree() {
    let h = Harness::new();
    h.fs.write("old/inner/deep.txt", "deep");
    h.fs.write("old/shallow.txt", "shallow");
    h.sync();
    let folder = h.dbafs.get_record("old").unwrap().unwrap().uuid;
    let inner = h.dbafs.get_record("old/inner").unwrap().unwrap().uuid;
    let deep = h.dbafs.get_record("old/inner/deep.txt").unwrap().unwrap().uuid;

    h.fs.rename("old", "renamed");
    let change_set = h.sync();
    assert!(change_set.items_to_create().is_empty());
    assert!(change_set.items_to_delete().is_empty());

    // Deepest first
    let order: Vec<&str> = change_set
        .items_to_update()
        .iter()
        .map(|item| item.existing_path.as_str())
        .collect();
    assert_eq!(
        order,
        vec!["old/shallow.txt", "old/inner/deep.txt", "old/inner", "old"]
    );

    assert_eq!(h.dbafs.get_record("renamed").unwrap().unwrap().uuid, folder);
    assert_eq!(h.dbafs.get_record("renamed/inner").unwrap().unwrap().uuid, inner);
    assert_eq!(
        h.dbafs
            .get_record("renamed/inner/deep.txt")
            .unwrap()
            .unwrap()
            .uuid,
        deep
    );
    assert!(h.dbafs.compute_change_set(&[]).unwrap().is_empty(true));
}

#[test]
fn edited_folder_is_recreated_and_untouched_children_follow() {
    let h = Harness::new();
    h.fs.write("old/stays.txt", "stays");
    h.fs.write("old/edited.txt", "v1");
    h.sync();
    let stays = h.dbafs.get_record("old/stays.txt").unwrap().unwrap().uuid;

    h.fs.rename("old", "new");
    h.fs.write("new/edited.txt", "v2");
    let change_set = h.sync();

    // The folder hash changed, so only the unchanged child is matched as a move.
    assert_eq!(created_paths(&change_set), vec!["new", "new/edited.txt"]);
    assert_eq!(deleted_paths(&change_set), vec!["old/edited.txt", "old"]);
    assert_eq!(change_set.items_to_update().len(), 1);

    let folder = h.dbafs.get_record("new").unwrap().unwrap().uuid;
    let row = h
        .store
        .fetch_one(&RowFilter::Path("new/stays.txt".to_string()))
        .unwrap()
        .unwrap();
    assert_eq!(row.uuid, stays);
    assert_eq!(row.pid, Some(folder));
    assert!(h.dbafs.compute_change_set(&[]).unwrap().is_empty(true));
}

#[test]
fn file_never_matches_folder_with_equal_hash() {
    let h = Harness::new();
    h.fs.create_directory("empty");
    h.sync();

    // An empty file hashes like an empty folder.
    h.fs.delete("empty");
    h.fs.write("blank.txt", "");
    let change_set = h.sync();
    assert_eq!(created_paths(&change_set), vec!["blank.txt"]);
    assert_eq!(deleted_paths(&change_set), vec!["empty"]);
    assert!(change_set.items_to_update().is_empty());
    assert!(h.dbafs.get_record("blank.txt").unwrap().unwrap().is_file());
}

#[test]
fn folder_moved_away_while_file_takes_its_path() {
    let h = Harness::new();
    h.fs.write("x/f.txt", "inner");
    h.sync();
    let folder = h.dbafs.get_record("x").unwrap().unwrap().uuid;

    h.fs.rename("x", "z");
    h.fs.write("x", "new file");
    let change_set = h.dbafs.sync(&[]).unwrap();
    assert_eq!(created_paths(&change_set), vec!["x"]);
    assert!(change_set.items_to_delete().is_empty());

    let moved = h.dbafs.get_record("z").unwrap().unwrap();
    assert_eq!(moved.uuid, folder);
    assert!(h.dbafs.get_record("x").unwrap().unwrap().is_file());
    let row = h
        .store
        .fetch_one(&RowFilter::Path("z/f.txt".to_string()))
        .unwrap()
        .unwrap();
    assert_eq!(row.pid, Some(folder));
    assert!(h.dbafs.compute_change_set(&[]).unwrap().is_empty(true));
}
