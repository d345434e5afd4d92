use crate::integration::support::{deleted_paths, Harness};
use dbafs::store::{Datastore, RowFilter};

fn seeded() -> Harness {
    let h = Harness::new();
    h.fs.write("a/x/f.txt", "f1");
    h.fs.write("a/y/g.txt", "g1");
    h.fs.write("b/h.txt", "h1");
    h.sync();
    h
}

#[test]
fn partial_sync_leaves_siblings_alone() {
    let h = seeded();
    let b_before = h.hash("b/h.txt");

    h.fs.write("a/x/f.txt", "f2");
    h.fs.write("b/h.txt", "h2");
    let change_set = h.sync_paths(&["a/x"]);

    let updated: Vec<&str> = change_set
        .items_to_update()
        .iter()
        .map(|item| item.existing_path.as_str())
        .collect();
    assert_eq!(updated, vec!["a", "a/x", "a/x/f.txt"]);
    assert_eq!(h.hash("b/h.txt"), b_before);

    // Only the out-of-scope file remains stale.
    let rest = h.dbafs.compute_change_set(&[]).unwrap();
    let rest: Vec<&str> = rest
        .items_to_update()
        .iter()
        .map(|item| item.existing_path.as_str())
        .collect();
    assert_eq!(rest, vec!["b", "b/h.txt"]);
}

#[test]
fn partial_parent_hash_matches_full_sync() {
    let partial = seeded();
    let full = seeded();

    partial.fs.write("a/x/f.txt", "changed");
    full.fs.write("a/x/f.txt", "changed");
    partial.sync_paths(&["a/x/f.txt"]);
    full.sync();

    assert_eq!(partial.hash("a"), full.hash("a"));
    assert_eq!(partial.hash("a/x"), full.hash("a/x"));
}

#[test]
fn vanished_sibling_outside_scope_survives_partial_sync() {
    let h = seeded();
    h.fs.delete("a/y");
    h.fs.write("a/x/f.txt", "f2");

    let change_set = h.sync_paths(&["a/x"]);
    assert!(change_set.items_to_delete().is_empty());
    assert!(h.dbafs.get_record("a/y/g.txt").unwrap().is_some());

    let change_set = h.sync();
    let mut deleted = deleted_paths(&change_set);
    deleted.sort();
    assert_eq!(deleted, vec!["a/y", "a/y/g.txt"]);
}

#[test]
fn vanished_ancestors_are_deleted() {
    let h = Harness::new();
    h.fs.write("gone/deeper/file.txt", "x");
    h.fs.write("stays.txt", "s");
    h.sync();

    h.fs.delete("gone");
    let change_set = h.sync_paths(&["gone/deeper"]);
    assert_eq!(
        deleted_paths(&change_set),
        vec!["gone/deeper/file.txt", "gone/deeper", "gone"]
    );
    assert!(h.dbafs.get_record("stays.txt").unwrap().is_some());
}

#[test]
fn vanished_ancestor_removes_siblings_outside_scope() {
    let h = Harness::new();
    h.fs.write("a/b.txt", "b");
    h.fs.write("a/c.txt", "c");
    h.fs.write("a/sub/d.txt", "d");
    h.fs.write("keep.txt", "k");
    h.sync();

    h.fs.delete("a");
    let change_set = h.sync_paths(&["a/b.txt"]);
    let mut deleted = deleted_paths(&change_set);
    deleted.sort();
    assert_eq!(deleted, vec!["a", "a/b.txt", "a/c.txt", "a/sub", "a/sub/d.txt"]);

    let rows = h.store.fetch_all(&RowFilter::All).unwrap();
    let paths: Vec<&str> = rows.iter().map(|row| row.path.as_str()).collect();
    assert_eq!(paths, vec!["keep.txt"]);
    for row in &rows {
        if let Some(pid) = row.pid {
            assert!(h.store.fetch_one(&RowFilter::Uuid(pid)).unwrap().is_some());
        }
    }
    assert!(h.dbafs.compute_change_set(&[]).unwrap().is_empty(true));
}

#[test]
fn nested_request_paths_are_collapsed() {
    let h = seeded();
    h.fs.write("a/x/f.txt", "f3");
    let narrow = h
        .dbafs
        .compute_change_set(&["a".to_string(), "a/x/f.txt".to_string()])
        .unwrap();
    let wide = h.dbafs.compute_change_set(&["a".to_string()]).unwrap();
    assert_eq!(narrow, wide);
}

#[test]
fn escaping_paths_are_rejected() {
    let h = seeded();
    assert!(h.dbafs.compute_change_set(&["../etc".to_string()]).is_err());
    assert!(h.dbafs.compute_change_set(&["/abs".to_string()]).is_err());
}
