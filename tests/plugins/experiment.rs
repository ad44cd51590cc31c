use droplet::core::error::DropletError;
use droplet::core::store::Store;
use droplet::plugins::{data_entry, experiment};
use rusqlite::Connection;
use std::fs;
use tempfile::{TempDir, tempdir};

fn setup() -> (TempDir, Store) {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path().join("data"), tmp.path().join("images")).unwrap();
    (tmp, store)
}

fn rows_referencing(store: &Store, experiment_id: i64) -> i64 {
    let conn = Connection::open(store.db_path()).unwrap();
    conn.query_row(
        "SELECT COUNT(*) FROM data_entries WHERE experiment_id = ?1",
        [experiment_id],
        |row| row.get(0),
    )
    .unwrap()
}

#[test]
fn test_create_assigns_ids_and_starts_empty() {
    let (_tmp, store) = setup();

    let first = experiment::create(&store, "Trial A", Some("desc")).unwrap();
    let second = experiment::create(&store, "Trial B", None).unwrap();

    assert_eq!(first.id, 1);
    assert_eq!(second.id, 2);
    assert!(first.data_entries.is_empty());
    assert_eq!(second.description, None);
}

#[test]
fn test_create_rejects_empty_name() {
    let (_tmp, store) = setup();

    for name in ["", "   "] {
        let err = experiment::create(&store, name, Some("desc")).unwrap_err();
        assert!(matches!(err, DropletError::ValidationError(_)));
    }
    assert!(experiment::list(&store).unwrap().is_empty());
}

#[test]
fn test_get_missing_is_not_found() {
    let (_tmp, store) = setup();
    let err = experiment::get(&store, 99).unwrap_err();
    assert!(matches!(err, DropletError::NotFound(_)));
}

#[test]
fn test_list_orders_by_id_and_includes_entries() {
    let (_tmp, store) = setup();
    let a = experiment::create(&store, "A", None).unwrap();
    let b = experiment::create(&store, "B", None).unwrap();
    data_entry::create(&store, 21.0, 40.0, "b1.jpg", b.id).unwrap();
    data_entry::create(&store, 22.0, 41.0, "a1.jpg", a.id).unwrap();
    data_entry::create(&store, 23.0, 42.0, "a2.jpg", a.id).unwrap();

    let all = experiment::list(&store).unwrap();
    assert_eq!(all.iter().map(|e| e.id).collect::<Vec<_>>(), vec![a.id, b.id]);
    let a_files: Vec<_> = all[0]
        .data_entries
        .iter()
        .map(|e| e.image_filename.as_str())
        .collect();
    assert_eq!(a_files, vec!["a1.jpg", "a2.jpg"]);
    assert_eq!(all[1].data_entries.len(), 1);
}

#[test]
fn test_update_is_full_replace() {
    let (_tmp, store) = setup();
    let exp = experiment::create(&store, "Trial A", Some("desc")).unwrap();

    let updated = experiment::update(&store, exp.id, "Trial A (rerun)", None).unwrap();
    assert_eq!(updated.name, "Trial A (rerun)");
    assert_eq!(updated.description, None);
    assert_eq!(experiment::get(&store, exp.id).unwrap(), updated);
}

#[test]
fn test_update_missing_and_invalid() {
    let (_tmp, store) = setup();
    let err = experiment::update(&store, 5, "name", None).unwrap_err();
    assert!(matches!(err, DropletError::NotFound(_)));

    let exp = experiment::create(&store, "Trial A", None).unwrap();
    let err = experiment::update(&store, exp.id, "", None).unwrap_err();
    assert!(matches!(err, DropletError::ValidationError(_)));
    assert_eq!(experiment::get(&store, exp.id).unwrap().name, "Trial A");
}

#[test]
fn test_delete_cascades_rows_and_images() {
    let (_tmp, store) = setup();
    let exp = experiment::create(&store, "Trial A", None).unwrap();
    let other = experiment::create(&store, "Trial B", None).unwrap();

    for i in 0..3 {
        let name = format!("droplet_{}.jpg", i);
        fs::write(store.image_dir.join(&name), b"img").unwrap();
        data_entry::create(&store, 25.0, 50.0, &name, exp.id).unwrap();
    }
    // One entry whose image was already removed externally.
    data_entry::create(&store, 25.0, 50.0, "gone.jpg", exp.id).unwrap();
    fs::write(store.image_dir.join("keep.jpg"), b"img").unwrap();
    data_entry::create(&store, 25.0, 50.0, "keep.jpg", other.id).unwrap();

    let removed = experiment::delete(&store, exp.id).unwrap();
    assert_eq!(removed, 4);

    assert_eq!(rows_referencing(&store, exp.id), 0);
    for i in 0..3 {
        assert!(!store.image_dir.join(format!("droplet_{}.jpg", i)).exists());
    }
    assert!(matches!(
        experiment::get(&store, exp.id).unwrap_err(),
        DropletError::NotFound(_)
    ));

    // Unrelated experiment untouched.
    assert!(store.image_dir.join("keep.jpg").exists());
    assert_eq!(experiment::get(&store, other.id).unwrap().data_entries.len(), 1);
}

#[test]
fn test_delete_missing_is_not_found() {
    let (_tmp, store) = setup();
    let err = experiment::delete(&store, 42).unwrap_err();
    assert!(matches!(err, DropletError::NotFound(_)));
}

#[test]
fn test_delete_rolls_back_rows_when_parent_delete_fails() {
    let (_tmp, store) = setup();
    let exp = experiment::create(&store, "Trial A", None).unwrap();
    fs::write(store.image_dir.join("a.jpg"), b"img").unwrap();
    data_entry::create(&store, 25.0, 50.0, "a.jpg", exp.id).unwrap();

    // Make the final parent-row delete fail inside the transaction.
    let conn = Connection::open(store.db_path()).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER block_experiment_delete BEFORE DELETE ON experiments
         BEGIN SELECT RAISE(ABORT, 'blocked'); END;",
    )
    .unwrap();

    let err = experiment::delete(&store, exp.id).unwrap_err();
    assert!(matches!(err, DropletError::RusqliteError(_)));

    // Rows survive together; the image removal is outside the transaction.
    assert_eq!(rows_referencing(&store, exp.id), 1);
    assert!(experiment::get(&store, exp.id).is_ok());
    assert!(!store.image_dir.join("a.jpg").exists());
}
