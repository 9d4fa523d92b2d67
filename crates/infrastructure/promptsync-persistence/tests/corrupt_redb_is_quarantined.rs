use camino::Utf8PathBuf;
use promptsync_persistence::{
    DbState, KeyValueStoreExt, RedbKeyValueStore, StorageError, StoreScope,
};

fn quarantines_in(root: &Utf8PathBuf) -> Vec<String> {
    std::fs::read_dir(root)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|n| n.starts_with("promptsync.redb.corrupt."))
        .collect()
}

#[test]
fn corrupt_redb_is_quarantined_on_validate() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    let db_path = RedbKeyValueStore::path_for_dir(&root);

    std::fs::write(&db_path, b"definitely-not-a-redb-database").unwrap();
    assert_eq!(
        RedbKeyValueStore::validate(&db_path).unwrap(),
        DbState::Corrupt
    );
    assert!(!db_path.exists());
    assert_eq!(quarantines_in(&root).len(), 1, "expected exactly one quarantine");
}

#[test]
fn open_reports_corruption_and_recover_recreates() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    let db_path = RedbKeyValueStore::path_for_dir(&root);

    std::fs::write(&db_path, b"definitely-not-a-redb-database").unwrap();
    let err = RedbKeyValueStore::open(&db_path).unwrap_err();
    assert!(matches!(err, StorageError::Corrupt));

    std::fs::write(&db_path, b"definitely-not-a-redb-database").unwrap();
    let store = RedbKeyValueStore::open_or_recover(&db_path).unwrap();
    assert!(db_path.exists());
    assert_eq!(quarantines_in(&root).len(), 2);

    store
        .set_one(StoreScope::Local, "prompts", &serde_json::json!([]))
        .unwrap();
    assert_eq!(
        store
            .get_one::<serde_json::Value>(StoreScope::Local, "prompts")
            .unwrap(),
        Some(serde_json::json!([]))
    );
}

#[test]
fn missing_file_validates_as_missing() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    assert_eq!(
        RedbKeyValueStore::validate(&RedbKeyValueStore::path_for_dir(&root)).unwrap(),
        DbState::Missing
    );
}
