//! End-to-end checks against a file-backed store: persistence across
//! reopen, and change detection driven by real files.

use std::path::{Path, PathBuf};

use chrono::Utc;
use filament_core::{
    detect_changes, hash_text, modification_time_ns, CacheStore, ContentMode, DocumentRecord,
};
use filament_sqlite::{migrate_legacy_cache, SqliteCacheStore, SqliteConfig};

const MODEL: &str = "nomic-embed-text";

fn open(db: &Path) -> SqliteCacheStore {
    SqliteCacheStore::open(SqliteConfig::new(db)).expect("failed to open store")
}

fn write_note(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn seed(store: &SqliteCacheStore, path: &Path, content: &str) {
    let record = DocumentRecord {
        path: path.to_string_lossy().into_owned(),
        content_hash: hash_text(content),
        mtime_ns: modification_time_ns(path).unwrap(),
        size_bytes: content.len() as u64,
        model: MODEL.to_string(),
        dimensions: 2,
        updated_at: Utc::now(),
    };
    store.upsert_document(&record, &[0.25, 0.75]).unwrap();
}

#[test]
fn records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("filament.db");
    let note = write_note(dir.path(), "a.md", "alpha");

    {
        let store = open(&db);
        seed(&store, &note, "alpha");
    }

    let store = open(&db);
    let key = note.to_string_lossy();
    let record = store.document(&key, MODEL).unwrap().unwrap();
    assert_eq!(record.content_hash, hash_text("alpha"));
    assert_eq!(store.embedding(&key, MODEL).unwrap().unwrap(), vec![0.25, 0.75]);
}

#[test]
fn detection_against_sqlite_backend() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir.path().join("filament.db"));

    let unchanged = write_note(dir.path(), "same.md", "same");
    seed(&store, &unchanged, "same");

    let rewritten = write_note(dir.path(), "edited.md", "before");
    seed(&store, &rewritten, "before");
    std::fs::write(&rewritten, "after").unwrap();
    store
        .refresh_mtime(&rewritten.to_string_lossy(), MODEL, 1)
        .unwrap();

    let removed = write_note(dir.path(), "gone.md", "gone");
    seed(&store, &removed, "gone");
    std::fs::remove_file(&removed).unwrap();

    let fresh = write_note(dir.path(), "fresh.md", "fresh");

    let input = vec![unchanged.clone(), rewritten.clone(), fresh.clone()];
    let changes = detect_changes(&input, &store, MODEL, ContentMode::Body).unwrap();

    assert_eq!(changes.unchanged, vec![unchanged]);
    assert_eq!(changes.modified, vec![rewritten]);
    assert_eq!(changes.new, vec![fresh]);
    assert_eq!(changes.deleted, vec![removed]);
}

#[test]
fn migration_then_detection_skips_re_embedding() {
    let dir = tempfile::tempdir().unwrap();
    let note = write_note(dir.path(), "a.md", "alpha");
    let key = note.to_string_lossy().into_owned();

    // Simulate a migrated record: correct hash, placeholder mtime.
    let store = open(&dir.path().join("filament.db"));
    let record = DocumentRecord {
        path: key.clone(),
        content_hash: hash_text("alpha"),
        mtime_ns: 0,
        size_bytes: 0,
        model: MODEL.to_string(),
        dimensions: 2,
        updated_at: Utc::now(),
    };
    store.upsert_document(&record, &[1.0, 0.0]).unwrap();

    let changes = detect_changes(&[note.clone()], &store, MODEL, ContentMode::Body).unwrap();
    assert_eq!(changes.unchanged, vec![note.clone()]);

    // The placeholder mtime was settled, so the next pass is stat-only.
    let settled = store.document(&key, MODEL).unwrap().unwrap();
    assert_eq!(settled.mtime_ns, modification_time_ns(&note).unwrap());
}

#[test]
fn legacy_import_runs_once_per_database() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("filament.db");
    let legacy = dir.path().join("embeddings.bin");
    // Not a valid container; the import must archive it and carry on.
    std::fs::write(&legacy, b"garbage").unwrap();

    {
        let store = open(&db);
        assert_eq!(migrate_legacy_cache(&store, &legacy, MODEL).unwrap(), 0);
    }

    let store = open(&db);
    assert_eq!(migrate_legacy_cache(&store, &legacy, MODEL).unwrap(), 0);
    assert!(store.get_meta(&format!("legacy_import:{MODEL}")).unwrap().is_some());
}
