//! Deduplication across files and file versions sharing one store.

use std::io::Cursor;
use std::sync::Arc;

use tessera_cas::Manifest;
use tessera_integration_tests::{ingest, small_params, test_data, test_data_seeded};
use tessera_store::{ChunkIndex, ChunkStorage, FileStorage, JsonIndex};

fn restore(manifest: &Manifest, storage: &FileStorage) -> Vec<u8> {
    let mut out = Vec::new();
    manifest.reassemble(|h| storage.load(h), &mut out).unwrap();
    out
}

#[test]
fn test_identical_file_stores_nothing_new() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::with_memory_index(dir.path()).unwrap();
    let data = test_data(96 * 1024);

    let (first, fresh_first) = ingest(Cursor::new(&data), "a.bin", small_params(), 4096, &storage);
    let (second, fresh_second) = ingest(Cursor::new(&data), "b.bin", small_params(), 4096, &storage);

    assert_eq!(fresh_first, first.unique_chunks());
    assert_eq!(fresh_second, 0);
    assert_eq!(first.chunks, second.chunks);
    assert_eq!(restore(&second, &storage), data);
}

#[test]
fn test_edited_version_shares_most_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let index = Arc::new(JsonIndex::open(dir.path().join("index.json")).unwrap());
    let storage = FileStorage::new(dir.path().join("blobs"), index).unwrap();

    let v1 = test_data(128 * 1024);
    let mut v2 = v1.clone();
    // Insert a few bytes in the middle and overwrite a short run near the end.
    let insert_at = v2.len() / 2;
    v2.splice(insert_at..insert_at, *b"EDITED").for_each(drop);
    let tail = v2.len() - 100;
    v2[tail..tail + 10].fill(0);

    let (m1, fresh1) = ingest(Cursor::new(&v1), "doc.v1", small_params(), 4096, &storage);
    let (m2, fresh2) = ingest(Cursor::new(&v2), "doc.v2", small_params(), 4096, &storage);

    assert_eq!(fresh1, m1.chunks.len());
    assert!(
        fresh2 * 4 < m2.chunks.len(),
        "{fresh2} of {} chunks were new",
        m2.chunks.len()
    );
    assert_eq!(storage.index().len(), fresh1 + fresh2);

    assert_eq!(restore(&m1, &storage), v1);
    assert_eq!(restore(&m2, &storage), v2);
}

#[test]
fn test_unrelated_files_share_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::with_memory_index(dir.path()).unwrap();

    let a = test_data_seeded(64 * 1024, 1);
    let b = test_data_seeded(64 * 1024, 2);
    let (ma, _) = ingest(Cursor::new(&a), "a", small_params(), 4096, &storage);
    let (mb, fresh_b) = ingest(Cursor::new(&b), "b", small_params(), 4096, &storage);

    assert_eq!(fresh_b, mb.chunks.len());
    assert_eq!(storage.index().len(), ma.chunks.len() + mb.chunks.len());
}
