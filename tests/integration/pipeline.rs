//! Full local pipeline: chunk → store → manifest → restart → verify → restore.

use std::fs;
use std::io::Cursor;
use std::sync::Arc;

use tessera_cas::{CasError, ChunkingConfig, Manifest};
use tessera_integration_tests::{ingest, small_params, test_data};
use tessera_store::{ChunkIndex, ChunkStorage, ChunkWriter, FileStorage, JsonIndex, MemoryStorage};

#[test]
fn test_file_roundtrip_across_restart() {
    let dir = tempfile::tempdir().unwrap();
    let index_path = dir.path().join("index.json");
    let blobs = dir.path().join("blobs");
    let manifest_path = dir.path().join("manifests").join("data.bin.json");
    fs::create_dir_all(manifest_path.parent().unwrap()).unwrap();

    let data = test_data(256 * 1024);

    {
        let index = Arc::new(JsonIndex::open(&index_path).unwrap());
        let storage = FileStorage::new(&blobs, index).unwrap();
        let (manifest, fresh) = ingest(Cursor::new(&data), "data.bin", small_params(), 4096, &storage);

        assert_eq!(manifest.file_size, data.len() as u64);
        assert_eq!(manifest.chunk_bytes(), manifest.file_size);
        assert_eq!(fresh, manifest.unique_chunks());
        manifest.save(&manifest_path).unwrap();
    }

    // Fresh process: everything comes back from disk.
    let index = Arc::new(JsonIndex::open(&index_path).unwrap());
    let storage = FileStorage::new(&blobs, index).unwrap();
    let manifest = Manifest::load(&manifest_path).unwrap();

    assert_eq!(storage.index().len(), manifest.unique_chunks());
    manifest.verify_file(|h| storage.load(h)).unwrap();

    let restore_dir = dir.path().join("restore");
    let restored = manifest.restore_file(|h| storage.load(h), &restore_dir).unwrap();
    assert_eq!(restored, restore_dir.join("data.bin"));
    assert_eq!(fs::read(&restored).unwrap(), data);
    assert!(storage.verify_integrity().unwrap().is_clean());
}

#[test]
fn test_corrupted_blob_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::with_memory_index(dir.path().join("blobs")).unwrap();
    let data = test_data(64 * 1024);
    let (manifest, _) = ingest(Cursor::new(&data), "victim.bin", small_params(), 4096, &storage);

    let target = manifest.chunks[3];
    let path = storage.blob_path(&target.hash);
    let mut bytes = fs::read(&path).unwrap();
    bytes[0] ^= 0xFF;
    fs::write(&path, bytes).unwrap();

    match manifest.verify_file(|h| storage.load(h)).unwrap_err() {
        CasError::HashMismatch { index, hash, .. } => {
            assert_eq!(hash, target.hash);
            assert_eq!(manifest.chunks[index].hash, target.hash);
        }
        other => panic!("unexpected error: {other}"),
    }

    let report = storage.verify_integrity().unwrap();
    assert_eq!(report.corrupt, vec![target.hash]);
}

#[test]
fn test_missing_blob_fails_restore_with_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::with_memory_index(dir.path().join("blobs")).unwrap();
    let data = test_data(32 * 1024);
    let (manifest, _) = ingest(Cursor::new(&data), "partial.bin", small_params(), 4096, &storage);

    let last = *manifest.chunks.last().unwrap();
    fs::remove_file(storage.blob_path(&last.hash)).unwrap();

    let err = manifest
        .restore_file(|h| storage.load(h), dir.path().join("out"))
        .unwrap_err();
    assert!(matches!(err, CasError::Load { hash, .. } if hash == last.hash));
}

#[test]
fn test_configured_blake3_pipeline() {
    let config = ChunkingConfig::from_toml(
        r#"
min_size = 512
avg_size = 2048
max_size = 8192
hash_algorithm = "blake3"
gear_seed = 1234
"#,
    )
    .unwrap();

    let storage = MemoryStorage::with_memory_index().with_algorithm(config.algorithm().unwrap());
    let data = test_data(200 * 1024);

    let mut reader = config.reader(Cursor::new(&data)).unwrap();
    let mut manifest = Manifest::new("seeded.bin", data.len() as u64, config.hash_algorithm());
    while let Some((chunk, bytes)) = reader.next_chunk().unwrap() {
        storage.save(&chunk, bytes).unwrap();
        manifest.push(chunk);
    }

    assert_eq!(manifest.hash_algorithm, "blake3");
    assert!(manifest.chunks.iter().all(|c| c.size <= 8192));
    assert!(storage.verify_integrity().unwrap().is_clean());

    let mut out = Vec::new();
    manifest.reassemble(|h| storage.load(h), &mut out).unwrap();
    assert_eq!(out, data);
}

#[test]
fn test_writer_packs_unique_chunks() {
    // A file made of the same block four times over.
    let block = test_data(16 * 1024);
    let data = block.repeat(4);

    let storage = MemoryStorage::with_memory_index();
    let (manifest, _) = ingest(Cursor::new(&data), "blocks.bin", small_params(), 4096, &storage);

    let writer = ChunkWriter::with_memory_index(Vec::new());
    let mut offset = 0usize;
    for chunk in &manifest.chunks {
        writer
            .write_chunk(chunk, &data[offset..offset + chunk.size])
            .unwrap();
        offset += chunk.size;
    }

    let unique_bytes: usize = {
        let mut seen = std::collections::HashSet::new();
        manifest
            .chunks
            .iter()
            .filter(|c| seen.insert(c.hash))
            .map(|c| c.size)
            .sum()
    };
    let pack = writer.into_inner();
    assert_eq!(pack.len(), unique_bytes);
    assert!(pack.len() < data.len());
}
