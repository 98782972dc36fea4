//! Reference scenarios for chunking, storage, manifests and the index.

use std::fs;
use std::io::Cursor;
use std::sync::Arc;

use tessera_cas::{ChunkReader, Chunker, HashAlgorithm, Params};
use tessera_integration_tests::{ingest, test_data};
use tessera_store::{
    ChunkIndex, ChunkStorage, ChunkWriter, FileStorage, JsonIndex, MemoryIndex, StoreError,
};
use tessera_types::Chunk;

#[test]
fn test_repeated_bytes_stay_within_bounds() {
    let data = vec![0xABu8; 1000];
    let chunker = Chunker::new(Params::new(50, 100, 200, None));

    let sizes: Vec<usize> = chunker.split(&data).map(<[u8]>::len).collect();
    assert_eq!(sizes.iter().sum::<usize>(), 1000);
    for size in &sizes {
        assert!((50..=200).contains(size), "chunk of {size} bytes");
    }

    // The stream reader cuts the same way until the source runs dry, then
    // flushes what is left as one chunk.
    let mut reader = ChunkReader::new(Cursor::new(&data), "sha256", 200, chunker).unwrap();
    let mut streamed = Vec::new();
    while let Some((chunk, _)) = reader.next_chunk().unwrap() {
        streamed.push(chunk.size);
    }
    let (tail, live) = streamed.split_last().unwrap();
    assert_eq!(live, &sizes[..live.len()]);
    assert!(*tail <= 200);
    assert_eq!(live.iter().sum::<usize>() + tail, 1000);
}

#[test]
fn test_short_text_verifies_against_file_storage() {
    let text = b"The quick brown fox jumps over the lazy dog.";
    assert_eq!(text.len(), 44);

    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::with_memory_index(dir.path()).unwrap();
    let (manifest, _) = ingest(
        Cursor::new(&text[..]),
        "fox.txt",
        Params::new(5, 10, 20, None),
        16,
        &storage,
    );

    assert_eq!(manifest.file_size, 44);
    assert!(manifest.chunks.iter().all(|c| c.size <= 16));
    manifest.verify_file(|h| storage.load(h)).unwrap();

    let mut out = Vec::new();
    manifest.reassemble(|h| storage.load(h), &mut out).unwrap();
    assert_eq!(out, text);
}

#[test]
fn test_double_save_keeps_one_blob() {
    let data = b"fifteen bytes!!";
    assert_eq!(data.len(), 15);
    let chunk = Chunk::from_data(0, data, HashAlgorithm::Sha256);

    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::with_memory_index(dir.path()).unwrap();
    storage.save(&chunk, data).unwrap();
    storage.save(&chunk, data).unwrap();

    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    assert_eq!(storage.load(&chunk.hash).unwrap().as_ref(), data);
    assert_eq!(storage.load(&chunk.hash).unwrap().as_ref(), data);
}

#[test]
fn test_malformed_index_document_fails_to_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.json");
    fs::write(&path, "{\"abc\": [1, 2").unwrap();

    match JsonIndex::open(&path) {
        Err(StoreError::Parse { path: p, .. }) => assert_eq!(p, path),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(index) => panic!("opened with {} entries", index.len()),
    }
}

#[test]
fn test_identical_content_is_written_once() {
    let writer = ChunkWriter::new(Vec::new(), Arc::new(MemoryIndex::new()));
    let a = Chunk::from_data(0, b"same content", HashAlgorithm::Sha256);
    let b = Chunk::from_data(512, b"same content", HashAlgorithm::Sha256);

    writer.write_chunk(&a, b"same content").unwrap();
    let len_after_first = writer.bytes_written();
    let second = writer.write_chunk(&b, b"same content").unwrap();

    assert!(second.duplicate);
    assert_eq!(second.written, 0);
    assert_eq!(writer.bytes_written(), len_after_first);
}

#[test]
fn test_index_entries_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.json");
    let data = test_data(20_000);
    let chunker = Chunker::new(Params::new(64, 256, 1024, None));

    let index = JsonIndex::open(&path).unwrap();
    let mut added = Vec::new();
    let mut offset = 0u64;
    for (i, part) in chunker.split(&data).enumerate() {
        let chunk = Chunk::from_data(offset, part, HashAlgorithm::Sha256);
        index.add(chunk).unwrap();
        added.push(chunk.hash);
        offset += part.len() as u64;

        // Every prefix of adds is durable on its own.
        if i % 10 == 0 {
            let fresh = JsonIndex::open(&path).unwrap();
            assert!(added.iter().all(|h| fresh.exists(h)));
        }
    }

    let fresh = JsonIndex::open(&path).unwrap();
    assert_eq!(fresh.len(), index.len());
    assert!(added.iter().all(|h| fresh.exists(h)));
}
