//! Concurrent saves and writes against shared stores.

use std::fs;
use std::io::Cursor;
use std::sync::Arc;
use std::thread;

use tessera_cas::{ChunkReader, Chunker, HashAlgorithm};
use tessera_integration_tests::{small_params, test_data, test_data_seeded};
use tessera_store::{
    ChunkIndex, ChunkStorage, ChunkWriter, FileStorage, JsonIndex, MemoryIndex, MemoryStorage,
};
use tessera_types::Chunk;

const THREADS: usize = 8;

fn chunks_of(data: &[u8]) -> Vec<(Chunk, Vec<u8>)> {
    let mut offset = 0u64;
    Chunker::new(small_params())
        .split(data)
        .map(|part| {
            let chunk = Chunk::from_data(offset, part, HashAlgorithm::Sha256);
            offset += part.len() as u64;
            (chunk, part.to_vec())
        })
        .collect()
}

fn count_fresh<S: ChunkStorage>(storage: &S, chunks: &[(Chunk, Vec<u8>)]) -> usize {
    chunks
        .iter()
        .filter(|(chunk, data)| storage.save(chunk, data).unwrap())
        .count()
}

#[test]
fn test_racing_file_saves_write_each_blob_once() {
    let dir = tempfile::tempdir().unwrap();
    let index = Arc::new(JsonIndex::open(dir.path().join("index.json")).unwrap());
    let storage = Arc::new(FileStorage::new(dir.path().join("blobs"), index).unwrap());
    let chunks = chunks_of(&test_data(24 * 1024));

    let fresh: usize = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| s.spawn(|| count_fresh(storage.as_ref(), &chunks)))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });

    assert_eq!(fresh, chunks.len());
    assert_eq!(
        fs::read_dir(dir.path().join("blobs")).unwrap().count(),
        chunks.len()
    );
    for (chunk, data) in &chunks {
        assert_eq!(storage.load(&chunk.hash).unwrap().as_ref(), data.as_slice());
    }

    let reopened = JsonIndex::open(dir.path().join("index.json")).unwrap();
    assert_eq!(reopened.len(), chunks.len());
}

#[test]
fn test_racing_memory_saves_write_each_blob_once() {
    let storage = MemoryStorage::with_memory_index();
    let chunks = chunks_of(&test_data(64 * 1024));

    let fresh: usize = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| s.spawn(|| count_fresh(&storage, &chunks)))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });

    assert_eq!(fresh, chunks.len());
    assert_eq!(storage.index().len(), chunks.len());
    let total: usize = chunks.iter().map(|(c, _)| c.size).sum();
    assert_eq!(storage.used_bytes(), total as u64);
}

#[test]
fn test_shared_writer_emits_each_chunk_once() {
    let writer = ChunkWriter::new(Vec::new(), Arc::new(MemoryIndex::new()));
    let chunks = chunks_of(&test_data(48 * 1024));

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                for (chunk, data) in &chunks {
                    writer.write_chunk(chunk, data).unwrap();
                }
            });
        }
    });

    let total: usize = chunks.iter().map(|(c, _)| c.size).sum();
    assert_eq!(writer.bytes_written(), total as u64);
    assert_eq!(writer.index().len(), chunks.len());
    assert_eq!(writer.into_inner().len(), total);
}

#[test]
fn test_independent_readers_feed_one_store() {
    let storage = MemoryStorage::with_memory_index();
    let files: Vec<Vec<u8>> = (0..4u32)
        .map(|seed| test_data_seeded(32 * 1024, seed))
        .collect();

    let streamed: Vec<Vec<(Chunk, Vec<u8>)>> = thread::scope(|s| {
        let handles: Vec<_> = files
            .iter()
            .map(|file| {
                let storage = &storage;
                s.spawn(move || {
                    let chunker = Chunker::new(small_params());
                    let mut reader =
                        ChunkReader::new(Cursor::new(file), "sha256", 4096, chunker).unwrap();
                    let mut chunks = Vec::new();
                    while let Some((chunk, data)) = reader.next_chunk().unwrap() {
                        storage.save(&chunk, data).unwrap();
                        chunks.push((chunk, data.to_vec()));
                    }
                    assert_eq!(reader.offset(), file.len() as u64);
                    chunks
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for (file, chunks) in files.iter().zip(&streamed) {
        let joined: Vec<u8> = chunks.iter().flat_map(|(_, d)| d.iter().copied()).collect();
        assert_eq!(&joined, file);
        for (chunk, data) in chunks {
            assert_eq!(storage.load(&chunk.hash).unwrap().as_ref(), data.as_slice());
        }
    }
}
