//! Object chunking and hashing.
//!
//! Splits an object file into fixed-size chunks and computes SHA-256 hashes
//! for every chunk and for the whole file in a single pass.
//!
//! # Guarantees
//!
//! - Chunk numbers start at zero and are contiguous
//! - A chunk is never empty; end of stream is signalled by `None`
//! - Working memory is bounded by the chunk size, whatever the file size
//! - An empty file yields zero chunks and the hash of the empty byte string

use std::fs::File;
use std::io::{self, Read};
use std::num::NonZeroUsize;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::UhuError;

/// Upper bound on the buffer reserved before a chunk is read.
const READ_RESERVE: usize = 64 * 1024;

/// Number of bytes read into each chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkSize(NonZeroUsize);

impl ChunkSize {
    /// Create a chunk size, rejecting zero.
    pub fn new(bytes: usize) -> Result<Self, UhuError> {
        NonZeroUsize::new(bytes)
            .map(Self)
            .ok_or_else(|| UhuError::InvalidChunkSize("chunk size must be greater than zero".into()))
    }

    /// Size in bytes.
    pub fn get(self) -> usize {
        self.0.get()
    }
}

impl FromStr for ChunkSize {
    type Err = UhuError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s
            .trim()
            .parse::<usize>()
            .map_err(|e| UhuError::InvalidChunkSize(format!("{s:?}: {e}")))?;
        Self::new(bytes)
    }
}

impl std::fmt::Display for ChunkSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A non-empty window of an object file.
#[derive(Debug, Clone)]
pub struct Chunk {
    data: Vec<u8>,
    number: u64,
    sha256sum: [u8; 32],
}

impl Chunk {
    /// Returns `None` for empty data: an empty read ends the stream.
    fn new(data: Vec<u8>, number: u64) -> Option<Self> {
        if data.is_empty() {
            return None;
        }
        let sha256sum = Sha256::digest(&data).into();
        Some(Self {
            data,
            number,
            sha256sum,
        })
    }

    /// Raw chunk bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Zero-based position of the chunk in its file.
    pub fn number(&self) -> u64 {
        self.number
    }

    /// SHA-256 of the chunk bytes.
    pub fn sha256sum(&self) -> &[u8; 32] {
        &self.sha256sum
    }

    /// Hash and number, without the data.
    pub fn descriptor(&self) -> ChunkDescriptor {
        ChunkDescriptor {
            sha256sum: hex::encode(self.sha256sum),
            number: self.number,
        }
    }
}

/// Serialized form of a chunk inside an object upload descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkDescriptor {
    /// Hex-encoded SHA-256 of the chunk
    pub sha256sum: String,
    /// Zero-based chunk number
    pub number: u64,
}

/// Lazy chunk sequence over any reader.
///
/// Every window is filled up to the chunk size unless end of file is
/// reached first, so short reads from the underlying reader never split a
/// chunk. The whole-stream hash is updated as chunks are produced and is
/// available from [`ChunkReader::finish`].
pub struct ChunkReader<R> {
    reader: R,
    chunk_size: ChunkSize,
    next_number: u64,
    hasher: Sha256,
    done: bool,
}

impl<R: Read> ChunkReader<R> {
    pub fn new(reader: R, chunk_size: ChunkSize) -> Self {
        Self {
            reader,
            chunk_size,
            next_number: 0,
            hasher: Sha256::new(),
            done: false,
        }
    }

    fn read_window(&mut self) -> io::Result<Vec<u8>> {
        let limit = self.chunk_size.get();
        let mut data = Vec::with_capacity(limit.min(READ_RESERVE));
        (&mut self.reader).take(limit as u64).read_to_end(&mut data)?;
        Ok(data)
    }

    /// SHA-256 over every byte consumed so far.
    pub fn finish(self) -> [u8; 32] {
        self.hasher.finalize().into()
    }
}

impl ChunkReader<File> {
    /// Open a file for chunking. Each call starts a fresh sequence.
    pub fn open(path: &Path, chunk_size: ChunkSize) -> Result<Self, UhuError> {
        let file = File::open(path).map_err(|source| UhuError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(file, chunk_size))
    }
}

impl<R: Read> Iterator for ChunkReader<R> {
    type Item = io::Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let data = match self.read_window() {
            Ok(data) => data,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        if data.len() < self.chunk_size.get() {
            self.done = true;
        }

        self.hasher.update(&data);
        let chunk = Chunk::new(data, self.next_number)?;
        self.next_number += 1;
        Some(Ok(chunk))
    }
}

/// Size, whole-file hash, and chunk list of a loaded object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    /// File size in bytes
    pub size: u64,
    /// SHA-256 of the whole file
    pub sha256sum: [u8; 32],
    /// Ordered chunk descriptors
    pub chunks: Vec<ChunkDescriptor>,
}

impl FileDigest {
    /// Read `path` once and compute its digest.
    ///
    /// # Errors
    ///
    /// Returns [`UhuError::Unreadable`] if the file cannot be opened or a
    /// read fails midway. The handle is closed on every path.
    pub fn compute(path: &Path, chunk_size: ChunkSize) -> Result<Self, UhuError> {
        let unreadable = |source| UhuError::Unreadable {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = ChunkReader::open(path, chunk_size)?;
        let mut size = 0u64;
        let mut chunks = Vec::new();
        for chunk in reader.by_ref() {
            let chunk = chunk.map_err(unreadable)?;
            size += chunk.data().len() as u64;
            chunks.push(chunk.descriptor());
        }
        let sha256sum = reader.finish();

        tracing::debug!(
            path = %path.display(),
            size,
            chunks = chunks.len(),
            sha256sum = %hex::encode(sha256sum),
            "Object digest computed"
        );

        Ok(Self {
            size,
            sha256sum,
            chunks,
        })
    }

    /// Hex-encoded whole-file hash.
    pub fn hex_sha256sum(&self) -> String {
        hex::encode(self.sha256sum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    /// Reader that hands out at most one byte per call.
    struct Trickle(Cursor<Vec<u8>>);

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let end = buf.len().min(1);
            self.0.read(&mut buf[..end])
        }
    }

    fn size(bytes: usize) -> ChunkSize {
        ChunkSize::new(bytes).unwrap()
    }

    #[test]
    fn test_chunk_size_rejects_zero() {
        assert!(ChunkSize::new(0).is_err());
        assert!("0".parse::<ChunkSize>().is_err());
        assert!("abc".parse::<ChunkSize>().is_err());
        assert_eq!("4096".parse::<ChunkSize>().unwrap().get(), 4096);
    }

    #[test]
    fn test_empty_stream_has_no_chunks() {
        let mut reader = ChunkReader::new(Cursor::new(Vec::new()), size(4));
        assert!(reader.next().is_none());
        assert!(reader.next().is_none());
        assert_eq!(hex::encode(reader.finish()), EMPTY_SHA256);
    }

    #[test]
    fn test_exact_multiple() {
        let reader = ChunkReader::new(Cursor::new(b"aaaabbbb".to_vec()), size(4));
        let chunks: Vec<Chunk> = reader.map(|c| c.unwrap()).collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].data(), b"aaaa");
        assert_eq!(chunks[1].data(), b"bbbb");
        assert_eq!(chunks[1].number(), 1);
    }

    #[test]
    fn test_short_tail() {
        let reader = ChunkReader::new(Cursor::new(b"aaaabbbbc".to_vec()), size(4));
        let chunks: Vec<Chunk> = reader.map(|c| c.unwrap()).collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].data(), b"c");
        assert_eq!(
            chunks.iter().map(Chunk::number).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_short_reads_do_not_split_chunks() {
        let reader = ChunkReader::new(Trickle(Cursor::new(b"0123456789".to_vec())), size(4));
        let lens: Vec<usize> = reader.map(|c| c.unwrap().data().len()).collect();
        assert_eq!(lens, vec![4, 4, 2]);
    }

    #[test]
    fn test_huge_chunk_size_on_small_input() {
        let mut reader = ChunkReader::new(Cursor::new(b"abc".to_vec()), size(usize::MAX / 2));
        let chunk = reader.next().unwrap().unwrap();
        assert_eq!(chunk.data(), b"abc");
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_chunk_hash() {
        let mut reader = ChunkReader::new(Cursor::new(b"abc".to_vec()), size(16));
        let chunk = reader.next().unwrap().unwrap();
        assert_eq!(
            chunk.descriptor().sha256sum,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        // A single chunk covering the whole stream hashes like the stream.
        assert_eq!(hex::encode(reader.finish()), chunk.descriptor().sha256sum);
    }

    #[test]
    fn test_file_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.bin");
        std::fs::write(&path, vec![7u8; 10]).unwrap();

        let digest = FileDigest::compute(&path, size(3)).unwrap();
        assert_eq!(digest.size, 10);
        assert_eq!(digest.chunks.len(), 4);
        let expected: [u8; 32] = Sha256::digest(vec![7u8; 10]).into();
        assert_eq!(digest.sha256sum, expected);
    }

    #[test]
    fn test_empty_file_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty");
        std::fs::write(&path, b"").unwrap();

        let digest = FileDigest::compute(&path, size(3)).unwrap();
        assert_eq!(digest.size, 0);
        assert!(digest.chunks.is_empty());
        assert_eq!(digest.hex_sha256sum(), EMPTY_SHA256);
    }

    #[test]
    fn test_unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileDigest::compute(&dir.path().join("missing"), size(3)).unwrap_err();
        assert!(matches!(err, UhuError::Unreadable { .. }));
    }
}
