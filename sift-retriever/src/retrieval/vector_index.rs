//! Exact inner-product vector index with explicit chunk ids.
//!
//! Vectors are stored contiguously in insertion order next to a parallel array of
//! chunk ids, so a search hit resolves to its chunk without any positional
//! arithmetic. Search is a brute-force scan; with unit-norm inputs the score is
//! the cosine similarity.
//!
//! ## File format
//!
//! All integers and floats are little-endian.
//!
//! ```text
//! magic    8 bytes  "SIFTVIDX"
//! version  u32
//! dim      u32
//! count    u64
//! ids      count x i64
//! vectors  count x dim x f32
//! checksum 32 bytes, blake3 of everything above
//! ```

use std::cmp::Ordering;
use std::path::Path;

use crate::error::{Result, RetrievalError};
use crate::persist::write_atomic;
use crate::storage::ChunkId;

const MAGIC: &[u8; 8] = b"SIFTVIDX";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 8 + 4 + 4 + 8;
const CHECKSUM_LEN: usize = blake3::OUT_LEN;

/// One nearest-neighbor match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub score: f32,
    /// Zero-based insertion position in the index
    pub position: usize,
    pub chunk_id: ChunkId,
}

#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimension: usize,
    ids: Vec<ChunkId>,
    vectors: Vec<f32>,
    dirty: bool,
}

impl VectorIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            ids: Vec::new(),
            vectors: Vec::new(),
            dirty: false,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Whether vectors were added since the index was created, loaded or saved
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }

    pub fn chunk_id_at(&self, position: usize) -> Option<ChunkId> {
        self.ids.get(position).copied()
    }

    /// Append `(chunk_id, vector)` pairs in order.
    ///
    /// Every vector is checked before anything is appended, so a dimension
    /// mismatch leaves the index unchanged.
    pub fn add<'a, I>(&mut self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (ChunkId, &'a [f32])>,
    {
        let entries: Vec<(ChunkId, &[f32])> = entries.into_iter().collect();
        if let Some((_, bad)) = entries.iter().find(|(_, v)| v.len() != self.dimension) {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.len(),
            });
        }

        self.ids.reserve(entries.len());
        self.vectors.reserve(entries.len() * self.dimension);
        for (chunk_id, vector) in entries {
            self.ids.push(chunk_id);
            self.vectors.extend_from_slice(vector);
        }
        self.dirty = true;
        Ok(())
    }

    /// Top `k` vectors by inner product with `query`, best first.
    ///
    /// Ties keep insertion order. Returns fewer than `k` hits when the index is
    /// smaller than `k`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dimension {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<SearchHit> = self
            .vectors
            .chunks_exact(self.dimension)
            .zip(&self.ids)
            .enumerate()
            .map(|(position, (vector, &chunk_id))| SearchHit {
                score: dot(query, vector),
                position,
                chunk_id,
            })
            .collect();

        hits.sort_by(compare_hits);
        hits.truncate(k);
        Ok(hits)
    }

    /// Serialize to the on-disk format described in the module docs.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(
            HEADER_LEN + self.ids.len() * 8 + self.vectors.len() * 4 + CHECKSUM_LEN,
        );
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        bytes.extend_from_slice(&(self.ids.len() as u64).to_le_bytes());
        for id in &self.ids {
            bytes.extend_from_slice(&id.to_le_bytes());
        }
        for value in &self.vectors {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        let checksum = blake3::hash(&bytes);
        bytes.extend_from_slice(checksum.as_bytes());
        bytes
    }

    /// Parse bytes produced by [`to_bytes`](Self::to_bytes). `path` is only used
    /// in error messages.
    pub fn from_bytes(path: &Path, bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN + CHECKSUM_LEN {
            return Err(RetrievalError::corrupt_index(path, "file is truncated"));
        }

        let (body, checksum) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
        if blake3::hash(body).as_bytes() != checksum {
            return Err(RetrievalError::corrupt_index(path, "checksum mismatch"));
        }
        if &body[..8] != MAGIC {
            return Err(RetrievalError::corrupt_index(path, "not a vector index file"));
        }

        let version = u32::from_le_bytes(read_array(&body[8..12]));
        if version != FORMAT_VERSION {
            return Err(RetrievalError::corrupt_index(
                path,
                format!("unsupported format version {version}"),
            ));
        }
        let dimension = u32::from_le_bytes(read_array(&body[12..16])) as usize;
        let count = u64::from_le_bytes(read_array(&body[16..24]));

        let count = usize::try_from(count)
            .map_err(|_| RetrievalError::corrupt_index(path, "entry count out of range"))?;
        let expected_len = count
            .checked_mul(8)
            .and_then(|ids| {
                count
                    .checked_mul(dimension)
                    .and_then(|n| n.checked_mul(4))
                    .and_then(|vectors| ids.checked_add(vectors))
            })
            .and_then(|payload| payload.checked_add(HEADER_LEN));
        if expected_len != Some(body.len()) {
            return Err(RetrievalError::corrupt_index(
                path,
                "length does not match header",
            ));
        }

        let (id_bytes, vector_bytes) = body[HEADER_LEN..].split_at(count * 8);
        let ids = id_bytes
            .chunks_exact(8)
            .map(|b| i64::from_le_bytes(read_array(b)))
            .collect();
        let vectors = vector_bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes(read_array(b)))
            .collect();

        Ok(Self {
            dimension,
            ids,
            vectors,
            dirty: false,
        })
    }

    /// Atomically write the index to `path`.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        write_atomic(path, &self.to_bytes())?;
        self.dirty = false;
        Ok(())
    }

    /// Read an index from `path`. A missing file is [`RetrievalError::NotFound`].
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read(path) {
            Ok(bytes) => Self::from_bytes(path, &bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RetrievalError::NotFound {
                path: path.to_path_buf(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn compare_hits(a: &SearchHit, b: &SearchHit) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.position.cmp(&b.position))
}

fn read_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}
