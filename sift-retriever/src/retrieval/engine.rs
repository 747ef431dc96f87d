//! Retrieval engine that orchestrates ingestion, indexing and search.
//!
//! The engine is the only component callers talk to. It owns the document store,
//! the embedding provider, the change tracker and the in-memory vector index, and
//! keeps the store and the index in step.
//!
//! ## Pipeline Flow
//!
//! ```text
//! directory → ChangeTracker → Chunker → EmbeddingProvider (batched)
//!                                              ↓
//!                               DocumentStore + VectorIndex
//!                                              ↓
//! query → EmbeddingProvider → VectorIndex.search → DocumentStore → results
//! ```
//!
//! ## Concurrency
//!
//! The change tracker's mutex doubles as the writer gate: [`RetrievalEngine::ingest`]
//! and [`RetrievalEngine::rebuild_index`] hold it for their whole run, so at most
//! one of them is active. The index sits behind an `RwLock`; searches take the read
//! side and are only blocked while a single vector is appended or while a rebuilt
//! index is swapped in.
//!
//! ## Failure Handling
//!
//! - Storage errors abort the current call. Rows committed before the failure stay,
//!   and the next pass picks the file up where it stopped.
//! - A provider failure aborts only the batch in flight. The file's other batches
//!   are still stored, the file is reported in [`IngestReport::failures`], and the
//!   next pass embeds only the chunks that are still missing.
//! - Unreadable files are reported and skipped.
//! - A missing, corrupt or wrong-dimension index file opens as an empty index.
//! - If the index and the store drift apart (lost or corrupt index file, crash
//!   before the index was saved), [`RetrievalEngine::consistency`] reports it and
//!   [`RetrievalEngine::rebuild_index`] repairs it.

use serde::Serialize;
use sift_embed::EmbeddingProvider;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::RetrievalConfig;
use crate::error::{Result, RetrievalError};
use crate::persist::write_atomic;
use crate::retrieval::change_tracker::{ChangeTracker, modified_nanos};
use crate::retrieval::chunker::Chunker;
use crate::retrieval::vector_index::VectorIndex;
use crate::storage::sqlite_store::SqliteStore;
use crate::storage::{
    ChunkId, DocumentId, DocumentStore, DocumentSummary, StoreStats, encode_embedding,
};

/// Response returned by [`RetrievalEngine::generate_response`] when nothing matches.
pub const NO_RESULTS_RESPONSE: &str = "I couldn't find any relevant information for your query.";

/// Number of documents sampled for the chunk estimate in [`RetrievalEngine::stats`].
const STATS_SAMPLE_SIZE: usize = 100;

/// Outcome of one ingestion pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Candidate files found in the directory
    pub files_seen: usize,
    /// Files skipped because they did not change since the last pass
    pub files_skipped: usize,
    /// Files fully processed and recorded in the change tracker
    pub files_ingested: usize,
    pub documents_added: usize,
    pub chunks_added: usize,
    pub failures: Vec<IngestFailure>,
}

/// A file that could not be ingested
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestFailure {
    pub filename: String,
    pub reason: String,
}

/// A ranked chunk returned by [`RetrievalEngine::search`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub score: f32,
    pub chunk_id: ChunkId,
    pub document_id: DocumentId,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConsistencyStatus {
    /// Every stored chunk has exactly one indexed vector
    Consistent,
    /// Some stored chunks have no vector in the index
    IndexBehind,
    /// The index holds more vectors than there are stored chunks
    IndexAhead,
}

/// Comparison of stored chunks and indexed vectors
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsistencyReport {
    pub stored_chunks: usize,
    pub indexed_vectors: usize,
    pub status: ConsistencyStatus,
}

impl ConsistencyReport {
    fn new(stored_chunks: usize, indexed_vectors: usize) -> Self {
        let status = match indexed_vectors.cmp(&stored_chunks) {
            std::cmp::Ordering::Equal => ConsistencyStatus::Consistent,
            std::cmp::Ordering::Less => ConsistencyStatus::IndexBehind,
            std::cmp::Ordering::Greater => ConsistencyStatus::IndexAhead,
        };
        Self {
            stored_chunks,
            indexed_vectors,
            status,
        }
    }

    pub fn needs_rebuild(&self) -> bool {
        self.status != ConsistencyStatus::Consistent
    }
}

/// Store statistics plus index and provider details
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStats {
    pub store: StoreStats,
    pub indexed_vectors: usize,
    pub dimension: usize,
    pub provider: String,
    pub tracked_files: usize,
}

/// Orchestrates ingestion and query answering. See module docs.
pub struct RetrievalEngine {
    config: RetrievalConfig,
    store: Box<dyn DocumentStore>,
    provider: Box<dyn EmbeddingProvider>,
    chunker: Chunker,
    index: RwLock<VectorIndex>,
    tracker: Mutex<ChangeTracker>,
}

impl std::fmt::Debug for RetrievalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalEngine")
            .field("config", &self.config)
            .field("provider", &self.provider.name())
            .field("chunker", &self.chunker)
            .finish_non_exhaustive()
    }
}

impl RetrievalEngine {
    /// Open the SQLite store at `config.db_path` and build an engine on top of it.
    pub async fn open(
        config: RetrievalConfig,
        provider: Box<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let store = SqliteStore::open(&config.db_path).await?;
        Self::new(config, provider, Box::new(store)).await
    }

    /// Build an engine over any document store.
    ///
    /// Initializes the provider, loads the change tracker and loads the vector
    /// index. A missing, corrupt or wrong-dimension index file starts an empty
    /// index, leaving the store ahead until [`Self::rebuild_index`] runs.
    pub async fn new(
        config: RetrievalConfig,
        provider: Box<dyn EmbeddingProvider>,
        store: Box<dyn DocumentStore>,
    ) -> Result<Self> {
        provider.initialize().await?;
        let dimension = provider.dimension();

        let tracker = ChangeTracker::load(&config.processed_files_path).await?;
        let index = load_index(&config.index_path, dimension).await?;

        let stored_chunks = store.stats(0).await?.chunks;
        if stored_chunks != index.len() {
            warn!(
                "Vector index holds {} vectors but the store has {} chunks; run a rebuild",
                index.len(),
                stored_chunks
            );
        }

        info!(
            "Retrieval engine ready: provider {} (dimension {}), {} indexed vectors, {} tracked files",
            provider.name(),
            dimension,
            index.len(),
            tracker.len()
        );

        Ok(Self {
            chunker: Chunker::new(config.chunker_config()),
            config,
            store,
            provider,
            index: RwLock::new(index),
            tracker: Mutex::new(tracker),
        })
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    /// Ingest every new or modified document file directly inside `directory`.
    pub async fn ingest(&self, directory: impl AsRef<Path>) -> Result<IngestReport> {
        let directory = directory.as_ref();
        let mut tracker = self.tracker.lock().await;
        let mut report = IngestReport::default();

        let files = self.list_documents(directory).await?;
        info!(
            "Ingesting {} candidate files from {}",
            files.len(),
            directory.display()
        );

        for (filename, path) in files {
            report.files_seen += 1;

            let modified = match tokio::fs::metadata(&path)
                .await
                .map_err(RetrievalError::from)
                .and_then(|metadata| modified_nanos(&metadata))
            {
                Ok(modified) => modified,
                Err(e) => {
                    error!("Cannot stat {}: {}", path.display(), e);
                    report.failures.push(IngestFailure {
                        filename,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            if !tracker.should_process(&filename, modified) {
                debug!("Skipping unchanged file {}", filename);
                report.files_skipped += 1;
                continue;
            }

            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) => {
                    error!("Cannot read {}: {}", path.display(), e);
                    report.failures.push(IngestFailure {
                        filename,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let failures = self.process_document(&filename, &content, &mut report).await?;
            match failures.first() {
                None => {
                    tracker.record(&filename, modified);
                    tracker.persist().await?;
                    report.files_ingested += 1;
                }
                Some(first) => {
                    let reason = if failures.len() == 1 {
                        first.to_string()
                    } else {
                        format!("{} (and {} more failed batches)", first, failures.len() - 1)
                    };
                    report.failures.push(IngestFailure { filename, reason });
                }
            }
        }

        if self.index.read().await.is_dirty() {
            self.save_index().await?;
        }

        info!(
            "Ingestion finished: {} ingested, {} skipped, {} failed, {} chunks added",
            report.files_ingested,
            report.files_skipped,
            report.failures.len(),
            report.chunks_added
        );
        Ok(report)
    }

    /// Document files in `directory`, sorted by filename. A missing directory
    /// yields nothing.
    async fn list_documents(&self, directory: &Path) -> Result<Vec<(String, PathBuf)>> {
        let mut entries = match tokio::fs::read_dir(directory).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Document directory {} does not exist", directory.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !self.chunker.should_ingest(&path) {
                continue;
            }
            // follows symlinks, unlike DirEntry::file_type
            match tokio::fs::metadata(&path).await {
                Ok(metadata) if metadata.is_file() => {}
                Ok(_) => continue,
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            }
            match entry.file_name().into_string() {
                Ok(filename) => files.push((filename, path)),
                Err(name) => warn!("Skipping file with non UTF-8 name {:?}", name),
            }
        }
        files.sort();
        Ok(files)
    }

    /// Store one document and its chunks, appending each vector to the index.
    ///
    /// If the newest stored document for `filename` has the same content, it is
    /// reused and chunks already stored for it are skipped, so a retried file
    /// never duplicates rows. A failed batch does not stop the remaining ones.
    /// Returns the embedding failures, empty when the file is complete.
    async fn process_document(
        &self,
        filename: &str,
        content: &str,
        report: &mut IngestReport,
    ) -> Result<Vec<RetrievalError>> {
        let mut stored: HashMap<String, usize> = HashMap::new();
        let document_id = match self.store.latest_document(filename).await? {
            Some(existing) if existing.content == content => {
                for chunk in self.store.get_chunks_for_document(existing.id).await? {
                    *stored.entry(chunk.content).or_default() += 1;
                }
                debug!(
                    "Resuming document {} ({}) with {} stored chunks",
                    filename,
                    existing.id,
                    stored.values().sum::<usize>()
                );
                existing.id
            }
            _ => {
                let id = self.store.add_document(filename, content).await?;
                report.documents_added += 1;
                id
            }
        };

        let chunks: Vec<String> = self
            .chunker
            .split(content)
            .into_iter()
            .filter(|chunk| !chunk.trim().is_empty())
            .filter(|chunk| match stored.get_mut(chunk) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    false
                }
                _ => true,
            })
            .collect();
        debug!(
            "Document {} ({}) has {} chunks to embed",
            filename,
            document_id,
            chunks.len()
        );

        let mut failures = Vec::new();
        for batch in chunks.chunks(self.config.batch_size.get()) {
            match self.embed_batch(batch).await {
                Ok(embeddings) => {
                    for (chunk, embedding) in batch.iter().zip(&embeddings) {
                        let chunk_id = self
                            .store
                            .add_chunk(document_id, chunk, &encode_embedding(embedding))
                            .await?;
                        self.index
                            .write()
                            .await
                            .add([(chunk_id, embedding.as_slice())])?;
                        report.chunks_added += 1;
                    }
                    debug!("Stored batch of {} chunks for {}", batch.len(), filename);
                }
                Err(
                    e @ (RetrievalError::Embedding { .. }
                    | RetrievalError::DimensionMismatch { .. }),
                ) => {
                    error!(
                        "Failed to embed a batch of {} chunks from {}: {}",
                        batch.len(),
                        filename,
                        e
                    );
                    failures.push(e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(failures)
    }

    /// Embed one batch and check the provider kept its contract.
    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let embeddings = self.provider.encode(batch).await?;
        if embeddings.len() != batch.len() {
            return Err(sift_embed::EmbedError::CountMismatch {
                expected: batch.len(),
                actual: embeddings.len(),
            }
            .into());
        }
        let dimension = self.provider.dimension();
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dimension) {
            return Err(RetrievalError::DimensionMismatch {
                expected: dimension,
                actual: bad.len(),
            });
        }
        Ok(embeddings)
    }

    /// Replace the index with one rebuilt from every stored embedding.
    ///
    /// Returns the number of embeddings replayed.
    pub async fn rebuild_index(&self) -> Result<usize> {
        let _writer = self.tracker.lock().await;
        info!("Rebuilding vector index from stored embeddings");

        let mut fresh = VectorIndex::new(self.provider.dimension());
        let mut after: ChunkId = 0;
        let mut replayed = 0;
        loop {
            let page = self
                .store
                .chunks_with_embeddings_after(after, self.config.batch_size.get())
                .await?;
            let Some(last) = page.last() else {
                break;
            };
            after = last.id;

            fresh.add(
                page.iter()
                    .filter_map(|chunk| chunk.embedding.as_deref().map(|e| (chunk.id, e))),
            )?;
            replayed += page.len();
        }

        *self.index.write().await = fresh;
        self.save_index().await?;

        info!("Rebuilt vector index with {} embeddings", replayed);
        Ok(replayed)
    }

    /// Top `k` chunks most similar to `query`, best first.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        let normalized = query.trim().to_lowercase();
        if normalized.is_empty() || k == 0 || self.index.read().await.is_empty() {
            return Ok(Vec::new());
        }

        let embedding = self.provider.encode_one(&normalized).await?;
        let hits = self.index.read().await.search(&embedding, k)?;

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            match self.store.get_chunk(hit.chunk_id).await? {
                Some(chunk) => results.push(SearchResult {
                    score: hit.score,
                    chunk_id: chunk.id,
                    document_id: chunk.document_id,
                    content: chunk.content,
                }),
                None => debug!("Dropping hit for missing chunk {}", hit.chunk_id),
            }
        }
        Ok(results)
    }

    /// Human-readable answer built from the top `k` search results.
    pub async fn generate_response(&self, query: &str, k: usize) -> Result<String> {
        let results = self.search(query, k).await?;
        if results.is_empty() {
            return Ok(NO_RESULTS_RESPONSE.to_string());
        }

        let mut response = format!("Based on the query '{query}', here's what I found:\n");
        for (rank, result) in results.iter().enumerate() {
            response.push_str(&format!(
                "\n{}. [relevance {:.2}] {}\n",
                rank + 1,
                result.score,
                result.content
            ));
        }
        Ok(response)
    }

    pub async fn documents(&self) -> Result<Vec<DocumentSummary>> {
        self.store.get_all_documents().await
    }

    /// Compare the number of stored chunks with the number of indexed vectors.
    pub async fn consistency(&self) -> Result<ConsistencyReport> {
        let stored = self.store.stats(0).await?.chunks;
        let indexed = self.index.read().await.len();
        Ok(ConsistencyReport::new(stored, indexed))
    }

    pub async fn stats(&self) -> Result<EngineStats> {
        let store = self.store.stats(STATS_SAMPLE_SIZE).await?;
        let (indexed_vectors, dimension) = {
            let index = self.index.read().await;
            (index.len(), index.dimension())
        };
        Ok(EngineStats {
            store,
            indexed_vectors,
            dimension,
            provider: self.provider.name().to_string(),
            tracked_files: self.tracker.lock().await.len(),
        })
    }

    /// Persist the index and the change tracker, then close the store.
    pub async fn close(self) -> Result<()> {
        {
            let mut tracker = self.tracker.lock().await;
            if self.index.read().await.is_dirty() {
                self.save_index().await?;
            }
            tracker.persist().await?;
        }
        self.store.close().await;
        info!("Retrieval engine closed");
        Ok(())
    }

    /// Write the current index to disk. Callers hold the writer gate.
    async fn save_index(&self) -> Result<()> {
        let bytes = self.index.read().await.to_bytes();
        let path = self.config.index_path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes)).await??;
        self.index.write().await.mark_saved();
        debug!("Saved vector index to {}", self.config.index_path.display());
        Ok(())
    }
}

impl Drop for RetrievalEngine {
    fn drop(&mut self) {
        let index = self.index.get_mut();
        if index.is_dirty() {
            match index.save(&self.config.index_path) {
                Ok(()) => info!("Flushed unsaved vector index on drop"),
                Err(e) => warn!("Failed to flush vector index on drop: {}", e),
            }
        }

        let tracker = self.tracker.get_mut();
        if tracker.is_dirty() {
            match tracker.persist_blocking() {
                Ok(()) => info!("Flushed processed files record on drop"),
                Err(e) => warn!("Failed to flush processed files record on drop: {}", e),
            }
        }
    }
}

async fn load_index(path: &Path, dimension: usize) -> Result<VectorIndex> {
    let owned = path.to_path_buf();
    let loaded = tokio::task::spawn_blocking(move || VectorIndex::load(&owned)).await?;

    match loaded {
        Ok(index) if index.dimension() == dimension => {
            debug!("Loaded {} vectors from {}", index.len(), path.display());
            Ok(index)
        }
        Ok(index) => {
            warn!(
                "Vector index at {} has dimension {} but the provider produces {}; starting empty",
                path.display(),
                index.dimension(),
                dimension
            );
            Ok(VectorIndex::new(dimension))
        }
        Err(e) if e.is_not_found() => {
            info!("No vector index at {}, starting empty", path.display());
            Ok(VectorIndex::new(dimension))
        }
        Err(e @ RetrievalError::CorruptIndex { .. }) => {
            warn!("Ignoring unreadable vector index: {}; starting empty", e);
            Ok(VectorIndex::new(dimension))
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use sift_embed::HashingProvider;
    use std::num::NonZeroUsize;
    use tempfile::{TempDir, tempdir};
    use tracing_test::traced_test;

    fn test_config(state: &TempDir) -> RetrievalConfig {
        RetrievalConfig::default()
            .with_state_dir(state.path())
            .with_model_name("hashing")
            .with_hashing_dimension(64)
            .with_chunk_size(NonZeroUsize::new(2).unwrap())
            .with_batch_size(NonZeroUsize::new(2).unwrap())
    }

    async fn memory_engine(state: &TempDir) -> Result<RetrievalEngine> {
        let engine = RetrievalEngine::new(
            test_config(state),
            Box::new(HashingProvider::new(64)?),
            Box::new(SqliteStore::open_memory().await?),
        )
        .await?;
        Ok(engine)
    }

    #[traced_test]
    #[tokio::test]
    async fn test_ingest_skips_unchanged_files() -> Result<()> {
        let state = tempdir()?;
        let docs = tempdir()?;
        std::fs::write(
            docs.path().join("ai.txt"),
            "Artificial intelligence studies agents. Machine learning is part of it.",
        )?;
        std::fs::write(docs.path().join("notes.md"), "Not selected.")?;

        let engine = memory_engine(&state).await?;

        let first = engine.ingest(docs.path()).await?;
        assert_eq!(first.files_seen, 1);
        assert_eq!(first.files_ingested, 1);
        assert_eq!(first.documents_added, 1);
        assert_eq!(first.chunks_added, 1);

        let second = engine.ingest(docs.path()).await?;
        assert_eq!(second.files_skipped, 1);
        assert_eq!(second.documents_added, 0);
        assert!(logs_contain("Skipping unchanged file ai.txt"));
        Ok(())
    }

    #[tokio::test]
    async fn test_whitespace_chunks_are_dropped() -> Result<()> {
        let state = tempdir()?;
        let docs = tempdir()?;
        std::fs::write(docs.path().join("blank.txt"), "   \n\t ")?;

        let engine = memory_engine(&state).await?;
        let report = engine.ingest(docs.path()).await?;

        assert_eq!(report.documents_added, 1);
        assert_eq!(report.chunks_added, 0);
        assert_eq!(engine.consistency().await?.indexed_vectors, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_generate_response_format() -> Result<()> {
        let state = tempdir()?;
        let docs = tempdir()?;
        std::fs::write(
            docs.path().join("ml.txt"),
            "Machine learning is a subfield of artificial intelligence.",
        )?;

        let engine = memory_engine(&state).await?;
        assert_eq!(
            engine.generate_response("machine learning", 1).await?,
            NO_RESULTS_RESPONSE
        );

        engine.ingest(docs.path()).await?;
        let response = engine.generate_response("Machine Learning", 1).await?;
        assert!(response.starts_with("Based on the query 'Machine Learning'"));
        assert!(response.contains("Machine learning is a subfield of artificial intelligence."));
        assert!(response.contains("[relevance 0."));
        Ok(())
    }

    #[tokio::test]
    async fn test_blank_query_and_zero_k() -> Result<()> {
        let state = tempdir()?;
        let docs = tempdir()?;
        std::fs::write(docs.path().join("a.txt"), "Some content here.")?;

        let engine = memory_engine(&state).await?;
        engine.ingest(docs.path()).await?;

        assert!(engine.search("   ", 3).await?.is_empty());
        assert!(engine.search("content", 0).await?.is_empty());
        assert_eq!(engine.search("content", 3).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_stats_and_documents() -> Result<()> {
        let state = tempdir()?;
        let docs = tempdir()?;
        std::fs::write(docs.path().join("a.txt"), "One. Two. Three.")?;
        std::fs::write(docs.path().join("b.txt"), "Four.")?;

        let engine = memory_engine(&state).await?;
        engine.ingest(docs.path()).await?;

        let stats = engine.stats().await?;
        assert_eq!(stats.store.documents, 2);
        assert_eq!(stats.store.chunks, 3);
        assert_eq!(stats.indexed_vectors, 3);
        assert_eq!(stats.dimension, 64);
        assert_eq!(stats.provider, "hashing");
        assert_eq!(stats.tracked_files, 2);

        let names: Vec<String> = engine
            .documents()
            .await?
            .into_iter()
            .map(|d| d.filename)
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
        Ok(())
    }

    /// An index built for another dimension is ignored rather than blocking open
    #[traced_test]
    #[tokio::test]
    async fn test_wrong_dimension_index_starts_empty() -> Result<()> {
        let state = tempdir()?;
        let docs = tempdir()?;
        std::fs::write(docs.path().join("a.txt"), "Some content here.")?;
        let config = test_config(&state);
        VectorIndex::new(8).save(&config.index_path)?;

        let engine = memory_engine(&state).await?;
        assert!(logs_contain("has dimension 8 but the provider produces 64"));
        let stats = engine.stats().await?;
        assert_eq!(stats.indexed_vectors, 0);
        assert_eq!(stats.dimension, 64);

        engine.ingest(docs.path()).await?;
        assert_eq!(engine.search("content", 3).await?.len(), 1);
        engine.close().await?;
        assert_eq!(VectorIndex::load(&config.index_path)?.dimension(), 64);
        Ok(())
    }

    /// Touching a file without changing it stores nothing new
    #[tokio::test]
    async fn test_touched_file_reuses_stored_document() -> Result<()> {
        let state = tempdir()?;
        let docs = tempdir()?;
        let path = docs.path().join("a.txt");
        std::fs::write(&path, "One. Two. Three.")?;

        let engine = memory_engine(&state).await?;
        let first = engine.ingest(docs.path()).await?;
        assert_eq!(first.documents_added, 1);
        assert_eq!(first.chunks_added, 2);

        let later = std::time::SystemTime::now() + std::time::Duration::from_secs(60);
        std::fs::File::options()
            .write(true)
            .open(&path)?
            .set_modified(later)?;

        let second = engine.ingest(docs.path()).await?;
        assert_eq!(second.files_ingested, 1);
        assert_eq!(second.documents_added, 0);
        assert_eq!(second.chunks_added, 0);
        assert_eq!(engine.documents().await?.len(), 1);
        assert!(!engine.consistency().await?.needs_rebuild());
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinked_documents_are_ingested() -> Result<()> {
        let state = tempdir()?;
        let docs = tempdir()?;
        let elsewhere = tempdir()?;
        let target = elsewhere.path().join("shared.txt");
        std::fs::write(&target, "Linked content lives elsewhere.")?;
        std::os::unix::fs::symlink(&target, docs.path().join("linked.txt"))?;
        std::os::unix::fs::symlink(
            elsewhere.path().join("gone.txt"),
            docs.path().join("dangling.txt"),
        )?;

        let engine = memory_engine(&state).await?;
        let report = engine.ingest(docs.path()).await?;
        assert_eq!(report.files_seen, 1);
        assert_eq!(report.files_ingested, 1);
        assert!(report.failures.is_empty());
        assert_eq!(engine.documents().await?[0].filename, "linked.txt");
        Ok(())
    }

    #[tokio::test]
    async fn test_drop_flushes_tracker_and_index() -> Result<()> {
        let state = tempdir()?;
        let config = test_config(&state);

        {
            let engine = memory_engine(&state).await?;
            engine.tracker.lock().await.record("late.txt", 42);
            let vector = vec![0.0f32; 64];
            engine
                .index
                .write()
                .await
                .add([(1, vector.as_slice())])?;
        }

        let tracker = ChangeTracker::load(&config.processed_files_path).await?;
        assert_eq!(tracker.get("late.txt"), Some(42));
        assert_eq!(VectorIndex::load(&config.index_path)?.len(), 1);
        Ok(())
    }
}
