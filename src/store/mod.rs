
pub mod index;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::embeddings::Embedder;
use crate::{RagError, Result};
use index::{FlatIndex, normalize_l2, normalize_l2_batch};

const INDEX_FILE: &str = "index.bin";
const METADATA_FILE: &str = "metadata.json";

/// Provenance of a chunk within its source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
    pub page: u32,
    pub chunk_index: usize,
}

/// A unit of retrievable text produced by the ingestion pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Persisted form of a chunk. The embedding itself lives only in the index;
/// the record at log position `i` corresponds to the vector at index
/// position `i`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedRecord {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    pub indexed_at: DateTime<Utc>,
}

/// A single retrieval hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub text: String,
    pub metadata: ChunkMetadata,
    pub score: f32,
}

/// Read-only snapshot of store contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub collection_name: String,
    pub total_documents: usize,
    pub total_chunks: usize,
}

struct StoreState {
    index: Option<FlatIndex>,
    records: Vec<IndexedRecord>,
}

/// Authoritative store of all indexed chunks and sole owner of the on-disk
/// index blob + metadata log pair.
///
/// Mutating operations (add, delete, reset) hold the write lock for their
/// full duration, including embedding and persistence, so they are serialized
/// with each other. Queries and stats take the read lock and may run
/// concurrently.
pub struct VectorStore {
    embedder: Arc<dyn Embedder>,
    state: RwLock<StoreState>,
    index_path: PathBuf,
    meta_path: PathBuf,
    collection_name: String,
    default_top_k: usize,
}

impl VectorStore {
    /// Open (or initialize) a store under `store_dir`, reloading any
    /// persisted artifacts. Unreadable or inconsistent artifacts degrade to
    /// an empty store with a warning; startup never fails on them.
    #[inline]
    pub fn open(
        store_dir: PathBuf,
        collection_name: String,
        default_top_k: usize,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        fs::create_dir_all(&store_dir)?;

        let store = Self {
            embedder,
            state: RwLock::new(StoreState {
                index: None,
                records: Vec::new(),
            }),
            index_path: store_dir.join(INDEX_FILE),
            meta_path: store_dir.join(METADATA_FILE),
            collection_name,
            default_top_k,
        };
        store.load()?;
        Ok(store)
    }

    fn load(&self) -> Result<()> {
        let mut state = self.write_state()?;

        if !self.index_path.exists() || !self.meta_path.exists() {
            debug!("No persisted index found, starting empty");
            return Ok(());
        }

        let loaded = Self::read_artifacts(&self.index_path, &self.meta_path);
        match loaded {
            Ok((index, records)) => {
                if index.len() != records.len() {
                    warn!(
                        "Persisted index has {} vectors but metadata log has {} records, starting empty",
                        index.len(),
                        records.len()
                    );
                    return Ok(());
                }
                info!("Loaded index with {} vectors", index.len());
                state.index = Some(index);
                state.records = records;
            }
            Err(e) => {
                warn!("Failed to load persisted index: {}", e);
            }
        }

        Ok(())
    }

    fn read_artifacts(
        index_path: &PathBuf,
        meta_path: &PathBuf,
    ) -> Result<(FlatIndex, Vec<IndexedRecord>)> {
        let index_bytes = fs::read(index_path)?;
        let index: FlatIndex = bincode::deserialize(&index_bytes)
            .map_err(|e| RagError::Store(format!("Corrupt index blob: {}", e)))?;

        let meta_bytes = fs::read(meta_path)?;
        let records: Vec<IndexedRecord> = serde_json::from_slice(&meta_bytes)
            .map_err(|e| RagError::Store(format!("Corrupt metadata log: {}", e)))?;

        Ok((index, records))
    }

    /// Persist both artifacts. Called only while holding the write lock so
    /// persistence never interleaves with another mutation.
    fn persist(&self, state: &StoreState) -> Result<()> {
        let Some(index) = &state.index else {
            return Ok(());
        };

        let index_bytes = bincode::serialize(index)
            .map_err(|e| RagError::Store(format!("Failed to serialize index: {}", e)))?;
        fs::write(&self.index_path, index_bytes)?;

        let meta_bytes = serde_json::to_vec(&state.records)
            .map_err(|e| RagError::Store(format!("Failed to serialize metadata log: {}", e)))?;
        fs::write(&self.meta_path, meta_bytes)?;

        debug!("Persisted {} vectors to disk", index.len());
        Ok(())
    }

    fn remove_artifacts(&self) {
        for path in [&self.index_path, &self.meta_path] {
            if path.exists() {
                if let Err(e) = fs::remove_file(path) {
                    warn!("Failed to remove {}: {}", path.display(), e);
                }
            }
        }
    }

    /// Embed and index a batch of chunks.
    ///
    /// Either every chunk is added and persisted, or none are: the index and
    /// the metadata log are updated together under the write lock and only
    /// then written to disk.
    #[inline]
    pub fn add_chunks(&self, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let mut state = self.write_state()?;

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let mut vectors = self.embedder.embed_batch(&texts)?;
        normalize_l2_batch(&mut vectors);

        let dimension = vectors
            .first()
            .map(Vec::len)
            .ok_or_else(|| RagError::Embedding("Embedder returned no vectors".to_string()))?;

        let index = state.index.get_or_insert_with(|| {
            info!("Creating new flat index with dimension {}", dimension);
            FlatIndex::new(dimension)
        });
        index.add(&vectors)?;

        let now = Utc::now();
        for chunk in chunks {
            state.records.push(IndexedRecord {
                id: Uuid::new_v4().to_string(),
                text: chunk.text.clone(),
                metadata: chunk.metadata.clone(),
                indexed_at: now,
            });
        }

        self.persist(&state)?;

        info!("Added {} chunks to vector store", chunks.len());
        Ok(chunks.len())
    }

    /// Retrieve the `k` most similar chunks for a question.
    ///
    /// An empty or uninitialized store yields an empty result, not an error.
    /// `k` defaults to the configured top-K and is clamped to the current
    /// vector count. Index positions without a matching record are skipped.
    #[inline]
    pub fn query(&self, question: &str, k: Option<usize>) -> Result<Vec<QueryResult>> {
        {
            let state = self.read_state()?;
            if state.index.as_ref().is_none_or(FlatIndex::is_empty) {
                warn!("Vector store is empty, no results to return");
                return Ok(Vec::new());
            }
        }

        let mut query_vector = self.embedder.embed_one(question)?;
        normalize_l2(&mut query_vector);

        let state = self.read_state()?;
        let Some(index) = &state.index else {
            return Ok(Vec::new());
        };

        let k = k.unwrap_or(self.default_top_k).min(index.len());
        let hits = index.search(&query_vector, k)?;

        let results: Vec<QueryResult> = hits
            .into_iter()
            .filter_map(|(position, score)| {
                state.records.get(position).map(|record| QueryResult {
                    text: record.text.clone(),
                    metadata: record.metadata.clone(),
                    score,
                })
            })
            .collect();

        info!(
            "Query returned {} results for: '{}'",
            results.len(),
            question.chars().take(50).collect::<String>()
        );
        Ok(results)
    }

    /// Sorted, de-duplicated source identifiers across all records.
    #[inline]
    pub fn list_sources(&self) -> Result<Vec<String>> {
        let state = self.read_state()?;
        let sources: BTreeSet<String> = state
            .records
            .iter()
            .map(|r| r.metadata.source.clone())
            .filter(|s| !s.is_empty())
            .collect();
        Ok(sources.into_iter().collect())
    }

    /// Remove every record whose source equals `source`.
    ///
    /// Returns false (and changes nothing) when no record matches. When the
    /// deletion empties the store this is equivalent to a reset; otherwise
    /// all surviving texts are re-embedded and a fresh index is built, since
    /// the flat index has no in-place delete. This costs O(remaining) in
    /// embedding work, an accepted trade-off for a simple index format.
    #[inline]
    pub fn delete_by_source(&self, source: &str) -> Result<bool> {
        let mut state = self.write_state()?;

        let survivors: Vec<IndexedRecord> = state
            .records
            .iter()
            .filter(|r| r.metadata.source != source)
            .cloned()
            .collect();

        if survivors.len() == state.records.len() {
            return Ok(false);
        }

        if survivors.is_empty() {
            self.clear(&mut state);
            info!("Document '{}' deleted, store is now empty", source);
            return Ok(true);
        }

        let texts: Vec<String> = survivors.iter().map(|r| r.text.clone()).collect();
        let mut vectors = self.embedder.embed_batch(&texts)?;
        normalize_l2_batch(&mut vectors);

        let dimension = vectors
            .first()
            .map(Vec::len)
            .ok_or_else(|| RagError::Embedding("Embedder returned no vectors".to_string()))?;
        let mut index = FlatIndex::new(dimension);
        index.add(&vectors)?;

        state.index = Some(index);
        state.records = survivors;
        self.persist(&state)?;

        info!("Document '{}' deleted from vector store", source);
        Ok(true)
    }

    /// Drop the index and metadata log, in memory and on disk.
    #[inline]
    pub fn reset(&self) -> Result<()> {
        let mut state = self.write_state()?;
        self.clear(&mut state);
        info!("Vector store reset");
        Ok(())
    }

    fn clear(&self, state: &mut StoreState) {
        state.index = None;
        state.records.clear();
        self.remove_artifacts();
    }

    #[inline]
    pub fn stats(&self) -> Result<StoreStats> {
        let state = self.read_state()?;
        let sources: BTreeSet<&str> = state
            .records
            .iter()
            .map(|r| r.metadata.source.as_str())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(StoreStats {
            collection_name: self.collection_name.clone(),
            total_documents: sources.len(),
            total_chunks: state.index.as_ref().map_or(0, FlatIndex::len),
        })
    }

    /// Timestamp of the most recent indexing operation, if any.
    #[inline]
    pub fn last_indexed_at(&self) -> Result<Option<DateTime<Utc>>> {
        let state = self.read_state()?;
        Ok(state.records.iter().map(|r| r.indexed_at).max())
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, StoreState>> {
        self.state
            .read()
            .map_err(|_| RagError::Store("Store lock poisoned".to_string()))
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, StoreState>> {
        self.state
            .write()
            .map_err(|_| RagError::Store("Store lock poisoned".to_string()))
    }
}
