use crate::config::RetrievalConfig;
use crate::documents::DocumentIndex;
use crate::error::Result;
use crate::hash_table::{HashTable, HashTableStats};
use crate::index::rank_order;
use crate::persist::{
    build_offset_index, load_documents, load_full, load_meta, read_block_at, verify_artifacts, IndexPaths, MetaFile,
    PostingBlock,
};
use crate::DocId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// How a [`Retriever`] reaches the posting lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    /// Load dictionary, postings and documents into memory.
    Full,
    /// Keep only a token → offset table; read one posting block per lookup.
    #[default]
    Optimized,
}

impl FromStr for RetrievalMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" | "memory" => Ok(RetrievalMode::Full),
            "optimized" | "disk" => Ok(RetrievalMode::Optimized),
            other => Err(format!("unknown retrieval mode '{other}' (expected full or optimized)")),
        }
    }
}

impl fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RetrievalMode::Full => "full",
            RetrievalMode::Optimized => "optimized",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrieverState {
    /// No index attached; only seen before [`Retriever::open`] succeeds.
    Uninitialized,
    IndexReady,
    Serving,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenHit {
    pub doc_id: DocId,
    pub doc_name: String,
    pub raw_frequency: u32,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedDocument {
    pub doc_id: DocId,
    pub doc_name: String,
    pub score: f64,
    pub matched_tokens: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TermStats {
    pub total_frequency: u64,
    pub document_frequency: usize,
    pub idf: f64,
}

/// Source of posting blocks behind a [`Retriever`].
trait PostingSource: Send + Sync {
    fn block(&self, token: &str) -> Result<Option<Arc<PostingBlock>>>;
    fn term_stats(&self, token: &str) -> Result<Option<TermStats>>;
    fn offset_statistics(&self) -> Option<HashTableStats> {
        None
    }
}

/// Statistics as recorded in a token's posting block.
fn block_stats(block: &PostingBlock) -> TermStats {
    TermStats {
        total_frequency: block.records.iter().map(|r| u64::from(r.raw_frequency)).sum(),
        document_frequency: block.records.len(),
        idf: block.idf,
    }
}

/// Answers from the posting file only, like [`OffsetSource`]; dictionary rows are not consulted.
struct FullSource {
    postings: HashMap<String, Arc<PostingBlock>>,
}

impl PostingSource for FullSource {
    fn block(&self, token: &str) -> Result<Option<Arc<PostingBlock>>> {
        Ok(self.postings.get(token).cloned())
    }

    fn term_stats(&self, token: &str) -> Result<Option<TermStats>> {
        Ok(self.postings.get(token).map(|b| block_stats(b)))
    }
}

/// Least-recently-used cache of posting blocks.
struct BlockCache {
    capacity: usize,
    tick: u64,
    entries: HashMap<String, (u64, Arc<PostingBlock>)>,
}

impl BlockCache {
    fn new(capacity: usize) -> Self {
        Self { capacity, tick: 0, entries: HashMap::with_capacity(capacity) }
    }

    fn get(&mut self, token: &str) -> Option<Arc<PostingBlock>> {
        self.tick += 1;
        let tick = self.tick;
        self.entries.get_mut(token).map(|(used, block)| {
            *used = tick;
            Arc::clone(block)
        })
    }

    fn insert(&mut self, token: &str, block: Arc<PostingBlock>) {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(token) {
            let oldest = self.entries.iter().min_by_key(|(_, (used, _))| *used).map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                self.entries.remove(&oldest);
            }
        }
        self.tick += 1;
        self.entries.insert(token.to_owned(), (self.tick, block));
    }
}

struct OffsetSource {
    paths: IndexPaths,
    offsets: HashTable<String, u64>,
    cache: Option<Mutex<BlockCache>>,
}

impl PostingSource for OffsetSource {
    fn block(&self, token: &str) -> Result<Option<Arc<PostingBlock>>> {
        let Some(&offset) = self.offsets.get(token) else {
            return Ok(None);
        };
        if let Some(cache) = &self.cache {
            if let Some(block) = cache.lock().get(token) {
                return Ok(Some(block));
            }
        }
        let block = Arc::new(read_block_at(&self.paths, token, offset)?);
        tracing::debug!(token, offset, postings = block.records.len(), "posting block read");
        if let Some(cache) = &self.cache {
            cache.lock().insert(token, Arc::clone(&block));
        }
        Ok(Some(block))
    }

    fn term_stats(&self, token: &str) -> Result<Option<TermStats>> {
        Ok(self.block(token)?.map(|b| block_stats(&b)))
    }

    fn offset_statistics(&self) -> Option<HashTableStats> {
        Some(self.offsets.statistics())
    }
}

/// Read-only query handle over a persisted index.
///
/// A retriever never mutates the index after `open`, so one handle can be
/// shared across threads.
pub struct Retriever {
    mode: RetrievalMode,
    source: Box<dyn PostingSource>,
    documents: DocumentIndex,
    meta: MetaFile,
    skipped_records: usize,
    serving: AtomicBool,
}

impl Retriever {
    /// Verifies the artifacts in `index_dir` and prepares them for `mode`.
    pub fn open<P: AsRef<Path>>(index_dir: P, mode: RetrievalMode, config: &RetrievalConfig) -> Result<Self> {
        let paths = IndexPaths::new(index_dir);
        verify_artifacts(&paths)?;
        let meta = load_meta(&paths)?;
        let (source, documents, skipped_records): (Box<dyn PostingSource>, DocumentIndex, usize) = match mode {
            RetrievalMode::Full => {
                let loaded = load_full(&paths)?;
                let postings = loaded.postings.into_iter().map(|(k, v)| (k, Arc::new(v))).collect();
                (Box::new(FullSource { postings }), loaded.documents, loaded.skipped_records)
            }
            RetrievalMode::Optimized => {
                let offsets = build_offset_index(&paths, config.offset_capacity_factor)?;
                let (documents, skipped) = load_documents(&paths)?;
                let cache = (config.cache_capacity > 0).then(|| Mutex::new(BlockCache::new(config.cache_capacity)));
                (Box::new(OffsetSource { paths, offsets, cache }), documents, skipped)
            }
        };
        tracing::info!(%mode, num_docs = documents.len(), skipped_records, "retriever ready");
        Ok(Self { mode, source, documents, meta, skipped_records, serving: AtomicBool::new(false) })
    }

    pub fn mode(&self) -> RetrievalMode {
        self.mode
    }

    pub fn state(&self) -> RetrieverState {
        if self.serving.load(Ordering::Relaxed) {
            RetrieverState::Serving
        } else {
            RetrieverState::IndexReady
        }
    }

    pub fn documents(&self) -> &DocumentIndex {
        &self.documents
    }

    pub fn meta(&self) -> &MetaFile {
        &self.meta
    }

    /// Artifact lines that could not be parsed while opening. Full mode reads
    /// every file up front; optimized mode only reads the document file.
    pub fn skipped_records(&self) -> usize {
        self.skipped_records
    }

    /// Bucket statistics of the offset table; `None` in full mode.
    pub fn offset_statistics(&self) -> Option<HashTableStats> {
        self.source.offset_statistics()
    }

    fn normalize(token: &str) -> String {
        token.trim().to_lowercase()
    }

    /// Postings of one token, highest weight first. Unknown tokens yield an empty list.
    pub fn search_token(&self, token: &str) -> Result<Vec<TokenHit>> {
        self.serving.store(true, Ordering::Relaxed);
        let token = Self::normalize(token);
        let Some(block) = self.source.block(&token)? else {
            tracing::debug!(%token, "token not in index");
            return Ok(Vec::new());
        };
        Ok(block
            .records
            .iter()
            .map(|r| TokenHit { doc_id: r.doc_id, doc_name: r.doc_name.clone(), raw_frequency: r.raw_frequency, weight: r.weight })
            .collect())
    }

    /// Sums per-document weights over all `tokens` and ranks by the sum, ties by ascending ID.
    pub fn search_multiple<S: AsRef<str>>(&self, tokens: &[S], top_k: Option<usize>) -> Result<Vec<RankedDocument>> {
        let mut scores: HashMap<DocId, RankedDocument> = HashMap::new();
        for token in tokens {
            for hit in self.search_token(token.as_ref())? {
                let doc = scores.entry(hit.doc_id).or_insert_with(|| RankedDocument {
                    doc_id: hit.doc_id,
                    doc_name: hit.doc_name.clone(),
                    score: 0.0,
                    matched_tokens: 0,
                });
                doc.score += hit.weight;
                doc.matched_tokens += 1;
            }
        }
        let mut ranked: Vec<RankedDocument> = scores.into_values().collect();
        ranked.sort_by(|a, b| rank_order(a.score, a.doc_id, b.score, b.doc_id));
        if let Some(k) = top_k {
            ranked.truncate(k);
        }
        Ok(ranked)
    }

    pub fn term_stats(&self, token: &str) -> Result<Option<TermStats>> {
        self.source.term_stats(&Self::normalize(token))
    }
}

/// Opens `index_dir` in `mode` with default retrieval settings.
pub fn open_retriever<P: AsRef<Path>>(index_dir: P, mode: RetrievalMode) -> Result<Retriever> {
    Retriever::open(index_dir, mode, &RetrievalConfig::default())
}

/// Ranked documents for `tokens`, at most `top_k` of them.
pub fn query<S: AsRef<str>>(handle: &Retriever, tokens: &[S], top_k: usize) -> Result<Vec<RankedDocument>> {
    handle.search_multiple(tokens, Some(top_k))
}
