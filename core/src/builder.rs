//! Corpus ingestion: walk, decode, tokenize, prune, weight and persist.

use crate::config::BuildConfig;
use crate::documents::DocumentIndex;
use crate::error::{IndexError, Result};
use crate::hash_table::HashTableStats;
use crate::index::InvertedIndex;
use crate::persist::{save_index, IndexPaths, MetaFile};
use crate::stopwords::StopList;
use crate::tfidf::assign_idf;
use crate::tokenizer::{decode, TokenStream};
use crate::vocabulary::Vocabulary;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use walkdir::WalkDir;

/// Outcome of [`build_index`].
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub dictionary_file: PathBuf,
    pub posting_file: PathBuf,
    pub document_file: PathBuf,
    pub documents_indexed: usize,
    pub documents_skipped: usize,
    pub vocabulary_before_pruning: usize,
    pub vocabulary_after_pruning: usize,
    pub stop_words_removed: usize,
    pub vocabulary_table: HashTableStats,
    pub elapsed_ms: u128,
}

/// A weighted index held in memory, not yet written out.
#[derive(Debug)]
pub struct CorpusBuild {
    pub index: InvertedIndex,
    pub stop_list: StopList,
    pub documents_skipped: usize,
    pub vocabulary_before_pruning: usize,
    pub vocabulary_table: HashTableStats,
}

/// Files under `corpus_dir` whose extension is listed in `extensions`, in a stable order.
pub fn discover_documents(corpus_dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if !corpus_dir.is_dir() {
        let err = io::Error::new(io::ErrorKind::NotFound, "corpus directory not found");
        return Err(IndexError::io(corpus_dir, err));
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(corpus_dir).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable corpus entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let wanted = entry
            .path()
            .extension()
            .and_then(|s| s.to_str())
            .map_or(false, |ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)));
        if wanted {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn relative_name(corpus_dir: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(corpus_dir).unwrap_or(path);
    let joined = rel.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/");
    sanitize(&joined)
}

/// Tabs and line breaks would corrupt the tab-separated document file.
fn sanitize(name: &str) -> String {
    name.chars().map(|c| if matches!(c, '\t' | '\n' | '\r') { ' ' } else { c }).collect()
}

/// Ingests and weights every document under `corpus_dir` without touching disk output.
pub fn index_corpus(corpus_dir: &Path, config: &BuildConfig) -> Result<CorpusBuild> {
    let files = discover_documents(corpus_dir, &config.extensions)?;
    tracing::info!(corpus = %corpus_dir.display(), files = files.len(), "indexing corpus");

    let mut documents = DocumentIndex::new();
    let mut vocab = Vocabulary::new(config.vocabulary_capacity, config.max_load_factor);
    let mut skipped = 0usize;

    for path in &files {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %IndexError::io(path, e), "document skipped");
                skipped += 1;
                continue;
            }
        };
        let Some(text) = decode(&bytes, &config.encodings) else {
            tracing::warn!(error = %IndexError::Decode { path: path.clone() }, "document skipped");
            skipped += 1;
            continue;
        };
        let stream = if config.strip_markup { TokenStream::from_markup(&text) } else { TokenStream::new(&text) };

        let name = path.file_name().map(|n| sanitize(&n.to_string_lossy())).unwrap_or_default();
        let doc_id = documents.register(&name, &relative_name(corpus_dir, path));
        let counts = vocab.add_document(doc_id, stream.iter());
        tracing::debug!(doc_id, %name, distinct_tokens = counts.len(), "document ingested");
    }

    let vocabulary_before_pruning = vocab.len();
    let vocabulary_table = vocab.table_statistics();
    let stop_list =
        StopList::derive(&vocab, documents.len(), config.stop_words, &config.frequency, &config.extra_stop_words);
    let removed = stop_list.apply(&mut vocab);
    tracing::info!(
        documents = documents.len(),
        skipped,
        vocabulary = vocabulary_before_pruning,
        removed,
        policy = %config.stop_words,
        "vocabulary pruned"
    );

    assign_idf(&mut vocab, documents.len());
    let index = InvertedIndex::from_vocabulary(&vocab, documents);
    Ok(CorpusBuild { index, stop_list, documents_skipped: skipped, vocabulary_before_pruning, vocabulary_table })
}

/// Builds the index for `corpus_dir` and writes its artifacts into `output_dir`.
pub fn build_index<P, Q>(corpus_dir: P, output_dir: Q, config: &BuildConfig) -> Result<BuildReport>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let started = Instant::now();
    let build = index_corpus(corpus_dir.as_ref(), config)?;
    let paths = IndexPaths::new(output_dir);

    let meta = MetaFile {
        num_docs: build.index.num_docs(),
        num_tokens: build.index.num_terms(),
        skipped_documents: build.documents_skipped,
        stop_words: build.stop_list.len(),
        stop_word_policy: config.stop_words,
        created_at: OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
    };
    save_index(&paths, &build.index, &build.stop_list, &meta)?;

    let report = BuildReport {
        dictionary_file: paths.dictionary(),
        posting_file: paths.postings(),
        document_file: paths.documents(),
        documents_indexed: build.index.num_docs(),
        documents_skipped: build.documents_skipped,
        vocabulary_before_pruning: build.vocabulary_before_pruning,
        vocabulary_after_pruning: build.index.num_terms(),
        stop_words_removed: build.stop_list.len(),
        vocabulary_table: build.vocabulary_table,
        elapsed_ms: started.elapsed().as_millis(),
    };
    tracing::info!(output = %paths.root.display(), tokens = report.vocabulary_after_pruning, "index build complete");
    Ok(report)
}
