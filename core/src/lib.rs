//! TF-IDF inverted index over a directory of markup documents.
//!
//! [`build_index`] turns a corpus into text artifacts; [`open_retriever`]
//! serves ranked queries from them, either fully loaded or through a
//! token → byte offset table.

pub mod builder;
pub mod config;
pub mod documents;
pub mod error;
pub mod hash_table;
pub mod index;
pub mod persist;
pub mod retrieval;
pub mod stopwords;
pub mod tfidf;
pub mod tokenizer;
pub mod vocabulary;

pub type DocId = u32;

pub use builder::{build_index, BuildReport};
pub use config::{BuildConfig, EngineConfig, RetrievalConfig, StopWordPolicy, TextEncoding};
pub use documents::{DocMeta, DocumentIndex};
pub use error::{IndexError, Result};
pub use hash_table::{HashTable, HashTableStats};
pub use index::{InvertedIndex, Posting};
pub use retrieval::{open_retriever, query, RankedDocument, RetrievalMode, Retriever, RetrieverState, TermStats, TokenHit};
pub use stopwords::{StopList, StopSource};
pub use tokenizer::{tokenize, TokenStream};
pub use vocabulary::Vocabulary;
