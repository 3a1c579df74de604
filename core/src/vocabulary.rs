use crate::hash_table::{HashTable, HashTableStats};
use crate::DocId;
use std::collections::{BTreeMap, HashMap};

/// Corpus-wide statistics of one token.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VocabularyEntry {
    /// Sum of occurrences across all documents.
    pub total_frequency: u64,
    /// Raw in-document frequency per containing document.
    pub documents: BTreeMap<DocId, u32>,
    /// Set once weighting has run.
    pub idf: Option<f64>,
}

impl VocabularyEntry {
    pub fn document_frequency(&self) -> usize {
        self.documents.len()
    }
}

/// Token → [`VocabularyEntry`] map accumulated over one build pass.
pub struct Vocabulary {
    entries: HashTable<String, VocabularyEntry>,
}

impl Vocabulary {
    pub fn new(capacity: usize, max_load_factor: f64) -> Self {
        Self { entries: HashTable::growable(capacity, max_load_factor) }
    }

    /// Folds one document into the vocabulary and returns its in-document counts.
    ///
    /// Counting happens per document first, so a repeated token bumps its
    /// document set once. Adding the same `doc_id` twice would double its
    /// frequency and is not expected during a build.
    pub fn add_document<'t, I>(&mut self, doc_id: DocId, tokens: I) -> HashMap<&'t str, u32>
    where
        I: IntoIterator<Item = &'t str>,
    {
        let mut counts: HashMap<&'t str, u32> = HashMap::new();
        for token in tokens {
            *counts.entry(token).or_insert(0) += 1;
        }
        for (&token, &count) in &counts {
            let entry = self.entries.get_or_insert_with(token.to_owned(), VocabularyEntry::default);
            entry.total_frequency += u64::from(count);
            *entry.documents.entry(doc_id).or_insert(0) += count;
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, token: &str) -> Option<&VocabularyEntry> {
        self.entries.get(token)
    }

    pub fn get_mut(&mut self, token: &str) -> Option<&mut VocabularyEntry> {
        self.entries.get_mut(token)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.entries.contains(token)
    }

    pub fn remove(&mut self, token: &str) -> Option<VocabularyEntry> {
        self.entries.remove(token)
    }

    /// Entries in hash order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &VocabularyEntry)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Tokens in lexicographic order.
    pub fn sorted_tokens(&self) -> Vec<&str> {
        let mut tokens: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        tokens.sort_unstable();
        tokens
    }

    /// Highest raw frequency of any token per document.
    pub fn max_frequency_per_document(&self) -> HashMap<DocId, u32> {
        let mut max: HashMap<DocId, u32> = HashMap::new();
        for entry in self.entries.values() {
            for (&doc_id, &freq) in &entry.documents {
                let slot = max.entry(doc_id).or_insert(0);
                *slot = (*slot).max(freq);
            }
        }
        max
    }

    pub fn table_statistics(&self) -> HashTableStats {
        self.entries.statistics()
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new(1024, 0.75)
    }
}
