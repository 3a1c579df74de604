//! Augmented term frequency and base-10 inverse document frequency.

use crate::vocabulary::Vocabulary;
use crate::DocId;
use std::collections::HashMap;

/// `0.5 + 0.5 * raw / max`, in `(0.5, 1.0]` for `1 <= raw <= max`.
pub fn augmented_tf(raw_frequency: u32, max_frequency: u32) -> f64 {
    if max_frequency == 0 {
        return 0.5;
    }
    0.5 + 0.5 * f64::from(raw_frequency) / f64::from(max_frequency)
}

/// `log10(total / df)`; zero when `df` is zero or the token is in every document.
pub fn idf(total_documents: usize, document_frequency: usize) -> f64 {
    if document_frequency == 0 || total_documents == 0 {
        return 0.0;
    }
    (total_documents as f64 / document_frequency as f64).log10().max(0.0)
}

/// Read-only weighting view over a pruned vocabulary.
pub struct TfIdf<'v> {
    vocab: &'v Vocabulary,
    total_documents: usize,
    max_frequency: HashMap<DocId, u32>,
}

impl<'v> TfIdf<'v> {
    /// `total_documents` counts every indexed document, including those left with no tokens.
    pub fn new(vocab: &'v Vocabulary, total_documents: usize) -> Self {
        let max_frequency = vocab.max_frequency_per_document();
        Self { vocab, total_documents, max_frequency }
    }

    pub fn total_documents(&self) -> usize {
        self.total_documents
    }

    /// `None` when the token does not occur in the document.
    pub fn compute_tf(&self, doc_id: DocId, token: &str) -> Option<f64> {
        let raw = *self.vocab.get(token)?.documents.get(&doc_id)?;
        let max = self.max_frequency.get(&doc_id).copied().unwrap_or(raw);
        Some(augmented_tf(raw, max))
    }

    /// The IDF stored by [`assign_idf`], or computed on the spot when none was stored.
    pub fn compute_idf(&self, token: &str) -> Option<f64> {
        let entry = self.vocab.get(token)?;
        Some(entry.idf.unwrap_or_else(|| idf(self.total_documents, entry.document_frequency())))
    }

    pub fn weight(&self, doc_id: DocId, token: &str) -> Option<f64> {
        Some(self.compute_tf(doc_id, token)? * self.compute_idf(token)?)
    }
}

/// Stores each token's IDF on its vocabulary entry.
pub fn assign_idf(vocab: &mut Vocabulary, total_documents: usize) {
    let tokens: Vec<String> = vocab.iter().map(|(t, _)| t.to_owned()).collect();
    for token in tokens {
        if let Some(entry) = vocab.get_mut(&token) {
            entry.idf = Some(idf(total_documents, entry.document_frequency()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::TokenStream;

    #[test]
    fn tf_is_bounded() {
        assert_eq!(augmented_tf(4, 4), 1.0);
        assert_eq!(augmented_tf(1, 2), 0.75);
        let low = augmented_tf(1, 1000);
        assert!(low > 0.5 && low < 0.51);
    }

    #[test]
    fn idf_non_increasing_and_zero_when_ubiquitous() {
        let n = 10;
        let mut prev = f64::INFINITY;
        for df in 1..=n {
            let v = idf(n, df);
            assert!(v <= prev);
            assert!(v >= 0.0);
            prev = v;
        }
        assert_eq!(idf(n, n), 0.0);
        assert!(idf(n, n - 1) > 0.0);
        assert_eq!(idf(n, 0), 0.0);
    }

    #[test]
    fn scenario_weights() {
        let mut vocab = Vocabulary::new(8, 0.75);
        for (i, text) in ["cat sat", "dog sat", "cat dog"].iter().enumerate() {
            vocab.add_document(i as DocId + 1, TokenStream::new(text).iter().collect::<Vec<_>>());
        }
        let engine = TfIdf::new(&vocab, 3);
        let expected_idf = (3.0f64 / 2.0).log10();
        assert!((engine.compute_idf("cat").unwrap() - expected_idf).abs() < 1e-12);
        assert!((expected_idf - 0.176).abs() < 1e-3);
        assert_eq!(engine.compute_tf(1, "cat"), Some(1.0));
        assert_eq!(engine.compute_tf(2, "cat"), None);
        assert!((engine.weight(3, "dog").unwrap() - expected_idf).abs() < 1e-12);
        assert_eq!(engine.compute_idf("zzz"), None);

        assign_idf(&mut vocab, 3);
        assert!((vocab.get("sat").unwrap().idf.unwrap() - expected_idf).abs() < 1e-12);
    }
}
