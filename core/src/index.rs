use crate::documents::DocumentIndex;
use crate::tfidf::TfIdf;
use crate::vocabulary::Vocabulary;
use crate::DocId;
use std::cmp::Ordering;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Posting {
    pub doc_id: DocId,
    pub raw_frequency: u32,
    pub weight: f64, // tf-idf
}

/// Decimal places weights keep in the posting file.
pub const WEIGHT_DECIMALS: i32 = 6;

/// `weight` rounded to [`WEIGHT_DECIMALS`] places.
pub fn round_weight(weight: f64) -> f64 {
    let scale = 10f64.powi(WEIGHT_DECIMALS);
    (weight * scale).round() / scale
}

/// Rounds every weight, then orders by [`rank_order`], so equal written weights list ascending IDs.
pub fn sort_postings(postings: &mut [Posting]) {
    for p in postings.iter_mut() {
        p.weight = round_weight(p.weight);
    }
    postings.sort_by(|a, b| rank_order(a.weight, a.doc_id, b.weight, b.doc_id));
}

/// Descending weight, then ascending document ID.
pub fn rank_order(a_weight: f64, a_doc: DocId, b_weight: f64, b_doc: DocId) -> Ordering {
    b_weight.total_cmp(&a_weight).then_with(|| a_doc.cmp(&b_doc))
}

#[derive(Debug, Clone, PartialEq)]
pub struct TermPostings {
    pub total_frequency: u64,
    pub idf: f64,
    pub postings: Vec<Posting>, // sorted by rank_order
}

impl TermPostings {
    pub fn document_frequency(&self) -> usize {
        self.postings.len()
    }
}

/// Weighted, frozen index produced at the end of a build.
#[derive(Debug, Clone, Default)]
pub struct InvertedIndex {
    pub terms: BTreeMap<String, TermPostings>,
    pub documents: DocumentIndex,
}

impl InvertedIndex {
    /// Weights a pruned vocabulary and freezes it together with its documents.
    pub fn from_vocabulary(vocab: &Vocabulary, documents: DocumentIndex) -> Self {
        let engine = TfIdf::new(vocab, documents.len());
        let mut terms = BTreeMap::new();
        for (token, entry) in vocab.iter() {
            let mut postings: Vec<Posting> = entry
                .documents
                .iter()
                .filter_map(|(&doc_id, &raw)| {
                    let weight = engine.weight(doc_id, token)?;
                    Some(Posting { doc_id, raw_frequency: raw, weight })
                })
                .collect();
            sort_postings(&mut postings);
            let idf = engine.compute_idf(token).unwrap_or(0.0);
            terms.insert(token.to_owned(), TermPostings { total_frequency: entry.total_frequency, idf, postings });
        }
        Self { terms, documents }
    }

    pub fn num_docs(&self) -> usize {
        self.documents.len()
    }

    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    pub fn get(&self, token: &str) -> Option<&TermPostings> {
        self.terms.get(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::TokenStream;

    #[test]
    fn postings_sorted_by_weight_then_doc() {
        let mut docs = DocumentIndex::new();
        let mut vocab = Vocabulary::new(8, 0.75);
        for (name, text) in [("a", "cat cat dog"), ("b", "cat dog dog"), ("c", "cat dog"), ("d", "fish")] {
            let id = docs.register(name, name);
            vocab.add_document(id, TokenStream::new(text).iter().collect::<Vec<_>>());
        }
        let index = InvertedIndex::from_vocabulary(&vocab, docs);
        let cat = index.get("cat").unwrap();
        assert_eq!(cat.document_frequency(), 3);
        assert_eq!(cat.total_frequency, 4);
        let order: Vec<DocId> = cat.postings.iter().map(|p| p.doc_id).collect();
        // doc 1 and 3 both have tf 1.0, doc 2 has 0.75
        assert_eq!(order, vec![1, 3, 2]);
        assert!(index.get("fish").unwrap().idf > cat.idf);
        assert_eq!(index.num_docs(), 4);
        // tf 1.0 and 0.75 against idf log10(4/3)
        let idf = (4.0f64 / 3.0).log10();
        assert_eq!(cat.postings[0].weight, round_weight(idf));
        assert_eq!(cat.postings[2].weight, round_weight(0.75 * idf));
    }

    #[test]
    fn weights_equal_after_rounding_order_by_doc() {
        let mut postings = vec![
            Posting { doc_id: 2, raw_frequency: 1, weight: 0.1000004 },
            Posting { doc_id: 1, raw_frequency: 1, weight: 0.1000001 },
            Posting { doc_id: 3, raw_frequency: 2, weight: 0.25 },
        ];
        sort_postings(&mut postings);
        assert_eq!(postings.iter().map(|p| p.doc_id).collect::<Vec<_>>(), vec![3, 1, 2]);
        assert_eq!(postings[1].weight, postings[2].weight);
        assert_eq!(format!("{:.6}", postings[1].weight), "0.100000");
    }
}
