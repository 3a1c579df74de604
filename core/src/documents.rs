use crate::DocId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocMeta {
    pub name: String,
    /// Location relative to the corpus directory, `/`-separated.
    pub path: String,
}

/// 1-based document IDs and their names, resolvable in both directions.
///
/// IDs handed out by [`DocumentIndex::register`] are dense. An index loaded
/// back from disk may have gaps where a row could not be parsed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentIndex {
    docs: HashMap<DocId, DocMeta>,
    by_name: HashMap<String, DocId>,
    last_id: DocId,
}

impl DocumentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the next document and returns its ID.
    ///
    /// A name already taken falls back to the document's path so names stay unique.
    pub fn register(&mut self, name: &str, path: &str) -> DocId {
        let name = if self.by_name.contains_key(name) { path } else { name };
        self.last_id += 1;
        let id = self.last_id;
        self.by_name.insert(name.to_owned(), id);
        self.docs.insert(id, DocMeta { name: name.to_owned(), path: path.to_owned() });
        id
    }

    /// Rebuilds an index from persisted `(id, meta)` rows.
    ///
    /// Rows with ID 0, a repeated ID or a repeated name are dropped; the
    /// second value is how many were dropped.
    pub(crate) fn from_rows(rows: Vec<(DocId, DocMeta)>) -> (Self, usize) {
        let mut index = Self::new();
        let mut rejected = 0usize;
        for (id, meta) in rows {
            if id == 0 || index.docs.contains_key(&id) || index.by_name.contains_key(&meta.name) {
                tracing::warn!(id, name = %meta.name, "conflicting document row dropped");
                rejected += 1;
                continue;
            }
            index.last_id = index.last_id.max(id);
            index.by_name.insert(meta.name.clone(), id);
            index.docs.insert(id, meta);
        }
        (index, rejected)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn resolve(&self, id: DocId) -> Option<&DocMeta> {
        self.docs.get(&id)
    }

    pub fn id_of(&self, name: &str) -> Option<DocId> {
        self.by_name.get(name).copied()
    }

    /// Documents in ascending ID order.
    pub fn iter(&self) -> impl Iterator<Item = (DocId, &DocMeta)> + '_ {
        let mut ids: Vec<DocId> = self.docs.keys().copied().collect();
        ids.sort_unstable();
        ids.into_iter().filter_map(move |id| self.docs.get(&id).map(|m| (id, m)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_dense_and_bidirectional() {
        let mut idx = DocumentIndex::new();
        assert_eq!(idx.register("a.html", "a.html"), 1);
        assert_eq!(idx.register("b.html", "sub/b.html"), 2);
        assert_eq!(idx.resolve(2).unwrap().path, "sub/b.html");
        assert_eq!(idx.id_of("a.html"), Some(1));
        assert!(idx.resolve(0).is_none());
        assert!(idx.resolve(3).is_none());
        assert_eq!(idx.id_of("missing.html"), None);
    }

    #[test]
    fn duplicate_names_fall_back_to_path() {
        let mut idx = DocumentIndex::new();
        idx.register("index.html", "a/index.html");
        let id = idx.register("index.html", "b/index.html");
        assert_eq!(idx.resolve(id).unwrap().name, "b/index.html");
        assert_eq!(idx.id_of("index.html"), Some(1));
        assert_eq!(idx.id_of("b/index.html"), Some(2));
    }

    #[test]
    fn from_rows_keeps_rows_after_a_gap() {
        let meta = |n: &str| DocMeta { name: n.into(), path: n.into() };
        let (idx, rejected) = DocumentIndex::from_rows(vec![(1, meta("a")), (3, meta("c")), (3, meta("d")), (0, meta("z"))]);
        assert_eq!(rejected, 2);
        assert_eq!(idx.len(), 2);
        assert_eq!(idx.resolve(3).unwrap().name, "c");
        assert!(idx.resolve(2).is_none());
        assert_eq!(idx.iter().map(|(id, _)| id).collect::<Vec<_>>(), vec![1, 3]);
    }
}
