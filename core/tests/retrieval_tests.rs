use searchcore::persist::{load_full, IndexPaths};
use searchcore::{
    build_index, open_retriever, query, BuildConfig, IndexError, RetrievalConfig, RetrievalMode, Retriever,
    RetrieverState, StopWordPolicy, TextEncoding,
};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;

fn write_corpus(dir: &Path, docs: &[(&str, &str)]) {
    for (name, body) in docs {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, body).unwrap();
    }
}

fn fixed_config() -> BuildConfig {
    BuildConfig { stop_words: StopWordPolicy::Fixed, ..BuildConfig::default() }
}

fn scenario(corpus: &Path, out: &Path) {
    write_corpus(
        corpus,
        &[
            ("doc1.html", "<html><body>the cat sat</body></html>"),
            ("doc2.html", "<html><body>the dog sat</body></html>"),
            ("doc3.html", "<html><body>cat and dog</body></html>"),
        ],
    );
    build_index(corpus, out, &fixed_config()).unwrap();
}

#[test]
fn builds_scenario_index() {
    let corpus = tempdir().unwrap();
    let out = tempdir().unwrap();
    write_corpus(
        corpus.path(),
        &[("doc1.html", "the cat sat"), ("doc2.html", "the dog sat"), ("doc3.html", "cat and dog")],
    );
    let report = build_index(corpus.path(), out.path(), &fixed_config()).unwrap();
    assert_eq!(report.documents_indexed, 3);
    assert_eq!(report.documents_skipped, 0);
    assert_eq!(report.vocabulary_before_pruning, 5);
    assert_eq!(report.vocabulary_after_pruning, 3);
    assert_eq!(report.stop_words_removed, 2);

    let loaded = load_full(&IndexPaths::new(out.path())).unwrap();
    assert_eq!(loaded.skipped_records, 0);
    assert_eq!(loaded.dictionary.keys().map(String::as_str).collect::<Vec<_>>(), vec!["cat", "dog", "sat"]);
    for record in loaded.dictionary.values() {
        assert_eq!(record.document_frequency, 2);
        assert!((record.idf - 0.176091).abs() < 1e-6);
    }
    let stopwords = fs::read_to_string(out.path().join("stopwords.txt")).unwrap();
    assert!(stopwords.contains("the\tfixed"));
    assert!(out.path().join("meta.json").exists());
}

#[test]
fn ranks_documents_matching_more_tokens_first() {
    let corpus = tempdir().unwrap();
    let out = tempdir().unwrap();
    scenario(corpus.path(), out.path());

    for mode in [RetrievalMode::Full, RetrievalMode::Optimized] {
        let retriever = open_retriever(out.path(), mode).unwrap();
        let ranked = query(&retriever, &["cat", "dog"], 10).unwrap();
        let names: Vec<&str> = ranked.iter().map(|d| d.doc_name.as_str()).collect();
        assert_eq!(names, vec!["doc3.html", "doc1.html", "doc2.html"], "mode {mode}");
        assert_eq!(ranked[0].matched_tokens, 2);
        assert!(ranked[0].score > ranked[1].score);

        let top = query(&retriever, &["cat", "dog"], 1).unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].doc_id, 3);
    }
}

#[test]
fn unknown_and_pruned_tokens_return_nothing() {
    let corpus = tempdir().unwrap();
    let out = tempdir().unwrap();
    scenario(corpus.path(), out.path());

    for mode in [RetrievalMode::Full, RetrievalMode::Optimized] {
        let retriever = open_retriever(out.path(), mode).unwrap();
        assert!(retriever.search_token("zzz").unwrap().is_empty());
        assert!(retriever.search_token("the").unwrap().is_empty());
        assert!(retriever.search_multiple::<&str>(&[], None).unwrap().is_empty());
        assert_eq!(retriever.term_stats("zzz").unwrap(), None);
    }
}

#[test]
fn query_tokens_are_case_insensitive() {
    let corpus = tempdir().unwrap();
    let out = tempdir().unwrap();
    scenario(corpus.path(), out.path());

    let retriever = open_retriever(out.path(), RetrievalMode::Optimized).unwrap();
    assert_eq!(retriever.search_token(" CAT ").unwrap(), retriever.search_token("cat").unwrap());
}

#[test]
fn both_modes_agree() {
    let corpus = tempdir().unwrap();
    let out = tempdir().unwrap();
    write_corpus(
        corpus.path(),
        &[
            ("a.html", "<p>rust compiler borrow checker borrow lifetimes</p>"),
            ("b.html", "<p>compiler compiler compiler optimizer</p>"),
            ("c.html", "<p>garbage collector runtime</p>"),
            ("nested/d.htm", "<div>borrow checker runtime optimizer optimizer</div>"),
            ("e.html", "<p>lifetimes lifetimes borrow</p>"),
            ("ignored.txt", "compiler compiler"),
        ],
    );
    let config = BuildConfig { stop_words: StopWordPolicy::None, ..BuildConfig::default() };
    let report = build_index(corpus.path(), out.path(), &config).unwrap();
    assert_eq!(report.documents_indexed, 5);

    let full = open_retriever(out.path(), RetrievalMode::Full).unwrap();
    let optimized = open_retriever(out.path(), RetrievalMode::Optimized).unwrap();
    let queries: [&[&str]; 5] = [
        &["borrow"],
        &["compiler", "optimizer"],
        &["borrow", "checker", "lifetimes"],
        &["runtime", "missing", "runtime"],
        &["nothing"],
    ];
    for tokens in queries {
        assert_eq!(full.search_multiple(tokens, None).unwrap(), optimized.search_multiple(tokens, None).unwrap());
    }
    for token in ["borrow", "compiler", "rust"] {
        assert_eq!(full.term_stats(token).unwrap(), optimized.term_stats(token).unwrap());
        assert_eq!(full.search_token(token).unwrap(), optimized.search_token(token).unwrap());
    }

    let borrow = full.search_token("borrow").unwrap();
    assert!(borrow.windows(2).all(|w| w[0].weight >= w[1].weight));
    assert!(full.offset_statistics().is_none());
    assert_eq!(optimized.offset_statistics().unwrap().count, report.vocabulary_after_pruning);
}

#[test]
fn repeated_lookups_through_a_small_cache() {
    let corpus = tempdir().unwrap();
    let out = tempdir().unwrap();
    scenario(corpus.path(), out.path());

    let config = RetrievalConfig { cache_capacity: 1, ..RetrievalConfig::default() };
    let retriever = Retriever::open(out.path(), RetrievalMode::Optimized, &config).unwrap();
    assert_eq!(retriever.state(), RetrieverState::IndexReady);
    let first = retriever.search_multiple(&["cat", "sat", "dog"], None).unwrap();
    let second = retriever.search_multiple(&["cat", "sat", "dog"], None).unwrap();
    assert_eq!(first, second);
    assert_eq!(retriever.state(), RetrieverState::Serving);
}

#[test]
fn undecodable_documents_are_skipped() {
    let corpus = tempdir().unwrap();
    let out = tempdir().unwrap();
    write_corpus(corpus.path(), &[("good.html", "coffee beans")]);
    fs::write(corpus.path().join("latin.html"), b"caf\xe9 cr\xe8me coffee").unwrap();

    let utf8_only = BuildConfig { encodings: vec![TextEncoding::Utf8], ..fixed_config() };
    let report = build_index(corpus.path(), out.path(), &utf8_only).unwrap();
    assert_eq!(report.documents_indexed, 1);
    assert_eq!(report.documents_skipped, 1);

    let retriever = open_retriever(out.path(), RetrievalMode::Full).unwrap();
    assert_eq!(retriever.documents().len(), 1);
    assert_eq!(retriever.meta().skipped_documents, 1);

    // with the latin-1 fallback both documents get an ID
    let report = build_index(corpus.path(), out.path(), &fixed_config()).unwrap();
    assert_eq!(report.documents_indexed, 2);
    assert_eq!(report.documents_skipped, 0);
}

#[test]
fn malformed_lines_are_skipped() {
    let corpus = tempdir().unwrap();
    let out = tempdir().unwrap();
    scenario(corpus.path(), out.path());

    let paths = IndexPaths::new(out.path());
    let mut postings = fs::OpenOptions::new().append(true).open(paths.postings()).unwrap();
    writeln!(postings, "    documentID:oops | doc9.html | freq:1 | peso:0.5").unwrap();
    let mut dictionary = fs::OpenOptions::new().append(true).open(paths.dictionary()).unwrap();
    writeln!(dictionary, "broken line without tabs").unwrap();

    let loaded = load_full(&paths).unwrap();
    assert_eq!(loaded.skipped_records, 2);
    assert_eq!(loaded.dictionary.len(), 3);

    for mode in [RetrievalMode::Full, RetrievalMode::Optimized] {
        let retriever = open_retriever(out.path(), mode).unwrap();
        let sat = retriever.search_token("sat").unwrap();
        assert_eq!(sat.iter().map(|h| h.doc_id).collect::<Vec<_>>(), vec![1, 2]);
    }
}

fn rewrite_row(path: &Path, prefix: &str, replacement: &str) {
    let text = fs::read_to_string(path).unwrap();
    assert!(text.lines().any(|l| l.starts_with(prefix)), "no row starting with {prefix:?}");
    let rewritten: Vec<&str> = text.lines().map(|l| if l.starts_with(prefix) { replacement } else { l }).collect();
    fs::write(path, rewritten.join("\n") + "\n").unwrap();
}

#[test]
fn corrupt_document_row_drops_only_that_row() {
    let corpus = tempdir().unwrap();
    let out = tempdir().unwrap();
    scenario(corpus.path(), out.path());

    let paths = IndexPaths::new(out.path());
    rewrite_row(&paths.documents(), "2\t", "2\tdoc2.html");

    let loaded = load_full(&paths).unwrap();
    assert_eq!(loaded.skipped_records, 1);
    assert_eq!(loaded.documents.len(), 2);
    assert_eq!(loaded.documents.resolve(3).unwrap().name, "doc3.html");
    assert!(loaded.documents.resolve(2).is_none());

    for mode in [RetrievalMode::Full, RetrievalMode::Optimized] {
        let retriever = open_retriever(out.path(), mode).unwrap();
        assert_eq!(retriever.skipped_records(), 1, "mode {mode}");
        assert_eq!(retriever.documents().id_of("doc3.html"), Some(3));
        assert_eq!(retriever.documents().len(), 2);
    }
}

#[test]
fn corrupt_dictionary_row_leaves_modes_in_agreement() {
    let corpus = tempdir().unwrap();
    let out = tempdir().unwrap();
    scenario(corpus.path(), out.path());

    let paths = IndexPaths::new(out.path());
    rewrite_row(&paths.dictionary(), "cat\t", "cat\tX\t2\t0.176091");
    let loaded = load_full(&paths).unwrap();
    assert_eq!(loaded.dictionary.len(), 2);
    assert_eq!(loaded.skipped_records, 1);

    let full = open_retriever(out.path(), RetrievalMode::Full).unwrap();
    let optimized = open_retriever(out.path(), RetrievalMode::Optimized).unwrap();
    assert_eq!(full.skipped_records(), 1);
    assert_eq!(optimized.skipped_records(), 0);

    let hits = full.search_token("cat").unwrap();
    assert_eq!(hits.iter().map(|h| h.doc_id).collect::<Vec<_>>(), vec![1, 3]);
    assert_eq!(hits, optimized.search_token("cat").unwrap());
    let stats = full.term_stats("cat").unwrap().unwrap();
    assert_eq!(stats.document_frequency, 2);
    assert_eq!(Some(stats), optimized.term_stats("cat").unwrap());
    assert_eq!(full.search_multiple(&["cat", "dog"], None).unwrap(), optimized.search_multiple(&["cat", "dog"], None).unwrap());
}

#[test]
fn incomplete_index_is_rejected() {
    let corpus = tempdir().unwrap();
    let out = tempdir().unwrap();
    scenario(corpus.path(), out.path());
    fs::remove_file(out.path().join("meta.json")).unwrap();

    let err = open_retriever(out.path(), RetrievalMode::Optimized).err().unwrap();
    assert!(matches!(err, IndexError::MissingArtifact { .. }));

    let empty = tempdir().unwrap();
    assert!(matches!(open_retriever(empty.path(), RetrievalMode::Full), Err(IndexError::MissingArtifact { .. })));
}

#[test]
fn tiny_corpus_under_comprehensive_policy() {
    let corpus = tempdir().unwrap();
    let out = tempdir().unwrap();
    write_corpus(corpus.path(), &[("one.html", "alpha beta"), ("two.html", "gamma delta")]);

    // every token lands in the top-50 by frequency
    let report = build_index(corpus.path(), out.path(), &BuildConfig::default()).unwrap();
    assert_eq!(report.vocabulary_after_pruning, 0);
    for mode in [RetrievalMode::Full, RetrievalMode::Optimized] {
        let retriever = open_retriever(out.path(), mode).unwrap();
        assert!(query(&retriever, &["alpha"], 10).unwrap().is_empty());
        assert_eq!(retriever.documents().len(), 2);
    }
}

#[test]
fn duplicate_file_names_stay_distinct() {
    let corpus = tempdir().unwrap();
    let out = tempdir().unwrap();
    write_corpus(corpus.path(), &[("a/index.html", "kitten"), ("b/index.html", "puppy")]);
    let config = BuildConfig { stop_words: StopWordPolicy::None, ..BuildConfig::default() };
    build_index(corpus.path(), out.path(), &config).unwrap();

    let retriever = open_retriever(out.path(), RetrievalMode::Full).unwrap();
    let hits = retriever.search_token("puppy").unwrap();
    assert_eq!(hits[0].doc_name, "b/index.html");
    assert_eq!(retriever.documents().id_of("index.html"), Some(1));
}
