use crate::config::{FrequencyRules, StopWordPolicy};
use crate::vocabulary::Vocabulary;
use lazy_static::lazy_static;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

lazy_static! {
    static ref FIXED_STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            // english function words
            "the","be","to","of","and","a","in","that","have","i","it","for","not","on","with","he","as","you",
            "do","at","this","but","his","by","from","they","we","say","her","she","or","an","will","my",
            "one","all","would","there","their","what","so","up","out","if","about","who","get","which","go",
            "me","when","make","can","like","time","no","just","him","know","take","people","into","year","your",
            "good","some","could","them","see","other","than","then","now","look","only","come","its","over",
            "think","also","back","after","use","two","how","our","work","first","well","way","even","new",
            "want","because","any","these","give","day","most","us","is","was","are","been","has","had","were",
            // spanish function words
            "el","la","de","que","y","en","un","es","se","te","lo","le","da","su","por","son","con",
            "para","al","del","los","las","una","pero","sus","hasta","hay","donde","han","quien",
            "estado","desde","todo","nos","durante","todos","uno","les","ni","contra","otros","fueron","ese",
            "eso","ante","ellos","e","esto","antes","algunos","unos","yo","otro","otras","otra",
            // markup and web artifacts
            "com","org","net","edu","gov","www","http","https",
            "html","htm","asp","php","jsp","xml","css","js",
            "pdf","doc","txt","gif","jpg","jpeg","png","img",
        ];
        words.iter().copied().collect()
    };
}

const DOMAIN_FRAGMENTS: &[&str] = &["com", "org", "net", "edu", "gov"];
const FILE_EXTENSIONS: &[&str] = &["html", "htm", "php", "asp", "jsp", "pdf", "doc", "txt"];
const PUNCTUATION_REMNANTS: &[char] = &['&', '#', '%', '_'];
const MAX_TOKEN_LEN: usize = 20;
const MIN_REPEAT_RUN: usize = 4;

pub fn is_fixed_stopword(token: &str) -> bool {
    FIXED_STOPWORDS.contains(token)
}

/// Rule family that put a token on the stop list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StopSource {
    Fixed,
    Frequency,
    Pattern,
    Extra,
}

impl fmt::Display for StopSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopSource::Fixed => "fixed",
            StopSource::Frequency => "frequency",
            StopSource::Pattern => "pattern",
            StopSource::Extra => "extra",
        };
        f.write_str(s)
    }
}

/// Tokens that are common across the corpus: ubiquitous, very short, or top ranked by total frequency.
pub fn frequency_stopwords(vocab: &Vocabulary, total_documents: usize, rules: &FrequencyRules) -> HashSet<String> {
    let mut ranked: Vec<(&str, u64)> = vocab.iter().map(|(t, e)| (t, e.total_frequency)).collect();
    // ties by token keep the ranking deterministic
    ranked.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    let mut out: HashSet<String> = ranked.iter().take(rules.top_n).map(|(t, _)| (*t).to_owned()).collect();

    let total = total_documents.max(1) as f64;
    for (token, entry) in vocab.iter() {
        let ratio = entry.document_frequency() as f64 / total;
        if ratio > rules.df_ratio_threshold || token.chars().count() <= rules.short_token_len {
            out.insert(token.to_owned());
        }
    }
    out
}

/// Whether `token` looks like noise: numbers, URL or file-name fragments, encoding debris.
pub fn matches_noise_pattern(token: &str) -> bool {
    let len = token.chars().count();
    if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
        return true;
    }
    if DOMAIN_FRAGMENTS.iter().any(|d| token.contains(d)) && (token.contains('.') || len < 4) {
        return true;
    }
    if FILE_EXTENSIONS.contains(&token) {
        return true;
    }
    if !token.bytes().all(|b| b.is_ascii_alphabetic()) && (len < 3 || token.contains(PUNCTUATION_REMNANTS)) {
        return true;
    }
    len > MAX_TOKEN_LEN || has_repeat_run(token, MIN_REPEAT_RUN)
}

fn has_repeat_run(token: &str, min_run: usize) -> bool {
    let mut run = 0usize;
    let mut prev: Option<char> = None;
    for c in token.chars() {
        run = if Some(c) == prev { run + 1 } else { 1 };
        if run >= min_run {
            return true;
        }
        prev = Some(c);
    }
    false
}

pub fn pattern_stopwords(vocab: &Vocabulary) -> HashSet<String> {
    vocab.iter().map(|(t, _)| t).filter(|t| matches_noise_pattern(t)).map(str::to_owned).collect()
}

/// The final stop set, restricted to tokens actually present in the vocabulary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StopList {
    words: BTreeMap<String, StopSource>,
}

impl StopList {
    /// Derives the stop set for `vocab` under `policy`.
    ///
    /// When a token qualifies through several families the first in
    /// fixed, frequency, pattern, extra order is recorded.
    pub fn derive(
        vocab: &Vocabulary,
        total_documents: usize,
        policy: StopWordPolicy,
        rules: &FrequencyRules,
        extra: &[String],
    ) -> Self {
        let mut words: BTreeMap<String, StopSource> = BTreeMap::new();
        if policy != StopWordPolicy::None {
            for (token, _) in vocab.iter() {
                if is_fixed_stopword(token) {
                    words.insert(token.to_owned(), StopSource::Fixed);
                }
            }
        }
        if policy == StopWordPolicy::Comprehensive {
            for token in frequency_stopwords(vocab, total_documents, rules) {
                words.entry(token).or_insert(StopSource::Frequency);
            }
            for token in pattern_stopwords(vocab) {
                words.entry(token).or_insert(StopSource::Pattern);
            }
        }
        for word in extra {
            let word = word.to_lowercase();
            if vocab.contains(&word) {
                words.entry(word).or_insert(StopSource::Extra);
            }
        }
        Self { words }
    }

    /// Stop set built from an explicit word list, keeping only vocabulary tokens.
    pub fn from_words<I, S>(vocab: &Vocabulary, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words
            .into_iter()
            .map(|w| w.as_ref().to_lowercase())
            .filter(|w| vocab.contains(w))
            .map(|w| (w, StopSource::Extra))
            .collect();
        Self { words }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.words.contains_key(token)
    }

    /// Entries sorted by token.
    pub fn iter(&self) -> impl Iterator<Item = (&str, StopSource)> + '_ {
        self.words.iter().map(|(w, s)| (w.as_str(), *s))
    }

    /// Removes every stop word, and with it its postings, from `vocab`. Returns how many were removed.
    pub fn apply(&self, vocab: &mut Vocabulary) -> usize {
        let removed = self.words.keys().filter(|w| vocab.remove(w).is_some()).count();
        tracing::debug!(removed, remaining = vocab.len(), "stop list applied");
        removed
    }
}
