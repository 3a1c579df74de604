use crate::error::{IndexError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Which stop-word families are removed from the vocabulary before weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopWordPolicy {
    /// Keep every token.
    None,
    /// Only the curated fixed list.
    Fixed,
    /// Fixed list, frequency-derived list and pattern-derived list.
    #[default]
    Comprehensive,
}

impl FromStr for StopWordPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(StopWordPolicy::None),
            "fixed" => Ok(StopWordPolicy::Fixed),
            "comprehensive" | "full" => Ok(StopWordPolicy::Comprehensive),
            other => Err(format!("unknown stop word policy '{other}' (expected none, fixed or comprehensive)")),
        }
    }
}

impl fmt::Display for StopWordPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopWordPolicy::None => "none",
            StopWordPolicy::Fixed => "fixed",
            StopWordPolicy::Comprehensive => "comprehensive",
        };
        f.write_str(s)
    }
}

/// Text encodings tried, in order, when reading a corpus document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextEncoding {
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
    #[serde(rename = "latin-1", alias = "iso-8859-1", alias = "latin1")]
    Latin1,
}

impl TextEncoding {
    /// Decodes `bytes`, returning `None` when they are not valid in this encoding.
    pub fn decode(self, bytes: &[u8]) -> Option<String> {
        match self {
            TextEncoding::Utf8 => std::str::from_utf8(bytes).ok().map(str::to_owned),
            // every byte maps to the code point of the same value
            TextEncoding::Latin1 => Some(bytes.iter().map(|&b| b as char).collect()),
        }
    }
}

/// Thresholds of the frequency-derived stop list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrequencyRules {
    /// Tokens whose `documentFrequency / totalDocuments` exceeds this are stop words.
    pub df_ratio_threshold: f64,
    /// The `top_n` tokens by total frequency are stop words.
    pub top_n: usize,
    /// Tokens this short or shorter are stop words.
    pub short_token_len: usize,
}

impl Default for FrequencyRules {
    fn default() -> Self {
        Self { df_ratio_threshold: 0.7, top_n: 50, short_token_len: 2 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// File extensions (without dot, case-insensitive) picked up from the corpus directory.
    pub extensions: Vec<String>,
    pub encodings: Vec<TextEncoding>,
    pub strip_markup: bool,
    pub stop_words: StopWordPolicy,
    pub extra_stop_words: Vec<String>,
    pub frequency: FrequencyRules,
    pub vocabulary_capacity: usize,
    pub max_load_factor: f64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["html".into(), "htm".into()],
            encodings: vec![TextEncoding::Utf8, TextEncoding::Latin1],
            strip_markup: true,
            stop_words: StopWordPolicy::default(),
            extra_stop_words: Vec::new(),
            frequency: FrequencyRules::default(),
            vocabulary_capacity: 1024,
            max_load_factor: 0.75,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Offset index buckets allocated per token listed in the posting header.
    pub offset_capacity_factor: usize,
    /// Cached posting blocks in optimized mode; 0 disables the cache.
    pub cache_capacity: usize,
    pub default_top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { offset_capacity_factor: 3, cache_capacity: 1000, default_top_k: 10 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub build: BuildConfig,
    pub retrieval: RetrievalConfig,
}

impl EngineConfig {
    /// Reads a JSON configuration file. Missing fields fall back to defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| IndexError::io(path, e))?;
        let config: EngineConfig = serde_json::from_str(&raw)
            .map_err(|e| IndexError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.build.encodings.is_empty() {
            return Err(IndexError::Config("at least one encoding is required".into()));
        }
        if self.build.vocabulary_capacity == 0 {
            return Err(IndexError::Config("vocabulary_capacity must be positive".into()));
        }
        if !(self.build.max_load_factor > 0.0) {
            return Err(IndexError::Config("max_load_factor must be positive".into()));
        }
        if self.retrieval.offset_capacity_factor == 0 {
            return Err(IndexError::Config("offset_capacity_factor must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: EngineConfig = serde_json::from_str(r#"{"build": {"stop_words": "fixed", "encodings": ["utf-8"]}}"#).unwrap();
        assert_eq!(cfg.build.stop_words, StopWordPolicy::Fixed);
        assert_eq!(cfg.build.encodings, vec![TextEncoding::Utf8]);
        assert_eq!(cfg.build.frequency.top_n, 50);
        assert_eq!(cfg.retrieval.cache_capacity, 1000);
        cfg.validate().unwrap();
    }

    #[test]
    fn policy_parses_from_cli_strings() {
        assert_eq!("NONE".parse::<StopWordPolicy>().unwrap(), StopWordPolicy::None);
        assert_eq!("full".parse::<StopWordPolicy>().unwrap(), StopWordPolicy::Comprehensive);
        assert!("sometimes".parse::<StopWordPolicy>().is_err());
        assert_eq!(StopWordPolicy::Fixed.to_string(), "fixed");
    }

    #[test]
    fn latin1_never_fails() {
        let bytes = [0x63, 0x61, 0x66, 0xe9];
        assert!(TextEncoding::Utf8.decode(&bytes).is_none());
        assert_eq!(TextEncoding::Latin1.decode(&bytes).unwrap(), "café");
    }

    #[test]
    fn empty_encodings_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.build.encodings.clear();
        assert!(cfg.validate().is_err());
    }
}
