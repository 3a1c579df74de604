use crate::config::TextEncoding;
use lazy_static::lazy_static;
use regex::Regex;
use std::borrow::Cow;
use unicode_normalization::UnicodeNormalization;

/// Shortest token kept by the tokenizer.
pub const MIN_TOKEN_LEN: usize = 2;

lazy_static! {
    static ref MARKUP: Regex = Regex::new(r"<[^>]+>").expect("valid regex");
}

/// Replaces every markup tag with a single space.
pub fn strip_markup(text: &str) -> Cow<'_, str> {
    MARKUP.replace_all(text, " ")
}

/// Decodes raw document bytes with the first encoding that accepts them.
pub fn decode(bytes: &[u8], encodings: &[TextEncoding]) -> Option<String> {
    encodings.iter().find_map(|enc| enc.decode(bytes))
}

/// Normalized document text from which tokens are lazily extracted.
///
/// The stream owns the NFKC-normalized, lowercased text; [`TokenStream::iter`]
/// can be called any number of times and always yields the same sequence.
#[derive(Debug, Clone)]
pub struct TokenStream {
    text: String,
}

impl TokenStream {
    /// Normalizes plain text (no markup removal).
    pub fn new(text: &str) -> Self {
        let text = text.nfkc().collect::<String>().to_lowercase();
        Self { text }
    }

    /// Normalizes a markup document, dropping tags first.
    pub fn from_markup(text: &str) -> Self {
        Self::new(&strip_markup(text))
    }

    pub fn iter(&self) -> Tokens<'_> {
        Tokens { rest: &self.text }
    }
}

impl<'a> IntoIterator for &'a TokenStream {
    type Item = &'a str;
    type IntoIter = Tokens<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over runs of ASCII letters of at least [`MIN_TOKEN_LEN`] bytes.
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    rest: &'a str,
}

impl<'a> Iterator for Tokens<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        loop {
            let bytes = self.rest.as_bytes();
            let start = bytes.iter().position(|b| b.is_ascii_alphabetic())?;
            let len = bytes[start..].iter().take_while(|b| b.is_ascii_alphabetic()).count();
            // ASCII boundaries are always char boundaries
            let token = &self.rest[start..start + len];
            self.rest = &self.rest[start + len..];
            if token.len() >= MIN_TOKEN_LEN {
                return Some(token);
            }
        }
    }
}

/// Tokenize text into owned tokens. Convenience over [`TokenStream`].
pub fn tokenize(text: &str) -> Vec<String> {
    TokenStream::new(text).iter().map(str::to_owned).collect()
}
