//! Text artifacts of a built index and their loaders.
//!
//! Four files make up an index directory: `dictionary.txt`, `posting.txt`,
//! `documents.txt` and `meta.json` (plus the informational `stopwords.txt`).
//! `meta.json` is written last, so an index without it is incomplete.

use crate::config::StopWordPolicy;
use crate::documents::{DocMeta, DocumentIndex};
use crate::error::{IndexError, Result};
use crate::hash_table::HashTable;
use crate::index::InvertedIndex;
use crate::stopwords::StopList;
use crate::DocId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, create_dir_all, File};
use std::io::{self, BufRead, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Header lines preceding the rows of the dictionary and document files.
const TABLE_HEADER_LINES: usize = 2;
/// Bucket count used when the posting header does not state the token count.
const FALLBACK_OFFSET_CAPACITY: usize = 10_000;
/// Fewest bytes a token section can take: `TOKEN: ` plus a two-letter token and a newline.
const MIN_SECTION_BYTES: u64 = 10;

const TOKEN_PREFIX: &str = "TOKEN: ";
const IDF_PREFIX: &str = "IDF:";
const COUNT_PREFIX: &str = "Documents (";
const RECORD_PREFIX: &str = "documentID:";
const TOKEN_COUNT_PREFIX: &str = "Total unique tokens:";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: usize,
    pub num_tokens: usize,
    pub skipped_documents: usize,
    pub stop_words: usize,
    pub stop_word_policy: StopWordPolicy,
    pub created_at: String,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn dictionary(&self) -> PathBuf { self.root.join("dictionary.txt") }
    pub fn postings(&self) -> PathBuf { self.root.join("posting.txt") }
    pub fn documents(&self) -> PathBuf { self.root.join("documents.txt") }
    pub fn stopwords(&self) -> PathBuf { self.root.join("stopwords.txt") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
}

/// One row of the dictionary file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DictionaryRecord {
    pub total_frequency: u64,
    pub document_frequency: usize,
    pub idf: f64,
}

/// One entry line of the posting file.
#[derive(Debug, Clone, PartialEq)]
pub struct PostingRecord {
    pub doc_id: DocId,
    pub doc_name: String,
    pub raw_frequency: u32,
    pub weight: f64,
}

/// A token section of the posting file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostingBlock {
    pub token: String,
    pub idf: f64,
    pub records: Vec<PostingRecord>,
}

impl PostingBlock {
    fn new(token: &str) -> Self {
        Self { token: token.to_owned(), idf: 0.0, records: Vec::new() }
    }
}

/// Everything loaded back into memory by [`load_full`].
#[derive(Debug, Default)]
pub struct LoadedIndex {
    pub dictionary: BTreeMap<String, DictionaryRecord>,
    pub postings: HashMap<String, PostingBlock>,
    pub documents: DocumentIndex,
    pub skipped_records: usize,
}

fn write_file<F>(path: &Path, body: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    let file = File::create(path).map_err(|e| IndexError::io(path, e))?;
    let mut w = BufWriter::new(file);
    body(&mut w).and_then(|_| w.flush()).map_err(|e| IndexError::io(path, e))
}

pub fn save_dictionary(paths: &IndexPaths, index: &InvertedIndex) -> Result<()> {
    write_file(&paths.dictionary(), |w| {
        writeln!(w, "Token\tTotalFrequency\t#Documents\tIDF")?;
        writeln!(w, "{}", "-".repeat(80))?;
        for (token, term) in &index.terms {
            writeln!(w, "{token}\t{}\t{}\t{:.6}", term.total_frequency, term.document_frequency(), term.idf)?;
        }
        Ok(())
    })
}

pub fn save_postings(paths: &IndexPaths, index: &InvertedIndex) -> Result<()> {
    write_file(&paths.postings(), |w| {
        writeln!(w, "POSTING FILE - DOCUMENTS WITH TF-IDF WEIGHTS")?;
        writeln!(w, "{}", "=".repeat(80))?;
        writeln!(w, "{TOKEN_COUNT_PREFIX} {}", index.num_terms())?;
        writeln!(w, "Total documents: {}", index.num_docs())?;
        writeln!(w, "{}", "=".repeat(80))?;
        writeln!(w)?;
        for (token, term) in &index.terms {
            writeln!(w, "{TOKEN_PREFIX}{token}")?;
            writeln!(w, "  {IDF_PREFIX} {:.6}", term.idf)?;
            writeln!(w, "  {COUNT_PREFIX}{}):", term.document_frequency())?;
            for p in &term.postings {
                let name = index.documents.resolve(p.doc_id).map_or("-", |m| m.name.as_str());
                writeln!(w, "    {RECORD_PREFIX}{} | {} | freq:{} | peso:{:.6}", p.doc_id, name, p.raw_frequency, p.weight)?;
            }
            writeln!(w)?;
        }
        Ok(())
    })
}

pub fn save_documents(paths: &IndexPaths, documents: &DocumentIndex) -> Result<()> {
    write_file(&paths.documents(), |w| {
        writeln!(w, "documentID\tdocument_name\tpath")?;
        writeln!(w, "{}", "-".repeat(80))?;
        for (id, meta) in documents.iter() {
            writeln!(w, "{id}\t{}\t{}", meta.name, meta.path)?;
        }
        Ok(())
    })
}

pub fn save_stopwords(paths: &IndexPaths, stop_list: &StopList) -> Result<()> {
    write_file(&paths.stopwords(), |w| {
        writeln!(w, "Token\tSource")?;
        writeln!(w, "{}", "-".repeat(80))?;
        for (token, source) in stop_list.iter() {
            writeln!(w, "{token}\t{source}")?;
        }
        Ok(())
    })
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    let path = paths.meta();
    let json = serde_json::to_string_pretty(meta).map_err(|e| IndexError::io(&path, e.into()))?;
    fs::write(&path, json).map_err(|e| IndexError::io(&path, e))
}

/// Writes every artifact of `index`; `meta.json` goes last.
pub fn save_index(paths: &IndexPaths, index: &InvertedIndex, stop_list: &StopList, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root).map_err(|e| IndexError::io(&paths.root, e))?;
    // a stale meta file must not vouch for half-written artifacts
    match fs::remove_file(paths.meta()) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(IndexError::io(paths.meta(), e)),
    }
    save_documents(paths, &index.documents)?;
    save_dictionary(paths, index)?;
    save_postings(paths, index)?;
    save_stopwords(paths, stop_list)?;
    save_meta(paths, meta)
}

/// Checks that the dictionary, posting, document and meta files exist and are non-empty.
pub fn verify_artifacts(paths: &IndexPaths) -> Result<()> {
    for path in [paths.dictionary(), paths.postings(), paths.documents(), paths.meta()] {
        let usable = fs::metadata(&path).map(|m| m.is_file() && m.len() > 0).unwrap_or(false);
        if !usable {
            return Err(IndexError::MissingArtifact { path });
        }
    }
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let path = paths.meta();
    let raw = fs::read_to_string(&path).map_err(|e| IndexError::io(&path, e))?;
    serde_json::from_str(&raw).map_err(|e| IndexError::io(&path, e.into()))
}

fn open(path: &Path) -> Result<BufReader<File>> {
    File::open(path).map(BufReader::new).map_err(|e| IndexError::io(path, e))
}

/// Reads one `\n`-terminated line. `Ok(None)` at EOF; the byte count includes the terminator.
fn next_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>, path: &Path) -> Result<Option<usize>> {
    buf.clear();
    let n = reader.read_until(b'\n', buf).map_err(|e| IndexError::io(path, e))?;
    Ok(if n == 0 { None } else { Some(n) })
}

fn skip_malformed(file: &Path, line: usize, reason: impl Into<String>) {
    let err = IndexError::MalformedRecord { file: file.to_path_buf(), line, reason: reason.into() };
    tracing::warn!(%err, "skipping record");
}

/// Runs `row` over each non-blank line after the table header. Returns the number of skipped lines.
fn for_each_row<F>(path: &Path, mut row: F) -> Result<usize>
where
    F: FnMut(&str) -> std::result::Result<(), String>,
{
    let mut reader = open(path)?;
    let mut buf = Vec::new();
    let mut line_no = 0usize;
    let mut skipped = 0usize;
    while next_line(&mut reader, &mut buf, path)?.is_some() {
        line_no += 1;
        if line_no <= TABLE_HEADER_LINES {
            continue;
        }
        let outcome = match std::str::from_utf8(&buf) {
            Ok(line) if line.trim().is_empty() => Ok(()),
            Ok(line) => row(line.trim_end_matches(|c| c == '\n' || c == '\r')),
            Err(_) => Err("invalid utf-8".to_owned()),
        };
        if let Err(reason) = outcome {
            skip_malformed(path, line_no, reason);
            skipped += 1;
        }
    }
    Ok(skipped)
}

pub fn parse_dictionary_line(line: &str) -> std::result::Result<(String, DictionaryRecord), String> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 4 || fields[0].is_empty() {
        return Err(format!("expected 4 tab-separated fields, found {}", fields.len()));
    }
    let total_frequency = fields[1].trim().parse().map_err(|_| format!("bad total frequency '{}'", fields[1]))?;
    let document_frequency = fields[2].trim().parse().map_err(|_| format!("bad document frequency '{}'", fields[2]))?;
    let idf = fields[3].trim().parse().map_err(|_| format!("bad idf '{}'", fields[3]))?;
    Ok((fields[0].to_owned(), DictionaryRecord { total_frequency, document_frequency, idf }))
}

pub fn parse_document_line(line: &str) -> std::result::Result<(DocId, DocMeta), String> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 3 {
        return Err(format!("expected 3 tab-separated fields, found {}", fields.len()));
    }
    let id = fields[0].trim().parse().map_err(|_| format!("bad document id '{}'", fields[0]))?;
    Ok((id, DocMeta { name: fields[1].to_owned(), path: fields[2].to_owned() }))
}

/// Parses `documentID:<id> | <name> | freq:<n> | peso:<w>`. The name may itself contain ` | `.
pub fn parse_posting_line(line: &str) -> std::result::Result<PostingRecord, String> {
    let parts: Vec<&str> = line.trim().split(" | ").collect();
    if parts.len() < 4 {
        return Err(format!("expected 4 '|'-separated fields, found {}", parts.len()));
    }
    let n = parts.len();
    fn field<'a>(raw: &'a str, prefix: &str) -> std::result::Result<&'a str, String> {
        raw.trim().strip_prefix(prefix).map(str::trim).ok_or_else(|| format!("missing '{prefix}' in '{raw}'"))
    }
    let doc_id = field(parts[0], RECORD_PREFIX)?.parse().map_err(|_| format!("bad document id '{}'", parts[0]))?;
    let raw_frequency = field(parts[n - 2], "freq:")?.parse().map_err(|_| format!("bad frequency '{}'", parts[n - 2]))?;
    let weight = field(parts[n - 1], "peso:")?.parse().map_err(|_| format!("bad weight '{}'", parts[n - 1]))?;
    Ok(PostingRecord { doc_id, doc_name: parts[1..n - 2].join(" | "), raw_frequency, weight })
}

enum PostingLine<'a> {
    Token(&'a str),
    Idf(f64),
    Count,
    Record(PostingRecord),
    Blank,
    Other,
}

fn classify(line: &str) -> std::result::Result<PostingLine<'_>, String> {
    if let Some(token) = line.strip_prefix(TOKEN_PREFIX) {
        return Ok(PostingLine::Token(token.trim()));
    }
    let trimmed = line.trim();
    if trimmed.is_empty() {
        Ok(PostingLine::Blank)
    } else if let Some(rest) = trimmed.strip_prefix(IDF_PREFIX) {
        rest.trim().parse().map(PostingLine::Idf).map_err(|_| format!("bad idf '{}'", rest.trim()))
    } else if trimmed.starts_with(COUNT_PREFIX) {
        Ok(PostingLine::Count)
    } else if trimmed.starts_with(RECORD_PREFIX) {
        parse_posting_line(trimmed).map(PostingLine::Record)
    } else {
        Ok(PostingLine::Other)
    }
}

pub fn load_dictionary(paths: &IndexPaths) -> Result<(BTreeMap<String, DictionaryRecord>, usize)> {
    let mut dictionary = BTreeMap::new();
    let skipped = for_each_row(&paths.dictionary(), |line| {
        let (token, record) = parse_dictionary_line(line)?;
        dictionary.insert(token, record);
        Ok(())
    })?;
    Ok((dictionary, skipped))
}

pub fn load_documents(paths: &IndexPaths) -> Result<(DocumentIndex, usize)> {
    let mut rows = Vec::new();
    let skipped = for_each_row(&paths.documents(), |line| {
        rows.push(parse_document_line(line)?);
        Ok(())
    })?;
    rows.sort_by_key(|(id, _)| *id);
    let (documents, rejected) = DocumentIndex::from_rows(rows);
    Ok((documents, skipped + rejected))
}

/// Loads every posting block. Returns the blocks keyed by token and the number of skipped lines.
pub fn load_postings(paths: &IndexPaths) -> Result<(HashMap<String, PostingBlock>, usize)> {
    let path = paths.postings();
    let mut reader = open(&path)?;
    let mut buf = Vec::new();
    let mut blocks: HashMap<String, PostingBlock> = HashMap::new();
    let mut current: Option<PostingBlock> = None;
    let mut line_no = 0usize;
    let mut skipped = 0usize;
    while next_line(&mut reader, &mut buf, &path)?.is_some() {
        line_no += 1;
        let parsed = std::str::from_utf8(&buf).map_err(|_| "invalid utf-8".to_owned()).and_then(classify);
        match parsed {
            Ok(PostingLine::Token(token)) => {
                if let Some(done) = current.replace(PostingBlock::new(token)) {
                    blocks.insert(done.token.clone(), done);
                }
            }
            Ok(PostingLine::Idf(idf)) => match current.as_mut() {
                Some(block) => block.idf = idf,
                None => {
                    skip_malformed(&path, line_no, "idf outside a token section");
                    skipped += 1;
                }
            },
            Ok(PostingLine::Record(record)) => match current.as_mut() {
                Some(block) => block.records.push(record),
                None => {
                    skip_malformed(&path, line_no, "posting outside a token section");
                    skipped += 1;
                }
            },
            Ok(PostingLine::Count | PostingLine::Blank) => {}
            Ok(PostingLine::Other) => {
                if current.is_some() {
                    skip_malformed(&path, line_no, "unrecognized line");
                    skipped += 1;
                }
            }
            Err(reason) => {
                skip_malformed(&path, line_no, reason);
                skipped += 1;
            }
        }
    }
    if let Some(done) = current {
        blocks.insert(done.token.clone(), done);
    }
    Ok((blocks, skipped))
}

/// Reconstructs dictionary, postings and documents in memory.
pub fn load_full(paths: &IndexPaths) -> Result<LoadedIndex> {
    let (documents, doc_skipped) = load_documents(paths)?;
    let (dictionary, dict_skipped) = load_dictionary(paths)?;
    let (postings, post_skipped) = load_postings(paths)?;
    let skipped_records = doc_skipped + dict_skipped + post_skipped;
    tracing::info!(
        num_docs = documents.len(),
        num_tokens = dictionary.len(),
        skipped_records,
        "index loaded into memory"
    );
    Ok(LoadedIndex { dictionary, postings, documents, skipped_records })
}

/// Scans the posting file once and maps every token to the byte offset just past its `TOKEN:` line.
///
/// The table gets `capacity_factor` buckets per token announced in the posting
/// header and does not grow afterwards.
pub fn build_offset_index(paths: &IndexPaths, capacity_factor: usize) -> Result<HashTable<String, u64>> {
    let path = paths.postings();
    let file_len = fs::metadata(&path).map_err(|e| IndexError::io(&path, e))?.len();
    let mut reader = open(&path)?;
    let mut buf = Vec::new();
    let mut announced: Option<usize> = None;
    let mut table: Option<HashTable<String, u64>> = None;
    let mut pos: u64 = 0;
    let mut line_no = 0usize;
    while let Some(n) = next_line(&mut reader, &mut buf, &path)? {
        line_no += 1;
        pos += n as u64;
        let Ok(line) = std::str::from_utf8(&buf) else {
            if table.is_some() {
                skip_malformed(&path, line_no, "invalid utf-8");
            }
            continue;
        };
        if table.is_none() {
            if let Some(rest) = line.trim().strip_prefix(TOKEN_COUNT_PREFIX) {
                announced = rest.trim().parse().ok().filter(|&n: &usize| n as u64 <= file_len / MIN_SECTION_BYTES);
                if announced.is_none() {
                    skip_malformed(&path, line_no, format!("implausible token count '{}'", rest.trim()));
                }
            }
        }
        if let Some(token) = line.strip_prefix(TOKEN_PREFIX) {
            let offsets = table.get_or_insert_with(|| {
                let capacity = announced.map_or(FALLBACK_OFFSET_CAPACITY, |n| n.saturating_mul(capacity_factor));
                HashTable::with_capacity(capacity)
            });
            if offsets.put(token.trim().to_owned(), pos).is_some() {
                skip_malformed(&path, line_no, format!("duplicate token section '{}'", token.trim()));
            }
        }
    }
    let table = table.unwrap_or_else(|| HashTable::with_capacity(announced.unwrap_or(1).max(1)));
    let stats = table.statistics();
    tracing::info!(
        num_tokens = stats.count,
        capacity = stats.capacity,
        load_factor = stats.load_factor,
        collisions = stats.collisions,
        "offset index built"
    );
    Ok(table)
}

/// Reads the block of `token` starting at `offset`, stopping at the next `TOKEN:` line.
pub fn read_block_at(paths: &IndexPaths, token: &str, offset: u64) -> Result<PostingBlock> {
    let path = paths.postings();
    let mut file = File::open(&path).map_err(|e| IndexError::io(&path, e))?;
    file.seek(SeekFrom::Start(offset)).map_err(|e| IndexError::io(&path, e))?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    let mut block = PostingBlock::new(token);
    while next_line(&mut reader, &mut buf, &path)?.is_some() {
        let parsed = std::str::from_utf8(&buf).map_err(|_| "invalid utf-8".to_owned()).and_then(classify);
        match parsed {
            Ok(PostingLine::Token(_)) => break,
            Ok(PostingLine::Idf(idf)) => block.idf = idf,
            Ok(PostingLine::Record(record)) => block.records.push(record),
            Ok(PostingLine::Count | PostingLine::Blank) => {}
            Ok(PostingLine::Other) => skip_malformed(&path, 0, format!("unrecognized line in section '{token}'")),
            Err(reason) => skip_malformed(&path, 0, reason),
        }
    }
    Ok(block)
}
