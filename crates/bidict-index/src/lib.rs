//! The merge index at the heart of dictionary building.
//!
//! A [`TranslationDict`] owns every word → ranked-translations entry for one
//! language pair. Corpora are ingested one after another through a resolved
//! [`ColumnMap`]; each observed (word, variant) pair either creates a variant
//! entry with score 1 or bumps the existing entry's score. Scores are
//! cumulative co-occurrence evidence across all merged corpora, never
//! probabilities, so ingestion order cannot change the final ranking.
//!
//! Lookup and both export forms rank variants by score descending with ties
//! broken by lexical order of the variant text, ascending. Exports list words
//! in lexical order. Both rules are deliberate: output is byte-stable across
//! runs and never depends on map iteration order.
//!
//! # Example
//! ```rust
//! use bidict_index::TranslationDict;
//!
//! let mut dict = TranslationDict::new("spa_eng".parse().unwrap());
//! dict.add_variant("hola", "hello");
//! dict.add_variant("hola", "hello");
//! dict.add_variant("hola", "hi");
//! let ranked = dict.lookup("hola");
//! assert_eq!(ranked[0].variant, "hello");
//! assert_eq!(ranked[0].score, 2);
//! ```

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use serde_json::json;
use tracing::debug;

use bidict_corpus::{CorpusError, scan_records};
use bidict_types::{ColumnMap, LanguagePair};

/// One ranked translation candidate for a word.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Suggestion {
    pub variant: String,
    pub score: u32,
}

/// Word → ranked-translations index for a single language pair.
///
/// Created empty, mutated only by ingestion, and never merged with another
/// instance; concurrent pair builds each own their private dictionary.
#[derive(Debug)]
pub struct TranslationDict {
    pair: LanguagePair,
    entries: HashMap<String, Vec<Suggestion>>,
}

impl TranslationDict {
    pub fn new(pair: LanguagePair) -> Self {
        Self {
            pair,
            entries: HashMap::new(),
        }
    }

    pub fn pair(&self) -> LanguagePair {
        self.pair
    }

    /// Record one sighting of `variant` as a translation of `word`.
    ///
    /// Structurally idempotent: repeat sightings never duplicate the variant
    /// entry, they only raise its score. Callers are expected to pass
    /// normalized (lowercased) text; [`ingest`](Self::ingest) does so.
    pub fn add_variant(&mut self, word: &str, variant: &str) {
        bump(self.entries.entry(word.to_string()).or_default(), variant);
    }

    /// Merge a whole corpus into the index through a resolved column layout.
    ///
    /// Scans every record (no sampling), lowercasing the source-language
    /// field as the word and the target-language field as the variant.
    /// A record missing either column is [`CorpusError::MalformedRecord`] and
    /// aborts the ingest; the caller must skip or re-fetch the corpus, the
    /// index never absorbs part of one.
    pub fn ingest(&mut self, source: &[u8], format: &ColumnMap) -> Result<(), CorpusError> {
        let word_column = format
            .column(self.pair.source)
            .ok_or(CorpusError::UnresolvedLanguage(self.pair.source))?;
        let variant_column = format
            .column(self.pair.target)
            .ok_or(CorpusError::UnresolvedLanguage(self.pair.target))?;

        let entries = &mut self.entries;
        scan_records(source, None, |fields| {
            let word = field_text(fields, word_column)?;
            let variant = field_text(fields, variant_column)?;
            bump(entries.entry(word).or_default(), &variant);
            Ok(())
        })?;
        debug!("{} holds {} words after ingest", self.pair, self.entries.len());
        Ok(())
    }

    /// All variants recorded for `word`, ranked; empty if the word is absent.
    pub fn lookup(&self, word: &str) -> Vec<Suggestion> {
        let mut suggestions = self.entries.get(word).cloned().unwrap_or_default();
        rank(&mut suggestions);
        suggestions
    }

    pub fn contains(&self, word: &str) -> bool {
        self.entries.contains_key(word)
    }

    /// Number of distinct source-language words.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the flat delimited export: one line per word,
    /// `word<TAB>variant<TAB>score...`, variants ranked, words in lexical
    /// order.
    pub fn write_tsv<W: Write>(&self, mut writer: W) -> io::Result<()> {
        for (word, suggestions) in self.ranked_entries() {
            write!(writer, "{word}")?;
            for suggestion in &suggestions {
                write!(writer, "\t{}\t{}", suggestion.variant, suggestion.score)?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }

    /// Export the TSV form to a file.
    pub fn export(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_tsv(&mut writer)?;
        writer.flush()
    }

    /// JSON object mapping each word to its ranked suggestion list.
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (word, suggestions) in self.ranked_entries() {
            let ranked: Vec<_> = suggestions
                .iter()
                .map(|s| json!({ "variant": s.variant, "score": s.score }))
                .collect();
            map.insert(word.clone(), json!(ranked));
        }
        serde_json::Value::Object(map)
    }

    fn ranked_entries(&self) -> impl Iterator<Item = (&String, Vec<Suggestion>)> {
        let mut words: Vec<&String> = self.entries.keys().collect();
        words.sort();
        words.into_iter().map(move |word| {
            let mut suggestions = self.entries[word].clone();
            rank(&mut suggestions);
            (word, suggestions)
        })
    }
}

fn bump(variants: &mut Vec<Suggestion>, variant: &str) {
    if let Some(existing) = variants.iter_mut().find(|s| s.variant == variant) {
        existing.score += 1;
    } else {
        variants.push(Suggestion {
            variant: variant.to_string(),
            score: 1,
        });
    }
}

/// Score descending, ties by variant text ascending.
fn rank(suggestions: &mut [Suggestion]) {
    suggestions.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.variant.cmp(&b.variant)));
}

fn field_text(fields: &[&[u8]], column: usize) -> Result<String, CorpusError> {
    let field = fields.get(column).ok_or_else(|| {
        let record = fields
            .iter()
            .map(|f| String::from_utf8_lossy(f))
            .collect::<Vec<_>>()
            .join("\t");
        CorpusError::MalformedRecord(record)
    })?;
    Ok(String::from_utf8_lossy(field).to_lowercase())
}
