//! Record scanning and column-format detection for bilingual corpora.
//!
//! Downloaded corpora are nominally tab-separated, two columns per line, one
//! translation pair per record, but real mirrors disagree on everything:
//! separator (some use single spaces), column order (which side is which
//! language), and hygiene (blank lines, CRLF endings). This crate deals with
//! all of that before any merging happens:
//!
//! - [`scan_records`] splits a raw corpus into field records, adapting its
//!   separator from tab to space the first time a record demands it.
//! - [`detect_format`] samples a corpus, classifies every field against a
//!   restricted language set, and resolves one column per language by
//!   majority vote.
//! - [`LanguageClassifier`] is the seam for the language-identification
//!   engine; [`WhatlangClassifier`] is the production implementation and
//!   tests substitute table-driven fakes.
//!
//! # Example
//! ```rust
//! use bidict_corpus::{WhatlangClassifier, detect_format};
//! use bidict_types::LangCode;
//!
//! let corpus = b"this sentence is thoroughly english\testa frase es claramente espanola\n";
//! let langs = [LangCode::new("eng").unwrap(), LangCode::new("spa").unwrap()];
//! let format = detect_format(corpus, &langs, &WhatlangClassifier)?;
//! assert_eq!(format.column(langs[0]), Some(0));
//! assert_eq!(format.column(langs[1]), Some(1));
//! # Ok::<(), bidict_corpus::CorpusError>(())
//! ```

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, info};
use whatlang::{Detector, Lang};

use bidict_types::{ColumnMap, LangCode};

/// Process every Nth sampled record during format detection. Source corpora
/// routinely run to hundreds of thousands of lines; a 1-in-100 sample settles
/// the column vote long before a full scan would finish.
pub const SAMPLE_STRIDE: usize = 100;

/// Errors produced while scanning or format-detecting a corpus.
#[derive(Debug, Error)]
pub enum CorpusError {
    /// A record that splits into fewer than two fields under the current
    /// separator and the space fallback.
    #[error("malformed record {0:?}: expected at least two separated fields")]
    MalformedRecord(String),
    /// `detect_format` was called with an empty language set.
    #[error("no languages provided for format detection")]
    NoLanguagesProvided,
    /// Two languages resolved to the same column; the corpus layout cannot
    /// be trusted.
    #[error("ambiguous format: column {column} claimed by both {first} and {second}")]
    AmbiguousFormat {
        first: LangCode,
        second: LangCode,
        column: usize,
    },
    /// A requested language was never observed in any sampled field.
    #[error("no column could be resolved for language {0}")]
    UnresolvedLanguage(LangCode),
    /// The corpus holds no records at all.
    #[error("corpus contains no records")]
    EmptyCorpus,
}

/// Field separator for corpus records. Scanning starts on `Tab` and may
/// switch to `Space` once, permanently, for the remainder of the corpus.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Separator {
    Tab,
    Space,
}

impl Separator {
    fn byte(self) -> u8 {
        match self {
            Separator::Tab => b'\t',
            Separator::Space => b' ',
        }
    }
}

/// Scan a raw corpus into field records, invoking `on_record` per record.
///
/// Blank lines are skipped and a trailing `\r` is stripped from each line.
/// The separator starts as tab; the first record yielding fewer than two tab
/// fields is retried with a single space, and on success the space separator
/// sticks for every later record (it never reverts). A record unsplittable
/// either way is [`CorpusError::MalformedRecord`].
///
/// `stride` of `Some(n)` with n > 1 delivers only records at positions where
/// `position % n == 0`, counting non-blank records; this keeps sampling
/// deterministic. `None` (or n <= 1) delivers every record.
///
/// Errors from `on_record` abort the scan immediately.
pub fn scan_records<F>(source: &[u8], stride: Option<usize>, mut on_record: F) -> Result<(), CorpusError>
where
    F: FnMut(&[&[u8]]) -> Result<(), CorpusError>,
{
    let mut separator = Separator::Tab;
    let mut position = 0usize;

    for raw_line in source.split(|b| *b == b'\n') {
        let line = strip_cr(raw_line);
        if line.is_empty() {
            continue;
        }
        let index = position;
        position += 1;
        if let Some(n) = stride
            && n > 1
            && index % n != 0
        {
            continue;
        }

        let fields: Vec<&[u8]> = line.split(|b| *b == separator.byte()).collect();
        if fields.len() >= 2 {
            on_record(&fields)?;
            continue;
        }

        // One-shot fallback: corpora without tabs separate columns with a
        // single space. The switch is permanent for this corpus.
        if separator == Separator::Tab {
            let fields: Vec<&[u8]> = line.split(|b| *b == b' ').collect();
            if fields.len() >= 2 {
                separator = Separator::Space;
                info!("corpus separator switched to single space");
                on_record(&fields)?;
                continue;
            }
        }

        return Err(CorpusError::MalformedRecord(
            String::from_utf8_lossy(line).into_owned(),
        ));
    }
    Ok(())
}

fn strip_cr(line: &[u8]) -> &[u8] {
    if line.ends_with(b"\r") {
        &line[..line.len() - 1]
    } else {
        line
    }
}

/// Language-identification capability consumed by [`detect_format`].
///
/// Given a text fragment and a restricted language set, return the best-guess
/// language or `None` when no confident classification exists. Implementors
/// must be pure with respect to their inputs; the detector calls this for
/// every field of every sampled record.
pub trait LanguageClassifier {
    fn classify(&self, text: &str, allowed: &[LangCode]) -> Option<LangCode>;
}

/// Production classifier backed by the `whatlang` trigram engine, restricted
/// to the requested allowlist.
pub struct WhatlangClassifier;

impl LanguageClassifier for WhatlangClassifier {
    fn classify(&self, text: &str, allowed: &[LangCode]) -> Option<LangCode> {
        if text.trim().is_empty() {
            return None;
        }
        let allowlist: Vec<Lang> = allowed
            .iter()
            .filter_map(|code| Lang::from_code(code.as_str()))
            .collect();
        if allowlist.is_empty() {
            return None;
        }
        let lang = Detector::with_allowlist(allowlist).detect_lang(text)?;
        LangCode::new(lang.code()).ok()
    }
}

/// Discover which column of `source` holds which of `languages`.
///
/// Samples the corpus at [`SAMPLE_STRIDE`], classifies every field of every
/// sampled record, and tallies the columns each language was observed in.
/// Each language resolves to the mode of its tally; a tie goes to the column
/// that reached the winning count first in accumulation order, so the result
/// is deterministic for a given corpus. The resolved mapping is injective:
/// two languages settling on the same column is
/// [`CorpusError::AmbiguousFormat`], and a language that was never observed
/// is [`CorpusError::UnresolvedLanguage`] rather than a silent guess.
pub fn detect_format<C>(
    source: &[u8],
    languages: &[LangCode],
    classifier: &C,
) -> Result<ColumnMap, CorpusError>
where
    C: LanguageClassifier + ?Sized,
{
    detect_format_with_stride(source, languages, classifier, Some(SAMPLE_STRIDE))
}

/// [`detect_format`] with an explicit sampling stride; `None` classifies
/// every record.
pub fn detect_format_with_stride<C>(
    source: &[u8],
    languages: &[LangCode],
    classifier: &C,
    stride: Option<usize>,
) -> Result<ColumnMap, CorpusError>
where
    C: LanguageClassifier + ?Sized,
{
    if languages.is_empty() {
        return Err(CorpusError::NoLanguagesProvided);
    }

    let mut sampled = 0usize;
    let mut tallies: HashMap<LangCode, Vec<usize>> = HashMap::new();
    scan_records(source, stride, |fields| {
        sampled += 1;
        for (column, field) in fields.iter().enumerate() {
            let text = String::from_utf8_lossy(field);
            if let Some(lang) = classifier.classify(&text, languages) {
                tallies.entry(lang).or_default().push(column);
            }
        }
        Ok(())
    })?;

    if sampled == 0 {
        return Err(CorpusError::EmptyCorpus);
    }

    let mut format = ColumnMap::new();
    for &lang in languages {
        let columns = tallies.get(&lang).map(Vec::as_slice).unwrap_or(&[]);
        let column = most_frequent(columns).ok_or(CorpusError::UnresolvedLanguage(lang))?;
        debug!(
            "language {lang} resolved to column {column} from {} observations",
            columns.len()
        );
        format
            .assign(lang, column)
            .map_err(|clash| CorpusError::AmbiguousFormat {
                first: clash.first,
                second: clash.second,
                column: clash.column,
            })?;
    }
    Ok(format)
}

/// Mode of a column tally. Ties resolve to the value that attained the
/// winning count first in accumulation order.
fn most_frequent(values: &[usize]) -> Option<usize> {
    let mut counts: HashMap<usize, usize> = HashMap::new();
    let mut best: Option<(usize, usize)> = None;
    for &value in values {
        let count = counts.entry(value).or_insert(0);
        *count += 1;
        match best {
            Some((_, top)) if *count <= top => {}
            _ => best = Some((value, *count)),
        }
    }
    best.map(|(value, _)| value)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Classifier that maps exact field text to a language, ignoring the
    /// whatlang engine entirely so tests stay deterministic.
    struct TableClassifier(HashMap<&'static str, &'static str>);

    impl TableClassifier {
        fn new(entries: &[(&'static str, &'static str)]) -> Self {
            Self(entries.iter().copied().collect())
        }
    }

    impl LanguageClassifier for TableClassifier {
        fn classify(&self, text: &str, allowed: &[LangCode]) -> Option<LangCode> {
            let code = self.0.get(text).and_then(|c| LangCode::new(c).ok())?;
            allowed.contains(&code).then_some(code)
        }
    }

    fn lang(code: &str) -> LangCode {
        LangCode::new(code).unwrap()
    }

    fn collect_records(source: &[u8], stride: Option<usize>) -> Vec<Vec<String>> {
        let mut records = Vec::new();
        scan_records(source, stride, |fields| {
            records.push(
                fields
                    .iter()
                    .map(|f| String::from_utf8_lossy(f).into_owned())
                    .collect(),
            );
            Ok(())
        })
        .unwrap();
        records
    }

    #[test]
    fn splits_tab_separated_records() {
        let records = collect_records(b"casa\thouse\narbol\ttree\n", None);
        assert_eq!(records, vec![vec!["casa", "house"], vec!["arbol", "tree"]]);
    }

    #[test]
    fn skips_blank_lines_and_strips_cr() {
        let records = collect_records(b"casa\thouse\r\n\n\narbol\ttree\r\n", None);
        assert_eq!(records, vec![vec!["casa", "house"], vec!["arbol", "tree"]]);
    }

    #[test]
    fn falls_back_to_space_separator_permanently() {
        // First record forces the fallback; the later record containing a
        // tab must then split on spaces, not revert.
        let records = collect_records(b"casa house\narbol tree\n", None);
        assert_eq!(records, vec![vec!["casa", "house"], vec!["arbol", "tree"]]);

        let mixed = collect_records(b"casa house\nel arbol\ttree\n", None);
        assert_eq!(mixed, vec![vec!["casa", "house"], vec!["el", "arbol\ttree"]]);
    }

    #[test]
    fn rejects_records_without_any_separator() {
        let err = scan_records(b"casa\thouse\nsolitary\n", None, |_| Ok(())).unwrap_err();
        match err {
            CorpusError::MalformedRecord(record) => assert_eq!(record, "solitary"),
            other => panic!("expected MalformedRecord, got {other:?}"),
        }
    }

    #[test]
    fn stride_samples_deterministically() {
        let source = b"a\t0\nb\t1\nc\t2\nd\t3\ne\t4\nf\t5\n";
        let records = collect_records(source, Some(3));
        assert_eq!(records, vec![vec!["a", "0"], vec!["d", "3"]]);
        // Blank lines do not advance the position counter.
        let gappy = b"a\t0\n\nb\t1\n\nc\t2\nd\t3\n";
        let records = collect_records(gappy, Some(3));
        assert_eq!(records, vec![vec!["a", "0"], vec!["d", "3"]]);
    }

    #[test]
    fn callback_errors_abort_the_scan() {
        let mut seen = 0;
        let err = scan_records(b"a\t0\nb\t1\nc\t2\n", None, |_| {
            seen += 1;
            if seen == 2 {
                Err(CorpusError::EmptyCorpus)
            } else {
                Ok(())
            }
        })
        .unwrap_err();
        assert!(matches!(err, CorpusError::EmptyCorpus));
        assert_eq!(seen, 2);
    }

    fn detect_all<C: LanguageClassifier>(
        source: &[u8],
        languages: &[LangCode],
        classifier: &C,
    ) -> Result<ColumnMap, CorpusError> {
        detect_format_with_stride(source, languages, classifier, None)
    }

    #[test]
    fn detects_columns_by_majority_vote() {
        let classifier = TableClassifier::new(&[
            ("casa", "spa"),
            ("arbol", "spa"),
            ("house", "eng"),
            ("tree", "eng"),
        ]);
        let corpus = b"casa\thouse\narbol\ttree\n";
        let format = detect_all(corpus, &[lang("spa"), lang("eng")], &classifier).unwrap();
        assert_eq!(format.column(lang("spa")), Some(0));
        assert_eq!(format.column(lang("eng")), Some(1));
    }

    #[test]
    fn majority_overrides_stray_observations() {
        // "salsa" misclassifies as English in the table; the vote still
        // lands Spanish on column 0.
        let classifier = TableClassifier::new(&[
            ("casa", "spa"),
            ("arbol", "spa"),
            ("salsa", "eng"),
            ("house", "eng"),
            ("tree", "eng"),
            ("sauce", "eng"),
        ]);
        let corpus = b"casa\thouse\narbol\ttree\nsalsa\tsauce\n";
        let format = detect_all(corpus, &[lang("spa"), lang("eng")], &classifier).unwrap();
        assert_eq!(format.column(lang("spa")), Some(0));
        assert_eq!(format.column(lang("eng")), Some(1));
    }

    #[test]
    fn concentrated_columns_are_ambiguous() {
        // Both languages' hits land in column 0.
        let classifier = TableClassifier::new(&[("casa", "spa"), ("house", "eng")]);
        let corpus = b"casa\tXXXX\nhouse\tXXXX\n";
        let err = detect_all(corpus, &[lang("spa"), lang("eng")], &classifier).unwrap_err();
        assert!(matches!(err, CorpusError::AmbiguousFormat { column: 0, .. }));
    }

    #[test]
    fn unobserved_language_is_unresolved_not_guessed() {
        let classifier = TableClassifier::new(&[("house", "eng"), ("tree", "eng")]);
        let corpus = b"XXXX\thouse\nXXXX\ttree\n";
        let err = detect_all(corpus, &[lang("spa"), lang("eng")], &classifier).unwrap_err();
        assert!(matches!(err, CorpusError::UnresolvedLanguage(l) if l == lang("spa")));
    }

    #[test]
    fn requires_languages_and_records() {
        let classifier = TableClassifier::new(&[]);
        assert!(matches!(
            detect_all(b"a\tb\n", &[], &classifier),
            Err(CorpusError::NoLanguagesProvided)
        ));
        assert!(matches!(
            detect_all(b"\n\n", &[lang("eng")], &classifier),
            Err(CorpusError::EmptyCorpus)
        ));
    }

    #[test]
    fn default_stride_only_samples_every_hundredth_record() {
        let classifier = TableClassifier::new(&[("casa", "spa"), ("house", "eng")]);
        // Records 0 and 100 carry the signal; everything between is filler
        // that would be malformed if it were ever split.
        let mut corpus = Vec::new();
        corpus.extend_from_slice(b"casa\tXXXX\n");
        for _ in 0..99 {
            corpus.extend_from_slice(b"unsplittable\n");
        }
        corpus.extend_from_slice(b"XXXX\thouse\n");
        let format = detect_format(&corpus, &[lang("spa"), lang("eng")], &classifier).unwrap();
        assert_eq!(format.column(lang("spa")), Some(0));
        assert_eq!(format.column(lang("eng")), Some(1));
    }

    #[test]
    fn mode_tie_goes_to_first_to_reach_count() {
        // On a 2-2 tie the winner is whichever column hit count 2 first.
        assert_eq!(most_frequent(&[1, 0, 0, 1]), Some(0));
        assert_eq!(most_frequent(&[0, 1, 1, 0]), Some(1));
        // No tie: the outright majority wins regardless of arrival order.
        assert_eq!(most_frequent(&[2, 2, 0, 0, 0]), Some(0));
        assert_eq!(most_frequent(&[]), None);
    }

    #[test]
    fn whatlang_classifier_respects_allowlist() {
        let allowed = [lang("eng"), lang("spa")];
        let got = WhatlangClassifier.classify("the quick brown fox jumps over the lazy dog", &allowed);
        assert_eq!(got, Some(lang("eng")));
        assert_eq!(WhatlangClassifier.classify("   ", &allowed), None);
        // Unknown codes produce an empty allowlist, never a global guess.
        assert_eq!(WhatlangClassifier.classify("hello there", &[lang("qqq")]), None);
    }
}
