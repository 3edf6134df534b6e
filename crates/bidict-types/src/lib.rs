//! Shared types for building bilingual translation dictionaries.
//!
//! Corpora are unlabeled TSV files; which column holds which language is
//! discovered statistically and captured in a [`ColumnMap`]. These types keep
//! the two invariants every downstream stage relies on in one place:
//! language codes are three lowercase ASCII letters ([`LangCode`]), and no
//! two languages of a mapping may claim the same column
//! ([`ColumnMap::assign`]).
//!
//! ```rust
//! use bidict_types::{ColumnMap, LanguagePair};
//!
//! let pair: LanguagePair = "por_eng".parse().unwrap();
//! let mut map = ColumnMap::new();
//! map.assign(pair.source, 1).unwrap();
//! map.assign(pair.target, 0).unwrap();
//! assert!(map.assign(pair.target, 1).is_err());
//! ```

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::str::FromStr;

/// A three-letter language identifier in the style of ISO 639-3 codes
/// (`eng`, `por`, `spa`). Stored lowercase regardless of input case.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct LangCode([u8; 3]);

impl LangCode {
    /// Parse and normalize a code. Anything but exactly three ASCII letters
    /// is rejected.
    pub fn new(code: &str) -> Result<Self, PairError> {
        let bytes = code.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_alphabetic) {
            return Err(PairError::BadCode(code.to_string()));
        }
        let mut out = [0u8; 3];
        for (slot, b) in out.iter_mut().zip(bytes) {
            *slot = b.to_ascii_lowercase();
        }
        Ok(Self(out))
    }

    pub fn as_str(&self) -> &str {
        // Constructor admits ASCII letters only.
        std::str::from_utf8(&self.0).expect("lang code is ascii")
    }
}

impl FromStr for LangCode {
    type Err = PairError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for LangCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for LangCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LangCode({})", self.as_str())
    }
}

/// Ordered (source, target) pair naming one dictionary: words come from
/// `source`, ranked translation candidates from `target`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct LanguagePair {
    pub source: LangCode,
    pub target: LangCode,
}

impl LanguagePair {
    pub fn new(source: LangCode, target: LangCode) -> Self {
        Self { source, target }
    }

    /// Both languages of the pair, source first.
    pub fn languages(&self) -> [LangCode; 2] {
        [self.source, self.target]
    }
}

impl FromStr for LanguagePair {
    type Err = PairError;

    /// Parse a `"xxx_yyy"` pair identifier: exactly two codes joined by a
    /// single underscore.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('_');
        let (source, target) = match (parts.next(), parts.next(), parts.next()) {
            (Some(a), Some(b), None) => (a, b),
            _ => return Err(PairError::BadShape(s.to_string())),
        };
        Ok(Self {
            source: LangCode::new(source)?,
            target: LangCode::new(target)?,
        })
    }
}

impl fmt::Display for LanguagePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.source, self.target)
    }
}

/// Rejected language-pair identifier or language code.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PairError {
    /// Not exactly two codes separated by an underscore.
    BadShape(String),
    /// A code that is not three ASCII letters.
    BadCode(String),
}

impl fmt::Display for PairError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PairError::BadShape(raw) => write!(
                f,
                "language pair {raw:?} must be two ISO 639-3 codes joined by an underscore"
            ),
            PairError::BadCode(raw) => {
                write!(f, "language code {raw:?} must be three ASCII letters")
            }
        }
    }
}

impl Error for PairError {}

/// Resolved assignment of languages to zero-based column indices within a
/// corpus's records. Injective: `assign` refuses a column already claimed by
/// a different language.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnMap {
    columns: HashMap<LangCode, usize>,
}

impl ColumnMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `lang` to `column`, failing if another language already owns it.
    /// Re-assigning the same language replaces its previous column.
    pub fn assign(&mut self, lang: LangCode, column: usize) -> Result<(), ColumnClash> {
        if let Some((&other, _)) = self
            .columns
            .iter()
            .find(|(l, c)| **c == column && **l != lang)
        {
            return Err(ColumnClash {
                first: other,
                second: lang,
                column,
            });
        }
        self.columns.insert(lang, column);
        Ok(())
    }

    pub fn column(&self, lang: LangCode) -> Option<usize> {
        self.columns.get(&lang).copied()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (LangCode, usize)> + '_ {
        self.columns.iter().map(|(l, c)| (*l, *c))
    }
}

/// Two languages resolved to the same column index.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ColumnClash {
    pub first: LangCode,
    pub second: LangCode,
    pub column: usize,
}

impl fmt::Display for ColumnClash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "column {} claimed by both {} and {}",
            self.column, self.first, self.second
        )
    }
}

impl Error for ColumnClash {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lang_codes_are_normalized() {
        assert_eq!(LangCode::new("ENG").unwrap().as_str(), "eng");
        assert_eq!(LangCode::new("por").unwrap(), LangCode::new("POR").unwrap());
        assert!(LangCode::new("en").is_err());
        assert!(LangCode::new("engl").is_err());
        assert!(LangCode::new("e1g").is_err());
    }

    #[test]
    fn parses_pair_identifiers() {
        let pair: LanguagePair = "por_eng".parse().unwrap();
        assert_eq!(pair.source.as_str(), "por");
        assert_eq!(pair.target.as_str(), "eng");
        assert_eq!(pair.to_string(), "por_eng");
    }

    #[test]
    fn rejects_malformed_pair_identifiers() {
        assert!(matches!(
            "por".parse::<LanguagePair>(),
            Err(PairError::BadShape(_))
        ));
        assert!(matches!(
            "por_eng_spa".parse::<LanguagePair>(),
            Err(PairError::BadShape(_))
        ));
        assert!(matches!(
            "po_eng".parse::<LanguagePair>(),
            Err(PairError::BadCode(_))
        ));
    }

    #[test]
    fn column_map_rejects_shared_columns() {
        let eng = LangCode::new("eng").unwrap();
        let por = LangCode::new("por").unwrap();
        let mut map = ColumnMap::new();
        map.assign(eng, 0).unwrap();
        let clash = map.assign(por, 0).unwrap_err();
        assert_eq!(clash.column, 0);
        assert_eq!(clash.first, eng);
        assert_eq!(clash.second, por);
    }

    #[test]
    fn column_map_allows_reassigning_same_language() {
        let eng = LangCode::new("eng").unwrap();
        let mut map = ColumnMap::new();
        map.assign(eng, 0).unwrap();
        map.assign(eng, 2).unwrap();
        assert_eq!(map.column(eng), Some(2));
        assert_eq!(map.len(), 1);
    }
}
