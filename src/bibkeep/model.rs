use crate::error::{BibError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Placeholder shown for a field the record does not carry.
pub const MISSING_FIELD: &str = "none";

/// The entry types a record may declare. Matching is case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Article,
    Book,
    Booklet,
    Conference,
    InBook,
    InCollection,
    InProceedings,
    Manual,
    MastersThesis,
    Misc,
    PhdThesis,
    Proceedings,
    TechReport,
    Unpublished,
}

impl EntryType {
    pub const ALL: [EntryType; 14] = [
        EntryType::Article,
        EntryType::Book,
        EntryType::Booklet,
        EntryType::Conference,
        EntryType::InBook,
        EntryType::InCollection,
        EntryType::InProceedings,
        EntryType::Manual,
        EntryType::MastersThesis,
        EntryType::Misc,
        EntryType::PhdThesis,
        EntryType::Proceedings,
        EntryType::TechReport,
        EntryType::Unpublished,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Article => "article",
            EntryType::Book => "book",
            EntryType::Booklet => "booklet",
            EntryType::Conference => "conference",
            EntryType::InBook => "inbook",
            EntryType::InCollection => "incollection",
            EntryType::InProceedings => "inproceedings",
            EntryType::Manual => "manual",
            EntryType::MastersThesis => "mastersthesis",
            EntryType::Misc => "misc",
            EntryType::PhdThesis => "phdthesis",
            EntryType::Proceedings => "proceedings",
            EntryType::TechReport => "techreport",
            EntryType::Unpublished => "unpublished",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        EntryType::ALL
            .iter()
            .find(|t| t.as_str() == lowered)
            .copied()
            .ok_or_else(|| format!("Unknown entry type: {}", s))
    }
}

/// A validated entry located inside some text.
///
/// `raw` is the exact matched span (from `@` through the closing brace), so
/// it can be searched for and replaced verbatim in the file it came from.
/// `type_token` keeps the spelling used in the source; `fields` keep their
/// order of appearance with values untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub entry_type: EntryType,
    pub type_token: String,
    pub keyword: String,
    pub fields: Vec<(String, String)>,
    pub raw: String,
}

impl Record {
    /// Case-insensitive field lookup.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A record flattened for display, one row per keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayRow {
    pub keyword: String,
    pub entry_type: EntryType,
    pub title: String,
    pub author: String,
    pub year: String,
    pub url: String,
    pub doi: String,
}

/// What produced a history snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ActionKind {
    Init,
    Write,
    Delete,
    Reformat,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Init => "init",
            ActionKind::Write => "write",
            ActionKind::Delete => "delete",
            ActionKind::Reformat => "reformat",
        };
        f.write_str(name)
    }
}

/// Which punctuation wraps field values after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClosureStyle {
    /// `title = {...}`
    #[default]
    Brace,
    /// `title = "..."`
    Quote,
}

impl ClosureStyle {
    pub fn from_brace_flag(to_brace_form: bool) -> Self {
        if to_brace_form {
            ClosureStyle::Brace
        } else {
            ClosureStyle::Quote
        }
    }
}

/// Result of reading the selected file into the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    NoFile,
    ReadError(String),
    NoEntriesFound,
    Rows(Vec<DisplayRow>),
}

impl ReadOutcome {
    /// Maps the outcome onto the error taxonomy. `path` names the file in
    /// the `NoEntriesFound` case.
    pub fn into_result(self, path: Option<PathBuf>) -> Result<Vec<DisplayRow>> {
        match self {
            ReadOutcome::Rows(rows) => Ok(rows),
            ReadOutcome::NoFile => Err(BibError::NoFileSelected),
            ReadOutcome::ReadError(msg) => Err(BibError::read(
                path.unwrap_or_default(),
                std::io::Error::other(msg),
            )),
            ReadOutcome::NoEntriesFound => {
                Err(BibError::NoEntriesFound(path.unwrap_or_default()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_type_parses_case_insensitively() {
        assert_eq!("ARTICLE".parse::<EntryType>(), Ok(EntryType::Article));
        assert_eq!("InProceedings".parse::<EntryType>(), Ok(EntryType::InProceedings));
        assert!("webpage".parse::<EntryType>().is_err());
    }

    #[test]
    fn field_lookup_ignores_case() {
        let record = Record {
            entry_type: EntryType::Misc,
            type_token: "misc".into(),
            keyword: "k".into(),
            fields: vec![("Author".into(), "{X}".into())],
            raw: String::new(),
        };
        assert_eq!(record.field("author"), Some("{X}"));
        assert_eq!(record.field("title"), None);
    }

    #[test]
    fn read_outcome_maps_to_errors() {
        assert!(matches!(
            ReadOutcome::NoFile.into_result(None),
            Err(BibError::NoFileSelected)
        ));
        assert!(matches!(
            ReadOutcome::NoEntriesFound.into_result(Some("a.bib".into())),
            Err(BibError::NoEntriesFound(_))
        ));
        assert_eq!(ReadOutcome::Rows(vec![]).into_result(None).unwrap(), vec![]);
    }
}
