//! Completion candidates and the helpers used to merge candidate sets
//!
//! A [`Candidate`] is one suggestion: the text shown in the completion popup
//! (optionally followed by a tab and a kind hint such as `module` or
//! `keyword`) and the text actually inserted. Equality, ordering and hashing
//! only look at the `(display, insert)` pair, so a candidate resolved from
//! source and the same candidate coming from a package index collapse into one.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Language keywords offered in every plain completion request
pub const HASKELL_KEYWORDS: &[&str] = &[
    "do", "case", "of", "let", "in", "data", "instance", "type", "newtype", "where", "deriving",
    "import", "module",
];

/// Position of a declaration inside project source (1-based)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

/// Where a candidate was declared, present only for project-source symbols
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub position: Option<Position>,
}

/// A single completion suggestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub display: String,
    pub insert: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

pub type CandidateList = Vec<Candidate>;

impl Candidate {
    pub fn new(display: impl Into<String>, insert: impl Into<String>) -> Self {
        Self {
            display: display.into(),
            insert: insert.into(),
            location: None,
        }
    }

    /// Candidate whose display and insertion text are the same string
    pub fn plain(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(text.clone(), text)
    }

    /// Candidate whose display carries a `\t<kind>` suffix
    pub fn with_kind(name: &str, kind: &str, insert: impl Into<String>) -> Self {
        Self::new(format!("{}\t{}", name, kind), insert)
    }

    pub fn keyword(keyword: &str) -> Self {
        Self::with_kind(keyword, "keyword", keyword)
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Display text without the tab-separated kind suffix
    pub fn brief(&self) -> &str {
        self.display.split('\t').next().unwrap_or(&self.display)
    }

    /// Kind suffix of the display text, if any
    pub fn kind(&self) -> Option<&str> {
        self.display.split_once('\t').map(|(_, kind)| kind)
    }

    pub fn has_source_location(&self) -> bool {
        self.location.is_some()
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.display == other.display && self.insert == other.insert
    }
}

impl Eq for Candidate {}

impl Hash for Candidate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.display.hash(state);
        self.insert.hash(state);
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.display
            .cmp(&other.display)
            .then_with(|| self.insert.cmp(&other.insert))
    }
}

/// The fixed keyword candidates, in declaration order
pub fn keyword_candidates() -> CandidateList {
    HASKELL_KEYWORDS.iter().map(|k| Candidate::keyword(k)).collect()
}

/// Sort candidates by display text (stable, duplicates kept)
pub fn sort_completions(candidates: &mut CandidateList) {
    candidates.sort_by(|a, b| a.display.cmp(&b.display));
}

/// Deduplicate on `(display, insert)` and sort by display
pub fn sorted_completions(candidates: impl IntoIterator<Item = Candidate>) -> CandidateList {
    let mut unique: CandidateList = candidates.into_iter().collect();
    unique.sort();
    unique.dedup();
    unique
}

/// Deduplicate while keeping the first occurrence of each pair in place
///
/// Used for merged results where the keyword block must stay in front.
pub fn dedup_preserving_order(candidates: impl IntoIterator<Item = Candidate>) -> CandidateList {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert((c.display.clone(), c.insert.clone())))
        .collect()
}

/// Turn anything that can suggest itself into a deduplicated, sorted list
pub fn make_completions<'a, S>(suggestions: impl IntoIterator<Item = &'a S>) -> CandidateList
where
    S: Suggest + 'a,
{
    sorted_completions(suggestions.into_iter().map(Suggest::suggest))
}

/// `(brief name, location)` pairs for candidates resolved from source, sorted by name
pub fn make_locations(candidates: &[Candidate]) -> Vec<(String, SourceLocation)> {
    let mut locations: Vec<_> = candidates
        .iter()
        .filter_map(|c| c.location.clone().map(|loc| (c.brief().to_string(), loc)))
        .collect();
    locations.sort_by(|a, b| a.0.cmp(&b.0));
    locations
}

/// Something the backend returns that can be shown as a completion
pub trait Suggest {
    fn suggest(&self) -> Candidate;
}

impl Suggest for Candidate {
    fn suggest(&self) -> Candidate {
        self.clone()
    }
}
