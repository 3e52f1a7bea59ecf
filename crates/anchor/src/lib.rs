/// Text anchor matching for position-anchored annotations
/// Relocates a stored text snippet inside a document after the document changed
use serde::{Deserialize, Serialize};

mod search;
pub use search::*;

/// Minimum anchor length worth searching for; shorter snippets are too
/// ambiguous to anchor anything.
pub const MIN_ANCHOR_LEN: usize = 3;

/// Categorical confidence of a text-anchor match
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchQuality {
    Exact,
    CaseInsensitive,
    Fuzzy,
    Poor,
    None,
}

/// A relocated anchor: byte offsets into the searched document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Byte offset where the anchor now starts
    pub start: usize,

    /// Byte offset one past the anchor's new end
    pub end: usize,

    /// How confident the match is
    pub quality: MatchQuality,
}

/// Tuning for the fuzzy sliding-window stage
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FuzzyParams {
    /// Characters of slack searched on each side of the original offset
    pub pad: usize,

    /// Accepted edit distance as a fraction of the anchor length
    pub max_distance_ratio: f64,
}

impl Default for FuzzyParams {
    fn default() -> Self {
        Self {
            pad: 50,
            max_distance_ratio: 0.2,
        }
    }
}

/// Classify how well two already-known strings match each other.
///
/// This is a standalone grader for re-checking a stored anchor against the
/// text currently spanned by a comment; the search cascade in
/// [`find_text_in_document`] does not go through it.
pub fn calculate_match_quality(a: &str, b: &str) -> MatchQuality {
    if a == b {
        return MatchQuality::Exact;
    }
    let (la, lb) = (a.to_lowercase(), b.to_lowercase());
    if la == lb {
        return MatchQuality::CaseInsensitive;
    }

    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return MatchQuality::Exact;
    }
    let distance = levenshtein::levenshtein(&la, &lb);
    let similarity = 1.0 - distance as f64 / max_len as f64;

    if similarity >= 0.8 {
        MatchQuality::Fuzzy
    } else if similarity >= 0.5 {
        MatchQuality::Poor
    } else {
        MatchQuality::None
    }
}
