/// Cascading anchor search: exact, then case-insensitive, then fuzzy
use crate::{FuzzyParams, MatchQuality, MatchResult, MIN_ANCHOR_LEN};

/// Find where `anchor_text` now lives inside `document`.
///
/// Strategies run in strict priority order and the first hit wins. When a
/// strategy finds several occurrences, the one whose start is numerically
/// closest to `original_offset` is taken, earlier occurrences winning ties.
/// Offsets are byte offsets into `document`, always on char boundaries.
pub fn find_text_in_document(
    document: &str,
    anchor_text: &str,
    original_offset: usize,
    fuzzy: &FuzzyParams,
) -> Option<MatchResult> {
    if anchor_text.chars().count() < MIN_ANCHOR_LEN {
        return None;
    }

    let strategies: [&dyn Fn() -> Option<MatchResult>; 3] = [
        &|| exact_match(document, anchor_text, original_offset),
        &|| case_insensitive_match(document, anchor_text, original_offset),
        &|| fuzzy_match(document, anchor_text, original_offset, fuzzy),
    ];

    strategies.iter().find_map(|strategy| strategy())
}

fn exact_match(document: &str, anchor: &str, original_offset: usize) -> Option<MatchResult> {
    let start = closest_occurrence(
        document.match_indices(anchor).map(|(i, _)| i),
        original_offset,
    )?;
    Some(MatchResult {
        start,
        end: start + anchor.len(),
        quality: MatchQuality::Exact,
    })
}

fn case_insensitive_match(
    document: &str,
    anchor: &str,
    original_offset: usize,
) -> Option<MatchResult> {
    let needle = anchor.to_lowercase();
    let anchor_chars = anchor.chars().count();
    let boundaries = char_boundaries(document);

    let occurrences = window_spans(&boundaries, anchor_chars).filter_map(|(start, end)| {
        let window = &document[start..end];
        (window.to_lowercase() == needle).then_some((start, end))
    });

    let (start, end) = closest_span(occurrences, original_offset)?;
    Some(MatchResult {
        start,
        end,
        quality: MatchQuality::CaseInsensitive,
    })
}

fn fuzzy_match(
    document: &str,
    anchor: &str,
    original_offset: usize,
    params: &FuzzyParams,
) -> Option<MatchResult> {
    let needle = anchor.to_lowercase();
    let anchor_chars = anchor.chars().count();
    let max_distance = (anchor_chars as f64 * params.max_distance_ratio).floor() as usize;

    let boundaries = char_boundaries(document);
    let origin = boundaries
        .partition_point(|&b| b < original_offset.min(document.len()))
        .min(boundaries.len().saturating_sub(1));

    // Search window: pad chars on either side of the original span, clamped
    // to the document.
    let region_start = origin.saturating_sub(params.pad);
    let region_end = (origin + anchor_chars + params.pad).min(boundaries.len() - 1);

    let mut best: Option<(usize, usize, usize)> = None;
    for (i, (start, end)) in window_spans(&boundaries, anchor_chars).enumerate() {
        if i < region_start || i + anchor_chars > region_end {
            continue;
        }
        let distance = levenshtein::levenshtein(&document[start..end].to_lowercase(), &needle);
        if best.map_or(true, |(_, _, d)| distance < d) {
            best = Some((start, end, distance));
        }
    }

    let (start, end, distance) = best?;
    (distance <= max_distance).then_some(MatchResult {
        start,
        end,
        quality: MatchQuality::Fuzzy,
    })
}

/// Byte offsets of every char boundary, with a trailing sentinel at len().
fn char_boundaries(document: &str) -> Vec<usize> {
    let mut boundaries: Vec<usize> = document.char_indices().map(|(i, _)| i).collect();
    boundaries.push(document.len());
    boundaries
}

/// Byte spans of every window of `width` chars, in document order.
fn window_spans(
    boundaries: &[usize],
    width: usize,
) -> impl Iterator<Item = (usize, usize)> + '_ {
    let count = (boundaries.len() - 1).saturating_sub(width - 1);
    (0..count).map(move |i| (boundaries[i], boundaries[i + width]))
}

fn closest_occurrence(
    occurrences: impl Iterator<Item = usize>,
    original_offset: usize,
) -> Option<usize> {
    closest_span(occurrences.map(|s| (s, s)), original_offset).map(|(s, _)| s)
}

fn closest_span(
    spans: impl Iterator<Item = (usize, usize)>,
    original_offset: usize,
) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize, usize)> = None;
    for (start, end) in spans {
        let distance = start.abs_diff(original_offset);
        // strictly-smaller keeps the first (lowest-offset) occurrence on ties
        if best.map_or(true, |(_, _, d)| distance < d) {
            best = Some((start, end, distance));
        }
    }
    best.map(|(start, end, _)| (start, end))
}
