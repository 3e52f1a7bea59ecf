/// Position recovery: relocating comment anchors after the document changed
use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use anchor::{find_text_in_document, MatchQuality};

use crate::{Comment, CommentId, RecoveryResult, RecoveryStatus, SyncConfig};

/// Decide where `comment` should anchor in the current `document`.
///
/// `now` is passed in rather than read from the clock so the freshness
/// policy is deterministic under test.
pub fn recover_comment_position(
    comment: &Comment,
    document: &str,
    now: DateTime<Utc>,
    config: &SyncConfig,
) -> RecoveryResult {
    // Just after creation the stored offsets are known-correct editor
    // coordinates; re-deriving them from a plain-text projection at this
    // instant introduces drift instead of fixing it.
    let age = now.signed_duration_since(comment.created_at);
    if age < Duration::milliseconds(config.creation_skip_ms) {
        return fallback(comment, "comment is fresh, using stored positions");
    }

    let anchor_text = match comment.highlighted_text.as_deref() {
        Some(text) if !text.is_empty() => text,
        // comments predating anchor capture cannot be recovered this way
        _ => return fallback(comment, "no anchor text captured, using stored positions"),
    };

    match find_text_in_document(
        document,
        anchor_text,
        comment.start_position,
        &config.fuzzy_params(),
    ) {
        Some(found) => {
            let (status, message) = match found.quality {
                MatchQuality::Exact | MatchQuality::CaseInsensitive => {
                    (RecoveryStatus::Relocated, "anchor text relocated")
                }
                _ => (
                    RecoveryStatus::Uncertain,
                    "approximate match, please verify",
                ),
            };
            RecoveryResult {
                status,
                new_start_position: found.start,
                new_end_position: found.end,
                match_quality: found.quality,
                message: message.to_string(),
            }
        }
        None => RecoveryResult {
            status: RecoveryStatus::Orphaned,
            new_start_position: comment.start_position.min(document.len()),
            new_end_position: comment.end_position.min(document.len()),
            match_quality: MatchQuality::None,
            message: "anchor text no longer present in document".to_string(),
        },
    }
}

/// Recover every comment independently; no cross-comment interaction.
pub fn batch_recover_comment_positions(
    comments: &[Comment],
    document: &str,
    now: DateTime<Utc>,
    config: &SyncConfig,
) -> HashMap<CommentId, RecoveryResult> {
    comments
        .iter()
        .map(|comment| {
            (
                comment.id,
                recover_comment_position(comment, document, now, config),
            )
        })
        .collect()
}

fn fallback(comment: &Comment, message: &str) -> RecoveryResult {
    RecoveryResult {
        status: RecoveryStatus::Fallback,
        new_start_position: comment.start_position,
        new_end_position: comment.end_position,
        match_quality: MatchQuality::None,
        message: message.to_string(),
    }
}
