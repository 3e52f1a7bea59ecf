/// Data model: anchored comments, derived threads, recovery results
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use anchor::MatchQuality;

use crate::{CommentId, ScriptId, UserId};

/// A position-anchored annotation on a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    /// Server-assigned, stable id
    pub id: CommentId,

    /// Owning document
    pub script_id: ScriptId,

    /// Author
    pub user_id: UserId,

    /// Comment body
    pub content: String,

    /// Offset into the document's plain-text projection where the anchored
    /// span starts; always <= end_position
    pub start_position: usize,

    /// Offset one past the end of the anchored span
    pub end_position: usize,

    /// Snapshot of the text originally spanned, captured at creation time.
    /// Older comments predate this capture and carry None.
    pub highlighted_text: Option<String>,

    /// Root comment of the thread, for single-level-deep replies
    pub parent_comment_id: Option<CommentId>,

    /// Resolution marker
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<UserId>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    /// Build a new root comment; the span is reordered if given backwards.
    pub fn new(
        script_id: ScriptId,
        user_id: UserId,
        content: String,
        start_position: usize,
        end_position: usize,
        highlighted_text: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: CommentId::new(),
            script_id,
            user_id,
            content,
            start_position: start_position.min(end_position),
            end_position: start_position.max(end_position),
            highlighted_text,
            parent_comment_id: None,
            resolved_at: None,
            resolved_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn as_reply_to(mut self, parent: &Comment) -> Self {
        self.parent_comment_id = Some(parent.id);
        self.start_position = parent.start_position;
        self.end_position = parent.end_position;
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_comment_id.is_none()
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }
}

/// A root comment with its direct replies, numbered within the current
/// filtered view. Derived on every cache change, never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentThread {
    pub root: Comment,
    pub replies: Vec<Comment>,

    /// 1-based sequence number by document order among visible roots
    pub number: usize,
}

/// Which root comments the thread view shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadFilter {
    All,
    Open,
    Resolved,
}

impl ThreadFilter {
    pub fn matches(&self, comment: &Comment) -> bool {
        match self {
            ThreadFilter::All => true,
            ThreadFilter::Open => !comment.is_resolved(),
            ThreadFilter::Resolved => comment.is_resolved(),
        }
    }
}

/// Outcome classification of one position-recovery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStatus {
    /// Anchor found with high confidence; positions updated
    Relocated,

    /// Anchor not found; positions clamped to the document
    Orphaned,

    /// Fuzzy hit only; the UI should ask the user to confirm
    Uncertain,

    /// Recovery skipped; stored positions used as-is
    Fallback,
}

/// Ephemeral result of relocating one comment against the current document.
/// Never persisted as authoritative truth; recomputed from current content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryResult {
    pub status: RecoveryStatus,
    pub new_start_position: usize,
    pub new_end_position: usize,
    pub match_quality: MatchQuality,
    pub message: String,
}

/// Ledger entry for a provisional comment awaiting server confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimisticComment {
    /// Locally generated temporary id keying the cache row
    pub temp_id: CommentId,

    /// Server id once the create call confirmed
    pub confirmed_id: Option<CommentId>,

    pub created_at: DateTime<Utc>,
}

impl OptimisticComment {
    pub fn new(temp_id: CommentId) -> Self {
        Self {
            temp_id,
            confirmed_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn confirm(&mut self, id: CommentId) {
        self.confirmed_id = Some(id);
    }
}
