/// Push-event wire types and the three-layer payload validator
/// A rejected event is always a no-op plus a structured log line; the
/// validator never mutates anything itself
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CommentId, ScriptId, UserId};

/// Row data carried by a push event. Ids are optional on the wire so that
/// structural validation stays expressible; everything else rides along
/// untyped because the payload is never written to the cache anyway.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentRow {
    pub id: Option<CommentId>,
    pub script_id: Option<ScriptId>,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// Envelope fields common to every event variant
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(default)]
    pub table: String,
    #[serde(default)]
    pub schema: String,
    #[serde(default)]
    pub commit_timestamp: Option<DateTime<Utc>>,
}

/// Closed union of the shapes the push transport delivers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "eventType")]
pub enum RealtimeEvent {
    #[serde(rename = "INSERT")]
    Insert {
        new: CommentRow,
        #[serde(flatten)]
        envelope: EventEnvelope,
    },

    #[serde(rename = "UPDATE")]
    Update {
        new: CommentRow,
        #[serde(default)]
        old: Option<CommentRow>,
        #[serde(flatten)]
        envelope: EventEnvelope,
    },

    #[serde(rename = "DELETE")]
    Delete {
        old: CommentRow,
        #[serde(flatten)]
        envelope: EventEnvelope,
    },
}

impl RealtimeEvent {
    /// The row validation runs against: `new` for inserts and updates,
    /// `old` for deletes.
    pub fn row(&self) -> &CommentRow {
        match self {
            RealtimeEvent::Insert { new, .. } => new,
            RealtimeEvent::Update { new, .. } => new,
            RealtimeEvent::Delete { old, .. } => old,
        }
    }

    pub fn envelope(&self) -> &EventEnvelope {
        match self {
            RealtimeEvent::Insert { envelope, .. }
            | RealtimeEvent::Update { envelope, .. }
            | RealtimeEvent::Delete { envelope, .. } => envelope,
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, RealtimeEvent::Delete { .. })
    }
}

/// What the validator checks an event against
#[derive(Debug, Clone)]
pub struct ValidationContext {
    /// The document currently open in this coordinator
    pub script_id: ScriptId,

    /// Wall-clock reference for the freshness check
    pub now: DateTime<Utc>,

    /// Maximum accepted event age in milliseconds
    pub replay_window_ms: i64,
}

/// Gatekeeper for push events: structure, then scope, then freshness.
///
/// Pure and synchronous. Each layer short-circuits on failure and emits a
/// structured security-observability event saying why.
pub fn validate_realtime_payload(event: &RealtimeEvent, ctx: &ValidationContext) -> bool {
    let row = event.row();
    let envelope = event.envelope();

    // layer 1: structure
    let (Some(id), Some(script_id)) = (row.id, row.script_id) else {
        tracing::warn!(
            code = "SEC_001",
            kind = "MALFORMED_PAYLOAD",
            table = %envelope.table,
            "dropping realtime event without id or script_id"
        );
        return false;
    };

    // layer 2: scope, the control that keeps another document's traffic out
    if script_id != ctx.script_id {
        tracing::info!(
            code = "SEC_002",
            kind = "CROSS_SCRIPT_CONTAMINATION",
            expected = %ctx.script_id,
            received = %script_id,
            "dropping realtime event for another script"
        );
        return false;
    }

    // layer 3: freshness; some transports omit the timestamp, which is an
    // anomaly worth logging but not a reason to reject
    match envelope.commit_timestamp {
        Some(committed) => {
            let age_ms = ctx.now.signed_duration_since(committed).num_milliseconds();
            if age_ms > ctx.replay_window_ms {
                tracing::warn!(
                    code = "SEC_003",
                    kind = "REPLAY_ATTACK",
                    comment_id = %id,
                    age_ms,
                    "dropping stale realtime event"
                );
                return false;
            }
        }
        None => {
            tracing::info!(
                code = "SEC_004",
                kind = "MISSING_TIMESTAMP",
                comment_id = %id,
                "realtime event carried no commit timestamp"
            );
        }
    }

    true
}
