/// Contracts for the external collaborators: the authoritative comment
/// store, the push transport, and the document text source. The engine only
/// ever talks to these seams; it never reimplements what sits behind them.
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    ChannelEvent, Comment, CommentId, RealtimeEvent, Result, ScriptId, UserId,
};

/// Everything a subscription can deliver: data events and channel health.
#[derive(Debug, Clone)]
pub enum TransportMessage {
    Event(RealtimeEvent),
    Channel(ChannelEvent),
}

/// Remote comment persistence. Every call crosses the server's
/// access-control boundary; expected failures come back as values.
#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Persist a new comment authored by `author`; returns the
    /// server-confirmed row with its server-assigned id.
    async fn create(&self, comment: &Comment, author: UserId) -> Result<Comment>;

    async fn update_content(&self, id: CommentId, content: &str) -> Result<Comment>;

    /// Follow-up write after a confirmed position recovery.
    async fn update_positions(&self, id: CommentId, start: usize, end: usize) -> Result<Comment>;

    async fn resolve(&self, id: CommentId, by: UserId) -> Result<Comment>;

    async fn unresolve(&self, id: CommentId) -> Result<Comment>;

    async fn delete(&self, id: CommentId) -> Result<()>;

    /// Authoritative comment set for a document; the only data the cache is
    /// ever replaced with after a push event.
    async fn list(&self, script_id: ScriptId) -> Result<Vec<Comment>>;
}

/// Push-notification channel, one subscription per open document.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Open a subscription; the transport reports `Subscribed` (and later
    /// errors/closures) through the returned receiver.
    async fn subscribe(
        &self,
        script_id: ScriptId,
    ) -> Result<mpsc::UnboundedReceiver<TransportMessage>>;

    async fn unsubscribe(&self, script_id: ScriptId) -> Result<()>;
}

/// Plain-text projection of the current document, on demand.
pub trait DocumentSource: Send + Sync {
    fn current_text(&self) -> String;
}
