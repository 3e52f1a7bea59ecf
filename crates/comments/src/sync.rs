/// Cache reconciliation coordinator: one instance per open document.
///
/// Trust flows one way: a push event may, after validation, trigger an
/// authoritative refetch whose response replaces the cache wholesale. The
/// event payload itself is never written to the cache, so a malformed or
/// malicious push can at worst cost a wasted refetch. Optimistic writes are
/// the single exception, because the writer is the authenticated actor.
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{
    batch_recover_comment_positions, validate_realtime_payload, ChannelEvent, Comment,
    CommentError, CommentId, CommentStore, CommentThread, ConnectionStatus, DocumentSource,
    OptimisticComment, PushTransport, RealtimeEvent, RecoveryResult, RecoveryStatus, Result,
    ScriptId, SubscriptionState, SyncConfig, ThreadFilter, Transition, TransportMessage,
    UserId, ValidationContext,
};

pub struct CommentSync<S: CommentStore, T: PushTransport> {
    script_id: ScriptId,
    store: S,
    transport: T,
    config: SyncConfig,

    /// Confirmed comments; only ever replaced wholesale by a refetch, or
    /// provisionally mutated by this instance's own optimistic writes.
    cache: Vec<Comment>,

    /// Provisional writes awaiting server confirmation, keyed by temp id.
    ledger: HashMap<CommentId, OptimisticComment>,

    state: SubscriptionState,

    /// Set before unsubscribing on teardown; a reconnect timer that fires
    /// afterwards checks this first and no-ops.
    cancelled: Arc<AtomicBool>,
    reconnect_timer: Option<JoinHandle<()>>,
    reconnect_tx: mpsc::UnboundedSender<()>,
    reconnect_rx: mpsc::UnboundedReceiver<()>,

    messages: Option<mpsc::UnboundedReceiver<TransportMessage>>,
}

enum Step {
    Message(TransportMessage),
    ChannelLost,
    ReconnectDue,
}

impl<S: CommentStore, T: PushTransport> CommentSync<S, T> {
    pub fn new(script_id: ScriptId, store: S, transport: T, config: SyncConfig) -> Self {
        let (reconnect_tx, reconnect_rx) = mpsc::unbounded_channel();
        let state = SubscriptionState::new(&config);
        Self {
            script_id,
            store,
            transport,
            config,
            cache: Vec::new(),
            ledger: HashMap::new(),
            state,
            cancelled: Arc::new(AtomicBool::new(false)),
            reconnect_timer: None,
            reconnect_tx,
            reconnect_rx,
            messages: None,
        }
    }

    /// Open the push subscription and load the initial authoritative set.
    pub async fn subscribe(&mut self) -> Result<()> {
        let rx = self.transport.subscribe(self.script_id).await?;
        self.messages = Some(rx);
        self.refetch().await;
        Ok(())
    }

    /// Drive the subscription until teardown or terminal degradation.
    pub async fn run(&mut self) {
        loop {
            if self.cancelled.load(Ordering::SeqCst) {
                return;
            }
            let step = match self.messages.as_mut() {
                Some(rx) => tokio::select! {
                    msg = rx.recv() => match msg {
                        Some(msg) => Step::Message(msg),
                        None => Step::ChannelLost,
                    },
                    _ = self.reconnect_rx.recv() => Step::ReconnectDue,
                },
                None => match self.reconnect_rx.recv().await {
                    Some(()) => Step::ReconnectDue,
                    None => return,
                },
            };
            match step {
                Step::Message(TransportMessage::Event(event)) => self.handle_event(event).await,
                Step::Message(TransportMessage::Channel(event)) => {
                    self.handle_channel_event(event);
                }
                Step::ChannelLost => {
                    self.messages = None;
                    self.handle_channel_event(ChannelEvent::Closed);
                }
                Step::ReconnectDue => self.resubscribe().await,
            }
            if self.connection_status() == ConnectionStatus::Degraded && self.messages.is_none() {
                return;
            }
        }
    }

    /// Route one push event: hard deletes are informational only (deletion
    /// is modeled as a soft-delete UPDATE), everything else is validated and,
    /// if accepted, answered with an authoritative refetch.
    pub async fn handle_event(&mut self, event: RealtimeEvent) {
        if event.is_delete() {
            tracing::info!(
                script_id = %self.script_id,
                "ignoring hard delete event; deletions arrive as updates"
            );
            return;
        }
        let ctx = ValidationContext {
            script_id: self.script_id,
            now: Utc::now(),
            replay_window_ms: self.config.replay_window_ms,
        };
        if !validate_realtime_payload(&event, &ctx) {
            return;
        }
        self.refetch().await;
    }

    /// Replace the cache with the server's current comment set. A failed
    /// refetch keeps the stale cache; the next event or reconnect retries.
    pub async fn refetch(&mut self) {
        match self.store.list(self.script_id).await {
            Ok(comments) => self.cache = comments,
            Err(err) => tracing::warn!(
                script_id = %self.script_id,
                error = %err,
                "authoritative refetch failed, keeping stale cache"
            ),
        }
    }

    pub fn handle_channel_event(&mut self, event: ChannelEvent) {
        match self.state.apply(event) {
            Transition::CancelTimer => {
                if let Some(timer) = self.reconnect_timer.take() {
                    timer.abort();
                }
            }
            Transition::Backoff(delay) => self.schedule_reconnect(delay),
            Transition::GiveUp => {
                // degraded is terminal: a timer from an earlier failure must
                // not resubscribe behind our back
                if let Some(timer) = self.reconnect_timer.take() {
                    timer.abort();
                }
                tracing::warn!(
                    script_id = %self.script_id,
                    "realtime subscription degraded; live updates stopped until reload"
                );
            }
        }
    }

    fn schedule_reconnect(&mut self, delay: Duration) {
        if let Some(timer) = self.reconnect_timer.take() {
            timer.abort();
        }
        let cancelled = self.cancelled.clone();
        let tx = self.reconnect_tx.clone();
        self.reconnect_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // torn down while we slept: the channel must stay untouched
            if cancelled.load(Ordering::SeqCst) {
                return;
            }
            let _ = tx.send(());
        }));
    }

    async fn resubscribe(&mut self) {
        if self.cancelled.load(Ordering::SeqCst) {
            return;
        }
        match self.transport.subscribe(self.script_id).await {
            Ok(rx) => self.messages = Some(rx),
            Err(err) => {
                tracing::warn!(
                    script_id = %self.script_id,
                    error = %err,
                    "resubscribe failed"
                );
                self.handle_channel_event(ChannelEvent::Error);
            }
        }
    }

    /// Close this coordinator: flag first, then timer, then channel.
    pub async fn teardown(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(timer) = self.reconnect_timer.take() {
            timer.abort();
        }
        self.messages = None;
        if let Err(err) = self.transport.unsubscribe(self.script_id).await {
            tracing::warn!(
                script_id = %self.script_id,
                error = %err,
                "unsubscribe failed during teardown"
            );
        }
    }

    // ----- optimistic writes -----

    pub async fn create_comment(
        &mut self,
        author: UserId,
        content: String,
        start_position: usize,
        end_position: usize,
        highlighted_text: Option<String>,
    ) -> Result<Comment> {
        let provisional = Comment::new(
            self.script_id,
            author,
            content,
            start_position,
            end_position,
            highlighted_text,
        );
        self.optimistic_create(provisional, author).await
    }

    pub async fn reply_to_comment(
        &mut self,
        author: UserId,
        parent_id: CommentId,
        content: String,
    ) -> Result<Comment> {
        let parent = self
            .cache
            .iter()
            .find(|c| c.id == parent_id && c.is_root())
            .cloned()
            .ok_or_else(|| CommentError::NotFound(format!("parent comment {parent_id}")))?;
        let provisional =
            Comment::new(self.script_id, author, content, 0, 0, None).as_reply_to(&parent);
        self.optimistic_create(provisional, author).await
    }

    async fn optimistic_create(&mut self, provisional: Comment, author: UserId) -> Result<Comment> {
        let snapshot = self.cache.clone();
        let temp_id = provisional.id;

        self.cache.push(provisional.clone());
        self.ledger.insert(temp_id, OptimisticComment::new(temp_id));

        match self.store.create(&provisional, author).await {
            Ok(confirmed) => {
                if let Some(entry) = self.ledger.get_mut(&temp_id) {
                    entry.confirm(confirmed.id);
                }
                if let Some(slot) = self.cache.iter_mut().find(|c| c.id == temp_id) {
                    *slot = confirmed.clone();
                }
                self.ledger.remove(&temp_id);
                Ok(confirmed)
            }
            Err(err) => {
                self.cache = snapshot;
                self.ledger.remove(&temp_id);
                tracing::warn!(error = %err, "optimistic create rolled back");
                Err(err)
            }
        }
    }

    pub async fn edit_comment(&mut self, id: CommentId, content: String) -> Result<Comment> {
        let snapshot = self.cache.clone();
        let slot = self
            .cache
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| CommentError::NotFound(format!("comment {id}")))?;
        slot.content = content.clone();
        slot.updated_at = Utc::now();

        match self.store.update_content(id, &content).await {
            Ok(confirmed) => {
                self.replace_row(confirmed.clone());
                Ok(confirmed)
            }
            Err(err) => {
                self.cache = snapshot;
                tracing::warn!(error = %err, "optimistic edit rolled back");
                Err(err)
            }
        }
    }

    pub async fn resolve_comment(&mut self, id: CommentId, by: UserId) -> Result<Comment> {
        let snapshot = self.cache.clone();
        let slot = self
            .cache
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| CommentError::NotFound(format!("comment {id}")))?;
        slot.resolved_at = Some(Utc::now());
        slot.resolved_by = Some(by);

        match self.store.resolve(id, by).await {
            Ok(confirmed) => {
                self.replace_row(confirmed.clone());
                Ok(confirmed)
            }
            Err(err) => {
                self.cache = snapshot;
                tracing::warn!(error = %err, "optimistic resolve rolled back");
                Err(err)
            }
        }
    }

    pub async fn unresolve_comment(&mut self, id: CommentId) -> Result<Comment> {
        let snapshot = self.cache.clone();
        let slot = self
            .cache
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| CommentError::NotFound(format!("comment {id}")))?;
        slot.resolved_at = None;
        slot.resolved_by = None;

        match self.store.unresolve(id).await {
            Ok(confirmed) => {
                self.replace_row(confirmed.clone());
                Ok(confirmed)
            }
            Err(err) => {
                self.cache = snapshot;
                tracing::warn!(error = %err, "optimistic unresolve rolled back");
                Err(err)
            }
        }
    }

    pub async fn delete_comment(&mut self, id: CommentId) -> Result<()> {
        let snapshot = self.cache.clone();
        if !self.cache.iter().any(|c| c.id == id) {
            return Err(CommentError::NotFound(format!("comment {id}")));
        }
        self.cache.retain(|c| c.id != id);

        match self.store.delete(id).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.cache = snapshot;
                tracing::warn!(error = %err, "optimistic delete rolled back");
                Err(err)
            }
        }
    }

    fn replace_row(&mut self, confirmed: Comment) {
        if let Some(slot) = self.cache.iter_mut().find(|c| c.id == confirmed.id) {
            *slot = confirmed;
        }
    }

    // ----- reads exposed to the UI layer -----

    /// Derived threads: visible roots in document order, numbered 1..n,
    /// replies in creation order. Rebuilt on every call.
    pub fn threads(&self, filter: ThreadFilter) -> Vec<CommentThread> {
        let mut roots: Vec<&Comment> = self
            .cache
            .iter()
            .filter(|c| c.is_root() && filter.matches(c))
            .collect();
        roots.sort_by(|a, b| {
            a.start_position
                .cmp(&b.start_position)
                .then(a.created_at.cmp(&b.created_at))
        });

        roots
            .into_iter()
            .enumerate()
            .map(|(i, root)| {
                let mut replies: Vec<Comment> = self
                    .cache
                    .iter()
                    .filter(|c| c.parent_comment_id == Some(root.id))
                    .cloned()
                    .collect();
                replies.sort_by_key(|c| c.created_at);
                CommentThread {
                    root: root.clone(),
                    replies,
                    number: i + 1,
                }
            })
            .collect()
    }

    /// Per-comment recovery metadata against the given document text.
    pub fn recover_positions(&self, document: &str) -> HashMap<CommentId, RecoveryResult> {
        batch_recover_comment_positions(&self.cache, document, Utc::now(), &self.config)
    }

    pub fn recover_from_source(
        &self,
        source: &dyn DocumentSource,
    ) -> HashMap<CommentId, RecoveryResult> {
        self.recover_positions(&source.current_text())
    }

    /// Persist a confirmed relocation; anything short of `Relocated` is
    /// advisory only and never written back.
    pub async fn commit_recovered_position(
        &mut self,
        id: CommentId,
        recovery: &RecoveryResult,
    ) -> Result<()> {
        if recovery.status != RecoveryStatus::Relocated {
            return Ok(());
        }
        let confirmed = self
            .store
            .update_positions(
                id,
                recovery.new_start_position,
                recovery.new_end_position,
            )
            .await?;
        self.replace_row(confirmed);
        Ok(())
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.state.status()
    }

    pub fn comments(&self) -> &[Comment] {
        &self.cache
    }

    pub fn has_pending_writes(&self) -> bool {
        !self.ledger.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CommentRow, EventEnvelope};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockStore {
        rows: Mutex<Vec<Comment>>,
        fail_writes: AtomicBool,
    }

    impl MockStore {
        fn failing() -> Self {
            let store = Self::default();
            store.fail_writes.store(true, Ordering::SeqCst);
            store
        }

        fn seed(&self, comments: Vec<Comment>) {
            *self.rows.lock().unwrap() = comments;
        }

        fn check(&self) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                Err(CommentError::Network("mock outage".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait::async_trait]
    impl CommentStore for MockStore {
        async fn create(&self, comment: &Comment, _author: UserId) -> Result<Comment> {
            self.check()?;
            let mut confirmed = comment.clone();
            confirmed.id = CommentId::new();
            self.rows.lock().unwrap().push(confirmed.clone());
            Ok(confirmed)
        }

        async fn update_content(&self, id: CommentId, content: &str) -> Result<Comment> {
            self.check()?;
            let mut rows = self.rows.lock().unwrap();
            let row = rows
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| CommentError::NotFound(id.to_string()))?;
            row.content = content.to_string();
            Ok(row.clone())
        }

        async fn update_positions(
            &self,
            id: CommentId,
            start: usize,
            end: usize,
        ) -> Result<Comment> {
            self.check()?;
            let mut rows = self.rows.lock().unwrap();
            let row = rows
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| CommentError::NotFound(id.to_string()))?;
            row.start_position = start;
            row.end_position = end;
            Ok(row.clone())
        }

        async fn resolve(&self, id: CommentId, by: UserId) -> Result<Comment> {
            self.check()?;
            let mut rows = self.rows.lock().unwrap();
            let row = rows
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| CommentError::NotFound(id.to_string()))?;
            row.resolved_at = Some(Utc::now());
            row.resolved_by = Some(by);
            Ok(row.clone())
        }

        async fn unresolve(&self, id: CommentId) -> Result<Comment> {
            self.check()?;
            let mut rows = self.rows.lock().unwrap();
            let row = rows
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| CommentError::NotFound(id.to_string()))?;
            row.resolved_at = None;
            row.resolved_by = None;
            Ok(row.clone())
        }

        async fn delete(&self, id: CommentId) -> Result<()> {
            self.check()?;
            self.rows.lock().unwrap().retain(|c| c.id != id);
            Ok(())
        }

        async fn list(&self, script_id: ScriptId) -> Result<Vec<Comment>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.script_id == script_id)
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    struct MockTransport {
        sender: Mutex<Option<mpsc::UnboundedSender<TransportMessage>>>,
        unsubscribes: AtomicBool,
    }

    #[async_trait::async_trait]
    impl PushTransport for MockTransport {
        async fn subscribe(
            &self,
            _script_id: ScriptId,
        ) -> Result<mpsc::UnboundedReceiver<TransportMessage>> {
            let (tx, rx) = mpsc::unbounded_channel();
            let _ = tx.send(TransportMessage::Channel(ChannelEvent::Subscribed));
            *self.sender.lock().unwrap() = Some(tx);
            Ok(rx)
        }

        async fn unsubscribe(&self, _script_id: ScriptId) -> Result<()> {
            self.unsubscribes.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn insert_event(script_id: ScriptId) -> RealtimeEvent {
        RealtimeEvent::Insert {
            new: CommentRow {
                id: Some(CommentId::new()),
                script_id: Some(script_id),
                ..Default::default()
            },
            envelope: EventEnvelope {
                table: "comments".to_string(),
                schema: "public".to_string(),
                commit_timestamp: Some(Utc::now()),
            },
        }
    }

    fn seeded(script_id: ScriptId, n: usize) -> Vec<Comment> {
        (0..n)
            .map(|i| {
                Comment::new(
                    script_id,
                    UserId::new(),
                    format!("comment {i}"),
                    i * 10,
                    i * 10 + 5,
                    Some(format!("span {i}")),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_valid_event_triggers_authoritative_refetch() {
        let script_id = ScriptId::new();
        let store = MockStore::default();
        store.seed(seeded(script_id, 2));
        let mut sync = CommentSync::new(script_id, store, MockTransport::default(), SyncConfig::default());

        sync.handle_event(insert_event(script_id)).await;

        // the cache is the store's answer, not the event payload
        assert_eq!(sync.comments().len(), 2);
        assert_eq!(sync.comments()[0].content, "comment 0");
    }

    #[tokio::test]
    async fn test_rejected_event_leaves_cache_untouched() {
        let script_id = ScriptId::new();
        let store = MockStore::default();
        store.seed(seeded(script_id, 3));
        let mut sync = CommentSync::new(script_id, store, MockTransport::default(), SyncConfig::default());

        sync.handle_event(insert_event(ScriptId::new())).await;
        assert!(sync.comments().is_empty());
    }

    #[tokio::test]
    async fn test_hard_delete_event_is_ignored() {
        let script_id = ScriptId::new();
        let store = MockStore::default();
        store.seed(seeded(script_id, 1));
        let mut sync = CommentSync::new(script_id, store, MockTransport::default(), SyncConfig::default());

        let event = RealtimeEvent::Delete {
            old: CommentRow {
                id: Some(CommentId::new()),
                script_id: Some(script_id),
                ..Default::default()
            },
            envelope: EventEnvelope::default(),
        };
        sync.handle_event(event).await;
        assert!(sync.comments().is_empty());
    }

    #[tokio::test]
    async fn test_optimistic_create_swaps_temp_id() {
        let script_id = ScriptId::new();
        let mut sync = CommentSync::new(
            script_id,
            MockStore::default(),
            MockTransport::default(),
            SyncConfig::default(),
        );

        let confirmed = sync
            .create_comment(UserId::new(), "hello".to_string(), 3, 8, Some("span".to_string()))
            .await
            .unwrap();

        assert_eq!(sync.comments().len(), 1);
        assert_eq!(sync.comments()[0].id, confirmed.id);
        assert!(!sync.has_pending_writes());
    }

    #[tokio::test]
    async fn test_failed_create_rolls_back_to_snapshot() {
        let script_id = ScriptId::new();
        let store = MockStore::failing();
        store.seed(seeded(script_id, 2));
        let mut sync =
            CommentSync::new(script_id, store, MockTransport::default(), SyncConfig::default());
        sync.cache = seeded(script_id, 2);
        let before = sync.cache.clone();

        let err = sync
            .create_comment(UserId::new(), "doomed".to_string(), 0, 4, None)
            .await
            .unwrap_err();

        assert!(matches!(err, CommentError::Network(_)));
        assert_eq!(sync.comments(), before.as_slice());
        assert!(!sync.has_pending_writes());
    }

    #[tokio::test]
    async fn test_failed_resolve_rolls_back() {
        let script_id = ScriptId::new();
        let store = MockStore::failing();
        let mut sync =
            CommentSync::new(script_id, store, MockTransport::default(), SyncConfig::default());
        sync.cache = seeded(script_id, 1);
        let before = sync.cache.clone();
        let id = before[0].id;

        assert!(sync.resolve_comment(id, UserId::new()).await.is_err());
        assert_eq!(sync.comments(), before.as_slice());
    }

    #[tokio::test]
    async fn test_delete_removes_and_rolls_back_on_failure() {
        let script_id = ScriptId::new();
        let mut sync = CommentSync::new(
            script_id,
            MockStore::default(),
            MockTransport::default(),
            SyncConfig::default(),
        );
        sync.cache = seeded(script_id, 2);
        let id = sync.cache[0].id;

        sync.delete_comment(id).await.unwrap();
        assert_eq!(sync.comments().len(), 1);

        let store = MockStore::failing();
        let mut sync =
            CommentSync::new(script_id, store, MockTransport::default(), SyncConfig::default());
        sync.cache = seeded(script_id, 2);
        let before = sync.cache.clone();
        let id = sync.cache[1].id;
        assert!(sync.delete_comment(id).await.is_err());
        assert_eq!(sync.comments(), before.as_slice());
    }

    #[tokio::test]
    async fn test_threads_are_numbered_in_document_order() {
        let script_id = ScriptId::new();
        let mut sync = CommentSync::new(
            script_id,
            MockStore::default(),
            MockTransport::default(),
            SyncConfig::default(),
        );

        let mut a = Comment::new(script_id, UserId::new(), "late".into(), 40, 45, None);
        let b = Comment::new(script_id, UserId::new(), "early".into(), 5, 9, None);
        let reply = Comment::new(script_id, UserId::new(), "re".into(), 0, 0, None).as_reply_to(&b);
        a.resolved_at = Some(Utc::now());
        sync.cache = vec![a.clone(), b.clone(), reply.clone()];

        let threads = sync.threads(ThreadFilter::All);
        assert_eq!(threads.len(), 2);
        assert_eq!(threads[0].root.id, b.id);
        assert_eq!(threads[0].number, 1);
        assert_eq!(threads[0].replies.len(), 1);
        assert_eq!(threads[1].root.id, a.id);
        assert_eq!(threads[1].number, 2);

        let open = sync.threads(ThreadFilter::Open);
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].root.id, b.id);
        assert_eq!(open[0].number, 1);
    }

    #[tokio::test]
    async fn test_commit_recovered_position_only_when_relocated() {
        let script_id = ScriptId::new();
        let store = MockStore::default();
        store.seed(seeded(script_id, 1));
        let mut sync =
            CommentSync::new(script_id, store, MockTransport::default(), SyncConfig::default());
        sync.refetch().await;
        let id = sync.comments()[0].id;

        let uncertain = RecoveryResult {
            status: RecoveryStatus::Uncertain,
            new_start_position: 99,
            new_end_position: 104,
            match_quality: anchor::MatchQuality::Fuzzy,
            message: String::new(),
        };
        sync.commit_recovered_position(id, &uncertain).await.unwrap();
        assert_eq!(sync.comments()[0].start_position, 0);

        let relocated = RecoveryResult {
            status: RecoveryStatus::Relocated,
            new_start_position: 99,
            new_end_position: 104,
            match_quality: anchor::MatchQuality::Exact,
            message: String::new(),
        };
        sync.commit_recovered_position(id, &relocated).await.unwrap();
        assert_eq!(sync.comments()[0].start_position, 99);
        assert_eq!(sync.comments()[0].end_position, 104);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_suppresses_pending_reconnect() {
        let script_id = ScriptId::new();
        let mut sync = CommentSync::new(
            script_id,
            MockStore::default(),
            MockTransport::default(),
            SyncConfig::default(),
        );

        sync.handle_channel_event(ChannelEvent::Error);
        assert_eq!(
            sync.connection_status(),
            ConnectionStatus::Reconnecting { attempt: 1 }
        );

        sync.teardown().await;
        tokio::time::advance(Duration::from_secs(30)).await;
        tokio::task::yield_now().await;

        assert!(sync.reconnect_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_fires_after_backoff() {
        let script_id = ScriptId::new();
        let mut sync = CommentSync::new(
            script_id,
            MockStore::default(),
            MockTransport::default(),
            SyncConfig {
                backoff_jitter_ms: 0,
                ..SyncConfig::default()
            },
        );

        sync.handle_channel_event(ChannelEvent::Error);
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_millis(2_100)).await;
        tokio::task::yield_now().await;

        assert!(sync.reconnect_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_subscribed_after_failures_resets_status() {
        let script_id = ScriptId::new();
        let mut sync = CommentSync::new(
            script_id,
            MockStore::default(),
            MockTransport::default(),
            SyncConfig::default(),
        );

        sync.handle_channel_event(ChannelEvent::Error);
        sync.handle_channel_event(ChannelEvent::Timeout);
        sync.handle_channel_event(ChannelEvent::Subscribed);
        assert_eq!(sync.connection_status(), ConnectionStatus::Connected);
        assert!(sync.reconnect_timer.is_none() || sync.reconnect_timer.as_ref().unwrap().is_finished());
    }
}
