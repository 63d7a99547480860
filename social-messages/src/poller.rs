//! Conversation Poller
//!
//! Keeps the open conversation's message list in sync with the server.
//!
//! ## Lifecycle
//!
//! ```text
//!            select_conversation(A)          select_conversation(B)
//!  Idle ───────────────────────────▶ A ─────────────────────────────▶ B
//!   ▲                                │  cancel A timers, start B timers │
//!   └────────────── close() ─────────┴─────────────────────────────────┘
//! ```
//!
//! Selecting a conversation swaps the active id and replaces the poll timers
//! under one lock, so exactly one timer set exists after any switch. Each
//! timer refetches on a fixed period (messages every 3 s, presence every
//! 10 s by default) and never retries on failure; the next tick does.
//!
//! ## Staleness
//!
//! Requests are never cancelled. When a response arrives for a conversation
//! that is no longer active it is dropped, data and errors alike, so a slow
//! fetch cannot repaint another conversation's list.
//!
//! ## Example
//!
//! ```rust,ignore
//! let poller = ConversationPoller::with_defaults(api, view);
//! poller
//!     .select_conversation("42".into(), "Alice", "/media/alice.png", "7".into())
//!     .await;
//! poller.send_message(&"42".into(), OutgoingMessage::text("hi")).await?;
//! poller.close();
//! ```

use crate::api::MessagingApi;
use crate::compose::{OutgoingMessage, JUST_NOW};
use crate::models::{ConversationId, DeleteOutcome, MessageId, UserId};
use crate::view::{ChatHeader, ConversationView, DEFAULT_SCROLL_THRESHOLD, LOAD_ERROR_TEXT};
use crate::{ClientError, Result};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Default message refresh period
pub const DEFAULT_MESSAGE_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Default presence refresh period
pub const DEFAULT_PRESENCE_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Shortest period a poll timer will run at
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Poller timing and scroll settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub message_interval: Duration,
    pub presence_interval: Duration,
    /// Distance from the bottom that still counts as "following" the chat
    pub scroll_threshold: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            message_interval: DEFAULT_MESSAGE_POLL_INTERVAL,
            presence_interval: DEFAULT_PRESENCE_POLL_INTERVAL,
            scroll_threshold: DEFAULT_SCROLL_THRESHOLD,
        }
    }
}

impl PollerConfig {
    /// Raise both periods to at least [`MIN_POLL_INTERVAL`]
    pub fn normalized(self) -> Self {
        Self {
            message_interval: self.message_interval.max(MIN_POLL_INTERVAL),
            presence_interval: self.presence_interval.max(MIN_POLL_INTERVAL),
            ..self
        }
    }
}

/// When a refresh should move the viewport to the newest message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollPolicy {
    /// Opening a conversation or after a local send
    Always,
    /// Periodic refresh: only when the user was already at the bottom
    IfNearBottom,
}

/// Result of one message-list refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The list was replaced
    Rendered { count: usize, scrolled: bool },
    /// The conversation stopped being active; nothing was touched
    Stale,
    /// The request failed and the inline error is showing
    Failed,
}

/// Running poll tasks bound to one conversation
struct PollTimers {
    conversation_id: ConversationId,
    messages: JoinHandle<()>,
    presence: JoinHandle<()>,
}

impl PollTimers {
    fn cancel(self) {
        debug!("Cancelling poll timers for {}", self.conversation_id);
        self.messages.abort();
        self.presence.abort();
    }
}

struct Shared<A, V> {
    api: Arc<A>,
    view: Arc<V>,
    config: PollerConfig,
    /// Lock order: `timers` before `active`
    timers: Mutex<Option<PollTimers>>,
    active: Mutex<Option<ChatHeader>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<A, V> Shared<A, V>
where
    A: MessagingApi + 'static,
    V: ConversationView + 'static,
{
    fn is_active(&self, id: &ConversationId) -> bool {
        lock(&self.active)
            .as_ref()
            .is_some_and(|header| &header.conversation_id == id)
    }

    /// Run `apply` only while `id` is the active conversation
    ///
    /// The active lock is held for the duration so a concurrent switch
    /// cannot interleave with the repaint.
    fn apply_if_active<R>(&self, id: &ConversationId, apply: impl FnOnce() -> R) -> Option<R> {
        let active = lock(&self.active);
        match active.as_ref() {
            Some(header) if &header.conversation_id == id => Some(apply()),
            _ => None,
        }
    }

    async fn refresh(&self, id: &ConversationId, policy: ScrollPolicy) -> RefreshOutcome {
        if !self.is_active(id) {
            debug!("Skipping refresh of inactive conversation {}", id);
            return RefreshOutcome::Stale;
        }

        // Measured before the list changes
        let was_near_bottom = self
            .view
            .scroll_metrics()
            .is_near_bottom(self.config.scroll_threshold);

        let result = self.api.fetch_messages(id).await;

        let outcome = self.apply_if_active(id, || match &result {
            Ok(messages) => {
                self.view.render_messages(messages);
                let scrolled = match policy {
                    ScrollPolicy::Always => true,
                    ScrollPolicy::IfNearBottom => was_near_bottom,
                };
                if scrolled {
                    self.view.scroll_to_bottom();
                }
                RefreshOutcome::Rendered {
                    count: messages.len(),
                    scrolled,
                }
            }
            Err(_) => {
                self.view.render_error(LOAD_ERROR_TEXT);
                RefreshOutcome::Failed
            }
        });

        match (outcome, result) {
            (None, _) => {
                debug!("Discarding stale message list for {}", id);
                RefreshOutcome::Stale
            }
            (Some(outcome), Err(e)) => {
                warn!("Failed to load messages for {}: {}", id, e);
                outcome
            }
            (Some(outcome), Ok(_)) => {
                debug!("Refreshed conversation {}: {:?}", id, outcome);
                outcome
            }
        }
    }

    async fn refresh_presence(&self, id: &ConversationId, counterpart: &UserId) -> bool {
        match self.api.fetch_status(counterpart).await {
            Ok(status) => {
                let applied = self
                    .apply_if_active(id, || self.view.set_presence(&status))
                    .is_some();
                if !applied {
                    debug!("Discarding stale status for {}", counterpart);
                }
                applied
            }
            Err(e) => {
                warn!("Failed to fetch status for {}: {}", counterpart, e);
                false
            }
        }
    }

    fn active_header(&self) -> Option<ChatHeader> {
        lock(&self.active).clone()
    }
}

impl<A, V> Drop for Shared<A, V> {
    fn drop(&mut self) {
        let timers = self
            .timers
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(timers) = timers.take() {
            timers.cancel();
        }
    }
}

/// Controller for the conversation detail pane
///
/// One instance per view. Clones share state; the timers stop when the last
/// clone is dropped or [`close`](Self::close) is called.
///
/// View callbacks run while an internal lock is held and must not call back
/// into the poller.
pub struct ConversationPoller<A, V> {
    shared: Arc<Shared<A, V>>,
}

impl<A, V> Clone for ConversationPoller<A, V> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<A, V> ConversationPoller<A, V>
where
    A: MessagingApi + 'static,
    V: ConversationView + 'static,
{
    /// Periods shorter than [`MIN_POLL_INTERVAL`] are raised to it
    pub fn new(api: Arc<A>, view: Arc<V>, config: PollerConfig) -> Self {
        let normalized = config.normalized();
        if normalized != config {
            warn!(
                "Poll interval below {:?} raised to the minimum ({:?}, {:?})",
                MIN_POLL_INTERVAL, config.message_interval, config.presence_interval
            );
        }
        let config = normalized;

        Self {
            shared: Arc::new(Shared {
                api,
                view,
                config,
                timers: Mutex::new(None),
                active: Mutex::new(None),
            }),
        }
    }

    pub fn with_defaults(api: Arc<A>, view: Arc<V>) -> Self {
        Self::new(api, view, PollerConfig::default())
    }

    pub fn config(&self) -> &PollerConfig {
        &self.shared.config
    }

    /// Make `id` the active conversation and start polling it
    ///
    /// Previous timers are cancelled before the new ones start. One presence
    /// fetch and one message fetch run immediately; the freshly opened list
    /// is scrolled to the newest message.
    pub async fn select_conversation(
        &self,
        id: ConversationId,
        display_name: impl Into<String>,
        avatar_url: impl Into<String>,
        counterpart: UserId,
    ) -> RefreshOutcome {
        let header = ChatHeader {
            conversation_id: id.clone(),
            display_name: display_name.into(),
            avatar_url: avatar_url.into(),
            counterpart_id: counterpart.clone(),
        };
        info!("Opening conversation {} with {}", id, header.display_name);

        self.activate(header);

        let (_, outcome) = futures::join!(
            self.shared.refresh_presence(&id, &counterpart),
            self.shared.refresh(&id, ScrollPolicy::Always),
        );
        outcome
    }

    fn activate(&self, header: ChatHeader) {
        let mut timers = lock(&self.shared.timers);
        if let Some(previous) = timers.take() {
            previous.cancel();
        }

        {
            let mut active = lock(&self.shared.active);
            self.shared.view.show_active_chat(&header);
            *active = Some(header.clone());
        }

        *timers = Some(self.spawn_timers(&header));
    }

    fn spawn_timers(&self, header: &ChatHeader) -> PollTimers {
        let config = self.shared.config;

        let messages = {
            let shared = Arc::downgrade(&self.shared);
            let id = header.conversation_id.clone();
            spawn_ticker(config.message_interval, shared, move |shared| {
                let id = id.clone();
                async move {
                    shared.refresh(&id, ScrollPolicy::IfNearBottom).await;
                }
            })
        };

        let presence = {
            let shared = Arc::downgrade(&self.shared);
            let id = header.conversation_id.clone();
            let counterpart = header.counterpart_id.clone();
            spawn_ticker(config.presence_interval, shared, move |shared| {
                let id = id.clone();
                let counterpart = counterpart.clone();
                async move {
                    shared.refresh_presence(&id, &counterpart).await;
                }
            })
        };

        debug!(
            "Started poll timers for {} ({:?} messages, {:?} presence)",
            header.conversation_id, config.message_interval, config.presence_interval
        );

        PollTimers {
            conversation_id: header.conversation_id.clone(),
            messages,
            presence,
        }
    }

    /// Refetch the full message list of `id` and repaint it
    ///
    /// Scrolls to the bottom only when the viewport was already near it.
    /// Returns [`RefreshOutcome::Stale`] without a request when `id` is not
    /// the active conversation.
    pub async fn refresh_messages(&self, id: &ConversationId) -> RefreshOutcome {
        self.shared.refresh(id, ScrollPolicy::IfNearBottom).await
    }

    /// Refetch the counterpart's presence for the active conversation
    pub async fn refresh_presence(&self) -> bool {
        match self.shared.active_header() {
            Some(header) => {
                self.shared
                    .refresh_presence(&header.conversation_id, &header.counterpart_id)
                    .await
            }
            None => false,
        }
    }

    /// Send a message to `id`
    ///
    /// Empty drafts are rejected without a request. The send control is
    /// disabled while the request is in flight and re-enabled on failure.
    pub async fn send_message(&self, id: &ConversationId, message: OutgoingMessage) -> Result<()> {
        if message.is_empty() {
            debug!("Ignoring empty message for {}", id);
            return Err(ClientError::EmptyMessage);
        }

        let view = &self.shared.view;
        view.set_send_enabled(false);

        if let Err(e) = self.shared.api.send_message(id, &message).await {
            warn!("Failed to send message to {}: {}", id, e);
            view.set_send_enabled(true);
            return Err(e);
        }

        info!("Sent message to {}", id);
        // The compose box belongs to whichever conversation is open now
        if self.shared.is_active(id) {
            view.clear_compose();
        }
        view.update_conversation_preview(id, &message.preview(), JUST_NOW);
        self.shared.refresh(id, ScrollPolicy::Always).await;
        Ok(())
    }

    /// Delete a message, then refresh the active conversation
    ///
    /// The server's `success` flag is advisory: the list is refreshed on
    /// success, on `success: false` and on transport failure.
    pub async fn delete_message(&self, message: &MessageId) -> Result<DeleteOutcome> {
        let result = self.shared.api.delete_message(message).await;
        match &result {
            Ok(outcome) if outcome.success => info!("Deleted message {}", message),
            Ok(_) => warn!("Server did not confirm deletion of message {}", message),
            Err(e) => warn!("Failed to delete message {}: {}", message, e),
        }

        if let Some(header) = self.shared.active_header() {
            self.shared
                .refresh(&header.conversation_id, ScrollPolicy::IfNearBottom)
                .await;
        }
        result
    }

    /// Stop polling and show the empty panel
    pub fn close(&self) {
        let mut timers = lock(&self.shared.timers);
        if let Some(previous) = timers.take() {
            previous.cancel();
        }

        let mut active = lock(&self.shared.active);
        if let Some(header) = active.take() {
            info!("Closed conversation {}", header.conversation_id);
        }
        self.shared.view.show_no_conversation();
    }

    pub fn active_conversation(&self) -> Option<ConversationId> {
        self.shared.active_header().map(|h| h.conversation_id)
    }

    pub fn active_header(&self) -> Option<ChatHeader> {
        self.shared.active_header()
    }

    /// Conversation the running poll timers are bound to, if any
    pub fn timer_target(&self) -> Option<ConversationId> {
        lock(&self.shared.timers)
            .as_ref()
            .filter(|t| !t.messages.is_finished() && !t.presence.is_finished())
            .map(|t| t.conversation_id.clone())
    }
}

/// Spawn a task calling `tick` every `period`, first call one period from now
///
/// The task holds only a weak reference and exits once the poller is gone.
fn spawn_ticker<A, V, F, Fut>(period: Duration, weak: Weak<Shared<A, V>>, tick: F) -> JoinHandle<()>
where
    A: MessagingApi + 'static,
    V: ConversationView + 'static,
    F: Fn(Arc<Shared<A, V>>) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let Some(shared) = weak.upgrade() else {
                break;
            };
            tick(shared).await;
        }
    })
}
