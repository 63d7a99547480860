//! Test doubles for the poller: a scripted API and a recording view

use crate::api::MessagingApi;
use crate::compose::OutgoingMessage;
use crate::models::{ConversationId, DeleteOutcome, MessageId, MessageRecord, UserId, UserStatus};
use crate::view::{ChatHeader, ConversationView, ScrollMetrics};
use crate::{ClientError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

pub fn message(id: &str, is_own: bool, text: &str) -> MessageRecord {
    MessageRecord {
        id: MessageId::new(id),
        is_own,
        content: Some(text.to_string()),
        has_attachment: false,
        is_image: false,
        attachment_url: None,
        created_at: "12:00 PM".to_string(),
        sender_username: (!is_own).then(|| "alice".to_string()),
        sender_avatar: (!is_own).then(|| "/media/alice.png".to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    FetchMessages(ConversationId),
    FetchStatus(UserId),
    Send(ConversationId, String),
    Delete(MessageId),
}

#[derive(Default)]
struct MockState {
    messages: HashMap<ConversationId, Vec<MessageRecord>>,
    delays: HashMap<ConversationId, Duration>,
    failing: HashSet<ConversationId>,
    statuses: HashMap<UserId, UserStatus>,
    status_delays: HashMap<UserId, Duration>,
    send_fails: bool,
    delete_fails: bool,
    delete_success: bool,
    calls: Vec<ApiCall>,
}

/// Scripted [`MessagingApi`] that records every call
#[derive(Default)]
pub struct MockApi {
    state: Mutex<MockState>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_messages(&self, conversation: &str, messages: Vec<MessageRecord>) {
        self.state
            .lock()
            .unwrap()
            .messages
            .insert(ConversationId::new(conversation), messages);
    }

    pub fn set_delay(&self, conversation: &str, delay: Duration) {
        self.state
            .lock()
            .unwrap()
            .delays
            .insert(ConversationId::new(conversation), delay);
    }

    pub fn set_failing(&self, conversation: &str, failing: bool) {
        let mut state = self.state.lock().unwrap();
        let id = ConversationId::new(conversation);
        if failing {
            state.failing.insert(id);
        } else {
            state.failing.remove(&id);
        }
    }

    pub fn set_status(&self, user: &str, status: &str, is_online: bool) {
        self.state.lock().unwrap().statuses.insert(
            UserId::new(user),
            UserStatus {
                status: status.to_string(),
                is_online,
            },
        );
    }

    pub fn set_status_delay(&self, user: &str, delay: Duration) {
        self.state
            .lock()
            .unwrap()
            .status_delays
            .insert(UserId::new(user), delay);
    }

    pub fn set_send_fails(&self, fails: bool) {
        self.state.lock().unwrap().send_fails = fails;
    }

    /// `None` makes the delete request fail at the transport level
    pub fn set_delete_result(&self, success: Option<bool>) {
        let mut state = self.state.lock().unwrap();
        state.delete_fails = success.is_none();
        state.delete_success = success.unwrap_or(false);
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn fetch_count(&self, conversation: &str) -> usize {
        let id = ConversationId::new(conversation);
        self.calls()
            .iter()
            .filter(|c| **c == ApiCall::FetchMessages(id.clone()))
            .count()
    }

    pub fn status_count(&self, user: &str) -> usize {
        let id = UserId::new(user);
        self.calls()
            .iter()
            .filter(|c| **c == ApiCall::FetchStatus(id.clone()))
            .count()
    }

    pub fn send_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ApiCall::Send(..)))
            .count()
    }
}

#[async_trait]
impl MessagingApi for MockApi {
    async fn fetch_messages(&self, conversation: &ConversationId) -> Result<Vec<MessageRecord>> {
        let (delay, result) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(ApiCall::FetchMessages(conversation.clone()));
            let result = if state.failing.contains(conversation) {
                Err(ClientError::Transport("connection refused".to_string()))
            } else {
                Ok(state.messages.get(conversation).cloned().unwrap_or_default())
            };
            (state.delays.get(conversation).copied(), result)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn fetch_status(&self, user: &UserId) -> Result<UserStatus> {
        let (delay, result) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(ApiCall::FetchStatus(user.clone()));
            let result = state.statuses.get(user).cloned().ok_or_else(|| ClientError::Status {
                status: 404,
                url: format!("/user/{}/status/", user),
            });
            (state.status_delays.get(user).copied(), result)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn send_message(&self, conversation: &ConversationId, message: &OutgoingMessage) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(ApiCall::Send(conversation.clone(), message.content().to_string()));
        if state.send_fails {
            Err(ClientError::Status {
                status: 500,
                url: format!("/conversation/{}/", conversation),
            })
        } else {
            Ok(())
        }
    }

    async fn delete_message(&self, message: &MessageId) -> Result<DeleteOutcome> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ApiCall::Delete(message.clone()));
        if state.delete_fails {
            Err(ClientError::Transport("connection reset".to_string()))
        } else {
            Ok(DeleteOutcome {
                success: state.delete_success,
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    ShowActiveChat(ChatHeader),
    ShowNoConversation,
    Presence(UserStatus),
    Render(Vec<MessageId>),
    Error(String),
    ScrollToBottom,
    ClearCompose,
    SendEnabled(bool),
    Preview(ConversationId, String, String),
}

/// [`ConversationView`] that records what the poller asked it to do
pub struct RecordingView {
    events: Mutex<Vec<ViewEvent>>,
    metrics: Mutex<ScrollMetrics>,
}

impl Default for RecordingView {
    fn default() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            // Parked at the bottom
            metrics: Mutex::new(ScrollMetrics::new(1000, 600, 400)),
        }
    }
}

impl RecordingView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_metrics(&self, metrics: ScrollMetrics) {
        *self.metrics.lock().unwrap() = metrics;
    }

    pub fn events(&self) -> Vec<ViewEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    pub fn last_render(&self) -> Option<Vec<MessageId>> {
        self.events().into_iter().rev().find_map(|e| match e {
            ViewEvent::Render(ids) => Some(ids),
            _ => None,
        })
    }

    pub fn count(&self, wanted: &ViewEvent) -> usize {
        self.events().iter().filter(|e| *e == wanted).count()
    }

    fn push(&self, event: ViewEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl ConversationView for RecordingView {
    fn show_active_chat(&self, header: &ChatHeader) {
        self.push(ViewEvent::ShowActiveChat(header.clone()));
    }

    fn show_no_conversation(&self) {
        self.push(ViewEvent::ShowNoConversation);
    }

    fn set_presence(&self, status: &UserStatus) {
        self.push(ViewEvent::Presence(status.clone()));
    }

    fn render_messages(&self, messages: &[MessageRecord]) {
        self.push(ViewEvent::Render(messages.iter().map(|m| m.id.clone()).collect()));
    }

    fn render_error(&self, message: &str) {
        self.push(ViewEvent::Error(message.to_string()));
    }

    fn scroll_metrics(&self) -> ScrollMetrics {
        *self.metrics.lock().unwrap()
    }

    fn scroll_to_bottom(&self) {
        self.push(ViewEvent::ScrollToBottom);
    }

    fn clear_compose(&self) {
        self.push(ViewEvent::ClearCompose);
    }

    fn set_send_enabled(&self, enabled: bool) {
        self.push(ViewEvent::SendEnabled(enabled));
    }

    fn update_conversation_preview(&self, conversation: &ConversationId, preview: &str, time_label: &str) {
        self.push(ViewEvent::Preview(
            conversation.clone(),
            preview.to_string(),
            time_label.to_string(),
        ));
    }
}
