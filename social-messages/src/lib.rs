//! Social Messages Client
//!
//! Headless client for the conversation view of the social network: it
//! polls the open conversation, sends and deletes messages, and tracks the
//! counterpart's presence. Rendering is delegated to a [`ConversationView`]
//! and network access to a [`MessagingApi`], so both can be swapped out.

pub mod api;
pub mod compose;
pub mod conversations;
pub mod csrf;
pub mod models;
pub mod poller;
pub mod view;

mod error;

pub use api::{ApiConfig, HttpMessagingApi, MessagingApi, DEFAULT_REQUEST_TIMEOUT};
pub use compose::{format_file_size, preview_text, AttachmentUpload, OutgoingMessage};
pub use conversations::{filter_conversations, set_conversation_preview};
pub use csrf::CsrfToken;
pub use error::{ClientError, Result};
pub use models::{
    Attachment, ConversationId, ConversationSummary, DeleteOutcome, MessageId, MessageList,
    MessageRecord, UserId, UserStatus,
};
pub use poller::{
    ConversationPoller, PollerConfig, RefreshOutcome, ScrollPolicy, DEFAULT_MESSAGE_POLL_INTERVAL,
    DEFAULT_PRESENCE_POLL_INTERVAL,
};
pub use view::{ChatHeader, ConversationView, ScrollMetrics, DEFAULT_SCROLL_THRESHOLD};

#[cfg(test)]
pub mod test_utils;
