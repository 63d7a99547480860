//! View Abstraction
//!
//! The poller never touches a concrete UI. Everything it would have done to
//! the page (swap panels, repaint the list, scroll, reset the compose box)
//! goes through [`ConversationView`], so a terminal, a GUI toolkit or a test
//! recorder can sit behind it.

use crate::models::{ConversationId, MessageRecord, UserId, UserStatus};

/// Default distance from the bottom (in pixels or rows) that still counts as
/// "at the bottom"
pub const DEFAULT_SCROLL_THRESHOLD: u32 = 50;

/// Inline text shown when the message list cannot be loaded
pub const LOAD_ERROR_TEXT: &str = "Error loading messages. Please refresh.";

/// Scroll geometry of the message area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScrollMetrics {
    /// Total height of the scrollable content
    pub scroll_height: u32,
    /// Offset of the top of the viewport
    pub scroll_top: u32,
    /// Height of the viewport
    pub client_height: u32,
}

impl ScrollMetrics {
    pub fn new(scroll_height: u32, scroll_top: u32, client_height: u32) -> Self {
        Self {
            scroll_height,
            scroll_top,
            client_height,
        }
    }

    /// Whether the viewport is within `threshold` of the bottom
    pub fn is_near_bottom(&self, threshold: u32) -> bool {
        self.scroll_height.saturating_sub(self.scroll_top)
            <= self.client_height.saturating_add(threshold)
    }
}

/// Header fields shown above the active chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatHeader {
    pub conversation_id: ConversationId,
    pub display_name: String,
    pub avatar_url: String,
    pub counterpart_id: UserId,
}

/// Rendering surface driven by the poller
///
/// Methods are synchronous and should only update local state; network I/O
/// belongs to [`crate::MessagingApi`].
pub trait ConversationView: Send + Sync {
    /// Hide the "no conversation selected" panel and show the chat header
    fn show_active_chat(&self, header: &ChatHeader);

    /// Show the "no conversation selected" panel
    fn show_no_conversation(&self);

    /// Update the counterpart presence line
    fn set_presence(&self, status: &UserStatus);

    /// Replace the rendered message list wholesale
    fn render_messages(&self, messages: &[MessageRecord]);

    /// Replace the message list with an inline error
    fn render_error(&self, message: &str);

    /// Current scroll geometry of the message area
    fn scroll_metrics(&self) -> ScrollMetrics;

    fn scroll_to_bottom(&self);

    /// Clear the text input and any selected attachment
    fn clear_compose(&self);

    fn set_send_enabled(&self, enabled: bool);

    /// Optimistically update the sidebar entry for `conversation`
    fn update_conversation_preview(&self, conversation: &ConversationId, preview: &str, time_label: &str);
}
