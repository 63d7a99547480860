//! Conversation list helpers

use crate::models::{ConversationId, ConversationSummary};

/// Keep conversations whose counterpart name contains `query`, ignoring case
///
/// The query is matched as typed, surrounding whitespace included.
pub fn filter_conversations<'a>(
    conversations: &'a [ConversationSummary],
    query: &str,
) -> Vec<&'a ConversationSummary> {
    let query = query.to_lowercase();
    conversations
        .iter()
        .filter(|c| c.user_name.to_lowercase().contains(&query))
        .collect()
}

/// Replace the last-message preview and time label of one conversation
///
/// Fed by [`crate::ConversationView::update_conversation_preview`] after a
/// local send. Returns false when the conversation is not in the list.
pub fn set_conversation_preview(
    conversations: &mut [ConversationSummary],
    id: &ConversationId,
    preview: &str,
    time_label: &str,
) -> bool {
    match conversations.iter_mut().find(|c| &c.id == id) {
        Some(conversation) => {
            conversation.last_message = preview.to_string();
            conversation.time_label = time_label.to_string();
            true
        }
        None => false,
    }
}
