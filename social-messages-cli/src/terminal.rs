//! Line-oriented terminal view
//!
//! A terminal cannot repaint a list in place, so every full render is
//! diffed against the previous one: new messages are appended, vanished
//! ones are reported as deleted. The output is always "at the bottom".
//!
//! Conversations opened during the session are kept as a sidebar list whose
//! previews follow local sends.

use chrono::Local;
use social_messages::{
    filter_conversations, set_conversation_preview, Attachment, ChatHeader, ConversationId,
    ConversationSummary, ConversationView, MessageId, MessageRecord, ScrollMetrics, UserStatus,
};
use std::collections::HashSet;
use std::io::Write;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

struct TerminalState<W> {
    out: W,
    shown: Vec<MessageId>,
    presence: Option<UserStatus>,
    errored: bool,
    conversations: Vec<ConversationSummary>,
}

/// [`ConversationView`] writing to a terminal (or any writer)
pub struct TerminalView<W: Write + Send> {
    state: Mutex<TerminalState<W>>,
}

impl<W: Write + Send> TerminalView<W> {
    pub fn new(out: W) -> Self {
        Self {
            state: Mutex::new(TerminalState {
                out,
                shown: Vec::new(),
                presence: None,
                errored: false,
                conversations: Vec::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, TerminalState<W>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Print the sidebar entries whose name matches `query`
    pub fn print_conversations(&self, query: &str) {
        let mut state = self.state();
        let lines: Vec<String> = filter_conversations(&state.conversations, query)
            .into_iter()
            .map(format_summary)
            .collect();
        if lines.is_empty() {
            state.line("No conversations found");
        }
        for line in lines {
            state.line(&line);
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.state.into_inner().unwrap_or_else(|e| e.into_inner()).out
    }
}

impl<W: Write + Send> TerminalState<W> {
    fn line(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{}", text) {
            warn!("Failed to write to terminal: {}", e);
        }
    }
}

/// One message as a single line
pub fn format_message(message: &MessageRecord) -> String {
    let sender = message.sender_name().unwrap_or("you");
    let mut line = format!("#{} [{}] {}:", message.id, message.created_at, sender);

    if let Some(text) = message.text() {
        line.push(' ');
        line.push_str(text);
    }
    match message.attachment() {
        Some(Attachment::Image(url)) => line.push_str(&format!(" [image {}]", url)),
        Some(Attachment::File { url, file_name }) => {
            line.push_str(&format!(" [file {} <{}>]", file_name, url))
        }
        None => {}
    }
    line
}

fn format_summary(summary: &ConversationSummary) -> String {
    let mut line = format!("{}: {}", summary.id, summary.user_name);
    if !summary.last_message.is_empty() {
        line.push_str(&format!(" | {}", summary.last_message));
    }
    if !summary.time_label.is_empty() {
        line.push_str(&format!(" ({})", summary.time_label));
    }
    line
}

impl<W: Write + Send> ConversationView for TerminalView<W> {
    fn show_active_chat(&self, header: &ChatHeader) {
        let mut state = self.state();
        state.shown.clear();
        state.presence = None;
        state.errored = false;
        if !state.conversations.iter().any(|c| c.id == header.conversation_id) {
            state.conversations.push(ConversationSummary {
                id: header.conversation_id.clone(),
                user_name: header.display_name.clone(),
                user_avatar: header.avatar_url.clone(),
                user_id: header.counterpart_id.clone(),
                last_message: String::new(),
                time_label: String::new(),
            });
        }
        let title = format!(
            "=== {} (conversation {}) ===",
            header.display_name, header.conversation_id
        );
        state.line(&title);
        let today = format!("--- {} ---", Local::now().format("%A, %d %B %Y"));
        state.line(&today);
    }

    fn show_no_conversation(&self) {
        let mut state = self.state();
        state.shown.clear();
        state.presence = None;
        state.line("Select a conversation to start messaging");
    }

    fn set_presence(&self, status: &UserStatus) {
        let mut state = self.state();
        if state.presence.as_ref() == Some(status) {
            return;
        }
        let marker = if status.is_online { "●" } else { "○" };
        state.line(&format!("{} {}", marker, status.status));
        state.presence = Some(status.clone());
    }

    fn render_messages(&self, messages: &[MessageRecord]) {
        let mut state = self.state();
        state.errored = false;

        let current: HashSet<&MessageId> = messages.iter().map(|m| &m.id).collect();
        let removed: Vec<MessageId> = state
            .shown
            .iter()
            .filter(|id| !current.contains(id))
            .cloned()
            .collect();
        for id in removed {
            state.line(&format!("#{} (deleted)", id));
        }

        let previous: HashSet<MessageId> = state.shown.iter().cloned().collect();
        if messages.is_empty() && previous.is_empty() {
            state.line("No messages yet. Say hello!");
        }
        for message in messages.iter().filter(|m| !previous.contains(&m.id)) {
            state.line(&format_message(message));
        }

        state.shown = messages.iter().map(|m| m.id.clone()).collect();
    }

    fn render_error(&self, message: &str) {
        let mut state = self.state();
        // Repeated poll failures would otherwise print every tick
        if !state.errored {
            state.line(&format!("! {}", message));
            state.errored = true;
        }
    }

    fn scroll_metrics(&self) -> ScrollMetrics {
        ScrollMetrics::default()
    }

    fn scroll_to_bottom(&self) {
        let mut state = self.state();
        if let Err(e) = state.out.flush() {
            warn!("Failed to flush terminal: {}", e);
        }
    }

    fn clear_compose(&self) {}

    fn set_send_enabled(&self, enabled: bool) {
        debug!("Send {}", if enabled { "enabled" } else { "disabled" });
    }

    fn update_conversation_preview(&self, conversation: &ConversationId, preview: &str, time_label: &str) {
        let mut state = self.state();
        if !set_conversation_preview(&mut state.conversations, conversation, preview, time_label) {
            debug!("Conversation {} is not in the sidebar", conversation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: &str, is_own: bool, text: &str) -> MessageRecord {
        MessageRecord {
            id: MessageId::new(id),
            is_own,
            content: Some(text.to_string()),
            has_attachment: false,
            is_image: false,
            attachment_url: None,
            created_at: "03:41 PM".to_string(),
            sender_username: Some("alice".to_string()),
            sender_avatar: None,
        }
    }

    fn output(view: TerminalView<Vec<u8>>) -> Vec<String> {
        String::from_utf8(view.into_inner())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_format_message() {
        assert_eq!(format_message(&message("1", false, "hi")), "#1 [03:41 PM] alice: hi");
        assert_eq!(format_message(&message("2", true, "yo")), "#2 [03:41 PM] you: yo");

        let mut image = message("3", true, "");
        image.has_attachment = true;
        image.is_image = true;
        image.attachment_url = Some("/media/cat.jpg".to_string());
        assert_eq!(format_message(&image), "#3 [03:41 PM] you: [image /media/cat.jpg]");

        let mut file = message("4", false, "notes");
        file.has_attachment = true;
        file.attachment_url = Some("/media/message_attachments/notes.pdf".to_string());
        assert_eq!(
            format_message(&file),
            "#4 [03:41 PM] alice: notes [file notes.pdf </media/message_attachments/notes.pdf>]"
        );
    }

    #[test]
    fn test_render_appends_only_new_messages() {
        let view = TerminalView::new(Vec::new());
        view.render_messages(&[message("1", false, "a")]);
        view.render_messages(&[message("1", false, "a"), message("2", true, "b")]);
        view.render_messages(&[message("2", true, "b")]);

        assert_eq!(
            output(view),
            vec![
                "#1 [03:41 PM] alice: a".to_string(),
                "#2 [03:41 PM] you: b".to_string(),
                "#1 (deleted)".to_string(),
            ]
        );
    }

    #[test]
    fn test_empty_conversation() {
        let view = TerminalView::new(Vec::new());
        view.render_messages(&[]);
        assert_eq!(output(view), vec!["No messages yet. Say hello!".to_string()]);
    }

    #[test]
    fn test_repeated_errors_print_once() {
        let view = TerminalView::new(Vec::new());
        view.render_error("Error loading messages. Please refresh.");
        view.render_error("Error loading messages. Please refresh.");
        view.render_messages(&[message("1", false, "back")]);
        view.render_error("Error loading messages. Please refresh.");

        assert_eq!(output(view).len(), 3);
    }

    #[test]
    fn test_presence_printed_on_change() {
        let view = TerminalView::new(Vec::new());
        let online = UserStatus {
            status: "Active now".to_string(),
            is_online: true,
        };
        view.set_presence(&online);
        view.set_presence(&online);
        view.set_presence(&UserStatus {
            status: "Active 5m ago".to_string(),
            is_online: false,
        });

        assert_eq!(
            output(view),
            vec!["● Active now".to_string(), "○ Active 5m ago".to_string()]
        );
    }

    #[test]
    fn test_switching_conversation_resets_history() {
        let view = TerminalView::new(Vec::new());
        let header = ChatHeader {
            conversation_id: ConversationId::new("42"),
            display_name: "Alice".to_string(),
            avatar_url: String::new(),
            counterpart_id: "7".into(),
        };
        view.render_messages(&[message("1", false, "a")]);
        view.show_active_chat(&header);
        view.render_messages(&[message("1", false, "a")]);

        let lines = output(view);
        assert_eq!(lines[1], "=== Alice (conversation 42) ===");
        assert_eq!(lines.last().unwrap(), "#1 [03:41 PM] alice: a");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_sidebar_tracks_opened_conversations_and_previews() {
        let view = TerminalView::new(Vec::new());
        for (id, name) in [("42", "Alice"), ("43", "Bob"), ("42", "Alice")] {
            view.show_active_chat(&ChatHeader {
                conversation_id: ConversationId::new(id),
                display_name: name.to_string(),
                avatar_url: String::new(),
                counterpart_id: "7".into(),
            });
        }
        view.update_conversation_preview(&ConversationId::new("42"), "You: hi", "Just now");
        view.update_conversation_preview(&ConversationId::new("99"), "You: lost", "Just now");

        {
            let mut state = view.state();
            state.out.clear();
        }
        view.print_conversations("");
        view.print_conversations("BO");
        view.print_conversations("carol");

        assert_eq!(
            output(view),
            vec![
                "42: Alice | You: hi (Just now)".to_string(),
                "43: Bob".to_string(),
                "43: Bob".to_string(),
                "No conversations found".to_string(),
            ]
        );
    }

    #[test]
    fn test_always_at_bottom() {
        let view = TerminalView::new(Vec::new());
        assert!(view.scroll_metrics().is_near_bottom(0));
    }
}
