//! Compose box helpers
//!
//! An outgoing message is text, a file, or both. Blank drafts are rejected
//! before any request is made.

use crate::{ClientError, Result};
use std::path::Path;

/// Longest preview shown in the conversation list before truncation
pub const PREVIEW_MAX_CHARS: usize = 50;

/// Preview used when a message carries only an attachment
pub const ATTACHMENT_PREVIEW: &str = "📎 Attachment";

/// Time label applied to a conversation right after a local send
pub const JUST_NOW: &str = "Just now";

/// A file picked for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl AttachmentUpload {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, guessing the MIME type from its extension
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                ClientError::configuration(format!("not a file path: {}", path.display()))
            })?;
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Ok(Self {
            file_name,
            mime_type,
            bytes,
        })
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Human readable size for the compose preview
    pub fn display_size(&self) -> String {
        format_file_size(self.size())
    }
}

/// Draft submitted from the compose box
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    content: String,
    attachment: Option<AttachmentUpload>,
}

impl OutgoingMessage {
    /// Build a draft; surrounding whitespace is trimmed from the text
    pub fn new(content: &str, attachment: Option<AttachmentUpload>) -> Self {
        Self {
            content: content.trim().to_string(),
            attachment,
        }
    }

    pub fn text(content: &str) -> Self {
        Self::new(content, None)
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn attachment(&self) -> Option<&AttachmentUpload> {
        self.attachment.as_ref()
    }

    /// True when there is nothing to send
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.attachment.is_none()
    }

    /// Conversation-list preview for this draft once sent
    pub fn preview(&self) -> String {
        preview_text(&self.content)
    }
}

/// Format a byte count the way the compose preview shows it
pub fn format_file_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;

    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    }
}

/// Optimistic conversation-list preview after sending `content`
///
/// Attachment-only messages show [`ATTACHMENT_PREVIEW`].
pub fn preview_text(content: &str) -> String {
    let content = content.trim();
    if content.is_empty() {
        return format!("You: {}", ATTACHMENT_PREVIEW);
    }

    if content.chars().count() > PREVIEW_MAX_CHARS {
        let truncated: String = content.chars().take(PREVIEW_MAX_CHARS).collect();
        format!("You: {}...", truncated)
    } else {
        format!("You: {}", content)
    }
}
