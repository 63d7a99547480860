//! Wire models for the messaging endpoints
//!
//! These mirror the JSON the server renders for the conversation view. The
//! client never mutates a [`MessageRecord`]; a refresh replaces the whole
//! list.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Opaque identifier of a two-party message thread
    ConversationId
);

string_id!(
    /// Identifier of a user account (used for presence lookups)
    UserId
);

string_id!(
    /// Identifier of a single message
    MessageId
);

/// The server renders numeric primary keys; accept both numbers and strings.
fn id_from_number_or_string<'de, D>(deserializer: D) -> std::result::Result<MessageId, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Number(n) => MessageId(n.to_string()),
        RawId::Text(s) => MessageId(s),
    })
}

/// A single message as delivered by `GET /conversation/{id}/messages/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    #[serde(deserialize_with = "id_from_number_or_string")]
    pub id: MessageId,

    /// Sent by the current user (true) or the counterpart (false)
    pub is_own: bool,

    /// Text body; empty strings are treated as absent
    #[serde(default)]
    pub content: Option<String>,

    #[serde(default)]
    pub has_attachment: bool,

    #[serde(default)]
    pub is_image: bool,

    #[serde(default)]
    pub attachment_url: Option<String>,

    /// Pre-formatted display time, e.g. `"03:41 PM"`
    pub created_at: String,

    #[serde(default)]
    pub sender_username: Option<String>,

    #[serde(default)]
    pub sender_avatar: Option<String>,
}

/// Resolved attachment reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment<'a> {
    Image(&'a str),
    File { url: &'a str, file_name: &'a str },
}

impl MessageRecord {
    /// Text content, if any non-empty text was sent
    pub fn text(&self) -> Option<&str> {
        self.content.as_deref().filter(|c| !c.is_empty())
    }

    pub fn attachment(&self) -> Option<Attachment<'_>> {
        if !self.has_attachment {
            return None;
        }
        let url = self.attachment_url.as_deref().filter(|u| !u.is_empty())?;

        if self.is_image {
            Some(Attachment::Image(url))
        } else {
            let file_name = url.rsplit('/').next().unwrap_or(url);
            Some(Attachment::File { url, file_name })
        }
    }

    /// Display name for a received message; own messages carry no sender block
    pub fn sender_name(&self) -> Option<&str> {
        if self.is_own {
            None
        } else {
            self.sender_username.as_deref()
        }
    }
}

/// Body of `GET /conversation/{id}/messages/`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageList {
    pub messages: Vec<MessageRecord>,
}

/// Body of `GET /user/{id}/status/`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStatus {
    /// Human readable presence, e.g. `"Active now"` or `"Active 5m ago"`
    pub status: String,
    pub is_online: bool,
}

/// Body of `POST /message/{id}/delete/`
///
/// Advisory only: the list is refreshed whatever this says.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeleteOutcome {
    #[serde(default)]
    pub success: bool,
}

/// Entry in the conversation list sidebar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    pub id: ConversationId,
    /// Counterpart display name
    pub user_name: String,
    pub user_avatar: String,
    pub user_id: UserId,
    /// Preview of the latest message
    pub last_message: String,
    /// Display time of the latest message
    pub time_label: String,
}
