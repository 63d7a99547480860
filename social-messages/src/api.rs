//! Messaging API
//!
//! [`MessagingApi`] is the seam between the poller and the server. The
//! production implementation, [`HttpMessagingApi`], speaks to the four
//! endpoints of the conversation view:
//!
//! | Method | Path | Body |
//! |---|---|---|
//! | GET | `/conversation/{id}/messages/` | `{ messages: [...] }` |
//! | GET | `/user/{id}/status/` | `{ status, is_online }` |
//! | POST | `/conversation/{id}/` | multipart `content` / `attachment`; status only |
//! | POST | `/message/{id}/delete/` | `{ success }` (advisory) |
//!
//! Mutating calls carry the CSRF token in `X-CSRFToken`.

use crate::compose::OutgoingMessage;
use crate::csrf::{CsrfToken, CSRF_HEADER};
use crate::models::{ConversationId, DeleteOutcome, MessageId, MessageList, MessageRecord, UserId, UserStatus};
use crate::{ClientError, Result};
use async_trait::async_trait;
use reqwest::header::COOKIE;
use reqwest::{multipart, Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Operations the poller needs from the server
#[async_trait]
pub trait MessagingApi: Send + Sync {
    /// Fetch the full message list of a conversation
    async fn fetch_messages(&self, conversation: &ConversationId) -> Result<Vec<MessageRecord>>;

    /// Fetch presence of a user
    async fn fetch_status(&self, user: &UserId) -> Result<UserStatus>;

    /// Post a message; success is signalled by HTTP status only
    async fn send_message(&self, conversation: &ConversationId, message: &OutgoingMessage) -> Result<()>;

    /// Delete one of the current user's messages
    async fn delete_message(&self, message: &MessageId) -> Result<DeleteOutcome>;
}

/// Connection settings for [`HttpMessagingApi`]
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server root, e.g. `https://social.example.com`
    pub base_url: String,

    pub timeout: Duration,

    /// Token forwarded on every POST
    pub csrf_token: Option<CsrfToken>,

    /// Raw `Cookie` header carrying the authenticated session
    pub session_cookie: Option<String>,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            csrf_token: None,
            session_cookie: None,
        }
    }

    pub fn with_csrf_token(mut self, token: CsrfToken) -> Self {
        self.csrf_token = Some(token);
        self
    }

    /// Use a session cookie header; the CSRF token is taken from it when not
    /// set explicitly
    pub fn with_session_cookie(mut self, cookie: impl Into<String>) -> Self {
        let cookie = cookie.into();
        if self.csrf_token.is_none() {
            self.csrf_token = CsrfToken::from_cookie_header(&cookie, crate::csrf::CSRF_COOKIE_NAME);
        }
        self.session_cookie = Some(cookie);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// reqwest-backed implementation of [`MessagingApi`]
#[derive(Debug, Clone)]
pub struct HttpMessagingApi {
    client: Client,
    base_url: String,
    csrf_token: Option<CsrfToken>,
    session_cookie: Option<String>,
}

impl HttpMessagingApi {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let parsed = Url::parse(&base_url)
            .map_err(|e| ClientError::configuration(format!("invalid base url '{}': {}", base_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::configuration(format!(
                "unsupported scheme '{}'",
                parsed.scheme()
            )));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::from_reqwest(e, "build http client"))?;

        Ok(Self {
            client,
            base_url,
            csrf_token: config.csrf_token,
            session_cookie: config.session_cookie,
        })
    }

    pub fn messages_url(&self, conversation: &ConversationId) -> String {
        format!(
            "{}/conversation/{}/messages/",
            self.base_url,
            urlencoding::encode(conversation.as_str())
        )
    }

    pub fn status_url(&self, user: &UserId) -> String {
        format!("{}/user/{}/status/", self.base_url, urlencoding::encode(user.as_str()))
    }

    pub fn send_url(&self, conversation: &ConversationId) -> String {
        format!(
            "{}/conversation/{}/",
            self.base_url,
            urlencoding::encode(conversation.as_str())
        )
    }

    pub fn delete_url(&self, message: &MessageId) -> String {
        format!(
            "{}/message/{}/delete/",
            self.base_url,
            urlencoding::encode(message.as_str())
        )
    }

    fn get(&self, url: &str) -> RequestBuilder {
        self.with_session(self.client.get(url))
    }

    fn post(&self, url: &str) -> Result<RequestBuilder> {
        let token = self
            .csrf_token
            .as_ref()
            .ok_or_else(|| ClientError::configuration("no CSRF token available for POST"))?;
        Ok(self
            .with_session(self.client.post(url))
            .header(CSRF_HEADER, token.as_str()))
    }

    fn with_session(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.session_cookie {
            Some(cookie) => request.header(COOKIE, cookie),
            None => request,
        }
    }

    async fn execute(request: RequestBuilder, context: &str) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(e, context))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                url: response.url().to_string(),
            });
        }
        Ok(response)
    }

    async fn read_json<T: DeserializeOwned>(response: Response, context: &str) -> Result<T> {
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::from_reqwest(e, context))?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl MessagingApi for HttpMessagingApi {
    async fn fetch_messages(&self, conversation: &ConversationId) -> Result<Vec<MessageRecord>> {
        let url = self.messages_url(conversation);
        debug!("GET {}", url);

        let response = Self::execute(self.get(&url), "fetch messages").await?;
        let list: MessageList = Self::read_json(response, "fetch messages").await?;
        Ok(list.messages)
    }

    async fn fetch_status(&self, user: &UserId) -> Result<UserStatus> {
        let url = self.status_url(user);
        debug!("GET {}", url);

        let response = Self::execute(self.get(&url), "fetch status").await?;
        Self::read_json(response, "fetch status").await
    }

    async fn send_message(&self, conversation: &ConversationId, message: &OutgoingMessage) -> Result<()> {
        if message.is_empty() {
            return Err(ClientError::EmptyMessage);
        }

        let url = self.send_url(conversation);
        debug!("POST {} ({} chars)", url, message.content().chars().count());

        let mut form = multipart::Form::new().text("content", message.content().to_string());
        if let Some(attachment) = message.attachment() {
            let part = multipart::Part::bytes(attachment.bytes.clone())
                .file_name(attachment.file_name.clone())
                .mime_str(&attachment.mime_type)
                .map_err(|e| ClientError::from_reqwest(e, "attachment mime type"))?;
            form = form.part("attachment", part);
        }

        let request = self
            .post(&url)?
            .header("X-Requested-With", "XMLHttpRequest")
            .multipart(form);
        Self::execute(request, "send message").await?;
        Ok(())
    }

    async fn delete_message(&self, message: &MessageId) -> Result<DeleteOutcome> {
        let url = self.delete_url(message);
        debug!("POST {}", url);

        let response = Self::execute(self.post(&url)?, "delete message").await?;
        Self::read_json(response, "delete message").await
    }
}
