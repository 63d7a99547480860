//! CSRF token discovery
//!
//! Every mutating request must carry the server's anti-forgery token in an
//! `X-CSRFToken` header. The token is found either in the `csrftoken` cookie
//! or in the hidden `csrfmiddlewaretoken` input rendered into each form.

use std::fmt;

/// Default name of the cookie holding the token
pub const CSRF_COOKIE_NAME: &str = "csrftoken";

/// Name of the hidden form input holding the token
pub const CSRF_FORM_FIELD: &str = "csrfmiddlewaretoken";

/// Header the server reads the token from
pub const CSRF_HEADER: &str = "X-CSRFToken";

#[derive(Clone, PartialEq, Eq)]
pub struct CsrfToken(String);

impl CsrfToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Look up `name` in a `Cookie:` style header (`a=1; b=2`)
    ///
    /// The value is percent-decoded. Returns `None` when the cookie is absent
    /// or empty.
    pub fn from_cookie_header(header: &str, name: &str) -> Option<Self> {
        header
            .split(';')
            .map(str::trim)
            .filter_map(|cookie| cookie.split_once('='))
            .find(|(key, _)| *key == name)
            .and_then(|(_, value)| {
                let decoded = urlencoding::decode(value)
                    .map(|v| v.into_owned())
                    .unwrap_or_else(|_| value.to_string());
                (!decoded.is_empty()).then_some(Self(decoded))
            })
    }

    /// Extract the value of the hidden `csrfmiddlewaretoken` input from HTML
    pub fn from_form_field(html: &str) -> Option<Self> {
        let marker = format!("name=\"{}\"", CSRF_FORM_FIELD);
        let start = html.find(&marker)?;

        // The value attribute may precede or follow the name attribute
        let tag_start = html[..start].rfind('<')?;
        let tag_end = start + html[start..].find('>')?;
        let tag = &html[tag_start..tag_end];

        let value_start = tag.find("value=\"")? + "value=\"".len();
        let value_len = tag[value_start..].find('"')?;
        let value = &tag[value_start..value_start + value_len];

        (!value.is_empty()).then(|| Self(value.to_string()))
    }
}

// Keep tokens out of logs
impl fmt::Debug for CsrfToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CsrfToken(***)")
    }
}
