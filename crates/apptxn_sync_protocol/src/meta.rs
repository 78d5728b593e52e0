//! Authentication and media-type metadata sent with every flush request.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of the app-transaction resource media type.
pub const MEDIA_TYPE_PREFIX: &str = "application/vnd.apptxn-";
/// Suffix of the app-transaction resource media type.
pub const MEDIA_TYPE_SUFFIX: &str = "+json";

/// Character set used to serialize request payloads.
///
/// Payloads are always produced as UTF-8 JSON; any other charset name is
/// carried through but rejected by [`Charset::ensure_supported`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Charset(String);

impl Charset {
    /// Creates a charset from its IANA name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// UTF-8.
    pub fn utf8() -> Self {
        Self("UTF-8".into())
    }

    /// Returns the charset name as configured.
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Returns true for any spelling of UTF-8.
    pub fn is_utf8(&self) -> bool {
        matches!(self.0.to_ascii_lowercase().as_str(), "utf-8" | "utf8")
    }

    /// Fails unless payloads can be encoded in this charset.
    pub fn ensure_supported(&self) -> ProtocolResult<()> {
        if self.is_utf8() {
            Ok(())
        } else {
            Err(ProtocolError::UnsupportedCharset(self.0.clone()))
        }
    }
}

impl Default for Charset {
    fn default() -> Self {
        Self::utf8()
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata attached to a flush request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMeta {
    /// Name of the authentication scheme (e.g. `"fp-auth"`).
    pub auth_scheme: String,
    /// Name of the token parameter within the scheme (e.g. `"fp-token"`).
    pub auth_token_param_name: String,
    /// Bearer token value.
    pub auth_token: String,
    /// Payload character set.
    pub charset: Charset,
    /// Version of the app-transaction resource representation.
    pub apptxn_media_type_version: String,
}

impl RequestMeta {
    /// `Authorization` header value: `<scheme> <param>="<token>"`.
    pub fn authorization_header(&self) -> String {
        format!(
            "{} {}=\"{}\"",
            self.auth_scheme, self.auth_token_param_name, self.auth_token
        )
    }

    /// The versioned app-transaction media type.
    pub fn media_type(&self) -> String {
        format!(
            "{MEDIA_TYPE_PREFIX}{}{MEDIA_TYPE_SUFFIX}",
            self.apptxn_media_type_version
        )
    }

    /// `Content-Type` header value: media type plus charset parameter.
    pub fn content_type(&self) -> String {
        format!("{};charset={}", self.media_type(), self.charset)
    }
}
