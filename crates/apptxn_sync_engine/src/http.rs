//! HTTP remote store.
//!
//! The actual HTTP client is abstracted via a trait so the engine does not
//! pick a networking stack for the host application.

use crate::error::{SyncError, SyncResult};
use crate::remote::{RemoteResponse, RemoteStore};
use apptxn_sync_protocol::FlushRequest;
use parking_lot::RwLock;

/// An outgoing HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Target URL.
    pub url: String,
    /// Header name / value pairs.
    pub headers: Vec<(String, String)>,
    /// Request body.
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Returns the first header named `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// HTTP client abstraction.
///
/// Implement this with whatever HTTP library the host application uses.
pub trait HttpClient: Send + Sync {
    /// Sends a POST request and returns the response status.
    fn post(&self, request: HttpRequest) -> Result<u16, String>;
}

/// Remote store reached over HTTP.
///
/// Each transaction is POSTed as JSON to the resource URI with the
/// app-transaction media type and the configured `Authorization` header.
pub struct HttpRemoteStore<C: HttpClient> {
    resource_uri: String,
    client: C,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpRemoteStore<C> {
    /// Creates an HTTP remote store.
    pub fn new(resource_uri: impl Into<String>, client: C) -> Self {
        Self {
            resource_uri: resource_uri.into(),
            client,
            last_error: RwLock::new(None),
        }
    }

    /// Returns the resource URI.
    pub fn resource_uri(&self) -> &str {
        &self.resource_uri
    }

    /// Returns the last transport error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Returns the underlying client.
    pub fn client(&self) -> &C {
        &self.client
    }

    fn build_request(&self, request: &FlushRequest) -> SyncResult<HttpRequest> {
        let scheme = self.resource_uri.split_once("://").map(|(scheme, _)| scheme);
        if !matches!(scheme, Some("http" | "https")) {
            return Err(SyncError::transport_fatal(format!(
                "resource URI is not http(s): {}",
                self.resource_uri
            )));
        }
        let body = request.encode_body()?;
        let meta = &request.meta;
        Ok(HttpRequest {
            url: self.resource_uri.clone(),
            headers: vec![
                ("Content-Type".into(), meta.content_type()),
                ("Accept".into(), meta.media_type()),
                ("Authorization".into(), meta.authorization_header()),
            ],
            body,
        })
    }
}

impl<C: HttpClient> RemoteStore for HttpRemoteStore<C> {
    fn send(&self, request: &FlushRequest) -> SyncResult<RemoteResponse> {
        let http_request = self.build_request(request)?;
        let status = self.client.post(http_request).map_err(|e| {
            *self.last_error.write() = Some(e.clone());
            SyncError::transport_retryable(e)
        })?;
        *self.last_error.write() = None;
        Ok(RemoteResponse::new(status))
    }
}

impl<C: HttpClient> std::fmt::Debug for HttpRemoteStore<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRemoteStore")
            .field("resource_uri", &self.resource_uri)
            .field("last_error", &*self.last_error.read())
            .finish_non_exhaustive()
    }
}
