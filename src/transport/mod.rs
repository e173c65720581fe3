//! Transport capability: one blocking request in, status + body out.
//!
//! The engines never touch an HTTP client directly. They build an
//! [`ApiRequest`] and hand it to a [`Transport`]; production code uses
//! [`HttpTransport`], tests script replies with an in-memory transport.

pub mod http;
#[cfg(test)]
pub(crate) mod mock;

pub use http::HttpTransport;

use crate::error::Result;
use reqwest::Method;
use std::fs::File;
use std::time::Duration;

/// Header carrying the session token on authenticated calls.
pub const AUTH_HEADER: &str = "X-Fbx-App-Auth";

/// Request body variants the API needs.
#[derive(Debug)]
pub enum Body {
    Empty,
    Json(serde_json::Value),
    /// A single multipart file field. The handle is owned by the request and
    /// closed when the request is dropped, whatever the outcome.
    File(FilePart),
}

/// An open local file sent as one multipart field.
#[derive(Debug)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub mime: String,
    pub file: File,
    pub len: u64,
}

/// A fully described API call.
#[derive(Debug)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Body,
    pub timeout: Duration,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: Vec::new(),
            body: Body::Empty,
            timeout,
        }
    }

    pub fn post(url: impl Into<String>, body: Body, timeout: Duration) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            headers: Vec::new(),
            body,
            timeout,
        }
    }

    /// Attach the session token header.
    pub fn with_session(mut self, session_token: &str) -> Self {
        self.headers
            .push((AUTH_HEADER.to_string(), session_token.to_string()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Raw reply: HTTP status and body text, not yet interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiReply {
    pub status: u16,
    pub body: String,
}

impl ApiReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Sends one request and waits for the reply.
///
/// Connection failures and timeouts come back as
/// [`FbxError::Transport`](crate::FbxError::Transport); any HTTP status,
/// including errors, is a successful `ApiReply` left for the caller to judge.
pub trait Transport: Send + Sync {
    fn send(&self, request: ApiRequest) -> Result<ApiReply>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_session_adds_auth_header() {
        let req = ApiRequest::post("http://box/api/v3/login/logout/", Body::Empty, Duration::from_secs(3))
            .with_session("S1");
        assert_eq!(req.header("x-fbx-app-auth"), Some("S1"));
        assert_eq!(req.method, Method::POST);
    }

    #[test]
    fn get_has_no_headers() {
        let req = ApiRequest::get("http://box/api/v3/login/", Duration::from_secs(3));
        assert!(req.headers.is_empty());
        assert!(matches!(req.body, Body::Empty));
        assert_eq!(req.header(AUTH_HEADER), None);
    }

    #[test]
    fn reply_ok_only_for_200() {
        assert!(ApiReply::new(200, "{}").is_ok());
        assert!(!ApiReply::new(403, "{}").is_ok());
        assert!(!ApiReply::new(204, "").is_ok());
    }
}
