//! Scripted in-memory transport for tests.

use super::{ApiReply, ApiRequest, Body, Transport};
use crate::error::{FbxError, Result};
use parking_lot::Mutex;
use reqwest::Method;
use std::collections::VecDeque;
use std::io::Read;

/// What the transport saw, with file bodies already read into memory.
#[derive(Debug, Clone)]
pub(crate) struct Recorded {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub json: Option<serde_json::Value>,
    pub upload: Option<(String, String, Vec<u8>)>,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Replays queued replies in order and records every request.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<ApiReply>>>,
    seen: Mutex<Vec<Recorded>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a 200 reply with a JSON body.
    pub fn reply(&self, body: serde_json::Value) -> &Self {
        self.replies
            .lock()
            .push_back(Ok(ApiReply::new(200, body.to_string())));
        self
    }

    pub fn reply_status(&self, status: u16, body: &str) -> &Self {
        self.replies.lock().push_back(Ok(ApiReply::new(status, body)));
        self
    }

    /// Queue a connection-level failure.
    pub fn fail(&self, reason: &str) -> &Self {
        self.replies
            .lock()
            .push_back(Err(FbxError::transport("scripted", reason)));
        self
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.seen.lock().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.seen.lock().iter().map(|r| r.url.clone()).collect()
    }

    pub fn count_matching(&self, suffix: &str) -> usize {
        self.seen
            .lock()
            .iter()
            .filter(|r| r.url.ends_with(suffix))
            .count()
    }

    pub fn pending(&self) -> usize {
        self.replies.lock().len()
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: ApiRequest) -> Result<ApiReply> {
        let (json, upload) = match request.body {
            Body::Empty => (None, None),
            Body::Json(value) => (Some(value), None),
            Body::File(mut part) => {
                let mut bytes = Vec::new();
                part.file
                    .read_to_end(&mut bytes)
                    .map_err(|e| FbxError::transport("scripted", e.to_string()))?;
                (None, Some((part.field, part.file_name, bytes)))
            }
        };
        self.seen.lock().push(Recorded {
            method: request.method,
            url: request.url,
            headers: request.headers,
            json,
            upload,
        });
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(FbxError::transport("scripted", "no reply scripted")))
    }
}
