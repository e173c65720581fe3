//! FreeboxOS endpoint paths and response envelope.
//!
//! Every answer from the box is JSON shaped as
//! `{"success": bool, "result": {...}, "error_code": "...", "msg": "..."}`.
//! [`decode`] turns a raw reply into either the typed `result` or one of the
//! crate errors.

use crate::error::{FbxError, Result};
use crate::transport::ApiReply;
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Versioned endpoint builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoints {
    base_url: String,
    version: u32,
}

impl ApiEndpoints {
    pub fn new(base_url: &str, version: u32) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            version,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v{}/{}", self.base_url, self.version, path)
    }

    pub fn login(&self) -> String {
        self.url("login/")
    }

    pub fn session(&self) -> String {
        self.url("login/session/")
    }

    pub fn logout(&self) -> String {
        self.url("login/logout/")
    }

    pub fn authorize(&self) -> String {
        self.url("login/authorize/")
    }

    pub fn authorize_status(&self, track_id: u64) -> String {
        self.url(&format!("login/authorize/{track_id}"))
    }

    pub fn upload(&self) -> String {
        self.url("upload/")
    }

    pub fn upload_send(&self, ticket: &str) -> String {
        self.url(&format!("upload/{ticket}/send"))
    }
}

/// Raw response envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    #[serde(default)]
    pub success: bool,
    pub result: Option<T>,
    pub error_code: Option<String>,
    pub msg: Option<String>,
}

impl<T> Envelope<T> {
    fn into_protocol_error(self, context: &str) -> FbxError {
        FbxError::Protocol {
            context: context.to_string(),
            message: self.msg.unwrap_or_else(|| "request failed".to_string()),
            code: self.error_code,
        }
    }
}

/// Parse the envelope without judging the status code.
pub(crate) fn parse_envelope<T: DeserializeOwned>(
    reply: &ApiReply,
    context: &str,
) -> Result<Envelope<T>> {
    serde_json::from_str(&reply.body).map_err(|e| {
        FbxError::transport(
            context,
            format!("malformed response (HTTP {}): {e}", reply.status),
        )
    })
}

fn check_status(reply: &ApiReply, context: &str) -> Result<()> {
    if reply.is_ok() {
        Ok(())
    } else {
        Err(FbxError::transport(
            context,
            format!("HTTP {}: {}", reply.status, reply.body),
        ))
    }
}

/// Decode a successful reply that must carry a `result`.
pub(crate) fn decode<T: DeserializeOwned>(reply: &ApiReply, context: &str) -> Result<T> {
    check_status(reply, context)?;
    let envelope: Envelope<T> = parse_envelope(reply, context)?;
    if !envelope.success {
        return Err(envelope.into_protocol_error(context));
    }
    envelope
        .result
        .ok_or_else(|| FbxError::transport(context, "malformed response: missing result"))
}

/// Decode a reply where only `success` matters.
pub(crate) fn decode_ack(reply: &ApiReply, context: &str) -> Result<()> {
    check_status(reply, context)?;
    let envelope: Envelope<serde_json::Value> = parse_envelope(reply, context)?;
    if envelope.success {
        Ok(())
    } else {
        Err(envelope.into_protocol_error(context))
    }
}
