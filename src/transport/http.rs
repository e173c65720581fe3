//! `reqwest::blocking` implementation of [`Transport`].

use super::{ApiReply, ApiRequest, Body, Transport};
use crate::error::{FbxError, Result};
use reqwest::blocking::{multipart, Client};

/// Production transport talking HTTP to the box.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("fbxupload/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FbxError::transport("http client", e.to_string()))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: ApiRequest) -> Result<ApiReply> {
        let ApiRequest {
            method,
            url,
            headers,
            body,
            timeout,
        } = request;

        let mut builder = self
            .client
            .request(method.clone(), &url)
            .timeout(timeout)
            .header("Accept", "text/plain");
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(&value),
            Body::File(part) => {
                let file_part = multipart::Part::reader_with_length(part.file, part.len)
                    .file_name(part.file_name)
                    .mime_str(&part.mime)
                    .map_err(|e| FbxError::transport(url.clone(), e.to_string()))?;
                builder.multipart(multipart::Form::new().part(part.field, file_part))
            }
        };

        tracing::debug!(%method, url = %url, "sending request");
        let resp = builder.send().map_err(|e| {
            let reason = if e.is_timeout() {
                format!("timed out after {}s", timeout.as_secs_f32())
            } else {
                e.to_string()
            };
            FbxError::transport(url.clone(), reason)
        })?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .map_err(|e| FbxError::transport(url.clone(), e.to_string()))?;
        tracing::debug!(url = %url, status, bytes = body.len(), "received response");

        Ok(ApiReply { status, body })
    }
}
