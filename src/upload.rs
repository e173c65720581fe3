//! Two-phase file upload: authorize a name, then send the bytes.
//!
//! ## Flow
//! 1. Open the local file (fails before any request if unreadable)
//! 2. `POST upload/` with `{dirname, upload_name}` -> ticket id
//! 3. `POST upload/{id}/send` with the file as multipart field `file`
//!
//! A ticket is used for exactly one send and never kept.

use crate::api::{decode, decode_ack, parse_envelope, ApiEndpoints};
use crate::auth::Session;
use crate::error::{FbxError, Result};
use crate::transport::{ApiRequest, Body, FilePart, Transport};
use base64::Engine;
use chrono::NaiveDateTime;
use serde::Deserialize;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// `error_code` the box uses when the name already exists in the folder.
const CONFLICT_CODE: &str = "conflict";

/// Multipart field carrying the file.
const FILE_FIELD: &str = "file";

/// Upload settings fixed at startup.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Destination folder on the box, as a plain path.
    pub target_folder: String,
    /// Append `.YYYYMMDD.HHMMSS` to every upload name.
    pub timestamp_suffix: bool,
    /// Timeout for the authorize request.
    pub request_timeout: Duration,
    /// Timeout for the send request.
    pub send_timeout: Duration,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            target_folder: "/Disque 1".into(),
            timestamp_suffix: false,
            request_timeout: Duration::from_secs(3),
            send_timeout: Duration::from_secs(600),
        }
    }
}

/// Confirmation for one uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub name: String,
    pub folder: String,
    pub ticket: String,
}

impl std::fmt::Display for UploadReceipt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Upload of {} in {} completed", self.name, self.folder)
    }
}

/// Name shown on the box: the last path segment, optionally suffixed with
/// the given local timestamp as `.YYYYMMDD.HHMMSS`.
pub fn upload_name(path: &Path, stamp: Option<NaiveDateTime>) -> Result<String> {
    let file_name = path.file_name().ok_or_else(|| {
        FbxError::local_io(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
        )
    })?;
    let base = file_name.to_str().map(str::to_string).ok_or_else(|| {
        FbxError::local_io(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidData, "file name is not valid UTF-8"),
        )
    })?;
    Ok(match stamp {
        Some(at) => format!("{base}.{}", at.format("%Y%m%d.%H%M%S")),
        None => base,
    })
}

#[derive(Debug, Deserialize)]
struct TicketResult {
    #[serde(deserialize_with = "ticket_id")]
    id: String,
}

/// The box hands out numeric ids; accept strings too.
fn ticket_id<'de, D: serde::Deserializer<'de>>(de: D) -> std::result::Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Text(String),
    }
    Ok(match Raw::deserialize(de)? {
        Raw::Num(n) => n.to_string(),
        Raw::Text(s) => s,
    })
}

/// Performs uploads with an already opened session.
pub struct UploadEngine {
    transport: Arc<dyn Transport>,
    api: ApiEndpoints,
    options: UploadOptions,
}

impl UploadEngine {
    pub fn new(transport: Arc<dyn Transport>, api: ApiEndpoints, options: UploadOptions) -> Self {
        Self {
            transport,
            api,
            options,
        }
    }

    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    /// Base64 form of the target folder sent as `dirname`.
    fn encoded_folder(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.options.target_folder.as_bytes())
    }

    /// Upload name for `path`, stamped with the current local time if enabled.
    pub fn name_for(&self, path: &Path) -> Result<String> {
        let stamp = self
            .options
            .timestamp_suffix
            .then(|| chrono::Local::now().naive_local());
        upload_name(path, stamp)
    }

    /// Upload one file: open, authorize, send.
    pub fn upload_file(&self, session: &Session, path: &Path) -> Result<UploadReceipt> {
        let name = self.name_for(path)?;
        self.upload_named(session, path, name)
    }

    /// Upload `path` under an already derived upload name.
    pub fn upload_named(
        &self,
        session: &Session,
        path: &Path,
        name: String,
    ) -> Result<UploadReceipt> {
        let (file, len) = open_regular_file(path)?;
        tracing::debug!(file = %path.display(), name = %name, bytes = len, "uploading");

        let ticket = self.authorize(session, &name)?;
        tracing::debug!(name = %name, ticket = %ticket, "upload authorized");

        let mime = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        let part = FilePart {
            field: FILE_FIELD.to_string(),
            file_name: name.clone(),
            mime,
            file,
            len,
        };
        self.send(session, &ticket, &name, part)?;

        tracing::info!(name = %name, folder = %self.options.target_folder, "upload completed");
        Ok(UploadReceipt {
            name,
            folder: self.options.target_folder.clone(),
            ticket,
        })
    }

    fn authorize(&self, session: &Session, name: &str) -> Result<String> {
        let context = format!("upload authorization for {name}");
        let body = serde_json::json!({
            "dirname": self.encoded_folder(),
            "upload_name": name,
        });
        let request = ApiRequest::post(self.api.upload(), Body::Json(body), self.options.request_timeout)
            .with_session(session.token());
        let reply = self
            .transport
            .send(request)
            .map_err(|e| e.in_context(&context))?;

        // Checked before the status so a conflict stays distinguishable on
        // error statuses too.
        if let Ok(envelope) = parse_envelope::<serde_json::Value>(&reply, &context) {
            if !envelope.success && envelope.error_code.as_deref() == Some(CONFLICT_CODE) {
                return Err(FbxError::Conflict {
                    name: name.to_string(),
                    folder: self.options.target_folder.clone(),
                });
            }
        }

        let ticket: TicketResult = decode(&reply, &context)?;
        Ok(ticket.id)
    }

    fn send(&self, session: &Session, ticket: &str, name: &str, part: FilePart) -> Result<()> {
        let request = ApiRequest::post(
            self.api.upload_send(ticket),
            Body::File(part),
            self.options.send_timeout,
        )
        .with_session(session.token());
        let context = format!("upload of {name}");
        // The request owns the file handle; it is closed once `send` returns.
        let reply = self
            .transport
            .send(request)
            .map_err(|e| e.in_context(&context))?;
        decode_ack(&reply, &context)
    }
}

/// Open `path` for reading, rejecting anything that is not a regular file.
fn open_regular_file(path: &Path) -> Result<(File, u64)> {
    let file = File::open(path).map_err(|e| FbxError::local_io(path, e))?;
    let meta = file.metadata().map_err(|e| FbxError::local_io(path, e))?;
    if !meta.is_file() {
        return Err(FbxError::local_io(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
        ));
    }
    Ok((file, meta.len()))
}
