//! Error taxonomy shared by every engine.
//!
//! Each variant maps to one failure class the caller can act on:
//! - [`FbxError::NotRegistered`]: run `register` first
//! - [`FbxError::Transport`]: the box could not be reached or answered badly
//! - [`FbxError::Protocol`]: the box answered `success: false`
//! - [`FbxError::Conflict`]: the upload name is already taken in the folder
//! - [`FbxError::LocalIo`]: a local file could not be read
//!
//! Nothing in the crate retries; an error aborts the current operation.

use std::path::PathBuf;
use thiserror::Error;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, FbxError>;

#[derive(Debug, Error)]
pub enum FbxError {
    /// A privileged operation needs a usable registration record.
    #[error("this application is not registered yet: run `register` first")]
    NotRegistered,

    /// Connection failure, timeout, non-200 status or undecodable body.
    #[error("{context}: transport error: {reason}")]
    Transport { context: String, reason: String },

    /// The server answered `success: false`.
    #[error("{context}: server refused ({}): {message}", .code.as_deref().unwrap_or("no error code"))]
    Protocol {
        context: String,
        code: Option<String>,
        message: String,
    },

    /// The challenge endpoint reported an already logged-in session and
    /// therefore issued no challenge.
    #[error("login: server reports the session as already logged in, no challenge issued")]
    AlreadyLoggedIn,

    /// The authorize phase reported that the name exists in the target folder.
    #[error("file {name} already exists in {folder}")]
    Conflict { name: String, folder: String },

    #[error("cannot read {}: {source}", .path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The registration store could not be read or written.
    #[error("registration store {}: {reason}", .path.display())]
    Store { path: PathBuf, reason: String },

    /// An operation failed and the logout that followed failed too.
    #[error("{operation}; logout afterwards also failed: {logout}")]
    Cleanup {
        operation: Box<FbxError>,
        logout: Box<FbxError>,
    },

    /// Continue-on-error upload batch finished with failures.
    #[error("{} of {attempted} uploads failed: {}", .failures.len(), summarize(.failures))]
    Batch {
        attempted: usize,
        failures: Vec<(String, FbxError)>,
    },
}

impl FbxError {
    pub(crate) fn transport(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transport {
            context: context.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn local_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::LocalIo {
            path: path.into(),
            source,
        }
    }

    /// Re-label a transport failure with the operation it interrupted,
    /// keeping the original location in the reason.
    pub(crate) fn in_context(self, context: &str) -> Self {
        match self {
            Self::Transport {
                context: origin,
                reason,
            } => Self::Transport {
                context: context.to_string(),
                reason: format!("{reason} ({origin})"),
            },
            other => other,
        }
    }

    /// Short machine-friendly kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotRegistered => "not_registered",
            Self::Transport { .. } => "transport",
            Self::Protocol { .. } => "protocol",
            Self::AlreadyLoggedIn => "already_logged_in",
            Self::Conflict { .. } => "conflict",
            Self::LocalIo { .. } => "local_io",
            Self::Store { .. } => "store",
            Self::Cleanup { .. } => "cleanup",
            Self::Batch { .. } => "batch",
        }
    }
}

fn summarize(failures: &[(String, FbxError)]) -> String {
    failures
        .iter()
        .map(|(name, err)| format!("{name} ({err})"))
        .collect::<Vec<_>>()
        .join("; ")
}
