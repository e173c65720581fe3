//! Client for the FreeboxOS REST API: register this application with the
//! box, log in through the HMAC challenge, and upload files to its storage.
//!
//! ```no_run
//! use fbxupload::{Config, HttpTransport, SessionController};
//! use std::sync::Arc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::load(None)?;
//! let transport = Arc::new(HttpTransport::new()?);
//! let mut controller = SessionController::from_config(&config, transport);
//! for receipt in controller.upload(&["report.pdf"])? {
//!     println!("{receipt}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod registration;
pub mod session;
pub mod transport;
pub mod upload;

pub use api::ApiEndpoints;
pub use auth::{AppDescriptor, AuthEngine, GrantStatus, RegisterOutcome, Session, StalePolicy};
pub use config::Config;
pub use error::{FbxError, Result};
pub use registration::{FileStore, MemoryStore, RegistrationRecord, RegistrationStore, Registry};
pub use session::{BatchPolicy, SessionController};
pub use transport::{ApiReply, ApiRequest, HttpTransport, Transport};
pub use upload::{UploadEngine, UploadOptions, UploadReceipt};
