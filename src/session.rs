//! Session controller: the single owner of the session and the registry.
//!
//! Privileged work is always bracketed: login before, logout after, even
//! when the work fails. At most one session exists at any time.

use crate::auth::{AuthEngine, GrantStatus, RegisterOutcome, Session, StalePolicy};
use crate::config::Config;
use crate::error::{FbxError, Result};
use crate::registration::{FileStore, Registry};
use crate::transport::Transport;
use crate::upload::{UploadEngine, UploadReceipt};
use std::path::Path;
use std::sync::Arc;

/// How an upload batch reacts to a failing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchPolicy {
    /// Stop at the first failure.
    #[default]
    FailFast,
    /// Try every file and report all failures at the end.
    ContinueOnError,
}

pub struct SessionController {
    auth: AuthEngine,
    uploader: UploadEngine,
    registry: Registry,
    session: Option<Session>,
    stale_policy: StalePolicy,
    batch_policy: BatchPolicy,
}

impl SessionController {
    pub fn new(auth: AuthEngine, uploader: UploadEngine, registry: Registry) -> Self {
        Self {
            auth,
            uploader,
            registry,
            session: None,
            stale_policy: StalePolicy::default(),
            batch_policy: BatchPolicy::default(),
        }
    }

    /// Wire every component from the resolved configuration.
    pub fn from_config(config: &Config, transport: Arc<dyn Transport>) -> Self {
        let api = config.endpoints();
        let auth = AuthEngine::new(
            transport.clone(),
            api.clone(),
            Arc::new(config.app.clone()),
            config.request_timeout(),
        );
        let uploader = UploadEngine::new(transport, api, config.upload_options());
        let registry = Registry::new(Box::new(FileStore::new(config.registration_path())));

        Self::new(auth, uploader, registry)
            .with_stale_policy(config.stale_policy())
            .with_batch_policy(config.batch_policy())
    }

    pub fn with_stale_policy(mut self, policy: StalePolicy) -> Self {
        self.stale_policy = policy;
        self
    }

    pub fn with_batch_policy(mut self, policy: BatchPolicy) -> Self {
        self.batch_policy = policy;
        self
    }

    /// Register this application with the box (see [`AuthEngine::register_application`]).
    pub fn register(&mut self) -> Result<RegisterOutcome> {
        self.auth
            .register_application(&mut self.registry, self.stale_policy)
    }

    pub fn grant_status(&mut self) -> Result<GrantStatus> {
        self.auth.poll_grant_status(&mut self.registry)
    }

    pub fn has_usable_registration(&mut self) -> Result<bool> {
        self.registry.has_usable_registration()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// A session exists only between a successful login and the next logout.
    pub fn is_logged_in(&self) -> bool {
        self.session.is_some()
    }

    /// Open a session unless one is already active, in which case nothing is sent.
    pub fn login(&mut self) -> Result<()> {
        if self.is_logged_in() {
            return Ok(());
        }
        let record = self.registry.usable()?.ok_or(FbxError::NotRegistered)?;
        let session = self.auth.open_session(record)?;
        self.session = Some(session);
        Ok(())
    }

    /// Close the active session, if any.
    ///
    /// The local session is dropped whatever the box answers; a failed
    /// logout is still returned as an error.
    pub fn logout(&mut self) -> Result<()> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        let result = self.auth.close_session(&session);
        if let Err(e) = &result {
            tracing::warn!(error = %e, "logout failed; local session dropped anyway");
        }
        result
    }

    /// Upload `paths` in order inside one login/logout bracket.
    pub fn upload<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<Vec<UploadReceipt>> {
        self.upload_with(paths, |_| {})
    }

    /// Like [`upload`](Self::upload), calling `on_uploaded` after each file.
    pub fn upload_with<P, F>(&mut self, paths: &[P], on_uploaded: F) -> Result<Vec<UploadReceipt>>
    where
        P: AsRef<Path>,
        F: FnMut(&UploadReceipt),
    {
        if paths.is_empty() {
            return Ok(Vec::new());
        }

        let outcome = self
            .login()
            .and_then(|()| self.upload_batch(paths, on_uploaded));
        let logout = self.logout();

        match (outcome, logout) {
            (Ok(receipts), Ok(())) => Ok(receipts),
            (Err(e), Ok(())) => Err(e),
            (Ok(_), Err(logout)) => Err(logout),
            (Err(e), Err(logout)) => Err(FbxError::Cleanup {
                operation: Box::new(e),
                logout: Box::new(logout),
            }),
        }
    }

    fn upload_batch<P, F>(&self, paths: &[P], mut on_uploaded: F) -> Result<Vec<UploadReceipt>>
    where
        P: AsRef<Path>,
        F: FnMut(&UploadReceipt),
    {
        let session = self.session.as_ref().ok_or(FbxError::NotRegistered)?;
        let mut receipts = Vec::with_capacity(paths.len());
        let mut failures = Vec::new();

        for path in paths {
            let path = path.as_ref();
            let (label, result) = match self.uploader.name_for(path) {
                Ok(name) => (name.clone(), self.uploader.upload_named(session, path, name)),
                Err(e) => (path.display().to_string(), Err(e)),
            };
            match result {
                Ok(receipt) => {
                    on_uploaded(&receipt);
                    receipts.push(receipt);
                }
                Err(e) if self.batch_policy == BatchPolicy::ContinueOnError => {
                    tracing::warn!(file = %path.display(), error = %e, "upload failed, continuing");
                    failures.push((label, e));
                }
                Err(e) => {
                    tracing::warn!(file = %path.display(), kind = e.kind(), "upload failed, aborting batch");
                    return Err(e);
                }
            }
        }

        if failures.is_empty() {
            Ok(receipts)
        } else {
            Err(FbxError::Batch {
                attempted: paths.len(),
                failures,
            })
        }
    }
}
