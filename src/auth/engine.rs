//! Requests behind registration, grant polling, login and logout.

use super::{compute_password, AppDescriptor, GrantStatus};
use crate::api::{decode, decode_ack, ApiEndpoints};
use crate::error::{FbxError, Result};
use crate::registration::{RegistrationRecord, Registry};
use crate::transport::{ApiRequest, Body, Transport};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// What to do when the stored registration is `unknown` or `timeout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StalePolicy {
    /// Register again straight away.
    #[default]
    Reregister,
    /// Report the status and leave the stored registration alone.
    Report,
}

/// Result of a `register` call, worded for the user by its `Display`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    AlreadyGranted { track_id: u64 },
    StillPending { track_id: u64 },
    Denied { track_id: u64 },
    /// Stale grant left untouched because re-registration is disabled.
    Stale { status: GrantStatus, track_id: u64 },
    /// A new registration was stored and now waits for approval on the box.
    Registered {
        track_id: u64,
        replaced: Option<(GrantStatus, u64)>,
    },
}

impl std::fmt::Display for RegisterOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyGranted { track_id } => write!(
                f,
                "This app is already granted on the Freebox (track_id = {track_id}). You can now use it."
            ),
            Self::StillPending { track_id } => write!(
                f,
                "This app grant is still pending: accept it on the Freebox front panel (track_id = {track_id})."
            ),
            Self::Denied { track_id } => write!(
                f,
                "This app has been denied on the Freebox (track_id = {track_id}). Remove the registration file and register again."
            ),
            Self::Stale { status, track_id } => write!(
                f,
                "Registration {track_id} is {status} on the Freebox: register again to get a new track_id."
            ),
            Self::Registered { track_id, replaced } => {
                if let Some((status, old)) = replaced {
                    write!(f, "Previous registration {old} was {status}; replaced. ")?;
                }
                write!(
                    f,
                    "Grant pending (track_id = {track_id}): accept this app on the Freebox front panel."
                )
            }
        }
    }
}

/// Authenticated context returned by a successful login.
#[derive(Clone)]
pub struct Session {
    token: String,
    permissions: BTreeMap<String, bool>,
}

impl Session {
    pub fn new(token: impl Into<String>, permissions: BTreeMap<String, bool>) -> Self {
        Self {
            token: token.into(),
            permissions,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn permissions(&self) -> &BTreeMap<String, bool> {
        &self.permissions
    }

    /// Whether the box granted `capability` to this session.
    pub fn can(&self, capability: &str) -> bool {
        self.permissions.get(capability).copied().unwrap_or(false)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("permissions", &self.permissions)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct AuthorizeResult {
    app_token: String,
    track_id: u64,
}

#[derive(Debug, Deserialize)]
struct TrackResult {
    status: String,
}

#[derive(Debug, Deserialize)]
struct ChallengeResult {
    #[serde(default)]
    logged_in: bool,
    challenge: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionResult {
    session_token: String,
    #[serde(default)]
    permissions: BTreeMap<String, bool>,
}

/// Registration and session requests.
pub struct AuthEngine {
    transport: Arc<dyn Transport>,
    api: ApiEndpoints,
    app: Arc<AppDescriptor>,
    timeout: Duration,
}

impl AuthEngine {
    pub fn new(
        transport: Arc<dyn Transport>,
        api: ApiEndpoints,
        app: Arc<AppDescriptor>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            api,
            app,
            timeout,
        }
    }

    pub fn app(&self) -> &AppDescriptor {
        &self.app
    }

    /// Register this application unless the stored registration still counts.
    ///
    /// A usable record is polled first: `granted`, `pending` and `denied` are
    /// reported without registering again. `unknown` and `timeout` register
    /// again under [`StalePolicy::Reregister`].
    ///
    /// Registering overwrites the store, which throws away any earlier grant
    /// still waiting for approval.
    pub fn register_application(
        &self,
        registry: &mut Registry,
        policy: StalePolicy,
    ) -> Result<RegisterOutcome> {
        let mut replaced = None;
        if let Some(track_id) = registry.usable()?.and_then(|r| r.track_id) {
            let status = self.fetch_grant_status(track_id)?;
            tracing::info!(track_id, %status, "existing registration");
            match status {
                GrantStatus::Granted => return Ok(RegisterOutcome::AlreadyGranted { track_id }),
                GrantStatus::Pending => return Ok(RegisterOutcome::StillPending { track_id }),
                GrantStatus::Denied => return Ok(RegisterOutcome::Denied { track_id }),
                GrantStatus::Unknown | GrantStatus::Timeout | GrantStatus::NotRegistered => {
                    if policy == StalePolicy::Report {
                        return Ok(RegisterOutcome::Stale { status, track_id });
                    }
                    tracing::warn!(
                        track_id,
                        %status,
                        "registering again; the stored registration will be overwritten"
                    );
                    replaced = Some((status, track_id));
                }
            }
        }

        let record = self.request_authorization()?;
        let track_id = record.track_id.unwrap_or_default();
        registry.replace(record)?;
        Ok(RegisterOutcome::Registered { track_id, replaced })
    }

    /// Current grant status, or [`GrantStatus::NotRegistered`] without any
    /// request when there is no usable record.
    pub fn poll_grant_status(&self, registry: &mut Registry) -> Result<GrantStatus> {
        match registry.usable()?.and_then(|r| r.track_id) {
            Some(track_id) => self.fetch_grant_status(track_id),
            None => Ok(GrantStatus::NotRegistered),
        }
    }

    fn fetch_grant_status(&self, track_id: u64) -> Result<GrantStatus> {
        let context = "grant status";
        let reply = self.transport.send(ApiRequest::get(
            self.api.authorize_status(track_id),
            self.timeout,
        ))?;
        let result: TrackResult = decode(&reply, context)?;
        GrantStatus::from_wire(&result.status).ok_or_else(|| FbxError::Protocol {
            context: context.to_string(),
            code: None,
            message: format!("unexpected grant status '{}'", result.status),
        })
    }

    /// Ask the box for a new app token. The user must then accept on the box.
    pub fn request_authorization(&self) -> Result<RegistrationRecord> {
        let body = serde_json::to_value(self.app.as_ref())
            .map_err(|e| FbxError::transport("registration", e.to_string()))?;
        let reply = self.transport.send(ApiRequest::post(
            self.api.authorize(),
            Body::Json(body),
            self.timeout,
        ))?;
        let result: AuthorizeResult = decode(&reply, "registration")?;
        tracing::info!(track_id = result.track_id, "registration accepted, grant pending");
        Ok(RegistrationRecord::new(result.app_token, result.track_id))
    }

    /// Two-stage login: fetch a fresh challenge, then answer it.
    ///
    /// The challenge request completes before the session request starts;
    /// every call fetches its own challenge.
    pub fn open_session(&self, record: &RegistrationRecord) -> Result<Session> {
        if !record.is_usable() {
            return Err(FbxError::NotRegistered);
        }

        let reply = self
            .transport
            .send(ApiRequest::get(self.api.login(), self.timeout))?;
        let challenge: ChallengeResult = decode(&reply, "login challenge")?;
        if challenge.logged_in {
            return Err(FbxError::AlreadyLoggedIn);
        }
        let challenge = challenge
            .challenge
            .ok_or_else(|| FbxError::transport("login challenge", "malformed response: missing challenge"))?;

        let password = compute_password(&record.app_token, &challenge);
        let body = serde_json::json!({
            "app_id": self.app.app_id,
            "password": password,
        });
        let reply = self.transport.send(ApiRequest::post(
            self.api.session(),
            Body::Json(body),
            self.timeout,
        ))?;
        let result: SessionResult = decode(&reply, "login session")?;
        tracing::info!(permissions = ?result.permissions, "session opened");

        Ok(Session::new(result.session_token, result.permissions))
    }

    /// Close a session on the box.
    pub fn close_session(&self, session: &Session) -> Result<()> {
        let request = ApiRequest::post(self.api.logout(), Body::Empty, self.timeout)
            .with_session(session.token());
        let reply = self.transport.send(request)?;
        decode_ack(&reply, "logout")?;
        tracing::info!("session closed");
        Ok(())
    }
}
