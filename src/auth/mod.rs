//! Application registration and session login against the box.
//!
//! Provides:
//! - [`AppDescriptor`]: the identity presented when registering
//! - [`GrantStatus`]: the box-side state of a registration
//! - [`compute_password`]: challenge response (HMAC-SHA1, lowercase hex)
//! - [`AuthEngine`]: register / poll / login / logout requests
//!
//! ## Lifecycle
//! Unregistered -> (register) -> awaiting grant -> (user accepts on the box)
//! -> registered -> (login) -> session active -> (logout) -> registered.
//! A denied or timed-out grant needs a fresh registration.

pub mod engine;

pub use engine::{AuthEngine, RegisterOutcome, Session, StalePolicy};

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha1::Sha1;

/// Identity tuple sent to `login/authorize/`. Built once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppDescriptor {
    pub app_id: String,
    pub app_name: String,
    pub app_version: String,
    pub device_name: String,
}

impl Default for AppDescriptor {
    fn default() -> Self {
        Self {
            app_id: "fr.fbx.upload".into(),
            app_name: "Fbx Uploader".into(),
            app_version: env!("CARGO_PKG_VERSION").into(),
            device_name: default_device_name(),
        }
    }
}

/// Host name of this machine, or `myDev` when it cannot be read.
pub fn default_device_name() -> String {
    hostname::get()
        .ok()
        .map(|h| h.to_string_lossy().trim().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "myDev".to_string())
}

/// Box-side state of a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrantStatus {
    /// The tracking id is unknown to the box.
    Unknown,
    /// Waiting for the user to accept on the box.
    Pending,
    Granted,
    Denied,
    /// The user did not answer in time.
    Timeout,
    /// Local only: no usable registration, nothing was asked.
    NotRegistered,
}

impl GrantStatus {
    /// Parse the `status` string returned by `login/authorize/{id}`.
    pub fn from_wire(status: &str) -> Option<Self> {
        match status {
            "unknown" => Some(Self::Unknown),
            "pending" => Some(Self::Pending),
            "granted" => Some(Self::Granted),
            "denied" => Some(Self::Denied),
            "timeout" => Some(Self::Timeout),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Pending => "pending",
            Self::Granted => "granted",
            Self::Denied => "denied",
            Self::Timeout => "timeout",
            Self::NotRegistered => "not registered",
        }
    }

    /// Whether only a new registration can make progress.
    pub fn is_stale(self) -> bool {
        matches!(self, Self::Unknown | Self::Timeout)
    }
}

impl std::fmt::Display for GrantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Login password: HMAC-SHA1 of the challenge keyed by the app token,
/// both taken as UTF-8 bytes, rendered as lowercase hex.
pub fn compute_password(app_token: &str, challenge: &str) -> String {
    type HmacSha1 = Hmac<Sha1>;

    // HMAC takes keys of any length, so this never bails.
    let Ok(mut mac) = HmacSha1::new_from_slice(app_token.as_bytes()) else {
        return String::new();
    };
    mac.update(challenge.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn password_matches_reference_vector() {
        // Well-known HMAC-SHA1 example.
        assert_eq!(
            compute_password("key", "The quick brown fox jumps over the lazy dog"),
            "de7c9b85b8b78aa6bc8a7a36f70a90701c9db4d9"
        );
    }

    #[test]
    fn password_is_lowercase_hex_of_sha1_length() {
        let pw = compute_password("T1", "C1");
        assert_eq!(pw.len(), 40);
        assert!(pw.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn password_is_deterministic() {
        assert_eq!(compute_password("T1", "C1"), compute_password("T1", "C1"));
    }

    #[test]
    fn password_changes_with_either_input() {
        let mut seen = HashSet::new();
        for token in ["T1", "T2", "dyNYgfK0Ya6FWGqq83sBHa7TwzWo+pg4", ""] {
            for challenge in ["C1", "C2", "VzhbtpR4r8CLaJle2QgJBEkyd8JPb0zL", "é"] {
                assert!(seen.insert(compute_password(token, challenge)));
            }
        }
        assert_eq!(seen.len(), 16);
    }

    #[test]
    fn grant_status_round_trips_wire_names() {
        for status in [
            GrantStatus::Unknown,
            GrantStatus::Pending,
            GrantStatus::Granted,
            GrantStatus::Denied,
            GrantStatus::Timeout,
        ] {
            assert_eq!(GrantStatus::from_wire(status.as_str()), Some(status));
        }
        assert_eq!(GrantStatus::from_wire("granted!"), None);
    }

    #[test]
    fn only_unknown_and_timeout_are_stale() {
        assert!(GrantStatus::Unknown.is_stale());
        assert!(GrantStatus::Timeout.is_stale());
        assert!(!GrantStatus::Pending.is_stale());
        assert!(!GrantStatus::Denied.is_stale());
        assert!(!GrantStatus::Granted.is_stale());
    }

    #[test]
    fn descriptor_serializes_wire_fields() {
        let app = AppDescriptor {
            app_id: "fr.fbx.upload".into(),
            app_name: "Fbx Uploader".into(),
            app_version: "0.1.0".into(),
            device_name: "myDev".into(),
        };
        let json = serde_json::to_value(&app).unwrap();
        assert_eq!(json["app_id"], "fr.fbx.upload");
        assert_eq!(json["app_name"], "Fbx Uploader");
        assert_eq!(json["app_version"], "0.1.0");
        assert_eq!(json["device_name"], "myDev");
    }

    #[test]
    fn default_device_name_is_never_empty() {
        assert!(!default_device_name().is_empty());
    }
}
