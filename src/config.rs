//! Runtime configuration.
//!
//! Resolution order, later wins:
//! 1. built-in defaults
//! 2. `config.toml` (explicit `--config`, else the platform config dir if present)
//! 3. `FBXUPLOAD_BASE_URL` / `FBXUPLOAD_TARGET_FOLDER`
//! 4. command-line flags (applied by the binary)

use crate::api::ApiEndpoints;
use crate::auth::{AppDescriptor, StalePolicy};
use crate::session::BatchPolicy;
use crate::upload::UploadOptions;
use anyhow::{bail, Context};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "fbxupload";
const CONFIG_FILE: &str = "config.toml";
const REGISTRATION_FILE: &str = "registration.json";

pub const ENV_BASE_URL: &str = "FBXUPLOAD_BASE_URL";
pub const ENV_TARGET_FOLDER: &str = "FBXUPLOAD_TARGET_FOLDER";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Box root URL, without the `/api/vN` part.
    pub base_url: String,
    pub api_version: u32,
    /// Destination folder on the box.
    pub target_folder: String,
    /// Registration file; `~` is expanded. Defaults to the config dir.
    pub registration_file: Option<String>,
    pub timestamp_suffix: bool,
    pub request_timeout_secs: u64,
    pub send_timeout_secs: u64,
    /// Register again when the stored grant is unknown or timed out.
    pub auto_reregister: bool,
    pub continue_on_error: bool,
    pub app: AppDescriptor,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://mafreebox.freebox.fr".into(),
            api_version: 3,
            target_folder: "/Disque 1".into(),
            registration_file: None,
            timestamp_suffix: false,
            request_timeout_secs: 3,
            send_timeout_secs: 600,
            auto_reregister: true,
            continue_on_error: false,
            app: AppDescriptor::default(),
        }
    }
}

/// `<platform config dir>/fbxupload`, if the platform has one.
pub fn config_dir() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.config_dir().join(APP_DIR))
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join(CONFIG_FILE))
    }

    /// Load from `path`, or from the default location when it exists.
    ///
    /// An explicit path must exist; a missing default file means defaults.
    /// Environment overrides are applied on top.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.is_file()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {e}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Apply environment-style overrides; empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = non_empty(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Some(folder) = non_empty(ENV_TARGET_FOLDER) {
            self.target_folder = folder;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            bail!("base_url must start with http:// or https://, got '{}'", self.base_url);
        }
        if self.api_version == 0 {
            bail!("api_version must be at least 1");
        }
        if self.target_folder.is_empty() {
            bail!("target_folder cannot be empty");
        }
        if self.request_timeout_secs == 0 || self.send_timeout_secs == 0 {
            bail!("timeouts must be at least one second");
        }
        if self.app.app_id.trim().is_empty() {
            bail!("app.app_id cannot be empty");
        }
        Ok(())
    }

    /// Registration file location with `~` expanded.
    pub fn registration_path(&self) -> PathBuf {
        match &self.registration_file {
            Some(file) => PathBuf::from(shellexpand::tilde(file).as_ref()),
            None => config_dir()
                .map(|dir| dir.join(REGISTRATION_FILE))
                .unwrap_or_else(|| PathBuf::from(REGISTRATION_FILE)),
        }
    }

    pub fn endpoints(&self) -> ApiEndpoints {
        ApiEndpoints::new(&self.base_url, self.api_version)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }

    pub fn upload_options(&self) -> UploadOptions {
        UploadOptions {
            target_folder: self.target_folder.clone(),
            timestamp_suffix: self.timestamp_suffix,
            request_timeout: self.request_timeout(),
            send_timeout: self.send_timeout(),
        }
    }

    pub fn stale_policy(&self) -> StalePolicy {
        if self.auto_reregister {
            StalePolicy::Reregister
        } else {
            StalePolicy::Report
        }
    }

    pub fn batch_policy(&self) -> BatchPolicy {
        if self.continue_on_error {
            BatchPolicy::ContinueOnError
        } else {
            BatchPolicy::FailFast
        }
    }
}
