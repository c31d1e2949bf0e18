//! Runtime configuration.
//!
//! Loaded from a JSON file (every field optional) and then overridden by a
//! handful of environment variables carrying the OAuth client secrets.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// OAuth client registration for one provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientCredentials {
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Redirect URI registered with the provider.
    pub redirect_uri: String,
}

/// Provider endpoints. Overridable so tests can point them at a mock server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// Gmail REST base for the signed-in user.
    pub gmail_api: String,
    /// Microsoft Graph base for the signed-in user (`/me`).
    pub graph_api: String,
    /// Google userinfo endpoint, used to learn the linked address.
    pub google_userinfo: String,
    /// Google token endpoint.
    pub google_token: String,
    /// Microsoft identity token endpoint.
    pub microsoft_token: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            gmail_api: "https://gmail.googleapis.com/gmail/v1/users/me".to_string(),
            graph_api: "https://graph.microsoft.com/v1.0/me".to_string(),
            google_userinfo: "https://www.googleapis.com/oauth2/v2/userinfo".to_string(),
            google_token: "https://oauth2.googleapis.com/token".to_string(),
            microsoft_token: "https://login.microsoftonline.com/common/oauth2/v2.0/token"
                .to_string(),
        }
    }
}

/// Backoff settings for rate-limited provider calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Multiplier applied to the delay after every retry.
    pub factor: u32,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            factor: 2,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `SQLite` database holding linked accounts.
    pub database_path: PathBuf,
    /// Google OAuth client.
    pub google: ClientCredentials,
    /// Microsoft OAuth client.
    pub outlook: ClientCredentials,
    /// Provider endpoints.
    pub endpoints: Endpoints,
    /// Per-request timeout in seconds.
    pub http_timeout_secs: u64,
    /// Retry policy for rate-limited calls.
    pub retry: RetrySettings,
    /// Concurrent Gmail detail fetches per batch.
    pub gmail_batch_size: usize,
    /// Pause between Gmail detail batches, in milliseconds.
    pub gmail_batch_pause_ms: u64,
    /// Tokens expiring sooner than this are refreshed, in seconds.
    pub refresh_margin_secs: i64,
    /// Oldest inbox mail surfaced, in days.
    pub history_days: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            google: ClientCredentials {
                redirect_uri: "http://localhost:8000/api/mail-accounts/gmail/callback".to_string(),
                ..ClientCredentials::default()
            },
            outlook: ClientCredentials {
                redirect_uri: "http://localhost:8000/api/mail-accounts/outlook/callback"
                    .to_string(),
                ..ClientCredentials::default()
            },
            endpoints: Endpoints::default(),
            http_timeout_secs: 20,
            retry: RetrySettings::default(),
            gmail_batch_size: 10,
            gmail_batch_pause_ms: 100,
            refresh_margin_secs: 30 * 60,
            history_days: 730,
        }
    }
}

impl Config {
    /// Default location of the config file.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mailbridge")
            .join("config.json")
    }

    /// Load configuration.
    ///
    /// With an explicit path the file must exist. Without one, the default
    /// location is read if present. Environment overrides are applied last.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path).await?,
            None => {
                let path = Self::default_path();
                if path.exists() {
                    Self::from_file(&path).await?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    async fn from_file(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = serde_json::from_str(&contents)?;
        tracing::debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let targets: [(&str, &mut String); 4] = [
            ("GOOGLE_CLIENT_ID", &mut self.google.client_id),
            ("GOOGLE_CLIENT_SECRET", &mut self.google.client_secret),
            ("OUTLOOK_CLIENT_ID", &mut self.outlook.client_id),
            ("OUTLOOK_CLIENT_SECRET", &mut self.outlook.client_secret),
        ];
        for (key, slot) in targets {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *slot = value;
            }
        }
        if let Some(db) = lookup("MAILBRIDGE_DATABASE").filter(|v| !v.is_empty()) {
            self.database_path = PathBuf::from(db);
        }
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Pause between Gmail detail batches.
    #[must_use]
    pub const fn gmail_batch_pause(&self) -> Duration {
        Duration::from_millis(self.gmail_batch_pause_ms)
    }

    /// Refresh margin as a signed duration.
    #[must_use]
    pub fn refresh_margin(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.refresh_margin_secs)
    }
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailbridge")
        .join("mailbridge.db")
}
