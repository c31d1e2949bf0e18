//! `OAuth2` provider configurations.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Mail provider behind a linked account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Google Gmail (REST API).
    Gmail,
    /// Microsoft Outlook (Graph API).
    Outlook,
}

impl ProviderKind {
    /// Stable lowercase identifier, as stored in the account table.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gmail => "gmail",
            Self::Outlook => "outlook",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gmail" | "google" => Ok(Self::Gmail),
            "outlook" | "microsoft" => Ok(Self::Outlook),
            other => Err(Error::InvalidConfig(format!("unknown provider: {other}"))),
        }
    }
}

/// `OAuth2` provider configuration.
#[derive(Debug, Clone)]
pub struct Provider {
    /// Which mailbox family this provider serves.
    pub kind: ProviderKind,
    /// Provider name (e.g., "Google").
    pub name: String,
    /// Authorization endpoint URL.
    pub auth_url: Url,
    /// Token endpoint URL.
    pub token_url: Url,
    /// Default scopes requested at consent time.
    pub default_scopes: Vec<String>,
    /// Scopes sent along with refresh grants (empty = omit the parameter).
    pub refresh_scopes: Vec<String>,
}

impl Provider {
    /// Creates a new provider configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if URLs are invalid.
    pub fn new(
        kind: ProviderKind,
        name: impl Into<String>,
        auth_url: impl AsRef<str>,
        token_url: impl AsRef<str>,
    ) -> Result<Self> {
        Ok(Self {
            kind,
            name: name.into(),
            auth_url: Url::parse(auth_url.as_ref())?,
            token_url: Url::parse(token_url.as_ref())?,
            default_scopes: Vec::new(),
            refresh_scopes: Vec::new(),
        })
    }

    /// Sets the default scopes.
    #[must_use]
    pub fn with_default_scopes(mut self, scopes: Vec<String>) -> Self {
        self.default_scopes = scopes;
        self
    }

    /// Sets the scopes sent with refresh grants.
    #[must_use]
    pub fn with_refresh_scopes(mut self, scopes: Vec<String>) -> Self {
        self.refresh_scopes = scopes;
        self
    }

    /// Points the token endpoint somewhere else (self-hosted proxy, mock server).
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn with_token_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.token_url = Url::parse(url.as_ref())?;
        Ok(self)
    }

    /// Google `OAuth2` provider configuration.
    ///
    /// Scopes cover Gmail read/send/modify, the user's address, and
    /// `https://mail.google.com/` which permanent deletion requires.
    ///
    /// # Errors
    ///
    /// Returns an error if URL parsing fails.
    pub fn google() -> Result<Self> {
        Ok(Self::new(
            ProviderKind::Gmail,
            "Google",
            "https://accounts.google.com/o/oauth2/v2/auth",
            "https://oauth2.googleapis.com/token",
        )?
        .with_default_scopes(vec![
            "https://www.googleapis.com/auth/gmail.readonly".to_string(),
            "https://www.googleapis.com/auth/gmail.send".to_string(),
            "https://www.googleapis.com/auth/gmail.labels".to_string(),
            "https://www.googleapis.com/auth/gmail.modify".to_string(),
            "https://www.googleapis.com/auth/userinfo.email".to_string(),
            "https://mail.google.com/".to_string(),
        ]))
    }

    /// Microsoft/Outlook `OAuth2` provider configuration.
    ///
    /// Scopes:
    /// - `offline_access` - Refresh token
    /// - `Mail.Read`, `Mail.ReadWrite`, `Mail.Send` - Graph mail access
    /// - `User.Read` - Mailbox address lookup
    ///
    /// # Errors
    ///
    /// Returns an error if URL parsing fails.
    pub fn microsoft() -> Result<Self> {
        Ok(Self::new(
            ProviderKind::Outlook,
            "Microsoft",
            "https://login.microsoftonline.com/common/oauth2/v2.0/authorize",
            "https://login.microsoftonline.com/common/oauth2/v2.0/token",
        )?
        .with_default_scopes(vec![
            "offline_access".to_string(),
            "Mail.Read".to_string(),
            "Mail.ReadWrite".to_string(),
            "Mail.Send".to_string(),
            "User.Read".to_string(),
        ])
        .with_refresh_scopes(vec![
            "Mail.Read".to_string(),
            "Mail.ReadWrite".to_string(),
            "Mail.Send".to_string(),
            "offline_access".to_string(),
        ]))
    }

    /// Validates that required URLs are set.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.auth_url.as_str().is_empty() {
            return Err(Error::InvalidConfig("auth_url is empty".into()));
        }
        if self.token_url.as_str().is_empty() {
            return Err(Error::InvalidConfig("token_url is empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_google_provider() {
        let provider = Provider::google().unwrap();
        assert_eq!(provider.name, "Google");
        assert_eq!(provider.kind, ProviderKind::Gmail);
        assert!(provider.refresh_scopes.is_empty());
        assert!(
            provider
                .default_scopes
                .iter()
                .any(|s| s == "https://mail.google.com/")
        );
        provider.validate().unwrap();
    }

    #[test]
    fn test_microsoft_provider() {
        let provider = Provider::microsoft().unwrap();
        assert_eq!(provider.name, "Microsoft");
        assert_eq!(provider.kind, ProviderKind::Outlook);
        assert!(provider.refresh_scopes.contains(&"offline_access".to_string()));
        provider.validate().unwrap();
    }

    #[test]
    fn test_token_url_override() {
        let provider = Provider::google()
            .unwrap()
            .with_token_url("http://127.0.0.1:9000/token")
            .unwrap();
        assert_eq!(provider.token_url.as_str(), "http://127.0.0.1:9000/token");
        assert!(Provider::google().unwrap().with_token_url("not a url").is_err());
    }

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!("gmail".parse::<ProviderKind>().unwrap(), ProviderKind::Gmail);
        assert_eq!("Outlook".parse::<ProviderKind>().unwrap(), ProviderKind::Outlook);
        assert_eq!("microsoft".parse::<ProviderKind>().unwrap(), ProviderKind::Outlook);
        assert!("yahoo".parse::<ProviderKind>().is_err());
        assert_eq!(ProviderKind::Outlook.to_string(), "outlook");
    }
}
