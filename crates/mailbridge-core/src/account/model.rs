//! Account model types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use mailbridge_oauth::{ProviderKind, Token};
use serde::{Deserialize, Serialize};

/// Unique identifier for a linked account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub i64);

impl AccountId {
    /// Create a new account ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccountId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// Identifier of the user who owns linked accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl UserId {
    /// Create a new user ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The mutable credential fields of a linked account.
///
/// Always written as a whole; never merged field by field.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Bearer token for provider calls.
    pub access_token: String,
    /// Long-lived token used to mint new access tokens.
    pub refresh_token: Option<String>,
    /// When the access token stops working, if known.
    pub token_expiry: Option<DateTime<Utc>>,
}

impl Credentials {
    /// Credentials from an `OAuth2` token.
    #[must_use]
    pub fn from_token(token: Token) -> Self {
        Self {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            token_expiry: token.expires_at,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("token_expiry", &self.token_expiry)
            .finish()
    }
}

/// A user's connected Gmail or Outlook mailbox.
#[derive(Clone, Serialize)]
pub struct LinkedAccount {
    /// Unique identifier.
    pub id: AccountId,
    /// Owning user.
    pub user_id: UserId,
    /// Mailbox address.
    pub email: String,
    /// Which provider serves this mailbox.
    pub provider: ProviderKind,
    /// Bearer token for provider calls.
    #[serde(skip_serializing)]
    pub access_token: String,
    /// Refresh token, if the provider issued one.
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    /// Access token expiry, if known.
    pub token_expiry: Option<DateTime<Utc>>,
    /// When the account was linked.
    pub created_at: DateTime<Utc>,
}

impl LinkedAccount {
    /// Snapshot of the credential fields.
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            token_expiry: self.token_expiry,
        }
    }

    /// Replace the credential fields in place.
    pub fn apply_credentials(&mut self, credentials: Credentials) {
        self.access_token = credentials.access_token;
        self.refresh_token = credentials.refresh_token;
        self.token_expiry = credentials.token_expiry;
    }

    /// The stored credentials as an `OAuth2` token.
    #[must_use]
    pub fn token(&self) -> Token {
        let mut token = Token::new(self.access_token.clone(), "Bearer");
        token.refresh_token.clone_from(&self.refresh_token);
        token.expires_at = self.token_expiry;
        token
    }
}

impl fmt::Debug for LinkedAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkedAccount")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("provider", &self.provider)
            .field("token_expiry", &self.token_expiry)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Fields for a freshly linked account; the store assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// Owning user.
    pub user_id: UserId,
    /// Mailbox address.
    pub email: String,
    /// Which provider serves this mailbox.
    pub provider: ProviderKind,
    /// Initial credentials from the code exchange.
    pub credentials: Credentials,
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

    fn account() -> LinkedAccount {
        LinkedAccount {
            id: AccountId::new(7),
            user_id: UserId::new(1),
            email: "me@example.com".to_string(),
            provider: ProviderKind::Gmail,
            access_token: "secret-access".to_string(),
            refresh_token: Some("secret-refresh".to_string()),
            token_expiry: None,
            created_at: Utc::now(),
        }
    }

    mod account_id_tests {
        use super::*;

        #[test]
        fn display_and_parse() {
            let id = AccountId::new(123);
            assert_eq!(format!("{id}"), "123");
            assert_eq!(" 123 ".parse::<AccountId>().unwrap(), id);
            assert!("abc".parse::<AccountId>().is_err());
        }

        #[test]
        fn serializes_as_number() {
            assert_eq!(serde_json::to_string(&AccountId::new(9)).unwrap(), "9");
        }
    }

    mod linked_account_tests {
        use super::*;

        #[test]
        fn secrets_not_serialized() {
            let json = serde_json::to_string(&account()).unwrap();
            assert!(!json.contains("secret-access"));
            assert!(!json.contains("secret-refresh"));
            assert!(json.contains("\"provider\":\"gmail\""));
        }

        #[test]
        fn secrets_not_in_debug() {
            let debug = format!("{:?}", account());
            assert!(!debug.contains("secret"));
            let debug = format!("{:?}", account().credentials());
            assert!(!debug.contains("secret"));
        }

        #[test]
        fn apply_credentials_replaces_all_fields() {
            let mut acc = account();
            let expiry = Utc::now();
            acc.apply_credentials(Credentials {
                access_token: "new".to_string(),
                refresh_token: None,
                token_expiry: Some(expiry),
            });
            assert_eq!(acc.access_token, "new");
            assert!(acc.refresh_token.is_none());
            assert_eq!(acc.token_expiry, Some(expiry));
        }

        #[test]
        fn token_carries_refresh_and_expiry() {
            let token = account().token();
            assert_eq!(token.access_token, "secret-access");
            assert_eq!(token.refresh_token.as_deref(), Some("secret-refresh"));
            assert!(token.expires_at.is_none());
        }
    }
}
