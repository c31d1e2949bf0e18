//! Access token lifecycle for linked accounts.

use chrono::Duration;
use mailbridge_oauth::{AuthorizationCodeFlow, OAuthClient, Provider, ProviderKind};
use tracing::{debug, info, warn};

use crate::Result;
use crate::account::{AccountStore, Credentials, LinkedAccount};
use crate::config::{ClientCredentials, Config};
use crate::http::HttpClient;

/// Keeps linked accounts' access tokens fresh.
#[derive(Debug, Clone)]
pub struct TokenManager {
    gmail: OAuthClient,
    outlook: OAuthClient,
    margin: Duration,
}

impl TokenManager {
    /// Build OAuth clients for both providers from configuration, sharing
    /// `http`'s connection pool.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured token endpoint is not a valid URL.
    pub fn from_config(config: &Config, http: &HttpClient) -> Result<Self> {
        let google = Provider::google()?.with_token_url(&config.endpoints.google_token)?;
        let microsoft = Provider::microsoft()?.with_token_url(&config.endpoints.microsoft_token)?;
        Ok(Self {
            gmail: oauth_client(&config.google, google, http),
            outlook: oauth_client(&config.outlook, microsoft, http),
            margin: config.refresh_margin(),
        })
    }

    /// OAuth client for a provider.
    #[must_use]
    pub const fn client(&self, kind: ProviderKind) -> &OAuthClient {
        match kind {
            ProviderKind::Gmail => &self.gmail,
            ProviderKind::Outlook => &self.outlook,
        }
    }

    /// Authorization code flow for a provider.
    #[must_use]
    pub fn code_flow(&self, kind: ProviderKind) -> AuthorizationCodeFlow {
        AuthorizationCodeFlow::new(self.client(kind).clone())
    }

    /// Make sure `account` holds a usable access token.
    ///
    /// Tokens without a recorded expiry are trusted as-is. Tokens expiring
    /// within the refresh margin are refreshed; the new credentials are
    /// written to `store` once and applied to `account`.
    ///
    /// Returns `false` when the account cannot be used: no access token, no
    /// refresh token when one is needed, or a failed refresh. Never errors.
    pub async fn ensure_valid<S: AccountStore>(
        &self,
        store: &S,
        account: &mut LinkedAccount,
    ) -> bool {
        if account.access_token.is_empty() {
            warn!(account = %account.id, "Account has no access token");
            return false;
        }

        let token = account.token();
        if !token.expires_within(self.margin) {
            return true;
        }
        if token.refresh_token().is_err() {
            warn!(account = %account.id, "Access token expiring and no refresh token on record");
            return false;
        }

        debug!(account = %account.id, provider = %account.provider, "Refreshing access token");
        let refreshed = match self.client(account.provider).refresh_token(&token).await {
            Ok(refreshed) => refreshed,
            Err(e) => {
                warn!(account = %account.id, "Token refresh failed: {e}");
                return false;
            }
        };

        let credentials = Credentials::from_token(refreshed);
        if let Err(e) = store.update_credentials(account.id, &credentials).await {
            // The token itself is good; only persistence failed.
            warn!(account = %account.id, "Failed to persist refreshed token: {e}");
        }
        account.apply_credentials(credentials);
        info!(account = %account.id, "Access token refreshed");
        true
    }
}

fn oauth_client(credentials: &ClientCredentials, provider: Provider, http: &HttpClient) -> OAuthClient {
    let mut client =
        OAuthClient::new(credentials.client_id.clone(), provider).with_http_client(http.client().clone());
    if !credentials.client_secret.is_empty() {
        client = client.with_client_secret(credentials.client_secret.clone());
    }
    if !credentials.redirect_uri.is_empty() {
        client = client.with_redirect_uri(credentials.redirect_uri.clone());
    }
    client
}
