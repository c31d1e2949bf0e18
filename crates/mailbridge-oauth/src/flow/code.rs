//! Authorization Code Flow implementation.

use super::OAuthClient;
use crate::error::Result;
use crate::provider::ProviderKind;
use crate::token::Token;
use url::Url;

/// Authorization Code Flow for `OAuth2`.
///
/// The user is sent to the consent page, and the provider redirects back
/// to the configured redirect URI with a one-time `code`.
#[derive(Debug)]
pub struct AuthorizationCodeFlow {
    client: OAuthClient,
}

impl AuthorizationCodeFlow {
    /// Creates a new authorization code flow.
    #[must_use]
    pub const fn new(client: OAuthClient) -> Self {
        Self { client }
    }

    /// Returns the underlying client.
    #[must_use]
    pub const fn client(&self) -> &OAuthClient {
        &self.client
    }

    /// Builds the authorization URL for user consent.
    ///
    /// # Arguments
    ///
    /// * `scopes` - Optional scopes to request (uses provider defaults if None)
    /// * `state` - Optional state parameter, echoed back on the redirect
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be constructed.
    pub fn authorization_url(&self, scopes: Option<&[String]>, state: Option<&str>) -> Result<Url> {
        let mut url = self.client.provider.auth_url.clone();

        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("client_id", &self.client.client_id)
                .append_pair("response_type", "code");

            if let Some(redirect_uri) = &self.client.redirect_uri {
                pairs.append_pair("redirect_uri", redirect_uri);
            }

            let scope_str = scopes.map_or_else(
                || self.client.provider.default_scopes.join(" "),
                |s| s.join(" "),
            );

            if !scope_str.is_empty() {
                pairs.append_pair("scope", &scope_str);
            }

            if let Some(state_val) = state {
                pairs.append_pair("state", state_val);
            }

            // Offline access for Google only comes with a forced consent screen.
            match self.client.provider.kind {
                ProviderKind::Gmail => {
                    pairs
                        .append_pair("access_type", "offline")
                        .append_pair("prompt", "consent");
                }
                ProviderKind::Outlook => {
                    pairs.append_pair("prompt", "select_account");
                }
            }
        }

        Ok(url)
    }

    /// Exchanges the authorization code for an access token.
    ///
    /// # Arguments
    ///
    /// * `code` - Authorization code from the redirect
    /// * `redirect_uri` - Optional redirect URI (uses client config if None)
    ///
    /// # Errors
    ///
    /// Returns an error if the token exchange fails.
    pub async fn exchange_code(&self, code: &str, redirect_uri: Option<&str>) -> Result<Token> {
        self.client.exchange_code(code, redirect_uri).await
    }
}
