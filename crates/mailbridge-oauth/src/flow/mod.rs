//! `OAuth2` authorization flows.

mod code;

pub use code::AuthorizationCodeFlow;

use crate::error::{Error, Result};
use crate::provider::Provider;
use crate::token::{ErrorResponse, Token, TokenResponse};
use reqwest::{Client, Response};
use std::collections::HashMap;

/// Common `OAuth2` client configuration.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    /// Client ID from provider.
    pub client_id: String,
    /// Client secret (optional for public clients).
    pub client_secret: Option<String>,
    /// Redirect URI for authorization code flow.
    pub redirect_uri: Option<String>,
    /// Provider configuration.
    pub provider: Provider,
    /// HTTP client.
    http_client: Client,
}

impl OAuthClient {
    /// Creates a new OAuth client.
    #[must_use]
    pub fn new(client_id: impl Into<String>, provider: Provider) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            redirect_uri: None,
            provider,
            http_client: Client::new(),
        }
    }

    /// Sets the client secret.
    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Sets the redirect URI.
    #[must_use]
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(uri.into());
        self
    }

    /// Shares an existing HTTP client (connection pool, timeouts).
    #[must_use]
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http_client = client;
        self
    }

    /// Refreshes an access token using a refresh token.
    ///
    /// The previous refresh token is carried over when the provider does
    /// not rotate it.
    ///
    /// # Errors
    ///
    /// Returns an error if the refresh fails or if the token has no refresh token.
    pub async fn refresh_token(&self, token: &Token) -> Result<Token> {
        let refresh_token = token.refresh_token()?;

        let scope = self.provider.refresh_scopes.join(" ");
        let mut params = HashMap::new();
        params.insert("grant_type", "refresh_token");
        params.insert("refresh_token", refresh_token);
        params.insert("client_id", &self.client_id);

        if let Some(secret) = &self.client_secret {
            params.insert("client_secret", secret);
        }
        if !scope.is_empty() {
            params.insert("scope", &scope);
        }

        tracing::debug!(provider = %self.provider.name, "refreshing access token");
        let response = self
            .http_client
            .post(self.provider.token_url.clone())
            .form(&params)
            .send()
            .await?;

        let mut new_token = Self::read_token(response).await?;

        if new_token.refresh_token.is_none() {
            new_token.refresh_token.clone_from(&token.refresh_token);
        }

        Ok(new_token)
    }

    /// Exchanges an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails.
    pub(crate) async fn exchange_code(&self, code: &str, redirect_uri: Option<&str>) -> Result<Token> {
        let mut params = HashMap::new();
        params.insert("grant_type", "authorization_code");
        params.insert("code", code);
        params.insert("client_id", &self.client_id);

        if let Some(uri) = redirect_uri.or(self.redirect_uri.as_deref()) {
            params.insert("redirect_uri", uri);
        }

        if let Some(secret) = &self.client_secret {
            params.insert("client_secret", secret);
        }

        let response = self
            .http_client
            .post(self.provider.token_url.clone())
            .form(&params)
            .send()
            .await?;

        Self::read_token(response).await
    }

    async fn read_token(response: Response) -> Result<Token> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(serde_json::from_str::<ErrorResponse>(&body).map_or_else(
                |_| Error::InvalidResponse(format!("{status}: {body}")),
                ErrorResponse::into_error,
            ));
        }

        let token_response: TokenResponse = serde_json::from_str(&body)?;
        Token::from_response(token_response)
    }
}
