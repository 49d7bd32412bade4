//! OAuth 2.0 authorization-code flow against Microsoft's token endpoint.

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};
use crate::google::TokenGrant;

use super::config::{GRAPH_SCOPES, Office365Config};

/// OAuth client for login.microsoftonline.com.
#[derive(Debug, Clone)]
pub struct Office365OAuth {
    config: Office365Config,
    http: reqwest::Client,
}

impl Office365OAuth {
    pub fn new(config: Office365Config) -> ProviderResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                ProviderError::configuration(format!("failed to build HTTP client: {e}"))
            })?;
        Ok(Self { config, http })
    }

    fn authorize_endpoint(&self) -> String {
        format!(
            "https://login.microsoftonline.com/{}/oauth2/v2.0/authorize",
            self.config.tenant
        )
    }

    fn token_endpoint(&self) -> String {
        format!(
            "https://login.microsoftonline.com/{}/oauth2/v2.0/token",
            self.config.tenant
        )
    }

    /// Builds the consent-page URL the owner is sent to.
    pub fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&response_mode=query&\
             scope={}&state={}",
            self.authorize_endpoint(),
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(GRAPH_SCOPES),
            urlencoding::encode(state),
        )
    }

    /// Exchanges an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> ProviderResult<TokenGrant> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("scope", GRAPH_SCOPES),
        ];

        debug!("exchanging office365 authorization code");
        let response = self.token_request(&params).await?;

        info!("obtained office365 tokens");
        Ok(TokenGrant {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_in: response.expires_in,
        })
    }

    /// Refreshes an expired access token.
    pub async fn refresh(&self, refresh_token: &str) -> ProviderResult<TokenGrant> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
            ("scope", GRAPH_SCOPES),
        ];

        debug!("refreshing office365 access token");
        let response = self.token_request(&params).await?;

        Ok(TokenGrant {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_in: response.expires_in,
        })
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> ProviderResult<TokenResponse> {
        let response = self
            .http
            .post(self.token_endpoint())
            .form(params)
            .send()
            .await
            .map_err(ProviderError::from_transport)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(ProviderError::from_transport)?;

        if !status.is_success() {
            if status.is_client_error() {
                return Err(ProviderError::authentication(format!(
                    "token request rejected ({status}): {body}"
                )));
            }
            return Err(ProviderError::unavailable(format!(
                "token endpoint error ({status}): {body}"
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| ProviderError::invalid_response(format!("invalid token response: {e}")))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}
