//! OAuth 2.0 authorization-code flow against Google's token endpoint.
//!
//! The web application drives the browser half of the flow; this client
//! only builds the consent URL, exchanges the returned code, and refreshes
//! expired access tokens. A failed refresh is an authentication failure:
//! the connection needs to be re-authorized by the owner, never retried.

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};

use super::config::{CALENDAR_SCOPE, GoogleConfig};

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Tokens obtained from a code exchange.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Seconds until the access token expires, if reported.
    pub expires_in: Option<i64>,
}

/// OAuth client for Google's token endpoint.
#[derive(Debug, Clone)]
pub struct GoogleOAuth {
    config: GoogleConfig,
    http: reqwest::Client,
}

impl GoogleOAuth {
    pub fn new(config: GoogleConfig) -> ProviderResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                ProviderError::configuration(format!("failed to build HTTP client: {e}"))
            })?;
        Ok(Self { config, http })
    }

    /// Builds the consent-page URL the owner is sent to.
    ///
    /// `state` is echoed back on the callback and carries the owner
    /// identity through the round trip.
    pub fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&\
             access_type=offline&prompt=consent&state={}",
            GOOGLE_AUTH_URL,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(CALENDAR_SCOPE),
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
        ];

        debug!("exchanging google authorization code");
        let response = self.token_request(&params).await?;

        info!("obtained google tokens");
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
        ];

        debug!("refreshing google access token");
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
            .post(GOOGLE_TOKEN_URL)
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
            // 4xx here means the grant itself was rejected (revoked consent,
            // expired code); the owner must reconnect.
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

#[cfg(test)]
mod tests {
    use super::*;

    fn oauth() -> GoogleOAuth {
        GoogleOAuth::new(GoogleConfig::new(
            "client-id.apps.googleusercontent.com",
            "client-secret",
            "https://app.example.com/oauth/google/callback",
        ))
        .unwrap()
    }

    #[test]
    fn authorize_url_shape() {
        let url = oauth().authorize_url("owner-42");

        assert!(url.starts_with(GOOGLE_AUTH_URL));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("state=owner-42"));
        assert!(url.contains(&urlencoding::encode(CALENDAR_SCOPE).into_owned()));
    }

    #[test]
    fn token_response_parses_without_refresh_token() {
        let parsed: TokenResponse =
            serde_json::from_str(r#"{"access_token":"ya29.abc","expires_in":3599}"#).unwrap();
        assert_eq!(parsed.access_token, "ya29.abc");
        assert!(parsed.refresh_token.is_none());
        assert_eq!(parsed.expires_in, Some(3599));
    }
}
