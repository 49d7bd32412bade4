//! Application state and router assembly.
//!
//! Every collaborator (store, provider dispatch, summarizer, senders) is
//! constructed once here at startup and injected; nothing downstream
//! reaches for globals or the environment.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use famdigest_compose::{ComposeError, PromptEndpointClient, Summarizer};
use famdigest_core::{SecretBox, SecretError};
use famdigest_delivery::{DeliveryError, Notifier, OptInTracker, SmtpEmail, TwilioSms};
use famdigest_providers::google::GoogleOAuth;
use famdigest_providers::office365::Office365OAuth;
use famdigest_providers::{ProviderError, RemoteCalendars, SourceFactory};
use famdigest_store::{Store, StoreError};
use thiserror::Error;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::routes;

/// Errors raised while assembling the application.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Secret(#[from] SecretError),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
    #[error(transparent)]
    Compose(#[from] ComposeError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Shared state behind every route handler.
pub struct AppState {
    pub store: Arc<Store>,
    pub sources: Arc<dyn SourceFactory>,
    pub summarizer: Arc<dyn Summarizer>,
    pub notifier: Notifier,
    pub tracker: OptInTracker,
    pub secrets: SecretBox,
    pub google_oauth: Option<GoogleOAuth>,
    pub office365_oauth: Option<Office365OAuth>,
    pub oauth_success_url: String,
    pub oauth_error_url: String,
    /// Timeout for the short-lived provider clients the OAuth callbacks
    /// build to read account metadata.
    pub http_timeout: Duration,
}

impl AppState {
    /// Builds the full production wiring from config.
    pub fn from_config(config: &ServerConfig) -> Result<Arc<Self>, StartupError> {
        let store = Arc::new(Store::open(&config.database_path)?);
        let secrets = SecretBox::from_base64_key(&config.secret_key)?;

        let sms = Arc::new(TwilioSms::new(config.twilio.clone())?);
        let email = Arc::new(SmtpEmail::new(config.smtp.clone())?);
        let notifier = Notifier::new(sms, email);
        let tracker = OptInTracker::new(store.clone(), notifier.clone());

        let summarizer = Arc::new(PromptEndpointClient::new(config.summarizer.clone())?);

        let sources = Arc::new(
            RemoteCalendars::new(config.google.clone(), config.office365.clone())
                .with_timeout(config.http_timeout),
        );

        let google_oauth = match &config.google {
            Some(google) => Some(GoogleOAuth::new(google.clone())?),
            None => None,
        };
        let office365_oauth = match &config.office365 {
            Some(office365) => Some(Office365OAuth::new(office365.clone())?),
            None => None,
        };

        Ok(Arc::new(Self {
            store,
            sources,
            summarizer,
            notifier,
            tracker,
            secrets,
            google_oauth,
            office365_oauth,
            oauth_success_url: config.oauth_success_url.clone(),
            oauth_error_url: config.oauth_error_url.clone(),
            http_timeout: config.http_timeout,
        }))
    }
}

/// Assembles the HTTP surface.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(routes::digest::healthz))
        .route("/hooks/digest-tick", post(routes::digest::digest_tick))
        .route("/hooks/inbound-sms", post(routes::webhook::inbound_sms))
        .route(
            "/subscriptions/{id}/resend-opt-in",
            post(routes::digest::resend_opt_in),
        )
        .route(
            "/oauth/google/callback",
            get(routes::oauth::google_callback),
        )
        .route(
            "/oauth/office365/callback",
            get(routes::oauth::office365_callback),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
