//! Provider OAuth callbacks.
//!
//! Each callback receives an authorization code (or an error) from the
//! provider's consent page. On success the code is exchanged, a
//! connection row is persisted, the account's calendars are listed and
//! recorded, and the browser is redirected to the configured destination.
//! On failure the browser is redirected to the error page with
//! `provider|message` encoded in the query string.
//!
//! The `state` parameter carries the owner id through the round trip; the
//! dashboard sets it when it builds the consent URL.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::Redirect;
use famdigest_core::CalendarKind;
use famdigest_providers::google::GoogleCalendarClient;
use famdigest_providers::office365::GraphClient;
use famdigest_store::NewConnection;
use serde::Deserialize;
use tracing::{info, warn};

use crate::app::AppState;

/// Query parameters common to both providers' callbacks.
#[derive(Debug, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    /// Echoed owner id.
    pub state: Option<String>,
    pub error: Option<String>,
}

pub async fn google_callback(
    State(app): State<Arc<AppState>>,
    Query(query): Query<OAuthCallbackQuery>,
) -> Redirect {
    let (code, owner_id) = match unpack(&app, "google", &query) {
        Ok(parts) => parts,
        Err(redirect) => return redirect,
    };

    let Some(oauth) = app.google_oauth.as_ref() else {
        return error_redirect(&app, "google", "provider is not configured");
    };

    let grant = match oauth.exchange_code(&code).await {
        Ok(grant) => grant,
        Err(e) => return error_redirect(&app, "google", e.message()),
    };

    // The primary calendar's id is the account email.
    let client = match GoogleCalendarClient::new(&grant.access_token, app.http_timeout) {
        Ok(client) => client,
        Err(e) => return error_redirect(&app, "google", e.message()),
    };
    let calendars = match client.list_calendars().await {
        Ok(calendars) => calendars,
        Err(e) => return error_redirect(&app, "google", e.message()),
    };
    let email = calendars
        .iter()
        .find(|entry| entry.primary)
        .map(|entry| entry.id.clone())
        .unwrap_or_default();

    let connection_id = match app.store.insert_connection(&NewConnection {
        owner_id: owner_id.clone(),
        provider: CalendarKind::Google,
        email,
        access_token: Some(grant.access_token),
        refresh_token: grant.refresh_token,
        password_sealed: None,
        server_url: None,
    }) {
        Ok(id) => id,
        Err(e) => return error_redirect(&app, "google", &e.to_string()),
    };

    for entry in &calendars {
        if let Err(e) =
            app.store
                .upsert_calendar(connection_id, &owner_id, &entry.id, &entry.summary)
        {
            warn!(connection = connection_id, error = %e, "failed to record calendar");
        }
    }

    info!(
        owner = %owner_id,
        connection = connection_id,
        calendars = calendars.len(),
        "google account connected"
    );
    Redirect::to(&app.oauth_success_url)
}

pub async fn office365_callback(
    State(app): State<Arc<AppState>>,
    Query(query): Query<OAuthCallbackQuery>,
) -> Redirect {
    let (code, owner_id) = match unpack(&app, "office365", &query) {
        Ok(parts) => parts,
        Err(redirect) => return redirect,
    };

    let Some(oauth) = app.office365_oauth.as_ref() else {
        return error_redirect(&app, "office365", "provider is not configured");
    };

    let grant = match oauth.exchange_code(&code).await {
        Ok(grant) => grant,
        Err(e) => return error_redirect(&app, "office365", e.message()),
    };

    let client = match GraphClient::new(&grant.access_token, app.http_timeout) {
        Ok(client) => client,
        Err(e) => return error_redirect(&app, "office365", e.message()),
    };
    let email = match client.me().await {
        Ok(profile) => profile.email().unwrap_or_default().to_string(),
        Err(e) => return error_redirect(&app, "office365", e.message()),
    };

    let connection_id = match app.store.insert_connection(&NewConnection {
        owner_id: owner_id.clone(),
        provider: CalendarKind::Office365,
        email,
        access_token: Some(grant.access_token.clone()),
        refresh_token: grant.refresh_token,
        password_sealed: None,
        server_url: None,
    }) {
        Ok(id) => id,
        Err(e) => return error_redirect(&app, "office365", &e.to_string()),
    };

    match client.list_calendars().await {
        Ok(calendars) => {
            for calendar in &calendars {
                if let Err(e) = app.store.upsert_calendar(
                    connection_id,
                    &owner_id,
                    &calendar.id,
                    &calendar.name,
                ) {
                    warn!(connection = connection_id, error = %e, "failed to record calendar");
                }
            }
            info!(
                owner = %owner_id,
                connection = connection_id,
                calendars = calendars.len(),
                "office365 account connected"
            );
        }
        Err(e) => {
            // The connection exists; listing retries on the next dashboard
            // visit or tick.
            warn!(connection = connection_id, error = %e, "initial calendar listing failed");
        }
    }

    Redirect::to(&app.oauth_success_url)
}

/// Pulls the code and owner id out of the callback, turning provider
/// errors and missing parameters into error redirects.
fn unpack(
    app: &AppState,
    provider: &str,
    query: &OAuthCallbackQuery,
) -> Result<(String, String), Redirect> {
    if let Some(error) = &query.error {
        return Err(error_redirect(app, provider, error));
    }
    let code = query
        .code
        .clone()
        .filter(|code| !code.is_empty())
        .ok_or_else(|| error_redirect(app, provider, "missing authorization code"))?;
    let owner_id = query
        .state
        .clone()
        .filter(|owner| !owner.is_empty())
        .ok_or_else(|| error_redirect(app, provider, "missing state parameter"))?;
    Ok((code, owner_id))
}

/// Builds the failure redirect: `<error_url>?error=provider|message`.
fn error_redirect(app: &AppState, provider: &str, message: &str) -> Redirect {
    warn!(provider = %provider, message = %message, "oauth callback failed");
    let raw = format!("{provider}|{message}");
    let encoded = urlencoding::encode(&raw);
    Redirect::to(&format!("{}?error={}", app.oauth_error_url, encoded))
}
