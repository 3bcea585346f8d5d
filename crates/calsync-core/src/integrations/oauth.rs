//! OAuth2 refresh-token exchange for the calendar provider.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>, // Unix timestamp
    pub token_type: String,
    pub scope: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub service_name: String,
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
}

impl OAuthConfig {
    pub fn google(client_id: &str, client_secret: &str) -> Self {
        Self {
            service_name: "google".to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
        }
    }
}

/// Refresh an access token using a refresh token.
pub async fn refresh_token(
    client: &Client,
    config: &OAuthConfig,
    refresh: &str,
) -> Result<OAuthTokens> {
    let params = [
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.as_str()),
        ("refresh_token", refresh),
        ("grant_type", "refresh_token"),
    ];

    let resp = client
        .post(&config.token_url)
        .form(&params)
        .send()
        .await?;

    let body: serde_json::Value = resp.json().await?;

    if let Some(error) = body.get("error") {
        return Err(CoreError::integration(
            &config.service_name,
            format!("OAuth refresh error: {error}"),
        ));
    }

    let access_token = body["access_token"]
        .as_str()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            CoreError::integration(&config.service_name, "token response without access_token")
        })?
        .to_string();

    let expires_in = body.get("expires_in").and_then(|v| v.as_i64());
    let expires_at = expires_in.map(|ei| chrono::Utc::now().timestamp() + ei);

    Ok(OAuthTokens {
        access_token,
        refresh_token: body
            .get("refresh_token")
            .and_then(|v| v.as_str())
            .map(String::from)
            .or_else(|| Some(refresh.to_string())),
        expires_at,
        token_type: body["token_type"]
            .as_str()
            .unwrap_or("Bearer")
            .to_string(),
        scope: body.get("scope").and_then(|v| v.as_str()).map(String::from),
    })
}

/// Check if tokens are expired (with 60s buffer).
pub fn is_expired(tokens: &OAuthTokens) -> bool {
    match tokens.expires_at {
        Some(exp) => chrono::Utc::now().timestamp() > exp - 60,
        None => false,
    }
}
