//! OAuth login against the external identity provider.

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::core::config::settings::OAuthSettings;
use crate::core::messages;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token request failed: {0}")]
    Token(String),
    #[error("{}", messages::ERROR_INVALID_ACCESS_TOKEN)]
    InvalidToken,
    #[error("{}", messages::ERROR_EXPIRED_ACCESS_TOKEN)]
    ExpiredToken,
    #[error("profile request failed: {0}")]
    Profile(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

#[derive(Deserialize)]
struct Profile {
    #[serde(rename = "mailAddress")]
    mail_address: String,
}

#[derive(Deserialize, Default)]
struct ProviderErrorBody {
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Clone)]
pub struct OAuthClient {
    settings: OAuthSettings,
    client: Client,
}

impl OAuthClient {
    pub fn new(settings: OAuthSettings) -> Self {
        Self {
            settings,
            client: Client::new(),
        }
    }

    /// Authorization page the browser is sent to.
    pub fn login_url(&self) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}",
            self.settings.authorize_url,
            urlencoding::encode(&self.settings.client_id),
            urlencoding::encode(&self.settings.redirect_uri)
        )
    }

    /// Front-end landing page carrying the signed-in email.
    pub fn success_url(&self, email: &str) -> String {
        format!("{}?email={}", self.settings.frontend_url, urlencoding::encode(email))
    }

    pub fn error_url(&self) -> &str {
        &self.settings.error_url
    }

    /// Exchanges an authorization code for a token and returns the caller's
    /// email address.
    pub async fn authorize(&self, code: &str) -> Result<String, AuthError> {
        let params = [
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.settings.redirect_uri.as_str()),
        ];

        let res = self
            .client
            .post(&self.settings.token_url)
            .form(&params)
            .send()
            .await?;
        if !res.status().is_success() {
            let body: ProviderErrorBody = res.json().await.unwrap_or_default();
            return Err(AuthError::Token(
                body.error_description
                    .unwrap_or_else(|| "no error description".to_string()),
            ));
        }
        let token: TokenResponse = res.json().await?;
        tracing::debug!("Received {} access token", token.token_type);

        let res = self
            .client
            .get(&self.settings.profile_url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("{} {}", token.token_type, token.access_token),
            )
            .send()
            .await?;
        if !res.status().is_success() {
            let body: ProviderErrorBody = res.json().await.unwrap_or_default();
            return Err(match body.error_description.as_deref() {
                Some(messages::ERROR_INVALID_ACCESS_TOKEN) => AuthError::InvalidToken,
                Some(messages::ERROR_EXPIRED_ACCESS_TOKEN) => AuthError::ExpiredToken,
                Some(other) => AuthError::Profile(other.to_string()),
                None => AuthError::Profile("no error description".to_string()),
            });
        }

        let profile: Profile = res.json().await?;
        Ok(profile.mail_address)
    }
}
