//! Google OAuth 2.0 client
//!
//! Authorization-code flow: build the consent URL, then trade the
//! returned code for the caller's verified identity.

use serde::Deserialize;
use url::Url;

use crate::config::GoogleOAuthConfig;
use crate::data::ExternalIdentity;
use crate::error::AppError;

const SCOPE: &str = "email profile";

/// Provider endpoints and credentials, borrowed from configuration
pub struct GoogleClient<'a> {
    config: &'a GoogleOAuthConfig,
    http: &'a reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// OpenID Connect userinfo
#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    name: Option<String>,
    email: Option<String>,
    picture: Option<String>,
}

impl<'a> GoogleClient<'a> {
    pub fn new(config: &'a GoogleOAuthConfig, http: &'a reqwest::Client) -> Self {
        Self { config, http }
    }

    /// Consent page URL carrying `state`
    pub fn authorize_url(&self, state: &str) -> Result<Url, AppError> {
        Url::parse_with_params(
            &self.config.authorize_url,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", SCOPE),
                ("state", state),
            ],
        )
        .map_err(|e| AppError::Config(format!("auth.google.authorize_url: {e}")))
    }

    /// Exchange an authorization code for the signed-in identity
    ///
    /// # Steps
    /// 1. POST the code to the token endpoint
    /// 2. GET userinfo with the access token
    ///
    /// # Errors
    /// Any transport failure or non-success status is `AppError::Upstream`
    pub async fn fetch_identity(&self, code: &str) -> Result<ExternalIdentity, AppError> {
        let response = self
            .http
            .post(&self.config.token_url)
            .form(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("invalid token response: {e}")))?;

        let response = self
            .http
            .get(&self.config.userinfo_url)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("userinfo request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "userinfo endpoint returned {}",
                response.status()
            )));
        }
        let info: UserInfo = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("invalid userinfo response: {e}")))?;

        into_identity(info)
    }
}

fn into_identity(info: UserInfo) -> Result<ExternalIdentity, AppError> {
    let email = info
        .email
        .filter(|email| !email.trim().is_empty())
        .ok_or_else(|| AppError::Upstream("identity has no email".to_string()))?;
    let name = info
        .name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| email.clone());

    Ok(ExternalIdentity {
        id: info.sub,
        name,
        email,
        picture: info.picture,
    })
}
