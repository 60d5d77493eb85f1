use async_trait::async_trait;
use hks_core::{Error, Result};
use serde::Deserialize;
use url::Url;

use super::{AuthUrlParams, OAuthProvider, ProviderUserInfo};

const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const USERINFO_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct GoogleUserInfo {
    sub: String,
    email: String,
    name: String,
    picture: Option<String>,
}

pub struct GoogleProvider {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
}

impl GoogleProvider {
    pub fn new(http: reqwest::Client, client_id: String, client_secret: String) -> Self {
        Self {
            http,
            client_id,
            client_secret,
        }
    }
}

#[async_trait]
impl OAuthProvider for GoogleProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    fn auth_url(&self, state: &str, params: AuthUrlParams<'_>) -> String {
        let mut url = Url::parse(AUTH_ENDPOINT).expect("static URL is valid");
        {
            let mut qp = url.query_pairs_mut();
            qp.append_pair("client_id", &self.client_id);
            qp.append_pair("redirect_uri", params.redirect_url);
            qp.append_pair("response_type", "code");
            qp.append_pair("scope", "openid email profile");
            qp.append_pair("state", state);
            if let Some(challenge) = params.code_challenge {
                qp.append_pair("code_challenge", challenge);
                qp.append_pair("code_challenge_method", "S256");
            }
        }
        url.to_string()
    }

    async fn exchange(&self, code: &str, redirect_url: &str) -> Result<String> {
        let resp = self
            .http
            .post(TOKEN_ENDPOINT)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", redirect_url),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| Error::provider(format!("google token exchange failed: {e}"), true))?;

        if !resp.status().is_success() {
            return Err(Error::provider(
                format!("google token exchange returned {}", resp.status()),
                resp.status().is_server_error(),
            ));
        }

        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| Error::provider(format!("malformed google token response: {e}"), false))?;
        Ok(body.access_token)
    }

    async fn user_info(&self, access_token: &str) -> Result<ProviderUserInfo> {
        let resp = self
            .http
            .get(USERINFO_ENDPOINT)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| Error::provider(format!("google userinfo request failed: {e}"), true))?;

        if !resp.status().is_success() {
            return Err(Error::provider(
                format!("google userinfo returned {}", resp.status()),
                resp.status().is_server_error(),
            ));
        }

        let info: GoogleUserInfo = resp
            .json()
            .await
            .map_err(|e| Error::provider(format!("malformed google userinfo response: {e}"), false))?;

        Ok(ProviderUserInfo {
            id: info.sub,
            email: info.email,
            name: info.name,
            picture: info.picture,
            provider: "google".to_string(),
        })
    }
}
