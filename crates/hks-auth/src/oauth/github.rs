use async_trait::async_trait;
use hks_core::{Error, Result};
use serde::Deserialize;
use url::Url;

use super::{AuthUrlParams, OAuthProvider, ProviderUserInfo};

const AUTH_ENDPOINT: &str = "https://github.com/login/oauth/authorize";
const TOKEN_ENDPOINT: &str = "https://github.com/login/oauth/access_token";
const USER_ENDPOINT: &str = "https://api.github.com/user";
const EMAILS_ENDPOINT: &str = "https://api.github.com/user/emails";

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct GitHubUser {
    id: u64,
    login: String,
    name: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Deserialize)]
struct GitHubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

pub struct GitHubProvider {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
}

impl GitHubProvider {
    pub fn new(http: reqwest::Client, client_id: String, client_secret: String) -> Self {
        Self {
            http,
            client_id,
            client_secret,
        }
    }
}

#[async_trait]
impl OAuthProvider for GitHubProvider {
    fn name(&self) -> &'static str {
        "github"
    }

    fn auth_url(&self, state: &str, params: AuthUrlParams<'_>) -> String {
        let mut url = Url::parse(AUTH_ENDPOINT).expect("static URL is valid");
        {
            let mut qp = url.query_pairs_mut();
            qp.append_pair("client_id", &self.client_id);
            qp.append_pair("redirect_uri", params.redirect_url);
            qp.append_pair("scope", "read:user user:email");
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
            .header("Accept", "application/json")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", redirect_url),
            ])
            .send()
            .await
            .map_err(|e| Error::provider(format!("github token exchange failed: {e}"), true))?;

        if !resp.status().is_success() {
            return Err(Error::provider(
                format!("github token exchange returned {}", resp.status()),
                resp.status().is_server_error(),
            ));
        }

        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| Error::provider(format!("malformed github token response: {e}"), false))?;
        Ok(body.access_token)
    }

    async fn user_info(&self, access_token: &str) -> Result<ProviderUserInfo> {
        let resp = self
            .http
            .get(USER_ENDPOINT)
            .bearer_auth(access_token)
            .header("User-Agent", "hks-control-plane")
            .send()
            .await
            .map_err(|e| Error::provider(format!("github user request failed: {e}"), true))?;

        if !resp.status().is_success() {
            return Err(Error::provider(
                format!("github user request returned {}", resp.status()),
                resp.status().is_server_error(),
            ));
        }

        let user: GitHubUser = resp
            .json()
            .await
            .map_err(|e| Error::provider(format!("malformed github user response: {e}"), false))?;

        let email = match user.email {
            Some(email) if !email.is_empty() => email,
            _ => self.primary_verified_email(access_token).await?.unwrap_or_default(),
        };

        let name = match user.name {
            Some(name) if !name.is_empty() => name,
            _ => user.login,
        };

        Ok(ProviderUserInfo {
            id: user.id.to_string(),
            email,
            name,
            picture: user.avatar_url,
            provider: "github".to_string(),
        })
    }
}

impl GitHubProvider {
    /// GitHub hides email by default; fall back to `/user/emails` and pick
    /// the entry that is both `primary` and `verified`.
    async fn primary_verified_email(&self, access_token: &str) -> Result<Option<String>> {
        let resp = self
            .http
            .get(EMAILS_ENDPOINT)
            .bearer_auth(access_token)
            .header("User-Agent", "hks-control-plane")
            .send()
            .await
            .map_err(|e| Error::provider(format!("github emails request failed: {e}"), true))?;

        if !resp.status().is_success() {
            return Err(Error::provider(
                format!("github emails request returned {}", resp.status()),
                resp.status().is_server_error(),
            ));
        }

        let emails: Vec<GitHubEmail> = resp
            .json()
            .await
            .map_err(|e| Error::provider(format!("malformed github emails response: {e}"), false))?;

        Ok(emails
            .into_iter()
            .find(|e| e.primary && e.verified)
            .map(|e| e.email))
    }
}
