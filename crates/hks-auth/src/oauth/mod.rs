//! One adapter per OAuth provider, sharing a trait and an HTTP client
//! shape across providers.

mod github;
mod google;

pub use github::GitHubProvider;
pub use google::GoogleProvider;

use async_trait::async_trait;
use hks_core::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderUserInfo {
    pub id: String,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
    pub provider: String,
}

#[derive(Debug, Clone)]
pub struct AuthUrlParams<'a> {
    pub redirect_url: &'a str,
    pub code_challenge: Option<&'a str>,
}

#[async_trait]
pub trait OAuthProvider: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn auth_url(&self, state: &str, params: AuthUrlParams<'_>) -> String;

    async fn exchange(&self, code: &str, redirect_url: &str) -> Result<String>;

    async fn user_info(&self, access_token: &str) -> Result<ProviderUserInfo>;
}
