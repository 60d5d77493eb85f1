//! OAuth/PKCE login, JWT issuance and rotation, refresh-token semantics,
//! and the per-provider adapters the login flow dispatches to.
//!
//! [`AuthService`] is the seam the server binds to; everything else here
//! (key management, token hashing, provider adapters) is an implementation
//! detail it composes.

pub mod hash;
pub mod keys;
pub mod oauth;
pub mod service;
pub mod tokens;
pub mod types;

pub use hash::TokenHasher;
pub use keys::{KeyService, ACCESS_TOKEN_TTL, REFRESH_TOKEN_TTL, WORKSPACE_TOKEN_TTL};
pub use oauth::{AuthUrlParams, GitHubProvider, GoogleProvider, OAuthProvider, ProviderUserInfo};
pub use service::AuthService;
pub use tokens::{new_refresh_token, random_url_safe_token, selector_of, verify_pkce};
pub use types::{AuthResponse, GetAuthUrlRequest, HandleCallbackRequest};
