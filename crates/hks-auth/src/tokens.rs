use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// 32 random bytes, URL-safe base64 (no padding) -- used for `state` and
/// for the opaque refresh-token secret.
pub fn random_url_safe_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

/// Refresh tokens are `{selector}.{secret}`: the selector gives O(1)
/// session lookup without touching the hash, and the secret is the part
/// that actually gets hashed and compared.
pub fn new_refresh_token() -> (String, String) {
    let selector = random_url_safe_token(9);
    let token = format!("{selector}.{}", random_url_safe_token(32));
    (token, selector)
}

pub fn selector_of(refresh_token: &str) -> Option<&str> {
    refresh_token.split('.').next()
}

/// `BASE64URL_NOPAD(SHA256(verifier)) == challenge`.
pub fn verify_pkce(challenge: &str, verifier: &str) -> bool {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest) == challenge
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_survives_roundtrip() {
        let (token, selector) = new_refresh_token();
        assert_eq!(selector_of(&token), Some(selector.as_str()));
    }

    #[test]
    fn pkce_matches_only_correct_verifier() {
        let verifier = "a-random-verifier-string";
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        assert!(verify_pkce(&challenge, verifier));
        assert!(!verify_pkce(&challenge, "wrong-verifier"));
    }
}
