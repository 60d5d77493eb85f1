use std::sync::RwLock;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hks_core::{AccessClaims, Error, Result};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde_json::{json, Value};

pub const ACCESS_TOKEN_TTL: Duration = Duration::minutes(15);
pub const REFRESH_TOKEN_TTL: Duration = Duration::days(30);
pub const WORKSPACE_TOKEN_TTL: Duration = Duration::hours(1);

const RSA_KEY_BITS: usize = 2048;

struct KeyPair {
    kid: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    public: RsaPublicKey,
    /// `None` for the currently active pair; set once `Rotate()` demotes it.
    retired_at: Option<DateTime<Utc>>,
}

impl KeyPair {
    fn generate() -> Result<Self> {
        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, RSA_KEY_BITS)
            .map_err(|e| Error::Internal(format!("RSA key generation failed: {e}")))?;
        let public = RsaPublicKey::from(&private);

        let der = private
            .to_pkcs1_der()
            .map_err(|e| Error::Internal(format!("RSA key encoding failed: {e}")))?;
        let encoding_key = EncodingKey::from_rsa_der(der.as_bytes());

        let public_der = public
            .to_pkcs1_der()
            .map_err(|e| Error::Internal(format!("RSA public key encoding failed: {e}")))?;
        let decoding_key = DecodingKey::from_rsa_der(public_der.as_bytes());

        Ok(Self {
            kid: uuid::Uuid::new_v4().to_string(),
            encoding_key,
            decoding_key,
            public,
            retired_at: None,
        })
    }

    fn jwk(&self) -> Value {
        json!({
            "kty": "RSA",
            "use": "sig",
            "alg": "RS256",
            "kid": self.kid,
            "n": URL_SAFE_NO_PAD.encode(self.public.n().to_bytes_be()),
            "e": URL_SAFE_NO_PAD.encode(self.public.e().to_bytes_be()),
        })
    }
}

/// Holds one active RSA key pair plus, during a rotation's grace window,
/// the previous pair -- long enough for outstanding access tokens signed
/// with it to still verify.
pub struct KeyService {
    active: RwLock<KeyPair>,
    retired: RwLock<Option<KeyPair>>,
    grace: Duration,
}

impl KeyService {
    pub fn new() -> Result<Self> {
        Ok(Self {
            active: RwLock::new(KeyPair::generate()?),
            retired: RwLock::new(None),
            grace: ACCESS_TOKEN_TTL,
        })
    }

    pub fn sign(&self, claims: &AccessClaims) -> Result<String> {
        let active = self.active.read().expect("key service lock poisoned");
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(active.kid.clone());
        Ok(encode(&header, claims, &active.encoding_key)?)
    }

    /// Verify against the active key first, falling back to a retired key
    /// still within its grace window.
    pub fn verify(&self, jws: &str) -> Result<AccessClaims> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;

        let active = self.active.read().expect("key service lock poisoned");
        if let Ok(data) = decode::<AccessClaims>(jws, &active.decoding_key, &validation) {
            return Ok(data.claims);
        }
        drop(active);

        let retired = self.retired.read().expect("key service lock poisoned");
        if let Some(pair) = retired.as_ref() {
            let expired = pair
                .retired_at
                .map(|at| Utc::now() > at + self.grace)
                .unwrap_or(false);
            if !expired {
                if let Ok(data) = decode::<AccessClaims>(jws, &pair.decoding_key, &validation) {
                    return Ok(data.claims);
                }
            }
        }

        Err(Error::Unauthorized("invalid or expired access token".into()))
    }

    /// RFC 7517 JSON Web Key Set: the active key plus any retired key still
    /// within its grace window.
    pub fn jwks(&self) -> Value {
        let mut keys = vec![self.active.read().expect("key service lock poisoned").jwk()];
        let retired = self.retired.read().expect("key service lock poisoned");
        if let Some(pair) = retired.as_ref() {
            let expired = pair
                .retired_at
                .map(|at| Utc::now() > at + self.grace)
                .unwrap_or(false);
            if !expired {
                keys.push(pair.jwk());
            }
        }
        json!({ "keys": keys })
    }

    /// Generate a new active key pair, demoting the current one to
    /// `retired` for one grace window.
    pub fn rotate(&self) -> Result<()> {
        let mut next = KeyPair::generate()?;
        next.retired_at = None;
        let mut previous = {
            let mut active = self.active.write().expect("key service lock poisoned");
            std::mem::swap(&mut *active, &mut next);
            next
        };
        previous.retired_at = Some(Utc::now());
        *self.retired.write().expect("key service lock poisoned") = Some(previous);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(exp_offset: Duration) -> AccessClaims {
        let now = Utc::now();
        AccessClaims {
            sub: "user-1".into(),
            email: "a@x.test".into(),
            name: "A".into(),
            provider: "google".into(),
            org_ids: vec![],
            iat: now.timestamp() as usize,
            exp: (now + exp_offset).timestamp() as usize,
            workspace_id: None,
            groups: None,
        }
    }

    #[test]
    fn sign_and_verify_roundtrip() {
        let service = KeyService::new().unwrap();
        let token = service.sign(&claims(ACCESS_TOKEN_TTL)).unwrap();
        let verified = service.verify(&token).unwrap();
        assert_eq!(verified.sub, "user-1");
    }

    #[test]
    fn verify_rejects_expired() {
        let service = KeyService::new().unwrap();
        let token = service.sign(&claims(Duration::seconds(-10))).unwrap();
        assert!(service.verify(&token).is_err());
    }

    #[test]
    fn rotate_keeps_old_token_valid_within_grace() {
        let service = KeyService::new().unwrap();
        let token = service.sign(&claims(ACCESS_TOKEN_TTL)).unwrap();
        service.rotate().unwrap();
        assert!(service.verify(&token).is_ok());
    }

    #[test]
    fn jwks_lists_active_and_retired_keys_after_rotation() {
        let service = KeyService::new().unwrap();
        service.rotate().unwrap();
        let jwks = service.jwks();
        assert_eq!(jwks["keys"].as_array().unwrap().len(), 2);
    }
}
