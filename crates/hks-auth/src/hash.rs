use rand::RngCore;
use sha2::{Digest, Sha256};

/// `Hash(token) -> (hash_hex, salt_hex)` / `Verify` pure-crypto pair.
/// Holds no state and performs no I/O or business validation -- the
/// caller decides what the token means.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenHasher;

impl TokenHasher {
    pub fn new() -> Self {
        Self
    }

    /// SHA-256(token || 32-byte random salt), both hex-encoded.
    pub fn hash(&self, token: &str) -> (String, String) {
        let mut salt = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut salt);
        let hash_hex = Self::digest(token, &salt);
        (hash_hex, to_hex(&salt))
    }

    /// Recompute the hash from `plain` + the stored salt and compare in
    /// constant time against `hash_hex`.
    pub fn verify(&self, plain: &str, hash_hex: &str, salt_hex: &str) -> bool {
        let Some(salt) = from_hex(salt_hex) else {
            return false;
        };
        let computed = Self::digest(plain, &salt);
        constant_time_eq(computed.as_bytes(), hash_hex.as_bytes())
    }

    fn digest(token: &str, salt: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hasher.update(salt);
        to_hex(&hasher.finalize())
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn from_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

/// Byte-wise comparison that does not short-circuit on the first
/// mismatch, avoiding a timing side-channel on hash comparison.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_accepts_matching_plaintext() {
        let hasher = TokenHasher::new();
        let (hash_hex, salt_hex) = hasher.hash("my-refresh-token");
        assert!(hasher.verify("my-refresh-token", &hash_hex, &salt_hex));
    }

    #[test]
    fn verify_rejects_wrong_plaintext() {
        let hasher = TokenHasher::new();
        let (hash_hex, salt_hex) = hasher.hash("my-refresh-token");
        assert!(!hasher.verify("someone-elses-token", &hash_hex, &salt_hex));
    }

    #[test]
    fn hash_is_salted_per_call() {
        let hasher = TokenHasher::new();
        let (hash_a, salt_a) = hasher.hash("same-token");
        let (hash_b, salt_b) = hasher.hash("same-token");
        assert_ne!(salt_a, salt_b);
        assert_ne!(hash_a, hash_b);
    }

    #[test]
    fn verify_rejects_malformed_salt() {
        let hasher = TokenHasher::new();
        assert!(!hasher.verify("token", "deadbeef", "not-hex"));
    }
}
