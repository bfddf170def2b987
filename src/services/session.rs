use base64::{engine::general_purpose, Engine as _};
use rand::Rng;
use sha2::{Digest, Sha256};

pub const SESSION_COOKIE: &str = "session";

/// Signs and verifies the opaque session key carried in the cookie.
/// Cookie value is `key.signature` with signature = sha256(secret || key),
/// base64url encoded.
#[derive(Clone)]
pub struct SessionSigner {
    secret: String,
}

impl SessionSigner {
    pub fn new(secret: String) -> Self {
        Self { secret }
    }

    /// Random opaque session key for a new user row.
    pub fn generate_key() -> String {
        let mut rng = rand::thread_rng();
        let random_bytes: Vec<u8> = (0..32).map(|_| rng.gen()).collect();
        general_purpose::URL_SAFE_NO_PAD.encode(random_bytes)
    }

    pub fn sign(&self, key: &str) -> String {
        format!("{}.{}", key, self.signature(key))
    }

    /// Extract the key from a cookie value. Any tampering or truncation
    /// verifies as no session.
    pub fn verify(&self, cookie_value: &str) -> Option<String> {
        let (key, signature) = cookie_value.rsplit_once('.')?;
        if key.is_empty() || signature != self.signature(key) {
            return None;
        }
        Some(key.to_string())
    }

    fn signature(&self, key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(key.as_bytes());
        general_purpose::URL_SAFE_NO_PAD.encode(hasher.finalize())
    }
}
