use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use sha2::{Digest, Sha256};

/// Random PKCE code verifier: 48 random bytes as base64url, 64 characters,
/// inside the 43..=128 range RFC 7636 allows.
pub fn code_verifier() -> String {
    let bytes: [u8; 48] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// S256 challenge for a verifier: BASE64URL(SHA256(verifier)).
pub fn code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Random state parameter tying the provider redirect back to this client.
pub fn state_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(bytes)
}
