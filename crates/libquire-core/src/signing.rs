//! Ed25519 signing and verification for versions
//!
//! A version signature covers the version's encoding with the signature
//! field left out, so it can be checked without trusting the stored bytes.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use thiserror::Error;

/// Ed25519 signing key pair
pub struct SigningKeyPair {
    signing_key: SigningKey,
}

impl SigningKeyPair {
    /// Generate a new random Ed25519 key pair
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self { signing_key }
    }

    /// Create from a 32-byte seed (hex-encoded)
    pub fn from_seed_hex(seed_hex: &str) -> Result<Self, SigningError> {
        let seed: [u8; 32] = decode_fixed(seed_hex.trim(), "Seed")?;
        Ok(Self {
            signing_key: SigningKey::from_bytes(&seed),
        })
    }

    /// Get the seed as hex (for storage)
    pub fn seed_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    /// Get the public key as hex
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.signing_key.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.signing_key.sign(message).to_bytes().to_vec()
    }
}

/// Errors that can occur during signing or verification
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("key parse error: {0}")]
    KeyParseError(String),

    #[error("signature parse error: {0}")]
    SignatureParseError(String),
}

/// Parse a hex-encoded Ed25519 public key
pub fn parse_public_key(public_key_hex: &str) -> Result<VerifyingKey, SigningError> {
    let bytes: [u8; 32] = decode_fixed(public_key_hex, "Public key")?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| SigningError::KeyParseError(e.to_string()))
}

/// Verify a raw signature over `message`
pub fn verify_raw(
    message: &[u8],
    signature: &[u8],
    public_key_hex: &str,
) -> Result<(), SigningError> {
    let verifying_key = parse_public_key(public_key_hex)?;

    let sig_array: [u8; 64] = signature.try_into().map_err(|_| {
        SigningError::SignatureParseError(format!(
            "Signature must be 64 bytes, got {}",
            signature.len()
        ))
    })?;
    let sig = Signature::from_bytes(&sig_array);

    verifying_key
        .verify(message, &sig)
        .map_err(|_| SigningError::InvalidSignature)
}

fn decode_fixed<const N: usize>(hex_str: &str, what: &str) -> Result<[u8; N], SigningError> {
    let bytes = hex::decode(hex_str).map_err(|e| SigningError::KeyParseError(e.to_string()))?;
    bytes.as_slice().try_into().map_err(|_| {
        SigningError::KeyParseError(format!("{} must be {} bytes, got {}", what, N, bytes.len()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_from_seed() {
        let keypair1 = SigningKeyPair::generate();
        let keypair2 = SigningKeyPair::from_seed_hex(&keypair1.seed_hex()).unwrap();

        // Same seed should produce same public key
        assert_eq!(keypair1.public_key_hex(), keypair2.public_key_hex());
        assert_eq!(keypair1.public_key_hex().len(), 64);
    }

    #[test]
    fn test_sign_and_verify() {
        let keypair = SigningKeyPair::generate();
        let signature = keypair.sign(b"version payload");

        assert_eq!(signature.len(), 64);
        assert!(verify_raw(b"version payload", &signature, &keypair.public_key_hex()).is_ok());
    }

    #[test]
    fn test_verify_tampered_message() {
        let keypair = SigningKeyPair::generate();
        let signature = keypair.sign(b"version payload");

        let result = verify_raw(b"version payloaD", &signature, &keypair.public_key_hex());
        assert!(matches!(result, Err(SigningError::InvalidSignature)));
    }

    #[test]
    fn test_verify_wrong_public_key() {
        let keypair1 = SigningKeyPair::generate();
        let keypair2 = SigningKeyPair::generate();
        let signature = keypair1.sign(b"payload");

        let result = verify_raw(b"payload", &signature, &keypair2.public_key_hex());
        assert!(matches!(result, Err(SigningError::InvalidSignature)));
    }

    #[test]
    fn test_parse_public_key_rejects_short_input() {
        assert!(matches!(
            parse_public_key("abcd"),
            Err(SigningError::KeyParseError(_))
        ));
    }
}
