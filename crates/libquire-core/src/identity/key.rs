use std::fmt;

use serde::{Deserialize, Serialize};

use crate::signing::{parse_public_key, SigningError, SigningKeyPair};

const FINGERPRINT_CHARS: usize = 16;

/// Public half of an identity's ed25519 signing key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key {
    pub public_key: String,
}

impl Key {
    pub fn new(public_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
        }
    }

    pub fn from_keypair(keypair: &SigningKeyPair) -> Self {
        Self::new(keypair.public_key_hex())
    }

    pub fn validate(&self) -> Result<(), SigningError> {
        parse_public_key(&self.public_key).map(|_| ())
    }

    /// Short form used for display
    pub fn fingerprint(&self) -> &str {
        // keys come from remote data and may not be ascii
        match self.public_key.char_indices().nth(FINGERPRINT_CHARS) {
            Some((end, _)) => &self.public_key[..end],
            None => &self.public_key,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.public_key)
    }
}
