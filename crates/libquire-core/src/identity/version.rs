//! Identity versions
//!
//! Each version is a full snapshot of the mutable identity fields, stored as
//! a JSON blob in its own commit. The content id of the genesis version is
//! the identity's id.

use std::collections::BTreeMap;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::entity::VersionRecord;
use crate::error::DecodeError;
use crate::hash::content_id;
use crate::identity::key::Key;
use crate::signing::SigningKeyPair;
use crate::types::ids::{Id, ObjectId};
use crate::types::lamport::LamportTime;

/// Encoding format written by this version of quire
pub const FORMAT_VERSION: u32 = 1;

/// Random bytes mixed into every version so identical edits hash differently
pub const NONCE_LENGTH: usize = 20;

/// Mutable identity fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mutation {
    pub name: String,
    pub email: Option<String>,
    pub login: Option<String>,
    pub avatar_url: Option<String>,
    pub keys: Vec<Key>,
    pub metadata: BTreeMap<String, String>,
}

impl Mutation {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: Some(email.into()),
            ..Default::default()
        }
    }
}

/// Detached signature over a version's unsigned encoding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSignature {
    /// Public key (hex) of the signer
    pub key: String,
    /// Ed25519 signature (hex)
    pub sig: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Version {
    format: u32,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    login: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    avatar_url: Option<String>,
    #[serde(default)]
    keys: Vec<Key>,
    time: LamportTime,
    unix_time: i64,
    nonce: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    metadata: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    signature: Option<VersionSignature>,

    #[serde(skip)]
    commit: Option<ObjectId>,
    /// Hash of the bytes this version was decoded from
    #[serde(skip)]
    digest: Option<Id>,
}

// the digest is a cache of the decoded bytes and takes no part in equality
impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.format == other.format
            && self.name == other.name
            && self.email == other.email
            && self.login == other.login
            && self.avatar_url == other.avatar_url
            && self.keys == other.keys
            && self.time == other.time
            && self.unix_time == other.unix_time
            && self.nonce == other.nonce
            && self.metadata == other.metadata
            && self.signature == other.signature
            && self.commit == other.commit
    }
}

impl Eq for Version {}

impl Version {
    /// Build a new, uncommitted version, signed when a key pair is given
    pub fn new(
        mutation: Mutation,
        time: LamportTime,
        unix_time: i64,
        signer: Option<&SigningKeyPair>,
    ) -> Self {
        let mut nonce = [0u8; NONCE_LENGTH];
        rand::thread_rng().fill_bytes(&mut nonce);

        let mut version = Self {
            format: FORMAT_VERSION,
            name: mutation.name,
            email: mutation.email,
            login: mutation.login,
            avatar_url: mutation.avatar_url,
            keys: mutation.keys,
            time,
            unix_time,
            nonce: hex::encode(nonce),
            metadata: mutation.metadata,
            signature: None,
            commit: None,
            digest: None,
        };
        if let Some(keypair) = signer {
            let sig = keypair.sign(&version.signing_payload());
            version.signature = Some(VersionSignature {
                key: keypair.public_key_hex(),
                sig: hex::encode(sig),
            });
        }
        version
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn login(&self) -> Option<&str> {
        self.login.as_deref()
    }

    pub fn avatar_url(&self) -> Option<&str> {
        self.avatar_url.as_deref()
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn unix_time(&self) -> i64 {
        self.unix_time
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn signature(&self) -> Option<&VersionSignature> {
        self.signature.as_ref()
    }

    /// Current field values, as a starting point for the next edit
    pub fn mutation(&self) -> Mutation {
        Mutation {
            name: self.name.clone(),
            email: self.email.clone(),
            login: self.login.clone(),
            avatar_url: self.avatar_url.clone(),
            keys: self.keys.clone(),
            metadata: self.metadata.clone(),
        }
    }

    /// Bytes covered by the signature: the encoding without the signature
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut unsigned = self.clone();
        unsigned.signature = None;
        serde_json::to_vec(&unsigned).expect("version serialization should not fail")
    }

    /// Check the fields of this version in isolation
    pub fn validate(&self) -> Result<(), String> {
        if self.format != FORMAT_VERSION {
            return Err(format!("unsupported format {}", self.format));
        }
        if self.unix_time <= 0 {
            return Err("unix time not set".to_string());
        }
        match hex::decode(&self.nonce) {
            Ok(bytes) if bytes.len() == NONCE_LENGTH => {}
            _ => return Err(format!("nonce must be {} hex-encoded bytes", NONCE_LENGTH)),
        }

        if self.name.trim().is_empty() {
            return Err("name is not set".to_string());
        }
        check_text("name", &self.name)?;
        if let Some(email) = &self.email {
            check_text("email", email)?;
        }
        if let Some(login) = &self.login {
            check_text("login", login)?;
        }
        if let Some(url) = &self.avatar_url {
            check_text("avatar url", url)?;
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err("avatar url is not a valid http(s) url".to_string());
            }
        }

        for key in &self.keys {
            key.validate()
                .map_err(|e| format!("invalid key {}: {}", key.fingerprint(), e))?;
        }
        for (k, v) in &self.metadata {
            check_text("metadata key", k)?;
            check_text("metadata value", v)?;
        }
        Ok(())
    }
}

fn check_text(field: &str, value: &str) -> Result<(), String> {
    if value.chars().any(char::is_control) {
        return Err(format!("{} contains control characters", field));
    }
    Ok(())
}

impl VersionRecord for Version {
    fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let mut version: Version = serde_json::from_slice(data)?;
        if version.format != FORMAT_VERSION {
            return Err(DecodeError::UnsupportedFormat {
                found: version.format,
                expected: FORMAT_VERSION,
            });
        }
        version.digest = Some(content_id(data));
        Ok(version)
    }

    fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    fn content_id(&self) -> Id {
        match &self.digest {
            Some(digest) => digest.clone(),
            None => content_id(
                &self
                    .encode()
                    .expect("version serialization should not fail"),
            ),
        }
    }

    fn time(&self) -> LamportTime {
        self.time
    }

    fn commit(&self) -> Option<&ObjectId> {
        self.commit.as_ref()
    }

    fn set_commit(&mut self, commit: ObjectId) {
        self.commit = Some(commit);
    }
}
