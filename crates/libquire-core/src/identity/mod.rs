//! Identities: the people (or agents) authoring tickets
//!
//! An identity is a chain of [`Version`]s stored under
//! `refs/identities/<id>`. Its state is the newest version; keys listed on a
//! version are valid from that version's lamport time until the next one.

mod key;
mod stub;
mod version;

use chrono::{DateTime, Utc};

pub use key::Key;
pub use stub::IdentityRef;
pub use version::{Mutation, Version, VersionSignature, FORMAT_VERSION, NONCE_LENGTH};

use crate::entity::{Entity, VersionRecord};
use crate::error::ValidationError;
use crate::refs::IDENTITY_NAMESPACE;
use crate::signing::{verify_raw, SigningKeyPair};
use crate::types::ids::Id;
use crate::types::lamport::LamportTime;

/// Name of the repository clock ordering identity versions
pub const IDENTITY_CLOCK: &str = "identity";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    id: Id,
    versions: Vec<Version>,
}

impl Identity {
    /// Create an identity from its genesis fields
    pub fn new(
        mutation: Mutation,
        time: LamportTime,
        unix_time: i64,
        signer: Option<&SigningKeyPair>,
    ) -> Self {
        let genesis = Version::new(mutation, time, unix_time, signer);
        Self {
            id: genesis.content_id(),
            versions: vec![genesis],
        }
    }

    fn last(&self) -> &Version {
        // never empty: built from a genesis version or rejected by from_versions
        &self.versions[self.versions.len() - 1]
    }

    pub fn name(&self) -> &str {
        self.last().name()
    }

    pub fn email(&self) -> Option<&str> {
        self.last().email()
    }

    pub fn login(&self) -> Option<&str> {
        self.last().login()
    }

    pub fn avatar_url(&self) -> Option<&str> {
        self.last().avatar_url()
    }

    /// Keys of the current version
    pub fn keys(&self) -> &[Key] {
        self.last().keys()
    }

    /// Keys that were valid at the given lamport time
    pub fn valid_keys_at(&self, time: LamportTime) -> &[Key] {
        self.versions
            .iter()
            .rev()
            .find(|v| v.time() <= time)
            .map(|v| v.keys())
            .unwrap_or(&[])
    }

    /// `name (login)` when a login is set, `name` otherwise
    pub fn display_name(&self) -> String {
        match self.login() {
            Some(login) => format!("{} ({})", self.name(), login),
            None => self.name().to_string(),
        }
    }

    pub fn last_modification(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.last().unix_time(), 0)
    }

    pub fn last_lamport(&self) -> LamportTime {
        self.last().time()
    }

    /// Append a version if `f` changes any field.
    ///
    /// Returns `false` (and appends nothing) when the edit is a no-op.
    pub fn mutate<F>(
        &mut self,
        time: LamportTime,
        unix_time: i64,
        signer: Option<&SigningKeyPair>,
        f: F,
    ) -> bool
    where
        F: FnOnce(&mut Mutation),
    {
        let current = self.last().mutation();
        let mut next = current.clone();
        f(&mut next);
        if next == current {
            return false;
        }
        self.versions
            .push(Version::new(next, time, unix_time, signer));
        true
    }
}

impl Entity for Identity {
    type Version = Version;

    const NAMESPACE: &'static str = IDENTITY_NAMESPACE;
    const CLOCK: &'static str = IDENTITY_CLOCK;

    fn from_versions(versions: Vec<Version>) -> Result<Self, ValidationError> {
        let genesis = versions.first().ok_or(ValidationError::NoVersion)?;
        Ok(Self {
            id: genesis.content_id(),
            versions,
        })
    }

    fn id(&self) -> &Id {
        &self.id
    }

    fn versions(&self) -> &[Version] {
        &self.versions
    }

    fn versions_mut(&mut self) -> &mut [Version] {
        &mut self.versions
    }

    fn adopt(&mut self, versions: Vec<Version>) {
        self.versions.extend(versions);
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let genesis = self.versions.first().ok_or(ValidationError::NoVersion)?;

        let mut previous: Option<&Version> = None;
        for (index, version) in self.versions.iter().enumerate() {
            version
                .validate()
                .map_err(|reason| ValidationError::InvalidVersion { index, reason })?;

            if let Some(prev) = previous {
                if version.time() <= prev.time() {
                    return Err(ValidationError::NonChronological {
                        previous: prev.time(),
                        next: version.time(),
                    });
                }
            }

            if let Some(signature) = version.signature() {
                // the genesis version vouches for itself; later versions must be
                // signed by a key valid before they were written
                let allowed = previous.unwrap_or(version);
                if !allowed.keys().iter().any(|k| k.public_key == signature.key) {
                    return Err(ValidationError::UnknownSigningKey {
                        index,
                        key: signature.key.clone(),
                        time: allowed.time(),
                    });
                }
                let sig = hex::decode(&signature.sig)
                    .map_err(|_| ValidationError::BadSignature { index })?;
                verify_raw(&version.signing_payload(), &sig, &signature.key)
                    .map_err(|_| ValidationError::BadSignature { index })?;
            }

            previous = Some(version);
        }

        let expected = genesis.content_id();
        if self.id != expected {
            return Err(ValidationError::IdMismatch {
                id: self.id.clone(),
                expected,
            });
        }
        Ok(())
    }
}
