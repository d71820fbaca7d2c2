//! Cross-references to identities
//!
//! Another entity (or the repo config) stores only an identity's id. The
//! history lives in the ref-backed object store, so deserializing a
//! reference always yields `Unresolved`, which has to be resolved before any
//! field can be read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::entity::Entity;
use crate::error::ValidationError;
use crate::identity::{Identity, Key};
use crate::types::ids::Id;
use crate::types::lamport::LamportTime;

const UNRESOLVED: &str = "identities need to be properly loaded with read_local()";

/// An identity that may not be loaded yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityRef {
    Unresolved(Id),
    Resolved(Box<Identity>),
}

impl IdentityRef {
    pub fn id(&self) -> &Id {
        match self {
            IdentityRef::Unresolved(id) => id,
            IdentityRef::Resolved(identity) => identity.id(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, IdentityRef::Resolved(_))
    }

    /// Load the identity if needed, using `load` to fetch it by id
    pub fn resolve<F, E>(&mut self, load: F) -> Result<&Identity, E>
    where
        F: FnOnce(&Id) -> Result<Identity, E>,
    {
        if let IdentityRef::Unresolved(id) = self {
            let identity = load(id)?;
            *self = IdentityRef::Resolved(Box::new(identity));
        }
        Ok(self.identity())
    }

    /// The loaded identity.
    ///
    /// # Panics
    ///
    /// On `Unresolved`: reading an unloaded placeholder is a programming error.
    pub fn identity(&self) -> &Identity {
        match self {
            IdentityRef::Resolved(identity) => identity,
            IdentityRef::Unresolved(_) => panic!("{}", UNRESOLVED),
        }
    }

    pub fn into_identity(self) -> Identity {
        match self {
            IdentityRef::Resolved(identity) => *identity,
            IdentityRef::Unresolved(_) => panic!("{}", UNRESOLVED),
        }
    }

    pub fn name(&self) -> &str {
        self.identity().name()
    }

    pub fn email(&self) -> Option<&str> {
        self.identity().email()
    }

    pub fn login(&self) -> Option<&str> {
        self.identity().login()
    }

    pub fn avatar_url(&self) -> Option<&str> {
        self.identity().avatar_url()
    }

    pub fn keys(&self) -> &[Key] {
        self.identity().keys()
    }

    pub fn valid_keys_at(&self, time: LamportTime) -> &[Key] {
        self.identity().valid_keys_at(time)
    }

    pub fn display_name(&self) -> String {
        self.identity().display_name()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.identity().validate()
    }

    pub fn last_modification(&self) -> Option<DateTime<Utc>> {
        self.identity().last_modification()
    }

    pub fn last_lamport(&self) -> LamportTime {
        self.identity().last_lamport()
    }
}

impl From<Identity> for IdentityRef {
    fn from(identity: Identity) -> Self {
        IdentityRef::Resolved(Box::new(identity))
    }
}

impl From<Id> for IdentityRef {
    fn from(id: Id) -> Self {
        IdentityRef::Unresolved(id)
    }
}

#[derive(Serialize, Deserialize)]
struct RefRepr<T> {
    id: T,
}

impl Serialize for IdentityRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RefRepr { id: self.id() }.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for IdentityRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = RefRepr::<Id>::deserialize(deserializer)?;
        Ok(IdentityRef::Unresolved(repr.id))
    }
}
