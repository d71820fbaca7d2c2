//! The closed interface shared by every versioned, ref-backed entity kind

use crate::error::{DecodeError, MergeConflict, ValidationError};
use crate::merge::{reconcile, Reconciliation};
use crate::types::ids::{Id, ObjectId};
use crate::types::lamport::LamportTime;

/// One immutable step of an entity's history
pub trait VersionRecord: Clone + Send + 'static {
    /// Decode a version from the bytes stored in its commit tree
    fn decode(data: &[u8]) -> Result<Self, DecodeError>;

    /// Encode the version exactly as it will be stored
    fn encode(&self) -> Result<Vec<u8>, serde_json::Error>;

    /// Hash of the stored encoding
    fn content_id(&self) -> Id;

    fn time(&self) -> LamportTime;

    /// Commit this version was stored in, `None` while uncommitted
    fn commit(&self) -> Option<&ObjectId>;

    fn set_commit(&mut self, commit: ObjectId);
}

/// An append-only, causally ordered sequence of versions stored under
/// `refs/<NAMESPACE>/<id>`.
pub trait Entity: Sized + Send + 'static {
    type Version: VersionRecord;

    /// Ref namespace of this entity kind
    const NAMESPACE: &'static str;

    /// Repository clock ordering versions of this kind
    const CLOCK: &'static str;

    /// Tree entry holding the encoded version in each commit
    const VERSION_ENTRY: &'static str = "version";

    /// Fold a loaded version sequence into an entity (no validation)
    fn from_versions(versions: Vec<Self::Version>) -> Result<Self, ValidationError>;

    fn id(&self) -> &Id;

    fn versions(&self) -> &[Self::Version];

    /// Versions with mutable commit bookkeeping; the sequence itself is fixed
    fn versions_mut(&mut self) -> &mut [Self::Version];

    /// Append already-committed versions from another copy of this entity
    fn adopt(&mut self, versions: Vec<Self::Version>);

    fn validate(&self) -> Result<(), ValidationError>;

    /// Commit of the newest version
    fn head(&self) -> Option<&ObjectId> {
        self.versions().last().and_then(|v| v.commit())
    }

    fn last_time(&self) -> LamportTime {
        self.versions()
            .last()
            .map(|v| v.time())
            .unwrap_or_default()
    }

    /// Whether some versions were never written to the repository
    fn needs_commit(&self) -> bool {
        self.versions().iter().any(|v| v.commit().is_none())
    }

    /// Fast-forward this entity onto `other`.
    ///
    /// Returns `true` when versions were adopted, `false` when `other` holds
    /// nothing new. Divergent histories are refused.
    fn merge(&mut self, other: &Self) -> Result<bool, MergeConflict> {
        match reconcile(self.versions(), other.versions())? {
            Reconciliation::UpToDate => Ok(false),
            Reconciliation::FastForward { adopted } => {
                let theirs = other.versions();
                self.adopt(theirs[theirs.len() - adopted..].to_vec());
                Ok(true)
            }
        }
    }
}
