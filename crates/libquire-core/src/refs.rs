//! Ref naming for entity histories
//!
//! - local: `refs/<namespace>/<id>`
//! - remote-tracking: `refs/remotes/<remote>/<namespace>/<id>`

use crate::types::ids::{Id, IdParseError};

/// Namespace holding identity refs
pub const IDENTITY_NAMESPACE: &str = "identities";

/// Prefix of all local refs of a namespace, trailing slash included
pub fn local_prefix(namespace: &str) -> String {
    format!("refs/{}/", namespace)
}

/// Prefix of all remote-tracking refs of a namespace for one remote
pub fn remote_prefix(namespace: &str, remote: &str) -> String {
    format!("refs/remotes/{}/{}/", remote, namespace)
}

pub fn local_ref(namespace: &str, id: &Id) -> String {
    format!("{}{}", local_prefix(namespace), id)
}

pub fn remote_ref(namespace: &str, remote: &str, id: &Id) -> String {
    format!("{}{}", remote_prefix(namespace, remote), id)
}

/// Fetch refspec mirroring a remote's namespace into remote-tracking refs
pub fn fetch_refspec(namespace: &str, remote: &str) -> String {
    format!(
        "+refs/{ns}/*:refs/remotes/{remote}/{ns}/*",
        ns = namespace,
        remote = remote
    )
}

/// Last path segment of a ref
pub fn basename(refname: &str) -> &str {
    refname.rsplit('/').next().unwrap_or(refname)
}

/// Parse the entity id from a ref's basename
pub fn id_from_ref(refname: &str) -> Result<Id, IdParseError> {
    Id::parse(basename(refname))
}
