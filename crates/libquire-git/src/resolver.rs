//! Loading identities referenced from elsewhere

use libquire_core::{Id, Identity, IdentityRef};

use crate::error::LoadError;
use crate::loader::read_local;
use crate::repo::Repo;

pub trait Resolver {
    fn resolve_identity(&self, id: &Id) -> Result<Identity, LoadError>;
}

/// Resolves identities from the local refs of one repository
pub struct SimpleResolver<'a, R: ?Sized> {
    repo: &'a R,
}

impl<'a, R: Repo + ?Sized> SimpleResolver<'a, R> {
    pub fn new(repo: &'a R) -> Self {
        Self { repo }
    }
}

impl<R: Repo + ?Sized> Resolver for SimpleResolver<'_, R> {
    fn resolve_identity(&self, id: &Id) -> Result<Identity, LoadError> {
        read_local(self.repo, id)
    }
}

/// Replace an unresolved reference with the loaded identity
pub fn resolve<'r, S>(resolver: &S, identity: &'r mut IdentityRef) -> Result<&'r Identity, LoadError>
where
    S: Resolver + ?Sized,
{
    identity.resolve(|id| resolver.resolve_identity(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::commit;
    use crate::mem_repo::MemRepo;
    use libquire_core::{Entity, LamportTime, Mutation};

    #[test]
    fn test_resolve_stub_from_repo() {
        let repo = MemRepo::new();
        let mut ident = Identity::new(
            Mutation::new("alice", "a@example.com"),
            LamportTime(1),
            1_700_000_000,
            None,
        );
        commit(&repo, &mut ident).unwrap();

        let mut stub = IdentityRef::from(ident.id().clone());
        let resolver = SimpleResolver::new(&repo);
        assert_eq!(resolve(&resolver, &mut stub).unwrap().name(), "alice");
        assert!(stub.is_resolved());
    }

    #[test]
    fn test_resolve_unknown_identity() {
        let repo = MemRepo::new();
        let id = Id::parse(&"1".repeat(64)).unwrap();
        let mut stub = IdentityRef::from(id);

        let resolver = SimpleResolver::new(&repo);
        assert!(matches!(
            resolve(&resolver, &mut stub),
            Err(LoadError::RefNotFound { .. })
        ));
        assert!(!stub.is_resolved());
    }
}
