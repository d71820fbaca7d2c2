use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of hex characters in an entity id (BLAKE2b-256)
pub const ID_LENGTH: usize = 64;

/// Number of hex characters shown by [`Id::human`]
pub const HUMAN_ID_LENGTH: usize = 7;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdParseError {
    #[error("invalid length: expected {expected} characters, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("invalid character {found:?} at position {position}: ids are lowercase hex")]
    InvalidChar { found: char, position: usize },
}

/// Content-derived entity identifier.
///
/// An `Id` can only be built through [`Id::parse`] (or from a digest), so any
/// `Id` that reaches a ref path is guaranteed to be 64 lowercase hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Id(String);

impl Id {
    /// Parse and validate an id string
    pub fn parse(s: &str) -> Result<Self, IdParseError> {
        check_hex(s, &[ID_LENGTH])?;
        Ok(Id(s.to_string()))
    }

    /// Build an id from a 32-byte digest
    pub fn from_digest(digest: [u8; 32]) -> Self {
        Id(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for display
    pub fn human(&self) -> &str {
        &self.0[..HUMAN_ID_LENGTH]
    }

    /// Whether this id starts with the given (possibly abbreviated) prefix
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Id {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Id::parse(s)
    }
}

impl TryFrom<String> for Id {
    type Error = IdParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        check_hex(&s, &[ID_LENGTH])?;
        Ok(Id(s))
    }
}

impl From<Id> for String {
    fn from(id: Id) -> Self {
        id.0
    }
}

/// Hex name of a git object (SHA-1 or SHA-256 repositories)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId(String);

impl ObjectId {
    pub fn parse(s: &str) -> Result<Self, IdParseError> {
        check_hex(s, &[40, 64])?;
        Ok(ObjectId(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short(&self) -> &str {
        &self.0[..HUMAN_ID_LENGTH]
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ObjectId {
    type Error = IdParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        check_hex(&s, &[40, 64])?;
        Ok(ObjectId(s))
    }
}

impl From<ObjectId> for String {
    fn from(oid: ObjectId) -> Self {
        oid.0
    }
}

fn check_hex(s: &str, lengths: &[usize]) -> Result<(), IdParseError> {
    if !lengths.contains(&s.len()) {
        return Err(IdParseError::InvalidLength {
            expected: lengths[0],
            actual: s.len(),
        });
    }
    if let Some((position, found)) = s
        .chars()
        .enumerate()
        .find(|(_, c)| !matches!(c, '0'..='9' | 'a'..='f'))
    {
        return Err(IdParseError::InvalidChar { found, position });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    #[test]
    fn test_parse_valid() {
        let id = Id::parse(VALID).unwrap();
        assert_eq!(id.as_str(), VALID);
        assert_eq!(id.human(), "0123456");
    }

    #[test]
    fn test_parse_rejects_uppercase() {
        let upper = VALID.to_uppercase();
        assert!(matches!(
            Id::parse(&upper),
            Err(IdParseError::InvalidChar { found: 'A', position: 10 })
        ));
    }

    #[test]
    fn test_parse_rejects_path_segments() {
        let sneaky = format!("../{}", &VALID[3..]);
        assert!(matches!(Id::parse(&sneaky), Err(IdParseError::InvalidChar { .. })));
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        assert!(matches!(
            Id::parse("abc"),
            Err(IdParseError::InvalidLength { expected: 64, actual: 3 })
        ));
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Result<Id, _> = serde_json::from_str(&format!("\"{}\"", VALID));
        assert!(ok.is_ok());
        let bad: Result<Id, _> = serde_json::from_str("\"not-an-id\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_object_id_accepts_sha1_and_sha256() {
        assert!(ObjectId::parse(&VALID[..40]).is_ok());
        assert!(ObjectId::parse(VALID).is_ok());
        assert!(ObjectId::parse(&VALID[..41]).is_err());
    }
}
