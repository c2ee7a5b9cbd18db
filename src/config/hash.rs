//! Fingerprints of desired membership sets.
//!
//! A fingerprint is stored with every tracked set after an apply, so later
//! runs can tell whether the configured members changed since then without
//! contacting Keycloak.

use sha2::{Digest, Sha256};

use crate::membership::MemberSet;

/// Hasher for computing configuration fingerprints.
#[derive(Debug, Default)]
pub struct ConfigHasher;

impl ConfigHasher {
    /// Creates a new configuration hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the fingerprint of a member set.
    ///
    /// Members are hashed in set order, each terminated by a NUL byte so
    /// that `{"ab", "c"}` and `{"a", "bc"}` differ.
    #[must_use]
    pub fn fingerprint(&self, members: &MemberSet) -> String {
        let mut hasher = Sha256::new();
        for member in members {
            hasher.update(member.as_str().as_bytes());
            hasher.update([0u8]);
        }
        hex::encode(hasher.finalize())
    }

    /// Computes a short hash (first 8 characters) for display purposes.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(8).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_ignores_insertion_order() {
        let hasher = ConfigHasher::new();
        let a: MemberSet = ["alice", "bob"].into_iter().collect();
        let b: MemberSet = ["bob", "alice"].into_iter().collect();
        assert_eq!(hasher.fingerprint(&a), hasher.fingerprint(&b));
    }

    #[test]
    fn test_fingerprint_separates_members() {
        let hasher = ConfigHasher::new();
        let a: MemberSet = ["ab", "c"].into_iter().collect();
        let b: MemberSet = ["a", "bc"].into_iter().collect();
        assert_ne!(hasher.fingerprint(&a), hasher.fingerprint(&b));
    }

    #[test]
    fn test_short_hash() {
        let hasher = ConfigHasher::new();
        let full = hasher.fingerprint(&MemberSet::new());
        assert_eq!(hasher.short_hash(&full).len(), 8);
        assert!(full.starts_with(&hasher.short_hash(&full)));
    }
}
