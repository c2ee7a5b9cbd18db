//! Uniqueness-conflict handling for named objects created while reconciling.
//!
//! Some relation kinds attach a member by creating an auxiliary, uniquely
//! named object on the server. If another run created an object with the same
//! name first, the create is retried once under a disambiguated name. The
//! suffix goes between the name's stem and its fixed tail, so
//! `google` + `_idp_client_policy` retries as `google_1a2b3c4d_idp_client_policy`.

use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, warn};

use crate::error::Result;

/// Creates a named remote object and returns its server-assigned id.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NamedCreator: Send + Sync {
    /// Creates the object under `name`.
    async fn create_named(&self, name: &str) -> Result<String>;
}

/// Produces the suffix inserted into a conflicting name.
pub type SuffixSource = fn() -> String;

/// A name to create, split where a disambiguating suffix is inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateName {
    stem: String,
    tail: String,
}

impl CandidateName {
    /// Creates a candidate whose suffix goes between `stem` and `tail`.
    #[must_use]
    pub fn new(stem: impl Into<String>, tail: impl Into<String>) -> Self {
        Self {
            stem: stem.into(),
            tail: tail.into(),
        }
    }

    /// The undisambiguated name.
    #[must_use]
    pub fn plain(&self) -> String {
        format!("{}{}", self.stem, self.tail)
    }

    fn with_suffix(&self, suffix: &str) -> String {
        format!("{}_{suffix}{}", self.stem, self.tail)
    }
}

impl From<&str> for CandidateName {
    fn from(name: &str) -> Self {
        Self::new(name, "")
    }
}

/// Retries a conflicting create exactly once under a suffixed name.
#[derive(Debug, Clone, Copy)]
pub struct ConflictResolver {
    suffix: SuffixSource,
}

impl ConflictResolver {
    /// Creates a resolver using random hex suffixes.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            suffix: random_suffix,
        }
    }

    /// Creates a resolver with a fixed suffix source.
    #[must_use]
    pub const fn with_suffix_source(suffix: SuffixSource) -> Self {
        Self { suffix }
    }

    /// Returns `candidate` with a fresh suffix inserted before its tail.
    #[must_use]
    pub fn disambiguate(&self, candidate: &CandidateName) -> String {
        candidate.with_suffix(&(self.suffix)())
    }

    /// Creates a named object, tolerating one uniqueness conflict.
    ///
    /// # Errors
    ///
    /// Returns the creator's error unchanged if it is not a conflict, or if
    /// the retry under the disambiguated name conflicts as well.
    pub async fn create_with_conflict_handling<C>(
        &self,
        creator: &C,
        candidate: impl Into<CandidateName>,
    ) -> Result<String>
    where
        C: NamedCreator + ?Sized,
    {
        let candidate = candidate.into();
        let name = candidate.plain();
        match creator.create_named(&name).await {
            Err(e) if e.is_conflict() => {
                let retry_name = self.disambiguate(&candidate);
                warn!("'{name}' already exists, retrying as '{retry_name}'");
                let id = creator.create_named(&retry_name).await?;
                debug!("Created '{retry_name}' ({id})");
                Ok(id)
            }
            other => other,
        }
    }
}

impl Default for ConflictResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns eight random lowercase hex characters.
#[must_use]
pub fn random_suffix() -> String {
    let mut bytes = [0u8; 4];
    rand::thread_rng().fill(&mut bytes);
    hex::encode(bytes)
}
