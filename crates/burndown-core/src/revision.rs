//! Per-document revision tokens.
//!
//! The store offers atomicity for one document at a time. Every stored story
//! carries a `Revision`; an update must present the revision it read, and the
//! store rejects it if another writer got there first.
//!
//! Textual form is `<generation>-<digest>`, where the digest is the first 16
//! bytes of Blake3 over the story's canonical content bytes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

const DIGEST_LEN: usize = 16;

/// Optimistic concurrency token for a single document.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Revision {
    generation: u64,
    digest: [u8; DIGEST_LEN],
}

impl Revision {
    /// Revision of a freshly inserted document.
    pub fn first(content: &[u8]) -> Self {
        Self {
            generation: 1,
            digest: digest(content),
        }
    }

    /// Revision following this one after writing `content`.
    pub fn next(&self, content: &[u8]) -> Self {
        Self {
            generation: self.generation + 1,
            digest: digest(content),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }
}

fn digest(content: &[u8]) -> [u8; DIGEST_LEN] {
    let hash = blake3::hash(content);
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&hash.as_bytes()[..DIGEST_LEN]);
    out
}

impl fmt::Debug for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Revision({})", self)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.generation, self.digest_hex())
    }
}

impl FromStr for Revision {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidRevision(s.to_string());

        let (generation, digest_hex) = s.split_once('-').ok_or_else(invalid)?;
        let generation: u64 = generation.parse().map_err(|_| invalid())?;
        if generation == 0 {
            return Err(invalid());
        }

        let bytes = hex::decode(digest_hex).map_err(|_| invalid())?;
        let digest: [u8; DIGEST_LEN] = bytes.try_into().map_err(|_| invalid())?;

        Ok(Self { generation, digest })
    }
}

impl TryFrom<String> for Revision {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Revision> for String {
    fn from(rev: Revision) -> Self {
        rev.to_string()
    }
}
