//! Strong type definitions for the Burndown backlog.
//!
//! All identifiers are newtypes to prevent misuse at compile time. The chain
//! pointer is an enum so the end-of-chain sentinel can never be confused with
//! a real story id.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Reserved spelling of the end-of-chain sentinel.
pub const SENTINEL: &str = "last";

/// Prefix of the circle-scoped sentinel spelling (`last-<circle>`).
const SENTINEL_PREFIX: &str = "last-";

fn is_sentinel(s: &str) -> bool {
    s == SENTINEL || s.starts_with(SENTINEL_PREFIX)
}

/// Identifier of a story document.
///
/// Assigned by the store on creation. Never equal to the sentinel.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoryId(String);

impl StoryId {
    /// Parse a story id, rejecting empty strings and sentinel spellings.
    pub fn new(id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into();
        if id.is_empty() || is_sentinel(&id) {
            return Err(CoreError::InvalidStoryId(id));
        }
        Ok(Self(id))
    }

    /// Generate a fresh random id (128 bits, hex encoded).
    pub fn generate() -> Self {
        Self(hex::encode(rand::random::<[u8; 16]>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for StoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StoryId({})", self.0)
    }
}

impl fmt::Display for StoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for StoryId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for StoryId {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<StoryId> for String {
    fn from(id: StoryId) -> Self {
        id.0
    }
}

/// Identifier of a circle (team workspace). Partitions the chains.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CircleId(String);

impl CircleId {
    pub fn new(id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(CoreError::InvalidCircleId(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The circle-scoped spelling of the sentinel used by view layers.
    pub fn tail_sentinel(&self) -> String {
        format!("{}{}", SENTINEL_PREFIX, self.0)
    }
}

impl fmt::Debug for CircleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CircleId({})", self.0)
    }
}

impl fmt::Display for CircleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CircleId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CircleId {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<CircleId> for String {
    fn from(id: CircleId) -> Self {
        id.0
    }
}

/// The successor pointer of a story.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NextId {
    /// Points at another story in the same circle.
    Story(StoryId),
    /// End of chain.
    Last,
}

impl NextId {
    pub fn is_last(&self) -> bool {
        matches!(self, NextId::Last)
    }

    /// The successor story id, if this is not the sentinel.
    pub fn story_id(&self) -> Option<&StoryId> {
        match self {
            NextId::Story(id) => Some(id),
            NextId::Last => None,
        }
    }

    /// Whether this pointer names the given story.
    pub fn points_at(&self, id: &StoryId) -> bool {
        self.story_id() == Some(id)
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        if s.is_empty() {
            return Err(CoreError::InvalidNextId(s.to_string()));
        }
        if is_sentinel(s) {
            return Ok(NextId::Last);
        }
        StoryId::new(s).map(NextId::Story)
    }
}

impl From<StoryId> for NextId {
    fn from(id: StoryId) -> Self {
        NextId::Story(id)
    }
}

impl From<&StoryId> for NextId {
    fn from(id: &StoryId) -> Self {
        NextId::Story(id.clone())
    }
}

impl fmt::Debug for NextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NextId::Story(id) => write!(f, "NextId({})", id),
            NextId::Last => f.write_str("NextId(last)"),
        }
    }
}

impl fmt::Display for NextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NextId::Story(id) => fmt::Display::fmt(id, f),
            NextId::Last => f.write_str(SENTINEL),
        }
    }
}

impl FromStr for NextId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for NextId {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<NextId> for String {
    fn from(next: NextId) -> Self {
        next.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_story_id_rejects_sentinel() {
        assert!(StoryId::new("last").is_err());
        assert!(StoryId::new("last-circle").is_err());
        assert!(StoryId::new("").is_err());
        assert!(StoryId::new("lastly").is_ok());
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        let a = StoryId::generate();
        let b = StoryId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
    }

    #[test]
    fn test_next_id_parses_both_sentinel_spellings() {
        let circle = CircleId::new("alpha").unwrap();
        assert_eq!(NextId::parse("last").unwrap(), NextId::Last);
        assert_eq!(NextId::parse(&circle.tail_sentinel()).unwrap(), NextId::Last);
        assert_eq!(NextId::Last.to_string(), "last");
    }

    #[test]
    fn test_next_id_serde_as_plain_string() {
        let id = StoryId::new("abc123").unwrap();
        let json = serde_json::to_string(&NextId::from(&id)).unwrap();
        assert_eq!(json, "\"abc123\"");

        let last: NextId = serde_json::from_str("\"last\"").unwrap();
        assert!(last.is_last());
        assert!(serde_json::from_str::<NextId>("\"\"").is_err());
    }
}
