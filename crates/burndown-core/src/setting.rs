//! Settings records and their visibility tiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Who may see a setting.
///
/// Ordered from most to least visible, so an audience cleared for a tier is
/// also cleared for every tier below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Visible to everyone, including anonymous clients.
    Public,
    /// Visible to administrators.
    Private,
    /// Never leaves the server process.
    Secret,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Secret => "secret",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            "secret" => Ok(Visibility::Secret),
            other => Err(CoreError::InvalidVisibility(other.to_string())),
        }
    }
}

/// A named configuration record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    pub name: String,
    pub value: serde_json::Value,
    pub visibility: Visibility,
}

impl Setting {
    pub fn new(
        name: impl Into<String>,
        value: impl Into<serde_json::Value>,
        visibility: Visibility,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            visibility,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_ordering() {
        assert!(Visibility::Public < Visibility::Private);
        assert!(Visibility::Private < Visibility::Secret);
    }

    #[test]
    fn test_visibility_text() {
        for v in [Visibility::Public, Visibility::Private, Visibility::Secret] {
            assert_eq!(v.as_str().parse::<Visibility>().unwrap(), v);
        }
        assert!("hidden".parse::<Visibility>().is_err());
    }
}
