//! Backlog configuration.

use crate::error::Result;
use crate::settings::{SettingsTable, LIMIT_STORIES_PER_CIRCLE};

/// What inserting before the end-of-chain sentinel means.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TailPolicy {
    /// The sentinel is a slot like any other. A story that asks for it
    /// collides with the current tail and lands ahead of it.
    #[default]
    Uniform,
    /// The new story becomes the tail; the old tail is relinked to it.
    AppendAsTail,
}

/// Configuration for the Backlog.
#[derive(Debug, Clone)]
pub struct BacklogConfig {
    /// Minimum number of times one insert may be retargeted past a competing
    /// story. The effective bound is never below the circle's story count.
    pub max_collision_depth: usize,
    /// How a request to insert before the sentinel is handled.
    pub tail_policy: TailPolicy,
    /// Maximum stories per circle, if any.
    pub story_limit: Option<usize>,
}

impl Default for BacklogConfig {
    fn default() -> Self {
        Self {
            max_collision_depth: 8,
            tail_policy: TailPolicy::Uniform,
            story_limit: None,
        }
    }
}

impl BacklogConfig {
    pub fn with_max_collision_depth(mut self, depth: usize) -> Self {
        self.max_collision_depth = depth;
        self
    }

    pub fn with_tail_policy(mut self, policy: TailPolicy) -> Self {
        self.tail_policy = policy;
        self
    }

    pub fn with_story_limit(mut self, limit: Option<usize>) -> Self {
        self.story_limit = limit;
        self
    }

    /// Layer persisted settings over this configuration.
    pub fn with_settings(self, settings: &SettingsTable) -> Result<Self> {
        let limit = settings.get_u64(LIMIT_STORIES_PER_CIRCLE)?;
        Ok(self.with_story_limit(limit.map(|l| l as usize)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burndown_core::{Setting, Visibility};

    #[test]
    fn test_defaults() {
        let config = BacklogConfig::default();
        assert_eq!(config.max_collision_depth, 8);
        assert_eq!(config.tail_policy, TailPolicy::Uniform);
        assert_eq!(config.story_limit, None);
    }

    #[test]
    fn test_story_limit_from_settings() {
        let table = SettingsTable::from_settings([Setting::new(
            LIMIT_STORIES_PER_CIRCLE,
            25,
            Visibility::Private,
        )]);
        let config = BacklogConfig::default().with_settings(&table).unwrap();
        assert_eq!(config.story_limit, Some(25));

        let config = BacklogConfig::default()
            .with_story_limit(Some(3))
            .with_settings(&SettingsTable::default())
            .unwrap();
        assert_eq!(config.story_limit, None);
    }
}
