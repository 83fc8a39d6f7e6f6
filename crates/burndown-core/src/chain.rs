//! Chain validation: traversal and break detection.
//!
//! A circle's backlog is valid when walking `next_id` pointers from the single
//! first story visits every story exactly once and ends at the sentinel.
//! Anything else is reported as a [`StructuralError`] and left for a human or
//! a repair path to fix.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::StructuralError;
use crate::story::Story;
use crate::types::{NextId, StoryId};

/// An indexed, read-only view over one circle's stories.
pub struct Chain<'a> {
    stories: &'a [Story],
    by_id: HashMap<&'a StoryId, &'a Story>,
    duplicate: Option<&'a StoryId>,
}

impl<'a> Chain<'a> {
    pub fn new(stories: &'a [Story]) -> Self {
        let mut by_id = HashMap::with_capacity(stories.len());
        let mut duplicate = None;
        for story in stories {
            if by_id.insert(&story.id, story).is_some() && duplicate.is_none() {
                duplicate = Some(&story.id);
            }
        }
        Self {
            stories,
            by_id,
            duplicate,
        }
    }

    pub fn len(&self) -> usize {
        self.stories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stories.is_empty()
    }

    pub fn get(&self, id: &StoryId) -> Option<&'a Story> {
        self.by_id.get(id).copied()
    }

    /// Every story flagged as first.
    pub fn heads(&self) -> Vec<&'a Story> {
        self.stories.iter().filter(|s| s.is_first_story).collect()
    }

    /// The head, if exactly one story is flagged as first.
    pub fn head(&self) -> Option<&'a Story> {
        match self.heads().as_slice() {
            [head] => Some(*head),
            _ => None,
        }
    }

    /// Stories whose `next_id` equals `next`.
    pub fn predecessors(&self, next: &NextId) -> Vec<&'a Story> {
        self.stories.iter().filter(|s| &s.next_id == next).collect()
    }

    /// Walk the chain from the head, returning stories in backlog order.
    ///
    /// The walk is bounded to N+1 steps, so it terminates on any input.
    pub fn walk(&self) -> Result<Vec<&'a Story>, StructuralError> {
        let n = self.stories.len();
        if n == 0 {
            return Ok(Vec::new());
        }

        if let Some(id) = self.duplicate {
            return Err(StructuralError::DuplicateId(id.clone()));
        }

        let circle = &self.stories[0].circle_id;
        if let Some(stray) = self.stories.iter().find(|s| &s.circle_id != circle) {
            return Err(StructuralError::MixedCircles {
                story: stray.id.clone(),
                expected: circle.clone(),
                found: stray.circle_id.clone(),
            });
        }

        let head = match self.heads().as_slice() {
            [] => {
                return Err(StructuralError::NoHead {
                    circle: circle.clone(),
                })
            }
            [head] => *head,
            many => {
                return Err(StructuralError::MultipleHeads {
                    heads: many.iter().map(|s| s.id.clone()).collect(),
                })
            }
        };

        let mut visited: HashSet<&StoryId> = HashSet::with_capacity(n);
        let mut order = Vec::with_capacity(n);
        let mut current = head;
        let mut steps = 0usize;

        loop {
            steps += 1;
            if steps > n + 1 || !visited.insert(&current.id) {
                return Err(StructuralError::Cycle {
                    at: current.id.clone(),
                });
            }
            order.push(current);

            match &current.next_id {
                NextId::Last => break,
                NextId::Story(next) => {
                    current = self.get(next).ok_or_else(|| StructuralError::DanglingPointer {
                        from: current.id.clone(),
                        to: next.clone(),
                    })?;
                }
            }
        }

        if order.len() == n {
            return Ok(order);
        }

        Err(self.diagnose_short_walk(&visited))
    }

    /// The walk reached the sentinel early. Explain why.
    fn diagnose_short_walk(&self, visited: &HashSet<&StoryId>) -> StructuralError {
        let mut by_target: BTreeMap<&NextId, Vec<StoryId>> = BTreeMap::new();
        for story in self.stories {
            by_target
                .entry(&story.next_id)
                .or_default()
                .push(story.id.clone());
        }

        if let Some((target, predecessors)) = by_target.into_iter().find(|(_, p)| p.len() > 1) {
            return StructuralError::ConvergingPointers {
                target: target.clone(),
                predecessors,
            };
        }

        let mut orphans: Vec<StoryId> = self
            .stories
            .iter()
            .filter(|s| !visited.contains(&s.id))
            .map(|s| s.id.clone())
            .collect();
        orphans.sort();
        StructuralError::Unreachable { orphans }
    }

    pub fn is_broken(&self) -> bool {
        self.walk().is_err()
    }
}

/// Walk the chain formed by `stories`. See [`Chain::walk`].
pub fn walk(stories: &[Story]) -> Result<Vec<&Story>, StructuralError> {
    Chain::new(stories).walk()
}

/// Whether `stories` fail to form a single well-formed chain.
pub fn is_broken(stories: &[Story]) -> bool {
    Chain::new(stories).is_broken()
}

/// Reorder `stories` into backlog order.
pub fn ordered(stories: Vec<Story>) -> Result<Vec<Story>, StructuralError> {
    let order: Vec<StoryId> = walk(&stories)?.iter().map(|s| s.id.clone()).collect();

    let mut by_id: HashMap<StoryId, Story> =
        stories.into_iter().map(|s| (s.id.clone(), s)).collect();

    Ok(order
        .iter()
        .filter_map(|id| by_id.remove(id))
        .collect())
}
