//! The set of other users editing the same document.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cursor::CursorPosition;
use crate::delta::Delta;
use crate::sync::types::user::UserId;

/// Another user present on the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collaborator {
    pub user_id: UserId,
    pub display_name: String,
    /// Last known selection, in delta coordinates
    pub cursor_position: Option<CursorPosition>,
    pub joined_at: Option<DateTime<Utc>>,
}

impl Collaborator {
    pub fn new(user_id: impl Into<UserId>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
            cursor_position: None,
            joined_at: None,
        }
    }
}

/// Collaborators keyed by user id, iterated in id order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollaboratorSet {
    by_user: BTreeMap<UserId, Collaborator>,
}

impl CollaboratorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_user.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_user.is_empty()
    }

    pub fn get(&self, user_id: &str) -> Option<&Collaborator> {
        self.by_user.get(user_id)
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.by_user.contains_key(user_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Collaborator> {
        self.by_user.values()
    }

    /// Adds a collaborator, or refreshes the name and join time of a known one while keeping
    /// their cursor.
    pub fn upsert(&mut self, collaborator: Collaborator) {
        match self.by_user.get_mut(&collaborator.user_id) {
            Some(known) => {
                known.display_name = collaborator.display_name;
                known.joined_at = collaborator.joined_at.or(known.joined_at);
                if collaborator.cursor_position.is_some() {
                    known.cursor_position = collaborator.cursor_position;
                }
            }
            None => {
                self.by_user
                    .insert(collaborator.user_id.clone(), collaborator);
            }
        }
    }

    pub fn remove(&mut self, user_id: &str) -> Option<Collaborator> {
        self.by_user.remove(user_id)
    }

    /// Replaces the whole set, keeping cursors of users who are still present.
    pub fn replace(&mut self, collaborators: impl IntoIterator<Item = Collaborator>) {
        let mut previous = std::mem::take(&mut self.by_user);
        for mut collaborator in collaborators {
            if collaborator.cursor_position.is_none() {
                collaborator.cursor_position = previous
                    .remove(&collaborator.user_id)
                    .and_then(|known| known.cursor_position);
            }
            self.by_user
                .insert(collaborator.user_id.clone(), collaborator);
        }
    }

    pub fn clear(&mut self) {
        self.by_user.clear();
    }

    /// Records a cursor move, adding the user if they were unknown.
    pub fn set_cursor(
        &mut self,
        user_id: &str,
        display_name: &str,
        position: Option<CursorPosition>,
    ) {
        self.by_user
            .entry(user_id.to_string())
            .or_insert_with(|| Collaborator::new(user_id, display_name))
            .cursor_position = position;
    }

    /// Moves every known cursor through `delta`, except the one belonging to `author`, whose
    /// client reports its own position.
    pub fn transform_cursors(&mut self, delta: &Delta, author: &str) {
        for collaborator in self.by_user.values_mut() {
            if collaborator.user_id == author {
                continue;
            }
            if let Some(cursor) = &mut collaborator.cursor_position {
                *cursor = cursor.transform(delta, false);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_keeps_cursor() {
        let mut set = CollaboratorSet::new();
        set.set_cursor("ana", "Ana", Some(CursorPosition::collapsed(3)));
        set.upsert(Collaborator::new("ana", "Ana B."));

        let ana = set.get("ana").unwrap();
        assert_eq!(ana.display_name, "Ana B.");
        assert_eq!(ana.cursor_position, Some(CursorPosition::collapsed(3)));
    }

    #[test]
    fn test_replace_drops_absent_users() {
        let mut set = CollaboratorSet::new();
        set.upsert(Collaborator::new("ana", "Ana"));
        set.set_cursor("bo", "Bo", Some(CursorPosition::new(1, 2)));

        set.replace([Collaborator::new("bo", "Bo"), Collaborator::new("cy", "Cy")]);
        assert!(!set.contains("ana"));
        assert_eq!(
            set.get("bo").and_then(|bo| bo.cursor_position),
            Some(CursorPosition::new(1, 2))
        );
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_transform_cursors_skips_author() {
        let mut set = CollaboratorSet::new();
        set.set_cursor("ana", "Ana", Some(CursorPosition::collapsed(4)));
        set.set_cursor("bo", "Bo", Some(CursorPosition::collapsed(4)));

        set.transform_cursors(&Delta::new().insert("xy"), "ana");
        assert_eq!(
            set.get("ana").unwrap().cursor_position,
            Some(CursorPosition::collapsed(4))
        );
        assert_eq!(
            set.get("bo").unwrap().cursor_position,
            Some(CursorPosition::collapsed(6))
        );
    }
}
