//! The authority that orders changes to one document.
//!
//! Clients submit changes computed against the last revision they saw. The sequencer
//! rebases each change over everything committed since that revision, applies it, and
//! assigns the next revision. Committed changes are kept with their inverses so a user's
//! latest change can be undone later.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use crossbeam_skiplist::SkipMap;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::delta::Delta;
use crate::error::{DeltaError, SequencerError};
use crate::sync::protocol::HistoryEntry;
use crate::sync::types::{Author, Revision};

/// A committed change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub revision: Revision,
    /// The change as applied, after rebasing
    pub delta: Delta,
    /// Undoes `delta` on the document as it was right after this commit
    pub inverse: Delta,
    pub author: Author,
    pub committed_at: DateTime<Utc>,
    /// The revision this commit undid, if it is an undo
    pub undoes: Option<Revision>,
}

/// What a submitter needs to broadcast and acknowledge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    pub delta: Delta,
    pub revision: Revision,
}

struct DocumentState {
    document: Delta,
    revision: Revision,
    undone: HashSet<Revision>,
}

/// Orders and applies changes to a single document.
///
/// # Design
///
/// - Document content and the current revision sit behind one `RwLock`, which serializes
///   commits
/// - History lives in a `SkipMap` keyed by revision, so readers walk it without the lock
pub struct Sequencer {
    state: RwLock<DocumentState>,
    history: SkipMap<Revision, Arc<Commit>>,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sequencer {
    /// An empty document at the initial revision.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(DocumentState {
                document: Delta::new(),
                revision: Revision::INITIAL,
                undone: HashSet::new(),
            }),
            history: SkipMap::new(),
        }
    }

    /// Starts from existing content at the initial revision.
    ///
    /// # Arguments
    ///
    /// * `document` - Insert-only delta with the initial content
    ///
    /// # Returns
    ///
    /// * `Err(DeltaError::NotADocument)` - If `document` contains retains or deletes
    pub fn with_document(document: Delta) -> Result<Self, DeltaError> {
        if !document.is_document() {
            return Err(DeltaError::NotADocument);
        }
        let sequencer = Self::new();
        sequencer.state.write().document = document;
        Ok(sequencer)
    }

    pub fn revision(&self) -> Revision {
        self.state.read().revision
    }

    /// Current content and the revision it corresponds to.
    pub fn snapshot(&self) -> (Delta, Revision) {
        let state = self.state.read();
        (state.document.clone(), state.revision)
    }

    /// Current content as plain text.
    pub fn text(&self) -> String {
        self.state
            .read()
            .document
            .document_text()
            .unwrap_or_default()
    }

    /// The commit that produced `revision`.
    pub fn commit(&self, revision: Revision) -> Option<Arc<Commit>> {
        self.history
            .get(&revision)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Rebases and commits a change made against `base`.
    ///
    /// # Arguments
    ///
    /// * `delta` - The change, computed against the document at `base`
    /// * `base` - The last revision the submitter had seen
    /// * `author` - Who made the change
    ///
    /// # Returns
    ///
    /// * `Ok(Committed)` - The rebased change and its new revision
    /// * `Err(SequencerError)` - If `base` is unknown or the change does not fit the document
    pub fn submit(
        &self,
        delta: Delta,
        base: Revision,
        author: &Author,
    ) -> Result<Committed, SequencerError> {
        let mut state = self.state.write();
        if base > state.revision {
            return Err(SequencerError::RevisionAhead {
                base,
                current: state.revision,
            });
        }

        // Changes committed first win ties at the same position.
        let mut rebased = delta;
        for entry in self.history.range(base.next()..=state.revision) {
            rebased = rebased.transform(&entry.value().delta, false);
        }

        let document_len = state.document.target_len();
        if rebased.base_len() > document_len {
            return Err(SequencerError::LengthMismatch {
                document: document_len,
                delta: rebased.base_len(),
            });
        }

        debug!(
            user = %author.user_id,
            base = %base,
            behind = state.revision.0 - base.0,
            "rebased change"
        );
        Ok(self.commit_locked(&mut state, rebased, author, None))
    }

    /// Undoes `author`'s latest change that has not been undone yet.
    ///
    /// The inverse is rebased over everything committed after that change and committed as
    /// a new revision.
    pub fn undo(&self, author: &Author) -> Result<Committed, SequencerError> {
        let mut state = self.state.write();

        let target = self
            .history
            .iter()
            .rev()
            .map(|entry| Arc::clone(entry.value()))
            .find(|commit| {
                commit.author.user_id == author.user_id
                    && commit.undoes.is_none()
                    && !state.undone.contains(&commit.revision)
            })
            .ok_or(SequencerError::NothingToUndo)?;

        let mut inverse = target.inverse.clone();
        for entry in self.history.range(target.revision.next()..) {
            inverse = inverse.transform(&entry.value().delta, false);
        }

        state.undone.insert(target.revision);
        info!(user = %author.user_id, revision = %target.revision, "undoing change");
        Ok(self.commit_locked(&mut state, inverse, author, Some(target.revision)))
    }

    /// All commits, oldest first.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history
            .iter()
            .map(|entry| {
                let commit = entry.value();
                HistoryEntry {
                    revision: commit.revision,
                    user_id: commit.author.user_id.clone(),
                    user_name: commit.author.user_name.clone(),
                    committed_at: commit.committed_at,
                    delta: commit.delta.clone(),
                }
            })
            .collect()
    }

    fn commit_locked(
        &self,
        state: &mut DocumentState,
        delta: Delta,
        author: &Author,
        undoes: Option<Revision>,
    ) -> Committed {
        let inverse = delta.invert(&state.document);
        state.document = state.document.compose(&delta);
        state.revision = state.revision.next();

        let revision = state.revision;
        self.history.insert(
            revision,
            Arc::new(Commit {
                revision,
                delta: delta.clone(),
                inverse,
                author: author.clone(),
                committed_at: Utc::now(),
                undoes,
            }),
        );
        info!(user = %author.user_id, revision = %revision, "committed change");
        Committed { delta, revision }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ana() -> Author {
        Author::new("ana", "Ana")
    }

    fn bo() -> Author {
        Author::new("bo", "Bo")
    }

    #[test]
    fn test_sequential_commits() {
        let sequencer = Sequencer::new();
        let first = sequencer
            .submit(Delta::new().insert("ab"), Revision(0), &ana())
            .unwrap();
        assert_eq!(first.revision, Revision(1));

        sequencer
            .submit(Delta::new().retain(2).insert("c"), Revision(1), &bo())
            .unwrap();
        assert_eq!(sequencer.text(), "abc");
        assert_eq!(sequencer.revision(), Revision(2));
    }

    #[test]
    fn test_late_change_is_rebased() {
        let sequencer = Sequencer::with_document(Delta::new().insert("ab")).unwrap();
        sequencer
            .submit(Delta::new().retain(1).insert("x"), Revision(0), &ana())
            .unwrap();

        let late = sequencer
            .submit(Delta::new().retain(1).insert("y"), Revision(0), &bo())
            .unwrap();
        assert_eq!(late.delta, Delta::new().retain(2).insert("y"));
        assert_eq!(sequencer.text(), "axyb");
    }

    #[test]
    fn test_rejects_unknown_revision() {
        let sequencer = Sequencer::new();
        let err = sequencer
            .submit(Delta::new().insert("a"), Revision(3), &ana())
            .unwrap_err();
        assert_eq!(
            err,
            SequencerError::RevisionAhead {
                base: Revision(3),
                current: Revision(0)
            }
        );
    }

    #[test]
    fn test_rejects_oversized_change() {
        let sequencer = Sequencer::with_document(Delta::new().insert("ab")).unwrap();
        let err = sequencer
            .submit(Delta::new().retain(5).insert("!"), Revision(0), &ana())
            .unwrap_err();
        assert!(matches!(err, SequencerError::LengthMismatch { document: 2, delta: 5 }));
    }

    #[test]
    fn test_with_document_requires_inserts() {
        assert!(Sequencer::with_document(Delta::new().retain(1)).is_err());
    }

    #[test]
    fn test_undo_own_change_after_later_edits() {
        let sequencer = Sequencer::with_document(Delta::new().insert("hello")).unwrap();
        sequencer
            .submit(Delta::new().retain(5).insert(" world"), Revision(0), &ana())
            .unwrap();
        sequencer
            .submit(Delta::new().insert(">> "), Revision(1), &bo())
            .unwrap();
        assert_eq!(sequencer.text(), ">> hello world");

        let undone = sequencer.undo(&ana()).unwrap();
        assert_eq!(undone.revision, Revision(3));
        assert_eq!(sequencer.text(), ">> hello");

        assert_eq!(sequencer.undo(&ana()), Err(SequencerError::NothingToUndo));
        assert_eq!(sequencer.commit(Revision(3)).unwrap().undoes, Some(Revision(1)));
    }

    #[test]
    fn test_history_lists_commits_in_order() {
        let sequencer = Sequencer::new();
        sequencer
            .submit(Delta::new().insert("a"), Revision(0), &ana())
            .unwrap();
        sequencer
            .submit(Delta::new().insert("b"), Revision(1), &bo())
            .unwrap();

        let history = sequencer.history();
        let authors: Vec<_> = history.iter().map(|h| h.user_id.as_str()).collect();
        assert_eq!(authors, vec!["ana", "bo"]);
        assert_eq!(history[1].revision, Revision(2));
    }
}
