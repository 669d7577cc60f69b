#![forbid(unsafe_code)]

//! Current state plus the snapshot of the last completed render.

use super::state::State;

/// The two comparison points of a reactive unit.
///
/// `snapshot` is `None` until the first render commits, and again after a
/// purge, so every field reads as changed on the next pass.
#[derive(Debug, Clone)]
pub struct StateStore<S> {
    current: S,
    snapshot: Option<S>,
}

impl<S: State> StateStore<S> {
    #[must_use]
    pub fn new(initial: S) -> Self {
        Self {
            current: initial,
            snapshot: None,
        }
    }

    #[must_use]
    pub fn current(&self) -> &S {
        &self.current
    }

    pub fn current_mut(&mut self) -> &mut S {
        &mut self.current
    }

    #[must_use]
    pub fn snapshot(&self) -> Option<&S> {
        self.snapshot.as_ref()
    }

    /// Merge a partial change into the current state.
    pub fn write(&mut self, patch: S::Patch) {
        self.current.merge(patch);
    }

    /// Whether the next render would see any difference from the snapshot.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        match &self.snapshot {
            Some(snapshot) => S::FIELDS
                .iter()
                .any(|&field| snapshot.differs(&self.current, field)),
            None => true,
        }
    }

    /// Replace the snapshot with a copy of the current state.
    pub fn commit(&mut self) {
        self.snapshot = Some(self.current.clone());
    }

    /// Forget the snapshot.
    pub fn purge(&mut self) {
        self.snapshot = None;
    }
}
