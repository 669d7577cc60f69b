#![forbid(unsafe_code)]

//! Dependency-scoped effects inside one render pass.
//!
//! A [`Frame`] pins the two comparison points of a pass: the in-flight state
//! and the snapshot of the previous completed render. The tracker decides per
//! effect whether any dependency differs between them and, if so, runs the
//! effect's stored cleanup strictly before the effect itself.
//!
//! The frame also counts how often each declaration is reached during the
//! pass, so an effect declared in a loop keeps one slot per iteration.

use std::cell::RefCell;

use ahash::AHashMap;
use tracing::trace;

use super::cleanup::{CleanupRegistry, EffectKey, IntoCleanup};
use super::state::{State, field_changed};

/// Comparison points of one render pass.
#[derive(Debug)]
pub(crate) struct Frame<S: State> {
    current: S,
    previous: Option<S>,
    seen: RefCell<AHashMap<EffectKey<S::Field>, u32>>,
}

impl<S: State> Frame<S> {
    pub(crate) fn new(current: S, previous: Option<S>) -> Self {
        Self {
            current,
            previous,
            seen: RefCell::new(AHashMap::new()),
        }
    }

    /// Tag `key` with how many times its declaration was already reached in
    /// this pass.
    fn place(&self, key: EffectKey<S::Field>) -> EffectKey<S::Field> {
        let mut seen = self.seen.borrow_mut();
        let count = seen.entry(key.clone()).or_insert(0);
        let occurrence = *count;
        *count += 1;
        key.nth(occurrence)
    }

    pub(crate) fn current(&self) -> &S {
        &self.current
    }

    pub(crate) fn previous(&self) -> Option<&S> {
        self.previous.as_ref()
    }

    pub(crate) fn has_changed(&self, field: S::Field) -> bool {
        field_changed(self.previous.as_ref(), &self.current, field)
    }

    /// An empty dependency list is never dirty.
    pub(crate) fn is_dirty(&self, deps: &[S::Field]) -> bool {
        deps.iter().any(|&field| self.has_changed(field))
    }
}

pub(crate) struct DependencyTracker<'a, S: State> {
    frame: &'a Frame<S>,
    registry: &'a RefCell<CleanupRegistry<S::Field>>,
}

impl<'a, S: State> DependencyTracker<'a, S> {
    pub(crate) fn new(
        frame: &'a Frame<S>,
        registry: &'a RefCell<CleanupRegistry<S::Field>>,
    ) -> Self {
        Self { frame, registry }
    }

    /// Run `effect` if any of the key's dependencies changed. Returns whether
    /// it ran.
    pub(crate) fn track<R: IntoCleanup>(
        &self,
        key: EffectKey<S::Field>,
        effect: impl FnOnce() -> R,
    ) -> bool {
        let key = self.frame.place(key);
        if !self.frame.is_dirty(key.deps()) {
            trace!(deps = ?key.deps(), "effect clean");
            return false;
        }
        let stale = self.registry.borrow_mut().take_keyed(&key);
        if let Some(cleanup) = stale {
            cleanup.run();
        }
        let cleanup = effect().into_cleanup();
        trace!(deps = ?key.deps(), keeps_cleanup = cleanup.is_some(), "effect ran");
        // The effect may have re-entered its own key; never drop a cleanup
        // unrun.
        let displaced = self.registry.borrow_mut().store_keyed(key, cleanup);
        if let Some(cleanup) = displaced {
            cleanup.run();
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::cleanup::Cleanup;
    use std::rc::Rc;

    crate::reactive_state! {
        #[derive(Debug, Clone, PartialEq, Default)]
        struct Pos {
            x: i32,
            y: i32,
        }
        fields = PosField;
        patch = PosPatch;
    }

    type Log = Rc<RefCell<Vec<String>>>;

    fn effect(log: &Log, tag: &str) -> impl FnOnce() -> Cleanup {
        let log = Rc::clone(log);
        let tag = tag.to_string();
        move || {
            log.borrow_mut().push(format!("run {tag}"));
            Cleanup::new(move || log.borrow_mut().push(format!("clean {tag}")))
        }
    }

    #[test]
    fn first_frame_runs_every_effect_with_deps() {
        let registry = RefCell::new(CleanupRegistry::default());
        let frame = Frame::new(Pos::default(), None);
        let tracker = DependencyTracker::new(&frame, &registry);
        assert!(tracker.track(EffectKey::named("x", &[PosField::x]), || ()));
        assert!(!tracker.track(EffectKey::named("none", &[]), || ()));
    }

    #[test]
    fn effect_reruns_only_when_a_dependency_differs() {
        let log: Log = Rc::default();
        let registry = RefCell::new(CleanupRegistry::default());
        let key = || EffectKey::named("x", &[PosField::x]);

        let first = Frame::new(Pos { x: 1, y: 0 }, None);
        DependencyTracker::new(&first, &registry).track(key(), effect(&log, "1"));

        let unchanged = Frame::new(Pos { x: 1, y: 5 }, Some(Pos { x: 1, y: 0 }));
        assert!(!DependencyTracker::new(&unchanged, &registry).track(key(), effect(&log, "2")));

        let changed = Frame::new(Pos { x: 2, y: 5 }, Some(Pos { x: 1, y: 5 }));
        assert!(DependencyTracker::new(&changed, &registry).track(key(), effect(&log, "3")));

        assert_eq!(*log.borrow(), vec!["run 1", "clean 1", "run 3"]);
    }

    #[test]
    fn repeated_declarations_in_one_pass_keep_separate_slots() {
        let log: Log = Rc::default();
        let registry = RefCell::new(CleanupRegistry::default());
        let key = || EffectKey::named("row", &[PosField::x]);

        let first = Frame::new(Pos { x: 1, y: 0 }, None);
        let tracker = DependencyTracker::new(&first, &registry);
        for tag in ["a", "b", "c"] {
            tracker.track(key(), effect(&log, tag));
        }
        assert_eq!(*log.borrow(), vec!["run a", "run b", "run c"]);
        assert_eq!(registry.borrow().keyed_len(), 3);

        let second = Frame::new(Pos { x: 2, y: 0 }, Some(Pos { x: 1, y: 0 }));
        let tracker = DependencyTracker::new(&second, &registry);
        for tag in ["d", "e", "f"] {
            tracker.track(key(), effect(&log, tag));
        }
        assert_eq!(
            log.borrow()[3..],
            ["clean a", "run d", "clean b", "run e", "clean c", "run f"]
        );
        assert_eq!(registry.borrow().keyed_len(), 3);
    }

    #[test]
    fn any_listed_dependency_marks_dirty() {
        let frame = Frame::new(Pos { x: 0, y: 1 }, Some(Pos { x: 0, y: 0 }));
        assert!(frame.is_dirty(&[PosField::x, PosField::y]));
        assert!(!frame.is_dirty(&[PosField::x]));
        assert!(frame.has_changed(PosField::y));
    }

    #[test]
    fn effect_without_cleanup_clears_the_slot() {
        let log: Log = Rc::default();
        let registry = RefCell::new(CleanupRegistry::default());
        let key = || EffectKey::named("x", &[PosField::x]);

        let first = Frame::new(Pos { x: 1, y: 0 }, None);
        DependencyTracker::new(&first, &registry).track(key(), effect(&log, "1"));
        let second = Frame::new(Pos { x: 2, y: 0 }, Some(Pos { x: 1, y: 0 }));
        DependencyTracker::new(&second, &registry).track(key(), || ());
        assert!(!registry.borrow().has_keyed_cleanup(&key()));

        let third = Frame::new(Pos { x: 3, y: 0 }, Some(Pos { x: 2, y: 0 }));
        DependencyTracker::new(&third, &registry).track(key(), effect(&log, "3"));
        assert_eq!(*log.borrow(), vec!["run 1", "clean 1", "run 3"]);
    }
}
