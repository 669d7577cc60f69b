#![forbid(unsafe_code)]

//! The reactive unit: debounced, dependency-aware render passes over one
//! observed state.
//!
//! # Render pass
//!
//! A pass is synchronous end to end:
//!
//! 1. run every pass cleanup registered by the previous pass, in order;
//! 2. call the render callback with a [`RenderCx`] pinned to the in-flight
//!    state and the previous snapshot;
//! 3. keep the render's returned cleanup (if any) as one more pass cleanup;
//! 4. commit the snapshot;
//! 5. notify change listeners.
//!
//! # Invariants
//!
//! 1. Writes during a pass are refused; a pass never observes its own writes.
//! 2. `changed`/`add_cleanup` only act during a pass. Outside one they are
//!    reported and ignored.
//! 3. Writes inside one debounce window produce exactly one pass that sees
//!    their cumulative merge.
//! 4. Listeners run after the snapshot is committed, with the unit idle.
//!
//! # Failure Modes
//!
//! - **Render returns an error**: the snapshot is not committed, cleanups
//!   registered during the failed pass still run before the next pass,
//!   listeners are skipped and the error is kept for
//!   [`ReactiveUnit::take_render_error`].
//! - **Render panics**: the unit returns to idle while unwinding. The render
//!   callback unwinds with the pass, so a new one must be installed with
//!   [`ReactiveUnit::set_renderer`] before the next pass draws anything.

use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::Location;
use std::rc::{Rc, Weak};

use tracing::{debug, error, trace};
use web_time::Duration;

use super::cleanup::{Cleanup, CleanupRegistry, EffectKey, IntoCleanup, RenderOutput};
use super::listeners::{ChangeListeners, ListenerHandle};
use super::state::State;
use super::store::StateStore;
use super::tracker::{DependencyTracker, Frame};
use crate::error::{EngineError, RenderError, Result, Violation};
use crate::scheduler::{DEFAULT_DEBOUNCE, Debouncer, Scheduler};

type RenderFn<S> =
    Box<dyn FnMut(&RenderCx<'_, S>) -> std::result::Result<Option<Cleanup>, RenderError>>;
type Validator<S> = Box<dyn FnMut(&mut S)>;

/// When a scheduled pass actually renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderPolicy {
    /// Every request renders, including empty changes.
    #[default]
    Always,
    /// Skip the pass unless some observed field differs from the snapshot.
    OnChange,
}

/// How [`ReactiveUnit::refresh`] treats the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    /// Compare against the last snapshot as usual.
    Keep,
    /// Forget the snapshot first, so every effect reads as changed.
    Purge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Rendering,
    Disposed,
}

struct UnitInner<S: State> {
    name: Cow<'static, str>,
    store: RefCell<StateStore<S>>,
    phase: Cell<Phase>,
    frame: RefCell<Option<Rc<Frame<S>>>>,
    cleanups: RefCell<CleanupRegistry<S::Field>>,
    listeners: ChangeListeners,
    debounce: Debouncer,
    renderer: RefCell<Option<RenderFn<S>>>,
    validator: RefCell<Option<Validator<S>>>,
    policy: RenderPolicy,
    forced: Cell<bool>,
    renders: Cell<u64>,
    last_error: RefCell<Option<EngineError>>,
}

impl<S: State> UnitInner<S> {
    fn violation(&self, violation: Violation) -> EngineError {
        error!(unit = %self.name, %violation, "protocol violation");
        EngineError::Protocol {
            unit: self.name.to_string(),
            violation,
        }
    }

    fn teardown(&self) {
        self.phase.set(Phase::Disposed);
        self.debounce.cancel();
        let (pass, keyed) = {
            let mut registry = self.cleanups.borrow_mut();
            (registry.take_pass(), registry.drain_keyed())
        };
        for cleanup in pass.into_iter().chain(keyed) {
            cleanup.run();
        }
        self.listeners.clear();
        debug!(unit = %self.name, "unit disposed");
    }
}

impl<S: State> Drop for UnitInner<S> {
    fn drop(&mut self) {
        if self.phase.get() != Phase::Disposed {
            self.teardown();
        }
    }
}

/// Restores the idle phase when a pass ends, including by unwinding.
struct PassGuard<'a, S: State> {
    inner: &'a UnitInner<S>,
}

impl<S: State> Drop for PassGuard<'_, S> {
    fn drop(&mut self) {
        if let Ok(mut frame) = self.inner.frame.try_borrow_mut() {
            frame.take();
        }
        if self.inner.phase.get() == Phase::Rendering {
            self.inner.phase.set(Phase::Idle);
        }
    }
}

/// Handle to one reactive unit. Clones share the same unit.
pub struct ReactiveUnit<S: State> {
    inner: Rc<UnitInner<S>>,
}

impl<S: State> Clone for ReactiveUnit<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S: State> fmt::Debug for ReactiveUnit<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveUnit")
            .field("name", &self.inner.name)
            .field("phase", &self.inner.phase.get())
            .field("renders", &self.inner.renders.get())
            .field("pending", &self.inner.debounce.is_pending())
            .finish()
    }
}

impl<S: State> ReactiveUnit<S> {
    #[must_use]
    pub fn builder(state: S) -> UnitBuilder<S> {
        UnitBuilder::new(state)
    }

    /// Unit on the thread's default scheduler with `render` installed.
    pub fn new<R: RenderOutput>(
        state: S,
        render: impl FnMut(&RenderCx<'_, S>) -> R + 'static,
    ) -> Self {
        Self::builder(state).render(render)
    }

    /// Install or replace the render callback.
    pub fn set_renderer<R: RenderOutput>(
        &self,
        mut render: impl FnMut(&RenderCx<'_, S>) -> R + 'static,
    ) {
        let boxed: RenderFn<S> =
            Box::new(move |cx: &RenderCx<'_, S>| render(cx).into_outcome());
        *self.inner.renderer.borrow_mut() = Some(boxed);
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        self.inner.debounce.scheduler()
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakUnit<S> {
        WeakUnit {
            inner: Rc::downgrade(&self.inner),
        }
    }

    // ── State ────────────────────────────────────────────────────────

    /// Copy of the current state.
    #[must_use]
    pub fn get(&self) -> S {
        self.inner.store.borrow().current().clone()
    }

    /// Read a copy of the current state. `read` may call back into the unit.
    pub fn with_state<R>(&self, read: impl FnOnce(&S) -> R) -> R {
        let state = self.get();
        read(&state)
    }

    /// Copy of the state as of the last completed render.
    #[must_use]
    pub fn snapshot(&self) -> Option<S> {
        self.inner.store.borrow().snapshot().cloned()
    }

    /// Shallow-merge `patch` and schedule a render.
    pub fn set_state(&self, patch: S::Patch) -> Result<()> {
        self.write(|store| store.write(patch), true)
    }

    /// Mutate state through a closure and schedule a render.
    ///
    /// `apply` works on a copy, so it may read the unit. A write it makes to
    /// the same unit is overwritten when the copy is stored back.
    pub fn update(&self, apply: impl FnOnce(&mut S)) -> Result<()> {
        self.rewrite(apply, true)
    }

    /// Mutate state without scheduling a render.
    pub fn update_silent(&self, apply: impl FnOnce(&mut S)) -> Result<()> {
        self.rewrite(apply, false)
    }

    /// Schedule a render with an empty change.
    pub fn request_render(&self) -> Result<()> {
        self.write(|_| {}, true)
    }

    /// Schedule a render that runs even under [`RenderPolicy::OnChange`].
    pub(crate) fn force_render(&self) -> Result<()> {
        self.write(|_| {}, true)?;
        self.inner.forced.set(true);
        Ok(())
    }

    fn writable(&self) -> Result<()> {
        match self.inner.phase.get() {
            Phase::Rendering => Err(self.inner.violation(Violation::WriteDuringRender)),
            Phase::Disposed => Err(EngineError::Disposed {
                unit: self.inner.name.to_string(),
            }),
            Phase::Idle => Ok(()),
        }
    }

    fn rewrite(&self, apply: impl FnOnce(&mut S), render: bool) -> Result<()> {
        self.writable()?;
        let mut next = self.get();
        apply(&mut next);
        self.write(move |store| *store.current_mut() = next, render)
    }

    fn write(&self, change: impl FnOnce(&mut StateStore<S>), render: bool) -> Result<()> {
        self.writable()?;
        change(&mut *self.inner.store.borrow_mut());
        self.validate();
        if render {
            self.schedule_render();
        }
        Ok(())
    }

    /// Run the validator on a copy and store the result. The validator is
    /// out of its slot meanwhile, so a nested write skips validation.
    fn validate(&self) {
        let validator = self.inner.validator.borrow_mut().take();
        let Some(mut validate) = validator else {
            return;
        };
        let mut next = self.get();
        validate(&mut next);
        *self.inner.store.borrow_mut().current_mut() = next;
        let mut slot = self.inner.validator.borrow_mut();
        if slot.is_none() {
            *slot = Some(validate);
        }
    }

    pub(crate) fn schedule_render(&self) {
        let weak: Weak<UnitInner<S>> = Rc::downgrade(&self.inner);
        self.inner.debounce.request(move || {
            if let Some(inner) = weak.upgrade() {
                inner.debounce.settle();
                ReactiveUnit { inner }.render_pass();
            }
        });
        trace!(unit = %self.inner.name, "render scheduled");
    }

    // ── Listeners ────────────────────────────────────────────────────

    /// Call `callback` after every completed render pass.
    pub fn on_change(&self, callback: impl Fn() + 'static) -> ListenerHandle {
        self.inner.listeners.add(callback)
    }

    // ── Render-scoped API ────────────────────────────────────────────

    /// Run `effect` if any of `deps` changed since the last render. Only valid
    /// while this unit renders; prefer [`RenderCx::changed`].
    #[track_caller]
    pub fn changed<R: IntoCleanup>(
        &self,
        deps: &[S::Field],
        effect: impl FnOnce() -> R,
    ) -> Result<bool> {
        self.track(EffectKey::at(Location::caller(), deps), effect)
    }

    /// [`changed`](Self::changed) with an explicit effect name.
    pub fn changed_keyed<R: IntoCleanup>(
        &self,
        key: impl Into<Cow<'static, str>>,
        deps: &[S::Field],
        effect: impl FnOnce() -> R,
    ) -> Result<bool> {
        self.track(EffectKey::named(key, deps), effect)
    }

    fn track<R: IntoCleanup>(
        &self,
        key: EffectKey<S::Field>,
        effect: impl FnOnce() -> R,
    ) -> Result<bool> {
        let frame = self.inner.frame.borrow().clone();
        match frame {
            Some(frame) => Ok(DependencyTracker::new(&frame, &self.inner.cleanups).track(key, effect)),
            None => Err(self.inner.violation(Violation::ChangedOutsideRender)),
        }
    }

    /// Register a cleanup for the start of the next pass. Only valid while
    /// this unit renders.
    pub fn add_cleanup(&self, cleanup: impl FnOnce() + 'static) -> Result<()> {
        if self.inner.phase.get() != Phase::Rendering {
            return Err(self.inner.violation(Violation::CleanupOutsideRender));
        }
        self.inner.cleanups.borrow_mut().push(Cleanup::new(cleanup));
        Ok(())
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Render now, superseding any pending debounced pass. Returns whether a
    /// pass ran.
    pub fn refresh(&self, mode: Refresh) -> Result<bool> {
        match self.inner.phase.get() {
            Phase::Rendering => return Err(self.inner.violation(Violation::WriteDuringRender)),
            Phase::Disposed => {
                return Err(EngineError::Disposed {
                    unit: self.inner.name.to_string(),
                });
            }
            Phase::Idle => {}
        }
        self.inner.debounce.cancel();
        if mode == Refresh::Purge {
            self.inner.store.borrow_mut().purge();
        }
        Ok(self.render_pass())
    }

    /// Cancel the pending pass and run every outstanding cleanup, pass and
    /// keyed alike. Later writes fail with [`EngineError::Disposed`].
    pub fn dispose(&self) -> Result<()> {
        match self.inner.phase.get() {
            Phase::Rendering => Err(self.inner.violation(Violation::DisposeDuringRender)),
            Phase::Disposed => Ok(()),
            Phase::Idle => {
                self.inner.teardown();
                Ok(())
            }
        }
    }

    fn render_pass(&self) -> bool {
        let inner = &*self.inner;
        match inner.phase.get() {
            Phase::Rendering => {
                debug!(unit = %inner.name, "render requested while rendering; ignored");
                return false;
            }
            Phase::Disposed => return false,
            Phase::Idle => {}
        }
        let forced = inner.forced.replace(false);
        if inner.policy == RenderPolicy::OnChange && !forced && !inner.store.borrow().is_dirty() {
            trace!(unit = %inner.name, "no observed change; render skipped");
            return false;
        }

        inner.phase.set(Phase::Rendering);
        let guard = PassGuard { inner };

        let stale = inner.cleanups.borrow_mut().take_pass();
        for cleanup in stale {
            cleanup.run();
        }

        let frame = {
            let store = inner.store.borrow();
            Rc::new(Frame::new(store.current().clone(), store.snapshot().cloned()))
        };
        *inner.frame.borrow_mut() = Some(Rc::clone(&frame));

        let renderer = inner.renderer.borrow_mut().take();
        let outcome = match renderer {
            Some(mut render) => {
                let cx = RenderCx {
                    unit: self,
                    frame: frame.as_ref(),
                };
                let outcome = render(&cx);
                let mut slot = inner.renderer.borrow_mut();
                if slot.is_none() {
                    *slot = Some(render);
                }
                outcome
            }
            None => {
                debug!(unit = %inner.name, "no renderer installed");
                Ok(None)
            }
        };

        match outcome {
            Ok(cleanup) => {
                if let Some(cleanup) = cleanup {
                    inner.cleanups.borrow_mut().push(cleanup);
                }
                inner.store.borrow_mut().commit();
                let pass = inner.renders.get() + 1;
                inner.renders.set(pass);
                drop(guard);
                debug!(unit = %inner.name, pass, "render pass complete");
                inner.listeners.notify();
                true
            }
            Err(err) => {
                drop(guard);
                error!(unit = %inner.name, error = %err, "render failed");
                *inner.last_error.borrow_mut() = Some(EngineError::Render {
                    unit: inner.name.to_string(),
                    message: err.message().to_string(),
                });
                false
            }
        }
    }

    // ── Introspection ────────────────────────────────────────────────

    /// Number of completed render passes.
    #[must_use]
    pub fn render_count(&self) -> u64 {
        self.inner.renders.get()
    }

    #[must_use]
    pub fn is_rendering(&self) -> bool {
        self.inner.phase.get() == Phase::Rendering
    }

    #[must_use]
    pub fn is_render_pending(&self) -> bool {
        self.inner.debounce.is_pending()
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.phase.get() == Phase::Disposed
    }

    /// The error of the most recent failed pass, if not yet taken.
    pub fn take_render_error(&self) -> Option<EngineError> {
        self.inner.last_error.borrow_mut().take()
    }

    /// Log `violation` against this unit and turn it into an error.
    pub(crate) fn report(&self, violation: Violation) -> EngineError {
        self.inner.violation(violation)
    }

    /// Whether both handles point at the same unit.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Non-owning handle, for render closures that need their own unit.
pub struct WeakUnit<S: State> {
    inner: Weak<UnitInner<S>>,
}

impl<S: State> WeakUnit<S> {
    #[must_use]
    pub fn upgrade(&self) -> Option<ReactiveUnit<S>> {
        self.inner.upgrade().map(|inner| ReactiveUnit { inner })
    }
}

impl<S: State> Clone for WeakUnit<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

// ─── Render context ──────────────────────────────────────────────────────────

/// Handed to the render callback for the duration of one pass.
pub struct RenderCx<'a, S: State> {
    unit: &'a ReactiveUnit<S>,
    frame: &'a Frame<S>,
}

impl<'a, S: State> RenderCx<'a, S> {
    /// In-flight state of this pass.
    #[must_use]
    pub fn state(&self) -> &S {
        self.frame.current()
    }

    /// Snapshot of the previous completed render.
    #[must_use]
    pub fn previous(&self) -> Option<&S> {
        self.frame.previous()
    }

    #[must_use]
    pub fn is_first_render(&self) -> bool {
        self.frame.previous().is_none()
    }

    #[must_use]
    pub fn has_changed(&self, field: S::Field) -> bool {
        self.frame.has_changed(field)
    }

    /// Run `effect` if any of `deps` changed since the last render.
    ///
    /// The effect is identified by this call site plus `deps`: across renders
    /// the same call with the same list is the same effect, and its previous
    /// cleanup runs before it re-runs. Returns whether it ran.
    #[track_caller]
    pub fn changed<R: IntoCleanup>(&self, deps: &[S::Field], effect: impl FnOnce() -> R) -> bool {
        DependencyTracker::new(self.frame, &self.unit.inner.cleanups)
            .track(EffectKey::at(Location::caller(), deps), effect)
    }

    /// [`changed`](Self::changed) under an explicit name, for effects whose
    /// identity should not depend on where they are declared.
    pub fn changed_keyed<R: IntoCleanup>(
        &self,
        key: impl Into<Cow<'static, str>>,
        deps: &[S::Field],
        effect: impl FnOnce() -> R,
    ) -> bool {
        DependencyTracker::new(self.frame, &self.unit.inner.cleanups)
            .track(EffectKey::named(key, deps), effect)
    }

    /// Register a cleanup for the start of the next pass.
    pub fn add_cleanup(&self, cleanup: impl FnOnce() + 'static) {
        self.unit
            .inner
            .cleanups
            .borrow_mut()
            .push(Cleanup::new(cleanup));
    }

    #[must_use]
    pub fn unit(&self) -> &'a ReactiveUnit<S> {
        self.unit
    }
}

// ─── Builder ─────────────────────────────────────────────────────────────────

pub struct UnitBuilder<S: State> {
    state: S,
    name: Option<Cow<'static, str>>,
    scheduler: Option<Scheduler>,
    debounce: Duration,
    policy: RenderPolicy,
    validator: Option<Validator<S>>,
}

impl<S: State> UnitBuilder<S> {
    fn new(state: S) -> Self {
        Self {
            state,
            name: None,
            scheduler: None,
            debounce: DEFAULT_DEBOUNCE,
            policy: RenderPolicy::default(),
            validator: None,
        }
    }

    /// Name used in logs and errors. Defaults to the state's type name.
    #[must_use]
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn scheduler(mut self, scheduler: &Scheduler) -> Self {
        self.scheduler = Some(scheduler.clone());
        self
    }

    /// Quiescence window between the last write and its render.
    #[must_use]
    pub fn debounce(mut self, window: Duration) -> Self {
        self.debounce = window;
        self
    }

    #[must_use]
    pub fn policy(mut self, policy: RenderPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Normalize state after construction and after every write.
    #[must_use]
    pub fn validator(mut self, validate: impl FnMut(&mut S) + 'static) -> Self {
        self.validator = Some(Box::new(validate));
        self
    }

    #[must_use]
    pub fn build(self) -> ReactiveUnit<S> {
        let Self {
            mut state,
            name,
            scheduler,
            debounce,
            policy,
            mut validator,
        } = self;
        if let Some(validate) = validator.as_mut() {
            validate(&mut state);
        }
        let name = name.unwrap_or_else(|| Cow::Borrowed(short_type_name::<S>()));
        let scheduler = scheduler.unwrap_or_else(Scheduler::current);
        ReactiveUnit {
            inner: Rc::new(UnitInner {
                name,
                store: RefCell::new(StateStore::new(state)),
                phase: Cell::new(Phase::Idle),
                frame: RefCell::new(None),
                cleanups: RefCell::new(CleanupRegistry::default()),
                listeners: ChangeListeners::new(),
                debounce: Debouncer::new(scheduler, debounce),
                renderer: RefCell::new(None),
                validator: RefCell::new(validator),
                policy,
                forced: Cell::new(false),
                renders: Cell::new(0),
                last_error: RefCell::new(None),
            }),
        }
    }

    /// Build with `render` installed.
    pub fn render<R: RenderOutput>(
        self,
        render: impl FnMut(&RenderCx<'_, S>) -> R + 'static,
    ) -> ReactiveUnit<S> {
        let unit = self.build();
        unit.set_renderer(render);
        unit
    }
}

/// Last path segment of `T`'s type name, without generic arguments.
#[must_use]
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

// ─── Object-safe view ────────────────────────────────────────────────────────

/// The state-agnostic face of a unit, for orchestration code.
pub trait Reactive {
    fn name(&self) -> &str;
    fn request_render(&self) -> Result<()>;
    fn render_count(&self) -> u64;
    fn is_rendering(&self) -> bool;
    fn dispose(&self) -> Result<()>;
}

impl<S: State> Reactive for ReactiveUnit<S> {
    fn name(&self) -> &str {
        ReactiveUnit::name(self)
    }

    fn request_render(&self) -> Result<()> {
        ReactiveUnit::request_render(self)
    }

    fn render_count(&self) -> u64 {
        ReactiveUnit::render_count(self)
    }

    fn is_rendering(&self) -> bool {
        ReactiveUnit::is_rendering(self)
    }

    fn dispose(&self) -> Result<()> {
        ReactiveUnit::dispose(self)
    }
}
