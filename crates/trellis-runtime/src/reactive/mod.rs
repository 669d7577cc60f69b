#![forbid(unsafe_code)]

//! Reactive state-diff rendering.
//!
//! This module provides the engine behind every component base:
//!
//! - [`State`] / [`reactive_state!`](crate::reactive_state): the explicit
//!   schema of observed fields and the partial-change type merged into it.
//! - [`ReactiveUnit`]: observed state whose writes trigger a debounced render
//!   pass with dependency-scoped effects and cleanups.
//! - [`ActiveUnit`]: a unit with an active/inactive flag and activation hook.
//! - [`observe`]: builds a unit from a value and a render closure.
//!
//! # Architecture
//!
//! A unit is an `Rc` around a [`StateStore`] (current state plus the snapshot
//! of the last completed render), a [`CleanupRegistry`], [`ChangeListeners`]
//! and a debouncer over a [`Scheduler`](crate::scheduler::Scheduler). Writes
//! merge into the store and re-arm the debouncer; the debounced task runs one
//! synchronous render pass. Scoped effects compare the in-flight state with
//! the snapshot through the pass's frame.
//!
//! # Invariants
//!
//! 1. A render pass never observes state written by itself.
//! 2. A keyed effect's stored cleanup runs before the effect re-runs, and
//!    before the keyed map is cleared on dispose.
//! 3. The comparison point is the snapshot of the previous completed render,
//!    never in-flight state.
//! 4. Writes are shallow merges.
//! 5. No `RefCell` borrow is held while user code runs (render callbacks,
//!    effects, cleanups, listeners).

pub mod active;
pub mod cleanup;
pub mod listeners;
pub mod observe;
pub mod state;
pub mod store;
mod tracker;
pub mod unit;

pub use active::{Activatable, ActiveFlag, ActiveUnit};
pub use cleanup::{Cleanup, CleanupRegistry, EffectKey, IntoCleanup, RenderOutput};
pub use listeners::{ChangeListeners, ListenerHandle};
pub use observe::{observe, observe_with};
pub use state::{State, field_changed};
pub use store::StateStore;
pub use unit::{
    Reactive, ReactiveUnit, Refresh, RenderCx, RenderPolicy, UnitBuilder, WeakUnit,
    short_type_name,
};
