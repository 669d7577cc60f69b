#![forbid(unsafe_code)]

//! Reactive engine for Trellis.
//!
//! # Role in Trellis
//! `trellis-runtime` owns everything a single component needs: observed state,
//! debounced render passes, dependency-scoped effects with cleanups, change
//! listeners and the timer queue that drives them. The module orchestrator
//! lives in `trellis-bench`.
//!
//! # How it fits in the system
//! Components hold a [`ReactiveUnit`](reactive::ReactiveUnit) (or an
//! [`ActiveUnit`](reactive::ActiveUnit)); the host pumps the
//! [`Scheduler`](scheduler::Scheduler) so pending renders run. Everything is
//! single-threaded: handles are `Rc`-based and `!Send`.

pub mod error;
pub mod memo;
pub mod reactive;
pub mod scheduler;

pub use error::{EngineError, RenderError, Result, Violation};
pub use memo::MemoCache;
pub use reactive::{
    Activatable, ActiveFlag, ActiveUnit, Cleanup, ListenerHandle, Reactive, ReactiveUnit,
    Refresh, RenderCx, RenderPolicy, State, UnitBuilder, WeakUnit, observe, observe_with,
    short_type_name,
};
pub use scheduler::{DEFAULT_DEBOUNCE, Debouncer, LabClock, Scheduler, TimerId};
