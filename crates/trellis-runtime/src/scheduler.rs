#![forbid(unsafe_code)]

//! Single-threaded timer queue and debouncer driving deferred renders.
//!
//! A [`Scheduler`] owns an ordered queue of one-shot timers. Nothing runs on
//! its own: the host pumps the queue with [`Scheduler::run_due`],
//! [`Scheduler::advance`] or [`Scheduler::run_until_idle`]. Time comes from the
//! real clock or from a [`LabClock`] that tests advance by hand, which makes
//! every debounce window fully deterministic.
//!
//! # Invariants
//!
//! 1. Timers fire in deadline order; equal deadlines fire in scheduling order.
//! 2. A cancelled timer never fires.
//! 3. `run_due()` only fires timers that existed when it was called, so a task
//!    that reschedules itself with a zero delay cannot livelock one pump.
//! 4. No queue borrow is held while a task runs; tasks may freely schedule
//!    or cancel other timers.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::trace;
use web_time::{Duration, Instant};

/// Window used by reactive units when none is configured.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1);

// ─── Time source ─────────────────────────────────────────────────────────────

/// A manually-advanceable clock for deterministic tests.
///
/// Clones share the same offset, so every scheduler built from one clock sees
/// the same time.
#[derive(Debug, Clone)]
pub struct LabClock {
    epoch: Instant,
    offset_us: Rc<Cell<u64>>,
}

impl LabClock {
    /// Create a new lab clock starting at `Instant::now()`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            offset_us: Rc::new(Cell::new(0)),
        }
    }

    /// Advance the lab clock by `delta`.
    pub fn advance(&self, delta: Duration) {
        let us = delta.as_micros().min(u64::MAX as u128) as u64;
        self.offset_us.set(self.offset_us.get().saturating_add(us));
    }

    /// Move the clock forward to `instant`. Never moves it backwards.
    pub fn advance_to(&self, instant: Instant) {
        let target = instant
            .checked_duration_since(self.epoch)
            .unwrap_or(Duration::ZERO);
        let us = target.as_micros().min(u64::MAX as u128) as u64;
        if us > self.offset_us.get() {
            self.offset_us.set(us);
        }
    }

    /// Current lab time.
    #[must_use]
    pub fn now(&self) -> Instant {
        self.epoch + self.elapsed()
    }

    /// Total time advanced since creation.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        Duration::from_micros(self.offset_us.get())
    }
}

impl Default for LabClock {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
enum TimeSource {
    Real,
    Lab(LabClock),
}

impl TimeSource {
    fn now(&self) -> Instant {
        match self {
            TimeSource::Real => Instant::now(),
            TimeSource::Lab(clock) => clock.now(),
        }
    }
}

// ─── Scheduler ───────────────────────────────────────────────────────────────

/// Handle identifying one scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    /// Raw sequence number, monotonically increasing per scheduler.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

struct Timer {
    id: TimerId,
    deadline: Instant,
    task: Box<dyn FnOnce()>,
}

struct SchedulerInner {
    time: TimeSource,
    next_id: Cell<u64>,
    queue: RefCell<Vec<Timer>>,
    fired: Cell<u64>,
}

/// Shared handle to a timer queue. Cloning yields another handle to the same
/// queue.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<SchedulerInner>,
}

thread_local! {
    static CURRENT: Scheduler = Scheduler::new();
}

impl Scheduler {
    /// Scheduler driven by the real clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_source(TimeSource::Real)
    }

    /// Scheduler driven by a [`LabClock`].
    #[must_use]
    pub fn lab(clock: &LabClock) -> Self {
        Self::with_source(TimeSource::Lab(clock.clone()))
    }

    fn with_source(time: TimeSource) -> Self {
        Self {
            inner: Rc::new(SchedulerInner {
                time,
                next_id: Cell::new(1),
                queue: RefCell::new(Vec::new()),
                fired: Cell::new(0),
            }),
        }
    }

    /// The thread's default real-clock scheduler.
    #[must_use]
    pub fn current() -> Self {
        CURRENT.with(Clone::clone)
    }

    /// Current time according to this scheduler's clock.
    #[must_use]
    pub fn now(&self) -> Instant {
        self.inner.time.now()
    }

    /// The lab clock, when this scheduler runs on one.
    #[must_use]
    pub fn lab_clock(&self) -> Option<&LabClock> {
        match &self.inner.time {
            TimeSource::Lab(clock) => Some(clock),
            TimeSource::Real => None,
        }
    }

    /// Whether both handles point at the same queue.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Run `task` once `delay` has elapsed.
    pub fn schedule(&self, delay: Duration, task: impl FnOnce() + 'static) -> TimerId {
        let id = TimerId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);
        let deadline = self.now() + delay;

        let mut queue = self.inner.queue.borrow_mut();
        let pos = queue.partition_point(|t| t.deadline <= deadline);
        queue.insert(
            pos,
            Timer {
                id,
                deadline,
                task: Box::new(task),
            },
        );
        trace!(timer = id.0, delay_us = delay.as_micros() as u64, "timer scheduled");
        id
    }

    /// Cancel a pending timer. Returns `false` if it already fired or was
    /// cancelled before.
    pub fn cancel(&self, id: TimerId) -> bool {
        let mut queue = self.inner.queue.borrow_mut();
        match queue.iter().position(|t| t.id == id) {
            Some(pos) => {
                queue.remove(pos);
                trace!(timer = id.0, "timer cancelled");
                true
            }
            None => false,
        }
    }

    /// Number of timers waiting to fire.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    /// Total number of timers fired so far.
    #[must_use]
    pub fn fired(&self) -> u64 {
        self.inner.fired.get()
    }

    /// Deadline of the earliest pending timer.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.inner.queue.borrow().first().map(|t| t.deadline)
    }

    /// Fire every timer whose deadline has passed. Returns how many fired.
    pub fn run_due(&self) -> usize {
        let cutoff = self.inner.next_id.get();
        let mut fired = 0;
        loop {
            let now = self.now();
            let timer = {
                let mut queue = self.inner.queue.borrow_mut();
                match queue
                    .iter()
                    .position(|t| t.deadline <= now && t.id.0 < cutoff)
                {
                    Some(pos) => queue.remove(pos),
                    None => break,
                }
            };
            trace!(timer = timer.id.0, "timer fired");
            (timer.task)();
            fired += 1;
            self.inner.fired.set(self.inner.fired.get() + 1);
        }
        fired
    }

    /// Let `delta` pass, firing timers in deadline order as their time comes.
    ///
    /// On a lab clock this moves the clock; on the real clock it sleeps.
    pub fn advance(&self, delta: Duration) -> usize {
        let target = self.now() + delta;
        let mut fired = 0;
        while let Some(deadline) = self.next_deadline().filter(|d| *d <= target) {
            self.wait_until(deadline);
            fired += self.run_due();
        }
        self.wait_until(target);
        fired + self.run_due()
    }

    /// Keep firing timers until the queue is empty.
    pub fn run_until_idle(&self) -> usize {
        let mut fired = 0;
        while let Some(deadline) = self.next_deadline() {
            self.wait_until(deadline);
            fired += self.run_due();
        }
        fired
    }

    fn wait_until(&self, instant: Instant) {
        match &self.inner.time {
            TimeSource::Lab(clock) => clock.advance_to(instant),
            TimeSource::Real => {
                let now = Instant::now();
                if instant > now {
                    std::thread::sleep(instant - now);
                }
            }
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("lab", &self.lab_clock().is_some())
            .field("pending", &self.pending())
            .field("fired", &self.fired())
            .finish()
    }
}

// ─── Debouncer ───────────────────────────────────────────────────────────────

/// Single-shot debounce over a [`Scheduler`].
///
/// Every [`request`](Debouncer::request) supersedes the previous pending one,
/// so a burst of requests fires exactly once, `window` after the last request.
#[derive(Debug)]
pub struct Debouncer {
    scheduler: Scheduler,
    window: Duration,
    pending: Cell<Option<TimerId>>,
}

impl Debouncer {
    #[must_use]
    pub fn new(scheduler: Scheduler, window: Duration) -> Self {
        Self {
            scheduler,
            window,
            pending: Cell::new(None),
        }
    }

    /// Arm (or re-arm) the timer with `task`.
    pub fn request(&self, task: impl FnOnce() + 'static) -> TimerId {
        if let Some(stale) = self.pending.take() {
            self.scheduler.cancel(stale);
        }
        let id = self.scheduler.schedule(self.window, task);
        self.pending.set(Some(id));
        id
    }

    /// Drop the pending request, if any.
    pub fn cancel(&self) -> bool {
        match self.pending.take() {
            Some(id) => self.scheduler.cancel(id),
            None => false,
        }
    }

    /// Mark the pending request as fired. Called from the task itself.
    pub fn settle(&self) {
        self.pending.set(None);
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.get().is_some()
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }
}
