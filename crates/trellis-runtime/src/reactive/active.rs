#![forbid(unsafe_code)]

//! Units with an active/inactive flag.
//!
//! Activation runs the `on_active` hook and keeps whatever cleanup it
//! returns; deactivation runs that cleanup. Either transition requests a
//! render with an empty change, which runs even under
//! [`RenderPolicy::OnChange`](super::unit::RenderPolicy::OnChange). Setting the flag to its current value does
//! nothing.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use super::cleanup::{Cleanup, IntoCleanup};
use super::state::State;
use super::unit::ReactiveUnit;
use crate::error::{Result, Violation};

type ActiveHook = Box<dyn FnMut() -> Option<Cleanup>>;

/// Shared read-only view of an [`ActiveUnit`]'s flag, for render closures.
#[derive(Debug, Clone, Default)]
pub struct ActiveFlag(Rc<Cell<bool>>);

impl ActiveFlag {
    #[must_use]
    pub fn get(&self) -> bool {
        self.0.get()
    }
}

struct ActiveInner {
    flag: ActiveFlag,
    hook: RefCell<Option<ActiveHook>>,
    cleanup: RefCell<Option<Cleanup>>,
}

impl ActiveInner {
    fn run_cleanup(&self) {
        let cleanup = self.cleanup.borrow_mut().take();
        if let Some(cleanup) = cleanup {
            cleanup.run();
        }
    }
}

impl Drop for ActiveInner {
    fn drop(&mut self) {
        self.run_cleanup();
    }
}

/// A [`ReactiveUnit`] plus the two-state activation machine.
pub struct ActiveUnit<S: State> {
    unit: ReactiveUnit<S>,
    inner: Rc<ActiveInner>,
}

impl<S: State> Clone for ActiveUnit<S> {
    fn clone(&self) -> Self {
        Self {
            unit: self.unit.clone(),
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S: State> fmt::Debug for ActiveUnit<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveUnit")
            .field("unit", &self.unit)
            .field("active", &self.is_active())
            .finish()
    }
}

impl<S: State> ActiveUnit<S> {
    /// Wrap `unit`, starting inactive.
    #[must_use]
    pub fn new(unit: ReactiveUnit<S>) -> Self {
        Self {
            unit,
            inner: Rc::new(ActiveInner {
                flag: ActiveFlag::default(),
                hook: RefCell::new(None),
                cleanup: RefCell::new(None),
            }),
        }
    }

    /// Hook run on every inactive → active transition. A returned cleanup
    /// runs on the next deactivation.
    #[must_use]
    pub fn on_active<R: IntoCleanup>(self, mut hook: impl FnMut() -> R + 'static) -> Self {
        *self.inner.hook.borrow_mut() = Some(Box::new(move || hook().into_cleanup()));
        self
    }

    #[must_use]
    pub fn unit(&self) -> &ReactiveUnit<S> {
        &self.unit
    }

    #[must_use]
    pub fn flag(&self) -> ActiveFlag {
        self.inner.flag.clone()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.flag.get()
    }

    /// Move to `active`. Returns whether the flag changed.
    pub fn set_active(&self, active: bool) -> Result<bool> {
        if self.unit.is_rendering() {
            return Err(self.unit.report(Violation::ActivateDuringRender));
        }
        if self.inner.flag.get() == active {
            return Ok(false);
        }
        self.inner.flag.0.set(active);
        if active {
            let hook = self.inner.hook.borrow_mut().take();
            if let Some(mut hook) = hook {
                let cleanup = hook();
                let mut slot = self.inner.hook.borrow_mut();
                if slot.is_none() {
                    *slot = Some(hook);
                }
                drop(slot);
                *self.inner.cleanup.borrow_mut() = cleanup;
            }
        } else {
            self.inner.run_cleanup();
        }
        debug!(unit = self.unit.name(), active, "activation changed");
        self.unit.force_render()?;
        Ok(true)
    }

    pub fn toggle(&self) -> Result<bool> {
        self.set_active(!self.is_active())
    }
}

/// The state-agnostic face of an [`ActiveUnit`].
pub trait Activatable {
    fn is_active(&self) -> bool;
    fn set_active(&self, active: bool) -> Result<bool>;
}

impl<S: State> Activatable for ActiveUnit<S> {
    fn is_active(&self) -> bool {
        ActiveUnit::is_active(self)
    }

    fn set_active(&self, active: bool) -> Result<bool> {
        ActiveUnit::set_active(self, active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::RenderCx;
    use crate::scheduler::{LabClock, Scheduler};
    use web_time::Duration;

    crate::reactive_state! {
        #[derive(Debug, Clone, PartialEq, Default)]
        struct Panel {
            title: String,
        }
        fields = PanelField;
        patch = PanelPatch;
    }

    type Log = Rc<RefCell<Vec<String>>>;

    fn panel(sched: &Scheduler, log: &Log) -> ActiveUnit<Panel> {
        let unit = ReactiveUnit::builder(Panel::default())
            .scheduler(sched)
            .build();
        let active = ActiveUnit::new(unit);
        let (flag, l) = (active.flag(), Rc::clone(log));
        active
            .unit()
            .set_renderer(move |_: &RenderCx<'_, Panel>| {
                l.borrow_mut().push(format!("render active={}", flag.get()));
            });
        let l = Rc::clone(log);
        active.on_active(move || {
            l.borrow_mut().push("hook".into());
            let l = Rc::clone(&l);
            Cleanup::new(move || l.borrow_mut().push("deactivate".into()))
        })
    }

    #[test]
    fn transitions_run_hook_cleanup_and_render() {
        let sched = Scheduler::lab(&LabClock::new());
        let log: Log = Rc::default();
        let unit = panel(&sched, &log);

        assert!(unit.set_active(true).unwrap());
        sched.advance(Duration::from_millis(5));
        assert!(unit.set_active(false).unwrap());
        sched.advance(Duration::from_millis(5));

        assert_eq!(
            *log.borrow(),
            vec!["hook", "render active=true", "deactivate", "render active=false"]
        );
    }

    #[test]
    fn same_value_is_a_no_op() {
        let sched = Scheduler::lab(&LabClock::new());
        let log: Log = Rc::default();
        let unit = panel(&sched, &log);

        assert!(!unit.set_active(false).unwrap());
        assert!(unit.set_active(true).unwrap());
        assert!(!unit.set_active(true).unwrap());
        sched.advance(Duration::from_millis(5));
        assert_eq!(*log.borrow(), vec!["hook", "render active=true"]);
    }

    #[test]
    fn toggle_flips_and_reactivation_reruns_hook() {
        let sched = Scheduler::lab(&LabClock::new());
        let log: Log = Rc::default();
        let unit = panel(&sched, &log);
        unit.toggle().unwrap();
        unit.toggle().unwrap();
        unit.toggle().unwrap();
        assert!(unit.is_active());
        let hooks = log.borrow().iter().filter(|e| *e == "hook").count();
        assert_eq!(hooks, 2);
    }

    #[test]
    fn dropping_active_unit_runs_active_cleanup() {
        let sched = Scheduler::lab(&LabClock::new());
        let log: Log = Rc::default();
        let unit = panel(&sched, &log);
        unit.set_active(true).unwrap();
        drop(unit);
        assert_eq!(*log.borrow(), vec!["hook", "deactivate"]);
    }

    #[test]
    fn transitions_render_under_on_change_policy() {
        let sched = Scheduler::lab(&LabClock::new());
        let unit = ActiveUnit::new(
            ReactiveUnit::builder(Panel::default())
                .scheduler(&sched)
                .policy(crate::reactive::RenderPolicy::OnChange)
                .build(),
        );
        let seen: Rc<RefCell<Vec<bool>>> = Rc::default();
        let (s, flag) = (Rc::clone(&seen), unit.flag());
        unit.unit().set_renderer(move |_: &RenderCx<'_, Panel>| {
            s.borrow_mut().push(flag.get());
        });
        unit.unit().request_render().unwrap();
        sched.advance(Duration::from_millis(5));

        unit.set_active(true).unwrap();
        sched.advance(Duration::from_millis(5));
        unit.set_active(false).unwrap();
        sched.advance(Duration::from_millis(5));
        unit.unit().request_render().unwrap();
        sched.advance(Duration::from_millis(5));

        assert_eq!(*seen.borrow(), vec![false, true, false]);
    }

    #[test]
    fn activation_during_render_is_rejected() {
        let sched = Scheduler::lab(&LabClock::new());
        let unit = ActiveUnit::new(
            ReactiveUnit::builder(Panel::default())
                .scheduler(&sched)
                .build(),
        );
        let outcome: Rc<RefCell<Option<Result<bool>>>> = Rc::default();
        let (o, handle) = (Rc::clone(&outcome), unit.clone());
        unit.unit().set_renderer(move |_: &RenderCx<'_, Panel>| {
            *o.borrow_mut() = Some(handle.set_active(true));
        });
        unit.unit().request_render().unwrap();
        sched.advance(Duration::from_millis(5));

        let err = outcome.borrow_mut().take().unwrap().unwrap_err();
        assert_eq!(err.violation(), Some(Violation::ActivateDuringRender));
        assert!(!unit.is_active());
    }
}
