//! End-to-end lifecycle of reactive units: coalesced writes, the render-phase
//! guard, render failures and the events they log.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use tracing::{Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use trellis_runtime::reactive::{
    ActiveUnit, Cleanup, ReactiveUnit, Refresh, RenderCx, RenderPolicy, observe_with,
};
use trellis_runtime::scheduler::{LabClock, Scheduler};
use trellis_runtime::{EngineError, RenderError, Violation};
use web_time::Duration;

trellis_runtime::reactive_state! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct Counter {
        pub count: i64,
        pub step: i64,
    }
    fields = CounterField;
    patch = CounterPatch;
}

// ── Trace capture ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Captured {
    level: Level,
    message: String,
    violation: Option<String>,
}

struct TraceCapture {
    events: Arc<Mutex<Vec<Captured>>>,
}

impl<S> Layer<S> for TraceCapture
where
    S: Subscriber + for<'lookup> tracing_subscriber::registry::LookupSpan<'lookup>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        struct Fields {
            message: Option<String>,
            violation: Option<String>,
        }
        impl tracing::field::Visit for Fields {
            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                let text = format!("{value:?}").trim_matches('"').to_string();
                match field.name() {
                    "message" => self.message = Some(text),
                    "violation" => self.violation = Some(text),
                    _ => {}
                }
            }
        }
        let mut fields = Fields {
            message: None,
            violation: None,
        };
        event.record(&mut fields);
        self.events.lock().expect("trace capture lock").push(Captured {
            level: *event.metadata().level(),
            message: fields.message.unwrap_or_default(),
            violation: fields.violation,
        });
    }
}

fn capture() -> (Arc<Mutex<Vec<Captured>>>, tracing::subscriber::DefaultGuard) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(TraceCapture {
        events: Arc::clone(&events),
    });
    (events, tracing::subscriber::set_default(subscriber))
}

fn errors(events: &Arc<Mutex<Vec<Captured>>>) -> Vec<Captured> {
    events
        .lock()
        .expect("trace capture lock")
        .iter()
        .filter(|e| e.level == Level::ERROR)
        .cloned()
        .collect()
}

fn lab() -> Scheduler {
    Scheduler::lab(&LabClock::new())
}

fn count(n: i64) -> CounterPatch {
    CounterPatch::default().count(n)
}

// ═════════════════════════════════════════════════════════════════════════

#[test]
fn two_writes_in_one_window_render_once_with_final_count() {
    let sched = lab();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = Rc::clone(&seen);
    let unit = ReactiveUnit::builder(Counter::default())
        .scheduler(&sched)
        .render(move |cx: &RenderCx<'_, Counter>| s.borrow_mut().push(cx.state().count));

    unit.set_state(count(1)).unwrap();
    unit.set_state(count(2)).unwrap();
    sched.run_until_idle();

    assert_eq!(*seen.borrow(), vec![2]);
    assert_eq!(
        unit.snapshot(),
        Some(Counter { count: 2, step: 0 })
    );
}

#[test]
fn write_inside_render_is_logged_and_causes_no_nested_render() {
    let (events, _guard) = capture();
    let sched = lab();
    let renders = Rc::new(Cell::new(0));
    let r = Rc::clone(&renders);
    let unit = ReactiveUnit::builder(Counter::default())
        .scheduler(&sched)
        .name("counter")
        .build();
    let handle = unit.downgrade();
    unit.set_renderer(move |cx: &RenderCx<'_, Counter>| {
        r.set(r.get() + 1);
        if let Some(unit) = handle.upgrade() {
            let err = unit.set_state(count(cx.state().count + 1)).unwrap_err();
            assert_eq!(err.violation(), Some(Violation::WriteDuringRender));
        }
    });

    unit.request_render().unwrap();
    sched.run_until_idle();

    assert_eq!(renders.get(), 1);
    assert_eq!(unit.get().count, 0);
    let logged = errors(&events);
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].message, "protocol violation");
    assert_eq!(
        logged[0].violation.as_deref(),
        Some("state written while rendering")
    );
}

#[test]
fn render_scoped_calls_outside_render_log_errors() {
    let (events, _guard) = capture();
    let unit = ReactiveUnit::builder(Counter::default())
        .scheduler(&lab())
        .build();
    assert!(unit.changed(&[CounterField::count], || ()).is_err());
    assert!(unit.add_cleanup(|| {}).is_err());
    assert_eq!(errors(&events).len(), 2);
}

#[test]
fn failed_render_is_logged_and_retried_against_old_snapshot() {
    let (events, _guard) = capture();
    let sched = lab();
    let effect_runs = Rc::new(Cell::new(0));
    let e = Rc::clone(&effect_runs);
    let unit = ReactiveUnit::builder(Counter::default())
        .scheduler(&sched)
        .name("guarded")
        .render(move |cx: &RenderCx<'_, Counter>| -> Result<(), RenderError> {
            let e = Rc::clone(&e);
            cx.changed(&[CounterField::count], move || e.set(e.get() + 1));
            if cx.state().step > 1 {
                return Err(RenderError::new("step too large"));
            }
            Ok(())
        });

    unit.request_render().unwrap();
    sched.run_until_idle();
    unit.set_state(count(3).step(2)).unwrap();
    sched.run_until_idle();
    assert_eq!(unit.snapshot(), Some(Counter::default()));
    assert!(matches!(
        unit.take_render_error(),
        Some(EngineError::Render { .. })
    ));
    assert!(
        errors(&events)
            .iter()
            .any(|e| e.message == "render failed")
    );

    unit.set_state(CounterPatch::default().step(1)).unwrap();
    sched.run_until_idle();
    assert_eq!(unit.snapshot(), Some(Counter { count: 3, step: 1 }));
    assert_eq!(effect_runs.get(), 3);
}

#[test]
fn purge_refresh_and_on_change_policy_compose() {
    let sched = lab();
    let runs = Rc::new(Cell::new(0));
    let r = Rc::clone(&runs);
    let unit = observe_with(
        ReactiveUnit::builder(Counter::default())
            .scheduler(&sched)
            .policy(RenderPolicy::OnChange),
        move |cx: &RenderCx<'_, Counter>| {
            let r = Rc::clone(&r);
            cx.changed(&[CounterField::step], move || r.set(r.get() + 1));
        },
    );
    sched.run_until_idle();
    assert_eq!(unit.render_count(), 1);

    assert!(!unit.refresh(Refresh::Keep).unwrap());
    assert!(unit.refresh(Refresh::Purge).unwrap());
    assert_eq!(unit.render_count(), 2);
    assert_eq!(runs.get(), 2);
}

#[test]
fn deactivation_and_dispose_release_everything_once() {
    let sched = lab();
    let released = Rc::new(RefCell::new(Vec::new()));
    let unit = ReactiveUnit::builder(Counter::default())
        .scheduler(&sched)
        .build();
    let rel = Rc::clone(&released);
    unit.set_renderer(move |cx: &RenderCx<'_, Counter>| {
        let rel = Rc::clone(&rel);
        cx.changed(&[CounterField::count], move || {
            Cleanup::new(move || rel.borrow_mut().push("effect"))
        });
    });
    let rel = Rc::clone(&released);
    let active = ActiveUnit::new(unit.clone()).on_active(move || {
        let rel = Rc::clone(&rel);
        Cleanup::new(move || rel.borrow_mut().push("active"))
    });

    active.set_active(true).unwrap();
    sched.run_until_idle();
    active.set_active(false).unwrap();
    sched.run_until_idle();
    unit.dispose().unwrap();
    drop(active);

    assert_eq!(*released.borrow(), vec!["active", "effect"]);
    assert!(unit.is_disposed());
}
