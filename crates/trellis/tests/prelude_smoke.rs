//! The prelude is enough to declare state, render it and run it in a bench.

use std::cell::RefCell;
use std::rc::Rc;

use futures::executor::block_on;
use serde_json::json;
use trellis::prelude::*;
use trellis::prelude::runtime::LabClock;
use web_time::Duration;

trellis::reactive_state! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct Greeting {
        pub text: String,
    }
    fields = GreetingField;
    patch = GreetingPatch;
}

struct GreeterModule {
    unit: ReactiveUnit<Greeting>,
    wiring: WiringSlot,
}

impl Module for GreeterModule {
    fn wiring(&self) -> &WiringSlot {
        &self.wiring
    }

    fn unit(&self) -> &dyn Reactive {
        &self.unit
    }
}

#[test]
fn greeter_renders_its_configured_text() {
    let sched = Scheduler::lab(&LabClock::new());
    let shown = Rc::new(RefCell::new(Vec::new()));

    let bench = Bench::with_config(InlineConfig::new(json!({ "greeter": "hello" })));
    let (s, out) = (sched.clone(), Rc::clone(&shown));
    bench.register("GreeterModule", move || {
        let wiring = WiringSlot::new();
        let slot = wiring.clone();
        let unit = ReactiveUnit::builder(Greeting::default())
            .scheduler(&s)
            .render(move |cx: &RenderCx<'_, Greeting>| {
                let configured = slot.config().as_str().unwrap_or_default();
                out.borrow_mut()
                    .push(format!("{configured} {}", cx.state().text));
            });
        GreeterModule { unit, wiring }
    });

    block_on(bench.start()).unwrap();
    let greeter = bench.module_as::<GreeterModule>("greeter").unwrap();
    greeter
        .unit
        .set_state(GreetingPatch::default().text("world".into()))
        .unwrap();
    sched.advance(Duration::from_millis(2));

    assert_eq!(*shown.borrow(), vec!["hello world"]);
}

trellis::reactive_state! {
    #[derive(Debug, Clone, Default)]
    pub struct Counter {
        pub count: u32,
    }
    fields = CounterField;
    patch = CounterPatch;
}

#[test]
fn readme_counter_runs_its_effect_per_change() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = Rc::clone(&seen);
    let unit = observe(Counter::default(), move |cx: &RenderCx<'_, Counter>| {
        cx.changed(&[CounterField::count], || {
            s.borrow_mut().push(cx.state().count);
        });
    });
    Scheduler::current().run_until_idle();
    unit.set_state(CounterPatch::default().count(2)).unwrap();
    Scheduler::current().run_until_idle();
    assert_eq!(*seen.borrow(), vec![0, 2]);
}
