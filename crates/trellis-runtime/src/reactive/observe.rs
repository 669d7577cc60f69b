#![forbid(unsafe_code)]

//! Functional entry point: a state value plus a render closure.

use super::cleanup::RenderOutput;
use super::state::State;
use super::unit::{ReactiveUnit, RenderCx, UnitBuilder};

/// Build a unit from `state` and `render` and request its first render.
///
/// ```
/// use trellis_runtime::reactive::{observe, RenderCx};
/// use trellis_runtime::scheduler::Scheduler;
///
/// trellis_runtime::reactive_state! {
///     #[derive(Debug, Clone, Default)]
///     pub struct Clicks {
///         pub count: u32,
///     }
///     fields = ClicksField;
///     patch = ClicksPatch;
/// }
///
/// let unit = observe(Clicks::default(), |cx: &RenderCx<'_, Clicks>| {
///     let _ = cx.state().count;
/// });
/// assert!(unit.is_render_pending());
/// Scheduler::current().run_until_idle();
/// assert_eq!(unit.render_count(), 1);
/// ```
pub fn observe<S: State, R: RenderOutput>(
    state: S,
    render: impl FnMut(&RenderCx<'_, S>) -> R + 'static,
) -> ReactiveUnit<S> {
    observe_with(ReactiveUnit::builder(state), render)
}

/// [`observe`] with a configured builder.
pub fn observe_with<S: State, R: RenderOutput>(
    builder: UnitBuilder<S>,
    render: impl FnMut(&RenderCx<'_, S>) -> R + 'static,
) -> ReactiveUnit<S> {
    let unit = builder.render(render);
    unit.schedule_render();
    unit
}
