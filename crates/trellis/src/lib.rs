#![forbid(unsafe_code)]

//! Trellis public facade crate.
//!
//! This crate provides the stable, ergonomic surface area for users.

pub use trellis_runtime::reactive_state;

pub mod prelude {
    #[cfg(feature = "bench")]
    pub use trellis_bench as bench;
    pub use trellis_runtime as runtime;

    #[cfg(feature = "bench")]
    pub use trellis_bench::{
        Bench, BenchError, BenchHandle, InlineConfig, JsonFileConfig, Module, ModuleError,
        ModuleId, NoConfig, WiringSlot,
    };
    pub use trellis_runtime::{
        Activatable, ActiveUnit, Cleanup, EngineError, MemoCache, Reactive, ReactiveUnit, Refresh,
        RenderCx, RenderError, RenderPolicy, Scheduler, State, observe,
    };
}
