#![forbid(unsafe_code)]

//! Module orchestration for Trellis.
//!
//! A [`Bench`] owns a set of [`Module`]s, each wrapping one reactive unit. On
//! [`Bench::start`] it loads configuration, orders modules so dependencies
//! start first, hands every module its wiring and awaits each `start()` in
//! turn. Afterwards [`Bench::activate`] keeps at most one activatable module
//! active.

pub mod bench;
pub mod config;
pub mod error;
pub mod graph;
pub mod module;
pub mod naming;

pub use bench::{Bench, BenchHandle};
pub use config::{
    BenchConfig, ConfigSource, DEFAULT_CONFIG_PATH, InlineConfig, JsonFileConfig, NoConfig,
};
pub use error::{BenchError, ModuleError, Result};
pub use graph::{GraphNode, Resolution, resolve};
pub use module::{Deps, Module, ModuleId, Wiring, WiringSlot};
pub use naming::{camel_case, module_id};
