#![forbid(unsafe_code)]

//! The bench: registers modules, orders them by dependency, wires and starts
//! them, and coordinates activation.
//!
//! # Startup
//!
//! [`Bench::start`] runs once:
//!
//! 1. load the configuration document and re-key it by upper-cased id;
//! 2. resolve the start order (see [`graph`](crate::graph));
//! 3. wire every module with its id, config entry, live dependencies and a
//!    handle back to the bench;
//! 4. await each module's `start()` in order;
//! 5. request the first render of every module.
//!
//! # Failure Modes
//!
//! - **Config cannot be loaded or parsed**: `start()` returns the error
//!   before anything is wired.
//! - **Cyclic or unknown dependencies**: logged; the affected modules start
//!   last, in registration order.
//! - **A module's `start()` fails**: the sequence stops there. Modules that
//!   already started stay started.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, info, warn};

use crate::config::{BenchConfig, ConfigSource, JsonFileConfig};
use crate::error::{BenchError, Result};
use crate::graph::{self, GraphNode, Resolution};
use crate::module::{Deps, Module, ModuleId, Wiring};
use crate::naming::module_id;

type Entry = (ModuleId, Rc<dyn Module>);

struct BenchInner {
    modules: RefCell<Vec<Entry>>,
    config: Box<dyn ConfigSource>,
    resolution: RefCell<Option<Resolution>>,
    starting: Cell<bool>,
    started: Cell<bool>,
}

/// Owner of a set of modules. Clones share the same bench.
#[derive(Clone)]
pub struct Bench {
    inner: Rc<BenchInner>,
}

impl Default for Bench {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Bench {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bench")
            .field("config", &self.inner.config.origin())
            .field("modules", &self.module_ids())
            .field("started", &self.is_started())
            .finish()
    }
}

impl Bench {
    /// Bench configured from `bench.json`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(JsonFileConfig::default())
    }

    #[must_use]
    pub fn with_config(source: impl ConfigSource + 'static) -> Self {
        Self {
            inner: Rc::new(BenchInner {
                modules: RefCell::new(Vec::new()),
                config: Box::new(source),
                resolution: RefCell::new(None),
                starting: Cell::new(false),
                started: Cell::new(false),
            }),
        }
    }

    /// Register the module built by `construct` under the id derived from
    /// `name`. An existing module with the same id is replaced in place.
    pub fn register<M: Module>(&self, name: &str, construct: impl FnOnce() -> M) -> ModuleId {
        let id = ModuleId::new(module_id(name));
        let module: Rc<dyn Module> = Rc::new(construct());
        if self.inner.starting.get() || self.is_started() {
            warn!(module = %id, "registered after start; it will not be started");
        }
        let mut modules = self.inner.modules.borrow_mut();
        match modules.iter_mut().find(|(existing, _)| *existing == id) {
            Some(slot) => {
                warn!(module = %id, name, "module id registered twice; replacing");
                slot.1 = module;
            }
            None => {
                debug!(module = %id, name, "module registered");
                modules.push((id.clone(), module));
            }
        }
        id
    }

    /// Register `M::default()` under `M`'s type name.
    pub fn register_default<M: Module + Default>(&self) -> ModuleId {
        self.register(trellis_runtime::short_type_name::<M>(), M::default)
    }

    /// Ids in registration order.
    #[must_use]
    pub fn module_ids(&self) -> Vec<ModuleId> {
        self.inner
            .modules
            .borrow()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    #[must_use]
    pub fn module(&self, id: &str) -> Option<Rc<dyn Module>> {
        self.inner
            .modules
            .borrow()
            .iter()
            .find(|(existing, _)| existing == id)
            .map(|(_, module)| Rc::clone(module))
    }

    /// The module `id`, downcast to its concrete type.
    #[must_use]
    pub fn module_as<M: Module>(&self, id: &str) -> Option<Rc<M>> {
        let module: Rc<dyn std::any::Any> = self.module(id)?;
        module.downcast::<M>().ok()
    }

    /// Resolved start order, once `start()` got that far.
    #[must_use]
    pub fn order(&self) -> Option<Vec<ModuleId>> {
        self.inner.resolution.borrow().as_ref().map(Resolution::order)
    }

    #[must_use]
    pub fn resolution(&self) -> Option<Resolution> {
        self.inner.resolution.borrow().clone()
    }

    /// Whether `start()` completed successfully.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.inner.started.get()
    }

    #[must_use]
    pub fn handle(&self) -> BenchHandle {
        BenchHandle {
            inner: Rc::downgrade(&self.inner),
        }
    }

    fn entries(&self) -> Vec<Entry> {
        self.inner.modules.borrow().clone()
    }

    /// Load config, wire and start every module, then request first renders.
    ///
    /// Only the first call proceeds; later calls, including ones made while
    /// the first is still awaiting, fail with [`BenchError::AlreadyStarted`].
    pub async fn start(&self) -> Result<Resolution> {
        if self.inner.starting.replace(true) {
            return Err(BenchError::AlreadyStarted);
        }
        let modules = self.entries();
        let ids: Vec<&str> = modules.iter().map(|(id, _)| id.as_str()).collect();
        info!(modules = %ids.join(","), "bench is starting");

        let origin = self.inner.config.origin();
        let document = self.inner.config.load().await?;
        let config = BenchConfig::from_document(&origin, document)?;
        debug!(origin = %origin, entries = config.len(), "configuration loaded");

        let nodes: Vec<GraphNode> = modules
            .iter()
            .map(|(id, module)| GraphNode::new(id.clone(), module.dependencies().iter().copied()))
            .collect();
        let resolution = graph::resolve(&nodes);
        let order = resolution.order();
        *self.inner.resolution.borrow_mut() = Some(resolution.clone());

        let lookup = |id: &ModuleId| modules.iter().find(|(existing, _)| existing == id);

        for id in &order {
            let Some((_, module)) = lookup(id) else {
                continue;
            };
            let mut deps = Deps::default();
            for &dep in module.dependencies() {
                match modules.iter().find(|(existing, _)| existing == dep) {
                    Some((dep_id, target)) => deps.push(dep_id.clone(), target),
                    None => warn!(module = %id, dependency = dep, "dependency is not registered"),
                }
            }
            module.wiring().install(Wiring {
                id: id.clone(),
                config: config.get(id.as_str()),
                deps,
                bench: self.handle(),
            })?;
        }

        for id in &order {
            let Some((_, module)) = lookup(id) else {
                continue;
            };
            info!(module = %id, "starting module");
            module
                .start()
                .await
                .map_err(|source| BenchError::ModuleStart {
                    id: id.clone(),
                    source,
                })?;
        }

        for id in &order {
            if let Some((_, module)) = lookup(id) {
                module.unit().request_render()?;
            }
        }

        self.inner.started.set(true);
        info!(modules = order.len(), complete = resolution.is_complete(), "bench started");
        Ok(resolution)
    }

    /// Make `id` the only active module.
    ///
    /// Every other activatable module is deactivated first. Then the module
    /// `id`, if it exists and is activatable, is activated, or flipped when
    /// `toggle` is set. Returns its new state, or `None` when there is no
    /// such activatable module.
    pub fn activate(&self, id: &str, toggle: bool) -> Result<Option<bool>> {
        let modules = self.entries();
        for (other, module) in &modules {
            if other == id {
                continue;
            }
            if let Some(activatable) = module.activatable() {
                activatable.set_active(false)?;
            }
        }
        let target = modules
            .iter()
            .find(|(existing, _)| existing == id)
            .and_then(|(_, module)| module.activatable().map(|a| (Rc::clone(module), a.is_active())));
        let Some((module, was_active)) = target else {
            debug!(module = id, "nothing to activate");
            return Ok(None);
        };
        let next = if toggle { !was_active } else { true };
        if let Some(activatable) = module.activatable() {
            activatable.set_active(next)?;
        }
        debug!(module = id, active = next, "activation updated");
        Ok(Some(next))
    }
}

/// Non-owning reference to a [`Bench`], handed to modules at wiring.
#[derive(Clone, Default)]
pub struct BenchHandle {
    inner: Weak<BenchInner>,
}

impl BenchHandle {
    /// A handle that never resolves.
    #[must_use]
    pub fn detached() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn upgrade(&self) -> Option<Bench> {
        self.inner.upgrade().map(|inner| Bench { inner })
    }

    /// [`Bench::activate`], or `Ok(None)` once the bench is gone.
    pub fn activate(&self, id: &str, toggle: bool) -> Result<Option<bool>> {
        match self.upgrade() {
            Some(bench) => bench.activate(id, toggle),
            None => Ok(None),
        }
    }

    #[must_use]
    pub fn module(&self, id: &str) -> Option<Rc<dyn Module>> {
        self.upgrade()?.module(id)
    }
}

impl fmt::Debug for BenchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BenchHandle")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}
