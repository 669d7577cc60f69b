#![forbid(unsafe_code)]

//! Modules: reactive units managed by a [`Bench`](crate::Bench).
//!
//! A module declares the ids it depends on, owns one reactive unit, and
//! exposes a [`WiringSlot`] that the bench fills exactly once before calling
//! `start()`. The wiring carries the module's id, its configuration entry,
//! its resolved dependencies and a handle back to the bench.

use std::any::Any;
use std::borrow::Borrow;
use std::cell::OnceCell;
use std::fmt;
use std::rc::{Rc, Weak};

use futures::future::LocalBoxFuture;
use serde_json::Value;
use trellis_runtime::{Activatable, Reactive};

use crate::bench::BenchHandle;
use crate::error::{BenchError, ModuleError};

/// Derived module id, e.g. `colorPicker`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(String);

impl ModuleId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ModuleId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for ModuleId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ModuleId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ModuleId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// A component managed by the bench.
pub trait Module: Any {
    /// Ids of the modules this one needs, resolved before `start()`.
    fn dependencies(&self) -> &[&str] {
        &[]
    }

    fn wiring(&self) -> &WiringSlot;

    fn unit(&self) -> &dyn Reactive;

    /// The activation machine, for modules that have one.
    fn activatable(&self) -> Option<&dyn Activatable> {
        None
    }

    /// One-time asynchronous setup. Runs after wiring, in dependency order.
    fn start(&self) -> LocalBoxFuture<'_, Result<(), ModuleError>> {
        Box::pin(async { Ok(()) })
    }
}

impl dyn Module {
    /// The id assigned at wiring.
    #[must_use]
    pub fn id(&self) -> Option<&ModuleId> {
        self.wiring().get().map(|wiring| &wiring.id)
    }
}

/// What the bench hands a module before starting it.
#[derive(Debug)]
pub struct Wiring {
    pub id: ModuleId,
    /// The module's configuration entry, `null` when absent.
    pub config: Value,
    pub deps: Deps,
    pub bench: BenchHandle,
}

/// Write-once holder of a module's [`Wiring`].
///
/// Clones share the slot, so a render closure can keep one to read its
/// module's config and dependencies.
#[derive(Debug, Clone, Default)]
pub struct WiringSlot(Rc<OnceCell<Wiring>>);

impl WiringSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self) -> Option<&Wiring> {
        self.0.get()
    }

    #[must_use]
    pub fn is_wired(&self) -> bool {
        self.0.get().is_some()
    }

    #[must_use]
    pub fn id(&self) -> Option<&ModuleId> {
        self.get().map(|wiring| &wiring.id)
    }

    /// Configuration entry, `null` before wiring.
    #[must_use]
    pub fn config(&self) -> &Value {
        const NULL: &Value = &Value::Null;
        self.get().map_or(NULL, |wiring| &wiring.config)
    }

    #[must_use]
    pub fn deps(&self) -> Option<&Deps> {
        self.get().map(|wiring| &wiring.deps)
    }

    #[must_use]
    pub fn bench(&self) -> Option<&BenchHandle> {
        self.get().map(|wiring| &wiring.bench)
    }

    pub(crate) fn install(&self, wiring: Wiring) -> Result<(), BenchError> {
        self.0
            .set(wiring)
            .map_err(|rejected| BenchError::AlreadyWired { id: rejected.id })
    }
}

/// A module's resolved dependencies, by id.
///
/// Entries do not keep their modules alive; they resolve for as long as the
/// bench that wired them exists.
#[derive(Default)]
pub struct Deps {
    entries: Vec<(ModuleId, Weak<dyn Module>)>,
}

impl Deps {
    pub(crate) fn push(&mut self, id: ModuleId, module: &Rc<dyn Module>) {
        self.entries.push((id, Rc::downgrade(module)));
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Rc<dyn Module>> {
        self.entries
            .iter()
            .find(|(dep, _)| dep == id)
            .and_then(|(_, module)| module.upgrade())
    }

    /// The dependency `id`, downcast to its concrete module type.
    #[must_use]
    pub fn get_as<M: Module>(&self, id: &str) -> Option<Rc<M>> {
        let module: Rc<dyn Any> = self.get(id)?;
        module.downcast::<M>().ok()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ModuleId> {
        self.entries.iter().map(|(id, _)| id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Deps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.ids()).finish()
    }
}
