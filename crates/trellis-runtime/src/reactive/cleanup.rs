#![forbid(unsafe_code)]

//! Cleanup actions and the per-unit registry that owns them.
//!
//! Two kinds of cleanup exist:
//!
//! - **Pass cleanups** are registered during one render pass (through
//!   `add_cleanup` or the render's return value) and all run, in
//!   registration order, right before the next pass.
//! - **Keyed cleanups** belong to one scoped effect ([`EffectKey`]). They run
//!   only when that effect is about to re-run, or when the whole keyed map is
//!   drained on dispose.
//!
//! The registry never runs anything itself: it hands cleanups back to the
//! caller, which invokes them after releasing its borrow so that cleanups may
//! call back into the unit.

use std::borrow::Cow;
use std::fmt;
use std::hash::Hash;
use std::panic::Location;

use ahash::AHashMap;

use crate::error::RenderError;

/// A deferred undo action.
pub struct Cleanup(Box<dyn FnOnce()>);

impl Cleanup {
    #[must_use]
    pub fn new(action: impl FnOnce() + 'static) -> Self {
        Self(Box::new(action))
    }

    pub fn run(self) {
        (self.0)();
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Cleanup(..)")
    }
}

/// Values an effect may return: nothing, or a cleanup to keep.
pub trait IntoCleanup {
    fn into_cleanup(self) -> Option<Cleanup>;
}

impl IntoCleanup for () {
    fn into_cleanup(self) -> Option<Cleanup> {
        None
    }
}

impl IntoCleanup for Cleanup {
    fn into_cleanup(self) -> Option<Cleanup> {
        Some(self)
    }
}

impl IntoCleanup for Option<Cleanup> {
    fn into_cleanup(self) -> Option<Cleanup> {
        self
    }
}

/// Values a render callback may return.
pub trait RenderOutput {
    fn into_outcome(self) -> Result<Option<Cleanup>, RenderError>;
}

impl RenderOutput for () {
    fn into_outcome(self) -> Result<Option<Cleanup>, RenderError> {
        Ok(None)
    }
}

impl RenderOutput for Cleanup {
    fn into_outcome(self) -> Result<Option<Cleanup>, RenderError> {
        Ok(Some(self))
    }
}

impl RenderOutput for Option<Cleanup> {
    fn into_outcome(self) -> Result<Option<Cleanup>, RenderError> {
        Ok(self)
    }
}

impl<T: IntoCleanup> RenderOutput for Result<T, RenderError> {
    fn into_outcome(self) -> Result<Option<Cleanup>, RenderError> {
        self.map(IntoCleanup::into_cleanup)
    }
}

// ─── Effect keys ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Site {
    Caller(&'static Location<'static>),
    Named(Cow<'static, str>),
}

/// Identity of one scoped effect across renders.
///
/// Made of where the effect is declared (its call site, or an explicit name),
/// its ordered dependency list and its occurrence within one pass. Two
/// different dependency lists never share a key, and neither do repeated
/// declarations from one loop or helper.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EffectKey<F> {
    site: Site,
    deps: Vec<F>,
    occurrence: u32,
}

impl<F: Copy> EffectKey<F> {
    #[must_use]
    pub fn at(location: &'static Location<'static>, deps: &[F]) -> Self {
        Self {
            site: Site::Caller(location),
            deps: deps.to_vec(),
            occurrence: 0,
        }
    }

    #[must_use]
    pub fn named(name: impl Into<Cow<'static, str>>, deps: &[F]) -> Self {
        Self {
            site: Site::Named(name.into()),
            deps: deps.to_vec(),
            occurrence: 0,
        }
    }

    /// The same declaration, reached for the `occurrence`-th time in a pass.
    #[must_use]
    pub fn nth(mut self, occurrence: u32) -> Self {
        self.occurrence = occurrence;
        self
    }

    #[must_use]
    pub fn deps(&self) -> &[F] {
        &self.deps
    }

    #[must_use]
    pub fn occurrence(&self) -> u32 {
        self.occurrence
    }
}

// ─── Registry ────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct CleanupRegistry<F> {
    pass: Vec<Cleanup>,
    keyed: Vec<Option<Cleanup>>,
    index: AHashMap<EffectKey<F>, usize>,
}

impl<F> Default for CleanupRegistry<F> {
    fn default() -> Self {
        Self {
            pass: Vec::new(),
            keyed: Vec::new(),
            index: AHashMap::new(),
        }
    }
}

impl<F: Eq + Hash> CleanupRegistry<F> {
    /// Queue a cleanup for the start of the next pass.
    pub fn push(&mut self, cleanup: Cleanup) {
        self.pass.push(cleanup);
    }

    /// Remove every pass cleanup, in registration order.
    pub fn take_pass(&mut self) -> Vec<Cleanup> {
        std::mem::take(&mut self.pass)
    }

    /// Remove the cleanup stored under `key`, keeping the key's slot.
    pub fn take_keyed(&mut self, key: &EffectKey<F>) -> Option<Cleanup> {
        let slot = *self.index.get(key)?;
        self.keyed[slot].take()
    }

    /// Store the cleanup (or the absence of one) for `key`, returning any
    /// cleanup it displaces. A displaced cleanup has not run yet.
    #[must_use]
    pub fn store_keyed(
        &mut self,
        key: EffectKey<F>,
        cleanup: Option<Cleanup>,
    ) -> Option<Cleanup> {
        match self.index.get(&key) {
            Some(&slot) => std::mem::replace(&mut self.keyed[slot], cleanup),
            None => {
                self.index.insert(key, self.keyed.len());
                self.keyed.push(cleanup);
                None
            }
        }
    }

    /// Clear the keyed map, returning its cleanups in first-registration
    /// order.
    pub fn drain_keyed(&mut self) -> Vec<Cleanup> {
        self.index.clear();
        self.keyed.drain(..).flatten().collect()
    }

    #[must_use]
    pub fn pass_len(&self) -> usize {
        self.pass.len()
    }

    /// Number of effect keys seen so far.
    #[must_use]
    pub fn keyed_len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn has_keyed_cleanup(&self, key: &EffectKey<F>) -> bool {
        self.index
            .get(key)
            .is_some_and(|&slot| self.keyed[slot].is_some())
    }
}
