#![forbid(unsafe_code)]

//! Subscribers notified once per completed render pass.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

type Listener = Rc<dyn Fn()>;

#[derive(Default)]
struct ListenerList {
    next_id: Cell<u64>,
    entries: RefCell<Vec<(u64, Listener)>>,
}

/// Ordered list of change callbacks.
///
/// Notification iterates over a copy of the list, so callbacks may register
/// or remove listeners; such edits apply from the next notification.
#[derive(Default)]
pub struct ChangeListeners {
    list: Rc<ListenerList>,
}

impl ChangeListeners {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, callback: impl Fn() + 'static) -> ListenerHandle {
        let id = self.list.next_id.get();
        self.list.next_id.set(id + 1);
        self.list
            .entries
            .borrow_mut()
            .push((id, Rc::new(callback)));
        ListenerHandle {
            id,
            list: Rc::downgrade(&self.list),
        }
    }

    /// Invoke every callback in registration order.
    pub fn notify(&self) {
        let snapshot: Vec<Listener> = self
            .list
            .entries
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in snapshot {
            listener();
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.list.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.list.entries.borrow_mut().clear();
    }
}

impl fmt::Debug for ChangeListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeListeners")
            .field("len", &self.len())
            .finish()
    }
}

/// Returned by [`ChangeListeners::add`]. Dropping the handle keeps the
/// listener registered; call [`remove`](ListenerHandle::remove) to detach it.
#[derive(Debug, Clone)]
pub struct ListenerHandle {
    id: u64,
    list: Weak<ListenerList>,
}

impl ListenerHandle {
    /// Detach the listener. Returns `false` if it was already removed or the
    /// owning unit is gone.
    pub fn remove(&self) -> bool {
        let Some(list) = self.list.upgrade() else {
            return false;
        };
        let mut entries = list.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|(id, _)| *id != self.id);
        entries.len() != before
    }
}
