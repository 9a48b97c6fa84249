#![forbid(unsafe_code)]

//! Shared single-value cell.
//!
//! # Design
//!
//! [`ValueCell<T>`] wraps a value in shared, reference-counted storage
//! (`Rc<RefCell<..>>`). Cloning a cell yields another handle to the same
//! slot, which is how the history stack and the pop reconciler observe one
//! live location and one live entry without copying them around.
//!
//! # Failure Modes
//!
//! - **Borrow across callbacks**: `with` holds a shared borrow for the
//!   duration of the closure. Setting the same cell from inside that closure
//!   panics (RefCell rules). Callers read with `get` when they need to call
//!   out while holding the value.

use std::cell::RefCell;
use std::rc::Rc;

/// A shared value slot.
pub struct ValueCell<T> {
    inner: Rc<RefCell<T>>,
}

// Manual Clone: shares the same Rc.
impl<T> Clone for ValueCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ValueCell<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueCell")
            .field("value", &*self.inner.borrow())
            .finish()
    }
}

impl<T: Clone> ValueCell<T> {
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(value)),
        }
    }

    /// Clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow().clone()
    }

    /// Borrow the current value without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow())
    }

    /// Store `value`, returning the previous one.
    pub fn replace(&self, value: T) -> T {
        self.inner.replace(value)
    }

    pub fn set(&self, value: T) {
        *self.inner.borrow_mut() = value;
    }
}
