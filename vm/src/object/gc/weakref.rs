use std::cell::{Cell, RefCell};
use std::fmt;
use std::ptr;

use super::collector::Collector;
use super::error::CallbackError;
use super::gc_obj::{Gc, GcObjectRef};
use super::trace::{GcPayload, GcTrace, TracerFn};
use super::{GcObj, ObjPtr};

/// Called once, after the referent is gone, with the weak reference that observed it.
pub type WeakCallback = Box<dyn FnMut(&Gc<WeakRef>) -> Result<(), CallbackError>>;

/// A non-owning reference to a collectible object, with an optional callback.
///
/// The target pointer is cleared before any callback runs, both when the target dies of
/// ref counting and when the collector finds it in a garbage cycle.
pub struct WeakRef {
    target: Cell<Option<ObjPtr>>,
    callback: RefCell<Option<WeakCallback>>,
}

impl WeakRef {
    pub fn new(
        collector: &Collector,
        target: &GcObj,
        callback: Option<WeakCallback>,
    ) -> Gc<WeakRef> {
        let wr = Gc::new(
            collector,
            WeakRef {
                target: Cell::new(Some(target.as_ptr())),
                callback: RefCell::new(callback),
            },
        );
        target
            .header
            .weak_list
            .borrow_mut()
            .push(wr.as_non_null());
        wr
    }

    /// a strong reference to the target, if it is still alive
    pub fn upgrade(&self) -> Option<GcObjectRef> {
        // SAFETY: the target clears this pointer before it is freed
        self.target.get().map(|ptr| unsafe { ptr.as_ref() }.to_ref())
    }

    pub fn is_alive(&self) -> bool {
        self.target.get().is_some()
    }

    pub fn has_callback(&self) -> bool {
        self.callback.borrow().is_some()
    }

    pub(crate) fn clear_target(&self) {
        self.target.set(None);
    }

    /// takes the callback out first, so it runs at most once
    pub(crate) fn invoke_callback(zelf: &Gc<WeakRef>) -> Result<(), CallbackError> {
        let callback = zelf.callback.borrow_mut().take();
        match callback {
            Some(mut callback) => callback(zelf),
            None => Ok(()),
        }
    }

    /// remove this weak reference from its target's list
    fn detach(&self) {
        let Some(target) = self.target.take() else {
            return;
        };
        // SAFETY: the target is alive while the pointer is set
        let target = unsafe { target.as_ref() };
        let me = self as *const WeakRef;
        target
            .header
            .weak_list
            .borrow_mut()
            .retain(|wr| unsafe { ptr::addr_of!((*wr.as_ptr()).value) } != me);
    }
}

unsafe impl GcTrace for WeakRef {
    // the target is not owned, and callbacks are opaque closures
    fn trace(&self, _tracer_fn: &mut TracerFn) {}
}

impl GcPayload for WeakRef {
    fn clear(&self) {
        self.detach();
        let callback = self.callback.borrow_mut().take();
        drop(callback);
    }

    fn type_name(&self) -> &'static str {
        "weakref"
    }
}

impl Drop for WeakRef {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for WeakRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target.get() {
            // SAFETY: the target is alive while the pointer is set
            Some(target) => write!(f, "<weakref; to {:?}>", unsafe { target.as_ref() }),
            None => write!(f, "<weakref; dead>"),
        }
    }
}
