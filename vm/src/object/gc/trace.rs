use std::any::Any;
use std::cell::RefCell;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};

use super::error::CallbackError;
use super::gc_obj::{Gc, GcObjectRef};
use super::GcObjRef;

/// use `trace()` to call on all owned ObjectRef
///
/// # Safety
///
/// see `trace()`'s requirement
pub unsafe trait GcTrace {
    /// call tracer_fn for every object(childrens) owned by a Object
    /// # Safety
    ///
    /// must make sure that every owned object(Every stored `GcObjectRef` to be exactly) is called with tracer_fn **exactly once**.
    /// If some field is not called, the collector sees a reference from outside and the cycle leaks,
    /// but if some field is called repeatly, `gc_refs` goes below zero and the collector's invariants break.
    ///
    /// _**DO NOT**_ clone a `GcObjectRef`(which mess up the ref count system) in `trace()`, pass a reference instead
    ///
    /// ```ignore
    /// for ch in childs:
    ///     tracer_fn(ch)
    /// ```
    ///
    /// Note that Two `GcObjectRef` to the Same `GcObj` still count as two Ref, and should be called twice(once for each one) in this case.
    fn trace(&self, tracer_fn: &mut TracerFn);
}

/// A `TracerFn` is a callback function that is invoked for each `GcObjectRef` owned
/// by an instance of something.
pub type TracerFn<'a> = dyn FnMut(GcObjRef<'_>) + 'a;

/// Which untracking heuristic the collector may apply to an object that survived a collection.
///
/// An object is only untracked when none of its referents is tracked or may be tracked again later,
/// so it can not be part of a cycle until it is tracked again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UntrackHint {
    #[default]
    Never,
    /// Checked on every collection, for immutable containers such as tuples
    Always,
    /// Checked on full collections only, for mutable mappings that would be costly to recheck every time
    FullCollection,
}

pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    #[inline]
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// What the collector needs from every collectible type.
pub trait GcPayload: GcTrace + AsAny + 'static {
    /// Drop every strong reference this object holds, without freeing the object itself.
    ///
    /// References must be taken out of their cell before being dropped: dropping them may free other
    /// objects whose destructors look at this one again.
    fn clear(&self) {}

    fn has_finalizer(&self) -> bool {
        false
    }

    /// Runs at most once per object, before the object is freed. `zelf` is a strong reference to the
    /// object itself; cloning it somewhere reachable resurrects the object.
    fn finalize(&self, _zelf: &GcObjectRef) -> Result<(), CallbackError> {
        Ok(())
    }

    /// Objects with a legacy finalizer are never freed by the collector, they end up in the `garbage` list.
    fn has_legacy_finalizer(&self) -> bool {
        false
    }

    /// Called when the ref count drops to zero on its own.
    fn legacy_finalize(&self) {}

    fn untrack_hint(&self) -> UntrackHint {
        UntrackHint::Never
    }

    /// Whether this object, while untracked, could be tracked again later.
    ///
    /// A container holding such an object stays tracked, since a cycle may run through it
    /// once the object is tracked again.
    fn may_be_retracked(&self) -> bool {
        self.untrack_hint() == UntrackHint::FullCollection
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

unsafe impl GcTrace for GcObjectRef {
    #[inline]
    fn trace(&self, tracer_fn: &mut TracerFn) {
        tracer_fn(self.as_object())
    }
}

unsafe impl<T: GcPayload> GcTrace for Gc<T> {
    #[inline]
    fn trace(&self, tracer_fn: &mut TracerFn) {
        tracer_fn(self.as_object())
    }
}

unsafe impl GcTrace for () {
    #[inline]
    fn trace(&self, _tracer_fn: &mut TracerFn) {}
}

unsafe impl<T: GcTrace> GcTrace for Option<T> {
    #[inline]
    fn trace(&self, tracer_fn: &mut TracerFn) {
        if let Some(v) = self {
            v.trace(tracer_fn);
        }
    }
}

unsafe impl<T> GcTrace for [T]
where
    T: GcTrace,
{
    #[inline]
    fn trace(&self, tracer_fn: &mut TracerFn) {
        for elem in self {
            elem.trace(tracer_fn);
        }
    }
}

unsafe impl<T> GcTrace for Vec<T>
where
    T: GcTrace,
{
    #[inline]
    fn trace(&self, tracer_fn: &mut TracerFn) {
        for elem in self {
            elem.trace(tracer_fn);
        }
    }
}

unsafe impl<T: GcTrace + ?Sized> GcTrace for Box<T> {
    #[inline]
    fn trace(&self, tracer_fn: &mut TracerFn) {
        (**self).trace(tracer_fn)
    }
}

/// keys are plain data, only values are traced
unsafe impl<K, V: GcTrace, S> GcTrace for IndexMap<K, V, S> {
    #[inline]
    fn trace(&self, tracer_fn: &mut TracerFn) {
        for value in self.values() {
            value.trace(tracer_fn);
        }
    }
}

unsafe impl<T: GcTrace> GcTrace for RefCell<T> {
    #[inline]
    fn trace(&self, tracer_fn: &mut TracerFn) {
        match self.try_borrow() {
            Ok(v) => v.trace(tracer_fn),
            Err(_) => {
                // the owner is in the middle of a mutation, its children look like outside references this time
                error!("Trace a mutably borrowed RefCell, children are skipped.");
            }
        }
    }
}

unsafe impl<T: GcTrace> GcTrace for Mutex<T> {
    #[inline]
    fn trace(&self, tracer_fn: &mut TracerFn) {
        match self.try_lock() {
            Some(v) => v.trace(tracer_fn),
            None => {
                error!("Could be in dead lock.");
            }
        }
    }
}

unsafe impl<T: GcTrace> GcTrace for RwLock<T> {
    #[inline]
    fn trace(&self, tracer_fn: &mut TracerFn) {
        match self.try_read_recursive() {
            Some(v) => v.trace(tracer_fn),
            None => {
                error!("Could be in dead lock.");
            }
        }
    }
}

unsafe impl<A: GcTrace, B: GcTrace> GcTrace for (A, B) {
    #[inline]
    fn trace(&self, tracer_fn: &mut TracerFn) {
        self.0.trace(tracer_fn);
        self.1.trace(tracer_fn);
    }
}
