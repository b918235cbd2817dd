//! There are five steps in dropping an object whose ref count reached zero:
//! 1. run the finalizer (at most once per object), which may resurrect the object
//! 2. untrack it from the collector
//! 3. clear weak references to it and call their callbacks
//! 4. run the legacy finalizer hook
//! 5. drop the payload and deallocate
//!
//! The object is untracked before any user code of steps 3 and 4 runs: a collection triggered
//! from there must not find a tracked object with a zero ref count.
//!
//! None of this needs the collector: cycles never get here on their own, the collector's
//! `delete_garbage` only breaks them so that this path can finish the job.

use super::collector::{report_unraisable, GcState};
use super::gc_obj::{Gc, GcObjectRef};
use super::header::GcFlags;
use super::weakref::WeakRef;
use super::{GcObj, ObjPtr};

/// simple RC -= 1, release the object when it was the last reference
///
/// # Safety
/// the caller must own one count of `ptr`
pub(crate) unsafe fn dec_ref(ptr: ObjPtr) {
    if ptr.as_ref().header.dec() == 0 {
        release(ptr);
    }
}

unsafe fn release(ptr: ObjPtr) {
    let obj = ptr.as_ref();
    let state = obj.header.gc.upgrade();

    if obj.value.has_finalizer() && !obj.header.flags().contains(GcFlags::FINALIZED) {
        // temporarily resurrect, the finalizer gets a strong reference to work with
        obj.header.inc();
        obj.header.insert_flags(GcFlags::FINALIZED);
        let zelf = GcObjectRef::from_raw(ptr);
        if let Err(err) = obj.value.finalize(&zelf) {
            report_unraisable(state.as_deref(), format!("finalizer of {obj:?}"), err);
        }
        let _ = zelf.into_raw();
        if obj.header.dec() > 0 {
            debug!("{:?} resurrected by its finalizer", obj);
            return;
        }
    }

    if let Some(state) = &state {
        state.untrack(obj);
    }

    clear_weakrefs(obj, state.as_deref());

    if obj.value.has_legacy_finalizer() {
        obj.value.legacy_finalize();
    }

    if let Some(state) = &state {
        state.on_dealloc(obj);
    }
    drop(state);

    drop(Box::from_raw(ptr.as_ptr()));
}

/// clear every weak reference to a dying object, then call the callbacks
fn clear_weakrefs(obj: &GcObj, state: Option<&GcState>) {
    let weakrefs = obj.header.take_weakrefs();
    if weakrefs.is_empty() {
        return;
    }
    let mut to_call = Vec::new();
    for wr in weakrefs {
        // SAFETY: a weak reference unlinks itself from its target before it is freed
        let weakref = unsafe { wr.as_ref() };
        weakref.value.clear_target();
        if weakref.value.has_callback() {
            to_call.push(unsafe { Gc::clone_from_raw(wr) });
        }
    }
    for wr in to_call {
        if let Err(err) = WeakRef::invoke_callback(&wr) {
            report_unraisable(state, format!("weakref callback of {wr:?}"), err);
        }
    }
}
