//! This is a stop-the-world, generational, tricolor cycle collector.
//! Here is the basic idea:
//! 1. Every collectible object lives in a [`GcBox`], whose [`GcHeader`] holds the true ref count,
//! a working copy of it (`gc_refs`), a color, a generation tag and a slot in the [`Collector`]'s tracking lists.
//! 2. Reference counting frees acyclic garbage on its own, the collector only has to find
//! groups of objects that keep each other alive.
//!
//! The algorithm is the one CPython uses, with an explicit tricolor state machine:
//! | color | meaning |
//! | ----- | ------- |
//! | White | Presumed garbage, not yet proven reachable |
//! | Gray  | Known reachable, children not visited yet |
//! | Black | Reachable and fully visited, or exempt from this collection |
//!
//! A collection of generation `g` goes like this:
//! 1. Merge all younger generations into `g`. Every object in it gets `gc_refs = ref count` and turns `White`,
//! every object in an older (or the permanent) generation is forced `Black`.
//! 2. Trace every `White` object and decrement `gc_refs` of each `White` child. What is left over in
//! `gc_refs` are references from outside the candidate set.
//! 3. Objects with `gc_refs > 0` turn `Gray`, and reachability propagates from them. Traversal depth is bounded by
//! the mark queue limit: when it is hit the pass is aborted, leaving the node `Gray`, and a new pass over
//! the list starts, until one pass completes without aborting.
//! 4. `Black` objects are promoted to `g + 1`, `White` ones move to the unreachable list.
//! 5. Everything reachable from a `White` object with a legacy finalizer is marked again, turns `Black` with
//! [`GcFlags::FINALIZER_REACHABLE`] and ends up in the `garbage` list instead of being freed.
//! 6. Weak references to `White` objects are cleared, and the callbacks of those weak references which are
//! not garbage themselves are called.
//! 7. Finalizers run, at most once per object. They may resurrect objects, so the ref counts are checked again:
//! if anything is still referenced from outside, the whole unreachable set is revived.
//! 8. Otherwise each `White` object is cleared, which breaks the cycles and lets reference counting free them.

/// Check an internal invariant of the collector.
///
/// A failure means some `trace` or ref count bookkeeping is broken. Debug builds panic,
/// release builds log and let the caller fall back to a safe state.
macro_rules! gc_assert {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            if cfg!(debug_assertions) {
                panic!($($arg)+);
            } else {
                error!($($arg)+);
            }
        }
    };
}

mod collector;
mod config;
mod drop_object;
mod error;
mod gc_obj;
mod header;
mod list;
mod trace;
mod utils;
mod weakref;

use std::ptr::NonNull;

pub(crate) use collector::maintain_tracking;
pub use collector::{
    CallbackId, Collector, GcCallback, UnraisableHook, NUM_GENERATIONS, PERMANENT_GENERATION,
};
pub use config::{DebugFlags, GcConfig};
pub use error::{CallbackError, GcError, UnraisableError};
pub use gc_obj::{Gc, GcBox, GcObjectRef};
pub use header::{Color, GcFlags, GcHeader};
pub use trace::{AsAny, GcPayload, GcTrace, TracerFn, UntrackHint};
pub use utils::{CollectionInfo, CollectionPhase, GcResult, GenerationStats};
pub use weakref::{WeakCallback, WeakRef};

/// A type erased collectible object.
pub type GcObj = GcBox<dyn GcPayload>;
pub type GcObjRef<'a> = &'a GcObj;
pub(crate) type ObjPtr = NonNull<GcObj>;
