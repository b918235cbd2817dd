//! A generational, tricolor cycle collector for reference counted object graphs.
//!
//! ```
//! use rustpython_gc::vm::builtins::PyList;
//! use rustpython_gc::Collector;
//!
//! let gc = Collector::new();
//! let l = PyList::new_ref(&gc, vec![]);
//! l.append(l.to_object());
//! drop(l);
//! assert_eq!(gc.collect(2), Ok(1));
//! ```

pub use rustpython_gc_stdlib as stdlib;
pub use rustpython_gc_vm as vm;

pub use vm::object::gc::{
    Collector, DebugFlags, Gc, GcConfig, GcError, GcObj, GcObjectRef, GcPayload, GcTrace,
    TracerFn, WeakRef,
};
