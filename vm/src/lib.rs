//! The core of RustPython's cycle collector.
//!
//! Plain reference counting frees acyclic data as soon as its last reference
//! goes away. The collector in [`object::gc`] finds what reference counting
//! cannot: groups of objects that only keep each other alive.

#[macro_use]
extern crate log;

pub mod builtins;
pub mod object;

pub use object::gc::{
    Collector, Gc, GcConfig, GcError, GcObj, GcObjRef, GcObjectRef, GcPayload, GcTrace,
    TracerFn,
};
