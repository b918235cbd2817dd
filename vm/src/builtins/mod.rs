//! Host container types built on the collector.
//!
//! These are the shapes the collector has special knowledge of: leaves that are never
//! tracked, tuples that can be untracked at any collection, and dicts that can be
//! untracked at full collections.

pub(crate) mod dict;
pub(crate) mod int;
pub(crate) mod list;
pub(crate) mod tuple;

pub use dict::PyDict;
pub use int::PyInt;
pub use list::PyList;
pub use tuple::PyTuple;
