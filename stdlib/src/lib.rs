//! Script facing modules of the RustPython cycle collector.

#[macro_use]
extern crate log;

pub mod gc;
