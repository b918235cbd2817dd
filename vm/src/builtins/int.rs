use crate::object::gc::{Collector, Gc, GcPayload, GcTrace, TracerFn};

/// An immutable leaf, it holds no references and is never tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PyInt(i64);

impl PyInt {
    pub fn new_ref(collector: &Collector, value: i64) -> Gc<Self> {
        Gc::new_untracked(collector, Self(value))
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

unsafe impl GcTrace for PyInt {
    fn trace(&self, _tracer_fn: &mut TracerFn) {}
}

impl GcPayload for PyInt {
    fn type_name(&self) -> &'static str {
        "int"
    }
}
