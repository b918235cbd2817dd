use std::cell::RefCell;

use crate::object::gc::{
    Collector, Gc, GcObjectRef, GcPayload, GcTrace, TracerFn, UntrackHint,
};

/// A fixed size sequence. Only the collector's `clear` ever changes its items.
#[derive(Debug)]
pub struct PyTuple {
    items: RefCell<Vec<GcObjectRef>>,
}

impl PyTuple {
    pub fn new_ref(collector: &Collector, items: Vec<GcObjectRef>) -> Gc<Self> {
        Gc::new(
            collector,
            Self {
                items: RefCell::new(items),
            },
        )
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<GcObjectRef> {
        self.items.borrow().get(index).cloned()
    }

    pub fn to_vec(&self) -> Vec<GcObjectRef> {
        self.items.borrow().clone()
    }
}

unsafe impl GcTrace for PyTuple {
    fn trace(&self, tracer_fn: &mut TracerFn) {
        self.items.trace(tracer_fn);
    }
}

impl GcPayload for PyTuple {
    fn clear(&self) {
        let items = self.items.take();
        drop(items);
    }

    fn untrack_hint(&self) -> UntrackHint {
        UntrackHint::Always
    }

    fn type_name(&self) -> &'static str {
        "tuple"
    }
}
