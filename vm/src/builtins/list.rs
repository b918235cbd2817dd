use std::cell::RefCell;

use crate::object::gc::{Collector, Gc, GcObjectRef, GcPayload, GcTrace, TracerFn};

/// A mutable sequence, always tracked.
#[derive(Debug)]
pub struct PyList {
    items: RefCell<Vec<GcObjectRef>>,
}

impl PyList {
    pub fn new_ref(collector: &Collector, items: Vec<GcObjectRef>) -> Gc<Self> {
        Gc::new(
            collector,
            Self {
                items: RefCell::new(items),
            },
        )
    }

    pub fn append(&self, item: GcObjectRef) {
        self.items.borrow_mut().push(item);
    }

    pub fn pop(&self) -> Option<GcObjectRef> {
        // bind first, the popped item may be freed only after the borrow ends
        let item = self.items.borrow_mut().pop();
        item
    }

    pub fn get(&self, index: usize) -> Option<GcObjectRef> {
        self.items.borrow().get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_vec(&self) -> Vec<GcObjectRef> {
        self.items.borrow().clone()
    }
}

unsafe impl GcTrace for PyList {
    fn trace(&self, tracer_fn: &mut TracerFn) {
        self.items.trace(tracer_fn);
    }
}

impl GcPayload for PyList {
    fn clear(&self) {
        // dropping the items can run arbitrary code, never while borrowed
        let items = self.items.take();
        drop(items);
    }

    fn type_name(&self) -> &'static str {
        "list"
    }
}
