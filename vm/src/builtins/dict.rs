use std::cell::RefCell;

use indexmap::IndexMap;

use crate::object::gc::{
    maintain_tracking, Collector, Gc, GcObjectRef, GcPayload, GcTrace, TracerFn, UntrackHint,
};

type DictContent = IndexMap<String, GcObjectRef, ahash::RandomState>;

/// An insertion ordered mapping with string keys.
///
/// A dict that only holds untracked values is untracked by full collections, and
/// tracked again as soon as a tracked value is stored.
#[derive(Debug)]
pub struct PyDict {
    entries: RefCell<DictContent>,
}

impl PyDict {
    pub fn new_ref(collector: &Collector) -> Gc<Self> {
        Gc::new(
            collector,
            Self {
                entries: RefCell::new(IndexMap::with_hasher(ahash::RandomState::new())),
            },
        )
    }

    /// Insert `value` under `key`, returns the value it replaced.
    pub fn set_item(
        zelf: &Gc<Self>,
        key: impl Into<String>,
        value: GcObjectRef,
    ) -> Option<GcObjectRef> {
        maintain_tracking(zelf.as_object(), value.as_object());
        let old = zelf.entries.borrow_mut().insert(key.into(), value);
        old
    }

    pub fn get_item(&self, key: &str) -> Option<GcObjectRef> {
        self.entries.borrow().get(key).cloned()
    }

    pub fn del_item(&self, key: &str) -> Option<GcObjectRef> {
        let old = self.entries.borrow_mut().shift_remove(key);
        old
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.borrow().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }
}

unsafe impl GcTrace for PyDict {
    fn trace(&self, tracer_fn: &mut TracerFn) {
        self.entries.trace(tracer_fn);
    }
}

impl GcPayload for PyDict {
    fn clear(&self) {
        let entries = std::mem::take(&mut *self.entries.borrow_mut());
        drop(entries);
    }

    fn untrack_hint(&self) -> UntrackHint {
        UntrackHint::FullCollection
    }

    fn type_name(&self) -> &'static str {
        "dict"
    }
}
