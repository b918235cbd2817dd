#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rustpython_gc::vm::object::gc::{CallbackError, GcTrace, TracerFn};
use rustpython_gc::{Collector, Gc, GcObjectRef, GcPayload};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub type Finalizer = Box<dyn Fn(&GcObjectRef) -> Result<(), CallbackError>>;

/// A container with outgoing edges and optional finalizers.
#[derive(Default)]
pub struct Node {
    pub name: &'static str,
    pub edges: RefCell<Vec<GcObjectRef>>,
    pub legacy: bool,
    pub finalizer: Option<Finalizer>,
    pub drops: DropCounter,
}

/// counts payload drops
#[derive(Default)]
pub struct DropCounter(Option<Rc<Cell<usize>>>);

impl DropCounter {
    pub fn new(drops: &Rc<Cell<usize>>) -> Self {
        Self(Some(drops.clone()))
    }
}

impl Drop for DropCounter {
    fn drop(&mut self) {
        if let Some(drops) = &self.0 {
            drops.set(drops.get() + 1);
        }
    }
}

impl Node {
    pub fn new(gc: &Collector, name: &'static str) -> Gc<Node> {
        Gc::new(
            gc,
            Node {
                name,
                ..Default::default()
            },
        )
    }

    pub fn counted(gc: &Collector, name: &'static str, drops: &Rc<Cell<usize>>) -> Gc<Node> {
        Gc::new(
            gc,
            Node {
                name,
                drops: DropCounter::new(drops),
                ..Default::default()
            },
        )
    }

    pub fn link(&self, to: &Gc<Node>) {
        self.edges.borrow_mut().push(to.to_object());
    }
}

unsafe impl GcTrace for Node {
    fn trace(&self, tracer_fn: &mut TracerFn) {
        self.edges.trace(tracer_fn);
    }
}

impl GcPayload for Node {
    fn clear(&self) {
        let edges = self.edges.take();
        drop(edges);
    }

    fn has_finalizer(&self) -> bool {
        self.finalizer.is_some()
    }

    fn finalize(&self, zelf: &GcObjectRef) -> Result<(), CallbackError> {
        match &self.finalizer {
            Some(finalizer) => finalizer(zelf),
            None => Ok(()),
        }
    }

    fn has_legacy_finalizer(&self) -> bool {
        self.legacy
    }

    fn type_name(&self) -> &'static str {
        "Node"
    }
}

/// a ring `n0 -> n1 -> ... -> n0` that nothing outside refers to
pub fn make_ring(gc: &Collector, len: usize, drops: &Rc<Cell<usize>>) {
    let first = Node::counted(gc, "ring", drops);
    let mut last = first.clone();
    for _ in 1..len {
        let node = Node::counted(gc, "ring", drops);
        last.link(&node);
        last = node;
    }
    last.link(&first);
}
