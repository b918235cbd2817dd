mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use common::{init_logger, DropCounter, Node};
use rustpython_gc::vm::builtins::PyList;
use rustpython_gc::vm::object::gc::{CallbackError, UnraisableError};
use rustpython_gc::{Collector, DebugFlags, Gc, GcObjectRef, WeakRef};

fn legacy_node(gc: &Collector, name: &'static str, drops: &Rc<Cell<usize>>) -> Gc<Node> {
    Gc::new(
        gc,
        Node {
            name,
            legacy: true,
            drops: DropCounter::new(drops),
            ..Default::default()
        },
    )
}

fn counting_weakref(gc: &Collector, target: &Gc<Node>, calls: &Rc<Cell<usize>>) -> Gc<WeakRef> {
    let calls = calls.clone();
    WeakRef::new(
        gc,
        target.as_object(),
        Some(Box::new(
            move |wr: &Gc<WeakRef>| -> Result<(), CallbackError> {
                assert!(wr.upgrade().is_none());
                calls.set(calls.get() + 1);
                Ok(())
            },
        )),
    )
}

fn capture_unraisable(gc: &Collector) -> Rc<RefCell<Vec<String>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    gc.set_unraisable_hook(Some(Box::new(move |err: &UnraisableError| {
        sink.borrow_mut().push(err.to_string());
    })));
    seen
}

#[test]
fn legacy_finalizer_cycle_is_uncollectable() {
    init_logger();
    let gc = Collector::new();
    let drops = Rc::new(Cell::new(0));
    let a = legacy_node(&gc, "a", &drops);
    let b = Node::counted(&gc, "b", &drops);
    a.link(&b);
    b.link(&a);
    drop((a, b));

    assert_eq!(gc.collect(2), Ok(2));
    assert_eq!(drops.get(), 0);
    let stats = gc.get_stats();
    assert_eq!(stats[2].collected, 0);
    assert_eq!(stats[2].uncollectable, 2);

    let garbage = gc.garbage();
    assert_eq!(garbage.len(), 1);
    assert_eq!(garbage[0].downcast_ref::<Node>().map(|n| n.name), Some("a"));
    drop(garbage);

    // still held by the garbage list
    assert_eq!(gc.collect(2), Ok(0));
    assert_eq!(gc.get_objects(None).unwrap().len(), 2);
    assert_eq!(gc.clear_garbage(), 1);
    assert_eq!(gc.collect(2), Ok(2));
    assert_eq!(gc.garbage().len(), 1);
}

#[test]
fn objects_hanging_off_legacy_cycles_are_kept() {
    let gc = Collector::new();
    let drops = Rc::new(Cell::new(0));
    let a = legacy_node(&gc, "a", &drops);
    let tail = Node::counted(&gc, "tail", &drops);
    let other = Node::counted(&gc, "other", &drops);
    a.link(&a);
    a.link(&tail);
    other.link(&other);
    drop((a, tail, other));

    assert_eq!(gc.collect(2), Ok(3));
    // only `other` was freed, `tail` is reachable from the legacy finalizer
    assert_eq!(drops.get(), 1);
    assert_eq!(gc.get_stats()[2].collected, 1);
    assert_eq!(gc.get_stats()[2].uncollectable, 2);
    assert_eq!(gc.garbage().len(), 1);
}

#[test]
fn saveall_keeps_everything() {
    let gc = Collector::new();
    gc.set_debug(DebugFlags::SAVEALL);
    let drops = Rc::new(Cell::new(0));
    let a = Node::counted(&gc, "a", &drops);
    let b = Node::counted(&gc, "b", &drops);
    a.link(&b);
    b.link(&a);
    drop((a, b));

    assert_eq!(gc.collect(2), Ok(2));
    assert_eq!(drops.get(), 0);
    assert_eq!(gc.garbage().len(), 2);

    gc.set_debug(DebugFlags::empty());
    assert_eq!(gc.clear_garbage(), 2);
    assert_eq!(gc.collect(2), Ok(2));
    assert_eq!(drops.get(), 2);
}

#[test]
fn weakref_callback_runs_once() {
    let gc = Collector::new();
    let calls = Rc::new(Cell::new(0));
    let a = Node::new(&gc, "a");
    let b = Node::new(&gc, "b");
    a.link(&b);
    b.link(&a);
    let wr = counting_weakref(&gc, &a, &calls);
    assert!(wr.is_alive());
    assert_eq!(a.header().weak_count(), 1);
    drop((a, b));

    assert_eq!(gc.collect(2), Ok(2));
    assert_eq!(calls.get(), 1);
    assert!(!wr.is_alive());
    assert!(wr.upgrade().is_none());
    assert_eq!(gc.collect(2), Ok(0));
    assert_eq!(calls.get(), 1);
}

#[test]
fn weakref_in_the_garbage_gets_no_callback() {
    let gc = Collector::new();
    let calls = Rc::new(Cell::new(0));
    let a = Node::new(&gc, "a");
    let b = Node::new(&gc, "b");
    a.link(&b);
    b.link(&a);
    let wr = counting_weakref(&gc, &a, &calls);
    b.edges.borrow_mut().push(wr.to_object());
    drop((a, b, wr));

    assert_eq!(gc.collect(2), Ok(3));
    assert_eq!(calls.get(), 0);
    assert!(gc.get_objects(None).unwrap().is_empty());
}

#[test]
fn weakref_callback_on_refcount_death() {
    let gc = Collector::new();
    let calls = Rc::new(Cell::new(0));
    let a = Node::new(&gc, "a");
    let wr = counting_weakref(&gc, &a, &calls);
    assert!(wr.upgrade().map_or(false, |obj| obj.is(a.as_object())));
    drop(a);
    assert_eq!(calls.get(), 1);
    assert!(!wr.is_alive());
}

#[test]
fn dead_weakref_detaches_from_target() {
    let gc = Collector::new();
    let calls = Rc::new(Cell::new(0));
    let a = Node::new(&gc, "a");
    let wr = counting_weakref(&gc, &a, &calls);
    drop(wr);
    assert_eq!(a.header().weak_count(), 0);
    drop(a);
    assert_eq!(calls.get(), 0);
}

#[test]
fn finalizer_resurrects_the_cycle() {
    init_logger();
    let gc = Collector::new();
    let drops = Rc::new(Cell::new(0));
    let calls = Rc::new(Cell::new(0));
    let stash: Rc<RefCell<Option<GcObjectRef>>> = Rc::default();

    let finalizer = {
        let calls = calls.clone();
        let stash = stash.clone();
        move |zelf: &GcObjectRef| -> Result<(), CallbackError> {
            calls.set(calls.get() + 1);
            stash.borrow_mut().replace(zelf.clone());
            Ok(())
        }
    };
    let a = Gc::new(
        &gc,
        Node {
            name: "a",
            finalizer: Some(Box::new(finalizer)),
            drops: DropCounter::new(&drops),
            ..Default::default()
        },
    );
    let b = Node::counted(&gc, "b", &drops);
    a.link(&b);
    b.link(&a);
    drop((a, b));

    // everything found unreachable is still counted
    assert_eq!(gc.collect(2), Ok(2));
    assert_eq!(calls.get(), 1);
    assert_eq!(drops.get(), 0);
    assert_eq!(gc.get_objects(None).unwrap().len(), 2);

    let resurrected = stash.borrow_mut().take();
    assert!(resurrected.is_some());
    drop(resurrected);
    assert_eq!(gc.collect(2), Ok(2));
    // the finalizer does not run twice
    assert_eq!(calls.get(), 1);
    assert_eq!(drops.get(), 2);
}

#[test]
fn finalizer_on_refcount_death() {
    let gc = Collector::new();
    let drops = Rc::new(Cell::new(0));
    let calls = Rc::new(Cell::new(0));
    let stash: Rc<RefCell<Option<GcObjectRef>>> = Rc::default();
    let finalizer = {
        let calls = calls.clone();
        let stash = stash.clone();
        move |zelf: &GcObjectRef| -> Result<(), CallbackError> {
            calls.set(calls.get() + 1);
            stash.borrow_mut().replace(zelf.clone());
            Ok(())
        }
    };
    let a = Gc::new(
        &gc,
        Node {
            name: "a",
            finalizer: Some(Box::new(finalizer)),
            drops: DropCounter::new(&drops),
            ..Default::default()
        },
    );
    drop(a);
    assert_eq!(calls.get(), 1);
    assert_eq!(drops.get(), 0);

    let a = stash.borrow_mut().take();
    drop(a);
    assert_eq!(calls.get(), 1);
    assert_eq!(drops.get(), 1);
}

#[test]
fn finalizer_errors_go_to_the_hook() {
    let gc = Collector::new();
    let seen = capture_unraisable(&gc);
    let a = Gc::new(
        &gc,
        Node {
            name: "a",
            finalizer: Some(Box::new(|_: &GcObjectRef| -> Result<(), CallbackError> {
                Err("boom".into())
            })),
            ..Default::default()
        },
    );
    a.link(&a);
    drop(a);

    assert_eq!(gc.collect(2), Ok(1));
    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].starts_with("exception ignored in finalizer of <Node object at"));
    assert!(seen[0].ends_with(": boom"));
}

#[test]
fn weakref_callback_errors_go_to_the_hook() {
    let gc = Collector::new();
    let seen = capture_unraisable(&gc);
    let a = Node::new(&gc, "a");
    let wr = WeakRef::new(
        &gc,
        a.as_object(),
        Some(Box::new(|_: &Gc<WeakRef>| -> Result<(), CallbackError> {
            Err("bad callback".into())
        })),
    );
    drop(a);
    assert_eq!(seen.borrow().len(), 1);
    assert!(seen.borrow()[0].contains("weakref callback of <weakref object at"));

    gc.set_unraisable_hook(None);
    drop(wr);
}

#[test]
fn weakref_callback_may_trigger_a_collection() {
    let gc = Collector::new();
    let made: Rc<RefCell<Vec<Gc<PyList>>>> = Rc::default();
    let target = PyList::new_ref(&gc, vec![]);
    let callback = {
        let gc = gc.clone();
        let made = made.clone();
        move |_: &Gc<WeakRef>| -> Result<(), CallbackError> {
            for _ in 0..3 {
                made.borrow_mut().push(PyList::new_ref(&gc, vec![]));
            }
            Ok(())
        }
    };
    let wr = WeakRef::new(&gc, target.as_object(), Some(Box::new(callback)));
    gc.set_threshold(&[1]).unwrap();
    let before = gc.get_stats()[0].collections;

    // the dying list is no longer tracked when the callback allocates
    drop(target);
    assert!(gc.get_stats()[0].collections > before);
    assert_eq!(made.borrow().len(), 3);
    assert!(!wr.is_alive());
    assert_eq!(gc.get_objects(None).unwrap().len(), 4);
}

#[test]
fn allocations_by_finalizers_count_towards_the_next_collection() {
    let gc = Collector::new();
    let made: Rc<RefCell<Vec<Gc<Node>>>> = Rc::default();
    let stash: Rc<RefCell<Option<GcObjectRef>>> = Rc::default();
    let finalizer = {
        let gc = gc.clone();
        let made = made.clone();
        let stash = stash.clone();
        move |zelf: &GcObjectRef| -> Result<(), CallbackError> {
            made.borrow_mut().push(Node::new(&gc, "late"));
            stash.borrow_mut().replace(zelf.clone());
            Ok(())
        }
    };
    let a = Gc::new(
        &gc,
        Node {
            name: "a",
            finalizer: Some(Box::new(finalizer)),
            ..Default::default()
        },
    );
    a.link(&a);
    drop(a);

    assert_eq!(gc.collect(2), Ok(1));
    assert_eq!(made.borrow().len(), 1);
    assert_eq!(gc.get_count(), (1, 0, 0));

    let resurrected = stash.borrow_mut().take();
    drop(resurrected);
    assert_eq!(gc.collect(2), Ok(1));
    assert_eq!(made.borrow().len(), 1);
}
