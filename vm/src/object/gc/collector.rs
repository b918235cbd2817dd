use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Instant;

use ahash::AHashSet;
use static_assertions::const_assert;

use super::config::{DebugFlags, GcConfig};
use super::error::{CallbackError, GcError, UnraisableError};
use super::gc_obj::{Gc, GcObjectRef};
use super::header::{Color, GcFlags};
use super::list::TrackingList;
use super::trace::UntrackHint;
use super::utils::{CollectionInfo, CollectionPhase, GcResult, GenerationStats};
use super::weakref::WeakRef;
use super::{GcObj, GcObjRef, ObjPtr};

pub const NUM_GENERATIONS: usize = 3;
/// generation tag of frozen objects
pub const PERMANENT_GENERATION: usize = NUM_GENERATIONS;
/// list head of the unreachable set during a collection
const UNREACHABLE: usize = NUM_GENERATIONS + 1;
const LIST_HEADS: usize = NUM_GENERATIONS + 2;

const_assert!(NUM_GENERATIONS >= 2);

/// A progress callback, called at the start and the end of every collection
pub type GcCallback = dyn Fn(CollectionPhase, &CollectionInfo) -> Result<(), CallbackError>;
pub type UnraisableHook = dyn Fn(&UnraisableError);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

#[derive(Debug, Clone, Copy)]
struct Generation {
    threshold: usize,
    count: usize,
}

/// depth bookkeeping of one mark pass
struct MarkQueue {
    depth: usize,
    limit: usize,
    aborted: bool,
}

/// resets the `collecting` flag even if a callback panics
struct CollectingGuard<'a>(&'a Cell<bool>);

impl<'a> CollectingGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Option<Self> {
        if flag.get() {
            return None;
        }
        flag.set(true);
        Some(Self(flag))
    }
}

impl Drop for CollectingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

pub(crate) struct GcState {
    list: RefCell<TrackingList<ObjPtr>>,
    generations: RefCell<[Generation; NUM_GENERATIONS]>,
    stats: RefCell<[GenerationStats; NUM_GENERATIONS]>,
    enabled: Cell<bool>,
    /// re-entrancy guard, a collection never starts while another one runs
    collecting: Cell<bool>,
    debug: Cell<DebugFlags>,
    mark_queue_limit: usize,
    /// survivors of generation `N-2` collections since the last full collection
    long_lived_pending: Cell<usize>,
    /// survivors of the last full collection
    long_lived_total: Cell<usize>,
    garbage: RefCell<Vec<GcObjectRef>>,
    callbacks: RefCell<Vec<(CallbackId, Rc<GcCallback>)>>,
    next_callback_id: Cell<u64>,
    unraisable_hook: RefCell<Option<Rc<UnraisableHook>>>,
}

/// hand an error nobody can catch to the hook of `state`, or log it once the collector is gone
pub(crate) fn report_unraisable(state: Option<&GcState>, context: String, source: CallbackError) {
    let err = UnraisableError { context, source };
    let hook = state.and_then(|state| state.unraisable_hook.borrow().clone());
    match hook {
        Some(hook) => hook(&err),
        None => error!("{}", err),
    }
}

impl GcState {
    fn new(config: GcConfig) -> Self {
        let generations = config.thresholds.map(|threshold| Generation {
            threshold,
            count: 0,
        });
        Self {
            list: RefCell::new(TrackingList::new(LIST_HEADS)),
            generations: RefCell::new(generations),
            stats: RefCell::new([GenerationStats::default(); NUM_GENERATIONS]),
            enabled: Cell::new(config.enabled),
            collecting: Cell::new(false),
            debug: Cell::new(config.debug),
            mark_queue_limit: config.mark_queue_limit.max(1),
            long_lived_pending: Cell::new(0),
            long_lived_total: Cell::new(0),
            garbage: RefCell::new(Vec::new()),
            callbacks: RefCell::new(Vec::new()),
            next_callback_id: Cell::new(0),
            unraisable_hook: RefCell::new(None),
        }
    }

    fn report_unraisable(&self, context: String, source: CallbackError) {
        report_unraisable(Some(self), context, source)
    }

    /// call `f` on every object of list `head`.
    ///
    /// The list is only borrowed between two calls, so `f` may move or untrack the object it
    /// is given, but must not free any other object of the list.
    fn for_each_in(&self, head: usize, mut f: impl FnMut(ObjPtr)) {
        let mut cursor = self.list.borrow().first(head);
        while let Some(slot) = cursor {
            let (obj, next) = {
                let list = self.list.borrow();
                (list.get(slot), list.next(slot))
            };
            cursor = next;
            if let Some(obj) = obj {
                f(obj);
            }
        }
    }

    fn list_len(&self, head: usize) -> usize {
        self.list.borrow().len(head)
    }

    pub(crate) fn track(&self, obj: GcObjRef) {
        gc_assert!(
            !obj.header.is_tracked(),
            "{:?} already tracked by the garbage collector",
            obj
        );
        if obj.header.is_tracked() {
            return;
        }
        let slot = self.list.borrow_mut().insert(0, obj.as_ptr());
        obj.header.set_slot(Some(slot));
        obj.header.set_generation(0);
        obj.header.set_color(Color::Black);
    }

    pub(crate) fn untrack(&self, obj: GcObjRef) {
        if let Some(slot) = obj.header.slot() {
            self.list.borrow_mut().remove(slot);
            obj.header.set_slot(None);
            obj.header.set_color(Color::Black);
            obj.header.remove_flags(GcFlags::COLLECTING);
        }
    }

    fn move_object(&self, obj: GcObjRef, head: usize) {
        if let Some(slot) = obj.header.slot() {
            self.list.borrow_mut().move_to(slot, head);
        }
    }

    /// allocation hook, runs before the new object exists
    pub(crate) fn on_alloc(&self) {
        let Generation { threshold, count } = {
            let mut generations = self.generations.borrow_mut();
            generations[0].count += 1;
            generations[0]
        };
        if count > threshold && threshold != 0 && self.enabled.get() {
            if let Some(_guard) = CollectingGuard::enter(&self.collecting) {
                if let Err(err) = self.collect_generations() {
                    warn!("gc: automatic collection failed: {}", err);
                }
            }
        }
    }

    /// deallocation hook, the object is already untracked and about to be freed
    pub(crate) fn on_dealloc(&self, obj: GcObjRef) {
        gc_assert!(!obj.header.is_tracked(), "{:?} freed while tracked", obj);
        self.untrack(obj);
        let mut generations = self.generations.borrow_mut();
        if generations[0].count > 0 {
            generations[0].count -= 1;
        }
    }

    /// collect the oldest generation whose count went over its threshold
    fn collect_generations(&self) -> Result<usize, GcError> {
        let generations = *self.generations.borrow();
        for (i, generation) in generations.iter().enumerate().rev() {
            if generation.count > generation.threshold {
                // avoid quadratic behaviour: only collect the oldest generation once
                // a quarter of the long lived objects are new since the last full collection
                if i == NUM_GENERATIONS - 1
                    && self.long_lived_pending.get() < self.long_lived_total.get() / 4
                {
                    continue;
                }
                let (result, error) = self.collect_with_callback(i);
                return match error {
                    Some(err) => Err(err),
                    None => Ok(result.into()),
                };
            }
        }
        Ok(0)
    }

    fn collect_with_callback(&self, generation: usize) -> (GcResult, Option<GcError>) {
        self.invoke_callbacks(
            CollectionPhase::Start,
            &CollectionInfo {
                generation,
                ..Default::default()
            },
        );
        let (result, error) = self.collect_main(generation);
        self.invoke_callbacks(
            CollectionPhase::Stop,
            &CollectionInfo {
                generation,
                collected: result.collected,
                uncollectable: result.uncollectable,
            },
        );
        (result, error)
    }

    fn invoke_callbacks(&self, phase: CollectionPhase, info: &CollectionInfo) {
        // callbacks may (un)register callbacks, run over a snapshot
        let callbacks: Vec<_> = self
            .callbacks
            .borrow()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in callbacks {
            if let Err(err) = callback(phase, info) {
                self.report_unraisable(format!("gc callback ({phase})"), err);
            }
        }
    }
}

// core of gc algorithm
impl GcState {
    /// the main function, read this to understand how garbage collection works.
    ///
    /// Errors from building auxiliary lists do not stop the collection, they are handed back
    /// for the caller to surface or drop.
    fn collect_main(&self, generation: usize) -> (GcResult, Option<GcError>) {
        let debug = self.debug.get();
        let start = Instant::now();
        if debug.contains(DebugFlags::STATS) {
            info!("gc: collecting generation {}...", generation);
            info!(
                "gc: objects in each generation: {:?}",
                (0..NUM_GENERATIONS)
                    .map(|i| self.list_len(i))
                    .collect::<Vec<_>>()
            );
            info!(
                "gc: objects in permanent generation: {}",
                self.list_len(PERMANENT_GENERATION)
            );
        }

        // allocations made by finalizers and callbacks from here on count towards the next collection
        {
            let mut generations = self.generations.borrow_mut();
            if generation + 1 < NUM_GENERATIONS {
                generations[generation + 1].count += 1;
            }
            for young in generations[..=generation].iter_mut() {
                young.count = 0;
            }
        }

        // merge younger generations with the one we are currently collecting
        {
            let mut list = self.list.borrow_mut();
            for young in 0..generation {
                list.merge(young, generation);
            }
        }
        let old = (generation + 1).min(NUM_GENERATIONS - 1);
        let full = generation == NUM_GENERATIONS - 1;

        self.update_refs(generation);
        self.subtract_refs(generation);
        self.mark_reachable(generation);

        let survivors = self.move_unreachable(generation, old, full);
        if generation == NUM_GENERATIONS - 2 {
            self.long_lived_pending
                .set(self.long_lived_pending.get() + survivors);
        } else if full {
            self.long_lived_pending.set(0);
            self.long_lived_total.set(survivors);
        }

        // everything reachable from a legacy finalizer is uncollectable
        self.move_legacy_finalizers();

        let mut collectable = 0;
        self.for_each_in(UNREACHABLE, |ptr| {
            let obj = unsafe { ptr.as_ref() };
            if obj.header.color() == Color::White {
                obj.header.insert_flags(GcFlags::GARBAGE);
                collectable += 1;
                if debug.contains(DebugFlags::COLLECTABLE) {
                    info!("gc: collectable {:?}", obj);
                }
            }
        });

        let error = self.handle_weakrefs().err();
        self.finalize_garbage();
        if self.check_garbage() {
            self.delete_garbage(debug);
        } else {
            self.revive_garbage();
        }

        let mut uncollectable = 0;
        self.for_each_in(UNREACHABLE, |ptr| {
            let obj = unsafe { ptr.as_ref() };
            if obj.header.flags().contains(GcFlags::FINALIZER_REACHABLE) {
                uncollectable += 1;
                if debug.contains(DebugFlags::UNCOLLECTABLE) {
                    info!("gc: uncollectable {:?}", obj);
                }
            }
        });
        if debug.contains(DebugFlags::STATS) {
            info!(
                "gc: done, {} unreachable, {} uncollectable, {:.4}s elapsed",
                collectable + uncollectable,
                uncollectable,
                start.elapsed().as_secs_f64()
            );
        }

        self.handle_legacy_finalizers(debug);
        self.finish_unreachable(old);

        {
            let mut stats = self.stats.borrow_mut();
            let stats = &mut stats[generation];
            stats.collections += 1;
            stats.collected += collectable;
            stats.uncollectable += uncollectable;
        }

        ((collectable, uncollectable).into(), error)
    }

    /// set `gc_refs` to the true ref count and color the candidates white,
    /// older generations are forced black
    fn update_refs(&self, generation: usize) {
        self.for_each_in(generation, |ptr| {
            let obj = unsafe { ptr.as_ref() };
            let rc = obj.header.rc();
            gc_assert!(rc != 0, "tracked object {:?} has a zero ref count", obj);
            obj.header.set_gc_refs(rc);
            obj.header.set_color(Color::White);
            obj.header.set_generation(generation);
            obj.header.reset_transient_flags();
            obj.header.insert_flags(GcFlags::COLLECTING);
        });
        for older in (generation + 1..NUM_GENERATIONS).chain([PERMANENT_GENERATION]) {
            self.for_each_in(older, |ptr| {
                unsafe { ptr.as_ref() }.header.set_color(Color::Black);
            });
        }
    }

    /// subtract the references coming from inside the white set
    fn subtract_refs(&self, head: usize) {
        self.for_each_in(head, |ptr| {
            let obj = unsafe { ptr.as_ref() };
            if obj.header.color() == Color::White {
                obj.value.trace(&mut |child: &GcObj| visit_decref(child));
            }
        });
    }

    fn mark_reachable(&self, head: usize) {
        self.for_each_in(head, |ptr| {
            let obj = unsafe { ptr.as_ref() };
            if obj.header.color() == Color::White && obj.header.gc_refs() > 0 {
                obj.header.set_color(Color::Gray);
                obj.header.set_gc_refs(1);
            }
        });
        self.propagate_reachable(head, false);
    }

    /// turn every gray object of `head` and everything it reaches black
    fn propagate_reachable(&self, head: usize, finalizers: bool) {
        let verbose = self.debug.get().contains(DebugFlags::VERBOSE);
        let mut passes = 0usize;
        loop {
            let mut queue = MarkQueue {
                depth: 0,
                limit: self.mark_queue_limit,
                aborted: false,
            };
            self.for_each_in(head, |ptr| {
                let obj = unsafe { ptr.as_ref() };
                if obj.header.color() == Color::Gray {
                    self.visit_reachable(obj, finalizers, &mut queue);
                }
            });
            passes += 1;
            if !queue.aborted {
                break;
            }
            if verbose {
                trace!(
                    "gc: mark queue went over {} objects, starting pass {}",
                    queue.limit,
                    passes + 1
                );
            }
        }

        // no gray object may survive a completed pass
        self.for_each_in(head, |ptr| {
            let obj = unsafe { ptr.as_ref() };
            gc_assert!(
                obj.header.color() != Color::Gray,
                "{:?} is still gray after marking",
                obj
            );
            if obj.header.color() == Color::Gray {
                obj.header.set_color(Color::Black);
            }
        });
    }

    fn visit_reachable(&self, obj: GcObjRef, finalizers: bool, queue: &mut MarkQueue) {
        let header = &obj.header;
        if !header.is_tracked() {
            return;
        }
        match header.color() {
            Color::Black => {}
            Color::White | Color::Gray => {
                if header.color() == Color::White {
                    header.set_color(Color::Gray);
                    header.set_gc_refs(1);
                }
                if queue.depth >= queue.limit {
                    // stays gray, the next pass picks it up
                    queue.aborted = true;
                    return;
                }
                header.set_color(Color::Black);
                if finalizers {
                    header.insert_flags(GcFlags::FINALIZER_REACHABLE);
                }
                header.set_gc_refs(1);
                queue.depth += 1;
                obj.value.trace(&mut |child: &GcObj| {
                    self.visit_reachable(child, finalizers, &mut *queue)
                });
                queue.depth -= 1;
            }
        }
    }

    /// promote black objects to `old`, move white ones to the unreachable list.
    /// Returns how many objects stayed tracked.
    fn move_unreachable(&self, young: usize, old: usize, full: bool) -> usize {
        let mut survivors = 0;
        self.for_each_in(young, |ptr| {
            let obj = unsafe { ptr.as_ref() };
            if obj.header.color() == Color::White {
                self.move_object(obj, UNREACHABLE);
                return;
            }
            if self.maybe_untrack(obj, full) {
                return;
            }
            obj.header.remove_flags(GcFlags::COLLECTING);
            survivors += 1;
            if old != young {
                self.move_object(obj, old);
                obj.header.set_generation(old);
            }
        });
        survivors
    }

    /// untrack containers that can not be part of a cycle until they are tracked again
    fn maybe_untrack(&self, obj: GcObjRef, full: bool) -> bool {
        let eligible = match obj.value.untrack_hint() {
            UntrackHint::Never => false,
            UntrackHint::Always => true,
            UntrackHint::FullCollection => full,
        };
        if !eligible {
            return false;
        }
        let mut may_be_tracked = false;
        obj.value.trace(&mut |child: &GcObj| {
            may_be_tracked |= child.header.is_tracked() || child.value.may_be_retracked();
        });
        if may_be_tracked {
            return false;
        }
        self.untrack(obj);
        true
    }

    fn move_legacy_finalizers(&self) {
        let mut seeded = false;
        self.for_each_in(UNREACHABLE, |ptr| {
            let obj = unsafe { ptr.as_ref() };
            if obj.header.color() == Color::White && obj.value.has_legacy_finalizer() {
                obj.header.set_color(Color::Gray);
                obj.header
                    .insert_flags(GcFlags::LEGACY_FINALIZER_REACHABLE);
                seeded = true;
            }
        });
        if seeded {
            self.propagate_reachable(UNREACHABLE, true);
        }
    }

    /// clear weak references to white objects first, then call the callbacks
    fn handle_weakrefs(&self) -> Result<(), GcError> {
        let mut result = Ok(());
        let mut to_call: Vec<Gc<WeakRef>> = Vec::new();
        self.for_each_in(UNREACHABLE, |ptr| {
            let obj = unsafe { ptr.as_ref() };
            if obj.header.color() != Color::White {
                return;
            }
            for wr in obj.header.take_weakrefs() {
                // SAFETY: a weak reference unlinks itself from its target before it is freed
                let weakref = unsafe { wr.as_ref() };
                weakref.value.clear_target();
                // a weak reference that is garbage itself must not observe the trash
                if !weakref.value.has_callback() || weakref.header.color() == Color::White {
                    continue;
                }
                if to_call.try_reserve(1).is_err() {
                    result = Err(GcError::AllocFailed {
                        what: "weakref callback",
                    });
                    continue;
                }
                to_call.push(unsafe { Gc::clone_from_raw(wr) });
            }
        });

        for wr in &to_call {
            if let Err(err) = WeakRef::invoke_callback(wr) {
                self.report_unraisable(format!("weakref callback of {wr:?}"), err);
            }
        }
        drop(to_call);
        result
    }

    /// run the finalizer of every white object, at most once per object
    fn finalize_garbage(&self) {
        let mut pending = Vec::new();
        self.for_each_in(UNREACHABLE, |ptr| {
            let obj = unsafe { ptr.as_ref() };
            if obj.header.color() == Color::White
                && obj.value.has_finalizer()
                && !obj.header.flags().contains(GcFlags::FINALIZED)
            {
                pending.push(obj.to_ref());
            }
        });
        for obj in pending {
            obj.header.insert_flags(GcFlags::FINALIZED);
            if let Err(err) = obj.value.finalize(&obj) {
                self.report_unraisable(format!("finalizer of {obj:?}"), err);
            }
        }
    }

    /// true if the white set is still unreachable after the finalizers ran
    fn check_garbage(&self) -> bool {
        self.for_each_in(UNREACHABLE, |ptr| {
            let obj = unsafe { ptr.as_ref() };
            if obj.header.color() == Color::White {
                let rc = obj.header.rc();
                gc_assert!(rc != 0, "garbage object {:?} has a zero ref count", obj);
                obj.header.set_gc_refs(rc);
            }
        });
        self.subtract_refs(UNREACHABLE);
        let mut resurrected = false;
        self.for_each_in(UNREACHABLE, |ptr| {
            let obj = unsafe { ptr.as_ref() };
            resurrected |= obj.header.color() == Color::White && obj.header.gc_refs() != 0;
        });
        !resurrected
    }

    /// a finalizer resurrected part of the white set, keep all of it for this time
    fn revive_garbage(&self) {
        let mut revived = 0;
        self.for_each_in(UNREACHABLE, |ptr| {
            let obj = unsafe { ptr.as_ref() };
            if obj.header.color() == Color::White {
                obj.header.set_color(Color::Black);
                obj.header.remove_flags(GcFlags::GARBAGE);
                obj.header.insert_flags(GcFlags::REACHABLE);
                revived += 1;
            }
        });
        debug!("gc: finalizers resurrected garbage, {} objects revived", revived);
    }

    /// break reference cycles by clearing the white objects
    fn delete_garbage(&self, debug: DebugFlags) {
        // clearing one object may free others, work on a snapshot
        let mut doomed = Vec::new();
        self.for_each_in(UNREACHABLE, |ptr| {
            let obj = unsafe { ptr.as_ref() };
            if obj.header.color() == Color::White {
                doomed.push(obj.to_ref());
            }
        });
        if debug.contains(DebugFlags::SAVEALL) {
            self.garbage.borrow_mut().extend(doomed);
            return;
        }
        for obj in doomed {
            obj.header.insert_flags(GcFlags::UNREACHABLE);
            // the snapshot holds one reference, the object may already be on its own
            if obj.rc() > 1 {
                obj.value.clear();
            }
        }
    }

    fn handle_legacy_finalizers(&self, debug: DebugFlags) {
        let mut found = Vec::new();
        self.for_each_in(UNREACHABLE, |ptr| {
            let obj = unsafe { ptr.as_ref() };
            if obj.header.flags().contains(GcFlags::FINALIZER_REACHABLE)
                && (debug.contains(DebugFlags::SAVEALL) || obj.value.has_legacy_finalizer())
            {
                found.push(obj.to_ref());
            }
        });
        if !found.is_empty() {
            self.garbage.borrow_mut().extend(found);
        }
    }

    /// whatever is left of the unreachable set survives, move it to the old generation
    fn finish_unreachable(&self, old: usize) {
        self.for_each_in(UNREACHABLE, |ptr| {
            let header = &unsafe { ptr.as_ref() }.header;
            header.set_color(Color::Black);
            header.remove_flags(GcFlags::COLLECTING | GcFlags::GARBAGE);
            header.set_generation(old);
        });
        self.list.borrow_mut().merge(UNREACHABLE, old);
    }
}

/// track an untracked container again once it stores a tracked object
pub(crate) fn maintain_tracking(container: GcObjRef, child: GcObjRef) {
    if container.header.is_tracked() || !child.header.is_tracked() {
        return;
    }
    if let Some(state) = container.header.gc.upgrade() {
        state.track(container);
    }
}

fn visit_decref(child: GcObjRef) {
    let header = &child.header;
    if header.is_tracked() && header.color() == Color::White {
        let refs = header.gc_refs();
        gc_assert!(refs > 0, "gc_refs of {:?} would go negative", child);
        header.set_gc_refs(refs.saturating_sub(1));
    }
}

/// The cycle collector. Cloning gives another handle to the same collector.
#[derive(Clone)]
pub struct Collector {
    state: Rc<GcState>,
}

impl Default for Collector {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Collector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collector")
            .field("enabled", &self.is_enabled())
            .field("collecting", &self.state.collecting.get())
            .field("debug", &self.get_debug())
            .field("threshold", &self.get_threshold())
            .field("count", &self.get_count())
            .field(
                "garbage",
                &format!("[{} objects]", self.state.garbage.borrow().len()),
            )
            .finish()
    }
}

impl Collector {
    pub fn new() -> Self {
        Self::with_config(GcConfig::default())
    }

    pub fn with_config(config: GcConfig) -> Self {
        Self {
            state: Rc::new(GcState::new(config)),
        }
    }

    pub(crate) fn state(&self) -> &GcState {
        &self.state
    }

    pub(crate) fn downgrade(&self) -> Weak<GcState> {
        Rc::downgrade(&self.state)
    }

    fn owns(&self, obj: GcObjRef) -> bool {
        obj.header.gc.as_ptr() == Rc::as_ptr(&self.state)
    }

    /// Run a collection of `generation` (and every younger one).
    ///
    /// Returns the number of unreachable objects found, collected or not. A collection that would
    /// start while another one runs does nothing and returns `Ok(0)`.
    pub fn collect(&self, generation: usize) -> Result<usize, GcError> {
        if generation >= NUM_GENERATIONS {
            return Err(GcError::InvalidGeneration(generation));
        }
        let Some(_guard) = CollectingGuard::enter(&self.state.collecting) else {
            return Ok(0);
        };
        let (result, error) = self.state.collect_with_callback(generation);
        match error {
            Some(err) => Err(err),
            None => Ok(result.into()),
        }
    }

    /// full collection without progress callbacks, errors are dropped
    fn collect_no_fail(&self) -> usize {
        let Some(_guard) = CollectingGuard::enter(&self.state.collecting) else {
            return 0;
        };
        let (result, error) = self.state.collect_main(NUM_GENERATIONS - 1);
        if let Some(err) = error {
            debug!("gc: ignoring error during shutdown collection: {}", err);
        }
        result.into()
    }

    pub fn enable(&self) {
        self.state.enabled.set(true);
    }

    pub fn disable(&self) {
        self.state.enabled.set(false);
    }

    pub fn is_enabled(&self) -> bool {
        self.state.enabled.get()
    }

    pub fn is_collecting(&self) -> bool {
        self.state.collecting.get()
    }

    pub fn get_debug(&self) -> DebugFlags {
        self.state.debug.get()
    }

    pub fn set_debug(&self, flags: DebugFlags) {
        self.state.debug.set(flags);
    }

    /// Set the thresholds of the first `thresholds.len()` generations, the others keep theirs.
    pub fn set_threshold(&self, thresholds: &[usize]) -> Result<(), GcError> {
        if thresholds.is_empty() || thresholds.len() > NUM_GENERATIONS {
            return Err(GcError::InvalidThresholdCount(thresholds.len()));
        }
        let mut generations = self.state.generations.borrow_mut();
        for (generation, &threshold) in generations.iter_mut().zip(thresholds) {
            generation.threshold = threshold;
        }
        Ok(())
    }

    pub fn get_threshold(&self) -> (usize, usize, usize) {
        let generations = self.state.generations.borrow();
        (
            generations[0].threshold,
            generations[1].threshold,
            generations[2].threshold,
        )
    }

    pub fn get_count(&self) -> (usize, usize, usize) {
        let generations = self.state.generations.borrow();
        (
            generations[0].count,
            generations[1].count,
            generations[2].count,
        )
    }

    pub fn get_stats(&self) -> [GenerationStats; NUM_GENERATIONS] {
        *self.state.stats.borrow()
    }

    /// Tracked objects of one generation, or of all of them. Frozen objects are not listed.
    pub fn get_objects(&self, generation: Option<usize>) -> Result<Vec<GcObjectRef>, GcError> {
        let heads = match generation {
            Some(generation) if generation >= NUM_GENERATIONS => {
                return Err(GcError::InvalidGeneration(generation))
            }
            Some(generation) => generation..generation + 1,
            None => 0..NUM_GENERATIONS,
        };
        let mut objects = Vec::new();
        for head in heads {
            self.state.for_each_in(head, |ptr| {
                objects.push(unsafe { ptr.as_ref() }.to_ref());
            });
        }
        Ok(objects)
    }

    pub fn is_tracked(&self, obj: GcObjRef) -> bool {
        obj.header.is_tracked()
    }

    /// The generation `obj` lives in, `None` if it is not tracked
    pub fn generation_of(&self, obj: GcObjRef) -> Option<usize> {
        obj.header.is_tracked().then(|| obj.header.generation())
    }

    /// Track an object created with [`Gc::new_untracked`] or untracked before.
    pub fn track(&self, obj: GcObjRef) {
        gc_assert!(self.owns(obj), "{:?} belongs to another collector", obj);
        if self.owns(obj) {
            self.state.track(obj);
        }
    }

    pub fn untrack(&self, obj: GcObjRef) {
        if self.owns(obj) {
            self.state.untrack(obj);
        }
    }

    /// Tracked objects that directly refer to any of `targets`
    pub fn get_referrers(&self, targets: &[GcObjRef]) -> Vec<GcObjectRef> {
        let wanted: AHashSet<*const ()> = targets.iter().map(|obj| obj.thin_ptr()).collect();
        let mut referrers = Vec::new();
        for head in 0..NUM_GENERATIONS {
            self.state.for_each_in(head, |ptr| {
                let obj = unsafe { ptr.as_ref() };
                let mut found = false;
                obj.value.trace(&mut |child: &GcObj| {
                    found |= wanted.contains(&child.thin_ptr());
                });
                if found {
                    referrers.push(obj.to_ref());
                }
            });
        }
        referrers
    }

    /// Objects directly referred to by any of `objs`
    pub fn get_referents(&self, objs: &[GcObjRef]) -> Vec<GcObjectRef> {
        let mut referents = Vec::new();
        for obj in objs {
            obj.value
                .trace(&mut |child: &GcObj| referents.push(child.to_ref()));
        }
        referents
    }

    /// Move every tracked object to the permanent generation, which is never collected.
    pub fn freeze(&self) {
        {
            let mut list = self.state.list.borrow_mut();
            for head in 0..NUM_GENERATIONS {
                list.merge(head, PERMANENT_GENERATION);
            }
        }
        self.state.for_each_in(PERMANENT_GENERATION, |ptr| {
            unsafe { ptr.as_ref() }
                .header
                .set_generation(PERMANENT_GENERATION);
        });
        for generation in self.state.generations.borrow_mut().iter_mut() {
            generation.count = 0;
        }
    }

    /// Move the permanent generation back into the oldest one.
    pub fn unfreeze(&self) {
        let oldest = NUM_GENERATIONS - 1;
        self.state.for_each_in(PERMANENT_GENERATION, |ptr| {
            unsafe { ptr.as_ref() }.header.set_generation(oldest);
        });
        self.state
            .list
            .borrow_mut()
            .merge(PERMANENT_GENERATION, oldest);
    }

    pub fn get_freeze_count(&self) -> usize {
        self.state.list_len(PERMANENT_GENERATION)
    }

    pub fn register_callback(
        &self,
        callback: impl Fn(CollectionPhase, &CollectionInfo) -> Result<(), CallbackError> + 'static,
    ) -> CallbackId {
        let id = CallbackId(self.state.next_callback_id.get());
        self.state.next_callback_id.set(id.0 + 1);
        let callback: Rc<GcCallback> = Rc::new(callback);
        self.state.callbacks.borrow_mut().push((id, callback));
        id
    }

    pub fn unregister_callback(&self, id: CallbackId) -> bool {
        let removed = {
            let mut callbacks = self.state.callbacks.borrow_mut();
            callbacks
                .iter()
                .position(|(cid, _)| *cid == id)
                .map(|i| callbacks.remove(i))
        };
        removed.is_some()
    }

    pub fn callback_count(&self) -> usize {
        self.state.callbacks.borrow().len()
    }

    /// Replace the hook that receives errors from finalizers and callbacks. `None` restores logging.
    pub fn set_unraisable_hook(&self, hook: Option<Box<UnraisableHook>>) {
        let hook: Option<Rc<UnraisableHook>> = hook.map(Rc::from);
        let old = self.state.unraisable_hook.replace(hook);
        drop(old);
    }

    /// A snapshot of the uncollectable objects found so far
    pub fn garbage(&self) -> Vec<GcObjectRef> {
        self.state.garbage.borrow().clone()
    }

    /// Empty the garbage list, returns how many objects it held
    pub fn clear_garbage(&self) -> usize {
        let garbage = self.state.garbage.take();
        garbage.len()
    }

    /// Final full collection, then release the garbage list and the callbacks.
    ///
    /// Returns the number of unreachable objects the last collection found.
    pub fn shutdown(&self) -> usize {
        let found = self.collect_no_fail();
        let garbage = self.state.garbage.take();
        if !garbage.is_empty() {
            if self.get_debug().contains(DebugFlags::UNCOLLECTABLE) {
                warn!("gc: {} uncollectable objects at shutdown", garbage.len());
                for obj in &garbage {
                    info!("gc: uncollectable {:?}", obj);
                }
            } else {
                warn!(
                    "gc: {} uncollectable objects at shutdown; use gc.set_debug(gc.DEBUG_UNCOLLECTABLE) to list them",
                    garbage.len()
                );
            }
        }
        drop(garbage);
        let callbacks = self.state.callbacks.take();
        drop(callbacks);
        found
    }
}
