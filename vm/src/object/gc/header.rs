use std::cell::{Cell, RefCell};
use std::fmt;
use std::ptr::NonNull;
use std::rc::Weak;

use bitflags::bitflags;
use static_assertions::assert_eq_size;

use super::collector::GcState;
use super::gc_obj::GcBox;
use super::list::SlotId;
use super::weakref::WeakRef;

pub(crate) type WeakRefPtr = NonNull<GcBox<WeakRef>>;

bitflags! {
    /// Per object collector flags. Bit values follow the ones of the interpreter's object header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct GcFlags: u8 {
        /// Reachable from an object with a legacy finalizer, so it is uncollectable
        const FINALIZER_REACHABLE = 1 << 1;
        /// Has a legacy finalizer that kept the objects it reaches out of disposal
        const LEGACY_FINALIZER_REACHABLE = 1 << 2;
        /// Counted as collectable by the last collection
        const GARBAGE = 1 << 3;
        /// Part of the generations being collected right now
        const COLLECTING = 1 << 4;
        /// The finalizer already ran
        const FINALIZED = 1 << 5;
        /// Cleared by the collector
        const UNREACHABLE = 1 << 6;
        /// Revived because a finalizer resurrected its cycle
        const REACHABLE = 1 << 7;
    }
}

/// Flags reset at the start of every collection that includes the object.
const TRANSIENT_FLAGS: GcFlags = GcFlags::FINALIZER_REACHABLE
    .union(GcFlags::LEGACY_FINALIZER_REACHABLE)
    .union(GcFlags::GARBAGE)
    .union(GcFlags::UNREACHABLE)
    .union(GcFlags::REACHABLE);

/// The tricolor mark state of an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Color {
    /// Presumed garbage
    White,
    /// Reachable, children not visited yet
    Gray,
    /// Reachable and visited, or exempt from the running collection
    Black,
}

assert_eq_size!(Color, u8);

/// Garbage collect header, containing the ref count and the collector's per object state
pub struct GcHeader {
    ref_cnt: Cell<usize>,
    /// working copy of `ref_cnt`, only meaningful during a collection
    gc_refs: Cell<usize>,
    color: Cell<Color>,
    generation: Cell<usize>,
    flags: Cell<GcFlags>,
    /// `None` means untracked
    slot: Cell<Option<SlotId>>,
    pub(crate) weak_list: RefCell<Vec<WeakRefPtr>>,
    pub(crate) gc: Weak<GcState>,
}

impl GcHeader {
    pub(crate) fn new(gc: Weak<GcState>) -> Self {
        Self {
            ref_cnt: Cell::new(1),
            gc_refs: Cell::new(0),
            color: Cell::new(Color::Black),
            generation: Cell::new(0),
            flags: Cell::new(GcFlags::empty()),
            slot: Cell::new(None),
            weak_list: RefCell::new(Vec::new()),
            gc,
        }
    }

    /// simple RC += 1
    #[inline]
    pub(crate) fn inc(&self) -> usize {
        let rc = self.ref_cnt.get() + 1;
        self.ref_cnt.set(rc);
        rc
    }

    /// simple RC -= 1
    #[inline]
    pub(crate) fn dec(&self) -> usize {
        let rc = self.ref_cnt.get();
        debug_assert!(rc > 0, "ref count underflow");
        let rc = rc.saturating_sub(1);
        self.ref_cnt.set(rc);
        rc
    }

    #[inline]
    pub fn rc(&self) -> usize {
        self.ref_cnt.get()
    }

    pub(crate) fn gc_refs(&self) -> usize {
        self.gc_refs.get()
    }

    pub(crate) fn set_gc_refs(&self, refs: usize) {
        self.gc_refs.set(refs);
    }

    pub fn color(&self) -> Color {
        self.color.get()
    }

    pub(crate) fn set_color(&self, color: Color) {
        self.color.set(color);
    }

    /// The generation this object was last placed in, [`PERMANENT_GENERATION`](super::PERMANENT_GENERATION) once frozen
    pub fn generation(&self) -> usize {
        self.generation.get()
    }

    pub(crate) fn set_generation(&self, generation: usize) {
        self.generation.set(generation);
    }

    pub fn flags(&self) -> GcFlags {
        self.flags.get()
    }

    pub(crate) fn insert_flags(&self, flags: GcFlags) {
        self.flags.set(self.flags.get() | flags);
    }

    pub(crate) fn remove_flags(&self, flags: GcFlags) {
        self.flags.set(self.flags.get() - flags);
    }

    pub(crate) fn reset_transient_flags(&self) {
        self.remove_flags(TRANSIENT_FLAGS);
    }

    pub fn is_tracked(&self) -> bool {
        self.slot.get().is_some()
    }

    pub(crate) fn slot(&self) -> Option<SlotId> {
        self.slot.get()
    }

    pub(crate) fn set_slot(&self, slot: Option<SlotId>) {
        self.slot.set(slot);
    }

    pub fn weak_count(&self) -> usize {
        self.weak_list.borrow().len()
    }

    /// detach every weak reference from this object, leaving the list empty
    pub(crate) fn take_weakrefs(&self) -> Vec<WeakRefPtr> {
        std::mem::take(&mut *self.weak_list.borrow_mut())
    }
}

impl fmt::Debug for GcHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcHeader")
            .field("ref_cnt", &self.rc())
            .field("gc_refs", &self.gc_refs())
            .field("color", &self.color())
            .field("generation", &self.generation())
            .field("flags", &self.flags())
            .field("tracked", &self.is_tracked())
            .finish()
    }
}
