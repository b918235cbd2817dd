use std::fmt;
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::ops::Deref;
use std::ptr::NonNull;

use super::collector::Collector;
use super::drop_object::dec_ref;
use super::header::GcHeader;
use super::trace::GcPayload;
use super::{GcObj, ObjPtr};

/// A heap allocated collectible object: the collector's header followed by the payload.
pub struct GcBox<T: ?Sized> {
    pub(crate) header: GcHeader,
    pub(crate) value: T,
}

impl<T: ?Sized> GcBox<T> {
    pub fn header(&self) -> &GcHeader {
        &self.header
    }

    pub fn payload(&self) -> &T {
        &self.value
    }

    #[inline]
    pub fn rc(&self) -> usize {
        self.header.rc()
    }

    pub fn is_tracked(&self) -> bool {
        self.header.is_tracked()
    }
}

impl GcObj {
    /// A new strong reference to this object
    pub fn to_ref(&self) -> GcObjectRef {
        self.header.inc();
        GcObjectRef {
            ptr: NonNull::from(self),
        }
    }

    pub(crate) fn as_ptr(&self) -> ObjPtr {
        NonNull::from(self)
    }

    /// address without the vtable, for identity comparisons
    pub(crate) fn thin_ptr(&self) -> *const () {
        self as *const GcObj as *const ()
    }

    pub fn type_name(&self) -> &'static str {
        self.value.type_name()
    }

    pub fn payload_is<T: GcPayload>(&self) -> bool {
        self.value.as_any().is::<T>()
    }

    pub fn downcast_ref<T: GcPayload>(&self) -> Option<&T> {
        self.value.as_any().downcast_ref::<T>()
    }

    pub fn is(&self, other: &GcObj) -> bool {
        self.thin_ptr() == other.thin_ptr()
    }
}

impl fmt::Debug for GcObj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} object at {:p}>", self.type_name(), self.thin_ptr())
    }
}

/// A strong, typed reference to a collectible object.
pub struct Gc<T: GcPayload> {
    ptr: NonNull<GcBox<T>>,
    _marker: PhantomData<GcBox<T>>,
}

impl<T: GcPayload> Gc<T> {
    /// Allocate `value` and track it in the youngest generation.
    ///
    /// The allocation may trigger a collection before the new object exists.
    pub fn new(collector: &Collector, value: T) -> Self {
        let zelf = Self::alloc(collector, value);
        collector.state().track(zelf.as_object());
        zelf
    }

    /// Allocate `value` without tracking it, for objects that can never be part of a cycle.
    pub fn new_untracked(collector: &Collector, value: T) -> Self {
        Self::alloc(collector, value)
    }

    fn alloc(collector: &Collector, value: T) -> Self {
        collector.state().on_alloc();
        let inner = Box::new(GcBox {
            header: GcHeader::new(collector.downgrade()),
            value,
        });
        Self {
            ptr: NonNull::from(Box::leak(inner)),
            _marker: PhantomData,
        }
    }

    /// take a new strong reference out of a raw pointer
    ///
    /// # Safety
    /// `ptr` must point to a live object
    pub(crate) unsafe fn clone_from_raw(ptr: NonNull<GcBox<T>>) -> Self {
        ptr.as_ref().header.inc();
        Self {
            ptr,
            _marker: PhantomData,
        }
    }

    pub(crate) fn as_non_null(&self) -> NonNull<GcBox<T>> {
        self.ptr
    }

    #[inline]
    pub fn as_object(&self) -> &GcObj {
        // SAFETY: we hold a strong reference, the box is alive
        unsafe { self.ptr.as_ref() }
    }

    pub fn header(&self) -> &GcHeader {
        &self.as_object().header
    }

    pub fn to_object(&self) -> GcObjectRef {
        self.as_object().to_ref()
    }

    pub fn into_object(self) -> GcObjectRef {
        let zelf = ManuallyDrop::new(self);
        GcObjectRef { ptr: zelf.ptr }
    }

    #[inline]
    pub fn rc(&self) -> usize {
        self.header().rc()
    }

    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        a.ptr == b.ptr
    }
}

impl<T: GcPayload> Deref for Gc<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: we hold a strong reference, the box is alive
        unsafe { &self.ptr.as_ref().value }
    }
}

impl<T: GcPayload> Clone for Gc<T> {
    fn clone(&self) -> Self {
        self.header().inc();
        Self {
            ptr: self.ptr,
            _marker: PhantomData,
        }
    }
}

impl<T: GcPayload> Drop for Gc<T> {
    fn drop(&mut self) {
        // SAFETY: this handle owns one count
        unsafe { dec_ref(self.ptr) }
    }
}

impl<T: GcPayload> fmt::Debug for Gc<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_object(), f)
    }
}

impl<T: GcPayload> From<Gc<T>> for GcObjectRef {
    fn from(value: Gc<T>) -> Self {
        value.into_object()
    }
}

/// A strong reference to a collectible object of any type.
pub struct GcObjectRef {
    ptr: ObjPtr,
}

impl GcObjectRef {
    /// adopt a count that the caller already added
    ///
    /// # Safety
    /// `ptr` must point to a live object and the caller must own one of its counts
    pub(crate) unsafe fn from_raw(ptr: ObjPtr) -> Self {
        Self { ptr }
    }

    /// give up ownership of the count without decrementing it
    pub(crate) fn into_raw(self) -> ObjPtr {
        ManuallyDrop::new(self).ptr
    }

    #[inline]
    pub fn as_object(&self) -> &GcObj {
        // SAFETY: we hold a strong reference, the box is alive
        unsafe { self.ptr.as_ref() }
    }

    pub fn downcast<T: GcPayload>(self) -> Result<Gc<T>, Self> {
        if self.payload_is::<T>() {
            let ptr = self.into_raw().cast::<GcBox<T>>();
            Ok(Gc {
                ptr,
                _marker: PhantomData,
            })
        } else {
            Err(self)
        }
    }

    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        a.is(b)
    }
}

impl Deref for GcObjectRef {
    type Target = GcObj;

    #[inline]
    fn deref(&self) -> &GcObj {
        self.as_object()
    }
}

impl Clone for GcObjectRef {
    fn clone(&self) -> Self {
        self.as_object().to_ref()
    }
}

impl Drop for GcObjectRef {
    fn drop(&mut self) {
        // SAFETY: this handle owns one count
        unsafe { dec_ref(self.ptr) }
    }
}

impl fmt::Debug for GcObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_object(), f)
    }
}
