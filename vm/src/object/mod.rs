pub mod gc;

pub use self::gc::{Gc, GcBox, GcObj, GcObjRef, GcObjectRef, GcPayload, GcTrace, TracerFn};
