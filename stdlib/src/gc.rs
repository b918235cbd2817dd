//! The `gc` module as scripts see it.
//!
//! Arguments arrive loosely typed, as signed integers, and are validated here before they
//! reach the [`Collector`].

use rustpython_gc_vm::object::gc::{
    DebugFlags, GcError, GcObjRef, GcObjectRef, GenerationStats, NUM_GENERATIONS,
};
use rustpython_gc_vm::Collector;

pub const DEBUG_STATS: i64 = DebugFlags::STATS.bits() as i64;
pub const DEBUG_COLLECTABLE: i64 = DebugFlags::COLLECTABLE.bits() as i64;
pub const DEBUG_UNCOLLECTABLE: i64 = DebugFlags::UNCOLLECTABLE.bits() as i64;
pub const DEBUG_SAVEALL: i64 = DebugFlags::SAVEALL.bits() as i64;
pub const DEBUG_VERBOSE: i64 = DebugFlags::VERBOSE.bits() as i64;
pub const DEBUG_LEAK: i64 = DebugFlags::LEAK.bits() as i64;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ModuleError {
    #[error(transparent)]
    Gc(#[from] GcError),
    #[error("invalid generation {0}")]
    NegativeGeneration(i64),
    #[error("threshold must be non-negative, got {0}")]
    NegativeThreshold(i64),
    #[error("set_threshold() takes at most {} arguments ({0} given)", NUM_GENERATIONS)]
    TooManyArguments(usize),
    #[error("invalid debug flags {0}")]
    InvalidDebugFlags(i64),
}

pub type ModuleResult<T> = Result<T, ModuleError>;

fn generation_arg(generation: i64) -> ModuleResult<usize> {
    let generation =
        usize::try_from(generation).map_err(|_| ModuleError::NegativeGeneration(generation))?;
    if generation >= NUM_GENERATIONS {
        return Err(GcError::InvalidGeneration(generation).into());
    }
    Ok(generation)
}

/// `gc.collect(generation=2)`
pub fn collect(gc: &Collector, generation: Option<i64>) -> ModuleResult<usize> {
    let generation = generation_arg(generation.unwrap_or(NUM_GENERATIONS as i64 - 1))?;
    Ok(gc.collect(generation)?)
}

pub fn enable(gc: &Collector) {
    gc.enable()
}

pub fn disable(gc: &Collector) {
    gc.disable()
}

pub fn isenabled(gc: &Collector) -> bool {
    gc.is_enabled()
}

pub fn get_count(gc: &Collector) -> (usize, usize, usize) {
    gc.get_count()
}

pub fn get_debug(gc: &Collector) -> i64 {
    gc.get_debug().bits() as i64
}

/// unknown bits are dropped, as long as the value fits the flag word
pub fn set_debug(gc: &Collector, flags: i64) -> ModuleResult<()> {
    let bits = u32::try_from(flags).map_err(|_| ModuleError::InvalidDebugFlags(flags))?;
    gc.set_debug(DebugFlags::from_bits_truncate(bits));
    Ok(())
}

pub fn get_threshold(gc: &Collector) -> (usize, usize, usize) {
    gc.get_threshold()
}

/// `gc.set_threshold(threshold0[, threshold1[, threshold2]])`
pub fn set_threshold(gc: &Collector, thresholds: &[i64]) -> ModuleResult<()> {
    if thresholds.len() > NUM_GENERATIONS {
        return Err(ModuleError::TooManyArguments(thresholds.len()));
    }
    let thresholds = thresholds
        .iter()
        .map(|&t| usize::try_from(t).map_err(|_| ModuleError::NegativeThreshold(t)))
        .collect::<ModuleResult<Vec<_>>>()?;
    gc.set_threshold(&thresholds)?;
    Ok(())
}

pub fn get_objects(gc: &Collector, generation: Option<i64>) -> ModuleResult<Vec<GcObjectRef>> {
    let generation = generation.map(generation_arg).transpose()?;
    Ok(gc.get_objects(generation)?)
}

pub fn get_stats(gc: &Collector) -> Vec<GenerationStats> {
    gc.get_stats().to_vec()
}

pub fn is_tracked(gc: &Collector, obj: GcObjRef) -> bool {
    gc.is_tracked(obj)
}

pub fn get_referrers(gc: &Collector, objs: &[GcObjRef]) -> Vec<GcObjectRef> {
    gc.get_referrers(objs)
}

pub fn get_referents(gc: &Collector, objs: &[GcObjRef]) -> Vec<GcObjectRef> {
    gc.get_referents(objs)
}

pub fn freeze(gc: &Collector) {
    gc.freeze()
}

pub fn unfreeze(gc: &Collector) {
    gc.unfreeze()
}

pub fn get_freeze_count(gc: &Collector) -> usize {
    gc.get_freeze_count()
}

/// `gc.garbage`
pub fn garbage(gc: &Collector) -> Vec<GcObjectRef> {
    gc.garbage()
}

/// `del gc.garbage[:]`
pub fn clear_garbage(gc: &Collector) -> usize {
    let n = gc.clear_garbage();
    debug!("gc: released {} objects from gc.garbage", n);
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustpython_gc_vm::builtins::{PyInt, PyList};

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn test_collect_generation_args() {
        init_logger();
        let gc = Collector::new();
        assert_eq!(collect(&gc, None), Ok(0));
        assert_eq!(collect(&gc, Some(0)), Ok(0));
        assert_eq!(
            collect(&gc, Some(3)),
            Err(ModuleError::Gc(GcError::InvalidGeneration(3)))
        );
        assert_eq!(
            collect(&gc, Some(-1)),
            Err(ModuleError::NegativeGeneration(-1))
        );
        assert_eq!(gc.get_stats()[2].collections, 1);
    }

    #[test]
    fn test_threshold_args() {
        let gc = Collector::new();
        set_threshold(&gc, &[100]).unwrap();
        assert_eq!(get_threshold(&gc), (100, 10, 10));
        set_threshold(&gc, &[1, 2, 3]).unwrap();
        assert_eq!(get_threshold(&gc), (1, 2, 3));
        assert_eq!(
            set_threshold(&gc, &[1, -2]),
            Err(ModuleError::NegativeThreshold(-2))
        );
        assert_eq!(
            set_threshold(&gc, &[1, 2, 3, 4]),
            Err(ModuleError::TooManyArguments(4))
        );
        assert_eq!(
            set_threshold(&gc, &[]),
            Err(ModuleError::Gc(GcError::InvalidThresholdCount(0)))
        );
        assert_eq!(get_threshold(&gc), (1, 2, 3));
    }

    #[test]
    fn test_debug_args() {
        let gc = Collector::new();
        assert_eq!(get_debug(&gc), 0);
        set_debug(&gc, DEBUG_LEAK).unwrap();
        assert_eq!(get_debug(&gc), DEBUG_LEAK);
        assert_eq!(
            set_debug(&gc, -1),
            Err(ModuleError::InvalidDebugFlags(-1))
        );
        assert_eq!(DEBUG_LEAK, 38);
        assert_eq!(DEBUG_VERBOSE, 64);
        set_debug(&gc, DEBUG_STATS | DEBUG_VERBOSE).unwrap();
        assert_eq!(gc.get_debug(), DebugFlags::STATS | DebugFlags::VERBOSE);
        assert_eq!(
            ModuleError::TooManyArguments(4).to_string(),
            "set_threshold() takes at most 3 arguments (4 given)"
        );
    }

    #[test]
    fn test_introspection() {
        let gc = Collector::new();
        let l = PyList::new_ref(&gc, vec![PyInt::new_ref(&gc, 1).into()]);
        let outer = PyList::new_ref(&gc, vec![l.to_object()]);
        assert!(is_tracked(&gc, l.as_object()));
        assert_eq!(get_objects(&gc, Some(0)).unwrap().len(), 2);
        assert!(get_objects(&gc, Some(-3)).is_err());

        let referrers = get_referrers(&gc, &[l.as_object()]);
        assert_eq!(referrers.len(), 1);
        assert!(referrers[0].is(outer.as_object()));
        let referents = get_referents(&gc, &[l.as_object()]);
        assert_eq!(referents[0].downcast_ref::<PyInt>().map(|i| i.as_i64()), Some(1));

        freeze(&gc);
        assert_eq!(get_freeze_count(&gc), 2);
        assert!(get_objects(&gc, None).unwrap().is_empty());
        unfreeze(&gc);
        assert_eq!(get_objects(&gc, Some(2)).unwrap().len(), 2);
    }

    #[test]
    fn test_enable_disable() {
        let gc = Collector::new();
        assert!(isenabled(&gc));
        disable(&gc);
        assert!(!isenabled(&gc));
        enable(&gc);
        assert!(isenabled(&gc));
        assert_eq!(get_count(&gc), (0, 0, 0));
        assert!(garbage(&gc).is_empty());
        assert_eq!(clear_garbage(&gc), 0);
    }
}
