use bitflags::bitflags;

use super::collector::NUM_GENERATIONS;

bitflags! {
    /// GC debug flags, with the values of the `gc.DEBUG_*` constants
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct DebugFlags: u32 {
        /// Log collection statistics
        const STATS         = 1 << 0;
        /// Log collectable objects
        const COLLECTABLE   = 1 << 1;
        /// Log uncollectable objects
        const UNCOLLECTABLE = 1 << 2;
        /// Save all garbage in `gc.garbage` instead of freeing it
        const SAVEALL       = 1 << 5;
        /// Trace the mark passes
        const VERBOSE       = 1 << 6;
        const LEAK = Self::COLLECTABLE.bits() | Self::UNCOLLECTABLE.bits() | Self::SAVEALL.bits();
    }
}

/// Initial state of a [`Collector`](super::Collector).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct GcConfig {
    /// allocations (for generation 0) or younger collections (for the others) before a generation is collected
    pub thresholds: [usize; NUM_GENERATIONS],
    pub enabled: bool,
    pub debug: DebugFlags,
    /// recursion depth of the mark phase before a pass is aborted and restarted
    pub mark_queue_limit: usize,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            thresholds: [700, 10, 10],
            enabled: true,
            debug: DebugFlags::empty(),
            mark_queue_limit: 100,
        }
    }
}

impl GcConfig {
    pub fn with_thresholds(mut self, thresholds: [usize; NUM_GENERATIONS]) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_debug(mut self, debug: DebugFlags) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// a limit of zero would abort every pass, it is raised to one
    pub fn with_mark_queue_limit(mut self, limit: usize) -> Self {
        self.mark_queue_limit = limit.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GcConfig::default();
        assert_eq!(config.thresholds, [700, 10, 10]);
        assert!(config.enabled);
        assert_eq!(config.debug, DebugFlags::empty());
        assert_eq!(config.mark_queue_limit, 100);
    }

    #[test]
    fn test_builder() {
        let config = GcConfig::default()
            .with_thresholds([5, 2, 1])
            .with_debug(DebugFlags::STATS)
            .with_enabled(false)
            .with_mark_queue_limit(0);
        assert_eq!(config.thresholds, [5, 2, 1]);
        assert_eq!(config.debug, DebugFlags::STATS);
        assert!(!config.enabled);
        assert_eq!(config.mark_queue_limit, 1);
    }

    #[test]
    fn test_debug_flag_values() {
        assert_eq!(DebugFlags::STATS.bits(), 1);
        assert_eq!(DebugFlags::SAVEALL.bits(), 32);
        assert_eq!(DebugFlags::LEAK.bits(), 38);
        assert!(DebugFlags::LEAK.contains(DebugFlags::SAVEALL));
    }
}
