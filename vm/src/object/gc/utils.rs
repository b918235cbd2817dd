use std::fmt;

/// Statistics of one generation, as `gc.get_stats()` reports them
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GenerationStats {
    pub collections: usize,
    pub collected: usize,
    pub uncollectable: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CollectionPhase {
    Start,
    Stop,
}

impl CollectionPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            CollectionPhase::Start => "start",
            CollectionPhase::Stop => "stop",
        }
    }
}

impl fmt::Display for CollectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What progress callbacks get to see. `collected` and `uncollectable` are zero at the start phase.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CollectionInfo {
    pub generation: usize,
    pub collected: usize,
    pub uncollectable: usize,
}

/// simply record how many object is collected
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GcResult {
    /// unreachable objects that were not kept alive by a legacy finalizer
    pub collected: usize,
    /// unreachable objects kept alive by a legacy finalizer
    pub uncollectable: usize,
}

impl GcResult {
    fn new(tuple: (usize, usize)) -> Self {
        Self {
            collected: tuple.0,
            uncollectable: tuple.1,
        }
    }
}

impl From<(usize, usize)> for GcResult {
    fn from(t: (usize, usize)) -> Self {
        Self::new(t)
    }
}

impl From<GcResult> for (usize, usize) {
    fn from(g: GcResult) -> Self {
        (g.collected, g.uncollectable)
    }
}

impl From<GcResult> for usize {
    fn from(g: GcResult) -> Self {
        g.collected + g.uncollectable
    }
}
