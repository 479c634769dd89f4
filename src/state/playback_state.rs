/// Background music playback phase
///
/// Derived view of the looping manager's state, used for status queries and
/// logging. The manager itself is the only writer.

use crate::audio_system::Category;

/// Observable phase of the looping track manager
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LoopPhase {
    /// No category selected
    Idle,

    /// A track of `category` is audible (or fading in)
    Playing { category: Category, index: usize },

    /// Between two loop iterations, no handle held
    GapWaiting { category: Category, index: usize },

    /// Paused or muted, category and index kept
    Paused { category: Category, index: usize },
}

impl LoopPhase {
    pub fn is_idle(&self) -> bool {
        matches!(self, LoopPhase::Idle)
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, LoopPhase::Playing { .. })
    }

    pub fn is_gap_waiting(&self) -> bool {
        matches!(self, LoopPhase::GapWaiting { .. })
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, LoopPhase::Paused { .. })
    }

    pub fn category(&self) -> Option<Category> {
        match self {
            LoopPhase::Idle => None,
            LoopPhase::Playing { category, .. }
            | LoopPhase::GapWaiting { category, .. }
            | LoopPhase::Paused { category, .. } => Some(*category),
        }
    }

    pub fn track_index(&self) -> Option<usize> {
        match self {
            LoopPhase::Idle => None,
            LoopPhase::Playing { index, .. }
            | LoopPhase::GapWaiting { index, .. }
            | LoopPhase::Paused { index, .. } => Some(*index),
        }
    }

    /// Get a human-readable description of the phase
    pub fn description(&self) -> &'static str {
        match self {
            LoopPhase::Idle => "Idle",
            LoopPhase::Playing { .. } => "Playing",
            LoopPhase::GapWaiting { .. } => "Waiting for next loop",
            LoopPhase::Paused { .. } => "Paused",
        }
    }
}

impl Default for LoopPhase {
    fn default() -> Self {
        LoopPhase::Idle
    }
}

/// Snapshot answered to status queries
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BgmStatus {
    pub phase: LoopPhase,
    pub muted: bool,
    pub volume: f32,
}

impl Default for BgmStatus {
    fn default() -> Self {
        Self {
            phase: LoopPhase::Idle,
            muted: false,
            volume: 1.0,
        }
    }
}

impl BgmStatus {
    pub fn category(&self) -> Option<Category> {
        self.phase.category()
    }
}

/// Snapshot of the effect player
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EffectsStatus {
    pub muted: bool,
    pub volume: f32,
    pub loaded: usize,
}

impl Default for EffectsStatus {
    fn default() -> Self {
        Self {
            muted: false,
            volume: 1.0,
            loaded: 0,
        }
    }
}
