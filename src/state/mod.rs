/// State module
///
/// Observable playback state exposed by the audio service.

pub mod playback_state;

// Re-export commonly used types
pub use playback_state::{BgmStatus, EffectsStatus, LoopPhase};
