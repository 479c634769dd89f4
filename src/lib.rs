//! Battle quiz game audio
//!
//! One-shot sound effects and looping background music with gap, rotation,
//! fades, mute and category switching, driven from a single audio thread.

pub mod audio_system;
pub mod config;
pub mod console;
pub mod error;
pub mod messaging;
pub mod state;

pub use audio_system::{Category, EffectPlayer, LoopingTrackManager};
pub use config::AudioConfig;
pub use messaging::AudioService;
