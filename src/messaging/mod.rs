/// Messaging module for the audio thread
///
/// All audio work happens on one thread. Callers talk to it through
/// [`AudioService`], which turns method calls into [`AudioMessage`]s on a
/// single channel; the rodio backend posts track-end events to the same
/// channel, so commands and engine callbacks are handled strictly in order.
///
/// ```text
/// ┌──────────┐  AudioMessage   ┌──────────────┐
/// │   Game   │ ──────────────> │ audio thread │ ── LoopingTrackManager
/// └──────────┘                 │              │ ── EffectPlayer
///       ▲      reply channel   └──────────────┘
///       └──────────────────────────┘ ▲
///                     TrackEnded(id) │ backend
/// ```

pub mod commands;
pub mod service;

// Re-export commonly used types
pub use commands::{AudioCommand, AudioMessage, BgmCommand, EffectCommand};
pub use service::AudioService;
