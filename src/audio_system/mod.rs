/// Audio system module
///
/// Game audio for the battle quiz:
/// - One-shot sound effects (hit, miss, crit, ...) played by name
/// - Looping background music per category, with a silence gap and track
///   rotation between iterations and fades on start and stop
///
/// ## Architecture
///
/// ```text
/// AudioService (audio thread)
///   ├── LoopingTrackManager ── TrackBackend ──┐
///   │     ├── TimerQueue (gap, fade steps)   ├── RodioBackend / RecordingBackend
///   │     └── CategoryRegistry (shared)      │
///   └── EffectPlayer ───────── EffectBackend ─┘
/// ```
///
/// ## Usage
///
/// ```rust,ignore
/// let mut manager = LoopingTrackManager::new(backend, registry, LoopSettings::default());
/// manager.play_for_topic("philosophy");
///
/// // Feed engine callbacks and the clock
/// manager.on_track_end(id);
/// manager.advance_to(Instant::now());
/// ```
pub mod backend;
pub mod category;
pub mod effects;
pub mod fade;
pub mod manager;
pub mod manifest;
pub mod recording;
pub mod rodio_backend;
pub mod timer;

// Re-export commonly used types
pub use backend::{EffectBackend, EffectSound, HandleId, PlaybackHandle, TrackBackend};
pub use category::{BuiltInTopic, Category, CategoryRegistry, SharedRegistry};
pub use effects::{EffectPlayer, SoundDefinition, SoundLibrary};
pub use manager::LoopingTrackManager;
pub use manifest::{BgmManifest, ManifestSource};
pub use recording::RecordingBackend;
pub use rodio_backend::RodioBackend;
