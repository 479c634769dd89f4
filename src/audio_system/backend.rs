/// Host audio engine seam
///
/// The looping manager and the effect player never touch the audio engine
/// directly; they go through these traits so the same state machines run
/// against rodio in the app and against the in-memory recorder in tests.
use std::fmt;

use crate::error::AudioError;

/// Identity of one loaded track instance.
///
/// Handed to the backend on open so that engine callbacks (track end) can
/// name the instance they belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandleId(pub u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One loaded background track, exclusively owned by the looping manager.
pub trait PlaybackHandle {
    /// Start or continue playback.
    fn play(&mut self);

    /// Pause in place, keeping the position.
    fn pause(&mut self);

    /// Stop and unload. The handle is dropped right after.
    fn stop(&mut self);

    fn set_volume(&mut self, volume: f32);

    fn volume(&self) -> f32;
}

/// Creates track handles.
pub trait TrackBackend {
    type Handle: PlaybackHandle;

    /// Load `locator` as a paused handle at volume 0.
    ///
    /// The backend must report the natural end of playback as a
    /// track-end event carrying `id`.
    fn open_track(&mut self, id: HandleId, locator: &str) -> Result<Self::Handle, AudioError>;
}

/// A loaded one-shot effect. Every `play` starts an independent instance.
pub trait EffectSound {
    fn play(&mut self);

    /// Stop every instance started from this sound.
    fn stop(&mut self);

    /// Applies to running instances and to future ones.
    fn set_volume(&mut self, volume: f32);
}

/// Loads effects, trying each source in order until one succeeds.
pub trait EffectBackend {
    type Sound: EffectSound;

    fn load_effect(
        &mut self,
        name: &str,
        sources: &[String],
        volume: f32,
    ) -> Result<Self::Sound, AudioError>;
}
