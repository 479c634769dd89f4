/// One-shot sound effects
///
/// Effects are loaded lazily on first play and cached per name. A missing or
/// broken effect is logged and then stays silent; it never interrupts the
/// game.
use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::backend::{EffectBackend, EffectSound};
use crate::error::AudioError;
use crate::state::EffectsStatus;

/// Definition of a named effect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundDefinition {
    /// Candidate files in preference order (fallback formats)
    pub sources: Vec<String>,

    /// Per-sound level (0.0-1.0), 1.0 when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f32>,
}

impl SoundDefinition {
    pub fn new(sources: &[&str], volume: f32) -> Self {
        Self {
            sources: sources.iter().map(|s| s.to_string()).collect(),
            volume: Some(volume),
        }
    }

    pub fn volume_scalar(&self) -> f32 {
        self.volume.unwrap_or(1.0).clamp(0.0, 1.0)
    }
}

/// Effects shipped with the game
pub fn default_sound_definitions() -> BTreeMap<String, SoundDefinition> {
    [
        ("hit", 0.6),
        ("miss", 0.4),
        ("crit", 0.8),
        ("victory", 0.7),
        ("defeat", 0.6),
        ("select", 0.3),
        ("correct", 0.5),
        ("wrong", 0.5),
    ]
    .into_iter()
    .map(|(name, volume)| {
        let mp3 = format!("audio/{}.mp3", name);
        let ogg = format!("audio/{}.ogg", name);
        (name.to_string(), SoundDefinition::new(&[&mp3, &ogg], volume))
    })
    .collect()
}

/// Validated, name-keyed effect table
#[derive(Debug, Clone, Default)]
pub struct SoundLibrary {
    definitions: BTreeMap<String, SoundDefinition>,
}

impl SoundLibrary {
    pub fn new(definitions: BTreeMap<String, SoundDefinition>) -> Self {
        Self { definitions }
    }

    pub fn with_defaults() -> Self {
        Self::new(default_sound_definitions())
    }

    pub fn get(&self, name: &str) -> Result<&SoundDefinition, AudioError> {
        self.definitions
            .get(name)
            .ok_or_else(|| AudioError::UnknownSound(name.to_string()))
    }
}

/// Cached load result per effect name
enum EffectSlot<S> {
    Ready { sound: S, scalar: f32 },
    /// Failed to load once; stays silent
    Unavailable,
}

/// Fire-and-forget effect player
pub struct EffectPlayer<B: EffectBackend> {
    backend: B,
    library: SoundLibrary,
    slots: HashMap<String, EffectSlot<B::Sound>>,
    muted: bool,
    volume: f32,
}

impl<B: EffectBackend> EffectPlayer<B> {
    pub fn new(backend: B, library: SoundLibrary) -> Self {
        Self {
            backend,
            library,
            slots: HashMap::new(),
            muted: false,
            volume: 1.0,
        }
    }

    /// Play an effect by name. Overlapping plays are independent instances.
    pub fn play(&mut self, name: &str) {
        if self.muted {
            return;
        }

        if !self.slots.contains_key(name) {
            let slot = self.load(name);
            self.slots.insert(name.to_string(), slot);
        }

        if let Some(EffectSlot::Ready { sound, .. }) = self.slots.get_mut(name) {
            sound.play();
        }
    }

    fn load(&mut self, name: &str) -> EffectSlot<B::Sound> {
        let definition = match self.library.get(name) {
            Ok(def) => def,
            Err(e) => {
                tracing::warn!("{}", e);
                return EffectSlot::Unavailable;
            }
        };

        let scalar = definition.volume_scalar();
        match self
            .backend
            .load_effect(name, &definition.sources, scalar * self.volume)
        {
            Ok(sound) => {
                tracing::debug!("Loaded effect {}", name);
                EffectSlot::Ready { sound, scalar }
            }
            Err(e) => {
                tracing::warn!("Failed to load effect {}: {}", name, e);
                EffectSlot::Unavailable
            }
        }
    }

    /// Stop every running instance of `name`
    pub fn stop(&mut self, name: &str) {
        if let Some(EffectSlot::Ready { sound, .. }) = self.slots.get_mut(name) {
            sound.stop();
        }
    }

    /// Stop all effects
    pub fn stop_all(&mut self) {
        for slot in self.slots.values_mut() {
            if let EffectSlot::Ready { sound, .. } = slot {
                sound.stop();
            }
        }
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        self.muted
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Set global effect volume (0.0-1.0) and rescale every loaded effect
    pub fn set_volume(&mut self, volume: f32) {
        if volume.is_nan() {
            tracing::warn!("Ignoring NaN effect volume");
            return;
        }
        self.volume = volume.clamp(0.0, 1.0);
        for slot in self.slots.values_mut() {
            if let EffectSlot::Ready { sound, scalar } = slot {
                sound.set_volume(*scalar * self.volume);
            }
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Number of effects loaded successfully
    pub fn loaded_count(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| matches!(slot, EffectSlot::Ready { .. }))
            .count()
    }

    pub fn status(&self) -> EffectsStatus {
        EffectsStatus {
            muted: self.muted,
            volume: self.volume,
            loaded: self.loaded_count(),
        }
    }
}
