/// In-memory audio backend
///
/// Implements both backend traits without an output device and records every
/// call. Used for headless runs (`--headless`) and by the tests, which read
/// the journal back to check handle lifetimes and volumes.
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use super::backend::{EffectBackend, EffectSound, HandleId, PlaybackHandle, TrackBackend};
use crate::error::AudioError;

/// Lifecycle of a recorded track handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Loaded,
    Playing,
    Paused,
    Stopped,
}

#[derive(Debug, Clone)]
struct HandleRecord {
    locator: String,
    state: HandleState,
    volumes: Vec<f32>,
}

#[derive(Debug, Clone, Default)]
struct EffectRecord {
    source: String,
    volume: f32,
    loads: usize,
    /// One flag per started instance, true while running
    instances: Vec<bool>,
}

#[derive(Debug, Default)]
struct Journal {
    handles: BTreeMap<HandleId, HandleRecord>,
    effects: HashMap<String, EffectRecord>,
    load_attempts: HashMap<String, usize>,
    failing: HashSet<String>,
}

/// Recording backend, cheap to clone; clones share one journal
#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    journal: Arc<Mutex<Journal>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later load of `locator` fail
    pub fn fail_locator(&self, locator: &str) {
        self.journal.lock().failing.insert(locator.to_string());
    }

    /// Handles loaded and not yet stopped
    pub fn live_handles(&self) -> Vec<HandleId> {
        self.journal
            .lock()
            .handles
            .iter()
            .filter(|(_, record)| record.state != HandleState::Stopped)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Every handle ever opened, in order, with its locator
    pub fn opened(&self) -> Vec<(HandleId, String)> {
        self.journal
            .lock()
            .handles
            .iter()
            .map(|(id, record)| (*id, record.locator.clone()))
            .collect()
    }

    pub fn handle_state(&self, id: HandleId) -> Option<HandleState> {
        self.journal.lock().handles.get(&id).map(|r| r.state)
    }

    pub fn handle_locator(&self, id: HandleId) -> Option<String> {
        self.journal.lock().handles.get(&id).map(|r| r.locator.clone())
    }

    pub fn handle_volume(&self, id: HandleId) -> Option<f32> {
        self.journal
            .lock()
            .handles
            .get(&id)
            .and_then(|r| r.volumes.last().copied())
    }

    /// Every volume applied to a handle, starting with the initial 0.0
    pub fn volume_history(&self, id: HandleId) -> Vec<f32> {
        self.journal
            .lock()
            .handles
            .get(&id)
            .map(|r| r.volumes.clone())
            .unwrap_or_default()
    }

    pub fn effect_loads(&self, name: &str) -> usize {
        self.journal.lock().effects.get(name).map(|e| e.loads).unwrap_or(0)
    }

    pub fn effect_load_attempts(&self, name: &str) -> usize {
        self.journal.lock().load_attempts.get(name).copied().unwrap_or(0)
    }

    pub fn effect_instances(&self, name: &str) -> usize {
        self.journal
            .lock()
            .effects
            .get(name)
            .map(|e| e.instances.len())
            .unwrap_or(0)
    }

    pub fn effect_source(&self, name: &str) -> Option<String> {
        self.journal.lock().effects.get(name).map(|e| e.source.clone())
    }

    pub fn effect_volume(&self, name: &str) -> Option<f32> {
        self.journal.lock().effects.get(name).map(|e| e.volume)
    }

    /// Effect instances still running, across all names
    pub fn running_effects(&self) -> usize {
        self.journal
            .lock()
            .effects
            .values()
            .map(|e| e.instances.iter().filter(|running| **running).count())
            .sum()
    }
}

/// Track handle backed by the journal
#[derive(Debug)]
pub struct RecordedHandle {
    id: HandleId,
    journal: Arc<Mutex<Journal>>,
}

impl RecordedHandle {
    fn update(&self, f: impl FnOnce(&mut HandleRecord)) {
        if let Some(record) = self.journal.lock().handles.get_mut(&self.id) {
            f(record);
        }
    }
}

impl PlaybackHandle for RecordedHandle {
    fn play(&mut self) {
        self.update(|r| r.state = HandleState::Playing);
    }

    fn pause(&mut self) {
        self.update(|r| r.state = HandleState::Paused);
    }

    fn stop(&mut self) {
        self.update(|r| r.state = HandleState::Stopped);
    }

    fn set_volume(&mut self, volume: f32) {
        self.update(|r| r.volumes.push(volume));
    }

    fn volume(&self) -> f32 {
        self.journal
            .lock()
            .handles
            .get(&self.id)
            .and_then(|r| r.volumes.last().copied())
            .unwrap_or(0.0)
    }
}

impl TrackBackend for RecordingBackend {
    type Handle = RecordedHandle;

    fn open_track(&mut self, id: HandleId, locator: &str) -> Result<Self::Handle, AudioError> {
        let mut journal = self.journal.lock();
        if journal.failing.contains(locator) {
            return Err(AudioError::LoadFailed {
                path: locator.to_string(),
                source: "marked as failing".into(),
            });
        }
        journal.handles.insert(
            id,
            HandleRecord {
                locator: locator.to_string(),
                state: HandleState::Loaded,
                volumes: vec![0.0],
            },
        );
        Ok(RecordedHandle {
            id,
            journal: Arc::clone(&self.journal),
        })
    }
}

/// Effect backed by the journal
#[derive(Debug)]
pub struct RecordedSound {
    name: String,
    journal: Arc<Mutex<Journal>>,
}

impl RecordedSound {
    fn update(&self, f: impl FnOnce(&mut EffectRecord)) {
        if let Some(record) = self.journal.lock().effects.get_mut(&self.name) {
            f(record);
        }
    }
}

impl EffectSound for RecordedSound {
    fn play(&mut self) {
        self.update(|r| r.instances.push(true));
    }

    fn stop(&mut self) {
        self.update(|r| r.instances.iter_mut().for_each(|running| *running = false));
    }

    fn set_volume(&mut self, volume: f32) {
        self.update(|r| r.volume = volume);
    }
}

impl EffectBackend for RecordingBackend {
    type Sound = RecordedSound;

    fn load_effect(
        &mut self,
        name: &str,
        sources: &[String],
        volume: f32,
    ) -> Result<Self::Sound, AudioError> {
        let mut journal = self.journal.lock();
        *journal.load_attempts.entry(name.to_string()).or_insert(0) += 1;

        let source = sources
            .iter()
            .find(|s| !journal.failing.contains(s.as_str()))
            .cloned()
            .ok_or_else(|| AudioError::NoSources(name.to_string()))?;

        let record = journal.effects.entry(name.to_string()).or_default();
        record.source = source;
        record.volume = volume;
        record.loads += 1;

        Ok(RecordedSound {
            name: name.to_string(),
            journal: Arc::clone(&self.journal),
        })
    }
}
