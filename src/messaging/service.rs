/// Audio service
///
/// Runs the looping manager and the effect player on one dedicated thread and
/// hands out a cheap handle for sending commands. The thread owns the backend
/// (rodio's output stream cannot leave the thread that opened it), waits on
/// the command channel until the next timer deadline and fires due timers
/// between messages.
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use anyhow::Context;
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use super::commands::{AudioCommand, AudioMessage, BgmCommand, EffectCommand};
use crate::audio_system::backend::{EffectBackend, TrackBackend};
use crate::audio_system::manifest::{spawn_manifest_load, ManifestSource};
use crate::audio_system::{Category, EffectPlayer, LoopingTrackManager, SharedRegistry, SoundLibrary};
use crate::config::{AudioConfig, LoopSettings};
use crate::error::{AppResult, AudioError};
use crate::state::{BgmStatus, EffectsStatus};

struct DriverSetup {
    registry: SharedRegistry,
    settings: LoopSettings,
    library: SoundLibrary,
    effects_volume: f32,
}

/// Handle to the audio thread. Clones share the thread.
#[derive(Clone)]
pub struct AudioService {
    tx: Sender<AudioMessage>,
    registry: SharedRegistry,
    thread: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl AudioService {
    /// Start the audio thread.
    ///
    /// `factory` runs on the audio thread and receives the sender the backend
    /// uses to report track ends. If it fails the service stays up and silent.
    pub fn spawn<B, F>(config: &AudioConfig, factory: F) -> AppResult<Self>
    where
        B: TrackBackend + EffectBackend + Clone + 'static,
        F: FnOnce(Sender<AudioMessage>) -> Result<B, AudioError> + Send + 'static,
    {
        let registry = crate::audio_system::category::shared(
            config.registry().context("Invalid category configuration")?,
        );
        let setup = DriverSetup {
            registry: Arc::clone(&registry),
            settings: config.bgm,
            library: config.sound_library(),
            effects_volume: config.effects_volume,
        };

        let (tx, rx) = unbounded();
        let events = tx.clone();
        let thread = thread::Builder::new()
            .name("audio".to_string())
            .spawn(move || match factory(events) {
                Ok(backend) => run_driver(rx, backend, setup),
                Err(e) => {
                    tracing::error!("Audio output unavailable, running silent: {}", e);
                    drain(rx);
                }
            })
            .context("Failed to spawn audio thread")?;

        Ok(Self {
            tx,
            registry,
            thread: Arc::new(Mutex::new(Some(thread))),
        })
    }

    fn send(&self, message: impl Into<AudioMessage>) {
        if self.tx.send(message.into()).is_err() {
            tracing::debug!("Audio thread gone, dropping command");
        }
    }

    fn query<T>(&self, make: impl FnOnce(Sender<T>) -> AudioMessage) -> Option<T> {
        let (reply, rx) = bounded(1);
        self.tx.send(make(reply)).ok()?;
        rx.recv().ok()
    }

    pub fn play(&self, category: Category) {
        self.send(BgmCommand::Play { category });
    }

    pub fn play_for_topic(&self, topic: &str) {
        self.send(BgmCommand::PlayForTopic {
            topic: topic.to_string(),
        });
    }

    pub fn stop(&self) {
        self.send(BgmCommand::Stop);
    }

    pub fn pause(&self) {
        self.send(BgmCommand::Pause);
    }

    pub fn resume(&self) {
        self.send(BgmCommand::Resume);
    }

    pub fn set_muted(&self, muted: bool) {
        self.send(BgmCommand::SetMuted { muted });
    }

    /// Returns the new mute state
    pub fn toggle_mute(&self) -> bool {
        self.query(|reply| BgmCommand::ToggleMute { reply }.into())
            .unwrap_or(false)
    }

    pub fn is_muted(&self) -> bool {
        self.query(|reply| BgmCommand::IsMuted { reply }.into())
            .unwrap_or(false)
    }

    pub fn set_volume(&self, volume: f32) {
        self.send(BgmCommand::SetVolume { volume });
    }

    pub fn volume(&self) -> f32 {
        self.query(|reply| BgmCommand::Volume { reply }.into())
            .unwrap_or_default()
    }

    pub fn current_category(&self) -> Option<Category> {
        self.query(|reply| BgmCommand::CurrentCategory { reply }.into())
            .flatten()
    }

    pub fn status(&self) -> Option<BgmStatus> {
        self.query(|reply| BgmCommand::Status { reply }.into())
    }

    pub fn play_effect(&self, name: &str) {
        self.send(EffectCommand::Play {
            name: name.to_string(),
        });
    }

    pub fn stop_effect(&self, name: &str) {
        self.send(EffectCommand::Stop {
            name: name.to_string(),
        });
    }

    pub fn stop_all_effects(&self) {
        self.send(EffectCommand::StopAll);
    }

    pub fn set_effects_muted(&self, muted: bool) {
        self.send(EffectCommand::SetMuted { muted });
    }

    pub fn toggle_effects_mute(&self) -> bool {
        self.query(|reply| EffectCommand::ToggleMute { reply }.into())
            .unwrap_or(false)
    }

    pub fn set_effects_volume(&self, volume: f32) {
        self.send(EffectCommand::SetVolume { volume });
    }

    pub fn effects_volume(&self) -> f32 {
        self.query(|reply| EffectCommand::Volume { reply }.into())
            .unwrap_or_default()
    }

    pub fn effects_status(&self) -> Option<EffectsStatus> {
        self.query(|reply| EffectCommand::Status { reply }.into())
    }

    /// Load the custom track manifest in the background
    pub fn load_manifest(&self, source: ManifestSource) -> JoinHandle<usize> {
        spawn_manifest_load(source, Arc::clone(&self.registry))
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// Stop everything and wait for the audio thread to exit
    pub fn shutdown(&self) {
        self.send(AudioMessage::Shutdown);
        if let Some(thread) = self.thread.lock().take() {
            if thread.join().is_err() {
                tracing::error!("Audio thread panicked");
            }
        }
    }
}

/// Silent mode: consume messages until shutdown, dropping reply senders
fn drain(rx: Receiver<AudioMessage>) {
    while let Ok(message) = rx.recv() {
        if matches!(message, AudioMessage::Shutdown) {
            break;
        }
    }
}

fn run_driver<B>(rx: Receiver<AudioMessage>, backend: B, setup: DriverSetup)
where
    B: TrackBackend + EffectBackend + Clone,
{
    tracing::info!("Audio thread started");

    let mut manager = LoopingTrackManager::new(backend.clone(), setup.registry, setup.settings);
    let mut effects = EffectPlayer::new(backend, setup.library);
    effects.set_volume(setup.effects_volume);

    loop {
        let received = match manager.next_deadline() {
            Some(deadline) => match rx.recv_deadline(deadline) {
                Ok(message) => Some(message),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match rx.recv() {
                Ok(message) => Some(message),
                Err(_) => break,
            },
        };

        manager.advance_to(Instant::now());

        match received {
            None => {}
            Some(AudioMessage::Shutdown) => {
                tracing::info!("Shutdown received, stopping audio thread");
                break;
            }
            Some(AudioMessage::TrackEnded(id)) => manager.on_track_end(id),
            Some(AudioMessage::Command(command)) => {
                tracing::trace!("Executing command: {}", command.description());
                match command {
                    AudioCommand::Bgm(cmd) => apply_bgm(&mut manager, cmd),
                    AudioCommand::Effect(cmd) => apply_effect(&mut effects, cmd),
                }
            }
        }
    }

    manager.shutdown();
    effects.stop_all();
    tracing::info!("Audio thread stopped");
}

fn apply_bgm<B: TrackBackend>(manager: &mut LoopingTrackManager<B>, command: BgmCommand) {
    // Reply errors mean the caller stopped waiting
    match command {
        BgmCommand::Play { category } => manager.play(category),
        BgmCommand::PlayForTopic { topic } => manager.play_for_topic(&topic),
        BgmCommand::Stop => manager.stop(),
        BgmCommand::Pause => manager.pause(),
        BgmCommand::Resume => manager.resume(),
        BgmCommand::SetMuted { muted } => manager.set_muted(muted),
        BgmCommand::ToggleMute { reply } => {
            let _ = reply.send(manager.toggle_mute());
        }
        BgmCommand::SetVolume { volume } => manager.set_volume(volume),
        BgmCommand::IsMuted { reply } => {
            let _ = reply.send(manager.is_muted());
        }
        BgmCommand::Volume { reply } => {
            let _ = reply.send(manager.volume());
        }
        BgmCommand::CurrentCategory { reply } => {
            let _ = reply.send(manager.current_category());
        }
        BgmCommand::Status { reply } => {
            let _ = reply.send(manager.status());
        }
    }
}

fn apply_effect<B: EffectBackend>(effects: &mut EffectPlayer<B>, command: EffectCommand) {
    match command {
        EffectCommand::Play { name } => effects.play(&name),
        EffectCommand::Stop { name } => effects.stop(&name),
        EffectCommand::StopAll => effects.stop_all(),
        EffectCommand::SetMuted { muted } => effects.set_muted(muted),
        EffectCommand::ToggleMute { reply } => {
            let _ = reply.send(effects.toggle_mute());
        }
        EffectCommand::SetVolume { volume } => effects.set_volume(volume),
        EffectCommand::Volume { reply } => {
            let _ = reply.send(effects.volume());
        }
        EffectCommand::Status { reply } => {
            let _ = reply.send(effects.status());
        }
    }
}
