/// rodio output backend
///
/// Audio files are read into memory once and decoded from a shared buffer on
/// every play, so a replay never touches the disk. Each background track gets
/// its own `Sink`; an empty callback queued after the decoder reports the
/// natural end of the track to the audio thread.
use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use crossbeam_channel::Sender;
use rodio::source::EmptyCallback;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};

use super::backend::{EffectBackend, EffectSound, HandleId, PlaybackHandle, TrackBackend};
use crate::error::AudioError;
use crate::messaging::AudioMessage;

fn read_audio(path: &Path) -> Result<Arc<[u8]>, AudioError> {
    let bytes = fs::read(path).map_err(|e| AudioError::LoadFailed {
        path: path.display().to_string(),
        source: Box::new(e),
    })?;
    tracing::debug!("Preloaded {} ({} bytes)", path.display(), bytes.len());
    Ok(Arc::from(bytes))
}

fn decode(data: &Arc<[u8]>, path: &str) -> Result<Decoder<Cursor<Arc<[u8]>>>, AudioError> {
    Decoder::new(Cursor::new(Arc::clone(data))).map_err(|e| AudioError::DecodeFailed {
        path: path.to_string(),
        source: Box::new(e),
    })
}

/// Backend playing through the default output device.
///
/// Must stay on the thread that created it: the output stream is not `Send`.
#[derive(Clone)]
pub struct RodioBackend {
    _stream: Rc<OutputStream>,
    handle: OutputStreamHandle,
    assets_dir: PathBuf,
    bgm_dir: PathBuf,
    events: Sender<AudioMessage>,
    tracks: HashMap<String, Arc<[u8]>>,
}

impl RodioBackend {
    /// Open the default output device.
    ///
    /// Effects resolve against `assets_dir`, tracks against `bgm_dir`.
    pub fn new(
        assets_dir: impl Into<PathBuf>,
        bgm_dir: impl Into<PathBuf>,
        events: Sender<AudioMessage>,
    ) -> Result<Self, AudioError> {
        let (stream, handle) =
            OutputStream::try_default().map_err(|e| AudioError::StreamInitFailed(Box::new(e)))?;
        tracing::info!("Audio output stream opened");

        Ok(Self {
            _stream: Rc::new(stream),
            handle,
            assets_dir: assets_dir.into(),
            bgm_dir: bgm_dir.into(),
            events,
            tracks: HashMap::new(),
        })
    }

    fn track_data(&mut self, locator: &str) -> Result<Arc<[u8]>, AudioError> {
        if let Some(data) = self.tracks.get(locator) {
            return Ok(Arc::clone(data));
        }
        let data = read_audio(&self.bgm_dir.join(locator))?;
        self.tracks.insert(locator.to_string(), Arc::clone(&data));
        Ok(data)
    }

    fn new_sink(&self) -> Result<Sink, AudioError> {
        Sink::try_new(&self.handle).map_err(|e| AudioError::PlaybackFailed(Box::new(e)))
    }
}

/// One background track on its own sink
pub struct RodioTrack {
    sink: Sink,
}

impl PlaybackHandle for RodioTrack {
    fn play(&mut self) {
        self.sink.play();
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn stop(&mut self) {
        // A late end callback from this sink carries a stale id and is ignored
        self.sink.stop();
    }

    fn set_volume(&mut self, volume: f32) {
        self.sink.set_volume(volume.clamp(0.0, 1.0));
    }

    fn volume(&self) -> f32 {
        self.sink.volume()
    }
}

impl TrackBackend for RodioBackend {
    type Handle = RodioTrack;

    fn open_track(&mut self, id: HandleId, locator: &str) -> Result<Self::Handle, AudioError> {
        let data = self.track_data(locator)?;
        let source = decode(&data, locator)?;

        let sink = self.new_sink()?;
        sink.pause();
        sink.set_volume(0.0);
        sink.append(source);

        let events = self.events.clone();
        sink.append(EmptyCallback::<f32>::new(Box::new(move || {
            let _ = events.send(AudioMessage::TrackEnded(id));
        })));

        tracing::debug!("Opened track {} as {}", locator, id);
        Ok(RodioTrack { sink })
    }
}

/// A preloaded effect; every play gets a fresh sink so instances overlap
pub struct RodioEffect {
    name: String,
    data: Arc<[u8]>,
    handle: OutputStreamHandle,
    sinks: Vec<Sink>,
    volume: f32,
}

impl EffectSound for RodioEffect {
    fn play(&mut self) {
        self.sinks.retain(|sink| !sink.empty());

        let source = match decode(&self.data, &self.name) {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!("{}", e);
                return;
            }
        };
        match Sink::try_new(&self.handle) {
            Ok(sink) => {
                sink.set_volume(self.volume);
                sink.append(source);
                self.sinks.push(sink);
            }
            Err(e) => tracing::warn!("Failed to play effect {}: {}", self.name, e),
        }
    }

    fn stop(&mut self) {
        for sink in self.sinks.drain(..) {
            sink.stop();
        }
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        for sink in &self.sinks {
            sink.set_volume(self.volume);
        }
    }
}

impl EffectBackend for RodioBackend {
    type Sound = RodioEffect;

    fn load_effect(
        &mut self,
        name: &str,
        sources: &[String],
        volume: f32,
    ) -> Result<Self::Sound, AudioError> {
        for source in sources {
            let path = self.assets_dir.join(source);
            let data = match read_audio(&path) {
                Ok(data) => data,
                Err(e) => {
                    tracing::debug!("Effect {} source {} unavailable: {}", name, source, e);
                    continue;
                }
            };

            // Decode once up front so a broken file falls through to the next source
            match decode(&data, source) {
                Ok(decoder) => {
                    let _ = decoder.count();
                }
                Err(e) => {
                    tracing::debug!("Effect {} source {} undecodable: {}", name, source, e);
                    continue;
                }
            }

            return Ok(RodioEffect {
                name: name.to_string(),
                data,
                handle: self.handle.clone(),
                sinks: Vec::new(),
                volume: volume.clamp(0.0, 1.0),
            });
        }

        Err(AudioError::NoSources(name.to_string()))
    }
}
