/// Messages for the audio thread
///
/// Commands represent requests from the game (imperative). Queries carry a
/// reply sender; when the audio thread is gone the sender is dropped and the
/// caller sees a closed channel.
use crossbeam_channel::Sender;

use crate::audio_system::{Category, HandleId};
use crate::state::{BgmStatus, EffectsStatus};

/// Background music commands
#[derive(Debug, Clone)]
pub enum BgmCommand {
    Play { category: Category },
    PlayForTopic { topic: String },
    Stop,
    Pause,
    Resume,
    SetMuted { muted: bool },
    ToggleMute { reply: Sender<bool> },
    SetVolume { volume: f32 },
    IsMuted { reply: Sender<bool> },
    Volume { reply: Sender<f32> },
    CurrentCategory { reply: Sender<Option<Category>> },
    Status { reply: Sender<BgmStatus> },
}

/// Sound effect commands
#[derive(Debug, Clone)]
pub enum EffectCommand {
    Play { name: String },
    Stop { name: String },
    StopAll,
    SetMuted { muted: bool },
    ToggleMute { reply: Sender<bool> },
    SetVolume { volume: f32 },
    Volume { reply: Sender<f32> },
    Status { reply: Sender<EffectsStatus> },
}

#[derive(Debug, Clone)]
pub enum AudioCommand {
    Bgm(BgmCommand),
    Effect(EffectCommand),
}

impl AudioCommand {
    /// Get a human-readable description of the command
    pub fn description(&self) -> String {
        match self {
            AudioCommand::Bgm(cmd) => match cmd {
                BgmCommand::Play { category } => format!("Play {}", category),
                BgmCommand::PlayForTopic { topic } => format!("Play battle music for {:?}", topic),
                BgmCommand::Stop => "Stop music".to_string(),
                BgmCommand::Pause => "Pause music".to_string(),
                BgmCommand::Resume => "Resume music".to_string(),
                BgmCommand::SetMuted { muted } => format!("Set music muted: {}", muted),
                BgmCommand::ToggleMute { .. } => "Toggle music mute".to_string(),
                BgmCommand::SetVolume { volume } => format!("Set music volume: {}", volume),
                BgmCommand::IsMuted { .. } => "Query music mute".to_string(),
                BgmCommand::Volume { .. } => "Query music volume".to_string(),
                BgmCommand::CurrentCategory { .. } => "Query current category".to_string(),
                BgmCommand::Status { .. } => "Query music status".to_string(),
            },
            AudioCommand::Effect(cmd) => match cmd {
                EffectCommand::Play { name } => format!("Play effect {}", name),
                EffectCommand::Stop { name } => format!("Stop effect {}", name),
                EffectCommand::StopAll => "Stop all effects".to_string(),
                EffectCommand::SetMuted { muted } => format!("Set effects muted: {}", muted),
                EffectCommand::ToggleMute { .. } => "Toggle effects mute".to_string(),
                EffectCommand::SetVolume { volume } => format!("Set effects volume: {}", volume),
                EffectCommand::Volume { .. } => "Query effects volume".to_string(),
                EffectCommand::Status { .. } => "Query effects status".to_string(),
            },
        }
    }
}

/// Everything the audio thread receives on its one channel
#[derive(Debug, Clone)]
pub enum AudioMessage {
    Command(AudioCommand),

    /// A track handle played to its natural end
    TrackEnded(HandleId),

    Shutdown,
}

impl From<BgmCommand> for AudioMessage {
    fn from(cmd: BgmCommand) -> Self {
        AudioMessage::Command(AudioCommand::Bgm(cmd))
    }
}

impl From<EffectCommand> for AudioMessage {
    fn from(cmd: EffectCommand) -> Self {
        AudioMessage::Command(AudioCommand::Effect(cmd))
    }
}
