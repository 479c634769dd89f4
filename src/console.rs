/// Line commands for the console driver
///
/// One command per line, e.g. `play menu`, `topic philosophy`, `sfx crit`,
/// `volume 0.5`. Parsing is separate from execution so it can be tested
/// without an audio thread.
use crate::audio_system::Category;
use crate::messaging::AudioService;

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Play(Category),
    Topic(String),
    Stop,
    Pause,
    Resume,
    Mute,
    Unmute,
    ToggleMute,
    Volume(f32),
    Effect(String),
    StopEffect(Option<String>),
    ToggleEffectsMute,
    EffectsVolume(f32),
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  play <menu|battle_ai|battle_cs|battle_philosophy|custom>
  topic <name>          battle music for a quiz topic
  stop | pause | resume
  mute | unmute | togglemute
  volume <0.0-1.0>
  sfx <name>            play an effect
  sfxstop [name]        stop one effect or all
  sfxmute               toggle effect mute
  sfxvolume <0.0-1.0>
  status | help | quit";

fn parse_volume(arg: Option<&str>) -> Result<f32, String> {
    let arg = arg.ok_or_else(|| "missing volume".to_string())?;
    arg.parse::<f32>()
        .map_err(|_| format!("invalid volume: {}", arg))
}

/// Parse one input line. Blank lines are `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, Some(rest.trim()).filter(|r| !r.is_empty())),
        None => (line, None),
    };

    let command = match word.to_lowercase().as_str() {
        "play" => {
            let name = rest.ok_or_else(|| "missing category".to_string())?;
            let category = name.parse::<Category>().map_err(|e| e.to_string())?;
            ConsoleCommand::Play(category)
        }
        "topic" => ConsoleCommand::Topic(rest.ok_or_else(|| "missing topic".to_string())?.to_string()),
        "stop" => ConsoleCommand::Stop,
        "pause" => ConsoleCommand::Pause,
        "resume" => ConsoleCommand::Resume,
        "mute" => ConsoleCommand::Mute,
        "unmute" => ConsoleCommand::Unmute,
        "togglemute" => ConsoleCommand::ToggleMute,
        "volume" => ConsoleCommand::Volume(parse_volume(rest)?),
        "sfx" => ConsoleCommand::Effect(rest.ok_or_else(|| "missing effect name".to_string())?.to_string()),
        "sfxstop" => ConsoleCommand::StopEffect(rest.map(|r| r.to_string())),
        "sfxmute" => ConsoleCommand::ToggleEffectsMute,
        "sfxvolume" => ConsoleCommand::EffectsVolume(parse_volume(rest)?),
        "status" => ConsoleCommand::Status,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(format!("unknown command: {}", other)),
    };
    Ok(Some(command))
}

/// Run a command against the service, returning text to print
pub fn execute(service: &AudioService, command: &ConsoleCommand) -> Option<String> {
    match command {
        ConsoleCommand::Play(category) => service.play(*category),
        ConsoleCommand::Topic(topic) => service.play_for_topic(topic),
        ConsoleCommand::Stop => service.stop(),
        ConsoleCommand::Pause => service.pause(),
        ConsoleCommand::Resume => service.resume(),
        ConsoleCommand::Mute => service.set_muted(true),
        ConsoleCommand::Unmute => service.set_muted(false),
        ConsoleCommand::ToggleMute => {
            return Some(format!("music muted: {}", service.toggle_mute()));
        }
        ConsoleCommand::Volume(volume) => service.set_volume(*volume),
        ConsoleCommand::Effect(name) => service.play_effect(name),
        ConsoleCommand::StopEffect(Some(name)) => service.stop_effect(name),
        ConsoleCommand::StopEffect(None) => service.stop_all_effects(),
        ConsoleCommand::ToggleEffectsMute => {
            return Some(format!("effects muted: {}", service.toggle_effects_mute()));
        }
        ConsoleCommand::EffectsVolume(volume) => service.set_effects_volume(*volume),
        ConsoleCommand::Status => {
            let music = match service.status() {
                Some(status) => format!(
                    "music: {} ({}), muted: {}, volume: {:.2}",
                    status.phase.description(),
                    status
                        .category()
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    status.muted,
                    status.volume
                ),
                None => "music: unavailable".to_string(),
            };
            let effects = match service.effects_status() {
                Some(status) => format!(
                    "effects: muted: {}, volume: {:.2}, loaded: {}",
                    status.muted, status.volume, status.loaded
                ),
                None => "effects: unavailable".to_string(),
            };
            return Some(format!("{}\n{}", music, effects));
        }
        ConsoleCommand::Help => return Some(HELP.to_string()),
        ConsoleCommand::Quit => {}
    }
    None
}
