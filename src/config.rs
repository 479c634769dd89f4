use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio_system::effects::{default_sound_definitions, SoundDefinition, SoundLibrary};
use crate::audio_system::fade::DEFAULT_FADE_STEPS;
use crate::audio_system::manifest::ManifestSource;
use crate::audio_system::{Category, CategoryRegistry};
use crate::error::ConfigError;

/// Background loop timing and level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopSettings {
    /// Loop volume at global volume 1.0, kept below effects so they stay audible
    pub base_volume: f32,

    /// Silence between two loop iterations
    pub gap_ms: u64,

    /// Fade-in on start and fade-out on stop
    pub fade_ms: u64,

    /// Volume steps per fade
    pub fade_steps: u32,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            base_volume: 0.4,
            gap_ms: 2000,
            fade_ms: 1000,
            fade_steps: DEFAULT_FADE_STEPS,
        }
    }
}

impl LoopSettings {
    pub fn gap(&self) -> Duration {
        Duration::from_millis(self.gap_ms)
    }

    pub fn fade(&self) -> Duration {
        Duration::from_millis(self.fade_ms)
    }
}

fn default_categories() -> BTreeMap<String, Vec<String>> {
    let registry = CategoryRegistry::with_defaults();
    Category::ALL
        .iter()
        .map(|category| {
            let tracks = registry
                .tracks(*category)
                .map(|list| list.to_vec())
                .unwrap_or_default();
            (category.name().to_string(), tracks)
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Root of the static assets; effects resolve against it, tracks against `<assets_dir>/bgm`
    pub assets_dir: PathBuf,

    /// Custom track manifest: an http(s) URL or a path relative to `assets_dir`
    pub manifest: Option<String>,

    /// Background loop settings
    pub bgm: LoopSettings,

    /// Initial global effect volume (0.0-1.0)
    pub effects_volume: f32,

    /// Track lists per category name
    pub categories: BTreeMap<String, Vec<String>>,

    /// One-shot effect definitions
    pub sounds: BTreeMap<String, SoundDefinition>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("static"),
            manifest: Some("bgm/custom/manifest.json".to_string()),
            bgm: LoopSettings::default(),
            effects_volume: 1.0,
            categories: default_categories(),
            sounds: default_sound_definitions(),
        }
    }
}

impl AudioConfig {
    /// Load configuration from `path`.
    /// Creates the default config if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })?;
            let config: AudioConfig =
                serde_json::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.display().to_string(),
                    source: Box::new(e),
                })?;
            config.validate()?;

            tracing::info!("Loaded audio config from: {}", path.display());
            Ok(config)
        } else {
            let config = AudioConfig::default();
            config.save(path)?;
            tracing::info!("Created default audio config at: {}", path.display());
            Ok(config)
        }
    }

    /// Save configuration to disk
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::DirectoryCreationFailed {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        fs::write(path, json).map_err(|e| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;

        Ok(())
    }

    /// Reject values the audio thread cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.bgm.base_volume) {
            return Err(ConfigError::Invalid(format!(
                "bgm.base_volume {} must be 0.0-1.0",
                self.bgm.base_volume
            )));
        }
        if !(0.0..=1.0).contains(&self.effects_volume) {
            return Err(ConfigError::Invalid(format!(
                "effects_volume {} must be 0.0-1.0",
                self.effects_volume
            )));
        }
        if self.bgm.fade_steps == 0 {
            return Err(ConfigError::Invalid("bgm.fade_steps must be at least 1".to_string()));
        }
        for name in self.categories.keys() {
            name.parse::<Category>()
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }
        for (name, def) in &self.sounds {
            if def.sources.is_empty() {
                return Err(ConfigError::Invalid(format!("sound {} has no sources", name)));
            }
        }
        Ok(())
    }

    /// Default config file location (in app's base directory)
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let exe_path = env::current_exe().map_err(|e| ConfigError::LoadFailed {
            path: "current executable".to_string(),
            source: Box::new(e),
        })?;
        let exe_dir = exe_path
            .parent()
            .ok_or_else(|| ConfigError::Invalid("Could not determine executable directory".to_string()))?;

        Ok(exe_dir.join("config").join("audio.json"))
    }

    /// Category registry seeded from the configured track lists
    pub fn registry(&self) -> Result<CategoryRegistry, ConfigError> {
        let mut registry = CategoryRegistry::new();
        for (name, tracks) in &self.categories {
            let category = name
                .parse::<Category>()
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
            registry.replace(category, tracks.clone());
        }
        Ok(registry)
    }

    pub fn sound_library(&self) -> SoundLibrary {
        SoundLibrary::new(self.sounds.clone())
    }

    pub fn bgm_dir(&self) -> PathBuf {
        self.assets_dir.join("bgm")
    }

    pub fn manifest_source(&self) -> Option<ManifestSource> {
        self.manifest
            .as_deref()
            .map(|location| ManifestSource::parse(location, &self.assets_dir))
    }
}
