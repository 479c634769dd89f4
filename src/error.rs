use thiserror::Error;

/// Audio subsystem errors using thiserror for structured error handling.
///
/// None of these are fatal: callers log them and degrade to silence.

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Unknown sound: {0}")]
    UnknownSound(String),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Category {0} has no tracks")]
    EmptyCategory(String),

    #[error("Failed to load audio file: {path}")]
    LoadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to decode audio format: {path}")]
    DecodeFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to initialize audio output stream")]
    StreamInitFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Audio playback failed")]
    PlaybackFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("No playable source for {0}")]
    NoSources(String),
}

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to fetch manifest from {url}")]
    Network {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },

    #[error("Manifest request to {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("Failed to parse manifest")]
    Parse(#[source] serde_json::Error),

    #[error("Failed to read or write manifest at {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Manifest lists no playable tracks")]
    NoTracks,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}")]
    LoadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to save configuration to {path}")]
    SaveFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to create config directory: {path}")]
    DirectoryCreationFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Type alias for application Results using anyhow for context chaining
pub type AppResult<T> = anyhow::Result<T>;
