/// Custom track manifest
///
/// The `custom` category has no built-in tracks. Its list comes from a JSON
/// manifest (`{"tracks": [...]}`) next to the custom track files, fetched once
/// at startup. Failure to load it is logged and leaves the list as it was.
use std::fs;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::category::{Category, SharedRegistry};
use crate::error::ManifestError;

/// Extensions accepted as custom tracks, compared case-insensitively
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["mp3", "wav", "ogg", "m4a", "flac"];

const MANIFEST_FILE: &str = "manifest.json";
const CUSTOM_PREFIX: &str = "custom/";

/// Where the manifest lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSource {
    Url(String),
    File(PathBuf),
}

impl ManifestSource {
    /// http(s) locations are URLs, anything else a path under `assets_dir`
    pub fn parse(location: &str, assets_dir: &Path) -> Self {
        let lower = location.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            ManifestSource::Url(location.to_string())
        } else {
            ManifestSource::File(assets_dir.join(location))
        }
    }

    fn describe(&self) -> String {
        match self {
            ManifestSource::Url(url) => url.clone(),
            ManifestSource::File(path) => path.display().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BgmManifest {
    #[serde(default)]
    pub tracks: Vec<String>,

    /// Generation time. Written as RFC 3339, read back as any JSON value
    /// since only `tracks` decides whether a manifest is usable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

fn is_supported(file: &str) -> bool {
    Path::new(file)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Track locators for the `custom` category, in manifest order
pub fn custom_tracks(manifest: &BgmManifest) -> Vec<String> {
    manifest
        .tracks
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .filter(|t| {
            let ok = is_supported(t);
            if !ok {
                tracing::debug!("Skipping manifest entry {:?} (unsupported type)", t);
            }
            ok
        })
        .map(|t| format!("{}{}", CUSTOM_PREFIX, t))
        .collect()
}

/// Fetch and parse a manifest
pub fn fetch_manifest(source: &ManifestSource) -> Result<BgmManifest, ManifestError> {
    let body = match source {
        ManifestSource::Url(url) => {
            let user_agent = format!("battle-audio/{}", env!("CARGO_PKG_VERSION"));
            let response = match ureq::get(url)
                .set("User-Agent", &user_agent)
                .set("Accept", "application/json")
                .timeout(Duration::from_secs(10))
                .call()
            {
                Ok(resp) => resp,
                Err(ureq::Error::Status(status, _)) => {
                    return Err(ManifestError::Status {
                        url: url.clone(),
                        status,
                    })
                }
                Err(e) => {
                    return Err(ManifestError::Network {
                        url: url.clone(),
                        source: Box::new(e),
                    })
                }
            };

            response.into_string().map_err(|e| ManifestError::Io {
                path: url.clone(),
                source: e,
            })?
        }
        ManifestSource::File(path) => fs::read_to_string(path).map_err(|e| ManifestError::Io {
            path: path.display().to_string(),
            source: e,
        })?,
    };

    serde_json::from_str(&body).map_err(ManifestError::Parse)
}

/// Replace the custom list with the manifest's tracks.
/// With no usable entries the current list is kept.
pub fn apply_manifest(registry: &SharedRegistry, manifest: &BgmManifest) -> Result<usize, ManifestError> {
    let tracks = custom_tracks(manifest);
    if tracks.is_empty() {
        return Err(ManifestError::NoTracks);
    }
    let count = tracks.len();
    registry.write().replace(Category::Custom, tracks);
    Ok(count)
}

/// Fetch and apply; failures are logged, never returned
pub fn load_custom_tracks(source: &ManifestSource, registry: &SharedRegistry) -> usize {
    let result = fetch_manifest(source).and_then(|manifest| apply_manifest(registry, &manifest));
    match result {
        Ok(count) => {
            tracing::info!("Loaded {} custom track(s) from {}", count, source.describe());
            count
        }
        Err(e) => {
            tracing::warn!("Custom tracks unavailable ({}): {}", source.describe(), e);
            0
        }
    }
}

/// Load the manifest on a background thread
pub fn spawn_manifest_load(source: ManifestSource, registry: SharedRegistry) -> JoinHandle<usize> {
    thread::spawn(move || load_custom_tracks(&source, &registry))
}

/// Supported audio files in `dir`, sorted by name
pub fn scan_custom_dir(dir: &Path) -> Result<Vec<String>, ManifestError> {
    let entries = fs::read_dir(dir).map_err(|e| ManifestError::Io {
        path: dir.display().to_string(),
        source: e,
    })?;

    let mut files: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| is_supported(name))
        .collect();
    files.sort();
    Ok(files)
}

/// Scan `dir` and write `dir/manifest.json`
pub fn write_manifest(dir: &Path) -> Result<BgmManifest, ManifestError> {
    let tracks = scan_custom_dir(dir)?;
    let generated = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

    let manifest = BgmManifest {
        tracks,
        generated: Some(serde_json::Value::String(generated)),
        note: Some("Generated file. Drop audio files into this folder and regenerate.".to_string()),
    };

    let path = dir.join(MANIFEST_FILE);
    let mut json = serde_json::to_string_pretty(&manifest).map_err(ManifestError::Parse)?;
    json.push('\n');
    fs::write(&path, json).map_err(|e| ManifestError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    tracing::info!("Wrote manifest with {} track(s) to {}", manifest.tracks.len(), path.display());
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_system::category::{shared, CategoryRegistry};
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;

    /// Serve one canned HTTP response on a local port, returning the manifest URL
    fn serve_once(response: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/bgm/custom/manifest.json", listener.local_addr().unwrap());
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut line = String::new();
                while reader.read_line(&mut line).map(|n| n > 0).unwrap_or(false) {
                    if line == "\r\n" {
                        break;
                    }
                    line.clear();
                }
                let _ = stream.write_all(response.as_bytes());
            }
        });
        url
    }

    fn manifest(tracks: &[&str]) -> BgmManifest {
        BgmManifest {
            tracks: tracks.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_custom_tracks_filters_and_prefixes() {
        let tracks = custom_tracks(&manifest(&["x.mp3", "y.mp3", "notes.txt"]));
        assert_eq!(tracks, vec!["custom/x.mp3", "custom/y.mp3"]);
    }

    #[test]
    fn test_extension_check_is_case_insensitive() {
        let tracks = custom_tracks(&manifest(&["LOUD.MP3", "a.Flac", "noext", ""]));
        assert_eq!(tracks, vec!["custom/LOUD.MP3", "custom/a.Flac"]);
    }

    #[test]
    fn test_parse_source() {
        let assets = Path::new("static");
        assert_eq!(
            ManifestSource::parse("https://cdn.example.com/manifest.json", assets),
            ManifestSource::Url("https://cdn.example.com/manifest.json".to_string())
        );
        assert_eq!(
            ManifestSource::parse("bgm/custom/manifest.json", assets),
            ManifestSource::File(PathBuf::from("static/bgm/custom/manifest.json"))
        );
    }

    #[test]
    fn test_apply_manifest_replaces_custom_list() {
        let registry = shared(CategoryRegistry::with_defaults());
        let count = apply_manifest(&registry, &manifest(&["x.mp3", "y.mp3", "notes.txt"])).unwrap();

        assert_eq!(count, 2);
        let tracks = registry.read().tracks(Category::Custom).unwrap();
        assert_eq!(&tracks[..], &["custom/x.mp3".to_string(), "custom/y.mp3".to_string()]);
    }

    #[test]
    fn test_empty_manifest_keeps_previous_list() {
        let registry = shared(CategoryRegistry::with_defaults());
        let before = registry.read().tracks(Category::Custom).unwrap();

        let result = apply_manifest(&registry, &manifest(&["readme.md"]));
        assert!(matches!(result, Err(ManifestError::NoTracks)));
        assert_eq!(registry.read().tracks(Category::Custom).unwrap(), before);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        fs::write(&path, r#"{"tracks": ["x.mp3", "y.mp3", "notes.txt"], "generated": 1700000000}"#).unwrap();

        let registry = shared(CategoryRegistry::new());
        assert_eq!(load_custom_tracks(&ManifestSource::File(path), &registry), 2);
        assert_eq!(registry.read().tracks(Category::Custom).unwrap().len(), 2);
    }

    #[test]
    fn test_string_timestamp_and_note_are_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        fs::write(
            &path,
            r#"{"tracks": ["x.mp3", "y.mp3"], "generated": "2025-01-01T00:00:00.000Z", "note": "auto-generated"}"#,
        )
        .unwrap();

        let registry = shared(CategoryRegistry::with_defaults());
        assert_eq!(load_custom_tracks(&ManifestSource::File(path), &registry), 2);
        assert_eq!(
            &registry.read().tracks(Category::Custom).unwrap()[..],
            &["custom/x.mp3".to_string(), "custom/y.mp3".to_string()]
        );
    }

    #[test]
    fn test_missing_or_malformed_file_is_logged_only() {
        let dir = tempfile::tempdir().unwrap();
        let registry = shared(CategoryRegistry::with_defaults());

        let missing = ManifestSource::File(dir.path().join("absent.json"));
        assert!(matches!(fetch_manifest(&missing), Err(ManifestError::Io { .. })));
        assert_eq!(load_custom_tracks(&missing, &registry), 0);

        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{ tracks: ").unwrap();
        let broken = ManifestSource::File(broken);
        assert!(matches!(fetch_manifest(&broken), Err(ManifestError::Parse(_))));

        assert!(registry.read().tracks(Category::Custom).is_ok());
    }

    #[test]
    fn test_spawned_load_completes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        fs::write(&path, r#"{"tracks": ["late.ogg"]}"#).unwrap();

        let registry = shared(CategoryRegistry::new());
        let handle = spawn_manifest_load(ManifestSource::File(path), std::sync::Arc::clone(&registry));
        assert_eq!(handle.join().unwrap(), 1);
        assert_eq!(&registry.read().tracks(Category::Custom).unwrap()[..], &["custom/late.ogg".to_string()]);
    }

    #[test]
    fn test_write_manifest_scans_directory() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.mp3", "a.WAV", "cover.png"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("nested.mp3")).unwrap();

        let written = write_manifest(dir.path()).unwrap();
        assert_eq!(written.tracks, vec!["a.WAV", "b.mp3"]);
        let stamp = written.generated.as_ref().and_then(|g| g.as_str()).unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok());

        let source = ManifestSource::File(dir.path().join(MANIFEST_FILE));
        assert_eq!(fetch_manifest(&source).unwrap(), written);
    }

    #[test]
    fn test_fetch_from_url() {
        let body = r#"{"tracks": ["x.mp3", "y.mp3"], "generated": "2025-01-01T00:00:00.000Z"}"#;
        let url = serve_once(format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        ));

        let registry = shared(CategoryRegistry::with_defaults());
        assert_eq!(load_custom_tracks(&ManifestSource::Url(url), &registry), 2);
        assert_eq!(registry.read().len(Category::Custom), 2);
    }

    #[test]
    fn test_url_error_status_is_reported() {
        let url = serve_once(
            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string(),
        );

        let result = fetch_manifest(&ManifestSource::Url(url.clone()));
        match result {
            Err(ManifestError::Status { url: failed, status }) => {
                assert_eq!(status, 404);
                assert_eq!(failed, url);
            }
            other => panic!("Expected status error, got {:?}", other),
        }
    }

    #[test]
    fn test_unreachable_url_is_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/manifest.json", listener.local_addr().unwrap());
        drop(listener);

        let registry = shared(CategoryRegistry::with_defaults());
        let source = ManifestSource::Url(url);
        assert!(matches!(fetch_manifest(&source), Err(ManifestError::Network { .. })));
        assert_eq!(load_custom_tracks(&source, &registry), 0);
        assert_eq!(
            &registry.read().tracks(Category::Custom).unwrap()[..],
            &["custom/fallback.mp3".to_string()]
        );
    }
}
