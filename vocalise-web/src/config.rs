//! Configuration for vocalise-web.
//!
//! Resolution order: built-in defaults, then an optional TOML file
//! (`VOCALISE_CONFIG` or `./vocalise.toml`), then `VOCALISE_*`
//! environment overrides.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

/// Application settings supplied to the pipeline from outside.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Listen address, e.g. "127.0.0.1:5730".
    pub bind_addr: String,
    /// Directory for uploaded songs.
    pub upload_dir: PathBuf,
    /// Directory for user recordings.
    pub recording_dir: PathBuf,
    /// Maximum accepted upload size in bytes.
    pub max_upload_bytes: u64,
    /// Allowed upload file extensions (lowercase, no dot).
    pub allowed_extensions: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5730".to_string(),
            upload_dir: PathBuf::from("uploads"),
            recording_dir: PathBuf::from("recordings"),
            max_upload_bytes: 100 * 1024 * 1024,
            allowed_extensions: ["mp3", "wav", "flac", "m4a", "ogg"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl Settings {
    /// Load settings: defaults -> TOML file (if present) -> env overrides.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("VOCALISE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("vocalise.toml"));

        let mut settings = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            let settings: Settings = toml::from_str(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?;
            tracing::info!(path = %path.display(), "configuration loaded from TOML");
            settings
        } else {
            Settings::default()
        };

        if let Ok(addr) = std::env::var("VOCALISE_BIND_ADDR") {
            settings.bind_addr = addr;
        }
        if let Ok(dir) = std::env::var("VOCALISE_UPLOAD_DIR") {
            settings.upload_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("VOCALISE_RECORDING_DIR") {
            settings.recording_dir = PathBuf::from(dir);
        }
        if let Ok(bytes) = std::env::var("VOCALISE_MAX_UPLOAD_BYTES") {
            settings.max_upload_bytes = bytes
                .parse()
                .context("VOCALISE_MAX_UPLOAD_BYTES must be an integer")?;
        }

        Ok(settings)
    }

    /// Create storage directories if missing.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.upload_dir)?;
        std::fs::create_dir_all(&self.recording_dir)?;
        Ok(())
    }

    /// Whether the given file extension (without dot) is accepted.
    pub fn extension_allowed(&self, extension: &str) -> bool {
        let extension = extension.to_ascii_lowercase();
        self.allowed_extensions.iter().any(|e| *e == extension)
    }

    /// Extract and validate the extension of an uploaded filename.
    pub fn upload_extension(&self, filename: &str) -> Option<String> {
        let extension = Path::new(filename).extension()?.to_str()?.to_ascii_lowercase();
        self.extension_allowed(&extension).then_some(extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let settings = Settings::default();
        assert_eq!(settings.max_upload_bytes, 100 * 1024 * 1024);
        assert!(settings.extension_allowed("mp3"));
        assert!(settings.extension_allowed("WAV"));
        assert!(!settings.extension_allowed("exe"));
    }

    #[test]
    fn upload_extension_requires_allowed_suffix() {
        let settings = Settings::default();
        assert_eq!(settings.upload_extension("song.MP3"), Some("mp3".into()));
        assert_eq!(settings.upload_extension("song.txt"), None);
        assert_eq!(settings.upload_extension("song"), None);
    }

    #[test]
    fn toml_overrides_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            bind_addr = "0.0.0.0:9000"
            max_upload_bytes = 1024
            "#,
        )
        .unwrap();
        assert_eq!(settings.bind_addr, "0.0.0.0:9000");
        assert_eq!(settings.max_upload_bytes, 1024);
        // Unspecified fields keep their defaults.
        assert_eq!(settings.upload_dir, PathBuf::from("uploads"));
    }
}
