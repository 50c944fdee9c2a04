//! Configuration – reads/writes `~/.raspbot/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use raspbot_hal::CaptureSettings;
use raspbot_types::BotError;
use raspbot_vision::PipelineSettings;

/// Which camera driver to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CameraBackend {
    /// Synthetic frames; no device needed.
    #[default]
    Sim,
    /// A Video4Linux device (requires the `v4l2` feature).
    V4l2,
}

impl CameraBackend {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sim" => Some(CameraBackend::Sim),
            "v4l2" => Some(CameraBackend::V4l2),
            _ => None,
        }
    }
}

impl std::fmt::Display for CameraBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraBackend::Sim => write!(f, "sim"),
            CameraBackend::V4l2 => write!(f, "v4l2"),
        }
    }
}

/// Persisted configuration stored in `~/.raspbot/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub camera: CameraConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Where stills are written and the gallery reads from.
    #[serde(default = "default_save_dir")]
    pub save_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(default)]
    pub backend: CameraBackend,
    #[serde(default = "default_device")]
    pub device: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_warmup_grabs")]
    pub warmup_grabs: u32,
    #[serde(default = "default_flush_grabs")]
    pub flush_grabs: u32,
    #[serde(default = "default_grab_delay_ms")]
    pub grab_delay_ms: u64,
    #[serde(default = "default_open_cooldown_ms")]
    pub open_cooldown_ms: u64,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    #[serde(default = "default_fps_limit")]
    pub fps_limit: u32,
}

fn default_host() -> String {
    raspbot_cockpit::DEFAULT_HOST.to_string()
}
fn default_port() -> u16 {
    raspbot_cockpit::DEFAULT_PORT
}
fn default_save_dir() -> PathBuf {
    PathBuf::from("/picturesbot")
}
fn default_device() -> String {
    "/dev/video0".to_string()
}
fn default_width() -> u32 {
    640
}
fn default_height() -> u32 {
    480
}
fn default_warmup_grabs() -> u32 {
    25
}
fn default_flush_grabs() -> u32 {
    12
}
fn default_grab_delay_ms() -> u64 {
    10
}
fn default_open_cooldown_ms() -> u64 {
    2000
}
fn default_jpeg_quality() -> u8 {
    80
}
fn default_fps_limit() -> u32 {
    20
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            save_dir: default_save_dir(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            backend: CameraBackend::default(),
            device: default_device(),
            width: default_width(),
            height: default_height(),
            warmup_grabs: default_warmup_grabs(),
            flush_grabs: default_flush_grabs(),
            grab_delay_ms: default_grab_delay_ms(),
            open_cooldown_ms: default_open_cooldown_ms(),
            jpeg_quality: default_jpeg_quality(),
            fps_limit: default_fps_limit(),
        }
    }
}

impl CameraConfig {
    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            warmup_grabs: self.warmup_grabs,
            flush_grabs: self.flush_grabs,
            grab_delay: Duration::from_millis(self.grab_delay_ms),
            open_cooldown: Duration::from_millis(self.open_cooldown_ms),
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            jpeg_quality: self.jpeg_quality.clamp(1, 100),
            fps_limit: self.fps_limit,
            ..PipelineSettings::default()
        }
    }
}

/// `$RASPBOT_CONFIG`, or `~/.raspbot/config.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("RASPBOT_CONFIG") {
        return PathBuf::from(path);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".raspbot").join("config.toml")
}

/// Load the config, falling back to defaults when the file does not exist,
/// then apply environment overrides.
pub fn load() -> Result<Config, BotError> {
    let mut cfg = load_from(&config_path())?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Load the config from a specific path. Returns `None` if the file does
/// not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, BotError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| BotError::Config(format!("failed to read {}: {e}", path.display())))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| BotError::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Apply `RASPBOT_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `RASPBOT_HOST` | `server.host` |
/// | `RASPBOT_PORT` | `server.port` |
/// | `RASPBOT_SAVE_DIR` | `storage.save_dir` |
/// | `RASPBOT_CAMERA_BACKEND` | `camera.backend` (`sim` or `v4l2`) |
/// | `RASPBOT_CAMERA_DEVICE` | `camera.device` |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides(cfg, |key| std::env::var(key).ok());
}

pub(crate) fn apply_overrides(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("RASPBOT_HOST") {
        cfg.server.host = v;
    }
    if let Some(v) = lookup("RASPBOT_PORT")
        && let Ok(port) = v.trim().parse::<u16>()
    {
        cfg.server.port = port;
    }
    if let Some(v) = lookup("RASPBOT_SAVE_DIR") {
        cfg.storage.save_dir = PathBuf::from(v);
    }
    if let Some(v) = lookup("RASPBOT_CAMERA_BACKEND")
        && let Some(backend) = CameraBackend::parse(&v)
    {
        cfg.camera.backend = backend;
    }
    if let Some(v) = lookup("RASPBOT_CAMERA_DEVICE") {
        cfg.camera.device = v;
    }
}

/// Save the config to disk, creating the parent directory if necessary.
pub fn save(cfg: &Config) -> Result<(), BotError> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), BotError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| BotError::Config(format!("failed to create {}: {e}", parent.display())))?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| BotError::Config(format!("failed to serialize config: {e}")))?;
    fs::write(path, raw)
        .map_err(|e| BotError::Config(format!("failed to write {}: {e}", path.display())))?;
    Ok(())
}
