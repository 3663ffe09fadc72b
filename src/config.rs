use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::FacelinkError;
use crate::frame::{Resolution, WORKING_RESOLUTION};

const DEFAULT_IDENTITIES: [(&str, char); 3] = [("Yarin", '1'), ("Noam", '2'), ("Osher", '3')];
const DEFAULT_UNKNOWN_SIGNAL: char = '4';
const DEFAULT_SERIAL_PORT: &str = "/dev/ttyUSB0";
const DEFAULT_BAUD_RATE: u32 = 9600;
const DEFAULT_READ_TIMEOUT_MS: u64 = 1000;
const DEFAULT_THROTTLE_MS: u64 = 600;
const DEFAULT_SETTLE_MS: u64 = 800;
const DEFAULT_VIDEO_URL: &str = "udp://0.0.0.0:11111";
const DEFAULT_PLATFORM_ADDR: &str = "192.168.10.1:8889";
const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 7000;
const DEFAULT_WINDOW_TITLE: &str = "video";
const DEFAULT_QUIT_KEY: char = 'q';
const DEFAULT_DISPLAY: Resolution = Resolution {
    width: 320,
    height: 240,
};

#[derive(Debug, Deserialize, Default)]
struct FacelinkConfigFile {
    identities: Option<Vec<IdentityConfigFile>>,
    unknown_signal: Option<char>,
    serial: Option<SerialConfigFile>,
    video: Option<VideoConfigFile>,
    platform: Option<PlatformConfigFile>,
    render: Option<RenderConfigFile>,
    detector: Option<DetectorConfigFile>,
}

#[derive(Debug, Deserialize)]
struct IdentityConfigFile {
    name: String,
    image: Option<PathBuf>,
    signal: char,
}

#[derive(Debug, Deserialize, Default)]
struct SerialConfigFile {
    port: Option<String>,
    baud_rate: Option<u32>,
    read_timeout_ms: Option<u64>,
    throttle_ms: Option<u64>,
    settle_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct VideoConfigFile {
    url: Option<String>,
    working_width: Option<u32>,
    working_height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct PlatformConfigFile {
    kind: Option<PlatformKind>,
    address: Option<String>,
    command_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct RenderConfigFile {
    mode: Option<RenderMode>,
    window_title: Option<String>,
    quit_key: Option<char>,
    snapshot_dir: Option<PathBuf>,
    display_width: Option<u32>,
    display_height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<DetectorKind>,
    tolerance: Option<f32>,
    detector_model: Option<PathBuf>,
    embedder_model: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    Tello,
    Simulated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    Window,
    Headless,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    Stub,
    Tract,
}

#[derive(Debug, Clone)]
pub struct FacelinkConfig {
    /// Known identities in priority order.
    pub identities: Vec<IdentitySettings>,
    pub unknown_signal: char,
    pub serial: SerialSettings,
    pub video: VideoSettings,
    pub platform: PlatformSettings,
    pub render: RenderSettings,
    pub detector: DetectorSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IdentitySettings {
    pub name: String,
    pub image: PathBuf,
    pub signal: char,
}

#[derive(Debug, Clone)]
pub struct SerialSettings {
    pub port: String,
    pub baud_rate: u32,
    pub read_timeout: Duration,
    pub throttle: Duration,
    pub settle: Duration,
}

#[derive(Debug, Clone)]
pub struct VideoSettings {
    pub url: String,
    pub working: Resolution,
}

#[derive(Debug, Clone)]
pub struct PlatformSettings {
    pub kind: PlatformKind,
    pub address: String,
    pub command_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub mode: RenderMode,
    pub window_title: String,
    pub quit_key: char,
    pub snapshot_dir: Option<PathBuf>,
    pub display: Resolution,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub kind: DetectorKind,
    pub tolerance: f32,
    pub detector_model: Option<PathBuf>,
    pub embedder_model: Option<PathBuf>,
    pub working: Resolution,
}

impl FacelinkConfig {
    /// Load from `FACELINK_CONFIG` (if set), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("FACELINK_CONFIG").ok().map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: FacelinkConfigFile) -> Result<Self> {
        let identities = match file.identities {
            Some(entries) => entries
                .into_iter()
                .map(|entry| IdentitySettings {
                    image: entry
                        .image
                        .unwrap_or_else(|| PathBuf::from(format!("{}.jpeg", entry.name))),
                    name: entry.name,
                    signal: entry.signal,
                })
                .collect(),
            None => DEFAULT_IDENTITIES
                .iter()
                .map(|(name, signal)| IdentitySettings {
                    name: name.to_string(),
                    image: PathBuf::from(format!("{}.jpeg", name)),
                    signal: *signal,
                })
                .collect(),
        };

        let serial = file.serial.unwrap_or_default();
        let serial = SerialSettings {
            port: serial
                .port
                .unwrap_or_else(|| DEFAULT_SERIAL_PORT.to_string()),
            baud_rate: serial.baud_rate.unwrap_or(DEFAULT_BAUD_RATE),
            read_timeout: Duration::from_millis(
                serial.read_timeout_ms.unwrap_or(DEFAULT_READ_TIMEOUT_MS),
            ),
            throttle: Duration::from_millis(serial.throttle_ms.unwrap_or(DEFAULT_THROTTLE_MS)),
            settle: Duration::from_millis(serial.settle_ms.unwrap_or(DEFAULT_SETTLE_MS)),
        };

        let video = file.video.unwrap_or_default();
        let working = Resolution::new(
            video.working_width.unwrap_or(WORKING_RESOLUTION.width),
            video.working_height.unwrap_or(WORKING_RESOLUTION.height),
        );
        let video = VideoSettings {
            url: video.url.unwrap_or_else(|| DEFAULT_VIDEO_URL.to_string()),
            working,
        };

        let platform = file.platform.unwrap_or_default();
        let platform = PlatformSettings {
            kind: platform.kind.unwrap_or(PlatformKind::Tello),
            address: platform
                .address
                .unwrap_or_else(|| DEFAULT_PLATFORM_ADDR.to_string()),
            command_timeout: Duration::from_millis(
                platform
                    .command_timeout_ms
                    .unwrap_or(DEFAULT_COMMAND_TIMEOUT_MS),
            ),
        };

        let render = file.render.unwrap_or_default();
        let render = RenderSettings {
            mode: render.mode.unwrap_or(RenderMode::Window),
            window_title: render
                .window_title
                .unwrap_or_else(|| DEFAULT_WINDOW_TITLE.to_string()),
            quit_key: render.quit_key.unwrap_or(DEFAULT_QUIT_KEY),
            snapshot_dir: render.snapshot_dir,
            display: Resolution::new(
                render.display_width.unwrap_or(DEFAULT_DISPLAY.width),
                render.display_height.unwrap_or(DEFAULT_DISPLAY.height),
            ),
        };

        let detector = file.detector.unwrap_or_default();
        let detector = DetectorSettings {
            kind: detector.backend.unwrap_or(DetectorKind::Stub),
            tolerance: detector.tolerance.unwrap_or(crate::detect::DEFAULT_TOLERANCE),
            detector_model: detector.detector_model,
            embedder_model: detector.embedder_model,
            working,
        };

        Ok(Self {
            identities,
            unknown_signal: file.unknown_signal.unwrap_or(DEFAULT_UNKNOWN_SIGNAL),
            serial,
            video,
            platform,
            render,
            detector,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(port) = std::env::var("FACELINK_SERIAL_PORT") {
            if !port.trim().is_empty() {
                self.serial.port = port;
            }
        }
        if let Ok(baud) = std::env::var("FACELINK_BAUD_RATE") {
            self.serial.baud_rate = baud
                .parse()
                .map_err(|_| anyhow!("FACELINK_BAUD_RATE must be an integer"))?;
        }
        if let Ok(url) = std::env::var("FACELINK_VIDEO_URL") {
            if !url.trim().is_empty() {
                self.video.url = url;
            }
        }
        if let Ok(kind) = std::env::var("FACELINK_PLATFORM") {
            self.platform.kind = parse_platform_kind(&kind)?;
        }
        if let Ok(mode) = std::env::var("FACELINK_RENDER_MODE") {
            self.render.mode = parse_render_mode(&mode)?;
        }
        if let Ok(ms) = std::env::var("FACELINK_THROTTLE_MS") {
            let ms: u64 = ms
                .parse()
                .map_err(|_| anyhow!("FACELINK_THROTTLE_MS must be an integer number of ms"))?;
            self.serial.throttle = Duration::from_millis(ms);
        }
        if let Ok(ms) = std::env::var("FACELINK_SETTLE_MS") {
            let ms: u64 = ms
                .parse()
                .map_err(|_| anyhow!("FACELINK_SETTLE_MS must be an integer number of ms"))?;
            self.serial.settle = Duration::from_millis(ms);
        }
        Ok(())
    }

    pub fn validate(&mut self) -> Result<()> {
        if self.identities.is_empty() {
            return Err(config_error("at least one identity is required"));
        }
        if !self.unknown_signal.is_ascii_digit() {
            return Err(config_error("unknown_signal must be an ASCII digit"));
        }
        let mut names = HashSet::new();
        for identity in &self.identities {
            if identity.name.trim().is_empty() {
                return Err(config_error("identity names must not be empty"));
            }
            if !names.insert(identity.name.as_str()) {
                return Err(config_error(&format!(
                    "duplicate identity name '{}'",
                    identity.name
                )));
            }
            if !identity.signal.is_ascii_digit() {
                return Err(config_error(&format!(
                    "signal for '{}' must be an ASCII digit",
                    identity.name
                )));
            }
            if identity.signal == self.unknown_signal {
                return Err(config_error(&format!(
                    "signal for '{}' collides with the unknown signal",
                    identity.name
                )));
            }
        }
        if self.video.working.is_empty() {
            return Err(config_error("working resolution must be non-zero"));
        }
        if self.render.display.is_empty() {
            return Err(config_error("display resolution must be non-zero"));
        }
        if self.serial.throttle.is_zero() {
            return Err(config_error("throttle interval must be greater than zero"));
        }
        if self.serial.baud_rate == 0 {
            return Err(config_error("baud rate must be greater than zero"));
        }
        Ok(())
    }
}

pub fn parse_platform_kind(value: &str) -> Result<PlatformKind> {
    match value.trim().to_ascii_lowercase().as_str() {
        "tello" => Ok(PlatformKind::Tello),
        "simulated" | "sim" => Ok(PlatformKind::Simulated),
        other => Err(config_error(&format!("unknown platform kind '{}'", other))),
    }
}

pub fn parse_render_mode(value: &str) -> Result<RenderMode> {
    match value.trim().to_ascii_lowercase().as_str() {
        "window" => Ok(RenderMode::Window),
        "headless" => Ok(RenderMode::Headless),
        other => Err(config_error(&format!("unknown render mode '{}'", other))),
    }
}

fn config_error(message: &str) -> anyhow::Error {
    FacelinkError::Config(message.to_string()).into()
}

fn read_config_file(path: &Path) -> Result<FacelinkConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path.extension().and_then(|ext| ext.to_str()) == Some("toml");
    let cfg = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
