//! Configuration for the sender binary.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use framecast_core::limits::{DEFAULT_MAX_CHUNK_SIZE, DEFAULT_MAX_CHUNKS, MAX_UDP_PAYLOAD};
use framecast_core::{HEADER_SIZE, ProtocolLimits, QualityConfig, SenderConfig};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SendConfig {
    pub network: NetworkConfig,
    pub stream: StreamConfig,
    pub quality: QualitySection,
    pub source: SourceConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Local address to bind the UDP socket to.
    pub bind_address: String,
    /// Receiver address frames are sent to.
    pub remote_address: String,
}

/// Pacing and chunking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub fps: u32,
    /// Payload bytes per chunk. Must match the receiver.
    pub max_chunk_size: usize,
    /// Chunk ceiling per frame. Must match the receiver.
    pub max_chunks: u32,
    /// Write-readiness wait per chunk, in milliseconds.
    pub poll_timeout_ms: u64,
}

/// JPEG quality adaptation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualitySection {
    pub initial: u8,
    pub min: u8,
    pub max: u8,
    pub step: u8,
    /// Consecutive send failures before stepping down.
    pub error_threshold: u32,
}

/// Synthetic capture source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub width: u32,
    pub height: u32,
    /// Stop after this many frames; 0 streams until interrupted.
    pub frame_limit: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:0".into(),
            remote_address: "127.0.0.1:5005".into(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            fps: 30,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            max_chunks: DEFAULT_MAX_CHUNKS,
            poll_timeout_ms: 10,
        }
    }
}

impl Default for QualitySection {
    fn default() -> Self {
        let q = QualityConfig::default();
        Self {
            initial: q.initial_quality,
            min: q.min_quality,
            max: q.max_quality,
            step: q.step,
            error_threshold: q.error_threshold,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            frame_limit: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".into() }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl SendConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.network.bind_address.parse()
    }

    pub fn remote_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.network.remote_address.parse()
    }

    /// Convert into a [`SenderConfig`], clamping values that cannot work.
    pub fn to_sender_config(&self) -> SenderConfig {
        let min = self.quality.min.clamp(1, 100);
        let max = self.quality.max.clamp(min, 100);
        SenderConfig {
            limits: ProtocolLimits {
                max_chunk_size: self.stream.max_chunk_size.clamp(1, MAX_UDP_PAYLOAD - HEADER_SIZE),
                max_chunks: self.stream.max_chunks.max(1),
            },
            quality: QualityConfig {
                min_quality: min,
                max_quality: max,
                step: self.quality.step.max(1),
                error_threshold: self.quality.error_threshold.max(1),
                initial_quality: self.quality.initial.clamp(min, max),
            },
            target_fps: self.stream.fps.clamp(1, 240),
            poll_timeout: Duration::from_millis(self.stream.poll_timeout_ms.max(1)),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let text = toml::to_string_pretty(&SendConfig::default()).unwrap();
        assert!(text.contains("remote_address"));
        assert!(text.contains("max_chunk_size"));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg: SendConfig = toml::from_str("[stream]\nfps = 15\n").unwrap();
        assert_eq!(cfg.stream.fps, 15);
        assert_eq!(cfg.stream.max_chunks, 100);
        assert_eq!(cfg.quality.initial, 70);
    }

    #[test]
    fn defaults_convert_to_valid_sender_config() {
        let svc = SendConfig::default().to_sender_config();
        assert!(svc.validate().is_ok());
        assert_eq!(svc.limits.max_chunk_size, 58_000);
        assert_eq!(svc.quality.max_quality, 85);
    }

    #[test]
    fn to_sender_config_clamps() {
        let mut cfg = SendConfig::default();
        cfg.stream.fps = 0;
        cfg.stream.max_chunk_size = 100_000;
        cfg.quality.min = 90;
        cfg.quality.max = 50;
        cfg.quality.initial = 10;
        cfg.quality.step = 0;

        let svc = cfg.to_sender_config();
        assert_eq!(svc.target_fps, 1);
        assert_eq!(svc.limits.max_chunk_size, MAX_UDP_PAYLOAD - HEADER_SIZE);
        assert_eq!((svc.quality.min_quality, svc.quality.max_quality), (90, 90));
        assert_eq!(svc.quality.initial_quality, 90);
        assert!(svc.validate().is_ok());
    }

    #[test]
    fn write_default_then_load() {
        let path = std::env::temp_dir().join(format!("framecast-send-{}.toml", std::process::id()));
        SendConfig::write_default(&path).unwrap();
        let cfg = SendConfig::load(&path);
        std::fs::remove_file(&path).ok();
        assert_eq!(cfg.network.remote_address, "127.0.0.1:5005");
        assert_eq!(cfg.stream.poll_timeout_ms, 10);
    }

    #[test]
    fn addresses_parse() {
        let cfg = SendConfig::default();
        assert!(cfg.bind_addr().is_ok());
        assert_eq!(cfg.remote_addr().unwrap().port(), 5005);
    }
}
