//! Receiver configuration.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use framecast_core::limits::{DEFAULT_MAX_CHUNK_SIZE, DEFAULT_MAX_CHUNKS, MAX_UDP_PAYLOAD};
use framecast_core::reassembly::{DEFAULT_MAX_PENDING_FRAMES, MAX_PENDING_FRAMES_LIMIT};
use framecast_core::{
    DEFAULT_MAX_DECODE_HEIGHT, DEFAULT_MAX_DECODE_WIDTH, HEADER_SIZE, JpegCodec, ProtocolLimits, ReassemblyConfig,
    ReceiverConfig,
};

/// Top-level configuration for the receiver.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecvConfig {
    pub network: NetworkConfig,
    pub stream: StreamConfig,
    pub reassembly: ReassemblySection,
    pub decode: DecodeSection,
    pub logging: LoggingConfig,
}

/// Network settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to listen on.
    pub bind_address: String,
    /// Only accept datagrams from this sender. Empty accepts anyone.
    pub expected_peer: String,
}

/// Chunking limits and polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub max_chunk_size: usize,
    pub max_chunks: u32,
    /// Receive wait per poll, in milliseconds.
    pub poll_timeout_ms: u64,
}

/// Pending-frame table bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReassemblySection {
    pub max_pending_frames: usize,
    /// Evict incomplete frames older than this; 0 disables expiry.
    pub frame_ttl_ms: u64,
}

/// Largest image the decoder will allocate for.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeSection {
    pub max_width: u32,
    pub max_height: u32,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5005".into(),
            expected_peer: String::new(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            max_chunks: DEFAULT_MAX_CHUNKS,
            poll_timeout_ms: 10,
        }
    }
}

impl Default for ReassemblySection {
    fn default() -> Self {
        Self {
            max_pending_frames: DEFAULT_MAX_PENDING_FRAMES,
            frame_ttl_ms: 0,
        }
    }
}

impl Default for DecodeSection {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_DECODE_WIDTH,
            max_height: DEFAULT_MAX_DECODE_HEIGHT,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".into() }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl RecvConfig {
    /// Load from a TOML file, falling back to defaults.
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

    /// `Ok(None)` when no peer lock is configured.
    pub fn expected_peer(&self) -> Result<Option<SocketAddr>, std::net::AddrParseError> {
        match self.network.expected_peer.trim() {
            "" => Ok(None),
            addr => addr.parse().map(Some),
        }
    }

    /// Convert into a [`ReceiverConfig`], clamping values that cannot
    /// work. `expected_peer` is resolved separately.
    pub fn to_receiver_config(&self, expected_peer: Option<SocketAddr>) -> ReceiverConfig {
        ReceiverConfig {
            limits: ProtocolLimits {
                max_chunk_size: self.stream.max_chunk_size.clamp(1, MAX_UDP_PAYLOAD - HEADER_SIZE),
                max_chunks: self.stream.max_chunks.max(1),
            },
            reassembly: ReassemblyConfig {
                max_pending_frames: self.reassembly.max_pending_frames.clamp(1, MAX_PENDING_FRAMES_LIMIT),
                frame_ttl: (self.reassembly.frame_ttl_ms > 0)
                    .then(|| Duration::from_millis(self.reassembly.frame_ttl_ms)),
            },
            poll_timeout: Duration::from_millis(self.stream.poll_timeout_ms.max(1)),
            expected_peer,
        }
    }

    /// JPEG decoder bounded by the `[decode]` section.
    pub fn decoder(&self) -> JpegCodec {
        JpegCodec::new().with_max_dimensions(self.decode.max_width, self.decode.max_height)
    }
}

// ── Tests ────────────────────────────────────────────────────────
