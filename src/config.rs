//! Configuration loading and management

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Hold time before a press becomes a capture-start
pub const DEFAULT_PRESS_DEBOUNCE_MS: u64 = 100;
/// Hold time before a press opens the transcript overlay
pub const DEFAULT_LONG_PRESS_MS: u64 = 2000;
/// Horizontal drag distance (px) that commits a swipe
pub const DEFAULT_SWIPE_DISTANCE: f32 = 80.0;
/// Horizontal release velocity (px/s) that commits a swipe
pub const DEFAULT_SWIPE_VELOCITY: f32 = 500.0;
/// Latch time after a mode flip
pub const DEFAULT_MODE_SETTLE_MS: u64 = 50;
/// How long the orb stays `speaking` after a reply lands
pub const DEFAULT_SPEAKING_DWELL_MS: u64 = 2000;
/// How long the subtitle lingers after the orb goes idle
pub const DEFAULT_SUBTITLE_FADE_MS: u64 = 2000;
/// Lifetime of a notice nobody dismissed
pub const DEFAULT_NOTICE_TTL_MS: u64 = 4000;
/// Messages sent as context with each exchange
pub const DEFAULT_HISTORY_WINDOW: usize = 5;

const DEFAULT_API_BASE_URL: &str = "https://api.nex.umashriventures.co";
const DEFAULT_EXCHANGE_TIMEOUT_SECS: u64 = 30;

/// Product-tuning values for the interaction core.
///
/// Every field has a default; a `tuning.json` may override any subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub press_debounce_ms: u64,
    pub long_press_ms: u64,
    pub swipe_distance: f32,
    pub swipe_velocity: f32,
    pub mode_settle_ms: u64,
    pub speaking_dwell_ms: u64,
    pub subtitle_fade_ms: u64,
    pub notice_ttl_ms: u64,
    pub history_window: usize,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            press_debounce_ms: DEFAULT_PRESS_DEBOUNCE_MS,
            long_press_ms: DEFAULT_LONG_PRESS_MS,
            swipe_distance: DEFAULT_SWIPE_DISTANCE,
            swipe_velocity: DEFAULT_SWIPE_VELOCITY,
            mode_settle_ms: DEFAULT_MODE_SETTLE_MS,
            speaking_dwell_ms: DEFAULT_SPEAKING_DWELL_MS,
            subtitle_fade_ms: DEFAULT_SUBTITLE_FADE_MS,
            notice_ttl_ms: DEFAULT_NOTICE_TTL_MS,
            history_window: DEFAULT_HISTORY_WINDOW,
        }
    }
}

impl Tuning {
    pub fn press_debounce(&self) -> Duration {
        Duration::from_millis(self.press_debounce_ms)
    }

    pub fn long_press(&self) -> Duration {
        Duration::from_millis(self.long_press_ms)
    }

    pub fn mode_settle(&self) -> Duration {
        Duration::from_millis(self.mode_settle_ms)
    }

    pub fn speaking_dwell(&self) -> Duration {
        Duration::from_millis(self.speaking_dwell_ms)
    }

    pub fn subtitle_fade(&self) -> Duration {
        Duration::from_millis(self.subtitle_fade_ms)
    }

    pub fn notice_ttl(&self) -> Duration {
        Duration::from_millis(self.notice_ttl_ms)
    }

    /// Read overrides from a JSON file; missing fields keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("invalid tuning file {}", path.display()))
    }
}

/// Connection details for the exchange endpoint
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    /// Base URL of the companion backend
    pub base_url: String,

    /// Bearer token supplied by the session collaborator, if signed in
    pub auth_token: Option<String>,

    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            auth_token: None,
            timeout: Duration::from_secs(DEFAULT_EXCHANGE_TIMEOUT_SECS),
        }
    }
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Exchange endpoint settings
    pub exchange: ExchangeConfig,

    /// Gesture and pacing values
    pub tuning: Tuning,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        let home = std::env::var("HOME").context("HOME is not set")?;
        let mut config = Self::in_home(Path::new(&home))?;

        let exchange = &mut config.exchange;
        if let Ok(url) = std::env::var("NEX_API_BASE_URL") {
            exchange.base_url = url.trim_end_matches('/').to_string();
        }
        exchange.auth_token = std::env::var("NEX_AUTH_TOKEN")
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        if let Ok(secs) = std::env::var("NEX_EXCHANGE_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .context("NEX_EXCHANGE_TIMEOUT_SECS must be a whole number of seconds")?;
            exchange.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Paths under `home` and the tuning file found there; exchange
    /// settings stay at their defaults
    pub fn in_home(home: &Path) -> Result<Self> {
        let data_dir = home.join(".local").join("share").join("nex-companion");
        let socket_path = data_dir.join("companion.sock");

        let tuning_path = data_dir.join("tuning.json");
        let tuning = if tuning_path.exists() {
            let tuning = Tuning::from_file(&tuning_path)?;
            info!(path = %tuning_path.display(), "tuning overrides loaded");
            tuning
        } else {
            debug!("no tuning file, using defaults");
            Tuning::default()
        };

        Ok(Self {
            socket_path,
            data_dir,
            exchange: ExchangeConfig::default(),
            tuning,
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}
