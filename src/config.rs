use crate::clock::timeframe::{SoundKind, TimeframeKey};
use crate::error::AppError;
use crate::funding::types::ExchangeId;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

pub const CONFIG_SCHEMA_VERSION: u32 = 1;
pub const DEFAULT_LEAD_TIME_SECS: u32 = 10;
pub const DEFAULT_MINUTES_TEXT: &str = "15,5";
pub const DEFAULT_THRESHOLD_TEXT: &str = "1.0";
pub const DEFAULT_VOLUME: u8 = 80;
pub const MIN_LEAD_TIME_SECS: u32 = 1;
pub const MAX_LEAD_TIME_SECS: u32 = 59;
pub const MAX_VOLUME: u8 = 100;

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OverlayMode {
    /// Show over every foreground window.
    Always,
    /// Show only when the foreground title matches a configured substring.
    Custom,
}

#[derive(Debug, Clone)]
pub struct OverlaySettings {
    pub enabled: bool,
    pub mode: OverlayMode,
    pub windows: Vec<String>,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: OverlayMode::Custom,
            windows: vec!["TF-Alerter".to_string()],
        }
    }
}

/// Independently gateable sound switches.
#[derive(Debug, Clone, Copy)]
pub struct SoundToggles {
    pub voice: bool,
    pub tick: bool,
    pub transition: bool,
    pub funding_sound: bool,
    pub tts: bool,
}

impl Default for SoundToggles {
    fn default() -> Self {
        Self {
            voice: true,
            tick: true,
            transition: true,
            funding_sound: true,
            tts: true,
        }
    }
}

/// Per-timeframe sound filename overrides; `None` falls back to the
/// timeframe's default filename.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SoundOverride {
    pub voice: Option<String>,
    pub tick: Option<String>,
    pub transition: Option<String>,
}

impl SoundOverride {
    fn get(&self, kind: SoundKind) -> Option<&String> {
        match kind {
            SoundKind::Voice => self.voice.as_ref(),
            SoundKind::Tick => self.tick.as_ref(),
            SoundKind::Transition => self.transition.as_ref(),
        }
    }
}

/// The single explicit configuration view read by both engines. Engine
/// components receive it by shared reference and take snapshots; nothing in
/// the core mutates it.
#[derive(Debug, Clone)]
pub struct AlerterConfig {
    pub timeframes: BTreeSet<TimeframeKey>,
    pub exchanges: BTreeSet<ExchangeId>,
    pub funding_minutes_text: String,
    pub funding_threshold_pos_text: String,
    pub funding_threshold_neg_text: String,
    pub funding_sound_file: Option<String>,
    pub sounds: SoundToggles,
    pub lead_time_secs: u32,
    pub volume: u8,
    pub overlay: OverlaySettings,
    pub sound_overrides: BTreeMap<TimeframeKey, SoundOverride>,
}

impl Default for AlerterConfig {
    fn default() -> Self {
        Self {
            timeframes: [TimeframeKey::M5, TimeframeKey::M15, TimeframeKey::H1]
                .into_iter()
                .collect(),
            exchanges: [ExchangeId::Binance, ExchangeId::Bybit].into_iter().collect(),
            funding_minutes_text: DEFAULT_MINUTES_TEXT.to_string(),
            funding_threshold_pos_text: DEFAULT_THRESHOLD_TEXT.to_string(),
            funding_threshold_neg_text: DEFAULT_THRESHOLD_TEXT.to_string(),
            funding_sound_file: None,
            sounds: SoundToggles::default(),
            lead_time_secs: DEFAULT_LEAD_TIME_SECS,
            volume: DEFAULT_VOLUME,
            overlay: OverlaySettings::default(),
            sound_overrides: BTreeMap::new(),
        }
    }
}

impl AlerterConfig {
    /// Resolved sound filename for a timeframe/kind, override-aware.
    pub fn sound_file(&self, timeframe: TimeframeKey, kind: SoundKind) -> String {
        self.sound_overrides
            .get(&timeframe)
            .and_then(|entry| entry.get(kind))
            .cloned()
            .unwrap_or_else(|| timeframe.default_sound_file(kind))
    }
}

pub type SharedConfig = Arc<RwLock<AlerterConfig>>;

pub fn shared(config: AlerterConfig) -> SharedConfig {
    Arc::new(RwLock::new(config))
}

/// On-disk schema: versioned, every field optional with a default, validated
/// once at load time. Unknown exchanges or timeframes fail loudly here rather
/// than being probed for at runtime.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    pub version: Option<u32>,
    pub timeframes: Option<Vec<TimeframeKey>>,
    pub exchanges: Option<Vec<ExchangeId>>,
    pub funding_minutes: Option<String>,
    pub funding_threshold_pos: Option<String>,
    pub funding_threshold_neg: Option<String>,
    pub funding_sound_file: Option<String>,
    pub sounds_voice_enabled: Option<bool>,
    pub sounds_tick_enabled: Option<bool>,
    pub sounds_transition_enabled: Option<bool>,
    pub funding_sound_enabled: Option<bool>,
    pub funding_tts_enabled: Option<bool>,
    pub lead_time_secs: Option<u32>,
    pub volume: Option<u8>,
    pub overlay_enabled: Option<bool>,
    pub overlay_mode: Option<OverlayMode>,
    pub overlay_windows: Option<Vec<String>>,
    pub sound_overrides: Option<BTreeMap<TimeframeKey, SoundOverride>>,
}

impl ConfigFile {
    pub fn normalize(self) -> Result<AlerterConfig, AppError> {
        let version = self.version.unwrap_or(CONFIG_SCHEMA_VERSION);
        if version > CONFIG_SCHEMA_VERSION {
            return Err(AppError::InvalidArgument(format!(
                "config schema version {version} is newer than supported {CONFIG_SCHEMA_VERSION}"
            )));
        }

        let defaults = AlerterConfig::default();
        let lead_time_secs = self.lead_time_secs.unwrap_or(DEFAULT_LEAD_TIME_SECS);
        if !(MIN_LEAD_TIME_SECS..=MAX_LEAD_TIME_SECS).contains(&lead_time_secs) {
            return Err(AppError::InvalidArgument(format!(
                "leadTimeSecs must be between {MIN_LEAD_TIME_SECS} and {MAX_LEAD_TIME_SECS}"
            )));
        }

        let volume = self.volume.unwrap_or(DEFAULT_VOLUME);
        if volume > MAX_VOLUME {
            return Err(AppError::InvalidArgument(format!(
                "volume must be between 0 and {MAX_VOLUME}"
            )));
        }

        let overlay = OverlaySettings {
            enabled: self.overlay_enabled.unwrap_or(defaults.overlay.enabled),
            mode: self.overlay_mode.unwrap_or(defaults.overlay.mode),
            windows: self
                .overlay_windows
                .map(|windows| {
                    windows
                        .into_iter()
                        .map(|title| title.trim().to_string())
                        .filter(|title| !title.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.overlay.windows),
        };

        Ok(AlerterConfig {
            timeframes: self
                .timeframes
                .map(|keys| keys.into_iter().collect())
                .unwrap_or(defaults.timeframes),
            exchanges: self
                .exchanges
                .map(|ids| ids.into_iter().collect())
                .unwrap_or(defaults.exchanges),
            funding_minutes_text: self
                .funding_minutes
                .unwrap_or(defaults.funding_minutes_text),
            funding_threshold_pos_text: self
                .funding_threshold_pos
                .unwrap_or(defaults.funding_threshold_pos_text),
            funding_threshold_neg_text: self
                .funding_threshold_neg
                .unwrap_or(defaults.funding_threshold_neg_text),
            funding_sound_file: self.funding_sound_file,
            sounds: SoundToggles {
                voice: self.sounds_voice_enabled.unwrap_or(true),
                tick: self.sounds_tick_enabled.unwrap_or(true),
                transition: self.sounds_transition_enabled.unwrap_or(true),
                funding_sound: self.funding_sound_enabled.unwrap_or(true),
                tts: self.funding_tts_enabled.unwrap_or(true),
            },
            lead_time_secs,
            volume,
            overlay,
            sound_overrides: self.sound_overrides.unwrap_or_default(),
        })
    }
}

/// Loads and validates a config file; a missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<AlerterConfig, AppError> {
    if !path.exists() {
        return Ok(AlerterConfig::default());
    }
    let raw = std::fs::read_to_string(path)?;
    let file: ConfigFile = serde_json::from_str(&raw)?;
    file.normalize()
}
