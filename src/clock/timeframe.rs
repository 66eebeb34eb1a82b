use serde::{Deserialize, Serialize};

/// Candle timeframes the alerter can watch, smallest to largest.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimeframeKey {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
    #[serde(rename = "1w")]
    W1,
    #[serde(rename = "1M")]
    Mo1,
}

/// Sound categories attached to every timeframe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SoundKind {
    Voice,
    Tick,
    Transition,
}

impl TimeframeKey {
    pub const ALL: [TimeframeKey; 9] = [
        Self::M1,
        Self::M5,
        Self::M15,
        Self::M30,
        Self::H1,
        Self::H4,
        Self::D1,
        Self::W1,
        Self::Mo1,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::M1 => "1m",
            Self::M5 => "5m",
            Self::M15 => "15m",
            Self::M30 => "30m",
            Self::H1 => "1h",
            Self::H4 => "4h",
            Self::D1 => "1d",
            Self::W1 => "1w",
            Self::Mo1 => "1M",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::M1 => "1 Minute",
            Self::M5 => "5 Minutes",
            Self::M15 => "15 Minutes",
            Self::M30 => "30 Minutes",
            Self::H1 => "1 Hour",
            Self::H4 => "4 Hours",
            Self::D1 => "1 Day",
            Self::W1 => "1 Week",
            Self::Mo1 => "1 Month",
        }
    }

    pub fn duration_secs(self) -> i64 {
        match self {
            Self::M1 => 60,
            Self::M5 => 300,
            Self::M15 => 900,
            Self::M30 => 1_800,
            Self::H1 => 3_600,
            Self::H4 => 14_400,
            Self::D1 => 86_400,
            Self::W1 => 604_800,
            Self::Mo1 => 2_592_000,
        }
    }

    // "1M" sound assets use the 1Mo prefix so the filename stays
    // case-insensitive-filesystem safe.
    fn file_prefix(self) -> &'static str {
        match self {
            Self::Mo1 => "1Mo",
            other => other.as_str(),
        }
    }

    /// Default sound filename for this timeframe and sound category.
    /// Overridable per timeframe via persisted configuration.
    pub fn default_sound_file(self, kind: SoundKind) -> String {
        let suffix = match kind {
            SoundKind::Voice => "voice",
            SoundKind::Tick => "tick",
            SoundKind::Transition => "transition",
        };
        format!("{}_{suffix}.wav", self.file_prefix())
    }
}
