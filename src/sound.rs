use crate::clock::timeframe::{SoundKind, TimeframeKey};
use crate::config::AlerterConfig;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Fallback funding-alert sound when no file is configured.
pub const DEFAULT_FUNDING_SOUND: &str = "transition.wav";

/// Audio playback seam. The real device-backed player lives outside the
/// engine; anything implementing this can receive the sequencer's output.
pub trait AudioSink: Send + Sync {
    fn play(&self, path: &Path, kind: SoundKind, volume: u8);
}

/// Text-to-speech seam for funding alert messages.
pub trait SpeechSink: Send + Sync {
    fn speak(&self, text: &str);
}

/// Logs playback instead of touching an audio device.
pub struct TracingAudioSink;

impl AudioSink for TracingAudioSink {
    fn play(&self, path: &Path, kind: SoundKind, volume: u8) {
        info!(path = %path.display(), ?kind, volume, "play sound");
    }
}

pub struct TracingSpeechSink;

impl SpeechSink for TracingSpeechSink {
    fn speak(&self, text: &str) {
        info!(text, "speak");
    }
}

fn kind_sub_dir(kind: SoundKind) -> &'static str {
    match kind {
        SoundKind::Voice => "Voice",
        SoundKind::Tick => "Tick",
        SoundKind::Transition => "Transition",
    }
}

/// Pre-resolved sound file paths. All filesystem probing happens here, once,
/// so the per-second clock callback never touches disk. Files live in
/// kind-specific subdirectories with the flat sounds directory as a
/// backward-compatible fallback.
pub struct SoundBank {
    cache: HashMap<(SoundKind, String), PathBuf>,
}

impl SoundBank {
    pub fn preload(sounds_dir: &Path, config: &AlerterConfig) -> Self {
        let mut cache = HashMap::new();
        let kinds = [SoundKind::Voice, SoundKind::Tick, SoundKind::Transition];

        for timeframe in TimeframeKey::ALL {
            for kind in kinds {
                let filename = config.sound_file(timeframe, kind);
                Self::try_insert(&mut cache, sounds_dir, kind, filename);
            }
        }

        let funding_file = config
            .funding_sound_file
            .clone()
            .unwrap_or_else(|| DEFAULT_FUNDING_SOUND.to_string());
        Self::try_insert(&mut cache, sounds_dir, SoundKind::Transition, funding_file);

        info!(sounds = cache.len(), dir = %sounds_dir.display(), "sound cache loaded");
        Self { cache }
    }

    pub fn empty() -> Self {
        Self {
            cache: HashMap::new(),
        }
    }

    fn try_insert(
        cache: &mut HashMap<(SoundKind, String), PathBuf>,
        sounds_dir: &Path,
        kind: SoundKind,
        filename: String,
    ) {
        if filename.is_empty() || cache.contains_key(&(kind, filename.clone())) {
            return;
        }
        let preferred = sounds_dir.join(kind_sub_dir(kind)).join(&filename);
        if preferred.exists() {
            cache.insert((kind, filename), preferred);
            return;
        }
        let fallback = sounds_dir.join(&filename);
        if fallback.exists() {
            cache.insert((kind, filename), fallback);
        } else {
            debug!(%filename, ?kind, "sound file not found");
        }
    }

    /// Cache-only lookup; a miss means the file was absent at preload time.
    pub fn resolve(&self, kind: SoundKind, filename: &str) -> Option<&Path> {
        self.cache
            .get(&(kind, filename.to_string()))
            .map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
