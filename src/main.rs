use chrono::{Local, Utc};
use std::path::Path;
use std::sync::Arc;
use tf_alerter::alertlog::AlertLog;
use tf_alerter::clock::overlay::{NullForegroundWindow, TracingOverlaySurface};
use tf_alerter::clock::spawn_clock;
use tf_alerter::clock::timeframe::SoundKind;
use tf_alerter::config::{self, SharedConfig};
use tf_alerter::error::AppError;
use tf_alerter::events::{self, EngineEvent};
use tf_alerter::funding::monitor::FundingMonitor;
use tf_alerter::sound::{
    AudioSink, SoundBank, SpeechSink, TracingAudioSink, TracingSpeechSink, DEFAULT_FUNDING_SOUND,
};
use tf_alerter::state::AlerterState;
use tracing::info;

const DEFAULT_CONFIG_PATH: &str = "tf-alerter.json";
const DEFAULT_SOUNDS_DIR: &str = "Sounds";

#[tokio::main]
async fn main() -> Result<(), AppError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tf_alerter=info")),
        )
        .init();

    let config_path =
        std::env::var("TF_ALERTER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = config::load_config(Path::new(&config_path))?;
    info!(
        path = %config_path,
        timeframes = config.timeframes.len(),
        exchanges = config.exchanges.len(),
        "configuration loaded"
    );

    let sounds_dir =
        std::env::var("TF_ALERTER_SOUNDS").unwrap_or_else(|_| DEFAULT_SOUNDS_DIR.to_string());
    let sound_bank = Arc::new(SoundBank::preload(Path::new(&sounds_dir), &config));
    let shared = config::shared(config);

    let (event_tx, mut event_rx) = events::channel();
    let state = AlerterState::new();
    let audio: Arc<dyn AudioSink> = Arc::new(TracingAudioSink);
    let speech: Arc<dyn SpeechSink> = Arc::new(TracingSpeechSink);

    let monitor_handle = FundingMonitor::spawn(
        Arc::clone(&shared),
        event_tx.clone(),
        Arc::clone(&state.funding_status),
    )?;
    *state.funding_monitor.lock().await = Some(monitor_handle);

    let clock_handle = spawn_clock(
        Arc::clone(&shared),
        event_tx.clone(),
        Arc::clone(&audio),
        Arc::clone(&sound_bank),
        TracingOverlaySurface::default(),
        NullForegroundWindow,
    );
    *state.clock.lock().await = Some(clock_handle);
    drop(event_tx);

    // Single consumer loop: the stand-in for the UI thread. All render-side
    // state (the alert log, sinks) is owned here and fed only by the channel.
    let mut alert_log = AlertLog::new();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
            maybe_event = event_rx.recv() => {
                let Some(event) = maybe_event else { break; };
                handle_event(
                    event,
                    &mut alert_log,
                    &shared,
                    &sound_bank,
                    audio.as_ref(),
                    speech.as_ref(),
                );
            }
        }
    }

    state.shutdown().await;
    Ok(())
}

fn handle_event(
    event: EngineEvent,
    alert_log: &mut AlertLog,
    config: &SharedConfig,
    sound_bank: &SoundBank,
    audio: &dyn AudioSink,
    speech: &dyn SpeechSink,
) {
    match event {
        EngineEvent::FundingAlert(payload) => {
            let message = payload.message();
            info!(message = %message, "funding alert");
            alert_log.record(&payload, Local::now().format("%H:%M:%S").to_string());
            alert_log.refresh(Utc::now().timestamp_millis());

            let snapshot = config.read().clone();
            if snapshot.sounds.funding_sound && snapshot.volume > 0 {
                let filename = snapshot
                    .funding_sound_file
                    .clone()
                    .unwrap_or_else(|| DEFAULT_FUNDING_SOUND.to_string());
                if let Some(path) = sound_bank.resolve(SoundKind::Transition, &filename) {
                    audio.play(path, SoundKind::Transition, snapshot.volume);
                }
            }
            if snapshot.sounds.tts {
                speech.speak(&message);
            }
        }
        EngineEvent::FundingLog(payload) => {
            info!(message = %payload.message(), "funding log");
            alert_log.record(&payload, Local::now().format("%H:%M:%S").to_string());
            alert_log.refresh(Utc::now().timestamp_millis());
        }
        EngineEvent::FundingStatus(status) => {
            let fetched: usize = status
                .exchanges
                .values()
                .map(|exchange| exchange.fetched_count)
                .sum();
            let errors = status
                .exchanges
                .values()
                .filter(|exchange| exchange.error_text.is_some())
                .count();
            info!(fetched, errors, "funding status updated");
        }
        EngineEvent::CandleClose(text) => {
            info!(text = %text, "candle close");
        }
    }
}
