//! Dobles de prueba para el sink, el notificador y el extractor.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc, time::Duration};

use super::{
    notifier::Notifier,
    sink::{OnComplete, VoiceSink},
};
use crate::{
    config::PlaybackConfig,
    error::{ExtractError, SinkError},
    sources::{
        resolver::{ClientProfile, Extractor, StreamDescriptor, StreamResolver},
        ExtractedInfo,
    },
};

#[derive(Default)]
struct SinkState {
    channel: Option<u64>,
    playing: bool,
    paused: bool,
    volume: f32,
    hook: Option<OnComplete>,
    played: Vec<StreamDescriptor>,
    connect_failures: u32,
    connect_calls: u32,
    stops: u32,
    fail_offset_starts: bool,
}

/// Sink en memoria. `stop` y el reemplazo de pista disparan el callback
/// pendiente igual que songbird.
#[derive(Default)]
pub struct FakeSink {
    state: Mutex<SinkState>,
}

impl FakeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connected(channel: u64) -> Self {
        let sink = Self::default();
        sink.state.lock().channel = Some(channel);
        sink
    }

    pub fn force_playing(&self, playing: bool) {
        self.state.lock().playing = playing;
    }

    /// Hace fallar los `play` con inicio desplazado, como un seek rechazado.
    pub fn fail_offset_starts(&self, fail: bool) {
        self.state.lock().fail_offset_starts = fail;
    }

    pub fn fail_next_connects(&self, count: u32) {
        self.state.lock().connect_failures = count;
    }

    /// Simula el fin natural (o por error) de la pista actual.
    pub fn finish_current(&self, error: Option<String>) {
        let hook = {
            let mut state = self.state.lock();
            state.playing = false;
            state.paused = false;
            state.hook.take()
        };
        if let Some(hook) = hook {
            hook(error);
        }
    }

    /// Simula una desconexión iniciada por Discord.
    pub fn drop_connection(&self) {
        let mut state = self.state.lock();
        state.channel = None;
        state.playing = false;
        state.paused = false;
        state.hook = None;
    }

    pub fn played_urls(&self) -> Vec<String> {
        self.state
            .lock()
            .played
            .iter()
            .map(|stream| stream.url.clone())
            .collect()
    }

    pub fn last_stream(&self) -> Option<StreamDescriptor> {
        self.state.lock().played.last().cloned()
    }

    pub fn volume(&self) -> f32 {
        self.state.lock().volume
    }

    pub fn connect_calls(&self) -> u32 {
        self.state.lock().connect_calls
    }

    pub fn stops(&self) -> u32 {
        self.state.lock().stops
    }
}

#[async_trait]
impl VoiceSink for FakeSink {
    async fn connect(&self, channel_id: u64) -> Result<(), SinkError> {
        let mut state = self.state.lock();
        state.connect_calls += 1;
        if state.connect_failures > 0 {
            state.connect_failures -= 1;
            return Err(SinkError::Join("timeout".to_string()));
        }
        state.channel = Some(channel_id);
        Ok(())
    }

    async fn play(
        &self,
        stream: StreamDescriptor,
        volume: f32,
        on_complete: OnComplete,
    ) -> Result<(), SinkError> {
        let previous = {
            let mut state = self.state.lock();
            if state.channel.is_none() {
                return Err(SinkError::NotConnected);
            }
            if state.fail_offset_starts && stream.options.start_at.is_some() {
                // La pista anterior ya se detuvo al reemplazarla
                state.playing = false;
                state.paused = false;
                let previous = state.hook.take();
                drop(state);
                if let Some(previous) = previous {
                    previous(None);
                }
                return Err(SinkError::Playback("seek rechazado".to_string()));
            }
            state.playing = true;
            state.paused = false;
            state.volume = volume;
            state.played.push(stream);
            state.hook.replace(on_complete)
        };
        if let Some(previous) = previous {
            previous(None);
        }
        Ok(())
    }

    async fn stop(&self) {
        self.state.lock().stops += 1;
        self.finish_current(None);
    }

    async fn pause(&self) -> Result<(), SinkError> {
        let mut state = self.state.lock();
        if !state.playing && !state.paused {
            return Err(SinkError::NotConnected);
        }
        state.playing = false;
        state.paused = true;
        Ok(())
    }

    async fn resume(&self) -> Result<(), SinkError> {
        let mut state = self.state.lock();
        if !state.playing && !state.paused {
            return Err(SinkError::NotConnected);
        }
        state.playing = true;
        state.paused = false;
        Ok(())
    }

    async fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    async fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    async fn is_connected(&self) -> bool {
        self.state.lock().channel.is_some()
    }

    async fn current_channel(&self) -> Option<u64> {
        self.state.lock().channel
    }

    async fn set_volume(&self, volume: f32) {
        self.state.lock().volume = volume;
    }

    async fn disconnect(&self) {
        self.drop_connection();
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(u64, String)>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<(u64, String)> {
        self.messages.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, channel_id: u64, message: &str) {
        self.messages.lock().push((channel_id, message.to_string()));
    }
}

/// Extractor que devuelve `https://cdn/<locator>`, salvo para los
/// localizadores marcados como rotos o lentos.
#[derive(Default)]
pub struct StubExtractor {
    broken: Mutex<Vec<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<String>>,
}

impl StubExtractor {
    pub fn break_locator(&self, locator: &str) {
        self.broken.lock().push(locator.to_string());
    }

    pub fn delay_locator(&self, locator: &str, delay: Duration) {
        self.delays.lock().insert(locator.to_string(), delay);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Extractor for StubExtractor {
    async fn extract_stream(
        &self,
        locator: &str,
        _profile: ClientProfile,
    ) -> Result<ExtractedInfo, ExtractError> {
        self.calls.lock().push(locator.to_string());

        let delay = self.delays.lock().get(locator).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.broken.lock().iter().any(|b| b == locator) {
            return Err(ExtractError::Spawn(format!("sin stream para {locator}")));
        }

        Ok(ExtractedInfo {
            url: Some(format!("https://cdn/{locator}")),
            extractor: Some("stub".to_string()),
            ..ExtractedInfo::default()
        })
    }
}

/// Configuración de pruebas: un solo intento de resolución.
pub fn test_settings() -> PlaybackConfig {
    PlaybackConfig {
        resolve_retries: 1,
        ..PlaybackConfig::default()
    }
}

pub fn stub_resolver(extractor: Arc<StubExtractor>) -> Arc<StreamResolver> {
    Arc::new(StreamResolver::new(extractor, &test_settings()))
}

/// Deja correr las tareas pendientes (worker de eventos, temporizadores).
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
