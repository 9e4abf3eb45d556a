use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::HttpRequest,
    tracks::{PlayMode, TrackHandle},
    Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::{error::SinkError, sources::resolver::StreamDescriptor};

/// Callback de fin de pista. Recibe `Some(error)` si la pista terminó por
/// un fallo. Se invoca exactamente una vez por pista.
pub type OnComplete = Box<dyn FnOnce(Option<String>) + Send>;

/// Conexión de voz de una guild.
#[async_trait]
pub trait VoiceSink: Send + Sync {
    async fn connect(&self, channel_id: u64) -> Result<(), SinkError>;

    /// Reemplaza lo que esté sonando por `stream`.
    ///
    /// Si el stream pide un inicio desplazado y el salto falla, devuelve el
    /// error sin dejar nada sonando y sin invocar `on_complete`.
    async fn play(
        &self,
        stream: StreamDescriptor,
        volume: f32,
        on_complete: OnComplete,
    ) -> Result<(), SinkError>;

    /// Detiene la pista actual; su `OnComplete` se dispara.
    async fn stop(&self);

    async fn pause(&self) -> Result<(), SinkError>;

    async fn resume(&self) -> Result<(), SinkError>;

    async fn is_playing(&self) -> bool;

    async fn is_paused(&self) -> bool;

    async fn is_connected(&self) -> bool;

    async fn current_channel(&self) -> Option<u64>;

    async fn set_volume(&self, volume: f32);

    async fn disconnect(&self);
}

/// Sink sobre songbird. Una instancia por guild.
pub struct SongbirdSink {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    http: Client,
    track: Mutex<Option<TrackHandle>>,
}

impl SongbirdSink {
    pub fn new(manager: Arc<Songbird>, guild_id: GuildId, http: Client) -> Self {
        Self {
            manager,
            guild_id,
            http,
            track: Mutex::new(None),
        }
    }

    fn current_track(&self) -> Option<TrackHandle> {
        self.track.lock().clone()
    }

    async fn play_mode(&self) -> Option<PlayMode> {
        let track = self.current_track()?;
        track.get_info().await.ok().map(|state| state.playing)
    }
}

#[async_trait]
impl VoiceSink for SongbirdSink {
    async fn connect(&self, channel_id: u64) -> Result<(), SinkError> {
        if channel_id == 0 {
            return Err(SinkError::Join("canal inválido".to_string()));
        }

        match self
            .manager
            .join(self.guild_id, ChannelId::new(channel_id))
            .await
        {
            Ok(_) => {
                info!("🔊 Conectado al canal de voz en guild {}", self.guild_id);
                Ok(())
            }
            Err(e) => {
                error!("Error al obtener handler de voz: {:?}", e);
                Err(SinkError::Join(e.to_string()))
            }
        }
    }

    async fn play(
        &self,
        stream: StreamDescriptor,
        volume: f32,
        on_complete: OnComplete,
    ) -> Result<(), SinkError> {
        let call = self
            .manager
            .get(self.guild_id)
            .ok_or(SinkError::NotConnected)?;

        let input = HttpRequest::new(self.http.clone(), stream.url.clone());

        let handle = {
            let mut call = call.lock().await;
            call.stop();
            call.play_input(input.into())
        };

        let _ = handle.set_volume(volume);
        if let Some(offset) = stream.options.start_at {
            debug!("⏩ Iniciando en {:?}", offset);
            // Sin eventos registrados todavía: detener aquí no dispara el callback
            if let Err(e) = handle.seek_async(offset).await {
                warn!("⚠️ Seek a {:?} falló en guild {}: {:?}", offset, self.guild_id, e);
                let _ = handle.stop();
                return Err(SinkError::Playback(e.to_string()));
            }
        }

        // Fin y error comparten el callback para que se dispare una sola vez
        let hook = Arc::new(Mutex::new(Some(on_complete)));
        for (event, failed) in [(TrackEvent::Error, true), (TrackEvent::End, false)] {
            handle
                .add_event(
                    Event::Track(event),
                    TrackCompletion {
                        hook: hook.clone(),
                        failed,
                    },
                )
                .map_err(|e| SinkError::Playback(e.to_string()))?;
        }

        *self.track.lock() = Some(handle);
        Ok(())
    }

    async fn stop(&self) {
        if let Some(track) = self.track.lock().take() {
            let _ = track.stop();
        }
    }

    async fn pause(&self) -> Result<(), SinkError> {
        let track = self.current_track().ok_or(SinkError::NotConnected)?;
        track
            .pause()
            .map_err(|e| SinkError::Playback(e.to_string()))
    }

    async fn resume(&self) -> Result<(), SinkError> {
        let track = self.current_track().ok_or(SinkError::NotConnected)?;
        track.play().map_err(|e| SinkError::Playback(e.to_string()))
    }

    async fn is_playing(&self) -> bool {
        matches!(self.play_mode().await, Some(PlayMode::Play))
    }

    async fn is_paused(&self) -> bool {
        matches!(self.play_mode().await, Some(PlayMode::Pause))
    }

    async fn is_connected(&self) -> bool {
        self.current_channel().await.is_some()
    }

    async fn current_channel(&self) -> Option<u64> {
        let call = self.manager.get(self.guild_id)?;
        let channel = call.lock().await.current_channel();
        channel.map(|c| c.0.get())
    }

    async fn set_volume(&self, volume: f32) {
        if let Some(track) = self.current_track() {
            let _ = track.set_volume(volume);
        }
    }

    async fn disconnect(&self) {
        self.track.lock().take();
        if let Err(e) = self.manager.remove(self.guild_id).await {
            warn!("⚠️ Error al desconectar guild {}: {:?}", self.guild_id, e);
        } else {
            info!("👋 Desconectado del canal de voz en guild {}", self.guild_id);
        }
    }
}

struct TrackCompletion {
    hook: Arc<Mutex<Option<OnComplete>>>,
    failed: bool,
}

#[async_trait]
impl VoiceEventHandler for TrackCompletion {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let error = if self.failed {
            let detail = match ctx {
                EventContext::Track(tracks) => tracks.iter().find_map(|(state, _)| {
                    match &state.playing {
                        PlayMode::Errored(e) => Some(format!("{e:?}")),
                        _ => None,
                    }
                }),
                _ => None,
            };
            Some(detail.unwrap_or_else(|| "error de reproducción".to_string()))
        } else {
            None
        };

        if let Some(hook) = self.hook.lock().take() {
            debug!("Pista terminada (error: {:?})", error);
            hook(error);
        }

        None
    }
}
