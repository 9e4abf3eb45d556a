use parking_lot::{Mutex, RwLock};
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
    time::Duration,
};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::{debug, error, info, warn};

use super::{
    idle::IdleTimer,
    notifier::Notifier,
    queue::{EnqueueOutcome, MusicQueue, QueueInfo, ShuffleOutcome, Song},
    sink::{OnComplete, VoiceSink},
};
use crate::{
    config::PlaybackConfig, error::MusicError, sources::resolver::StreamResolver,
    ui::format::song_label,
};

/// Volumen compartido por todas las guilds (0.0 a 1.0).
pub type SharedVolume = Arc<RwLock<f32>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Resolving,
    Playing,
    Paused,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseOutcome {
    Paused,
    AlreadyPaused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeOutcome {
    Resumed,
    AlreadyPlaying,
}

/// Resultado de `enqueue` para la respuesta del comando.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnqueueReport {
    pub outcome: EnqueueOutcome,
    /// `true` si el sink estaba inactivo y se pidió avanzar.
    pub starting: bool,
}

#[derive(Debug)]
enum PlayerEvent {
    Advance,
    TrackEnded { ticket: u64, error: Option<String> },
}

enum Launch {
    Started,
    Superseded,
}

/// Reproductor de una guild: cola, canción actual y máquina de estados.
///
/// Cada `play` en el sink recibe un ticket nuevo. Los fines de pista llegan
/// como mensajes a un worker propio y solo avanzan la cola si su ticket es
/// el vigente, así que un `stop` o un `seek` invalidan los fines pendientes
/// de la pista anterior.
pub struct GuildPlayer {
    guild_id: String,
    queue: RwLock<MusicQueue>,
    current: Mutex<Option<Song>>,
    state: Mutex<PlayerState>,
    advance_lock: AsyncMutex<()>,
    idle: IdleTimer,
    ticket: AtomicU64,
    sink: Arc<dyn VoiceSink>,
    resolver: Arc<StreamResolver>,
    notifier: Arc<dyn Notifier>,
    volume: SharedVolume,
    settings: PlaybackConfig,
    events: mpsc::UnboundedSender<PlayerEvent>,
}

impl GuildPlayer {
    /// Crea el reproductor y lanza su worker de eventos. Requiere un
    /// runtime de tokio activo.
    pub fn new(
        guild_id: impl Into<String>,
        sink: Arc<dyn VoiceSink>,
        resolver: Arc<StreamResolver>,
        notifier: Arc<dyn Notifier>,
        volume: SharedVolume,
        settings: PlaybackConfig,
    ) -> Arc<Self> {
        let (events, receiver) = mpsc::unbounded_channel();
        let player = Arc::new(Self {
            guild_id: guild_id.into(),
            queue: RwLock::new(MusicQueue::new(
                settings.max_queue_size,
                settings.max_batch_size,
            )),
            current: Mutex::new(None),
            state: Mutex::new(PlayerState::Idle),
            advance_lock: AsyncMutex::new(()),
            idle: IdleTimer::new(),
            ticket: AtomicU64::new(0),
            sink,
            resolver,
            notifier,
            volume,
            settings,
            events,
        });

        tokio::spawn(Self::run_events(Arc::downgrade(&player), receiver));
        player
    }

    async fn run_events(player: Weak<Self>, mut receiver: mpsc::UnboundedReceiver<PlayerEvent>) {
        while let Some(event) = receiver.recv().await {
            let Some(player) = player.upgrade() else {
                break;
            };
            match event {
                PlayerEvent::Advance => player.advance().await,
                PlayerEvent::TrackEnded { ticket, error } => {
                    if let Some(error) = error {
                        warn!("Finalizó canción con detalle: {}", error);
                    }
                    player.advance_from(Some(ticket)).await;
                }
            }
        }
        debug!("Worker de eventos terminado");
    }

    pub fn guild_id(&self) -> &str {
        &self.guild_id
    }

    pub fn state(&self) -> PlayerState {
        *self.state.lock()
    }

    fn set_state(&self, state: PlayerState) {
        let mut current = self.state.lock();
        if *current != state {
            debug!("🎚️ Guild {}: {:?} -> {:?}", self.guild_id, *current, state);
            *current = state;
        }
    }

    pub fn current(&self) -> Option<Song> {
        self.current.lock().clone()
    }

    pub fn queue_info(&self) -> QueueInfo {
        self.queue.read().snapshot(self.current())
    }

    pub fn queue_len(&self) -> usize {
        self.queue.read().len()
    }

    /// Cuántas canciones admitiría un `enqueue` ahora mismo.
    pub fn remaining_capacity(&self) -> usize {
        self.queue.read().remaining_capacity()
    }

    pub fn volume(&self) -> f32 {
        *self.volume.read()
    }

    pub fn idle_timer_armed(&self) -> bool {
        self.idle.is_armed()
    }

    pub async fn is_connected(&self) -> bool {
        self.sink.is_connected().await
    }

    async fn sink_active(&self) -> bool {
        self.sink.is_playing().await || self.sink.is_paused().await
    }

    /// Conecta al canal de voz, reintentando ante fallos.
    pub async fn connect(&self, channel_id: u64) -> Result<(), MusicError> {
        if self.sink.current_channel().await == Some(channel_id) {
            return Ok(());
        }

        let attempts = self.settings.connect_retries.max(1);
        let mut last_error = None;
        for attempt in 1..=attempts {
            match self.sink.connect(channel_id).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!("⚠️ Reintento {}/{} de conexión de voz: {}", attempt, attempts, e);
                    last_error = Some(e);
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.settings.connect_retry_delay).await;
            }
        }

        Err(MusicError::Connection(
            last_error.map(|e| e.to_string()).unwrap_or_default(),
        ))
    }

    /// Agrega canciones y arranca la reproducción si el sink está libre.
    pub async fn enqueue(&self, songs: Vec<Song>) -> Result<EnqueueReport, MusicError> {
        let outcome = self.queue.write().enqueue(songs)?;
        self.idle.cancel();

        let starting = !self.sink_active().await && self.state() != PlayerState::Resolving;
        if starting {
            self.request_advance();
        }

        Ok(EnqueueReport { outcome, starting })
    }

    fn request_advance(&self) {
        if self.events.send(PlayerEvent::Advance).is_err() {
            error!("Worker de eventos no disponible en guild {}", self.guild_id);
        }
    }

    /// Pasa la cabeza de la cola a reproducción.
    pub async fn advance(&self) {
        self.advance_from(None).await;
    }

    /// `expected` es el ticket de la pista cuyo fin disparó el avance; si
    /// ya no es el vigente, no se hace nada.
    async fn advance_from(&self, expected: Option<u64>) {
        let _guard = self.advance_lock.lock().await;

        let mut generation = self.ticket.load(Ordering::SeqCst);
        if expected.is_some_and(|ticket| ticket != generation) {
            debug!("Fin de pista obsoleto ignorado en guild {}", self.guild_id);
            return;
        }

        if self.sink_active().await {
            debug!("Sink activo, avance descartado en guild {}", self.guild_id);
            return;
        }

        if !self.sink.is_connected().await {
            let dropped = self.queue.write().clear();
            *self.current.lock() = None;
            self.set_state(PlayerState::Idle);
            if dropped > 0 {
                warn!("🔇 Sin conexión de voz: {} canciones descartadas", dropped);
            }
            return;
        }

        let mut failures = 0;
        loop {
            if self.ticket.load(Ordering::SeqCst) != generation {
                return;
            }

            let next = self.queue.write().pop_front();
            let Some(song) = next else {
                *self.current.lock() = None;
                self.set_state(PlayerState::Idle);
                self.arm_idle_timer().await;
                return;
            };

            self.idle.cancel();
            *self.current.lock() = Some(song.clone());
            self.set_state(PlayerState::Resolving);

            match self.launch(&song, None, &mut generation).await {
                Ok(Launch::Started) => {
                    self.set_state(PlayerState::Playing);
                    info!("🎵 Reproduciendo en guild {}: {}", self.guild_id, song.title);
                    self.notifier
                        .notify(
                            song.origin_channel,
                            &format!("▶️ Reproduciendo: **{}**", song_label(&song)),
                        )
                        .await;
                    return;
                }
                Ok(Launch::Superseded) => {
                    self.abandon_superseded();
                    return;
                }
                Err(e) => {
                    if self.ticket.load(Ordering::SeqCst) != generation {
                        self.abandon_superseded();
                        return;
                    }
                    error!("Error preparando canción {}: {}", song_label(&song), e);
                    self.notifier
                        .notify(
                            song.origin_channel,
                            &format!("⚠️ No se pudo reproducir: **{}**", song_label(&song)),
                        )
                        .await;

                    failures += 1;
                    let cap = self.settings.max_failure_streak;
                    if cap > 0 && failures >= cap {
                        warn!(
                            "🛑 {} fallos seguidos en guild {}, se detiene el avance",
                            failures, self.guild_id
                        );
                        self.notifier
                            .notify(
                                song.origin_channel,
                                "🛑 Demasiadas canciones fallaron seguidas. Usa `/skip` o `/play` para continuar.",
                            )
                            .await;
                        *self.current.lock() = None;
                        self.set_state(PlayerState::Idle);
                        self.arm_idle_timer().await;
                        return;
                    }
                }
            }
        }
    }

    /// Resuelve `song` y la entrega al sink con un ticket nuevo.
    ///
    /// Devuelve `Superseded` si otro comando (stop, seek) invalidó
    /// `generation` mientras se resolvía.
    /// Un reinicio ganó la carrera al avance en curso: lo que este avance
    /// escribió en `current` y en el estado ya no vale.
    fn abandon_superseded(&self) {
        *self.current.lock() = None;
        if self.state() == PlayerState::Resolving {
            self.set_state(PlayerState::Stopped);
        }
        // Canciones encoladas mientras el estado decía Resolving
        if self.queue_len() > 0 {
            self.request_advance();
        }
    }

    async fn launch(
        &self,
        song: &Song,
        start_at: Option<Duration>,
        generation: &mut u64,
    ) -> Result<Launch, MusicError> {
        let mut stream = self.resolver.resolve(&song.source_locator).await?;
        if let Some(offset) = start_at {
            stream = stream.starting_at(offset);
        }

        let ticket = *generation + 1;
        if self
            .ticket
            .compare_exchange(*generation, ticket, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Resolución descartada en guild {}: reproductor reiniciado", self.guild_id);
            return Ok(Launch::Superseded);
        }
        *generation = ticket;

        let events = self.events.clone();
        let on_complete: OnComplete = Box::new(move |error| {
            let _ = events.send(PlayerEvent::TrackEnded { ticket, error });
        });

        self.sink.play(stream, self.volume(), on_complete).await?;
        Ok(Launch::Started)
    }

    async fn arm_idle_timer(&self) {
        let Some(channel) = self.sink.current_channel().await else {
            return;
        };
        self.idle.start(
            self.settings.idle_disconnect,
            self.sink.clone(),
            self.notifier.clone(),
            Some(channel),
        );
    }

    /// Detiene la pista actual; el fin de pista avanza la cola.
    ///
    /// Espera a que termine un seek en curso y detiene la pista que éste
    /// haya dejado sonando.
    pub async fn skip(&self) -> Result<Option<Song>, MusicError> {
        let _guard = self.advance_lock.lock().await;
        if !self.sink_active().await {
            return Err(MusicError::NothingPlaying);
        }
        let skipped = self.current();
        self.sink.stop().await;
        Ok(skipped)
    }

    /// Vacía la cola, detiene la reproducción y desconecta.
    pub async fn stop(&self) -> usize {
        let cleared = self.reset();
        self.sink.stop().await;
        self.sink.disconnect().await;
        info!("⏹️ Reproducción detenida en guild {}", self.guild_id);
        cleared
    }

    /// Discord cerró la conexión de voz por su cuenta.
    pub async fn handle_disconnect(&self) {
        let cleared = self.reset();
        self.sink.stop().await;
        info!(
            "🔌 Conexión de voz perdida en guild {} ({} canciones descartadas)",
            self.guild_id, cleared
        );
    }

    fn reset(&self) -> usize {
        self.ticket.fetch_add(1, Ordering::SeqCst);
        let cleared = self.queue.write().clear();
        *self.current.lock() = None;
        self.idle.cancel();
        self.set_state(PlayerState::Stopped);
        cleared
    }

    pub async fn pause(&self) -> Result<PauseOutcome, MusicError> {
        if self.sink.is_playing().await {
            self.sink.pause().await?;
            self.set_state(PlayerState::Paused);
            Ok(PauseOutcome::Paused)
        } else if self.sink.is_paused().await {
            Ok(PauseOutcome::AlreadyPaused)
        } else {
            Err(MusicError::NothingPlaying)
        }
    }

    pub async fn resume(&self) -> Result<ResumeOutcome, MusicError> {
        if self.sink.is_paused().await {
            self.sink.resume().await?;
            self.idle.cancel();
            self.set_state(PlayerState::Playing);
            Ok(ResumeOutcome::Resumed)
        } else if self.sink.is_playing().await {
            Ok(ResumeOutcome::AlreadyPlaying)
        } else {
            Err(MusicError::NothingPlaying)
        }
    }

    /// Reinicia la canción actual en `offset_secs` sin tocar la cola.
    ///
    /// Si la nueva resolución falla, la canción sigue marcada como actual
    /// pero la reproducción queda detenida.
    pub async fn seek(&self, offset_secs: u64) -> Result<Song, MusicError> {
        let _guard = self.advance_lock.lock().await;

        let current = self.current().ok_or(MusicError::NothingPlaying)?;
        if !self.sink_active().await {
            return Err(MusicError::NothingPlaying);
        }
        if current.duration_secs > 0 && offset_secs >= current.duration_secs {
            return Err(MusicError::SeekBeyondDuration {
                requested: offset_secs,
                duration: current.duration_secs,
            });
        }

        let mut generation = self.ticket.load(Ordering::SeqCst);
        let previous_state = self.state();
        self.set_state(PlayerState::Resolving);

        match self
            .launch(&current, Some(Duration::from_secs(offset_secs)), &mut generation)
            .await
        {
            Ok(Launch::Started) => {
                self.idle.cancel();
                self.set_state(PlayerState::Playing);
                info!("⏩ Seek a {}s en guild {}", offset_secs, self.guild_id);
                Ok(current)
            }
            Ok(Launch::Superseded) => Err(MusicError::NothingPlaying),
            Err(e) => {
                error!("Error en seek para {}: {}", song_label(&current), e);
                // La pista anterior no debe seguir sonando
                if self
                    .ticket
                    .compare_exchange(
                        generation,
                        generation + 1,
                        Ordering::SeqCst,
                        Ordering::SeqCst,
                    )
                    .is_ok()
                {
                    self.sink.stop().await;
                    self.set_state(PlayerState::Stopped);
                    self.arm_idle_timer().await;
                } else if self.state() == PlayerState::Resolving {
                    self.set_state(previous_state);
                }
                Err(e)
            }
        }
    }

    /// Vuelve a poner la canción actual en la cabeza y la detiene.
    pub async fn replay(&self) -> Result<Song, MusicError> {
        let _guard = self.advance_lock.lock().await;
        let current = self.current().ok_or(MusicError::NothingPlaying)?;
        if !self.sink_active().await {
            return Err(MusicError::NothingPlaying);
        }
        self.queue.write().push_front(current.clone())?;
        self.sink.stop().await;
        Ok(current)
    }

    /// Cambia el volumen compartido. Devuelve `true` si se aplicó en vivo.
    pub async fn set_volume(&self, percent: i64) -> Result<bool, MusicError> {
        if !(0..=100).contains(&percent) {
            return Err(MusicError::InvalidVolume(percent));
        }
        let volume = percent as f32 / 100.0;
        *self.volume.write() = volume;

        if self.sink.is_playing().await {
            self.sink.set_volume(volume).await;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn remove(&self, spec: &str) -> Result<Vec<Song>, MusicError> {
        self.queue.write().remove_by_spec(spec)
    }

    pub fn move_song(&self, from: usize, to: usize) -> Result<Song, MusicError> {
        self.queue.write().move_song(from, to).cloned()
    }

    pub fn shuffle(&self) -> ShuffleOutcome {
        self.queue.write().shuffle()
    }

    pub fn clear_queue(&self) -> usize {
        self.queue.write().clear()
    }
}
