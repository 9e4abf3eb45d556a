use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Reproducción
    pub playback: PlaybackConfig,

    // Rendimiento
    pub worker_threads: usize,
    pub blocking_threads: usize,

    // Binarios externos
    pub ytdlp_path: String,
    pub ffmpeg_path: String,

    // APIs (Opcionales)
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
}

/// Parámetros de la sesión de reproducción, compartidos por todas las guilds.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaybackConfig {
    /// Volumen inicial, 0.0 a 1.0.
    pub default_volume: f32,
    pub max_queue_size: usize,
    /// Máximo de canciones admitidas en una sola llamada a enqueue.
    pub max_batch_size: usize,
    pub idle_disconnect: Duration,
    pub resolve_retries: u32,
    pub resolve_timeout: Duration,
    pub resolve_backoff: Duration,
    /// Fallos de resolución seguidos antes de dejar de avanzar. 0 = sin límite.
    pub max_failure_streak: usize,
    pub connect_retries: u32,
    pub connect_retry_delay: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            default_volume: 0.05,
            max_queue_size: 300,
            max_batch_size: 150,
            idle_disconnect: Duration::from_secs(300),
            resolve_retries: 2,
            resolve_timeout: Duration::from_secs(25),
            resolve_backoff: Duration::from_millis(600),
            max_failure_streak: 10,
            connect_retries: 2,
            connect_retry_delay: Duration::from_secs(3),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(val) if !val.trim().is_empty() => Ok(val.trim().parse()?),
        _ => Ok(default),
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = PlaybackConfig::default();
        let default_volume_percent = (defaults.default_volume * 100.0).round() as u32;

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            application_id: std::env::var("APPLICATION_ID")?.parse()?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            playback: PlaybackConfig {
                default_volume: env_or::<u32>("DEFAULT_VOLUME", default_volume_percent)? as f32
                    / 100.0,
                max_queue_size: env_or("MAX_QUEUE_SIZE", defaults.max_queue_size)?,
                max_batch_size: env_or("MAX_BATCH_SIZE", defaults.max_batch_size)?,
                idle_disconnect: Duration::from_secs(env_or(
                    "IDLE_DISCONNECT_SECS",
                    defaults.idle_disconnect.as_secs(),
                )?),
                resolve_retries: env_or("RESOLVE_RETRIES", defaults.resolve_retries)?,
                resolve_timeout: Duration::from_secs(env_or(
                    "RESOLVE_TIMEOUT_SECS",
                    defaults.resolve_timeout.as_secs(),
                )?),
                resolve_backoff: Duration::from_millis(env_or(
                    "RESOLVE_BACKOFF_MS",
                    defaults.resolve_backoff.as_millis() as u64,
                )?),
                max_failure_streak: env_or("MAX_FAILURE_STREAK", defaults.max_failure_streak)?,
                connect_retries: env_or("CONNECT_RETRIES", defaults.connect_retries)?,
                connect_retry_delay: defaults.connect_retry_delay,
            },

            // Rendimiento
            worker_threads: env_or("WORKER_THREADS", num_cpus::get())?,
            blocking_threads: env_or("BLOCKING_THREADS", 16)?,

            ytdlp_path: env_or("YTDLP_PATH", "yt-dlp".to_string())?,
            ffmpeg_path: env_or("FFMPEG_PATH", "ffmpeg".to_string())?,

            spotify_client_id: std::env::var("SPOTIFY_CLIENT_ID").ok().filter(|s| !s.is_empty()),
            spotify_client_secret: std::env::var("SPOTIFY_CLIENT_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Volume must be between 0.0 and 1.0
    /// - Queue and batch limits must be > 0, batch never above the queue limit
    /// - At least one resolution attempt with a non-zero timeout
    /// - Worker pools must have at least one thread
    pub fn validate(&self) -> Result<()> {
        let playback = &self.playback;

        if !(0.0..=1.0).contains(&playback.default_volume) {
            anyhow::bail!(
                "Default volume must be between 0 and 100%, got: {}",
                playback.default_volume * 100.0
            );
        }

        if playback.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if playback.max_batch_size == 0 || playback.max_batch_size > playback.max_queue_size {
            anyhow::bail!(
                "Max batch size must be between 1 and the queue size ({}), got: {}",
                playback.max_queue_size,
                playback.max_batch_size
            );
        }

        if playback.resolve_retries == 0 {
            anyhow::bail!("At least one resolution attempt is required");
        }

        if playback.resolve_timeout.is_zero() {
            anyhow::bail!("Resolution timeout must be greater than 0");
        }

        if playback.connect_retries == 0 {
            anyhow::bail!("At least one voice connection attempt is required");
        }

        if self.worker_threads == 0 || self.blocking_threads == 0 {
            anyhow::bail!("Worker pools need at least one thread");
        }

        Ok(())
    }

    pub fn spotify_credentials(&self) -> Option<(String, String)> {
        match (&self.spotify_client_id, &self.spotify_client_secret) {
            (Some(id), Some(secret)) => Some((id.clone(), secret.clone())),
            _ => None,
        }
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Excludes the Discord token and API secrets.
    pub fn summary(&self) -> String {
        let playback = &self.playback;
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {})\n  \
            Audio: {}% vol, idle disconnect after {}\n  \
            Queue: {} max, {} per request\n  \
            Resolver: {} attempts, {} timeout, {} backoff\n  \
            Runtime: {} workers, {} blocking\n  \
            Spotify: {}",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            (playback.default_volume * 100.0).round() as u32,
            humantime::format_duration(playback.idle_disconnect),
            playback.max_queue_size,
            playback.max_batch_size,
            playback.resolve_retries,
            humantime::format_duration(playback.resolve_timeout),
            humantime::format_duration(playback.resolve_backoff),
            self.worker_threads,
            self.blocking_threads,
            if self.spotify_credentials().is_some() { "enabled" } else { "disabled" },
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,

            playback: PlaybackConfig::default(),

            worker_threads: num_cpus::get(),
            blocking_threads: 16,

            ytdlp_path: "yt-dlp".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),

            spotify_client_id: None,
            spotify_client_secret: None,
        }
    }
}
