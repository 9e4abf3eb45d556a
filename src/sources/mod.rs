//! Fuentes de audio: búsqueda de canciones y resolución de streams.
//!
//! `SourceManager` convierte lo que escribe el usuario (texto libre, enlaces
//! de YouTube o de Spotify) en una lista de [`Song`]; el
//! [`resolver::StreamResolver`] convierte luego cada `Song` en un stream
//! reproducible justo antes de sonar.

pub mod query;
pub mod resolver;
pub mod spotify;
pub mod ytdlp;

use serde::Deserialize;
use std::{process::Stdio, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::{process::Command, time::timeout};
use tracing::{debug, info, warn};

use crate::audio::queue::Song;
use query::{is_youtube_url, make_extraction_query, normalize_entry_url};
use spotify::{CatalogError, SpotifyClient};
use ytdlp::YtDlpClient;

/// Salida JSON de yt-dlp. Solo los campos que se usan.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractedInfo {
    pub id: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub webpage_url: Option<String>,
    pub extractor: Option<String>,
    pub extractor_key: Option<String>,
    pub duration: Option<f64>,
    #[serde(rename = "_type")]
    pub kind: Option<String>,
    pub entries: Option<Vec<Option<ExtractedInfo>>>,
}

impl ExtractedInfo {
    pub fn duration_secs(&self) -> Option<u64> {
        self.duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| d.round() as u64)
    }

    pub fn is_playlist(&self) -> bool {
        self.kind.as_deref() == Some("playlist") || self.entries.is_some()
    }

    /// Entradas no nulas de una playlist o búsqueda.
    pub fn entries(&self) -> impl Iterator<Item = &ExtractedInfo> {
        self.entries.iter().flatten().flatten()
    }

    fn to_song(&self, origin_channel: u64) -> Option<Song> {
        let locator = normalize_entry_url(self.webpage_url.as_deref(), self.url.as_deref())?;
        if !is_youtube_url(&locator) {
            debug!("Entrada descartada (host no permitido): {}", locator);
            return None;
        }
        Some(Song::new(
            locator,
            self.title.clone(),
            self.duration_secs(),
            origin_channel,
        ))
    }
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Enlace Spotify detectado, pero faltan SPOTIFY_CLIENT_ID/SPOTIFY_CLIENT_SECRET.")]
    CatalogDisabled,

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Canciones encontradas para una entrada del usuario.
#[derive(Debug, Clone)]
pub struct Collected {
    pub title: String,
    pub songs: Vec<Song>,
}

/// Estado de los binarios externos.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    pub ytdlp_version: Option<String>,
    pub ffmpeg_version: Option<String>,
    pub catalog_enabled: bool,
}

/// Punto de entrada para buscar canciones.
pub struct SourceManager {
    ytdlp: Arc<YtDlpClient>,
    spotify: Option<SpotifyClient>,
    ffmpeg_path: String,
    metadata_timeout: Duration,
}

impl SourceManager {
    pub fn new(
        ytdlp: Arc<YtDlpClient>,
        spotify: Option<SpotifyClient>,
        ffmpeg_path: impl Into<String>,
        metadata_timeout: Duration,
    ) -> Self {
        Self {
            ytdlp,
            spotify,
            ffmpeg_path: ffmpeg_path.into(),
            metadata_timeout,
        }
    }

    /// Busca hasta `max` canciones para la entrada del usuario.
    ///
    /// Las búsquedas que fallan o exceden `metadata_timeout` se registran y
    /// se omiten; el resultado puede quedar vacío.
    pub async fn collect_songs(
        &self,
        input: &str,
        origin_channel: u64,
        requester: u64,
        max: usize,
    ) -> Result<Collected, LookupError> {
        let from_catalog = SpotifyClient::is_spotify_link(input);

        let (queries, mut title) = if from_catalog {
            let spotify = self.spotify.as_ref().ok_or(LookupError::CatalogDisabled)?;
            let batch = spotify.search_queries(input).await?;
            (batch.queries, batch.title)
        } else {
            (vec![input.to_string()], "Búsqueda Directa".to_string())
        };

        let mut songs = Vec::new();
        for query in queries {
            let remaining = max.saturating_sub(songs.len());
            if remaining == 0 {
                break;
            }

            let extraction_query = make_extraction_query(&query);
            let extraction = self
                .ytdlp
                .extract_metadata(&extraction_query, remaining);
            // Al vencer, el future se descarta y kill_on_drop mata el proceso
            let info = match timeout(self.metadata_timeout, extraction).await {
                Ok(Ok(info)) => info,
                Ok(Err(e)) => {
                    warn!("⚠️ Sin resultados para '{}': {}", query, e);
                    continue;
                }
                Err(_) => {
                    warn!(
                        "⏱️ yt-dlp excedió {:?} buscando '{}'",
                        self.metadata_timeout, query
                    );
                    continue;
                }
            };

            if info.is_playlist() {
                if !from_catalog {
                    if let Some(name) = info.title.as_deref().filter(|t| !t.is_empty()) {
                        title = name.to_string();
                    }
                }
                songs.extend(
                    info.entries()
                        .filter_map(|entry| entry.to_song(origin_channel))
                        .take(remaining),
                );
            } else if let Some(song) = info.to_song(origin_channel) {
                songs.push(song);
            }
        }

        let songs: Vec<Song> = songs
            .into_iter()
            .map(|song| song.with_requester(requester))
            .collect();
        info!("🔍 {} canciones encontradas para '{}'", songs.len(), input);

        Ok(Collected { title, songs })
    }

    pub async fn diagnostics(&self) -> Diagnostics {
        let ffmpeg_version = Command::new(&self.ffmpeg_path)
            .arg("-version")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .ok()
            .filter(|output| output.status.success())
            .and_then(|output| {
                String::from_utf8_lossy(&output.stdout)
                    .lines()
                    .next()
                    .map(str::to_string)
            });

        Diagnostics {
            ytdlp_version: self.ytdlp.version().await,
            ffmpeg_version,
            catalog_enabled: self.spotify.is_some(),
        }
    }
}
