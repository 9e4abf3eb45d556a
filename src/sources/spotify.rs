//! Cliente mínimo de la Web API de Spotify.
//!
//! Solo traduce enlaces de canciones y playlists a búsquedas `"artista -
//! título"`; el audio siempre se resuelve por yt-dlp.

use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use super::query::catalog_search_query;

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_BASE: &str = "https://api.spotify.com/v1";
/// Canciones leídas de una playlist.
const PLAYLIST_LIMIT: usize = 50;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Enlace Spotify no reconocido (solo track/playlist).")]
    UnsupportedLink,

    #[error("Error al procesar el enlace de Spotify: {0}")]
    Request(#[from] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpotifyLink {
    Track(String),
    Playlist(String),
}

impl SpotifyLink {
    /// Acepta `https://open.spotify.com/[intl-xx/]track/<id>?si=...` y
    /// `spotify:playlist:<id>`.
    pub fn parse(link: &str) -> Result<Self, CatalogError> {
        let link = link.trim();

        let segments: Vec<String> = if let Some(uri) = link.strip_prefix("spotify:") {
            uri.split(':').map(str::to_string).collect()
        } else {
            let url = Url::parse(link).map_err(|_| CatalogError::UnsupportedLink)?;
            url.path_segments()
                .map(|segments| {
                    segments
                        .filter(|s| !s.is_empty() && !s.starts_with("intl-"))
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default()
        };

        match segments.as_slice() {
            [kind, id, ..] if kind == "track" && !id.is_empty() => Ok(Self::Track(id.clone())),
            [kind, id, ..] if kind == "playlist" && !id.is_empty() => {
                Ok(Self::Playlist(id.clone()))
            }
            _ => Err(CatalogError::UnsupportedLink),
        }
    }
}

/// Resultado de traducir un enlace del catálogo.
#[derive(Debug, Clone)]
pub struct CatalogBatch {
    pub title: String,
    pub queries: Vec<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
struct Artist {
    name: String,
}

#[derive(Deserialize)]
struct Track {
    name: Option<String>,
    #[serde(default)]
    artists: Vec<Artist>,
}

impl Track {
    fn search_query(&self) -> Option<String> {
        let title = self.name.as_deref().filter(|n| !n.is_empty())?;
        let artist = self.artists.first()?;
        Some(catalog_search_query(&artist.name, title))
    }
}

#[derive(Deserialize)]
struct PlaylistMeta {
    name: Option<String>,
}

#[derive(Deserialize)]
struct PlaylistItem {
    track: Option<Track>,
}

#[derive(Deserialize)]
struct PlaylistItems {
    #[serde(default)]
    items: Vec<Option<PlaylistItem>>,
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

pub struct SpotifyClient {
    http: Client,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<AccessToken>>,
}

impl SpotifyClient {
    pub fn new(client_id: String, client_secret: String) -> Result<Self, CatalogError> {
        let http = Client::builder().timeout(Duration::from_secs(15)).build()?;
        info!("🌐 Cliente de Spotify inicializado");
        Ok(Self {
            http,
            client_id,
            client_secret,
            token: Mutex::new(None),
        })
    }

    pub fn is_spotify_link(value: &str) -> bool {
        value.contains("spotify.com") || value.starts_with("spotify:")
    }

    /// Devuelve las búsquedas correspondientes a un enlace de Spotify.
    pub async fn search_queries(&self, link: &str) -> Result<CatalogBatch, CatalogError> {
        match SpotifyLink::parse(link)? {
            SpotifyLink::Track(id) => {
                let track: Track = self.get_json(&format!("{API_BASE}/tracks/{id}")).await?;
                let query = track.search_query().ok_or(CatalogError::UnsupportedLink)?;
                Ok(CatalogBatch {
                    title: format!("Canción Spotify: {}", track.name.unwrap_or_default()),
                    queries: vec![query],
                })
            }
            SpotifyLink::Playlist(id) => {
                let meta: PlaylistMeta = self
                    .get_json(&format!("{API_BASE}/playlists/{id}?fields=name"))
                    .await?;
                let page: PlaylistItems = self
                    .get_json(&format!(
                        "{API_BASE}/playlists/{id}/tracks?limit={PLAYLIST_LIMIT}"
                    ))
                    .await?;

                let queries: Vec<String> = page
                    .items
                    .into_iter()
                    .flatten()
                    .filter_map(|item| item.track)
                    .filter_map(|track| track.search_query())
                    .collect();
                debug!("📋 Playlist Spotify {}: {} canciones", id, queries.len());

                Ok(CatalogBatch {
                    title: meta.name.unwrap_or_else(|| "Playlist Spotify".to_string()),
                    queries,
                })
            }
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T, CatalogError> {
        let token = self.access_token().await?;
        let value = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()?
            .json::<T>()
            .await?;
        Ok(value)
    }

    async fn access_token(&self) -> Result<String, CatalogError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.value.clone());
            }
        }

        let credentials = STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));
        let response: TokenResponse = self
            .http
            .post(TOKEN_URL)
            .header("Authorization", format!("Basic {credentials}"))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .inspect_err(|e| warn!("⚠️ No se pudo obtener token de Spotify: {}", e))?
            .error_for_status()?
            .json()
            .await?;

        // Renovar un minuto antes de que expire
        let lifetime = Duration::from_secs(response.expires_in.saturating_sub(60));
        let value = response.access_token;
        *cached = Some(AccessToken {
            value: value.clone(),
            expires_at: Instant::now() + lifetime,
        });

        Ok(value)
    }
}
