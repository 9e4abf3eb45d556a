use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use super::ExtractedInfo;
use crate::{
    config::PlaybackConfig,
    error::{ExtractError, ResolveError},
};

/// Identidades de cliente que el extractor presenta al backend.
///
/// `Fallback` es más conservador: sin el cliente iOS, que es el primero en
/// sufrir restricciones del lado del servidor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientProfile {
    Primary,
    Fallback,
}

impl ClientProfile {
    pub fn player_clients(self) -> &'static [&'static str] {
        match self {
            Self::Primary => &["ios", "android", "web"],
            Self::Fallback => &["android", "web"],
        }
    }
}

/// Fuente de extracción de streams.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract_stream(
        &self,
        locator: &str,
        profile: ClientProfile,
    ) -> Result<ExtractedInfo, ExtractError>;
}

/// Opciones con las que el sink debe arrancar el stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackOptions {
    pub start_at: Option<Duration>,
}

/// Un stream listo para reproducir. La URL expira: se resuelve justo antes
/// de entregarla al sink y nunca se guarda en la cola.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    pub url: String,
    /// Extractor que produjo la URL, para diagnóstico.
    pub extractor: Option<String>,
    pub title: Option<String>,
    pub options: PlaybackOptions,
}

impl StreamDescriptor {
    fn from_info(info: ExtractedInfo) -> Option<Self> {
        // Una búsqueda devuelve una playlist de un elemento
        let info = if info.url.is_none() && info.is_playlist() {
            info.entries().next()?.clone()
        } else {
            info
        };

        let url = info.url.filter(|u| !u.trim().is_empty())?;
        Some(Self {
            url,
            extractor: info.extractor_key.or(info.extractor),
            title: info.title,
            options: PlaybackOptions::default(),
        })
    }

    pub fn starting_at(mut self, offset: Duration) -> Self {
        self.options.start_at = Some(offset);
        self
    }
}

/// Convierte localizadores en streams con reintentos, fallback y timeout.
pub struct StreamResolver {
    extractor: Arc<dyn Extractor>,
    attempts: u32,
    attempt_timeout: Duration,
    backoff: Duration,
}

impl StreamResolver {
    pub fn new(extractor: Arc<dyn Extractor>, config: &PlaybackConfig) -> Self {
        Self {
            extractor,
            attempts: config.resolve_retries.max(1),
            attempt_timeout: config.resolve_timeout,
            backoff: config.resolve_backoff,
        }
    }

    /// Resuelve un localizador. Devuelve el último error si todos los
    /// intentos fallan.
    pub async fn resolve(&self, locator: &str) -> Result<StreamDescriptor, ResolveError> {
        let mut last_error = None;

        for attempt in 1..=self.attempts {
            let outcome = match timeout(self.attempt_timeout, self.attempt(locator)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ResolveError::Timeout(self.attempt_timeout)),
            };

            match outcome {
                Ok(stream) => {
                    info!(
                        "🎵 Stream listo (intento {}): extractor={}",
                        attempt,
                        stream.extractor.as_deref().unwrap_or("?")
                    );
                    return Ok(stream);
                }
                Err(e) => {
                    warn!(
                        "⚠️ Intento {}/{} de resolución falló para {}: {}",
                        attempt, self.attempts, locator, e
                    );
                    last_error = Some(e);
                }
            }

            if attempt < self.attempts {
                sleep(self.backoff).await;
            }
        }

        Err(last_error.unwrap_or(ResolveError::NoStream))
    }

    async fn attempt(&self, locator: &str) -> Result<StreamDescriptor, ResolveError> {
        let info = match self
            .extractor
            .extract_stream(locator, ClientProfile::Primary)
            .await
        {
            Ok(info) => info,
            Err(e) if e.is_recoverable() => {
                warn!("Fallo extracción primaria para {}: {}", locator, e);
                self.extractor
                    .extract_stream(locator, ClientProfile::Fallback)
                    .await?
            }
            Err(e) => return Err(e.into()),
        };

        StreamDescriptor::from_info(info).ok_or(ResolveError::NoStreamUrl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::Sequence;
    use tokio::time::Instant;

    fn stream_info(url: &str, extractor: &str) -> ExtractedInfo {
        ExtractedInfo {
            url: Some(url.to_string()),
            extractor: Some(extractor.to_string()),
            ..ExtractedInfo::default()
        }
    }

    fn resolver(mock: MockExtractor) -> StreamResolver {
        StreamResolver::new(Arc::new(mock), &PlaybackConfig::default())
    }

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let mut mock = MockExtractor::new();
        mock.expect_extract_stream()
            .withf(|locator, profile| locator == "https://youtu.be/a" && *profile == ClientProfile::Primary)
            .times(1)
            .returning(|_, _| Ok(stream_info("https://cdn/primary", "youtube")));

        let stream = resolver(mock).resolve("https://youtu.be/a").await.unwrap();
        assert_eq!(stream.url, "https://cdn/primary");
        assert_eq!(stream.extractor.as_deref(), Some("youtube"));
        assert_eq!(stream.options, PlaybackOptions::default());
    }

    #[tokio::test]
    async fn test_fallback_used_after_recoverable_failure() {
        let mut seq = Sequence::new();
        let mut mock = MockExtractor::new();
        mock.expect_extract_stream()
            .withf(|locator, profile| locator == "https://youtu.be/a" && *profile == ClientProfile::Primary)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(ExtractError::Download("Sign in to confirm".into())));
        mock.expect_extract_stream()
            .withf(|locator, profile| locator == "https://youtu.be/a" && *profile == ClientProfile::Fallback)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(stream_info("https://cdn/fallback", "youtube")));

        let stream = resolver(mock).resolve("https://youtu.be/a").await.unwrap();
        assert_eq!(stream.url, "https://cdn/fallback");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrecoverable_failure_does_not_try_fallback() {
        let mut mock = MockExtractor::new();
        mock.expect_extract_stream()
            .withf(|_, profile| *profile == ClientProfile::Primary)
            .times(2)
            .returning(|_, _| Err(ExtractError::Spawn("yt-dlp not found".into())));

        let err = resolver(mock).resolve("x").await.unwrap_err();
        assert!(matches!(err, ResolveError::Extraction(ExtractError::Spawn(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_attempt_succeeds_after_backoff() {
        let mut seq = Sequence::new();
        let mut mock = MockExtractor::new();
        // Intento 1: ambos perfiles fallan
        mock.expect_extract_stream()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(ExtractError::Download("HTTP 403".into())));
        // Intento 2: el primario responde
        mock.expect_extract_stream()
            .withf(|_, profile| *profile == ClientProfile::Primary)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(stream_info("https://cdn/second", "youtube")));

        let started = Instant::now();
        let stream = resolver(mock).resolve("https://youtu.be/b").await.unwrap();

        assert_eq!(stream.url, "https://cdn/second");
        assert!(started.elapsed() >= PlaybackConfig::default().resolve_backoff);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_attempts_fail_with_last_error() {
        let mut mock = MockExtractor::new();
        mock.expect_extract_stream()
            .times(2)
            .returning(|_, _| Ok(ExtractedInfo::default()));

        let started = Instant::now();
        let err = resolver(mock).resolve("https://youtu.be/c").await.unwrap_err();

        assert!(matches!(err, ResolveError::NoStreamUrl));
        // Una sola espera: no hay backoff después del último intento
        let backoff = PlaybackConfig::default().resolve_backoff;
        assert!(started.elapsed() >= backoff);
        assert!(started.elapsed() < backoff * 2);
    }

    struct HangingExtractor;

    #[async_trait]
    impl Extractor for HangingExtractor {
        async fn extract_stream(
            &self,
            _locator: &str,
            _profile: ClientProfile,
        ) -> Result<ExtractedInfo, ExtractError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempts_time_out() {
        let config = PlaybackConfig::default();
        let resolver = StreamResolver::new(Arc::new(HangingExtractor), &config);

        let started = Instant::now();
        let err = resolver.resolve("https://youtu.be/d").await.unwrap_err();

        assert!(matches!(err, ResolveError::Timeout(t) if t == config.resolve_timeout));
        assert!(started.elapsed() >= config.resolve_timeout * 2 + config.resolve_backoff);
    }

    #[test]
    fn test_search_result_uses_first_entry() {
        let info = ExtractedInfo {
            kind: Some("playlist".into()),
            entries: Some(vec![None, Some(stream_info("https://cdn/first", "youtube"))]),
            ..ExtractedInfo::default()
        };
        let stream = StreamDescriptor::from_info(info).unwrap();
        assert_eq!(stream.url, "https://cdn/first");
        assert_eq!(
            stream.starting_at(Duration::from_secs(30)).options.start_at,
            Some(Duration::from_secs(30))
        );
    }
}
