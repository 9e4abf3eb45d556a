use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

use super::{
    notifier::Notifier,
    player::{GuildPlayer, SharedVolume},
    sink::VoiceSink,
};
use crate::{config::PlaybackConfig, sources::resolver::StreamResolver};

type SinkFactory = Box<dyn Fn(u64) -> Arc<dyn VoiceSink> + Send + Sync>;

/// Reproductores por guild, creados en el primer acceso y nunca eliminados.
pub struct SessionRegistry {
    players: DashMap<String, Arc<GuildPlayer>>,
    sinks: SinkFactory,
    resolver: Arc<StreamResolver>,
    notifier: Arc<dyn Notifier>,
    volume: SharedVolume,
    settings: PlaybackConfig,
}

impl SessionRegistry {
    pub fn new<F>(
        settings: PlaybackConfig,
        resolver: Arc<StreamResolver>,
        notifier: Arc<dyn Notifier>,
        sinks: F,
    ) -> Self
    where
        F: Fn(u64) -> Arc<dyn VoiceSink> + Send + Sync + 'static,
    {
        Self {
            players: DashMap::new(),
            sinks: Box::new(sinks),
            resolver,
            notifier,
            volume: Arc::new(RwLock::new(settings.default_volume)),
            settings,
        }
    }

    /// Devuelve el reproductor de la guild, creándolo si no existe.
    pub fn player(&self, guild_id: u64) -> Arc<GuildPlayer> {
        self.players
            .entry(guild_id.to_string())
            .or_insert_with(|| {
                info!("🆕 Sesión de música creada para guild {}", guild_id);
                GuildPlayer::new(
                    guild_id.to_string(),
                    (self.sinks)(guild_id),
                    self.resolver.clone(),
                    self.notifier.clone(),
                    self.volume.clone(),
                    self.settings.clone(),
                )
            })
            .clone()
    }

    /// Reproductor existente, sin crearlo.
    pub fn get(&self, guild_id: u64) -> Option<Arc<GuildPlayer>> {
        self.players
            .get(&guild_id.to_string())
            .map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn default_volume(&self) -> f32 {
        *self.volume.read()
    }

    pub fn settings(&self) -> &PlaybackConfig {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::{
        stub_resolver, test_settings, FakeSink, RecordingNotifier, StubExtractor,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry(created: Arc<AtomicUsize>) -> SessionRegistry {
        SessionRegistry::new(
            test_settings(),
            stub_resolver(Arc::new(StubExtractor::default())),
            Arc::new(RecordingNotifier::default()),
            move |_| {
                created.fetch_add(1, Ordering::SeqCst);
                Arc::new(FakeSink::connected(1)) as Arc<dyn VoiceSink>
            },
        )
    }

    #[tokio::test]
    async fn test_players_are_created_once_per_guild() {
        let created = Arc::new(AtomicUsize::new(0));
        let registry = registry(created.clone());
        assert!(registry.get(10).is_none());

        let first = registry.player(10);
        let again = registry.player(10);
        let other = registry.player(20);

        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(first.guild_id(), "10");
        assert_eq!(registry.len(), 2);
        assert_eq!(created.load(Ordering::SeqCst), 2);
        assert!(registry.get(10).is_some());
    }

    #[tokio::test]
    async fn test_volume_is_shared_between_guilds() {
        let registry = registry(Arc::new(AtomicUsize::new(0)));
        let first = registry.player(1);
        let second = registry.player(2);

        first.set_volume(70).await.unwrap();
        assert!((second.volume() - 0.7).abs() < f32::EPSILON);
        assert!((registry.default_volume() - 0.7).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_concurrent_access_creates_single_player() {
        let registry = Arc::new(registry(Arc::new(AtomicUsize::new(0))));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.player(99) })
            })
            .collect();

        let mut players = Vec::new();
        for handle in handles {
            players.push(handle.await.unwrap());
        }
        assert!(players.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(registry.len(), 1);
    }
}
