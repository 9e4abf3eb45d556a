use async_trait::async_trait;
use serenity::{http::Http, model::id::ChannelId};
use std::sync::Arc;
use tracing::warn;

/// Envía mensajes de estado a un canal de texto.
///
/// Los fallos de envío se registran y se ignoran: nunca afectan la
/// reproducción.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, channel_id: u64, message: &str);
}

/// Notificador sobre la API HTTP de Discord.
pub struct DiscordNotifier {
    http: Arc<Http>,
}

impl DiscordNotifier {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn notify(&self, channel_id: u64, message: &str) {
        if channel_id == 0 {
            return;
        }
        if let Err(e) = ChannelId::new(channel_id).say(&self.http, message).await {
            warn!("⚠️ No se pudo enviar mensaje al canal {}: {:?}", channel_id, e);
        }
    }
}
