use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{notifier::Notifier, sink::VoiceSink};

/// Aviso que se envía al desconectar por inactividad.
pub fn idle_disconnect_message(delay: Duration) -> String {
    let secs = delay.as_secs();
    let span = if secs >= 60 && secs % 60 == 0 {
        format!("{} minutos", secs / 60)
    } else {
        format!("{secs} segundos")
    };
    format!("😴 Desconectado automáticamente por inactividad ({span}).")
}

/// Temporizador de desconexión por inactividad de una guild.
///
/// Como máximo hay uno armado: `start` cancela el anterior.
#[derive(Default)]
pub struct IdleTimer {
    token: Mutex<Option<CancellationToken>>,
}

impl IdleTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arma el temporizador. Al vencer desconecta el sink si no está
    /// sonando ni en pausa y avisa en `notify_channel`.
    pub fn start(
        &self,
        delay: Duration,
        sink: Arc<dyn VoiceSink>,
        notifier: Arc<dyn Notifier>,
        notify_channel: Option<u64>,
    ) {
        let token = CancellationToken::new();
        if let Some(previous) = self.token.lock().replace(token.clone()) {
            previous.cancel();
        }

        debug!("⏲️ Temporizador de inactividad armado ({:?})", delay);
        let fired = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("⏲️ Temporizador de inactividad cancelado");
                }
                _ = tokio::time::sleep(delay) => {
                    fired.cancel();
                    if sink.is_playing().await || sink.is_paused().await {
                        return;
                    }
                    if !sink.is_connected().await {
                        return;
                    }
                    info!("😴 Desconectando por inactividad");
                    sink.disconnect().await;
                    if let Some(channel) = notify_channel {
                        notifier.notify(channel, &idle_disconnect_message(delay)).await;
                    }
                }
            }
        });
    }

    /// Cancela el temporizador armado, si hay uno.
    pub fn cancel(&self) {
        if let Some(token) = self.token.lock().take() {
            token.cancel();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.token
            .lock()
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }
}
