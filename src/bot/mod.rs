//! # Bot Module
//!
//! Discord side of the jukebox: slash command registration, interaction
//! dispatch and voice state tracking.
//!
//! ## Architecture
//!
//! [`JukeboxBot`] implements Serenity's [`EventHandler`]. It owns no playback
//! state itself; every command is forwarded to the guild's
//! [`GuildPlayer`](crate::audio::player::GuildPlayer) obtained from the
//! [`SessionRegistry`].
//!
//! - [`commands`]: slash command definitions
//! - [`handlers`]: command dispatch and user-facing messages

use anyhow::Result;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{error, info, warn};

pub mod commands;
pub mod handlers;

use crate::{audio::registry::SessionRegistry, config::Config, sources::SourceManager};

/// Handler de eventos de Discord.
pub struct JukeboxBot {
    pub config: Arc<Config>,
    pub sessions: Arc<SessionRegistry>,
    pub sources: Arc<SourceManager>,
}

impl JukeboxBot {
    pub fn new(
        config: Arc<Config>,
        sessions: Arc<SessionRegistry>,
        sources: Arc<SourceManager>,
    ) -> Self {
        Self {
            config,
            sessions,
            sources,
        }
    }

    /// Registra los comandos slash.
    ///
    /// Con `GUILD_ID` configurado se registran solo en esa guild (propagación
    /// inmediata); si no, globalmente.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");
        info!("🔧 Application ID: {}", self.config.application_id);

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);

                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no está en la guild especificada: {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id)
                    .await
                    .map_err(|e| {
                        error!("❌ Error registrando comandos de guild: {:?}", e);
                        anyhow::anyhow!("No se pudieron registrar comandos de guild. Verifica que el bot tenga permisos de 'applications.commands' en la guild.")
                    })?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Error registrando comandos globales: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos globales. Verifica que el bot tenga permisos de 'applications.commands'.")
                })?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for JukeboxBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command_interaction) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }

    /// Detecta cuando el bot es expulsado o desconectado del canal de voz.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || old.is_none() || new.channel_id.is_some() {
            return;
        }

        let Some(guild_id) = new.guild_id else {
            return;
        };

        info!("🔌 Bot desconectado en guild {}", guild_id);
        if let Some(player) = self.sessions.get(guild_id.get()) {
            player.handle_disconnect().await;
        }
    }
}
