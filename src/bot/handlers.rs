use anyhow::Result;
use serenity::{
    builder::{
        CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        player::{EnqueueReport, GuildPlayer, PauseOutcome, ResumeOutcome},
        queue::ShuffleOutcome,
    },
    bot::JukeboxBot,
    error::{ErrorKind, MusicError},
    sources::Diagnostics,
    ui::{
        embeds,
        format::{format_duration, format_position, parse_timestamp, song_label},
    },
};

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &JukeboxBot,
) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    let player = bot.sessions.player(guild_id.get());

    match command.data.name.as_str() {
        "play" => handle_play(ctx, &command, bot, guild_id, &player).await?,
        "queue" => handle_queue(ctx, &command, &player).await?,
        "remove" => handle_remove(ctx, &command, &player).await?,
        "move" => handle_move(ctx, &command, &player).await?,
        "shuffle" => handle_shuffle(ctx, &command, &player).await?,
        "clear" => handle_clear(ctx, &command, &player).await?,
        "skip" => handle_skip(ctx, &command, &player).await?,
        "stop" => handle_stop(ctx, &command, &player).await?,
        "pause" => handle_pause(ctx, &command, &player).await?,
        "resume" => handle_resume(ctx, &command, &player).await?,
        "seek" => handle_seek(ctx, &command, &player).await?,
        "replay" => handle_replay(ctx, &command, &player).await?,
        "volume" => handle_volume(ctx, &command, &player).await?,
        "musicdiag" => handle_musicdiag(ctx, &command, bot, &player).await?,
        _ => respond(ctx, &command, "❌ Comando no reconocido", true).await?,
    }

    Ok(())
}

// Handlers específicos para cada comando

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
    player: &Arc<GuildPlayer>,
) -> Result<()> {
    let query = string_option(command, "busqueda")
        .ok_or_else(|| anyhow::anyhow!("Búsqueda no proporcionada"))?;

    // Defer la respuesta ya que puede tomar tiempo
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let Some(voice_channel) = user_voice_channel(ctx, guild_id, command.user.id) else {
        return edit(ctx, command, "🚫 Debes estar en un canal de voz.").await;
    };

    if let Err(e) = player.connect(voice_channel.get()).await {
        error!("Error al conectar en guild {}: {}", guild_id, e);
        return edit(ctx, command, &error_message(&e)).await;
    }

    edit(ctx, command, &format!("🔎 Buscando: `{query}`...")).await?;

    let max_songs = bot
        .sessions
        .settings()
        .max_batch_size
        .min(player.remaining_capacity());
    if max_songs == 0 {
        let full = MusicError::QueueFull {
            max: bot.sessions.settings().max_queue_size,
        };
        return edit(ctx, command, &error_message(&full)).await;
    }

    let collected = match bot
        .sources
        .collect_songs(query, command.channel_id.get(), command.user.id.get(), max_songs)
        .await
    {
        Ok(collected) => collected,
        Err(e) => {
            warn!("Búsqueda fallida para '{}': {}", query, e);
            return edit(ctx, command, &format!("⚠️ {e}")).await;
        }
    };

    let Some(first) = collected.songs.first() else {
        return edit(
            ctx,
            command,
            "⚠️ No se encontraron canciones válidas para reproducir.",
        )
        .await;
    };

    let summary = EnqueueSummary {
        title: collected.title.clone(),
        first_label: song_label(first),
        total_secs: collected.songs.iter().map(|s| s.duration_secs).sum(),
        max_songs,
    };

    match player.enqueue(collected.songs).await {
        Ok(report) => edit(ctx, command, &summary.message(&report)).await,
        Err(e) => edit(ctx, command, &error_message(&e)).await,
    }
}

async fn handle_queue(
    ctx: &Context,
    command: &CommandInteraction,
    player: &GuildPlayer,
) -> Result<()> {
    let page = integer_option(command, "pagina")
        .and_then(|p| usize::try_from(p).ok())
        .unwrap_or(1);

    let embed = embeds::create_queue_embed(&player.queue_info(), player.state(), page);
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(CreateInteractionResponseMessage::new().embed(embed)),
        )
        .await?;

    Ok(())
}

async fn handle_remove(
    ctx: &Context,
    command: &CommandInteraction,
    player: &GuildPlayer,
) -> Result<()> {
    let spec = string_option(command, "numero").unwrap_or_default();

    let message = match player.remove(spec) {
        Ok(removed) if removed.len() == 1 => {
            format!("🗑️ Eliminada: **{}**", song_label(&removed[0]))
        }
        Ok(removed) => format!("🗑️ Eliminadas **{}** canciones de la cola.", removed.len()),
        Err(MusicError::OutOfRange { len }) => {
            format!("⚠️ Formato inválido o números fuera de rango (1 a {len}).")
        }
        Err(e) => error_message(&e),
    };

    respond(ctx, command, &message, false).await
}

async fn handle_move(
    ctx: &Context,
    command: &CommandInteraction,
    player: &GuildPlayer,
) -> Result<()> {
    let position = |name: &str| {
        integer_option(command, name)
            .and_then(|p| usize::try_from(p).ok())
            .unwrap_or(0)
    };
    let (from, to) = (position("origen"), position("destino"));

    let message = match player.move_song(from, to) {
        Ok(song) => format!("↕️ Movida: **{}** a posición #{}.", song_label(&song), to),
        Err(e) => error_message(&e),
    };

    respond(ctx, command, &message, false).await
}

async fn handle_shuffle(
    ctx: &Context,
    command: &CommandInteraction,
    player: &GuildPlayer,
) -> Result<()> {
    let message = match player.shuffle() {
        ShuffleOutcome::Shuffled => "🔀 **¡Cola barajada!**",
        ShuffleOutcome::Insufficient => "⚠️ Necesitas al menos 2 canciones en cola para barajar.",
    };

    respond(ctx, command, message, false).await
}

async fn handle_clear(
    ctx: &Context,
    command: &CommandInteraction,
    player: &GuildPlayer,
) -> Result<()> {
    let message = if player.clear_queue() > 0 {
        "🗑️ La cola ha sido vaciada."
    } else {
        "📭 La cola ya estaba vacía."
    };

    respond(ctx, command, message, false).await
}

async fn handle_skip(
    ctx: &Context,
    command: &CommandInteraction,
    player: &GuildPlayer,
) -> Result<()> {
    if !player.is_connected().await {
        return respond(ctx, command, "🚫 El bot no está conectado.", false).await;
    }

    let message = match player.skip().await {
        Ok(_) => "⏭️ Canción saltada.".to_string(),
        Err(MusicError::NothingPlaying) => "🎶 No hay música sonando para saltar.".to_string(),
        Err(e) => error_message(&e),
    };

    respond(ctx, command, &message, false).await
}

async fn handle_stop(
    ctx: &Context,
    command: &CommandInteraction,
    player: &GuildPlayer,
) -> Result<()> {
    if !player.is_connected().await {
        return respond(ctx, command, "🚫 No hay música en reproducción.", false).await;
    }

    player.stop().await;
    respond(ctx, command, "🛑 Música detenida. Bot desconectado.", false).await
}

async fn handle_pause(
    ctx: &Context,
    command: &CommandInteraction,
    player: &GuildPlayer,
) -> Result<()> {
    if !player.is_connected().await {
        return respond(ctx, command, "🚫 El bot no está conectado al canal de voz.", false).await;
    }

    match player.pause().await {
        Ok(PauseOutcome::Paused) => respond(ctx, command, "⏸️ Música pausada.", false).await,
        Ok(PauseOutcome::AlreadyPaused) => respond(ctx, command, "Ya estaba pausado.", true).await,
        Err(MusicError::NothingPlaying) => {
            respond(ctx, command, "🎶 No hay música sonando para pausar.", false).await
        }
        Err(e) => respond(ctx, command, &error_message(&e), false).await,
    }
}

async fn handle_resume(
    ctx: &Context,
    command: &CommandInteraction,
    player: &GuildPlayer,
) -> Result<()> {
    if !player.is_connected().await {
        return respond(ctx, command, "🚫 El bot no está conectado al canal de voz.", false).await;
    }

    match player.resume().await {
        Ok(ResumeOutcome::Resumed) => respond(ctx, command, "▶️ Música reanudada.", false).await,
        Ok(ResumeOutcome::AlreadyPlaying) => {
            respond(ctx, command, "La música ya estaba sonando.", true).await
        }
        Err(MusicError::NothingPlaying) => {
            respond(ctx, command, "🎶 No hay música pausada para reanudar.", false).await
        }
        Err(e) => respond(ctx, command, &error_message(&e), false).await,
    }
}

async fn handle_seek(
    ctx: &Context,
    command: &CommandInteraction,
    player: &GuildPlayer,
) -> Result<()> {
    if !player.is_connected().await {
        return respond(ctx, command, "🚫 No estoy conectado a un canal de voz.", false).await;
    }
    if player.current().is_none() {
        return respond(ctx, command, "⚠️ No hay una canción activa para hacer seek.", false).await;
    }

    let seconds = match parse_timestamp(string_option(command, "tiempo").unwrap_or_default()) {
        Ok(seconds) => seconds,
        Err(e) => return respond(ctx, command, &error_message(&e), false).await,
    };

    // Re-resolver el stream puede tardar
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let message = match player.seek(seconds).await {
        Ok(song) => format!(
            "⏩ Saltando **{}** a `{}`.",
            song_label(&song),
            format_position(seconds)
        ),
        Err(MusicError::Resolution(e)) => {
            error!("Error en /seek: {}", e);
            "⚠️ No se pudo resolver el stream para hacer seek.".to_string()
        }
        Err(e @ (MusicError::SeekBeyondDuration { .. } | MusicError::NothingPlaying)) => {
            error_message(&e)
        }
        Err(e) => {
            error!("Error en /seek: {}", e);
            "⚠️ No se pudo realizar seek en la canción actual.".to_string()
        }
    };

    edit(ctx, command, &message).await
}

async fn handle_replay(
    ctx: &Context,
    command: &CommandInteraction,
    player: &GuildPlayer,
) -> Result<()> {
    if player.current().is_none() {
        return respond(ctx, command, "⚠️ No hay canción registrada sonando.", false).await;
    }
    if !player.is_connected().await {
        return respond(ctx, command, "🚫 No estoy conectado.", false).await;
    }

    let message = match player.replay().await {
        Ok(song) => format!("🔄 Reiniciando: **{}**", song_label(&song)),
        Err(e) => error_message(&e),
    };

    respond(ctx, command, &message, false).await
}

async fn handle_volume(
    ctx: &Context,
    command: &CommandInteraction,
    player: &GuildPlayer,
) -> Result<()> {
    let level = integer_option(command, "nivel").unwrap_or(-1);

    let message = match player.set_volume(level).await {
        Ok(true) => format!("🔊 Volumen cambiado a **{level}%**."),
        Ok(false) => {
            format!("🔊 Volumen configurado a **{level}%** (se aplicará en la próxima canción).")
        }
        Err(e) => error_message(&e),
    };

    respond(ctx, command, &message, false).await
}

async fn handle_musicdiag(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    player: &GuildPlayer,
) -> Result<()> {
    let diagnostics = bot.sources.diagnostics().await;
    let report = DiagReport {
        diagnostics,
        ffmpeg_path: bot.config.ffmpeg_path.clone(),
        sessions: bot.sessions.len(),
        queue_len: player.queue_len(),
        volume_percent: (bot.sessions.default_volume() * 100.0).round() as u32,
    };

    respond(ctx, command, &report.message(), true).await
}

// Mensajes

/// Datos para el mensaje de confirmación de `/play`.
struct EnqueueSummary {
    title: String,
    first_label: String,
    total_secs: u64,
    max_songs: usize,
}

impl EnqueueSummary {
    fn message(&self, report: &EnqueueReport) -> String {
        let added = report.outcome.added;
        let mut message = if added > 1 {
            let mut text = format!(
                "🎶 **{}** canciones de **{}** añadidas ({} en total).",
                added,
                self.title,
                format_duration(self.total_secs)
            );
            if added >= self.max_songs {
                text.push_str(&format!(" (Se limitó a {} canciones).", self.max_songs));
            }
            text
        } else {
            format!("🎶 **{}** añadida a la cola.", self.first_label)
        };

        if report.starting {
            message.push_str(" Iniciando reproducción.");
        } else {
            message.push_str(&format!(
                " (Comienza en posición #{}).",
                report.outcome.first_position
            ));
        }
        message
    }
}

struct DiagReport {
    diagnostics: Diagnostics,
    ffmpeg_path: String,
    sessions: usize,
    queue_len: usize,
    volume_percent: u32,
}

impl DiagReport {
    fn message(&self) -> String {
        let diag = &self.diagnostics;
        format!(
            "🩺 Diagnóstico música\n\
            - yt-dlp: `{}`\n\
            - ffmpeg: `{}`\n\
            - ffmpeg version: `{}`\n\
            - spotify: `{}`\n\
            - sesiones activas: `{}`\n\
            - canciones en cola: `{}`\n\
            - volumen por defecto: `{}%`",
            diag.ytdlp_version.as_deref().unwrap_or("no encontrado"),
            self.ffmpeg_path,
            diag.ffmpeg_version.as_deref().unwrap_or("desconocida"),
            if diag.catalog_enabled { "habilitado" } else { "deshabilitado" },
            self.sessions,
            self.queue_len,
            self.volume_percent,
        )
    }
}

/// Texto para el usuario de un error de la sesión.
fn error_message(error: &MusicError) -> String {
    match error.kind() {
        ErrorKind::Input | ErrorKind::Capacity => debug!("Comando rechazado: {}", error),
        ErrorKind::Resolution | ErrorKind::Connection => warn!("Comando fallido: {}", error),
    }

    match error {
        MusicError::InvalidTime(_) => {
            "⚠️ Formato inválido. Usa segundos (`90`) o `mm:ss` / `hh:mm:ss`.".to_string()
        }
        MusicError::OutOfRange { len } => {
            format!("⚠️ Las posiciones deben estar entre 1 y {len}.")
        }
        MusicError::EmptyQueue => "📭 La cola está vacía.".to_string(),
        MusicError::NothingPlaying => "🎶 No hay música sonando.".to_string(),
        MusicError::SeekBeyondDuration {
            requested,
            duration,
        } => format!(
            "⚠️ El tiempo solicitado ({}) excede la duración ({}).",
            format_position(*requested),
            format_duration(*duration)
        ),
        MusicError::InvalidVolume(_) => "⚠️ El volumen debe estar entre 0 y 100.".to_string(),
        MusicError::QueueFull { max } => {
            format!("⚠️ La cola alcanzó su límite ({max} canciones).")
        }
        MusicError::Resolution(_) => "⚠️ No se pudo resolver el stream.".to_string(),
        MusicError::Connection(_) => "🚫 No se pudo conectar al canal de voz.".to_string(),
        MusicError::Sink(_) => "⚠️ Error en la conexión de voz.".to_string(),
    }
}

// Utilidades

fn string_option<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

fn integer_option(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_i64())
}

async fn respond(
    ctx: &Context,
    command: &CommandInteraction,
    content: &str,
    ephemeral: bool,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(ephemeral),
            ),
        )
        .await?;

    Ok(())
}

async fn edit(ctx: &Context, command: &CommandInteraction, content: &str) -> Result<()> {
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
        .await?;

    Ok(())
}

/// Canal de voz del usuario según la caché.
fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    let channel = guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id);
    channel
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{audio::queue::EnqueueOutcome, error::ResolveError};
    use pretty_assertions::assert_eq;

    fn report(added: usize, first_position: usize, starting: bool) -> EnqueueReport {
        EnqueueReport {
            outcome: EnqueueOutcome {
                added,
                dropped: 0,
                first_position,
            },
            starting,
        }
    }

    fn summary(max_songs: usize) -> EnqueueSummary {
        EnqueueSummary {
            title: "Mix".to_string(),
            first_label: "Intro [0:30]".to_string(),
            total_secs: 3661,
            max_songs,
        }
    }

    #[test]
    fn test_single_song_summary() {
        assert_eq!(
            summary(150).message(&report(1, 1, true)),
            "🎶 **Intro [0:30]** añadida a la cola. Iniciando reproducción."
        );
        assert_eq!(
            summary(150).message(&report(1, 4, false)),
            "🎶 **Intro [0:30]** añadida a la cola. (Comienza en posición #4)."
        );
    }

    #[test]
    fn test_playlist_summary_mentions_limit() {
        assert_eq!(
            summary(150).message(&report(3, 2, false)),
            "🎶 **3** canciones de **Mix** añadidas (1:01:01 en total). (Comienza en posición #2)."
        );
        assert_eq!(
            summary(3).message(&report(3, 1, true)),
            "🎶 **3** canciones de **Mix** añadidas (1:01:01 en total). (Se limitó a 3 canciones). Iniciando reproducción."
        );
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            error_message(&MusicError::SeekBeyondDuration {
                requested: 200,
                duration: 120
            }),
            "⚠️ El tiempo solicitado (3:20) excede la duración (2:00)."
        );
        assert_eq!(
            error_message(&MusicError::QueueFull { max: 300 }),
            "⚠️ La cola alcanzó su límite (300 canciones)."
        );
        assert_eq!(
            error_message(&MusicError::Resolution(ResolveError::NoStream)),
            "⚠️ No se pudo resolver el stream."
        );
    }

    #[test]
    fn test_diag_report() {
        let report = DiagReport {
            diagnostics: Diagnostics {
                ytdlp_version: Some("2025.06.09".to_string()),
                ffmpeg_version: None,
                catalog_enabled: false,
            },
            ffmpeg_path: "ffmpeg".to_string(),
            sessions: 3,
            queue_len: 12,
            volume_percent: 5,
        };
        let message = report.message();
        assert!(message.contains("- yt-dlp: `2025.06.09`"));
        assert!(message.contains("- ffmpeg version: `desconocida`"));
        assert!(message.contains("- spotify: `deshabilitado`"));
        assert!(message.contains("- canciones en cola: `12`"));
        assert!(message.contains("- volumen por defecto: `5%`"));
    }
}
