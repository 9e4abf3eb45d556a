use anyhow::{Context, Result};
use serenity::{http::Http, model::gateway::GatewayIntents, model::id::GuildId, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info, warn};

mod audio;
mod bot;
mod config;
mod error;
mod sources;
mod ui;

use crate::audio::{
    notifier::DiscordNotifier,
    registry::SessionRegistry,
    sink::{SongbirdSink, VoiceSink},
};
use crate::bot::JukeboxBot;
use crate::config::Config;
use crate::sources::{resolver::StreamResolver, spotify::SpotifyClient, ytdlp::YtDlpClient, SourceManager};

fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("guild_jukebox=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Guild Jukebox v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load().context("No se pudo cargar la configuración")?;
    info!("{}", config.summary());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .max_blocking_threads(config.blocking_threads)
        .enable_all()
        .build()
        .context("No se pudo crear el runtime de tokio")?;

    runtime.block_on(run(config))
}

async fn run(config: Config) -> Result<()> {
    let ytdlp = Arc::new(YtDlpClient::new(config.ytdlp_path.clone()));
    let spotify = match config.spotify_credentials() {
        Some((id, secret)) => match SpotifyClient::new(id, secret) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!("⚠️ Cliente de Spotify deshabilitado: {}", e);
                None
            }
        },
        None => None,
    };
    let sources = Arc::new(SourceManager::new(
        ytdlp.clone(),
        spotify,
        config.ffmpeg_path.clone(),
        config.playback.resolve_timeout,
    ));

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&sources).await;
    }

    let http = Arc::new(Http::new(&config.discord_token));
    let songbird = Songbird::serenity();
    let stream_client = reqwest::Client::new();

    let resolver = Arc::new(StreamResolver::new(ytdlp, &config.playback));
    let sink_manager = songbird.clone();
    let sessions = Arc::new(SessionRegistry::new(
        config.playback.clone(),
        resolver,
        Arc::new(DiscordNotifier::new(http)),
        move |guild_id| {
            Arc::new(SongbirdSink::new(
                sink_manager.clone(),
                GuildId::new(guild_id),
                stream_client.clone(),
            )) as Arc<dyn VoiceSink>
        },
    ));

    // Solo se necesitan guilds y estados de voz
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    let handler = JukeboxBot::new(Arc::new(config.clone()), sessions, sources);
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await
        .context("Error al crear el cliente de Discord")?;

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("⚠️ Señal de shutdown recibida, cerrando...");
                shard_manager.shutdown_all().await;
            }
            Err(e) => error!("Error al registrar Ctrl+C: {:?}", e),
        }
    });

    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}

async fn health_check(sources: &SourceManager) -> Result<()> {
    let diagnostics = sources.diagnostics().await;

    match (&diagnostics.ytdlp_version, &diagnostics.ffmpeg_version) {
        (Some(_), Some(_)) => {
            println!("OK");
            Ok(())
        }
        _ => anyhow::bail!("Dependencias faltantes: {:?}", diagnostics),
    }
}
