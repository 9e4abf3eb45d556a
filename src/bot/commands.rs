use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId, permissions::Permissions},
    prelude::Context,
};

fn all_commands() -> Vec<CreateCommand> {
    vec![
        play_command(),
        queue_command(),
        remove_command(),
        move_command(),
        shuffle_command(),
        clear_command(),
        skip_command(),
        stop_command(),
        pause_command(),
        resume_command(),
        seek_command(),
        replay_command(),
        volume_command(),
        musicdiag_command(),
    ]
}

/// Registra comandos globales
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registra comandos para una guild específica (desarrollo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

// Comandos de reproducción

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Busca y reproduce música (o añade a la cola).")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "busqueda",
                "URL o nombre de la canción.",
            )
            .required(true),
        )
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Salta a la siguiente canción de la cola.")
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Detiene la música, borra la cola y desconecta.")
}

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pausa la canción actual.")
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume").description("Reanuda la canción pausada.")
}

fn seek_command() -> CreateCommand {
    CreateCommand::new("seek")
        .description("Salta a un tiempo específico de la canción actual (ej: 90, 1:30, 00:02:15).")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "tiempo",
                "Segundo o formato mm:ss / hh:mm:ss.",
            )
            .required(true),
        )
}

fn replay_command() -> CreateCommand {
    CreateCommand::new("replay").description("Reinicia la canción actual.")
}

fn volume_command() -> CreateCommand {
    CreateCommand::new("volume")
        .description("Ajusta el volumen (0-100).")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "nivel",
                "Porcentaje de volumen (0 a 100).",
            )
            .min_int_value(0)
            .max_int_value(100)
            .required(true),
        )
}

// Comandos de cola

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue")
        .description("Muestra la cola de reproducción.")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "pagina", "Número de página")
                .min_int_value(1),
        )
}

fn remove_command() -> CreateCommand {
    CreateCommand::new("remove")
        .description("Quita canciones de la cola por número, rangos (3-5) o comas (2,4,6).")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "numero",
                "Números o rangos (ej: '3', '2-5', '1,4').",
            )
            .required(true),
        )
}

fn move_command() -> CreateCommand {
    CreateCommand::new("move")
        .description("Mueve una canción de posición dentro de la cola.")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "origen", "Posición actual (1..N).")
                .min_int_value(1)
                .required(true),
        )
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "destino", "Nueva posición (1..N).")
                .min_int_value(1)
                .required(true),
        )
}

fn shuffle_command() -> CreateCommand {
    CreateCommand::new("shuffle").description("Baraja la cola de reproducción.")
}

fn clear_command() -> CreateCommand {
    CreateCommand::new("clear").description("Borra todas las canciones de la cola.")
}

// Diagnóstico

fn musicdiag_command() -> CreateCommand {
    CreateCommand::new("musicdiag")
        .description("(MOD) Diagnóstico operativo del módulo de música.")
        .default_member_permissions(Permissions::ADMINISTRATOR)
}
