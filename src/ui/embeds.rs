use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};

use super::format::{format_duration, song_label};
use crate::audio::{player::PlayerState, queue::QueueInfo};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Guild Jukebox";

pub const QUEUE_PAGE_SIZE: usize = 20;

/// Crea un embed para mostrar la cola
pub fn create_queue_embed(queue_info: &QueueInfo, state: PlayerState, page: usize) -> CreateEmbed {
    let queue_page = queue_info.page(page, QUEUE_PAGE_SIZE);

    let mut embed = CreateEmbed::default()
        .title("📜 Cola de Reproducción")
        .color(colors::INFO_BLUE);

    if let Some(current) = &queue_info.current {
        let status = match state {
            PlayerState::Paused => "⏸️ En pausa",
            PlayerState::Resolving => "⏳ Preparando",
            _ => "▶️ Reproduciendo",
        };
        embed = embed.field(status, format!("**{}**", song_label(current)), false);
    }

    if queue_info.items.is_empty() {
        return embed
            .description(":man_shrugging: La cola está vacía.\n\n💡 Usa `/play <canción>` para agregar música")
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
            .timestamp(Timestamp::now());
    }

    let mut description = String::new();
    for (i, song) in queue_page.items.iter().enumerate() {
        description.push_str(&format!(
            "**{}.** {}\n",
            queue_page.first_position + i,
            song_label(song)
        ));
    }
    embed = embed.field("Próximas canciones", description, false);

    embed = embed.field(
        "Información",
        format!(
            "**Total:** {} canciones • **Duración:** {}",
            queue_info.items.len(),
            format_duration(queue_info.total_duration_secs)
        ),
        false,
    );

    // Paginación
    if queue_page.total_pages > 1 {
        embed = embed.footer(CreateEmbedFooter::new(format!(
            "Página {} de {} • Guild Jukebox",
            queue_page.current_page, queue_page.total_pages
        )));
    } else {
        embed = embed.footer(CreateEmbedFooter::new(STANDARD_FOOTER));
    }

    embed.timestamp(Timestamp::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::queue::{MusicQueue, Song};
    use serde_json::Value;

    fn field_values(embed: &CreateEmbed) -> Vec<String> {
        let json = serde_json::to_value(embed).unwrap();
        json["fields"]
            .as_array()
            .map(|fields| {
                fields
                    .iter()
                    .filter_map(|f| f["value"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    #[test]
    fn test_listed_song_shows_position_and_duration() {
        let mut queue = MusicQueue::new(300, 150);
        queue
            .enqueue(vec![
                Song::new("https://youtu.be/a", Some("Intro".into()), Some(30), 1),
                Song::new("https://youtu.be/b", Some("Larga".into()), Some(3661), 1),
            ])
            .unwrap();

        let embed = create_queue_embed(&queue.snapshot(None), PlayerState::Idle, 1);
        let values = field_values(&embed).join("\n");
        assert!(values.contains("**1.** Intro [0:30]"));
        assert!(values.contains("**2.** Larga [1:01:01]"));
        assert!(values.contains("**Total:** 2 canciones • **Duración:** 1:01:31"));
    }

    #[test]
    fn test_second_page_continues_numbering() {
        let mut queue = MusicQueue::new(300, 150);
        queue
            .enqueue(
                (0..25)
                    .map(|i| Song::new(format!("u{i}"), Some(format!("S{i}")), Some(10), 1))
                    .collect(),
            )
            .unwrap();

        let embed = create_queue_embed(&queue.snapshot(None), PlayerState::Playing, 2);
        let values = field_values(&embed).join("\n");
        assert!(values.contains("**21.** S20"));
        assert!(!values.contains("**20.** S19"));

        let json = serde_json::to_value(&embed).unwrap();
        assert_eq!(
            json["footer"]["text"],
            Value::from("Página 2 de 2 • Guild Jukebox")
        );
    }

    #[test]
    fn test_empty_queue_shows_current_song() {
        let queue = MusicQueue::new(300, 150);
        let current = Song::new("https://youtu.be/a", Some("Ahora".into()), Some(61), 1);

        let embed = create_queue_embed(&queue.snapshot(Some(current)), PlayerState::Paused, 1);
        let json = serde_json::to_value(&embed).unwrap();
        assert_eq!(json["fields"][0]["name"], Value::from("⏸️ En pausa"));
        assert_eq!(json["fields"][0]["value"], Value::from("**Ahora [1:01]**"));
        assert!(json["description"]
            .as_str()
            .is_some_and(|d| d.contains("La cola está vacía")));
    }
}
