use regex::Regex;
use std::sync::OnceLock;

use crate::{audio::queue::Song, error::MusicError};

/// Formatea segundos como `m:ss` o `h:mm:ss`. Cero o desconocido → `?:??`.
pub fn format_duration(total_seconds: u64) -> String {
    if total_seconds == 0 {
        return "?:??".to_string();
    }

    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Como [`format_duration`], pero `0` es una posición válida.
pub fn format_position(seconds: u64) -> String {
    if seconds == 0 {
        "0:00".to_string()
    } else {
        format_duration(seconds)
    }
}

/// Convierte `90`, `1:30` o `01:02:03` a segundos.
pub fn parse_timestamp(raw: &str) -> Result<u64, MusicError> {
    static TIMESTAMP: OnceLock<Option<Regex>> = OnceLock::new();
    let invalid = || MusicError::InvalidTime(raw.to_string());

    let pattern = TIMESTAMP
        .get_or_init(|| Regex::new(r"^(?:(\d+):)?(?:(\d+):)?(\d+)$").ok())
        .as_ref()
        .ok_or_else(invalid)?;

    let value = raw.trim();
    let caps = pattern.captures(value).ok_or_else(invalid)?;
    let parts: Vec<u64> = caps
        .iter()
        .skip(1)
        .flatten()
        .map(|m| m.as_str().parse::<u64>())
        .collect::<Result<_, _>>()
        .map_err(|_| invalid())?;

    let seconds = match parts.as_slice() {
        [s] => *s,
        [m, s] => m.saturating_mul(60).saturating_add(*s),
        [h, m, s] => h
            .saturating_mul(3600)
            .saturating_add(m.saturating_mul(60))
            .saturating_add(*s),
        _ => return Err(invalid()),
    };

    Ok(seconds)
}

/// `Título [m:ss]`
pub fn song_label(song: &Song) -> String {
    format!("{} [{}]", song.title, format_duration(song.duration_secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_song_label() {
        let song = Song::new("https://youtu.be/b", Some("Larga".into()), Some(3661), 1);
        assert_eq!(song_label(&song), "Larga [1:01:01]");
        let unknown = Song::new("https://youtu.be/c", None, None, 1);
        assert_eq!(song_label(&unknown), "Desconocido [?:??]");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "?:??");
        assert_eq!(format_duration(59), "0:59");
        assert_eq!(format_duration(90), "1:30");
        assert_eq!(format_duration(3600), "1:00:00");
        assert_eq!(format_duration(3661), "1:01:01");
        assert_eq!(format_position(0), "0:00");
        assert_eq!(format_position(90), "1:30");
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("90").unwrap(), 90);
        assert_eq!(parse_timestamp(" 1:30 ").unwrap(), 90);
        assert_eq!(parse_timestamp("01:02:03").unwrap(), 3723);
        assert_eq!(parse_timestamp("0").unwrap(), 0);
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        for raw in ["", "   ", "abc", "1:2:3:4", "-5", "1:", ":30", "1.5", "1::2"] {
            assert!(
                matches!(parse_timestamp(raw), Err(MusicError::InvalidTime(_))),
                "{raw:?} debería ser inválido"
            );
        }
    }
}
