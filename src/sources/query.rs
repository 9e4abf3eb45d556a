//! Normalización de entradas de usuario y de entradas extraídas.
//!
//! Todo lo que no sea un enlace `http(s)` a un host permitido se convierte
//! en una búsqueda de un solo resultado.

use url::Url;

const ALLOWED_HOSTS: [&str; 3] = ["youtube.com", "youtu.be", "music.youtube.com"];
const CANONICAL_BASE: &str = "https://www.youtube.com";

/// Id de video: 11 caracteres de `[A-Za-z0-9_-]`.
fn is_video_id(value: &str) -> bool {
    value.len() == 11
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// `true` si el valor es una URL http(s) con host.
pub fn is_likely_url(value: &str) -> bool {
    Url::parse(value)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .unwrap_or(false)
}

/// `true` si el valor es un enlace a un host permitido.
pub fn is_youtube_url(value: &str) -> bool {
    let Ok(url) = Url::parse(value) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    let host = url.host_str().unwrap_or_default().to_lowercase();
    // Host exacto o subdominio; `youtube.com.otro.example` no cuenta
    ALLOWED_HOSTS.iter().any(|allowed| {
        host == *allowed
            || host
                .strip_suffix(*allowed)
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}

/// Convierte formas reconocibles de enlace en un enlace canónico.
///
/// - `//host/ruta` → `https://host/ruta`
/// - `/watch?v=...` → `https://www.youtube.com/watch?v=...`
/// - un id de video suelto → `https://www.youtube.com/watch?v=<id>`
fn canonicalize_link(value: &str) -> Option<String> {
    if let Some(rest) = value.strip_prefix("//") {
        return Some(format!("https://{rest}"));
    }
    if value.starts_with('/') {
        return Some(format!("{CANONICAL_BASE}{value}"));
    }
    if is_video_id(value) {
        return Some(format!("{CANONICAL_BASE}/watch?v={value}"));
    }
    None
}

/// Prepara la entrada del usuario para el extractor.
pub fn make_extraction_query(raw_query: &str) -> String {
    let query = raw_query.trim();
    let candidate = canonicalize_link(query).unwrap_or_else(|| query.to_string());

    if is_youtube_url(&candidate) {
        candidate
    } else {
        format!("ytsearch1:{query}")
    }
}

/// Obtiene un enlace reproducible de una entrada extraída.
///
/// Las entradas de búsquedas o playlists "planas" traen a veces solo la ruta
/// o el id del video en lugar de la página completa.
pub fn normalize_entry_url(webpage_url: Option<&str>, url: Option<&str>) -> Option<String> {
    let raw = webpage_url.or(url)?.trim();
    if raw.is_empty() {
        return None;
    }

    if raw.starts_with("http://") || raw.starts_with("https://") {
        return Some(raw.to_string());
    }
    if let Some(link) = raw.strip_prefix('/').filter(|_| !raw.starts_with("//")) {
        return Some(format!("{CANONICAL_BASE}/{link}"));
    }
    if raw.len() >= 10 && !raw.contains([' ', '/', '?']) {
        return Some(format!("{CANONICAL_BASE}/watch?v={raw}"));
    }

    None
}

/// Búsqueda que se envía al extractor para una entrada de catálogo.
pub fn catalog_search_query(artist: &str, title: &str) -> String {
    format!("{artist} - {title}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_youtube_url_detection() {
        assert!(is_youtube_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(is_youtube_url("https://youtu.be/dQw4w9WgXcQ"));
        assert!(is_youtube_url("https://music.youtube.com/watch?v=test"));
        assert!(!is_youtube_url("https://example.com/video"));
        assert!(!is_youtube_url("youtube.com/watch?v=x"));
        assert!(!is_youtube_url("ftp://youtube.com/x"));
    }

    #[test]
    fn test_lookalike_hosts_are_rejected() {
        assert!(is_youtube_url("https://m.youtube.com/watch?v=x"));
        assert!(is_youtube_url("https://YouTube.com/watch?v=x"));
        assert!(!is_youtube_url("https://youtube.com.attacker.example/watch?v=x"));
        assert!(!is_youtube_url("https://notyoutube.com/watch?v=x"));
        assert!(!is_youtube_url("https://youtu.be.evil.test/abc"));
        assert_eq!(
            make_extraction_query("https://youtube.com.attacker.example/watch?v=x"),
            "ytsearch1:https://youtube.com.attacker.example/watch?v=x"
        );
    }

    #[test]
    fn test_likely_url() {
        assert!(is_likely_url("https://example.com"));
        assert!(!is_likely_url("never gonna give you up"));
        assert!(!is_likely_url("mailto:someone@example.com"));
    }

    #[test]
    fn test_free_text_becomes_search() {
        assert_eq!(
            make_extraction_query("  daft punk one more time "),
            "ytsearch1:daft punk one more time"
        );
        assert_eq!(
            make_extraction_query("https://soundcloud.com/artist/track"),
            "ytsearch1:https://soundcloud.com/artist/track"
        );
    }

    #[test]
    fn test_allowed_links_pass_through() {
        let link = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
        assert_eq!(make_extraction_query(link), link);
    }

    #[test]
    fn test_non_canonical_links_are_normalized() {
        assert_eq!(
            make_extraction_query("//www.youtube.com/watch?v=dQw4w9WgXcQ"),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
        assert_eq!(
            make_extraction_query("/watch?v=dQw4w9WgXcQ"),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
        assert_eq!(
            make_extraction_query("dQw4w9WgXcQ"),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
        // Un protocolo relativo hacia otro host sigue siendo búsqueda
        assert_eq!(
            make_extraction_query("//vimeo.com/123"),
            "ytsearch1://vimeo.com/123"
        );
    }

    #[test]
    fn test_normalize_entry_url() {
        assert_eq!(
            normalize_entry_url(Some("https://www.youtube.com/watch?v=abc"), None).as_deref(),
            Some("https://www.youtube.com/watch?v=abc")
        );
        assert_eq!(
            normalize_entry_url(None, Some("/watch?v=abcdefghijk")).as_deref(),
            Some("https://www.youtube.com/watch?v=abcdefghijk")
        );
        assert_eq!(
            normalize_entry_url(None, Some("abcdefghijk")).as_deref(),
            Some("https://www.youtube.com/watch?v=abcdefghijk")
        );
        assert_eq!(normalize_entry_url(None, Some("short")), None);
        assert_eq!(normalize_entry_url(None, Some("has space in it")), None);
        assert_eq!(normalize_entry_url(None, None), None);
    }

    #[test]
    fn test_catalog_search_query() {
        assert_eq!(catalog_search_query("Queen", "Bohemian Rhapsody"), "Queen - Bohemian Rhapsody");
    }
}
