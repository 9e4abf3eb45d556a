use async_trait::async_trait;
use std::process::Stdio;
use tokio::{process::Command, sync::Semaphore};
use tracing::{debug, info, warn};

use super::{
    resolver::{ClientProfile, Extractor},
    ExtractedInfo,
};
use crate::error::ExtractError;

/// Procesos de yt-dlp simultáneos permitidos.
const MAX_CONCURRENT_EXTRACTIONS: usize = 4;

/// Cliente que invoca yt-dlp como proceso hijo.
///
/// Los perfiles de cliente no guardan estado, así que una sola instancia se
/// comparte entre todas las guilds.
pub struct YtDlpClient {
    binary: String,
    // Limitar procesos concurrentes para no saturar la máquina ni a YouTube
    rate_limiter: Semaphore,
}

impl YtDlpClient {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            rate_limiter: Semaphore::new(MAX_CONCURRENT_EXTRACTIONS),
        }
    }

    /// Argumentos comunes a toda extracción.
    fn base_args() -> Vec<String> {
        [
            "--dump-single-json",
            "--no-warnings",
            "--quiet",
            "--no-check-certificates",
            "--default-search",
            "ytsearch",
            "--source-address",
            "0.0.0.0",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    fn stream_args(locator: &str, profile: ClientProfile) -> Vec<String> {
        let mut args = Self::base_args();
        args.extend([
            "--no-playlist".to_string(),
            "-f".to_string(),
            "bestaudio/best".to_string(),
            "--extractor-args".to_string(),
            format!("youtube:player_client={}", profile.player_clients().join(",")),
            locator.to_string(),
        ]);
        args
    }

    fn metadata_args(query: &str, max_entries: usize) -> Vec<String> {
        let mut args = Self::base_args();
        args.extend([
            "--flat-playlist".to_string(),
            "--yes-playlist".to_string(),
            "--ignore-errors".to_string(),
            "--playlist-end".to_string(),
            max_entries.max(1).to_string(),
            query.to_string(),
        ]);
        args
    }

    async fn run_json(&self, args: &[String]) -> Result<ExtractedInfo, ExtractError> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| ExtractError::Spawn(e.to_string()))?;

        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            // Si el intento expira y se cancela el futuro, el proceso muere con él
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ExtractError::Spawn(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractError::Download(stderr.trim().to_string()));
        }

        parse_info(&output.stdout)
    }

    /// Extrae metadata (sin URL de stream) de un enlace, playlist o búsqueda.
    pub async fn extract_metadata(
        &self,
        query: &str,
        max_entries: usize,
    ) -> Result<ExtractedInfo, ExtractError> {
        info!("🔍 Extrayendo metadata: {}", query);
        self.run_json(&Self::metadata_args(query, max_entries)).await
    }

    /// Versión instalada, para diagnóstico.
    pub async fn version(&self) -> Option<String> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .kill_on_drop(true)
            .output()
            .await
            .ok()?;

        if output.status.success() {
            Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            warn!("⚠️ yt-dlp --version terminó con {}", output.status);
            None
        }
    }
}

#[async_trait]
impl Extractor for YtDlpClient {
    async fn extract_stream(
        &self,
        locator: &str,
        profile: ClientProfile,
    ) -> Result<ExtractedInfo, ExtractError> {
        debug!("🎵 Obteniendo stream ({:?}) para: {}", profile, locator);
        self.run_json(&Self::stream_args(locator, profile)).await
    }
}

fn parse_info(stdout: &[u8]) -> Result<ExtractedInfo, ExtractError> {
    let text = String::from_utf8_lossy(stdout);
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Err(ExtractError::Parse("salida vacía".to_string()));
    }
    serde_json::from_str(trimmed).map_err(|e| ExtractError::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_args_carry_profile_clients() {
        let primary = YtDlpClient::stream_args("https://youtu.be/x", ClientProfile::Primary);
        assert!(primary.contains(&"youtube:player_client=ios,android,web".to_string()));
        assert!(primary.contains(&"--no-playlist".to_string()));
        assert_eq!(primary.last().map(String::as_str), Some("https://youtu.be/x"));

        let fallback = YtDlpClient::stream_args("https://youtu.be/x", ClientProfile::Fallback);
        assert!(fallback.contains(&"youtube:player_client=android,web".to_string()));
    }

    #[test]
    fn test_metadata_args_bound_playlist() {
        let args = YtDlpClient::metadata_args("ytsearch1:song", 0);
        let end = args.iter().position(|a| a == "--playlist-end").unwrap();
        assert_eq!(args[end + 1], "1");
        assert!(args.contains(&"--flat-playlist".to_string()));
    }

    #[test]
    fn test_parse_single_video() {
        let json = br#"{"id":"abc","title":"Song","url":"https://rr1.googlevideo.com/x",
            "webpage_url":"https://www.youtube.com/watch?v=abc","extractor":"youtube","duration":212.0}"#;
        let info = parse_info(json).unwrap();
        assert_eq!(info.title.as_deref(), Some("Song"));
        assert_eq!(info.duration_secs(), Some(212));
        assert_eq!(info.extractor.as_deref(), Some("youtube"));
    }

    #[test]
    fn test_parse_flat_playlist_with_null_entries() {
        let json = br#"{"_type":"playlist","title":"Mix","entries":[
            {"id":"a","url":"https://www.youtube.com/watch?v=a","title":"A","duration":null},
            null,
            {"id":"b","url":"bbbbbbbbbbb","title":"B","duration":61}]}"#;
        let info = parse_info(json).unwrap();
        assert!(info.is_playlist());
        assert_eq!(info.entries().count(), 2);
    }

    #[test]
    fn test_parse_rejects_empty_output() {
        assert!(matches!(parse_info(b"  \n"), Err(ExtractError::Parse(_))));
        assert!(matches!(parse_info(b"null"), Err(ExtractError::Parse(_))));
        assert!(matches!(parse_info(b"{oops"), Err(ExtractError::Parse(_))));
    }
}
