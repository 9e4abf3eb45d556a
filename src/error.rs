use std::time::Duration;
use thiserror::Error;

/// Categoría de un error, usada por la capa de comandos para decidir
/// a quién se reporta y si hay cambio de estado.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    Resolution,
    Capacity,
    Connection,
}

/// Errores de la sesión de reproducción de una guild.
///
/// Ninguno es fatal para el proceso: se reportan al que invocó la operación
/// (o al canal de origen de la canción) y la sesión sigue viva.
#[derive(Debug, Error)]
pub enum MusicError {
    #[error("formato de tiempo inválido: `{0}`")]
    InvalidTime(String),

    #[error("posición fuera de rango (1 a {len})")]
    OutOfRange { len: usize },

    #[error("la cola está vacía")]
    EmptyQueue,

    #[error("no hay música sonando")]
    NothingPlaying,

    #[error("el tiempo solicitado ({requested}s) excede la duración ({duration}s)")]
    SeekBeyondDuration { requested: u64, duration: u64 },

    #[error("volumen inválido: {0} (debe estar entre 0 y 100)")]
    InvalidVolume(i64),

    #[error("la cola alcanzó su límite ({max} canciones)")]
    QueueFull { max: usize },

    #[error(transparent)]
    Resolution(#[from] ResolveError),

    #[error("no se pudo conectar al canal de voz: {0}")]
    Connection(String),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl MusicError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidTime(_)
            | Self::OutOfRange { .. }
            | Self::EmptyQueue
            | Self::NothingPlaying
            | Self::SeekBeyondDuration { .. }
            | Self::InvalidVolume(_) => ErrorKind::Input,
            Self::QueueFull { .. } => ErrorKind::Capacity,
            Self::Resolution(_) => ErrorKind::Resolution,
            Self::Connection(_) | Self::Sink(_) => ErrorKind::Connection,
        }
    }
}

/// Fallo al convertir un localizador en un stream reproducible.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    #[error("fallo de extracción: {0}")]
    Extraction(#[from] ExtractError),

    #[error("stream sin URL reproducible")]
    NoStreamUrl,

    #[error("la resolución excedió {0:?}")]
    Timeout(Duration),

    #[error("no se pudo resolver stream")]
    NoStream,
}

/// Error devuelto por un extractor (yt-dlp u otro).
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    /// El extractor corrió pero rechazó la descarga; se puede reintentar
    /// con otro perfil de cliente.
    #[error("yt-dlp error: {0}")]
    Download(String),

    #[error("no se pudo ejecutar el extractor: {0}")]
    Spawn(String),

    #[error("respuesta inválida del extractor: {0}")]
    Parse(String),
}

impl ExtractError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Download(_))
    }
}

/// Errores del dispositivo de salida de voz.
#[derive(Debug, Clone, Error)]
pub enum SinkError {
    #[error("no hay conexión de voz activa")]
    NotConnected,

    #[error("error al unirse al canal de voz: {0}")]
    Join(String),

    #[error("error de reproducción: {0}")]
    Playback(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(MusicError::EmptyQueue.kind(), ErrorKind::Input);
        assert_eq!(MusicError::QueueFull { max: 300 }.kind(), ErrorKind::Capacity);
        assert_eq!(
            MusicError::from(ResolveError::NoStreamUrl).kind(),
            ErrorKind::Resolution
        );
        assert_eq!(
            MusicError::from(SinkError::NotConnected).kind(),
            ErrorKind::Connection
        );
    }

    #[test]
    fn test_only_download_errors_are_recoverable() {
        assert!(ExtractError::Download("403".into()).is_recoverable());
        assert!(!ExtractError::Spawn("not found".into()).is_recoverable());
        assert!(!ExtractError::Parse("eof".into()).is_recoverable());
    }
}
