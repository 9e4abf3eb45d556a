use rand::seq::SliceRandom;
use std::collections::{BTreeSet, VecDeque};
use tracing::{debug, info};

use crate::error::MusicError;

/// Una canción en cola.
///
/// Guarda el localizador estable (la página del video), nunca la URL de
/// stream: esas expiran y se resuelven justo antes de reproducir.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Song {
    pub source_locator: String,
    pub title: String,
    pub duration_secs: u64,
    pub requested_by: Option<u64>,
    pub origin_channel: u64,
}

impl Song {
    pub fn new(
        source_locator: impl Into<String>,
        title: Option<String>,
        duration_secs: Option<u64>,
        origin_channel: u64,
    ) -> Self {
        Self {
            source_locator: source_locator.into(),
            title: title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "Desconocido".to_string()),
            duration_secs: duration_secs.unwrap_or(0),
            requested_by: None,
            origin_channel,
        }
    }

    pub fn with_requester(mut self, user_id: u64) -> Self {
        self.requested_by = Some(user_id);
        self
    }
}

/// Resultado de agregar canciones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnqueueOutcome {
    pub added: usize,
    /// Canciones descartadas por el límite del lote o de la cola.
    pub dropped: usize,
    /// Posición (1-based) de la primera canción agregada.
    pub first_position: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShuffleOutcome {
    Shuffled,
    Insufficient,
}

#[derive(Debug)]
pub struct MusicQueue {
    items: VecDeque<Song>,
    max_size: usize,
    max_batch: usize,
}

impl MusicQueue {
    pub fn new(max_size: usize, max_batch: usize) -> Self {
        Self {
            items: VecDeque::new(),
            max_size,
            max_batch,
        }
    }

    /// Cuántas canciones admitiría la próxima llamada a `enqueue`.
    pub fn remaining_capacity(&self) -> usize {
        self.max_batch
            .min(self.max_size.saturating_sub(self.items.len()))
    }

    /// Agrega canciones al final, respetando el límite por lote y el absoluto.
    pub fn enqueue(&mut self, songs: Vec<Song>) -> Result<EnqueueOutcome, MusicError> {
        let limit = self.remaining_capacity();
        if limit == 0 {
            return Err(MusicError::QueueFull { max: self.max_size });
        }

        let offered = songs.len();
        let first_position = self.items.len() + 1;
        self.items.extend(songs.into_iter().take(limit));

        let added = offered.min(limit);
        info!("➕ Agregadas {} canciones a la cola ({} descartadas)", added, offered - added);

        Ok(EnqueueOutcome {
            added,
            dropped: offered - added,
            first_position,
        })
    }

    /// Obtiene el siguiente track (FIFO)
    pub fn pop_front(&mut self) -> Option<Song> {
        let next = self.items.pop_front();
        if let Some(ref song) = next {
            debug!("➡️ Siguiente en cola: {}", song.title);
        }
        next
    }

    /// Reinserta una canción en la cabeza (replay). No cuenta contra el
    /// límite por lote: la canción ya estaba admitida.
    pub fn push_front(&mut self, song: Song) -> Result<(), MusicError> {
        if self.items.len() >= self.max_size {
            return Err(MusicError::QueueFull { max: self.max_size });
        }
        self.items.push_front(song);
        Ok(())
    }

    /// Quita canciones según una lista como `"1, 3-5, 8"`.
    ///
    /// Devuelve las canciones quitadas en orden de posición descendente.
    pub fn remove_by_spec(&mut self, spec: &str) -> Result<Vec<Song>, MusicError> {
        if self.items.is_empty() {
            return Err(MusicError::EmptyQueue);
        }

        let positions = parse_removal_positions(spec, self.items.len());
        if positions.is_empty() {
            return Err(MusicError::OutOfRange {
                len: self.items.len(),
            });
        }

        let removed: Vec<Song> = positions
            .into_iter()
            .filter_map(|pos| self.items.remove(pos - 1))
            .collect();

        info!("🗑️ Eliminadas {} canciones de la cola", removed.len());
        Ok(removed)
    }

    /// Mueve una canción de posición (1-based)
    pub fn move_song(&mut self, from: usize, to: usize) -> Result<&Song, MusicError> {
        let len = self.items.len();
        if len == 0 {
            return Err(MusicError::EmptyQueue);
        }
        if from == 0 || to == 0 || from > len || to > len {
            return Err(MusicError::OutOfRange { len });
        }

        let song = self
            .items
            .remove(from - 1)
            .ok_or(MusicError::OutOfRange { len })?;
        self.items.insert(to - 1, song);
        debug!("📍 Canción movida de posición {} a {}", from, to);

        self.items.get(to - 1).ok_or(MusicError::OutOfRange { len })
    }

    /// Mezcla la cola
    pub fn shuffle(&mut self) -> ShuffleOutcome {
        if self.items.len() < 2 {
            return ShuffleOutcome::Insufficient;
        }

        let mut rng = rand::thread_rng();
        self.items.make_contiguous().shuffle(&mut rng);
        info!("🔀 Cola mezclada");
        ShuffleOutcome::Shuffled
    }

    /// Limpia la cola. Devuelve cuántas canciones había.
    pub fn clear(&mut self) -> usize {
        let cleared = self.items.len();
        self.items.clear();
        info!("🗑️ Cola limpiada: {} canciones", cleared);
        cleared
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_duration_secs(&self) -> u64 {
        self.items.iter().map(|song| song.duration_secs).sum()
    }

    pub fn snapshot(&self, current: Option<Song>) -> QueueInfo {
        QueueInfo {
            current,
            items: self.items.iter().cloned().collect(),
            total_duration_secs: self.total_duration_secs(),
        }
    }
}

/// Interpreta una lista de posiciones y rangos escrita por un usuario.
///
/// Los tokens mal formados se ignoran, las posiciones fuera de `1..=len`
/// se descartan. El resultado va en orden descendente para que quitar una
/// posición no desplace a las siguientes.
pub fn parse_removal_positions(spec: &str, len: usize) -> Vec<usize> {
    let mut positions = BTreeSet::new();

    for part in spec.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if let Some((start, end)) = part.split_once('-') {
            let (Ok(start), Ok(end)) = (start.trim().parse::<usize>(), end.trim().parse::<usize>())
            else {
                continue;
            };
            // Recortar al rango válido evita expandir "1-999999999"
            let start = start.max(1);
            let end = end.min(len);
            positions.extend(start..=end);
        } else if let Ok(pos) = part.parse::<usize>() {
            positions.insert(pos);
        }
    }

    positions
        .into_iter()
        .rev()
        .filter(|pos| (1..=len).contains(pos))
        .collect()
}

#[derive(Debug, Clone)]
pub struct QueueInfo {
    pub current: Option<Song>,
    pub items: Vec<Song>,
    pub total_duration_secs: u64,
}

impl QueueInfo {
    /// Obtiene una página específica de la cola
    pub fn page(&self, page: usize, items_per_page: usize) -> QueuePage<'_> {
        let per_page = items_per_page.max(1);
        let total_pages = self.items.len().div_ceil(per_page).max(1);
        let current_page = page.clamp(1, total_pages);
        let start = (current_page - 1) * per_page;
        let end = (start + per_page).min(self.items.len());

        QueuePage {
            items: &self.items[start.min(end)..end],
            first_position: start + 1,
            current_page,
            total_pages,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueuePage<'a> {
    pub items: &'a [Song],
    pub first_position: usize,
    pub current_page: usize,
    pub total_pages: usize,
}
