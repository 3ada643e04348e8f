use thiserror::Error;

use super::sink::SinkError;
use crate::sources::{ResolutionError, SongDescriptor};

/// Errors reported synchronously to the caller of a session operation.
///
/// Per-track failures (resolution or playback of a queued entry) never show
/// up here; they are contained by the advance loop and emitted as events.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("no se pudo conectar al canal de voz: {0}")]
    Connect(#[source] SinkError),
    #[error("no se pudo resolver '{reference}': {source}")]
    Resolution {
        reference: String,
        #[source]
        source: ResolutionError,
    },
    #[error("la cola está llena (máximo {capacity}), {} canción(es) rechazada(s)", .rejected.len())]
    QueueFull {
        capacity: usize,
        rejected: Vec<SongDescriptor>,
    },
    #[error("operación no válida en el estado actual")]
    InvalidState,
    #[error("índice {index} fuera de rango (1..={len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("no hay nada reproduciéndose")]
    NothingPlaying,
    #[error("el bot no está en un canal de voz")]
    NotConnected,
    #[error("error del sink de voz: {0}")]
    Sink(#[from] SinkError),
}
