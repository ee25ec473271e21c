pub mod ytdlp;

use async_trait::async_trait;
use serenity::model::id::UserId;
use thiserror::Error;

use crate::audio::track::Track;

pub use ytdlp::YtDlpResolver;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("No se encontraron resultados para: {0}")]
    NotFound(String),

    #[error("Pista no disponible o protegida: {0}")]
    Unavailable(String),

    #[error("El resolver tardó demasiado")]
    Timeout,

    #[error("Error ejecutando el resolver: {0}")]
    Process(String),

    #[error("Error de E/S: {0}")]
    Io(#[from] std::io::Error),
}

/// Pistas obtenidas de una búsqueda o URL
#[derive(Debug, Clone, Default)]
pub struct Resolved {
    pub tracks: Vec<Track>,
    /// Entradas descartadas (privadas, borradas, sin URL)
    pub unavailable: usize,
}

/// Convierte consultas y enlaces en pistas y, al reproducir, en URLs de stream
#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// Busca o expande una URL (playlist incluida)
    async fn resolve(&self, query: &str, requested_by: UserId) -> Result<Resolved, ResolveError>;

    /// Obtiene la URL de audio reproducible de una pista
    async fn resolve_stream(&self, source: &str) -> Result<String, ResolveError>;
}
