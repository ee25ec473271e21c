//! Errors surfaced to users at the command boundary.
//!
//! Every variant renders as the message shown to the user, so resolver and
//! transport failures never reach the UI as opaque errors.

use thiserror::Error;

use crate::{audio::transport::TransportError, sources::ResolveError};

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("❌ Debes estar en un canal de voz")]
    NotInVoice,

    #[error("❌ Debes estar en el canal de voz del bot")]
    WrongVoiceChannel,

    #[error("⚠️ La cola está llena (máximo {cap} canciones)")]
    QueueFull { cap: usize },

    #[error("❌ Posición {} fuera de rango (la cola tiene {len} canciones)", .index + 1)]
    IndexOutOfRange { index: usize, len: usize },

    #[error("❌ No hay música en reproducción")]
    NothingPlaying,

    #[error("⚠️ No hay nada que reanudar")]
    NothingToResume,

    #[error("⚠️ La cola está vacía")]
    QueueEmpty,

    #[error("❌ El bot no está conectado a un canal de voz")]
    NotConnected,

    #[error("❌ {0}")]
    Resolve(#[from] ResolveError),

    #[error("❌ {0}")]
    Transport(#[from] TransportError),
}
