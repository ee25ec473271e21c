//! Boundary between the playback coordinator and the real-time voice transport.
//!
//! The coordinator never touches Songbird directly; it drives a
//! [`VoiceTransport`] and learns about finished streams through a
//! [`CompletionSignal`], which posts a message onto the coordinator's event
//! channel instead of mutating session state from the transport's context.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use thiserror::Error;
use tracing::debug;

use crate::audio::coordinator::PlaybackEvent;

/// Conexión de voz activa de una guild
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceHandle {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
}

/// Opciones al iniciar un stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayOptions {
    /// Reinicia el stream desde este desplazamiento
    pub start_offset: Option<Duration>,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no se pudo conectar al canal de voz: {0}")]
    Connect(String),

    #[error("no hay conexión de voz activa")]
    NotConnected,

    #[error("error de reproducción: {0}")]
    Playback(String),

    #[error("error al desconectar: {0}")]
    Disconnect(String),
}

/// Aviso de fin de stream. Se dispara como mucho una vez por stream.
#[derive(Debug, Clone)]
pub struct CompletionSignal {
    guild_id: GuildId,
    token: u64,
    fired: Arc<AtomicBool>,
    events: flume::Sender<PlaybackEvent>,
}

impl CompletionSignal {
    pub(crate) fn new(guild_id: GuildId, token: u64, events: flume::Sender<PlaybackEvent>) -> Self {
        Self {
            guild_id,
            token,
            fired: Arc::new(AtomicBool::new(false)),
            events,
        }
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    /// Publica `TrackEnded` en el canal del coordinador
    pub fn fire(&self) {
        if self.fired.swap(true, Ordering::SeqCst) {
            return;
        }

        let event = PlaybackEvent::TrackEnded {
            guild_id: self.guild_id,
            token: self.token,
        };
        if self.events.send(event).is_err() {
            debug!("Canal de eventos cerrado, fin de stream descartado en guild {}", self.guild_id);
        }
    }
}

/// Transporte de audio en tiempo real (conexión de voz + stream).
///
/// `stop` debe provocar exactamente un disparo del `CompletionSignal` del
/// stream activo, igual que un final natural.
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<VoiceHandle, TransportError>;

    async fn move_to(&self, handle: &VoiceHandle, channel_id: ChannelId) -> Result<VoiceHandle, TransportError>;

    async fn disconnect(&self, handle: &VoiceHandle) -> Result<(), TransportError>;

    async fn play(
        &self,
        handle: &VoiceHandle,
        stream_url: &str,
        options: PlayOptions,
        on_complete: CompletionSignal,
    ) -> Result<(), TransportError>;

    async fn pause(&self, handle: &VoiceHandle) -> Result<(), TransportError>;

    async fn resume(&self, handle: &VoiceHandle) -> Result<(), TransportError>;

    async fn stop(&self, handle: &VoiceHandle) -> Result<(), TransportError>;

    async fn is_connected(&self, handle: &VoiceHandle) -> bool;

    async fn is_playing(&self, handle: &VoiceHandle) -> bool;

    async fn is_paused(&self, handle: &VoiceHandle) -> bool;
}
