use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use std::{collections::VecDeque, sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{
    audio::{track::Track, transport::VoiceHandle},
    error::PlayerError,
};

/// Referencia al mensaje de estado renderizado
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceRef {
    pub channel_id: ChannelId,
    pub message_id: serenity::model::id::MessageId,
}

/// Fase del stream de una sesión. El token identifica cada intento de reproducción.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    Stopped,
    Starting(u64),
    Streaming(u64),
}

/// Lo que un comando pidió al detener el stream; lo consume el handler de fin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopIntent {
    Skip,
    Restart(Duration),
}

/// Estado mutable de una guild
#[derive(Debug)]
pub struct SessionState {
    queue: VecDeque<Track>,
    max_size: usize,
    pub(crate) current: Option<Track>,
    pub(crate) looping: bool,
    pub(crate) paused: bool,
    pub(crate) voice: Option<VoiceHandle>,
    pub(crate) surface: Option<SurfaceRef>,
    pub(crate) status_channel: Option<ChannelId>,
    pub(crate) phase: PlaybackPhase,
    pub(crate) stop_intent: Option<StopIntent>,
    pub(crate) start_offset: Option<Duration>,
    pub(crate) idle_epoch: u64,
    next_token: u64,
}

/// Resultado de agregar pistas a la cola
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnqueueReport {
    pub added: usize,
    pub skipped: usize,
}

/// Copia de solo lectura para renderizar
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub current: Option<Track>,
    pub queue: Vec<Track>,
    pub looping: bool,
    pub paused: bool,
    pub channel: Option<ChannelId>,
}

impl SessionState {
    pub fn new(max_size: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            max_size,
            current: None,
            looping: false,
            paused: false,
            voice: None,
            surface: None,
            status_channel: None,
            phase: PlaybackPhase::Stopped,
            stop_intent: None,
            start_offset: None,
            idle_epoch: 0,
            next_token: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_full(&self) -> bool {
        self.queue.len() >= self.max_size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    /// Agrega pistas al final; las que no caben se cuentan como omitidas
    pub fn enqueue(&mut self, tracks: impl IntoIterator<Item = Track>) -> EnqueueReport {
        let mut report = EnqueueReport::default();

        for track in tracks {
            if self.is_full() {
                report.skipped += 1;
                continue;
            }
            debug!("➕ Agregado a la cola: {}", track.title());
            self.queue.push_back(track);
            report.added += 1;
        }

        report
    }

    /// Saca la siguiente pista (FIFO)
    pub fn pop_next(&mut self) -> Option<Track> {
        self.queue.pop_front()
    }

    /// Elimina la pista en `index` y desplaza las siguientes
    pub fn remove(&mut self, index: usize) -> Result<Track, PlayerError> {
        let len = self.queue.len();
        self.queue
            .remove(index)
            .ok_or(PlayerError::IndexOutOfRange { index, len })
    }

    /// Vacía la cola y olvida la pista actual.
    ///
    /// Un intento de reproducción en curso queda invalidado; un stream ya
    /// activo sigue hasta que alguien lo detenga.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.current = None;
        self.paused = false;
        self.start_offset = None;
        self.stop_intent = None;
        if matches!(self.phase, PlaybackPhase::Starting(_)) {
            self.phase = PlaybackPhase::Stopped;
        }
        info!("🗑️ Cola limpiada");
    }

    pub fn toggle_loop(&mut self) -> bool {
        self.looping = !self.looping;
        self.looping
    }

    /// Reserva un token nuevo y marca el inicio de un intento
    pub(crate) fn begin_attempt(&mut self) -> u64 {
        self.next_token += 1;
        self.phase = PlaybackPhase::Starting(self.next_token);
        self.next_token
    }

    /// ¿Hay un stream en curso o a punto de empezar?
    pub fn is_active(&self) -> bool {
        self.phase != PlaybackPhase::Stopped
    }

    pub fn queue(&self) -> impl Iterator<Item = &Track> {
        self.queue.iter()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            current: self.current.clone(),
            queue: self.queue.iter().cloned().collect(),
            looping: self.looping,
            paused: self.paused,
            channel: self.status_channel,
        }
    }
}

/// Registro global guild -> estado. Las entradas no se eliminan nunca.
pub struct SessionRegistry {
    sessions: DashMap<GuildId, Arc<Mutex<SessionState>>>,
    max_queue_size: usize,
}

impl SessionRegistry {
    pub fn new(max_queue_size: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            max_queue_size,
        }
    }

    pub fn get_or_create(&self, guild_id: GuildId) -> Arc<Mutex<SessionState>> {
        self.sessions
            .entry(guild_id)
            .or_insert_with(|| {
                debug!("Nueva sesión para guild {}", guild_id);
                Arc::new(Mutex::new(SessionState::new(self.max_queue_size)))
            })
            .clone()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<Mutex<SessionState>>> {
        self.sessions.get(&guild_id).map(|s| s.clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}
