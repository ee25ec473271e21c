use serenity::model::id::{ChannelId, GuildId};
use std::{fmt, sync::Arc, time::Duration};
use tracing::{debug, info};

use crate::{
    audio::{
        coordinator::PlaybackCoordinator,
        session::{EnqueueReport, StopIntent},
        track::Track,
    },
    error::PlayerError,
};

/// Acciones de los controles del mensaje de estado (y sus comandos equivalentes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerAction {
    PlayResume,
    Pause,
    Stop,
    Next,
    ToggleLoop,
    RemoveTrack(usize),
}

/// Resultado de un comando; su `Display` es la respuesta al usuario
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Enqueued(EnqueueReport),
    Removed(String),
    Cleared,
    Skipped,
    Paused,
    Resumed,
    Started,
    AlreadyPlaying,
    LoopToggled(bool),
    Restarting(Duration),
    Left,
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enqueued(report) => {
                if report.added == 1 && report.skipped == 0 {
                    write!(f, "✅ Agregada a la cola")?;
                } else {
                    write!(f, "✅ Agregadas {} canciones a la cola", report.added)?;
                }
                if report.skipped > 0 {
                    write!(
                        f,
                        "\n⚠️ Se omitieron {} canciones (no disponibles o cola llena)",
                        report.skipped
                    )?;
                }
                Ok(())
            }
            Self::Removed(title) => write!(f, "🗑️ Eliminada de la cola: **{}**", title),
            Self::Cleared => write!(f, "⏹️ Reproducción detenida y cola limpiada"),
            Self::Skipped => write!(f, "⏭️ Canción saltada"),
            Self::Paused => write!(f, "⏸️ Pausado"),
            Self::Resumed => write!(f, "▶️ Reanudado"),
            Self::Started => write!(f, "▶️ Iniciando reproducción"),
            Self::AlreadyPlaying => write!(f, "🎵 Ya se está reproduciendo"),
            Self::LoopToggled(true) => write!(f, "🔁 Loop activado"),
            Self::LoopToggled(false) => write!(f, "➡️ Loop desactivado"),
            Self::Restarting(offset) => write!(
                f,
                "⏩ Reiniciando desde {}",
                crate::ui::embeds::format_duration(*offset)
            ),
            Self::Left => write!(f, "👋 Desconectado del canal de voz"),
        }
    }
}

/// Operaciones de cola sobre la sesión de una guild.
///
/// Cada mutación refresca el mensaje de estado; los fallos de ese refresco
/// nunca llegan al usuario.
#[derive(Clone)]
pub struct QueueCommands {
    coordinator: Arc<PlaybackCoordinator>,
}

impl QueueCommands {
    pub fn new(coordinator: Arc<PlaybackCoordinator>) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &Arc<PlaybackCoordinator> {
        &self.coordinator
    }

    /// Rechaza antes de resolver si la cola ya está llena
    pub async fn ensure_capacity(&self, guild_id: GuildId) -> Result<(), PlayerError> {
        let session = self.coordinator.registry().get_or_create(guild_id);
        let state = session.lock().await;
        if state.is_full() {
            return Err(PlayerError::QueueFull {
                cap: state.max_size(),
            });
        }
        Ok(())
    }

    /// Agrega pistas y, si hay canal destino, conecta y arranca la reproducción
    pub async fn enqueue(
        &self,
        guild_id: GuildId,
        tracks: Vec<Track>,
        destination: Option<ChannelId>,
        status_channel: Option<ChannelId>,
    ) -> Result<CommandOutcome, PlayerError> {
        let session = self.coordinator.registry().get_or_create(guild_id);
        let report = {
            let mut state = session.lock().await;
            if state.is_full() {
                return Err(PlayerError::QueueFull {
                    cap: state.max_size(),
                });
            }
            if status_channel.is_some() {
                state.status_channel = status_channel;
            }

            let report = state.enqueue(tracks);
            info!(
                "📝 Guild {}: {} agregadas, {} omitidas, {} en cola",
                guild_id,
                report.added,
                report.skipped,
                state.len()
            );
            self.coordinator.refresh_locked(guild_id, &mut state).await;
            report
        };

        if let Some(channel_id) = destination {
            // Si la conexión falla la cola se conserva para el siguiente intento
            self.coordinator.ensure_connected(guild_id, channel_id).await?;
            self.coordinator.ensure_playing(guild_id).await?;
        }

        Ok(CommandOutcome::Enqueued(report))
    }

    pub async fn remove(&self, guild_id: GuildId, index: usize) -> Result<CommandOutcome, PlayerError> {
        let session = self.coordinator.registry().get_or_create(guild_id);
        let mut state = session.lock().await;

        let track = state.remove(index)?;
        info!("🗑️ Eliminada de la cola en guild {}: {}", guild_id, track.title());
        self.coordinator.refresh_locked(guild_id, &mut state).await;

        Ok(CommandOutcome::Removed(track.title().to_string()))
    }

    /// Detiene la reproducción y vacía la cola (el bot sigue conectado)
    pub async fn clear(&self, guild_id: GuildId) -> Result<CommandOutcome, PlayerError> {
        let session = self.coordinator.registry().get_or_create(guild_id);
        let mut state = session.lock().await;

        state.clear();
        let mut stopped = Ok(());
        if let Some(voice) = state.voice.clone() {
            let transport = self.coordinator.transport();
            if transport.is_playing(&voice).await || transport.is_paused(&voice).await {
                stopped = transport.stop(&voice).await;
            }
        }
        // La cola ya está vacía: el mensaje de estado se retira aunque falle el stop
        self.coordinator.refresh_locked(guild_id, &mut state).await;
        stopped?;

        Ok(CommandOutcome::Cleared)
    }

    /// Salta la pista actual, también con loop activo
    pub async fn skip(&self, guild_id: GuildId) -> Result<CommandOutcome, PlayerError> {
        self.stop_with(guild_id, StopIntent::Skip).await?;
        Ok(CommandOutcome::Skipped)
    }

    /// Reinicia la pista actual desde `offset`
    pub async fn seek(&self, guild_id: GuildId, offset: Duration) -> Result<CommandOutcome, PlayerError> {
        self.stop_with(guild_id, StopIntent::Restart(offset)).await?;
        Ok(CommandOutcome::Restarting(offset))
    }

    pub async fn pause(&self, guild_id: GuildId) -> Result<CommandOutcome, PlayerError> {
        let session = self.coordinator.registry().get_or_create(guild_id);
        let mut state = session.lock().await;
        let voice = state.voice.clone().ok_or(PlayerError::NothingPlaying)?;

        let transport = self.coordinator.transport();
        if !transport.is_playing(&voice).await {
            return Err(PlayerError::NothingPlaying);
        }
        transport.pause(&voice).await?;
        state.paused = true;
        self.coordinator.refresh_locked(guild_id, &mut state).await;

        Ok(CommandOutcome::Paused)
    }

    pub async fn resume(&self, guild_id: GuildId) -> Result<CommandOutcome, PlayerError> {
        let session = self.coordinator.registry().get_or_create(guild_id);
        let mut state = session.lock().await;
        let voice = state.voice.clone().ok_or(PlayerError::NothingToResume)?;

        let transport = self.coordinator.transport();
        if !transport.is_paused(&voice).await {
            return Err(PlayerError::NothingToResume);
        }
        transport.resume(&voice).await?;
        state.paused = false;
        self.coordinator.refresh_locked(guild_id, &mut state).await;

        Ok(CommandOutcome::Resumed)
    }

    /// Botón Play/Resume: reanuda si está en pausa, arranca la cola si está parada
    pub async fn play_resume(
        &self,
        guild_id: GuildId,
        destination: Option<ChannelId>,
    ) -> Result<CommandOutcome, PlayerError> {
        let session = self.coordinator.registry().get_or_create(guild_id);
        {
            let state = session.lock().await;
            if let Some(voice) = state.voice.clone() {
                if self.coordinator.transport().is_paused(&voice).await {
                    drop(state);
                    return self.resume(guild_id).await;
                }
            }
            if state.is_active() {
                return Ok(CommandOutcome::AlreadyPlaying);
            }
            if state.len() == 0 && state.current().is_none() {
                return Err(PlayerError::QueueEmpty);
            }
        }

        if let Some(channel_id) = destination {
            self.coordinator.ensure_connected(guild_id, channel_id).await?;
        }
        self.coordinator.ensure_playing(guild_id).await?;

        Ok(CommandOutcome::Started)
    }

    pub async fn toggle_loop(&self, guild_id: GuildId) -> Result<CommandOutcome, PlayerError> {
        let session = self.coordinator.registry().get_or_create(guild_id);
        let mut state = session.lock().await;

        let enabled = state.toggle_loop();
        info!("🔁 Loop {} en guild {}", if enabled { "activado" } else { "desactivado" }, guild_id);
        self.coordinator.refresh_locked(guild_id, &mut state).await;

        Ok(CommandOutcome::LoopToggled(enabled))
    }

    /// Vacía la cola y sale del canal de voz de inmediato
    pub async fn leave(&self, guild_id: GuildId) -> Result<CommandOutcome, PlayerError> {
        self.coordinator.disconnect(guild_id).await?;
        Ok(CommandOutcome::Left)
    }

    /// Punto único de entrada para botones y menús
    pub async fn dispatch(
        &self,
        guild_id: GuildId,
        action: PlayerAction,
        destination: Option<ChannelId>,
    ) -> Result<CommandOutcome, PlayerError> {
        debug!("Acción {:?} en guild {}", action, guild_id);

        match action {
            PlayerAction::PlayResume => self.play_resume(guild_id, destination).await,
            PlayerAction::Pause => self.pause(guild_id).await,
            PlayerAction::Stop => self.clear(guild_id).await,
            PlayerAction::Next => self.skip(guild_id).await,
            PlayerAction::ToggleLoop => self.toggle_loop(guild_id).await,
            PlayerAction::RemoveTrack(index) => self.remove(guild_id, index).await,
        }
    }

    async fn stop_with(&self, guild_id: GuildId, intent: StopIntent) -> Result<(), PlayerError> {
        let session = self.coordinator.registry().get_or_create(guild_id);
        let mut state = session.lock().await;
        let voice = state.voice.clone().ok_or(PlayerError::NothingPlaying)?;

        let transport = self.coordinator.transport();
        if !(transport.is_playing(&voice).await || transport.is_paused(&voice).await) {
            return Err(PlayerError::NothingPlaying);
        }

        // La intención se registra antes de detener: el fin de stream la consume
        state.stop_intent = Some(intent);
        if let Err(e) = transport.stop(&voice).await {
            state.stop_intent = None;
            return Err(e.into());
        }

        Ok(())
    }
}
