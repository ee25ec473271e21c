//! Per-guild playback state machine.
//!
//! [`PlaybackCoordinator`] owns the [`SessionRegistry`] and is the only
//! component that starts streams. It keeps at most one stream per guild:
//!
//! - every play attempt takes a fresh token and moves the session to
//!   `Starting(token)`; the resolver runs without the session lock and its
//!   result is discarded if the phase changed meanwhile
//! - the transport reports finished streams through a [`CompletionSignal`],
//!   which lands on the coordinator's event channel as
//!   [`PlaybackEvent::TrackEnded`]; events for an old token are ignored
//! - when the queue runs dry the session enters the idle path: a timer posts
//!   [`PlaybackEvent::IdleExpired`] and the handler re-checks the session
//!   before disconnecting, so no cancellation is needed

use serenity::model::id::{ChannelId, GuildId};
use std::{sync::Arc, time::Duration};
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        session::{PlaybackPhase, SessionRegistry, SessionSnapshot, SessionState, StopIntent},
        transport::{CompletionSignal, PlayOptions, VoiceTransport},
    },
    error::PlayerError,
    sources::TrackResolver,
    ui::surface::StatusSurface,
};

/// Mensajes que llegan al contexto serializado del coordinador
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    TrackEnded { guild_id: GuildId, token: u64 },
    IdleExpired { guild_id: GuildId, epoch: u64 },
}

pub struct PlaybackCoordinator {
    registry: SessionRegistry,
    transport: Arc<dyn VoiceTransport>,
    resolver: Arc<dyn TrackResolver>,
    surface: Arc<dyn StatusSurface>,
    idle_timeout: Duration,
    events: flume::Sender<PlaybackEvent>,
}

impl PlaybackCoordinator {
    /// Crea el coordinador y el receptor que debe consumir [`Self::run`]
    pub fn new(
        transport: Arc<dyn VoiceTransport>,
        resolver: Arc<dyn TrackResolver>,
        surface: Arc<dyn StatusSurface>,
        max_queue_size: usize,
        idle_timeout: Duration,
    ) -> (Arc<Self>, flume::Receiver<PlaybackEvent>) {
        let (events, receiver) = flume::unbounded();
        let coordinator = Arc::new(Self {
            registry: SessionRegistry::new(max_queue_size),
            transport,
            resolver,
            surface,
            idle_timeout,
            events,
        });
        (coordinator, receiver)
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn transport(&self) -> &dyn VoiceTransport {
        self.transport.as_ref()
    }

    pub fn resolver(&self) -> &dyn TrackResolver {
        self.resolver.as_ref()
    }

    /// Consume los eventos del transporte y del temporizador de inactividad.
    ///
    /// Cada evento se atiende en su propia tarea: la resolución lenta de una
    /// guild no bloquea los eventos de las demás.
    pub async fn run(self: Arc<Self>, events: flume::Receiver<PlaybackEvent>) {
        info!("🎛️ Coordinador de reproducción iniciado");

        while let Ok(event) = events.recv_async().await {
            let coordinator = self.clone();
            tokio::spawn(async move {
                match event {
                    PlaybackEvent::TrackEnded { guild_id, token } => {
                        coordinator.on_playback_complete(guild_id, token).await
                    }
                    PlaybackEvent::IdleExpired { guild_id, epoch } => {
                        coordinator.on_idle_expired(guild_id, epoch).await
                    }
                }
            });
        }

        info!("Canal de eventos cerrado, coordinador detenido");
    }

    /// Conecta (o mueve) la conexión de voz de la guild al canal indicado
    pub async fn ensure_connected(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), PlayerError> {
        let session = self.registry.get_or_create(guild_id);
        let mut state = session.lock().await;

        match state.voice.clone() {
            Some(handle) if self.transport.is_connected(&handle).await => {
                if handle.channel_id != channel_id {
                    info!("🔀 Moviendo conexión de voz en guild {} a {}", guild_id, channel_id);
                    state.voice = Some(self.transport.move_to(&handle, channel_id).await?);
                }
            }
            _ => {
                let handle = self.transport.connect(guild_id, channel_id).await?;
                info!("🔊 Conectado al canal de voz {} en guild {}", channel_id, guild_id);
                state.voice = Some(handle);
            }
        }

        Ok(())
    }

    /// Garantiza que haya un stream activo si hay algo que reproducir.
    ///
    /// Idempotente: si ya hay un stream en curso (o resolviéndose) no hace nada.
    /// Las pistas que fallan se saltan. Cada intento fallido consume una entrada
    /// (la pista actual o la siguiente de la cola), así que el bucle termina
    /// aunque lleguen pistas nuevas mientras se resuelve; solo se entra en
    /// inactividad con la cola vacía.
    pub async fn ensure_playing(&self, guild_id: GuildId) -> Result<(), PlayerError> {
        let session = self.registry.get_or_create(guild_id);

        loop {
            let (token, track, options) = {
                let mut state = session.lock().await;
                if state.voice.is_none() {
                    return Err(PlayerError::NotConnected);
                }
                if state.is_active() {
                    debug!("Stream ya activo en guild {}", guild_id);
                    return Ok(());
                }

                // Con loop (o reinicio) la pista actual se conserva y se repite
                let track = match state.current.clone() {
                    Some(track) => track,
                    None => match state.pop_next() {
                        Some(track) => {
                            state.current = Some(track.clone());
                            track
                        }
                        None => {
                            self.enter_idle(guild_id, &mut state).await;
                            return Ok(());
                        }
                    },
                };

                let options = PlayOptions {
                    start_offset: state.start_offset.take(),
                };
                (state.begin_attempt(), track, options)
            };

            let resolved = self.resolver.resolve_stream(track.source()).await;

            let mut state = session.lock().await;
            if state.phase != PlaybackPhase::Starting(token) {
                debug!("Resolución obsoleta descartada en guild {}: {}", guild_id, track.title());
                return Ok(());
            }
            if state.current.as_ref() != Some(&track) {
                debug!("La pista cambió durante la resolución en guild {}", guild_id);
                state.phase = PlaybackPhase::Stopped;
                return Ok(());
            }
            let Some(voice) = state.voice.clone() else {
                state.phase = PlaybackPhase::Stopped;
                return Err(PlayerError::NotConnected);
            };

            let started = match resolved {
                Ok(url) => {
                    let signal = CompletionSignal::new(guild_id, token, self.events.clone());
                    self.transport
                        .play(&voice, &url, options, signal)
                        .await
                        .map_err(PlayerError::from)
                }
                Err(e) => Err(PlayerError::from(e)),
            };

            match started {
                Ok(()) => {
                    state.phase = PlaybackPhase::Streaming(token);
                    state.paused = false;
                    info!("🎵 Reproduciendo: {} en guild {}", track.title(), guild_id);
                    self.refresh_locked(guild_id, &mut state).await;
                    return Ok(());
                }
                Err(e) => {
                    warn!("⏭️ Saltando {} en guild {}: {}", track.title(), guild_id, e);
                    state.current = None;
                    state.phase = PlaybackPhase::Stopped;
                }
            }
        }
    }

    /// Fin de un stream (natural, por stop o por error)
    pub async fn on_playback_complete(&self, guild_id: GuildId, token: u64) {
        let Some(session) = self.registry.get(guild_id) else {
            return;
        };

        {
            let mut state = session.lock().await;
            if state.phase != PlaybackPhase::Streaming(token) {
                debug!("Fin de stream obsoleto ignorado en guild {} (token {})", guild_id, token);
                return;
            }

            state.phase = PlaybackPhase::Stopped;
            state.paused = false;

            let keep_current = match state.stop_intent.take() {
                Some(StopIntent::Skip) => false,
                Some(StopIntent::Restart(offset)) => {
                    state.start_offset = Some(offset);
                    true
                }
                None => state.looping,
            };
            if !keep_current {
                state.current = None;
            }
        }

        match self.ensure_playing(guild_id).await {
            Ok(()) => {}
            Err(PlayerError::NotConnected) => {
                debug!("Guild {} sin conexión de voz, no se avanza la cola", guild_id)
            }
            Err(e) => error!("Error al avanzar la cola en guild {}: {}", guild_id, e),
        }
    }

    /// Comprobación diferida de inactividad: solo desconecta si nada cambió
    pub async fn on_idle_expired(&self, guild_id: GuildId, epoch: u64) {
        let Some(session) = self.registry.get(guild_id) else {
            return;
        };
        let mut state = session.lock().await;

        if state.idle_epoch != epoch
            || state.is_active()
            || state.current.is_some()
            || state.len() > 0
        {
            debug!("Temporizador de inactividad obsoleto en guild {}", guild_id);
            return;
        }
        let Some(voice) = state.voice.clone() else {
            return;
        };
        if self.transport.is_playing(&voice).await {
            return;
        }

        if self.transport.is_connected(&voice).await {
            if let Err(e) = self.transport.disconnect(&voice).await {
                warn!("Error al desconectar por inactividad en guild {}: {}", guild_id, e);
            }
        }
        state.voice = None;
        info!("👋 Desconectado por inactividad en guild {}", guild_id);
    }

    /// Desconecta la guild, vacía la cola y retira el mensaje de estado
    pub async fn disconnect(&self, guild_id: GuildId) -> Result<(), PlayerError> {
        let session = self.registry.get_or_create(guild_id);
        let mut state = session.lock().await;

        let voice = state.voice.take().ok_or(PlayerError::NotConnected)?;
        state.clear();
        // El fin de stream que provoque la desconexión queda obsoleto
        state.phase = PlaybackPhase::Stopped;

        // La sesión ya quedó limpia: un fallo del transporte solo se registra
        if let Err(e) = self.transport.disconnect(&voice).await {
            warn!("Error al desconectar en guild {}: {}", guild_id, e);
        }
        self.refresh_locked(guild_id, &mut state).await;

        info!("👋 Desconectado del canal de voz en guild {}", guild_id);
        Ok(())
    }

    /// Deja la sesión limpia tras perder la conexión desde fuera
    pub async fn reset_session(&self, guild_id: GuildId) {
        let Some(session) = self.registry.get(guild_id) else {
            return;
        };
        let mut state = session.lock().await;

        state.clear();
        state.phase = PlaybackPhase::Stopped;
        if let Some(voice) = state.voice.take() {
            if let Err(e) = self.transport.disconnect(&voice).await {
                debug!("Limpieza del transporte en guild {}: {}", guild_id, e);
            }
        }
        self.refresh_locked(guild_id, &mut state).await;

        info!("🔌 Sesión reiniciada en guild {}", guild_id);
    }

    pub async fn snapshot(&self, guild_id: GuildId) -> SessionSnapshot {
        let session = self.registry.get_or_create(guild_id);
        let state = session.lock().await;
        state.snapshot()
    }

    pub async fn voice_channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        let session = self.registry.get(guild_id)?;
        let state = session.lock().await;
        state.voice.as_ref().map(|v| v.channel_id)
    }

    /// Redibuja el mensaje de estado. Nunca falla: si el mensaje ya no existe
    /// se olvida la referencia y se recrea en el siguiente refresco.
    pub(crate) async fn refresh_locked(&self, guild_id: GuildId, state: &mut SessionState) {
        if state.current.is_none() {
            if let Some(surface) = state.surface.take() {
                if let Err(e) = self.surface.remove(guild_id, surface).await {
                    debug!("No se pudo borrar el mensaje de estado en guild {}: {}", guild_id, e);
                }
            }
            return;
        }

        let snapshot = state.snapshot();
        match self.surface.render(guild_id, &snapshot, state.surface).await {
            Ok(surface) => state.surface = Some(surface),
            Err(e) => {
                warn!("No se pudo actualizar el mensaje de estado en guild {}: {}", guild_id, e);
                state.surface = None;
            }
        }
    }

    async fn enter_idle(&self, guild_id: GuildId, state: &mut SessionState) {
        state.current = None;
        state.phase = PlaybackPhase::Stopped;
        state.paused = false;
        state.start_offset = None;
        state.idle_epoch += 1;
        self.refresh_locked(guild_id, state).await;

        let epoch = state.idle_epoch;
        let events = self.events.clone();
        let delay = self.idle_timeout;
        info!("💤 Cola vacía en guild {}, desconexión en {:?}", guild_id, delay);

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(PlaybackEvent::IdleExpired { guild_id, epoch });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::{surface_ref, track, FakeResolver, Harness};
    use crate::ui::surface::{MockStatusSurface, SurfaceError};
    use pretty_assertions::assert_eq;

    #[tokio::test(start_paused = true)]
    async fn ensure_playing_requires_a_connection() {
        let h = Harness::new();
        h.enqueue_silently(["a"]).await;

        let result = h.coordinator.ensure_playing(h.guild).await;

        assert!(matches!(result, Err(PlayerError::NotConnected)));
        assert!(h.transport.plays().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn ensure_playing_is_idempotent() {
        let h = Harness::connected().await;
        h.enqueue_silently(["a", "b"]).await;

        h.coordinator.ensure_playing(h.guild).await.unwrap();
        h.coordinator.ensure_playing(h.guild).await.unwrap();

        assert_eq!(h.transport.plays(), vec!["stream:a"]);
        assert_eq!(h.queue_titles().await, vec!["b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_ensure_playing_starts_one_stream() {
        let h = Harness::connected().await;
        h.enqueue_silently(["a", "b"]).await;

        let (first, second) = tokio::join!(
            h.coordinator.ensure_playing(h.guild),
            h.coordinator.ensure_playing(h.guild)
        );

        assert!(first.is_ok() && second.is_ok());
        assert_eq!(h.transport.plays(), vec!["stream:a"]);
        assert_eq!(h.current_title().await.as_deref(), Some("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn completion_advances_the_queue() {
        let h = Harness::connected().await;
        h.enqueue_silently(["a", "b"]).await;
        h.coordinator.ensure_playing(h.guild).await.unwrap();

        h.transport.finish();
        h.settle().await;

        assert_eq!(h.transport.plays(), vec!["stream:a", "stream:b"]);
        assert_eq!(h.current_title().await.as_deref(), Some("b"));
        assert!(h.queue_titles().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn loop_replays_the_same_track() {
        let h = Harness::connected().await;
        h.enqueue_silently(["a", "b"]).await;
        h.coordinator.ensure_playing(h.guild).await.unwrap();
        h.commands.toggle_loop(h.guild).await.unwrap();

        for _ in 0..3 {
            h.transport.finish();
            h.settle().await;
        }

        assert_eq!(h.transport.plays(), vec!["stream:a"; 4]);
        assert_eq!(h.queue_titles().await, vec!["b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_timeout_disconnects_after_the_grace_period() {
        let h = Harness::connected().await;
        h.enqueue_silently(["x"]).await;
        h.coordinator.ensure_playing(h.guild).await.unwrap();

        h.transport.finish();
        h.settle().await;
        assert_eq!(h.current_title().await, None);

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert!(h.transport.is_connected_now());
        assert_eq!(h.transport.disconnects(), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        h.settle().await;
        assert!(!h.transport.is_connected_now());
        assert_eq!(h.coordinator.voice_channel(h.guild).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn enqueue_before_expiry_keeps_the_connection() {
        let h = Harness::connected().await;
        h.enqueue_silently(["x"]).await;
        h.coordinator.ensure_playing(h.guild).await.unwrap();
        h.transport.finish();
        h.settle().await;

        tokio::time::sleep(Duration::from_secs(30)).await;
        h.commands
            .enqueue(h.guild, vec![track("y")], Some(h.channel), None)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(45)).await;
        h.settle().await;

        assert_eq!(h.transport.disconnects(), 0);
        assert!(h.transport.is_connected_now());
        assert_eq!(h.current_title().await.as_deref(), Some("y"));
        assert_eq!(h.transport.plays(), vec!["stream:x", "stream:y"]);
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_track_is_skipped() {
        let h = Harness::with_resolver(FakeResolver::failing(["x"])).await;
        h.enqueue_silently(["x", "y"]).await;

        h.coordinator.ensure_playing(h.guild).await.unwrap();

        assert_eq!(h.transport.plays(), vec!["stream:y"]);
        assert_eq!(h.current_title().await.as_deref(), Some("y"));
    }

    #[tokio::test(start_paused = true)]
    async fn all_failing_queue_terminates_idle() {
        let h = Harness::with_resolver(FakeResolver::failing(["x", "y", "z"])).await;
        h.enqueue_silently(["x", "y", "z"]).await;

        h.coordinator.ensure_playing(h.guild).await.unwrap();

        assert!(h.transport.plays().is_empty());
        assert_eq!(h.current_title().await, None);
        assert!(h.queue_titles().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn tracks_enqueued_during_failing_resolves_still_play() {
        let h = Harness::with_resolver(FakeResolver::failing(["x", "y"]).with_gate()).await;
        h.enqueue_silently(["x"]).await;

        let coordinator = h.coordinator.clone();
        let guild = h.guild;
        let pending = tokio::spawn(async move { coordinator.ensure_playing(guild).await });
        h.settle().await;

        h.commands
            .enqueue(h.guild, vec![track("y"), track("z")], Some(h.channel), None)
            .await
            .unwrap();

        // x falla, y falla, z suena
        for _ in 0..3 {
            h.resolver.open_gate();
            h.settle().await;
        }
        pending.await.unwrap().unwrap();

        assert_eq!(h.transport.plays(), vec!["stream:z"]);
        assert_eq!(h.current_title().await.as_deref(), Some("z"));

        tokio::time::sleep(Duration::from_secs(61)).await;
        h.settle().await;
        assert_eq!(h.transport.disconnects(), 0);
        assert!(h.transport.is_connected_now());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_check_never_disconnects_with_queued_tracks() {
        let h = Harness::connected().await;
        h.enqueue_silently(["a"]).await;

        h.coordinator.on_idle_expired(h.guild, 0).await;

        assert!(h.transport.is_connected_now());
        assert_eq!(h.coordinator.voice_channel(h.guild).await, Some(h.channel));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_check_keeps_a_transport_that_is_still_playing() {
        let h = Harness::connected().await;
        h.enqueue_silently(["a"]).await;
        h.coordinator.ensure_playing(h.guild).await.unwrap();

        // La sesión cree estar inactiva, pero el transporte sigue sonando
        let session = h.coordinator.registry().get_or_create(h.guild);
        let epoch = {
            let mut state = session.lock().await;
            state.current = None;
            state.phase = PlaybackPhase::Stopped;
            state.idle_epoch
        };
        h.coordinator.on_idle_expired(h.guild, epoch).await;

        assert_eq!(h.transport.disconnects(), 0);
        assert!(h.transport.is_connected_now());
        assert_eq!(h.coordinator.voice_channel(h.guild).await, Some(h.channel));
    }

    #[tokio::test(start_paused = true)]
    async fn ensure_connected_moves_to_another_channel() {
        let h = Harness::connected().await;
        let other = ChannelId::new(3);

        h.coordinator.ensure_connected(h.guild, other).await.unwrap();
        h.coordinator.ensure_connected(h.guild, other).await.unwrap();

        assert_eq!(h.transport.moves(), 1);
        assert_eq!(h.transport.disconnects(), 0);
        assert_eq!(h.coordinator.voice_channel(h.guild).await, Some(other));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_session_drops_queue_and_handle() {
        let h = Harness::connected().await;
        h.enqueue_silently(["a", "b"]).await;
        h.coordinator.ensure_playing(h.guild).await.unwrap();

        h.coordinator.reset_session(h.guild).await;
        h.settle().await;

        assert_eq!(h.current_title().await, None);
        assert!(h.queue_titles().await.is_empty());
        assert_eq!(h.coordinator.voice_channel(h.guild).await, None);
        assert!(!h.transport.is_connected_now());
        // El fin de stream provocado por la limpieza no avanza nada
        assert_eq!(h.transport.plays(), vec!["stream:a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_completion_is_ignored() {
        let h = Harness::connected().await;
        h.enqueue_silently(["a", "b"]).await;
        h.coordinator.ensure_playing(h.guild).await.unwrap();

        h.coordinator.on_playback_complete(h.guild, 999).await;

        assert_eq!(h.transport.plays(), vec!["stream:a"]);
        assert_eq!(h.current_title().await.as_deref(), Some("a"));
        assert_eq!(h.queue_titles().await, vec!["b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn resolve_result_is_discarded_after_clear() {
        let h = Harness::with_resolver(FakeResolver::gated()).await;
        h.enqueue_silently(["a"]).await;

        let coordinator = h.coordinator.clone();
        let guild = h.guild;
        let pending = tokio::spawn(async move { coordinator.ensure_playing(guild).await });
        h.settle().await;

        h.commands.clear(h.guild).await.unwrap();
        h.resolver.open_gate();
        pending.await.unwrap().unwrap();

        assert!(h.transport.plays().is_empty());
        assert_eq!(h.current_title().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn surface_failure_is_forgotten_and_recreated() {
        let mut surface = MockStatusSurface::new();
        let mut calls = 0;
        surface.expect_render().returning(move |_, _, existing| {
            calls += 1;
            if calls == 1 {
                Err(SurfaceError::Gone)
            } else {
                assert_eq!(existing, None);
                Ok(surface_ref())
            }
        });
        surface.expect_remove().returning(|_, _| Ok(()));
        let h = Harness::build(FakeResolver::default(), surface).await;
        h.enqueue_silently(["a", "b"]).await;

        h.coordinator.ensure_playing(h.guild).await.unwrap();
        h.commands.toggle_loop(h.guild).await.unwrap();

        let session = h.coordinator.registry().get_or_create(h.guild);
        assert_eq!(session.lock().await.surface, Some(surface_ref()));
    }
}
