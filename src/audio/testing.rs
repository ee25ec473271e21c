//! Dobles de prueba compartidos por los tests del coordinador y de los comandos.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId, MessageId, UserId};
use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::sync::Notify;

use crate::{
    audio::{
        commands::QueueCommands,
        coordinator::PlaybackCoordinator,
        session::SurfaceRef,
        track::Track,
        transport::{CompletionSignal, PlayOptions, TransportError, VoiceHandle, VoiceTransport},
    },
    sources::{ResolveError, Resolved, TrackResolver},
    ui::surface::MockStatusSurface,
};

pub fn track(title: &str) -> Track {
    Track::new(title, title, UserId::new(1))
}

pub fn surface_ref() -> SurfaceRef {
    SurfaceRef {
        channel_id: ChannelId::new(10),
        message_id: MessageId::new(20),
    }
}

pub fn quiet_surface() -> MockStatusSurface {
    let mut surface = MockStatusSurface::new();
    surface.expect_render().returning(|_, _, _| Ok(surface_ref()));
    surface.expect_remove().returning(|_, _| Ok(()));
    surface
}

struct ActiveStream {
    paused: bool,
    signal: CompletionSignal,
}

#[derive(Default)]
struct FakeState {
    connected: Option<VoiceHandle>,
    active: Option<ActiveStream>,
    plays: Vec<(String, PlayOptions)>,
    disconnects: usize,
    moves: usize,
}

/// Transporte en memoria: registra cada `play` y dispara la señal al detener
#[derive(Default)]
pub struct FakeTransport {
    state: Mutex<FakeState>,
    refuse_connect: bool,
    broken_stop: bool,
}

impl FakeTransport {
    pub fn refusing() -> Self {
        Self {
            refuse_connect: true,
            ..Self::default()
        }
    }

    /// `stop` y `disconnect` fallan sin tocar el stream
    pub fn broken_stop() -> Self {
        Self {
            broken_stop: true,
            ..Self::default()
        }
    }

    /// Simula el final natural del stream activo
    pub fn finish(&self) {
        let active = self.state.lock().unwrap().active.take();
        if let Some(active) = active {
            active.signal.fire();
        }
    }

    pub fn plays(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.plays.iter().map(|(url, _)| url.clone()).collect()
    }

    pub fn last_offset(&self) -> Option<Duration> {
        let state = self.state.lock().unwrap();
        state.plays.last().and_then(|(_, options)| options.start_offset)
    }

    pub fn disconnects(&self) -> usize {
        self.state.lock().unwrap().disconnects
    }

    pub fn moves(&self) -> usize {
        self.state.lock().unwrap().moves
    }

    pub fn is_connected_now(&self) -> bool {
        self.state.lock().unwrap().connected.is_some()
    }

    fn stop_active(&self) {
        let active = self.state.lock().unwrap().active.take();
        if let Some(active) = active {
            active.signal.fire();
        }
    }
}

#[async_trait]
impl VoiceTransport for FakeTransport {
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<VoiceHandle, TransportError> {
        if self.refuse_connect {
            return Err(TransportError::Connect("sin permisos".to_string()));
        }
        let handle = VoiceHandle { guild_id, channel_id };
        self.state.lock().unwrap().connected = Some(handle.clone());
        Ok(handle)
    }

    async fn move_to(&self, handle: &VoiceHandle, channel_id: ChannelId) -> Result<VoiceHandle, TransportError> {
        let moved = VoiceHandle {
            guild_id: handle.guild_id,
            channel_id,
        };
        let mut state = self.state.lock().unwrap();
        state.connected = Some(moved.clone());
        state.moves += 1;
        Ok(moved)
    }

    async fn disconnect(&self, _handle: &VoiceHandle) -> Result<(), TransportError> {
        if self.broken_stop {
            return Err(TransportError::Disconnect("gateway caído".to_string()));
        }
        self.stop_active();
        let mut state = self.state.lock().unwrap();
        state.connected = None;
        state.disconnects += 1;
        Ok(())
    }

    async fn play(
        &self,
        _handle: &VoiceHandle,
        stream_url: &str,
        options: PlayOptions,
        on_complete: CompletionSignal,
    ) -> Result<(), TransportError> {
        let previous = {
            let mut state = self.state.lock().unwrap();
            if state.connected.is_none() {
                return Err(TransportError::NotConnected);
            }
            state.plays.push((stream_url.to_string(), options));
            state.active.replace(ActiveStream {
                paused: false,
                signal: on_complete,
            })
        };
        // Un solo stream por guild: el anterior termina
        if let Some(previous) = previous {
            previous.signal.fire();
        }
        Ok(())
    }

    async fn pause(&self, _handle: &VoiceHandle) -> Result<(), TransportError> {
        match self.state.lock().unwrap().active.as_mut() {
            Some(active) => {
                active.paused = true;
                Ok(())
            }
            None => Err(TransportError::Playback("nada que pausar".to_string())),
        }
    }

    async fn resume(&self, _handle: &VoiceHandle) -> Result<(), TransportError> {
        match self.state.lock().unwrap().active.as_mut() {
            Some(active) => {
                active.paused = false;
                Ok(())
            }
            None => Err(TransportError::Playback("nada que reanudar".to_string())),
        }
    }

    async fn stop(&self, _handle: &VoiceHandle) -> Result<(), TransportError> {
        if self.broken_stop {
            return Err(TransportError::Playback("driver caído".to_string()));
        }
        self.stop_active();
        Ok(())
    }

    async fn is_connected(&self, _handle: &VoiceHandle) -> bool {
        self.is_connected_now()
    }

    async fn is_playing(&self, _handle: &VoiceHandle) -> bool {
        matches!(&self.state.lock().unwrap().active, Some(active) if !active.paused)
    }

    async fn is_paused(&self, _handle: &VoiceHandle) -> bool {
        matches!(&self.state.lock().unwrap().active, Some(active) if active.paused)
    }
}

/// Resolver en memoria: `stream:<fuente>`, salvo las fuentes marcadas como fallidas
#[derive(Default)]
pub struct FakeResolver {
    failing: HashSet<String>,
    gate: Option<Notify>,
}

impl FakeResolver {
    pub fn failing<const N: usize>(sources: [&str; N]) -> Self {
        Self {
            failing: sources.iter().map(|s| s.to_string()).collect(),
            gate: None,
        }
    }

    /// Las resoluciones esperan a `open_gate`
    pub fn gated() -> Self {
        Self::default().with_gate()
    }

    pub fn with_gate(mut self) -> Self {
        self.gate = Some(Notify::new());
        self
    }

    pub fn open_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }
}

#[async_trait]
impl TrackResolver for FakeResolver {
    async fn resolve(&self, query: &str, requested_by: UserId) -> Result<Resolved, ResolveError> {
        Ok(Resolved {
            tracks: vec![Track::new(query, query, requested_by)],
            unavailable: 0,
        })
    }

    async fn resolve_stream(&self, source: &str) -> Result<String, ResolveError> {
        match &self.gate {
            Some(gate) => gate.notified().await,
            None => tokio::task::yield_now().await,
        }
        if self.failing.contains(source) {
            return Err(ResolveError::Unavailable(source.to_string()));
        }
        Ok(format!("stream:{}", source))
    }
}

/// Coordinador con su bucle de eventos en marcha y dobles de prueba
pub struct Harness {
    pub coordinator: Arc<PlaybackCoordinator>,
    pub commands: QueueCommands,
    pub transport: Arc<FakeTransport>,
    pub resolver: Arc<FakeResolver>,
    pub guild: GuildId,
    pub channel: ChannelId,
}

impl Harness {
    /// Sin conexión de voz
    pub fn new() -> Self {
        Self::assemble(FakeTransport::default(), FakeResolver::default(), quiet_surface())
    }

    /// Conectado al canal de prueba
    pub async fn connected() -> Self {
        Self::with_resolver(FakeResolver::default()).await
    }

    pub async fn with_resolver(resolver: FakeResolver) -> Self {
        Self::build(resolver, quiet_surface()).await
    }

    pub async fn build_with_transport(transport: FakeTransport) -> Self {
        Self::assemble(transport, FakeResolver::default(), quiet_surface())
    }

    pub async fn build(resolver: FakeResolver, surface: MockStatusSurface) -> Self {
        Self::build_connected(FakeTransport::default(), resolver, surface).await
    }

    /// Conectado, con un transporte a medida
    pub async fn connected_with_transport(transport: FakeTransport) -> Self {
        Self::build_connected(transport, FakeResolver::default(), quiet_surface()).await
    }

    async fn build_connected(transport: FakeTransport, resolver: FakeResolver, surface: MockStatusSurface) -> Self {
        let harness = Self::assemble(transport, resolver, surface);
        harness
            .coordinator
            .ensure_connected(harness.guild, harness.channel)
            .await
            .unwrap();
        harness
    }

    fn assemble(transport: FakeTransport, resolver: FakeResolver, surface: MockStatusSurface) -> Self {
        let transport = Arc::new(transport);
        let resolver = Arc::new(resolver);
        let (coordinator, events) = PlaybackCoordinator::new(
            transport.clone(),
            resolver.clone(),
            Arc::new(surface),
            120,
            Duration::from_secs(60),
        );
        tokio::spawn(coordinator.clone().run(events));

        Self {
            commands: QueueCommands::new(coordinator.clone()),
            coordinator,
            transport,
            resolver,
            guild: GuildId::new(1),
            channel: ChannelId::new(2),
        }
    }

    /// Encola sin conectar ni arrancar
    pub async fn enqueue_silently<const N: usize>(&self, titles: [&str; N]) {
        let session = self.coordinator.registry().get_or_create(self.guild);
        session.lock().await.enqueue(titles.iter().map(|t| track(t)));
    }

    /// Deja correr las tareas pendientes (el reloj está pausado)
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    pub async fn current_title(&self) -> Option<String> {
        let snapshot = self.coordinator.snapshot(self.guild).await;
        snapshot.current.map(|t| t.title().to_string())
    }

    pub async fn queue_titles(&self) -> Vec<String> {
        let snapshot = self.coordinator.snapshot(self.guild).await;
        snapshot.queue.iter().map(|t| t.title().to_string()).collect()
    }
}
