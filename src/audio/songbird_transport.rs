use async_trait::async_trait;
use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::HttpRequest,
    tracks::{PlayMode, TrackHandle},
    Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};

use crate::audio::transport::{
    CompletionSignal, PlayOptions, TransportError, VoiceHandle, VoiceTransport,
};

/// Transporte de voz sobre Songbird: un `Call` por guild y un único track activo
pub struct SongbirdTransport {
    manager: Arc<Songbird>,
    http: reqwest::Client,
    tracks: DashMap<GuildId, TrackHandle>,
}

impl SongbirdTransport {
    pub fn new(manager: Arc<Songbird>) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            manager,
            http,
            tracks: DashMap::new(),
        }
    }

    // Clonar el handle antes de cualquier await: no retener el guard del DashMap
    fn track(&self, guild_id: GuildId) -> Option<TrackHandle> {
        self.tracks.get(&guild_id).map(|t| t.clone())
    }

    async fn play_mode(&self, guild_id: GuildId) -> Option<PlayMode> {
        let track = self.track(guild_id)?;
        track.get_info().await.ok().map(|info| info.playing)
    }
}

/// Dispara el `CompletionSignal` cuando el track termina o falla
struct TrackCompletion {
    signal: CompletionSignal,
}

#[async_trait]
impl VoiceEventHandler for TrackCompletion {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(track_list) = ctx {
            for (state, _handle) in *track_list {
                if let PlayMode::Errored(e) = &state.playing {
                    warn!("❌ Error en el stream (token {}): {:?}", self.signal.token(), e);
                }
            }
        }

        self.signal.fire();
        None
    }
}

#[async_trait]
impl VoiceTransport for SongbirdTransport {
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<VoiceHandle, TransportError> {
        self.manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        Ok(VoiceHandle { guild_id, channel_id })
    }

    async fn move_to(&self, handle: &VoiceHandle, channel_id: ChannelId) -> Result<VoiceHandle, TransportError> {
        // `join` sobre una llamada existente mueve la conexión
        self.connect(handle.guild_id, channel_id).await
    }

    async fn disconnect(&self, handle: &VoiceHandle) -> Result<(), TransportError> {
        if let Some((_, track)) = self.tracks.remove(&handle.guild_id) {
            let _ = track.stop();
        }

        match self.manager.remove(handle.guild_id).await {
            Ok(()) => Ok(()),
            Err(songbird::error::JoinError::NoCall) => {
                debug!("Guild {} ya no tenía llamada de voz", handle.guild_id);
                Ok(())
            }
            Err(e) => Err(TransportError::Disconnect(e.to_string())),
        }
    }

    async fn play(
        &self,
        handle: &VoiceHandle,
        stream_url: &str,
        options: PlayOptions,
        on_complete: CompletionSignal,
    ) -> Result<(), TransportError> {
        let call = self
            .manager
            .get(handle.guild_id)
            .ok_or(TransportError::NotConnected)?;

        let input = HttpRequest::new(self.http.clone(), stream_url.to_string());

        // play_only_input detiene cualquier otro track de la llamada
        let track = {
            let mut call = call.lock().await;
            call.play_only_input(input.into())
        };

        for event in [TrackEvent::End, TrackEvent::Error] {
            let handler = TrackCompletion {
                signal: on_complete.clone(),
            };
            if let Err(e) = track.add_event(Event::Track(event), handler) {
                let _ = track.stop();
                return Err(TransportError::Playback(e.to_string()));
            }
        }

        if let Some(offset) = options.start_offset {
            debug!("⏩ Reiniciando stream en {:?}", offset);
            // El seek espera a que el input esté listo: no retener la sesión
            let seeking = track.clone();
            let guild_id = handle.guild_id;
            tokio::spawn(async move {
                match seeking.seek_async(offset).await {
                    Ok(position) => debug!("Stream posicionado en {:?} en guild {}", position, guild_id),
                    Err(e) => warn!(
                        "⚠️ No se pudo posicionar el stream en {:?} en guild {}, suena desde el inicio: {:?}",
                        offset, guild_id, e
                    ),
                }
            });
        }

        self.tracks.insert(handle.guild_id, track);
        info!("🔊 Stream iniciado en guild {}", handle.guild_id);
        Ok(())
    }

    async fn pause(&self, handle: &VoiceHandle) -> Result<(), TransportError> {
        let track = self.track(handle.guild_id).ok_or(TransportError::NotConnected)?;
        track
            .pause()
            .map_err(|e| TransportError::Playback(e.to_string()))
    }

    async fn resume(&self, handle: &VoiceHandle) -> Result<(), TransportError> {
        let track = self.track(handle.guild_id).ok_or(TransportError::NotConnected)?;
        track
            .play()
            .map_err(|e| TransportError::Playback(e.to_string()))
    }

    async fn stop(&self, handle: &VoiceHandle) -> Result<(), TransportError> {
        if let Some((_, track)) = self.tracks.remove(&handle.guild_id) {
            // Si ya había terminado, su evento End ya se disparó
            if let Err(e) = track.stop() {
                debug!("Track ya detenido en guild {}: {}", handle.guild_id, e);
            }
        }
        Ok(())
    }

    async fn is_connected(&self, handle: &VoiceHandle) -> bool {
        let Some(call) = self.manager.get(handle.guild_id) else {
            return false;
        };
        let call = call.lock().await;
        call.current_channel().is_some()
    }

    async fn is_playing(&self, handle: &VoiceHandle) -> bool {
        matches!(self.play_mode(handle.guild_id).await, Some(PlayMode::Play))
    }

    async fn is_paused(&self, handle: &VoiceHandle) -> bool {
        matches!(self.play_mode(handle.guild_id).await, Some(PlayMode::Pause))
    }
}
