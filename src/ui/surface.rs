//! Mensaje de estado por guild: embed + controles.
//!
//! El coordinador solo conoce [`StatusSurface`]; la implementación de
//! Discord edita el mensaje existente y, si ya no existe, envía uno nuevo.

use async_trait::async_trait;
use serenity::{
    builder::{CreateMessage, EditMessage},
    http::Http,
    model::id::GuildId,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::{
    audio::session::{SessionSnapshot, SurfaceRef},
    ui::{buttons, embeds},
};

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("no hay canal de texto para el mensaje de estado")]
    NoChannel,

    #[error("el mensaje de estado ya no existe")]
    Gone,

    #[error("error de Discord: {0}")]
    Discord(#[from] serenity::Error),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatusSurface: Send + Sync {
    /// Dibuja (o redibuja) el estado. Idempotente.
    async fn render(
        &self,
        guild_id: GuildId,
        snapshot: &SessionSnapshot,
        existing: Option<SurfaceRef>,
    ) -> Result<SurfaceRef, SurfaceError>;

    async fn remove(&self, guild_id: GuildId, surface: SurfaceRef) -> Result<(), SurfaceError>;
}

pub struct DiscordStatusSurface {
    http: Arc<Http>,
}

impl DiscordStatusSurface {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl StatusSurface for DiscordStatusSurface {
    async fn render(
        &self,
        guild_id: GuildId,
        snapshot: &SessionSnapshot,
        existing: Option<SurfaceRef>,
    ) -> Result<SurfaceRef, SurfaceError> {
        let embed = embeds::create_status_embed(snapshot);
        let components = buttons::create_player_controls(snapshot);

        if let Some(surface) = existing {
            let edit = EditMessage::new()
                .embed(embed.clone())
                .components(components.clone());
            match surface
                .channel_id
                .edit_message(&self.http, surface.message_id, edit)
                .await
            {
                Ok(_) => return Ok(surface),
                // Borrado desde fuera: se recrea abajo
                Err(e) => debug!("Mensaje de estado perdido en guild {}: {}", guild_id, e),
            }
        }

        let channel_id = snapshot
            .channel
            .or(existing.map(|s| s.channel_id))
            .ok_or(SurfaceError::NoChannel)?;

        let message = channel_id
            .send_message(
                &self.http,
                CreateMessage::new().embed(embed).components(components),
            )
            .await?;

        Ok(SurfaceRef {
            channel_id,
            message_id: message.id,
        })
    }

    async fn remove(&self, guild_id: GuildId, surface: SurfaceRef) -> Result<(), SurfaceError> {
        debug!("Borrando mensaje de estado en guild {}", guild_id);
        surface
            .channel_id
            .delete_message(&self.http, surface.message_id)
            .await
            .map_err(|e| {
                if is_not_found(&e) {
                    SurfaceError::Gone
                } else {
                    SurfaceError::Discord(e)
                }
            })
    }
}

fn is_not_found(error: &serenity::Error) -> bool {
    matches!(
        error,
        serenity::Error::Http(http) if http.status_code() == Some(reqwest::StatusCode::NOT_FOUND)
    )
}
