use anyhow::Result;
use serenity::{
    builder::{
        CreateInteractionResponse, CreateInteractionResponseFollowup,
        CreateInteractionResponseMessage, EditInteractionResponse,
    },
    model::{
        application::{CommandInteraction, ComponentInteraction, ComponentInteractionDataKind},
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use std::time::Duration;
use tracing::{debug, info};

use crate::{
    audio::{
        commands::CommandOutcome,
        session::EnqueueReport,
    },
    bot::JukeboxBot,
    error::PlayerError,
    ui::{buttons, embeds},
};

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &JukeboxBot,
) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    let commands = &bot.commands;
    let result = match command.data.name.as_str() {
        "play" => return handle_play(ctx, command, bot, guild_id).await,
        "queue" => return handle_queue(ctx, command, bot, guild_id).await,
        "nowplaying" => return handle_nowplaying(ctx, command, bot, guild_id).await,
        "pause" => guarded(ctx, bot, guild_id, command.user.id, commands.pause(guild_id)).await,
        "resume" => guarded(ctx, bot, guild_id, command.user.id, commands.resume(guild_id)).await,
        "skip" => guarded(ctx, bot, guild_id, command.user.id, commands.skip(guild_id)).await,
        "stop" => guarded(ctx, bot, guild_id, command.user.id, commands.clear(guild_id)).await,
        "loop" => guarded(ctx, bot, guild_id, command.user.id, commands.toggle_loop(guild_id)).await,
        "leave" => guarded(ctx, bot, guild_id, command.user.id, commands.leave(guild_id)).await,
        "remove" => {
            let position = integer_option(&command, "position");
            match position.and_then(queue_index) {
                Some(index) => {
                    guarded(ctx, bot, guild_id, command.user.id, commands.remove(guild_id, index)).await
                }
                None => {
                    let content = match position {
                        Some(p) => format!("❌ Posición inválida: {} (la primera es 1)", p),
                        None => "❌ Indica la posición a quitar".to_string(),
                    };
                    return respond_text(ctx, &command, &content, true).await;
                }
            }
        }
        "seek" => {
            let raw = string_option(&command, "position").unwrap_or_default();
            match parse_position(&raw) {
                Some(offset) => {
                    guarded(ctx, bot, guild_id, command.user.id, commands.seek(guild_id, offset)).await
                }
                None => {
                    return respond_text(ctx, &command, "❌ Posición inválida (usa 1:30, 90 o 2m)", true)
                        .await
                }
            }
        }
        _ => {
            return respond_text(ctx, &command, "❌ Comando no reconocido", true).await;
        }
    };

    match result {
        Ok(outcome) => respond_text(ctx, &command, &outcome.to_string(), false).await,
        Err(e) => {
            debug!("Comando /{} rechazado: {}", command.data.name, e);
            respond_text(ctx, &command, &e.to_string(), true).await
        }
    }
}

/// Maneja botones y el menú para quitar canciones del mensaje de estado
pub async fn handle_component(
    ctx: &Context,
    component: ComponentInteraction,
    bot: &JukeboxBot,
) -> Result<()> {
    let guild_id = component
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Componente usado fuera de un servidor"))?;

    info!(
        "🔘 Botón {} presionado por {} en guild {}",
        component.data.custom_id, component.user.name, guild_id
    );

    let values: &[String] = match &component.data.kind {
        ComponentInteractionDataKind::StringSelect { values } => values.as_slice(),
        _ => &[],
    };

    let Some(action) = buttons::parse_action(&component.data.custom_id, values) else {
        debug!("Componente no manejado: {}", component.data.custom_id);
        component
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new()
                        .content("❌ Acción no reconocida")
                        .ephemeral(true),
                ),
            )
            .await?;
        return Ok(());
    };

    // Play/Resume puede tardar (resolución del stream)
    component
        .create_response(&ctx.http, CreateInteractionResponse::Acknowledge)
        .await?;

    let result = match voice_guard(ctx, bot, guild_id, component.user.id).await {
        Ok(channel_id) => {
            bot.commands
                .dispatch(guild_id, action, Some(channel_id))
                .await
        }
        Err(e) => Err(e),
    };

    let content = match result {
        Ok(outcome) => outcome.to_string(),
        Err(e) => e.to_string(),
    };

    component
        .create_followup(
            &ctx.http,
            CreateInteractionResponseFollowup::new()
                .content(content)
                .ephemeral(true),
        )
        .await?;

    Ok(())
}

// Handlers específicos para cada comando

async fn handle_play(
    ctx: &Context,
    command: CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let query = string_option(&command, "query")
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?;

    // Defer la respuesta ya que puede tomar tiempo
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let content = match play(ctx, &command, bot, guild_id, &query).await {
        Ok(outcome) => outcome.to_string(),
        Err(e) => {
            debug!("/play rechazado en guild {}: {}", guild_id, e);
            e.to_string()
        }
    };

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
        .await?;

    Ok(())
}

async fn play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
    query: &str,
) -> Result<CommandOutcome, PlayerError> {
    let voice_channel_id =
        user_voice_channel(ctx, guild_id, command.user.id).ok_or(PlayerError::NotInVoice)?;

    // Límite de la cola antes de resolver
    bot.commands.ensure_capacity(guild_id).await?;

    let resolved = bot
        .commands
        .coordinator()
        .resolver()
        .resolve(query, command.user.id)
        .await?;

    let outcome = bot
        .commands
        .enqueue(
            guild_id,
            resolved.tracks,
            Some(voice_channel_id),
            Some(command.channel_id),
        )
        .await?;

    Ok(match outcome {
        CommandOutcome::Enqueued(report) => CommandOutcome::Enqueued(EnqueueReport {
            skipped: report.skipped + resolved.unavailable,
            ..report
        }),
        other => other,
    })
}

async fn handle_queue(
    ctx: &Context,
    command: CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let snapshot = bot.commands.coordinator().snapshot(guild_id).await;
    let embed = embeds::create_queue_embed(&snapshot);

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().embed(embed),
            ),
        )
        .await?;

    Ok(())
}

async fn handle_nowplaying(
    ctx: &Context,
    command: CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let snapshot = bot.commands.coordinator().snapshot(guild_id).await;

    if snapshot.current.is_none() {
        return respond_text(ctx, &command, &PlayerError::NothingPlaying.to_string(), true).await;
    }

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embeds::create_status_embed(&snapshot))
                    .components(buttons::create_player_controls(&snapshot)),
            ),
        )
        .await?;

    Ok(())
}

// Funciones auxiliares

async fn respond_text(
    ctx: &Context,
    command: &CommandInteraction,
    content: &str,
    ephemeral: bool,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(ephemeral),
            ),
        )
        .await?;
    Ok(())
}

/// Ejecuta el comando solo si el usuario está en el canal de voz del bot
async fn guarded(
    ctx: &Context,
    bot: &JukeboxBot,
    guild_id: GuildId,
    user_id: UserId,
    action: impl std::future::Future<Output = Result<CommandOutcome, PlayerError>>,
) -> Result<CommandOutcome, PlayerError> {
    voice_guard(ctx, bot, guild_id, user_id).await?;
    action.await
}

async fn voice_guard(
    ctx: &Context,
    bot: &JukeboxBot,
    guild_id: GuildId,
    user_id: UserId,
) -> Result<ChannelId, PlayerError> {
    let user_channel = user_voice_channel(ctx, guild_id, user_id).ok_or(PlayerError::NotInVoice)?;

    match bot.commands.coordinator().voice_channel(guild_id).await {
        Some(bot_channel) if bot_channel != user_channel => Err(PlayerError::WrongVoiceChannel),
        _ => Ok(user_channel),
    }
}

fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}

fn string_option(command: &CommandInteraction, name: &str) -> Option<String> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
        .map(str::to_string)
}

fn integer_option(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_i64())
}

/// Posición de la cola (1 = siguiente) a índice; `None` si es menor que 1
fn queue_index(position: i64) -> Option<usize> {
    usize::try_from(position.checked_sub(1)?).ok()
}

/// Acepta "m:ss", "h:mm:ss", segundos sueltos o formato humantime ("2m")
fn parse_position(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if raw.contains(':') {
        let mut total = 0u64;
        for part in raw.split(':') {
            let value: u64 = part.parse().ok()?;
            total = total.checked_mul(60)?.checked_add(value)?;
        }
        return Some(Duration::from_secs(total));
    }

    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    humantime::parse_duration(raw).ok()
}
