use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::audio::{
    session::SessionSnapshot,
    track::{Track, MAX_TITLE_LEN},
};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Guild Jukebox";

/// Canciones próximas que se listan en el mensaje de estado
pub const UPCOMING_LIMIT: usize = 10;

/// Títulos en listas: 10 entradas deben caber en un campo de 1024 caracteres
const LIST_TITLE_LEN: usize = 80;

/// Embed del mensaje de estado: canción actual + próximas
pub fn create_status_embed(snapshot: &SessionSnapshot) -> CreateEmbed {
    let Some(current) = &snapshot.current else {
        return create_info_embed("Sin reproducción", "😴 No hay nada sonando");
    };

    let (title, color) = if snapshot.paused {
        ("⏸️ En Pausa", colors::WARNING_ORANGE)
    } else {
        ("🎵 Reproduciendo Ahora", colors::SUCCESS_GREEN)
    };

    let mut embed = CreateEmbed::default()
        .title(title)
        .description(format!("**{}**", current.display_title(MAX_TITLE_LEN)))
        .color(color)
        .field("⏱️ Duración", duration_label(current), true)
        .field("👤 Solicitado por", format!("<@{}>", current.requested_by()), true)
        .field(
            "🔁 Loop",
            if snapshot.looping { "Activado" } else { "Desactivado" },
            true,
        );

    if let Some(thumbnail) = current.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }
    if current.source().starts_with("http") {
        embed = embed.url(current.source());
    }

    if !snapshot.queue.is_empty() {
        embed = embed.field("📋 Próximas", upcoming_list(&snapshot.queue), false);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(format!(
            "{} • {} en cola",
            STANDARD_FOOTER,
            snapshot.queue.len()
        )))
}

/// Embed para `/queue`
pub fn create_queue_embed(snapshot: &SessionSnapshot) -> CreateEmbed {
    let embed = CreateEmbed::default()
        .title("📋 Cola de Reproducción")
        .color(colors::INFO_BLUE);

    if snapshot.current.is_none() && snapshot.queue.is_empty() {
        return embed
            .description("😴 **La cola está vacía**\n\n💡 Usa `/play <canción>` para agregar música")
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
            .timestamp(Timestamp::now());
    }

    let mut embed = embed;
    if let Some(current) = &snapshot.current {
        let status = if snapshot.looping { "🔂" } else { "▶️" };
        embed = embed.field(
            format!("{} Reproduciendo", status),
            format!("**{}** ({})", current.display_title(MAX_TITLE_LEN), duration_label(current)),
            false,
        );
    }

    if !snapshot.queue.is_empty() {
        embed = embed.field("⏭️ Siguientes", upcoming_list(&snapshot.queue), false);
    }

    let total: Duration = snapshot.queue.iter().filter_map(Track::duration).sum();
    embed
        .footer(CreateEmbedFooter::new(format!(
            "{} canciones • {} en total",
            snapshot.queue.len(),
            format_duration(total)
        )))
        .timestamp(Timestamp::now())
}

pub fn create_info_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("ℹ️ {}", title))
        .description(description)
        .color(colors::INFO_BLUE)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Lista numerada de las próximas canciones (máximo [`UPCOMING_LIMIT`])
pub fn upcoming_list(queue: &[Track]) -> String {
    let mut lines: Vec<String> = queue
        .iter()
        .take(UPCOMING_LIMIT)
        .enumerate()
        .map(|(i, track)| format!("`{}.` {}", i + 1, track.display_title(LIST_TITLE_LEN)))
        .collect();

    if queue.len() > UPCOMING_LIMIT {
        lines.push(format!("*...y {} más*", queue.len() - UPCOMING_LIMIT));
    }

    lines.join("\n")
}

fn duration_label(track: &Track) -> String {
    match track.duration() {
        Some(duration) => format_duration(duration),
        None => "🔴 En vivo".to_string(),
    }
}

/// Formatea una duración en formato legible
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
