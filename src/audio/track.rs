use serenity::model::id::UserId;
use std::time::Duration;

/// Longitud máxima de un título en listas y embeds
pub const MAX_TITLE_LEN: usize = 100;

/// Una pista reproducible. Inmutable una vez creada por el resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    title: String,
    source: String,
    thumbnail: Option<String>,
    duration: Option<Duration>,
    requested_by: UserId,
}

impl Track {
    pub fn new(title: impl Into<String>, source: impl Into<String>, requested_by: UserId) -> Self {
        Self {
            title: title.into(),
            source: source.into(),
            thumbnail: None,
            duration: None,
            requested_by,
        }
    }

    pub fn with_thumbnail(mut self, thumbnail: String) -> Self {
        self.thumbnail = Some(thumbnail);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    // Getters
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn source(&self) -> &str {
        &self.source
    }
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }
    pub fn requested_by(&self) -> UserId {
        self.requested_by
    }

    /// Título recortado para mostrar en la UI
    pub fn display_title(&self, max_len: usize) -> String {
        truncate_title(&self.title, max_len)
    }
}

/// Recorta un título a `max_len` caracteres, terminando en "..." si se cortó.
pub fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        return title.to_string();
    }

    let keep = max_len.saturating_sub(3);
    let mut short: String = title.chars().take(keep).collect();
    short.push_str("...");
    short
}
