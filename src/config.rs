use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Límite superior aceptado para `MAX_QUEUE_SIZE`
const QUEUE_SIZE_CEILING: usize = 1000;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Cola
    pub max_queue_size: usize,
    pub max_playlist_size: usize,

    // Tiempos
    pub idle_timeout: Duration,
    pub resolve_timeout: Duration,

    // yt-dlp
    pub ytdlp_path: String,
    pub cookies_file: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Construye la configuración a partir de una fuente de variables
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let var = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            // Discord
            discord_token: var("DISCORD_TOKEN").context("DISCORD_TOKEN no está definido")?,
            application_id: var("APPLICATION_ID")
                .context("APPLICATION_ID no está definido")?
                .parse()
                .context("APPLICATION_ID inválido")?,
            guild_id: var("GUILD_ID").and_then(|s| s.parse().ok()),

            // Cola
            max_queue_size: match var("MAX_QUEUE_SIZE") {
                Some(val) => val.parse().context("MAX_QUEUE_SIZE inválido")?,
                None => defaults.max_queue_size,
            },
            max_playlist_size: match var("MAX_PLAYLIST_SIZE") {
                Some(val) => val.parse().context("MAX_PLAYLIST_SIZE inválido")?,
                None => defaults.max_playlist_size,
            },

            // Tiempos (formato humantime: "60s", "2m", ...)
            idle_timeout: match var("IDLE_TIMEOUT") {
                Some(val) => humantime::parse_duration(&val).context("IDLE_TIMEOUT inválido")?,
                None => defaults.idle_timeout,
            },
            resolve_timeout: match var("RESOLVE_TIMEOUT") {
                Some(val) => humantime::parse_duration(&val).context("RESOLVE_TIMEOUT inválido")?,
                None => defaults.resolve_timeout,
            },

            // yt-dlp
            ytdlp_path: var("YTDLP_PATH").unwrap_or(defaults.ytdlp_path),
            cookies_file: var("COOKIES_FILE").map(PathBuf::from),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// - Queue and playlist limits must be greater than 0
    /// - The queue limit cannot exceed 1000 entries
    /// - Timeouts must be non-zero
    pub fn validate(&self) -> Result<()> {
        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.max_queue_size > QUEUE_SIZE_CEILING {
            anyhow::bail!(
                "Max queue size cannot exceed {}, got: {}",
                QUEUE_SIZE_CEILING,
                self.max_queue_size
            );
        }

        if self.max_playlist_size == 0 {
            anyhow::bail!("Max playlist size must be greater than 0");
        }

        if self.idle_timeout.is_zero() {
            anyhow::bail!("Idle timeout must be greater than 0");
        }

        if self.resolve_timeout.is_zero() {
            anyhow::bail!("Resolve timeout must be greater than 0");
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Never includes the Discord token.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {})\n  \
            Queue: {} max, {} per playlist\n  \
            Timeouts: idle {}, resolve {}\n  \
            yt-dlp: {} (cookies: {})",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            self.max_queue_size,
            self.max_playlist_size,
            humantime::format_duration(self.idle_timeout),
            humantime::format_duration(self.resolve_timeout),
            self.ytdlp_path,
            self.cookies_file
                .as_ref()
                .map_or("no".to_string(), |p| p.display().to_string()),
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,

            max_queue_size: 120,
            max_playlist_size: 100,

            idle_timeout: Duration::from_secs(60),
            resolve_timeout: Duration::from_secs(30),

            ytdlp_path: "yt-dlp".to_string(),
            cookies_file: None,
        }
    }
}
