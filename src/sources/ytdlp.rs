use async_process::{Command, Output};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serenity::model::id::UserId;
use std::{path::PathBuf, sync::LazyLock, time::Duration};
use tokio::{sync::Semaphore, time::timeout};
use tracing::{debug, info, warn};

use super::{ResolveError, Resolved, TrackResolver};
use crate::{audio::track::Track, config::Config};

static URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://\S+$").expect("regex de URL válida"));

/// Mensajes de yt-dlp que indican una pista inaccesible (no un fallo del proceso)
const UNAVAILABLE_MARKERS: &[&str] = &[
    "video unavailable",
    "private video",
    "available in your country",
    "sign in to confirm",
    "members-only",
    "has been removed",
    "copyright",
];

/// Entrada de `--dump-json`, tanto completa como de playlist plana
#[derive(Debug, Deserialize)]
struct YtDlpEntry {
    id: Option<String>,
    title: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
    thumbnail: Option<String>,
    thumbnails: Option<Vec<Thumbnail>>,
    duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

/// Resolver basado en el binario yt-dlp
pub struct YtDlpResolver {
    binary: String,
    cookies: Option<PathBuf>,
    max_playlist_size: usize,
    timeout: Duration,
    // Limitar procesos concurrentes para evitar rate limiting
    permits: Semaphore,
}

impl YtDlpResolver {
    pub fn new(config: &Config) -> Self {
        Self {
            binary: config.ytdlp_path.clone(),
            cookies: config.cookies_file.clone(),
            max_playlist_size: config.max_playlist_size,
            timeout: config.resolve_timeout,
            permits: Semaphore::new(3),
        }
    }

    pub fn is_url(query: &str) -> bool {
        URL_REGEX.is_match(query)
    }

    /// Versión instalada de yt-dlp (health check)
    pub async fn version(&self) -> Result<String, ResolveError> {
        let output = self.run(vec!["--version".to_string()]).await?;
        if !output.status.success() {
            return Err(classify_failure(&String::from_utf8_lossy(&output.stderr), &self.binary));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn run(&self, mut args: Vec<String>) -> Result<Output, ResolveError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| ResolveError::Process(e.to_string()))?;

        if let Some(cookies) = &self.cookies {
            args.insert(0, cookies.display().to_string());
            args.insert(0, "--cookies".to_string());
        }

        debug!("Ejecutando {} {:?}", self.binary, args);

        let mut command = Command::new(&self.binary);
        command.args(&args).kill_on_drop(true);

        match timeout(self.timeout, command.output()).await {
            Ok(output) => Ok(output?),
            Err(_) => Err(ResolveError::Timeout),
        }
    }
}

#[async_trait]
impl TrackResolver for YtDlpResolver {
    async fn resolve(&self, query: &str, requested_by: UserId) -> Result<Resolved, ResolveError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ResolveError::NotFound(String::new()));
        }

        let args = if Self::is_url(query) {
            info!("📋 Expandiendo URL: {}", query);
            vec![
                "--flat-playlist".to_string(),
                "--dump-json".to_string(),
                "--ignore-errors".to_string(),
                "--playlist-end".to_string(),
                self.max_playlist_size.to_string(),
                "--no-warnings".to_string(),
                query.to_string(),
            ]
        } else {
            info!("🔍 Buscando: {}", query);
            vec![
                "--no-playlist".to_string(),
                "--dump-json".to_string(),
                "--no-warnings".to_string(),
                format!("ytsearch1:{}", query),
            ]
        };

        let output = self.run(args).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        // Con --ignore-errors el código de salida puede fallar aunque haya entradas válidas
        if !output.status.success() && stdout.trim().is_empty() {
            return Err(classify_failure(&String::from_utf8_lossy(&output.stderr), query));
        }

        let resolved = parse_entries(&stdout, requested_by);
        if resolved.tracks.is_empty() && resolved.unavailable == 0 {
            return Err(ResolveError::NotFound(query.to_string()));
        }

        info!(
            "✅ {} pistas resueltas ({} no disponibles)",
            resolved.tracks.len(),
            resolved.unavailable
        );
        Ok(resolved)
    }

    async fn resolve_stream(&self, source: &str) -> Result<String, ResolveError> {
        debug!("🎵 Obteniendo URL de stream para: {}", source);

        let output = self
            .run(vec![
                "--no-playlist".to_string(),
                "-f".to_string(),
                "bestaudio/best".to_string(),
                "--get-url".to_string(),
                "--no-warnings".to_string(),
                source.to_string(),
            ])
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("yt-dlp falló para {}: {}", source, stderr.trim());
            return Err(classify_failure(&stderr, source));
        }

        String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ResolveError::Unavailable(source.to_string()))
    }
}

/// Convierte la salida línea a línea de `--dump-json` en pistas
fn parse_entries(stdout: &str, requested_by: UserId) -> Resolved {
    let mut resolved = Resolved::default();

    for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
        let track = serde_json::from_str::<YtDlpEntry>(line)
            .ok()
            .and_then(|entry| entry_to_track(entry, requested_by));

        match track {
            Some(track) => resolved.tracks.push(track),
            None => resolved.unavailable += 1,
        }
    }

    resolved
}

fn entry_to_track(entry: YtDlpEntry, requested_by: UserId) -> Option<Track> {
    let title = entry.title.unwrap_or_else(|| "Desconocido".to_string());
    if title.starts_with("[Private") || title.starts_with("[Deleted") {
        return None;
    }

    let source = entry
        .webpage_url
        .or_else(|| entry.url.filter(|u| YtDlpResolver::is_url(u)))
        .or_else(|| {
            entry
                .id
                .map(|id| format!("https://www.youtube.com/watch?v={}", id))
        })?;

    let mut track = Track::new(title, source, requested_by);

    let thumbnail = entry.thumbnail.or_else(|| {
        entry
            .thumbnails
            .and_then(|thumbs| thumbs.into_iter().last().map(|t| t.url))
    });
    if let Some(thumbnail) = thumbnail {
        track = track.with_thumbnail(thumbnail);
    }

    if let Some(secs) = entry.duration.filter(|d| d.is_finite() && *d > 0.0) {
        track = track.with_duration(Duration::from_secs_f64(secs));
    }

    Some(track)
}

fn classify_failure(stderr: &str, source: &str) -> ResolveError {
    let lower = stderr.to_lowercase();
    if UNAVAILABLE_MARKERS.iter().any(|m| lower.contains(m)) {
        return ResolveError::Unavailable(source.to_string());
    }

    let reason = stderr
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("salida vacía");
    ResolveError::Process(reason.to_string())
}
