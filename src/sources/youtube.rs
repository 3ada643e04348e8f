use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use serenity::model::id::UserId;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{is_url, ResolutionError, SongDescriptor, StreamHandle, StreamResolver};
use crate::config::Config;

/// Procesos yt-dlp simultáneos permitidos
const MAX_CONCURRENT_EXTRACTIONS: usize = 3;

/// Resolver backed by the `yt-dlp` command line extractor.
pub struct YtDlpResolver {
    binary: String,
    playlist_limit: usize,
    timeout: Duration,
    // Limitar procesos concurrentes para evitar rate limiting
    rate_limiter: Semaphore,
}

/// Información extraída de yt-dlp (`--dump-single-json`)
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: Option<String>,
    webpage_url: Option<String>,
    url: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    #[serde(default)]
    entries: Option<Vec<Option<YtDlpInfo>>>,
}

impl YtDlpInfo {
    fn page_url(&self) -> Option<String> {
        self.webpage_url.clone().or_else(|| self.url.clone())
    }

    fn decorate(&self, mut song: SongDescriptor) -> SongDescriptor {
        if let Some(duration) = self.duration.filter(|d| d.is_finite() && *d >= 0.0) {
            song = song.with_duration(Duration::from_secs(duration as u64));
        }
        if let Some(thumbnail) = &self.thumbnail {
            song = song.with_thumbnail(thumbnail.clone());
        }
        song
    }

    /// Entrada extraída por completo: trae la URL del stream si yt-dlp la eligió
    fn into_full(self, requested_by: UserId) -> Option<SongDescriptor> {
        let song = match (&self.url, &self.webpage_url) {
            (Some(stream), page) => SongDescriptor::resolved(
                self.title.clone(),
                page.clone(),
                StreamHandle::new(stream.clone()),
                requested_by,
            ),
            (None, Some(page)) => {
                SongDescriptor::flat(self.title.clone(), Some(page.clone()), requested_by)
            }
            (None, None) => return None,
        };
        Some(self.decorate(song))
    }

    /// Entrada de playlist en modo plano: solo metadata barata
    fn into_flat(self, requested_by: UserId) -> Option<SongDescriptor> {
        let page = self.page_url()?;
        let song = SongDescriptor::flat(self.title.clone(), Some(page), requested_by);
        Some(self.decorate(song))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lookup {
    Url,
    Search,
}

impl YtDlpResolver {
    pub fn new(binary: impl Into<String>, playlist_limit: usize, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            playlist_limit,
            timeout,
            rate_limiter: Semaphore::new(MAX_CONCURRENT_EXTRACTIONS),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.ytdlp_path.clone(),
            config.max_playlist_size,
            Duration::from_secs(config.resolve_timeout_secs),
        )
    }

    /// Ejecuta yt-dlp con límite de concurrencia y de tiempo
    async fn run(&self, args: &[&str]) -> Result<String, ResolutionError> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| ResolutionError::Extractor(e.to_string()))?;

        debug!("🔧 {} {}", self.binary, args.join(" "));

        let mut command = Command::new(&self.binary);
        command.args(args).kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| ResolutionError::Timeout(self.timeout))?
            .map_err(|e| ResolutionError::Extractor(format!("no se pudo ejecutar yt-dlp: {e}")))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(ResolutionError::Extractor(error.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Convierte la salida JSON de yt-dlp en descriptores
fn parse_extraction(
    json: &str,
    reference: &str,
    lookup: Lookup,
    requested_by: UserId,
) -> Result<Vec<SongDescriptor>, ResolutionError> {
    let info: YtDlpInfo = serde_json::from_str(json)
        .map_err(|e| ResolutionError::Extractor(format!("respuesta de yt-dlp inválida: {e}")))?;

    let songs: Vec<SongDescriptor> = match (info.entries, lookup) {
        // Búsqueda: solo el mejor resultado, extraído por completo
        (Some(entries), Lookup::Search) => entries
            .into_iter()
            .flatten()
            .find_map(|entry| entry.into_full(requested_by))
            .into_iter()
            .collect(),
        (Some(entries), Lookup::Url) => entries
            .into_iter()
            .flatten()
            .filter_map(|entry| entry.into_flat(requested_by))
            .collect(),
        (None, _) => {
            let single = YtDlpInfo { entries: None, ..info };
            single.into_full(requested_by).into_iter().collect()
        }
    };

    if songs.is_empty() {
        return Err(ResolutionError::NoResults(reference.to_string()));
    }
    Ok(songs)
}

#[async_trait]
impl StreamResolver for YtDlpResolver {
    async fn resolve(
        &self,
        reference: &str,
        requested_by: UserId,
    ) -> Result<Vec<SongDescriptor>, ResolutionError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(ResolutionError::InvalidReference(reference.to_string()));
        }

        let playlist_end = self.playlist_limit.to_string();
        let (lookup, target) = if is_url(reference) {
            url::Url::parse(reference)
                .map_err(|e| ResolutionError::InvalidReference(format!("{reference}: {e}")))?;
            (Lookup::Url, reference.to_string())
        } else {
            (Lookup::Search, format!("ytsearch1:{reference}"))
        };

        info!("🔍 Resolviendo: {}", reference);

        let mut args = vec![
            "--dump-single-json",
            "--no-warnings",
            "-f",
            "bestaudio/best",
        ];
        match lookup {
            Lookup::Url => args.extend(["--flat-playlist", "--playlist-end", playlist_end.as_str()]),
            Lookup::Search => args.push("--no-playlist"),
        }
        args.push(&target);

        let stdout = self.run(&args).await?;
        let songs = parse_extraction(&stdout, reference, lookup, requested_by)?;

        info!("✅ {} entrada(s) resueltas para: {}", songs.len(), reference);
        Ok(songs)
    }

    async fn resolve_stream(
        &self,
        descriptor: &SongDescriptor,
    ) -> Result<StreamHandle, ResolutionError> {
        if let Some(stream) = descriptor.stream() {
            return Ok(stream.clone());
        }
        let page = descriptor.url().ok_or(ResolutionError::MissingUrl)?;

        debug!("🎵 Obteniendo URL de stream para: {}", page);

        let stdout = self
            .run(&["--no-playlist", "-f", "bestaudio/best", "--get-url", "--no-warnings", page])
            .await?;

        match stdout.lines().map(str::trim).find(|line| !line.is_empty()) {
            Some(stream_url) => Ok(StreamHandle::new(stream_url)),
            None => {
                warn!("⚠️ yt-dlp no devolvió URL de stream para: {}", page);
                Err(ResolutionError::NoResults(page.to_string()))
            }
        }
    }
}
