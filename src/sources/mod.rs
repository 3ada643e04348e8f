//! # Sources Module
//!
//! Song references come in two flavours: a URL (single video, playlist or
//! mix) or free search text. A [`StreamResolver`] turns either into
//! [`SongDescriptor`]s, and later into a playable [`StreamHandle`] for the
//! entries that were only fetched flat.
//!
//! Both operations hit the network and may take seconds; the session calls
//! them without holding its lock.

pub mod youtube;

use async_trait::async_trait;
use serenity::model::id::UserId;
use std::time::Duration;
use thiserror::Error;

pub use youtube::YtDlpResolver;

/// Título usado cuando el extractor no devuelve uno
pub const UNKNOWN_TITLE: &str = "unknown title";

/// Resolves song references into descriptors and playable streams.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StreamResolver: Send + Sync {
    /// Resolves a URL or search text into one or more descriptors.
    ///
    /// A single-item URL or a search yields exactly one descriptor; a
    /// playlist yields one flat descriptor per entry.
    async fn resolve(
        &self,
        reference: &str,
        requested_by: UserId,
    ) -> Result<Vec<SongDescriptor>, ResolutionError>;

    /// Full per-item lookup for descriptors marked [`ResolutionStatus::NeedsStreamLookup`].
    async fn resolve_stream(&self, descriptor: &SongDescriptor)
        -> Result<StreamHandle, ResolutionError>;
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResolutionError {
    #[error("no se encontraron resultados para '{0}'")]
    NoResults(String),
    #[error("referencia inválida: {0}")]
    InvalidReference(String),
    #[error("el descriptor no tiene URL para buscar el stream")]
    MissingUrl,
    #[error("el extractor excedió el tiempo límite ({0:?})")]
    Timeout(Duration),
    #[error("error del extractor: {0}")]
    Extractor(String),
}

/// Whether a descriptor already carries everything needed to play it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStatus {
    Resolved,
    NeedsStreamLookup,
}

/// Playable stream locator handed to the voice sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHandle(String);

impl StreamHandle {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Metadata for one song. Immutable once built; re-resolution produces a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct SongDescriptor {
    title: String,
    url: Option<String>,
    duration: Option<Duration>,
    thumbnail: Option<String>,
    requested_by: UserId,
    status: ResolutionStatus,
    stream: Option<StreamHandle>,
}

impl SongDescriptor {
    /// Descriptor that still needs a stream lookup before it can play.
    pub fn flat(title: Option<String>, url: Option<String>, requested_by: UserId) -> Self {
        Self {
            title: title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
            url,
            duration: None,
            thumbnail: None,
            requested_by,
            status: ResolutionStatus::NeedsStreamLookup,
            stream: None,
        }
    }

    /// Descriptor with a stream attached, playable as is.
    pub fn resolved(
        title: Option<String>,
        url: Option<String>,
        stream: StreamHandle,
        requested_by: UserId,
    ) -> Self {
        Self {
            status: ResolutionStatus::Resolved,
            stream: Some(stream),
            ..Self::flat(title, url, requested_by)
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: String) -> Self {
        self.thumbnail = Some(thumbnail);
        self
    }

    // Getters
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }
    pub fn requested_by(&self) -> UserId {
        self.requested_by
    }
    pub fn status(&self) -> ResolutionStatus {
        self.status
    }
    pub fn stream(&self) -> Option<&StreamHandle> {
        self.stream.as_ref()
    }

    /// Texto que identifica la entrada en los reportes de error
    pub fn reference(&self) -> &str {
        self.url().unwrap_or(&self.title)
    }
}

/// Una referencia es URL si usa esquema http(s); todo lo demás es búsqueda
pub fn is_url(reference: &str) -> bool {
    let reference = reference.trim();
    reference.starts_with("http://") || reference.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_title_falls_back() {
        let user = UserId::new(7);
        let song = SongDescriptor::flat(None, Some("https://youtu.be/x".into()), user);
        assert_eq!(song.title(), UNKNOWN_TITLE);
        assert_eq!(song.status(), ResolutionStatus::NeedsStreamLookup);
        assert!(song.stream().is_none());

        let blank = SongDescriptor::flat(Some("   ".into()), None, user);
        assert_eq!(blank.title(), UNKNOWN_TITLE);
        assert_eq!(blank.reference(), UNKNOWN_TITLE);
    }

    #[test]
    fn test_resolved_descriptor_carries_stream() {
        let song = SongDescriptor::resolved(
            Some("Song".into()),
            Some("https://www.youtube.com/watch?v=abc".into()),
            StreamHandle::new("https://cdn.example/audio"),
            UserId::new(1),
        )
        .with_duration(Duration::from_secs(215));

        assert_eq!(song.status(), ResolutionStatus::Resolved);
        assert_eq!(song.stream().map(StreamHandle::as_str), Some("https://cdn.example/audio"));
        assert_eq!(song.duration(), Some(Duration::from_secs(215)));
        assert_eq!(song.reference(), "https://www.youtube.com/watch?v=abc");
    }

    #[test]
    fn test_url_detection() {
        assert!(is_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(is_url("  http://example.com/a.mp3"));
        assert!(!is_url("never gonna give you up"));
        assert!(!is_url("youtube.com/watch?v=x"));
    }
}
