use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::sources::StreamHandle;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SinkError {
    #[error("conexión de voz fallida: {0}")]
    Connect(String),
    #[error("no hay conexión de voz activa")]
    NotConnected,
    #[error("no se pudo reproducir: {0}")]
    Play(String),
    #[error("{0}")]
    Other(String),
}

/// An established voice connection for one guild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionHandle {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
}

/// Completion report for one `play` call.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackCompletion {
    pub play_id: u64,
    pub error: Option<String>,
}

/// Delivers the end of a track to the owning session's mailbox.
///
/// Sinks may call [`CompletionNotifier::notify`] more than once or from any
/// thread; the session only acts on the first report for the current play.
#[derive(Debug, Clone)]
pub struct CompletionNotifier {
    play_id: u64,
    mailbox: UnboundedSender<PlaybackCompletion>,
}

impl CompletionNotifier {
    pub fn new(play_id: u64, mailbox: UnboundedSender<PlaybackCompletion>) -> Self {
        Self { play_id, mailbox }
    }

    pub fn play_id(&self) -> u64 {
        self.play_id
    }

    pub fn notify(&self, error: Option<String>) {
        let completion = PlaybackCompletion {
            play_id: self.play_id,
            error,
        };
        if self.mailbox.send(completion).is_err() {
            debug!("📭 Sesión descartada, completion #{} ignorado", self.play_id);
        }
    }
}

/// Voice transport capability: joins channels, emits audio and reports
/// the end of each track through the notifier given to [`VoiceSink::play`].
#[async_trait]
pub trait VoiceSink: Send + Sync {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<ConnectionHandle, SinkError>;

    /// Starts emitting `stream`, replacing whatever the connection was playing.
    async fn play(
        &self,
        conn: &ConnectionHandle,
        stream: &StreamHandle,
        on_complete: CompletionNotifier,
    ) -> Result<(), SinkError>;

    /// Stops the current track. The sink still reports its completion.
    async fn stop(&self, conn: &ConnectionHandle) -> Result<(), SinkError>;
    async fn pause(&self, conn: &ConnectionHandle) -> Result<(), SinkError>;
    async fn resume(&self, conn: &ConnectionHandle) -> Result<(), SinkError>;
    async fn disconnect(&self, conn: &ConnectionHandle) -> Result<(), SinkError>;

    async fn is_connected(&self, conn: &ConnectionHandle) -> bool;
    async fn is_playing(&self, conn: &ConnectionHandle) -> bool;
    async fn is_paused(&self, conn: &ConnectionHandle) -> bool;

    /// Members in the connected channel, the bot included.
    async fn occupant_count(&self, conn: &ConnectionHandle) -> usize;
}
