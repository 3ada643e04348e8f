use async_trait::async_trait;
use dashmap::DashMap;
use serenity::{
    cache::Cache,
    model::id::{ChannelId, GuildId},
};
use songbird::{
    input::HttpRequest,
    tracks::{PlayMode, TrackHandle},
    Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::{sync::Arc, time::Duration};
use tracing::{debug, error, info};

use super::sink::{CompletionNotifier, ConnectionHandle, SinkError, VoiceSink};
use crate::sources::StreamHandle;

/// [`VoiceSink`] backed by songbird calls, one per guild.
pub struct SongbirdSink {
    manager: Arc<Songbird>,
    cache: Arc<Cache>,
    http: reqwest::Client,
    current_tracks: DashMap<GuildId, TrackHandle>,
}

impl SongbirdSink {
    pub fn new(manager: Arc<Songbird>, cache: Arc<Cache>) -> Self {
        // Sin timeout total: el stream dura lo que dure la canción
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|e| {
                error!("❌ Cliente HTTP personalizado no disponible: {}", e);
                reqwest::Client::new()
            });

        Self {
            manager,
            cache,
            http,
            current_tracks: DashMap::new(),
        }
    }

    fn track(&self, guild_id: GuildId) -> Option<TrackHandle> {
        self.current_tracks.get(&guild_id).map(|t| t.clone())
    }

    async fn play_mode(&self, guild_id: GuildId) -> Option<PlayMode> {
        let track = self.track(guild_id)?;
        track.get_info().await.ok().map(|info| info.playing)
    }
}

#[async_trait]
impl VoiceSink for SongbirdSink {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<ConnectionHandle, SinkError> {
        self.manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| SinkError::Connect(e.to_string()))?;

        info!("🔗 Llamada de voz establecida en guild {} canal {}", guild_id, channel_id);
        Ok(ConnectionHandle {
            guild_id,
            channel_id,
        })
    }

    async fn play(
        &self,
        conn: &ConnectionHandle,
        stream: &StreamHandle,
        on_complete: CompletionNotifier,
    ) -> Result<(), SinkError> {
        let call = self
            .manager
            .get(conn.guild_id)
            .ok_or(SinkError::NotConnected)?;

        let input = HttpRequest::new(self.http.clone(), stream.as_str().to_string());
        let track_handle = {
            let mut call = call.lock().await;
            call.stop();
            call.play_input(input.into())
        };

        track_handle
            .add_event(
                Event::Track(TrackEvent::End),
                TrackCompletion {
                    notifier: on_complete.clone(),
                    failed: false,
                },
            )
            .map_err(|e| SinkError::Play(format!("Error al agregar event handler: {}", e)))?;
        track_handle
            .add_event(
                Event::Track(TrackEvent::Error),
                TrackCompletion {
                    notifier: on_complete,
                    failed: true,
                },
            )
            .map_err(|e| SinkError::Play(format!("Error al agregar event handler: {}", e)))?;

        self.current_tracks.insert(conn.guild_id, track_handle);
        Ok(())
    }

    async fn stop(&self, conn: &ConnectionHandle) -> Result<(), SinkError> {
        if let Some((_, track)) = self.current_tracks.remove(&conn.guild_id) {
            // Una pista ya terminada no se puede detener; su fin ya fue reportado
            if let Err(e) = track.stop() {
                debug!("stop sobre pista terminada en guild {}: {}", conn.guild_id, e);
            }
        }
        Ok(())
    }

    async fn pause(&self, conn: &ConnectionHandle) -> Result<(), SinkError> {
        let track = self.track(conn.guild_id).ok_or(SinkError::NotConnected)?;
        track.pause().map_err(|e| SinkError::Other(e.to_string()))
    }

    async fn resume(&self, conn: &ConnectionHandle) -> Result<(), SinkError> {
        let track = self.track(conn.guild_id).ok_or(SinkError::NotConnected)?;
        track.play().map_err(|e| SinkError::Other(e.to_string()))
    }

    async fn disconnect(&self, conn: &ConnectionHandle) -> Result<(), SinkError> {
        self.current_tracks.remove(&conn.guild_id);
        self.manager
            .remove(conn.guild_id)
            .await
            .map_err(|e| SinkError::Other(e.to_string()))
    }

    async fn is_connected(&self, conn: &ConnectionHandle) -> bool {
        match self.manager.get(conn.guild_id) {
            Some(call) => call.lock().await.current_channel().is_some(),
            None => false,
        }
    }

    async fn is_playing(&self, conn: &ConnectionHandle) -> bool {
        matches!(self.play_mode(conn.guild_id).await, Some(PlayMode::Play))
    }

    async fn is_paused(&self, conn: &ConnectionHandle) -> bool {
        matches!(self.play_mode(conn.guild_id).await, Some(PlayMode::Pause))
    }

    async fn occupant_count(&self, conn: &ConnectionHandle) -> usize {
        let channel_id = conn.channel_id;
        self.cache
            .guild(conn.guild_id)
            .map(|guild| {
                guild
                    .voice_states
                    .values()
                    .filter(|state| state.channel_id == Some(channel_id))
                    .count()
            })
            .unwrap_or(0)
    }
}

/// Handler para cuando termina (o falla) una pista
struct TrackCompletion {
    notifier: CompletionNotifier,
    failed: bool,
}

#[async_trait]
impl VoiceEventHandler for TrackCompletion {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let error = if self.failed {
            let detail = match ctx {
                EventContext::Track(tracks) => tracks
                    .first()
                    .map(|(state, _)| format!("{:?}", state.playing)),
                _ => None,
            };
            Some(detail.unwrap_or_else(|| "error de pista desconocido".to_string()))
        } else {
            None
        };

        debug!("Pista #{} terminada (error: {:?})", self.notifier.play_id(), error);
        self.notifier.notify(error);
        None
    }
}
