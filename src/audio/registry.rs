use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::info;

use super::{
    session::{GuildEvent, PlaybackSession, SessionSettings, VoiceStateChange},
    sink::VoiceSink,
};
use crate::sources::StreamResolver;

/// Sesiones por guild que comparten resolver, sink y canal de eventos.
///
/// Se crean al primer uso y viven hasta que termina el proceso; `leave`
/// solo suelta la conexión de voz.
pub struct SessionRegistry {
    sessions: DashMap<GuildId, Arc<PlaybackSession>>,
    resolver: Arc<dyn StreamResolver>,
    sink: Arc<dyn VoiceSink>,
    events: UnboundedSender<GuildEvent>,
    settings: SessionSettings,
}

impl SessionRegistry {
    /// Crea el registro y devuelve el receptor de eventos de todas las guilds
    pub fn new(
        resolver: Arc<dyn StreamResolver>,
        sink: Arc<dyn VoiceSink>,
        settings: SessionSettings,
    ) -> (Self, UnboundedReceiver<GuildEvent>) {
        let (events, inbox) = mpsc::unbounded_channel();
        let registry = Self {
            sessions: DashMap::new(),
            resolver,
            sink,
            events,
            settings,
        };
        (registry, inbox)
    }

    pub fn get_or_create(&self, guild_id: GuildId) -> Arc<PlaybackSession> {
        self.sessions
            .entry(guild_id)
            .or_insert_with(|| {
                info!("🎛️ Nueva sesión de reproducción para guild {}", guild_id);
                PlaybackSession::new(
                    guild_id,
                    self.settings,
                    self.resolver.clone(),
                    self.sink.clone(),
                    self.events.clone(),
                )
            })
            .clone()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<PlaybackSession>> {
        self.sessions.get(&guild_id).map(|s| s.clone())
    }

    /// Reenvía un cambio de voz a la sesión de la guild, si existe
    pub async fn on_voice_state_changed(&self, guild_id: GuildId, change: VoiceStateChange) {
        if let Some(session) = self.get(guild_id) {
            session.on_voice_state_changed(change).await;
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.sessions.len()
    }
}
