use serenity::model::id::{ChannelId, GuildId, UserId};
use std::{
    sync::{Arc, Weak},
    time::Duration,
};
use tokio::sync::{
    mpsc::{self, UnboundedReceiver, UnboundedSender},
    Mutex,
};
use tracing::{debug, error, info, warn};

use super::{
    error::PlayerError,
    idle::IdleTimer,
    queue::{SongQueue, DEFAULT_CAPACITY},
    sink::{CompletionNotifier, ConnectionHandle, PlaybackCompletion, VoiceSink},
};
use crate::sources::{ResolutionStatus, SongDescriptor, StreamResolver};

/// Ventana de inactividad antes de la desconexión automática
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub queue_capacity: usize,
    pub idle_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_CAPACITY,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Venció la ventana de inactividad sin nada que sonar o sin oyentes
    Idle,
    /// La conexión de voz se perdió sin un `leave`
    ConnectionLost,
}

/// Resultados asíncronos que el bot anuncia en la guild
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    NowPlaying { song: SongDescriptor },
    ResolutionFailed { title: String, reference: String, reason: String },
    PlaybackFailed { title: String, reason: String },
    QueueFinished,
    Disconnected { reason: DisconnectReason },
}

#[derive(Debug, Clone, PartialEq)]
pub struct GuildEvent {
    pub guild_id: GuildId,
    pub event: SessionEvent,
}

/// Resultado de un lote encolado que agregó al menos una canción
#[derive(Debug, Clone, PartialEq)]
pub struct EnqueueOutcome {
    pub added: usize,
    pub first_title: Option<String>,
    pub rejected: Vec<SongDescriptor>,
}

/// El canal de voz de un miembro pasó de `before` a `after`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceStateChange {
    pub member: UserId,
    /// El miembro es el propio bot
    pub is_self: bool,
    pub before: Option<ChannelId>,
    pub after: Option<ChannelId>,
}

/// Copia de solo lectura de una sesión
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub guild_id: GuildId,
    pub state: PlaybackState,
    pub now_playing: Option<SongDescriptor>,
    pub pending: Vec<SongDescriptor>,
    pub channel_id: Option<ChannelId>,
    pub idle_armed: bool,
    pub capacity: usize,
}

impl SessionSnapshot {
    pub fn is_connected(&self) -> bool {
        self.channel_id.is_some()
    }

    #[cfg(test)]
    pub fn pending_titles(&self) -> Vec<&str> {
        self.pending.iter().map(SongDescriptor::title).collect()
    }
}

#[derive(Debug)]
struct SessionState {
    queue: SongQueue,
    current: Option<SongDescriptor>,
    playback: PlaybackState,
    connection: Option<ConnectionHandle>,
    // Cambia con cada conexión nueva o cierre; invalida avances en vuelo
    connection_epoch: u64,
    active_play: Option<u64>,
    next_play_id: u64,
    // Hay un avance en curso (fuera del lock, resolviendo)
    advancing: bool,
    idle: IdleTimer,
}

impl SessionState {
    fn new(capacity: usize) -> Self {
        Self {
            queue: SongQueue::new(capacity),
            current: None,
            playback: PlaybackState::Idle,
            connection: None,
            connection_epoch: 0,
            active_play: None,
            next_play_id: 0,
            advancing: false,
            idle: IdleTimer::new(),
        }
    }

    fn can_start(&self) -> bool {
        self.connection.is_some()
            && self.playback == PlaybackState::Idle
            && self.current.is_none()
            && !self.advancing
            && !self.queue.is_empty()
    }
}

/// Máquina de estados de reproducción de una guild.
///
/// Toda mutación ocurre bajo el mutex de la sesión. La resolución de streams
/// y la conexión de voz corren sin el lock; su resultado solo se aplica si la
/// época de conexión en la que empezaron sigue vigente. Los fines de pista
/// llegan por un buzón que drena una sola tarea, así que cada fin produce a
/// lo sumo un avance.
pub struct PlaybackSession {
    guild_id: GuildId,
    settings: SessionSettings,
    state: Mutex<SessionState>,
    resolver: Arc<dyn StreamResolver>,
    sink: Arc<dyn VoiceSink>,
    events: UnboundedSender<GuildEvent>,
    mailbox: UnboundedSender<PlaybackCompletion>,
    this: Weak<PlaybackSession>,
}

impl PlaybackSession {
    pub fn new(
        guild_id: GuildId,
        settings: SessionSettings,
        resolver: Arc<dyn StreamResolver>,
        sink: Arc<dyn VoiceSink>,
        events: UnboundedSender<GuildEvent>,
    ) -> Arc<Self> {
        let (mailbox, inbox) = mpsc::unbounded_channel();
        let session = Arc::new_cyclic(|this| Self {
            guild_id,
            settings,
            state: Mutex::new(SessionState::new(settings.queue_capacity)),
            resolver,
            sink,
            events,
            mailbox,
            this: this.clone(),
        });

        tokio::spawn(Self::drain_completions(Arc::downgrade(&session), inbox));
        debug!("🆕 Sesión creada para guild {}", guild_id);
        session
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    async fn drain_completions(session: Weak<Self>, mut inbox: UnboundedReceiver<PlaybackCompletion>) {
        while let Some(completion) = inbox.recv().await {
            let Some(session) = session.upgrade() else {
                break;
            };
            session.on_playback_complete(completion).await;
        }
    }

    fn emit(&self, event: SessionEvent) {
        let event = GuildEvent {
            guild_id: self.guild_id,
            event,
        };
        if self.events.send(event).is_err() {
            debug!("📭 Nadie escucha eventos de guild {}", self.guild_id);
        }
    }

    /// Conecta (o mueve) el bot al canal indicado
    pub async fn join(&self, channel_id: ChannelId) -> Result<ConnectionHandle, PlayerError> {
        {
            let state = self.state.lock().await;
            if let Some(conn) = &state.connection {
                if conn.channel_id == channel_id {
                    return Ok(conn.clone());
                }
            }
        }

        let conn = self
            .sink
            .connect(self.guild_id, channel_id)
            .await
            .map_err(PlayerError::Connect)?;

        let mut state = self.state.lock().await;
        if state.connection.is_none() {
            state.connection_epoch += 1;
        }
        state.connection = Some(conn.clone());
        info!("🔊 Conectado al canal {} en guild {}", channel_id, self.guild_id);

        let start = state.can_start();
        if start {
            state.advancing = true;
        }
        self.refresh_idle(&mut state).await;
        drop(state);

        if start {
            self.spawn_advance();
        }
        Ok(conn)
    }

    /// Conecta a `channel_id`, resuelve `reference` y encola el resultado
    pub async fn play(
        &self,
        channel_id: ChannelId,
        reference: &str,
        requested_by: UserId,
    ) -> Result<EnqueueOutcome, PlayerError> {
        self.join(channel_id).await?;

        // No desconectar mientras se resuelve la búsqueda
        self.state.lock().await.idle.disarm();

        match self.resolver.resolve(reference, requested_by).await {
            Ok(songs) => self.enqueue(songs).await,
            Err(source) => {
                warn!("❌ No se pudo resolver '{}' en guild {}: {}", reference, self.guild_id, source);
                let mut state = self.state.lock().await;
                self.refresh_idle(&mut state).await;
                Err(PlayerError::Resolution {
                    reference: reference.to_string(),
                    source,
                })
            }
        }
    }

    /// Agrega canciones en orden. Las que exceden la capacidad se devuelven;
    /// si no cabe ninguna, falla con [`PlayerError::QueueFull`].
    pub async fn enqueue(&self, songs: Vec<SongDescriptor>) -> Result<EnqueueOutcome, PlayerError> {
        let mut state = self.state.lock().await;

        let offered = songs.len();
        let first_title = songs.first().map(|s| s.title().to_string());
        let rejected = state.queue.extend(songs);
        let added = offered - rejected.len();

        if added == 0 && !rejected.is_empty() {
            warn!("🚫 Cola llena en guild {}", self.guild_id);
            self.refresh_idle(&mut state).await;
            return Err(PlayerError::QueueFull {
                capacity: state.queue.capacity(),
                rejected,
            });
        }

        let start = state.can_start();
        if start {
            state.advancing = true;
        }
        self.refresh_idle(&mut state).await;
        drop(state);

        if start {
            self.spawn_advance();
        }

        Ok(EnqueueOutcome {
            added,
            first_title,
            rejected,
        })
    }

    fn spawn_advance(&self) {
        match self.this.upgrade() {
            Some(session) => {
                tokio::spawn(async move { session.advance().await });
            }
            None => error!("Sesión de guild {} liberada antes de avanzar", self.guild_id),
        }
    }

    /// Saca entradas hasta que una empiece a sonar o la cola se vacíe.
    /// Cada vuelta consume una entrada.
    async fn advance(&self) {
        loop {
            let (song, epoch) = {
                let mut state = self.state.lock().await;
                if state.connection.is_none() {
                    state.advancing = false;
                    state.current = None;
                    state.playback = PlaybackState::Idle;
                    return;
                }
                match state.queue.pop() {
                    Some(song) => (song, state.connection_epoch),
                    None => {
                        state.advancing = false;
                        state.current = None;
                        state.playback = PlaybackState::Idle;
                        info!("📭 Cola vacía en guild {}", self.guild_id);
                        self.emit(SessionEvent::QueueFinished);
                        self.refresh_idle(&mut state).await;
                        return;
                    }
                }
            };

            let stream = match (song.status(), song.stream()) {
                (ResolutionStatus::Resolved, Some(stream)) => Ok(stream.clone()),
                _ => self.resolver.resolve_stream(&song).await,
            };
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("⏭️ Saltando '{}' en guild {}: {}", song.title(), self.guild_id, e);
                    self.emit(SessionEvent::ResolutionFailed {
                        title: song.title().to_string(),
                        reference: song.reference().to_string(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let mut state = self.state.lock().await;
            if state.connection_epoch != epoch {
                debug!("🔌 La conexión cambió mientras se resolvía '{}', descartado", song.title());
                continue;
            }
            let Some(conn) = state.connection.clone() else {
                continue;
            };

            state.next_play_id += 1;
            let play_id = state.next_play_id;
            let notifier = CompletionNotifier::new(play_id, self.mailbox.clone());

            match self.sink.play(&conn, &stream, notifier).await {
                Ok(()) => {
                    info!("🎵 Reproduciendo en guild {}: {}", self.guild_id, song.title());
                    state.current = Some(song.clone());
                    state.playback = PlaybackState::Playing;
                    state.active_play = Some(play_id);
                    state.advancing = false;
                    self.refresh_idle(&mut state).await;
                    self.emit(SessionEvent::NowPlaying { song });
                    return;
                }
                Err(e) => {
                    error!("❌ Error al reproducir '{}' en guild {}: {}", song.title(), self.guild_id, e);
                    self.emit(SessionEvent::PlaybackFailed {
                        title: song.title().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    async fn on_playback_complete(&self, completion: PlaybackCompletion) {
        let mut state = self.state.lock().await;
        if state.active_play != Some(completion.play_id) {
            debug!("🔁 Fin de pista #{} obsoleto en guild {}", completion.play_id, self.guild_id);
            return;
        }

        state.active_play = None;
        state.playback = PlaybackState::Idle;
        let finished = state.current.take();

        if let Some(reason) = completion.error {
            let title = finished.as_ref().map(|s| s.title().to_string()).unwrap_or_default();
            warn!("⚠️ Error durante la reproducción en guild {}: {}", self.guild_id, reason);
            self.emit(SessionEvent::PlaybackFailed { title, reason });
        }

        let connected = match &state.connection {
            Some(conn) => self.sink.is_connected(conn).await,
            None => false,
        };
        if !connected {
            if self.teardown(&mut state).is_some() {
                warn!("🔌 Conexión de voz perdida en guild {}", self.guild_id);
                self.emit(SessionEvent::Disconnected {
                    reason: DisconnectReason::ConnectionLost,
                });
            }
            return;
        }

        state.advancing = true;
        drop(state);
        self.advance().await;
    }

    /// Detiene la pista actual; su fin de pista avanza la cola
    pub async fn skip(&self) -> Result<Option<SongDescriptor>, PlayerError> {
        let state = self.state.lock().await;
        if state.playback == PlaybackState::Idle {
            return Err(PlayerError::NothingPlaying);
        }
        let conn = state.connection.clone().ok_or(PlayerError::NothingPlaying)?;

        // La pista ya terminó y su fin está en camino: no hay nada que saltar
        if !self.sink.is_playing(&conn).await && !self.sink.is_paused(&conn).await {
            debug!("⏭️ Skip ignorado en guild {}: la pista ya terminó", self.guild_id);
            return Err(PlayerError::NothingPlaying);
        }

        self.sink.stop(&conn).await?;
        info!("⏭️ Saltado en guild {}", self.guild_id);
        Ok(state.current.clone())
    }

    pub async fn pause(&self) -> Result<(), PlayerError> {
        let mut state = self.state.lock().await;
        if state.playback != PlaybackState::Playing {
            return Err(PlayerError::InvalidState);
        }
        let conn = state.connection.clone().ok_or(PlayerError::NotConnected)?;

        self.sink.pause(&conn).await?;
        state.playback = PlaybackState::Paused;
        info!("⏸️ Reproducción pausada en guild {}", self.guild_id);
        self.refresh_idle(&mut state).await;
        Ok(())
    }

    pub async fn resume(&self) -> Result<(), PlayerError> {
        let mut state = self.state.lock().await;
        if state.playback != PlaybackState::Paused {
            return Err(PlayerError::InvalidState);
        }
        let conn = state.connection.clone().ok_or(PlayerError::NotConnected)?;

        self.sink.resume(&conn).await?;
        state.playback = PlaybackState::Playing;
        info!("▶️ Reproducción reanudada en guild {}", self.guild_id);
        self.refresh_idle(&mut state).await;
        Ok(())
    }

    /// Vacía la cola pendiente; la canción actual sigue sonando
    pub async fn clear(&self) -> usize {
        let mut state = self.state.lock().await;
        let removed = state.queue.len();
        state.queue.clear();
        self.refresh_idle(&mut state).await;
        removed
    }

    /// Quita la canción pendiente en la posición `index` (desde 1, sin contar la actual)
    pub async fn remove(&self, index: usize) -> Result<SongDescriptor, PlayerError> {
        let mut state = self.state.lock().await;
        let len = state.queue.len();
        if index == 0 || index > len {
            return Err(PlayerError::IndexOutOfRange { index, len });
        }

        let removed = state
            .queue
            .remove(index)
            .ok_or(PlayerError::IndexOutOfRange { index, len })?;
        self.refresh_idle(&mut state).await;
        Ok(removed)
    }

    /// Detiene la reproducción, vacía la cola y suelta la conexión de voz.
    /// La sesión sigue registrada.
    pub async fn leave(&self) -> Result<(), PlayerError> {
        let mut state = self.state.lock().await;
        let conn = self.teardown(&mut state).ok_or(PlayerError::NotConnected)?;
        self.release(&conn).await;
        info!("👋 Desconectado del canal de voz en guild {}", self.guild_id);
        Ok(())
    }

    /// Aplica un cambio de estado de voz a la supervisión de inactividad
    pub async fn on_voice_state_changed(&self, change: VoiceStateChange) {
        let mut state = self.state.lock().await;
        let Some(conn) = state.connection.clone() else {
            return;
        };

        if change.is_self {
            match change.after {
                None => {
                    self.teardown(&mut state);
                    self.release(&conn).await;
                    warn!("🔌 Bot desconectado externamente en guild {}", self.guild_id);
                    self.emit(SessionEvent::Disconnected {
                        reason: DisconnectReason::ConnectionLost,
                    });
                    return;
                }
                Some(channel_id) if channel_id != conn.channel_id => {
                    info!("🚚 Bot movido al canal {} en guild {}", channel_id, self.guild_id);
                    state.connection = Some(ConnectionHandle { channel_id, ..conn });
                }
                Some(_) => {}
            }
        } else if change.before != Some(conn.channel_id) && change.after != Some(conn.channel_id) {
            return;
        }

        self.refresh_idle(&mut state).await;
    }

    pub async fn now_playing(&self) -> Option<(SongDescriptor, PlaybackState)> {
        let state = self.state.lock().await;
        state.current.clone().map(|song| (song, state.playback))
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock().await;
        SessionSnapshot {
            guild_id: self.guild_id,
            state: state.playback,
            now_playing: state.current.clone(),
            pending: state.queue.iter().cloned().collect(),
            channel_id: state.connection.as_ref().map(|c| c.channel_id),
            idle_armed: state.idle.is_armed(),
            capacity: state.queue.capacity(),
        }
    }

    /// Reinicia todo lo ligado a la conexión y la devuelve para liberarla
    fn teardown(&self, state: &mut SessionState) -> Option<ConnectionHandle> {
        state.queue.clear();
        state.current = None;
        state.playback = PlaybackState::Idle;
        state.active_play = None;
        state.idle.disarm();
        let conn = state.connection.take();
        if conn.is_some() {
            state.connection_epoch += 1;
        }
        conn
    }

    async fn release(&self, conn: &ConnectionHandle) {
        if let Err(e) = self.sink.stop(conn).await {
            debug!("stop al desconectar guild {}: {}", self.guild_id, e);
        }
        if let Err(e) = self.sink.disconnect(conn).await {
            warn!("⚠️ Error al desconectar guild {}: {}", self.guild_id, e);
        }
    }

    async fn idle_condition(&self, state: &SessionState) -> bool {
        let Some(conn) = &state.connection else {
            return false;
        };
        let nothing_audible = state.queue.is_empty()
            && !state.advancing
            && state.playback != PlaybackState::Playing;

        nothing_audible || self.sink.occupant_count(conn).await <= 1
    }

    /// Programa la auto-desconexión si la sesión está inactiva; si no, la cancela.
    /// Cada nueva evaluación inactiva reinicia la ventana completa.
    async fn refresh_idle(&self, state: &mut SessionState) {
        if self.idle_condition(state).await {
            info!(
                "🚪 Programando auto-desconexión en {:?} para guild {}",
                self.settings.idle_timeout, self.guild_id
            );
            let session = self.this.clone();
            state.idle.arm(self.settings.idle_timeout, move |token| async move {
                if let Some(session) = session.upgrade() {
                    session.on_idle_timeout(token).await;
                }
            });
        } else if state.idle.disarm() {
            debug!("⏲️ Auto-desconexión cancelada en guild {}", self.guild_id);
        }
    }

    async fn on_idle_timeout(&self, token: u64) {
        let mut state = self.state.lock().await;
        if !state.idle.consume(token) {
            debug!("⏲️ Timer #{} obsoleto en guild {}", token, self.guild_id);
            return;
        }
        if !self.idle_condition(&state).await {
            debug!("⏲️ Guild {} ya no está inactiva, se mantiene la conexión", self.guild_id);
            return;
        }

        if let Some(conn) = self.teardown(&mut state) {
            self.release(&conn).await;
            info!("💤 Desconectado por inactividad en guild {}", self.guild_id);
            self.emit(SessionEvent::Disconnected {
                reason: DisconnectReason::Idle,
            });
        }
    }
}
