//! Scripted doubles shared by the audio tests.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
    time::Duration,
};
use tokio::sync::{mpsc::UnboundedReceiver, Notify};

use super::{
    session::{GuildEvent, PlaybackSession, SessionEvent, SessionSnapshot},
    sink::{CompletionNotifier, ConnectionHandle, SinkError, VoiceSink},
};
use crate::sources::{ResolutionError, SongDescriptor, StreamHandle, StreamResolver};

pub fn guild(id: u64) -> GuildId {
    GuildId::new(id)
}

pub fn channel(id: u64) -> ChannelId {
    ChannelId::new(id)
}

/// Canción ya resuelta, lista para sonar
pub fn song(n: usize) -> SongDescriptor {
    SongDescriptor::resolved(
        Some(format!("song {n}")),
        Some(format!("https://www.youtube.com/watch?v={n}")),
        StreamHandle::new(format!("https://cdn/{n}")),
        UserId::new(1),
    )
}

/// Entrada de playlist que necesita búsqueda de stream
pub fn flat_song(n: usize) -> SongDescriptor {
    SongDescriptor::flat(
        Some(format!("flat {n}")),
        Some(format!("https://www.youtube.com/watch?v={n}")),
        UserId::new(1),
    )
}

pub fn drain(events: &mut UnboundedReceiver<GuildEvent>) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event.event);
    }
    out
}

/// Polls the session until `pred` holds, giving spawned tasks time to run.
pub async fn wait_until(
    session: &PlaybackSession,
    pred: impl Fn(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    let mut last = session.snapshot().await;
    for _ in 0..1000 {
        if pred(&last) {
            return last;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
        last = session.snapshot().await;
    }
    panic!("la sesión nunca alcanzó el estado esperado: {last:#?}");
}

#[derive(Debug)]
struct Line {
    connected: bool,
    channel: Option<ChannelId>,
    // Ocupantes por canal; los canales sin valor tienen 2
    occupants: HashMap<ChannelId, usize>,
    played: Vec<String>,
    current: Option<CompletionNotifier>,
    paused: bool,
    disconnects: usize,
}

impl Default for Line {
    fn default() -> Self {
        Self {
            connected: false,
            channel: None,
            occupants: HashMap::new(),
            played: Vec::new(),
            current: None,
            paused: false,
            disconnects: 0,
        }
    }
}

/// In-memory voice sink. `stop` reports completion right away, like a real
/// transport ending the track.
#[derive(Debug, Default)]
pub struct FakeSink {
    lines: Mutex<HashMap<GuildId, Line>>,
    refused: Mutex<HashSet<String>>,
    fail_connect: AtomicBool,
}

impl FakeSink {
    fn with_line<T>(&self, guild_id: GuildId, f: impl FnOnce(&mut Line) -> T) -> T {
        let mut lines = self.lines.lock().unwrap();
        f(lines.entry(guild_id).or_default())
    }

    pub fn fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn refuse_stream(&self, url: &str) {
        self.refused.lock().unwrap().insert(url.to_string());
    }

    pub fn played(&self, guild_id: GuildId) -> Vec<String> {
        self.with_line(guild_id, |line| line.played.clone())
    }

    pub fn disconnects(&self, guild_id: GuildId) -> usize {
        self.with_line(guild_id, |line| line.disconnects)
    }

    pub fn is_paused_now(&self, guild_id: GuildId) -> bool {
        self.with_line(guild_id, |line| line.paused)
    }

    pub fn set_occupants(&self, guild_id: GuildId, channel_id: ChannelId, occupants: usize) {
        self.with_line(guild_id, |line| {
            line.occupants.insert(channel_id, occupants);
        });
    }

    pub fn drop_connection(&self, guild_id: GuildId) {
        self.with_line(guild_id, |line| line.connected = false);
    }

    pub fn current_notifier(&self, guild_id: GuildId) -> Option<CompletionNotifier> {
        self.with_line(guild_id, |line| line.current.clone())
    }

    /// Termina la pista sin reportarlo todavía; el aviso queda en manos del test
    pub fn end_unreported(&self, guild_id: GuildId) -> Option<CompletionNotifier> {
        self.with_line(guild_id, |line| line.current.take())
    }

    /// Termina la pista actual como lo haría el transporte
    pub fn finish(&self, guild_id: GuildId, error: Option<String>) {
        if let Some(notifier) = self.with_line(guild_id, |line| line.current.take()) {
            notifier.notify(error);
        }
    }
}

#[async_trait]
impl VoiceSink for FakeSink {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<ConnectionHandle, SinkError> {
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(SinkError::Connect("handshake rechazado".into()));
        }
        self.with_line(guild_id, |line| {
            line.connected = true;
            line.channel = Some(channel_id);
        });
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
        if self.refused.lock().unwrap().contains(stream.as_str()) {
            return Err(SinkError::Play(format!("formato no soportado: {}", stream.as_str())));
        }
        self.with_line(conn.guild_id, |line| {
            line.played.push(stream.as_str().to_string());
            line.current = Some(on_complete);
            line.paused = false;
        });
        Ok(())
    }

    async fn stop(&self, conn: &ConnectionHandle) -> Result<(), SinkError> {
        self.finish(conn.guild_id, None);
        Ok(())
    }

    async fn pause(&self, conn: &ConnectionHandle) -> Result<(), SinkError> {
        self.with_line(conn.guild_id, |line| line.paused = true);
        Ok(())
    }

    async fn resume(&self, conn: &ConnectionHandle) -> Result<(), SinkError> {
        self.with_line(conn.guild_id, |line| line.paused = false);
        Ok(())
    }

    async fn disconnect(&self, conn: &ConnectionHandle) -> Result<(), SinkError> {
        self.with_line(conn.guild_id, |line| {
            line.connected = false;
            line.channel = None;
            line.disconnects += 1;
        });
        Ok(())
    }

    async fn is_connected(&self, conn: &ConnectionHandle) -> bool {
        self.with_line(conn.guild_id, |line| line.connected)
    }

    async fn is_playing(&self, conn: &ConnectionHandle) -> bool {
        self.with_line(conn.guild_id, |line| line.current.is_some() && !line.paused)
    }

    async fn is_paused(&self, conn: &ConnectionHandle) -> bool {
        self.with_line(conn.guild_id, |line| line.paused)
    }

    async fn occupant_count(&self, conn: &ConnectionHandle) -> usize {
        self.with_line(conn.guild_id, |line| {
            line.occupants.get(&conn.channel_id).copied().unwrap_or(2)
        })
    }
}

/// Resolver whose stream lookups block until [`GatedResolver::release`].
#[derive(Debug, Default)]
pub struct GatedResolver {
    pending: Notify,
    gate: Notify,
    released: AtomicBool,
}

impl GatedResolver {
    /// Espera a que haya una búsqueda de stream bloqueada
    pub async fn wait_for_pending(&self) {
        self.pending.notified().await;
    }

    pub fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
        self.gate.notify_one();
    }
}

#[async_trait]
impl StreamResolver for GatedResolver {
    async fn resolve(
        &self,
        reference: &str,
        _requested_by: UserId,
    ) -> Result<Vec<SongDescriptor>, ResolutionError> {
        Err(ResolutionError::NoResults(reference.to_string()))
    }

    async fn resolve_stream(
        &self,
        descriptor: &SongDescriptor,
    ) -> Result<StreamHandle, ResolutionError> {
        if !self.released.load(Ordering::SeqCst) {
            self.pending.notify_one();
            self.gate.notified().await;
        }
        Ok(StreamHandle::new(format!("https://cdn/{}", descriptor.title())))
    }
}
