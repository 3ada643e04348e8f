//! # Audio Module
//!
//! Per-guild playback sessions for the jukebox.
//!
//! ## Architecture
//!
//! ### [`session`] - Playback Session
//! - Owns the pending queue, the now-playing song and the voice connection
//! - Sequences the queue one track at a time as completions arrive
//! - Supervises inactivity and disconnects idle sessions
//!
//! ### [`registry`] - Session Registry
//! - One lazily created session per guild
//! - Routes voice membership changes to the right session
//!
//! ### [`sink`] - Voice Transport
//! - [`sink::VoiceSink`] abstracts joining channels and emitting audio
//! - [`songbird_sink::SongbirdSink`] is the songbird implementation
//!
//! ### [`queue`] / [`idle`]
//! - Bounded FIFO of pending songs
//! - Single-slot cancellable timer used by the idle supervisor
//!
//! ## Concurrency
//!
//! Sessions for different guilds never share a lock. Inside a session every
//! mutation is serialized by one mutex; stream resolution and voice
//! connection setup run with the lock released.

pub mod error;
pub mod idle;
pub mod queue;
pub mod registry;
pub mod session;
pub mod sink;
pub mod songbird_sink;

#[cfg(test)]
pub(crate) mod testing;

pub use error::PlayerError;
pub use registry::SessionRegistry;
pub use session::{
    DisconnectReason, EnqueueOutcome, GuildEvent, PlaybackSession, PlaybackState, SessionEvent,
    SessionSettings, SessionSnapshot, VoiceStateChange,
};
pub use songbird_sink::SongbirdSink;
