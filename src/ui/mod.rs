//! Discord rendering for sessions, queue listings and session events.

pub mod embeds;
