//! # Audio Module
//!
//! Playback core of Guild Jukebox: one session per guild, one stream per
//! session.
//!
//! ## Architecture
//!
//! ### [`session`] - Session State
//! - Bounded FIFO queue, current track, loop and pause flags
//! - Playback phase with per-attempt tokens
//! - [`session::SessionRegistry`]: guild -> `Arc<Mutex<SessionState>>`
//!
//! ### [`coordinator`] - Playback Coordinator
//! - Starts streams, advances the queue on completion
//! - Idle disconnect after the configured timeout
//! - Consumes [`coordinator::PlaybackEvent`]s from a single channel
//!
//! ### [`commands`] - Queue Commands
//! - enqueue / remove / clear / skip / pause / resume / seek / leave
//! - [`commands::PlayerAction`] dispatch for UI controls
//!
//! ### [`transport`] - Voice Transport boundary
//! - [`transport::VoiceTransport`] trait, implemented over Songbird in
//!   [`songbird_transport`]

pub mod commands;
pub mod coordinator;
pub mod session;
pub mod songbird_transport;
pub mod track;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;
