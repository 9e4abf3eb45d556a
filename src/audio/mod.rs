//! # Audio Module
//!
//! Per-guild playback: the queue, the playback state machine, the idle
//! disconnect timer and the voice connection it drives.
//!
//! ## Architecture
//!
//! ### [`registry`] - Session Registry
//! - One [`player::GuildPlayer`] per guild, created lazily on first access
//! - Shares the stream resolver, the notifier and the default volume
//!
//! ### [`player`] - Guild Player
//! - States: idle, resolving, playing, paused, stopped
//! - Track completions are posted to a per-guild worker task which advances
//!   the queue; a ticket per `play` call discards completions of replaced
//!   tracks
//! - Streams are resolved right before playback since their URLs expire
//!
//! ### [`queue`] - Queue Management
//! - FIFO with an absolute limit and a per-request batch limit
//! - Removal by positions and ranges, move, shuffle, clear
//!
//! ### [`idle`] - Idle Disconnect
//! - Single-shot timer, cancelled by any playback activity
//!
//! ### [`sink`] - Voice Sink
//! - [`sink::VoiceSink`] abstracts the voice connection
//! - [`sink::SongbirdSink`] is the songbird implementation
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! let player = registry.player(guild_id);
//! player.connect(voice_channel_id).await?;
//! let report = player.enqueue(songs).await?;
//! player.pause().await?;
//! player.seek(90).await?;
//! ```

pub mod idle;
pub mod notifier;
pub mod player;
pub mod queue;
pub mod registry;
pub mod sink;

#[cfg(test)]
pub(crate) mod testing;
