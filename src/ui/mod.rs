//! Text and embed rendering for command replies.

pub mod embeds;
pub mod format;
