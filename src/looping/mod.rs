//! Looping module for annotool
//!
//! Splits the video into fixed-length windows and keeps playback repeating
//! inside the current one.

mod controller;
mod player;

pub use controller::{LoopController, LoopError, LoopWindow};
pub use player::{Player, PlayerEvent, PlayerStatus};
