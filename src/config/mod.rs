//! Configuration module for annotool
//!
//! Handles loading and managing application settings from TOML files.

mod settings;

pub use settings::{BackendSettings, LoopSettings, Profile, Settings, TrackSettings};
