//! Media player seam used by the loop controller

/// Events the player adapter forwards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    Ready,
    Play,
    Pause,
    Seeking,
    Seeked,
    TimeUpdate,
    CanPlay,
    Error,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerStatus {
    #[default]
    Initialized,
    Loading,
    Paused,
    Playing,
    Seeking,
    Ended,
    Error,
}

/// Playback adapter around the actual media element
pub trait Player {
    fn play(&mut self);
    fn pause(&mut self);
    fn load(&mut self);

    /// Playhead position in seconds
    fn current_time(&self) -> f64;
    fn set_current_time(&mut self, time: f64);

    /// Media duration in seconds, 0 until known
    fn duration(&self) -> f64;
    fn status(&self) -> PlayerStatus;
}
