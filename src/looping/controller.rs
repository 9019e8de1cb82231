//! Loop window state machine

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::LoopSettings;
use crate::context::AppContext;
use crate::looping::{Player, PlayerEvent};
use crate::{AnnotoolError, Result};

/// Half-open time slice `[start, end)` in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopWindow {
    pub start: f64,
    pub end: f64,
}

impl LoopWindow {
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time < self.end
    }

    pub fn length(&self) -> f64 {
        self.end - self.start
    }
}

/// Rejected manual loop changes
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoopError {
    #[error("Loop length must be a positive number")]
    NotPositive,

    #[error("Loop length must not exceed the video duration ({duration}s)")]
    TooLong { duration: f64 },

    #[error("Loop {index} does not exist ({count} loops)")]
    OutOfRange { index: usize, count: usize },
}

/// Keeps playback repeating inside the current loop window.
///
/// Windows only exist while looping is enabled. The duration must be known
/// before the controller is built.
#[derive(Debug, Clone)]
pub struct LoopController {
    settings: LoopSettings,
    duration: f64,
    loop_length: f64,
    enabled: bool,
    loops: Vec<LoopWindow>,
    current_loop: usize,
}

impl LoopController {
    pub fn new(duration: f64, settings: LoopSettings) -> Result<Self> {
        if !duration.is_finite() || duration <= 0.0 {
            return Err(AnnotoolError::contract(format!(
                "loop controller needs a positive duration, got {duration}"
            )));
        }

        let loop_length = Self::default_length(duration, &settings);
        if !loop_length.is_finite() || loop_length <= 0.0 {
            return Err(AnnotoolError::contract(format!(
                "default loop length must be positive, got {loop_length} (check looping.minimal_loop)"
            )));
        }
        Ok(Self {
            settings,
            duration,
            loop_length,
            enabled: false,
            loops: Vec::new(),
            current_loop: 0,
        })
    }

    pub fn from_context(ctx: &AppContext, duration: f64) -> Result<Self> {
        Self::new(duration, ctx.settings.looping.clone())
    }

    /// `max(minimal_loop, floor(duration / default_loop_count))`
    pub fn default_length(duration: f64, settings: &LoopSettings) -> f64 {
        let count = f64::from(settings.default_loop_count.max(1));
        (duration / count).floor().max(settings.minimal_loop)
    }

    /// Same controller with another loop length, for a disabled controller
    pub fn with_length(mut self, length: f64) -> std::result::Result<Self, LoopError> {
        self.check_length(length)?;
        self.loop_length = length;
        Ok(self)
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn loop_length(&self) -> f64 {
        self.loop_length
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn number_of_loops(&self) -> usize {
        ((self.duration / self.loop_length).ceil() as usize).max(1)
    }

    pub fn current_loop(&self) -> usize {
        self.current_loop
    }

    /// Active windows; empty while disabled
    pub fn loops(&self) -> &[LoopWindow] {
        &self.loops
    }

    /// Windows the current length would produce
    pub fn plan(&self) -> Vec<LoopWindow> {
        let count = self.number_of_loops();
        (0..count)
            .map(|i| LoopWindow {
                start: i as f64 * self.loop_length,
                end: ((i + 1) as f64 * self.loop_length).min(self.duration),
            })
            .collect()
    }

    pub fn current_window(&self) -> Option<LoopWindow> {
        self.loops.get(self.current_loop).copied()
    }

    /// Window new annotations must fall into, if constrained
    pub fn constraint(&self) -> Option<LoopWindow> {
        if self.settings.constrain_annotations {
            self.current_window()
        } else {
            None
        }
    }

    pub fn toggle(&mut self, on: bool, player: &dyn Player) {
        self.enabled = on;
        if on {
            self.loops = self.plan();
            self.sync_to(player.current_time());
            debug!(
                length = self.loop_length,
                loops = self.loops.len(),
                current = self.current_loop,
                "looping enabled"
            );
        } else {
            self.loops.clear();
            self.current_loop = 0;
            debug!("looping disabled");
        }
    }

    pub fn check_length(&self, length: f64) -> std::result::Result<(), LoopError> {
        if !length.is_finite() || length <= 0.0 {
            return Err(LoopError::NotPositive);
        }
        if length > self.duration {
            return Err(LoopError::TooLong {
                duration: self.duration,
            });
        }
        Ok(())
    }

    /// Change the loop length; rejected values keep the previous length
    pub fn set_length(&mut self, length: f64, player: &dyn Player) -> std::result::Result<(), LoopError> {
        if let Err(e) = self.check_length(length) {
            warn!(length, "rejected loop length: {}", e);
            return Err(e);
        }

        self.loop_length = length;
        if self.enabled {
            self.loops = self.plan();
            self.sync_to(player.current_time());
        }
        Ok(())
    }

    /// Seek to the start of window `index`
    pub fn jump_to_loop(&mut self, index: usize, player: &mut dyn Player) -> std::result::Result<(), LoopError> {
        let Some(window) = self.loops.get(index).copied() else {
            return Err(LoopError::OutOfRange {
                index,
                count: self.loops.len(),
            });
        };
        self.current_loop = index;
        player.set_current_time(window.start);
        Ok(())
    }

    pub fn has_previous(&self) -> bool {
        self.enabled && self.current_loop > 0
    }

    pub fn has_next(&self) -> bool {
        self.enabled && self.current_loop + 1 < self.loops.len()
    }

    pub fn previous(&mut self, player: &mut dyn Player) -> std::result::Result<(), LoopError> {
        let index = self.current_loop.checked_sub(1).ok_or(LoopError::OutOfRange {
            index: 0,
            count: self.loops.len(),
        })?;
        self.jump_to_loop(index, player)
    }

    pub fn next(&mut self, player: &mut dyn Player) -> std::result::Result<(), LoopError> {
        self.jump_to_loop(self.current_loop + 1, player)
    }

    /// React to a player event. Only `TimeUpdate` and `Ended` move the playhead.
    pub fn handle_event(&mut self, event: PlayerEvent, player: &mut dyn Player) {
        if !self.enabled {
            return;
        }
        let Some(window) = self.current_window() else {
            return;
        };

        match event {
            PlayerEvent::TimeUpdate => {
                if player.current_time() >= window.end {
                    player.set_current_time(window.start);
                }
            }
            PlayerEvent::Ended => {
                player.set_current_time(window.start);
                player.play();
            }
            PlayerEvent::Seeking => {
                self.sync_to(player.current_time());
            }
            _ => {}
        }
    }

    fn sync_to(&mut self, time: f64) {
        let last = self.loops.len().saturating_sub(1);
        let index = if time.is_finite() && time > 0.0 {
            (time / self.loop_length).floor() as usize
        } else {
            0
        };
        self.current_loop = index.min(last);
    }
}
