//! Redraw scheduling
//!
//! Decides when the embedder should hand a grid snapshot to its renderer.
//! Content redraws are throttled to the configured frame-rate cap while
//! dirty rows are pending, so a burst of output coalesces into a single
//! frame. Non-content redraws (cursor blink, selection highlight) run on
//! an independent, lower cadence, and the blink phase follows the
//! configured blink timeout.
//!
//! The scheduler is pure timing state: callers pass `Instant`s in, so it
//! can be driven by a test clock, and it never touches cell data.

use std::time::{Duration, Instant};

use crate::config::TimingConfig;

/// What the embedder should redraw after a poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RedrawDecision {
    /// Redraw cell content (dirty rows are pending and the frame cap allows it)
    pub content: bool,
    /// Redraw overlays only (blink phase or selection changed)
    pub action: bool,
}

impl RedrawDecision {
    /// Whether anything needs to be drawn
    pub fn any(&self) -> bool {
        self.content || self.action
    }
}

/// Damage-driven redraw scheduler
pub struct RedrawScheduler {
    /// Minimum interval between content redraws (1/max_fps)
    frame_interval: Duration,
    /// Minimum interval between action redraws (1/action_fps)
    action_interval: Duration,
    /// Blink period, None when blinking is disabled
    blink_timeout: Option<Duration>,
    last_content: Option<Instant>,
    last_action: Option<Instant>,
    /// Blink phase reference point
    last_blink_toggle: Option<Instant>,
    blink_visible: bool,
    /// An overlay change (selection, cursor move) wants a redraw
    action_pending: bool,
}

impl RedrawScheduler {
    pub fn new(timing: &TimingConfig) -> Self {
        Self {
            frame_interval: timing.frame_interval(),
            action_interval: timing.action_interval(),
            blink_timeout: timing.blink_timeout(),
            last_content: None,
            last_action: None,
            last_blink_toggle: None,
            blink_visible: true,
            action_pending: false,
        }
    }

    /// Request a non-content redraw (selection changed, cursor moved)
    pub fn request_action(&mut self) {
        self.action_pending = true;
    }

    /// Current blink phase; always true when blinking is disabled
    pub fn blink_visible(&self) -> bool {
        self.blink_visible
    }

    /// Advance timers and decide what to redraw
    ///
    /// `has_damage` is the grid's dirty state. A `content` decision means
    /// the caller should take a snapshot, render it, and clear the grid's
    /// dirty flags.
    pub fn poll(&mut self, now: Instant, has_damage: bool) -> RedrawDecision {
        // Blink phase advances independently of input arrival
        if let Some(period) = self.blink_timeout {
            let reference = *self.last_blink_toggle.get_or_insert(now);
            let mut elapsed = now.saturating_duration_since(reference);
            while elapsed >= period {
                self.blink_visible = !self.blink_visible;
                elapsed -= period;
                self.action_pending = true;
                // Keep the phase anchored to the period, not to poll times
                self.last_blink_toggle = Some(now - elapsed);
            }
        }

        let mut decision = RedrawDecision::default();

        if has_damage
            && self
                .last_content
                .map_or(true, |t| now.saturating_duration_since(t) >= self.frame_interval)
        {
            decision.content = true;
            self.last_content = Some(now);
            // A content frame repaints overlays too
            self.action_pending = false;
            self.last_action = Some(now);
        } else if self.action_pending
            && self
                .last_action
                .map_or(true, |t| now.saturating_duration_since(t) >= self.action_interval)
        {
            decision.action = true;
            self.action_pending = false;
            self.last_action = Some(now);
        }

        decision
    }

    /// How long the embedder may sleep before the next poll matters
    ///
    /// None means there is nothing to wait for (no damage, no pending
    /// action, blinking disabled).
    pub fn next_deadline(&self, now: Instant, has_damage: bool) -> Option<Duration> {
        let mut deadline: Option<Duration> = None;
        let mut consider = |d: Duration| {
            deadline = Some(match deadline {
                Some(current) => current.min(d),
                None => d,
            });
        };

        if has_damage {
            let wait = self.last_content.map_or(Duration::ZERO, |t| {
                self.frame_interval
                    .saturating_sub(now.saturating_duration_since(t))
            });
            consider(wait);
        }
        if self.action_pending {
            let wait = self.last_action.map_or(Duration::ZERO, |t| {
                self.action_interval
                    .saturating_sub(now.saturating_duration_since(t))
            });
            consider(wait);
        }
        if let (Some(period), Some(reference)) = (self.blink_timeout, self.last_blink_toggle) {
            let wait = period.saturating_sub(now.saturating_duration_since(reference));
            consider(wait);
        }
        deadline
    }
}
