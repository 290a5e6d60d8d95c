// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Camera-motion debouncer producing settle events.
//!
//! Time is passed in by the caller; the debouncer never reads a clock.

use std::time::{Duration, Instant};

use crate::registry::MAX_ZOOM;

/// Default quiet period after the last camera change.
pub const DEFAULT_QUIET: Duration = Duration::from_millis(250);

/// Integer zoom level for a fractional camera zoom.
// Clamped to [0, MAX_ZOOM] before the cast.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn zoom_level(zoom: f64) -> u8 {
    if !zoom.is_finite() || zoom <= 0.0 {
        return 0;
    }
    zoom.floor().min(f64::from(MAX_ZOOM)) as u8
}

/// Collapses a burst of camera changes into one settle event.
#[derive(Debug, Clone)]
pub struct SettleDebouncer {
    quiet: Duration,
    pending: Option<(f64, Instant)>,
}

impl Default for SettleDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_QUIET)
    }
}

impl SettleDebouncer {
    /// Debouncer with the given quiet period.
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: None,
        }
    }

    /// Record a camera change (pan or zoom frame).
    pub fn camera_moved(&mut self, zoom: f64, now: Instant) {
        self.pending = Some((zoom, now));
    }

    /// True while a change is waiting for its quiet period.
    pub fn is_moving(&self) -> bool {
        self.pending.is_some()
    }

    /// Return the settled integer zoom once the quiet period has elapsed
    /// since the last change. Fires at most once per burst.
    pub fn poll(&mut self, now: Instant) -> Option<u8> {
        let (zoom, last) = self.pending?;
        if now.saturating_duration_since(last) < self.quiet {
            return None;
        }
        self.pending = None;
        Some(zoom_level(zoom))
    }
}
