//! Estimation of the playable bounds of a presentation.
//!
//! For dynamic presentations, bounds move with time. They are extrapolated
//! from the last known position using a monotonic clock: the wall clock may
//! jump, monotonic time does not.

use std::{cell::Cell, fmt, rc::Rc, time::Instant};

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Source of monotonic time, in seconds since an arbitrary origin.
pub trait MonotonicClock {
    fn now(&self) -> f64;
}

/// [`MonotonicClock`] backed by [`std::time::Instant`].
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Clock advanced by hand, for deterministic tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<f64>,
}

impl ManualClock {
    pub fn new(now: f64) -> Self {
        Self {
            now: Cell::new(now),
        }
    }

    pub fn advance(&self, seconds: f64) {
        self.now.set(self.now.get() + seconds);
    }

    pub fn set(&self, now: f64) {
        self.now.set(now);
    }
}

impl MonotonicClock for ManualClock {
    fn now(&self) -> f64 {
        self.now.get()
    }
}

/// Presentation-level metadata the estimator starts from.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundsConfig {
    /// `MPD@type="dynamic"`.
    #[serde(default)]
    pub is_dynamic: bool,
    /// Zero point of the presentation timeline, for dynamic presentations.
    pub availability_start_time: Option<DateTime<Utc>>,
    /// Depth of the time shift buffer, in seconds.
    pub time_shift_buffer_depth: Option<f64>,
    /// Declared end of the content, in seconds, when known.
    pub content_end: Option<f64>,
}

/// Estimates minimum, live edge and maximum positions of a presentation.
///
/// Shared by every index of the presentation.
pub struct BoundsEstimator {
    is_dynamic: bool,
    /// Unix time, in seconds, of the presentation timeline's zero point.
    availability_start_time: f64,
    time_shift_buffer_depth: Option<f64>,
    content_end: Cell<Option<f64>>,
    clock: Rc<dyn MonotonicClock>,

    last_position: Cell<Option<f64>>,
    /// Monotonic time at which `last_position` was true.
    position_time: Cell<Option<f64>>,
    /// Unix time, in seconds, minus monotonic time.
    server_timestamp_offset: Cell<Option<f64>>,
}

impl BoundsEstimator {
    pub fn new(config: BoundsConfig, clock: Rc<dyn MonotonicClock>) -> Self {
        Self {
            is_dynamic: config.is_dynamic,
            availability_start_time: config
                .availability_start_time
                .map(to_unix_seconds)
                .unwrap_or(0.),
            time_shift_buffer_depth: config.time_shift_buffer_depth,
            content_end: Cell::new(config.content_end),
            clock,
            last_position: Cell::new(None),
            position_time: Cell::new(None),
            server_timestamp_offset: Cell::new(None),
        }
    }

    /// Estimator of a static presentation ending at `content_end`.
    pub fn new_static(content_end: Option<f64>) -> Self {
        let mut estimator = Self::new(
            BoundsConfig {
                content_end,
                ..Default::default()
            },
            Rc::new(SystemClock::new()),
        );
        if let Some(end) = content_end {
            estimator.last_position = Cell::new(Some(end));
        }
        estimator
    }

    pub fn is_dynamic(&self) -> bool {
        self.is_dynamic
    }

    /// Records the last position known to be available.
    ///
    /// `position_time` is the monotonic time at which it was true, now if
    /// `None`.
    pub fn set_last_position(&self, position: f64, position_time: Option<f64>) {
        self.last_position.set(Some(position));
        self.position_time
            .set(Some(position_time.unwrap_or_else(|| self.clock.now())));
    }

    pub fn set_content_end(&self, end: Option<f64>) {
        self.content_end.set(end);
    }

    /// Synchronizes with a server time obtained by a request.
    ///
    /// `before_request` and `after_request` are the monotonic times around the
    /// request: the server is assumed to have answered halfway.
    pub fn set_server_time(&self, remote_now: DateTime<Utc>, before_request: f64, after_request: f64) {
        let half_rtt = (after_request - before_request).max(0.) / 2.;
        let server_now = to_unix_seconds(remote_now) + half_rtt;
        let offset = server_now - after_request;
        self.server_timestamp_offset.set(Some(offset));
        tracing::info!(offset, %remote_now, "Server time synchronized");
    }

    /// Whether positions can be estimated yet.
    pub fn last_position_is_known(&self) -> bool {
        if self.is_dynamic {
            return self.server_timestamp_offset.get().is_some()
                || self.last_position.get().is_some();
        }
        self.last_position.get().is_some()
    }

    /// Estimated time of the earliest segment still available, in seconds.
    pub fn estimated_minimum_segment_time(&self) -> Option<f64> {
        let Some(depth) = self.time_shift_buffer_depth.filter(|_| self.is_dynamic) else {
            return Some(0.);
        };
        let maximum = self
            .estimated_live_edge()
            .or_else(|| self.estimated_maximum_position(0.))?;
        Some(maximum - depth)
    }

    /// Estimated live edge of a dynamic presentation, in seconds.
    pub fn estimated_live_edge(&self) -> Option<f64> {
        if !self.is_dynamic {
            return None;
        }
        let offset = self.server_timestamp_offset.get()?;
        Some(self.clock.now() + offset - self.availability_start_time)
    }

    /// Estimated maximum available position, in seconds.
    ///
    /// `availability_time_offset` lets segments be announced before their
    /// nominal end, as in low-latency streams.
    pub fn estimated_maximum_position(&self, availability_time_offset: f64) -> Option<f64> {
        let content_end = self.content_end.get();
        if !self.is_dynamic {
            return self.last_position.get().or(content_end);
        }

        let extrapolated = match self.estimated_live_edge() {
            Some(live_edge) if availability_time_offset.is_finite() => {
                Some(live_edge + availability_time_offset)
            }
            _ => match (self.last_position.get(), self.position_time.get()) {
                (Some(position), Some(position_time)) => {
                    let elapsed = self.clock.now() - position_time;
                    let offset = if availability_time_offset.is_finite() {
                        availability_time_offset
                    } else {
                        0.
                    };
                    Some((position + elapsed + offset).max(0.))
                }
                (position, _) => position,
            },
        }?;

        Some(match content_end {
            Some(end) => extrapolated.min(end),
            None => extrapolated,
        })
    }
}

impl fmt::Debug for BoundsEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundsEstimator")
            .field("is_dynamic", &self.is_dynamic)
            .field("availability_start_time", &self.availability_start_time)
            .field("time_shift_buffer_depth", &self.time_shift_buffer_depth)
            .field("content_end", &self.content_end.get())
            .field("last_position", &self.last_position.get())
            .field("position_time", &self.position_time.get())
            .field("server_timestamp_offset", &self.server_timestamp_offset.get())
            .finish()
    }
}

fn to_unix_seconds(time: DateTime<Utc>) -> f64 {
    time.timestamp_millis() as f64 / 1000.
}
