//! Tick timing for the growth animation loop.

use std::time::{Duration, Instant};

/// Where a [`TickClock`] takes its frame deltas from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockSource {
    /// Deltas are measured from the wall clock on every [`TickClock::update`].
    WallClock,
    /// Deltas are supplied by the caller through [`TickClock::advance`].
    Simulated,
}

/// Frame timing with a fixed-rate tick accumulator.
///
/// The growth session is advanced once per fixed tick; a host either feeds
/// real frame times (wall clock) or steps the clock manually (headless runs
/// and tests).
#[derive(Debug)]
pub struct TickClock {
    source: ClockSource,
    /// Time of the last wall-clock update.
    last_frame: Instant,
    /// Duration of the last frame.
    delta: Duration,
    /// Total elapsed time since start.
    elapsed: Duration,
    /// Fixed ticks consumed so far.
    tick_count: u64,
    /// Fixed tick length (default 60 Hz).
    tick_length: Duration,
    /// Time not yet consumed by fixed ticks.
    accumulator: Duration,
}

impl Default for TickClock {
    fn default() -> Self {
        Self::new(ClockSource::WallClock)
    }
}

impl TickClock {
    /// Clock at time zero ticking at 60 Hz.
    pub fn new(source: ClockSource) -> Self {
        Self {
            source,
            last_frame: Instant::now(),
            delta: Duration::ZERO,
            elapsed: Duration::ZERO,
            tick_count: 0,
            tick_length: Duration::from_secs_f64(1.0 / 60.0),
            accumulator: Duration::ZERO,
        }
    }

    /// A simulated clock ticking at `hz`.
    pub fn simulated(hz: f64) -> Self {
        let mut clock = Self::new(ClockSource::Simulated);
        clock.set_tick_rate(hz);
        clock
    }

    /// Where deltas come from.
    pub fn source(&self) -> ClockSource {
        self.source
    }

    /// Sample the wall clock at the start of a new frame.
    ///
    /// Does nothing on a simulated clock.
    pub fn update(&mut self) {
        if self.source != ClockSource::WallClock {
            return;
        }
        let now = Instant::now();
        self.record(now - self.last_frame);
        self.last_frame = now;
    }

    /// Push a caller-supplied frame delta.
    pub fn advance(&mut self, delta: Duration) {
        self.record(delta);
    }

    fn record(&mut self, delta: Duration) {
        self.delta = delta;
        self.elapsed += delta;
        self.accumulator += delta;
    }

    /// Consume one fixed tick if enough time has accumulated.
    pub fn next_tick(&mut self) -> bool {
        if self.accumulator >= self.tick_length {
            self.accumulator -= self.tick_length;
            self.tick_count += 1;
            true
        } else {
            false
        }
    }

    /// Length of one fixed tick.
    pub fn tick_length(&self) -> Duration {
        self.tick_length
    }

    /// Length of one fixed tick in seconds.
    pub fn tick_seconds(&self) -> f32 {
        self.tick_length.as_secs_f32()
    }

    /// Duration of the last frame in seconds.
    pub fn delta_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    /// Total elapsed time in seconds.
    pub fn elapsed_seconds(&self) -> f32 {
        self.elapsed.as_secs_f32()
    }

    /// Fixed ticks consumed so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Set the fixed tick rate in Hz. Non-positive rates are ignored.
    pub fn set_tick_rate(&mut self, hz: f64) {
        if hz > 0.0 && hz.is_finite() {
            self.tick_length = Duration::from_secs_f64(1.0 / hz);
        } else {
            log::warn!("Ignoring invalid tick rate {}", hz);
        }
    }
}
