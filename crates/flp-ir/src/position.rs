//! Tick-based time representation.
//!
//! FL Studio stores every time value as an absolute tick count at the
//! project's PPQ resolution. Reports show positions as `bar:step:tick`,
//! where a step is always 24 ticks no matter what the PPQ is.

use core::fmt;

/// Ticks per step. Fixed sub-beat resolution, does not scale with PPQ.
pub const STEP_TICKS: u64 = 24;

/// Quarter notes per bar. Projects are read as 4/4.
pub const BEATS_PER_BAR: u64 = 4;

/// Tempo substituted for a zero, negative or non-finite project tempo.
pub const DEFAULT_TEMPO: f64 = 120.0;

/// PPQ substituted for a zero project PPQ.
pub const DEFAULT_PPQ: u32 = 96;

/// Coerce a raw tick value to the non-negative range.
pub fn clamp_ticks(ticks: i64) -> u64 {
    ticks.max(0) as u64
}

/// A position as bar (1-based), step and tick within the step.
///
/// Ordering: bar is primary, then step, then tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MusicalPosition {
    /// Bar number, starting at 1
    pub bar: u64,
    /// 24-tick step within the bar
    pub step: u64,
    /// Tick within the step: 0..STEP_TICKS
    pub tick: u64,
}

impl Default for MusicalPosition {
    fn default() -> Self {
        Self::start()
    }
}

impl MusicalPosition {
    /// The first tick of the first bar.
    pub const fn start() -> Self {
        Self { bar: 1, step: 0, tick: 0 }
    }

    /// Decompose an absolute tick count at `ppq` resolution.
    pub fn from_ticks(ticks: u64, ppq: u32) -> Self {
        let ticks_per_bar = sanitize_ppq(ppq) as u64 * BEATS_PER_BAR;
        let remainder = ticks % ticks_per_bar;
        Self {
            bar: ticks / ticks_per_bar + 1,
            step: remainder / STEP_TICKS,
            tick: remainder % STEP_TICKS,
        }
    }

    /// Recompose the absolute tick count.
    pub fn to_ticks(self, ppq: u32) -> u64 {
        let ticks_per_bar = sanitize_ppq(ppq) as u64 * BEATS_PER_BAR;
        self.bar.saturating_sub(1) * ticks_per_bar + self.step * STEP_TICKS + self.tick
    }
}

impl fmt::Display for MusicalPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:02}:{:02}", self.bar, self.step, self.tick)
    }
}

/// Convert raw ticks to a musical position. Negative input counts as 0.
pub fn ticks_to_musical_position(ticks: i64, ppq: u32) -> MusicalPosition {
    MusicalPosition::from_ticks(clamp_ticks(ticks), ppq)
}

/// Convert raw ticks to seconds. Negative input counts as 0.
pub fn ticks_to_seconds(ticks: i64, tempo: f64, ppq: u32) -> f64 {
    Timing::new(tempo, ppq).seconds(clamp_ticks(ticks))
}

/// Project tempo and resolution, with unusable values replaced by defaults.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Timing {
    tempo: f64,
    ppq: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self { tempo: DEFAULT_TEMPO, ppq: DEFAULT_PPQ }
    }
}

impl Timing {
    pub fn new(tempo: f64, ppq: u32) -> Self {
        Self {
            tempo: sanitize_tempo(tempo),
            ppq: sanitize_ppq(ppq),
        }
    }

    /// Tempo in BPM, always positive and finite.
    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    /// Ticks per quarter note, never zero.
    pub fn ppq(&self) -> u32 {
        self.ppq
    }

    pub fn ticks_per_bar(&self) -> u64 {
        self.ppq as u64 * BEATS_PER_BAR
    }

    pub fn position(&self, ticks: u64) -> MusicalPosition {
        MusicalPosition::from_ticks(ticks, self.ppq)
    }

    pub fn seconds(&self, ticks: u64) -> f64 {
        ticks as f64 * (60.0 / self.tempo) / self.ppq as f64
    }
}

fn sanitize_tempo(tempo: f64) -> f64 {
    if tempo.is_finite() && tempo > 0.0 {
        tempo
    } else {
        DEFAULT_TEMPO
    }
}

fn sanitize_ppq(ppq: u32) -> u32 {
    if ppq == 0 {
        DEFAULT_PPQ
    } else {
        ppq
    }
}

/// Wall-clock time, displayed as `MM:SS.cc`.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd)]
pub struct ClockTime(pub f64);

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let seconds = if self.0.is_finite() && self.0 > 0.0 { self.0 } else { 0.0 };
        // Round once to centiseconds so 59.999 carries into the next minute.
        let centis = libm::round(seconds * 100.0) as u64;
        let minutes = centis / 6000;
        let rem = centis % 6000;
        write!(f, "{:02}:{:02}.{:02}", minutes, rem / 100, rem % 100)
    }
}
