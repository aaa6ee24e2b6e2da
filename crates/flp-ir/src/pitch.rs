//! Pitch values and their display names.

use alloc::string::{String, ToString};
use arrayvec::ArrayString;
use core::fmt::Write;

/// Chromatic note names, indexed by semitone.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Semitones added to a numeric key before naming.
///
/// FL Studio numbers octaves one lower than conventional MIDI: key 60 is
/// shown as C5 in its piano roll, while `note_name(60)` is C4.
pub const OCTAVE_CORRECTION: i32 = 12;

/// Key used when a note carries no usable pitch.
pub const DEFAULT_KEY: i32 = 60;

/// Stack-allocated note name. Longest possible value is "C#-178956971".
pub type PitchName = ArrayString<16>;

/// A note's pitch as delivered by the decoder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Pitch {
    /// Chromatic key code (60 = middle C in MIDI numbering)
    Numeric(i32),
    /// Already a display name
    Symbolic(String),
}

impl Default for Pitch {
    fn default() -> Self {
        Pitch::Numeric(DEFAULT_KEY)
    }
}

impl Pitch {
    /// Apply the octave correction. Symbolic pitches are returned as-is.
    pub fn corrected(&self) -> Pitch {
        match self {
            Pitch::Numeric(code) => Pitch::Numeric(code.saturating_add(OCTAVE_CORRECTION)),
            Pitch::Symbolic(name) => Pitch::Symbolic(name.clone()),
        }
    }

    pub fn name(&self) -> String {
        pitch_name(self)
    }
}

/// Name a chromatic key code, e.g. 60 -> "C4", 61 -> "C#4".
pub fn note_name(code: i32) -> PitchName {
    let semitone = code.rem_euclid(12) as usize;
    let octave = code.div_euclid(12) as i64 - 1;
    let mut name = PitchName::new();
    let _ = write!(name, "{}{}", NOTE_NAMES[semitone], octave);
    name
}

/// Display name for any pitch. Never fails.
pub fn pitch_name(pitch: &Pitch) -> String {
    match pitch {
        Pitch::Numeric(code) => note_name(*code).to_string(),
        Pitch::Symbolic(name) => name.clone(),
    }
}
