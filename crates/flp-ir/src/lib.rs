//! Core IR types for flpinfo.
//!
//! This crate defines the project graph the format decoder hands over,
//! plus the pure conversions every later stage shares: ticks to musical
//! position and wall-clock time, and pitch codes to display names.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod pitch;
mod position;
pub mod project;

pub use pitch::{
    note_name, pitch_name, Pitch, PitchName, DEFAULT_KEY, NOTE_NAMES,
    OCTAVE_CORRECTION,
};
pub use position::{
    clamp_ticks, ticks_to_musical_position, ticks_to_seconds, ClockTime, MusicalPosition, Timing,
    BEATS_PER_BAR, DEFAULT_PPQ, DEFAULT_TEMPO, STEP_TICKS,
};
pub use project::{
    Arrangement, ArrangementEvent, Channel, NoteItem, Pattern, PatternRef, PlaylistEvent, Project,
    TimeMarker, TrackInfo,
};
