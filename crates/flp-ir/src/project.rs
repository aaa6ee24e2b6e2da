//! Decoded project graph.
//!
//! The decoder fills in whatever it could read and leaves the rest as
//! `None`. Which field wins, and what a missing field defaults to, is
//! decided by the resolver crate, not here.

use alloc::string::String;
use alloc::vec::Vec;

use crate::pitch::Pitch;
use crate::position::{Timing, DEFAULT_PPQ, DEFAULT_TEMPO};

/// A complete decoded project.
#[derive(Clone, Debug, PartialEq)]
pub struct Project {
    /// FL Studio version string, e.g. "20.8.4.2576"
    pub version: Option<String>,
    /// Project title
    pub title: Option<String>,
    /// Tempo in BPM as stored; see [`Project::timing`]
    pub tempo: f64,
    /// Ticks per quarter note as stored; see [`Project::timing`]
    pub ppq: u32,
    /// Channel rack entries, in stored order
    pub channels: Vec<Channel>,
    /// Patterns, in project order
    pub patterns: Vec<Pattern>,
    /// Arrangements (FL 12.9+ may have several)
    pub arrangements: Vec<Arrangement>,
    /// Iid of the arrangement selected when the project was saved
    pub current_arrangement: Option<u32>,
}

impl Default for Project {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPO, DEFAULT_PPQ)
    }
}

impl Project {
    /// Create an empty project.
    pub fn new(tempo: f64, ppq: u32) -> Self {
        Self {
            version: None,
            title: None,
            tempo,
            ppq,
            channels: Vec::new(),
            patterns: Vec::new(),
            arrangements: Vec::new(),
            current_arrangement: None,
        }
    }

    /// Tempo and PPQ with unusable values replaced by defaults.
    pub fn timing(&self) -> Timing {
        Timing::new(self.tempo, self.ppq)
    }

    /// The arrangement to reconstruct: the current one if it exists,
    /// otherwise the first.
    pub fn arrangement(&self) -> Option<&Arrangement> {
        self.current_arrangement
            .and_then(|iid| self.arrangements.iter().find(|a| a.iid == Some(iid)))
            .or_else(|| self.arrangements.first())
    }

    /// Number of note slots across all patterns, including unreadable ones.
    pub fn note_slots(&self) -> usize {
        self.patterns.iter().map(|p| p.notes.len()).sum()
    }
}

/// A channel rack entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Channel {
    /// Channel iid as referenced by notes
    pub id: Option<i64>,
    /// User-visible name
    pub name: Option<String>,
    /// Internal plugin name, e.g. "Sampler" or "3x Osc"
    pub plugin: Option<String>,
}

impl Channel {
    pub fn new(id: i64, name: &str) -> Self {
        Self {
            id: Some(id),
            name: Some(String::from(name)),
            plugin: None,
        }
    }
}

/// A pattern and its raw note items.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Pattern {
    /// FL pattern number (1-based in the file)
    pub iid: Option<u32>,
    /// User-visible name
    pub name: Option<String>,
    /// Note items in storage order. `None` marks a record the decoder
    /// could not read at all.
    pub notes: Vec<Option<NoteItem>>,
}

impl Pattern {
    pub fn new(name: &str) -> Self {
        Self {
            iid: None,
            name: Some(String::from(name)),
            notes: Vec::new(),
        }
    }

    /// Append a readable note item.
    pub fn push_note(&mut self, note: NoteItem) {
        self.notes.push(Some(note));
    }
}

/// A raw note inside a pattern.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NoteItem {
    /// Start in ticks from the pattern start
    pub position: Option<i64>,
    /// Pitch
    pub key: Option<Pitch>,
    /// Explicit duration in ticks (preferred when positive)
    pub duration: Option<i64>,
    /// Stored length in ticks
    pub length: Option<i64>,
    /// Channel iid the note plays on
    pub channel: Option<i64>,
    /// Velocity (0-128)
    pub velocity: Option<u8>,
}

impl NoteItem {
    /// A note with a numeric key and a stored length.
    pub fn new(position: i64, key: i32, length: i64, channel: i64) -> Self {
        Self {
            position: Some(position),
            key: Some(Pitch::Numeric(key)),
            duration: None,
            length: Some(length),
            channel: Some(channel),
            velocity: None,
        }
    }
}

/// An arrangement: the playlist plus its tracks and markers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Arrangement {
    /// Arrangement iid
    pub iid: Option<u32>,
    /// User-visible name
    pub name: Option<String>,
    /// Pattern and clip placements
    pub playlist: Option<Vec<PlaylistEvent>>,
    /// Mixed arrangement events (tracks, markers, and possibly placements)
    pub events: Option<Vec<ArrangementEvent>>,
}

impl Arrangement {
    /// Playlist placements: the `playlist` list when present, otherwise the
    /// playlist-typed entries of `events`.
    pub fn playlist_events(&self) -> impl Iterator<Item = &PlaylistEvent> + '_ {
        let mixed = match self.playlist {
            Some(_) => None,
            None => self.events.as_deref(),
        };
        self.playlist
            .as_deref()
            .unwrap_or_default()
            .iter()
            .chain(
                mixed
                    .unwrap_or_default()
                    .iter()
                    .filter_map(ArrangementEvent::as_playlist),
            )
    }

    /// Name of the playlist track with the given (1-based) index.
    pub fn track_name(&self, index: i64) -> Option<&str> {
        self.events.as_deref()?.iter().find_map(|event| match event {
            ArrangementEvent::Track(track) if track.index == Some(index) => track.name.as_deref(),
            _ => None,
        })
    }
}

/// One entry of an arrangement's mixed event list.
#[derive(Clone, Debug, PartialEq)]
pub enum ArrangementEvent {
    Playlist(PlaylistEvent),
    Track(TrackInfo),
    TimeMarker(TimeMarker),
}

impl ArrangementEvent {
    pub fn as_playlist(&self) -> Option<&PlaylistEvent> {
        match self {
            ArrangementEvent::Playlist(event) => Some(event),
            _ => None,
        }
    }
}

/// A playlist track header.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackInfo {
    /// Track number, 1-based
    pub index: Option<i64>,
    pub name: Option<String>,
}

/// A named position on the arrangement timeline.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TimeMarker {
    pub position: Option<i64>,
    pub name: Option<String>,
}

/// Back-reference from a playlist item to a pattern, by pattern iid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PatternRef {
    pub iid: u32,
}

/// A raw playlist placement.
///
/// The track is stored one of three ways depending on the FL version, and
/// the pattern either as a back-reference or as `item_index` counted from
/// `pattern_base`. The decoder counts `item_index` in pattern positions,
/// so `item_index - pattern_base` indexes `Project::patterns`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlaylistEvent {
    /// Start in ticks from the song start
    pub start: Option<i64>,
    /// Length in ticks
    pub length: Option<i64>,
    /// Direct track index
    pub track_index: Option<i64>,
    /// Reversed track index (track 1 is stored as 499)
    pub track_rvidx: Option<i64>,
    /// Generic track field
    pub track: Option<i64>,
    /// Direct pattern back-reference
    pub pattern: Option<PatternRef>,
    /// Item index; pattern items count up from `pattern_base`
    pub item_index: Option<i64>,
    /// Offset of the first pattern item index (20480 in FL files)
    pub pattern_base: Option<i64>,
    /// Set for channel clips (audio, automation): the rack channel the
    /// item plays. Such items are not pattern placements.
    pub channel: Option<i64>,
}
