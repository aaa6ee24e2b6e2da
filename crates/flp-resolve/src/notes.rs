//! Note normalization.
//!
//! Turns every raw note item of every pattern into a [`NoteRecord`] with
//! musical and wall-clock positions, a pitch name and a channel name.
//! A bad note is logged and skipped; it never stops the scan.

use flp_ir::{clamp_ticks, pitch_name, MusicalPosition, NoteItem, Pitch, Project, Timing};
use thiserror::Error;
use tracing::{debug, warn};

use crate::identity::{ChannelMap, Identities, UNKNOWN_CHANNEL};

/// Channel-name substring ("drum kit") that marks percussion channels.
pub const DEFAULT_PERCUSSION_MARKER: &str = "鼓组";

/// Why a single note was skipped.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NoteError {
    #[error("note record could not be read")]
    MissingItem,
    #[error("note end out of range (start {start}, duration {duration})")]
    TickOverflow { start: u64, duration: u64 },
}

#[derive(Clone, Debug)]
pub struct NormalizeOptions {
    /// Notes on a channel whose name contains this are one tick long.
    /// Empty disables the rule.
    pub percussion_marker: String,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            percussion_marker: DEFAULT_PERCUSSION_MARKER.to_string(),
        }
    }
}

/// A normalized note.
#[derive(Clone, Debug, PartialEq)]
pub struct NoteRecord {
    /// Position of the owning pattern in the project
    pub pattern: usize,
    pub start_tick: u64,
    pub end_tick: u64,
    pub start: MusicalPosition,
    pub end: MusicalPosition,
    pub start_secs: f64,
    pub end_secs: f64,
    pub pitch: String,
    pub channel: String,
    /// Duration in ticks, at least 1
    pub duration: u64,
}

/// Notes of one pattern display name, as indices into
/// [`NormalizedNotes::notes`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PatternNotes {
    pub name: String,
    pub notes: Vec<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct NormalizedNotes {
    /// Every note, in pattern then storage order
    pub notes: Vec<NoteRecord>,
    /// Groups by pattern display name, in order of first note
    pub groups: Vec<PatternNotes>,
    /// Items that were skipped
    pub skipped: usize,
}

impl NormalizedNotes {
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Notes of one group, in order.
    pub fn group_notes<'a>(
        &'a self,
        group: &'a PatternNotes,
    ) -> impl Iterator<Item = &'a NoteRecord> + 'a {
        group.notes.iter().filter_map(move |&i| self.notes.get(i))
    }

    pub fn group(&self, name: &str) -> Option<&PatternNotes> {
        self.groups.iter().find(|g| g.name == name)
    }

    fn push(&mut self, group: &str, record: NoteRecord) {
        let index = self.notes.len();
        self.notes.push(record);
        match self.groups.iter_mut().find(|g| g.name == group) {
            Some(g) => g.notes.push(index),
            None => self.groups.push(PatternNotes {
                name: group.to_string(),
                notes: vec![index],
            }),
        }
    }
}

/// Stored duration: `duration` when positive, otherwise whichever field is
/// present, floored at one tick.
pub fn resolve_duration(duration: Option<i64>, length: Option<i64>) -> u64 {
    let raw = match (duration, length) {
        (Some(d), _) if d > 0 => d,
        (_, Some(l)) => l,
        (Some(d), None) => d,
        (None, None) => 0,
    };
    raw.max(1) as u64
}

/// Normalize one note item of pattern `pattern`.
pub fn normalize_note(
    item: &NoteItem,
    pattern: usize,
    timing: Timing,
    channels: &ChannelMap,
    options: &NormalizeOptions,
) -> Result<NoteRecord, NoteError> {
    let start_tick = clamp_ticks(item.position.unwrap_or(0));

    let pitch = match &item.key {
        Some(key) => pitch_name(&key.corrected()),
        None => pitch_name(&Pitch::default().corrected()),
    };

    let channel = channels.name(item.channel.unwrap_or(UNKNOWN_CHANNEL));
    let marker = options.percussion_marker.as_str();
    let duration = if !marker.is_empty() && channel.contains(marker) {
        1
    } else {
        resolve_duration(item.duration, item.length)
    };

    let end_tick = start_tick
        .checked_add(duration)
        .ok_or(NoteError::TickOverflow { start: start_tick, duration })?;

    Ok(NoteRecord {
        pattern,
        start_tick,
        end_tick,
        start: timing.position(start_tick),
        end: timing.position(end_tick),
        start_secs: timing.seconds(start_tick),
        end_secs: timing.seconds(end_tick),
        pitch,
        channel: channel.into_owned(),
        duration,
    })
}

/// Normalize the notes of every pattern in the project.
pub fn normalize_notes(
    project: &Project,
    identities: &Identities,
    options: &NormalizeOptions,
) -> NormalizedNotes {
    let timing = project.timing();
    let mut out = NormalizedNotes::default();

    for (p, pattern) in project.patterns.iter().enumerate() {
        let name = identities.patterns.name(p);
        for (n, slot) in pattern.notes.iter().enumerate() {
            let normalized = match slot {
                Some(item) => normalize_note(item, p, timing, &identities.channels, options),
                None => Err(NoteError::MissingItem),
            };
            match normalized {
                Ok(record) => out.push(&name, record),
                Err(err) => {
                    warn!("pattern {:?} note {} skipped: {}", name, n, err);
                    out.skipped += 1;
                }
            }
        }
    }

    debug!(
        "normalized {} notes in {} groups, {} skipped",
        out.notes.len(),
        out.groups.len(),
        out.skipped
    );
    out
}
