//! Timeline assembly.
//!
//! Walks the playlist of the project's arrangement and groups pattern
//! placements and channel clips by compact track index.

use flp_ir::{clamp_ticks, MusicalPosition, PlaylistEvent, Project, Timing};
use thiserror::Error;
use tracing::{debug, warn};

use crate::identity::{resolve_track_ref, Identities, PatternMap, RawTrackRef, TrackRemap};

/// Order of placements within a track.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlacementOrder {
    /// Playlist order
    #[default]
    Encounter,
    /// By start tick; ties keep playlist order
    StartTime,
}

/// Why a playlist event was dropped.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("no usable track reference")]
    NoTrackReference,
    #[error("placement end out of range (start {start}, length {length})")]
    TickOverflow { start: u64, length: u64 },
}

/// A pattern or channel clip placed on a track.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Placement {
    /// Pattern position; `None` for channel clips
    pub pattern_id: Option<usize>,
    /// Pattern name, or the channel name for a clip
    pub pattern_name: String,
    pub start_tick: u64,
    pub end_tick: u64,
    pub length: u64,
    pub start: MusicalPosition,
    pub end: MusicalPosition,
}

/// All placements on one compact track.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackSequence {
    pub index: usize,
    pub raw_ref: i64,
    /// Track name from the arrangement, when it has one
    pub name: Option<String>,
    pub placements: Vec<Placement>,
}

#[derive(Clone, Debug, Default)]
pub struct Timeline {
    /// Tracks by compact index
    pub tracks: Vec<TrackSequence>,
    pub remap: TrackRemap,
    /// Playlist events that were dropped
    pub skipped: usize,
}

impl Timeline {
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn placement_count(&self) -> usize {
        self.tracks.iter().map(|t| t.placements.len()).sum()
    }
}

/// Pattern position a playlist event refers to.
///
/// A back-reference is looked up among the stored patterns and shifted
/// down by one; otherwise the id is `item_index - pattern_base`. Both are
/// clamped at zero.
pub fn resolve_pattern_id(event: &PlaylistEvent, patterns: &PatternMap) -> usize {
    if let Some(reference) = event.pattern {
        match patterns.position_of(reference.iid) {
            Some(position) => return position.saturating_sub(1),
            None => debug!("back-reference to missing pattern iid {}", reference.iid),
        }
    }
    let id = event
        .item_index
        .unwrap_or(0)
        .saturating_sub(event.pattern_base.unwrap_or(0));
    usize::try_from(id.max(0)).unwrap_or(usize::MAX)
}

fn resolve_placement(
    event: &PlaylistEvent,
    identities: &Identities,
    timing: Timing,
) -> Result<(RawTrackRef, Placement), EventError> {
    let start = clamp_ticks(event.start.unwrap_or(0));
    let length = clamp_ticks(event.length.unwrap_or(0));
    let track = resolve_track_ref(event).ok_or(EventError::NoTrackReference)?;
    let end = start
        .checked_add(length)
        .ok_or(EventError::TickOverflow { start, length })?;
    let (pattern_id, name) = match (event.pattern, event.channel) {
        (None, Some(channel)) => (None, identities.channels.name(channel)),
        _ => {
            let id = resolve_pattern_id(event, &identities.patterns);
            (Some(id), identities.patterns.name(id))
        }
    };

    let placement = Placement {
        pattern_id,
        pattern_name: name.into_owned(),
        start_tick: start,
        end_tick: end,
        length,
        start: timing.position(start),
        end: timing.position(end),
    };
    Ok((track, placement))
}

/// Build per-track placement sequences from the project's arrangement.
/// No arrangement or an empty playlist gives an empty timeline.
pub fn assemble_timeline(
    project: &Project,
    identities: &Identities,
    order: PlacementOrder,
) -> Timeline {
    let mut timeline = Timeline::default();
    let Some(arrangement) = project.arrangement() else {
        debug!("project has no arrangement");
        return timeline;
    };
    let timing = project.timing();

    for (i, event) in arrangement.playlist_events().enumerate() {
        let (track, placement) = match resolve_placement(event, identities, timing) {
            Ok(resolved) => resolved,
            Err(err) => {
                warn!("playlist event {} skipped: {}", i, err);
                timeline.skipped += 1;
                continue;
            }
        };
        let index = timeline.remap.compact(track.value);
        if index == timeline.tracks.len() {
            debug!(
                "track {} -> {} (from {:?})",
                track.value, index, track.source
            );
            timeline.tracks.push(TrackSequence {
                index,
                raw_ref: track.value,
                name: arrangement.track_name(track.value).map(String::from),
                placements: Vec::new(),
            });
        }
        timeline.tracks[index].placements.push(placement);
    }

    if order == PlacementOrder::StartTime {
        for track in &mut timeline.tracks {
            track.placements.sort_by_key(|p| p.start_tick);
        }
    }

    debug!(
        "timeline: {} tracks, {} placements, {} skipped",
        timeline.tracks.len(),
        timeline.placement_count(),
        timeline.skipped
    );
    timeline
}
