//! Reconstruction layer for flpinfo.
//!
//! Takes a decoded [`flp_ir::Project`] and derives everything the reports
//! show: display names for channels and patterns, normalized notes, and the
//! per-track sequence of pattern placements. All results are plain values
//! built once per project.

pub mod identity;
pub mod notes;
pub mod timeline;

pub use identity::{
    resolve_track_ref, ChannelMap, Identities, PatternMap, RawTrackRef, TrackRefSource,
    TrackRemap, PATTERN_NAME_SLOTS, TRACK_RVIDX_OFFSET, UNKNOWN_CHANNEL,
};
pub use notes::{
    normalize_note, normalize_notes, resolve_duration, NormalizeOptions, NormalizedNotes,
    NoteError, NoteRecord, PatternNotes, DEFAULT_PERCUSSION_MARKER,
};
pub use timeline::{
    assemble_timeline, resolve_pattern_id, EventError, Placement, PlacementOrder, Timeline,
    TrackSequence,
};
