//! Channel, pattern and track identity.
//!
//! The decoder hands over ids and names that may be missing, duplicated or
//! stored in one of several version-dependent fields. Everything here turns
//! those into stable display names and compact indices.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

use flp_ir::{Channel, Pattern, PlaylistEvent, Project};
use tracing::debug;

/// Reversed track indices count down from this value: track 1 is 499.
pub const TRACK_RVIDX_OFFSET: i64 = 500;

/// Pattern names are precomputed for at least this many indices.
pub const PATTERN_NAME_SLOTS: usize = 200;

/// Channel id used for notes without a channel reference.
pub const UNKNOWN_CHANNEL: i64 = -1;

fn display_name(name: Option<&str>) -> Option<&str> {
    name.filter(|n| !n.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

/// Channel id -> display name.
#[derive(Clone, Debug, Default)]
pub struct ChannelMap {
    names: BTreeMap<i64, String>,
}

impl ChannelMap {
    /// Build from the stored channel list. A channel without an id takes its
    /// position; without a name it is called `Track N` (1-based).
    pub fn build(channels: &[Channel]) -> Self {
        let mut names = BTreeMap::new();
        for (i, channel) in channels.iter().enumerate() {
            let id = channel.id.unwrap_or(i as i64);
            let name = match display_name(channel.name.as_deref()) {
                Some(name) => name.to_string(),
                None => format!("Track {}", i + 1),
            };
            if let Some(previous) = names.insert(id, name) {
                debug!("channel id {} appears twice, replacing {:?}", id, previous);
            }
        }
        Self { names }
    }

    pub fn get(&self, id: i64) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    /// Display name, `Unknown Track {id}` for ids not in the project.
    pub fn name(&self, id: i64) -> Cow<'_, str> {
        match self.get(id) {
            Some(name) => Cow::Borrowed(name),
            None => Cow::Owned(format!("Unknown Track {}", id)),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

/// Pattern position -> display name.
///
/// Indices past the stored patterns still get a `Pattern N` name, since
/// playlist items can point at patterns that were never saved.
#[derive(Clone, Debug, Default)]
pub struct PatternMap {
    names: Vec<String>,
    iids: Vec<Option<u32>>,
}

impl PatternMap {
    pub fn build(patterns: &[Pattern]) -> Self {
        let slots = patterns.len().max(PATTERN_NAME_SLOTS);
        let names = (0..slots)
            .map(|i| {
                match display_name(patterns.get(i).and_then(|p| p.name.as_deref())) {
                    Some(name) => name.to_string(),
                    None => fallback_pattern_name(i),
                }
            })
            .collect();
        let iids = patterns.iter().map(|p| p.iid).collect();
        Self { names, iids }
    }

    /// Display name for a pattern position. Never fails.
    pub fn name(&self, index: usize) -> Cow<'_, str> {
        match self.names.get(index) {
            Some(name) => Cow::Borrowed(name.as_str()),
            None => Cow::Owned(fallback_pattern_name(index)),
        }
    }

    /// Position of the stored pattern with the given iid.
    pub fn position_of(&self, iid: u32) -> Option<usize> {
        self.iids.iter().position(|&p| p == Some(iid))
    }

    /// Number of patterns actually stored in the project.
    pub fn stored(&self) -> usize {
        self.iids.len()
    }
}

fn fallback_pattern_name(index: usize) -> String {
    format!("Pattern {}", index.saturating_add(1))
}

// ---------------------------------------------------------------------------
// Tracks
// ---------------------------------------------------------------------------

/// Which playlist field a raw track reference came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackRefSource {
    Index,
    Reversed,
    Generic,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawTrackRef {
    pub value: i64,
    pub source: TrackRefSource,
}

/// Raw track reference of a playlist event: `track_index`, then
/// `TRACK_RVIDX_OFFSET - track_rvidx`, then `track`. The first
/// non-negative value wins.
pub fn resolve_track_ref(event: &PlaylistEvent) -> Option<RawTrackRef> {
    let candidates = [
        (event.track_index, TrackRefSource::Index),
        (
            event.track_rvidx.and_then(|r| TRACK_RVIDX_OFFSET.checked_sub(r)),
            TrackRefSource::Reversed,
        ),
        (event.track, TrackRefSource::Generic),
    ];
    candidates.into_iter().find_map(|(value, source)| {
        value
            .filter(|&v| v >= 0)
            .map(|value| RawTrackRef { value, source })
    })
}

/// Raw track reference -> compact index in order of first sight.
#[derive(Clone, Debug, Default)]
pub struct TrackRemap {
    order: Vec<i64>,
    lookup: HashMap<i64, usize>,
}

impl TrackRemap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compact index for `raw`, assigning the next one on first sight.
    pub fn compact(&mut self, raw: i64) -> usize {
        if let Some(&index) = self.lookup.get(&raw) {
            return index;
        }
        let index = self.order.len();
        self.order.push(raw);
        self.lookup.insert(raw, index);
        index
    }

    pub fn get(&self, raw: i64) -> Option<usize> {
        self.lookup.get(&raw).copied()
    }

    /// Raw reference behind a compact index.
    pub fn raw(&self, index: usize) -> Option<i64> {
        self.order.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Per-project identity maps.
#[derive(Clone, Debug, Default)]
pub struct Identities {
    pub channels: ChannelMap,
    pub patterns: PatternMap,
}

impl Identities {
    pub fn build(project: &Project) -> Self {
        let identities = Self {
            channels: ChannelMap::build(&project.channels),
            patterns: PatternMap::build(&project.patterns),
        };
        debug!(
            "identities: {} channels, {} patterns",
            identities.channels.len(),
            identities.patterns.stored()
        );
        identities
    }
}
