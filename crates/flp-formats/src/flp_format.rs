//! FL Studio project (FLP) parser.
//!
//! An FLP file is a 6-byte `FLhd` header chunk followed by one `FLdt`
//! chunk holding a flat stream of id-tagged events. Which channel, pattern
//! or arrangement an event belongs to is implied by the events before it,
//! so the decoder walks the stream once and tracks the current scope.

use std::io::Cursor;

use binrw::BinRead;
use flp_ir::{
    Arrangement, ArrangementEvent, Channel, NoteItem, Pattern, Pitch, PlaylistEvent, Project,
    TimeMarker, TrackInfo, DEFAULT_TEMPO,
};
use tracing::{debug, warn};

use crate::FormatError;

// ---------------------------------------------------------------------------
// FlpReader: cursor over a byte slice
// ---------------------------------------------------------------------------

struct FlpReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> FlpReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn read_u8(&mut self) -> Result<u8, FormatError> {
        if self.pos >= self.data.len() {
            return Err(FormatError::UnexpectedEof);
        }
        let v = self.data[self.pos];
        self.pos += 1;
        Ok(v)
    }

    fn read_u16_le(&mut self) -> Result<u16, FormatError> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn read_u32_le(&mut self) -> Result<u32, FormatError> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], FormatError> {
        if n > self.data.len() - self.pos {
            return Err(FormatError::UnexpectedEof);
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Read a 7-bit little-endian varint (at most five bytes).
    fn read_varint(&mut self) -> Result<usize, FormatError> {
        let start = self.pos;
        let mut value: usize = 0;
        let mut shift = 0;
        loop {
            let byte = self.read_u8()?;
            value |= ((byte & 0x7F) as usize) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
            if shift > 28 {
                return Err(FormatError::InvalidLength(start));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

// Id ranges decide the payload size.
const WORD: u8 = 64;
const DWORD: u8 = 128;
const TEXT: u8 = 192;
const DATA: u8 = 208;

const CHAN_NEW: u8 = WORD;
const PAT_NEW: u8 = WORD + 1;
const TEMPO: u8 = WORD + 2;
const SLOT_INDEX: u8 = WORD + 34;
const ARR_NEW: u8 = WORD + 35;
const ARR_CURRENT: u8 = WORD + 36;
const MARKER_POSITION: u8 = DWORD + 20;
const FINE_TEMPO: u8 = DWORD + 28;
const PAT_NAME: u8 = TEXT + 1;
const TITLE: u8 = TEXT + 2;
const FL_VERSION: u8 = TEXT + 7;
const PLUGIN_INTERNAL_NAME: u8 = TEXT + 9;
const PLUGIN_NAME: u8 = TEXT + 11;
const INSERT_NAME: u8 = TEXT + 12;
const MARKER_NAME: u8 = TEXT + 13;
const PAT_NOTES: u8 = DATA + 16;
const MIXER_PARAMS: u8 = DATA + 17;
const PLAYLIST: u8 = DATA + 25;
const INSERT_FLAGS: u8 = DATA + 28;
const TRACK_DATA: u8 = DATA + 30;
const TRACK_NAME: u8 = TEXT + 47;
const ARR_NAME: u8 = TEXT + 49;

/// High bits of a marker position hold the marker type.
const MARKER_POSITION_MASK: u32 = 0x07FF_FFFF;

#[derive(Clone, Copy, Debug)]
enum EventData<'a> {
    Byte(u8),
    Word(u16),
    Dword(u32),
    Blob(&'a [u8]),
}

#[derive(Clone, Copy, Debug)]
struct Event<'a> {
    id: u8,
    data: EventData<'a>,
}

fn read_event<'a>(r: &mut FlpReader<'a>) -> Result<Event<'a>, FormatError> {
    let id = r.read_u8()?;
    let data = if id < WORD {
        EventData::Byte(r.read_u8()?)
    } else if id < DWORD {
        EventData::Word(r.read_u16_le()?)
    } else if id < TEXT {
        EventData::Dword(r.read_u32_le()?)
    } else {
        let len = r.read_varint()?;
        EventData::Blob(r.read_bytes(len)?)
    };
    Ok(Event { id, data })
}

// ---------------------------------------------------------------------------
// Fixed-size records
// ---------------------------------------------------------------------------

const NOTE_RECORD_SIZE: usize = 24;
const PLAYLIST_RECORD_SIZE: usize = 32;
/// FL 21 appends 28 bytes to every playlist record.
const PLAYLIST_RECORD_SIZE_V21: usize = 60;

#[derive(BinRead, Debug)]
#[br(little)]
struct NoteRecord {
    position: u32,
    #[allow(dead_code)]
    flags: u16,
    rack_channel: u16,
    length: u32,
    key: u16,
    #[allow(dead_code)]
    group: u16,
    #[allow(dead_code)]
    fine_pitch: u8,
    _reserved: u8,
    #[allow(dead_code)]
    release: u8,
    #[allow(dead_code)]
    midi_channel: u8,
    #[allow(dead_code)]
    pan: u8,
    velocity: u8,
    #[allow(dead_code)]
    mod_x: u8,
    #[allow(dead_code)]
    mod_y: u8,
}

impl From<NoteRecord> for NoteItem {
    fn from(r: NoteRecord) -> Self {
        NoteItem {
            position: Some(r.position as i64),
            key: Some(Pitch::Numeric(r.key as i32)),
            duration: None,
            length: Some(r.length as i64),
            channel: Some(r.rack_channel as i64),
            velocity: Some(r.velocity),
        }
    }
}

#[derive(BinRead, Debug)]
#[br(little)]
struct PlaylistRecord {
    position: u32,
    pattern_base: u16,
    item_index: u16,
    length: u32,
    track_rvidx: u16,
    #[allow(dead_code)]
    group: u16,
    _unknown1: [u8; 2],
    #[allow(dead_code)]
    item_flags: u16,
    _unknown2: [u8; 4],
    #[allow(dead_code)]
    start_offset: f32,
    #[allow(dead_code)]
    end_offset: f32,
}

impl From<PlaylistRecord> for PlaylistEvent {
    fn from(r: PlaylistRecord) -> Self {
        PlaylistEvent {
            start: Some(r.position as i64),
            length: Some(r.length as i64),
            track_rvidx: Some(r.track_rvidx as i64),
            item_index: Some(r.item_index as i64),
            pattern_base: Some(r.pattern_base as i64),
            ..PlaylistEvent::default()
        }
    }
}

/// Decode a pattern's note blob. A short trailing record becomes `None`.
fn decode_notes(data: &[u8]) -> Vec<Option<NoteItem>> {
    data.chunks(NOTE_RECORD_SIZE)
        .map(|chunk| match NoteRecord::read(&mut Cursor::new(chunk)) {
            Ok(record) => Some(NoteItem::from(record)),
            Err(err) => {
                debug!("unreadable note record ({} bytes): {}", chunk.len(), err);
                None
            }
        })
        .collect()
}

fn playlist_record_size(len: usize, version: Option<(u32, u32)>) -> usize {
    match version {
        Some((major, _)) if major >= 21 => PLAYLIST_RECORD_SIZE_V21,
        Some(_) => PLAYLIST_RECORD_SIZE,
        None if len % PLAYLIST_RECORD_SIZE != 0 && len % PLAYLIST_RECORD_SIZE_V21 == 0 => {
            PLAYLIST_RECORD_SIZE_V21
        }
        None => PLAYLIST_RECORD_SIZE,
    }
}

fn decode_playlist(data: &[u8], record_size: usize) -> Vec<PlaylistEvent> {
    let records = data.chunks_exact(record_size);
    if !records.remainder().is_empty() {
        warn!(
            "playlist has {} trailing bytes after {} records of {} bytes",
            records.remainder().len(),
            data.len() / record_size,
            record_size
        );
    }
    records
        .filter_map(|chunk| match PlaylistRecord::read(&mut Cursor::new(chunk)) {
            Ok(record) => Some(PlaylistEvent::from(record)),
            Err(err) => {
                warn!("unreadable playlist record: {}", err);
                None
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

/// Decode a text event. FL 11.5+ writes UTF-16LE, older versions ANSI.
/// Returns `None` for empty or undecodable text.
fn decode_text(bytes: &[u8], unicode: bool) -> Option<String> {
    let text = if unicode {
        if bytes.len() % 2 != 0 {
            return None;
        }
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16(&units).ok()?
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    };
    let trimmed = text.trim_end_matches('\0');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parse "major.minor[.patch.build]".
fn parse_version(s: &str) -> Option<(u32, u32)> {
    let mut parts = s.trim().split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().map_or(Some(0), |p| p.parse().ok())?;
    Some((major, minor))
}

// ---------------------------------------------------------------------------
// Decoder state
// ---------------------------------------------------------------------------

/// What the next scoped event attaches to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Scope {
    Project,
    Channel(usize),
    Pattern(usize),
    Arrangement,
    Mixer,
}

struct FlpDecoder {
    project: Project,
    scope: Scope,
    version: Option<(u32, u32)>,
    fine_tempo: bool,
    ignored: usize,
}

impl FlpDecoder {
    fn new(ppq: u16) -> Self {
        Self {
            project: Project::new(DEFAULT_TEMPO, ppq as u32),
            scope: Scope::Project,
            version: None,
            fine_tempo: false,
            ignored: 0,
        }
    }

    fn unicode(&self) -> bool {
        self.version.map_or(false, |v| v >= (11, 5))
    }

    fn text(&self, bytes: &[u8]) -> Option<String> {
        decode_text(bytes, self.unicode())
    }

    fn apply(&mut self, event: Event<'_>) {
        match (event.id, event.data) {
            (FL_VERSION, EventData::Blob(b)) => {
                let version = decode_text(b, false);
                self.version = version.as_deref().and_then(parse_version);
                debug!("FL version {:?}", version);
                self.project.version = version;
            }
            (TITLE, EventData::Blob(b)) => self.project.title = self.text(b),
            (TEMPO, EventData::Word(bpm)) => {
                if !self.fine_tempo {
                    self.project.tempo = bpm as f64;
                }
            }
            (FINE_TEMPO, EventData::Dword(milli_bpm)) => {
                self.project.tempo = milli_bpm as f64 / 1000.0;
                self.fine_tempo = true;
            }
            (CHAN_NEW, EventData::Word(iid)) => {
                self.project.channels.push(Channel {
                    id: Some(iid as i64),
                    ..Channel::default()
                });
                self.scope = Scope::Channel(self.project.channels.len() - 1);
            }
            (PLUGIN_INTERNAL_NAME, EventData::Blob(b)) => {
                if let Scope::Channel(i) = self.scope {
                    let plugin = self.text(b);
                    self.project.channels[i].plugin = plugin;
                }
            }
            (PLUGIN_NAME, EventData::Blob(b)) => {
                if let Scope::Channel(i) = self.scope {
                    let name = self.text(b);
                    self.project.channels[i].name = name;
                }
            }
            (SLOT_INDEX | INSERT_NAME | MIXER_PARAMS | INSERT_FLAGS, _) => {
                self.scope = Scope::Mixer;
            }
            (PAT_NEW, EventData::Word(iid)) => {
                let i = self.pattern_slot(iid as u32);
                self.scope = Scope::Pattern(i);
            }
            (PAT_NAME, EventData::Blob(b)) => {
                if let Scope::Pattern(i) = self.scope {
                    let name = self.text(b);
                    self.project.patterns[i].name = name;
                }
            }
            (PAT_NOTES, EventData::Blob(b)) => match self.scope {
                Scope::Pattern(i) => self.project.patterns[i].notes.extend(decode_notes(b)),
                scope => warn!("note data outside a pattern ({:?}), {} bytes dropped", scope, b.len()),
            },
            (ARR_CURRENT, EventData::Word(iid)) => {
                self.project.current_arrangement = Some(iid as u32);
            }
            (ARR_NEW, EventData::Word(iid)) => {
                self.project.arrangements.push(Arrangement {
                    iid: Some(iid as u32),
                    ..Arrangement::default()
                });
                self.scope = Scope::Arrangement;
            }
            (ARR_NAME, EventData::Blob(b)) => {
                if self.scope == Scope::Arrangement {
                    let name = self.text(b);
                    self.arrangement_mut().name = name;
                }
            }
            (PLAYLIST, EventData::Blob(b)) => {
                let size = playlist_record_size(b.len(), self.version);
                let items = decode_playlist(b, size);
                debug!("playlist: {} items of {} bytes", items.len(), size);
                self.arrangement_mut()
                    .playlist
                    .get_or_insert_with(Vec::new)
                    .extend(items);
                self.scope = Scope::Arrangement;
            }
            (TRACK_DATA, EventData::Blob(b)) => {
                let index = b
                    .get(..4)
                    .map(|iid| u32::from_le_bytes([iid[0], iid[1], iid[2], iid[3]]) as i64);
                self.push_arrangement_event(ArrangementEvent::Track(TrackInfo { index, name: None }));
            }
            (TRACK_NAME, EventData::Blob(b)) => {
                let name = self.text(b);
                if let Some(ArrangementEvent::Track(track)) = self.last_arrangement_event() {
                    track.name = name;
                }
            }
            (MARKER_POSITION, EventData::Dword(pos)) => {
                self.push_arrangement_event(ArrangementEvent::TimeMarker(TimeMarker {
                    position: Some((pos & MARKER_POSITION_MASK) as i64),
                    name: None,
                }));
            }
            (MARKER_NAME, EventData::Blob(b)) => {
                let name = self.text(b);
                if let Some(ArrangementEvent::TimeMarker(marker)) = self.last_arrangement_event() {
                    marker.name = name;
                }
            }
            _ => self.ignored += 1,
        }
    }

    /// Index of the pattern with `iid`, created on first sight. Pattern
    /// notes and names arrive in separate blocks of the event stream.
    fn pattern_slot(&mut self, iid: u32) -> usize {
        if let Some(i) = self.project.patterns.iter().position(|p| p.iid == Some(iid)) {
            return i;
        }
        self.project.patterns.push(Pattern {
            iid: Some(iid),
            ..Pattern::default()
        });
        self.project.patterns.len() - 1
    }

    /// The arrangement being decoded. Files older than FL 12.9 have no
    /// arrangement header, so one is created on demand.
    fn arrangement_mut(&mut self) -> &mut Arrangement {
        if self.project.arrangements.is_empty() {
            debug!("arrangement data without an arrangement header, using an implicit one");
            self.project.arrangements.push(Arrangement::default());
        }
        let last = self.project.arrangements.len() - 1;
        &mut self.project.arrangements[last]
    }

    fn push_arrangement_event(&mut self, event: ArrangementEvent) {
        self.arrangement_mut()
            .events
            .get_or_insert_with(Vec::new)
            .push(event);
        self.scope = Scope::Arrangement;
    }

    fn last_arrangement_event(&mut self) -> Option<&mut ArrangementEvent> {
        self.arrangement_mut().events.as_mut()?.last_mut()
    }

    fn finish(mut self) -> Project {
        self.project.patterns.sort_by_key(|p| p.iid);
        let iids: Vec<Option<u32>> = self.project.patterns.iter().map(|p| p.iid).collect();
        for arrangement in &mut self.project.arrangements {
            let mixed = arrangement
                .events
                .iter_mut()
                .flatten()
                .filter_map(|e| match e {
                    ArrangementEvent::Playlist(event) => Some(event),
                    _ => None,
                });
            for event in arrangement.playlist.iter_mut().flatten().chain(mixed) {
                link_playlist_item(event, &iids);
            }
        }
        debug!("{} events ignored", self.ignored);
        self.project
    }
}

/// Rewrite a raw playlist item against the stored patterns.
///
/// FL numbers pattern items `pattern_base + iid`. These become
/// `pattern_base + position`. Items at or below the base are channel clips.
fn link_playlist_item(event: &mut PlaylistEvent, iids: &[Option<u32>]) {
    let (Some(item), Some(base)) = (event.item_index, event.pattern_base) else {
        return;
    };
    if item <= base {
        event.channel = Some(item);
        event.item_index = None;
        return;
    }
    let iid = item - base;
    let position = u32::try_from(iid)
        .ok()
        .and_then(|iid| iids.iter().position(|&p| p == Some(iid)));
    event.item_index = Some(match position {
        Some(position) => base + position as i64,
        None => {
            debug!("playlist item refers to unsaved pattern {}", iid);
            item - 1
        }
    });
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

struct FlpHeader {
    format: i16,
    channel_count: u16,
    ppq: u16,
    data_len: usize,
}

fn parse_header(r: &mut FlpReader) -> Result<FlpHeader, FormatError> {
    if r.read_bytes(4)? != b"FLhd" {
        return Err(FormatError::InvalidHeader);
    }
    if r.read_u32_le()? != 6 {
        return Err(FormatError::InvalidHeader);
    }
    let format = r.read_u16_le()? as i16;
    let channel_count = r.read_u16_le()?;
    let ppq = r.read_u16_le()?;
    if r.read_bytes(4)? != b"FLdt" {
        return Err(FormatError::InvalidHeader);
    }
    let data_len = r.read_u32_le()? as usize;
    Ok(FlpHeader { format, channel_count, ppq, data_len })
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Load an FLP file from bytes into a Project.
pub fn load_flp(data: &[u8]) -> Result<Project, FormatError> {
    let mut r = FlpReader::new(data);
    let header = parse_header(&mut r)?;
    debug!(
        "FLP header: format={} channels={} ppq={} data={} bytes",
        header.format, header.channel_count, header.ppq, header.data_len
    );

    let mut events = FlpReader::new(r.read_bytes(header.data_len)?);
    let mut decoder = FlpDecoder::new(header.ppq);
    let mut count = 0usize;
    while !events.is_empty() {
        let event = read_event(&mut events)?;
        decoder.apply(event);
        count += 1;
    }

    let project = decoder.finish();
    debug!(
        "FLP loaded: {} events, {} channels, {} patterns, {} arrangements, tempo={}",
        count,
        project.channels.len(),
        project.patterns.len(),
        project.arrangements.len(),
        project.tempo,
    );
    Ok(project)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_word(buf: &mut Vec<u8>, id: u8, v: u16) {
        buf.push(id);
        buf.extend_from_slice(&v.to_le_bytes());
    }

    fn push_dword(buf: &mut Vec<u8>, id: u8, v: u32) {
        buf.push(id);
        buf.extend_from_slice(&v.to_le_bytes());
    }

    fn push_blob(buf: &mut Vec<u8>, id: u8, data: &[u8]) {
        buf.push(id);
        let mut len = data.len();
        loop {
            let byte = (len & 0x7F) as u8;
            len >>= 7;
            if len == 0 {
                buf.push(byte);
                break;
            }
            buf.push(byte | 0x80);
        }
        buf.extend_from_slice(data);
    }

    fn utf16z(s: &str) -> Vec<u8> {
        s.encode_utf16()
            .chain(std::iter::once(0))
            .flat_map(u16::to_le_bytes)
            .collect()
    }

    fn asciiz(s: &str) -> Vec<u8> {
        let mut v = s.as_bytes().to_vec();
        v.push(0);
        v
    }

    fn note_bytes(position: u32, channel: u16, length: u32, key: u16) -> Vec<u8> {
        let mut v = Vec::with_capacity(NOTE_RECORD_SIZE);
        v.extend_from_slice(&position.to_le_bytes());
        v.extend_from_slice(&0x4000u16.to_le_bytes());
        v.extend_from_slice(&channel.to_le_bytes());
        v.extend_from_slice(&length.to_le_bytes());
        v.extend_from_slice(&key.to_le_bytes());
        v.extend_from_slice(&0u16.to_le_bytes());
        v.extend_from_slice(&[120, 0, 64, 0, 64, 100, 128, 128]);
        v
    }

    fn playlist_bytes(position: u32, item_index: u16, length: u32, rvidx: u16, size: usize) -> Vec<u8> {
        let mut v = Vec::with_capacity(size);
        v.extend_from_slice(&position.to_le_bytes());
        v.extend_from_slice(&20480u16.to_le_bytes());
        v.extend_from_slice(&item_index.to_le_bytes());
        v.extend_from_slice(&length.to_le_bytes());
        v.extend_from_slice(&rvidx.to_le_bytes());
        v.extend_from_slice(&0u16.to_le_bytes());
        v.extend_from_slice(&[120, 0]);
        v.extend_from_slice(&64u16.to_le_bytes());
        v.extend_from_slice(&[64, 100, 128, 128]);
        v.extend_from_slice(&(-1.0f32).to_le_bytes());
        v.extend_from_slice(&(-1.0f32).to_le_bytes());
        v.resize(size, 0);
        v
    }

    fn make_flp(ppq: u16, events: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"FLhd");
        buf.extend_from_slice(&6u32.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.extend_from_slice(&ppq.to_le_bytes());
        buf.extend_from_slice(b"FLdt");
        buf.extend_from_slice(&(events.len() as u32).to_le_bytes());
        buf.extend_from_slice(events);
        buf
    }

    fn modern_events() -> Vec<u8> {
        let mut ev = Vec::new();
        push_blob(&mut ev, FL_VERSION, &asciiz("20.8.4.2576"));
        ev
    }

    #[test]
    fn minimal_flp_loads() {
        let project = load_flp(&make_flp(96, &[])).unwrap();
        assert_eq!(project.ppq, 96);
        assert_eq!(project.tempo, DEFAULT_TEMPO);
        assert!(project.channels.is_empty());
        assert!(project.patterns.is_empty());
        assert!(project.arrangements.is_empty());
    }

    #[test]
    fn invalid_magic_rejected() {
        assert!(matches!(load_flp(b"RIFF\x06\0\0\0"), Err(FormatError::InvalidHeader)));
    }

    #[test]
    fn too_short_rejected() {
        assert!(matches!(load_flp(b"FLh"), Err(FormatError::UnexpectedEof)));
    }

    #[test]
    fn wrong_header_length_rejected() {
        let mut data = make_flp(96, &[]);
        data[4] = 8;
        assert!(matches!(load_flp(&data), Err(FormatError::InvalidHeader)));
    }

    #[test]
    fn truncated_event_chunk_rejected() {
        let mut ev = Vec::new();
        push_word(&mut ev, TEMPO, 140);
        let mut data = make_flp(96, &ev);
        data.truncate(data.len() - 1);
        assert!(matches!(load_flp(&data), Err(FormatError::UnexpectedEof)));
    }

    #[test]
    fn overlong_varint_rejected() {
        let ev = [PAT_NOTES, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
        assert!(matches!(
            load_flp(&make_flp(96, &ev)),
            Err(FormatError::InvalidLength(_))
        ));
    }

    #[test]
    fn multi_byte_length_prefix() {
        // 8 notes = 192 bytes, needs a two-byte varint
        let mut ev = modern_events();
        push_word(&mut ev, PAT_NEW, 1);
        let notes: Vec<u8> = (0..8).flat_map(|i| note_bytes(i * 96, 0, 96, 60)).collect();
        push_blob(&mut ev, PAT_NOTES, &notes);
        let project = load_flp(&make_flp(96, &ev)).unwrap();
        assert_eq!(project.patterns[0].notes.len(), 8);
        let last = project.patterns[0].notes[7].as_ref().unwrap();
        assert_eq!(last.position, Some(7 * 96));
    }

    #[test]
    fn fine_tempo_preferred_over_coarse() {
        let mut ev = Vec::new();
        push_word(&mut ev, TEMPO, 130);
        push_dword(&mut ev, FINE_TEMPO, 140_500);
        push_word(&mut ev, TEMPO, 90);
        let project = load_flp(&make_flp(96, &ev)).unwrap();
        assert_eq!(project.tempo, 140.5);
    }

    #[test]
    fn coarse_tempo_alone() {
        let mut ev = Vec::new();
        push_word(&mut ev, TEMPO, 128);
        assert_eq!(load_flp(&make_flp(96, &ev)).unwrap().tempo, 128.0);
    }

    #[test]
    fn channel_names_utf16() {
        let mut ev = modern_events();
        push_word(&mut ev, CHAN_NEW, 0);
        push_blob(&mut ev, PLUGIN_INTERNAL_NAME, &utf16z("Fruity DrumSynth Live"));
        push_blob(&mut ev, PLUGIN_NAME, &utf16z("鼓组 Kick"));
        push_word(&mut ev, CHAN_NEW, 3);
        let project = load_flp(&make_flp(96, &ev)).unwrap();
        assert_eq!(project.version.as_deref(), Some("20.8.4.2576"));
        assert_eq!(project.channels.len(), 2);
        assert_eq!(project.channels[0].id, Some(0));
        assert_eq!(project.channels[0].name.as_deref(), Some("鼓组 Kick"));
        assert_eq!(project.channels[0].plugin.as_deref(), Some("Fruity DrumSynth Live"));
        assert_eq!(project.channels[1].id, Some(3));
        assert_eq!(project.channels[1].name, None);
    }

    #[test]
    fn old_versions_use_ansi_text() {
        let mut ev = Vec::new();
        push_blob(&mut ev, FL_VERSION, &asciiz("9.1.0"));
        push_word(&mut ev, CHAN_NEW, 0);
        push_blob(&mut ev, PLUGIN_NAME, &asciiz("Bass"));
        let project = load_flp(&make_flp(96, &ev)).unwrap();
        assert_eq!(project.channels[0].name.as_deref(), Some("Bass"));
    }

    #[test]
    fn mixer_plugin_names_not_attributed_to_channels() {
        let mut ev = modern_events();
        push_word(&mut ev, CHAN_NEW, 0);
        push_blob(&mut ev, PLUGIN_NAME, &utf16z("Lead"));
        push_blob(&mut ev, INSERT_FLAGS, &[0; 12]);
        push_word(&mut ev, SLOT_INDEX, 0);
        push_blob(&mut ev, PLUGIN_NAME, &utf16z("Fruity Limiter"));
        let project = load_flp(&make_flp(96, &ev)).unwrap();
        assert_eq!(project.channels[0].name.as_deref(), Some("Lead"));
    }

    #[test]
    fn patterns_merge_by_iid_and_sort() {
        let mut ev = modern_events();
        push_word(&mut ev, PAT_NEW, 2);
        push_blob(&mut ev, PAT_NOTES, &note_bytes(0, 0, 48, 62));
        push_word(&mut ev, PAT_NEW, 1);
        push_blob(&mut ev, PAT_NAME, &utf16z("Intro"));
        push_word(&mut ev, PAT_NEW, 2);
        push_blob(&mut ev, PAT_NAME, &utf16z("Verse"));
        let project = load_flp(&make_flp(96, &ev)).unwrap();
        assert_eq!(project.patterns.len(), 2);
        assert_eq!(project.patterns[0].iid, Some(1));
        assert_eq!(project.patterns[0].name.as_deref(), Some("Intro"));
        assert!(project.patterns[0].notes.is_empty());
        assert_eq!(project.patterns[1].name.as_deref(), Some("Verse"));
        let note = project.patterns[1].notes[0].as_ref().unwrap();
        assert_eq!(note.key, Some(Pitch::Numeric(62)));
        assert_eq!(note.length, Some(48));
        assert_eq!(note.duration, None);
        assert_eq!(note.velocity, Some(100));
    }

    #[test]
    fn short_trailing_note_is_absent() {
        let mut ev = modern_events();
        push_word(&mut ev, PAT_NEW, 1);
        let mut notes = note_bytes(96, 1, 24, 60);
        notes.extend_from_slice(&[1, 2, 3]);
        push_blob(&mut ev, PAT_NOTES, &notes);
        let project = load_flp(&make_flp(96, &ev)).unwrap();
        let slots = &project.patterns[0].notes;
        assert_eq!(slots.len(), 2);
        assert!(slots[0].is_some());
        assert!(slots[1].is_none());
    }

    #[test]
    fn notes_outside_pattern_dropped() {
        let mut ev = modern_events();
        push_blob(&mut ev, PAT_NOTES, &note_bytes(0, 0, 48, 60));
        let project = load_flp(&make_flp(96, &ev)).unwrap();
        assert!(project.patterns.is_empty());
    }

    #[test]
    fn playlist_without_header_gets_implicit_arrangement() {
        let mut ev = Vec::new();
        push_blob(&mut ev, FL_VERSION, &asciiz("12.3.0"));
        let mut items = playlist_bytes(0, 20481, 384, 499, PLAYLIST_RECORD_SIZE);
        items.extend(playlist_bytes(384, 20482, 192, 490, PLAYLIST_RECORD_SIZE));
        push_blob(&mut ev, PLAYLIST, &items);
        let project = load_flp(&make_flp(96, &ev)).unwrap();
        assert_eq!(project.arrangements.len(), 1);
        let arr = project.arrangement().unwrap();
        let events: Vec<_> = arr.playlist_events().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].start, Some(384));
        assert_eq!(events[1].length, Some(192));
        assert_eq!(events[1].track_rvidx, Some(490));
        // no saved patterns: iid 2 keeps its dense position 1
        assert_eq!(events[1].item_index, Some(20481));
        assert_eq!(events[1].pattern_base, Some(20480));
        assert_eq!(events[1].track_index, None);
        assert_eq!(events[1].pattern, None);
        assert_eq!(events[1].channel, None);
    }

    #[test]
    fn playlist_items_count_pattern_positions() {
        let mut ev = modern_events();
        push_word(&mut ev, PAT_NEW, 3);
        push_blob(&mut ev, PAT_NAME, &utf16z("Chorus"));
        push_word(&mut ev, PAT_NEW, 1);
        push_blob(&mut ev, PAT_NAME, &utf16z("Verse"));
        push_word(&mut ev, ARR_NEW, 0);
        let mut items = playlist_bytes(0, 20481, 384, 499, PLAYLIST_RECORD_SIZE);
        items.extend(playlist_bytes(384, 20483, 384, 499, PLAYLIST_RECORD_SIZE));
        items.extend(playlist_bytes(0, 5, 768, 498, PLAYLIST_RECORD_SIZE));
        push_blob(&mut ev, PLAYLIST, &items);

        let project = load_flp(&make_flp(96, &ev)).unwrap();
        let names: Vec<_> = project.patterns.iter().map(|p| p.name.as_deref()).collect();
        assert_eq!(names, vec![Some("Verse"), Some("Chorus")]);
        let items: Vec<_> = project
            .arrangement()
            .unwrap()
            .playlist_events()
            .map(|e| (e.item_index, e.channel))
            .collect();
        assert_eq!(
            items,
            vec![(Some(20480), None), (Some(20481), None), (None, Some(5))]
        );
    }

    #[test]
    fn fl21_playlist_records() {
        let mut ev = Vec::new();
        push_blob(&mut ev, FL_VERSION, &asciiz("21.0.3.3517"));
        push_word(&mut ev, ARR_NEW, 0);
        let mut items = playlist_bytes(96, 20481, 96, 499, PLAYLIST_RECORD_SIZE_V21);
        items.extend(playlist_bytes(192, 20481, 96, 498, PLAYLIST_RECORD_SIZE_V21));
        push_blob(&mut ev, PLAYLIST, &items);
        let project = load_flp(&make_flp(96, &ev)).unwrap();
        let starts: Vec<_> = project
            .arrangement()
            .unwrap()
            .playlist_events()
            .map(|e| e.start)
            .collect();
        assert_eq!(starts, vec![Some(96), Some(192)]);
    }

    #[test]
    fn arrangements_tracks_and_markers() {
        let mut ev = modern_events();
        push_word(&mut ev, ARR_CURRENT, 1);
        push_word(&mut ev, ARR_NEW, 0);
        push_blob(&mut ev, ARR_NAME, &utf16z("Sketch"));
        push_word(&mut ev, ARR_NEW, 1);
        push_blob(&mut ev, ARR_NAME, &utf16z("Final"));
        push_blob(&mut ev, PLAYLIST, &playlist_bytes(0, 20481, 384, 499, PLAYLIST_RECORD_SIZE));
        push_dword(&mut ev, MARKER_POSITION, 384 | 0x0800_0000);
        push_blob(&mut ev, MARKER_NAME, &utf16z("Drop"));
        let mut track = 1u32.to_le_bytes().to_vec();
        track.extend_from_slice(&[0; 20]);
        push_blob(&mut ev, TRACK_DATA, &track);
        push_blob(&mut ev, TRACK_NAME, &utf16z("Drums"));

        let project = load_flp(&make_flp(96, &ev)).unwrap();
        assert_eq!(project.arrangements.len(), 2);
        let arr = project.arrangement().unwrap();
        assert_eq!(arr.name.as_deref(), Some("Final"));
        assert_eq!(arr.playlist_events().count(), 1);
        assert_eq!(arr.track_name(1), Some("Drums"));
        let events = arr.events.as_ref().unwrap();
        assert_eq!(
            events[0],
            ArrangementEvent::TimeMarker(TimeMarker {
                position: Some(384),
                name: Some(String::from("Drop")),
            })
        );
    }

    #[test]
    fn decode_text_rejects_bad_utf16() {
        assert_eq!(decode_text(&[0x00, 0xD8], true), None);
        assert_eq!(decode_text(&[0x41], true), None);
        assert_eq!(decode_text(&[0, 0], true), None);
        assert_eq!(decode_text(b"Lead\0", false).as_deref(), Some("Lead"));
    }

    #[test]
    fn version_parsing() {
        assert_eq!(parse_version("20.8.4.2576"), Some((20, 8)));
        assert_eq!(parse_version("21"), Some((21, 0)));
        assert_eq!(parse_version("x.1"), None);
    }

    #[test]
    fn playlist_size_detection() {
        assert_eq!(playlist_record_size(64, Some((20, 8))), PLAYLIST_RECORD_SIZE);
        assert_eq!(playlist_record_size(120, Some((21, 0))), PLAYLIST_RECORD_SIZE_V21);
        assert_eq!(playlist_record_size(60, None), PLAYLIST_RECORD_SIZE_V21);
        assert_eq!(playlist_record_size(960, None), PLAYLIST_RECORD_SIZE);
    }
}
