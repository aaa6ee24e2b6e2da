//! Synthetic FLP files for the integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

pub const CHAN_NEW: u8 = 64;
pub const PAT_NEW: u8 = 65;
pub const ARR_NEW: u8 = 99;
pub const FINE_TEMPO: u8 = 156;
pub const PAT_NAME: u8 = 193;
pub const FL_VERSION: u8 = 199;
pub const PLUGIN_NAME: u8 = 203;
pub const PAT_NOTES: u8 = 224;
pub const PLAYLIST: u8 = 233;

/// Builds an FLP file event by event.
pub struct FlpBuilder {
    ppq: u16,
    events: Vec<u8>,
}

impl FlpBuilder {
    /// An FL 20 project at the given tempo.
    pub fn new(tempo: f64, ppq: u16) -> Self {
        let mut b = Self { ppq, events: Vec::new() };
        b.blob(FL_VERSION, b"20.8.4.2576\0");
        b.dword(FINE_TEMPO, (tempo * 1000.0) as u32);
        b
    }

    pub fn word(&mut self, id: u8, v: u16) -> &mut Self {
        self.events.push(id);
        self.events.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn dword(&mut self, id: u8, v: u32) -> &mut Self {
        self.events.push(id);
        self.events.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn blob(&mut self, id: u8, data: &[u8]) -> &mut Self {
        self.events.push(id);
        let mut len = data.len();
        while len >= 0x80 {
            self.events.push((len & 0x7F) as u8 | 0x80);
            len >>= 7;
        }
        self.events.push(len as u8);
        self.events.extend_from_slice(data);
        self
    }

    pub fn text(&mut self, id: u8, s: &str) -> &mut Self {
        let bytes: Vec<u8> = s
            .encode_utf16()
            .chain(std::iter::once(0))
            .flat_map(u16::to_le_bytes)
            .collect();
        self.blob(id, &bytes)
    }

    pub fn channel(&mut self, iid: u16, name: &str) -> &mut Self {
        self.word(CHAN_NEW, iid).text(PLUGIN_NAME, name)
    }

    /// A pattern with `(position, channel, length, key)` notes.
    pub fn pattern(&mut self, iid: u16, name: &str, notes: &[(u32, u16, u32, u16)]) -> &mut Self {
        self.word(PAT_NEW, iid).text(PAT_NAME, name);
        if notes.is_empty() {
            return self;
        }
        let mut data = Vec::new();
        for &(position, channel, length, key) in notes {
            data.extend_from_slice(&position.to_le_bytes());
            data.extend_from_slice(&0u16.to_le_bytes());
            data.extend_from_slice(&channel.to_le_bytes());
            data.extend_from_slice(&length.to_le_bytes());
            data.extend_from_slice(&key.to_le_bytes());
            data.extend_from_slice(&[0, 0, 120, 0, 64, 0, 64, 100, 128, 128]);
        }
        self.blob(PAT_NOTES, &data)
    }

    /// An arrangement with `(position, item_index, length, track_rvidx)`
    /// playlist items. As in FL, pattern items are `20480 + pattern iid`
    /// and smaller indices are channel clips.
    pub fn arrangement(&mut self, items: &[(u32, u16, u32, u16)]) -> &mut Self {
        self.word(ARR_NEW, 0);
        let mut data = Vec::new();
        for &(position, item_index, length, rvidx) in items {
            data.extend_from_slice(&position.to_le_bytes());
            data.extend_from_slice(&20480u16.to_le_bytes());
            data.extend_from_slice(&item_index.to_le_bytes());
            data.extend_from_slice(&length.to_le_bytes());
            data.extend_from_slice(&rvidx.to_le_bytes());
            data.extend_from_slice(&[0; 18]);
        }
        self.blob(PLAYLIST, &data)
    }

    pub fn build(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"FLhd");
        buf.extend_from_slice(&6u32.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.extend_from_slice(&self.ppq.to_le_bytes());
        buf.extend_from_slice(b"FLdt");
        buf.extend_from_slice(&(self.events.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.events);
        buf
    }

    /// Write the file as `dir/name` and return its path.
    pub fn write_to(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, self.build()).unwrap();
        path
    }
}
