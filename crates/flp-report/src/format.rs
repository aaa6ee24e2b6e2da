//! Text rendering of normalized notes and track sequences.
//!
//! Every report is a `Display` value borrowing the extraction results, so
//! the same text goes to files, tests and the terminal.

use std::fmt;

use flp_ir::Timing;
use flp_resolve::{NormalizedNotes, NoteRecord, PatternNotes, Placement, Timeline, TrackSequence};

pub const TOOL_NAME: &str = concat!("flpinfo ", env!("CARGO_PKG_VERSION"));

const BANNER_WIDTH: usize = 80;

const NOTE_LEGEND: &str = "# 格式: [开始小节:步:嘀嗒-结束小节:步:嘀嗒,音高,轨道] 持续=ticks";
const PLACEMENT_LEGEND: &str = "# 格式: [开始小节:步:嘀嗒-结束小节:步:嘀嗒] 样式 (持续=ticks)";

/// File-name-safe form of a display name: anything but alphanumerics,
/// space, `-` and `_` becomes `_`.
pub fn safe_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Lines shared by the top of every report.
#[derive(Clone, Copy, Debug)]
pub struct ReportHeader<'a> {
    /// Source file name, without directories
    pub source: &'a str,
    pub timing: Timing,
}

impl ReportHeader<'_> {
    fn write(&self, f: &mut fmt::Formatter<'_>, title: &str, legend: &str) -> fmt::Result {
        writeln!(f, "# {}", title)?;
        writeln!(f, "# 工具: {}", TOOL_NAME)?;
        writeln!(f, "# 文件: {}", self.source)?;
        writeln!(f, "# 速度: {} BPM", self.timing.tempo())?;
        writeln!(f, "# PPQ: {}", self.timing.ppq())?;
        writeln!(f, "{}", legend)?;
        writeln!(f)
    }
}

fn banner(f: &mut fmt::Formatter<'_>, title: fmt::Arguments<'_>) -> fmt::Result {
    let rule = "=".repeat(BANNER_WIDTH);
    writeln!(f)?;
    writeln!(f, "{}", rule)?;
    writeln!(f, "# {}", title)?;
    writeln!(f, "{}", rule)?;
    writeln!(f)
}

/// `[1:08:00-1:10:00,C5,Piano] 持续=48ticks`
pub struct NoteLine<'a>(pub &'a NoteRecord);

impl fmt::Display for NoteLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.0;
        write!(
            f,
            "[{}-{},{},{}] 持续={}ticks",
            n.start, n.end, n.pitch, n.channel, n.duration
        )
    }
}

/// `[1:00:00-2:00:00] Verse (持续=384ticks)`
pub struct PlacementLine<'a>(pub &'a Placement);

impl fmt::Display for PlacementLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = self.0;
        write!(
            f,
            "[{}-{}] {} (持续={}ticks)",
            p.start, p.end, p.pattern_name, p.length
        )
    }
}

/// Every note, one banner section per pattern.
pub struct AllNotesReport<'a> {
    pub header: ReportHeader<'a>,
    pub notes: &'a NormalizedNotes,
}

impl fmt::Display for AllNotesReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.header.write(f, "所有音符（按样式分组）", NOTE_LEGEND)?;
        for group in &self.notes.groups {
            banner(
                f,
                format_args!("样式: {} (包含 {} 个音符)", group.name, group.notes.len()),
            )?;
            for note in self.notes.group_notes(group) {
                writeln!(f, "{}", NoteLine(note))?;
            }
        }
        Ok(())
    }
}

/// The notes of a single pattern.
pub struct PatternReport<'a> {
    pub header: ReportHeader<'a>,
    pub notes: &'a NormalizedNotes,
    pub group: &'a PatternNotes,
}

impl PatternReport<'_> {
    pub fn file_name(&self) -> String {
        format!("{}.txt", safe_file_name(&self.group.name))
    }
}

impl fmt::Display for PatternReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = format!("样式: {}", self.group.name);
        self.header.write(f, &title, NOTE_LEGEND)?;
        for note in self.notes.group_notes(self.group) {
            writeln!(f, "{}", NoteLine(note))?;
        }
        Ok(())
    }
}

/// Pattern placements, one banner section per compact track.
pub struct TrackSequenceReport<'a> {
    pub header: ReportHeader<'a>,
    pub timeline: &'a Timeline,
}

fn track_title(track: &TrackSequence) -> String {
    let mut title = format!("轨道 {} (原始引用 {})", track.index, track.raw_ref);
    if let Some(name) = &track.name {
        title.push_str(": ");
        title.push_str(name);
    }
    title
}

impl fmt::Display for TrackSequenceReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.header.write(f, "轨道序列", PLACEMENT_LEGEND)?;
        for track in &self.timeline.tracks {
            banner(
                f,
                format_args!(
                    "{} (包含 {} 个片段)",
                    track_title(track),
                    track.placements.len()
                ),
            )?;
            for placement in &track.placements {
                writeln!(f, "{}", PlacementLine(placement))?;
            }
        }
        Ok(())
    }
}
