// File: src/model/entry.rs
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;

/// Identity of a class: `(date, start_time, title)`.
///
/// Two parses of the same document produce equal keys, which is what makes
/// checkpoint keys stable across invocations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassKey {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub title: String,
}

impl ClassKey {
    /// Canonical string form, `2026-01-05T09:00|Stretch & Strength`.
    ///
    /// `|` and `\` inside the title are backslash-escaped so that distinct keys
    /// can never encode to the same string.
    pub fn encode(&self) -> String {
        let mut out = format!(
            "{}T{}|",
            self.date.format("%Y-%m-%d"),
            self.start_time.format("%H:%M")
        );
        for c in self.title.chars() {
            if c == '|' || c == '\\' {
                out.push('\\');
            }
            out.push(c);
        }
        out
    }

    pub fn civil_start(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }
}

impl fmt::Display for ClassKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} \"{}\"",
            self.date.format("%Y-%m-%d"),
            self.start_time.format("%H:%M"),
            self.title
        )
    }
}

/// Labeled lines picked out of a block on a best-effort basis.
///
/// Nothing here is required; a block without any labels still yields an
/// entry from its heading and raw content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassDetails {
    /// `Title/Theme:` line.
    pub theme: Option<String>,
    /// `Class Title:` line.
    pub class_title: Option<String>,
    /// `Time:` or `Start Time:` line.
    pub start_time: Option<NaiveTime>,
    /// `Original Class Date:` line, which wins over the heading date.
    pub original_date: Option<NaiveDate>,
}

/// Where the start time of an entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSource {
    Block,
    Heading,
    WeekdayDefault,
}

/// One scheduled class, as parsed from the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassEntry {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub title: String,
    /// Trailing text of the heading line, verbatim.
    pub heading_title: String,
    /// Lines between the heading and the `Required Items` sentinel.
    ///
    /// Leading and trailing blank lines are dropped and each line loses its
    /// trailing whitespace. Indentation and interior blank lines are kept.
    pub raw_content: String,
    pub details: ClassDetails,
    pub time_source: TimeSource,
    /// 1-based line number of the heading in the source document.
    pub line: usize,
}

impl ClassEntry {
    pub fn key(&self) -> ClassKey {
        ClassKey {
            date: self.date,
            start_time: self.start_time,
            title: self.title.clone(),
        }
    }
}
