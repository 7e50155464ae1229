// File: src/model/parser.rs
//! Turns the plain-text schedule document into class entries.
//!
//! A block starts at a heading line in one of two shapes:
//!
//! ```text
//! Monday, Jan 5 — Stretch & Strength        (verbose)
//! JAN 6 – Restorative                       (compact)
//! ```
//!
//! Both may carry a time (`Monday, Jan 5, 9:00 AM — ...`, `JAN 6 6PM – ...`)
//! and an explicit year. The block runs until the `Required Items` sentinel or
//! the next heading, whichever comes first. Anything after the sentinel belongs
//! to the props list and is ignored.
use crate::error::ParseError;
use crate::model::entry::{ClassDetails, ClassEntry, ClassKey, TimeSource};
use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const REQUIRED_ITEMS_SENTINEL: &str = "Required Items";
const DEFAULT_TITLE: &str = "Class";
const HEADING_SEPARATORS: [&str; 3] = ["—", "–", " - "];

/// Default class start time per weekday, used when a block names no time.
///
/// Values are `HH:MM` (24h) or `h:mmam`/`h:mmpm`. An empty string disables a
/// day, including `fallback`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassTimes {
    pub monday: Option<String>,
    pub tuesday: Option<String>,
    pub wednesday: Option<String>,
    pub thursday: Option<String>,
    pub friday: Option<String>,
    pub saturday: Option<String>,
    pub sunday: Option<String>,
    pub fallback: Option<String>,
}

impl Default for ClassTimes {
    fn default() -> Self {
        Self {
            monday: Some("17:30".to_string()),
            tuesday: Some("08:00".to_string()),
            wednesday: None,
            thursday: Some("08:00".to_string()),
            friday: None,
            saturday: Some("09:00".to_string()),
            sunday: None,
            fallback: Some("08:00".to_string()),
        }
    }
}

impl ClassTimes {
    /// Same as `Default`, but with every day disabled.
    pub fn none() -> Self {
        Self {
            monday: None,
            tuesday: None,
            wednesday: None,
            thursday: None,
            friday: None,
            saturday: None,
            sunday: None,
            fallback: None,
        }
    }

    fn raw_for(&self, weekday: Weekday) -> Option<&str> {
        let specific = match weekday {
            Weekday::Mon => &self.monday,
            Weekday::Tue => &self.tuesday,
            Weekday::Wed => &self.wednesday,
            Weekday::Thu => &self.thursday,
            Weekday::Fri => &self.friday,
            Weekday::Sat => &self.saturday,
            Weekday::Sun => &self.sunday,
        };
        specific.as_deref().or(self.fallback.as_deref())
    }

    pub fn for_weekday(&self, weekday: Weekday) -> Option<NaiveTime> {
        self.raw_for(weekday).and_then(parse_time_string)
    }

    /// Rejects entries that are neither empty nor a valid time.
    pub fn validate(&self) -> Result<(), String> {
        let all = [
            ("monday", &self.monday),
            ("tuesday", &self.tuesday),
            ("wednesday", &self.wednesday),
            ("thursday", &self.thursday),
            ("friday", &self.friday),
            ("saturday", &self.saturday),
            ("sunday", &self.sunday),
            ("fallback", &self.fallback),
        ];
        for (name, value) in all {
            if let Some(v) = value
                && !v.trim().is_empty()
                && parse_time_string(v).is_none()
            {
                return Err(format!("class_times.{} = '{}' is not a time", name, v));
            }
        }
        Ok(())
    }
}

/// A block that produced no entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedBlock {
    pub line: usize,
    pub heading: String,
    pub error: ParseError,
}

#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub entries: Vec<ClassEntry>,
    pub skipped: Vec<SkippedBlock>,
}

#[derive(Debug, Clone, PartialEq)]
struct Heading {
    weekday: Option<Weekday>,
    month: u32,
    day: u32,
    year: Option<i32>,
    time: Option<Result<NaiveTime, String>>,
    title: String,
}

pub struct ScheduleParser<'a> {
    class_times: &'a ClassTimes,
    reference: NaiveDate,
}

impl<'a> ScheduleParser<'a> {
    /// `reference` is "today" in the studio timezone; headings carry no year,
    /// so each date is placed in the year that puts it closest to `reference`.
    pub fn new(class_times: &'a ClassTimes, reference: NaiveDate) -> Self {
        Self {
            class_times,
            reference,
        }
    }

    pub fn parse(&self, text: &str) -> ParseOutcome {
        let lines: Vec<&str> = text.lines().collect();
        let headings: Vec<(usize, Heading)> = lines
            .iter()
            .enumerate()
            .filter_map(|(i, l)| parse_heading(l).map(|h| (i, h)))
            .collect();

        let mut outcome = ParseOutcome::default();
        let mut seen: HashSet<ClassKey> = HashSet::new();

        for (n, (idx, heading)) in headings.iter().enumerate() {
            let end = headings
                .get(n + 1)
                .map(|(next, _)| *next)
                .unwrap_or(lines.len());
            let mut body = &lines[idx + 1..end];
            if let Some(pos) = body
                .iter()
                .position(|l| l.trim() == REQUIRED_ITEMS_SENTINEL)
            {
                body = &body[..pos];
            }

            let result = self
                .build_entry(*idx, heading, body)
                .and_then(|entry| {
                    if seen.insert(entry.key()) {
                        Ok(entry)
                    } else {
                        Err(ParseError::Duplicate)
                    }
                });

            match result {
                Ok(entry) => {
                    log::debug!(
                        "Parsed class {} from line {} ({:?} time)",
                        entry.key(),
                        entry.line,
                        entry.time_source
                    );
                    outcome.entries.push(entry);
                }
                Err(error) => {
                    let heading_text = lines[*idx].trim().to_string();
                    log::warn!(
                        "Skipping schedule block at line {} '{}': {}",
                        idx + 1,
                        heading_text,
                        error
                    );
                    outcome.skipped.push(SkippedBlock {
                        line: idx + 1,
                        heading: heading_text,
                        error,
                    });
                }
            }
        }

        outcome
    }

    fn build_entry(
        &self,
        idx: usize,
        heading: &Heading,
        body: &[&str],
    ) -> Result<ClassEntry, ParseError> {
        let details = extract_details(body)?;

        let date = match details.original_date {
            Some(d) => d,
            None => self.resolve_date(heading)?,
        };

        let (start_time, time_source) = match (details.start_time, &heading.time) {
            (Some(t), _) => (t, TimeSource::Block),
            (None, Some(Ok(t))) => (*t, TimeSource::Heading),
            (None, Some(Err(raw))) => return Err(ParseError::InvalidTime(raw.clone())),
            (None, None) => match self.class_times.for_weekday(date.weekday()) {
                Some(t) => (t, TimeSource::WeekdayDefault),
                None => return Err(ParseError::MissingTime(date.weekday())),
            },
        };

        let title = details
            .theme
            .clone()
            .or_else(|| details.class_title.clone())
            .or_else(|| Some(heading.title.clone()).filter(|t| !t.is_empty()))
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());

        Ok(ClassEntry {
            date,
            start_time,
            title,
            heading_title: heading.title.clone(),
            raw_content: collect_raw_content(body),
            details,
            time_source,
            line: idx + 1,
        })
    }

    fn resolve_date(&self, heading: &Heading) -> Result<NaiveDate, ParseError> {
        let invalid = ParseError::InvalidDate {
            month: heading.month,
            day: heading.day,
        };
        if let Some(y) = heading.year {
            return NaiveDate::from_ymd_opt(y, heading.month, heading.day).ok_or(invalid);
        }

        let year = self.reference.year();
        let date = [year - 1, year, year + 1]
            .into_iter()
            .filter_map(|y| NaiveDate::from_ymd_opt(y, heading.month, heading.day))
            .min_by_key(|d| d.signed_duration_since(self.reference).num_days().abs())
            .ok_or(invalid)?;

        if let Some(wd) = heading.weekday
            && wd != date.weekday()
        {
            log::warn!(
                "Heading says {} but {} is a {}; trusting the date",
                wd,
                date,
                date.weekday()
            );
        }
        Ok(date)
    }
}

// Outer blank lines and trailing whitespace go; everything else is kept.
fn collect_raw_content(body: &[&str]) -> String {
    let start = body.iter().position(|l| !l.trim().is_empty());
    let end = body.iter().rposition(|l| !l.trim().is_empty());
    match (start, end) {
        (Some(s), Some(e)) => body[s..=e]
            .iter()
            .map(|l| l.trim_end())
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

fn extract_details(body: &[&str]) -> Result<ClassDetails, ParseError> {
    let mut details = ClassDetails::default();

    for line in body {
        let plain = line.replace('*', "");
        let Some((label, value)) = plain.trim().split_once(':') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        match label.trim().to_lowercase().as_str() {
            "title/theme" | "title / theme" => {
                details.theme.get_or_insert_with(|| value.to_string());
            }
            "class title" => {
                details.class_title.get_or_insert_with(|| value.to_string());
            }
            "time" | "start time" | "class time" => {
                if details.start_time.is_none() {
                    let t = parse_time_string(value)
                        .ok_or_else(|| ParseError::InvalidTime(value.to_string()))?;
                    details.start_time = Some(t);
                }
            }
            "original class date" => {
                if details.original_date.is_none() {
                    details.original_date = parse_long_date(value);
                    if details.original_date.is_none() {
                        log::debug!("Ignoring unreadable original class date '{}'", value);
                    }
                }
            }
            _ => {}
        }
    }

    Ok(details)
}

fn clean_line(line: &str) -> &str {
    line.trim()
        .trim_start_matches('#')
        .trim()
        .trim_matches('*')
        .trim()
}

fn split_heading(line: &str) -> Option<(&str, &str)> {
    HEADING_SEPARATORS
        .iter()
        .filter_map(|sep| line.find(sep).map(|i| (i, sep.len())))
        .min_by_key(|(i, _)| *i)
        .map(|(i, len)| (&line[..i], &line[i + len..]))
}

fn tokens(s: &str) -> Vec<&str> {
    s.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Recognises a heading line in either supported convention.
fn parse_heading(line: &str) -> Option<Heading> {
    let (head, title) = split_heading(clean_line(line))?;
    let toks = tokens(head);

    let weekday = toks.first().and_then(|t| parse_weekday(t));
    let mut idx = usize::from(weekday.is_some());

    let month = parse_month(toks.get(idx)?)?;
    idx += 1;
    let day = parse_day(toks.get(idx)?)?;
    idx += 1;

    let mut year = None;
    let mut rest: Vec<&str> = Vec::new();
    for &t in &toks[idx..] {
        if year.is_none()
            && rest.is_empty()
            && t.len() == 4
            && let Ok(y) = t.parse::<i32>()
        {
            year = Some(y);
            continue;
        }
        if rest.is_empty() && (t.eq_ignore_ascii_case("at") || t == "@") {
            continue;
        }
        rest.push(t);
    }

    let time = if rest.is_empty() {
        None
    } else {
        let joined = rest.concat();
        match parse_time_string(&joined) {
            Some(t) => Some(Ok(t)),
            None if looks_like_time(&joined) => Some(Err(joined)),
            // Extra words before the separator: prose, not a heading.
            None => return None,
        }
    };

    Some(Heading {
        weekday,
        month,
        day,
        year,
        time,
        title: title.trim().trim_matches('*').trim().to_string(),
    })
}

fn parse_month(token: &str) -> Option<u32> {
    let m = match token.trim_end_matches('.').to_lowercase().as_str() {
        "jan" | "january" => 1,
        "feb" | "february" => 2,
        "mar" | "march" => 3,
        "apr" | "april" => 4,
        "may" => 5,
        "jun" | "june" => 6,
        "jul" | "july" => 7,
        "aug" | "august" => 8,
        "sep" | "sept" | "september" => 9,
        "oct" | "october" => 10,
        "nov" | "november" => 11,
        "dec" | "december" => 12,
        _ => return None,
    };
    Some(m)
}

fn parse_weekday(token: &str) -> Option<Weekday> {
    match token.trim_end_matches('.').to_lowercase().as_str() {
        "mon" | "monday" => Some(Weekday::Mon),
        "tue" | "tues" | "tuesday" => Some(Weekday::Tue),
        "wed" | "wednesday" => Some(Weekday::Wed),
        "thu" | "thur" | "thurs" | "thursday" => Some(Weekday::Thu),
        "fri" | "friday" => Some(Weekday::Fri),
        "sat" | "saturday" => Some(Weekday::Sat),
        "sun" | "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

fn parse_day(token: &str) -> Option<u32> {
    let lower = token.to_lowercase();
    let digits = ["st", "nd", "rd", "th"]
        .iter()
        .find_map(|suffix| lower.strip_suffix(suffix))
        .unwrap_or(&lower);
    let day = digits.parse::<u32>().ok()?;
    (1..=31).contains(&day).then_some(day)
}

/// `January 15, 2026`, `Thursday, Jan 15 2026` or `2026-01-15`.
fn parse_long_date(s: &str) -> Option<NaiveDate> {
    if let Ok(d) = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
        return Some(d);
    }
    let toks = tokens(s);
    let idx = usize::from(toks.first().and_then(|t| parse_weekday(t)).is_some());
    let month = parse_month(toks.get(idx)?)?;
    let day = parse_day(toks.get(idx + 1)?)?;
    let year = toks.get(idx + 2)?.parse::<i32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn looks_like_time(s: &str) -> bool {
    let lower = s.to_lowercase();
    lower.chars().any(|c| c.is_ascii_digit())
        && (lower.contains(':') || lower.ends_with("am") || lower.ends_with("pm"))
}

/// Parses `18:00`, `9:00am`, `9 AM`, `6pm`, `9:00 a.m.`.
pub fn parse_time_string(s: &str) -> Option<NaiveTime> {
    let lower: String = s
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '.')
        .collect();
    if lower.is_empty() {
        return None;
    }

    let parse_12h = |s: &str, is_pm: bool| -> Option<NaiveTime> {
        let (h, m) = if let Some((h_str, m_str)) = s.split_once(':') {
            (h_str.parse::<u32>().ok()?, m_str.parse::<u32>().ok()?)
        } else {
            (s.parse::<u32>().ok()?, 0)
        };
        if !(1..=12).contains(&h) || m > 59 {
            return None;
        }
        let h_24 = if h == 12 {
            if is_pm { 12 } else { 0 }
        } else if is_pm {
            h + 12
        } else {
            h
        };
        NaiveTime::from_hms_opt(h_24, m, 0)
    };

    if let Some(stripped) = lower.strip_suffix("am") {
        return parse_12h(stripped, false);
    }
    if let Some(stripped) = lower.strip_suffix("pm") {
        return parse_12h(stripped, true);
    }

    if let Some((h_str, m_str)) = lower.split_once(':') {
        let h = h_str.parse::<u32>().ok()?;
        let m = m_str.parse::<u32>().ok()?;
        return NaiveTime::from_hms_opt(h, m, 0);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn parse(text: &str) -> ParseOutcome {
        let times = ClassTimes::default();
        ScheduleParser::new(&times, ymd(2026, 1, 1)).parse(text)
    }

    #[test]
    fn test_time_strings() {
        assert_eq!(parse_time_string("18:00"), Some(hm(18, 0)));
        assert_eq!(parse_time_string("9:00 AM"), Some(hm(9, 0)));
        assert_eq!(parse_time_string("9am"), Some(hm(9, 0)));
        assert_eq!(parse_time_string("6PM"), Some(hm(18, 0)));
        assert_eq!(parse_time_string("12:15 a.m."), Some(hm(0, 15)));
        assert_eq!(parse_time_string("12pm"), Some(hm(12, 0)));
        assert_eq!(parse_time_string("25:00"), None);
        assert_eq!(parse_time_string("13pm"), None);
        assert_eq!(parse_time_string("soon"), None);
        assert_eq!(parse_time_string(""), None);
    }

    #[test]
    fn test_heading_verbose() {
        let h = parse_heading("Thursday, Jan 15 — Expanding Potential").unwrap();
        assert_eq!(h.weekday, Some(Weekday::Thu));
        assert_eq!((h.month, h.day), (1, 15));
        assert_eq!(h.title, "Expanding Potential");
        assert!(h.time.is_none());
    }

    #[test]
    fn test_heading_compact() {
        let h = parse_heading("FEB 3 – Restorative").unwrap();
        assert_eq!(h.weekday, None);
        assert_eq!((h.month, h.day), (2, 3));
        assert_eq!(h.title, "Restorative");
    }

    #[test]
    fn test_heading_with_time_and_year() {
        let h = parse_heading("Monday, January 5, 2026 at 9:00 AM — Stretch").unwrap();
        assert_eq!(h.year, Some(2026));
        assert_eq!(h.time, Some(Ok(hm(9, 0))));

        let h = parse_heading("JAN 6 6PM – Restorative").unwrap();
        assert_eq!(h.time, Some(Ok(hm(18, 0))));
    }

    #[test]
    fn test_heading_markdown_is_stripped() {
        let h = parse_heading("### **Saturday, Jan 31 — Deep Hips**").unwrap();
        assert_eq!(h.title, "Deep Hips");
        assert_eq!((h.month, h.day), (1, 31));
    }

    #[test]
    fn test_prose_lines_are_not_headings() {
        assert!(parse_heading("Original Class Date: January 15, 2026").is_none());
        assert!(parse_heading("Monday – Friday we meet online").is_none());
        assert!(parse_heading("Jan 5 was great — see notes").is_none());
        assert!(parse_heading("- Jan 5 – bring a strap").is_none());
        assert!(parse_heading("Jan 5 Stretch & Strength").is_none());
    }

    #[test]
    fn test_sentinel_cuts_block() {
        let out = parse(
            "Monday, Jan 5 — Stretch\nTime: 9:00 AM\nWarm up slowly.\n\nRequired Items\nStrap\nBlock\n",
        );
        assert_eq!(out.entries.len(), 1);
        let e = &out.entries[0];
        assert_eq!(e.raw_content, "Time: 9:00 AM\nWarm up slowly.");
        assert!(!e.raw_content.contains("Strap"));
    }

    #[test]
    fn test_raw_content_keeps_inner_layout() {
        let out = parse("JAN 5 – Flow\n\n  Time: 9am\n\n    hold each pose   \n\nRequired Items\n");
        let e = &out.entries[0];
        assert_eq!(e.raw_content, "  Time: 9am\n\n    hold each pose");
        assert_eq!(e.start_time, hm(9, 0));
    }

    #[test]
    fn test_sentinel_is_case_sensitive() {
        let out = parse("JAN 5 – Stretch\nTime: 09:00\nrequired items\nStrap\n");
        assert!(out.entries[0].raw_content.contains("Strap"));
    }

    #[test]
    fn test_title_theme_wins_over_heading() {
        let out = parse("JAN 5 – Series Name\nTitle/Theme: Standing Backbend\nTime: 9am\n");
        assert_eq!(out.entries[0].title, "Standing Backbend");
        assert_eq!(out.entries[0].heading_title, "Series Name");
    }

    #[test]
    fn test_class_title_label_is_accepted() {
        let out = parse("JAN 5 – Series\n**Class Title:** Twists\nTime: 9am\n");
        assert_eq!(out.entries[0].title, "Twists");
        assert_eq!(out.entries[0].details.class_title.as_deref(), Some("Twists"));
    }

    #[test]
    fn test_weekday_default_time() {
        // Jan 5 2026 is a Monday -> 17:30 by default.
        let out = parse("Monday, Jan 5 — Evening Flow\nSome notes\n");
        let e = &out.entries[0];
        assert_eq!(e.start_time, hm(17, 30));
        assert_eq!(e.time_source, TimeSource::WeekdayDefault);
    }

    #[test]
    fn test_missing_time_without_defaults_is_skipped() {
        let times = ClassTimes::none();
        let out = ScheduleParser::new(&times, ymd(2026, 1, 1))
            .parse("Monday, Jan 5 — Evening Flow\nnotes\nJAN 6 – Next\nTime: 8:00\n");
        assert_eq!(out.entries.len(), 1);
        assert_eq!(out.entries[0].title, "Next");
        assert_eq!(out.skipped.len(), 1);
        assert_eq!(out.skipped[0].error, ParseError::MissingTime(Weekday::Mon));
        assert_eq!(out.skipped[0].line, 1);
    }

    #[test]
    fn test_invalid_date_skips_block_only() {
        let out = parse("FEB 30 – Impossible\nTime: 9am\nMAR 2 – Fine\nTime: 9am\n");
        assert_eq!(out.entries.len(), 1);
        assert_eq!(out.entries[0].date, ymd(2026, 3, 2));
        assert_eq!(
            out.skipped[0].error,
            ParseError::InvalidDate { month: 2, day: 30 }
        );
    }

    #[test]
    fn test_bad_explicit_time_skips_block() {
        let out = parse("JAN 5 – Stretch\nTime: whenever\n");
        assert!(out.entries.is_empty());
        assert_eq!(
            out.skipped[0].error,
            ParseError::InvalidTime("whenever".to_string())
        );
    }

    #[test]
    fn test_year_is_inferred_near_reference() {
        let times = ClassTimes::default();
        // Late December reference: a January heading belongs to next year.
        let out = ScheduleParser::new(&times, ymd(2025, 12, 28)).parse("JAN 3 – New Year Flow\n");
        assert_eq!(out.entries[0].date, ymd(2026, 1, 3));
        // Early January reference: a December heading belongs to last year.
        let out = ScheduleParser::new(&times, ymd(2026, 1, 2)).parse("DEC 30 – Old Year Flow\n");
        assert_eq!(out.entries[0].date, ymd(2025, 12, 30));
    }

    #[test]
    fn test_original_class_date_overrides_heading() {
        let out = parse(
            "Thursday, Jan 15 — Expanding Potential\nOriginal Class Date: January 16, 2027\nTime: 8am\n",
        );
        assert_eq!(out.entries[0].date, ymd(2027, 1, 16));
    }

    #[test]
    fn test_duplicate_blocks_are_skipped() {
        let out = parse("JAN 5 – Stretch\nTime: 9am\nJAN 5 – Stretch\nTime: 9am\n");
        assert_eq!(out.entries.len(), 1);
        assert_eq!(out.skipped[0].error, ParseError::Duplicate);
    }

    #[test]
    fn test_preamble_is_ignored() {
        let out = parse("January plan\nNotes for the month\n\nJAN 5 – Stretch\nTime: 9am\n");
        assert_eq!(out.entries.len(), 1);
        assert_eq!(out.entries[0].line, 4);
    }

    #[test]
    fn test_class_times_validate() {
        assert!(ClassTimes::default().validate().is_ok());
        let bad = ClassTimes {
            monday: Some("late".to_string()),
            ..ClassTimes::default()
        };
        assert!(bad.validate().is_err());
        let disabled = ClassTimes {
            fallback: Some(String::new()),
            ..ClassTimes::none()
        };
        assert!(disabled.validate().is_ok());
        assert_eq!(disabled.for_weekday(Weekday::Wed), None);
    }
}
