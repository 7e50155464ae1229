// Schedule documents that mix both heading conventions.
use chrono::{NaiveDate, NaiveTime};
use classcue::model::{ClassTimes, ScheduleParser, TimeSource};

const MIXED_DOC: &str = "\
Winter schedule notes for the studio.
Please check the Required Items before every class.

Monday, Jan 5 — Stretch & Strength
Time: 9:00 AM
Title/Theme: Stretch & Strength
Slow warm-up, long holds.
Required Items
Strap
Two blocks

JAN 6 – Restorative
Start Time: 6:00 PM
Supported poses only.
Required Items
Bolster

Thursday, Jan 8 — Backbends
Class Title: Heart Openers
Required Items
Blanket

FEB 30 – Impossible Day
Time: 9:00 AM
Required Items
";

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

#[test]
fn test_interleaved_heading_styles() {
    let times = ClassTimes::default();
    let out = ScheduleParser::new(&times, d(2026, 1, 4)).parse(MIXED_DOC);

    let summary: Vec<(NaiveDate, NaiveTime, &str)> = out
        .entries
        .iter()
        .map(|e| (e.date, e.start_time, e.title.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (d(2026, 1, 5), hm(9, 0), "Stretch & Strength"),
            (d(2026, 1, 6), hm(18, 0), "Restorative"),
            (d(2026, 1, 8), hm(8, 0), "Heart Openers"),
        ]
    );

    assert_eq!(out.entries[0].time_source, TimeSource::Block);
    assert_eq!(out.entries[2].time_source, TimeSource::WeekdayDefault);
    assert_eq!(out.entries[2].heading_title, "Backbends");
}

#[test]
fn test_raw_content_stops_at_sentinel() {
    let times = ClassTimes::default();
    let out = ScheduleParser::new(&times, d(2026, 1, 4)).parse(MIXED_DOC);

    assert_eq!(
        out.entries[0].raw_content,
        "Time: 9:00 AM\nTitle/Theme: Stretch & Strength\nSlow warm-up, long holds."
    );
    assert_eq!(
        out.entries[1].raw_content,
        "Start Time: 6:00 PM\nSupported poses only."
    );
    for e in &out.entries {
        assert!(!e.raw_content.contains("Required Items"));
    }
}

#[test]
fn test_bad_block_is_skipped_not_fatal() {
    let times = ClassTimes::default();
    let out = ScheduleParser::new(&times, d(2026, 1, 4)).parse(MIXED_DOC);

    assert_eq!(out.skipped.len(), 1);
    assert!(out.skipped[0].heading.contains("FEB 30"));
    assert_eq!(out.entries.len(), 3);
}

#[test]
fn test_year_rolls_over_near_new_year() {
    let times = ClassTimes::default();
    let out = ScheduleParser::new(&times, d(2025, 12, 28)).parse("JAN 6 – Restorative\nTime: 6pm\n");
    assert_eq!(out.entries[0].date, d(2026, 1, 6));

    let out = ScheduleParser::new(&times, d(2026, 1, 3)).parse("DEC 30 – Look Back\nTime: 6pm\n");
    assert_eq!(out.entries[0].date, d(2025, 12, 30));
}
