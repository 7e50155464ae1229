// Checkpoint timing across daylight-saving changes, and key stability.
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::America::Denver;
use classcue::model::{ClassTimes, ScheduleParser};
use classcue::planner::{ReminderCheckpoint, ReminderPlanner, class_start};

fn utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

fn plan(doc: &str, reference: NaiveDate) -> Vec<ReminderCheckpoint> {
    let times = ClassTimes::default();
    let out = ScheduleParser::new(&times, reference).parse(doc);
    ReminderPlanner::new(&[26, 25, 24], Denver).plan(&out.entries)
}

#[test]
fn test_offsets_are_civil_across_spring_forward() {
    // Clocks go forward at 02:00 on 2026-03-08 in Denver.
    let cps = plan(
        "Sunday, Mar 8 — Daylight Flow\nTime: 9:00 AM\n",
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
    );
    assert_eq!(cps.len(), 3);

    let start = class_start(&cps[0].class_key, &Denver);
    assert_eq!(start, utc("2026-03-08T15:00:00Z")); // 09:00 MDT

    let by_offset = |h: u32| cps.iter().find(|c| c.offset_hours == h).unwrap();

    // 24h reminder fires at 09:00 MST the day before: 23h of real time.
    assert_eq!(by_offset(24).scheduled_at, utc("2026-03-07T16:00:00Z"));
    assert_eq!((start - by_offset(24).scheduled_at).num_hours(), 23);
    assert_eq!(by_offset(25).scheduled_at, utc("2026-03-07T15:00:00Z"));
    assert_eq!(by_offset(26).scheduled_at, utc("2026-03-07T14:00:00Z"));
}

#[test]
fn test_offsets_are_civil_across_fall_back() {
    // Clocks go back at 02:00 on 2026-11-01 in Denver.
    let cps = plan(
        "NOV 1 – Evening Unwind\nTime: 6:00 PM\n",
        NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
    );
    let start = class_start(&cps[0].class_key, &Denver);
    assert_eq!(start, utc("2026-11-02T01:00:00Z")); // 18:00 MST

    let day_before = cps.iter().find(|c| c.offset_hours == 24).unwrap();
    assert_eq!(day_before.scheduled_at, utc("2026-11-01T00:00:00Z")); // 18:00 MDT
    assert_eq!((start - day_before.scheduled_at).num_hours(), 25);
}

#[test]
fn test_checkpoint_that_lands_in_the_gap() {
    // 04:30 class, 26h before is 02:30 on the spring-forward day, which does not exist.
    let cps = plan(
        "MAR 9 – Early Riser\nTime: 4:30 AM\n",
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
    );
    let t26 = cps.iter().find(|c| c.offset_hours == 26).unwrap();
    assert_eq!(t26.scheduled_at, utc("2026-03-08T09:00:00Z")); // 03:00 MDT
}

#[test]
fn test_keys_are_stable_across_runs() {
    let doc = "Monday, Jan 5 — Stretch & Strength\nTime: 9:00 AM\nRequired Items\n\nJAN 6 – Restorative\nTime: 6:00 PM\n";
    let first = plan(doc, NaiveDate::from_ymd_opt(2026, 1, 4).unwrap());
    let second = plan(doc, NaiveDate::from_ymd_opt(2026, 1, 5).unwrap());

    let keys = |cps: &[ReminderCheckpoint]| {
        cps.iter()
            .map(|c| c.checkpoint_key.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(keys(&first), keys(&second));
    assert_eq!(
        keys(&first),
        vec![
            "2026-01-05T09:00|Stretch & Strength|T-26h",
            "2026-01-05T09:00|Stretch & Strength|T-25h",
            "2026-01-05T09:00|Stretch & Strength|T-24h",
            "2026-01-06T18:00|Restorative|T-26h",
            "2026-01-06T18:00|Restorative|T-25h",
            "2026-01-06T18:00|Restorative|T-24h",
        ]
    );
}

#[test]
fn test_editing_content_does_not_change_keys() {
    let a = plan(
        "JAN 6 – Restorative\nTime: 6:00 PM\nBring a bolster.\n",
        NaiveDate::from_ymd_opt(2026, 1, 4).unwrap(),
    );
    let b = plan(
        "JAN 6 – Restorative\nTime: 6:00 PM\nBring a bolster and a blanket.\n",
        NaiveDate::from_ymd_opt(2026, 1, 4).unwrap(),
    );
    assert_eq!(a[0].checkpoint_key, b[0].checkpoint_key);
}
