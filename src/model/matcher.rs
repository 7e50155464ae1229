// Pairs a class with the booking-platform event that represents it.
//
// Matching is by start time only, within a fixed tolerance; titles in the
// schedule document and on the platform drift too much to be trusted beyond
// breaking ties. The closest start wins, then an exact (case-insensitive)
// title match, then cache order.
use crate::model::event::EventRecord;
use chrono::{DateTime, Duration, Utc};

pub const MATCH_TOLERANCE_MINUTES: i64 = 15;

fn normalize_title(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Returns the event that best matches a class starting at `class_start`
/// titled `title`, or `None` when nothing lies within the tolerance.
pub fn find_event<'a>(
    class_start: DateTime<Utc>,
    title: &str,
    events: &'a [EventRecord],
) -> Option<&'a EventRecord> {
    let tolerance = Duration::minutes(MATCH_TOLERANCE_MINUTES);
    let wanted = normalize_title(title);

    events
        .iter()
        .enumerate()
        .filter_map(|(order, ev)| {
            let diff = (ev.start_time - class_start).abs();
            if diff > tolerance {
                return None;
            }
            let title_mismatch = normalize_title(&ev.title) != wanted;
            Some(((diff, title_mismatch, order), ev))
        })
        .min_by_key(|(rank, _)| *rank)
        .map(|(_, ev)| ev)
}

/// Join link for a class, or `None` so the caller can fall back.
pub fn resolve_join_link(
    class_start: DateTime<Utc>,
    title: &str,
    events: &[EventRecord],
    join_base_url: &str,
) -> Option<String> {
    find_event(class_start, title, events).map(|ev| ev.join_link(join_base_url))
}
