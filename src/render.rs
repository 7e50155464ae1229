// File: ./src/render.rs
// Turns a due checkpoint into the message handed to the notifier.
//
// The body frames a block the recipient pastes into the studio group chat,
// so everything between the markers is written for chat formatting
// (`*bold*`), not for the mail client.
use crate::model::ClassEntry;
use crate::notifier::OutgoingMessage;
use crate::planner::class_start;
use chrono_tz::Tz;

pub const BLOCK_START_MARKER: &str = "—— message ———";
pub const BLOCK_END_MARKER: &str = "—— end message ———";

pub fn render_subject(entry: &ClassEntry, offset_hours: u32) -> String {
    format!(
        "Class reminder (T-{}h): {} on {}",
        offset_hours,
        entry.title,
        entry.date.format("%B %d, %Y")
    )
}

pub fn render_body(entry: &ClassEntry, offset_hours: u32, tz: &Tz, join_link: &str) -> String {
    let local_start = class_start(&entry.key(), tz).with_timezone(tz);
    let date_str = local_start.format("%B %d, %Y");
    let time_str = local_start.format("%-I:%M %p %Z");

    let mut lines: Vec<String> = vec![
        format!("T-{}h reminder for a class announcement.", offset_hours),
        String::new(),
        "Copy the message block below into the group:".to_string(),
        String::new(),
        BLOCK_START_MARKER.to_string(),
        String::new(),
        format!("✨ Join us for class on {} at {}", date_str, time_str),
        String::new(),
        format!("*\"{}\"*", entry.title),
        String::new(),
    ];

    let content = entry.raw_content.trim_end();
    if !content.is_empty() {
        lines.push(content.to_string());
        lines.push(String::new());
    }

    lines.push(format!("*Link to Join:* {}", join_link));
    lines.push(String::new());
    lines.push("See you there! 💕".to_string());
    lines.push(String::new());
    lines.push(BLOCK_END_MARKER.to_string());

    lines.join("\n")
}

pub fn render_reminder(
    entry: &ClassEntry,
    offset_hours: u32,
    tz: &Tz,
    join_link: &str,
    recipients: &[String],
) -> OutgoingMessage {
    OutgoingMessage {
        recipients: recipients.to_vec(),
        subject: render_subject(entry, offset_hours),
        body: render_body(entry, offset_hours, tz, join_link),
    }
}
