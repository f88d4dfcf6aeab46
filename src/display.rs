use crate::models::Note;
use chrono::{Local, TimeZone};

pub const RECORD_FOOTER: &str = "***************";

pub fn render_note(note: &Note, date_format: &str) -> String {
    let mut out = format!("> cd {}\n# date {}\n", note.directory, friendly_date(note.timestamp, date_format));
    if !note.tags.is_empty() {
        out.push_str(&format!("# tags {}\n", note.tags));
    }
    if !note.context.trim().is_empty() {
        out.push_str(&format!("# context {}\n", note.context.trim()));
    }
    out.push_str(&note.message);
    out
}

pub fn render_listing<'a>(notes: impl IntoIterator<Item = &'a Note>, date_format: &str) -> String {
    let mut out = String::new();
    for note in notes {
        out.push('\n');
        out.push_str(&render_note(note, date_format));
        out.push_str(RECORD_FOOTER);
        out.push('\n');
    }
    out
}

pub fn friendly_date(timestamp: i64, date_format: &str) -> String {
    match Local.timestamp_opt(timestamp, 0).single() {
        Some(moment) => moment.format(date_format).to_string(),
        None => timestamp.to_string(),
    }
}
