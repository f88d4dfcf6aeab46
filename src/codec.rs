use crate::errors::JotResult;
use crate::models::{normalize_message, Note};
use std::io::Write;

pub const SEPARATOR: &str = "^^^^^^^^^^^^^^^^^^^^";
pub const MESSAGE_LABEL: &str = "Message:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderField {
    Directory,
    Date,
    Tag,
    Context,
}

impl HeaderField {
    pub const ORDER: [HeaderField; 4] = [Self::Directory, Self::Date, Self::Tag, Self::Context];

    pub fn label(self) -> &'static str {
        match self {
            Self::Directory => "Directory:",
            Self::Date => "Date:",
            Self::Tag => "Tag:",
            Self::Context => "Context:",
        }
    }

    // None when `line` is not a well-formed line for this field
    pub fn accept(self, line: &str) -> Option<&str> {
        let value = line.strip_prefix(self.label())?;
        match self {
            Self::Directory if !value.starts_with('/') => None,
            Self::Date if value.trim().parse::<i64>().is_err() => None,
            _ => Some(value),
        }
    }
}

pub fn is_separator(line: &str) -> bool {
    line.trim_end() == SEPARATOR
}

pub fn encode(note: &Note) -> String {
    let mut out = String::with_capacity(note.message.len() + note.directory.len() + 96);
    out.push_str(SEPARATOR);
    out.push('\n');
    for field in HeaderField::ORDER {
        out.push_str(field.label());
        match field {
            HeaderField::Directory => out.push_str(&note.directory),
            HeaderField::Date => out.push_str(&note.timestamp.to_string()),
            HeaderField::Tag => out.push_str(&note.tags.to_string()),
            HeaderField::Context => out.push_str(&single_line(&note.context)),
        }
        out.push('\n');
    }
    out.push_str(MESSAGE_LABEL);
    out.push_str(&normalize_message(&note.message));
    out.push('\n');
    out
}

pub fn write_note<W: Write>(writer: &mut W, note: &Note) -> JotResult<()> {
    writer.write_all(encode(note).as_bytes())?;
    Ok(())
}

fn single_line(raw: &str) -> String {
    if raw.contains('\n') || raw.contains('\r') {
        raw.lines().map(str::trim).filter(|line| !line.is_empty()).collect::<Vec<_>>().join(" ")
    } else {
        raw.to_string()
    }
}
