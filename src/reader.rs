// Record boundary: a blank line (or start of file) followed by the separator.
// A boundary whose next lines are not a valid header starts a salvaged note
// carrying the rejected lines, so a rewrite never drops text.

use crate::codec::{is_separator, HeaderField, MESSAGE_LABEL};
use crate::errors::{JotError, JotResult};
use crate::models::{normalize_message, Note, TagSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub const SALVAGE_CONTEXT: &str = "salvaged: unexpected record separator inside a note body";

#[derive(Debug, Clone)]
struct Header {
    directory: String,
    timestamp: i64,
    tags: TagSet,
    context: String,
}

impl Header {
    fn from_values(values: &[String]) -> Self {
        Self {
            directory: values[0].clone(),
            timestamp: values[1].trim().parse().unwrap_or_default(),
            tags: TagSet::parse(&values[2]),
            context: values[3].clone(),
        }
    }

    fn orphan() -> Self {
        Self {
            directory: "/".to_string(),
            timestamp: 0,
            tags: TagSet::new(),
            context: String::new(),
        }
    }
}

#[derive(Debug)]
enum ReadState {
    // Lines seen before the first boundary.
    Seeking { stray: Vec<String> },
    Header { raw: Vec<String>, values: Vec<String> },
    Body { header: Header, lines: Vec<String>, labelled: bool },
}

impl ReadState {
    fn seeking() -> Self {
        Self::Seeking { stray: Vec::new() }
    }
}

pub struct LogReader<R> {
    source: R,
    state: ReadState,
    previous_blank: bool,
    last_header: Option<Header>,
    line_number: usize,
    finished: bool,
}

impl LogReader<BufReader<File>> {
    pub fn open(path: &Path) -> JotResult<Self> {
        let file = File::open(path).map_err(|error| match error.kind() {
            std::io::ErrorKind::NotFound => {
                JotError::NotFound(format!("No note log found at {}", path.display()))
            }
            _ => JotError::Io(error.to_string()),
        })?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> LogReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            source,
            state: ReadState::seeking(),
            previous_blank: true,
            last_header: None,
            line_number: 0,
            finished: false,
        }
    }

    fn next_line(&mut self) -> JotResult<Option<String>> {
        let mut bytes = Vec::new();
        let read = self
            .source
            .read_until(b'\n', &mut bytes)
            .map_err(|error| JotError::Io(error.to_string()))?;
        if read == 0 {
            return Ok(None);
        }
        self.line_number += 1;
        if bytes.last() == Some(&b'\n') {
            bytes.pop();
            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }
        }
        let line = match String::from_utf8(bytes) {
            Ok(line) => line,
            Err(error) => {
                tracing::warn!(line = self.line_number, "replacing invalid UTF-8 in note log");
                String::from_utf8_lossy(error.as_bytes()).into_owned()
            }
        };
        Ok(Some(line))
    }

    fn feed(&mut self, line: String) -> Option<Note> {
        let blank = line.trim().is_empty();
        let boundary = self.previous_blank && is_separator(&line);
        self.previous_blank = blank;

        let mut emitted = None;
        let state = std::mem::replace(&mut self.state, ReadState::seeking());
        self.state = match state {
            ReadState::Seeking { mut stray } => {
                if boundary {
                    emitted = self.salvage_stray(stray);
                    ReadState::Header { raw: Vec::new(), values: Vec::new() }
                } else {
                    stray.push(line);
                    ReadState::Seeking { stray }
                }
            }
            ReadState::Body { header, mut lines, labelled } => {
                if boundary {
                    emitted = Some(self.emit(header, lines, labelled));
                    ReadState::Header { raw: Vec::new(), values: Vec::new() }
                } else {
                    lines.push(line);
                    ReadState::Body { header, lines, labelled }
                }
            }
            ReadState::Header { mut raw, mut values } => {
                let field = HeaderField::ORDER[values.len()];
                match field.accept(&line).map(str::to_string) {
                    Some(value) => {
                        values.push(value);
                        raw.push(line);
                        if values.len() == HeaderField::ORDER.len() {
                            ReadState::Body {
                                header: Header::from_values(&values),
                                lines: Vec::new(),
                                labelled: true,
                            }
                        } else {
                            ReadState::Header { raw, values }
                        }
                    }
                    None => {
                        tracing::warn!(
                            line = self.line_number,
                            expected = field.label(),
                            "record separator not followed by a valid header; salvaging"
                        );
                        raw.push(line);
                        ReadState::Body { header: self.salvage_header(), lines: raw, labelled: false }
                    }
                }
            }
        };
        emitted
    }

    fn finish(&mut self) -> Option<Note> {
        match std::mem::replace(&mut self.state, ReadState::seeking()) {
            ReadState::Seeking { stray } => self.salvage_stray(stray),
            ReadState::Body { header, lines, labelled } => Some(self.emit(header, lines, labelled)),
            ReadState::Header { raw, .. } if raw.is_empty() => None,
            ReadState::Header { raw, .. } => {
                tracing::warn!(line = self.line_number, "log ended inside a record header; salvaging");
                let header = self.salvage_header();
                Some(self.emit(header, raw, false))
            }
        }
    }

    fn salvage_stray(&mut self, stray: Vec<String>) -> Option<Note> {
        if stray.iter().all(|line| line.trim().is_empty()) {
            return None;
        }
        tracing::warn!(lines = stray.len(), "text before first record boundary; salvaging");
        let header = self.salvage_header();
        Some(self.emit(header, stray, false))
    }

    fn salvage_header(&self) -> Header {
        let mut header = self.last_header.clone().unwrap_or_else(Header::orphan);
        header.context = SALVAGE_CONTEXT.to_string();
        header
    }

    fn emit(&mut self, header: Header, mut lines: Vec<String>, labelled: bool) -> Note {
        if labelled {
            if let Some(first) = lines.first_mut() {
                if let Some(rest) = first.strip_prefix(MESSAGE_LABEL) {
                    *first = rest.to_string();
                }
            }
        }
        self.last_header = Some(header.clone());
        Note {
            directory: header.directory,
            timestamp: header.timestamp,
            tags: header.tags,
            context: header.context,
            message: normalize_message(&lines.join("\n")),
        }
    }
}

impl<R: BufRead> Iterator for LogReader<R> {
    type Item = JotResult<Note>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            match self.next_line() {
                Ok(Some(line)) => {
                    if let Some(note) = self.feed(line) {
                        return Some(Ok(note));
                    }
                }
                Ok(None) => {
                    self.finished = true;
                    return self.finish().map(Ok);
                }
                Err(error) => {
                    self.finished = true;
                    return Some(Err(error));
                }
            }
        }
    }
}

pub fn read_all(path: &Path) -> JotResult<Vec<Note>> {
    LogReader::open(path)?.collect()
}

pub fn decode(text: &str) -> JotResult<Vec<Note>> {
    LogReader::new(text.as_bytes()).collect()
}
