// A criterion with an empty value never matches, in either mode.

use crate::errors::{parse_timestamp, JotResult};
use crate::models::Note;
use crate::reader::LogReader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CriterionKind {
    All,
    Directory,
    Tree,
    Message,
    MessageInsensitive,
    Context,
    ContextInsensitive,
    Timestamp,
    Tag,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Criterion {
    All,
    Directory(String),
    Tree(String),
    Message(String),
    MessageInsensitive(String),
    Context(String),
    ContextInsensitive(String),
    Timestamp(i64),
    Tag(String),
}

impl Criterion {
    pub fn parse(kind: CriterionKind, raw: &str) -> JotResult<Self> {
        let value = raw.to_string();
        Ok(match kind {
            CriterionKind::All => Self::All,
            CriterionKind::Directory => Self::Directory(value),
            CriterionKind::Tree => Self::Tree(value),
            CriterionKind::Message => Self::Message(value),
            CriterionKind::MessageInsensitive => Self::MessageInsensitive(value),
            CriterionKind::Context => Self::Context(value),
            CriterionKind::ContextInsensitive => Self::ContextInsensitive(value),
            CriterionKind::Timestamp => Self::Timestamp(parse_timestamp(raw)?),
            CriterionKind::Tag => Self::Tag(value),
        })
    }

    pub fn kind(&self) -> CriterionKind {
        match self {
            Self::All => CriterionKind::All,
            Self::Directory(_) => CriterionKind::Directory,
            Self::Tree(_) => CriterionKind::Tree,
            Self::Message(_) => CriterionKind::Message,
            Self::MessageInsensitive(_) => CriterionKind::MessageInsensitive,
            Self::Context(_) => CriterionKind::Context,
            Self::ContextInsensitive(_) => CriterionKind::ContextInsensitive,
            Self::Timestamp(_) => CriterionKind::Timestamp,
            Self::Tag(_) => CriterionKind::Tag,
        }
    }

    fn has_value(&self) -> bool {
        match self {
            Self::All => true,
            Self::Timestamp(value) => *value != 0,
            Self::Directory(value)
            | Self::Tree(value)
            | Self::Message(value)
            | Self::MessageInsensitive(value)
            | Self::Context(value)
            | Self::ContextInsensitive(value)
            | Self::Tag(value) => !value.is_empty(),
        }
    }

    pub fn matches(&self, note: &Note) -> bool {
        if !self.has_value() {
            return false;
        }
        match self {
            Self::All => true,
            Self::Directory(value) => note.directory == *value,
            Self::Tree(value) => note.directory.starts_with(value.as_str()),
            Self::Message(value) => note.message.contains(value.as_str()),
            Self::MessageInsensitive(value) => contains_insensitive(&note.message, value),
            Self::Context(value) => note.context.contains(value.as_str()),
            Self::ContextInsensitive(value) => contains_insensitive(&note.context, value),
            Self::Timestamp(value) => note.timestamp == *value,
            Self::Tag(value) => note.tags.contains(value),
        }
    }
}

fn contains_insensitive(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Query {
    pub criteria: Vec<Criterion>,
    pub mode: MatchMode,
}

impl Query {
    pub fn new(mode: MatchMode, criteria: Vec<Criterion>) -> Self {
        Self { criteria, mode }
    }

    pub fn single(criterion: Criterion) -> Self {
        Self::new(MatchMode::And, vec![criterion])
    }

    pub fn and(mut self, criterion: Criterion) -> Self {
        self.criteria.push(criterion);
        self
    }

    pub fn matches(&self, note: &Note) -> bool {
        if self.criteria.is_empty() {
            return false;
        }
        match self.mode {
            MatchMode::And => {
                let satisfied = self.criteria.iter().filter(|criterion| criterion.matches(note)).count();
                satisfied == self.criteria.len()
            }
            MatchMode::Or => self.criteria.iter().any(|criterion| criterion.matches(note)),
        }
    }

    pub fn run(&self, log: &Path) -> JotResult<Matches<BufReader<File>>> {
        tracing::debug!(path = %log.display(), criteria = self.criteria.len(), mode = ?self.mode, "running query");
        Ok(self.run_on(LogReader::open(log)?))
    }

    pub fn run_on<R: BufRead>(&self, reader: LogReader<R>) -> Matches<R> {
        Matches {
            reader,
            query: self.clone(),
        }
    }
}

pub struct Matches<R> {
    reader: LogReader<R>,
    query: Query,
}

impl<R: BufRead> Iterator for Matches<R> {
    type Item = JotResult<Note>;

    fn next(&mut self) -> Option<Self::Item> {
        for item in self.reader.by_ref() {
            match item {
                Ok(note) if self.query.matches(&note) => return Some(Ok(note)),
                Ok(_) => continue,
                Err(error) => return Some(Err(error)),
            }
        }
        None
    }
}

pub fn search(log: &Path, term: &str) -> JotResult<Vec<Note>> {
    Query::single(Criterion::Message(term.to_string())).run(log)?.collect()
}

pub fn search_insensitive(log: &Path, term: &str) -> JotResult<Vec<Note>> {
    Query::single(Criterion::MessageInsensitive(term.to_string())).run(log)?.collect()
}

pub fn match_dir(log: &Path, directory: &str) -> JotResult<Vec<Note>> {
    Query::single(Criterion::Directory(directory.to_string())).run(log)?.collect()
}

pub fn list_tree(log: &Path, directory: &str) -> JotResult<Vec<Note>> {
    Query::single(Criterion::Tree(directory.to_string())).run(log)?.collect()
}

pub fn most_recent(log: &Path, directory: &str) -> JotResult<Option<Note>> {
    let mut last = None;
    for note in Query::single(Criterion::Tree(directory.to_string())).run(log)? {
        last = Some(note?);
    }
    Ok(last)
}

// notes below `directory`, excluding `directory` itself
pub fn count_children(log: &Path, directory: &str) -> JotResult<usize> {
    let mut count = 0;
    for note in Query::single(Criterion::Tree(directory.to_string())).run(log)? {
        if note?.directory != directory {
            count += 1;
        }
    }
    Ok(count)
}
