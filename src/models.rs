use serde::{Deserialize, Serialize};
use std::fmt;

// Tag tokens in written order, without duplicates. No token holds whitespace,
// so the set always renders onto a single `Tag:` line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct TagSet(Vec<String>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(raw: &str) -> Self {
        let mut tags = Self::new();
        tags.insert(raw);
        tags
    }

    pub fn contains(&self, token: &str) -> bool {
        self.0.iter().any(|value| value == token)
    }

    // Input holding whitespace is split into several tokens. Returns false
    // when nothing new was added.
    pub fn insert(&mut self, token: &str) -> bool {
        let mut added = false;
        for piece in token.split_whitespace() {
            if !self.contains(piece) {
                self.0.push(piece.to_string());
                added = true;
            }
        }
        added
    }

    pub fn remove(&mut self, token: &str) -> bool {
        let before = self.0.len();
        let pieces = token.split_whitespace().collect::<Vec<_>>();
        self.0.retain(|value| !pieces.contains(&value.as_str()));
        before != self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn merge_patch(&mut self, patch: &str) {
        for token in patch.split_whitespace() {
            match token.strip_prefix(REMOVAL_SIGIL) {
                Some(bare) => {
                    self.remove(bare);
                }
                None => {
                    self.insert(token);
                }
            }
        }
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

impl<S: AsRef<str>> FromIterator<S> for TagSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut tags = Self::new();
        for token in iter {
            tags.insert(token.as_ref());
        }
        tags
    }
}

impl From<Vec<String>> for TagSet {
    fn from(tokens: Vec<String>) -> Self {
        tokens.into_iter().collect()
    }
}

impl From<TagSet> for Vec<String> {
    fn from(tags: TagSet) -> Self {
        tags.0
    }
}

pub const REMOVAL_SIGIL: char = '~';

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub directory: String,
    pub timestamp: i64,
    pub tags: TagSet,
    pub context: String,
    pub message: String,
}

impl Note {
    // message and context compared trimmed
    pub fn same_content(&self, other: &Note) -> bool {
        self.directory == other.directory
            && self.timestamp == other.timestamp
            && self.tags == other.tags
            && self.context.trim() == other.context.trim()
            && self.message.trim() == other.message.trim()
    }
}

pub fn normalize_message(raw: &str) -> String {
    let mut message = raw.trim_end().to_string();
    message.push('\n');
    message
}

#[derive(Debug, Clone, Default)]
pub struct NewNote {
    pub message: String,
    pub directory: Option<String>,
    pub timestamp: Option<i64>,
    pub tags: TagSet,
    pub context: String,
}

impl NewNote {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn in_directory(mut self, directory: impl Into<String>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    pub fn at(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn tagged(mut self, tags: TagSet) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotePatch {
    pub context: Option<String>,
    // `~token` removes token
    pub tags: Option<String>,
    pub directory: Option<String>,
}

impl NotePatch {
    pub fn apply(&self, note: &mut Note) {
        if let Some(directory) = self.directory.as_ref() {
            note.directory = directory.clone();
        }
        if let Some(context) = self.context.as_ref() {
            note.context = context.clone();
        }
        if let Some(tags) = self.tags.as_ref() {
            note.tags.merge_patch(tags);
        }
    }
}

// Bundle selection term.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Term {
    Tag(String),
    Directory(String),
    Timestamp(i64),
}

impl Term {
    // A leading `/` makes a directory, anything else is a tag. Numeric
    // strings stay tags; timestamps come from `i64` or `Term::parse`.
    pub fn named(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.starts_with('/') {
            Self::Directory(trimmed.to_string())
        } else {
            Self::Tag(trimmed.to_string())
        }
    }

    // Command-line argument form: an integer argument is a timestamp.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<i64>() {
            Ok(timestamp) => Self::Timestamp(timestamp),
            Err(_) => Self::named(raw),
        }
    }
}

impl From<i64> for Term {
    fn from(value: i64) -> Self {
        Self::Timestamp(value)
    }
}

impl From<&str> for Term {
    fn from(value: &str) -> Self {
        Self::named(value)
    }
}

impl From<String> for Term {
    fn from(value: String) -> Self {
        Self::named(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_merge_unions_and_removes() {
        let mut tags = TagSet::parse("alpha beta");
        tags.merge_patch("x");
        assert_eq!(tags.to_string(), "alpha beta x");
        tags.merge_patch("x");
        assert_eq!(tags.len(), 3);
        tags.merge_patch("~x");
        assert!(!tags.contains("x"));
        tags.merge_patch("~x");
        assert_eq!(tags.to_string(), "alpha beta");
    }

    #[test]
    fn parse_collapses_whitespace_and_duplicates() {
        let tags = TagSet::parse("  one\ttwo  one ");
        assert_eq!(tags.iter().collect::<Vec<_>>(), vec!["one", "two"]);
        assert!(TagSet::parse("").is_empty());
    }

    #[test]
    fn terms_are_classified_by_shape() {
        assert_eq!(Term::parse("1725999543"), Term::Timestamp(1725999543));
        assert_eq!(Term::parse("/story/character"), Term::Directory("/story/character".to_string()));
        assert_eq!(Term::parse("luna"), Term::Tag("luna".to_string()));
        assert_eq!(Term::from(42i64), Term::Timestamp(42));
        assert_eq!(Term::from("2024"), Term::Tag("2024".to_string()));
        assert_eq!(Term::from("/tmp".to_string()), Term::Directory("/tmp".to_string()));
    }

    #[test]
    fn tag_tokens_never_hold_whitespace() {
        let tags = ["a\nb", "c d", "a"].into_iter().collect::<TagSet>();
        assert_eq!(tags.iter().collect::<Vec<_>>(), vec!["a", "b", "c", "d"]);
        assert_eq!(tags.to_string(), "a b c d");

        let mut tags = TagSet::new();
        assert!(tags.insert("x\ty"));
        assert!(!tags.insert("y"));
        assert!(tags.remove("x y"));
        assert!(tags.is_empty());

        let decoded: TagSet = serde_json::from_str(r#"["one two", "one"]"#).expect("tags json");
        assert_eq!(decoded.len(), 2);
        assert_eq!(serde_json::to_string(&decoded).expect("json"), r#"["one","two"]"#);
    }

    #[test]
    fn message_normalization_keeps_one_newline() {
        assert_eq!(normalize_message("hello\n\n\n  "), "hello\n");
        assert_eq!(normalize_message("a\n\n\nb"), "a\n\n\nb\n");
    }
}
