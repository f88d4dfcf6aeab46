use crate::errors::JotResult;
use crate::models::{Note, Term};
use crate::query::Criterion;
use crate::reader::read_all;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermSets {
    pub tags: BTreeSet<String>,
    pub directories: BTreeSet<String>,
    pub timestamps: BTreeSet<i64>,
}

impl TermSets {
    pub fn insert(&mut self, term: Term) -> bool {
        match term {
            Term::Tag(tag) => self.tags.insert(tag),
            Term::Directory(directory) => self.directories.insert(directory),
            Term::Timestamp(timestamp) => self.timestamps.insert(timestamp),
        }
    }

    pub fn remove(&mut self, term: &Term) -> bool {
        match term {
            Term::Tag(tag) => self.tags.remove(tag),
            Term::Directory(directory) => self.directories.remove(directory),
            Term::Timestamp(timestamp) => self.timestamps.remove(timestamp),
        }
    }

    pub fn contains(&self, term: &Term) -> bool {
        match term {
            Term::Tag(tag) => self.tags.contains(tag),
            Term::Directory(directory) => self.directories.contains(directory),
            Term::Timestamp(timestamp) => self.timestamps.contains(timestamp),
        }
    }

    pub fn union(&mut self, other: &TermSets) {
        self.tags.extend(other.tags.iter().cloned());
        self.directories.extend(other.directories.iter().cloned());
        self.timestamps.extend(other.timestamps.iter().copied());
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.directories.is_empty() && self.timestamps.is_empty()
    }

    // visibility order: tags, timestamps, directories
    pub fn iter(&self) -> impl Iterator<Item = Term> + '_ {
        self.tags
            .iter()
            .cloned()
            .map(Term::Tag)
            .chain(self.timestamps.iter().copied().map(Term::Timestamp))
            .chain(self.directories.iter().cloned().map(Term::Directory))
    }

    fn hides(&self, note: &Note) -> bool {
        note.tags.iter().any(|tag| self.tags.contains(tag))
            || self.directories.contains(&note.directory)
            || self.timestamps.contains(&note.timestamp)
    }
}

fn selector(term: Term) -> Criterion {
    match term {
        Term::Tag(tag) => Criterion::Tag(tag),
        Term::Directory(directory) => Criterion::Directory(directory),
        Term::Timestamp(timestamp) => Criterion::Timestamp(timestamp),
    }
}

#[derive(Debug, Clone)]
pub struct Bundle {
    log: PathBuf,
    terms: TermSets,
    suppressed: TermSets,
    notes: Vec<Note>,
}

impl Bundle {
    pub fn empty(log: &Path) -> Self {
        Self {
            log: log.to_path_buf(),
            terms: TermSets::default(),
            suppressed: TermSets::default(),
            notes: Vec::new(),
        }
    }

    pub fn new<I, T>(log: &Path, terms: I) -> JotResult<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<Term>,
    {
        let mut bundle = Self::empty(log);
        for term in terms {
            bundle.terms.insert(term.into());
        }
        bundle.refresh()?;
        Ok(bundle)
    }

    pub fn with_term(&self, term: impl Into<Term>) -> JotResult<Self> {
        let mut next = self.clone();
        next.terms.insert(term.into());
        next.refresh()?;
        Ok(next)
    }

    pub fn without_term(&self, term: impl Into<Term>) -> JotResult<Self> {
        let mut next = self.clone();
        next.terms.remove(&term.into());
        next.refresh()?;
        Ok(next)
    }

    // Suppressions from neither side carry over.
    pub fn merged(&self, other: &Bundle) -> JotResult<Self> {
        let mut next = Self::empty(&self.log);
        next.terms = self.terms.clone();
        next.terms.union(&other.terms);
        next.refresh()?;
        Ok(next)
    }

    pub fn subtract(&self, other: &Bundle) -> Self {
        let mut next = self.clone();
        for term in other.terms.iter() {
            next.suppress(term);
        }
        next
    }

    pub fn suppress(&mut self, term: impl Into<Term>) {
        self.suppressed.insert(term.into());
    }

    pub fn unsuppress(&mut self, term: impl Into<Term>) -> bool {
        self.suppressed.remove(&term.into())
    }

    pub fn refresh(&mut self) -> JotResult<()> {
        self.notes.clear();
        if self.terms.is_empty() {
            return Ok(());
        }
        // Selection order: tags, directories, timestamps. Records are
        // de-duplicated by their position in the log, not by value.
        let selectors = self
            .terms
            .tags
            .iter()
            .cloned()
            .map(Term::Tag)
            .chain(self.terms.directories.iter().cloned().map(Term::Directory))
            .chain(self.terms.timestamps.iter().copied().map(Term::Timestamp))
            .map(selector)
            .collect::<Vec<_>>();
        let mut records = read_all(&self.log)?.into_iter().map(Some).collect::<Vec<_>>();
        for criterion in &selectors {
            for slot in records.iter_mut() {
                if slot.as_ref().is_some_and(|note| criterion.matches(note)) {
                    if let Some(note) = slot.take() {
                        self.notes.push(note);
                    }
                }
            }
        }
        tracing::debug!(path = %self.log.display(), notes = self.notes.len(), "bundle regenerated");
        Ok(())
    }

    pub fn log(&self) -> &Path {
        &self.log
    }

    pub fn terms(&self) -> &TermSets {
        &self.terms
    }

    pub fn suppressed(&self) -> &TermSets {
        &self.suppressed
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn visible(&self) -> Vec<&Note> {
        let mut seen = vec![false; self.notes.len()];
        let mut visible = Vec::new();
        for term in self.terms.iter() {
            let criterion = selector(term);
            for (index, note) in self.notes.iter().enumerate() {
                if seen[index] || !criterion.matches(note) || self.suppressed.hides(note) {
                    continue;
                }
                seen[index] = true;
                visible.push(note);
            }
        }
        visible
    }

    pub fn iter(&self) -> impl Iterator<Item = &Note> {
        self.visible().into_iter()
    }

    pub fn len(&self) -> usize {
        self.visible().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn flatten(&self) -> String {
        flatten_notes(self.visible())
    }

    // ignores suppression
    pub fn active_tags(&self) -> BTreeSet<String> {
        self.notes
            .iter()
            .flat_map(|note| note.tags.iter().map(str::to_string))
            .collect()
    }
}

pub fn flatten_notes<'a>(notes: impl IntoIterator<Item = &'a Note>) -> String {
    let mut combined = String::new();
    for note in notes {
        combined.push_str(note.context.trim());
        combined.push_str("\n\n");
        combined.push_str(note.message.trim());
        combined.push_str("\n\n");
    }
    combined.trim().to_string()
}

impl fmt::Display for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::append;
    use crate::models::{NewNote, TagSet};

    fn story_log(root: &Path) -> PathBuf {
        let log = root.join("bellvue.jot");
        let seed = [
            ("/story/character", 10, "character-backstory luna", "Luna", "Luna grew up by the sea."),
            ("/story/character", 11, "character-backstory bastard", "Sam", "Sam is trouble."),
            ("/story/character", 12, "character-backstory", "Evie", "Evie keeps the books."),
            ("/story/premise", 20, "story_premise", "Premise", "A family estate."),
            ("/system/rules", 30, "system_role", "Rules", "Stay in character."),
        ];
        for (directory, timestamp, tags, context, message) in seed {
            append(
                &log,
                NewNote::new(message)
                    .in_directory(directory)
                    .at(timestamp)
                    .tagged(TagSet::parse(tags))
                    .with_context(context),
            )
            .expect("append");
        }
        log
    }

    #[test]
    fn terms_are_sorted_into_kinds_without_duplicates() {
        let root = tempfile::tempdir().expect("temp root");
        let log = story_log(root.path());
        let terms = [Term::from("luna"), Term::from("/story/premise"), Term::parse("30"), Term::from("luna")];
        let bundle = Bundle::new(&log, terms).expect("bundle");
        assert_eq!(bundle.terms().tags.len(), 1);
        assert!(bundle.terms().contains(&Term::Directory("/story/premise".to_string())));
        assert!(bundle.terms().contains(&Term::Timestamp(30)));
        assert_eq!(bundle.len(), 3);
    }

    #[test]
    fn combinators_leave_inputs_untouched() {
        let root = tempfile::tempdir().expect("temp root");
        let log = story_log(root.path());
        let base = Bundle::new(&log, ["/story/character"]).expect("bundle");
        let grown = base.with_term(20i64).expect("with term");
        let shrunk = grown.without_term("/story/character").expect("without term");

        assert_eq!(base.len(), 3);
        assert_eq!(grown.len(), 4);
        assert_eq!(shrunk.len(), 1);
        assert_eq!(base.without_term("absent").expect("absent").len(), 3);
    }

    #[test]
    fn suppression_hides_without_dropping() {
        let root = tempfile::tempdir().expect("temp root");
        let log = story_log(root.path());
        let mut bundle = Bundle::new(&log, ["character-backstory"]).expect("bundle");
        assert_eq!(bundle.len(), 3);

        bundle.suppress("bastard");
        assert_eq!(bundle.len(), 2);
        assert!(bundle.iter().all(|note| !note.tags.contains("bastard")));
        assert_eq!(bundle.notes().len(), 3);
        assert!(bundle.active_tags().contains("bastard"));

        bundle.suppress(12i64);
        assert_eq!(bundle.len(), 1);
        assert!(bundle.unsuppress("bastard"));
        assert!(!bundle.unsuppress("bastard"));
        assert_eq!(bundle.len(), 2);

        bundle.suppress("/story/character");
        assert!(bundle.is_empty());
    }

    #[test]
    fn subtract_suppresses_every_term_of_the_operand() {
        let root = tempfile::tempdir().expect("temp root");
        let log = story_log(root.path());
        let characters = Bundle::new(&log, ["/story/character"]).expect("bundle");
        let luna = Bundle::new(&log, ["luna"]).expect("bundle");

        let without_luna = characters.subtract(&luna);
        assert_eq!(without_luna.len(), 2);
        assert!(without_luna.suppressed().tags.contains("luna"));
        assert_eq!(characters.len(), 3);

        let merged = without_luna.merged(&luna).expect("merge");
        assert!(merged.suppressed().is_empty());
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn visible_order_is_tags_then_timestamps_then_directories() {
        let root = tempfile::tempdir().expect("temp root");
        let log = story_log(root.path());
        let bundle = Bundle::new(&log, [Term::from("/story/character"), Term::from(30i64), Term::from("story_premise")])
            .expect("bundle");
        let order = bundle.iter().map(|note| note.timestamp).collect::<Vec<_>>();
        assert_eq!(order, vec![20, 30, 10, 11, 12]);
    }

    #[test]
    fn flatten_joins_context_and_message() {
        let root = tempfile::tempdir().expect("temp root");
        let log = story_log(root.path());
        let mut bundle = Bundle::new(&log, [20i64, 30]).expect("bundle");
        assert_eq!(
            bundle.to_string(),
            "Premise\n\nA family estate.\n\nRules\n\nStay in character."
        );
        bundle.suppress(20i64);
        bundle.suppress(30i64);
        assert_eq!(bundle.flatten(), "");
    }

    #[test]
    fn empty_bundle_does_not_touch_the_log() {
        let root = tempfile::tempdir().expect("temp root");
        let bundle = Bundle::new(&root.path().join("absent.jot"), Vec::<Term>::new()).expect("empty bundle");
        assert!(bundle.is_empty());
        assert!(Bundle::new(&root.path().join("absent.jot"), ["x"]).is_err());
    }

    #[test]
    fn identical_records_stay_distinct_and_numeric_tags_select_by_tag() {
        let root = tempfile::tempdir().expect("temp root");
        let log = root.path().join("twins.jot");
        for _ in 0..2 {
            append(&log, NewNote::new("same").in_directory("/twins").at(7).tagged(TagSet::parse("2024")))
                .expect("append");
        }

        let by_dir = Bundle::new(&log, ["/twins"]).expect("bundle");
        assert_eq!(by_dir.len(), 2);
        let both = by_dir.with_term("2024").expect("numeric tag");
        assert!(both.terms().tags.contains("2024"));
        assert!(both.terms().timestamps.is_empty());
        assert_eq!(both.notes().len(), 2);
        assert_eq!(both.len(), 2);
    }
}
