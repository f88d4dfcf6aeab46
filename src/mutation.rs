// Delete, pop and amend write the shadow file (<log>.new); the log only
// changes on commit. A crash between commit's two renames leaves the log
// at the backup path.

use crate::codec::write_note;
use crate::errors::{parse_timestamp, JotError, JotResult};
use crate::models::{normalize_message, NewNote, Note, NotePatch};
use crate::query::{Criterion, Query};
use crate::reader::LogReader;
use crate::settings::{backup_path, shadow_path};
use chrono::Utc;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

pub fn append(log: &Path, draft: NewNote) -> JotResult<Note> {
    if draft.message.trim().is_empty() {
        return Err(JotError::EmptyInput("Refusing to append an empty note".to_string()));
    }
    let directory = match draft.directory {
        Some(directory) => directory,
        None => std::env::current_dir()
            .map_err(|error| JotError::Io(error.to_string()))?
            .to_string_lossy()
            .to_string(),
    };
    validate_directory(&directory)?;

    let note = Note {
        directory,
        timestamp: draft.timestamp.unwrap_or_else(|| Utc::now().timestamp()),
        tags: draft.tags,
        context: draft.context,
        message: normalize_message(&draft.message),
    };

    if let Some(parent) = log.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|error| JotError::Io(error.to_string()))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(log)
        .map_err(|error| JotError::Io(error.to_string()))?;

    let padding = boundary_padding(&mut file)?;
    file.write_all(padding.as_bytes())?;
    write_note(&mut file, &note)?;
    file.flush()?;

    tracing::info!(path = %log.display(), timestamp = note.timestamp, directory = %note.directory, "appended note");
    Ok(note)
}

// newlines needed so the next separator follows a blank line
fn boundary_padding(file: &mut File) -> JotResult<&'static str> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok("");
    }
    let tail_len = len.min(2);
    file.seek(SeekFrom::End(-(tail_len as i64)))?;
    let mut tail = vec![0u8; tail_len as usize];
    file.read_exact(&mut tail)?;

    Ok(match tail.as_slice() {
        b"\n\n" | b"\n" => "",
        [.., b'\n'] => "\n",
        _ => "\n\n",
    })
}

fn validate_directory(directory: &str) -> JotResult<()> {
    if !directory.starts_with('/') || directory.contains('\n') {
        return Err(JotError::InvalidInput(format!(
            "Directory must be a single-line absolute path: {:?}",
            directory
        )));
    }
    Ok(())
}

// Stages the log without notes stamped `timestamp`; returns how many were dropped.
pub fn delete(log: &Path, timestamp: i64) -> JotResult<usize> {
    let reader = LogReader::open(log)?;
    let shadow = shadow_path(log);
    let removed = stage(&shadow, |out| {
        let mut removed = 0usize;
        for note in reader {
            let note = note?;
            if note.timestamp == timestamp {
                removed += 1;
                continue;
            }
            write_note(out, &note)?;
        }
        Ok(removed)
    })?;

    tracing::info!(path = %shadow.display(), timestamp, removed, "staged delete");
    Ok(removed)
}

// Runs `write` against a fresh shadow file; a failed stage removes it.
fn stage<T>(shadow: &Path, write: impl FnOnce(&mut BufWriter<File>) -> JotResult<T>) -> JotResult<T> {
    let mut out = BufWriter::new(File::create(shadow)?);
    let result = write(&mut out).and_then(|value| {
        out.flush()?;
        Ok(value)
    });
    if let Err(error) = &result {
        drop(out);
        tracing::warn!(path = %shadow.display(), error = %error, "staging failed; removing shadow file");
        if let Err(cleanup) = fs::remove_file(shadow) {
            tracing::warn!(path = %shadow.display(), error = %cleanup, "could not remove shadow file");
        }
    }
    result
}

pub fn delete_raw(log: &Path, timestamp: &str) -> JotResult<usize> {
    delete(log, parse_timestamp(timestamp)?)
}

pub fn pop(log: &Path, directory: &str) -> JotResult<i64> {
    let mut last = None;
    for note in Query::single(Criterion::Directory(directory.to_string())).run(log)? {
        last = Some(note?.timestamp);
    }
    let Some(timestamp) = last else {
        return Err(JotError::NoTarget(format!("No note to pop for {}", directory)));
    };
    delete(log, timestamp)?;
    Ok(timestamp)
}

pub fn amend(log: &Path, patch: &NotePatch) -> JotResult<Note> {
    if let Some(directory) = patch.directory.as_deref() {
        validate_directory(directory)?;
    }

    let total = LogReader::open(log)?.try_fold(0usize, |count, note| note.map(|_| count + 1))?;
    if total == 0 {
        return Err(JotError::NoTarget(format!("No note to amend in {}", log.display())));
    }

    let reader = LogReader::open(log)?;
    let shadow = shadow_path(log);
    let amended = stage(&shadow, |out| {
        let mut amended = None;
        for (index, note) in reader.enumerate() {
            let mut note = note?;
            if index + 1 == total {
                patch.apply(&mut note);
                amended = Some(note.clone());
            }
            write_note(out, &note)?;
        }
        amended.ok_or_else(|| JotError::NoTarget("Log shrank during amend".to_string()))
    })?;
    tracing::info!(path = %shadow.display(), timestamp = amended.timestamp, "staged amend");
    Ok(amended)
}

// log -> <log>.old, <log>.new -> log
pub fn commit(log: &Path) -> JotResult<()> {
    let shadow = shadow_path(log);
    if !log.exists() {
        return Err(JotError::NotFound(format!("No note log found at {}", log.display())));
    }
    if !shadow.exists() {
        return Err(JotError::NotFound(format!("No staged changes at {}", shadow.display())));
    }

    let backup = backup_path(log);
    fs::rename(log, &backup).map_err(|error| JotError::Io(error.to_string()))?;
    fs::rename(&shadow, log).map_err(|error| JotError::Io(error.to_string()))?;

    tracing::info!(path = %log.display(), backup = %backup.display(), "committed staged changes");
    Ok(())
}

pub fn discard(log: &Path) -> JotResult<bool> {
    let shadow = shadow_path(log);
    match fs::remove_file(&shadow) {
        Ok(()) => {
            tracing::info!(path = %shadow.display(), "discarded staged changes");
            Ok(true)
        }
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(error) => Err(JotError::Io(error.to_string())),
    }
}
