//! Plain-text bootstrap files.
//!
//! Each line is `key value`, split on the first run of blanks. Blank lines and lines starting with
//! `#` are skipped. Two directives are understood: `@select <db>` switches the database that
//! following lines write to, and `@include <file>` reads another file (relative to the including
//! one) into the current database.

use bytes::Bytes;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error as ThisError;

use crate::store::DEFAULT_DB;

const MAX_INCLUDE_DEPTH: usize = 16;

#[derive(Clone, Debug, PartialEq)]
pub enum SeedEntry {
    Select(String),
    Value { db: String, key: String, value: Bytes },
}

#[derive(Debug, ThisError)]
pub enum SeedError {
    #[error("cannot read '{}': {}", .path.display(), .source)]
    Io { path: PathBuf, source: io::Error },
    #[error("poorly formed line (file '{}', line number {}): '{}'", .path.display(), .line, .content)]
    PoorlyFormed {
        path: PathBuf,
        line: usize,
        content: String,
    },
    #[error("includes nested too deeply at '{}'", .0.display())]
    TooDeep(PathBuf),
}

/// Reads the bootstrap file at `path` and every file it includes.
pub fn load(path: &Path) -> Result<Vec<SeedEntry>, SeedError> {
    let mut entries = Vec::new();
    process_file(path, DEFAULT_DB, 0, &mut entries)?;
    Ok(entries)
}

fn process_file(
    path: &Path,
    db: &str,
    depth: usize,
    entries: &mut Vec<SeedEntry>,
) -> Result<(), SeedError> {
    if depth > MAX_INCLUDE_DEPTH {
        return Err(SeedError::TooDeep(path.to_path_buf()));
    }

    let content = fs::read_to_string(path).map_err(|source| SeedError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut db = db.to_string();
    entries.push(SeedEntry::Select(db.clone()));

    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let poorly_formed = || SeedError::PoorlyFormed {
            path: path.to_path_buf(),
            line: number + 1,
            content: line.to_string(),
        };

        if line.starts_with('@') {
            let parts: Vec<&str> = line.split_whitespace().collect();
            match parts[..] {
                ["@include", file] => {
                    let included = path
                        .parent()
                        .map(|dir| dir.join(file))
                        .unwrap_or_else(|| PathBuf::from(file));
                    process_file(&included, &db, depth + 1, entries)?;
                }
                ["@select", name] => {
                    db = name.to_string();
                    entries.push(SeedEntry::Select(db.clone()));
                }
                _ => return Err(poorly_formed()),
            }
            continue;
        }

        let (key, value) = line
            .split_once(|c: char| c == ' ' || c == '\t')
            .ok_or_else(poorly_formed)?;
        entries.push(SeedEntry::Value {
            db: db.clone(),
            key: key.to_string(),
            value: Bytes::copy_from_slice(value.trim_start().as_bytes()),
        });
    }

    Ok(())
}
