//! # Per-File Reports
//!
//! [`FilesErrors`] keeps the outcome of every document, grouped by file in
//! the order files were validated, and renders them for people or for
//! machines.

use std::collections::BTreeMap;
use std::io::{self, Write};

use colored::Colorize;
use kval_core::Status;
use serde::Serialize;

use crate::error::{DocumentError, DocumentOutcome};

#[derive(Debug, Default)]
pub struct FilesErrors {
    files: Vec<(String, Vec<DocumentOutcome>)>,
}

/// Counts over every recorded document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub files: usize,
    pub documents: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl FilesErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcomes for `path`. Recording a path twice replaces the
    /// earlier entry in place.
    pub fn insert(&mut self, path: impl Into<String>, outcomes: Vec<DocumentOutcome>) {
        let path = path.into();
        match self.files.iter_mut().find(|(p, _)| *p == path) {
            Some(entry) => entry.1 = outcomes,
            None => self.files.push((path, outcomes)),
        }
    }

    pub fn has_error(&self) -> bool {
        self.files
            .iter()
            .any(|(_, outcomes)| outcomes.iter().any(DocumentOutcome::is_failure))
    }

    pub fn has_file_error(&self, path: &str) -> bool {
        self.get(path)
            .is_some_and(|outcomes| outcomes.iter().any(DocumentOutcome::is_failure))
    }

    pub fn get(&self, path: &str) -> Option<&[DocumentOutcome]> {
        self.files
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, outcomes)| outcomes.as_slice())
    }

    /// The errors of `path`, one slot per document, `None` for documents
    /// that passed or were skipped.
    pub fn errors(&self, path: &str) -> Option<Vec<Option<&DocumentError>>> {
        self.get(path)
            .map(|outcomes| outcomes.iter().map(DocumentOutcome::error).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[DocumentOutcome])> {
        self.files
            .iter()
            .map(|(path, outcomes)| (path.as_str(), outcomes.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary {
            files: self.files.len(),
            ..Summary::default()
        };
        for outcome in self.files.iter().flat_map(|(_, outcomes)| outcomes) {
            match outcome {
                DocumentOutcome::Skipped => summary.skipped += 1,
                DocumentOutcome::Passed => summary.passed += 1,
                DocumentOutcome::Failed(_) => summary.failed += 1,
            }
        }
        summary.documents = summary.passed + summary.failed;
        summary
    }

    /// One status line per file on `out`; the messages of failed documents
    /// go to `err`.
    pub fn render_human(&self, out: &mut impl Write, err: &mut impl Write, color: bool) -> io::Result<()> {
        for (path, outcomes) in self.iter() {
            let path_label = if color { path.bold().to_string() } else { path.to_string() };
            write!(out, "\n{path_label}...")?;
            if outcomes.iter().any(DocumentOutcome::is_failure) {
                writeln!(out, "{}", paint("ERROR", color, |s| s.red()))?;
                out.flush()?;
                for e in outcomes.iter().filter_map(DocumentOutcome::error) {
                    writeln!(err, "{e}")?;
                }
            } else {
                writeln!(out, "{}", paint("OK", color, |s| s.green()))?;
            }
        }
        Ok(())
    }

    /// An object of file path to one status per document, pretty-printed
    /// with four-space indentation.
    pub fn render_json(&self, out: &mut impl Write) -> io::Result<()> {
        let statuses: BTreeMap<&str, Vec<Status>> = self
            .iter()
            .map(|(path, outcomes)| (path, outcomes.iter().map(DocumentOutcome::to_status).collect()))
            .collect();

        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut *out, formatter);
        statuses.serialize(&mut serializer).map_err(io::Error::other)?;
        writeln!(out)
    }
}

fn paint(text: &str, color: bool, style: impl Fn(&str) -> colored::ColoredString) -> String {
    if color {
        style(text).to_string()
    } else {
        text.to_string()
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} files, {} documents: {} passed, {} failed, {} skipped",
            self.files, self.documents, self.passed, self.failed, self.skipped
        )
    }
}
