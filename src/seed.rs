//! Example-corpus discovery and seeding.
//!
//! An example corpus is a directory of `Example*` subdirectories, each
//! holding an `input/` folder (discussion notes) and an `output/` folder
//! (the finished scope document):
//!
//! ```text
//! data/
//!   Example1/
//!     input/notes.txt
//!     output/scope.md
//!   Example2/ ...
//! ```
//!
//! Files inside `input/` and `output/` are filtered by
//! `[seed] include_globs`, read in path order, and joined with `\n---\n`.
//! Each example is ingested once under document key `example:<name>`, so
//! re-seeding replaces the previous version.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use walkdir::WalkDir;

use scopeforge_core::evaluate::{EXPECTED_OUTPUT_MARKER, INPUT_MARKER};
use scopeforge_core::models::IngestMetadata;

use crate::knowledge::{IngestReport, KnowledgeBase};

pub const EXAMPLE_SOURCE: &str = "example";
const FILE_SEPARATOR: &str = "\n---\n";

/// One prior project: its raw notes and the document it became.
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    pub name: String,
    pub path: PathBuf,
    pub input: String,
    pub output: String,
}

impl Example {
    pub fn document_key(&self) -> String {
        format!("{}:{}", EXAMPLE_SOURCE, self.name)
    }

    /// Text stored in the knowledge base for this example.
    pub fn document_text(&self) -> String {
        format!(
            "{}{}\n\n{}{}",
            INPUT_MARKER, self.input, EXPECTED_OUTPUT_MARKER, self.output
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SeedReport {
    pub example: String,
    pub chunks: usize,
    pub document_key: String,
}

/// Find every `Example*` directory directly under `root`, sorted by name.
pub fn scan_examples(root: &Path, include_globs: &[String]) -> Result<Vec<Example>> {
    if !root.is_dir() {
        bail!("Example directory does not exist: {}", root.display());
    }
    let include_set = build_globset(include_globs)?;

    let mut examples = Vec::new();
    for entry in std::fs::read_dir(root)
        .with_context(|| format!("Failed to read {}", root.display()))?
    {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if !entry.file_type()?.is_dir() || !name.starts_with("Example") {
            continue;
        }
        let path = entry.path();
        examples.push(Example {
            input: read_folder(&path.join("input"), &include_set)?,
            output: read_folder(&path.join("output"), &include_set)?,
            name,
            path,
        });
    }

    examples.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(examples)
}

/// Concatenate matching files under `dir`. A missing folder reads as empty.
fn read_folder(dir: &Path, include_set: &GlobSet) -> Result<String> {
    if !dir.is_dir() {
        return Ok(String::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
        if include_set.is_match(relative.to_string_lossy().as_ref()) {
            files.push(entry.into_path());
        }
    }

    let mut texts = Vec::with_capacity(files.len());
    for path in files {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        texts.push(text.trim().to_string());
    }
    Ok(texts.join(FILE_SEPARATOR))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// Ingest every example. Examples with no text at all are skipped.
pub async fn seed_examples(kb: &KnowledgeBase, examples: &[Example]) -> Result<Vec<SeedReport>> {
    let mut reports = Vec::new();
    for ex in examples {
        if ex.input.trim().is_empty() && ex.output.trim().is_empty() {
            tracing::warn!(example = %ex.name, "no matching input or output files; skipped");
            continue;
        }
        let metadata = IngestMetadata::new(&ex.name, EXAMPLE_SOURCE)
            .with_tag(EXAMPLE_SOURCE)
            .with_document_key(ex.document_key());
        let IngestReport {
            document_key,
            chunk_ids,
            ..
        } = kb
            .ingest(&ex.document_text(), &metadata)
            .await
            .with_context(|| format!("Failed to seed {}", ex.name))?;
        reports.push(SeedReport {
            example: ex.name.clone(),
            chunks: chunk_ids.len(),
            document_key,
        });
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn globs() -> Vec<String> {
        vec!["**/*.txt".to_string(), "**/*.md".to_string()]
    }

    #[test]
    fn scans_example_dirs_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("Example2/input")).unwrap();
        fs::create_dir_all(root.join("Example1/input")).unwrap();
        fs::create_dir_all(root.join("Example1/output")).unwrap();
        fs::create_dir_all(root.join("scratch")).unwrap();
        fs::write(root.join("Example1/input/a.txt"), "call notes one").unwrap();
        fs::write(root.join("Example1/input/b.txt"), "call notes two").unwrap();
        fs::write(root.join("Example1/input/ignored.bin"), "xx").unwrap();
        fs::write(root.join("Example1/output/scope.md"), "# Scope").unwrap();
        fs::write(root.join("Example2/input/n.txt"), "other").unwrap();

        let examples = scan_examples(root, &globs()).unwrap();
        let names: Vec<_> = examples.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Example1", "Example2"]);
        assert_eq!(examples[0].input, "call notes one\n---\ncall notes two");
        assert_eq!(examples[0].output, "# Scope");
        assert_eq!(examples[1].output, "");
        assert_eq!(
            examples[0].document_text(),
            "INPUT:\ncall notes one\n---\ncall notes two\n\nEXPECTED_OUTPUT:\n# Scope"
        );
        assert_eq!(examples[0].document_key(), "example:Example1");
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(scan_examples(&dir.path().join("nope"), &globs()).is_err());
    }
}
