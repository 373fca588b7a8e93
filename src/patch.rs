use crate::cache::get_or_compile_regex;
use regex::{Captures, Regex};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A single search/replace step: every match of `pattern` is replaced by `template`.
///
/// Patterns are compiled in multi-line, dot-matches-newline mode, so `^`/`$`
/// anchor at every line boundary and `.` crosses line breaks. Templates use
/// the `regex` expansion syntax: `$1`, `${1}`, `${name}`, and `$$` for a
/// literal dollar sign.
#[derive(Debug, Clone)]
pub struct ReplacementRule {
    regex: Regex,
    template: String,
}

impl ReplacementRule {
    /// Compile a rule. Fails with [`PatchError::InvalidPattern`] before any file is touched.
    pub fn new(pattern: &str, template: impl Into<String>) -> Result<Self, PatchError> {
        let regex = get_or_compile_regex(pattern).map_err(|source| PatchError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            regex,
            template: template.into(),
        })
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Apply this rule to `text`, returning the new text and the number of matches replaced.
    pub fn apply(&self, text: &str) -> (String, usize) {
        let mut count = 0;
        let replaced = self.regex.replace_all(text, |caps: &Captures<'_>| {
            count += 1;
            let mut expanded = String::new();
            caps.expand(&self.template, &mut expanded);
            expanded
        });
        (replaced.into_owned(), count)
    }
}

/// Apply `rules` in order, each rule's output feeding the next.
pub fn apply_rules(text: &str, rules: &[ReplacementRule]) -> (String, usize) {
    rules
        .iter()
        .fold((text.to_string(), 0), |(current, total), rule| {
            let (next, count) = rule.apply(&current);
            (next, total + count)
        })
}

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("Target file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("File I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PatchError {
    fn io(path: &Path, source: io::Error) -> Self {
        PatchError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result of applying a patch job.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "PatchOutcome should be checked for patched/unchanged"]
pub enum PatchOutcome {
    /// The file was rewritten
    Patched { file: PathBuf, replacements: usize },
    /// Every rule left the text as it was; nothing was written
    Unchanged { file: PathBuf },
}

impl PatchOutcome {
    pub fn file(&self) -> &Path {
        match self {
            PatchOutcome::Patched { file, .. } | PatchOutcome::Unchanged { file } => file,
        }
    }

    pub fn is_patched(&self) -> bool {
        matches!(self, PatchOutcome::Patched { .. })
    }
}

/// Text of a file before and after a patch job, computed without writing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub original: String,
    pub transformed: String,
    pub replacements: usize,
}

impl Rendered {
    pub fn is_changed(&self) -> bool {
        self.original != self.transformed
    }
}

/// A target file plus the ordered rules to run over it.
#[derive(Debug, Clone)]
#[must_use = "PatchJob does nothing until apply() is called"]
pub struct PatchJob {
    pub target: PathBuf,
    pub rules: Vec<ReplacementRule>,
}

impl PatchJob {
    pub fn new(target: impl Into<PathBuf>, rules: Vec<ReplacementRule>) -> Self {
        Self {
            target: target.into(),
            rules,
        }
    }

    /// Read the target and compute the transformed text.
    pub fn render(&self) -> Result<Rendered, PatchError> {
        let original = read_target(&self.target)?;
        let (transformed, replacements) = apply_rules(&original, &self.rules);
        Ok(Rendered {
            original,
            transformed,
            replacements,
        })
    }

    /// Render, then atomically replace the target when the text changed.
    pub fn apply(&self) -> Result<PatchOutcome, PatchError> {
        let rendered = self.render()?;
        if !rendered.is_changed() {
            return Ok(PatchOutcome::Unchanged {
                file: self.target.clone(),
            });
        }

        write_atomic(&self.target, &rendered.transformed)?;
        tracing::info!(
            file = %self.target.display(),
            replacements = rendered.replacements,
            "patched file"
        );

        Ok(PatchOutcome::Patched {
            file: self.target.clone(),
            replacements: rendered.replacements,
        })
    }
}

/// Patch `target` in place with `rules`.
pub fn patch(
    target: impl Into<PathBuf>,
    rules: Vec<ReplacementRule>,
) -> Result<PatchOutcome, PatchError> {
    PatchJob::new(target, rules).apply()
}

fn read_target(path: &Path) -> Result<String, PatchError> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(PatchError::NotFound(path.to_path_buf()))
        }
        Err(e) => return Err(PatchError::io(path, e)),
    };

    if !metadata.is_file() {
        return Err(PatchError::io(
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
        ));
    }

    fs::read_to_string(path).map_err(|e| PatchError::io(path, e))
}

/// Atomic file write: sibling tempfile + fsync + rename.
///
/// Either the full content lands at `path` or nothing changes.
pub fn write_atomic(path: &Path, content: &str) -> Result<(), PatchError> {
    write_atomic_with(path, content.as_bytes(), |file, bytes| file.write_all(bytes))
}

fn write_atomic_with<F>(path: &Path, content: &[u8], write: F) -> Result<(), PatchError>
where
    F: FnOnce(&mut File, &[u8]) -> io::Result<()>,
{
    // Same directory keeps the rename on one filesystem
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| {
            PatchError::io(
                path,
                io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
            )
        })?
        .to_string_lossy();

    let mut temp = tempfile::Builder::new()
        .prefix(&format!("{file_name}."))
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|e| PatchError::io(path, e))?;

    write(temp.as_file_mut(), content).map_err(|e| PatchError::io(path, e))?;
    temp.as_file().sync_all().map_err(|e| PatchError::io(path, e))?;

    if let Ok(metadata) = fs::metadata(path) {
        temp.as_file()
            .set_permissions(metadata.permissions())
            .map_err(|e| PatchError::io(path, e))?;
    }

    // Dropping the tempfile on any error above removes it; the rename is the last step
    temp.persist(path)
        .map_err(|e| PatchError::io(path, e.error))?;

    Ok(())
}
