//! Project descriptor (`pom.xml`) discovery and versioning.
//!
//! Only the `<artifactId>` and `<version>` elements that are direct children
//! of the root element are read or rewritten. Versions inside `<parent>`,
//! `<dependencies>` or plugin blocks are never touched, and every byte
//! outside the version text is preserved.

use crate::config::schema::DescriptorSettings;
use crate::config::version::is_unpublished;
use crate::patch::{PatchError, ReplacementRule, Rendered};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("Failed to read descriptor {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed XML in {}: {source}", path.display())]
    Xml {
        path: PathBuf,
        #[source]
        source: quick_xml::Error,
    },

    #[error("Descriptor {} has no project-level <artifactId>", path.display())]
    MissingArtifactId { path: PathBuf },

    #[error("Failed to walk {}: {source}", root.display())]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Byte range of an element's inner content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// Root-level coordinates found in a descriptor's text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Coordinates {
    pub artifact_id: Option<Span>,
    pub version: Option<Span>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    ArtifactId,
    Version,
}

/// Locate the root-level `<artifactId>` and `<version>` of a descriptor.
pub fn locate_coordinates(content: &str) -> Result<Coordinates, quick_xml::Error> {
    let mut reader = Reader::from_str(content);
    let mut coordinates = Coordinates::default();
    let mut depth = 0usize;
    let mut open: Option<(Field, usize)> = None;

    loop {
        let before = reader.buffer_position() as usize;
        let event = reader.read_event()?;
        let after = reader.buffer_position() as usize;

        match event {
            Event::Start(e) => {
                depth += 1;
                if depth == 2 && open.is_none() {
                    let field = match e.local_name().as_ref() {
                        b"artifactId" if coordinates.artifact_id.is_none() => {
                            Some(Field::ArtifactId)
                        }
                        b"version" if coordinates.version.is_none() => Some(Field::Version),
                        _ => None,
                    };
                    open = field.map(|field| (field, after));
                }
            }
            Event::End(_) => {
                if depth == 2 {
                    if let Some((field, start)) = open.take() {
                        let span = Some(Span { start, end: before });
                        match field {
                            Field::ArtifactId => coordinates.artifact_id = span,
                            Field::Version => coordinates.version = span,
                        }
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }

        if coordinates.artifact_id.is_some() && coordinates.version.is_some() {
            break;
        }
    }

    Ok(coordinates)
}

fn span_text(content: &str, span: Span) -> &str {
    content[span.start..span.end].trim()
}

/// A project descriptor as found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub path: PathBuf,
    pub artifact_id: String,
    /// `None` when the version is inherited from a parent descriptor
    pub version: Option<String>,
}

fn load(path: &Path) -> Result<(String, Coordinates, String), DescriptorError> {
    let content = fs::read_to_string(path).map_err(|source| DescriptorError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let coordinates = locate_coordinates(&content).map_err(|source| DescriptorError::Xml {
        path: path.to_path_buf(),
        source,
    })?;

    let artifact_id = coordinates
        .artifact_id
        .map(|span| span_text(&content, span).to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| DescriptorError::MissingArtifactId {
            path: path.to_path_buf(),
        })?;

    Ok((content, coordinates, artifact_id))
}

pub fn read_descriptor(path: &Path) -> Result<Descriptor, DescriptorError> {
    let (content, coordinates, artifact_id) = load(path)?;
    Ok(Descriptor {
        path: path.to_path_buf(),
        artifact_id,
        version: coordinates
            .version
            .map(|span| span_text(&content, span).to_string()),
    })
}

/// Find every descriptor under `root`, sorted by path.
///
/// Hidden directories and the configured skip directories (build output)
/// are not descended into.
pub fn discover_descriptors(
    root: &Path,
    settings: &DescriptorSettings,
) -> Result<Vec<PathBuf>, DescriptorError> {
    let mut files = Vec::new();

    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return true;
        }
        let name = entry.file_name().to_string_lossy();
        !name.starts_with('.') && !settings.skip_dirs.iter().any(|skip| *skip == name)
    });

    for entry in walker {
        let entry = entry.map_err(|source| DescriptorError::Walk {
            root: root.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file()
            && entry.file_name().to_string_lossy() == settings.file_name.as_str()
        {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

/// What a release does with one descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorUpdate {
    /// Version rewritten (or already equal to the release version)
    Updated {
        path: PathBuf,
        artifact_id: String,
        from: String,
        to: String,
    },
    /// Version reads the unpublished sentinel
    Unpublished { path: PathBuf, artifact_id: String },
    /// No project-level version; inherited from the parent
    Inherited { path: PathBuf, artifact_id: String },
}

impl DescriptorUpdate {
    pub fn path(&self) -> &Path {
        match self {
            DescriptorUpdate::Updated { path, .. }
            | DescriptorUpdate::Unpublished { path, .. }
            | DescriptorUpdate::Inherited { path, .. } => path,
        }
    }

    /// Artifact id when the descriptor is published with the release version.
    pub fn published_artifact(&self) -> Option<&str> {
        match self {
            DescriptorUpdate::Updated { artifact_id, .. } => Some(artifact_id),
            _ => None,
        }
    }
}

/// Decide what to do with one descriptor and render its new text.
///
/// The rendered text is `None` for skipped descriptors. Nothing is written.
pub fn prepare_update(
    path: &Path,
    version: &str,
    settings: &DescriptorSettings,
) -> Result<(DescriptorUpdate, Option<Rendered>), DescriptorError> {
    let (content, coordinates, artifact_id) = load(path)?;

    let Some(span) = coordinates.version else {
        tracing::warn!(path = %path.display(), %artifact_id, "descriptor inherits its version, skipping");
        return Ok((
            DescriptorUpdate::Inherited {
                path: path.to_path_buf(),
                artifact_id,
            },
            None,
        ));
    };

    let current = span_text(&content, span).to_string();
    if is_unpublished(&current, &settings.unpublished_version) {
        tracing::debug!(path = %path.display(), %artifact_id, "unpublished descriptor, skipping");
        return Ok((
            DescriptorUpdate::Unpublished {
                path: path.to_path_buf(),
                artifact_id,
            },
            None,
        ));
    }

    let transformed = set_version(&content, span, version);
    let rendered = Rendered {
        replacements: usize::from(transformed != content),
        original: content,
        transformed,
    };

    Ok((
        DescriptorUpdate::Updated {
            path: path.to_path_buf(),
            artifact_id,
            from: current,
            to: version.to_string(),
        },
        Some(rendered),
    ))
}

/// Replace the inner content of the version span.
pub fn set_version(content: &str, span: Span, version: &str) -> String {
    let mut out = String::with_capacity(content.len() + version.len());
    out.push_str(&content[..span.start]);
    out.push_str(version);
    out.push_str(&content[span.end..]);
    out
}

/// Rules that move `<artifactId>A</artifactId> ... <version>X</version>`
/// snippets in documentation to `version`, one rule per artifact.
pub fn doc_rules<'a>(
    artifacts: impl IntoIterator<Item = &'a str>,
    version: &str,
) -> Result<Vec<ReplacementRule>, PatchError> {
    artifacts
        .into_iter()
        .map(|artifact| {
            let pattern = format!(
                "<artifactId>{}</artifactId>([^<]*)<version>[^<]+</version>",
                regex::escape(artifact)
            );
            let template = format!(
                "<artifactId>{}</artifactId>${{1}}<version>{}</version>",
                artifact.replace('$', "$$"),
                version.replace('$', "$$")
            );
            ReplacementRule::new(&pattern, template)
        })
        .collect()
}
