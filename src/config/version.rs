//! Release version parsing.
//!
//! Release versions are plain semantic versions: `MAJOR.MINOR.PATCH` with an
//! optional pre-release suffix. Build metadata never reaches a Maven
//! coordinate, so it is rejected.

use semver::Version;
use std::fmt;

#[derive(Debug, Clone)]
pub enum VersionError {
    /// Not a semantic version (e.g., "1.0" or "v1.0.0")
    InvalidVersion { value: String, source: String },
    /// Valid semver carrying `+build` metadata
    BuildMetadata { value: String },
}

impl fmt::Display for VersionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionError::InvalidVersion { value, source } => {
                write!(
                    f,
                    "invalid version '{}' (expected N.N.N): {}",
                    value, source
                )
            }
            VersionError::BuildMetadata { value } => {
                write!(f, "version '{}' must not carry build metadata", value)
            }
        }
    }
}

impl std::error::Error for VersionError {}

/// Parse a release version argument.
///
/// # Examples
///
/// ```
/// use release_patcher::config::version::parse_release_version;
///
/// assert_eq!(parse_release_version("1.4.0").unwrap().to_string(), "1.4.0");
/// assert!(parse_release_version("1.4").is_err());
/// ```
pub fn parse_release_version(value: &str) -> Result<Version, VersionError> {
    let trimmed = value.trim();
    let version = Version::parse(trimmed).map_err(|e| VersionError::InvalidVersion {
        value: value.to_string(),
        source: e.to_string(),
    })?;

    if !version.build.is_empty() {
        return Err(VersionError::BuildMetadata {
            value: value.to_string(),
        });
    }

    Ok(version)
}

/// Whether a descriptor's version text marks it as never published.
pub fn is_unpublished(version_text: &str, sentinel: &str) -> bool {
    version_text.trim() == sentinel
}
