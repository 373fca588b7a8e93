//! Release Patcher: release automation for Maven-built Java libraries
//!
//! Bumps version numbers across project descriptors and documentation, runs
//! verification builds, commits and tags the release, and triggers the
//! deploy build.
//!
//! # Architecture
//!
//! Every file change compiles down to a single primitive: an ordered list of
//! [`ReplacementRule`]s run over a file's text, followed by one atomic
//! replace of the file. Descriptor discovery, documentation rules and
//! release orchestration only decide *which* rules run over *which* files.
//!
//! # Safety
//!
//! - Writes go to a sibling tempfile, are fsynced, then renamed over the target
//! - A failed render or write leaves the target byte-identical
//! - Release edits stay inside the project root and out of `target/` and `~/.m2`
//! - Rule patterns are compiled before any file is touched
//!
//! # Example
//!
//! ```no_run
//! use release_patcher::{patch, ReplacementRule};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let rules = vec![ReplacementRule::new(
//!     "<version>[^<]+</version>",
//!     "<version>2.0.0</version>",
//! )?];
//!
//! let outcome = patch("pom.xml", rules)?;
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod descriptor;
pub mod patch;
pub mod release;
pub mod safety;

// Re-exports
pub use config::{
    load_for_project, load_from_path, load_from_str, parse_release_version, ConfigError,
    ReleaseConfig, VersionError,
};
pub use descriptor::{Descriptor, DescriptorError, DescriptorUpdate};
pub use patch::{
    patch, write_atomic, PatchError, PatchJob, PatchOutcome, Rendered, ReplacementRule,
};
pub use release::{
    CommandRunner, CommandStatus, FileChange, Invocation, Release, ReleaseError, ReleaseOptions,
    ReleaseReport, SystemRunner,
};
pub use safety::{ProjectGuard, SafetyError};
