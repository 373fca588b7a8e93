pub mod loader;
pub mod schema;
pub mod version;

pub use loader::{load_for_project, load_from_path, load_from_str, ConfigError, CONFIG_FILE_NAME};
pub use schema::{
    BuildSettings, DescriptorSettings, DocsSettings, GitSettings, Metadata, PatchDefinition,
    ReleaseConfig, RuleDefinition, ValidationError, ValidationIssue, VERSION_PLACEHOLDER,
};
pub use version::{is_unpublished, parse_release_version, VersionError};
