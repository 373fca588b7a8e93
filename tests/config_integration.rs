//! Integration tests for release config loading
//!
//! Tests defaults, full configs, and validation failures

use release_patcher::config::{
    load_for_project, load_from_path, load_from_str, ConfigError, ValidationIssue,
};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_empty_config_uses_release_defaults() {
    let config = load_from_str("").expect("empty config should load");

    assert_eq!(config.build.program, "mvn");
    assert!(config.build.java_home.is_none());
    assert_eq!(config.git.program, "git");
    assert!(config.git.push);
    assert_eq!(config.descriptors.file_name, "pom.xml");
    assert_eq!(config.descriptors.skip_dirs, ["target"]);
    assert_eq!(config.docs.files, ["readme.md"]);
    assert!(config.patches.is_empty());
}

#[test]
fn test_load_full_config() {
    let toml = r#"
[meta]
name = "coroutines"
description = "Release settings for the coroutines library"

[build]
program = "./mvnw"
java_home = "/usr/lib/jvm/java-11-openjdk"
verify_args = ["clean", "verify"]
deploy_args = ["clean", "deploy", "-P", "release"]

[build.env]
MAVEN_OPTS = "-Xmx1g"

[git]
tag_prefix = "release-"
commit_message = "Release {version}"
push = false

[descriptors]
unpublished_version = "0.0.0-SNAPSHOT"
skip_dirs = ["target", "node_modules"]

[docs]
files = ["readme.md", "docs/install.md"]

[[patches]]
id = "pom-snippet"
file = "pom.xml"

[[patches.rules]]
pattern = '<artifactId>coroutines</artifactId>([^<]*)<version>[^<]+</version>'
template = '<artifactId>coroutines</artifactId>${1}<version>{version}</version>'

[[patches.rules]]
pattern = '^Version: .*?$'
template = 'Version: {version}'
"#;

    let config = load_from_str(toml).expect("Failed to parse config");

    assert_eq!(config.meta.name, "coroutines");
    assert_eq!(config.build.program, "./mvnw");
    assert_eq!(
        config.build.java_home,
        Some(PathBuf::from("/usr/lib/jvm/java-11-openjdk"))
    );
    assert_eq!(config.build.verify_args, ["clean", "verify"]);
    assert_eq!(config.build.env.get("MAVEN_OPTS").map(String::as_str), Some("-Xmx1g"));
    assert_eq!(config.git.tag_for("1.2.0"), "release-1.2.0");
    assert_eq!(config.git.message_for("1.2.0"), "Release 1.2.0");
    assert!(!config.git.push);
    assert_eq!(config.git.program, "git");
    assert_eq!(config.descriptors.unpublished_version, "0.0.0-SNAPSHOT");
    assert_eq!(config.docs.files.len(), 2);

    assert_eq!(config.patches.len(), 1);
    let patch = &config.patches[0];
    assert_eq!(patch.id, "pom-snippet");
    assert_eq!(patch.rules.len(), 2);
    assert_eq!(
        patch.rules[0].template_for("1.2.0"),
        "<artifactId>coroutines</artifactId>${1}<version>1.2.0</version>"
    );
}

#[test]
fn test_invalid_pattern_rejected_at_load() {
    let toml = r#"
[[patches]]
id = "broken"
file = "readme.md"

[[patches.rules]]
pattern = '<version>([^<]+</version>'
template = '<version>{version}</version>'
"#;

    let err = load_from_str(toml).unwrap_err();
    match err {
        ConfigError::Validation { source, .. } => {
            assert_eq!(source.issues.len(), 1);
            assert!(matches!(
                &source.issues[0],
                ValidationIssue::InvalidPattern { patch_id, index: 0, .. } if patch_id == "broken"
            ));
        }
        other => panic!("expected validation error, got {other}"),
    }
}

#[test]
fn test_patch_without_file_rejected() {
    let toml = r#"
[[patches]]
id = "no-file"
file = ""

[[patches.rules]]
pattern = "a"
template = "b"
"#;

    let err = load_from_str(toml).unwrap_err();
    assert!(err.to_string().contains("missing required field 'file'"));
}

#[test]
fn test_unknown_patch_shape_is_toml_error() {
    let toml = r#"
[[patches]]
file = "readme.md"
"#;

    let err = load_from_str(toml).unwrap_err();
    assert!(matches!(err, ConfigError::Toml { .. }));
}

#[test]
fn test_load_from_missing_path() {
    let err = load_from_path("/nonexistent/release.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn test_load_for_project_reads_release_toml() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("release.toml"),
        "[git]\ntag_prefix = \"\"\n",
    )
    .unwrap();

    let config = load_for_project(dir.path()).unwrap();
    assert_eq!(config.git.tag_for("3.0.0"), "3.0.0");
    assert_eq!(config.build.program, "mvn");
}
