use crate::cache::get_or_compile_regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Placeholder replaced by the release version in templates and commit messages.
pub const VERSION_PLACEHOLDER: &str = "{version}";

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ReleaseConfig {
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default)]
    pub build: BuildSettings,
    #[serde(default)]
    pub git: GitSettings,
    #[serde(default)]
    pub descriptors: DescriptorSettings,
    #[serde(default)]
    pub docs: DocsSettings,
    #[serde(default)]
    pub patches: Vec<PatchDefinition>,
}

impl ReleaseConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.build.program.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                patch_id: None,
                field: "build.program",
            });
        }
        if self.git.program.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                patch_id: None,
                field: "git.program",
            });
        }
        if self.descriptors.file_name.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                patch_id: None,
                field: "descriptors.file_name",
            });
        }
        if self.git.commit_message.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                patch_id: None,
                field: "git.commit_message",
            });
        }

        for patch in &self.patches {
            if patch.id.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    patch_id: None,
                    field: "id",
                });
            }
            if patch.file.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    patch_id: Some(patch.id.clone()),
                    field: "file",
                });
            }
            if patch.rules.is_empty() {
                issues.push(ValidationIssue::EmptyRuleList {
                    patch_id: patch.id.clone(),
                });
            }

            for (index, rule) in patch.rules.iter().enumerate() {
                if rule.pattern.is_empty() {
                    issues.push(ValidationIssue::MissingField {
                        patch_id: Some(patch.id.clone()),
                        field: "rules.pattern",
                    });
                    continue;
                }
                if let Err(e) = get_or_compile_regex(&rule.pattern) {
                    issues.push(ValidationIssue::InvalidPattern {
                        patch_id: patch.id.clone(),
                        index,
                        message: e.to_string(),
                    });
                }
            }
        }

        let mut seen = std::collections::HashSet::new();
        for patch in &self.patches {
            if !patch.id.trim().is_empty() && !seen.insert(patch.id.as_str()) {
                issues.push(ValidationIssue::DuplicateId {
                    patch_id: patch.id.clone(),
                });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Build tool invocation for the verification and deploy builds.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BuildSettings {
    pub program: String,
    /// Exported as `JAVA_HOME` for both builds when set
    pub java_home: Option<PathBuf>,
    pub verify_args: Vec<String>,
    pub deploy_args: Vec<String>,
    /// Extra environment for both builds
    pub env: BTreeMap<String, String>,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            program: "mvn".to_string(),
            java_home: None,
            verify_args: ["clean", "verify", "-P", "prerelease"]
                .map(String::from)
                .to_vec(),
            deploy_args: ["clean", "deploy", "-P", "prerelease,release"]
                .map(String::from)
                .to_vec(),
            env: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GitSettings {
    pub program: String,
    pub tag_prefix: String,
    pub commit_message: String,
    pub push: bool,
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            program: "git".to_string(),
            tag_prefix: "v".to_string(),
            commit_message: format!("Update version: {VERSION_PLACEHOLDER}"),
            push: true,
        }
    }
}

impl GitSettings {
    pub fn tag_for(&self, version: &str) -> String {
        format!("{}{}", self.tag_prefix, version)
    }

    pub fn message_for(&self, version: &str) -> String {
        self.commit_message.replace(VERSION_PLACEHOLDER, version)
    }
}

/// Where project descriptors live and which ones are published.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DescriptorSettings {
    pub file_name: String,
    /// Descriptors whose version reads exactly this are never published
    pub unpublished_version: String,
    /// Directory names never descended into (hidden directories are always skipped)
    pub skip_dirs: Vec<String>,
}

impl Default for DescriptorSettings {
    fn default() -> Self {
        Self {
            file_name: "pom.xml".to_string(),
            unpublished_version: "0.0.0".to_string(),
            skip_dirs: vec!["target".to_string()],
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DocsSettings {
    /// Project-relative files whose artifact snippets get the new version
    pub files: Vec<String>,
}

impl Default for DocsSettings {
    fn default() -> Self {
        Self {
            files: vec!["readme.md".to_string()],
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PatchDefinition {
    pub id: String,
    pub file: String,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RuleDefinition {
    pub pattern: String,
    #[serde(default)]
    pub template: String,
}

impl RuleDefinition {
    pub fn template_for(&self, version: &str) -> String {
        self.template.replace(VERSION_PLACEHOLDER, version)
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    MissingField {
        patch_id: Option<String>,
        field: &'static str,
    },
    EmptyRuleList {
        patch_id: String,
    },
    InvalidPattern {
        patch_id: String,
        index: usize,
        message: String,
    },
    DuplicateId {
        patch_id: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingField { patch_id, field } => match patch_id {
                Some(id) => write!(f, "patch '{id}' missing required field '{field}'"),
                None => write!(f, "missing required field '{field}'"),
            },
            ValidationIssue::EmptyRuleList { patch_id } => {
                write!(f, "patch '{patch_id}' has no rules")
            }
            ValidationIssue::InvalidPattern {
                patch_id,
                index,
                message,
            } => write!(f, "patch '{patch_id}' rule {index} has invalid pattern: {message}"),
            ValidationIssue::DuplicateId { patch_id } => {
                write!(f, "patch id '{patch_id}' is declared more than once")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_release_conventions() {
        let config = ReleaseConfig::default();
        assert_eq!(config.build.program, "mvn");
        assert_eq!(config.build.verify_args, ["clean", "verify", "-P", "prerelease"]);
        assert_eq!(
            config.build.deploy_args,
            ["clean", "deploy", "-P", "prerelease,release"]
        );
        assert_eq!(config.git.tag_for("1.2.3"), "v1.2.3");
        assert_eq!(config.git.message_for("1.2.3"), "Update version: 1.2.3");
        assert_eq!(config.descriptors.unpublished_version, "0.0.0");
        assert_eq!(config.docs.files, ["readme.md"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_template_placeholder() {
        let rule = RuleDefinition {
            pattern: "x".to_string(),
            template: "<version>{version}</version>".to_string(),
        };
        assert_eq!(rule.template_for("2.0.0"), "<version>2.0.0</version>");
    }

    #[test]
    fn test_validation_collects_all_issues() {
        let mut config = ReleaseConfig::default();
        config.build.program = String::new();
        config.patches = vec![
            PatchDefinition {
                id: "a".to_string(),
                file: String::new(),
                rules: Vec::new(),
            },
            PatchDefinition {
                id: "a".to_string(),
                file: "readme.md".to_string(),
                rules: vec![RuleDefinition {
                    pattern: "(".to_string(),
                    template: String::new(),
                }],
            },
        ];

        let err = config.validate().unwrap_err();
        assert_eq!(err.issues.len(), 5);
        assert!(err
            .issues
            .iter()
            .any(|i| matches!(i, ValidationIssue::InvalidPattern { index: 0, .. })));
        assert!(err
            .issues
            .iter()
            .any(|i| matches!(i, ValidationIssue::DuplicateId { .. })));
    }
}
