//! Release orchestration
//!
//! A release runs, in order, aborting on the first failure:
//! - verification build
//! - clean worktree check against `HEAD`
//! - descriptor versions, documentation snippets, configured patches
//! - commit, tag, push
//! - deploy build
//!
//! Every external tool goes through a [`CommandRunner`]. All file changes are
//! rendered in memory first (each file read once, rules from every phase
//! chained on the same buffer) and written only after every render
//! succeeded, one atomic replace per file.

pub mod runner;

pub use runner::{CommandRunner, CommandStatus, Invocation, SystemRunner};

use crate::config::schema::ReleaseConfig;
use crate::descriptor::{
    discover_descriptors, doc_rules, prepare_update, DescriptorError, DescriptorUpdate,
};
use crate::patch::{apply_rules, write_atomic, PatchError, PatchJob, Rendered, ReplacementRule};
use crate::safety::{ProjectGuard, SafetyError};
use semver::Version;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error("Failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` failed with {status}")]
    CommandFailed {
        command: String,
        status: CommandStatus,
    },

    #[error("Working directory must be clean: uncommitted changes against HEAD")]
    DirtyWorktree,

    #[error("Patch '{id}' failed: {source}")]
    ConfiguredPatch {
        id: String,
        #[source]
        source: PatchError,
    },

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error(transparent)]
    Safety(#[from] SafetyError),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReleaseOptions {
    /// Render every change and record every command without writing or running
    pub dry_run: bool,
}

/// A file's text before and after the release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub rendered: Rendered,
}

#[derive(Debug, Clone, Default)]
pub struct ReleaseReport {
    pub version: String,
    pub dry_run: bool,
    pub descriptors: Vec<DescriptorUpdate>,
    /// Every file a rule or descriptor update ran over, in first-touched order
    pub files: Vec<FileChange>,
    /// Commands in order; in a dry run the ones that were only planned
    pub commands: Vec<Invocation>,
}

impl ReleaseReport {
    fn new(version: &str, dry_run: bool) -> Self {
        Self {
            version: version.to_string(),
            dry_run,
            ..Self::default()
        }
    }

    pub fn published_artifacts(&self) -> Vec<&str> {
        self.descriptors
            .iter()
            .filter_map(DescriptorUpdate::published_artifact)
            .collect()
    }

    pub fn changed_files(&self) -> impl Iterator<Item = &FileChange> {
        self.files.iter().filter(|change| change.rendered.is_changed())
    }
}

/// Pending file contents. A file staged twice continues from its pending text.
#[derive(Debug, Default)]
struct Staging {
    changes: Vec<FileChange>,
}

impl Staging {
    fn stage_rules(
        &mut self,
        path: PathBuf,
        rules: &[ReplacementRule],
    ) -> Result<(), PatchError> {
        if let Some(change) = self.changes.iter_mut().find(|c| c.path == path) {
            let (transformed, count) = apply_rules(&change.rendered.transformed, rules);
            change.rendered.transformed = transformed;
            change.rendered.replacements += count;
            return Ok(());
        }

        let rendered = PatchJob::new(&path, rules.to_vec()).render()?;
        self.changes.push(FileChange { path, rendered });
        Ok(())
    }

    fn stage_rendered(&mut self, path: PathBuf, rendered: Rendered) {
        self.changes.push(FileChange { path, rendered });
    }

    fn commit(&self) -> Result<(), PatchError> {
        for change in self.changes.iter().filter(|c| c.rendered.is_changed()) {
            write_atomic(&change.path, &change.rendered.transformed)?;
            info!(
                file = %change.path.display(),
                replacements = change.rendered.replacements,
                "wrote file"
            );
        }
        Ok(())
    }
}

pub struct Release<'a, R> {
    config: &'a ReleaseConfig,
    guard: ProjectGuard,
    runner: R,
    options: ReleaseOptions,
}

impl<'a, R: CommandRunner> Release<'a, R> {
    pub fn new(
        config: &'a ReleaseConfig,
        project_root: impl AsRef<Path>,
        runner: R,
        options: ReleaseOptions,
    ) -> Result<Self, ReleaseError> {
        Ok(Self {
            config,
            guard: ProjectGuard::new(project_root)?,
            runner,
            options,
        })
    }

    pub fn project_root(&self) -> &Path {
        self.guard.project_root()
    }

    /// Move descriptors, docs and configured patches to `version`. No build, no git.
    pub fn bump(&mut self, version: &Version) -> Result<ReleaseReport, ReleaseError> {
        let version = version.to_string();
        let mut report = ReleaseReport::new(&version, self.options.dry_run);
        self.update_files(&version, &mut report)?;
        Ok(report)
    }

    /// Full release of `version`.
    pub fn run(&mut self, version: &Version) -> Result<ReleaseReport, ReleaseError> {
        let version = version.to_string();
        let mut report = ReleaseReport::new(&version, self.options.dry_run);
        info!(%version, dry_run = self.options.dry_run, "starting release");

        let verify = self.build_invocation(&self.config.build.verify_args);
        self.check_call(verify, &mut report)?;

        self.ensure_clean_worktree(&mut report)?;

        self.update_files(&version, &mut report)?;

        let git = &self.config.git;
        let commit = self.git_invocation([
            "commit",
            "-a",
            "-m",
            git.message_for(&version).as_str(),
        ]);
        let tag = self.git_invocation(["tag", git.tag_for(&version).as_str()]);
        self.check_call(commit, &mut report)?;
        self.check_call(tag, &mut report)?;

        if self.config.git.push {
            let push_tags = self.git_invocation(["push", "--tags"]);
            let push = self.git_invocation(["push"]);
            self.check_call(push_tags, &mut report)?;
            self.check_call(push, &mut report)?;
        }

        let deploy = self.build_invocation(&self.config.build.deploy_args);
        self.check_call(deploy, &mut report)?;

        info!(%version, "release finished");
        Ok(report)
    }

    fn update_files(
        &self,
        version: &str,
        report: &mut ReleaseReport,
    ) -> Result<(), ReleaseError> {
        let root = self.guard.project_root().to_path_buf();
        let mut staging = Staging::default();

        for path in discover_descriptors(&root, &self.config.descriptors)? {
            let path = self.guard.validate_path(&path)?;
            let (update, rendered) = prepare_update(&path, version, &self.config.descriptors)?;
            debug!(file = %path.display(), ?update, "descriptor");
            if let Some(rendered) = rendered {
                staging.stage_rendered(path, rendered);
            }
            report.descriptors.push(update);
        }

        let rules = doc_rules(report.published_artifacts(), version)?;
        if !rules.is_empty() {
            for doc in &self.config.docs.files {
                let candidate = root.join(doc);
                if !candidate.is_file() {
                    debug!(file = %candidate.display(), "docs file absent, skipping");
                    continue;
                }
                let path = self.guard.validate_path(&candidate)?;
                staging.stage_rules(path, &rules)?;
            }
        }

        for patch in &self.config.patches {
            let candidate = root.join(&patch.file);
            if !candidate.exists() {
                return Err(ReleaseError::ConfiguredPatch {
                    id: patch.id.clone(),
                    source: PatchError::NotFound(candidate),
                });
            }
            let path = self.guard.validate_path(&candidate)?;
            patch
                .rules
                .iter()
                .map(|rule| ReplacementRule::new(&rule.pattern, rule.template_for(version)))
                .collect::<Result<Vec<_>, _>>()
                .and_then(|rules| staging.stage_rules(path, &rules))
                .map_err(|source| ReleaseError::ConfiguredPatch {
                    id: patch.id.clone(),
                    source,
                })?;
        }

        if self.options.dry_run {
            debug!("dry run, leaving files untouched");
        } else {
            staging.commit()?;
        }

        report.files = staging.changes;
        Ok(())
    }

    fn build_invocation(&self, args: &[String]) -> Invocation {
        let build = &self.config.build;
        let mut invocation =
            Invocation::new(&build.program, self.guard.project_root()).args(args.iter().cloned());
        if let Some(java_home) = &build.java_home {
            invocation = invocation.env("JAVA_HOME", java_home.to_string_lossy());
        }
        for (key, value) in &build.env {
            invocation = invocation.env(key.clone(), value.clone());
        }
        invocation
    }

    fn git_invocation<'s>(&self, args: impl IntoIterator<Item = &'s str>) -> Invocation {
        Invocation::new(&self.config.git.program, self.guard.project_root()).args(args)
    }

    fn call(&mut self, invocation: &Invocation) -> Result<CommandStatus, ReleaseError> {
        debug!(command = %invocation, "running");
        self.runner
            .run(invocation)
            .map_err(|source| ReleaseError::Spawn {
                command: invocation.to_string(),
                source,
            })
    }

    fn check_call(
        &mut self,
        invocation: Invocation,
        report: &mut ReleaseReport,
    ) -> Result<(), ReleaseError> {
        if self.options.dry_run {
            info!(command = %invocation, "dry run, not running");
            report.commands.push(invocation);
            return Ok(());
        }

        let status = self.call(&invocation)?;
        report.commands.push(invocation.clone());
        if !status.success() {
            return Err(ReleaseError::CommandFailed {
                command: invocation.to_string(),
                status,
            });
        }
        Ok(())
    }

    /// `git diff --exit-code --quiet HEAD`; read-only, so it runs in dry runs too.
    fn ensure_clean_worktree(&mut self, report: &mut ReleaseReport) -> Result<(), ReleaseError> {
        let invocation = self.git_invocation(["diff", "--exit-code", "--quiet", "HEAD"]);
        let status = self.call(&invocation)?;
        report.commands.push(invocation.clone());

        match status.code {
            Some(0) => Ok(()),
            Some(1) => Err(ReleaseError::DirtyWorktree),
            _ => Err(ReleaseError::CommandFailed {
                command: invocation.to_string(),
                status,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{PatchDefinition, RuleDefinition};
    use std::fs;
    use std::io;

    #[derive(Default)]
    struct Recorder {
        seen: Vec<Invocation>,
        fail_program_arg: Option<(String, String, i32)>,
    }

    impl CommandRunner for Recorder {
        fn run(&mut self, invocation: &Invocation) -> io::Result<CommandStatus> {
            self.seen.push(invocation.clone());
            if let Some((program, arg, code)) = &self.fail_program_arg {
                if &invocation.program == program && invocation.args.first() == Some(arg) {
                    return Ok(CommandStatus { code: Some(*code) });
                }
            }
            Ok(CommandStatus::SUCCESS)
        }
    }

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("pom.xml"),
            "<project><artifactId>lib</artifactId><version>1.0.0</version></project>\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("readme.md"),
            "<artifactId>lib</artifactId>\n<version>1.0.0</version>\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_staging_chains_on_pending_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "A").unwrap();

        let mut staging = Staging::default();
        staging
            .stage_rules(path.clone(), &[ReplacementRule::new("A", "B").unwrap()])
            .unwrap();
        staging
            .stage_rules(path.clone(), &[ReplacementRule::new("B", "C").unwrap()])
            .unwrap();

        assert_eq!(staging.changes.len(), 1);
        assert_eq!(staging.changes[0].rendered.transformed, "C");
        assert_eq!(fs::read_to_string(&path).unwrap(), "A");

        staging.commit().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "C");
    }

    #[test]
    fn test_dirty_worktree_aborts_before_any_write() {
        let dir = project();
        let config = ReleaseConfig::default();
        let mut recorder = Recorder {
            fail_program_arg: Some(("git".to_string(), "diff".to_string(), 1)),
            ..Recorder::default()
        };

        let mut release =
            Release::new(&config, dir.path(), &mut recorder, ReleaseOptions::default()).unwrap();
        let err = release.run(&Version::new(2, 0, 0)).unwrap_err();

        assert!(matches!(err, ReleaseError::DirtyWorktree));
        assert!(fs::read_to_string(dir.path().join("pom.xml"))
            .unwrap()
            .contains("1.0.0"));
        assert_eq!(recorder.seen.len(), 2);
    }

    #[test]
    fn test_failed_verify_build_stops_release() {
        let dir = project();
        let config = ReleaseConfig::default();
        let mut recorder = Recorder {
            fail_program_arg: Some(("mvn".to_string(), "clean".to_string(), 1)),
            ..Recorder::default()
        };

        let mut release =
            Release::new(&config, dir.path(), &mut recorder, ReleaseOptions::default()).unwrap();
        let err = release.run(&Version::new(2, 0, 0)).unwrap_err();

        assert!(matches!(err, ReleaseError::CommandFailed { .. }));
        assert_eq!(recorder.seen.len(), 1);
    }

    #[test]
    fn test_git_failure_other_than_diff_is_command_failure() {
        let dir = project();
        let config = ReleaseConfig::default();
        let mut recorder = Recorder {
            fail_program_arg: Some(("git".to_string(), "diff".to_string(), 128)),
            ..Recorder::default()
        };

        let mut release =
            Release::new(&config, dir.path(), &mut recorder, ReleaseOptions::default()).unwrap();
        let err = release.run(&Version::new(2, 0, 0)).unwrap_err();

        assert!(matches!(err, ReleaseError::CommandFailed { .. }));
    }

    #[test]
    fn test_java_home_exported_to_builds() {
        let dir = project();
        let mut config = ReleaseConfig::default();
        config.build.java_home = Some(PathBuf::from("/usr/lib/jvm/java-11-openjdk"));
        config.git.push = false;
        let mut recorder = Recorder::default();

        let mut release =
            Release::new(&config, dir.path(), &mut recorder, ReleaseOptions::default()).unwrap();
        release.run(&Version::new(2, 0, 0)).unwrap();

        let builds: Vec<_> = recorder.seen.iter().filter(|i| i.program == "mvn").collect();
        assert_eq!(builds.len(), 2);
        for build in builds {
            assert_eq!(
                build.envs.get("JAVA_HOME").map(String::as_str),
                Some("/usr/lib/jvm/java-11-openjdk")
            );
        }
        assert!(!recorder.seen.iter().any(|i| i.args.first().map(String::as_str) == Some("push")));
    }

    #[test]
    fn test_missing_configured_patch_file() {
        let dir = project();
        let mut config = ReleaseConfig::default();
        config.patches.push(PatchDefinition {
            id: "changelog".to_string(),
            file: "CHANGELOG.md".to_string(),
            rules: vec![RuleDefinition {
                pattern: "Unreleased".to_string(),
                template: "{version}".to_string(),
            }],
        });

        let mut release =
            Release::new(&config, dir.path(), Recorder::default(), ReleaseOptions::default())
                .unwrap();
        let err = release.bump(&Version::new(2, 0, 0)).unwrap_err();

        assert!(matches!(
            err,
            ReleaseError::ConfiguredPatch { ref id, source: PatchError::NotFound(_) } if id == "changelog"
        ));
        assert!(fs::read_to_string(dir.path().join("pom.xml"))
            .unwrap()
            .contains("1.0.0"));
    }

    #[test]
    fn test_dry_run_plans_without_running_or_writing() {
        let dir = project();
        let config = ReleaseConfig::default();
        let mut recorder = Recorder::default();

        let mut release = Release::new(
            &config,
            dir.path(),
            &mut recorder,
            ReleaseOptions { dry_run: true },
        )
        .unwrap();
        let report = release.run(&Version::new(2, 0, 0)).unwrap();

        // only the read-only clean check runs
        assert_eq!(recorder.seen.len(), 1);
        assert_eq!(recorder.seen[0].args[0], "diff");
        assert_eq!(report.commands.len(), 7);
        assert_eq!(report.changed_files().count(), 2);
        assert!(fs::read_to_string(dir.path().join("pom.xml"))
            .unwrap()
            .contains("<version>1.0.0</version>"));
    }
}
