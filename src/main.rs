use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use release_patcher::config::{
    is_unpublished, load_for_project, load_from_path, parse_release_version, CONFIG_FILE_NAME,
};
use release_patcher::descriptor::{discover_descriptors, read_descriptor};
use release_patcher::{
    DescriptorUpdate, PatchJob, Release, ReleaseConfig, ReleaseOptions, ReleaseReport,
    ReplacementRule, SystemRunner,
};
use similar::{ChangeTag, TextDiff};
use std::env;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "release-patcher")]
#[command(about = "Release automation for Maven projects", long_about = None)]
#[command(version)]
struct Cli {
    /// Log every step (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply ordered regex rules to one file, atomically
    Patch {
        /// File to patch
        file: PathBuf,

        /// Rule as PATTERN TEMPLATE; repeat to chain rules in order
        #[arg(
            short,
            long = "rule",
            num_args = 2,
            value_names = ["PATTERN", "TEMPLATE"],
            allow_hyphen_values = true
        )]
        rules: Vec<String>,

        /// Dry run - show what would be changed without modifying the file
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Set a new version in descriptors, docs and configured files (no build, no git)
    Bump {
        /// Version to set (N.N.N)
        version: String,

        #[command(flatten)]
        project: ProjectArgs,

        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Build, bump, commit, tag, push and deploy a release
    Release {
        /// Version to release (N.N.N)
        version: String,

        #[command(flatten)]
        project: ProjectArgs,

        /// Dry run - show the plan without running commands or modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,
    },

    /// List project descriptors and their publish status
    List {
        #[command(flatten)]
        project: ProjectArgs,
    },
}

#[derive(clap::Args)]
struct ProjectArgs {
    /// Path to project root (auto-detected if not specified)
    #[arg(short, long)]
    project: Option<PathBuf>,

    /// Release config (defaults to <project>/release.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Patch {
            file,
            rules,
            dry_run,
            diff,
        } => cmd_patch(file, rules, dry_run, diff),

        Commands::Bump {
            version,
            project,
            dry_run,
            diff,
        } => cmd_bump(&version, project, dry_run, diff),

        Commands::Release {
            version,
            project,
            dry_run,
        } => cmd_release(&version, project, dry_run),

        Commands::List { project } => cmd_list(project),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Resolve project path using multiple detection strategies
///
/// Priority order:
/// 1. Explicit --project flag
/// 2. RELEASE_PATCHER_PROJECT environment variable
/// 3. Nearest ancestor holding release.toml
/// 4. Nearest ancestor holding pom.xml
fn resolve_project(cli_project: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = cli_project {
        return path
            .canonicalize()
            .with_context(|| format!("project path {} does not exist", path.display()));
    }

    if let Ok(env_path) = env::var("RELEASE_PATCHER_PROJECT") {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Ok(path.canonicalize()?);
        }
        eprintln!(
            "{}",
            format!(
                "Warning: RELEASE_PATCHER_PROJECT is set but path doesn't exist: {}",
                env_path
            )
            .yellow()
        );
    }

    let current = env::current_dir()?;
    for marker in [CONFIG_FILE_NAME, "pom.xml"] {
        if let Some(found) = current.ancestors().find(|dir| dir.join(marker).is_file()) {
            if found != current {
                println!(
                    "{}",
                    format!("Auto-detected project: {}", found.display()).dimmed()
                );
            }
            return Ok(found.to_path_buf());
        }
    }

    anyhow::bail!(
        "{}\n{}\n  {}\n  {}\n  {}",
        "Could not find a Maven project.".red(),
        "Try one of:".bold(),
        "1. cd into your project: cd /path/to/project && release-patcher ...",
        "2. Specify explicitly: release-patcher ... --project /path/to/project",
        "3. Set environment variable: export RELEASE_PATCHER_PROJECT=/path/to/project"
    )
}

fn load_config(project: &Path, config: Option<PathBuf>) -> Result<ReleaseConfig> {
    let config = match config {
        Some(path) => load_from_path(&path)?,
        None => load_for_project(project)?,
    };
    Ok(config)
}

/// Project root plus the `[meta]` name and description when configured
fn print_project_header(root: &Path, config: &ReleaseConfig) {
    let meta = &config.meta;
    if meta.name.is_empty() {
        println!("Project: {}", root.display());
    } else {
        println!("Project: {} ({})", meta.name.bold(), root.display());
    }
    if let Some(description) = &meta.description {
        println!("{}", description.dimmed());
    }
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

fn cmd_patch(file: PathBuf, rules: Vec<String>, dry_run: bool, show_diff: bool) -> Result<()> {
    // clap guarantees pairs
    let rules = rules
        .chunks(2)
        .map(|pair| ReplacementRule::new(&pair[0], pair[1].as_str()))
        .collect::<Result<Vec<_>, _>>()?;

    let job = PatchJob::new(&file, rules);
    let rendered = job.render()?;

    if !rendered.is_changed() {
        println!("{} {}: unchanged", "⊙".yellow(), file.display());
        return Ok(());
    }

    if dry_run {
        println!("{}", "[DRY RUN - showing what would be applied]".cyan());
        println!(
            "{} {}: would replace {} match(es)",
            "✓".green(),
            file.display(),
            rendered.replacements
        );
    } else {
        let outcome = job.apply()?;
        println!(
            "{} {}: patched ({} match(es))",
            "✓".green(),
            outcome.file().display(),
            rendered.replacements
        );
    }

    if show_diff {
        display_diff(&file, &rendered.original, &rendered.transformed);
    }

    Ok(())
}

fn print_report(report: &ReleaseReport, show_diff: bool) {
    if report.dry_run {
        println!("{}", "[DRY RUN - nothing was written or run]".cyan());
    }

    for update in &report.descriptors {
        match update {
            DescriptorUpdate::Updated {
                path,
                artifact_id,
                from,
                to,
            } => println!(
                "{} {}: {} -> {} ({})",
                "✓".green(),
                artifact_id,
                from,
                to,
                path.display()
            ),
            DescriptorUpdate::Unpublished { path, artifact_id } => println!(
                "{} {}: Skipped (unpublished) ({})",
                "⊘".cyan(),
                artifact_id,
                path.display()
            ),
            DescriptorUpdate::Inherited { path, artifact_id } => println!(
                "{} {}: Skipped (inherits version) ({})",
                "⊘".cyan(),
                artifact_id,
                path.display()
            ),
        }
    }

    for change in &report.files {
        if change.rendered.is_changed() {
            println!("{} {}: updated", "✓".green(), change.path.display());
            if show_diff {
                display_diff(
                    &change.path,
                    &change.rendered.original,
                    &change.rendered.transformed,
                );
            }
        } else {
            println!("{} {}: unchanged", "⊙".yellow(), change.path.display());
        }
    }

    if !report.commands.is_empty() {
        println!();
        let heading = if report.dry_run { "Planned:" } else { "Ran:" };
        println!("{}", heading.bold());
        for command in &report.commands {
            println!("  {}", command);
        }
    }

    let published = report.published_artifacts();
    println!();
    println!("{}", "Summary:".bold());
    println!("  version {}", report.version.green());
    println!("  {} artifact(s) published", format!("{}", published.len()).green());
    println!(
        "  {} file(s) changed",
        format!("{}", report.changed_files().count()).green()
    );
}

fn cmd_bump(version: &str, project: ProjectArgs, dry_run: bool, show_diff: bool) -> Result<()> {
    let version = parse_release_version(version)?;
    let root = resolve_project(project.project)?;
    let config = load_config(&root, project.config)?;

    print_project_header(&root, &config);
    println!("Version: {}", version);
    println!();

    let mut release = Release::new(&config, &root, SystemRunner, ReleaseOptions { dry_run })?;
    let report = release.bump(&version)?;
    print_report(&report, show_diff);

    Ok(())
}

fn cmd_release(version: &str, project: ProjectArgs, dry_run: bool) -> Result<()> {
    let version = parse_release_version(version)?;
    let root = resolve_project(project.project)?;
    let config = load_config(&root, project.config)?;

    print_project_header(&root, &config);
    println!("Version: {}", version);
    println!();

    let mut release = Release::new(&config, &root, SystemRunner, ReleaseOptions { dry_run })?;
    let report = release
        .run(&version)
        .with_context(|| format!("Release {version} aborted"))?;
    print_report(&report, false);

    Ok(())
}

fn cmd_list(project: ProjectArgs) -> Result<()> {
    let root = resolve_project(project.project)?;
    let config = load_config(&root, project.config)?;
    let sentinel = &config.descriptors.unpublished_version;

    println!("{}", "Project Descriptors".bold());
    print_project_header(&root, &config);
    println!();

    let paths = discover_descriptors(&root, &config.descriptors)?;
    if paths.is_empty() {
        println!("{}", format!("No {} found", config.descriptors.file_name).yellow());
        return Ok(());
    }

    for path in paths {
        let relative = path.strip_prefix(&root).unwrap_or(path.as_path());
        match read_descriptor(&path) {
            Ok(descriptor) => match descriptor.version.as_deref() {
                Some(version) if is_unpublished(version, sentinel) => println!(
                    "{} {} {} ({})",
                    "⊘".cyan(),
                    descriptor.artifact_id,
                    "unpublished".dimmed(),
                    relative.display()
                ),
                Some(version) => println!(
                    "{} {} {} ({})",
                    "✓".green(),
                    descriptor.artifact_id,
                    version,
                    relative.display()
                ),
                None => println!(
                    "{} {} {} ({})",
                    "⊘".cyan(),
                    descriptor.artifact_id,
                    "inherits version".dimmed(),
                    relative.display()
                ),
            },
            Err(e) => eprintln!("{} {}: {}", "✗".red(), relative.display(), e),
        }
    }

    Ok(())
}
