//! Process-execution boundary for external tools (build tool, git).

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

/// One external command: program, arguments, extra environment, working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Added on top of the inherited environment
    pub envs: BTreeMap<String, String>,
    pub cwd: PathBuf,
}

impl Invocation {
    pub fn new(program: impl Into<String>, cwd: impl AsRef<Path>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: BTreeMap::new(),
            cwd: cwd.as_ref().to_path_buf(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.envs {
            write!(f, "{key}={value} ")?;
        }
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " {arg:?}")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Exit status of a finished command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandStatus {
    /// `None` when the process was terminated by a signal
    pub code: Option<i32>,
}

impl CommandStatus {
    pub const SUCCESS: CommandStatus = CommandStatus { code: Some(0) };

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {code}"),
            None => write!(f, "signal"),
        }
    }
}

/// Runs external commands to completion.
pub trait CommandRunner {
    /// Run `invocation` and wait for it. `Err` only when it could not be spawned.
    fn run(&mut self, invocation: &Invocation) -> io::Result<CommandStatus>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &mut R {
    fn run(&mut self, invocation: &Invocation) -> io::Result<CommandStatus> {
        (**self).run(invocation)
    }
}

/// Runs commands as child processes with inherited stdio.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&mut self, invocation: &Invocation) -> io::Result<CommandStatus> {
        let status = Command::new(&invocation.program)
            .args(&invocation.args)
            .envs(&invocation.envs)
            .current_dir(&invocation.cwd)
            .status()?;
        Ok(CommandStatus {
            code: status.code(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_quotes_awkward_args() {
        let invocation = Invocation::new("git", "/tmp")
            .args(["commit", "-a", "-m", "Update version: 1.0.0"])
            .env("JAVA_HOME", "/opt/jdk");
        assert_eq!(
            invocation.to_string(),
            "JAVA_HOME=/opt/jdk git commit -a -m \"Update version: 1.0.0\""
        );
    }

    #[test]
    fn test_status_success() {
        assert!(CommandStatus::SUCCESS.success());
        assert!(!CommandStatus { code: Some(1) }.success());
        assert!(!CommandStatus { code: None }.success());
    }

    #[test]
    #[cfg(unix)]
    fn test_system_runner_reports_exit_code() {
        let mut runner = SystemRunner;
        let ok = runner.run(&Invocation::new("true", ".")).unwrap();
        let failed = runner.run(&Invocation::new("false", ".")).unwrap();
        assert!(ok.success());
        assert_eq!(failed.code, Some(1));
    }

    #[test]
    fn test_system_runner_spawn_failure() {
        let mut runner = SystemRunner;
        let result = runner.run(&Invocation::new("definitely-not-a-real-program-xyz", "."));
        assert!(result.is_err());
    }
}
