// src/system/executor.rs

use crate::models::ProjectContext;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command as StdCommand, Stdio};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Command could not be parsed: {0}")]
    CommandParse(String),
    #[error("No command specified to run.")]
    EmptyCommand,
    #[error("Command '{0}' could not be executed: {1}")]
    CommandFailed(String, std::io::Error),
}

/// A fully described external program call: what to run, where, and with which environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: HashMap<String, String>,
}

impl Invocation {
    pub fn new(
        program: impl Into<PathBuf>,
        args: Vec<String>,
        cwd: impl Into<PathBuf>,
        env: HashMap<String, String>,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            cwd: cwd.into(),
            env,
        }
    }

    /// Builds `<interpreter> <entry-point> <args...>` for a project, run from
    /// the project root.
    pub fn management<I>(
        context: &ProjectContext,
        interpreter: &Path,
        args: I,
        env: HashMap<String, String>,
    ) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut full_args = vec![context.entry_point.to_string_lossy().into_owned()];
        full_args.extend(args);
        Self::new(interpreter, full_args, &context.root, env)
    }

    /// A printable version of the invocation, used in diagnostics.
    pub fn display(&self) -> String {
        let mut out = self.program.display().to_string();
        for arg in &self.args {
            out.push(' ');
            out.push_str(&shlex::try_quote(arg).unwrap_or_else(|_| arg.as_str().into()));
        }
        out
    }

    fn std_command(&self) -> StdCommand {
        let mut command = StdCommand::new(&self.program);
        command
            .args(&self.args)
            .current_dir(dunce::simplified(&self.cwd))
            .envs(&self.env);
        command
    }

    /// The asynchronous counterpart used for tracked sessions.
    pub fn async_command(&self) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(&self.program);
        command
            .args(&self.args)
            .current_dir(dunce::simplified(&self.cwd))
            .envs(&self.env);
        command
    }
}

/// What a blocking, captured invocation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    /// Stdout followed by stderr, as an operator would have seen them.
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            return self.stdout.clone();
        }
        format!("{}{}", self.stdout, self.stderr)
    }

    pub fn status_text(&self) -> String {
        match self.code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Runs an invocation to completion and captures both output streams.
///
/// NOTE: This is blocking, with no timeout. It is meant for short help/info calls
/// made from the control thread.
pub fn execute_and_capture_output(invocation: &Invocation) -> Result<CapturedOutput, ExecutionError> {
    log::debug!("Capturing output of: {}", invocation.display());

    let output = invocation
        .std_command()
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| ExecutionError::CommandFailed(invocation.display(), e))?;

    Ok(CapturedOutput {
        success: output.status.success(),
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Executes a shell-like command line with inherited stdio and waits for it.
/// Returns the exit code (`None` when terminated by a signal).
pub fn execute_command(command_line: &str, cwd: &Path) -> Result<Option<i32>, ExecutionError> {
    let trimmed_command = command_line.trim();
    if trimmed_command.is_empty() {
        return Err(ExecutionError::EmptyCommand);
    }

    let parts = shlex::split(trimmed_command)
        .ok_or_else(|| ExecutionError::CommandParse(trimmed_command.to_string()))?;
    let Some((program, args)) = parts.split_first() else {
        return Err(ExecutionError::EmptyCommand);
    };
    let clean_cwd = dunce::simplified(cwd);

    let status = match StdCommand::new(program)
        .args(args)
        .current_dir(clean_cwd)
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
    {
        Ok(status) => status,
        // Windows built-ins (`findstr`, `dir`) only exist inside cmd.exe.
        Err(e) if e.kind() == ErrorKind::NotFound && cfg!(target_os = "windows") => {
            log::debug!("Command '{}' not found. Retrying with cmd /C.", program);
            StdCommand::new("cmd")
                .arg("/C")
                .arg(trimmed_command)
                .current_dir(clean_cwd)
                .status()
                .map_err(|e| ExecutionError::CommandFailed(trimmed_command.to_string(), e))?
        }
        Err(e) => return Err(ExecutionError::CommandFailed(trimmed_command.to_string(), e)),
    };

    Ok(status.code())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_management_invocation_prepends_entry_point() {
        let ctx = ProjectContext::new("/p", "p.settings", "/p/manage.py");
        let args = ["dumpdata", "--indent=4", "my app"].map(String::from);
        let inv = Invocation::management(&ctx, Path::new("python3"), args, HashMap::new());
        assert_eq!(inv.program, PathBuf::from("python3"));
        assert_eq!(inv.args, vec!["/p/manage.py", "dumpdata", "--indent=4", "my app"]);
        assert_eq!(inv.cwd, PathBuf::from("/p"));
        let shown = inv.display();
        assert!(shown.starts_with("python3 /p/manage.py dumpdata "));
        assert!(shown.ends_with("'my app'"));
    }

    #[test]
    fn test_execute_command_rejects_empty_and_unbalanced() {
        let cwd = std::env::temp_dir();
        assert!(matches!(execute_command("   ", &cwd), Err(ExecutionError::EmptyCommand)));
        assert!(matches!(
            execute_command("grep 'oops", &cwd),
            Err(ExecutionError::CommandParse(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_execute_and_capture_output_reports_status() {
        let inv = Invocation::new(
            "sh",
            vec!["-c".into(), "echo out; echo err >&2; exit 3".into()],
            std::env::temp_dir(),
            HashMap::new(),
        );
        let captured = execute_and_capture_output(&inv).unwrap();
        assert!(!captured.success);
        assert_eq!(captured.code, Some(3));
        assert_eq!(captured.stdout, "out\n");
        assert_eq!(captured.combined(), "out\nerr\n");
    }
}
