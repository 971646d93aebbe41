// src/core/discovery.rs

//! Blocking calls made to learn about a project: `help` output for the command
//! catalog and short interpreter probes for settings.
//!
//! These run to completion on the control thread. A hung invocation hangs the
//! caller; there is no timeout.

use crate::{
    dev_utils::BlockTimer,
    models::ProjectContext,
    system::{
        environment::{self, EnvironmentError},
        executor::{self, CapturedOutput, ExecutionError, Invocation},
    },
};
use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;

/// The environment an external help/info call ran with, attached to every
/// discovery failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostics {
    pub interpreter: PathBuf,
    pub settings_module: String,
    pub project_root: PathBuf,
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  interpreter:     {}", self.interpreter.display())?;
        writeln!(f, "  settings module: {}", self.settings_module)?;
        write!(f, "  project root:    {}", self.project_root.display())
    }
}

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("'{invocation}' failed ({status}).\n--- output ---\n{output}\n--- environment ---\n{diagnostics}")]
    Failed {
        invocation: String,
        status: String,
        output: String,
        diagnostics: Diagnostics,
    },
    #[error("'{invocation}' could not be run: {source}\n--- environment ---\n{diagnostics}")]
    Execution {
        invocation: String,
        #[source]
        source: ExecutionError,
        diagnostics: Diagnostics,
    },
    #[error("Could not prepare the environment for '{invocation}': {source}")]
    Environment {
        invocation: String,
        #[source]
        source: EnvironmentError,
    },
    #[error("Unexpected output from '{invocation}': {reason}\n--- output ---\n{output}")]
    Malformed {
        invocation: String,
        reason: String,
        output: String,
    },
}

/// Anything that can produce management help text.
///
/// `subcommand = None` asks for the top-level listing.
pub trait HelpSource {
    fn help(&self, subcommand: Option<&str>) -> Result<String, DiscoveryError>;
}

/// Runs the project's entry point (and bare interpreter scripts) with the
/// project environment.
#[derive(Debug, Clone)]
pub struct ManagementProbe {
    context: Arc<ProjectContext>,
    interpreter: PathBuf,
}

impl ManagementProbe {
    pub fn new(context: Arc<ProjectContext>, interpreter: PathBuf) -> Self {
        Self {
            context,
            interpreter,
        }
    }

    pub fn context(&self) -> &ProjectContext {
        &self.context
    }

    pub fn interpreter(&self) -> &Path {
        &self.interpreter
    }

    fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            interpreter: self.interpreter.clone(),
            settings_module: self.context.settings_module.clone(),
            project_root: self.context.root.clone(),
        }
    }

    /// Runs `<interpreter> <entry-point> <args...>` and returns stdout.
    pub fn run_management(&self, args: &[&str]) -> Result<String, DiscoveryError> {
        let args = args.iter().map(|a| (*a).to_string());
        let env = self.env()?;
        self.execute(Invocation::management(&self.context, &self.interpreter, args, env))
    }

    /// Runs `<interpreter> <args...>` (e.g. `-c <script>`) and returns stdout.
    pub fn run_interpreter(&self, args: &[&str]) -> Result<String, DiscoveryError> {
        let args = args.iter().map(|a| (*a).to_string()).collect();
        let env = self.env()?;
        self.execute(Invocation::new(&self.interpreter, args, &self.context.root, env))
    }

    fn env(&self) -> Result<HashMap<String, String>, DiscoveryError> {
        environment::management_env_from_process(&self.context).map_err(|source| {
            DiscoveryError::Environment {
                invocation: self.interpreter.display().to_string(),
                source,
            }
        })
    }

    fn execute(&self, invocation: Invocation) -> Result<String, DiscoveryError> {
        let shown = invocation.display();
        let _timer = BlockTimer::new(format!("discovery: {}", shown));

        let captured = executor::execute_and_capture_output(&invocation).map_err(|source| {
            DiscoveryError::Execution {
                invocation: shown.clone(),
                source,
                diagnostics: self.diagnostics(),
            }
        })?;
        self.check(shown, captured)
    }

    fn check(&self, invocation: String, captured: CapturedOutput) -> Result<String, DiscoveryError> {
        if captured.success {
            return Ok(captured.stdout);
        }
        log::debug!("Discovery call failed: {} ({})", invocation, captured.status_text());
        Err(DiscoveryError::Failed {
            status: captured.status_text(),
            output: captured.combined(),
            diagnostics: self.diagnostics(),
            invocation,
        })
    }
}

impl HelpSource for ManagementProbe {
    fn help(&self, subcommand: Option<&str>) -> Result<String, DiscoveryError> {
        match subcommand {
            Some(command) => self.run_management(&["help", command]),
            None => self.run_management(&["help"]),
        }
    }
}
