// src/core/specialization.rs

//! How a session is attached to the operator, per management command.
//!
//! Most commands are plain subprocesses. A few open an interactive prompt of
//! their own; those get stdin wired up and, for database shells, the SQL dialect
//! of the configured engine.

use crate::{
    constants::COLORS_ENV_VAR,
    core::{
        discovery::DiscoveryError,
        metadata::{self, ProjectMetadata},
    },
};
use std::{collections::HashMap, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    Mysql,
    Oracle,
    Postgres,
    Sqlite,
    Unknown,
}

impl SqlDialect {
    /// Infers the dialect from an engine identifier such as
    /// `django.db.backends.postgresql`.
    pub fn from_engine(engine: &str) -> Self {
        let engine = engine.to_ascii_lowercase();
        if engine.contains("mysql") {
            Self::Mysql
        } else if engine.contains("oracle") {
            Self::Oracle
        } else if engine.contains("postgres") || engine.contains("postgis") {
            Self::Postgres
        } else if engine.contains("sqlite") {
            Self::Sqlite
        } else {
            Self::Unknown
        }
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Mysql => "mysql",
            Self::Oracle => "oracle",
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
            Self::Unknown => "sql",
        };
        f.write_str(name)
    }
}

/// Specialization template, before per-run details are known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Specialization {
    Plain,
    Interpreter { highlighting: bool },
    Database,
}

/// The resolved attachment of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Plain,
    Interpreter { highlighting: bool },
    Database { dialect: SqlDialect },
}

impl SessionKind {
    /// Whether the session reads operator input.
    pub fn interactive(&self) -> bool {
        !matches!(self, Self::Plain)
    }

    /// Adds the environment this kind needs to the invocation's environment.
    pub fn apply_env(&self, env: &mut HashMap<String, String>) {
        if let Self::Interpreter {
            highlighting: false,
        } = self
        {
            env.insert(COLORS_ENV_VAR.to_string(), "nocolor".to_string());
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Plain => "process".to_string(),
            Self::Interpreter { .. } => "shell".to_string(),
            Self::Database { dialect } => format!("{} shell", dialect),
        }
    }
}

/// Command name → specialization. Unknown commands are [`Specialization::Plain`].
#[derive(Debug, Clone, Default)]
pub struct SpecializationTable {
    entries: HashMap<String, Specialization>,
}

impl SpecializationTable {
    pub fn builtin() -> Self {
        let mut table = Self::default();
        table.register("shell", Specialization::Interpreter { highlighting: true });
        table.register("runserver", Specialization::Interpreter { highlighting: false });
        table.register("dbshell", Specialization::Database);
        table
    }

    pub fn register(&mut self, command: &str, specialization: Specialization) {
        self.entries.insert(command.to_string(), specialization);
    }

    pub fn lookup(&self, command: &str) -> Specialization {
        self.entries
            .get(command)
            .copied()
            .unwrap_or(Specialization::Plain)
    }

    /// Resolves the kind for one run. Database shells read the engine of the
    /// alias selected by `--database` (or `default`).
    pub fn resolve(
        &self,
        command: &str,
        args: &[String],
        metadata: &mut dyn ProjectMetadata,
    ) -> Result<SessionKind, DiscoveryError> {
        Ok(match self.lookup(command) {
            Specialization::Plain => SessionKind::Plain,
            Specialization::Interpreter { highlighting } => SessionKind::Interpreter { highlighting },
            Specialization::Database => {
                let alias = database_alias(args);
                let databases = metadata.get_setting("DATABASES", false)?;
                let dialect = metadata::database_engine(&databases, &alias)
                    .map(|engine| SqlDialect::from_engine(&engine))
                    .unwrap_or(SqlDialect::Unknown);
                SessionKind::Database { dialect }
            }
        })
    }
}

fn database_alias(args: &[String]) -> String {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if let Some(value) = arg.strip_prefix("--database=") {
            return value.to_string();
        }
        if arg == "--database"
            && let Some(value) = iter.next()
        {
            return value.clone();
        }
    }
    "default".to_string()
}
