// src/core/quick_commands.rs

use crate::core::spec_builder::{
    self, ArgDescriptor, CommandSpec, CompiledCommand, ReadExpr, SpecError,
};
use std::collections::BTreeMap;

/// Every quick command known to the console, compiled and keyed by name.
#[derive(Debug, Clone, Default)]
pub struct QuickCommandTable {
    commands: BTreeMap<String, CompiledCommand>,
}

impl QuickCommandTable {
    /// The built-in table. Fails only if a built-in definition is broken.
    pub fn builtin() -> Result<Self, SpecError> {
        let mut table = Self::default();
        for spec in builtin_specs() {
            table.insert(spec)?;
        }
        Ok(table)
    }

    /// Adds a definition; a name may only be defined once.
    pub fn insert(&mut self, spec: CommandSpec) -> Result<(), SpecError> {
        if self.commands.contains_key(&spec.name) {
            return Err(SpecError::DuplicateCommand { name: spec.name });
        }
        self.override_with(spec)
    }

    /// Adds or replaces a definition. Used for user-defined commands, which
    /// take precedence over the built-ins.
    pub fn override_with(&mut self, spec: CommandSpec) -> Result<(), SpecError> {
        let compiled = spec_builder::compile(spec)?;
        if self.commands.contains_key(compiled.name()) {
            log::debug!("Quick command '{}' overridden.", compiled.name());
        }
        self.commands.insert(compiled.name().to_string(), compiled);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&CompiledCommand> {
        self.commands.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledCommand> {
        self.commands.values()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

fn database() -> ArgDescriptor {
    ArgDescriptor::read(
        "database",
        ReadExpr::Database {
            prompt: "Database".into(),
        },
    )
    .switch("--database=")
    .literal("default")
}

fn app() -> ArgDescriptor {
    ArgDescriptor::read(
        "app",
        ReadExpr::App {
            prompt: "Application".into(),
        },
    )
}

fn no_input(prompt: &str) -> ArgDescriptor {
    ArgDescriptor::read(
        "no_input",
        ReadExpr::YesNo {
            prompt: prompt.into(),
            yes: "--noinput".into(),
            no: String::new(),
        },
    )
    .force_prompt()
}

fn dumpdata(name: &str) -> CommandSpec {
    CommandSpec::new(name, "dumpdata")
        .arg(database())
        .arg(ArgDescriptor::text("indent", "Indent").switch("--indent=").literal("4"))
        .arg(
            ArgDescriptor::read(
                "format",
                ReadExpr::Choice {
                    prompt: "Format".into(),
                    options: vec!["json".into(), "xml".into(), "yaml".into(), "jsonl".into()],
                },
            )
            .switch("--format=")
            .literal("json"),
        )
        .capture_output()
}

fn builtin_specs() -> Vec<CommandSpec> {
    vec![
        CommandSpec::new("check", "check").describe("Inspect the project for common problems"),
        CommandSpec::new("collectstatic", "collectstatic")
            .arg(no_input("Overwrite without asking?"))
            .describe("Collect static files into STATIC_ROOT"),
        CommandSpec::new("dbshell", "dbshell")
            .arg(database())
            .describe("Open a database shell"),
        dumpdata("dumpdata-all").describe("Dump every application to a fixture"),
        dumpdata("dumpdata-app")
            .arg(app())
            .describe("Dump one application to a fixture"),
        CommandSpec::new("flush", "flush")
            .arg(database())
            .arg(no_input("Flush without asking?"))
            .describe("Remove all data from the database"),
        CommandSpec::new("loaddata", "loaddata")
            .arg(database())
            .arg(ArgDescriptor::text("fixture", "Fixture"))
            .describe("Load a fixture into the database"),
        CommandSpec::new("makemigrations", "makemigrations")
            .arg(app())
            .describe("Create migrations for an application"),
        CommandSpec::new("migrate", "migrate")
            .arg(database())
            .describe("Apply pending migrations"),
        CommandSpec::new("runserver", "runserver")
            .arg(ArgDescriptor::text("addrport", "Address:port").literal("127.0.0.1:8000"))
            .describe("Start the development server"),
        CommandSpec::new("shell", "shell").describe("Open an interactive shell"),
        CommandSpec::new("showmigrations", "showmigrations")
            .arg(database())
            .describe("List migrations and whether they are applied"),
        CommandSpec::new("sqlmigrate", "sqlmigrate")
            .arg(database())
            .arg(app())
            .arg(ArgDescriptor::text("migration", "Migration name"))
            .describe("Print the SQL of one migration"),
        CommandSpec::new("startapp", "startapp")
            .arg(ArgDescriptor::text("app_name", "Application name"))
            .describe("Create a new application"),
        CommandSpec::new("test-all", "test")
            .switches("--noinput")
            .describe("Run the whole test suite"),
        CommandSpec::new("test-app", "test")
            .switches("--noinput")
            .arg(app())
            .describe("Run the tests of one application"),
    ]
}
