// src/core/spec_builder.rs

//! Declarative quick-command definitions and their compiled form.
//!
//! A [`CommandSpec`] names a management command, a fixed switch string and an
//! ordered list of [`ArgDescriptor`]s. [`compile`] validates it once, up front,
//! and yields a [`CompiledCommand`] that can:
//!
//! 1. collect argument values interactively, in descriptor order, evaluating
//!    each default against the values bound before it;
//! 2. render the command line for a set of collected values.

use crate::{
    constants::RESERVED_BINDINGS,
    core::{
        discovery::DiscoveryError,
        metadata::{self, ProjectMetadata},
        prompt::Prompter,
    },
    models::{ArgumentRecord, CallbackPayload, ProjectContext},
};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

lazy_static! {
    static ref IDENTIFIER_RE: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex");
    static ref REFERENCE_RE: Regex =
        Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid reference regex");
}

// --- DEFINITIONS ---

/// Where a descriptor's value comes from when the operator has to be asked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PromptSource {
    /// A free-text prompt.
    Text(String),
    /// A custom reader.
    Read(ReadExpr),
}

/// Custom readers for values that come from a known set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "read", rename_all = "snake_case")]
pub enum ReadExpr {
    /// One of the labels in `INSTALLED_APPS`.
    App { prompt: String },
    /// One of the aliases in `DATABASES`.
    Database { prompt: String },
    /// One of a literal list.
    Choice { prompt: String, options: Vec<String> },
    /// A confirmation; `yes`/`no` are the values bound for each answer.
    YesNo {
        prompt: String,
        yes: String,
        #[serde(default)]
        no: String,
    },
}

/// How a descriptor's default is computed at collection time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultExpr {
    #[default]
    None,
    Literal(String),
    /// `{ident}` placeholders are replaced by earlier bindings or by the
    /// reserved names `command`, `root`, `name` and `settings`.
    Template(String),
    /// The value of a project setting.
    Setting(String),
}

/// One argument of a quick command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgDescriptor {
    pub name: String,
    /// Defaults to a text prompt showing `name`.
    #[serde(default)]
    pub prompt: Option<PromptSource>,
    #[serde(default)]
    pub default: DefaultExpr,
    /// `""` for a positional value, `"--x="` to join, anything else is
    /// followed by a space.
    #[serde(default)]
    pub switch: String,
    /// Ask even when the default is not empty.
    #[serde(default)]
    pub force_prompt: bool,
}

impl ArgDescriptor {
    pub fn text(name: &str, prompt: &str) -> Self {
        Self {
            name: name.to_string(),
            prompt: Some(PromptSource::Text(prompt.to_string())),
            default: DefaultExpr::None,
            switch: String::new(),
            force_prompt: false,
        }
    }

    pub fn read(name: &str, read: ReadExpr) -> Self {
        Self {
            prompt: Some(PromptSource::Read(read)),
            ..Self::text(name, "")
        }
    }

    pub fn switch(mut self, switch: &str) -> Self {
        self.switch = switch.to_string();
        self
    }

    pub fn default_to(mut self, default: DefaultExpr) -> Self {
        self.default = default;
        self
    }

    pub fn literal(self, value: &str) -> Self {
        self.default_to(DefaultExpr::Literal(value.to_string()))
    }

    pub fn force_prompt(mut self) -> Self {
        self.force_prompt = true;
        self
    }
}

/// A quick command: a management command plus how to collect its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Set from the table key when loaded from configuration.
    #[serde(default)]
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub switches: String,
    #[serde(default)]
    pub args: Vec<ArgDescriptor>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub capture_output: bool,
    #[serde(default)]
    pub suppress_display: bool,
    #[serde(default)]
    pub description: Option<String>,
}

impl CommandSpec {
    pub fn new(name: &str, command: &str) -> Self {
        Self {
            name: name.to_string(),
            command: command.to_string(),
            switches: String::new(),
            args: Vec::new(),
            metadata: BTreeMap::new(),
            capture_output: false,
            suppress_display: false,
            description: None,
        }
    }

    pub fn switches(mut self, switches: &str) -> Self {
        self.switches = switches.to_string();
        self
    }

    pub fn arg(mut self, descriptor: ArgDescriptor) -> Self {
        self.args.push(descriptor);
        self
    }

    #[cfg(test)]
    pub fn meta(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn capture_output(mut self) -> Self {
        self.capture_output = true;
        self
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}

// --- ERRORS ---

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecError {
    #[error("Quick command '{spec}' has no command.")]
    EmptyCommand { spec: String },
    #[error("Quick command '{spec}' declares argument '{name}' more than once.")]
    DuplicateIdentifier { spec: String, name: String },
    #[error("Quick command '{spec}' uses the reserved name '{name}' for an argument.")]
    ReservedIdentifier { spec: String, name: String },
    #[error("Quick command '{spec}': '{name}' is not a valid argument name.")]
    InvalidIdentifier { spec: String, name: String },
    #[error("Quick command '{spec}': argument '{name}' has a blank switch '{switch}'.")]
    MalformedSwitch {
        spec: String,
        name: String,
        switch: String,
    },
    #[error(
        "Quick command '{spec}': the default of '{name}' references '{reference}', which is not bound before it."
    )]
    UnboundReference {
        spec: String,
        name: String,
        reference: String,
    },
    #[error("Quick command '{name}' is defined twice.")]
    DuplicateCommand { name: String },
}

#[derive(Error, Debug)]
pub enum CollectError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Prompt(#[from] anyhow::Error),
}

// --- COMPILATION ---

/// How a descriptor's switch combines with its value on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchTemplate {
    /// The bare value.
    Positional,
    /// `--name=` immediately followed by the value.
    Joined(String),
    /// `--name` and the value, separated by a space.
    Spaced(String),
}

impl SwitchTemplate {
    fn classify(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            return Some(Self::Positional);
        }
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.ends_with('=') {
            Some(Self::Joined(trimmed.to_string()))
        } else {
            Some(Self::Spaced(trimmed.to_string()))
        }
    }

    fn render(&self, value: &str) -> String {
        let quoted = shell_quote(value);
        match self {
            Self::Positional => quoted,
            Self::Joined(switch) => format!("{}{}", switch, quoted),
            Self::Spaced(switch) => format!("{} {}", switch, quoted),
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledArg {
    descriptor: ArgDescriptor,
    switch: SwitchTemplate,
}

/// A validated [`CommandSpec`].
#[derive(Debug, Clone)]
pub struct CompiledCommand {
    spec: CommandSpec,
    args: Vec<CompiledArg>,
}

/// Everything argument collection reads from.
pub struct CollectEnv<'a> {
    pub prompter: &'a mut dyn Prompter,
    pub metadata: &'a mut dyn ProjectMetadata,
    pub context: &'a ProjectContext,
}

/// Validates a spec. Every problem a definition can have is reported here,
/// before anything is collected or run.
pub fn compile(spec: CommandSpec) -> Result<CompiledCommand, SpecError> {
    let spec_name = spec.name.clone();
    if spec.command.trim().is_empty() {
        return Err(SpecError::EmptyCommand { spec: spec_name });
    }

    let mut bound: HashSet<&str> = HashSet::new();
    let mut args = Vec::with_capacity(spec.args.len());

    for descriptor in &spec.args {
        let name = descriptor.name.as_str();
        if RESERVED_BINDINGS.contains(&name) {
            return Err(SpecError::ReservedIdentifier {
                spec: spec_name,
                name: name.to_string(),
            });
        }
        if !IDENTIFIER_RE.is_match(name) {
            return Err(SpecError::InvalidIdentifier {
                spec: spec_name,
                name: name.to_string(),
            });
        }
        if bound.contains(name) {
            return Err(SpecError::DuplicateIdentifier {
                spec: spec_name,
                name: name.to_string(),
            });
        }
        let Some(switch) = SwitchTemplate::classify(&descriptor.switch) else {
            return Err(SpecError::MalformedSwitch {
                spec: spec_name,
                name: name.to_string(),
                switch: descriptor.switch.clone(),
            });
        };
        if let DefaultExpr::Template(template) = &descriptor.default {
            for reference in references(template) {
                if !bound.contains(reference) && !RESERVED_BINDINGS.contains(&reference) {
                    return Err(SpecError::UnboundReference {
                        spec: spec_name,
                        name: name.to_string(),
                        reference: reference.to_string(),
                    });
                }
            }
        }
        bound.insert(name);
        args.push(CompiledArg {
            descriptor: descriptor.clone(),
            switch,
        });
    }

    log::trace!("Compiled quick command '{}' ({} arguments).", spec.name, args.len());
    Ok(CompiledCommand { spec, args })
}

fn references(template: &str) -> impl Iterator<Item = &str> {
    REFERENCE_RE
        .captures_iter(template)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
}

impl CompiledCommand {
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn command(&self) -> &str {
        &self.spec.command
    }

    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    pub fn capture_output(&self) -> bool {
        self.spec.capture_output
    }

    pub fn suppress_display(&self) -> bool {
        self.spec.suppress_display
    }

    pub fn description(&self) -> Option<&str> {
        self.spec.description.as_deref()
    }

    /// Binds every descriptor in order.
    ///
    /// A descriptor is prompted for when its default is empty, when it forces a
    /// prompt, or when `always_prompt` is set; otherwise the default is bound.
    pub fn collect(
        &self,
        env: &mut CollectEnv<'_>,
        always_prompt: bool,
    ) -> Result<ArgumentRecord, CollectError> {
        let mut record = ArgumentRecord::new();
        for arg in &self.args {
            let descriptor = &arg.descriptor;
            let default = self.evaluate_default(&descriptor.default, &record, env)?;
            let value = if default.is_empty() || descriptor.force_prompt || always_prompt {
                ask(descriptor, &default, env)?
            } else {
                default
            };
            log::debug!("Bound '{}' = '{}'", descriptor.name, value);
            record.push(descriptor.name.clone(), value);
        }
        Ok(record)
    }

    /// Renders the arguments part of the command line: the fixed switches, then
    /// one piece per descriptor with a non-empty value.
    pub fn command_line(&self, record: &ArgumentRecord) -> String {
        let mut pieces: Vec<String> = Vec::with_capacity(self.args.len() + 1);
        let fixed = self.spec.switches.trim();
        if !fixed.is_empty() {
            pieces.push(fixed.to_string());
        }
        for arg in &self.args {
            match record.get(&arg.descriptor.name) {
                Some(value) if !value.is_empty() => pieces.push(arg.switch.render(value)),
                _ => {}
            }
        }
        pieces.join(" ")
    }

    /// The callback payload for a collected record.
    pub fn payload(&self, record: ArgumentRecord) -> CallbackPayload {
        CallbackPayload {
            arguments: record,
            metadata: self
                .spec
                .metadata
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect(),
        }
    }

    fn evaluate_default(
        &self,
        expr: &DefaultExpr,
        bound: &ArgumentRecord,
        env: &mut CollectEnv<'_>,
    ) -> Result<String, CollectError> {
        Ok(match expr {
            DefaultExpr::None => String::new(),
            DefaultExpr::Literal(value) => value.clone(),
            DefaultExpr::Template(template) => {
                let context = env.context;
                REFERENCE_RE
                    .replace_all(template, |caps: &Captures<'_>| {
                        let key = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                        match key {
                            "command" => self.spec.command.clone(),
                            "root" => context.root.display().to_string(),
                            "name" => context.name.clone(),
                            "settings" => context.settings_module.clone(),
                            other => bound.get(other).unwrap_or_default().to_string(),
                        }
                    })
                    .into_owned()
            }
            DefaultExpr::Setting(name) => {
                metadata::setting_to_string(&env.metadata.get_setting(name, false)?)
            }
        })
    }
}

fn ask(
    descriptor: &ArgDescriptor,
    default: &str,
    env: &mut CollectEnv<'_>,
) -> Result<String, CollectError> {
    let default_opt = Some(default).filter(|d| !d.is_empty());
    let value = match &descriptor.prompt {
        None => env.prompter.input(&descriptor.name, default_opt)?,
        Some(PromptSource::Text(prompt)) if prompt.is_empty() => {
            env.prompter.input(&descriptor.name, default_opt)?
        }
        Some(PromptSource::Text(prompt)) => env.prompter.input(prompt, default_opt)?,
        Some(PromptSource::Read(ReadExpr::App { prompt })) => {
            let apps = env.metadata.get_setting("INSTALLED_APPS", false)?;
            let labels = metadata::installed_app_labels(&apps);
            env.prompter.select(prompt, &labels, default_opt)?
        }
        Some(PromptSource::Read(ReadExpr::Database { prompt })) => {
            let databases = env.metadata.get_setting("DATABASES", false)?;
            let aliases = metadata::database_aliases(&databases);
            env.prompter.select(prompt, &aliases, default_opt)?
        }
        Some(PromptSource::Read(ReadExpr::Choice { prompt, options })) => {
            env.prompter.select(prompt, options, default_opt)?
        }
        Some(PromptSource::Read(ReadExpr::YesNo { prompt, yes, no })) => {
            if env.prompter.confirm(prompt, default == yes.as_str())? {
                yes.clone()
            } else {
                no.clone()
            }
        }
    };
    Ok(value)
}

/// Quotes a value for the command line only when the shell would split or
/// reinterpret it.
fn shell_quote(value: &str) -> String {
    shlex::try_quote(value)
        .map(|quoted| quoted.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{metadata::fake::FakeMetadata, prompt::scripted::ScriptedPrompter};
    use serde_json::json;

    fn dumpdata_app() -> CommandSpec {
        CommandSpec::new("dumpdata-app", "dumpdata")
            .arg(ArgDescriptor::text("database", "Database").switch("--database=").literal("default"))
            .arg(ArgDescriptor::text("indent", "Indent").switch("--indent=").literal("4"))
            .arg(ArgDescriptor::text("format", "Format").switch("--format=").literal("json"))
            .arg(ArgDescriptor::read(
                "app",
                ReadExpr::App {
                    prompt: "Application".into(),
                },
            ))
    }

    fn collect_with(
        compiled: &CompiledCommand,
        answers: &[&str],
        metadata: &mut FakeMetadata,
        always_prompt: bool,
    ) -> (Result<ArgumentRecord, CollectError>, Vec<String>) {
        let ctx = ProjectContext::new("/p", "django.settings", "/p/manage.py");
        let mut prompter = ScriptedPrompter::new(answers);
        let result = {
            let mut env = CollectEnv {
                prompter: &mut prompter,
                metadata,
                context: &ctx,
            };
            compiled.collect(&mut env, always_prompt)
        };
        (result, prompter.asked)
    }

    fn apps_metadata() -> FakeMetadata {
        FakeMetadata::default().with_setting("INSTALLED_APPS", json!(["django.contrib.auth", "blog"]))
    }

    #[test]
    fn test_switches_join_and_positional_value() {
        let compiled = compile(dumpdata_app()).unwrap();
        let (record, asked) = collect_with(&compiled, &["blog"], &mut apps_metadata(), false);
        let record = record.unwrap();

        assert_eq!(asked, vec!["Application"]);
        assert_eq!(
            compiled.command_line(&record),
            "--database=default --indent=4 --format=json blog"
        );
        let keys: Vec<_> = record.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["database", "indent", "format", "app"]);
    }

    #[test]
    fn test_spaced_switch_fixed_switches_and_empty_values() {
        let spec = CommandSpec::new("serve", "runserver")
            .switches("--noreload ")
            .arg(ArgDescriptor::text("settings_file", "Settings").switch("--settings"))
            .arg(ArgDescriptor::text("port", "Port"));
        let compiled = compile(spec).unwrap();
        let record: ArgumentRecord = [("settings_file", "site.dev"), ("port", "")]
            .into_iter()
            .collect();
        assert_eq!(compiled.command_line(&record), "--noreload --settings site.dev");
    }

    #[test]
    fn test_values_needing_quotes_are_quoted() {
        let spec = CommandSpec::new("greet", "greet").arg(ArgDescriptor::text("who", "Who"));
        let compiled = compile(spec).unwrap();
        let record: ArgumentRecord = [("who", "my app")].into_iter().collect();
        let line = compiled.command_line(&record);
        assert_eq!(shlex::split(&line).unwrap(), vec!["my app"]);
    }

    #[test]
    fn test_reserved_duplicate_and_invalid_identifiers() {
        let reserved = CommandSpec::new("x", "check").arg(ArgDescriptor::text("root", "Root"));
        assert!(matches!(compile(reserved), Err(SpecError::ReservedIdentifier { .. })));

        let dup = CommandSpec::new("x", "check")
            .arg(ArgDescriptor::text("app", "App"))
            .arg(ArgDescriptor::text("app", "App again"));
        assert!(matches!(compile(dup), Err(SpecError::DuplicateIdentifier { .. })));

        let invalid = CommandSpec::new("x", "check").arg(ArgDescriptor::text("my-app", "App"));
        assert!(matches!(compile(invalid), Err(SpecError::InvalidIdentifier { .. })));
    }

    #[test]
    fn test_switch_classification() {
        assert_eq!(SwitchTemplate::classify(""), Some(SwitchTemplate::Positional));
        assert_eq!(
            SwitchTemplate::classify("--format="),
            Some(SwitchTemplate::Joined("--format=".into()))
        );
        assert_eq!(
            SwitchTemplate::classify("--format"),
            Some(SwitchTemplate::Spaced("--format".into()))
        );
        assert_eq!(SwitchTemplate::classify("   "), None);

        let blank = CommandSpec::new("x", "check").arg(ArgDescriptor::text("a", "A").switch("  "));
        assert!(matches!(compile(blank), Err(SpecError::MalformedSwitch { .. })));
    }

    #[test]
    fn test_empty_command_and_unbound_reference() {
        assert!(matches!(
            compile(CommandSpec::new("x", "  ")),
            Err(SpecError::EmptyCommand { .. })
        ));

        let forward = CommandSpec::new("x", "dumpdata")
            .arg(
                ArgDescriptor::text("output", "Output")
                    .default_to(DefaultExpr::Template("{app}.json".into())),
            )
            .arg(ArgDescriptor::text("app", "App"));
        assert!(matches!(
            compile(forward),
            Err(SpecError::UnboundReference { reference, .. }) if reference == "app"
        ));
    }

    #[test]
    fn test_template_default_reads_earlier_bindings_and_context() {
        let spec = CommandSpec::new("x", "dumpdata")
            .arg(ArgDescriptor::text("app", "App").literal("blog"))
            .arg(
                ArgDescriptor::text("output", "Output")
                    .default_to(DefaultExpr::Template("{root}/{app}-{name}.json".into())),
            );
        let compiled = compile(spec).unwrap();
        let (record, asked) = collect_with(&compiled, &[], &mut FakeMetadata::default(), false);
        assert!(asked.is_empty());
        assert_eq!(record.unwrap().get("output"), Some("/p/blog-p.json"));
    }

    #[test]
    fn test_setting_default_and_discovery_failure() {
        let spec = CommandSpec::new("x", "loaddata").arg(
            ArgDescriptor::text("dir", "Directory")
                .default_to(DefaultExpr::Setting("FIXTURE_DIR".into())),
        );
        let compiled = compile(spec).unwrap();

        let mut metadata = FakeMetadata::default().with_setting("FIXTURE_DIR", json!("fixtures"));
        let (record, _) = collect_with(&compiled, &[], &mut metadata, false);
        assert_eq!(record.unwrap().get("dir"), Some("fixtures"));

        let (record, _) = collect_with(&compiled, &[], &mut FakeMetadata::default(), false);
        assert!(matches!(record, Err(CollectError::Discovery(_))));
    }

    #[test]
    fn test_force_prompt_and_always_prompt() {
        let spec = CommandSpec::new("x", "migrate")
            .arg(ArgDescriptor::text("database", "Database").literal("default").force_prompt())
            .arg(ArgDescriptor::text("plan", "Plan").literal("--plan"));
        let compiled = compile(spec).unwrap();

        let (record, asked) = collect_with(&compiled, &["other"], &mut FakeMetadata::default(), false);
        assert_eq!(asked, vec!["Database"]);
        assert_eq!(record.unwrap().get("database"), Some("other"));

        // Empty answers keep the computed defaults.
        let (record, asked) = collect_with(&compiled, &["", ""], &mut FakeMetadata::default(), true);
        assert_eq!(asked, vec!["Database", "Plan"]);
        let record = record.unwrap();
        assert_eq!(record.get("database"), Some("default"));
        assert_eq!(record.get("plan"), Some("--plan"));
    }

    #[test]
    fn test_yes_no_maps_to_switch_value() {
        let spec = CommandSpec::new("x", "flush").arg(ArgDescriptor::read(
            "interactive",
            ReadExpr::YesNo {
                prompt: "Skip confirmation?".into(),
                yes: "--noinput".into(),
                no: String::new(),
            },
        ));
        let compiled = compile(spec).unwrap();

        let (record, _) = collect_with(&compiled, &["y"], &mut FakeMetadata::default(), false);
        let record = record.unwrap();
        assert_eq!(compiled.command_line(&record), "--noinput");

        let (record, _) = collect_with(&compiled, &["n"], &mut FakeMetadata::default(), false);
        assert_eq!(compiled.command_line(&record.unwrap()), "");
    }

    #[test]
    fn test_spec_deserializes_from_toml() {
        let text = r#"
            command = "dumpdata"
            switches = "--natural-foreign"
            capture_output = true
            metadata = { dump_dir = "fixtures" }

            [[args]]
            name = "format"
            prompt = { read = "choice", prompt = "Format", options = ["json", "xml"] }
            default = { literal = "json" }
            switch = "--format="

            [[args]]
            name = "app"
            prompt = "Application"
        "#;
        let spec: CommandSpec = toml::from_str(text).unwrap();
        assert!(spec.capture_output);
        assert_eq!(spec.args.len(), 2);
        assert_eq!(spec.args[1].prompt, Some(PromptSource::Text("Application".into())));
        assert_eq!(spec.args[0].default, DefaultExpr::Literal("json".into()));
        assert!(compile(spec).is_ok());
    }

    #[test]
    fn test_payload_carries_metadata() {
        let spec = dumpdata_app().meta("dump_dir", "fixtures");
        let compiled = compile(spec).unwrap();
        let payload = compiled.payload([("app", "blog")].into_iter().collect());
        assert_eq!(payload.metadata.get("dump_dir"), Some("fixtures"));
        assert_eq!(payload.arguments.get("app"), Some("blog"));
    }
}
