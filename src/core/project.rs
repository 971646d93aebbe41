// src/core/project.rs

use crate::{
    constants::{ENTRY_POINT_FILENAME, SETTINGS_ENV_VAR},
    core::{
        catalog::CommandCatalog,
        discovery::{DiscoveryError, HelpSource, ManagementProbe},
        metadata::{MetadataCache, ProjectMetadata},
        prompt::Prompter,
        session_runner::SessionRunner,
        spec_builder::CollectEnv,
    },
    models::ProjectContext,
};
use lazy_static::lazy_static;
use regex::Regex;
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use walkdir::WalkDir;

lazy_static! {
    /// `os.environ.setdefault("DJANGO_SETTINGS_MODULE", "mysite.settings")`
    static ref SETTINGS_DEFAULT_RE: Regex =
        Regex::new(r#"DJANGO_SETTINGS_MODULE["']\s*,\s*["']([^"']+)"#).expect("valid settings regex");
}

/// How deep below the given path an entry point or settings module is searched for.
const SEARCH_DEPTH: usize = 3;

#[derive(Error, Debug)]
pub enum ProjectError {
    #[error("Cannot access '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("No {entry} found in or around '{path}'.")]
    EntryPointNotFound { entry: &'static str, path: String },
    #[error("Could not determine the settings module for '{root}'. Pass --settings.")]
    SettingsNotFound { root: String },
}

// --- DISCOVERY ---

/// Locates the project containing `path` and builds its context.
///
/// The entry point is looked for at `path` and its ancestors first, then in the
/// directories below it.
pub fn discover_project(
    path: &Path,
    settings_override: Option<&str>,
) -> Result<ProjectContext, ProjectError> {
    let start = dunce::canonicalize(path).map_err(|source| ProjectError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let entry_point = find_entry_point(&start).ok_or_else(|| ProjectError::EntryPointNotFound {
        entry: ENTRY_POINT_FILENAME,
        path: start.display().to_string(),
    })?;
    let root = entry_point
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| start.clone());

    let settings = resolve_settings(
        &root,
        &entry_point,
        settings_override,
        env::var(SETTINGS_ENV_VAR).ok(),
    )
    .ok_or_else(|| ProjectError::SettingsNotFound {
        root: root.display().to_string(),
    })?;

    log::debug!(
        "Project at '{}' uses settings '{}'.",
        root.display(),
        settings
    );
    Ok(ProjectContext::new(root, settings, entry_point))
}

fn find_entry_point(start: &Path) -> Option<PathBuf> {
    if start.is_file() {
        return (start.file_name()? == ENTRY_POINT_FILENAME).then(|| start.to_path_buf());
    }
    if let Some(found) = start
        .ancestors()
        .map(|dir| dir.join(ENTRY_POINT_FILENAME))
        .find(|candidate| candidate.is_file())
    {
        return Some(found);
    }
    let mut matches: Vec<PathBuf> = WalkDir::new(start)
        .max_depth(SEARCH_DEPTH)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == ENTRY_POINT_FILENAME)
        .map(|entry| entry.into_path())
        .collect();
    // The shallowest one wins.
    matches.sort_by_key(|p| p.components().count());
    matches.into_iter().next()
}

/// Picks the settings module: explicit override, then the environment, then the
/// default the entry point sets, then a `settings.py` / `settings/` found on disk.
pub fn resolve_settings(
    root: &Path,
    entry_point: &Path,
    settings_override: Option<&str>,
    env_value: Option<String>,
) -> Option<String> {
    if let Some(explicit) = settings_override.filter(|s| !s.trim().is_empty()) {
        return Some(explicit.trim().to_string());
    }
    if let Some(from_env) = env_value.filter(|s| !s.trim().is_empty()) {
        return Some(from_env.trim().to_string());
    }
    if let Ok(source) = fs::read_to_string(entry_point)
        && let Some(caps) = SETTINGS_DEFAULT_RE.captures(&source)
        && let Some(module) = caps.get(1)
    {
        return Some(module.as_str().to_string());
    }
    find_settings_module(root)
}

fn find_settings_module(root: &Path) -> Option<String> {
    let mut candidates: Vec<PathBuf> = WalkDir::new(root)
        .min_depth(1)
        .max_depth(SEARCH_DEPTH)
        .into_iter()
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            !name.starts_with('.') && name != "node_modules" && name != "__pycache__"
        })
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let path = entry.path();
            if entry.file_type().is_file() && entry.file_name() == "settings.py" {
                Some(path.with_extension(""))
            } else if entry.file_type().is_dir()
                && entry.file_name() == "settings"
                && path.join("__init__.py").is_file()
            {
                Some(path.to_path_buf())
            } else {
                None
            }
        })
        .collect();
    candidates.sort_by_key(|p| p.components().count());
    let module_path = candidates.into_iter().next()?;
    let relative = module_path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("."))
}

// --- PROJECT ---

/// An open project: its context and the caches scoped to it.
pub struct Project {
    context: Arc<ProjectContext>,
    interpreter: PathBuf,
    catalog: CommandCatalog,
    help: Box<dyn HelpSource>,
    metadata: Box<dyn ProjectMetadata>,
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("context", &self.context)
            .field("interpreter", &self.interpreter)
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}

impl Project {
    /// Opens a project whose help and metadata come from running the interpreter.
    pub fn open(context: ProjectContext, interpreter: PathBuf) -> Self {
        let context = Arc::new(context);
        let probe = ManagementProbe::new(Arc::clone(&context), interpreter.clone());
        Self {
            context,
            interpreter,
            catalog: CommandCatalog::new(),
            help: Box::new(probe.clone()),
            metadata: Box::new(MetadataCache::new(probe)),
        }
    }

    /// Like [`Project::open`], with metadata from elsewhere.
    pub fn with_metadata(
        context: ProjectContext,
        interpreter: PathBuf,
        metadata: Box<dyn ProjectMetadata>,
    ) -> Self {
        Self {
            metadata,
            ..Self::open(context, interpreter)
        }
    }

    #[cfg(test)]
    pub fn with_sources(
        context: ProjectContext,
        interpreter: PathBuf,
        help: Box<dyn HelpSource>,
        metadata: Box<dyn ProjectMetadata>,
    ) -> Self {
        Self {
            context: Arc::new(context),
            interpreter,
            catalog: CommandCatalog::new(),
            help,
            metadata,
        }
    }

    /// Replaces the catalog, e.g. with one that is already populated.
    #[cfg(test)]
    pub fn seed_catalog(&mut self, catalog: CommandCatalog) {
        self.catalog = catalog;
    }

    pub fn context(&self) -> &Arc<ProjectContext> {
        &self.context
    }

    pub fn interpreter(&self) -> &Path {
        &self.interpreter
    }

    pub fn list_commands(&mut self, force: bool) -> Result<&[String], DiscoveryError> {
        self.catalog.list_commands(self.help.as_ref(), force)
    }

    pub fn list_command_args(&mut self, command: &str) -> Result<&[String], DiscoveryError> {
        self.catalog.list_command_args(self.help.as_ref(), command)
    }

    pub fn metadata_mut(&mut self) -> &mut dyn ProjectMetadata {
        self.metadata.as_mut()
    }

    /// Drops every cached command list and setting.
    pub fn invalidate(&mut self) {
        self.catalog.invalidate();
        self.metadata.invalidate();
    }

    /// What quick-command argument collection needs from this project.
    pub fn collect_env<'a>(&'a mut self, prompter: &'a mut dyn Prompter) -> CollectEnv<'a> {
        CollectEnv {
            prompter,
            metadata: self.metadata.as_mut(),
            context: &self.context,
        }
    }
}

// --- VIEW ---

/// The operator's view of one project: the project plus a cursor over its
/// sessions.
#[derive(Debug)]
pub struct ProjectView {
    pub project: Project,
    cursor: usize,
}

impl ProjectView {
    pub fn new(project: Project) -> Self {
        Self { project, cursor: 0 }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The session under the cursor.
    pub fn current(&self, runner: &SessionRunner) -> Option<String> {
        runner
            .registry()
            .cycle(self.project.context().key(), self.cursor, 0)
            .map(|(_, id)| id)
    }

    /// Moves the cursor and returns the session now under it.
    pub fn cycle(&mut self, runner: &SessionRunner, delta: i64) -> Option<String> {
        match runner
            .registry()
            .cycle(self.project.context().key(), self.cursor, delta)
        {
            Some((cursor, id)) => {
                self.cursor = cursor;
                Some(id)
            }
            None => {
                self.cursor = 0;
                None
            }
        }
    }

    /// Puts the cursor on `id`. Returns `false` if the project has no such session.
    pub fn focus(&mut self, runner: &SessionRunner, id: &str) -> bool {
        let ids = runner.registry().list(self.project.context().key());
        match ids.iter().position(|existing| existing == id) {
            Some(pos) => {
                self.cursor = pos;
                true
            }
            None => false,
        }
    }

    /// Kills a session and advances the cursor by one.
    pub fn kill(
        &mut self,
        runner: &mut SessionRunner,
        id: &str,
        confirm: bool,
        prompter: &mut dyn Prompter,
    ) -> anyhow::Result<bool> {
        let killed = runner.kill(id, confirm, prompter)?;
        if killed {
            self.cycle(runner, 1);
        }
        Ok(killed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::fake::FakeMetadata;
    use tempfile::TempDir;

    const MANAGE_PY: &str = r#"#!/usr/bin/env python
import os
import sys

if __name__ == "__main__":
    os.environ.setdefault('DJANGO_SETTINGS_MODULE', 'mysite.settings.dev')
    from django.core.management import execute_from_command_line
    execute_from_command_line(sys.argv)
"#;

    struct NoHelp;

    impl HelpSource for NoHelp {
        fn help(&self, _subcommand: Option<&str>) -> Result<String, DiscoveryError> {
            Err(DiscoveryError::Malformed {
                invocation: "help".into(),
                reason: "not available".into(),
                output: String::new(),
            })
        }
    }

    #[test]
    fn test_discover_project_from_subdirectory() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("mysite");
        fs::create_dir_all(root.join("blog/templates")).unwrap();
        fs::write(root.join(ENTRY_POINT_FILENAME), MANAGE_PY).unwrap();

        let ctx = discover_project(&root.join("blog/templates"), Some("mysite.settings.test")).unwrap();
        assert_eq!(ctx.root, dunce::canonicalize(&root).unwrap());
        assert_eq!(ctx.name, "mysite");
        assert_eq!(ctx.settings_module, "mysite.settings.test");
        assert!(ctx.entry_point.ends_with(ENTRY_POINT_FILENAME));
    }

    #[test]
    fn test_discover_project_below_given_path() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("src").join("shop");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join(ENTRY_POINT_FILENAME), MANAGE_PY).unwrap();

        let ctx = discover_project(dir.path(), Some("shop.settings")).unwrap();
        assert_eq!(ctx.name, "shop");
    }

    #[test]
    fn test_discover_project_without_entry_point() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            discover_project(dir.path(), Some("x.settings")),
            Err(ProjectError::EntryPointNotFound { .. })
        ));
    }

    #[test]
    fn test_resolve_settings_precedence() {
        let dir = TempDir::new().unwrap();
        let entry = dir.path().join(ENTRY_POINT_FILENAME);
        fs::write(&entry, MANAGE_PY).unwrap();

        assert_eq!(
            resolve_settings(dir.path(), &entry, Some("cli.settings"), Some("env.settings".into())),
            Some("cli.settings".to_string())
        );
        assert_eq!(
            resolve_settings(dir.path(), &entry, None, Some("env.settings".into())),
            Some("env.settings".to_string())
        );
        assert_eq!(
            resolve_settings(dir.path(), &entry, None, None),
            Some("mysite.settings.dev".to_string())
        );
    }

    #[test]
    fn test_resolve_settings_falls_back_to_files_on_disk() {
        let dir = TempDir::new().unwrap();
        let entry = dir.path().join(ENTRY_POINT_FILENAME);
        fs::write(&entry, "print('custom entry point')\n").unwrap();
        fs::create_dir_all(dir.path().join("conf/settings")).unwrap();
        fs::write(dir.path().join("conf/settings/__init__.py"), "").unwrap();
        assert_eq!(
            resolve_settings(dir.path(), &entry, None, None),
            Some("conf.settings".to_string())
        );

        let dir = TempDir::new().unwrap();
        let entry = dir.path().join(ENTRY_POINT_FILENAME);
        fs::write(&entry, "").unwrap();
        fs::create_dir_all(dir.path().join("site")).unwrap();
        fs::write(dir.path().join("site/settings.py"), "DEBUG = True\n").unwrap();
        assert_eq!(
            resolve_settings(dir.path(), &entry, None, None),
            Some("site.settings".to_string())
        );

        let dir = TempDir::new().unwrap();
        let entry = dir.path().join(ENTRY_POINT_FILENAME);
        fs::write(&entry, "").unwrap();
        assert_eq!(resolve_settings(dir.path(), &entry, None, None), None);
    }

    #[test]
    fn test_seeded_catalog_skips_help() {
        let ctx = ProjectContext::new("/nowhere", "x.settings", "/nowhere/manage.py");
        let mut project = Project::with_sources(
            ctx,
            PathBuf::from("python"),
            Box::new(NoHelp),
            Box::new(FakeMetadata::default()),
        );
        assert!(project.list_commands(false).is_err());

        project.seed_catalog(CommandCatalog::with_commands(vec!["check".to_string()]));
        assert_eq!(project.list_commands(false).unwrap(), ["check"]);
        assert!(project.list_commands(true).is_err());
        // The failed refresh keeps what was there.
        assert_eq!(project.list_commands(false).unwrap(), ["check"]);

        project.invalidate();
        assert!(project.list_commands(false).is_err());
    }

    #[cfg(unix)]
    mod view {
        use super::*;
        use crate::core::{
            prompt::scripted::ScriptedPrompter,
            session_runner::RunOptions,
            surface::recording::RecordingSurface,
        };
        use tokio::runtime::Handle;

        /// A project whose every command just sleeps, run through `sh`.
        fn sleeping_project(dir: &TempDir) -> Project {
            let root = dir.path().join("p");
            fs::create_dir_all(&root).unwrap();
            let entry = root.join("manage.sh");
            fs::write(&entry, "sleep 30\n").unwrap();
            let ctx = ProjectContext::new(&root, "p.settings", entry);
            let mut project = Project::with_sources(
                ctx,
                PathBuf::from("sh"),
                Box::new(NoHelp),
                Box::new(FakeMetadata::default()),
            );
            project.seed_catalog(CommandCatalog::with_commands(
                ["check", "migrate", "showmigrations"].map(String::from).to_vec(),
            ));
            project
        }

        fn start_all(view: &mut ProjectView, runner: &mut SessionRunner) -> Vec<String> {
            ["check", "migrate", "showmigrations"]
                .iter()
                .map(|command| {
                    runner
                        .run(&mut view.project, command, &[], RunOptions::default())
                        .unwrap()
                })
                .collect()
        }

        fn runner() -> SessionRunner {
            SessionRunner::new(Handle::current(), Arc::new(RecordingSurface::default()), 100)
        }

        #[tokio::test]
        async fn test_cycle_and_focus_move_the_cursor() {
            let dir = TempDir::new().unwrap();
            let mut view = ProjectView::new(sleeping_project(&dir));
            let mut runner = runner();
            assert_eq!(view.cycle(&runner, 1), None);
            assert_eq!(view.current(&runner), None);
            assert_eq!(view.cursor(), 0);

            let ids = start_all(&mut view, &mut runner);
            assert_eq!(view.current(&runner), Some(ids[0].clone()));
            assert_eq!(view.cycle(&runner, 1), Some(ids[1].clone()));
            assert_eq!(view.cycle(&runner, -2), Some(ids[2].clone()));
            assert_eq!(view.cursor(), 2);

            assert!(view.focus(&runner, &ids[0]));
            assert_eq!(view.cursor(), 0);
            assert!(!view.focus(&runner, "[p@settings] collectstatic"));
            assert_eq!(view.cursor(), 0);
        }

        #[tokio::test]
        async fn test_kill_advances_cursor_and_resets_when_empty() {
            let dir = TempDir::new().unwrap();
            let mut view = ProjectView::new(sleeping_project(&dir));
            let mut runner = runner();
            let ids = start_all(&mut view, &mut runner);

            let mut declined = ScriptedPrompter::new(&["n"]);
            assert!(view.focus(&runner, &ids[1]));
            assert!(!view.kill(&mut runner, &ids[1], true, &mut declined).unwrap());
            assert_eq!(view.cursor(), 1);

            // [a, b, c] at b: b goes, the cursor moves from 1 to (1 + 1) mod 2.
            let mut prompter = ScriptedPrompter::new(&[]);
            assert!(view.kill(&mut runner, &ids[1], false, &mut prompter).unwrap());
            assert_eq!(view.cursor(), 0);
            assert_eq!(view.current(&runner), Some(ids[0].clone()));

            assert!(view.kill(&mut runner, &ids[0], false, &mut prompter).unwrap());
            assert_eq!(view.current(&runner), Some(ids[2].clone()));

            assert!(view.kill(&mut runner, &ids[2], false, &mut prompter).unwrap());
            assert_eq!(view.cursor(), 0);
            assert_eq!(view.current(&runner), None);
        }
    }
}
