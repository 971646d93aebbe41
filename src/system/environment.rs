// src/system/environment.rs

use crate::{
    constants::{IMPORT_PATH_ENV_VAR, SETTINGS_ENV_VAR},
    core::paths::{self, PathError},
    models::ProjectContext,
};
use std::{
    collections::HashMap,
    env,
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnvironmentError {
    #[error("Could not compose {var}: {source}")]
    JoinPaths {
        var: &'static str,
        #[source]
        source: env::JoinPathsError,
    },
    #[error(transparent)]
    Path(#[from] PathError),
}

/// Composes the import path for the external program: the project root, its
/// parent, then whatever the variable already held.
pub fn import_path(root: &Path, existing: Option<&OsStr>) -> Result<OsString, EnvironmentError> {
    let mut entries: Vec<PathBuf> = vec![root.to_path_buf()];
    if let Some(parent) = root.parent().filter(|p| !p.as_os_str().is_empty()) {
        entries.push(parent.to_path_buf());
    }
    if let Some(existing) = existing.filter(|v| !v.is_empty()) {
        entries.extend(env::split_paths(existing));
    }
    env::join_paths(entries).map_err(|source| EnvironmentError::JoinPaths {
        var: IMPORT_PATH_ENV_VAR,
        source,
    })
}

/// The environment every management invocation for `context` runs with.
///
/// `existing_import_path` is the caller's current value of the import path
/// variable, passed in rather than read here so the composition stays testable.
pub fn management_env(
    context: &ProjectContext,
    existing_import_path: Option<&OsStr>,
) -> Result<HashMap<String, String>, EnvironmentError> {
    let mut vars = HashMap::with_capacity(2);
    vars.insert(
        SETTINGS_ENV_VAR.to_string(),
        context.settings_module.clone(),
    );
    vars.insert(
        IMPORT_PATH_ENV_VAR.to_string(),
        import_path(&context.root, existing_import_path)?
            .to_string_lossy()
            .into_owned(),
    );
    Ok(vars)
}

/// Same as [`management_env`], reading the import path from the current process.
pub fn management_env_from_process(
    context: &ProjectContext,
) -> Result<HashMap<String, String>, EnvironmentError> {
    let existing = env::var_os(IMPORT_PATH_ENV_VAR);
    management_env(context, existing.as_deref())
}

/// Resolves the configured interpreter to a concrete path.
///
/// `~` and environment variables are expanded. A bare program name is looked up
/// on `PATH`; when it cannot be found it is returned unchanged and the spawn will
/// report the failure.
pub fn resolve_interpreter(template: &str) -> Result<PathBuf, EnvironmentError> {
    let expanded = paths::expand_path_template(template)?;
    if expanded.components().count() > 1 || expanded.is_absolute() {
        return Ok(expanded);
    }
    let name = expanded.to_string_lossy().into_owned();
    Ok(find_in_path(&name).unwrap_or(expanded))
}

fn find_in_path(executable_name: &str) -> Option<PathBuf> {
    let path_var = env::var_os("PATH")?;
    let candidates: Vec<String> = if cfg!(target_os = "windows") {
        vec![format!("{}.exe", executable_name), executable_name.to_string()]
    } else {
        vec![executable_name.to_string()]
    };
    env::split_paths(&path_var)
        .flat_map(|dir| candidates.iter().map(move |c| dir.join(c)))
        .find(|candidate| candidate.is_file())
}
