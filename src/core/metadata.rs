// src/core/metadata.rs

//! Project settings and application paths, read by running the interpreter
//! with a short probe script that prints JSON.

use crate::core::discovery::{DiscoveryError, ManagementProbe};
use serde_json::Value;
use std::{collections::HashMap, path::PathBuf};

const SETTING_PROBE: &str = "\
import json, sys
import django
django.setup()
from django.conf import settings
print(json.dumps(getattr(settings, sys.argv[1]), default=str))
";

const APP_PATH_PROBE: &str = "\
import json, sys
import django
django.setup()
from django.apps import apps
print(json.dumps(apps.get_app_config(sys.argv[1]).path))
";

/// Read access to a project's configuration, as seen by the external program.
pub trait ProjectMetadata {
    /// Returns the value of a setting, cached unless `force` is set.
    fn get_setting(&mut self, name: &str, force: bool) -> Result<Value, DiscoveryError>;

    /// Returns the directory of an installed application.
    fn get_app_path(&mut self, app: &str) -> Result<PathBuf, DiscoveryError>;

    /// Drops every cached value.
    fn invalidate(&mut self);
}

/// [`ProjectMetadata`] backed by interpreter probes, with per-project caching.
#[derive(Debug)]
pub struct MetadataCache {
    probe: ManagementProbe,
    settings: HashMap<String, Value>,
    app_paths: HashMap<String, PathBuf>,
}

impl MetadataCache {
    pub fn new(probe: ManagementProbe) -> Self {
        Self {
            probe,
            settings: HashMap::new(),
            app_paths: HashMap::new(),
        }
    }

    fn probe_json(&self, script: &str, argument: &str) -> Result<Value, DiscoveryError> {
        let stdout = self.probe.run_interpreter(&["-c", script, argument])?;
        // Anything printed while the project loads lands before the JSON line.
        let last_line = stdout
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or_default();
        serde_json::from_str::<Value>(last_line.trim()).map_err(|e| DiscoveryError::Malformed {
            invocation: format!("{} -c <probe> {}", self.probe_interpreter(), argument),
            reason: e.to_string(),
            output: stdout.clone(),
        })
    }

    fn probe_interpreter(&self) -> String {
        self.probe.interpreter().display().to_string()
    }
}

impl ProjectMetadata for MetadataCache {
    fn get_setting(&mut self, name: &str, force: bool) -> Result<Value, DiscoveryError> {
        if !force && let Some(value) = self.settings.get(name) {
            return Ok(value.clone());
        }
        let value = self.probe_json(SETTING_PROBE, name)?;
        log::debug!("Setting {} resolved for {}.", name, self.probe.context().name);
        self.settings.insert(name.to_string(), value.clone());
        Ok(value)
    }

    fn get_app_path(&mut self, app: &str) -> Result<PathBuf, DiscoveryError> {
        if let Some(path) = self.app_paths.get(app) {
            return Ok(path.clone());
        }
        let value = self.probe_json(APP_PATH_PROBE, app)?;
        let Some(path) = value.as_str().map(PathBuf::from) else {
            return Err(DiscoveryError::Malformed {
                invocation: format!("{} -c <probe> {}", self.probe_interpreter(), app),
                reason: "expected a path string".to_string(),
                output: value.to_string(),
            });
        };
        self.app_paths.insert(app.to_string(), path.clone());
        Ok(path)
    }

    fn invalidate(&mut self) {
        self.settings.clear();
        self.app_paths.clear();
    }
}

/// Renders a setting for display or interpolation. Strings are shown bare.
pub fn setting_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// The labels of `INSTALLED_APPS`, as `manage.py` subcommands expect them.
///
/// `blog.apps.BlogConfig` becomes `blog`, `django.contrib.auth` becomes `auth`.
pub fn installed_app_labels(installed_apps: &Value) -> Vec<String> {
    let Some(entries) = installed_apps.as_array() else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(Value::as_str)
        .filter_map(|entry| {
            let module = match entry.find(".apps.") {
                Some(pos) => entry.get(..pos).unwrap_or(entry),
                None => entry,
            };
            module.rsplit('.').next().map(str::to_string)
        })
        .filter(|label| !label.is_empty())
        .collect()
}

/// The aliases configured in `DATABASES`, sorted by name.
pub fn database_aliases(databases: &Value) -> Vec<String> {
    databases
        .as_object()
        .map(|map| map.keys().cloned().collect())
        .unwrap_or_default()
}

/// The `ENGINE` of one database alias, if configured.
pub fn database_engine(databases: &Value, alias: &str) -> Option<String> {
    databases
        .get(alias)
        .and_then(|db| db.get("ENGINE"))
        .and_then(Value::as_str)
        .map(str::to_string)
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_installed_app_labels() {
        let apps = json!([
            "django.contrib.auth",
            "django.contrib.staticfiles",
            "blog.apps.BlogConfig",
            "shop"
        ]);
        assert_eq!(
            installed_app_labels(&apps),
            vec!["auth", "staticfiles", "blog", "shop"]
        );
        assert!(installed_app_labels(&json!("not a list")).is_empty());
    }

    #[test]
    fn test_database_helpers() {
        let dbs = json!({
            "legacy": {"ENGINE": "django.db.backends.mysql"},
            "default": {"ENGINE": "django.db.backends.postgresql"}
        });
        assert_eq!(database_aliases(&dbs), vec!["default", "legacy"]);
        assert_eq!(
            database_engine(&dbs, "legacy").as_deref(),
            Some("django.db.backends.mysql")
        );
        assert_eq!(database_engine(&dbs, "missing"), None);
    }

    #[test]
    fn test_setting_to_string() {
        assert_eq!(setting_to_string(&json!("fixtures")), "fixtures");
        assert_eq!(setting_to_string(&json!(true)), "true");
        assert_eq!(setting_to_string(&Value::Null), "");
    }

    #[cfg(unix)]
    mod probes {
        use super::super::*;
        use crate::models::ProjectContext;
        use std::{fs, os::unix::fs::PermissionsExt, sync::Arc};
        use tempfile::TempDir;

        /// A stand-in interpreter: `$1` is `-c`, `$2` the script, `$3` the argument.
        fn fake_interpreter(dir: &TempDir) -> PathBuf {
            let path = dir.path().join("fakepy");
            let script = format!(
                "#!/bin/sh\necho call >> {log}\ncase \"$3\" in\n  DEBUG) echo 'loading...'; echo true ;;\n  blog) echo '\"/srv/site/blog\"' ;;\n  BROKEN) echo 'not json' ;;\n  *) echo 'Traceback' >&2; exit 1 ;;\nesac\n",
                log = dir.path().join("calls.log").display()
            );
            fs::write(&path, script).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        fn cache(dir: &TempDir) -> MetadataCache {
            let ctx = ProjectContext::new(dir.path(), "site.settings", dir.path().join("manage.py"));
            MetadataCache::new(ManagementProbe::new(Arc::new(ctx), fake_interpreter(dir)))
        }

        fn calls(dir: &TempDir) -> usize {
            fs::read_to_string(dir.path().join("calls.log"))
                .map(|s| s.lines().count())
                .unwrap_or(0)
        }

        #[test]
        fn test_get_setting_reads_last_json_line_and_caches() {
            let dir = TempDir::new().unwrap();
            let mut cache = cache(&dir);
            assert_eq!(cache.get_setting("DEBUG", false).unwrap(), Value::Bool(true));
            assert_eq!(cache.get_setting("DEBUG", false).unwrap(), Value::Bool(true));
            assert_eq!(calls(&dir), 1);
            cache.get_setting("DEBUG", true).unwrap();
            assert_eq!(calls(&dir), 2);
        }

        #[test]
        fn test_get_app_path() {
            let dir = TempDir::new().unwrap();
            let mut cache = cache(&dir);
            assert_eq!(
                cache.get_app_path("blog").unwrap(),
                PathBuf::from("/srv/site/blog")
            );
        }

        #[test]
        fn test_probe_failures_are_discovery_errors() {
            let dir = TempDir::new().unwrap();
            let mut cache = cache(&dir);
            assert!(matches!(
                cache.get_setting("MISSING", false),
                Err(DiscoveryError::Failed { .. })
            ));
            assert!(matches!(
                cache.get_setting("BROKEN", false),
                Err(DiscoveryError::Malformed { .. })
            ));
        }
    }
}
