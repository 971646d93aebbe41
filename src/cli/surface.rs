// src/cli/surface.rs

use crate::{
    core::{session_runner::Session, surface::SessionSurface},
    models::ProjectContext,
    system::executor,
};
use anyhow::{Context, Result};
use colored::*;

/// Shows sessions on the console and runs searches in the foreground.
#[derive(Debug, Clone)]
pub struct TerminalSurface {
    search_command: String,
}

impl TerminalSurface {
    pub fn new(search_command: &str) -> Self {
        Self {
            search_command: search_command.to_string(),
        }
    }

    /// The search command line for `pattern` in `context`. Both substitutions
    /// are shell-quoted.
    pub fn search_line(&self, context: &ProjectContext, pattern: &str) -> Result<String> {
        let root = context.root.to_string_lossy();
        let quoted_pattern = shlex::try_quote(pattern)
            .with_context(|| format!(t!("surface.error.unquotable"), value = pattern))?;
        let quoted_root = shlex::try_quote(&root)
            .with_context(|| format!(t!("surface.error.unquotable"), value = root))?;
        Ok(self
            .search_command
            .replace("{pattern}", &quoted_pattern)
            .replace("{root}", &quoted_root))
    }
}

impl SessionSurface for TerminalSurface {
    fn show(&self, session: &Session) {
        println!(
            "{} {} {}",
            "▶".green().bold(),
            session.id.bold(),
            format!("({})", session.kind.label()).dimmed()
        );
        println!("  {}", session.command_line.dimmed());
    }

    fn detach(&self, id: &str) {
        println!("{} {}", "■".red(), id.dimmed());
    }

    fn search(&self, context: &ProjectContext, pattern: &str) -> Result<()> {
        let line = self.search_line(context, pattern)?;
        log::debug!("Searching with: {}", line);
        match executor::execute_command(&line, &context.root)? {
            Some(0) => {}
            Some(1) => println!("{}", format!(t!("surface.notice.no_matches"), pattern = pattern).yellow()),
            Some(code) => anyhow::bail!(t!("surface.error.search_failed"), code = code),
            None => anyhow::bail!(t!("surface.error.search_interrupted")),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_line_quotes_substitutions() {
        let surface = TerminalSurface::new("grep -rn {pattern} {root}");
        let ctx = ProjectContext::new("/srv/my blog", "blog.settings", "/srv/my blog/manage.py");
        assert_eq!(
            surface.search_line(&ctx, "def save").unwrap(),
            "grep -rn 'def save' '/srv/my blog'"
        );
        assert_eq!(
            surface.search_line(&ctx, "Post").unwrap(),
            "grep -rn Post '/srv/my blog'"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_search_runs_configured_command() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("models.py"), "class Post:\n    pass\n").unwrap();
        let ctx = ProjectContext::new(dir.path(), "blog.settings", dir.path().join("manage.py"));

        let surface = TerminalSurface::new("grep -rq {pattern} {root}");
        surface.search(&ctx, "class Post").unwrap();
        surface.search(&ctx, "class Comment").unwrap();

        let broken = TerminalSurface::new("grep -rq --no-such-flag {pattern} {root}");
        assert!(broken.search(&ctx, "x").is_err());
    }
}
