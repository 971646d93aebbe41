// src/core/prompt.rs

use anyhow::Result;
use dialoguer::{Confirm, Input, Select, theme::ColorfulTheme};

/// How argument collection talks to the operator.
pub trait Prompter {
    /// Free text. An empty answer takes `default` when there is one.
    fn input(&mut self, prompt: &str, default: Option<&str>) -> Result<String>;

    /// One of `items`. `default` is preselected.
    fn select(&mut self, prompt: &str, items: &[String], default: Option<&str>) -> Result<String>;

    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool>;
}

/// Interactive prompts on the controlling terminal.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn input(&mut self, prompt: &str, default: Option<&str>) -> Result<String> {
        let theme = ColorfulTheme::default();
        let mut input = Input::<String>::with_theme(&theme)
            .with_prompt(prompt)
            .allow_empty(true);
        if let Some(default) = default.filter(|d| !d.is_empty()) {
            input = input.default(default.to_string());
        }
        Ok(input.interact_text()?)
    }

    fn select(&mut self, prompt: &str, items: &[String], default: Option<&str>) -> Result<String> {
        if items.is_empty() {
            anyhow::bail!("Nothing to choose from for '{}'.", prompt);
        }
        let default_idx = default
            .and_then(|d| items.iter().position(|item| item == d))
            .unwrap_or(0);
        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .items(items)
            .default(default_idx)
            .interact()?;
        items
            .get(selection)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Selection out of range."))
    }

    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool> {
        Ok(Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(default)
            .interact()?)
    }
}

#[cfg(test)]
pub(crate) mod scripted {
    use super::*;
    use std::collections::VecDeque;

    /// Answers prompts from a queue. An empty answer takes the default.
    /// Every prompt shown is recorded.
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedPrompter {
        answers: VecDeque<String>,
        pub(crate) asked: Vec<String>,
    }

    impl ScriptedPrompter {
        pub(crate) fn new(answers: &[&str]) -> Self {
            Self {
                answers: answers.iter().map(|a| (*a).to_string()).collect(),
                asked: Vec::new(),
            }
        }

        fn next(&mut self, prompt: &str) -> Result<String> {
            self.asked.push(prompt.to_string());
            self.answers
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("no scripted answer for '{}'", prompt))
        }
    }

    impl Prompter for ScriptedPrompter {
        fn input(&mut self, prompt: &str, default: Option<&str>) -> Result<String> {
            let answer = self.next(prompt)?;
            if answer.is_empty() {
                return Ok(default.unwrap_or_default().to_string());
            }
            Ok(answer)
        }

        fn select(&mut self, prompt: &str, items: &[String], default: Option<&str>) -> Result<String> {
            let answer = self.next(prompt)?;
            let choice = if answer.is_empty() {
                default
                    .map(str::to_string)
                    .or_else(|| items.first().cloned())
                    .unwrap_or_default()
            } else {
                answer
            };
            if !items.contains(&choice) {
                anyhow::bail!("'{}' is not one of {:?}", choice, items);
            }
            Ok(choice)
        }

        fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool> {
            let answer = self.next(prompt)?;
            Ok(match answer.as_str() {
                "" => default,
                a => a.starts_with('y'),
            })
        }
    }
}
