// src/core/output.rs

use regex::Regex;
use std::collections::VecDeque;

/// Longest line a truncating buffer keeps, in bytes. Older bytes of a longer
/// line are dropped.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// How much of a session's output is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Only the newest `max_lines` lines.
    Truncate { max_lines: usize },
    /// Everything, for commands whose output is post-processed.
    Capture,
}

/// The output of one session, as a sequence of lines plus a trailing partial line.
#[derive(Debug, Clone)]
pub struct OutputBuffer {
    mode: OutputMode,
    lines: VecDeque<String>,
    partial: String,
    dropped: usize,
}

impl OutputBuffer {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            lines: VecDeque::new(),
            partial: String::new(),
            dropped: 0,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Appends a chunk as it arrived from the process. Chunks may split lines.
    pub fn push(&mut self, chunk: &str) {
        let mut rest = chunk;
        while let Some(pos) = rest.find('\n') {
            let (line, tail) = rest.split_at(pos);
            self.partial.push_str(line);
            self.cap_partial();
            let complete = std::mem::take(&mut self.partial);
            self.lines.push_back(complete);
            rest = tail.get(1..).unwrap_or_default();
        }
        self.partial.push_str(rest);
        self.cap_partial();
        self.truncate();
    }

    fn cap_partial(&mut self) {
        if self.mode == OutputMode::Capture {
            return;
        }
        let excess = self.partial.len().saturating_sub(MAX_LINE_BYTES);
        if excess == 0 {
            return;
        }
        let cut = (excess..=self.partial.len())
            .find(|&i| self.partial.is_char_boundary(i))
            .unwrap_or(self.partial.len());
        self.partial.drain(..cut);
    }

    fn truncate(&mut self) {
        let OutputMode::Truncate { max_lines } = self.mode else {
            return;
        };
        while self.lines.len() > max_lines {
            self.lines.pop_front();
            self.dropped += 1;
        }
    }

    /// Number of lines discarded so far by truncation.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn line_count(&self) -> usize {
        self.lines.len() + usize::from(!self.partial.is_empty())
    }

    /// The retained output as one string.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out.push_str(&self.partial);
        out
    }

    /// The last `n` retained lines, oldest first.
    pub fn tail(&self, n: usize) -> Vec<&str> {
        let mut all: Vec<&str> = self.lines.iter().map(String::as_str).collect();
        if !self.partial.is_empty() {
            all.push(&self.partial);
        }
        let skip = all.len().saturating_sub(n);
        all.into_iter().skip(skip).collect()
    }
}

/// The part of `text` that follows the first line matching `sentinel`.
/// Without a match, the whole text is returned.
pub fn content_after_sentinel<'a>(text: &'a str, sentinel: &Regex) -> &'a str {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        offset += line.len();
        if sentinel.is_match(line.trim_end_matches(['\r', '\n'])) {
            return text.get(offset..).unwrap_or_default();
        }
    }
    text
}
