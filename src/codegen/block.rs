//! Indentation-aware text assembly.
//!
//! A [`Block`] is a flat list of `(text, indent)` pairs plus a cursor level
//! that new lines are appended at. Nesting exists only as indent arithmetic:
//! inserting one block into another rebases the inserted lines so that its
//! first line lands on the level of the insertion point, keeping the relative
//! indentation of everything below it.

use std::fmt;
use std::path::Path;

use tracing::warn;

use crate::error::Result;
use crate::persist::{self, ForceOverwrite, OverwriteGate};

/// Spaces per indentation level.
pub const TAB_SIZE: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub text: String,
    pub indent: usize,
}

impl Line {
    pub fn new(text: impl Into<String>, indent: usize) -> Self {
        Self {
            text: text.into(),
            indent,
        }
    }

    pub fn blank() -> Self {
        Self::new("", 0)
    }

    pub fn is_blank(&self) -> bool {
        self.text.is_empty()
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_blank() {
            return Ok(());
        }
        write!(f, "{:width$}{}", "", self.text, width = self.indent * TAB_SIZE)
    }
}

/// Anything that can be placed into a block.
#[derive(Debug, Clone)]
pub enum Content {
    Line(Line),
    Lines(Vec<Line>),
    Block(Block),
}

impl Content {
    fn into_lines(self) -> Vec<Line> {
        match self {
            Content::Line(line) => vec![line],
            Content::Lines(lines) => lines,
            Content::Block(block) => block.lines,
        }
    }
}

impl From<Line> for Content {
    fn from(line: Line) -> Self {
        Content::Line(line)
    }
}

impl From<Vec<Line>> for Content {
    fn from(lines: Vec<Line>) -> Self {
        Content::Lines(lines)
    }
}

impl From<Block> for Content {
    fn from(block: Block) -> Self {
        Content::Block(block)
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Line(Line::new(text, 0))
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Line(Line::new(text, 0))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    lines: Vec<Line>,
    /// Level that `append_line` writes at
    cursor: usize,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    /// A block holding `text` as its only line.
    pub fn single(text: impl Into<String>) -> Self {
        let mut block = Self::new();
        block.append_line(text);
        block
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn get_line(&self, index: usize) -> Option<&Line> {
        self.lines.get(index)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn set_cursor(&mut self, level: usize) -> &mut Self {
        self.cursor = level;
        self
    }

    pub fn indent(&mut self) -> &mut Self {
        self.cursor += 1;
        self
    }

    pub fn dedent(&mut self) -> &mut Self {
        self.cursor = self.cursor.saturating_sub(1);
        self
    }

    pub fn append_line(&mut self, text: impl Into<String>) -> &mut Self {
        self.lines.push(Line::new(text, self.cursor));
        self
    }

    pub fn blank_line(&mut self) -> &mut Self {
        self.lines.push(Line::blank());
        self
    }

    /// Append `content` with its first line at the cursor level.
    pub fn append(&mut self, content: impl Into<Content>) -> &mut Self {
        let lines = rebase(content.into().into_lines(), self.cursor);
        self.lines.extend(lines);
        self
    }

    /// Insert `content` before `index`, at the level of the line it displaces.
    ///
    /// Blank lines are skipped when looking for that level. An index past the
    /// end appends at the cursor level.
    pub fn insert(&mut self, content: impl Into<Content>, index: usize) -> &mut Self {
        let index = index.min(self.lines.len());
        let level = self.level_at(index);
        let lines = rebase(content.into().into_lines(), level);
        self.lines.splice(index..index, lines);
        self
    }

    /// Swap the line at `index` for `content`, keeping its level.
    ///
    /// Returns `false` and leaves the block untouched when `index` is out of range.
    pub fn replace(&mut self, content: impl Into<Content>, index: usize) -> bool {
        let Some(old) = self.lines.get(index) else {
            warn!(index, len = self.lines.len(), "replace index out of range");
            return false;
        };
        let lines = rebase(content.into().into_lines(), old.indent);
        self.lines.splice(index..=index, lines);
        true
    }

    /// Move the whole block so that its first line sits at `level`.
    ///
    /// Negative levels clamp to zero.
    pub fn set_indent_level(&mut self, level: isize) -> &mut Self {
        let level = usize::try_from(level).unwrap_or_else(|_| {
            warn!(level, "negative indent level, using 0");
            0
        });
        let Some(first) = first_level(&self.lines) else {
            self.cursor = level;
            return self;
        };
        self.lines = rebase(std::mem::take(&mut self.lines), level);
        self.cursor = (self.cursor + level).saturating_sub(first);
        self
    }

    /// Whether some line's text equals `text`, ignoring its level.
    pub fn contains(&self, text: &str) -> bool {
        self.lines.iter().any(|line| line.text == text)
    }

    pub fn contains_line(&self, line: &Line) -> bool {
        self.lines.contains(line)
    }

    /// Write to `path`, asking `gate` before replacing an existing file.
    pub fn write(&self, path: &Path, gate: &dyn OverwriteGate) -> Result<bool> {
        persist::create_file(path, &self.to_string(), gate)
    }

    pub fn write_force(&self, path: &Path) -> Result<bool> {
        self.write(path, &ForceOverwrite)
    }

    /// Level of the first non-blank line at or after `index`.
    fn level_at(&self, index: usize) -> usize {
        first_level(&self.lines[index..]).unwrap_or(self.cursor)
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Shift `lines` so the first one sits at `level`.
fn rebase(lines: Vec<Line>, level: usize) -> Vec<Line> {
    let Some(first) = first_level(&lines) else {
        return lines;
    };
    lines
        .into_iter()
        .map(|line| {
            let indent = if line.is_blank() {
                0
            } else {
                (line.indent + level).saturating_sub(first)
            };
            Line::new(line.text, indent)
        })
        .collect()
}

/// Level of the first non-blank line.
fn first_level(lines: &[Line]) -> Option<usize> {
    lines.iter().find(|l| !l.is_blank()).map(|l| l.indent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::tests::Answer;

    fn function() -> Block {
        let mut block = Block::new();
        block.append_line("def f():").indent().append_line("return 1");
        block
    }

    #[test]
    fn append_line_uses_cursor() {
        let block = function();
        assert_eq!(block.to_string(), "def f():\n    return 1\n");
        assert_eq!(block.cursor(), 1);
    }

    #[test]
    fn dedent_closes_a_nested_block() {
        let mut block = function();
        block.append_line("if x:").indent().append_line("pass");
        block.dedent().append_line("y = 2");
        assert_eq!(
            block.to_string(),
            "def f():\n    return 1\n    if x:\n        pass\n    y = 2\n"
        );
        block.dedent().dedent().dedent();
        assert_eq!(block.cursor(), 0);
    }

    #[test]
    fn append_block_lands_on_cursor() {
        let mut outer = Block::new();
        outer.append_line("if x:").indent();
        outer.append(function());
        assert_eq!(
            outer.to_string(),
            "if x:\n    def f():\n        return 1\n"
        );
    }

    #[test]
    fn insert_takes_level_of_displaced_line() {
        let mut outer = Block::new();
        outer.append_line("class A:").indent().append_line("x = 1");
        outer.insert(function(), 1);
        assert_eq!(
            outer.to_string(),
            "class A:\n    def f():\n        return 1\n    x = 1\n"
        );

        outer.insert("import os", 0);
        assert_eq!(outer.get_line(0), Some(&Line::new("import os", 0)));
    }

    #[test]
    fn insert_past_end_appends_at_cursor() {
        let mut block = function();
        block.insert(vec![Line::new("a", 3), Line::new("b", 4)], 99);
        assert_eq!(block.get_line(2), Some(&Line::new("a", 1)));
        assert_eq!(block.get_line(3), Some(&Line::new("b", 2)));
    }

    #[test]
    fn set_indent_level_rebases_relative_to_first_line() {
        let mut block = function();
        block.set_indent_level(2);
        assert_eq!(block.get_line(0).map(|l| l.indent), Some(2));
        assert_eq!(block.get_line(1).map(|l| l.indent), Some(3));
        assert_eq!(block.cursor(), 3);

        block.set_indent_level(-4);
        assert_eq!(block.get_line(0).map(|l| l.indent), Some(0));
        assert_eq!(block.get_line(1).map(|l| l.indent), Some(1));
    }

    #[test]
    fn blank_lines_render_without_indentation() {
        let mut block = function();
        block.blank_line().append_line("y = 2");
        block.set_indent_level(1);
        assert_eq!(
            block.to_string(),
            "    def f():\n        return 1\n\n        y = 2\n"
        );
    }

    #[test]
    fn contains_and_replace() {
        let mut block = function();
        assert!(block.contains("return 1"));
        assert!(block.contains_line(&Line::new("return 1", 1)));
        assert!(!block.contains_line(&Line::new("return 1", 0)));

        assert!(block.replace("return 2", 1));
        assert_eq!(block.get_line(1), Some(&Line::new("return 2", 1)));
        assert!(!block.replace("return 3", 5));
        assert_eq!(block.len(), 2);
    }

    #[test]
    fn write_is_gated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.py");
        assert!(function().write_force(&path).unwrap());

        let gate = Answer::new(false);
        assert!(!Block::single("x = 1").write(&path, &gate).unwrap());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "def f():\n    return 1\n"
        );
    }
}
