//! Research fact set
//!
//! Research arrives as raw multi-line blocks, often with bullets, section
//! headers and numbering debris. [`FactSet`] keeps the useful lines, in the
//! order they were first seen, with no duplicates.

use std::collections::HashSet;

/// Lines shorter than this (after bullet stripping) are noise
pub const MIN_FACT_LEN: usize = 6;

/// A line ending in `:` shorter than this is a section header
pub const MAX_HEADER_LEN: usize = 80;

/// Order-preserving, duplicate-free list of research facts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactSet {
    facts: Vec<String>,
    seen: HashSet<String>,
}

impl FactSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a fact set from the newline-joined form stored in sessions
    pub fn from_serialized(text: &str) -> Self {
        let mut facts = Self::new();
        facts.merge_block(text);
        facts
    }

    /// Filter a raw research block and union its facts into the set
    ///
    /// Applying the same block twice leaves the set unchanged the second time.
    pub fn merge_block(&mut self, raw: &str) -> &[String] {
        for fact in raw.lines().filter_map(clean_line) {
            if self.seen.insert(fact.clone()) {
                self.facts.push(fact);
            }
        }
        &self.facts
    }

    pub fn as_slice(&self) -> &[String] {
        &self.facts
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Newline-joined form, the inverse of [`FactSet::from_serialized`]
    pub fn serialize(&self) -> String {
        self.facts.join("\n")
    }
}

/// Reduce one raw line to a fact, or reject it
pub fn clean_line(line: &str) -> Option<String> {
    let line = strip_bullet(line.trim());
    let len = line.chars().count();

    if len < MIN_FACT_LEN {
        return None;
    }
    if line.ends_with(':') && len < MAX_HEADER_LEN {
        return None;
    }
    if line
        .chars()
        .all(|c| c.is_ascii_digit() || c.is_ascii_punctuation() || c.is_whitespace())
    {
        return None;
    }

    Some(line.to_string())
}

/// `- x`, `* x` and `•x` all become `x`; `-5% drop` keeps its sign
fn strip_bullet(line: &str) -> &str {
    let mut chars = line.chars();
    match (chars.next(), chars.next()) {
        (Some('•'), _) => line['•'.len_utf8()..].trim_start(),
        (Some('-' | '*'), Some(next)) if next.is_whitespace() => line[1..].trim_start(),
        _ => line,
    }
}
