/*!
 * Parsing of raw completion text into per-record entries.
 *
 * Models answer in loosely followed formats, so the parser accepts:
 * - `12: text`, `[12]: text`, `ID 12: text`, `ID: 12: text`
 * - markdown bullets and bold ids (`- **12**: text`)
 * - commentary before the first entry, which is ignored
 * - text spread over several lines, joined with a single space
 * - code fences, whose marker lines are ignored
 *
 * Every entry is reported in emission order with a validity flag. One bad
 * entry never hides the others, and a response with no recognisable entry
 * simply yields no entries.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::dataset::Record;

/// Start of an entry: optional bullet, optional bold, optional brackets, optional `ID` label
static ENTRY_START_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:[-*]\s+)?(?:\*\*|__)?\[?\s*(?:ID\s*[:#]?\s*)?(\d+)\s*\]?(?:\*\*|__)?\s*[:：]\s*(?:\*\*|__)?\s*(.*)$")
        .unwrap()
});

/// Why an entry cannot be accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    /// No text after the id
    EmptyText,
    /// The id does not belong to the batch
    UnknownId,
    /// The id was already answered earlier in the same response
    DuplicateId,
    /// The response ended inside an unclosed code fence while this entry was open
    Unterminated,
}

/// Validity of one parsed entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryValidity {
    WellFormed,
    Malformed(MalformedReason),
}

/// One `(id, text)` pair extracted from a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEntry {
    pub id: u64,
    pub text: String,
    pub validity: EntryValidity,
}

impl ParsedEntry {
    pub fn is_well_formed(&self) -> bool {
        self.validity == EntryValidity::WellFormed
    }
}

/// Entry being accumulated while scanning lines
struct OpenEntry {
    id: u64,
    parts: Vec<String>,
}

impl OpenEntry {
    fn text(&self) -> String {
        strip_enclosing_brackets(self.parts.join(" ").trim()).to_string()
    }
}

/// Parses completion text against the batch it answers
pub struct ResponseParser;

impl ResponseParser {
    /// Extract entries from `response`, judging ids against `batch`
    pub fn parse(response: &str, batch: &[Record]) -> Vec<ParsedEntry> {
        let batch_ids: HashSet<u64> = batch.iter().map(|r| r.id).collect();

        let mut raw: Vec<(u64, String)> = Vec::new();
        let mut current: Option<OpenEntry> = None;
        let mut in_fence = false;

        for line in response.lines() {
            let trimmed = line.trim();

            if is_fence_marker(trimmed) {
                in_fence = !in_fence;
                continue;
            }

            if let Some(captures) = ENTRY_START_REGEX.captures(trimmed) {
                let id = captures.get(1).and_then(|m| m.as_str().parse::<u64>().ok());
                if let Some(id) = id {
                    if let Some(done) = current.take() {
                        raw.push((done.id, done.text()));
                    }
                    let first = captures.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
                    current = Some(OpenEntry {
                        id,
                        parts: if first.is_empty() { Vec::new() } else { vec![first.to_string()] },
                    });
                    continue;
                }
            }

            if trimmed.is_empty() {
                continue;
            }

            // Continuation of the open entry, commentary otherwise
            if let Some(entry) = current.as_mut() {
                entry.parts.push(trimmed.to_string());
            }
        }

        let unterminated_tail = in_fence && current.is_some();
        if let Some(done) = current.take() {
            raw.push((done.id, done.text()));
        }

        let last_index = raw.len().saturating_sub(1);
        let mut answered: HashSet<u64> = HashSet::new();

        raw.into_iter()
            .enumerate()
            .map(|(index, (id, text))| {
                let validity = if unterminated_tail && index == last_index {
                    EntryValidity::Malformed(MalformedReason::Unterminated)
                } else if !batch_ids.contains(&id) {
                    EntryValidity::Malformed(MalformedReason::UnknownId)
                } else if text.is_empty() {
                    EntryValidity::Malformed(MalformedReason::EmptyText)
                } else if !answered.insert(id) {
                    EntryValidity::Malformed(MalformedReason::DuplicateId)
                } else {
                    EntryValidity::WellFormed
                };
                ParsedEntry { id, text, validity }
            })
            .collect()
    }
}

fn is_fence_marker(line: &str) -> bool {
    line.starts_with("```") || line.starts_with("~~~")
}

/// `[texte]` -> `texte`, applied once
fn strip_enclosing_brackets(text: &str) -> &str {
    match text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
        Some(inner) if !inner.contains('[') && !inner.contains(']') => inner.trim(),
        _ => text,
    }
}
