//! Reference Parser
//!
//! Scans text for `{{ path | transform:arg | ... }}` tokens.
//!
//! The token grammar forbids braces inside a reference, so a `}}` always
//! closes the nearest preceding `{{`. Text that does not match the grammar
//! is left alone; nothing here fails on malformed input.

use std::collections::HashSet;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use super::path::{parse_path, PathSegment};

/// One `{{...}}` token. The capture is everything between the braces.
static REFERENCE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([^{}]*)\}\}").expect("reference pattern is valid"));

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// A named transformation with its positional arguments, as written after
/// a `|` in a reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformStep {
    pub name: String,
    pub args: Vec<String>,
}

impl TransformStep {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Appends a positional argument.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// Serializes as `name:arg1:arg2`, quoting arguments that would not
/// otherwise survive re-parsing.
impl fmt::Display for TransformStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for arg in &self.args {
            write!(f, ":{}", quote_arg(arg))?;
        }
        Ok(())
    }
}

/// Parsed form of one `{{...}}` occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableReference {
    /// The matched text, braces included.
    pub raw: String,
    /// The dotted/indexed path, trimmed.
    pub path: String,
    pub segments: Vec<PathSegment>,
    /// Transformations in application order.
    pub transformations: Vec<TransformStep>,
    /// Byte offset of the opening `{{`.
    pub start: usize,
    /// Byte offset just past the closing `}}`.
    pub end: usize,
}

impl VariableReference {
    /// Returns true when the braces enclosed nothing but whitespace.
    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }
}

/// Parses every non-overlapping reference in `text`, in order of appearance.
pub fn parse_references(text: &str) -> Vec<VariableReference> {
    REFERENCE_TOKEN
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let content = caps.get(1)?;
            Some(parse_token(
                whole.as_str(),
                content.as_str(),
                whole.start(),
                whole.end(),
            ))
        })
        .collect()
}

fn parse_token(raw: &str, content: &str, start: usize, end: usize) -> VariableReference {
    let mut pipeline = split_unquoted(content.trim(), '|').into_iter();
    let path = pipeline.next().unwrap_or_default().trim().to_string();

    let transformations = pipeline
        .map(|segment| {
            let mut parts = split_unquoted(segment.trim(), ':').into_iter();
            let name = parts.next().unwrap_or_default().trim().to_string();
            let args = parts.map(unquote).collect();
            TransformStep { name, args }
        })
        .collect();

    VariableReference {
        raw: raw.to_string(),
        segments: parse_path(&path),
        path,
        transformations,
        start,
        end,
    }
}

/// Returns true if `text` contains at least one reference.
pub fn has_references(text: &str) -> bool {
    REFERENCE_TOKEN.is_match(text)
}

/// Distinct paths referenced in `text`, in first-seen order.
pub fn extract_paths(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    parse_references(text)
        .into_iter()
        .map(|reference| reference.path)
        .filter(|path| seen.insert(path.clone()))
        .collect()
}

/// Finds the reference whose span contains `offset` (byte offset, ends
/// inclusive so a cursor right after `}}` still hits it).
pub fn find_reference_at_offset(text: &str, offset: usize) -> Option<VariableReference> {
    parse_references(text)
        .into_iter()
        .find(|reference| reference.start <= offset && offset <= reference.end)
}

/// Returns the path typed so far inside an unclosed `{{` ending at `offset`.
///
/// Used for autocomplete while the author is still typing; returns `None`
/// when the cursor is not inside an open reference.
pub fn partial_path_at(text: &str, offset: usize) -> Option<String> {
    let before = text.get(..offset)?;
    let open = before.rfind(OPEN)?;
    let typed = &before[open + OPEN.len()..];
    if typed.contains(CLOSE) || typed.contains('{') || typed.contains('}') {
        return None;
    }
    let path = typed.split('|').next().unwrap_or_default();
    Some(path.trim().to_string())
}

/// Serializes a path and transformation list into reference text.
///
/// Inverse of [`parse_references`] for valid paths: parsing the output
/// yields one reference with the same path and transformations. Arguments
/// cannot contain braces, nor both quote characters when quoting is needed.
pub fn build_reference(path: &str, transformations: &[TransformStep]) -> String {
    let mut out = String::from(OPEN);
    out.push_str(path);
    for step in transformations {
        out.push('|');
        out.push_str(&step.to_string());
    }
    out.push_str(CLOSE);
    out
}

/// Splits on `sep` outside quotes. A quote only opens at the start of a
/// `|`/`:` delimited field, so apostrophes inside bare words stay literal.
fn split_unquoted(text: &str, sep: char) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut quote: Option<char> = None;
    let mut field_start = true;
    let mut piece_start = 0;

    for (i, ch) in text.char_indices() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None if ch == sep => {
                pieces.push(&text[piece_start..i]);
                piece_start = i + ch.len_utf8();
                field_start = true;
            }
            None if ch == '|' || ch == ':' => field_start = true,
            None if (ch == '"' || ch == '\'') && field_start => {
                quote = Some(ch);
                field_start = false;
            }
            None if ch.is_whitespace() => {}
            None => field_start = false,
        }
    }
    pieces.push(&text[piece_start..]);
    pieces
}

/// Trims an argument and strips one pair of matching surrounding quotes.
fn unquote(arg: &str) -> String {
    let trimmed = arg.trim();
    for q in ['"', '\''] {
        if trimmed.len() >= 2 && trimmed.starts_with(q) && trimmed.ends_with(q) {
            return trimmed[1..trimmed.len() - 1].to_string();
        }
    }
    trimmed.to_string()
}

fn quote_arg(arg: &str) -> String {
    let needs_quotes = arg.is_empty()
        || arg.contains([':', '|'])
        || arg.starts_with(['"', '\''])
        || arg.trim() != arg;
    if !needs_quotes {
        return arg.to_string();
    }
    let q = if arg.contains('"') { '\'' } else { '"' };
    format!("{q}{arg}{q}")
}
