//! # Record Extraction
//!
//! Stateless functions that find, validate and normalize BibTeX entries inside
//! arbitrary text (clipboard content, a text field, a block of a `.bib` file).
//!
//! ## Locating an entry
//!
//! A candidate starts at a header `@type{keyword,` and runs up to (not
//! including) the next `@` or the end of the text, cut back to its last
//! closing brace. Brace nesting is then checked with an explicit stack:
//!
//! - every `{` pushes, every `}` must pop a matching `{`
//! - a `}` against an empty stack rejects the candidate
//! - a `{` after the outermost group has closed rejects the candidate
//!
//! When the candidate is unbalanced it is cut back to the previous closing
//! brace and checked again, until it balances or no closing brace is left.
//!
//! The type token must be one of [`EntryType`] (case-insensitive) and the
//! entry must carry at least one `name = value` field.
//!
//! Nothing in this module fails loudly: invalid input yields `None` or an
//! empty list.

use crate::model::{ClosureStyle, DisplayRow, EntryType, Record, MISSING_FIELD};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::ops::Range;

/// Line separator used for everything this crate writes.
pub const LINE_SEP: &str = "\r\n";

const FIELD_INDENT: &str = "    ";

// Keywords may not contain , { } \ ( ) % " ' # ~ =
static HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"@(\w+)\s*\{([^,{}\\()%"'#~=]*),"#).expect("header pattern is valid")
});

/// Returns the first valid entry in `text`.
pub fn find_first_record(text: &str) -> Option<Record> {
    locate_first_record(text).map(|(_, record)| record)
}

/// Like [`find_first_record`], also returning the byte range of the match.
pub fn locate_first_record(text: &str) -> Option<(Range<usize>, Record)> {
    for caps in HEADER.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let Some((entry_type, type_token, keyword)) = parse_header(&caps) else {
            continue;
        };

        let start = whole.start();
        let header_end = whole.end();
        let body_end = text[header_end..]
            .find('@')
            .map_or(text.len(), |i| header_end + i);
        let candidate = &text[start..body_end];

        let Some(len) = balanced_prefix_len(candidate) else {
            continue;
        };
        let raw = &candidate[..len];
        // Between the keyword separator and the final closing brace.
        let body = &raw[header_end - start..len - 1];
        let fields = split_fields(body);
        if fields.is_empty() {
            continue;
        }

        return Some((
            start..start + len,
            Record {
                entry_type,
                type_token,
                keyword,
                fields,
                raw: raw.to_string(),
            },
        ));
    }
    None
}

/// Returns the keyword of the first header with a recognized type, without
/// looking at the body.
pub fn extract_keyword(text: &str) -> Option<String> {
    HEADER
        .captures_iter(text)
        .find_map(|caps| parse_header(&caps).map(|(_, _, keyword)| keyword))
}

/// Rewrites the first entry in `text` with one field per line and every
/// wrapped value converted to `style`. Text without a valid entry is
/// returned unchanged.
pub fn normalize_value_closures(text: &str, style: ClosureStyle) -> String {
    match find_first_record(text) {
        Some(record) => render_record(&record, style),
        None => text.to_string(),
    }
}

/// Extracts every valid entry from `text`, normalized to `style`, in order
/// of appearance.
pub fn extract_all_records(text: &str, style: ClosureStyle) -> Vec<String> {
    let mut working = text.to_string();
    let mut records = Vec::new();

    while let Some((span, record)) = locate_first_record(&working) {
        records.push(render_record(&record, style));
        let before = working.len();
        working.replace_range(span, "");
        if working.len() >= before {
            break;
        }
    }
    records
}

/// Flattens a record into the columns the shell displays.
pub fn fields_to_display_record(record: &Record) -> DisplayRow {
    let text_field = |name: &str| {
        record
            .field(name)
            .map(|v| collapse_whitespace(strip_closures(v)))
            .unwrap_or_else(|| MISSING_FIELD.to_string())
    };
    let year = record
        .field("year")
        .map(|v| {
            let bare: String = v.chars().filter(|c| !matches!(c, '{' | '}' | '"')).collect();
            collapse_whitespace(&bare)
        })
        .unwrap_or_else(|| MISSING_FIELD.to_string());

    DisplayRow {
        keyword: record.keyword.clone(),
        entry_type: record.entry_type,
        title: text_field("title"),
        author: text_field("author"),
        year,
        url: text_field("url"),
        doi: text_field("doi"),
    }
}

/// Renders `record` in the on-disk layout:
///
/// ```text
/// @article{nash51,
///     author = {Nash, John},
///     year = 1951
/// }
/// ```
pub fn render_record(record: &Record, style: ClosureStyle) -> String {
    let mut out = format!("@{}{{{}", record.type_token, record.keyword);
    for (name, value) in &record.fields {
        let value = convert_closure(&collapse_whitespace(value), style);
        out.push(',');
        out.push_str(LINE_SEP);
        out.push_str(FIELD_INDENT);
        out.push_str(name);
        out.push_str(" = ");
        out.push_str(&value);
    }
    out.push_str(LINE_SEP);
    out.push('}');
    out
}

fn parse_header(caps: &Captures<'_>) -> Option<(EntryType, String, String)> {
    let type_token = caps.get(1)?.as_str();
    let entry_type = type_token.parse::<EntryType>().ok()?;
    let keyword = caps.get(2)?.as_str().trim();
    if keyword.is_empty() {
        return None;
    }
    Some((entry_type, type_token.to_string(), keyword.to_string()))
}

/// Length of the longest prefix ending in `}` whose braces balance.
fn balanced_prefix_len(candidate: &str) -> Option<usize> {
    let mut end = candidate.rfind('}')? + 1;
    loop {
        if is_balanced(&candidate[..end]) {
            return Some(end);
        }
        end = candidate[..end - 1].rfind('}')? + 1;
    }
}

fn is_balanced(s: &str) -> bool {
    let mut stack: Vec<char> = Vec::new();
    let mut closed = false;
    for c in s.chars() {
        match c {
            '{' => {
                if closed {
                    return false;
                }
                stack.push(c);
            }
            '}' => {
                if stack.pop().is_none() {
                    return false;
                }
                if stack.is_empty() {
                    closed = true;
                }
            }
            _ => {}
        }
    }
    closed && stack.is_empty()
}

/// Splits an entry body on top-level commas into `(name, value)` pairs.
fn split_fields(body: &str) -> Vec<(String, String)> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut escaped = false;
    let mut part_start = 0;

    for (i, c) in body.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            '"' if depth == 0 && !escaped => in_quote = !in_quote,
            ',' if depth == 0 && !in_quote => {
                parts.push(&body[part_start..i]);
                part_start = i + 1;
            }
            _ => {}
        }
        escaped = c == '\\';
    }
    parts.push(&body[part_start..]);

    parts
        .into_iter()
        .filter_map(|part| {
            let (name, value) = part.split_once('=')?;
            let name = name.trim();
            let valid_name = !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | ':' | '.'));
            valid_name.then(|| (name.to_string(), value.trim().to_string()))
        })
        .collect()
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn convert_closure(value: &str, style: ClosureStyle) -> String {
    match style {
        ClosureStyle::Brace => match quoted_inner(value) {
            Some(inner) if braces_balance(inner) => format!("{{{}}}", inner),
            _ => value.to_string(),
        },
        ClosureStyle::Quote => match braced_inner(value) {
            Some(inner) if !has_top_level_quote(inner) => format!("\"{}\"", inner),
            _ => value.to_string(),
        },
    }
}

/// Peels any number of enclosing `{}` / `""` pairs.
fn strip_closures(value: &str) -> &str {
    let mut current = value.trim();
    while let Some(inner) = braced_inner(current).or_else(|| quoted_inner(current)) {
        current = inner.trim();
    }
    current
}

/// Inner text when `value` is one brace group spanning start to end.
fn braced_inner(value: &str) -> Option<&str> {
    if value.len() < 2 || !value.starts_with('{') || !value.ends_with('}') {
        return None;
    }
    let mut depth = 0usize;
    for (i, c) in value.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 && i != value.len() - 1 {
                    return None;
                }
            }
            _ => {}
        }
    }
    (depth == 0).then(|| &value[1..value.len() - 1])
}

/// Inner text when `value` is one quoted string spanning start to end.
fn quoted_inner(value: &str) -> Option<&str> {
    if value.len() < 2 || !value.starts_with('"') || !value.ends_with('"') {
        return None;
    }
    let inner = &value[1..value.len() - 1];
    (!has_top_level_quote(inner)).then_some(inner)
}

fn has_top_level_quote(s: &str) -> bool {
    let mut depth = 0usize;
    let mut escaped = false;
    for c in s.chars() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            '"' if depth == 0 && !escaped => return true,
            _ => {}
        }
        escaped = c == '\\';
    }
    false
}

fn braces_balance(s: &str) -> bool {
    let mut depth = 0usize;
    for c in s.chars() {
        match c {
            '{' => depth += 1,
            '}' => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            _ => {}
        }
    }
    depth == 0
}
