//! Command-line value overrides
//!
//! Parses the Helm `strvals` syntax used by `--set` and `--set-file`:
//!
//! ```text
//! image.tag=v2,replicas=3          # several assignments, comma separated
//! servers={a,b,c}                  # list value
//! hosts[1].name=web                # list index in the key
//! annotations.example\.com/x=1     # escaped dot inside a key segment
//! message=hello\, world            # escaped comma inside a value
//! ```
//!
//! `--set` values are typed (`true`, `false`, `null` and integers), everything
//! else is a string. `--set-file` values are paths; the file content becomes
//! the string value.

use serde_json::Value as JsonValue;
use std::path::Path;

use crate::error::{CoreError, Result};
use crate::values::Values;

/// Largest list index accepted in a key
pub const MAX_INDEX: usize = 65_536;

/// How the right-hand side of an assignment is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideKind {
    /// `--set`: typed literal
    Set,
    /// `--set-file`: path to a file whose content becomes the value
    SetFile,
}

impl OverrideKind {
    /// The flag this kind is spelled as on the command line
    pub fn flag(&self) -> &'static str {
        match self {
            OverrideKind::Set => "--set",
            OverrideKind::SetFile => "--set-file",
        }
    }
}

/// One step in an override key
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

/// Parse `--set` assignments into a values tree
pub fn parse_set(input: &str) -> Result<Values> {
    let mut values = Values::new();
    parse_into(input, OverrideKind::Set, &mut values)?;
    Ok(values)
}

/// Parse `--set-file` assignments into a values tree, reading each file
pub fn parse_set_file(input: &str) -> Result<Values> {
    let mut values = Values::new();
    parse_into(input, OverrideKind::SetFile, &mut values)?;
    Ok(values)
}

/// Parse a comma separated list of values files and merge them in order
pub fn parse_values_files(input: &str) -> Result<Values> {
    let mut merged = Values::new();
    for path in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let layer = Values::from_file(path).map_err(|e| {
            CoreError::invalid_override(path, format!("cannot read values file: {}", e))
        })?;
        merged = merged.merge(&layer);
    }
    Ok(merged)
}

/// Parse assignments and apply them to `values` in order
pub fn parse_into(input: &str, kind: OverrideKind, values: &mut Values) -> Result<()> {
    for assignment in split_unescaped(input, ',', true) {
        if assignment.trim().is_empty() {
            continue;
        }
        apply_assignment(&assignment, kind, values)?;
    }
    Ok(())
}

fn apply_assignment(assignment: &str, kind: OverrideKind, values: &mut Values) -> Result<()> {
    let (raw_key, raw_value) = split_key_value(assignment).ok_or_else(|| {
        CoreError::invalid_override(assignment, "key has no value (expected key=value)")
    })?;

    let segments = parse_key(raw_key.trim(), assignment)?;

    let value = match kind {
        OverrideKind::Set => parse_set_value(raw_value),
        OverrideKind::SetFile => read_file_value(raw_value, assignment)?,
    };

    set_path(values.inner_mut(), &segments, value);
    Ok(())
}

/// Split on `sep` when not escaped and, optionally, not inside `{...}`
fn split_unescaped(input: &str, sep: char, respect_braces: bool) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    let mut depth = 0usize;

    for c in input.chars() {
        if escaped {
            current.push('\\');
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '{' if respect_braces => {
                depth += 1;
                current.push(c);
            }
            '}' if respect_braces && depth > 0 => {
                depth -= 1;
                current.push(c);
            }
            c if c == sep && depth == 0 => parts.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    if escaped {
        current.push('\\');
    }
    parts.push(current);
    parts
}

/// Split at the first unescaped `=`
fn split_key_value(assignment: &str) -> Option<(&str, &str)> {
    let mut escaped = false;
    for (i, c) in assignment.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' => return Some((&assignment[..i], &assignment[i + 1..])),
            _ => {}
        }
    }
    None
}

fn parse_key(key: &str, assignment: &str) -> Result<Vec<Segment>> {
    if key.is_empty() {
        return Err(CoreError::invalid_override(assignment, "key is empty"));
    }

    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = key.chars().peekable();
    // true right after a closing `]`, where only `.`, `[` or the end may follow
    let mut after_index = false;

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let Some(next) = chars.next() else {
                    return Err(CoreError::invalid_override(assignment, "key ends with an escape"));
                };
                if after_index {
                    return Err(CoreError::invalid_override(
                        assignment,
                        "unexpected characters after list index",
                    ));
                }
                current.push(next);
            }
            '.' => {
                if after_index {
                    after_index = false;
                } else if current.is_empty() {
                    return Err(CoreError::invalid_override(
                        assignment,
                        "key contains an empty path segment",
                    ));
                } else {
                    segments.push(Segment::Key(std::mem::take(&mut current)));
                }
                if chars.peek().is_none() {
                    return Err(CoreError::invalid_override(
                        assignment,
                        "key contains an empty path segment",
                    ));
                }
            }
            '[' => {
                if !current.is_empty() {
                    segments.push(Segment::Key(std::mem::take(&mut current)));
                } else if segments.is_empty() {
                    return Err(CoreError::invalid_override(
                        assignment,
                        "list index must follow a key name",
                    ));
                } else if !after_index {
                    return Err(CoreError::invalid_override(
                        assignment,
                        "key contains an empty path segment",
                    ));
                }

                let mut digits = String::new();
                let mut closed = false;
                for d in chars.by_ref() {
                    if d == ']' {
                        closed = true;
                        break;
                    }
                    digits.push(d);
                }
                if !closed {
                    return Err(CoreError::invalid_override(assignment, "unterminated list index"));
                }
                let index: usize = digits.trim().parse().map_err(|_| {
                    CoreError::invalid_override(
                        assignment,
                        format!("list index '{}' is not a non-negative integer", digits),
                    )
                })?;
                if index > MAX_INDEX {
                    return Err(CoreError::invalid_override(
                        assignment,
                        format!("list index {} exceeds the maximum of {}", index, MAX_INDEX),
                    ));
                }
                segments.push(Segment::Index(index));
                after_index = true;
            }
            ']' => {
                return Err(CoreError::invalid_override(assignment, "unexpected ']' in key"));
            }
            c => {
                if after_index {
                    return Err(CoreError::invalid_override(
                        assignment,
                        "unexpected characters after list index",
                    ));
                }
                current.push(c);
            }
        }
    }

    if !current.is_empty() {
        segments.push(Segment::Key(current));
    }

    Ok(segments)
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            } else {
                out.push('\\');
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn parse_set_value(raw: &str) -> JsonValue {
    let trimmed = raw.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('{') && trimmed.ends_with('}') {
        let inner = &trimmed[1..trimmed.len() - 1];
        if inner.trim().is_empty() {
            return JsonValue::Array(Vec::new());
        }
        let items = split_unescaped(inner, ',', false)
            .into_iter()
            .map(|item| typed_value(&unescape(item.trim())))
            .collect();
        return JsonValue::Array(items);
    }
    typed_value(&unescape(raw))
}

/// Type inference for `--set` literals
fn typed_value(s: &str) -> JsonValue {
    match s {
        "true" => return JsonValue::Bool(true),
        "false" => return JsonValue::Bool(false),
        "null" => return JsonValue::Null,
        _ => {}
    }

    // Leading zeros keep the literal a string ("007", "0123")
    let digits = s.strip_prefix('-').unwrap_or(s);
    let leading_zero = digits.len() > 1 && digits.starts_with('0');
    if !leading_zero {
        if let Ok(n) = s.parse::<i64>() {
            return JsonValue::Number(n.into());
        }
    }

    JsonValue::String(s.to_string())
}

fn read_file_value(raw: &str, assignment: &str) -> Result<JsonValue> {
    let path = unescape(raw.trim());
    if path.is_empty() {
        return Err(CoreError::invalid_override(assignment, "file path is empty"));
    }
    let content = std::fs::read_to_string(Path::new(&path)).map_err(|e| {
        CoreError::invalid_override(assignment, format!("cannot read file '{}': {}", path, e))
    })?;
    Ok(JsonValue::String(content))
}

fn set_path(target: &mut JsonValue, segments: &[Segment], value: JsonValue) {
    let Some((first, rest)) = segments.split_first() else {
        *target = value;
        return;
    };

    match first {
        Segment::Key(key) => {
            if !target.is_object() {
                *target = JsonValue::Object(serde_json::Map::new());
            }
            if let JsonValue::Object(map) = target {
                let slot = map.entry(key.clone()).or_insert(JsonValue::Null);
                set_path(slot, rest, value);
            }
        }
        Segment::Index(index) => {
            if !target.is_array() {
                *target = JsonValue::Array(Vec::new());
            }
            if let JsonValue::Array(items) = target {
                if items.len() <= *index {
                    items.resize(index + 1, JsonValue::Null);
                }
                set_path(&mut items[*index], rest, value);
            }
        }
    }
}
