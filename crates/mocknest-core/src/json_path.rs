//! Minimal JSON path resolution for request predicates
//!
//! Supports the dotted subset used in mock files: `$.a.b`, `a.b[2].c`,
//! bracketed string keys `a["b c"]`. A missing segment resolves to `None`;
//! predicates treat that as a non-match.

use serde_json::Value;

/// Resolve `path` against `value`. Returns `None` when any segment is
/// absent or the path syntax is malformed.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in parse(path)? {
        match segment {
            Segment::Key(key) => current = current.as_object()?.get(&key)?,
            Segment::Index(index) => current = current.as_array()?.get(index)?,
        }
    }
    Some(current)
}

enum Segment {
    Key(String),
    Index(usize),
}

fn parse(path: &str) -> Option<Vec<Segment>> {
    let trimmed = path.strip_prefix('$').unwrap_or(path);
    let trimmed = trimmed.strip_prefix('.').unwrap_or(trimmed);
    if trimmed.is_empty() {
        return Some(Vec::new());
    }

    let mut segments = Vec::new();
    let mut chars = trimmed.chars().peekable();
    let mut buf = String::new();

    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if !buf.is_empty() {
                    segments.push(Segment::Key(std::mem::take(&mut buf)));
                }
            }
            '[' => {
                if !buf.is_empty() {
                    segments.push(Segment::Key(std::mem::take(&mut buf)));
                }
                match chars.peek() {
                    Some('"') | Some('\'') => {
                        let quote = chars.next()?;
                        let mut key = String::new();
                        loop {
                            let c = chars.next()?;
                            if c == quote {
                                break;
                            }
                            key.push(c);
                        }
                        if chars.next()? != ']' {
                            return None;
                        }
                        segments.push(Segment::Key(key));
                    }
                    _ => {
                        let mut digits = String::new();
                        loop {
                            let c = chars.next()?;
                            if c == ']' {
                                break;
                            }
                            digits.push(c);
                        }
                        segments.push(Segment::Index(digits.trim().parse().ok()?));
                    }
                }
            }
            _ => buf.push(c),
        }
    }
    if !buf.is_empty() {
        segments.push(Segment::Key(buf));
    }
    Some(segments)
}

/// Render a JSON value the way predicates compare it: bare strings without
/// quotes, everything else in its compact JSON form.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
