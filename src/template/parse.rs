//! Balanced-brace tokenizer for format templates.
//!
//! A `{` opens a directive that runs to its matching `}`; braces inside
//! the body nest, so `{?{$a}-{$b}::none}` is one conditional holding two
//! field references. Text outside braces is literal and a stray `}` is
//! kept as-is.

use super::{Directive, DirectiveKind, FieldPath, Segment, StreamKey, Template};
use crate::error::NumberingError;
use crate::eval::random::RandomSpec;

const SEQUENCE: &str = "sequence";
const PARAM: &str = "param:";

/// Parses a template string.
///
/// # Errors
///
/// Returns [`NumberingError::MalformedDirective`] for unterminated braces,
/// unknown directive kinds and bodies that cannot be parsed.
pub fn parse(source: &str) -> Result<Template, NumberingError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = source;

    while let Some(open) = rest.find('{') {
        literal.push_str(&rest[..open]);
        let after_open = &rest[open..];
        let close = matching_brace(after_open).ok_or_else(|| {
            NumberingError::malformed(after_open, "unterminated directive")
        })?;

        if !literal.is_empty() {
            segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        let raw = &after_open[..=close];
        let body = &after_open[1..close];
        segments.push(Segment::Directive(Directive { raw: raw.to_string(), kind: classify(raw, body)? }));
        rest = &after_open[close + 1..];
    }

    literal.push_str(rest);
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(Template { segments })
}

/// Byte offset of the `}` closing the `{` at the start of `s`.
fn matching_brace(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Byte offset of the first occurrence of `needle` outside nested braces.
fn find_top_level(s: &str, needle: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            _ if depth == 0 && s[i..].starts_with(needle) => return Some(i),
            _ => {}
        }
    }
    None
}

fn classify(raw: &str, body: &str) -> Result<DirectiveKind, NumberingError> {
    if let Some(path) = body.strip_prefix('$') {
        return parse_field(raw, path).map(DirectiveKind::Field);
    }
    if let Some(cond) = body.strip_prefix('?') {
        let split = find_top_level(cond, "::")
            .ok_or_else(|| NumberingError::malformed(raw, "conditional needs 'filled::empty'"))?;
        return Ok(DirectiveKind::Conditional {
            filled: parse(&cond[..split])?,
            empty: parse(&cond[split + 2..])?,
        });
    }
    if let Some(spec) = body.strip_prefix('!') {
        let spec = parse(spec)?;
        match spec.literal_text() {
            Some(text) => {
                RandomSpec::parse(text).map_err(|reason| NumberingError::malformed(raw, reason))?;
            }
            None if spec.segments.is_empty() => {
                return Err(NumberingError::malformed(raw, "empty random spec"));
            }
            None => {}
        }
        return Ok(DirectiveKind::Random(spec));
    }
    if let Some(format) = body.strip_prefix('@') {
        if format.is_empty() {
            return Err(NumberingError::malformed(raw, "empty date format"));
        }
        return Ok(DirectiveKind::Date(parse(format)?));
    }
    if body == SEQUENCE {
        return Ok(DirectiveKind::Sequence(None));
    }
    if let Some(stream) = body.strip_prefix(SEQUENCE).and_then(|s| s.strip_prefix(':')) {
        return parse_stream(raw, stream).map(|key| DirectiveKind::Sequence(Some(key)));
    }
    if let Some(index) = body.strip_prefix(PARAM) {
        let index = parse(index)?;
        match index.literal_text() {
            Some(text) => {
                parse_param_index(raw, text)?;
            }
            None if index.segments.is_empty() => {
                return Err(NumberingError::malformed(raw, "missing parameter number"));
            }
            None => {}
        }
        return Ok(DirectiveKind::Param(index));
    }
    Err(NumberingError::malformed(raw, "unknown directive"))
}

fn parse_field(raw: &str, path: &str) -> Result<FieldPath, NumberingError> {
    if path.contains(['{', '}']) {
        return Err(NumberingError::malformed(raw, "field references cannot nest directives"));
    }
    let (chain, format) = match path.split_once('@') {
        Some((chain, format)) => (chain, Some(format.to_string())),
        None => (path, None),
    };
    let chain: Vec<String> = chain.split('$').map(|f| f.trim().to_string()).collect();
    if chain.iter().any(String::is_empty) {
        return Err(NumberingError::malformed(raw, "empty field name"));
    }
    Ok(FieldPath { chain, format })
}

fn parse_stream(raw: &str, body: &str) -> Result<StreamKey, NumberingError> {
    let (key, value) = match find_top_level(body, ":") {
        Some(split) => (&body[..split], Some(&body[split + 1..])),
        None => (body, None),
    };
    let field = parse(key)?;
    if field.segments.is_empty() {
        return Err(NumberingError::malformed(raw, "stream key is empty"));
    }
    let value = value.filter(|v| !v.is_empty()).map(parse).transpose()?;
    Ok(StreamKey { field, value })
}

/// Parses a `{param:N}` index.
///
/// # Errors
///
/// Returns [`NumberingError::MalformedDirective`] if `text` is not an integer.
pub(crate) fn parse_param_index(raw: &str, text: &str) -> Result<i64, NumberingError> {
    text.trim()
        .parse::<i64>()
        .map_err(|_| NumberingError::malformed(raw, format!("parameter number '{text}' is not an integer")))
}
