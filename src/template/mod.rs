//! Format templates: the directive tree and its staged renderer.
//!
//! A template is parsed once into literal and directive segments, then
//! rendered against a [`Resolver`] in a fixed stage order:
//!
//! 1. field references and conditionals
//! 2. parameters
//! 3. random tokens
//! 4. dates
//! 5. sequence counters
//!
//! Sequence directives run last so every other part of the attempt has
//! succeeded before a counter is consumed. Values substituted by a stage
//! are literal text and are never re-read as directives.

pub mod datefmt;
pub mod parse;

use std::collections::BTreeSet;

pub use parse::parse;

use crate::error::NumberingError;
use crate::eval::random::RandomSpec;

/// A parsed format template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    /// Segments in source order.
    pub segments: Vec<Segment>,
}

/// One piece of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text copied as-is.
    Literal(String),
    /// A `{...}` directive.
    Directive(Directive),
}

/// A directive and the source text it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// Source text including braces, for diagnostics.
    pub raw: String,
    /// What the directive does.
    pub kind: DirectiveKind,
}

/// The closed set of directive kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveKind {
    /// `{sequence}` or `{sequence:key:value}`.
    Sequence(Option<StreamKey>),
    /// `{param:N}`; the body renders to the 1-based index.
    Param(Template),
    /// `{$field}`, `{$field@format}`, `{$lookup$field}`.
    Field(FieldPath),
    /// `{?filled::empty}`.
    Conditional {
        /// Rendered when every field it references has a value.
        filled: Template,
        /// Rendered otherwise.
        empty: Template,
    },
    /// `{!uln-8}` or `{!A,B,C-8}`; the body renders to the spec.
    Random(Template),
    /// `{@format}`; the body renders to the date format.
    Date(Template),
}

/// Partition key of a stream sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamKey {
    /// Renders to the partition field name.
    pub field: Template,
    /// Renders to the partition value; absent means the null partition.
    pub value: Option<Template>,
}

/// A field reference, possibly chained through lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    /// Field names from the record outwards; all but the last must be lookups.
    pub chain: Vec<String>,
    /// Date format applied to the terminal value.
    pub format: Option<String>,
}

impl FieldPath {
    /// The first field in the chain.
    #[must_use]
    pub fn head(&self) -> &str {
        &self.chain[0]
    }

    /// Cache key identifying this reference within one generation.
    #[must_use]
    pub fn cache_key(&self) -> String {
        match &self.format {
            Some(format) => format!("{}@{format}", self.chain.join("$")),
            None => self.chain.join("$"),
        }
    }
}

/// Render stages, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    /// Fields and conditionals.
    Fields,
    /// Input parameters.
    Params,
    /// Random tokens.
    Random,
    /// Current date.
    Dates,
    /// Counters.
    Sequence,
}

const LATE_STAGES: [Stage; 4] = [Stage::Params, Stage::Random, Stage::Dates, Stage::Sequence];

impl DirectiveKind {
    /// Short name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sequence(_) => "sequence",
            Self::Param(_) => "param",
            Self::Field(_) => "field",
            Self::Conditional { .. } => "conditional",
            Self::Random(_) => "random",
            Self::Date(_) => "date",
        }
    }

    /// Stage this directive is evaluated in.
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::Field(_) | Self::Conditional { .. } => Stage::Fields,
            Self::Param(_) => Stage::Params,
            Self::Random(_) => Stage::Random,
            Self::Date(_) => Stage::Dates,
            Self::Sequence(_) => Stage::Sequence,
        }
    }

    fn children(&self) -> Vec<&Template> {
        match self {
            Self::Sequence(None) | Self::Field(_) => Vec::new(),
            Self::Sequence(Some(key)) => std::iter::once(&key.field).chain(key.value.as_ref()).collect(),
            Self::Param(body) | Self::Random(body) | Self::Date(body) => vec![body],
            Self::Conditional { filled, empty } => vec![filled, empty],
        }
    }
}

/// Evaluates individual directives on behalf of the renderer.
///
/// One method per directive kind; the renderer decides order and handles
/// nesting, the resolver owns record access, counters and randomness.
pub trait Resolver {
    /// Resolves a field reference. `Ok(None)` means missing or null; a
    /// missing field is only an error when `suppress` is false.
    ///
    /// # Errors
    ///
    /// Returns field lookup errors.
    fn field(&mut self, path: &FieldPath, suppress: bool) -> Result<Option<String>, NumberingError>;

    /// Returns the 1-based input parameter.
    ///
    /// # Errors
    ///
    /// Returns [`NumberingError::ParamIndexInvalid`] for unknown indices.
    fn param(&mut self, index: i64) -> Result<String, NumberingError>;

    /// Generates a random token.
    ///
    /// # Errors
    ///
    /// Returns [`NumberingError::InvalidRandomSpec`] for degenerate specs.
    fn random(&mut self, spec: &RandomSpec) -> Result<String, NumberingError>;

    /// Formats the current time.
    ///
    /// # Errors
    ///
    /// Returns clock or time-zone failures.
    fn date(&mut self, format: &str) -> Result<String, NumberingError>;

    /// Allocates the next counter value, rendered with padding.
    ///
    /// # Errors
    ///
    /// Returns config store failures.
    fn sequence(&mut self, stream: Option<(&str, Option<&str>)>) -> Result<String, NumberingError>;

    /// Whether missing fields outside conditionals render empty.
    fn suppress_missing_fields(&self) -> bool;
}

enum Piece<'t> {
    Text(String),
    Pending(&'t Directive),
}

impl Template {
    /// Top-level directives, in order.
    pub fn directives(&self) -> impl Iterator<Item = &Directive> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Directive(d) => Some(d),
            Segment::Literal(_) => None,
        })
    }

    /// The text of a template with no directives.
    #[must_use]
    pub fn literal_text(&self) -> Option<&str> {
        match self.segments.as_slice() {
            [Segment::Literal(text)] => Some(text),
            _ => None,
        }
    }

    /// Returns `true` if a sequence directive appears anywhere.
    #[must_use]
    pub fn uses_sequence(&self) -> bool {
        self.directives().any(|d| {
            matches!(d.kind, DirectiveKind::Sequence(_))
                || d.kind.children().into_iter().any(Template::uses_sequence)
        })
    }

    /// Literal parameter indices referenced anywhere.
    #[must_use]
    pub fn param_indices(&self) -> BTreeSet<i64> {
        let mut indices = BTreeSet::new();
        self.collect_param_indices(&mut indices);
        indices
    }

    fn collect_param_indices(&self, indices: &mut BTreeSet<i64>) {
        for directive in self.directives() {
            if let DirectiveKind::Param(body) = &directive.kind {
                if let Some(index) =
                    body.literal_text().and_then(|text| text.trim().parse::<i64>().ok())
                {
                    indices.insert(index);
                }
            }
            for child in directive.kind.children() {
                child.collect_param_indices(indices);
            }
        }
    }

    /// Renders the template through every stage.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a directive; nothing rendered so
    /// far is kept.
    pub fn render(&self, resolver: &mut dyn Resolver) -> Result<String, NumberingError> {
        let mut pieces = Vec::with_capacity(self.segments.len());
        expand_fields(&self.segments, resolver, &mut pieces)?;

        for stage in LATE_STAGES {
            for piece in &mut pieces {
                if let Piece::Pending(directive) = *piece {
                    if directive.kind.stage() == stage {
                        *piece = Piece::Text(evaluate(directive, resolver)?);
                    }
                }
            }
        }

        let mut out = String::new();
        for piece in pieces {
            if let Piece::Text(text) = piece {
                out.push_str(&text);
            }
        }
        Ok(out)
    }
}

/// Stage one: resolves fields and picks conditional branches, splicing the
/// chosen branch in place so its remaining directives run at their own stage.
fn expand_fields<'t>(
    segments: &'t [Segment],
    resolver: &mut dyn Resolver,
    out: &mut Vec<Piece<'t>>,
) -> Result<(), NumberingError> {
    for segment in segments {
        match segment {
            Segment::Literal(text) => out.push(Piece::Text(text.clone())),
            Segment::Directive(directive) => match &directive.kind {
                DirectiveKind::Field(path) => {
                    let suppress = resolver.suppress_missing_fields();
                    out.push(Piece::Text(resolver.field(path, suppress)?.unwrap_or_default()));
                }
                DirectiveKind::Conditional { filled, empty } => {
                    let branch = if is_filled(filled, resolver)? { filled } else { empty };
                    expand_fields(&branch.segments, resolver, out)?;
                }
                _ => out.push(Piece::Pending(directive)),
            },
        }
    }
    Ok(())
}

fn is_filled(filled: &Template, resolver: &mut dyn Resolver) -> Result<bool, NumberingError> {
    for directive in filled.directives() {
        if let DirectiveKind::Field(path) = &directive.kind {
            if resolver.field(path, true)?.as_deref().map_or(true, str::is_empty) {
                return Ok(false);
            }
        }
    }
    Ok(true)
}

fn evaluate(directive: &Directive, resolver: &mut dyn Resolver) -> Result<String, NumberingError> {
    match &directive.kind {
        DirectiveKind::Param(body) => {
            let text = body.render(resolver)?;
            let index = parse::parse_param_index(&directive.raw, &text)?;
            resolver.param(index)
        }
        DirectiveKind::Random(body) => {
            let text = body.render(resolver)?;
            let spec = RandomSpec::parse(&text)
                .map_err(|reason| NumberingError::malformed(&directive.raw, reason))?;
            resolver.random(&spec)
        }
        DirectiveKind::Date(body) => {
            let format = body.render(resolver)?;
            resolver.date(&format)
        }
        DirectiveKind::Sequence(None) => resolver.sequence(None),
        DirectiveKind::Sequence(Some(key)) => {
            let field = key.field.render(resolver)?;
            let value = key.value.as_ref().map(|v| v.render(resolver)).transpose()?;
            let value = value.filter(|v| !v.is_empty());
            resolver.sequence(Some((&field, value.as_deref())))
        }
        DirectiveKind::Field(_) | DirectiveKind::Conditional { .. } => {
            unreachable!("fields and conditionals are expanded before late stages")
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    /// Records the order directives were evaluated in.
    #[derive(Default)]
    struct Script {
        fields: BTreeMap<String, String>,
        params: Vec<String>,
        next_index: i64,
        calls: Vec<String>,
        suppress: bool,
    }

    impl Resolver for Script {
        fn field(&mut self, path: &FieldPath, suppress: bool) -> Result<Option<String>, NumberingError> {
            self.calls.push(format!("field:{}", path.cache_key()));
            match self.fields.get(&path.cache_key()) {
                Some(v) => Ok(Some(v.clone())),
                None if suppress => Ok(None),
                None => Err(NumberingError::FieldMissing {
                    entity: "test".into(),
                    field: path.head().to_string(),
                }),
            }
        }

        fn param(&mut self, index: i64) -> Result<String, NumberingError> {
            self.calls.push(format!("param:{index}"));
            usize::try_from(index - 1)
                .ok()
                .and_then(|i| self.params.get(i).cloned())
                .ok_or(NumberingError::ParamIndexInvalid { index, supplied: self.params.len() })
        }

        fn random(&mut self, spec: &RandomSpec) -> Result<String, NumberingError> {
            self.calls.push("random".into());
            Ok("R".repeat(spec.length))
        }

        fn date(&mut self, format: &str) -> Result<String, NumberingError> {
            self.calls.push(format!("date:{format}"));
            Ok("2025".into())
        }

        fn sequence(&mut self, stream: Option<(&str, Option<&str>)>) -> Result<String, NumberingError> {
            self.calls.push(format!("sequence:{stream:?}"));
            self.next_index += 1;
            Ok(self.next_index.to_string())
        }

        fn suppress_missing_fields(&self) -> bool {
            self.suppress
        }
    }

    fn script() -> Script {
        let mut script = Script::default();
        script.fields.insert("city".into(), "Cairo".into());
        script.fields.insert("region".into(), "EG".into());
        script.fields.insert("blank".into(), String::new());
        script.params = vec!["P1".into(), "P2".into()];
        script
    }

    #[test]
    fn renders_in_stage_order() {
        let template = parse("{sequence}-{@yyyy}-{!n-3}-{param:1}-{$city}").unwrap();
        let mut script = script();
        let out = template.render(&mut script).unwrap();

        assert_eq!(out, "1-2025-RRR-P1-Cairo");
        assert_eq!(
            script.calls,
            vec!["field:city", "param:1", "random", "date:yyyy", "sequence:None"]
        );
    }

    #[test]
    fn conditional_picks_filled_branch() {
        let template = parse("{?{$city} ({$region})::unknown}").unwrap();
        assert_eq!(template.render(&mut script()).unwrap(), "Cairo (EG)");
    }

    #[test]
    fn conditional_picks_empty_branch_for_missing_or_blank() {
        let mut script = script();
        assert_eq!(parse("{?{$zip}::none}").unwrap().render(&mut script).unwrap(), "none");
        assert_eq!(parse("{?{$blank}::none}").unwrap().render(&mut script).unwrap(), "none");
    }

    #[test]
    fn conditional_branch_directives_run_at_their_stage() {
        let template = parse("{?{$zip}::{sequence}}-{param:2}").unwrap();
        let mut script = script();
        assert_eq!(template.render(&mut script).unwrap(), "1-P2");
        let last = script.calls.last().map(String::as_str);
        assert_eq!(last, Some("sequence:None"));
    }

    #[test]
    fn missing_field_is_an_error_unless_suppressed() {
        let template = parse("X-{$zip}").unwrap();
        assert!(matches!(
            template.render(&mut script()),
            Err(NumberingError::FieldMissing { .. })
        ));

        let mut suppressed = script();
        suppressed.suppress = true;
        assert_eq!(template.render(&mut suppressed).unwrap(), "X-");
    }

    #[test]
    fn stream_key_renders_nested_field() {
        let template = parse("{sequence:region:{$region}}").unwrap();
        let mut script = script();
        template.render(&mut script).unwrap();
        assert!(script.calls.contains(&r#"sequence:Some(("region", Some("EG")))"#.to_string()));
    }

    #[test]
    fn empty_stream_value_is_null_partition() {
        let template = parse("{sequence:region:{$blank}}").unwrap();
        let mut script = script();
        template.render(&mut script).unwrap();
        assert!(script.calls.contains(&r#"sequence:Some(("region", None))"#.to_string()));
    }

    #[test]
    fn param_index_from_field() {
        let mut script = script();
        script.fields.insert("slot".into(), "2".into());
        assert_eq!(parse("{param:{$slot}}").unwrap().render(&mut script).unwrap(), "P2");
    }

    #[test]
    fn substituted_values_are_not_reinterpreted() {
        let mut script = script();
        script.fields.insert("note".into(), "{sequence}".into());
        assert_eq!(parse("{$note}").unwrap().render(&mut script).unwrap(), "{sequence}");
        assert!(!script.calls.iter().any(|c| c.starts_with("sequence")));
    }

    #[test]
    fn rendering_twice_keeps_literal_parts() {
        let template = parse("INV-{$city}-{sequence}").unwrap();
        let mut script = script();
        let first = template.render(&mut script).unwrap();
        let second = template.render(&mut script).unwrap();
        assert_eq!(first, "INV-Cairo-1");
        assert_eq!(second, "INV-Cairo-2");
    }
}
