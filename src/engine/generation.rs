//! Per-generation state handed to the template renderer.

use chrono_tz::Tz;
use rand::RngCore;

use crate::error::NumberingError;
use crate::eval::date::current_date;
use crate::eval::field::FieldResolver;
use crate::eval::param::param;
use crate::eval::random::{generate, RandomOptions, RandomSpec};
use crate::ports::Clock;
use crate::sequence::Sequencer;
use crate::template::{FieldPath, Resolver};

/// Everything one generation needs to evaluate directives.
///
/// Lives for a single call to the engine; nothing here outlives it.
pub struct GenerationContext<'a> {
    pub(crate) fields: FieldResolver<'a>,
    pub(crate) params: Option<Vec<String>>,
    pub(crate) sequencer: Sequencer<'a>,
    pub(crate) rng: Box<dyn RngCore + 'a>,
    pub(crate) random: RandomOptions,
    pub(crate) clock: &'a dyn Clock,
    pub(crate) zone: Tz,
    pub(crate) suppress_missing: bool,
}

impl Resolver for GenerationContext<'_> {
    fn field(&mut self, path: &FieldPath, suppress: bool) -> Result<Option<String>, NumberingError> {
        self.fields.resolve(path, suppress)
    }

    fn param(&mut self, index: i64) -> Result<String, NumberingError> {
        param(self.params.as_deref(), index)
    }

    fn random(&mut self, spec: &RandomSpec) -> Result<String, NumberingError> {
        generate(spec.length, &spec.source, self.random, &mut *self.rng)
    }

    fn date(&mut self, format: &str) -> Result<String, NumberingError> {
        Ok(current_date(self.clock, self.zone, format))
    }

    fn sequence(&mut self, stream: Option<(&str, Option<&str>)>) -> Result<String, NumberingError> {
        self.sequencer.render(stream)
    }

    fn suppress_missing_fields(&self) -> bool {
        self.suppress_missing
    }
}
