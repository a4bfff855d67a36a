//! The numbering engine: validation, locking, the uniqueness loop and commit.

mod generation;
pub mod replace;

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::Serialize;
use tracing::{debug, info, info_span, warn};

pub use generation::GenerationContext;
pub use replace::ReplacementRules;

use crate::context::ServiceContext;
use crate::error::{NumberingError, PortResultExt};
use crate::eval::field::{FieldResolver, FieldSources};
use crate::eval::param::check_count;
use crate::eval::random::RandomOptions;
use crate::model::{ConfigPatch, ConfigStatus, NumberingConfig, Record, Value};
use crate::sequence::{render_index, SequenceMode, Sequencer};
use crate::template::{self, Template};

/// Attempts made before giving up on a unique string.
pub const MAX_ATTEMPTS: u32 = 10;

/// Widest index padding a config may ask for.
pub const MAX_INDEX_PADDING: i32 = 64;

/// Where the accepted string is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Through [`crate::ports::RecordStore::update`].
    #[default]
    Store,
    /// Onto the caller's target record only.
    InPlace,
}

/// One generation request.
#[derive(Debug)]
pub struct GenerationRequest<'r> {
    /// Config to generate with.
    pub config: NumberingConfig,
    /// Record receiving the number; also the uniqueness scope.
    pub target: Option<&'r mut Record>,
    /// Full record image fields are read from; falls back to `target`.
    pub image: Option<&'r Record>,
    /// Values for `{param:N}`.
    pub params: Option<Vec<String>>,
    /// Organization the metadata cache is keyed on.
    pub organization_id: String,
    /// The triggering operation is an update.
    pub is_update: bool,
    /// The index was allocated ahead of time.
    pub is_backlogged: bool,
    /// Where to write the result.
    pub write_mode: WriteMode,
}

impl<'r> GenerationRequest<'r> {
    /// A create-time request with no target, image or parameters.
    #[must_use]
    pub fn new(config: NumberingConfig) -> Self {
        Self {
            config,
            target: None,
            image: None,
            params: None,
            organization_id: String::new(),
            is_update: false,
            is_backlogged: false,
            write_mode: WriteMode::Store,
        }
    }

    /// Sets the target record.
    #[must_use]
    pub fn target(mut self, target: &'r mut Record) -> Self {
        self.target = Some(target);
        self
    }

    /// Sets the image record.
    #[must_use]
    pub fn image(mut self, image: &'r Record) -> Self {
        self.image = Some(image);
        self
    }

    /// Sets the parameters.
    #[must_use]
    pub fn params(mut self, params: Vec<String>) -> Self {
        self.params = Some(params);
        self
    }
}

/// A committed number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedNumber {
    /// Last counter value allocated in the accepted attempt, 0 if none.
    pub index: i64,
    /// `index` with padding; empty when nothing was allocated.
    pub index_string: String,
    /// The generated string.
    pub generated: String,
}

/// Why a generation did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The config is inactive.
    Inactive,
    /// The target already carries the field.
    AlreadyNumbering,
    /// No candidate config's condition matched.
    ConditionNotMet,
}

/// Result of a generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// A number was generated and committed.
    Generated(GeneratedNumber),
    /// Nothing was done.
    Skipped {
        /// Why.
        reason: SkipReason,
    },
}

impl Outcome {
    /// Builds a skipped outcome.
    #[must_use]
    pub fn skipped(reason: SkipReason) -> Self {
        Self::Skipped { reason }
    }

    /// The generated number, if any.
    #[must_use]
    pub fn generated(&self) -> Option<&GeneratedNumber> {
        match self {
            Self::Generated(number) => Some(number),
            Self::Skipped { .. } => None,
        }
    }
}

/// Runs generations against a [`ServiceContext`].
pub struct NumberingEngine<'c> {
    ctx: &'c ServiceContext,
    seed: Option<u64>,
}

impl<'c> NumberingEngine<'c> {
    /// Creates an engine drawing randomness from the thread RNG.
    #[must_use]
    pub fn new(ctx: &'c ServiceContext) -> Self {
        Self { ctx, seed: None }
    }

    /// Makes random tokens reproducible.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Generates, validates and commits one number.
    ///
    /// # Errors
    ///
    /// Returns the first [`NumberingError`] raised; the target is left
    /// untouched and no config patch is written. Stream counters advanced
    /// before the failure stay advanced.
    pub fn generate(&self, request: GenerationRequest<'_>) -> Result<Outcome, NumberingError> {
        let span = info_span!(
            "generate",
            config = %request.config.id,
            entity = request.target.as_deref().or(request.image).map_or("", |r| r.entity.as_str()),
        );
        let _entered = span.enter();
        self.generate_in_span(request)
    }

    fn generate_in_span(&self, request: GenerationRequest<'_>) -> Result<Outcome, NumberingError> {
        let GenerationRequest {
            mut config,
            mut target,
            image,
            params,
            organization_id,
            is_update,
            is_backlogged,
            write_mode,
        } = request;

        if config.status == ConfigStatus::Inactive {
            info!("config is inactive; skipping");
            return Ok(Outcome::skipped(SkipReason::Inactive));
        }
        if let (Some(field), Some(target)) = (config.target_field(), target.as_deref()) {
            if target.get(field).is_some_and(|v| *v != Value::Null) {
                info!(field, "target already carries the field; skipping");
                return Ok(Outcome::skipped(SkipReason::AlreadyNumbering));
            }
        }

        let template = prepare(&config)?;
        check_count(&template, params.as_deref())?;
        let rules = ReplacementRules::parse(config.replacement_characters.as_deref())?;

        let validate = config.validates_uniqueness();
        let field = config.target_field().map(str::to_string);
        if validate {
            if field.is_none() {
                return Err(NumberingError::MissingUniquenessTarget("a target field"));
            }
            if target.is_none() {
                return Err(NumberingError::MissingUniquenessTarget("a target record"));
            }
        }

        let mode = SequenceMode::for_config(&config, is_backlogged);
        if mode == SequenceMode::Live && template.uses_sequence() {
            self.lock(&mut config)?;
        }

        let ctx = self.ctx;
        let zone = ctx.time_zones.zone_for(&config.owner).port("time zones")?;
        let source = lookup_record(&config, target.as_deref(), image);
        let sources = FieldSources {
            records: ctx.records.as_ref(),
            metadata: ctx.metadata.as_ref(),
            cache: &ctx.metadata_cache,
            clock: ctx.clock.as_ref(),
            organization: &organization_id,
            zone,
        };

        let mut generation = GenerationContext {
            fields: FieldResolver::new(sources, source),
            params,
            sequencer: Sequencer::new(ctx.configs.as_ref(), &config, mode, is_update, ctx.clock.now()),
            rng: self.rng(),
            random: RandomOptions {
                letter_start: config.random_letter_start.unwrap_or(false),
                max_number_run: config.max_number_run(),
            },
            clock: ctx.clock.as_ref(),
            zone,
            suppress_missing: config.is_inline(),
        };

        let generated = self.find_unique(&template, &rules, &mut generation, validate, field.as_deref(), target.as_deref())?;
        let index = generation.sequencer.last_allocated();
        let number = GeneratedNumber {
            index: index.unwrap_or(0),
            index_string: index.map(|i| render_index(i, generation.sequencer.padding())).unwrap_or_default(),
            generated,
        };

        if let Some(field) = &field {
            self.write(write_mode, target.as_deref_mut(), field, &number.generated)?;
        }
        if generation.sequencer.persists() {
            let patch = generation.sequencer.into_patch();
            if !patch.is_empty() {
                ctx.configs.save_config(&config.id, &patch).port("config store")?;
            }
        }

        info!(generated = %number.generated, index = number.index, "generated number");
        Ok(Outcome::Generated(number))
    }

    fn find_unique(
        &self,
        template: &Template,
        rules: &ReplacementRules,
        generation: &mut GenerationContext<'_>,
        validate: bool,
        field: Option<&str>,
        target: Option<&Record>,
    ) -> Result<String, NumberingError> {
        let mut last = String::new();
        for attempt in 1..=MAX_ATTEMPTS {
            generation.sequencer.begin_attempt();
            let rendered = template.render(generation)?;
            let candidate = rules.apply(&rendered);
            debug!(attempt, %rendered, %candidate, "rendered candidate");

            let (Some(field), Some(target), true) = (field, target, validate) else {
                return Ok(candidate);
            };
            let taken = self
                .ctx
                .records
                .exists_with_value(&target.entity, field, &candidate)
                .port("record store")?;
            if !taken {
                return Ok(candidate);
            }
            warn!(attempt, %candidate, "candidate already exists; retrying");
            last = candidate;
        }
        Err(NumberingError::UniquenessExhausted { last, attempts: MAX_ATTEMPTS })
    }

    /// Writes a fresh token to the config row, then re-reads its counters
    /// so this generation starts from the latest persisted state.
    fn lock(&self, config: &mut NumberingConfig) -> Result<(), NumberingError> {
        let token = self.ctx.id_gen.generate_id();
        self.ctx.configs.save_config(&config.id, &ConfigPatch::lock(token.clone())).port("config store")?;
        let fresh = self
            .ctx
            .configs
            .load_config(&config.id)
            .port("config store")?
            .ok_or_else(|| NumberingError::ConfigInvalid(format!("config '{}' no longer exists", config.id)))?;

        debug!(token = %token, current_index = ?fresh.current_index, "locked config");
        config.current_index = fresh.current_index;
        config.reset_date = fresh.reset_date;
        config.last_reset_date = fresh.last_reset_date;
        config.locking = Some(token);
        Ok(())
    }

    fn write(
        &self,
        mode: WriteMode,
        target: Option<&mut Record>,
        field: &str,
        generated: &str,
    ) -> Result<(), NumberingError> {
        let Some(target) = target else {
            return Ok(());
        };
        match mode {
            WriteMode::InPlace => target.set(field, generated),
            WriteMode::Store => {
                let fields = BTreeMap::from([(field.to_string(), Value::from(generated))]);
                self.ctx.records.update(&target.entity, &target.id, fields).port("record store")?;
            }
        }
        Ok(())
    }

    fn rng(&self) -> Box<dyn RngCore + 'static> {
        match self.seed {
            Some(seed) => Box::new(StdRng::seed_from_u64(seed)),
            None => Box::new(rand::rng()),
        }
    }
}

/// Checks the config's static invariants and parses its template.
///
/// # Errors
///
/// Returns [`NumberingError::ConfigInvalid`] for a missing format, a
/// condition without an entity, counter fields missing for a sequence,
/// padding wider than [`MAX_INDEX_PADDING`], or an unset random
/// letter-start flag; parse errors otherwise.
pub fn prepare(config: &NumberingConfig) -> Result<Template, NumberingError> {
    let format = config
        .format
        .as_deref()
        .filter(|f| !f.trim().is_empty())
        .ok_or_else(|| NumberingError::ConfigInvalid("format string is empty".into()))?;
    let template = template::parse(format)?;
    if config.is_inline() {
        return Ok(template);
    }

    if config.condition.is_some() && config.entity.is_none() {
        return Err(NumberingError::ConfigInvalid("a condition requires the config's entity".into()));
    }
    if template.uses_sequence() && (config.current_index.is_none() || config.index_padding.is_none()) {
        return Err(NumberingError::ConfigInvalid(
            "sequence requires current index and index padding".into(),
        ));
    }
    if config.index_padding.is_some_and(|padding| padding > MAX_INDEX_PADDING) {
        return Err(NumberingError::ConfigInvalid(format!(
            "index padding exceeds {MAX_INDEX_PADDING} digits"
        )));
    }
    if config.random_letter_start.is_none() {
        return Err(NumberingError::ConfigInvalid("random letter start flag is not set".into()));
    }
    Ok(template)
}

/// The record field references read from: the image, with target-only
/// fields filled in.
fn lookup_record(config: &NumberingConfig, target: Option<&Record>, image: Option<&Record>) -> Record {
    match (image, target) {
        (Some(image), Some(target)) => {
            let mut merged = image.clone();
            for (name, value) in &target.fields {
                merged.fields.entry(name.clone()).or_insert_with(|| value.clone());
            }
            for (name, label) in &target.formatted {
                merged.formatted.entry(name.clone()).or_insert_with(|| label.clone());
            }
            merged
        }
        (Some(record), None) | (None, Some(record)) => record.clone(),
        (None, None) => Record::new(config.entity.clone().unwrap_or_default(), ""),
    }
}
