//! Choosing which config a generation runs with.

use tracing::debug;

use crate::backlog;
use crate::context::ServiceContext;
use crate::error::{NumberingError, PortResultExt};
use crate::eval::field::{FieldResolver, FieldSources};
use crate::eval::random::RandomSpec;
use crate::model::{NumberingConfig, Record};
use crate::template::{self, FieldPath, Resolver};

/// Where the config comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// `format;;field[;;validate[;;replacements]]`.
    Inline(String),
    /// Config ids or names, tried in order.
    Candidates(Vec<String>),
    /// The config behind a back-log reservation for this trigger id.
    Backlog(String),
}

/// A chosen config and how to run it.
#[derive(Debug, Clone, PartialEq)]
pub struct Selected {
    /// Config to generate with.
    pub config: NumberingConfig,
    /// Its current index was reserved ahead of time.
    pub is_backlogged: bool,
}

/// Picks the config for a generation. `Ok(None)` means every candidate
/// carried a condition and none of them matched `target`.
///
/// # Errors
///
/// Returns [`NumberingError::ConfigInvalid`] for malformed inline strings,
/// an empty or unknown candidate list, or a missing reservation; field and
/// port errors from evaluating conditions.
pub fn select(
    ctx: &ServiceContext,
    source: &ConfigSource,
    target: Option<&Record>,
    owner: &str,
    organization_id: &str,
) -> Result<Option<Selected>, NumberingError> {
    match source {
        ConfigSource::Inline(raw) => {
            let config = NumberingConfig::parse_inline(raw, owner)?;
            Ok(Some(Selected { config, is_backlogged: false }))
        }
        ConfigSource::Backlog(trigger_id) => {
            let config = backlog::claim(ctx, trigger_id)?.ok_or_else(|| {
                NumberingError::ConfigInvalid(format!("no index reserved for trigger '{trigger_id}'"))
            })?;
            Ok(Some(Selected { config, is_backlogged: true }))
        }
        ConfigSource::Candidates(candidates) => {
            select_candidate(ctx, candidates, target, organization_id).map(|found| {
                found.map(|config| Selected { config, is_backlogged: false })
            })
        }
    }
}

fn select_candidate(
    ctx: &ServiceContext,
    candidates: &[String],
    target: Option<&Record>,
    organization_id: &str,
) -> Result<Option<NumberingConfig>, NumberingError> {
    let mut found_any = false;
    for candidate in candidates {
        let Some(config) = ctx.configs.find_config(candidate).port("config store")? else {
            debug!(candidate = %candidate, "no active config");
            continue;
        };
        found_any = true;

        let Some(condition) = config.condition.as_deref() else {
            return Ok(Some(config));
        };
        if condition_holds(ctx, &config, condition, target, organization_id)? {
            return Ok(Some(config));
        }
        debug!(config = %config.id, "condition not met");
    }

    if found_any {
        Ok(None)
    } else {
        Err(NumberingError::ConfigInvalid(format!("no active config among {candidates:?}")))
    }
}

fn condition_holds(
    ctx: &ServiceContext,
    config: &NumberingConfig,
    condition: &str,
    target: Option<&Record>,
    organization_id: &str,
) -> Result<bool, NumberingError> {
    let Some(target) = target else {
        return Ok(false);
    };
    let entity = config
        .entity
        .as_deref()
        .ok_or_else(|| NumberingError::ConfigInvalid("a condition requires the config's entity".into()))?;
    if entity != target.entity {
        return Ok(false);
    }

    let zone = ctx.time_zones.zone_for(&config.owner).port("time zones")?;
    let sources = FieldSources {
        records: ctx.records.as_ref(),
        metadata: ctx.metadata.as_ref(),
        cache: &ctx.metadata_cache,
        clock: ctx.clock.as_ref(),
        organization: organization_id,
        zone,
    };
    let mut fields = ConditionFields { fields: FieldResolver::new(sources, target.clone()) };
    let rendered = template::parse(condition)?.render(&mut fields)?;

    ctx.records.matches_condition(entity, &target.id, &rendered).port("record store")
}

/// Renders `{$field}` placeholders in a condition; other directives are
/// rejected.
struct ConditionFields<'a> {
    fields: FieldResolver<'a>,
}

impl ConditionFields<'_> {
    fn reject(kind: &str) -> NumberingError {
        NumberingError::malformed(format!("{{{kind}}}"), "only field references are allowed in conditions")
    }
}

impl Resolver for ConditionFields<'_> {
    fn field(&mut self, path: &FieldPath, _suppress: bool) -> Result<Option<String>, NumberingError> {
        self.fields.resolve(path, true)
    }

    fn param(&mut self, _index: i64) -> Result<String, NumberingError> {
        Err(Self::reject("param"))
    }

    fn random(&mut self, _spec: &RandomSpec) -> Result<String, NumberingError> {
        Err(Self::reject("random"))
    }

    fn date(&mut self, _format: &str) -> Result<String, NumberingError> {
        Err(Self::reject("date"))
    }

    fn sequence(&mut self, _stream: Option<(&str, Option<&str>)>) -> Result<String, NumberingError> {
        Err(Self::reject("sequence"))
    }

    fn suppress_missing_fields(&self) -> bool {
        true
    }
}
