//! `autonum generate`, `autonum inline` and `autonum preview` commands.

use crate::cli::TargetArgs;
use crate::context::ServiceContext;
use crate::engine::{GenerationRequest, NumberingEngine, Outcome, SkipReason, WriteMode};
use crate::model::{NumberingConfig, Record};
use crate::select::{self, ConfigSource};

use super::Output;

/// Execute `generate` or `inline`: select a config, generate and store
/// the number on the target record.
///
/// # Errors
///
/// Returns an error string if the target cannot be loaded, selection
/// fails, or the generation fails.
pub fn run(
    ctx: &ServiceContext,
    source: &ConfigSource,
    owner: &str,
    args: &TargetArgs,
    output: Output,
) -> Result<(), String> {
    let mut target = load_target(ctx, args)?;
    let selected = select::select(ctx, source, target.as_ref(), owner, &args.org).map_err(|e| e.to_string())?;
    let Some(selected) = selected else {
        return print_outcome(&Outcome::skipped(SkipReason::ConditionNotMet), output);
    };

    let mut request = build_request(selected.config, args);
    request.is_backlogged = selected.is_backlogged;
    request.target = target.as_mut();

    let outcome = engine(ctx, args.seed).generate(request).map_err(|e| e.to_string())?;
    print_outcome(&outcome, output)
}

/// Execute `preview`: generate against a sandbox so no counter, stream
/// or record is written.
///
/// # Errors
///
/// Returns an error string if the config is unknown, the target cannot
/// be loaded, or the generation fails.
pub fn preview(ctx: &ServiceContext, config: &str, args: &TargetArgs, output: Output) -> Result<(), String> {
    let config = ctx
        .configs
        .find_config(config)
        .map_err(|e| format!("failed to load config '{config}': {e}"))?
        .ok_or_else(|| format!("no active config '{config}'"))?;
    let sandbox = ctx.sandbox(config.clone()).map_err(|e| format!("failed to prepare preview: {e}"))?;

    let mut target = load_target(ctx, args)?;
    let mut request = build_request(config, args);
    request.write_mode = WriteMode::InPlace;
    request.target = target.as_mut();

    let outcome = engine(&sandbox, args.seed).generate(request).map_err(|e| e.to_string())?;
    print_outcome(&outcome, output)
}

fn build_request<'r>(config: NumberingConfig, args: &TargetArgs) -> GenerationRequest<'r> {
    let mut request = GenerationRequest::new(config);
    request.params = (!args.params.is_empty()).then(|| args.params.clone());
    request.organization_id.clone_from(&args.org);
    request.is_update = args.update;
    request
}

fn engine(ctx: &ServiceContext, seed: Option<u64>) -> NumberingEngine<'_> {
    let engine = NumberingEngine::new(ctx);
    match seed {
        Some(seed) => engine.with_seed(seed),
        None => engine,
    }
}

fn load_target(ctx: &ServiceContext, args: &TargetArgs) -> Result<Option<Record>, String> {
    let (Some(entity), Some(id)) = (&args.entity, &args.id) else {
        return Ok(None);
    };
    ctx.records
        .get(entity, id, None)
        .map(Some)
        .map_err(|e| format!("failed to load {entity}/{id}: {e}"))
}

fn print_outcome(outcome: &Outcome, output: Output) -> Result<(), String> {
    if output.json {
        return output.print_json(outcome);
    }
    match outcome {
        Outcome::Generated(number) => println!("{}", number.generated),
        Outcome::Skipped { reason } => println!("Skipped: {}", describe(*reason)),
    }
    Ok(())
}

fn describe(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::Inactive => "config is inactive",
        SkipReason::AlreadyNumbering => "target already has a number",
        SkipReason::ConditionNotMet => "no config condition matched",
    }
}
