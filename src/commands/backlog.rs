//! `autonum backlog` commands.

use crate::backlog;
use crate::context::ServiceContext;

use super::Output;

/// Execute `backlog allocate`: reserve the next index for `trigger`.
///
/// # Errors
///
/// Returns an error string if the config is unknown or the reservation
/// fails.
pub fn allocate(ctx: &ServiceContext, config: &str, trigger: &str, output: Output) -> Result<(), String> {
    let config = ctx
        .configs
        .find_config(config)
        .map_err(|e| format!("failed to load config '{config}': {e}"))?
        .ok_or_else(|| format!("no active config '{config}'"))?;
    let entry = backlog::allocate(ctx, &config, trigger).map_err(|e| e.to_string())?;

    if output.json {
        return output.print_json(&entry);
    }
    println!("Reserved index {} of '{}' for trigger '{}'", entry.index, entry.config_id, entry.trigger_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::adapters::memory::{FixedClock, MemoryConfigStore};
    use crate::model::NumberingConfig;

    #[test]
    fn allocate_reserves_next_index() {
        let configs = Arc::new(MemoryConfigStore::new().with(NumberingConfig {
            id: "inv".into(),
            format: Some("INV-{sequence}".into()),
            current_index: Some(2),
            ..NumberingConfig::default()
        }));
        let mut ctx = ServiceContext::in_memory(FixedClock::at("2025-01-01T00:00:00Z"));
        ctx.configs = configs.clone();

        allocate(&ctx, "inv", "t1", Output { json: false }).unwrap();
        assert_eq!(configs.backlog("inv")[0].index, 3);
        assert!(allocate(&ctx, "missing", "t2", Output { json: false }).is_err());
    }
}
