//! Indices reserved ahead of time for a trigger id.
//!
//! Allocation happens before the record exists; a later generation claims
//! the reserved index and runs back-logged, using it verbatim.

use chrono::Duration;
use tracing::{debug, info};

use crate::context::ServiceContext;
use crate::error::{NumberingError, PortResultExt};
use crate::model::{BacklogEntry, NumberingConfig};
use crate::sequence::{SequenceMode, Sequencer};

/// Reserves an index for `trigger_id`.
///
/// With a back-log threshold, the lowest-index entry untouched for that
/// many minutes is handed over to the new trigger. Otherwise the config's
/// counter advances (resets included) and the patch is saved.
///
/// # Errors
///
/// Returns [`NumberingError::ConfigInvalid`] for inline or vanished
/// configs or an out-of-range threshold, and [`NumberingError::Port`] for store failures.
pub fn allocate(
    ctx: &ServiceContext,
    config: &NumberingConfig,
    trigger_id: &str,
) -> Result<BacklogEntry, NumberingError> {
    if config.is_inline() {
        return Err(NumberingError::ConfigInvalid("inline configs cannot reserve indices".into()));
    }
    let now = ctx.clock.now();

    if let Some(threshold) = config.backlog_threshold {
        let older_than = Duration::try_minutes(threshold)
            .and_then(|age| now.checked_sub_signed(age))
            .ok_or_else(|| NumberingError::ConfigInvalid("backlog threshold out of range".into()))?;
        if let Some(stale) = ctx.configs.find_stale_backlog(&config.id, older_than).port("config store")? {
            info!(config = %config.id, from = %stale.trigger_id, to = trigger_id, index = stale.index, "reusing stale back-log entry");
            let entry = BacklogEntry { trigger_id: trigger_id.to_string(), modified_on: now, ..stale };
            ctx.configs.upsert_backlog(&entry).port("config store")?;
            return Ok(entry);
        }
    }

    let fresh = ctx
        .configs
        .load_config(&config.id)
        .port("config store")?
        .ok_or_else(|| NumberingError::ConfigInvalid(format!("config '{}' not found", config.id)))?;
    let mut sequencer = Sequencer::new(ctx.configs.as_ref(), &fresh, SequenceMode::Live, false, now);
    let index = sequencer.next(None)?.unwrap_or_default();
    ctx.configs.save_config(&config.id, &sequencer.into_patch()).port("config store")?;

    let entry = BacklogEntry {
        id: String::new(),
        trigger_id: trigger_id.to_string(),
        config_id: config.id.clone(),
        index,
        modified_on: now,
    };
    ctx.configs.upsert_backlog(&entry).port("config store")?;
    debug!(config = %config.id, trigger_id, index, "reserved back-log index");
    Ok(entry)
}

/// Removes the entry for `trigger_id` and returns its config with the
/// reserved index as the current index. `None` when nothing is reserved.
///
/// # Errors
///
/// Returns [`NumberingError::ConfigInvalid`] if the entry's config is
/// gone and [`NumberingError::Port`] for store failures.
pub fn claim(ctx: &ServiceContext, trigger_id: &str) -> Result<Option<NumberingConfig>, NumberingError> {
    let Some(entry) = ctx.configs.take_backlog(trigger_id).port("config store")? else {
        return Ok(None);
    };
    let mut config = ctx
        .configs
        .load_config(&entry.config_id)
        .port("config store")?
        .ok_or_else(|| NumberingError::ConfigInvalid(format!("config '{}' not found", entry.config_id)))?;
    config.current_index = Some(entry.index);
    debug!(config = %config.id, trigger_id, index = entry.index, "claimed back-log index");
    Ok(Some(config))
}
