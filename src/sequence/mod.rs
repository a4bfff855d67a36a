//! Counter allocation for `{sequence}` directives.
//!
//! A [`Sequencer`] owns the working counter state for one generation.
//! The global counter is staged in a [`ConfigPatch`] that the caller
//! flushes once; stream counters are written as soon as they advance.
//! Within one attempt each counter or stream allocates at most once;
//! repeated directives render the same value. Every attempt moves the
//! working state forward, so a retried attempt never reuses a value.

pub mod reset;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::{NumberingError, PortResultExt};
use crate::model::{ConfigPatch, NumberingConfig, Stream};
use crate::ports::ConfigStore;
use reset::{ResetOutcome, ResetState};

/// Zero-pads an index to `padding` digits.
#[must_use]
pub fn render_index(index: i64, padding: usize) -> String {
    format!("{index:0padding$}")
}

/// The next counter value.
///
/// A non-positive counter starts at 1. Updates keep the current value
/// unless the config opts into incrementing on update.
#[must_use]
pub fn next_index(current: i64, is_update: bool, increment_on_update: bool) -> i64 {
    if current <= 0 {
        1
    } else if is_update && !increment_on_update {
        current
    } else {
        current + 1
    }
}

/// How a generation treats counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceMode {
    /// Ad hoc config: sequences render empty and nothing is persisted.
    Inline,
    /// The index was allocated ahead of time and is used as-is.
    Backlogged,
    /// Normal allocation.
    Live,
}

impl SequenceMode {
    /// Picks the mode for a config.
    #[must_use]
    pub fn for_config(config: &NumberingConfig, is_backlogged: bool) -> Self {
        if config.is_inline() {
            Self::Inline
        } else if is_backlogged {
            Self::Backlogged
        } else {
            Self::Live
        }
    }
}

type StreamKey = (String, Option<String>);

/// Working counter state for one generation.
pub struct Sequencer<'a> {
    configs: &'a dyn ConfigStore,
    config_id: String,
    mode: SequenceMode,
    now: DateTime<Utc>,
    is_update: bool,
    increment_on_update: bool,
    padding: usize,
    current_index: i64,
    reset: ResetState,
    attempt_reset: Option<Option<i64>>,
    attempt_indices: HashMap<Option<StreamKey>, i64>,
    streams: HashMap<StreamKey, Stream>,
    patch: ConfigPatch,
    last_allocated: Option<i64>,
}

impl<'a> Sequencer<'a> {
    /// Starts from the config's persisted counter state.
    #[must_use]
    pub fn new(
        configs: &'a dyn ConfigStore,
        config: &NumberingConfig,
        mode: SequenceMode,
        is_update: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            configs,
            config_id: config.id.clone(),
            mode,
            now,
            is_update,
            increment_on_update: config.increment_on_update,
            padding: config.padding(),
            current_index: config.current_index.unwrap_or(0),
            reset: ResetState::from_config(config),
            attempt_reset: None,
            attempt_indices: HashMap::new(),
            streams: HashMap::new(),
            patch: ConfigPatch::default(),
            last_allocated: None,
        }
    }

    /// Forgets the previous attempt's reset decision and allocations.
    pub fn begin_attempt(&mut self) {
        self.attempt_reset = None;
        self.attempt_indices.clear();
        self.last_allocated = None;
    }

    /// Allocates the next value of the global counter or of a stream.
    ///
    /// Asking again for the same counter or stream within an attempt
    /// returns the value already allocated. Returns `None` for inline
    /// configs.
    ///
    /// # Errors
    ///
    /// Returns [`NumberingError::Port`] if a stream cannot be loaded,
    /// created or saved.
    pub fn next(&mut self, stream: Option<(&str, Option<&str>)>) -> Result<Option<i64>, NumberingError> {
        let index = match self.mode {
            SequenceMode::Inline => return Ok(None),
            SequenceMode::Backlogged => self.current_index,
            SequenceMode::Live => {
                let key = stream.map(|(field, value)| (field.to_string(), value.map(str::to_string)));
                if let Some(&index) = self.attempt_indices.get(&key) {
                    self.last_allocated = Some(index);
                    return Ok(Some(index));
                }
                let reset_to = self.reset_for_attempt();
                let index = match stream {
                    None => {
                        let index = reset_to.unwrap_or_else(|| {
                            next_index(self.current_index, self.is_update, self.increment_on_update)
                        });
                        self.current_index = index;
                        self.patch.current_index = Some(index);
                        index
                    }
                    Some((field, value)) => self.advance_stream(field, value, reset_to)?,
                };
                self.attempt_indices.insert(key, index);
                index
            }
        };

        debug!(config = %self.config_id, ?stream, index, "allocated index");
        self.last_allocated = Some(index);
        Ok(Some(index))
    }

    /// Allocates and renders with padding; inline configs render empty.
    ///
    /// # Errors
    ///
    /// See [`Sequencer::next`].
    pub fn render(&mut self, stream: Option<(&str, Option<&str>)>) -> Result<String, NumberingError> {
        Ok(self.next(stream)?.map(|index| render_index(index, self.padding)).unwrap_or_default())
    }

    /// Last value allocated in the current attempt.
    #[must_use]
    pub fn last_allocated(&self) -> Option<i64> {
        self.last_allocated
    }

    /// Padding width.
    #[must_use]
    pub fn padding(&self) -> usize {
        self.padding
    }

    /// Whether the staged patch must be written back.
    #[must_use]
    pub fn persists(&self) -> bool {
        self.mode == SequenceMode::Live
    }

    /// The staged config patch.
    #[must_use]
    pub fn into_patch(self) -> ConfigPatch {
        self.patch
    }

    fn reset_for_attempt(&mut self) -> Option<i64> {
        if let Some(decided) = self.attempt_reset {
            return decided;
        }
        let decided = match self.reset.check(self.now) {
            ResetOutcome::Unchanged => None,
            ResetOutcome::ClearDate => {
                self.patch.reset_date = Some(None);
                None
            }
            ResetOutcome::Fired { value, fired_at, next_date } => {
                info!(config = %self.config_id, %fired_at, %next_date, value, "counter reset");
                self.patch.last_reset_date = Some(Some(fired_at));
                self.patch.reset_date = Some(Some(next_date));
                Some(value)
            }
        };
        self.attempt_reset = Some(decided);
        decided
    }

    fn advance_stream(
        &mut self,
        field: &str,
        value: Option<&str>,
        reset_to: Option<i64>,
    ) -> Result<i64, NumberingError> {
        let key = (field.to_string(), value.map(str::to_string));
        let mut stream = match self.streams.remove(&key) {
            Some(stream) => stream,
            None => self.load_or_create_stream(field, value)?,
        };

        let index = reset_to
            .unwrap_or_else(|| next_index(stream.current_index, self.is_update, self.increment_on_update));
        stream.current_index = index;
        self.configs.save_stream(&stream).port("config store")?;
        self.streams.insert(key, stream);
        Ok(index)
    }

    fn load_or_create_stream(&self, field: &str, value: Option<&str>) -> Result<Stream, NumberingError> {
        if let Some(stream) = self.configs.load_stream(&self.config_id, field, value).port("config store")? {
            return Ok(stream);
        }
        let mut stream = Stream::new(&self.config_id, field, value);
        stream.id = self.configs.create_stream(&stream).port("config store")?;
        debug!(config = %self.config_id, field, ?value, id = %stream.id, "created stream");
        Ok(stream)
    }
}
