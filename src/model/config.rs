//! Numbering configuration and the staged counter patch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::NumberingError;

/// How often the counter returns to its reset value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetInterval {
    /// Never reset.
    #[default]
    Never,
    /// Reset exactly once, at the reset date.
    Once,
    /// Reset every day from the reset date.
    Daily,
    /// Reset every month from the reset date.
    Monthly,
    /// Reset every year from the reset date.
    Yearly,
}

/// Whether a config participates in generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigStatus {
    /// Generation runs.
    #[default]
    Active,
    /// Generation is skipped.
    Inactive,
}

/// A numbering rule: template, target field, counter and reset policy.
///
/// A config with an empty `id` is *inline*: it was supplied ad hoc by the
/// caller and none of its counter state is ever persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumberingConfig {
    /// Row id; empty for inline configs.
    #[serde(default)]
    pub id: String,
    /// Human-readable name, also usable for lookup.
    #[serde(default)]
    pub name: String,
    /// Format template.
    #[serde(default)]
    pub format: Option<String>,
    /// Field the generated string is written to.
    #[serde(default)]
    pub field: Option<String>,
    /// Entity the config applies to; required when `condition` is set.
    #[serde(default)]
    pub entity: Option<String>,
    /// Owner whose time zone is used for dates.
    #[serde(default)]
    pub owner: String,
    /// Whether to check the result for uniqueness; `None` means yes.
    #[serde(default)]
    pub validate_unique: Option<bool>,
    /// `pattern,replacement;pattern,replacement` rules applied last.
    #[serde(default)]
    pub replacement_characters: Option<String>,
    /// Reset policy.
    #[serde(default)]
    pub reset_interval: ResetInterval,
    /// Next moment the counter resets.
    #[serde(default)]
    pub reset_date: Option<DateTime<Utc>>,
    /// Reset date that last fired.
    #[serde(default)]
    pub last_reset_date: Option<DateTime<Utc>>,
    /// Value the counter takes when a reset fires.
    #[serde(default)]
    pub reset_index: Option<i64>,
    /// Zero-padding width for the rendered index.
    #[serde(default)]
    pub index_padding: Option<i32>,
    /// Current counter value.
    #[serde(default)]
    pub current_index: Option<i64>,
    /// Advance the counter on updates too.
    #[serde(default)]
    pub increment_on_update: bool,
    /// Random tokens must start with a letter.
    #[serde(default)]
    pub random_letter_start: Option<bool>,
    /// Maximum run of digits in random tokens; `None` or -1 disables.
    #[serde(default)]
    pub number_letter_ratio: Option<i32>,
    /// Active or inactive.
    #[serde(default)]
    pub status: ConfigStatus,
    /// Filter the target must satisfy for this config to apply.
    #[serde(default)]
    pub condition: Option<String>,
    /// Minutes after which an unclaimed back-log entry may be reused.
    #[serde(default)]
    pub backlog_threshold: Option<i64>,
    /// Trigger id requesting a back-log allocation.
    #[serde(default)]
    pub trigger_id: Option<String>,
    /// Last locking token written before reading the counter.
    #[serde(default)]
    pub locking: Option<String>,
}

impl NumberingConfig {
    /// Returns `true` for ad hoc configs that are never persisted.
    #[must_use]
    pub fn is_inline(&self) -> bool {
        self.id.is_empty()
    }

    /// Whether the generated string must be unique.
    #[must_use]
    pub fn validates_uniqueness(&self) -> bool {
        self.validate_unique != Some(false)
    }

    /// The target field, trimmed; `None` when unset or blank.
    #[must_use]
    pub fn target_field(&self) -> Option<&str> {
        self.field.as_deref().map(str::trim).filter(|f| !f.is_empty())
    }

    /// Padding width, with negative values treated as zero.
    #[must_use]
    pub fn padding(&self) -> usize {
        self.index_padding.and_then(|p| usize::try_from(p).ok()).unwrap_or(0)
    }

    /// Maximum consecutive digits in random tokens, `None` when unconstrained.
    #[must_use]
    pub fn max_number_run(&self) -> Option<usize> {
        self.number_letter_ratio.and_then(|r| usize::try_from(r).ok())
    }

    /// Parses an inline config of the form
    /// `format;;field[;;validate[;;replacements]]`.
    ///
    /// # Errors
    ///
    /// Returns [`NumberingError::ConfigInvalid`] when the format or field
    /// is missing.
    pub fn parse_inline(raw: &str, owner: &str) -> Result<Self, NumberingError> {
        let parts: Vec<&str> =
            raw.split(";;").map(str::trim).filter(|part| !part.is_empty()).collect();

        if parts.len() < 2 {
            return Err(NumberingError::ConfigInvalid(format!(
                "inline config '{raw}' is missing one of the config params"
            )));
        }

        Ok(Self {
            format: Some(parts[0].to_string()),
            field: Some(parts[1].to_string()),
            validate_unique: Some(parts.get(2).is_some_and(|v| *v == "true")),
            replacement_characters: parts.get(3).map(|r| (*r).to_string()),
            owner: owner.to_string(),
            ..Self::default()
        })
    }
}

/// Counter fields staged during a generation and written back once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigPatch {
    /// New counter value, if a global index was allocated.
    pub current_index: Option<i64>,
    /// New reset date; `None` inside `Some` clears it.
    pub reset_date: Option<Option<DateTime<Utc>>>,
    /// New last-reset date.
    pub last_reset_date: Option<Option<DateTime<Utc>>>,
    /// Locking token.
    pub locking: Option<String>,
}

impl ConfigPatch {
    /// A patch carrying only a locking token.
    #[must_use]
    pub fn lock(token: String) -> Self {
        Self { locking: Some(token), ..Self::default() }
    }

    /// Returns `true` when the patch would change nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current_index.is_none()
            && self.reset_date.is_none()
            && self.last_reset_date.is_none()
            && self.locking.is_none()
    }

    /// Applies the staged fields onto `config`.
    pub fn apply_to(&self, config: &mut NumberingConfig) {
        if let Some(index) = self.current_index {
            config.current_index = Some(index);
        }
        if let Some(date) = self.reset_date {
            config.reset_date = date;
        }
        if let Some(date) = self.last_reset_date {
            config.last_reset_date = date;
        }
        if let Some(token) = &self.locking {
            config.locking = Some(token.clone());
        }
    }
}
