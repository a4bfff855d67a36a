//! Character replacement rules applied to the finished string.

use regex::Regex;

use crate::error::NumberingError;

/// Ordered `pattern,replacement` rules.
#[derive(Debug, Clone, Default)]
pub struct ReplacementRules {
    rules: Vec<(Regex, String)>,
}

impl ReplacementRules {
    /// Parses `pattern,replacement;pattern,replacement`. Empty entries
    /// between separators are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`NumberingError::ReplacementRuleInvalid`] for an entry
    /// without a comma, an empty pattern, or an invalid regex.
    pub fn parse(raw: Option<&str>) -> Result<Self, NumberingError> {
        let mut rules = Vec::new();
        for entry in raw.unwrap_or_default().split(';').filter(|e| !e.is_empty()) {
            let (pattern, replacement) = entry.split_once(',').ok_or_else(|| {
                NumberingError::ReplacementRuleInvalid(format!("'{entry}' is not 'pattern,replacement'"))
            })?;
            if pattern.is_empty() {
                return Err(NumberingError::ReplacementRuleInvalid(format!("'{entry}' has an empty pattern")));
            }
            let regex = Regex::new(pattern)
                .map_err(|e| NumberingError::ReplacementRuleInvalid(format!("'{pattern}': {e}")))?;
            rules.push((regex, replacement.to_string()));
        }
        Ok(Self { rules })
    }

    /// Applies every rule in declared order.
    #[must_use]
    pub fn apply(&self, input: &str) -> String {
        self.rules.iter().fold(input.to_string(), |text, (regex, replacement)| {
            regex.replace_all(&text, replacement.as_str()).into_owned()
        })
    }
}
