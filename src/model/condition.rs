//! Simple record filters used by the bundled stores.
//!
//! A condition is a `;`-separated list of clauses, all of which must hold:
//! `field=value`, `field!=value`, `field` (present and non-empty) or
//! `!field` (absent or empty).

use super::record::Record;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Clause {
    Equals(String, String),
    NotEquals(String, String),
    Filled(String),
    Empty(String),
}

/// A parsed filter condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    clauses: Vec<Clause>,
}

impl Condition {
    /// Parses a condition string.
    ///
    /// # Errors
    ///
    /// Returns a message naming the clause that has no field name.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let mut clauses = Vec::new();
        for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let clause = if let Some((field, value)) = part.split_once("!=") {
                Clause::NotEquals(field.trim().to_string(), value.trim().to_string())
            } else if let Some((field, value)) = part.split_once('=') {
                Clause::Equals(field.trim().to_string(), value.trim().to_string())
            } else if let Some(field) = part.strip_prefix('!') {
                Clause::Empty(field.trim().to_string())
            } else {
                Clause::Filled(part.to_string())
            };

            let field = match &clause {
                Clause::Equals(f, _) | Clause::NotEquals(f, _) | Clause::Filled(f) | Clause::Empty(f) => f,
            };
            if field.is_empty() {
                return Err(format!("condition clause '{part}' has no field"));
            }
            clauses.push(clause);
        }
        Ok(Self { clauses })
    }

    /// Returns `true` when every clause holds for `record`.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        let text = |field: &str| record.get(field).map(ToString::to_string).unwrap_or_default();
        self.clauses.iter().all(|clause| match clause {
            Clause::Equals(field, value) => text(field) == *value,
            Clause::NotEquals(field, value) => text(field) != *value,
            Clause::Filled(field) => !text(field).is_empty(),
            Clause::Empty(field) => text(field).is_empty(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Value;

    fn record() -> Record {
        Record::new("case", "c1")
            .with("origin", "email")
            .with("priority", Value::Integer(2))
            .with("notes", Value::Null)
    }

    #[test]
    fn all_clauses_must_hold() {
        let condition = Condition::parse("origin=email; priority!=3").unwrap();
        assert!(condition.matches(&record()));

        let condition = Condition::parse("origin=email; priority=3").unwrap();
        assert!(!condition.matches(&record()));
    }

    #[test]
    fn presence_clauses() {
        assert!(Condition::parse("origin; !notes; !missing").unwrap().matches(&record()));
        assert!(!Condition::parse("notes").unwrap().matches(&record()));
    }

    #[test]
    fn empty_condition_matches_everything() {
        assert!(Condition::parse("").unwrap().matches(&record()));
    }

    #[test]
    fn rejects_clause_without_field() {
        assert!(Condition::parse("=email").is_err());
    }
}
