//! `{param:N}` lookups against caller-supplied parameters.

use crate::error::NumberingError;
use crate::template::Template;

/// Rejects a parameter list shorter than the set of indices the template
/// references. No parameters at all is allowed here; each directive then
/// fails on its own.
///
/// # Errors
///
/// Returns [`NumberingError::ParamCountMismatch`].
pub fn check_count(template: &Template, params: Option<&[String]>) -> Result<(), NumberingError> {
    let Some(params) = params else {
        return Ok(());
    };
    let referenced = template.param_indices().len();
    if referenced > params.len() {
        return Err(NumberingError::ParamCountMismatch { referenced, supplied: params.len() });
    }
    Ok(())
}

/// Returns the 1-based parameter `index`.
///
/// # Errors
///
/// Returns [`NumberingError::ParamIndexInvalid`] if the index is below 1,
/// past the end, or no parameters were supplied.
pub fn param(params: Option<&[String]>, index: i64) -> Result<String, NumberingError> {
    let supplied = params.map_or(0, <[String]>::len);
    let invalid = || NumberingError::ParamIndexInvalid { index, supplied };

    let params = params.ok_or_else(invalid)?;
    let slot = usize::try_from(index).ok().and_then(|i| i.checked_sub(1)).ok_or_else(invalid)?;
    params.get(slot).cloned().ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::parse;

    fn params() -> Vec<String> {
        vec!["EU".into(), "B2B".into()]
    }

    #[test]
    fn one_based_lookup() {
        let params = params();
        assert_eq!(param(Some(&params), 1).unwrap(), "EU");
        assert_eq!(param(Some(&params), 2).unwrap(), "B2B");
    }

    #[test]
    fn out_of_range_indices_are_invalid() {
        let params = params();
        for index in [0, -1, 3] {
            assert!(matches!(
                param(Some(&params), index),
                Err(NumberingError::ParamIndexInvalid { supplied: 2, .. })
            ));
        }
    }

    #[test]
    fn absent_parameters_are_invalid() {
        assert!(matches!(
            param(None, 1),
            Err(NumberingError::ParamIndexInvalid { index: 1, supplied: 0 })
        ));
    }

    #[test]
    fn count_check_uses_distinct_indices() {
        let template = parse("{param:1}-{param:1}-{param:2}").unwrap();
        let params = params();
        assert!(check_count(&template, Some(&params)).is_ok());
        assert!(check_count(&template, None).is_ok());
        assert!(matches!(
            check_count(&template, Some(&params[..1])),
            Err(NumberingError::ParamCountMismatch { referenced: 2, supplied: 1 })
        ));
    }
}
