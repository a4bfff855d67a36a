//! Random token generation for `{!...}` directives.
//!
//! Tokens draw from symbol groups: the built-in classes (`u` upper, `l`
//! lower, `n` digits) or an explicit comma-separated pool where each
//! group is one weighted choice. Every character first picks a group
//! uniformly, then a symbol within it.

use rand::Rng;

use crate::error::NumberingError;

const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWER: &str = "abcdefghijklmnopqrstuvwxyz";
const DIGITS: &str = "0123456789";

/// A built-in symbol class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolClass {
    /// `A`-`Z`.
    Upper,
    /// `a`-`z`.
    Lower,
    /// `0`-`9`.
    Number,
}

impl SymbolClass {
    fn from_flag(flag: char) -> Option<Self> {
        match flag {
            'u' => Some(Self::Upper),
            'l' => Some(Self::Lower),
            'n' => Some(Self::Number),
            _ => None,
        }
    }

    fn symbols(self) -> &'static str {
        match self {
            Self::Upper => UPPER,
            Self::Lower => LOWER,
            Self::Number => DIGITS,
        }
    }
}

/// Where random symbols come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolSource {
    /// Built-in classes, e.g. from `uln`.
    Classes(Vec<SymbolClass>),
    /// Explicit groups, e.g. from `AB,xy,0`.
    Pool(Vec<String>),
}

impl SymbolSource {
    fn groups(&self) -> Vec<Vec<char>> {
        match self {
            Self::Classes(classes) => classes.iter().map(|c| c.symbols().chars().collect()).collect(),
            Self::Pool(groups) => groups.iter().map(|g| g.chars().collect()).collect(),
        }
    }
}

/// A parsed random directive body: `<symbols>-<length>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomSpec {
    /// Symbol source.
    pub source: SymbolSource,
    /// Token length.
    pub length: usize,
}

impl RandomSpec {
    /// Parses `uln-8` or `A,B,C-8`.
    ///
    /// A symbol part made only of `u`, `l` and `n` selects classes; anything
    /// else is a comma-separated pool.
    ///
    /// # Errors
    ///
    /// Returns a reason string when the body has no length, a non-positive
    /// length, or no symbols.
    pub fn parse(body: &str) -> Result<Self, String> {
        let (symbols, length) = body
            .rsplit_once('-')
            .ok_or_else(|| format!("expected '<symbols>-<length>', got '{body}'"))?;
        let length: usize =
            length.trim().parse().map_err(|_| format!("length '{length}' is not a number"))?;
        if length == 0 {
            return Err("length must be positive".to_string());
        }
        if symbols.is_empty() {
            return Err("no symbols given".to_string());
        }

        let source = if symbols.chars().all(|c| SymbolClass::from_flag(c).is_some()) {
            let mut classes = Vec::new();
            for class in symbols.chars().filter_map(SymbolClass::from_flag) {
                if !classes.contains(&class) {
                    classes.push(class);
                }
            }
            SymbolSource::Classes(classes)
        } else {
            let groups: Vec<String> = symbols.split(',').map(str::to_string).collect();
            if groups.iter().any(String::is_empty) {
                return Err(format!("empty group in symbol pool '{symbols}'"));
            }
            SymbolSource::Pool(groups)
        };

        Ok(Self { source, length })
    }
}

/// Constraints applied while generating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RandomOptions {
    /// The first character must be alphabetic.
    pub letter_start: bool,
    /// Longest allowed run of consecutive digits; `None` is unlimited.
    pub max_number_run: Option<usize>,
}

/// Generates a token of exactly `length` characters.
///
/// The digit-run limit only applies when the source has non-digit symbols
/// to fall back on.
///
/// # Errors
///
/// Returns [`NumberingError::InvalidRandomSpec`] for a zero length, an
/// empty source, or a letter start with no letters available.
pub fn generate<R: Rng + ?Sized>(
    length: usize,
    source: &SymbolSource,
    options: RandomOptions,
    rng: &mut R,
) -> Result<String, NumberingError> {
    if length == 0 {
        return Err(NumberingError::InvalidRandomSpec("length must be positive".into()));
    }
    let groups = source.groups();
    if groups.is_empty() || groups.iter().any(Vec::is_empty) {
        return Err(NumberingError::InvalidRandomSpec("symbol source is empty".into()));
    }

    let letters = filter_groups(&groups, |c| c.is_alphabetic());
    let non_digits = filter_groups(&groups, |c| !c.is_ascii_digit());
    if options.letter_start && letters.is_empty() {
        return Err(NumberingError::InvalidRandomSpec(
            "letter start requested but the source has no letters".into(),
        ));
    }

    let mut token = String::with_capacity(length);
    let mut digit_run = 0usize;
    for position in 0..length {
        let run_capped = options.max_number_run.is_some_and(|max| digit_run >= max);
        let allowed = if position == 0 && options.letter_start {
            &letters
        } else if run_capped && !non_digits.is_empty() {
            &non_digits
        } else {
            &groups
        };

        let group = &allowed[rng.random_range(0..allowed.len())];
        let symbol = group[rng.random_range(0..group.len())];
        digit_run = if symbol.is_ascii_digit() { digit_run + 1 } else { 0 };
        token.push(symbol);
    }
    Ok(token)
}

fn filter_groups(groups: &[Vec<char>], keep: impl Fn(char) -> bool) -> Vec<Vec<char>> {
    groups
        .iter()
        .map(|g| g.iter().copied().filter(|c| keep(*c)).collect::<Vec<char>>())
        .filter(|g| !g.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn parses_class_flags() {
        let spec = RandomSpec::parse("unu-8").unwrap();
        assert_eq!(spec.length, 8);
        assert_eq!(spec.source, SymbolSource::Classes(vec![SymbolClass::Upper, SymbolClass::Number]));
    }

    #[test]
    fn parses_custom_pool() {
        let spec = RandomSpec::parse("AB,xy,7-5").unwrap();
        assert_eq!(spec.source, SymbolSource::Pool(vec!["AB".into(), "xy".into(), "7".into()]));
    }

    #[test]
    fn rejects_degenerate_specs() {
        assert!(RandomSpec::parse("uln").is_err());
        assert!(RandomSpec::parse("uln-0").is_err());
        assert!(RandomSpec::parse("uln-x").is_err());
        assert!(RandomSpec::parse("-4").is_err());
        assert!(RandomSpec::parse("A,,B-4").is_err());
    }

    #[test]
    fn generate_rejects_zero_length_and_empty_pool() {
        let mut rng = StdRng::seed_from_u64(1);
        let source = SymbolSource::Classes(vec![SymbolClass::Upper]);
        assert!(generate(0, &source, RandomOptions::default(), &mut rng).is_err());
        let empty = SymbolSource::Pool(Vec::new());
        assert!(generate(4, &empty, RandomOptions::default(), &mut rng).is_err());
    }

    #[test]
    fn letter_start_needs_letters() {
        let mut rng = StdRng::seed_from_u64(1);
        let digits = SymbolSource::Classes(vec![SymbolClass::Number]);
        let options = RandomOptions { letter_start: true, max_number_run: None };
        assert!(matches!(
            generate(4, &digits, options, &mut rng),
            Err(NumberingError::InvalidRandomSpec(_))
        ));
    }

    #[test]
    fn zero_run_excludes_digits_when_letters_exist() {
        let mut rng = StdRng::seed_from_u64(3);
        let source = SymbolSource::Classes(vec![SymbolClass::Upper, SymbolClass::Number]);
        let options = RandomOptions { letter_start: false, max_number_run: Some(0) };
        let token = generate(64, &source, options, &mut rng).unwrap();
        assert!(token.chars().all(|c| c.is_ascii_uppercase()));
    }

    #[test]
    fn run_limit_ignored_for_digit_only_source() {
        let mut rng = StdRng::seed_from_u64(3);
        let source = SymbolSource::Classes(vec![SymbolClass::Number]);
        let options = RandomOptions { letter_start: false, max_number_run: Some(1) };
        let token = generate(6, &source, options, &mut rng).unwrap();
        assert!(token.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn every_group_shows_up() {
        let mut rng = StdRng::seed_from_u64(11);
        let source = SymbolSource::Pool(vec!["X".into(), "y".into(), "5".into()]);
        let token = generate(200, &source, RandomOptions::default(), &mut rng).unwrap();
        assert!(token.contains('X') && token.contains('y') && token.contains('5'));
    }

    fn longest_digit_run(token: &str) -> usize {
        token
            .split(|c: char| !c.is_ascii_digit())
            .map(str::len)
            .max()
            .unwrap_or(0)
    }

    proptest! {
        #[test]
        fn tokens_respect_length_and_constraints(
            length in 1usize..40,
            max_run in 0usize..4,
            seed in any::<u64>(),
        ) {
            let mut rng = StdRng::seed_from_u64(seed);
            let source = SymbolSource::Classes(vec![SymbolClass::Lower, SymbolClass::Number]);
            let options = RandomOptions { letter_start: true, max_number_run: Some(max_run) };
            let token = generate(length, &source, options, &mut rng).unwrap();

            prop_assert_eq!(token.chars().count(), length);
            prop_assert!(token.chars().next().is_some_and(|c| c.is_ascii_lowercase()));
            prop_assert!(token.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
            prop_assert!(longest_digit_run(&token) <= max_run);
        }
    }
}
