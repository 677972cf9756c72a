//! Rule evaluation for `condition` nodes.

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Logic {
    #[default]
    And,
    Or,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
    IsSet,
    IsNotSet,
}

/// Evaluate one rule.
///
/// `actual` is the resolved field value, `None` when the field is unset.
/// Text comparisons ignore case and surrounding whitespace; `equals` compares
/// numerically when both sides are numbers.
pub fn evaluate(
    actual: Option<&str>,
    operator: Operator,
    expected: Option<&str>,
) -> bool {
    let actual = actual.map(str::trim).filter(|s| !s.is_empty());
    match operator {
        Operator::IsSet => actual.is_some(),
        Operator::IsNotSet => actual.is_none(),
        Operator::NotEquals => !evaluate(actual, Operator::Equals, expected),
        Operator::NotContains => !evaluate(actual, Operator::Contains, expected),
        _ => {
            let (Some(actual), Some(expected)) = (actual, expected.map(str::trim)) else {
                return false;
            };
            let (a, e) = (actual.to_lowercase(), expected.to_lowercase());
            match operator {
                Operator::Equals => match (number(actual), number(expected)) {
                    (Some(x), Some(y)) => x == y,
                    _ => a == e,
                },
                Operator::Contains => a.contains(&e),
                Operator::StartsWith => a.starts_with(&e),
                Operator::EndsWith => a.ends_with(&e),
                Operator::GreaterThan => cmp_numbers(actual, expected, |x, y| x > y),
                Operator::LessThan => cmp_numbers(actual, expected, |x, y| x < y),
                _ => false,
            }
        }
    }
}

/// Fold rule results with `logic`. No rules is `true` for `and` and `false` for `or`.
pub fn combine(
    logic: Logic,
    results: impl IntoIterator<Item = bool>,
) -> bool {
    let mut results = results.into_iter();
    match logic {
        Logic::And => results.all(|r| r),
        Logic::Or => results.any(|r| r),
    }
}

fn number(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn cmp_numbers<F>(
    actual: &str,
    expected: &str,
    cmp: F,
) -> bool
where
    F: Fn(f64, f64) -> bool,
{
    match (number(actual), number(expected)) {
        (Some(a), Some(e)) => cmp(a, e),
        _ => false,
    }
}
