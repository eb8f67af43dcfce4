//! Pure threshold evaluation for notification rules.
//!
//! `evaluate` is total over every rule kind: a value that cannot be coerced
//! for a numeric comparison is a non-match, never an error, so one malformed
//! attribute cannot abort evaluation of the rest of a reading.

use crate::models::{AttributeValue, RuleCondition};

// ---

/// Decide whether `value` matches `condition`.
///
/// Numeric kinds coerce the value to f64 first (booleans as 1.0/0.0,
/// numeric strings parsed). `range` is inclusive on both bounds. `equal_to`
/// compares booleans by their case-insensitive string form so a textual
/// "True" matches a boolean `true`; everything else compares numerically.
pub fn evaluate(condition: &RuleCondition, value: &AttributeValue) -> bool {
    // ---
    match condition {
        RuleCondition::Range { min, max } => value
            .as_f64()
            .is_some_and(|v| *min <= v && v <= *max),
        RuleCondition::GreaterThan { value: threshold } => {
            value.as_f64().is_some_and(|v| v > *threshold)
        }
        RuleCondition::LessThan { value: threshold } => {
            value.as_f64().is_some_and(|v| v < *threshold)
        }
        RuleCondition::EqualTo { value: expected } => equals(expected, value),
        RuleCondition::None => false,
    }
}

/// Equality with the boolean special case: if either side is a boolean the
/// comparison happens on lowercase string forms, otherwise both sides must
/// coerce to f64 and compare equal.
fn equals(expected: &AttributeValue, actual: &AttributeValue) -> bool {
    // ---
    if expected.is_bool() || actual.is_bool() {
        return expected.to_string().to_lowercase() == actual.to_string().to_lowercase();
    }

    match (expected.as_f64(), actual.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn num(v: f64) -> AttributeValue {
        AttributeValue::Number(v)
    }

    fn text(s: &str) -> AttributeValue {
        AttributeValue::Text(s.to_string())
    }

    #[test]
    fn range_is_inclusive_on_both_bounds() {
        // ---
        let cond = RuleCondition::Range {
            min: 10.0,
            max: 40.0,
        };

        assert!(evaluate(&cond, &num(10.0)));
        assert!(evaluate(&cond, &num(40.0)));
        assert!(evaluate(&cond, &num(25.0)));
        assert!(!evaluate(&cond, &num(9.999)));
        assert!(!evaluate(&cond, &num(40.001)));
    }

    #[test]
    fn greater_and_less_than_are_strict() {
        // ---
        let gt = RuleCondition::GreaterThan { value: 30.0 };
        assert!(evaluate(&gt, &num(30.1)));
        assert!(!evaluate(&gt, &num(30.0)));

        let lt = RuleCondition::LessThan { value: 5.0 };
        assert!(evaluate(&lt, &num(4.9)));
        assert!(!evaluate(&lt, &num(5.0)));
    }

    #[test]
    fn equal_to_bool_compares_case_insensitive_strings() {
        // ---
        let cond = RuleCondition::EqualTo {
            value: AttributeValue::Bool(true),
        };

        assert!(evaluate(&cond, &AttributeValue::Bool(true)));
        assert!(evaluate(&cond, &text("true")));
        assert!(evaluate(&cond, &text("True")));
        assert!(evaluate(&cond, &text("TRUE")));
        assert!(!evaluate(&cond, &AttributeValue::Bool(false)));
        assert!(!evaluate(&cond, &text("false")));
    }

    #[test]
    fn equal_to_numbers_after_coercion() {
        // ---
        let cond = RuleCondition::EqualTo { value: num(7.0) };

        assert!(evaluate(&cond, &num(7.0)));
        assert!(evaluate(&cond, &text("7")));
        assert!(!evaluate(&cond, &num(7.1)));
        assert!(!evaluate(&cond, &text("seven")));
    }

    #[test]
    fn coercion_failure_is_a_non_match() {
        // ---
        let gt = RuleCondition::GreaterThan { value: 30.0 };
        assert!(!evaluate(&gt, &text("not a number")));

        let range = RuleCondition::Range {
            min: 0.0,
            max: 100.0,
        };
        assert!(!evaluate(&range, &text("offline")));
    }

    #[test]
    fn bools_coerce_for_numeric_kinds() {
        // ---
        let gt = RuleCondition::GreaterThan { value: 0.5 };
        assert!(evaluate(&gt, &AttributeValue::Bool(true)));
        assert!(!evaluate(&gt, &AttributeValue::Bool(false)));
    }

    #[test]
    fn none_never_fires() {
        // ---
        assert!(!evaluate(&RuleCondition::None, &num(1.0)));
        assert!(!evaluate(&RuleCondition::None, &AttributeValue::Bool(true)));
        assert!(!evaluate(&RuleCondition::None, &text("anything")));
    }
}
