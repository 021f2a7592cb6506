//! Assertion helpers for test cases.
//!
//! Each helper returns `Err(CaseError::Assertion)` carrying an
//! expected-versus-actual message written for the learner, so a check body is
//! a plain sequence of `?`-propagated expectations.

use crate::context::BoundContext;
use crate::error::{CallError, CaseError, CaseResult, RaisedError};
use crate::value::{format_float, PyValue};

/// Longest rendering of a value quoted in a failure message
pub const MAX_SHOWN_CHARS: usize = 200;

/// `repr`-style rendering cut to `MAX_SHOWN_CHARS`
pub fn shown(value: &PyValue) -> String {
    let text = value.to_string();
    match text.char_indices().nth(MAX_SHOWN_CHARS) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text,
    }
}

pub fn fail(message: impl Into<String>) -> CaseResult {
    Err(CaseError::Assertion(message.into()))
}

/// Numeric closeness: `|actual - expected| <= tolerance`
pub fn expect_close(actual: &PyValue, expected: f64, tolerance: f64) -> CaseResult {
    match actual.as_f64() {
        Some(value) if (value - expected).abs() <= tolerance => Ok(()),
        Some(_) => fail(format!("expected {}, got {}", format_float(expected), shown(actual))),
        None => fail(format!(
            "expected a number close to {}, got {} ({})",
            format_float(expected),
            shown(actual),
            actual.type_name()
        )),
    }
}

/// Equality with Python's numeric semantics
pub fn expect_eq(actual: &PyValue, expected: impl Into<PyValue>) -> CaseResult {
    let expected = expected.into();
    if actual.loosely_equals(&expected) {
        Ok(())
    } else {
        fail(format!("expected {}, got {}", shown(&expected), shown(actual)))
    }
}

pub fn expect_true(actual: &PyValue, what: &str) -> CaseResult {
    if actual.truthy() {
        Ok(())
    } else {
        fail(format!("expected {} to be True, got {}", what, shown(actual)))
    }
}

pub fn expect_false(actual: &PyValue, what: &str) -> CaseResult {
    if actual.truthy() {
        fail(format!("expected {} to be False, got {}", what, shown(actual)))
    } else {
        Ok(())
    }
}

pub fn expect_contains(haystack: &str, needle: &str) -> CaseResult {
    if haystack.contains(needle) {
        Ok(())
    } else {
        fail(format!(
            "expected {} to contain {}",
            shown(&PyValue::from(haystack)),
            shown(&PyValue::from(needle))
        ))
    }
}

/// Checks the Python type name of a returned value (`"str"`, `"list"`, ...)
pub fn expect_type(actual: &PyValue, type_name: &str) -> CaseResult {
    if actual.type_name() == type_name {
        Ok(())
    } else {
        fail(format!(
            "expected a value of type {}, got {} ({})",
            type_name,
            shown(actual),
            actual.type_name()
        ))
    }
}

/// `isinstance(obj, class)` evaluated against the submission's own classes
pub async fn expect_instance(ctx: &mut BoundContext, obj: &PyValue, class: &str) -> CaseResult {
    if ctx.is_instance(obj, class).await? {
        Ok(())
    } else {
        fail(format!("expected an instance of {}, got {}", class, shown(obj)))
    }
}

/// Expects the call to have raised `class` (or a subclass of it)
///
/// Any other exception propagates unchanged and is reported as an error.
pub fn expect_raises(
    result: Result<PyValue, CallError>,
    class: &str,
) -> Result<RaisedError, CaseError> {
    match result {
        Ok(value) => Err(CaseError::Assertion(format!(
            "expected {} to be raised, but the call returned {}",
            class,
            shown(&value)
        ))),
        Err(CallError::Raised(raised)) if raised.is_instance_of(class) => Ok(raised),
        Err(other) => Err(other.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(result: CaseResult) -> String {
        match result {
            Err(CaseError::Assertion(msg)) => msg,
            other => panic!("expected an assertion failure, got {:?}", other),
        }
    }

    #[test]
    fn test_expect_close_messages() {
        assert!(expect_close(&PyValue::Float(42.5000001), 42.5, 1e-6).is_ok());
        assert!(expect_close(&PyValue::Int(42), 42.0, 1e-6).is_ok());

        let msg = message(expect_close(&PyValue::Int(0), 42.5, 1e-6));
        assert_eq!(msg, "expected 42.5, got 0");

        let msg = message(expect_close(&PyValue::None, 42.5, 1e-6));
        assert_eq!(msg, "expected a number close to 42.5, got None (NoneType)");
    }

    #[test]
    fn test_expect_eq_uses_numeric_semantics() {
        assert!(expect_eq(&PyValue::Float(58.0), 58).is_ok());
        assert!(expect_eq(&PyValue::Str("pilne".into()), "pilne").is_ok());

        let msg = message(expect_eq(&PyValue::Str("norma".into()), "pilne"));
        assert_eq!(msg, "expected 'pilne', got 'norma'");
    }

    #[test]
    fn test_truthiness_helpers() {
        assert!(expect_true(&PyValue::Bool(true), "czy_opłacalne(20000)").is_ok());
        assert!(expect_false(&PyValue::Bool(false), "czy_opłacalne(50000)").is_ok());

        let msg = message(expect_true(&PyValue::Bool(false), "czy_opłacalne(20000)"));
        assert_eq!(msg, "expected czy_opłacalne(20000) to be True, got False");
    }

    #[test]
    fn test_expect_contains_and_type() {
        assert!(expect_contains("Pole: Testowe (5.0 ha)", "Testowe").is_ok());
        let msg = message(expect_contains("<object>", "Pole:"));
        assert_eq!(msg, "expected '<object>' to contain 'Pole:'");

        assert!(expect_type(&PyValue::Str("dużo".into()), "str").is_ok());
        let msg = message(expect_type(&PyValue::Int(3), "str"));
        assert_eq!(msg, "expected a value of type str, got 3 (int)");
    }

    #[test]
    fn test_long_values_are_cut_in_messages() {
        let huge = PyValue::Str("x".repeat(30_000));
        let msg = message(expect_close(&huge, 42.5, 1e-6));
        assert!(msg.starts_with("expected a number close to 42.5, got 'xxx"));
        assert!(msg.ends_with("… (str)"), "{}", msg);
        assert!(msg.chars().count() < MAX_SHOWN_CHARS + 50);

        let msg = message(expect_eq(&PyValue::Str("ż".repeat(500)), "pilne"));
        assert_eq!(msg.chars().filter(|c| *c == 'ż').count(), MAX_SHOWN_CHARS - 1);
        assert!(msg.ends_with('…'));

        assert_eq!(shown(&PyValue::Int(3)), "3");
    }

    #[test]
    fn test_expect_raises() {
        let raised = RaisedError {
            kind: "ValueError".to_string(),
            message: "plon nie może być ujemny".to_string(),
            mro: vec!["ValueError".into(), "Exception".into(), "BaseException".into(), "object".into()],
            line: Some(12),
            exception: None,
        };

        let caught = expect_raises(Err(CallError::Raised(raised.clone())), "ValueError").unwrap();
        assert_eq!(caught.message, "plon nie może być ujemny");
        assert!(expect_raises(Err(CallError::Raised(raised.clone())), "Exception").is_ok());

        match expect_raises(Err(CallError::Raised(raised)), "TypeError") {
            Err(CaseError::Raised(other)) => assert_eq!(other.kind, "ValueError"),
            other => panic!("unexpected: {:?}", other),
        }

        match expect_raises(Ok(PyValue::None), "ValueError") {
            Err(CaseError::Assertion(msg)) => {
                assert_eq!(msg, "expected ValueError to be raised, but the call returned None")
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
