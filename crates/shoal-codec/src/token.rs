//! Wire tokens for individual field values.
//!
//! | Token | Value |
//! |---|---|
//! | `null` | [`Value::Null`] |
//! | `undefined` | [`Value::Undefined`] |
//! | `true` / `false` | [`Value::Bool`] |
//! | all digits | [`Value::Int`] (base 10, no sign, fraction or exponent) |
//! | `'...'` | [`Value::Str`] (no escape processing) |
//! | `<...>` | [`Value::Ref`] |
//!
//! Rules are tried in that order and the first match wins, so `07` is
//! always the integer 7. Anything else is [`CodecError::UnrecognizedToken`].

use crate::error::{CodecError, CodecResult};
use crate::value::{Reference, Value};

/// Decode one wire token.
pub fn decode(token: &str) -> CodecResult<Value> {
    match token {
        "null" => return Ok(Value::Null),
        "undefined" => return Ok(Value::Undefined),
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        _ => {}
    }

    if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
        return token
            .parse::<u64>()
            .map(Value::Int)
            .map_err(|_| CodecError::IntegerOutOfRange(token.to_string()));
    }

    if let Some(inner) = delimited(token, '\'', '\'') {
        return Ok(Value::Str(inner.to_string()));
    }

    if let Some(inner) = delimited(token, '<', '>') {
        return Ok(Value::Ref(Reference::new(inner)));
    }

    Err(CodecError::UnrecognizedToken(token.to_string()))
}

/// Encode one value as its wire token.
pub fn encode(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Undefined => "undefined".to_string(),
        Value::Bool(true) => "true".to_string(),
        Value::Bool(false) => "false".to_string(),
        Value::Int(n) => n.to_string(),
        Value::Str(s) => format!("'{s}'"),
        Value::Ref(r) => format!("<{}>", r.target()),
    }
}

fn delimited(token: &str, open: char, close: char) -> Option<&str> {
    if token.len() < 2 {
        return None;
    }
    token.strip_prefix(open)?.strip_suffix(close)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use shoal_types::ObjectId;

    #[test]
    fn literal_roundtrips() {
        for value in [
            Value::Null,
            Value::Undefined,
            Value::Bool(true),
            Value::Bool(false),
            Value::Int(0),
            Value::Int(42),
            Value::Str("hello".into()),
        ] {
            assert_eq!(decode(&encode(&value)).unwrap(), value);
        }
    }

    #[test]
    fn encoded_forms() {
        assert_eq!(encode(&Value::Str("hello".into())), "'hello'");
        assert_eq!(encode(&Value::Int(42)), "42");
        assert_eq!(encode(&Value::Undefined), "undefined");
    }

    #[test]
    fn reference_token() {
        let value = decode("<abc-123>").unwrap();
        assert_eq!(value, Value::Ref(Reference::new("abc-123")));
        assert_eq!(value.as_reference().map(Reference::target), Some("abc-123"));
    }

    #[test]
    fn reference_to_object_roundtrips() {
        let id = ObjectId::generate();
        let token = encode(&Value::from(id));
        assert_eq!(token, format!("<{id}>"));
        let decoded = decode(&token).unwrap();
        assert_eq!(decoded.as_reference().and_then(Reference::target_id), Some(id));
    }

    #[test]
    fn leading_zero_digits_are_integers() {
        assert_eq!(decode("07").unwrap(), Value::Int(7));
        assert_eq!(decode("000").unwrap(), Value::Int(0));
    }

    #[test]
    fn unrecognized_tokens_fail() {
        for bad in ["nope", "", "-1", "1.5", "1e3", "'", "<", "'abc", "abc'", "<abc", "NULL"] {
            assert_eq!(
                decode(bad),
                Err(CodecError::UnrecognizedToken(bad.to_string())),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn integer_overflow_is_an_error() {
        let err = decode("18446744073709551616").unwrap_err();
        assert!(matches!(err, CodecError::IntegerOutOfRange(_)));
        assert_eq!(decode("18446744073709551615").unwrap(), Value::Int(u64::MAX));
    }

    #[test]
    fn strings_are_not_escaped() {
        assert_eq!(decode("'it's'").unwrap(), Value::Str("it's".into()));
        assert_eq!(decode("''").unwrap(), Value::Str(String::new()));
        assert_eq!(decode("'null'").unwrap(), Value::Str("null".into()));
    }

    #[test]
    fn quoted_digits_stay_strings() {
        assert_eq!(decode("'42'").unwrap(), Value::Str("42".into()));
    }

    proptest! {
        #[test]
        fn integers_roundtrip(n in any::<u64>()) {
            let value = Value::Int(n);
            prop_assert_eq!(decode(&encode(&value)).unwrap(), value);
        }

        #[test]
        fn strings_roundtrip(s in ".*") {
            let value = Value::Str(s);
            prop_assert_eq!(decode(&encode(&value)).unwrap(), value);
        }

        #[test]
        fn references_roundtrip(target in "[^>]*") {
            let value = Value::Ref(Reference::new(target));
            prop_assert_eq!(decode(&encode(&value)).unwrap(), value);
        }
    }
}
