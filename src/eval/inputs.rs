//! Input providers and external value decoding.
use crate::error::EvalError;
use crate::value::Value;
use std::collections::{BTreeMap, HashMap};

/// One named set of externally supplied values.
pub type InputSet = BTreeMap<String, Value>;

/// A source of externally supplied values, consulted by key.
///
/// Providers are ordered; the first one returning a present value for a key
/// wins. `Sync` so scenario batches can evaluate on worker threads.
pub trait InputProvider: Sync {
    fn get(&self, key: &str) -> Option<Value>;
}

impl InputProvider for InputSet {
    fn get(&self, key: &str) -> Option<Value> {
        BTreeMap::get(self, key).cloned()
    }
}

impl InputProvider for HashMap<String, Value> {
    fn get(&self, key: &str) -> Option<Value> {
        HashMap::get(self, key).cloned()
    }
}

/// Walks the provider chain; first present value wins.
pub fn resolve(providers: &[&dyn InputProvider], key: &str) -> Option<Value> {
    providers.iter().find_map(|p| p.get(key))
}

/// Decodes a raw external value into the engine's value model.
///
/// Numbers pass through. Arrays and objects pass through unconverted for
/// later aggregation or iteration. Strings must hold JSON (an array, object,
/// or number) or a plain numeric literal; anything else is a decode error.
pub fn decode(key: &str, raw: Value) -> Result<Value, EvalError> {
    match raw {
        Value::Number(_) | Value::Array(_) | Value::Object(_) => Ok(raw),
        Value::Text(s) => decode_text(key, &s),
    }
}

fn decode_text(key: &str, s: &str) -> Result<Value, EvalError> {
    match serde_json::from_str::<serde_json::Value>(s) {
        Ok(json @ serde_json::Value::Array(_))
        | Ok(json @ serde_json::Value::Object(_))
        | Ok(json @ serde_json::Value::Number(_)) => Ok(Value::from_json(json)),
        Ok(_) => Err(EvalError::InputDecode {
            key: key.to_string(),
            msg: format!("'{}' is not a number, array, or object", s),
        }),
        Err(_) => s.trim().parse::<f64>().map(Value::Number).map_err(|_| {
            EvalError::InputDecode {
                key: key.to_string(),
                msg: format!("'{}' is neither valid JSON nor numeric", s),
            }
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("42", Value::Number(42.0))]
    #[case("  3.5 ", Value::Number(3.5))]
    #[case("[1,2]", Value::Array(vec![Value::Number(1.0), Value::Number(2.0)]))]
    fn test_decode_accepts(#[case] raw: &str, #[case] expected: Value) {
        let got = decode("k", Value::Text(raw.to_string())).unwrap();
        assert_eq!(got, expected);
    }

    #[rstest]
    #[case("not a number")]
    #[case("\"quoted\"")]
    #[case("true")]
    #[case("{broken")]
    fn test_decode_rejects(#[case] raw: &str) {
        let err = decode("k", Value::Text(raw.to_string())).unwrap_err();
        assert!(matches!(err, EvalError::InputDecode { .. }), "got {:?}", err);
    }

    #[test]
    fn test_decode_object_string() {
        let got = decode("k", Value::Text(r#"{"qty": 2}"#.to_string())).unwrap();
        match got {
            Value::Object(map) => assert_eq!(map["qty"], Value::Number(2.0)),
            other => panic!("expected object, got {:?}", other),
        }
    }

    #[test]
    fn test_provider_chain_first_wins() {
        let mut a = InputSet::new();
        a.insert("x".into(), Value::Number(1.0));
        let mut b = InputSet::new();
        b.insert("x".into(), Value::Number(2.0));
        b.insert("y".into(), Value::Number(3.0));

        let providers: Vec<&dyn InputProvider> = vec![&a, &b];
        assert_eq!(resolve(&providers, "x"), Some(Value::Number(1.0)));
        assert_eq!(resolve(&providers, "y"), Some(Value::Number(3.0)));
        assert_eq!(resolve(&providers, "z"), None);
    }
}
