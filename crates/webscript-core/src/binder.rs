//! Request argument collection and parameter binding.
//!
//! Arguments arrive by name from the query string, a form-encoded body, or a
//! structured body decoded by a media-type formatter, with later sources
//! overriding earlier ones. Trusted override entries sit above all of them
//! and cannot be shadowed by anything the caller sent.
//!
//! Binding walks the declared parameters in order. Query and form values are
//! always strings, so a parameter whose declared default is a plain literal
//! lends its type: `"5"` becomes `5` for a numeric parameter. Parameters with
//! no literal default take their value verbatim. Absent optional parameters
//! are bound as engine `undefined`, never `null`, so declared defaults still
//! apply.

use std::collections::BTreeMap;

use serde_json::{Map, Number, Value as JsonValue};

use crate::error::{Result, WebscriptError};
use crate::formatter::{content_type_essence, MediaTypeFormatterManager};
use crate::runtime::signature::{FunctionSignature, Param, TypeTag};

/// The request pieces argument collection needs, already detached from any
/// transport type.
#[derive(Debug, Clone, Default)]
pub struct RequestParts {
    pub query: Option<String>,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// Named arguments for one invocation: caller-supplied values plus trusted
/// overrides that always win.
#[derive(Debug, Clone, Default)]
pub struct RequestArguments {
    values: BTreeMap<String, JsonValue>,
    overrides: BTreeMap<String, JsonValue>,
}

impl RequestArguments {
    /// Collect arguments from the query string and body. Body fields replace
    /// query fields of the same name. A structured body that does not decode
    /// to an object contributes nothing, as does an unrecognized content
    /// type; a body that fails to decode is an error.
    pub fn from_parts(
        parts: &RequestParts,
        formatters: &MediaTypeFormatterManager,
    ) -> Result<Self> {
        let mut args = RequestArguments::default();

        if let Some(query) = parts.query.as_deref() {
            for (name, value) in form_urlencoded::parse(query.as_bytes()) {
                args.values
                    .insert(name.into_owned(), JsonValue::String(value.into_owned()));
            }
        }

        if let Some(content_type) = parts.content_type.as_deref() {
            if !parts.body.is_empty() {
                if content_type_essence(content_type) == "application/x-www-form-urlencoded" {
                    for (name, value) in form_urlencoded::parse(&parts.body) {
                        args.values
                            .insert(name.into_owned(), JsonValue::String(value.into_owned()));
                    }
                } else if let Some(formatter) =
                    formatters.formatter_for_content_type(content_type)
                {
                    if let JsonValue::Object(map) = formatter.deserialize(&parts.body)? {
                        args.values.extend(map);
                    }
                }
            }
        }

        Ok(args)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: JsonValue) {
        self.values.insert(name.into(), value);
    }

    /// Pin `name` to a trusted value. Request-supplied entries of the same
    /// name are ignored from here on, whichever order they arrived in.
    pub fn override_value(&mut self, name: impl Into<String>, value: JsonValue) {
        self.overrides.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&JsonValue> {
        self.overrides.get(name).or_else(|| self.values.get(name))
    }

    /// Effective argument map with overrides applied on top.
    pub fn merged(&self) -> BTreeMap<String, JsonValue> {
        let mut merged = self.values.clone();
        for (name, value) in &self.overrides {
            merged.insert(name.clone(), value.clone());
        }
        merged
    }
}

impl From<Map<String, JsonValue>> for RequestArguments {
    fn from(map: Map<String, JsonValue>) -> Self {
        let mut args = RequestArguments::default();
        args.values.extend(map);
        args
    }
}

/// Arguments as handed to the dispatcher: named for HTTP requests, positional
/// for direct invocations.
#[derive(Debug, Clone)]
pub enum InvokeArgs {
    Named(RequestArguments),
    Positional(Vec<JsonValue>),
}

/// One bound argument slot.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    Value(JsonValue),
    /// Left unset so the engine applies the declared default.
    Undefined,
}

pub type BoundCallArguments = Vec<BoundValue>;

/// Bind `args` to `signature`, producing the positional slots for the call.
pub fn bind(signature: &FunctionSignature, args: &InvokeArgs) -> Result<BoundCallArguments> {
    match args {
        InvokeArgs::Named(named) => bind_named(signature, named),
        InvokeArgs::Positional(values) => bind_positional(signature, values),
    }
}

fn bind_named(
    signature: &FunctionSignature,
    named: &RequestArguments,
) -> Result<BoundCallArguments> {
    let mut remaining = named.merged();
    let mut bound = Vec::with_capacity(signature.params.len() + 1);

    for param in &signature.params {
        match remaining.remove(&param.name) {
            Some(value) => bound.push(BoundValue::Value(coerce(param, value)?)),
            None if param.is_required() => {
                return Err(WebscriptError::MissingArgument(param.name.clone()));
            }
            None => bound.push(BoundValue::Undefined),
        }
    }

    if signature.catch_all.is_some() {
        // the aggregate is always passed, empty or not, as a single object
        let extras: Map<String, JsonValue> = remaining.into_iter().collect();
        bound.push(BoundValue::Value(JsonValue::Object(extras)));
    }

    Ok(bound)
}

fn bind_positional(
    signature: &FunctionSignature,
    values: &[JsonValue],
) -> Result<BoundCallArguments> {
    for (index, param) in signature.params.iter().enumerate() {
        if param.is_required() && index >= values.len() {
            return Err(WebscriptError::MissingArgument(param.name.clone()));
        }
    }
    Ok(values.iter().cloned().map(BoundValue::Value).collect())
}

/// Nudge `value` toward the type suggested by the parameter's literal
/// default. `null` always passes; parameters without a literal default
/// receive their value verbatim.
fn coerce(param: &Param, value: JsonValue) -> Result<JsonValue> {
    let Some(tag) = param.type_tag() else {
        return Ok(value);
    };
    if value.is_null() {
        return Ok(value);
    }
    match tag {
        TypeTag::Number => coerce_number(param, value),
        TypeTag::Boolean => coerce_boolean(param, value),
        TypeTag::String => coerce_string(param, value),
        TypeTag::Array if value.is_array() => Ok(value),
        TypeTag::Object if value.is_object() => Ok(value),
        TypeTag::Array | TypeTag::Object => Err(coercion_error(param, tag, &value)),
    }
}

fn coerce_number(param: &Param, value: JsonValue) -> Result<JsonValue> {
    match value {
        JsonValue::Number(_) => Ok(value),
        JsonValue::String(ref s) => {
            let trimmed = s.trim();
            if let Ok(i) = trimmed.parse::<i64>() {
                return Ok(JsonValue::Number(Number::from(i)));
            }
            if let Ok(f) = trimmed.parse::<f64>() {
                if let Some(n) = Number::from_f64(f) {
                    return Ok(JsonValue::Number(n));
                }
            }
            Err(coercion_error(param, TypeTag::Number, &value))
        }
        _ => Err(coercion_error(param, TypeTag::Number, &value)),
    }
}

fn coerce_boolean(param: &Param, value: JsonValue) -> Result<JsonValue> {
    match value {
        JsonValue::Bool(_) => Ok(value),
        JsonValue::String(ref s) => {
            let trimmed = s.trim();
            if trimmed.eq_ignore_ascii_case("true") || trimmed == "1" {
                Ok(JsonValue::Bool(true))
            } else if trimmed.eq_ignore_ascii_case("false") || trimmed == "0" {
                Ok(JsonValue::Bool(false))
            } else {
                Err(coercion_error(param, TypeTag::Boolean, &value))
            }
        }
        _ => Err(coercion_error(param, TypeTag::Boolean, &value)),
    }
}

fn coerce_string(param: &Param, value: JsonValue) -> Result<JsonValue> {
    match value {
        JsonValue::String(_) => Ok(value),
        JsonValue::Number(ref n) => Ok(JsonValue::String(n.to_string())),
        JsonValue::Bool(b) => Ok(JsonValue::String(b.to_string())),
        _ => Err(coercion_error(param, TypeTag::String, &value)),
    }
}

fn coercion_error(param: &Param, tag: TypeTag, value: &JsonValue) -> WebscriptError {
    WebscriptError::ArgumentCoercion {
        name: param.name.clone(),
        expected: tag.name(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::signature::scan_signatures;
    use serde_json::json;

    fn sig(source: &str) -> FunctionSignature {
        scan_signatures(source).remove(0)
    }

    fn formatters() -> MediaTypeFormatterManager {
        MediaTypeFormatterManager::default()
    }

    #[test]
    fn test_collect_from_query() {
        let parts = RequestParts {
            query: Some("a=1&b=hello%20there".into()),
            ..Default::default()
        };
        let args = RequestArguments::from_parts(&parts, &formatters()).unwrap();
        assert_eq!(args.get("a"), Some(&json!("1")));
        assert_eq!(args.get("b"), Some(&json!("hello there")));
    }

    #[test]
    fn test_form_body_overrides_query() {
        let parts = RequestParts {
            query: Some("a=query&keep=yes".into()),
            content_type: Some("application/x-www-form-urlencoded".into()),
            body: b"a=body".to_vec(),
        };
        let args = RequestArguments::from_parts(&parts, &formatters()).unwrap();
        assert_eq!(args.get("a"), Some(&json!("body")));
        assert_eq!(args.get("keep"), Some(&json!("yes")));
    }

    #[test]
    fn test_json_body_merges_typed_fields() {
        let parts = RequestParts {
            query: Some("a=query".into()),
            content_type: Some("application/json; charset=utf-8".into()),
            body: br#"{"a": 5, "list": [1, 2]}"#.to_vec(),
        };
        let args = RequestArguments::from_parts(&parts, &formatters()).unwrap();
        assert_eq!(args.get("a"), Some(&json!(5)));
        assert_eq!(args.get("list"), Some(&json!([1, 2])));
    }

    #[test]
    fn test_non_object_body_contributes_nothing() {
        let parts = RequestParts {
            content_type: Some("application/json".into()),
            body: b"[1, 2, 3]".to_vec(),
        };
        let args = RequestArguments::from_parts(&parts, &formatters()).unwrap();
        assert_eq!(args.merged().len(), 0);
    }

    #[test]
    fn test_unknown_content_type_is_ignored() {
        let parts = RequestParts {
            content_type: Some("application/octet-stream".into()),
            body: vec![0xde, 0xad],
        };
        assert!(RequestArguments::from_parts(&parts, &formatters()).is_ok());
    }

    #[test]
    fn test_undecodable_body_is_an_error() {
        let parts = RequestParts {
            content_type: Some("application/json".into()),
            body: b"{not json".to_vec(),
        };
        let err = RequestArguments::from_parts(&parts, &formatters()).unwrap_err();
        assert_eq!(err.kind(), "JsonError");
    }

    #[test]
    fn test_override_wins_in_both_orders() {
        let mut args = RequestArguments::default();
        args.insert("user", json!("mallory"));
        args.override_value("user", json!("alice"));
        assert_eq!(args.get("user"), Some(&json!("alice")));

        let mut args = RequestArguments::default();
        args.override_value("user", json!("alice"));
        args.insert("user", json!("mallory"));
        assert_eq!(args.get("user"), Some(&json!("alice")));
        assert_eq!(args.merged().get("user"), Some(&json!("alice")));
    }

    #[test]
    fn test_bind_coerces_strings_by_literal_default() {
        let signature = sig("function add(a = 0, b = 0) { return a + b; }");
        let mut args = RequestArguments::default();
        args.insert("a", json!("5"));
        args.insert("b", json!("7.5"));
        let bound = bind(&signature, &InvokeArgs::Named(args)).unwrap();
        assert_eq!(
            bound,
            vec![
                BoundValue::Value(json!(5)),
                BoundValue::Value(json!(7.5)),
            ]
        );
    }

    #[test]
    fn test_bind_boolean_string_forms() {
        let signature = sig("function f(on = false) {}");
        for (raw, expected) in [("true", true), ("1", true), ("FALSE", false), ("0", false)] {
            let mut args = RequestArguments::default();
            args.insert("on", json!(raw));
            let bound = bind(&signature, &InvokeArgs::Named(args)).unwrap();
            assert_eq!(bound, vec![BoundValue::Value(json!(expected))]);
        }
    }

    #[test]
    fn test_bind_rejects_unparseable_number() {
        let signature = sig("function f(n = 0) {}");
        let mut args = RequestArguments::default();
        args.insert("n", json!("abc"));
        let err = bind(&signature, &InvokeArgs::Named(args)).unwrap_err();
        assert_eq!(err.kind(), "ArgumentCoercionError");
        assert!(err.to_string().contains('n'));
    }

    #[test]
    fn test_bind_null_passes_any_tag() {
        let signature = sig("function f(n = 0) {}");
        let mut args = RequestArguments::default();
        args.insert("n", json!(null));
        let bound = bind(&signature, &InvokeArgs::Named(args)).unwrap();
        assert_eq!(bound, vec![BoundValue::Value(json!(null))]);
    }

    #[test]
    fn test_bind_untagged_param_passes_verbatim() {
        let signature = sig("function f(v = compute()) {}");
        let mut args = RequestArguments::default();
        args.insert("v", json!("37"));
        let bound = bind(&signature, &InvokeArgs::Named(args)).unwrap();
        assert_eq!(bound, vec![BoundValue::Value(json!("37"))]);
    }

    #[test]
    fn test_bind_missing_required_names_first_gap() {
        let signature = sig("function f(a, b, c) {}");
        let mut args = RequestArguments::default();
        args.insert("a", json!(1));
        args.insert("c", json!(3));
        let err = bind(&signature, &InvokeArgs::Named(args)).unwrap_err();
        match err {
            WebscriptError::MissingArgument(name) => assert_eq!(name, "b"),
            other => panic!("expected missing argument, got {other:?}"),
        }
    }

    #[test]
    fn test_bind_absent_optional_is_undefined() {
        let signature = sig("function f(a, b = 2) {}");
        let mut args = RequestArguments::default();
        args.insert("a", json!(1));
        let bound = bind(&signature, &InvokeArgs::Named(args)).unwrap();
        assert_eq!(
            bound,
            vec![BoundValue::Value(json!(1)), BoundValue::Undefined]
        );
    }

    #[test]
    fn test_bind_extras_dropped_without_catch_all() {
        let signature = sig("function f(a) {}");
        let mut args = RequestArguments::default();
        args.insert("a", json!(1));
        args.insert("z", json!(9));
        let bound = bind(&signature, &InvokeArgs::Named(args)).unwrap();
        assert_eq!(bound, vec![BoundValue::Value(json!(1))]);
    }

    #[test]
    fn test_bind_catch_all_aggregates_extras() {
        let signature = sig("function f(a, ...extras) {}");
        let mut args = RequestArguments::default();
        args.insert("a", json!(1));
        args.insert("x", json!("1"));
        args.insert("y", json!(true));
        let bound = bind(&signature, &InvokeArgs::Named(args)).unwrap();
        assert_eq!(
            bound,
            vec![
                BoundValue::Value(json!(1)),
                BoundValue::Value(json!({"x": "1", "y": true})),
            ]
        );
    }

    #[test]
    fn test_bind_catch_all_present_even_when_empty() {
        let signature = sig("function f(a, { ...extras }) {}");
        let mut args = RequestArguments::default();
        args.insert("a", json!(1));
        let bound = bind(&signature, &InvokeArgs::Named(args)).unwrap();
        assert_eq!(
            bound,
            vec![BoundValue::Value(json!(1)), BoundValue::Value(json!({}))]
        );
    }

    #[test]
    fn test_bind_positional_checks_required_arity() {
        let signature = sig("function f(a, b, c = 3) {}");
        let err = bind(&signature, &InvokeArgs::Positional(vec![json!(1)])).unwrap_err();
        match err {
            WebscriptError::MissingArgument(name) => assert_eq!(name, "b"),
            other => panic!("expected missing argument, got {other:?}"),
        }

        let bound =
            bind(&signature, &InvokeArgs::Positional(vec![json!(1), json!("2")])).unwrap();
        // positional values are never coerced
        assert_eq!(
            bound,
            vec![BoundValue::Value(json!(1)), BoundValue::Value(json!("2"))]
        );
    }

    #[test]
    fn test_request_arguments_from_json_map() {
        let JsonValue::Object(map) = json!({"a": 1, "b": "x"}) else {
            unreachable!()
        };
        let args = RequestArguments::from(map);
        assert_eq!(args.get("a"), Some(&json!(1)));
        assert_eq!(args.get("b"), Some(&json!("x")));
    }
}
