//! Conversions between JSON values and engine values.
//!
//! Result conversion follows `JSON.stringify` where it matters to script
//! authors: function-valued and undefined object members are omitted, array
//! slots holding either become `null`. Non-finite numbers have no JSON
//! representation and fail the call instead of silently turning into `null`.

use boa_engine::object::builtins::JsArray;
use boa_engine::property::PropertyKey;
use boa_engine::{js_string, Context, JsObject, JsValue};
use serde_json::{Map, Number, Value as JsonValue};

use crate::error::{Result, WebscriptError};

pub fn json_to_js_value(value: &JsonValue, context: &mut Context) -> Result<JsValue> {
    match value {
        JsonValue::Null => Ok(JsValue::null()),
        JsonValue::Bool(b) => Ok(JsValue::from(*b)),
        JsonValue::Number(n) => n
            .as_f64()
            .map(JsValue::from)
            .ok_or_else(|| WebscriptError::Engine(format!("number {n} outside f64 range"))),
        JsonValue::String(s) => Ok(JsValue::from(js_string!(s.as_str()))),
        JsonValue::Array(items) => {
            let array = JsArray::new(context);
            for item in items {
                let element = json_to_js_value(item, context)?;
                array
                    .push(element, context)
                    .map_err(|e| WebscriptError::Engine(format!("array build failed: {e}")))?;
            }
            Ok(array.into())
        }
        JsonValue::Object(map) => {
            let object = JsObject::with_object_proto(context.intrinsics());
            for (key, member) in map {
                let element = json_to_js_value(member, context)?;
                object
                    .create_data_property_or_throw(js_string!(key.as_str()), element, context)
                    .map_err(|e| {
                        WebscriptError::Engine(format!("object property {key:?} failed: {e}"))
                    })?;
            }
            Ok(object.into())
        }
    }
}

pub fn js_value_to_json(value: &JsValue, context: &mut Context) -> Result<JsonValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(JsonValue::Null);
    }
    if let Some(b) = value.as_boolean() {
        return Ok(JsonValue::Bool(b));
    }
    if let Some(i) = value.as_i32() {
        return Ok(JsonValue::Number(Number::from(i)));
    }
    if let Some(n) = value.as_number() {
        return Number::from_f64(n)
            .map(JsonValue::Number)
            .ok_or_else(|| WebscriptError::Engine(format!("number {n} has no JSON form")));
    }
    if let Some(s) = value.as_string() {
        return Ok(JsonValue::String(s.to_std_string_escaped()));
    }
    if value.is_symbol() {
        return Err(WebscriptError::Engine("symbols have no JSON form".into()));
    }
    if let Some(object) = value.as_object() {
        if object.is_callable() {
            return Err(WebscriptError::Engine("functions have no JSON form".into()));
        }
        if object.is_array() {
            let array = JsArray::from_object(object.clone())
                .map_err(|e| WebscriptError::Engine(format!("array read failed: {e}")))?;
            let length = array
                .length(context)
                .map_err(|e| WebscriptError::Engine(format!("array length failed: {e}")))?;
            let mut items = Vec::with_capacity(length as usize);
            for index in 0..length {
                let element = array
                    .get(index, context)
                    .map_err(|e| WebscriptError::Engine(format!("array index {index}: {e}")))?;
                if skipped_by_json(&element) {
                    items.push(JsonValue::Null);
                } else {
                    items.push(js_value_to_json(&element, context)?);
                }
            }
            return Ok(JsonValue::Array(items));
        }

        let keys = object
            .own_property_keys(context)
            .map_err(|e| WebscriptError::Engine(format!("property keys failed: {e}")))?;
        let mut map = Map::new();
        for key in keys {
            let name = match &key {
                PropertyKey::String(s) => s.to_std_string_escaped(),
                PropertyKey::Index(i) => i.get().to_string(),
                PropertyKey::Symbol(_) => continue,
            };
            let member = object
                .get(key.clone(), context)
                .map_err(|e| WebscriptError::Engine(format!("property {name:?} failed: {e}")))?;
            if skipped_by_json(&member) {
                continue;
            }
            map.insert(name, js_value_to_json(&member, context)?);
        }
        return Ok(JsonValue::Object(map));
    }
    // bigints and host values land here
    Err(WebscriptError::Engine(
        "value of unsupported type has no JSON form".into(),
    ))
}

fn skipped_by_json(value: &JsValue) -> bool {
    if value.is_undefined() {
        return true;
    }
    value
        .as_object()
        .map(JsObject::is_callable)
        .unwrap_or(false)
}
