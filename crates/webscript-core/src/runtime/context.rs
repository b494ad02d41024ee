//! A loaded unit's engine context.

use boa_engine::{js_string, Context, JsValue, Source};
use serde_json::Value as JsonValue;

use crate::binder::BoundValue;
use crate::error::{Result, WebscriptError};
use crate::runtime::conversions::{js_value_to_json, json_to_js_value};

use std::sync::Mutex;

/// One engine context holding a unit's evaluated source. Top-level state
/// (`var` bindings) persists across calls for as long as the unit stays
/// loaded.
pub struct UnitContext {
    unit: String,
    ctx: Mutex<Context>,
}

// SAFETY: the engine context is not thread-safe on its own, but it is only
// ever reached through the mutex, so a single thread drives it at a time.
unsafe impl Send for UnitContext {}
unsafe impl Sync for UnitContext {}

impl UnitContext {
    /// Evaluate `source` in a fresh context. Parse and top-level runtime
    /// errors both surface as a load failure for the unit.
    pub fn from_source(unit: &str, source: &str) -> Result<Self> {
        let mut ctx = Context::default();
        ctx.eval(Source::from_bytes(source))
            .map_err(|e| WebscriptError::UnitLoad {
                unit: unit.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            unit: unit.to_string(),
            ctx: Mutex::new(ctx),
        })
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Call a global function by name. `BoundValue::Undefined` slots become
    /// the engine's `undefined`, which is what lets declared defaults apply.
    pub fn call(&self, function: &str, args: &[BoundValue]) -> Result<JsonValue> {
        let mut ctx = self.ctx.lock().unwrap();

        let target = ctx
            .global_object()
            .get(js_string!(function), &mut *ctx)
            .map_err(|e| WebscriptError::Engine(format!("global lookup failed: {e}")))?;

        let callable = match target.as_object() {
            Some(object) if object.is_callable() => object.clone(),
            _ => {
                return Err(WebscriptError::FunctionNotFound {
                    unit: self.unit.clone(),
                    function: function.to_string(),
                })
            }
        };

        let mut call_args = Vec::with_capacity(args.len());
        for arg in args {
            let value = match arg {
                BoundValue::Undefined => JsValue::undefined(),
                BoundValue::Value(json) => json_to_js_value(json, &mut ctx)?,
            };
            call_args.push(value);
        }

        let result = callable
            .call(&JsValue::undefined(), &call_args, &mut *ctx)
            .map_err(|e| WebscriptError::Invocation {
                function: function.to_string(),
                message: e.to_string(),
                trace: None,
            })?;

        js_value_to_json(&result, &mut ctx)
    }
}
