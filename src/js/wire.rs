//! JSON wire format between the script bootstrap and the bridge.
//!
//! Proxies travel as `{"$proxy": id, "$kind": "SVGRectElement"}`. Every proxy
//! handed to script is rooted here until script disposes it or the
//! environment is torn down, so the same native object keeps the same id.

use std::collections::HashMap;

use serde_json::{json, Value as JsonValue};
use tracing::trace;

use crate::bridge::{BridgeError, BridgeResult, ProxyId, ScriptValue, WrapperInstance};

#[derive(Default)]
pub struct ProxyRoots {
    live: HashMap<ProxyId, WrapperInstance>,
    // Proxy ids only grow, so any id up to this one that is no longer live
    // was released.
    highest: u64,
}

impl ProxyRoots {
    /// Keep `wrapper` alive for script and return the id script will use.
    pub fn root(&mut self, wrapper: &WrapperInstance) -> ProxyId {
        let id = wrapper.id();
        self.highest = self.highest.max(id.0);
        self.live.entry(id).or_insert_with(|| wrapper.clone());
        id
    }

    pub fn resolve(&self, id: ProxyId) -> BridgeResult<WrapperInstance> {
        if let Some(wrapper) = self.live.get(&id) {
            return Ok(wrapper.clone());
        }
        if self.was_released(id) {
            return Err(BridgeError::Released(id));
        }
        Err(BridgeError::UnknownProxy(id))
    }

    /// Dispose a rooted proxy. Later lookups of `id` report it as disposed.
    pub fn release(&mut self, id: ProxyId) -> BridgeResult<()> {
        match self.live.remove(&id) {
            Some(wrapper) => {
                wrapper.dispose();
                trace!(target = "svgbridge", proxy = %id, "released script root");
                Ok(())
            }
            None if self.was_released(id) => Ok(()),
            None => Err(BridgeError::UnknownProxy(id)),
        }
    }

    fn was_released(&self, id: ProxyId) -> bool {
        id.0 != 0 && id.0 <= self.highest
    }

    /// Release every root, returning how many were live.
    pub fn clear(&mut self) -> usize {
        let live: Vec<ProxyId> = self.live.keys().copied().collect();
        for id in &live {
            // Only fails for ids that are not rooted, and these all are.
            let _ = self.release(*id);
        }
        live.len()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

/// Proxy ids arrive from script as numbers.
pub fn proxy_id(raw: f64) -> BridgeResult<ProxyId> {
    if raw.fract() != 0.0 || raw < 0.0 || !raw.is_finite() {
        return Err(BridgeError::invalid("proxy id", format!("{raw} is not an id")));
    }
    Ok(ProxyId(raw as u64))
}

pub fn encode(value: &ScriptValue, roots: &mut ProxyRoots) -> JsonValue {
    match value {
        ScriptValue::Undefined | ScriptValue::Null => JsonValue::Null,
        ScriptValue::Bool(flag) => JsonValue::Bool(*flag),
        ScriptValue::Number(number) => serde_json::Number::from_f64(*number)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        ScriptValue::String(text) => JsonValue::String(text.clone()),
        ScriptValue::Proxy(wrapper) => {
            let id = roots.root(wrapper);
            json!({ "$proxy": id.0, "$kind": wrapper.kind().interface_name() })
        }
        ScriptValue::List(items) => {
            JsonValue::Array(items.iter().map(|item| encode(item, roots)).collect())
        }
    }
}

/// Encoded result for script; the empty string stands for `undefined`.
pub fn encode_result(value: &ScriptValue, roots: &mut ProxyRoots) -> String {
    if let ScriptValue::Undefined = value {
        return String::new();
    }
    encode(value, roots).to_string()
}

pub fn decode(value: &JsonValue, roots: &ProxyRoots) -> BridgeResult<ScriptValue> {
    let decoded = match value {
        JsonValue::Null => ScriptValue::Null,
        JsonValue::Bool(flag) => ScriptValue::Bool(*flag),
        JsonValue::Number(number) => ScriptValue::Number(number.as_f64().unwrap_or(f64::NAN)),
        JsonValue::String(text) => ScriptValue::String(text.clone()),
        JsonValue::Array(items) => ScriptValue::List(
            items
                .iter()
                .map(|item| decode(item, roots))
                .collect::<BridgeResult<_>>()?,
        ),
        JsonValue::Object(map) => match map.get("$proxy").and_then(JsonValue::as_f64) {
            Some(raw) => ScriptValue::Proxy(roots.resolve(proxy_id(raw)?)?),
            None => ScriptValue::String(value.to_string()),
        },
    };
    Ok(decoded)
}

/// Decode the argument array sent with a call or property write.
pub fn decode_args(text: &str, roots: &ProxyRoots) -> BridgeResult<Vec<ScriptValue>> {
    let parsed: JsonValue = serde_json::from_str(text)
        .map_err(|err| BridgeError::invalid("arguments", err.to_string()))?;
    match decode(&parsed, roots)? {
        ScriptValue::List(items) => Ok(items),
        other => Ok(vec![other]),
    }
}
