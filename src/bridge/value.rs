use super::error::{BridgeError, BridgeResult};
use super::wrapper::WrapperInstance;

/// Value crossing the bridge in either direction.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ScriptValue {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Proxy(WrapperInstance),
    List(Vec<ScriptValue>),
}

impl ScriptValue {
    /// Absent proxies become `null`.
    pub fn from_proxy(wrapper: Option<WrapperInstance>) -> Self {
        wrapper.map(ScriptValue::Proxy).unwrap_or(ScriptValue::Null)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, ScriptValue::Undefined | ScriptValue::Null)
    }

    pub fn as_proxy(&self) -> Option<&WrapperInstance> {
        match self {
            ScriptValue::Proxy(wrapper) => Some(wrapper),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScriptValue::Number(number) => Some(*number),
            ScriptValue::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
            ScriptValue::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            ScriptValue::Undefined | ScriptValue::Null => false,
            ScriptValue::Bool(flag) => *flag,
            ScriptValue::Number(number) => *number != 0.0 && !number.is_nan(),
            ScriptValue::String(text) => !text.is_empty(),
            ScriptValue::Proxy(_) | ScriptValue::List(_) => true,
        }
    }

    /// String conversion following script rules for primitives.
    pub fn to_script_string(&self) -> String {
        match self {
            ScriptValue::Undefined => "undefined".to_string(),
            ScriptValue::Null => "null".to_string(),
            ScriptValue::Bool(flag) => flag.to_string(),
            ScriptValue::Number(number) => format_number(*number),
            ScriptValue::String(text) => text.clone(),
            ScriptValue::Proxy(wrapper) => format!("[object {}]", wrapper.kind()),
            ScriptValue::List(items) => items
                .iter()
                .map(ScriptValue::to_script_string)
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

pub fn format_number(number: f64) -> String {
    if number.is_nan() {
        return "NaN".to_string();
    }
    if number.is_infinite() {
        return if number > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if number.fract() == 0.0 && number.abs() < 1e21 {
        return format!("{}", number as i64);
    }
    number.to_string()
}

impl From<&str> for ScriptValue {
    fn from(value: &str) -> Self {
        ScriptValue::String(value.to_string())
    }
}

impl From<String> for ScriptValue {
    fn from(value: String) -> Self {
        ScriptValue::String(value)
    }
}

impl From<Option<String>> for ScriptValue {
    fn from(value: Option<String>) -> Self {
        value.map(ScriptValue::String).unwrap_or(ScriptValue::Null)
    }
}

impl From<f64> for ScriptValue {
    fn from(value: f64) -> Self {
        ScriptValue::Number(value)
    }
}

impl From<bool> for ScriptValue {
    fn from(value: bool) -> Self {
        ScriptValue::Bool(value)
    }
}

impl From<WrapperInstance> for ScriptValue {
    fn from(value: WrapperInstance) -> Self {
        ScriptValue::Proxy(value)
    }
}

pub(crate) fn arg<'a>(args: &'a [ScriptValue], index: usize) -> &'a ScriptValue {
    const UNDEFINED: &ScriptValue = &ScriptValue::Undefined;
    args.get(index).unwrap_or(UNDEFINED)
}

pub(crate) fn arg_string(args: &[ScriptValue], index: usize) -> String {
    arg(args, index).to_script_string()
}

pub(crate) fn arg_number(member: &str, args: &[ScriptValue], index: usize) -> BridgeResult<f64> {
    arg(args, index)
        .as_f64()
        .ok_or_else(|| BridgeError::invalid(member, format!("argument {index} must be a number")))
}
