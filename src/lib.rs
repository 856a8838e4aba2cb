// Library exports for the CLI and integration tests

pub mod bridge;
pub mod config;
pub mod js;
pub mod model;

pub use bridge::{
    BridgeError, Capability, ScriptSession, ScriptValue, WrapperInstance, WrapperKind,
    WrapperRegistry,
};
pub use config::BridgeConfig;
pub use js::{DispatchOutcome, ScriptEnvironment};
pub use model::{Document, NativeHandle, NativeType};
