mod environment;
mod runtime;
mod wire;

pub use environment::{DispatchOutcome, ScriptEnvironment};
pub use runtime::QuickJsEngine;
pub use wire::{decode, decode_args, encode, encode_result, ProxyRoots};
