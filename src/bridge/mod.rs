//! Proxy bridge between script code and the native document.
//!
//! The registry maps native type names to wrapper kinds, the factory builds
//! proxies through it, and the per-session cache keeps one live proxy per
//! native object.

pub mod cache;
pub mod capability;
pub mod error;
pub mod factory;
pub mod kind;
pub mod listeners;
pub mod members;
pub mod registry;
pub mod session;
pub mod value;
pub mod wrapper;

pub use cache::ProxyCache;
pub use capability::{EventTarget, Locatable, Stylable, Transformable};
pub use error::{BridgeError, BridgeResult};
pub use factory::resolve_constructor;
pub use kind::{Capability, WrapperKind};
pub use listeners::{ListenerId, ListenerTable};
pub use members::{member_names, MemberKind};
pub use registry::{register_svg_wrappers, RegistryTable, WrapperConstructor, WrapperRegistry};
pub use session::ScriptSession;
pub use value::ScriptValue;
pub use wrapper::{ProxyId, WrapperInstance};
