use thiserror::Error;

use super::kind::{Capability, WrapperKind};
use super::wrapper::ProxyId;
use crate::model::{ModelError, NativeHandle};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BridgeError {
    #[error("no wrapper registered for native type '{0}'")]
    UnregisteredType(String),
    #[error("{kind} proxy {id} has been disposed")]
    Disposed { id: ProxyId, kind: WrapperKind },
    #[error("{kind} proxy does not implement {capability}")]
    Incompatible {
        kind: WrapperKind,
        capability: Capability,
    },
    #[error("native object {0} is no longer alive")]
    StaleNative(NativeHandle),
    #[error("proxy belongs to a different script session")]
    ForeignSession,
    #[error("script session has been torn down")]
    SessionClosed,
    #[error("proxy {0} has been disposed")]
    Released(ProxyId),
    #[error("unknown proxy {0}")]
    UnknownProxy(ProxyId),
    #[error("{kind} has no member '{member}'")]
    UnknownMember { kind: WrapperKind, member: String },
    #[error("{kind}.{member} is read-only")]
    ReadOnly { kind: WrapperKind, member: String },
    #[error("invalid argument to {member}: {reason}")]
    InvalidArgument { member: String, reason: String },
    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type BridgeResult<T> = Result<T, BridgeError>;

impl BridgeError {
    pub(crate) fn invalid(member: &str, reason: impl Into<String>) -> Self {
        BridgeError::InvalidArgument {
            member: member.to_string(),
            reason: reason.into(),
        }
    }
}
