use std::cell::Cell;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::error::{BridgeError, BridgeResult};
use super::kind::WrapperKind;
use super::session::SessionShared;
use crate::model::{NativeHandle, NativeType};

/// Session-unique identifier of a proxy, stable for the proxy's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProxyId(pub u64);

impl std::fmt::Display for ProxyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub(crate) struct ProxyInner {
    id: ProxyId,
    kind: WrapperKind,
    native_type: NativeType,
    native: Cell<Option<NativeHandle>>,
    pub(crate) session: Rc<SessionShared>,
}

impl ProxyInner {
    /// Drop this proxy's cache entry. A standalone value is freed along with
    /// the proxy that owns its entry.
    fn detach(&self, handle: NativeHandle) -> bool {
        let owned = match self.session.cache.try_borrow_mut() {
            Ok(mut cache) => cache.release(handle, self.id),
            Err(_) => {
                warn!(
                    target = "svgbridge",
                    proxy = %self.id,
                    "proxy cache busy; entry left for the next sweep"
                );
                false
            }
        };
        if !owned || !self.native_type.is_standalone_value() {
            return owned;
        }
        match self.session.document.try_borrow_mut() {
            Ok(mut document) => {
                if let Err(err) = document.destroy(handle) {
                    debug!(target = "svgbridge", proxy = %self.id, %handle, "value already gone: {err}");
                }
            }
            Err(_) => warn!(
                target = "svgbridge",
                proxy = %self.id,
                %handle,
                "document busy; value object left allocated"
            ),
        }
        owned
    }
}

impl Drop for ProxyInner {
    fn drop(&mut self) {
        // Last strong reference is gone: the cache entry is dead now.
        let Some(handle) = self.native.get() else {
            return;
        };
        if self.detach(handle) {
            trace!(target = "svgbridge", proxy = %self.id, %handle, "reclaimed proxy");
        }
    }
}

/// Script-facing proxy for one native object.
///
/// Cloning shares the same proxy. Two instances are equal when they wrap the
/// same native object in the same session.
#[derive(Clone)]
pub struct WrapperInstance {
    pub(crate) inner: Rc<ProxyInner>,
}

impl WrapperInstance {
    pub(crate) fn new(
        session: Rc<SessionShared>,
        id: ProxyId,
        handle: NativeHandle,
        native_type: NativeType,
        kind: WrapperKind,
    ) -> Self {
        Self {
            inner: Rc::new(ProxyInner {
                id,
                kind,
                native_type,
                native: Cell::new(Some(handle)),
                session,
            }),
        }
    }

    pub fn id(&self) -> ProxyId {
        self.inner.id
    }

    pub fn kind(&self) -> WrapperKind {
        self.inner.kind
    }

    /// Exact native type the proxy was built for, which may be more derived
    /// than the type its kind was registered under.
    pub fn native_type(&self) -> NativeType {
        self.inner.native_type
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.native.get().is_none()
    }

    /// Wrapped native object, or an error once disposed.
    pub fn native(&self) -> BridgeResult<NativeHandle> {
        self.inner.native.get().ok_or(BridgeError::Disposed {
            id: self.inner.id,
            kind: self.inner.kind,
        })
    }

    pub fn ptr_eq(&self, other: &WrapperInstance) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn weak_inner(&self) -> Weak<ProxyInner> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn from_inner(inner: Rc<ProxyInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn session(&self) -> &Rc<SessionShared> {
        &self.inner.session
    }

    pub fn same_session(&self, other: &WrapperInstance) -> bool {
        Rc::ptr_eq(&self.inner.session, &other.inner.session)
    }

    /// Detach from the native object and drop the cache entry. Matrices,
    /// points and rects are freed with it. Idempotent.
    pub fn dispose(&self) {
        let Some(handle) = self.inner.native.take() else {
            return;
        };
        self.inner.detach(handle);
        trace!(target = "svgbridge", proxy = %self.inner.id, %handle, "disposed proxy");
    }
}

impl PartialEq for WrapperInstance {
    fn eq(&self, other: &Self) -> bool {
        match (self.inner.native.get(), other.inner.native.get()) {
            (Some(left), Some(right)) => left == right && self.same_session(other),
            _ => self.ptr_eq(other),
        }
    }
}

impl Eq for WrapperInstance {}

impl Hash for WrapperInstance {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.inner.native.get() {
            Some(handle) => handle.hash(state),
            None => 0u64.hash(state),
        }
    }
}

impl std::fmt::Debug for WrapperInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WrapperInstance")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("native_type", &self.inner.native_type)
            .field("native", &self.inner.native.get())
            .finish()
    }
}
