use std::rc::Rc;

use tracing::{debug, trace};

use super::error::{BridgeError, BridgeResult};
use super::kind::Capability;
use super::registry::{RegistryTable, WrapperConstructor};
use super::session::SessionShared;
use super::wrapper::WrapperInstance;
use crate::model::{NativeHandle, NativeType};

/// Resolve a constructor for `ty`, trying the exact type and then its
/// immediate ancestor. Deeper ancestors are never consulted.
pub fn resolve_constructor(
    table: &RegistryTable,
    ty: NativeType,
) -> BridgeResult<WrapperConstructor> {
    if let Some(constructor) = table.lookup(ty.key()) {
        return Ok(constructor);
    }
    if let Some(parent) = ty.parent() {
        if let Some(constructor) = table.lookup(parent.key()) {
            debug!(
                target = "svgbridge",
                native_type = %ty,
                resolved_as = %parent,
                "wrapper resolved through ancestor"
            );
            return Ok(constructor);
        }
    }
    Err(BridgeError::UnregisteredType(ty.key().to_string()))
}

/// Proxy for `native`, reusing the cached one when it is still alive.
pub(crate) fn create_wrapper(
    session: &Rc<SessionShared>,
    native: Option<NativeHandle>,
    required: Option<Capability>,
) -> BridgeResult<Option<WrapperInstance>> {
    let Some(handle) = native else {
        return Ok(None);
    };
    if session.is_closed() {
        return Err(BridgeError::SessionClosed);
    }

    let table = session.registry.initialize();
    let native_type = session
        .document
        .borrow()
        .type_of(handle)
        .ok_or(BridgeError::StaleNative(handle))?;

    let cached = session.cache.borrow().try_get(handle);
    if let Some(existing) = cached {
        check_capability(&existing, required)?;
        trace!(target = "svgbridge", proxy = %existing.id(), %handle, "proxy cache hit");
        return Ok(Some(existing));
    }

    let constructor = resolve_constructor(table, native_type)?;
    let kind = constructor();
    if let Some(capability) = required {
        if !kind.supports(capability) {
            return Err(BridgeError::Incompatible { kind, capability });
        }
    }

    let fresh = WrapperInstance::new(
        Rc::clone(session),
        session.next_proxy_id(),
        handle,
        native_type,
        kind,
    );
    let wrapper = settle(session, handle, fresh);
    check_capability(&wrapper, required)?;

    session.maybe_sweep();
    Ok(Some(wrapper))
}

/// Publish `fresh` for `handle`. If a live proxy is already cached, that one
/// wins and `fresh` is discarded without touching the native object.
pub(crate) fn settle(
    session: &SessionShared,
    handle: NativeHandle,
    fresh: WrapperInstance,
) -> WrapperInstance {
    let winner = session.cache.borrow_mut().insert_if_absent(handle, &fresh);
    match winner {
        Some(existing) => {
            debug!(
                target = "svgbridge",
                proxy = %existing.id(),
                discarded = %fresh.id(),
                "kept the proxy already cached"
            );
            drop(fresh);
            existing
        }
        None => {
            trace!(target = "svgbridge", proxy = %fresh.id(), %handle, kind = %fresh.kind(), "created proxy");
            fresh
        }
    }
}

fn check_capability(wrapper: &WrapperInstance, required: Option<Capability>) -> BridgeResult<()> {
    match required {
        Some(capability) if !wrapper.kind().supports(capability) => {
            Err(BridgeError::Incompatible {
                kind: wrapper.kind(),
                capability,
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::kind::WrapperKind;

    fn node_only(table: &mut RegistryTable) {
        table.register("Node", || WrapperKind::Node);
    }

    #[test]
    fn exact_match_wins_over_ancestor() {
        let mut table = RegistryTable::default();
        table.register("Element", || WrapperKind::Element);
        table.register("SVGElement", || WrapperKind::SvgElement);
        let constructor = resolve_constructor(&table, NativeType::SvgElement).unwrap();
        assert_eq!(constructor(), WrapperKind::SvgElement);
    }

    #[test]
    fn falls_back_exactly_one_level() {
        let mut table = RegistryTable::default();
        node_only(&mut table);
        let constructor = resolve_constructor(&table, NativeType::Element).unwrap();
        assert_eq!(constructor(), WrapperKind::Node);

        assert_eq!(
            resolve_constructor(&table, NativeType::SvgElement).err(),
            Some(BridgeError::UnregisteredType("SVGElement".to_string()))
        );
    }

    #[test]
    fn root_type_without_entry_is_unregistered() {
        let table = RegistryTable::default();
        assert!(matches!(
            resolve_constructor(&table, NativeType::SvgMatrix),
            Err(BridgeError::UnregisteredType(name)) if name == "SVGMatrix"
        ));
    }

    #[test]
    fn duplicate_proxy_is_discarded_without_freeing_the_value() {
        let session = crate::bridge::ScriptSession::new(crate::model::Document::new());
        let matrix = session.document_mut().create_matrix(Default::default());
        let existing = session.create_wrapper(Some(matrix)).unwrap().unwrap();

        let shared = session.shared();
        let duplicate = WrapperInstance::new(
            Rc::clone(shared),
            shared.next_proxy_id(),
            matrix,
            NativeType::SvgMatrix,
            existing.kind(),
        );
        let duplicate_id = duplicate.id();
        let settled = settle(shared, matrix, duplicate);

        assert!(settled.ptr_eq(&existing));
        assert_ne!(settled.id(), duplicate_id);
        assert_eq!(session.cache_len(), 1);
        assert!(session.cached(matrix).unwrap().ptr_eq(&existing));
        assert!(session.document().is_live(matrix));
    }
}
