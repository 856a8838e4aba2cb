use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use super::cache::ProxyCache;
use super::error::{BridgeError, BridgeResult};
use super::factory;
use super::kind::Capability;
use super::listeners::{ListenerId, ListenerTable};
use super::registry::WrapperRegistry;
use super::wrapper::{ProxyId, WrapperInstance};
use crate::config::CacheConfig;
use crate::model::{Document, NativeHandle};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) struct SessionShared {
    id: u64,
    pub(crate) registry: Arc<WrapperRegistry>,
    pub(crate) document: RefCell<Document>,
    pub(crate) cache: RefCell<ProxyCache>,
    pub(crate) listeners: RefCell<ListenerTable>,
    next_proxy: Cell<u64>,
    closed: Cell<bool>,
    cache_config: CacheConfig,
}

impl SessionShared {
    pub(crate) fn next_proxy_id(&self) -> ProxyId {
        let id = self.next_proxy.get();
        self.next_proxy.set(id + 1);
        ProxyId(id)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.get()
    }

    pub(crate) fn maybe_sweep(&self) {
        let interval = self.cache_config.sweep_interval;
        if interval == 0 {
            return;
        }
        let due = self.cache.borrow().inserts_since_sweep() >= interval;
        if due {
            let purged = self.purge();
            debug!(target = "svgbridge", session = self.id, purged, "swept proxy cache");
        }
    }

    pub(crate) fn purge(&self) -> usize {
        let document = self.document.borrow();
        let orphaned = self
            .listeners
            .borrow_mut()
            .prune(|handle| document.is_live(handle));
        if orphaned > 0 {
            debug!(target = "svgbridge", session = self.id, orphaned, "dropped listeners on destroyed targets");
        }
        self.cache
            .borrow_mut()
            .purge(|handle| document.is_live(handle))
    }

    fn teardown(&self) {
        if self.closed.replace(true) {
            return;
        }
        let live = self.cache.borrow_mut().clear();
        let disposed = live.len();
        for wrapper in &live {
            wrapper.dispose();
        }
        drop(live);
        self.listeners.borrow_mut().clear();
        info!(target = "svgbridge", session = self.id, disposed, "script session torn down");
    }
}

/// Per-document scripting context: owns the document, the proxy cache and
/// the listener table, and shares a wrapper registry.
///
/// Sessions are single-threaded. Dropping the session tears it down.
pub struct ScriptSession {
    shared: Rc<SessionShared>,
}

impl ScriptSession {
    pub fn new(document: Document) -> Self {
        Self::with_registry(document, WrapperRegistry::shared(), CacheConfig::default())
    }

    pub fn with_registry(
        document: Document,
        registry: Arc<WrapperRegistry>,
        cache_config: CacheConfig,
    ) -> Self {
        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        debug!(target = "svgbridge", session = id, "script session created");
        Self {
            shared: Rc::new(SessionShared {
                id,
                registry,
                document: RefCell::new(document),
                cache: RefCell::new(ProxyCache::new()),
                listeners: RefCell::new(ListenerTable::default()),
                next_proxy: Cell::new(1),
                closed: Cell::new(false),
                cache_config,
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn registry(&self) -> &Arc<WrapperRegistry> {
        &self.shared.registry
    }

    pub fn document(&self) -> Ref<'_, Document> {
        self.shared.document.borrow()
    }

    pub fn document_mut(&self) -> RefMut<'_, Document> {
        self.shared.document.borrow_mut()
    }

    /// Proxy for `native`; `None` in, `None` out.
    pub fn create_wrapper(
        &self,
        native: Option<NativeHandle>,
    ) -> BridgeResult<Option<WrapperInstance>> {
        factory::create_wrapper(&self.shared, native, None)
    }

    /// Like [`ScriptSession::create_wrapper`], but the proxy must implement `capability`.
    pub fn create_wrapper_as(
        &self,
        native: Option<NativeHandle>,
        capability: Capability,
    ) -> BridgeResult<Option<WrapperInstance>> {
        factory::create_wrapper(&self.shared, native, Some(capability))
    }

    pub fn document_proxy(&self) -> BridgeResult<WrapperInstance> {
        let root = self.document().root();
        self.create_wrapper(Some(root))?
            .ok_or(BridgeError::StaleNative(root))
    }

    /// Cached proxy for `native` without creating one.
    pub fn cached(&self, native: NativeHandle) -> Option<WrapperInstance> {
        self.shared.cache.borrow().try_get(native)
    }

    pub fn cache_len(&self) -> usize {
        self.shared.cache.borrow().len()
    }

    pub fn live_proxy_count(&self) -> usize {
        self.shared.cache.borrow().live_len()
    }

    /// Drop dead and stale cache entries now instead of waiting for a sweep.
    /// Listeners registered on destroyed targets go with them.
    pub fn purge_cache(&self) -> usize {
        self.shared.purge()
    }

    pub fn owns(&self, wrapper: &WrapperInstance) -> bool {
        Rc::ptr_eq(&self.shared, wrapper.session())
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    pub fn is_listening(&self, event_type: &str) -> bool {
        self.shared.listeners.borrow().is_listening(event_type)
    }

    /// Listener ids registered on `target` for `event_type`, in registration order.
    pub fn listeners_for(&self, target: NativeHandle, event_type: &str) -> Vec<ListenerId> {
        self.shared
            .listeners
            .borrow()
            .listeners_for(target, event_type)
    }

    /// Target followed by its ancestors: the bubbling path of an event.
    pub fn propagation_path(&self, target: NativeHandle) -> BridgeResult<Vec<NativeHandle>> {
        let document = self.document();
        let mut path = vec![target];
        path.extend(document.ancestors(target)?);
        Ok(path)
    }

    #[cfg(test)]
    pub(crate) fn shared(&self) -> &Rc<SessionShared> {
        &self.shared
    }

    /// Dispose every live proxy, clear the cache and forget all listeners.
    /// Further proxying through this session fails with `SessionClosed`.
    pub fn teardown(&self) {
        self.shared.teardown();
    }
}

impl Drop for ScriptSession {
    fn drop(&mut self) {
        self.shared.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::kind::WrapperKind;
    use crate::model::SVG_NAMESPACE;

    fn session_with_rect() -> (ScriptSession, NativeHandle) {
        let mut document = Document::new();
        let svg = document.create_element(Some(SVG_NAMESPACE), "svg");
        let rect = document.create_element(Some(SVG_NAMESPACE), "rect");
        document.append_child(document.root(), svg).unwrap();
        document.append_child(svg, rect).unwrap();
        (ScriptSession::new(document), rect)
    }

    #[test]
    fn dropping_last_reference_clears_entry() {
        let (session, rect) = session_with_rect();
        let wrapper = session.create_wrapper(Some(rect)).unwrap().unwrap();
        assert_eq!(session.cache_len(), 1);
        drop(wrapper);
        assert_eq!(session.cache_len(), 0);
        assert!(session.cached(rect).is_none());
    }

    #[test]
    fn sweep_runs_after_interval() {
        let mut document = Document::new();
        let svg = document.create_element(Some(SVG_NAMESPACE), "svg");
        document.append_child(document.root(), svg).unwrap();
        let nodes: Vec<_> = (0..4).map(|_| document.create_text("t")).collect();
        let registry = Arc::new(WrapperRegistry::new());
        let session = ScriptSession::with_registry(
            document,
            registry,
            CacheConfig { sweep_interval: 2 },
        );

        let first = session.create_wrapper(Some(nodes[0])).unwrap().unwrap();
        session.document_mut().destroy(nodes[0]).unwrap();
        assert_eq!(session.cache_len(), 1);

        let _second = session.create_wrapper(Some(nodes[1])).unwrap();
        assert_eq!(session.cache_len(), 1, "stale entry swept");
        assert!(first.native().is_ok());
    }

    #[test]
    fn teardown_disposes_live_proxies() {
        let (session, rect) = session_with_rect();
        let wrapper = session.create_wrapper(Some(rect)).unwrap().unwrap();
        session.teardown();

        assert!(wrapper.is_disposed());
        assert_eq!(session.cache_len(), 0);
        assert_eq!(
            session.create_wrapper(Some(rect)).err(),
            Some(BridgeError::SessionClosed)
        );
        assert_eq!(session.create_wrapper(None).unwrap(), None);
    }

    #[test]
    fn capability_is_checked_on_cache_hit() {
        let (session, rect) = session_with_rect();
        let wrapper = session
            .create_wrapper_as(Some(rect), Capability::Locatable)
            .unwrap()
            .unwrap();
        assert_eq!(wrapper.kind(), WrapperKind::SvgRect);

        let root = session.document().root();
        let document = session.create_wrapper(Some(root)).unwrap().unwrap();
        assert_eq!(
            session
                .create_wrapper_as(Some(root), Capability::Stylable)
                .err(),
            Some(BridgeError::Incompatible {
                kind: WrapperKind::Document,
                capability: Capability::Stylable
            })
        );
        drop(document);
    }

    #[test]
    fn purge_drops_listeners_on_destroyed_targets() {
        let mut document = Document::new();
        let text = document.create_text("t");
        let session = ScriptSession::new(document);
        session
            .shared
            .listeners
            .borrow_mut()
            .add(text, "click", ListenerId(3));
        assert!(session.is_listening("click"));

        session.document_mut().destroy(text).unwrap();
        session.purge_cache();
        assert!(!session.is_listening("click"));
    }

    #[test]
    fn value_objects_are_freed_with_their_proxy() {
        let (session, _) = session_with_rect();
        let baseline = session.document().len();

        let matrix = session.document_mut().create_matrix(Default::default());
        let disposed = session.create_wrapper(Some(matrix)).unwrap().unwrap();
        disposed.dispose();
        assert!(!session.document().is_live(matrix));

        let point = session.document_mut().create_point(Default::default());
        let dropped = session.create_wrapper(Some(point)).unwrap().unwrap();
        drop(dropped);
        assert!(!session.document().is_live(point));
        assert_eq!(session.document().len(), baseline);
    }
}
