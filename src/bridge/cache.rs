use std::collections::HashMap;
use std::rc::Weak;

use super::wrapper::{ProxyId, ProxyInner, WrapperInstance};
use crate::model::NativeHandle;

struct CacheEntry {
    proxy: ProxyId,
    wrapper: Weak<ProxyInner>,
}

impl CacheEntry {
    fn upgrade(&self) -> Option<WrapperInstance> {
        self.wrapper.upgrade().map(WrapperInstance::from_inner)
    }
}

/// Identity map from native object to its live proxy.
///
/// Neither side is owned: keys are plain handles into the document arena and
/// values are weak references, so an entry never keeps anything alive.
#[derive(Default)]
pub struct ProxyCache {
    entries: HashMap<NativeHandle, CacheEntry>,
    inserts_since_sweep: usize,
}

impl ProxyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live proxy for `handle`; a reclaimed entry reads as absent.
    pub fn try_get(&self, handle: NativeHandle) -> Option<WrapperInstance> {
        self.entries.get(&handle).and_then(CacheEntry::upgrade)
    }

    /// Record `wrapper` for `handle`, replacing whatever was there.
    pub fn insert(&mut self, handle: NativeHandle, wrapper: &WrapperInstance) {
        self.inserts_since_sweep += 1;
        self.entries.insert(
            handle,
            CacheEntry {
                proxy: wrapper.id(),
                wrapper: wrapper.weak_inner(),
            },
        );
    }

    /// Record `wrapper` unless a live proxy already exists, in which case
    /// that proxy is returned and the cache is left untouched.
    pub fn insert_if_absent(
        &mut self,
        handle: NativeHandle,
        wrapper: &WrapperInstance,
    ) -> Option<WrapperInstance> {
        if let Some(existing) = self.try_get(handle) {
            return Some(existing);
        }
        self.insert(handle, wrapper);
        None
    }

    /// Drop the entry for `handle` whether or not its proxy is alive.
    pub fn remove(&mut self, handle: NativeHandle) -> bool {
        self.entries.remove(&handle).is_some()
    }

    /// Drop the entry for `handle` only if it was recorded for `proxy`.
    pub fn release(&mut self, handle: NativeHandle, proxy: ProxyId) -> bool {
        let owned = self
            .entries
            .get(&handle)
            .map(|entry| entry.proxy == proxy)
            .unwrap_or(false);
        if owned {
            self.entries.remove(&handle);
        }
        owned
    }

    /// Remove entries whose proxy was reclaimed or whose native object is gone.
    pub fn purge(&mut self, is_live: impl Fn(NativeHandle) -> bool) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|handle, entry| entry.wrapper.strong_count() > 0 && is_live(*handle));
        self.inserts_since_sweep = 0;
        before - self.entries.len()
    }

    pub fn inserts_since_sweep(&self) -> usize {
        self.inserts_since_sweep
    }

    /// Empty the cache, returning the proxies that were still alive.
    pub fn clear(&mut self) -> Vec<WrapperInstance> {
        self.inserts_since_sweep = 0;
        self.entries
            .drain()
            .filter_map(|(_, entry)| entry.upgrade())
            .collect()
    }

    /// Number of entries, dead ones included until the next purge.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn live_len(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.wrapper.strong_count() > 0)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use crate::bridge::ScriptSession;
    use crate::model::Document;

    #[test]
    fn release_ignores_other_proxies() {
        let document = Document::parse_svg(r#"<svg><rect id="r"/></svg>"#).unwrap();
        let rect = document.element_by_id("r").unwrap();
        let session = ScriptSession::new(document);
        let wrapper = session.create_wrapper(Some(rect)).unwrap().unwrap();

        let mut cache = super::ProxyCache::new();
        cache.insert(rect, &wrapper);
        assert!(!cache.release(rect, crate::bridge::ProxyId(wrapper.id().0 + 1)));
        assert_eq!(cache.len(), 1);
        assert!(cache.release(rect, wrapper.id()));
        assert!(cache.is_empty());
    }

    #[test]
    fn purge_drops_dead_entries() {
        let document = Document::parse_svg(r#"<svg><rect id="r"/></svg>"#).unwrap();
        let rect = document.element_by_id("r").unwrap();
        let session = ScriptSession::new(document);

        let mut cache = super::ProxyCache::new();
        {
            let wrapper = session.create_wrapper(Some(rect)).unwrap().unwrap();
            cache.insert(rect, &wrapper);
            assert_eq!(cache.live_len(), 1);
            assert!(cache.try_get(rect).is_some());
        }
        assert_eq!(cache.len(), 1);
        assert!(cache.try_get(rect).is_none());
        assert_eq!(cache.purge(|_| true), 1);
        assert_eq!(cache.inserts_since_sweep(), 0);
    }

    #[test]
    fn remove_drops_live_entries() {
        let document = Document::parse_svg(r#"<svg><rect id="r"/></svg>"#).unwrap();
        let rect = document.element_by_id("r").unwrap();
        let session = ScriptSession::new(document);
        let wrapper = session.create_wrapper(Some(rect)).unwrap().unwrap();

        let mut cache = super::ProxyCache::new();
        cache.insert(rect, &wrapper);
        assert!(cache.remove(rect));
        assert!(cache.try_get(rect).is_none());
        assert!(!cache.remove(rect));
        assert!(!wrapper.is_disposed());
    }

    #[test]
    fn insert_if_absent_keeps_live_entry() {
        let document = Document::parse_svg(r#"<svg><rect id="r"/></svg>"#).unwrap();
        let rect = document.element_by_id("r").unwrap();
        let session = ScriptSession::new(document);
        let first = session.create_wrapper(Some(rect)).unwrap().unwrap();
        first.dispose();
        let second = session.create_wrapper(Some(rect)).unwrap().unwrap();
        assert_ne!(first.id(), second.id());

        let mut cache = super::ProxyCache::new();
        assert!(cache.insert_if_absent(rect, &second).is_none());
        let kept = cache.insert_if_absent(rect, &first).unwrap();
        assert!(kept.ptr_eq(&second));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.try_get(rect).unwrap().id(), second.id());
        assert!(!cache.release(rect, first.id()));
    }

    #[test]
    fn insert_if_absent_replaces_dead_entry() {
        let document = Document::parse_svg(r#"<svg><rect id="r"/></svg>"#).unwrap();
        let rect = document.element_by_id("r").unwrap();
        let session = ScriptSession::new(document);

        let mut cache = super::ProxyCache::new();
        {
            let gone = session.create_wrapper(Some(rect)).unwrap().unwrap();
            cache.insert(rect, &gone);
        }
        let replacement = session.create_wrapper(Some(rect)).unwrap().unwrap();
        assert!(cache.insert_if_absent(rect, &replacement).is_none());
        assert_eq!(cache.len(), 1);
        assert!(cache.try_get(rect).unwrap().ptr_eq(&replacement));
    }
}
