use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::NativeHandle;

/// Opaque handle to a script closure owned by the scripting engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
struct Registration {
    event_type: String,
    listener: ListenerId,
}

/// Session-level record of which closures listen on which native targets.
#[derive(Debug, Default)]
pub struct ListenerTable {
    by_target: HashMap<NativeHandle, Vec<Registration>>,
}

impl ListenerTable {
    /// Returns false when the same listener was already registered for the type.
    pub fn add(&mut self, target: NativeHandle, event_type: &str, listener: ListenerId) -> bool {
        let registrations = self.by_target.entry(target).or_default();
        let registration = Registration {
            event_type: event_type.to_string(),
            listener,
        };
        if registrations.contains(&registration) {
            return false;
        }
        registrations.push(registration);
        true
    }

    pub fn remove(&mut self, target: NativeHandle, event_type: &str, listener: ListenerId) -> bool {
        let Some(registrations) = self.by_target.get_mut(&target) else {
            return false;
        };
        let before = registrations.len();
        registrations.retain(|r| !(r.event_type == event_type && r.listener == listener));
        let removed = registrations.len() != before;
        if registrations.is_empty() {
            self.by_target.remove(&target);
        }
        removed
    }

    pub fn listeners_for(&self, target: NativeHandle, event_type: &str) -> Vec<ListenerId> {
        self.by_target
            .get(&target)
            .map(|registrations| {
                registrations
                    .iter()
                    .filter(|r| r.event_type == event_type)
                    .map(|r| r.listener)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_listening(&self, event_type: &str) -> bool {
        self.by_target
            .values()
            .flatten()
            .any(|r| r.event_type == event_type)
    }

    /// Drop every registration on targets that no longer exist.
    pub fn prune(&mut self, is_live: impl Fn(NativeHandle) -> bool) -> usize {
        let before = self.by_target.len();
        self.by_target.retain(|target, _| is_live(*target));
        before - self.by_target.len()
    }

    pub fn clear(&mut self) {
        self.by_target.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Document;

    #[test]
    fn add_is_deduplicated_per_type() {
        let document = Document::new();
        let target = document.root();
        let mut table = ListenerTable::default();

        assert!(table.add(target, "click", ListenerId(1)));
        assert!(!table.add(target, "click", ListenerId(1)));
        assert!(table.add(target, "keydown", ListenerId(1)));
        assert_eq!(table.listeners_for(target, "click"), vec![ListenerId(1)]);
        assert!(table.is_listening("keydown"));
    }

    #[test]
    fn remove_forgets_empty_targets() {
        let document = Document::new();
        let target = document.root();
        let mut table = ListenerTable::default();
        table.add(target, "click", ListenerId(7));

        assert!(table.remove(target, "click", ListenerId(7)));
        assert!(!table.remove(target, "click", ListenerId(7)));
        assert!(!table.is_listening("click"));
    }

    #[test]
    fn prune_drops_destroyed_targets() {
        let mut document = Document::new();
        let text = document.create_text("detached");
        let root = document.root();
        let mut table = ListenerTable::default();
        table.add(root, "click", ListenerId(1));
        table.add(text, "click", ListenerId(2));

        document.destroy(text).unwrap();
        assert_eq!(table.prune(|handle| document.is_live(handle)), 1);
        assert!(table.listeners_for(text, "click").is_empty());
        assert_eq!(table.listeners_for(root, "click"), vec![ListenerId(1)]);
        assert_eq!(table.prune(|handle| document.is_live(handle)), 0);
    }
}
