use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use tracing::{debug, info};

use super::kind::WrapperKind;

/// Builds the wrapper for an instance of a registered native type.
pub type WrapperConstructor = fn() -> WrapperKind;

/// Fills a fresh table during first-use initialization.
pub type Population = fn(&mut RegistryTable);

#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub key: String,
    pub constructor: WrapperConstructor,
}

/// Native type key to wrapper constructor. Keys compare case-insensitively.
#[derive(Debug, Default, Clone)]
pub struct RegistryTable {
    entries: HashMap<String, RegistryEntry>,
}

impl RegistryTable {
    /// Insert or replace the constructor for `key`.
    pub fn register(&mut self, key: &str, constructor: WrapperConstructor) {
        let previous = self.entries.insert(
            key.to_ascii_lowercase(),
            RegistryEntry {
                key: key.to_string(),
                constructor,
            },
        );
        if previous.is_some() {
            debug!(target = "svgbridge", key, "replaced wrapper registration");
        }
    }

    pub fn lookup(&self, key: &str) -> Option<WrapperConstructor> {
        self.entries
            .get(&key.to_ascii_lowercase())
            .map(|entry| entry.constructor)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.values()
    }
}

/// Lazily populated, then read-only, registry of wrapper constructors.
///
/// Population runs exactly once; concurrent first users block until the
/// winning initializer has finished and then all see the same table.
pub struct WrapperRegistry {
    table: OnceLock<RegistryTable>,
    populate: Population,
}

impl Default for WrapperRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WrapperRegistry {
    pub fn new() -> Self {
        Self::with_population(register_svg_wrappers)
    }

    pub fn with_population(populate: Population) -> Self {
        Self {
            table: OnceLock::new(),
            populate,
        }
    }

    /// Process-wide registry with the default SVG wrappers.
    pub fn shared() -> Arc<WrapperRegistry> {
        static SHARED: OnceLock<Arc<WrapperRegistry>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| Arc::new(WrapperRegistry::new())))
    }

    pub fn initialize(&self) -> &RegistryTable {
        self.table.get_or_init(|| {
            let mut table = RegistryTable::default();
            (self.populate)(&mut table);
            info!(
                target = "svgbridge",
                entries = table.len(),
                "wrapper registry initialized"
            );
            table
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.table.get().is_some()
    }

    pub fn lookup(&self, key: &str) -> Option<WrapperConstructor> {
        self.initialize().lookup(key)
    }
}

/// Default table. Concrete types without an entry resolve through their
/// immediate native ancestor (for example `SVGPathElement` through
/// `SVGGeometryElement`).
pub fn register_svg_wrappers(table: &mut RegistryTable) {
    table.register("Node", || WrapperKind::Node);
    table.register("Document", || WrapperKind::Document);
    table.register("CharacterData", || WrapperKind::CharacterData);
    table.register("Text", || WrapperKind::CharacterData);
    table.register("Comment", || WrapperKind::CharacterData);
    table.register("Attr", || WrapperKind::Attr);
    table.register("Element", || WrapperKind::Element);
    table.register("SVGElement", || WrapperKind::SvgElement);
    table.register("SVGGraphicsElement", || WrapperKind::SvgGraphics);
    table.register("SVGSVGElement", || WrapperKind::SvgRoot);
    table.register("SVGGeometryElement", || WrapperKind::SvgGeometry);
    table.register("SVGRectElement", || WrapperKind::SvgRect);
    table.register("SVGCircleElement", || WrapperKind::SvgCircle);
    table.register("NodeList", || WrapperKind::NodeList);
    table.register("CSSStyleDeclaration", || WrapperKind::StyleDeclaration);
    table.register("SVGLength", || WrapperKind::Length);
    table.register("SVGMatrix", || WrapperKind::Matrix);
    table.register("SVGPoint", || WrapperKind::Point);
    table.register("SVGRect", || WrapperKind::Rect);
    table.register("Event", || WrapperKind::Event);
    table.register("UIEvent", || WrapperKind::Event);
    table.register("MouseEvent", || WrapperKind::MouseEvent);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn lookup_ignores_case() {
        let registry = WrapperRegistry::new();
        let constructor = registry.lookup("svgrectelement").expect("rect entry");
        assert_eq!(constructor(), WrapperKind::SvgRect);
        assert!(registry.lookup("SVGPathElement").is_none());
    }

    #[test]
    fn register_is_last_write_wins() {
        let mut table = RegistryTable::default();
        table.register("Node", || WrapperKind::Node);
        table.register("NODE", || WrapperKind::Element);
        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup("node").map(|c| c()), Some(WrapperKind::Element));
    }

    #[test]
    fn initialization_is_lazy() {
        let registry = WrapperRegistry::new();
        assert!(!registry.is_initialized());
        registry.initialize();
        assert!(registry.is_initialized());
    }

    static POPULATIONS: AtomicUsize = AtomicUsize::new(0);

    fn counting_population(table: &mut RegistryTable) {
        POPULATIONS.fetch_add(1, Ordering::SeqCst);
        table.register("Node", || WrapperKind::Node);
    }

    #[test]
    fn concurrent_first_use_populates_once() {
        let registry = Arc::new(WrapperRegistry::with_population(counting_population));
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.lookup("Node").is_some())
            })
            .collect();
        for worker in workers {
            assert!(worker.join().unwrap());
        }
        assert_eq!(POPULATIONS.load(Ordering::SeqCst), 1);
    }
}
