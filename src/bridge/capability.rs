//! Optional interfaces shared across wrapper kinds.
//!
//! A proxy is only usable through one of these traits after a checked cast
//! (`as_stylable()` and friends), which consults [`WrapperKind::supports`].

use tracing::debug;

use super::error::{BridgeError, BridgeResult};
use super::kind::{Capability, WrapperKind};
use super::listeners::ListenerId;
use super::wrapper::WrapperInstance;

pub trait EventTarget {
    fn add_event_listener(&self, event_type: &str, listener: ListenerId) -> BridgeResult<bool>;
    fn remove_event_listener(&self, event_type: &str, listener: ListenerId) -> BridgeResult<bool>;
}

pub trait Stylable {
    /// The element's inline style declaration; the same proxy on every call.
    fn style(&self) -> BridgeResult<WrapperInstance>;
    fn class_name(&self) -> BridgeResult<String>;
    fn set_class_name(&self, value: &str) -> BridgeResult<()>;
}

pub trait Transformable {
    /// Matrix of the element's own `transform` attribute.
    fn transform(&self) -> BridgeResult<WrapperInstance>;
}

pub trait Locatable {
    fn bounding_box(&self) -> BridgeResult<WrapperInstance>;
    /// Matrix from the element's user space to the outermost viewport.
    fn ctm(&self) -> BridgeResult<WrapperInstance>;
    fn nearest_viewport_element(&self) -> BridgeResult<Option<WrapperInstance>>;
}

impl WrapperInstance {
    fn supports(&self, capability: Capability) -> bool {
        self.kind().supports(capability)
    }

    pub fn as_event_target(&self) -> Option<&dyn EventTarget> {
        self.supports(Capability::EventTarget)
            .then_some(self as &dyn EventTarget)
    }

    pub fn as_stylable(&self) -> Option<&dyn Stylable> {
        self.supports(Capability::Stylable)
            .then_some(self as &dyn Stylable)
    }

    pub fn as_transformable(&self) -> Option<&dyn Transformable> {
        self.supports(Capability::Transformable)
            .then_some(self as &dyn Transformable)
    }

    pub fn as_locatable(&self) -> Option<&dyn Locatable> {
        self.supports(Capability::Locatable)
            .then_some(self as &dyn Locatable)
    }

    pub(crate) fn require(&self, capability: Capability) -> BridgeResult<()> {
        if self.supports(capability) {
            return Ok(());
        }
        Err(BridgeError::Incompatible {
            kind: self.kind(),
            capability,
        })
    }
}

impl EventTarget for WrapperInstance {
    fn add_event_listener(&self, event_type: &str, listener: ListenerId) -> BridgeResult<bool> {
        self.require(Capability::EventTarget)?;
        let handle = self.native()?;
        let added = self
            .session()
            .listeners
            .borrow_mut()
            .add(handle, event_type, listener);
        debug!(
            target = "svgbridge",
            proxy = %self.id(),
            event_type,
            listener = listener.0,
            added,
            "addEventListener"
        );
        Ok(added)
    }

    fn remove_event_listener(&self, event_type: &str, listener: ListenerId) -> BridgeResult<bool> {
        self.require(Capability::EventTarget)?;
        let handle = self.native()?;
        Ok(self
            .session()
            .listeners
            .borrow_mut()
            .remove(handle, event_type, listener))
    }
}

impl Stylable for WrapperInstance {
    fn style(&self) -> BridgeResult<WrapperInstance> {
        self.require(Capability::Stylable)?;
        let style = self.write(|document, handle| document.style_of(handle))?;
        self.wrap_present(style)
    }

    fn class_name(&self) -> BridgeResult<String> {
        self.require(Capability::Stylable)?;
        self.read(|document, handle| Ok(document.attribute(handle, "class")?.unwrap_or_default()))
    }

    fn set_class_name(&self, value: &str) -> BridgeResult<()> {
        self.require(Capability::Stylable)?;
        self.write(|document, handle| document.set_attribute(handle, "class", value))
    }
}

impl Transformable for WrapperInstance {
    fn transform(&self) -> BridgeResult<WrapperInstance> {
        self.require(Capability::Transformable)?;
        let matrix = self.write(|document, handle| {
            let matrix = document.local_transform(handle)?;
            Ok(document.create_matrix(matrix))
        })?;
        self.wrap_value(matrix)
    }
}

impl Locatable for WrapperInstance {
    fn bounding_box(&self) -> BridgeResult<WrapperInstance> {
        self.require(Capability::Locatable)?;
        let rect = self.write(|document, handle| {
            let rect = document.bounding_box(handle)?;
            Ok(document.create_rect(rect))
        })?;
        self.wrap_value(rect)
    }

    fn ctm(&self) -> BridgeResult<WrapperInstance> {
        self.require(Capability::Locatable)?;
        let matrix = self.write(|document, handle| {
            let matrix = document.cumulative_transform(handle)?;
            Ok(document.create_matrix(matrix))
        })?;
        self.wrap_value(matrix)
    }

    fn nearest_viewport_element(&self) -> BridgeResult<Option<WrapperInstance>> {
        self.require(Capability::Locatable)?;
        let viewport = self.read(|document, handle| document.nearest_viewport(handle))?;
        self.wrap(viewport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::ScriptSession;
    use crate::model::Document;

    #[test]
    fn checked_casts_follow_kind() {
        let document = Document::parse_svg(
            r#"<svg><rect id="r" width="4" height="2" transform="translate(1 1)"/></svg>"#,
        )
        .unwrap();
        let rect = document.element_by_id("r").unwrap();
        let root = document.root();
        let session = ScriptSession::new(document);

        let rect = session.create_wrapper(Some(rect)).unwrap().unwrap();
        assert_eq!(rect.kind(), WrapperKind::SvgRect);
        let locatable = rect.as_locatable().expect("rect is locatable");
        let bbox = locatable.bounding_box().unwrap();
        assert_eq!(bbox.get("width").unwrap().as_f64(), Some(4.0));

        let ctm = locatable.ctm().unwrap();
        assert_eq!(ctm.get("e").unwrap().as_f64(), Some(1.0));

        let style = rect.as_stylable().unwrap().style().unwrap();
        assert!(style.ptr_eq(&rect.as_stylable().unwrap().style().unwrap()));

        let document = session.create_wrapper(Some(root)).unwrap().unwrap();
        assert!(document.as_stylable().is_none());
        assert!(document.as_event_target().is_some());
    }

    #[test]
    fn geometry_values_do_not_accumulate() {
        let document = Document::parse_svg(r#"<svg><rect id="r" width="4" height="2"/></svg>"#).unwrap();
        let rect = document.element_by_id("r").unwrap();
        let session = ScriptSession::new(document);
        let rect = session.create_wrapper(Some(rect)).unwrap().unwrap();
        let baseline = session.document().len();

        for _ in 0..100 {
            rect.bounding_box().unwrap().dispose();
            drop(rect.ctm().unwrap());
            drop(rect.transform().unwrap());
        }
        assert_eq!(session.document().len(), baseline);
    }

    #[test]
    fn unwrappable_value_is_freed() {
        let document = Document::parse_svg(r#"<svg><rect id="r" width="4" height="2"/></svg>"#).unwrap();
        let rect = document.element_by_id("r").unwrap();
        let session = ScriptSession::with_registry(
            document,
            std::sync::Arc::new(crate::bridge::WrapperRegistry::with_population(|table| {
                table.register("SVGRectElement", || WrapperKind::SvgRect);
            })),
            crate::config::CacheConfig::default(),
        );
        let rect = session.create_wrapper(Some(rect)).unwrap().unwrap();
        let baseline = session.document().len();

        assert_eq!(
            rect.bounding_box().err(),
            Some(BridgeError::UnregisteredType("SVGRect".to_string()))
        );
        assert_eq!(session.document().len(), baseline);
    }
}
