use serde::Serialize;

/// Closed set of script-facing wrapper shapes.
///
/// Kinds form their own single-inheritance chain (see [`WrapperKind::base`]),
/// which decides which members a proxy exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WrapperKind {
    Node,
    Document,
    CharacterData,
    Attr,
    Element,
    SvgElement,
    SvgGraphics,
    SvgRoot,
    SvgGeometry,
    SvgRect,
    SvgCircle,
    NodeList,
    StyleDeclaration,
    Length,
    Matrix,
    Point,
    Rect,
    Event,
    MouseEvent,
}

/// Optional interfaces a wrapper kind may implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Capability {
    EventTarget,
    Stylable,
    Transformable,
    Locatable,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Capability::EventTarget => "EventTarget",
            Capability::Stylable => "Stylable",
            Capability::Transformable => "Transformable",
            Capability::Locatable => "Locatable",
        };
        f.write_str(name)
    }
}

impl WrapperKind {
    /// Interface name script code sees.
    pub fn interface_name(self) -> &'static str {
        match self {
            WrapperKind::Node => "Node",
            WrapperKind::Document => "Document",
            WrapperKind::CharacterData => "CharacterData",
            WrapperKind::Attr => "Attr",
            WrapperKind::Element => "Element",
            WrapperKind::SvgElement => "SVGElement",
            WrapperKind::SvgGraphics => "SVGGraphicsElement",
            WrapperKind::SvgRoot => "SVGSVGElement",
            WrapperKind::SvgGeometry => "SVGGeometryElement",
            WrapperKind::SvgRect => "SVGRectElement",
            WrapperKind::SvgCircle => "SVGCircleElement",
            WrapperKind::NodeList => "NodeList",
            WrapperKind::StyleDeclaration => "CSSStyleDeclaration",
            WrapperKind::Length => "SVGLength",
            WrapperKind::Matrix => "SVGMatrix",
            WrapperKind::Point => "SVGPoint",
            WrapperKind::Rect => "SVGRect",
            WrapperKind::Event => "Event",
            WrapperKind::MouseEvent => "MouseEvent",
        }
    }

    pub fn base(self) -> Option<WrapperKind> {
        match self {
            WrapperKind::Document
            | WrapperKind::CharacterData
            | WrapperKind::Attr
            | WrapperKind::Element => Some(WrapperKind::Node),
            WrapperKind::SvgElement => Some(WrapperKind::Element),
            WrapperKind::SvgGraphics => Some(WrapperKind::SvgElement),
            WrapperKind::SvgRoot | WrapperKind::SvgGeometry => Some(WrapperKind::SvgGraphics),
            WrapperKind::SvgRect | WrapperKind::SvgCircle => Some(WrapperKind::SvgGeometry),
            WrapperKind::MouseEvent => Some(WrapperKind::Event),
            _ => None,
        }
    }

    /// `self` followed by every base kind, most derived first.
    pub fn chain(self) -> impl Iterator<Item = WrapperKind> {
        std::iter::successors(Some(self), |kind| kind.base())
    }

    fn introduces(self) -> &'static [Capability] {
        match self {
            WrapperKind::Node => &[Capability::EventTarget],
            WrapperKind::SvgElement => &[Capability::Stylable],
            WrapperKind::SvgGraphics => &[Capability::Transformable, Capability::Locatable],
            _ => &[],
        }
    }

    pub fn supports(self, capability: Capability) -> bool {
        self.chain()
            .any(|kind| kind.introduces().contains(&capability))
    }
}

impl std::fmt::Display for WrapperKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.interface_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capabilities_are_inherited() {
        assert!(WrapperKind::SvgRect.supports(Capability::EventTarget));
        assert!(WrapperKind::SvgRect.supports(Capability::Locatable));
        assert!(WrapperKind::SvgElement.supports(Capability::Stylable));
        assert!(!WrapperKind::SvgElement.supports(Capability::Transformable));
        assert!(!WrapperKind::Matrix.supports(Capability::EventTarget));
    }

    #[test]
    fn chain_ends_at_root_kind() {
        let chain: Vec<_> = WrapperKind::SvgCircle.chain().collect();
        assert_eq!(chain.first(), Some(&WrapperKind::SvgCircle));
        assert_eq!(chain.last(), Some(&WrapperKind::Node));
        assert_eq!(chain.len(), 6);
    }
}
