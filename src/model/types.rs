use serde::{Deserialize, Serialize};

pub const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";

/// Runtime type of a native document object.
///
/// Each variant has a stable key (the DOM interface name) and at most one
/// immediate ancestor. The bridge only ever looks one level up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NativeType {
    Node,
    Document,
    CharacterData,
    Text,
    Comment,
    Attr,
    Element,
    SvgElement,
    SvgGraphicsElement,
    SvgSvgElement,
    SvgGElement,
    SvgUseElement,
    SvgTextElement,
    SvgImageElement,
    SvgGeometryElement,
    SvgRectElement,
    SvgCircleElement,
    SvgEllipseElement,
    SvgLineElement,
    SvgPathElement,
    SvgPolygonElement,
    SvgPolylineElement,
    SvgStyleElement,
    SvgTitleElement,
    SvgDescElement,
    SvgScriptElement,
    NodeList,
    CssStyleDeclaration,
    SvgLength,
    SvgMatrix,
    SvgPoint,
    SvgRect,
    Event,
    UiEvent,
    MouseEvent,
}

impl NativeType {
    pub fn key(self) -> &'static str {
        match self {
            NativeType::Node => "Node",
            NativeType::Document => "Document",
            NativeType::CharacterData => "CharacterData",
            NativeType::Text => "Text",
            NativeType::Comment => "Comment",
            NativeType::Attr => "Attr",
            NativeType::Element => "Element",
            NativeType::SvgElement => "SVGElement",
            NativeType::SvgGraphicsElement => "SVGGraphicsElement",
            NativeType::SvgSvgElement => "SVGSVGElement",
            NativeType::SvgGElement => "SVGGElement",
            NativeType::SvgUseElement => "SVGUseElement",
            NativeType::SvgTextElement => "SVGTextElement",
            NativeType::SvgImageElement => "SVGImageElement",
            NativeType::SvgGeometryElement => "SVGGeometryElement",
            NativeType::SvgRectElement => "SVGRectElement",
            NativeType::SvgCircleElement => "SVGCircleElement",
            NativeType::SvgEllipseElement => "SVGEllipseElement",
            NativeType::SvgLineElement => "SVGLineElement",
            NativeType::SvgPathElement => "SVGPathElement",
            NativeType::SvgPolygonElement => "SVGPolygonElement",
            NativeType::SvgPolylineElement => "SVGPolylineElement",
            NativeType::SvgStyleElement => "SVGStyleElement",
            NativeType::SvgTitleElement => "SVGTitleElement",
            NativeType::SvgDescElement => "SVGDescElement",
            NativeType::SvgScriptElement => "SVGScriptElement",
            NativeType::NodeList => "NodeList",
            NativeType::CssStyleDeclaration => "CSSStyleDeclaration",
            NativeType::SvgLength => "SVGLength",
            NativeType::SvgMatrix => "SVGMatrix",
            NativeType::SvgPoint => "SVGPoint",
            NativeType::SvgRect => "SVGRect",
            NativeType::Event => "Event",
            NativeType::UiEvent => "UIEvent",
            NativeType::MouseEvent => "MouseEvent",
        }
    }

    /// Immediate ancestor in the native type hierarchy.
    pub fn parent(self) -> Option<NativeType> {
        use NativeType::*;
        match self {
            Node | NodeList | CssStyleDeclaration | SvgLength | SvgMatrix | SvgPoint | SvgRect
            | Event => None,
            Document | CharacterData | Attr | Element => Some(Node),
            Text | Comment => Some(CharacterData),
            SvgElement => Some(Element),
            SvgGraphicsElement | SvgStyleElement | SvgTitleElement | SvgDescElement
            | SvgScriptElement => Some(SvgElement),
            SvgSvgElement | SvgGElement | SvgUseElement | SvgTextElement | SvgImageElement
            | SvgGeometryElement => Some(SvgGraphicsElement),
            SvgRectElement | SvgCircleElement | SvgEllipseElement | SvgLineElement
            | SvgPathElement | SvgPolygonElement | SvgPolylineElement => Some(SvgGeometryElement),
            UiEvent => Some(Event),
            MouseEvent => Some(UiEvent),
        }
    }

    /// Standalone values (matrix, point, rect) that nothing in the tree refers
    /// to. They belong to the proxy that was handed out for them.
    pub fn is_standalone_value(self) -> bool {
        matches!(
            self,
            NativeType::SvgMatrix | NativeType::SvgPoint | NativeType::SvgRect
        )
    }

    /// Whether `self` is `ancestor` or descends from it.
    pub fn is_a(self, ancestor: NativeType) -> bool {
        let mut current = Some(self);
        while let Some(ty) = current {
            if ty == ancestor {
                return true;
            }
            current = ty.parent();
        }
        false
    }

    /// Native type for an element, chosen from its namespace and local name.
    pub fn for_element(namespace: Option<&str>, local_name: &str) -> NativeType {
        if namespace != Some(SVG_NAMESPACE) {
            return NativeType::Element;
        }
        match local_name {
            "svg" => NativeType::SvgSvgElement,
            "g" => NativeType::SvgGElement,
            "use" => NativeType::SvgUseElement,
            "text" => NativeType::SvgTextElement,
            "image" => NativeType::SvgImageElement,
            "rect" => NativeType::SvgRectElement,
            "circle" => NativeType::SvgCircleElement,
            "ellipse" => NativeType::SvgEllipseElement,
            "line" => NativeType::SvgLineElement,
            "path" => NativeType::SvgPathElement,
            "polygon" => NativeType::SvgPolygonElement,
            "polyline" => NativeType::SvgPolylineElement,
            "style" => NativeType::SvgStyleElement,
            "title" => NativeType::SvgTitleElement,
            "desc" => NativeType::SvgDescElement,
            "script" => NativeType::SvgScriptElement,
            _ => NativeType::SvgElement,
        }
    }
}

impl std::fmt::Display for NativeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}
