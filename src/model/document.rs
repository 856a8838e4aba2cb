use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::debug;

use super::arena::{Arena, NativeHandle};
use super::types::NativeType;
use super::values::{
    format_declarations, parse_declarations, Length, LengthUnit, Matrix, Point, RectValue,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("native object {0} is no longer alive")]
    Stale(NativeHandle),
    #[error("native object {handle} is a {actual}, expected {expected}")]
    WrongType {
        handle: NativeHandle,
        expected: &'static str,
        actual: NativeType,
    },
    #[error("{child} is not a child of {parent}")]
    NotAChild {
        parent: NativeHandle,
        child: NativeHandle,
    },
    #[error("cannot insert {child} under {parent}")]
    HierarchyRequest {
        parent: NativeHandle,
        child: NativeHandle,
    },
    #[error("{0} is still attached to the document")]
    Attached(NativeHandle),
    #[error("failed to parse SVG markup: {0}")]
    Parse(String),
}

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Clone)]
pub struct ElementData {
    pub local_name: String,
    pub namespace: Option<String>,
    pub attributes: Vec<(String, String)>,
}

impl ElementData {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone)]
pub enum NodeContent {
    Document,
    Element(ElementData),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
pub(crate) struct NodeData {
    parent: Option<NativeHandle>,
    children: Vec<NativeHandle>,
    content: NodeContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MouseData {
    pub client_x: f64,
    pub client_y: f64,
    pub button: i16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventData {
    pub event_type: String,
    pub target: Option<NativeHandle>,
    pub current_target: Option<NativeHandle>,
    pub bubbles: bool,
    pub cancelable: bool,
    pub default_prevented: bool,
    pub propagation_stopped: bool,
    pub mouse: Option<MouseData>,
}

#[derive(Debug, Clone)]
pub(crate) enum NativeData {
    Node(NodeData),
    Attr { owner: NativeHandle, name: String },
    ChildList { owner: NativeHandle },
    Style { owner: NativeHandle },
    Length { owner: NativeHandle, attribute: String },
    Matrix(Matrix),
    Point(Point),
    Rect(RectValue),
    Event(EventData),
}

#[derive(Debug, Clone)]
pub(crate) struct NativeObject {
    ty: NativeType,
    data: NativeData,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Derived {
    Style,
    ChildNodes,
    Attr(String),
    Length(String),
}

/// Native SVG document. Owns every native object the bridge can proxy.
pub struct Document {
    objects: Arena<NativeObject>,
    root: NativeHandle,
    derived: HashMap<(NativeHandle, Derived), NativeHandle>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut objects = Arena::new();
        let root = objects.insert(NativeObject {
            ty: NativeType::Document,
            data: NativeData::Node(NodeData {
                parent: None,
                children: Vec::new(),
                content: NodeContent::Document,
            }),
        });
        Self {
            objects,
            root,
            derived: HashMap::new(),
        }
    }

    pub fn root(&self) -> NativeHandle {
        self.root
    }

    pub fn document_element(&self) -> Option<NativeHandle> {
        self.children(self.root)
            .ok()?
            .iter()
            .copied()
            .find(|child| self.element(*child).is_ok())
    }

    pub fn is_live(&self, handle: NativeHandle) -> bool {
        self.objects.contains(handle)
    }

    pub fn type_of(&self, handle: NativeHandle) -> Option<NativeType> {
        self.objects.get(handle).map(|object| object.ty)
    }

    /// Number of live native objects, derived values included.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.len() == 0
    }

    fn object(&self, handle: NativeHandle) -> ModelResult<&NativeObject> {
        self.objects.get(handle).ok_or(ModelError::Stale(handle))
    }

    fn object_mut(&mut self, handle: NativeHandle) -> ModelResult<&mut NativeObject> {
        self.objects.get_mut(handle).ok_or(ModelError::Stale(handle))
    }

    fn wrong_type(&self, handle: NativeHandle, expected: &'static str) -> ModelError {
        match self.type_of(handle) {
            Some(actual) => ModelError::WrongType {
                handle,
                expected,
                actual,
            },
            None => ModelError::Stale(handle),
        }
    }

    fn node(&self, handle: NativeHandle) -> ModelResult<&NodeData> {
        match &self.object(handle)?.data {
            NativeData::Node(node) => Ok(node),
            _ => Err(self.wrong_type(handle, "Node")),
        }
    }

    fn node_mut(&mut self, handle: NativeHandle) -> ModelResult<&mut NodeData> {
        let is_node = matches!(self.object(handle)?.data, NativeData::Node(_));
        if !is_node {
            return Err(self.wrong_type(handle, "Node"));
        }
        match &mut self.object_mut(handle)?.data {
            NativeData::Node(node) => Ok(node),
            _ => Err(ModelError::Stale(handle)),
        }
    }

    pub fn content(&self, handle: NativeHandle) -> ModelResult<&NodeContent> {
        Ok(&self.node(handle)?.content)
    }

    pub fn element(&self, handle: NativeHandle) -> ModelResult<&ElementData> {
        match &self.node(handle)?.content {
            NodeContent::Element(element) => Ok(element),
            _ => Err(self.wrong_type(handle, "Element")),
        }
    }

    fn element_mut(&mut self, handle: NativeHandle) -> ModelResult<&mut ElementData> {
        self.element(handle)?;
        match &mut self.node_mut(handle)?.content {
            NodeContent::Element(element) => Ok(element),
            _ => Err(ModelError::Stale(handle)),
        }
    }

    fn insert_node(&mut self, ty: NativeType, content: NodeContent) -> NativeHandle {
        self.objects.insert(NativeObject {
            ty,
            data: NativeData::Node(NodeData {
                parent: None,
                children: Vec::new(),
                content,
            }),
        })
    }

    pub fn create_element(&mut self, namespace: Option<&str>, local_name: &str) -> NativeHandle {
        let ty = NativeType::for_element(namespace, local_name);
        self.insert_node(
            ty,
            NodeContent::Element(ElementData {
                local_name: local_name.to_string(),
                namespace: namespace.map(str::to_string),
                attributes: Vec::new(),
            }),
        )
    }

    pub fn create_text(&mut self, data: &str) -> NativeHandle {
        self.insert_node(NativeType::Text, NodeContent::Text(data.to_string()))
    }

    pub fn create_comment(&mut self, data: &str) -> NativeHandle {
        self.insert_node(NativeType::Comment, NodeContent::Comment(data.to_string()))
    }

    pub fn parent(&self, handle: NativeHandle) -> ModelResult<Option<NativeHandle>> {
        Ok(self.node(handle)?.parent)
    }

    pub fn children(&self, handle: NativeHandle) -> ModelResult<&[NativeHandle]> {
        Ok(&self.node(handle)?.children)
    }

    fn sibling(&self, handle: NativeHandle, offset: isize) -> ModelResult<Option<NativeHandle>> {
        let Some(parent) = self.parent(handle)? else {
            return Ok(None);
        };
        let siblings = self.children(parent)?;
        let position = siblings
            .iter()
            .position(|sibling| *sibling == handle)
            .ok_or(ModelError::NotAChild {
                parent,
                child: handle,
            })?;
        let target = position as isize + offset;
        if target < 0 {
            return Ok(None);
        }
        Ok(siblings.get(target as usize).copied())
    }

    pub fn previous_sibling(&self, handle: NativeHandle) -> ModelResult<Option<NativeHandle>> {
        self.sibling(handle, -1)
    }

    pub fn next_sibling(&self, handle: NativeHandle) -> ModelResult<Option<NativeHandle>> {
        self.sibling(handle, 1)
    }

    /// Whether `node` is `ancestor` or one of its descendants.
    pub fn contains(&self, ancestor: NativeHandle, node: NativeHandle) -> ModelResult<bool> {
        let mut current = Some(node);
        while let Some(handle) = current {
            if handle == ancestor {
                return Ok(true);
            }
            current = self.parent(handle)?;
        }
        Ok(false)
    }

    /// Ancestors of `handle`, nearest first.
    pub fn ancestors(&self, handle: NativeHandle) -> ModelResult<Vec<NativeHandle>> {
        let mut chain = Vec::new();
        let mut current = self.parent(handle)?;
        while let Some(parent) = current {
            chain.push(parent);
            current = self.parent(parent)?;
        }
        Ok(chain)
    }

    pub fn append_child(&mut self, parent: NativeHandle, child: NativeHandle) -> ModelResult<()> {
        self.insert_before(parent, child, None)
    }

    pub fn insert_before(
        &mut self,
        parent: NativeHandle,
        child: NativeHandle,
        reference: Option<NativeHandle>,
    ) -> ModelResult<()> {
        let accepts_children = matches!(
            self.content(parent)?,
            NodeContent::Document | NodeContent::Element(_)
        );
        let insertable = !matches!(self.content(child)?, NodeContent::Document);
        if !accepts_children || !insertable || self.contains(child, parent)? {
            return Err(ModelError::HierarchyRequest { parent, child });
        }
        if let Some(reference) = reference {
            if self.parent(reference)? != Some(parent) {
                return Err(ModelError::NotAChild {
                    parent,
                    child: reference,
                });
            }
        }

        if let Some(previous) = self.parent(child)? {
            self.node_mut(previous)?.children.retain(|c| *c != child);
        }

        let parent_node = self.node_mut(parent)?;
        let position = reference
            .and_then(|reference| parent_node.children.iter().position(|c| *c == reference))
            .unwrap_or(parent_node.children.len());
        parent_node.children.insert(position, child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    pub fn remove_child(&mut self, parent: NativeHandle, child: NativeHandle) -> ModelResult<()> {
        if self.parent(child)? != Some(parent) {
            return Err(ModelError::NotAChild { parent, child });
        }
        self.node_mut(parent)?.children.retain(|c| *c != child);
        self.node_mut(child)?.parent = None;
        Ok(())
    }

    /// DOM `nodeName`.
    pub fn node_name(&self, handle: NativeHandle) -> ModelResult<String> {
        let object = self.object(handle)?;
        let name = match &object.data {
            NativeData::Node(node) => match &node.content {
                NodeContent::Document => "#document".to_string(),
                NodeContent::Element(element) => element.local_name.clone(),
                NodeContent::Text(_) => "#text".to_string(),
                NodeContent::Comment(_) => "#comment".to_string(),
            },
            NativeData::Attr { name, .. } => name.clone(),
            _ => return Err(self.wrong_type(handle, "Node")),
        };
        Ok(name)
    }

    /// DOM `nodeType` code.
    pub fn node_type(&self, handle: NativeHandle) -> ModelResult<u16> {
        let object = self.object(handle)?;
        let code = match &object.data {
            NativeData::Node(node) => match node.content {
                NodeContent::Element(_) => 1,
                NodeContent::Text(_) => 3,
                NodeContent::Comment(_) => 8,
                NodeContent::Document => 9,
            },
            NativeData::Attr { .. } => 2,
            _ => return Err(self.wrong_type(handle, "Node")),
        };
        Ok(code)
    }

    pub fn character_data(&self, handle: NativeHandle) -> ModelResult<&str> {
        match self.content(handle)? {
            NodeContent::Text(data) | NodeContent::Comment(data) => Ok(data),
            _ => Err(self.wrong_type(handle, "CharacterData")),
        }
    }

    pub fn set_character_data(&mut self, handle: NativeHandle, value: &str) -> ModelResult<()> {
        self.character_data(handle)?;
        match &mut self.node_mut(handle)?.content {
            NodeContent::Text(data) | NodeContent::Comment(data) => {
                *data = value.to_string();
                Ok(())
            }
            _ => Err(ModelError::Stale(handle)),
        }
    }

    /// DOM `textContent`; `None` for the document node.
    pub fn text_content(&self, handle: NativeHandle) -> ModelResult<Option<String>> {
        if let NativeData::Attr { .. } = self.object(handle)?.data {
            return self.attr_value(handle).map(Some);
        }
        match self.content(handle)? {
            NodeContent::Document => Ok(None),
            NodeContent::Text(data) | NodeContent::Comment(data) => Ok(Some(data.clone())),
            NodeContent::Element(_) => {
                let mut output = String::new();
                self.collect_text(handle, &mut output)?;
                Ok(Some(output))
            }
        }
    }

    fn collect_text(&self, handle: NativeHandle, output: &mut String) -> ModelResult<()> {
        for child in self.children(handle)? {
            match self.content(*child)? {
                NodeContent::Text(data) => output.push_str(data),
                NodeContent::Element(_) => self.collect_text(*child, output)?,
                _ => {}
            }
        }
        Ok(())
    }

    pub fn set_text_content(&mut self, handle: NativeHandle, text: &str) -> ModelResult<()> {
        if let NativeData::Attr { .. } = self.object(handle)?.data {
            return self.set_attr_value(handle, text);
        }
        match self.node_type(handle)? {
            1 => {
                let previous = std::mem::take(&mut self.node_mut(handle)?.children);
                for child in previous {
                    self.node_mut(child)?.parent = None;
                }
                if !text.is_empty() {
                    let node = self.create_text(text);
                    self.append_child(handle, node)?;
                }
                Ok(())
            }
            3 | 8 => self.set_character_data(handle, text),
            _ => Ok(()),
        }
    }

    pub fn attribute(&self, handle: NativeHandle, name: &str) -> ModelResult<Option<String>> {
        Ok(self.element(handle)?.attribute(name).map(str::to_string))
    }

    pub fn set_attribute(&mut self, handle: NativeHandle, name: &str, value: &str) -> ModelResult<()> {
        let element = self.element_mut(handle)?;
        match element.attributes.iter().position(|(key, _)| key == name) {
            Some(index) => element.attributes[index].1 = value.to_string(),
            None => element
                .attributes
                .push((name.to_string(), value.to_string())),
        }
        Ok(())
    }

    pub fn remove_attribute(&mut self, handle: NativeHandle, name: &str) -> ModelResult<bool> {
        let element = self.element_mut(handle)?;
        let before = element.attributes.len();
        element.attributes.retain(|(key, _)| key != name);
        Ok(element.attributes.len() != before)
    }

    /// Descendants of `scope` in document order, `scope` excluded.
    pub fn descendants(&self, scope: NativeHandle) -> ModelResult<Vec<NativeHandle>> {
        let mut collected = Vec::new();
        let mut stack: Vec<NativeHandle> = self.children(scope)?.iter().rev().copied().collect();
        while let Some(handle) = stack.pop() {
            collected.push(handle);
            stack.extend(self.children(handle)?.iter().rev().copied());
        }
        Ok(collected)
    }

    pub fn element_by_id(&self, id: &str) -> Option<NativeHandle> {
        self.descendants(self.root).ok()?.into_iter().find(|handle| {
            self.element(*handle)
                .map(|element| element.attribute("id") == Some(id))
                .unwrap_or(false)
        })
    }

    pub fn elements_by_tag_name(
        &self,
        scope: NativeHandle,
        tag: &str,
    ) -> ModelResult<Vec<NativeHandle>> {
        Ok(self
            .descendants(scope)?
            .into_iter()
            .filter(|handle| {
                self.element(*handle)
                    .map(|element| tag == "*" || element.local_name == tag)
                    .unwrap_or(false)
            })
            .collect())
    }

    fn derive(
        &mut self,
        owner: NativeHandle,
        key: Derived,
        make: impl FnOnce() -> NativeObject,
    ) -> NativeHandle {
        if let Some(existing) = self.derived.get(&(owner, key.clone())) {
            if self.objects.contains(*existing) {
                return *existing;
            }
        }
        let handle = self.objects.insert(make());
        self.derived.insert((owner, key), handle);
        handle
    }

    /// The element's `CSSStyleDeclaration`; the same object on every call.
    pub fn style_of(&mut self, element: NativeHandle) -> ModelResult<NativeHandle> {
        self.element(element)?;
        Ok(self.derive(element, Derived::Style, || NativeObject {
            ty: NativeType::CssStyleDeclaration,
            data: NativeData::Style { owner: element },
        }))
    }

    /// Live `childNodes` list; the same object on every call.
    pub fn child_list_of(&mut self, node: NativeHandle) -> ModelResult<NativeHandle> {
        self.node(node)?;
        Ok(self.derive(node, Derived::ChildNodes, || NativeObject {
            ty: NativeType::NodeList,
            data: NativeData::ChildList { owner: node },
        }))
    }

    pub fn attribute_node(
        &mut self,
        element: NativeHandle,
        name: &str,
    ) -> ModelResult<Option<NativeHandle>> {
        if self.element(element)?.attribute(name).is_none() {
            return Ok(None);
        }
        let owned = name.to_string();
        Ok(Some(self.derive(
            element,
            Derived::Attr(name.to_string()),
            || NativeObject {
                ty: NativeType::Attr,
                data: NativeData::Attr {
                    owner: element,
                    name: owned,
                },
            },
        )))
    }

    /// `SVGLength` reflecting a geometry attribute of `element`.
    pub fn length_of(&mut self, element: NativeHandle, attribute: &str) -> ModelResult<NativeHandle> {
        self.element(element)?;
        let owned = attribute.to_string();
        Ok(self.derive(
            element,
            Derived::Length(attribute.to_string()),
            || NativeObject {
                ty: NativeType::SvgLength,
                data: NativeData::Length {
                    owner: element,
                    attribute: owned,
                },
            },
        ))
    }

    /// Owning node of a derived object (attribute node, style, child list, length).
    pub fn owner_of(&self, handle: NativeHandle) -> ModelResult<NativeHandle> {
        match &self.object(handle)?.data {
            NativeData::Attr { owner, .. }
            | NativeData::ChildList { owner }
            | NativeData::Style { owner }
            | NativeData::Length { owner, .. } => Ok(*owner),
            _ => Err(self.wrong_type(handle, "derived object")),
        }
    }

    pub fn attr_name(&self, handle: NativeHandle) -> ModelResult<&str> {
        match &self.object(handle)?.data {
            NativeData::Attr { name, .. } => Ok(name),
            _ => Err(self.wrong_type(handle, "Attr")),
        }
    }

    pub fn attr_value(&self, handle: NativeHandle) -> ModelResult<String> {
        let owner = self.owner_of(handle)?;
        let name = self.attr_name(handle)?;
        Ok(self.attribute(owner, name)?.unwrap_or_default())
    }

    pub fn set_attr_value(&mut self, handle: NativeHandle, value: &str) -> ModelResult<()> {
        let owner = self.owner_of(handle)?;
        let name = self.attr_name(handle)?.to_string();
        self.set_attribute(owner, &name, value)
    }

    /// Current members of a live `NodeList`.
    pub fn list_items(&self, list: NativeHandle) -> ModelResult<Vec<NativeHandle>> {
        match &self.object(list)?.data {
            NativeData::ChildList { owner } => Ok(self.children(*owner)?.to_vec()),
            _ => Err(self.wrong_type(list, "NodeList")),
        }
    }

    fn style_owner(&self, style: NativeHandle) -> ModelResult<NativeHandle> {
        match &self.object(style)?.data {
            NativeData::Style { owner } => Ok(*owner),
            _ => Err(self.wrong_type(style, "CSSStyleDeclaration")),
        }
    }

    pub fn style_declarations(&self, style: NativeHandle) -> ModelResult<Vec<(String, String)>> {
        let owner = self.style_owner(style)?;
        Ok(self
            .attribute(owner, "style")?
            .map(|text| parse_declarations(&text))
            .unwrap_or_default())
    }

    pub fn set_style_declarations(
        &mut self,
        style: NativeHandle,
        declarations: &[(String, String)],
    ) -> ModelResult<()> {
        let owner = self.style_owner(style)?;
        if declarations.is_empty() {
            self.remove_attribute(owner, "style")?;
            return Ok(());
        }
        self.set_attribute(owner, "style", &format_declarations(declarations))
    }

    pub fn style_property(&self, style: NativeHandle, name: &str) -> ModelResult<Option<String>> {
        let name = name.trim().to_ascii_lowercase();
        Ok(self
            .style_declarations(style)?
            .into_iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value))
    }

    /// Set one declaration; an empty value removes it.
    pub fn set_style_property(
        &mut self,
        style: NativeHandle,
        name: &str,
        value: &str,
    ) -> ModelResult<()> {
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim();
        let mut declarations = self.style_declarations(style)?;
        if value.is_empty() {
            declarations.retain(|(key, _)| *key != name);
        } else {
            match declarations.iter().position(|(key, _)| *key == name) {
                Some(index) => declarations[index].1 = value.to_string(),
                None => declarations.push((name, value.to_string())),
            }
        }
        self.set_style_declarations(style, &declarations)
    }

    pub fn remove_style_property(
        &mut self,
        style: NativeHandle,
        name: &str,
    ) -> ModelResult<Option<String>> {
        let previous = self.style_property(style, name)?;
        if previous.is_some() {
            self.set_style_property(style, name, "")?;
        }
        Ok(previous)
    }

    fn length_target(&self, handle: NativeHandle) -> ModelResult<(NativeHandle, &str)> {
        match &self.object(handle)?.data {
            NativeData::Length { owner, attribute } => Ok((*owner, attribute)),
            _ => Err(self.wrong_type(handle, "SVGLength")),
        }
    }

    /// Missing or unparsable attributes read as a unitless zero.
    pub fn length(&self, handle: NativeHandle) -> ModelResult<Length> {
        let (owner, attribute) = self.length_target(handle)?;
        Ok(self
            .attribute(owner, attribute)?
            .and_then(|text| Length::parse(&text))
            .unwrap_or(Length {
                value: 0.0,
                unit: LengthUnit::Number,
            }))
    }

    pub fn set_length(&mut self, handle: NativeHandle, length: Length) -> ModelResult<()> {
        let (owner, attribute) = self.length_target(handle)?;
        let attribute = attribute.to_string();
        self.set_attribute(owner, &attribute, &length.to_string())
    }

    pub fn create_matrix(&mut self, matrix: Matrix) -> NativeHandle {
        self.objects.insert(NativeObject {
            ty: NativeType::SvgMatrix,
            data: NativeData::Matrix(matrix),
        })
    }

    pub fn matrix(&self, handle: NativeHandle) -> ModelResult<Matrix> {
        match &self.object(handle)?.data {
            NativeData::Matrix(matrix) => Ok(*matrix),
            _ => Err(self.wrong_type(handle, "SVGMatrix")),
        }
    }

    pub fn set_matrix(&mut self, handle: NativeHandle, value: Matrix) -> ModelResult<()> {
        self.matrix(handle)?;
        if let NativeData::Matrix(matrix) = &mut self.object_mut(handle)?.data {
            *matrix = value;
        }
        Ok(())
    }

    pub fn create_point(&mut self, point: Point) -> NativeHandle {
        self.objects.insert(NativeObject {
            ty: NativeType::SvgPoint,
            data: NativeData::Point(point),
        })
    }

    pub fn point(&self, handle: NativeHandle) -> ModelResult<Point> {
        match &self.object(handle)?.data {
            NativeData::Point(point) => Ok(*point),
            _ => Err(self.wrong_type(handle, "SVGPoint")),
        }
    }

    pub fn set_point(&mut self, handle: NativeHandle, value: Point) -> ModelResult<()> {
        self.point(handle)?;
        if let NativeData::Point(point) = &mut self.object_mut(handle)?.data {
            *point = value;
        }
        Ok(())
    }

    pub fn create_rect(&mut self, rect: RectValue) -> NativeHandle {
        self.objects.insert(NativeObject {
            ty: NativeType::SvgRect,
            data: NativeData::Rect(rect),
        })
    }

    pub fn rect(&self, handle: NativeHandle) -> ModelResult<RectValue> {
        match &self.object(handle)?.data {
            NativeData::Rect(rect) => Ok(*rect),
            _ => Err(self.wrong_type(handle, "SVGRect")),
        }
    }

    pub fn set_rect(&mut self, handle: NativeHandle, value: RectValue) -> ModelResult<()> {
        self.rect(handle)?;
        if let NativeData::Rect(rect) = &mut self.object_mut(handle)?.data {
            *rect = value;
        }
        Ok(())
    }

    pub fn create_event(
        &mut self,
        event_type: &str,
        target: Option<NativeHandle>,
        mouse: Option<MouseData>,
    ) -> NativeHandle {
        let ty = if mouse.is_some() {
            NativeType::MouseEvent
        } else {
            NativeType::Event
        };
        self.objects.insert(NativeObject {
            ty,
            data: NativeData::Event(EventData {
                event_type: event_type.to_string(),
                target,
                current_target: None,
                bubbles: true,
                cancelable: true,
                default_prevented: false,
                propagation_stopped: false,
                mouse,
            }),
        })
    }

    pub fn event(&self, handle: NativeHandle) -> ModelResult<&EventData> {
        match &self.object(handle)?.data {
            NativeData::Event(event) => Ok(event),
            _ => Err(self.wrong_type(handle, "Event")),
        }
    }

    pub fn event_mut(&mut self, handle: NativeHandle) -> ModelResult<&mut EventData> {
        self.event(handle)?;
        match &mut self.object_mut(handle)?.data {
            NativeData::Event(event) => Ok(event),
            _ => Err(ModelError::Stale(handle)),
        }
    }

    fn number_attribute(&self, element: &ElementData, name: &str) -> f64 {
        element
            .attribute(name)
            .and_then(Length::parse)
            .map(|length| length.value)
            .unwrap_or(0.0)
    }

    /// Transform declared on the node itself; identity when absent or unsupported.
    pub fn local_transform(&self, handle: NativeHandle) -> ModelResult<Matrix> {
        let Ok(element) = self.element(handle) else {
            self.node(handle)?;
            return Ok(Matrix::IDENTITY);
        };
        Ok(element
            .attribute("transform")
            .and_then(Matrix::parse_transform_list)
            .unwrap_or(Matrix::IDENTITY))
    }

    /// Product of every transform from the outermost ancestor down to `handle`.
    pub fn cumulative_transform(&self, handle: NativeHandle) -> ModelResult<Matrix> {
        let mut chain = self.ancestors(handle)?;
        chain.reverse();
        chain.push(handle);
        let mut matrix = Matrix::IDENTITY;
        for node in chain {
            matrix = matrix.multiply(&self.local_transform(node)?);
        }
        Ok(matrix)
    }

    /// Nearest ancestor `<svg>` element.
    pub fn nearest_viewport(&self, handle: NativeHandle) -> ModelResult<Option<NativeHandle>> {
        Ok(self
            .ancestors(handle)?
            .into_iter()
            .find(|ancestor| self.type_of(*ancestor) == Some(NativeType::SvgSvgElement)))
    }

    /// Bounding box in the element's own user space. Only basic shapes and
    /// containers of them are measured; other elements report an empty box.
    pub fn bounding_box(&self, handle: NativeHandle) -> ModelResult<RectValue> {
        let ty = self.type_of(handle).ok_or(ModelError::Stale(handle))?;
        let element = self.element(handle)?;
        let value = |name: &str| self.number_attribute(element, name);
        let rect = match ty {
            NativeType::SvgRectElement => RectValue {
                x: value("x"),
                y: value("y"),
                width: value("width"),
                height: value("height"),
            },
            NativeType::SvgCircleElement => {
                let r = value("r");
                RectValue {
                    x: value("cx") - r,
                    y: value("cy") - r,
                    width: r * 2.0,
                    height: r * 2.0,
                }
            }
            NativeType::SvgEllipseElement => {
                let (rx, ry) = (value("rx"), value("ry"));
                RectValue {
                    x: value("cx") - rx,
                    y: value("cy") - ry,
                    width: rx * 2.0,
                    height: ry * 2.0,
                }
            }
            NativeType::SvgLineElement => {
                let (x1, y1, x2, y2) = (value("x1"), value("y1"), value("x2"), value("y2"));
                RectValue {
                    x: x1.min(x2),
                    y: y1.min(y2),
                    width: (x2 - x1).abs(),
                    height: (y2 - y1).abs(),
                }
            }
            NativeType::SvgSvgElement | NativeType::SvgGElement => {
                let mut union: Option<RectValue> = None;
                for child in self.children(handle)? {
                    let is_graphic = self
                        .type_of(*child)
                        .map(|ty| ty.is_a(NativeType::SvgGraphicsElement))
                        .unwrap_or(false);
                    if !is_graphic {
                        continue;
                    }
                    let child_box =
                        transform_box(&self.local_transform(*child)?, &self.bounding_box(*child)?);
                    union = Some(match union {
                        Some(existing) => existing.union(&child_box),
                        None => child_box,
                    });
                }
                union.unwrap_or_default()
            }
            _ => RectValue::default(),
        };
        Ok(rect)
    }

    /// Free a native object. Nodes must be detached; their whole subtree goes
    /// with them, along with every derived object they own.
    pub fn destroy(&mut self, handle: NativeHandle) -> ModelResult<usize> {
        let is_node = matches!(self.object(handle)?.data, NativeData::Node(_));
        let doomed: Vec<NativeHandle> = if is_node {
            if handle == self.root || self.parent(handle)?.is_some() {
                return Err(ModelError::Attached(handle));
            }
            let mut subtree = vec![handle];
            subtree.extend(self.descendants(handle)?);
            subtree
        } else {
            vec![handle]
        };

        let owners: HashSet<NativeHandle> = doomed.iter().copied().collect();
        let mut released = Vec::new();
        self.derived.retain(|(owner, _), derived| {
            if owners.contains(owner) {
                released.push(*derived);
                false
            } else {
                !owners.contains(&*derived)
            }
        });

        let mut freed = 0;
        for handle in doomed.into_iter().chain(released) {
            if self.objects.remove(handle).is_some() {
                freed += 1;
            }
        }
        debug!(target = "svgbridge", %handle, freed, "destroyed native objects");
        Ok(freed)
    }
}

fn transform_box(matrix: &Matrix, rect: &RectValue) -> RectValue {
    let corners = [
        matrix.apply(rect.x, rect.y),
        matrix.apply(rect.x + rect.width, rect.y),
        matrix.apply(rect.x, rect.y + rect.height),
        matrix.apply(rect.x + rect.width, rect.y + rect.height),
    ];
    let min_x = corners.iter().map(|c| c.0).fold(f64::INFINITY, f64::min);
    let min_y = corners.iter().map(|c| c.1).fold(f64::INFINITY, f64::min);
    let max_x = corners.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max);
    let max_y = corners.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max);
    RectValue {
        x: min_x,
        y: min_y,
        width: max_x - min_x,
        height: max_y - min_y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SVG_NAMESPACE;

    fn svg_with_rect() -> (Document, NativeHandle, NativeHandle) {
        let mut document = Document::new();
        let svg = document.create_element(Some(SVG_NAMESPACE), "svg");
        let rect = document.create_element(Some(SVG_NAMESPACE), "rect");
        document.append_child(document.root(), svg).unwrap();
        document.append_child(svg, rect).unwrap();
        (document, svg, rect)
    }

    #[test]
    fn tree_links_stay_consistent() {
        let (mut document, svg, rect) = svg_with_rect();
        let circle = document.create_element(Some(SVG_NAMESPACE), "circle");
        document.insert_before(svg, circle, Some(rect)).unwrap();

        assert_eq!(document.children(svg).unwrap(), &[circle, rect]);
        assert_eq!(document.next_sibling(circle).unwrap(), Some(rect));
        assert_eq!(document.previous_sibling(circle).unwrap(), None);
        assert_eq!(document.document_element(), Some(svg));

        document.remove_child(svg, circle).unwrap();
        assert_eq!(document.parent(circle).unwrap(), None);
        assert!(document.remove_child(svg, circle).is_err());
    }

    #[test]
    fn refuses_to_create_cycles() {
        let (mut document, svg, rect) = svg_with_rect();
        assert!(matches!(
            document.append_child(rect, svg),
            Err(ModelError::HierarchyRequest { .. })
        ));
    }

    #[test]
    fn derived_objects_are_identity_stable() {
        let (mut document, _, rect) = svg_with_rect();
        let first = document.style_of(rect).unwrap();
        let second = document.style_of(rect).unwrap();
        assert_eq!(first, second);
        assert_eq!(document.length_of(rect, "x").unwrap(), document.length_of(rect, "x").unwrap());
        assert_ne!(document.length_of(rect, "x").unwrap(), document.length_of(rect, "y").unwrap());
    }

    #[test]
    fn style_declarations_round_trip_through_attribute() {
        let (mut document, _, rect) = svg_with_rect();
        let style = document.style_of(rect).unwrap();
        document.set_style_property(style, "fill", "red").unwrap();
        document.set_style_property(style, "stroke", "blue").unwrap();
        assert_eq!(
            document.attribute(rect, "style").unwrap().as_deref(),
            Some("fill: red; stroke: blue;")
        );
        assert_eq!(
            document.remove_style_property(style, "FILL").unwrap().as_deref(),
            Some("red")
        );
        assert_eq!(document.style_property(style, "fill").unwrap(), None);
    }

    #[test]
    fn lengths_reflect_attributes() {
        let (mut document, _, rect) = svg_with_rect();
        document.set_attribute(rect, "width", "40px").unwrap();
        let width = document.length_of(rect, "width").unwrap();
        assert_eq!(document.length(width).unwrap().value, 40.0);

        document
            .set_length(
                width,
                Length {
                    value: 12.0,
                    unit: LengthUnit::Percentage,
                },
            )
            .unwrap();
        assert_eq!(document.attribute(rect, "width").unwrap().as_deref(), Some("12%"));
    }

    #[test]
    fn text_content_replaces_children() {
        let (mut document, svg, rect) = svg_with_rect();
        document.set_text_content(svg, "hello").unwrap();
        assert_eq!(document.parent(rect).unwrap(), None);
        assert_eq!(document.text_content(svg).unwrap().as_deref(), Some("hello"));
    }

    #[test]
    fn bounding_box_of_group_applies_child_transforms() {
        let (mut document, svg, rect) = svg_with_rect();
        for (name, value) in [("x", "0"), ("y", "0"), ("width", "10"), ("height", "5")] {
            document.set_attribute(rect, name, value).unwrap();
        }
        document.set_attribute(rect, "transform", "translate(5 5)").unwrap();
        let bbox = document.bounding_box(svg).unwrap();
        assert_eq!(
            bbox,
            RectValue {
                x: 5.0,
                y: 5.0,
                width: 10.0,
                height: 5.0
            }
        );
    }

    #[test]
    fn destroy_requires_detached_nodes_and_frees_derived() {
        let (mut document, svg, rect) = svg_with_rect();
        let style = document.style_of(rect).unwrap();
        assert!(matches!(document.destroy(rect), Err(ModelError::Attached(_))));

        document.remove_child(svg, rect).unwrap();
        assert_eq!(document.destroy(rect).unwrap(), 2);
        assert!(!document.is_live(rect));
        assert!(!document.is_live(style));
    }
}
