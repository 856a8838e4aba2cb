//! Member forwarding: property reads and writes and method calls on a proxy
//! are resolved against its kind chain and forwarded to the native object.

use serde::Serialize;

use super::capability::{Locatable, Stylable, Transformable};
use super::error::{BridgeError, BridgeResult};
use super::factory;
use super::kind::WrapperKind;
use super::value::{arg, arg_number, arg_string, ScriptValue};
use super::wrapper::WrapperInstance;
use crate::model::{
    Document, Length, LengthUnit, Matrix, ModelResult, NativeHandle, NativeType, Point, RectValue,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberKind {
    Property,
    Method,
}

struct Member {
    owner: WrapperKind,
    name: &'static str,
    kind: MemberKind,
    writable: bool,
}

const fn ro(owner: WrapperKind, name: &'static str) -> Member {
    Member {
        owner,
        name,
        kind: MemberKind::Property,
        writable: false,
    }
}

const fn rw(owner: WrapperKind, name: &'static str) -> Member {
    Member {
        owner,
        name,
        kind: MemberKind::Property,
        writable: true,
    }
}

const fn method(owner: WrapperKind, name: &'static str) -> Member {
    Member {
        owner,
        name,
        kind: MemberKind::Method,
        writable: false,
    }
}

use WrapperKind as K;

static MEMBERS: &[Member] = &[
    ro(K::Node, "nodeName"),
    ro(K::Node, "nodeType"),
    rw(K::Node, "nodeValue"),
    ro(K::Node, "parentNode"),
    ro(K::Node, "firstChild"),
    ro(K::Node, "lastChild"),
    ro(K::Node, "previousSibling"),
    ro(K::Node, "nextSibling"),
    ro(K::Node, "childNodes"),
    ro(K::Node, "ownerDocument"),
    rw(K::Node, "textContent"),
    ro(K::Node, "isConnected"),
    method(K::Node, "appendChild"),
    method(K::Node, "insertBefore"),
    method(K::Node, "removeChild"),
    method(K::Node, "hasChildNodes"),
    method(K::Node, "contains"),
    method(K::Node, "isSameNode"),
    ro(K::Document, "documentElement"),
    method(K::Document, "getElementById"),
    method(K::Document, "createElementNS"),
    method(K::Document, "createElement"),
    method(K::Document, "createTextNode"),
    method(K::Document, "createComment"),
    method(K::Document, "getElementsByTagName"),
    rw(K::CharacterData, "data"),
    ro(K::CharacterData, "length"),
    ro(K::Attr, "name"),
    rw(K::Attr, "value"),
    ro(K::Attr, "ownerElement"),
    ro(K::Element, "tagName"),
    ro(K::Element, "localName"),
    ro(K::Element, "namespaceURI"),
    rw(K::Element, "id"),
    method(K::Element, "getAttribute"),
    method(K::Element, "setAttribute"),
    method(K::Element, "removeAttribute"),
    method(K::Element, "hasAttribute"),
    method(K::Element, "getAttributeNode"),
    method(K::Element, "getElementsByTagName"),
    ro(K::SvgElement, "style"),
    rw(K::SvgElement, "className"),
    ro(K::SvgElement, "ownerSVGElement"),
    ro(K::SvgGraphics, "transform"),
    ro(K::SvgGraphics, "nearestViewportElement"),
    method(K::SvgGraphics, "getBBox"),
    method(K::SvgGraphics, "getCTM"),
    ro(K::SvgRoot, "width"),
    ro(K::SvgRoot, "height"),
    method(K::SvgRoot, "createSVGMatrix"),
    method(K::SvgRoot, "createSVGPoint"),
    method(K::SvgRoot, "createSVGRect"),
    ro(K::SvgRect, "x"),
    ro(K::SvgRect, "y"),
    ro(K::SvgRect, "width"),
    ro(K::SvgRect, "height"),
    ro(K::SvgRect, "rx"),
    ro(K::SvgRect, "ry"),
    ro(K::SvgCircle, "cx"),
    ro(K::SvgCircle, "cy"),
    ro(K::SvgCircle, "r"),
    ro(K::NodeList, "length"),
    method(K::NodeList, "item"),
    rw(K::StyleDeclaration, "cssText"),
    ro(K::StyleDeclaration, "length"),
    method(K::StyleDeclaration, "getPropertyValue"),
    method(K::StyleDeclaration, "setProperty"),
    method(K::StyleDeclaration, "removeProperty"),
    method(K::StyleDeclaration, "item"),
    rw(K::Length, "value"),
    rw(K::Length, "valueAsString"),
    ro(K::Length, "unitType"),
    method(K::Length, "newValueSpecifiedUnits"),
    rw(K::Matrix, "a"),
    rw(K::Matrix, "b"),
    rw(K::Matrix, "c"),
    rw(K::Matrix, "d"),
    rw(K::Matrix, "e"),
    rw(K::Matrix, "f"),
    method(K::Matrix, "multiply"),
    method(K::Matrix, "inverse"),
    method(K::Matrix, "translate"),
    method(K::Matrix, "scale"),
    rw(K::Point, "x"),
    rw(K::Point, "y"),
    method(K::Point, "matrixTransform"),
    rw(K::Rect, "x"),
    rw(K::Rect, "y"),
    rw(K::Rect, "width"),
    rw(K::Rect, "height"),
    ro(K::Event, "type"),
    ro(K::Event, "target"),
    ro(K::Event, "currentTarget"),
    ro(K::Event, "bubbles"),
    ro(K::Event, "cancelable"),
    ro(K::Event, "defaultPrevented"),
    method(K::Event, "preventDefault"),
    method(K::Event, "stopPropagation"),
    ro(K::MouseEvent, "clientX"),
    ro(K::MouseEvent, "clientY"),
    ro(K::MouseEvent, "button"),
];

/// Most derived declaration of `name` along the chain of `kind`.
fn lookup(kind: WrapperKind, name: &str) -> Option<&'static Member> {
    kind.chain().find_map(|owner| {
        MEMBERS
            .iter()
            .find(|member| member.owner == owner && member.name == name)
    })
}

/// Names a kind exposes, own members first.
pub fn member_names(kind: WrapperKind) -> Vec<&'static str> {
    let mut names = Vec::new();
    for owner in kind.chain() {
        for member in MEMBERS.iter().filter(|member| member.owner == owner) {
            if !names.contains(&member.name) {
                names.push(member.name);
            }
        }
    }
    names
}

fn index_name(name: &str) -> Option<usize> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok()
}

fn utf16_len(text: &str) -> f64 {
    text.encode_utf16().count() as f64
}

fn optional_string(value: &ScriptValue) -> Option<String> {
    (!value.is_nullish()).then(|| value.to_script_string())
}

impl WrapperInstance {
    pub(crate) fn read<T>(
        &self,
        f: impl FnOnce(&Document, NativeHandle) -> ModelResult<T>,
    ) -> BridgeResult<T> {
        let handle = self.native()?;
        let document = self.session().document.borrow();
        Ok(f(&document, handle)?)
    }

    pub(crate) fn write<T>(
        &self,
        f: impl FnOnce(&mut Document, NativeHandle) -> ModelResult<T>,
    ) -> BridgeResult<T> {
        let handle = self.native()?;
        let mut document = self.session().document.borrow_mut();
        Ok(f(&mut document, handle)?)
    }

    /// Proxy for a native object reached from this one, in the same session.
    pub(crate) fn wrap(&self, native: Option<NativeHandle>) -> BridgeResult<Option<WrapperInstance>> {
        factory::create_wrapper(self.session(), native, None)
    }

    pub(crate) fn wrap_present(&self, native: NativeHandle) -> BridgeResult<WrapperInstance> {
        self.wrap(Some(native))?
            .ok_or(BridgeError::StaleNative(native))
    }

    /// Proxy for a value object just allocated on its behalf. The value is
    /// freed again if no proxy can be made for it.
    pub(crate) fn wrap_value(&self, native: NativeHandle) -> BridgeResult<WrapperInstance> {
        self.wrap_present(native).map_err(|err| {
            if let Ok(mut document) = self.session().document.try_borrow_mut() {
                let _ = document.destroy(native);
            }
            err
        })
    }

    fn proxy_value(&self, native: Option<NativeHandle>) -> BridgeResult<ScriptValue> {
        Ok(ScriptValue::from_proxy(self.wrap(native)?))
    }

    fn proxy_list(&self, natives: Vec<NativeHandle>) -> BridgeResult<ScriptValue> {
        let items = natives
            .into_iter()
            .map(|native| self.wrap_present(native).map(ScriptValue::Proxy))
            .collect::<BridgeResult<Vec<_>>>()?;
        Ok(ScriptValue::List(items))
    }

    /// Native object behind a proxy argument; `None` for null or undefined.
    fn native_arg(
        &self,
        member: &str,
        args: &[ScriptValue],
        index: usize,
    ) -> BridgeResult<Option<NativeHandle>> {
        match arg(args, index) {
            ScriptValue::Proxy(other) => {
                if !self.same_session(other) {
                    return Err(BridgeError::ForeignSession);
                }
                Ok(Some(other.native()?))
            }
            value if value.is_nullish() => Ok(None),
            _ => Err(BridgeError::invalid(
                member,
                format!("argument {index} must be an object"),
            )),
        }
    }

    fn required_native_arg(
        &self,
        member: &str,
        args: &[ScriptValue],
        index: usize,
    ) -> BridgeResult<NativeHandle> {
        self.native_arg(member, args, index)?
            .ok_or_else(|| BridgeError::invalid(member, format!("argument {index} is required")))
    }

    fn is_attr(&self) -> bool {
        self.native_type() == NativeType::Attr
    }

    /// Tree navigation; attribute nodes sit outside the tree and read as null.
    fn tree(
        &self,
        f: impl FnOnce(&Document, NativeHandle) -> ModelResult<Option<NativeHandle>>,
    ) -> BridgeResult<ScriptValue> {
        if self.is_attr() {
            return Ok(ScriptValue::Null);
        }
        let native = self.read(f)?;
        self.proxy_value(native)
    }

    fn unknown(&self, name: &str) -> BridgeError {
        BridgeError::UnknownMember {
            kind: self.kind(),
            member: name.to_string(),
        }
    }

    /// Whether `name` is a property or a method of this proxy.
    pub fn member_kind(&self, name: &str) -> Option<MemberKind> {
        if self.kind() == WrapperKind::NodeList && index_name(name).is_some() {
            return Some(MemberKind::Property);
        }
        lookup(self.kind(), name).map(|member| member.kind)
    }

    /// Read a property.
    pub fn get(&self, name: &str) -> BridgeResult<ScriptValue> {
        self.native()?;
        if self.kind() == WrapperKind::NodeList {
            if let Some(index) = index_name(name) {
                return self.list_item(index);
            }
        }
        match lookup(self.kind(), name) {
            Some(member) if member.kind == MemberKind::Property => self.get_own(member.owner, name),
            _ => Err(self.unknown(name)),
        }
    }

    /// Write a property.
    pub fn set(&self, name: &str, value: ScriptValue) -> BridgeResult<()> {
        self.native()?;
        match lookup(self.kind(), name) {
            Some(member) if member.kind == MemberKind::Property && member.writable => {
                self.set_own(member.owner, name, &value)
            }
            Some(member) if member.kind == MemberKind::Property => Err(BridgeError::ReadOnly {
                kind: self.kind(),
                member: name.to_string(),
            }),
            _ => Err(self.unknown(name)),
        }
    }

    /// Invoke a method.
    pub fn call(&self, name: &str, args: &[ScriptValue]) -> BridgeResult<ScriptValue> {
        self.native()?;
        match lookup(self.kind(), name) {
            Some(member) if member.kind == MemberKind::Method => {
                self.call_own(member.owner, name, args)
            }
            _ => Err(self.unknown(name)),
        }
    }

    fn list_item(&self, index: usize) -> BridgeResult<ScriptValue> {
        let items = self.read(|document, handle| document.list_items(handle))?;
        self.proxy_value(items.get(index).copied())
    }

    fn length_of(&self, attribute: &str) -> BridgeResult<ScriptValue> {
        let length = self.write(|document, handle| document.length_of(handle, attribute))?;
        Ok(self.wrap_present(length)?.into())
    }

    fn event_field<T>(&self, f: impl FnOnce(&crate::model::EventData) -> T) -> BridgeResult<T> {
        self.read(|document, handle| document.event(handle).map(f))
    }

    fn mouse_field(&self, f: impl FnOnce(&crate::model::MouseData) -> f64) -> BridgeResult<ScriptValue> {
        let value = self.event_field(|event| event.mouse.map(|mouse| f(&mouse)))?;
        Ok(ScriptValue::Number(value.unwrap_or(0.0)))
    }

    fn get_own(&self, owner: WrapperKind, name: &str) -> BridgeResult<ScriptValue> {
        let value: ScriptValue = match (owner, name) {
            (K::Node, "nodeName") => self.read(|d, h| d.node_name(h))?.into(),
            (K::Node, "nodeType") => f64::from(self.read(|d, h| d.node_type(h))?).into(),
            (K::Node, "nodeValue") => self
                .read(|d, h| match d.node_type(h)? {
                    2 => d.attr_value(h).map(Some),
                    3 | 8 => d.character_data(h).map(|data| Some(data.to_string())),
                    _ => Ok(None),
                })?
                .into(),
            (K::Node, "textContent") => self.read(|d, h| d.text_content(h))?.into(),
            (K::Node, "parentNode") => self.tree(|d, h| d.parent(h))?,
            (K::Node, "firstChild") => self.tree(|d, h| Ok(d.children(h)?.first().copied()))?,
            (K::Node, "lastChild") => self.tree(|d, h| Ok(d.children(h)?.last().copied()))?,
            (K::Node, "previousSibling") => self.tree(|d, h| d.previous_sibling(h))?,
            (K::Node, "nextSibling") => self.tree(|d, h| d.next_sibling(h))?,
            (K::Node, "childNodes") => {
                if self.is_attr() {
                    ScriptValue::Null
                } else {
                    let list = self.write(|d, h| d.child_list_of(h))?;
                    self.wrap_present(list)?.into()
                }
            }
            (K::Node, "ownerDocument") => {
                if self.native_type() == NativeType::Document {
                    ScriptValue::Null
                } else {
                    let root = self.read(|d, _| Ok(d.root()))?;
                    self.proxy_value(Some(root))?
                }
            }
            (K::Node, "isConnected") => self
                .read(|d, h| {
                    let node = if self.is_attr() { d.owner_of(h)? } else { h };
                    d.contains(d.root(), node)
                })?
                .into(),

            (K::Document, "documentElement") => {
                let element = self.read(|d, _| Ok(d.document_element()))?;
                self.proxy_value(element)?
            }

            (K::CharacterData, "data") => self
                .read(|d, h| d.character_data(h).map(str::to_string))?
                .into(),
            (K::CharacterData, "length") => {
                utf16_len(&self.read(|d, h| d.character_data(h).map(str::to_string))?).into()
            }

            (K::Attr, "name") => self.read(|d, h| d.attr_name(h).map(str::to_string))?.into(),
            (K::Attr, "value") => self.read(|d, h| d.attr_value(h))?.into(),
            (K::Attr, "ownerElement") => {
                let owner = self.read(|d, h| d.owner_of(h))?;
                self.proxy_value(Some(owner))?
            }

            (K::Element, "tagName") => self.read(|d, h| d.node_name(h))?.into(),
            (K::Element, "localName") => self
                .read(|d, h| {
                    let name = &d.element(h)?.local_name;
                    Ok(name.rsplit(':').next().unwrap_or(name).to_string())
                })?
                .into(),
            (K::Element, "namespaceURI") => {
                self.read(|d, h| Ok(d.element(h)?.namespace.clone()))?.into()
            }
            (K::Element, "id") => self
                .read(|d, h| d.attribute(h, "id"))?
                .unwrap_or_default()
                .into(),

            (K::SvgElement, "style") => self.style()?.into(),
            (K::SvgElement, "className") => self.class_name()?.into(),
            (K::SvgElement, "ownerSVGElement") => {
                let viewport = self.read(|d, h| d.nearest_viewport(h))?;
                self.proxy_value(viewport)?
            }

            (K::SvgGraphics, "transform") => Transformable::transform(self)?.into(),
            (K::SvgGraphics, "nearestViewportElement") => {
                ScriptValue::from_proxy(self.nearest_viewport_element()?)
            }

            (K::SvgRoot | K::SvgRect | K::SvgCircle, attribute) => self.length_of(attribute)?,

            (K::NodeList, "length") => {
                (self.read(|d, h| d.list_items(h))?.len() as f64).into()
            }

            (K::StyleDeclaration, "cssText") => self
                .read(|d, h| {
                    let declarations = d.style_declarations(h)?;
                    Ok(crate::model::format_declarations(&declarations))
                })?
                .into(),
            (K::StyleDeclaration, "length") => {
                (self.read(|d, h| d.style_declarations(h))?.len() as f64).into()
            }

            (K::Length, "value") => self.read(|d, h| d.length(h))?.value.into(),
            (K::Length, "valueAsString") => self.read(|d, h| d.length(h))?.to_string().into(),
            (K::Length, "unitType") => f64::from(self.read(|d, h| d.length(h))?.unit.code()).into(),

            (K::Matrix, field) => {
                let matrix = self.read(|d, h| d.matrix(h))?;
                let value = match field {
                    "a" => matrix.a,
                    "b" => matrix.b,
                    "c" => matrix.c,
                    "d" => matrix.d,
                    "e" => matrix.e,
                    "f" => matrix.f,
                    _ => return Err(self.unknown(name)),
                };
                value.into()
            }
            (K::Point, "x") => self.read(|d, h| d.point(h))?.x.into(),
            (K::Point, "y") => self.read(|d, h| d.point(h))?.y.into(),
            (K::Rect, field) => {
                let rect = self.read(|d, h| d.rect(h))?;
                let value = match field {
                    "x" => rect.x,
                    "y" => rect.y,
                    "width" => rect.width,
                    "height" => rect.height,
                    _ => return Err(self.unknown(name)),
                };
                value.into()
            }

            (K::Event, "type") => self.event_field(|e| e.event_type.clone())?.into(),
            (K::Event, "target") => {
                let target = self.event_field(|e| e.target)?;
                self.proxy_value(target)?
            }
            (K::Event, "currentTarget") => {
                let target = self.event_field(|e| e.current_target)?;
                self.proxy_value(target)?
            }
            (K::Event, "bubbles") => self.event_field(|e| e.bubbles)?.into(),
            (K::Event, "cancelable") => self.event_field(|e| e.cancelable)?.into(),
            (K::Event, "defaultPrevented") => self.event_field(|e| e.default_prevented)?.into(),
            (K::MouseEvent, "clientX") => self.mouse_field(|m| m.client_x)?,
            (K::MouseEvent, "clientY") => self.mouse_field(|m| m.client_y)?,
            (K::MouseEvent, "button") => self.mouse_field(|m| f64::from(m.button))?,

            _ => return Err(self.unknown(name)),
        };
        Ok(value)
    }

    fn set_own(&self, owner: WrapperKind, name: &str, value: &ScriptValue) -> BridgeResult<()> {
        let text = value.to_script_string();
        match (owner, name) {
            (K::Node, "nodeValue") => self.write(|d, h| match d.node_type(h)? {
                2 => d.set_attr_value(h, &text),
                3 | 8 => d.set_character_data(h, &text),
                _ => Ok(()),
            }),
            (K::Node, "textContent") => {
                let text = optional_string(value).unwrap_or_default();
                self.write(|d, h| d.set_text_content(h, &text))
            }
            (K::CharacterData, "data") => self.write(|d, h| d.set_character_data(h, &text)),
            (K::Attr, "value") => self.write(|d, h| d.set_attr_value(h, &text)),
            (K::Element, "id") => self.write(|d, h| d.set_attribute(h, "id", &text)),
            (K::SvgElement, "className") => self.set_class_name(&text),
            (K::StyleDeclaration, "cssText") => {
                let declarations = crate::model::parse_declarations(&text);
                self.write(|d, h| d.set_style_declarations(h, &declarations))
            }
            (K::Length, "value") => {
                let number = number_value(name, value)?;
                self.write(|d, h| {
                    let mut length = d.length(h)?;
                    length.value = number;
                    d.set_length(h, length)
                })
            }
            (K::Length, "valueAsString") => {
                let length = Length::parse(&text)
                    .ok_or_else(|| BridgeError::invalid(name, format!("'{text}' is not a length")))?;
                self.write(|d, h| d.set_length(h, length))
            }
            (K::Matrix, field) => {
                let number = number_value(name, value)?;
                self.write(|d, h| {
                    let mut matrix = d.matrix(h)?;
                    match field {
                        "a" => matrix.a = number,
                        "b" => matrix.b = number,
                        "c" => matrix.c = number,
                        "d" => matrix.d = number,
                        "e" => matrix.e = number,
                        _ => matrix.f = number,
                    }
                    d.set_matrix(h, matrix)
                })
            }
            (K::Point, field) => {
                let number = number_value(name, value)?;
                self.write(|d, h| {
                    let mut point = d.point(h)?;
                    if field == "x" {
                        point.x = number;
                    } else {
                        point.y = number;
                    }
                    d.set_point(h, point)
                })
            }
            (K::Rect, field) => {
                let number = number_value(name, value)?;
                self.write(|d, h| {
                    let mut rect = d.rect(h)?;
                    match field {
                        "x" => rect.x = number,
                        "y" => rect.y = number,
                        "width" => rect.width = number,
                        _ => rect.height = number,
                    }
                    d.set_rect(h, rect)
                })
            }
            _ => Err(self.unknown(name)),
        }
    }

    fn call_own(
        &self,
        owner: WrapperKind,
        name: &str,
        args: &[ScriptValue],
    ) -> BridgeResult<ScriptValue> {
        let value = match (owner, name) {
            (K::Node, "appendChild") => {
                let child = self.required_native_arg(name, args, 0)?;
                self.write(|d, h| d.append_child(h, child))?;
                arg(args, 0).clone()
            }
            (K::Node, "insertBefore") => {
                let child = self.required_native_arg(name, args, 0)?;
                let reference = self.native_arg(name, args, 1)?;
                self.write(|d, h| d.insert_before(h, child, reference))?;
                arg(args, 0).clone()
            }
            (K::Node, "removeChild") => {
                let child = self.required_native_arg(name, args, 0)?;
                self.write(|d, h| d.remove_child(h, child))?;
                arg(args, 0).clone()
            }
            (K::Node, "hasChildNodes") => {
                if self.is_attr() {
                    false.into()
                } else {
                    self.read(|d, h| Ok(!d.children(h)?.is_empty()))?.into()
                }
            }
            (K::Node, "contains") => match self.native_arg(name, args, 0)? {
                Some(other) if !self.is_attr() => {
                    self.read(|d, h| Ok(d.is_live(other) && d.contains(h, other)?))?.into()
                }
                _ => false.into(),
            },
            (K::Node, "isSameNode") => match arg(args, 0) {
                ScriptValue::Proxy(other) => (self == other).into(),
                _ => false.into(),
            },

            (K::Document, "getElementById") => {
                let id = arg_string(args, 0);
                let element = self.read(|d, _| Ok(d.element_by_id(&id)))?;
                self.proxy_value(element)?
            }
            (K::Document, "createElementNS") => {
                let namespace = optional_string(arg(args, 0));
                let qualified = arg_string(args, 1);
                let element =
                    self.write(|d, _| Ok(d.create_element(namespace.as_deref(), &qualified)))?;
                self.proxy_value(Some(element))?
            }
            (K::Document, "createElement") => {
                let local = arg_string(args, 0);
                let element = self.write(|d, _| Ok(d.create_element(None, &local)))?;
                self.proxy_value(Some(element))?
            }
            (K::Document, "createTextNode") => {
                let data = arg_string(args, 0);
                let node = self.write(|d, _| Ok(d.create_text(&data)))?;
                self.proxy_value(Some(node))?
            }
            (K::Document, "createComment") => {
                let data = arg_string(args, 0);
                let node = self.write(|d, _| Ok(d.create_comment(&data)))?;
                self.proxy_value(Some(node))?
            }
            (K::Document | K::Element, "getElementsByTagName") => {
                let tag = arg_string(args, 0);
                let found = self.read(|d, h| d.elements_by_tag_name(h, &tag))?;
                self.proxy_list(found)?
            }

            (K::Element, "getAttribute") => {
                let attribute = arg_string(args, 0);
                self.read(|d, h| d.attribute(h, &attribute))?.into()
            }
            (K::Element, "setAttribute") => {
                let attribute = arg_string(args, 0);
                let value = arg_string(args, 1);
                self.write(|d, h| d.set_attribute(h, &attribute, &value))?;
                ScriptValue::Undefined
            }
            (K::Element, "removeAttribute") => {
                let attribute = arg_string(args, 0);
                self.write(|d, h| d.remove_attribute(h, &attribute))?;
                ScriptValue::Undefined
            }
            (K::Element, "hasAttribute") => {
                let attribute = arg_string(args, 0);
                self.read(|d, h| Ok(d.attribute(h, &attribute)?.is_some()))?.into()
            }
            (K::Element, "getAttributeNode") => {
                let attribute = arg_string(args, 0);
                let node = self.write(|d, h| d.attribute_node(h, &attribute))?;
                self.proxy_value(node)?
            }

            (K::SvgGraphics, "getBBox") => self.bounding_box()?.into(),
            (K::SvgGraphics, "getCTM") => self.ctm()?.into(),

            (K::SvgRoot, "createSVGMatrix") => {
                let matrix = self.write(|d, _| Ok(d.create_matrix(Matrix::IDENTITY)))?;
                self.wrap_value(matrix)?.into()
            }
            (K::SvgRoot, "createSVGPoint") => {
                let point = self.write(|d, _| Ok(d.create_point(Point::default())))?;
                self.wrap_value(point)?.into()
            }
            (K::SvgRoot, "createSVGRect") => {
                let rect = self.write(|d, _| Ok(d.create_rect(RectValue::default())))?;
                self.wrap_value(rect)?.into()
            }

            (K::NodeList, "item") => {
                let index = arg_number(name, args, 0)?;
                if index < 0.0 {
                    ScriptValue::Null
                } else {
                    self.list_item(index as usize)?
                }
            }

            (K::StyleDeclaration, "getPropertyValue") => {
                let property = arg_string(args, 0);
                self.read(|d, h| d.style_property(h, &property))?
                    .unwrap_or_default()
                    .into()
            }
            (K::StyleDeclaration, "setProperty") => {
                let property = arg_string(args, 0);
                let value = optional_string(arg(args, 1)).unwrap_or_default();
                self.write(|d, h| d.set_style_property(h, &property, &value))?;
                ScriptValue::Undefined
            }
            (K::StyleDeclaration, "removeProperty") => {
                let property = arg_string(args, 0);
                self.write(|d, h| d.remove_style_property(h, &property))?
                    .unwrap_or_default()
                    .into()
            }
            (K::StyleDeclaration, "item") => {
                let index = arg_number(name, args, 0)?;
                let declarations = self.read(|d, h| d.style_declarations(h))?;
                let found = (index >= 0.0)
                    .then(|| declarations.into_iter().nth(index as usize))
                    .flatten();
                found.map(|(property, _)| property).unwrap_or_default().into()
            }

            (K::Length, "newValueSpecifiedUnits") => {
                let code = arg_number(name, args, 0)?;
                let unit = LengthUnit::from_code(code as u16)
                    .filter(|_| code.fract() == 0.0 && code >= 0.0)
                    .ok_or_else(|| BridgeError::invalid(name, format!("unknown unit type {code}")))?;
                let value = arg_number(name, args, 1)?;
                self.write(|d, h| d.set_length(h, Length { value, unit }))?;
                ScriptValue::Undefined
            }

            (K::Matrix, "multiply") => {
                let other = self.required_native_arg(name, args, 0)?;
                let product = self.write(|d, h| {
                    let product = d.matrix(h)?.multiply(&d.matrix(other)?);
                    Ok(d.create_matrix(product))
                })?;
                self.wrap_value(product)?.into()
            }
            (K::Matrix, "inverse") => {
                let matrix = self.read(|d, h| d.matrix(h))?;
                let inverse = matrix
                    .inverse()
                    .ok_or_else(|| BridgeError::invalid(name, "matrix is not invertible"))?;
                self.fresh_matrix(inverse)?
            }
            (K::Matrix, "translate") => {
                let tx = arg_number(name, args, 0)?;
                let ty = arg_number(name, args, 1)?;
                let matrix = self.read(|d, h| d.matrix(h))?;
                self.fresh_matrix(matrix.multiply(&Matrix::translation(tx, ty)))?
            }
            (K::Matrix, "scale") => {
                let factor = arg_number(name, args, 0)?;
                let matrix = self.read(|d, h| d.matrix(h))?;
                self.fresh_matrix(matrix.multiply(&Matrix::scaling(factor, factor)))?
            }

            (K::Point, "matrixTransform") => {
                let matrix = self.required_native_arg(name, args, 0)?;
                let point = self.write(|d, h| {
                    let point = d.point(h)?;
                    let (x, y) = d.matrix(matrix)?.apply(point.x, point.y);
                    Ok(d.create_point(Point { x, y }))
                })?;
                self.wrap_value(point)?.into()
            }

            (K::Event, "preventDefault") => {
                self.write(|d, h| {
                    let event = d.event_mut(h)?;
                    if event.cancelable {
                        event.default_prevented = true;
                    }
                    Ok(())
                })?;
                ScriptValue::Undefined
            }
            (K::Event, "stopPropagation") => {
                self.write(|d, h| {
                    d.event_mut(h)?.propagation_stopped = true;
                    Ok(())
                })?;
                ScriptValue::Undefined
            }

            _ => return Err(self.unknown(name)),
        };
        Ok(value)
    }

    fn fresh_matrix(&self, matrix: Matrix) -> BridgeResult<ScriptValue> {
        let handle = self.write(|d, _| Ok(d.create_matrix(matrix)))?;
        Ok(self.wrap_value(handle)?.into())
    }
}

fn number_value(member: &str, value: &ScriptValue) -> BridgeResult<f64> {
    value
        .as_f64()
        .ok_or_else(|| BridgeError::invalid(member, "value must be a number"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::ScriptSession;

    const MARKUP: &str = concat!(
        r#"<svg width="100" height="50"><g id="group" transform="translate(10 20)">"#,
        r#"<rect id="box" x="1" y="2" width="30px" height="40" style="fill: red; stroke: blue"/>"#,
        r#"<text id="label">hello</text></g></svg>"#,
    );

    fn session() -> ScriptSession {
        ScriptSession::new(Document::parse_svg(MARKUP).expect("parse markup"))
    }

    fn by_id(session: &ScriptSession, id: &str) -> WrapperInstance {
        let document = session.document_proxy().expect("document proxy");
        document
            .call("getElementById", &[ScriptValue::from(id)])
            .expect("getElementById")
            .as_proxy()
            .cloned()
            .expect("element exists")
    }

    #[test]
    fn members_resolve_through_the_chain() {
        let session = session();
        let rect = by_id(&session, "box");
        assert_eq!(rect.member_kind("getBBox"), Some(MemberKind::Method));
        assert_eq!(rect.member_kind("nodeName"), Some(MemberKind::Property));
        assert_eq!(rect.member_kind("createSVGMatrix"), None);
        assert!(member_names(WrapperKind::SvgRect).contains(&"appendChild"));

        assert_eq!(rect.get("tagName").unwrap(), ScriptValue::from("rect"));
        assert_eq!(rect.get("id").unwrap(), ScriptValue::from("box"));
        assert!(matches!(
            rect.get("nope"),
            Err(BridgeError::UnknownMember { member, .. }) if member == "nope"
        ));
    }

    #[test]
    fn navigation_returns_the_cached_proxy() {
        let session = session();
        let rect = by_id(&session, "box");
        let group = rect.get("parentNode").unwrap();
        let again = by_id(&session, "group");
        assert!(group.as_proxy().unwrap().ptr_eq(&again));
    }

    #[test]
    fn lengths_reflect_attributes() {
        let session = session();
        let rect = by_id(&session, "box");
        let width = rect.get("width").unwrap().as_proxy().cloned().unwrap();
        assert_eq!(width.get("value").unwrap().as_f64(), Some(30.0));
        assert_eq!(width.get("unitType").unwrap().as_f64(), Some(5.0));

        width.set("value", ScriptValue::Number(12.0)).unwrap();
        assert_eq!(
            rect.call("getAttribute", &["width".into()]).unwrap(),
            ScriptValue::from("12px")
        );

        assert!(matches!(
            width.set("unitType", ScriptValue::Number(1.0)),
            Err(BridgeError::ReadOnly { .. })
        ));
    }

    #[test]
    fn style_declaration_edits_the_attribute() {
        let session = session();
        let rect = by_id(&session, "box");
        let style = rect.get("style").unwrap().as_proxy().cloned().unwrap();
        assert_eq!(
            style.call("getPropertyValue", &["fill".into()]).unwrap(),
            ScriptValue::from("red")
        );
        style
            .call("setProperty", &["fill".into(), "green".into()])
            .unwrap();
        style.call("removeProperty", &["stroke".into()]).unwrap();
        assert_eq!(
            rect.call("getAttribute", &["style".into()]).unwrap(),
            ScriptValue::from("fill: green;")
        );
    }

    #[test]
    fn tree_mutation_through_proxies() {
        let session = session();
        let document = session.document_proxy().unwrap();
        let group = by_id(&session, "group");
        let circle = document
            .call(
                "createElementNS",
                &[crate::model::SVG_NAMESPACE.into(), "circle".into()],
            )
            .unwrap();
        assert_eq!(circle.as_proxy().unwrap().kind(), WrapperKind::SvgCircle);

        let returned = group.call("appendChild", &[circle.clone()]).unwrap();
        assert_eq!(returned, circle);
        let last = group.get("lastChild").unwrap();
        assert!(last.as_proxy().unwrap().ptr_eq(circle.as_proxy().unwrap()));

        let children = group.get("childNodes").unwrap().as_proxy().cloned().unwrap();
        assert_eq!(children.get("length").unwrap().as_f64(), Some(3.0));
        assert!(children.get("2").unwrap().as_proxy().unwrap().ptr_eq(circle.as_proxy().unwrap()));
    }

    #[test]
    fn foreign_proxies_are_rejected() {
        let first = session();
        let second = session();
        let group = by_id(&first, "group");
        let stranger = by_id(&second, "box");
        assert_eq!(
            group.call("appendChild", &[stranger.into()]).err(),
            Some(BridgeError::ForeignSession)
        );
    }

    #[test]
    fn matrix_methods_return_fresh_matrices() {
        let session = session();
        let svg = session
            .document_proxy()
            .unwrap()
            .get("documentElement")
            .unwrap()
            .as_proxy()
            .cloned()
            .unwrap();
        let matrix = svg.call("createSVGMatrix", &[]).unwrap().as_proxy().cloned().unwrap();
        let moved = matrix
            .call("translate", &[5.0.into(), 6.0.into()])
            .unwrap()
            .as_proxy()
            .cloned()
            .unwrap();
        assert!(!moved.ptr_eq(&matrix));
        assert_eq!(moved.get("e").unwrap().as_f64(), Some(5.0));
        assert_eq!(matrix.get("e").unwrap().as_f64(), Some(0.0));

        matrix.set("a", 0.0.into()).unwrap();
        matrix.set("d", 0.0.into()).unwrap();
        assert!(matches!(
            matrix.call("inverse", &[]),
            Err(BridgeError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn disposed_proxy_rejects_members() {
        let session = session();
        let rect = by_id(&session, "box");
        rect.dispose();
        assert!(matches!(rect.get("id"), Err(BridgeError::Disposed { .. })));
        assert!(matches!(
            rect.call("getBBox", &[]),
            Err(BridgeError::Disposed { .. })
        ));
    }
}
