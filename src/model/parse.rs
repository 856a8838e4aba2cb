use kuchiki::traits::*;
use kuchiki::{parse_html, NodeData as MarkupData, NodeRef};

use super::arena::NativeHandle;
use super::document::{Document, ModelError, ModelResult};

impl Document {
    /// Build a document from SVG markup. The first `<svg>` element found
    /// becomes the document element; anything around it is ignored.
    pub fn parse_svg(markup: &str) -> ModelResult<Document> {
        let parsed = parse_html().one(markup);
        let svg = parsed
            .select_first("svg")
            .map_err(|_| ModelError::Parse("no <svg> element found".to_string()))?;

        let mut document = Document::new();
        let root = document.root();
        document.import(svg.as_node(), root)?;
        Ok(document)
    }

    fn import(&mut self, source: &NodeRef, parent: NativeHandle) -> ModelResult<()> {
        let handle = match source.data() {
            MarkupData::Element(element) => {
                let namespace: &str = &element.name.ns;
                let namespace = (!namespace.is_empty()).then_some(namespace);
                let handle = self.create_element(namespace, &element.name.local);
                for (name, attribute) in element.attributes.borrow().map.iter() {
                    let qualified = match &attribute.prefix {
                        Some(prefix) => format!("{}:{}", prefix, &*name.local),
                        None => name.local.to_string(),
                    };
                    self.set_attribute(handle, &qualified, &attribute.value)?;
                }
                handle
            }
            MarkupData::Text(text) => self.create_text(&text.borrow()),
            MarkupData::Comment(text) => self.create_comment(&text.borrow()),
            _ => return Ok(()),
        };
        self.append_child(parent, handle)?;

        for child in source.children() {
            self.import(&child, handle)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{Document, NativeType};

    #[test]
    fn parses_svg_elements_into_svg_types() {
        let document = Document::parse_svg(
            r#"<svg width="10"><g id="group"><rect id="box" x="1"/></g><!--note--></svg>"#,
        )
        .expect("parse svg");

        let svg = document.document_element().expect("document element");
        assert_eq!(document.type_of(svg), Some(NativeType::SvgSvgElement));
        assert_eq!(document.attribute(svg, "width").unwrap().as_deref(), Some("10"));

        let rect = document.element_by_id("box").expect("rect by id");
        assert_eq!(document.type_of(rect), Some(NativeType::SvgRectElement));
        let group = document.element_by_id("group").expect("group by id");
        assert_eq!(document.parent(rect).unwrap(), Some(group));
        assert_eq!(document.children(svg).unwrap().len(), 2);
    }

    #[test]
    fn rejects_markup_without_svg() {
        assert!(Document::parse_svg("<p>not a drawing</p>").is_err());
    }
}
