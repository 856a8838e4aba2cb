use html_escape::{encode_double_quoted_attribute, encode_text};

use super::arena::NativeHandle;
use super::document::{Document, ModelResult, NodeContent};
use super::types::SVG_NAMESPACE;

impl Document {
    /// Serialize the whole document as standalone SVG markup.
    pub fn to_svg(&self) -> ModelResult<String> {
        let mut output = String::new();
        for child in self.children(self.root())? {
            self.serialize_node(*child, &mut output)?;
        }
        Ok(output)
    }

    /// Serialize one node and its subtree.
    pub fn outer_markup(&self, handle: NativeHandle) -> ModelResult<String> {
        let mut output = String::new();
        self.serialize_node(handle, &mut output)?;
        Ok(output)
    }

    fn serialize_node(&self, handle: NativeHandle, output: &mut String) -> ModelResult<()> {
        match self.content(handle)? {
            NodeContent::Document => {
                for child in self.children(handle)? {
                    self.serialize_node(*child, output)?;
                }
            }
            NodeContent::Element(element) => {
                output.push('<');
                output.push_str(&element.local_name);

                let is_outermost = self.parent(handle)? == Some(self.root());
                if is_outermost
                    && element.namespace.as_deref() == Some(SVG_NAMESPACE)
                    && element.attribute("xmlns").is_none()
                {
                    output.push_str(" xmlns=\"");
                    output.push_str(SVG_NAMESPACE);
                    output.push('"');
                }

                for (name, value) in &element.attributes {
                    output.push(' ');
                    output.push_str(name);
                    output.push_str("=\"");
                    output.push_str(&encode_double_quoted_attribute(value));
                    output.push('"');
                }

                let children = self.children(handle)?;
                if children.is_empty() {
                    output.push_str("/>");
                    return Ok(());
                }
                output.push('>');
                for child in children {
                    self.serialize_node(*child, output)?;
                }
                output.push_str("</");
                output.push_str(&element.local_name);
                output.push('>');
            }
            NodeContent::Text(text) => output.push_str(&encode_text(text)),
            NodeContent::Comment(text) => {
                output.push_str("<!--");
                output.push_str(text);
                output.push_str("-->");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{Document, SVG_NAMESPACE};

    #[test]
    fn serializes_with_namespace_and_escaping() {
        let mut document = Document::new();
        let svg = document.create_element(Some(SVG_NAMESPACE), "svg");
        let text = document.create_element(Some(SVG_NAMESPACE), "text");
        let label = document.create_text("a < b");
        document.append_child(document.root(), svg).unwrap();
        document.append_child(svg, text).unwrap();
        document.append_child(text, label).unwrap();
        document.set_attribute(text, "data-note", "say \"hi\"").unwrap();

        assert_eq!(
            document.to_svg().unwrap(),
            "<svg xmlns=\"http://www.w3.org/2000/svg\"><text data-note=\"say &quot;hi&quot;\">a &lt; b</text></svg>"
        );
    }

    #[test]
    fn parsed_markup_serializes_back() {
        let document =
            Document::parse_svg(r#"<svg xmlns="http://www.w3.org/2000/svg"><circle r="4"/></svg>"#)
                .unwrap();
        assert_eq!(
            document.to_svg().unwrap(),
            r#"<svg xmlns="http://www.w3.org/2000/svg"><circle r="4"/></svg>"#
        );
    }
}
