//! Minimal XML element tree for `<filter>` markup.

use std::collections::BTreeMap;

use crate::foundation::error::{FxError, FxResult};

/// Parsed `<filter>` element (or one of its children) as handed over by the host's SVG parser.
///
/// Tag names keep their markup spelling; lookups through [`FilterElement::is`] are
/// case-insensitive.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterElement {
    /// Tag name as written, e.g. `feGaussianBlur`.
    pub tag: String,
    /// Attributes by name.
    pub attributes: BTreeMap<String, String>,
    /// Child elements in document order.
    pub children: Vec<FilterElement>,
}

impl FilterElement {
    /// Element with no attributes or children.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Builder-style attribute setter.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Builder-style child append.
    pub fn child(mut self, child: FilterElement) -> Self {
        self.children.push(child);
        self
    }

    /// Attribute value, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Case-insensitive tag comparison.
    pub fn is(&self, tag: &str) -> bool {
        self.tag.eq_ignore_ascii_case(tag)
    }

    /// Parse the first `<filter>` element found in an SVG/XML fragment.
    pub fn parse_xml(source: &str) -> FxResult<Self> {
        let doc = roxmltree::Document::parse(source)
            .map_err(|e| FxError::validation(format!("invalid filter markup: {e}")))?;
        let node = doc
            .descendants()
            .find(|n| n.is_element() && n.tag_name().name().eq_ignore_ascii_case("filter"))
            .ok_or_else(|| FxError::validation("markup contains no <filter> element"))?;
        Ok(from_xml_node(node))
    }
}

fn from_xml_node(node: roxmltree::Node<'_, '_>) -> FilterElement {
    let mut el = FilterElement::new(node.tag_name().name());
    for a in node.attributes() {
        el.attributes.insert(a.name().to_owned(), a.value().to_owned());
    }
    el.children = node
        .children()
        .filter(|c| c.is_element())
        .map(from_xml_node)
        .collect();
    el
}
