//! Out-of-band header content.
//!
//! Headers beyond the addressing set are kept as small element trees so that
//! filters can compare their XML shape without an encoder. Each element has a
//! qualified name, a list of attributes and a list of content nodes.

use serde::{Deserialize, Serialize};

/// Namespace-qualified XML name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub struct QualifiedName {
    /// Local part of the name.
    pub local: String,
    /// Namespace URI; empty when unqualified.
    pub namespace: String,
}

impl QualifiedName {
    /// Builds a qualified name.
    #[must_use]
    pub fn new(local: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            namespace: namespace.into(),
        }
    }

    /// Returns `true` when both parts match.
    #[must_use]
    pub fn is(&self, local: &str, namespace: &str) -> bool {
        self.local == local && self.namespace == namespace
    }
}

/// Attribute on a header element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct HeaderAttribute {
    /// Attribute name.
    pub name: QualifiedName,
    /// Attribute value.
    pub value: String,
}

/// Content node inside a header element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HeaderContent {
    /// Nested element.
    Element {
        /// The nested element.
        element: HeaderElement,
    },
    /// Character data.
    Text {
        /// The text value.
        text: String,
    },
}

/// A header element tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct HeaderElement {
    name: QualifiedName,
    attributes: Vec<HeaderAttribute>,
    content: Vec<HeaderContent>,
}

impl HeaderElement {
    /// Creates an empty element.
    #[must_use]
    pub fn new(local: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: QualifiedName::new(local, namespace),
            attributes: Vec::new(),
            content: Vec::new(),
        }
    }

    /// Creates an element holding a single text node.
    #[must_use]
    pub fn text(
        local: impl Into<String>,
        namespace: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self::new(local, namespace).with_text(text)
    }

    /// Appends an attribute.
    #[must_use]
    pub fn with_attribute(
        mut self,
        local: impl Into<String>,
        namespace: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.attributes.push(HeaderAttribute {
            name: QualifiedName::new(local, namespace),
            value: value.into(),
        });
        self
    }

    /// Appends a text node.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.content.push(HeaderContent::Text { text: text.into() });
        self
    }

    /// Appends a nested element.
    #[must_use]
    pub fn with_child(mut self, element: Self) -> Self {
        self.content.push(HeaderContent::Element { element });
        self
    }

    /// Qualified element name.
    #[must_use]
    pub const fn name(&self) -> &QualifiedName {
        &self.name
    }

    /// Attributes in document order.
    #[must_use]
    pub fn attributes(&self) -> &[HeaderAttribute] {
        &self.attributes
    }

    /// Content nodes in document order.
    #[must_use]
    pub fn content(&self) -> &[HeaderContent] {
        &self.content
    }

    /// Concatenated text of the direct text children.
    #[must_use]
    pub fn text_value(&self) -> String {
        self.content
            .iter()
            .filter_map(|node| match node {
                HeaderContent::Text { text } => Some(text.as_str()),
                HeaderContent::Element { .. } => None,
            })
            .collect()
    }
}
