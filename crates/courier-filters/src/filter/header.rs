//! Out-of-band header presence filter.

use courier_message::{Message, QualifiedName};

/// Matches when the message carries a header with the given name and,
/// optionally, the given text value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderFilter {
    name: QualifiedName,
    value: Option<String>,
}

impl HeaderFilter {
    /// Matches any header with this qualified name.
    #[must_use]
    pub fn new(local: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: QualifiedName::new(local, namespace),
            value: None,
        }
    }

    /// Additionally requires the header text to equal `value`.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Header name.
    #[must_use]
    pub const fn name(&self) -> &QualifiedName {
        &self.name
    }

    /// Required text value, if any.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Returns `true` when a matching header is present.
    #[must_use]
    pub fn matches(&self, message: &Message) -> bool {
        message.headers().extra().iter().any(|header| {
            header.name() == &self.name
                && self
                    .value
                    .as_deref()
                    .is_none_or(|value| header.text_value() == value)
        })
    }
}
