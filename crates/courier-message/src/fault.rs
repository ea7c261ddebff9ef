//! Protocol fault representation.
//!
//! Fault codes are held version-neutrally: the generic "sender" and
//! "receiver" codes are resolved to their envelope-specific names
//! (`Client`/`Server` for SOAP 1.1, `Sender`/`Receiver` for SOAP 1.2) only when
//! a qualified name is requested.

use serde::{Deserialize, Serialize};

use crate::header::QualifiedName;
use crate::version::EnvelopeVersion;

/// Language tag applied to reasons built without one.
pub const DEFAULT_REASON_LANGUAGE: &str = "en";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
enum CodeKind {
    Sender,
    Receiver,
    Custom,
}

/// Fault code with an optional chain of sub-codes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct FaultCode {
    kind: CodeKind,
    name: String,
    namespace: String,
    sub_code: Option<Box<FaultCode>>,
}

impl FaultCode {
    /// Generic code blaming the caller.
    #[must_use]
    pub fn sender(sub_code: Option<Self>) -> Self {
        Self {
            kind: CodeKind::Sender,
            name: String::new(),
            namespace: String::new(),
            sub_code: sub_code.map(Box::new),
        }
    }

    /// Generic code blaming the service.
    #[must_use]
    pub fn receiver(sub_code: Option<Self>) -> Self {
        Self {
            kind: CodeKind::Receiver,
            name: String::new(),
            namespace: String::new(),
            sub_code: sub_code.map(Box::new),
        }
    }

    /// Application-defined code.
    #[must_use]
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            kind: CodeKind::Custom,
            name: name.into(),
            namespace: namespace.into(),
            sub_code: None,
        }
    }

    /// Attaches a sub-code.
    #[must_use]
    pub fn with_sub_code(mut self, sub_code: Self) -> Self {
        self.sub_code = Some(Box::new(sub_code));
        self
    }

    /// Returns `true` for the generic sender code.
    #[must_use]
    pub const fn is_sender_fault(&self) -> bool {
        matches!(self.kind, CodeKind::Sender)
    }

    /// Returns `true` for the generic receiver code.
    #[must_use]
    pub const fn is_receiver_fault(&self) -> bool {
        matches!(self.kind, CodeKind::Receiver)
    }

    /// Sub-code, if any.
    #[must_use]
    pub fn sub_code(&self) -> Option<&Self> {
        self.sub_code.as_deref()
    }

    /// Resolves the code to a qualified name under the given envelope.
    #[must_use]
    pub fn qualified_name(&self, envelope: EnvelopeVersion) -> QualifiedName {
        match self.kind {
            CodeKind::Sender => {
                QualifiedName::new(envelope.sender_fault_name(), envelope.namespace())
            }
            CodeKind::Receiver => {
                QualifiedName::new(envelope.receiver_fault_name(), envelope.namespace())
            }
            CodeKind::Custom => QualifiedName::new(self.name.clone(), self.namespace.clone()),
        }
    }

    /// Returns `true` when this code, or any sub-code beneath it, carries the
    /// given application-defined name.
    #[must_use]
    pub fn contains(&self, name: &str, namespace: &str) -> bool {
        let mut current = Some(self);
        while let Some(code) = current {
            if matches!(code.kind, CodeKind::Custom)
                && code.name == name
                && code.namespace == namespace
            {
                return true;
            }
            current = code.sub_code();
        }
        false
    }
}

/// Human-readable fault reason text in one language.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct FaultReasonText {
    /// Reason text.
    pub text: String,
    /// Language tag.
    pub lang: String,
}

/// Human-readable fault reason, possibly in several languages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct FaultReason {
    translations: Vec<FaultReasonText>,
}

impl FaultReason {
    /// Creates a reason in the default language.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            translations: vec![FaultReasonText {
                text: text.into(),
                lang: DEFAULT_REASON_LANGUAGE.to_owned(),
            }],
        }
    }

    /// Adds a translation.
    #[must_use]
    pub fn with_translation(mut self, text: impl Into<String>, lang: impl Into<String>) -> Self {
        self.translations.push(FaultReasonText {
            text: text.into(),
            lang: lang.into(),
        });
        self
    }

    /// Text in the requested language, falling back to the first entry.
    #[must_use]
    pub fn text_for(&self, lang: &str) -> &str {
        self.translations
            .iter()
            .find(|entry| entry.lang.eq_ignore_ascii_case(lang))
            .or_else(|| self.translations.first())
            .map_or("", |entry| entry.text.as_str())
    }

    /// Text in the default language.
    #[must_use]
    pub fn text(&self) -> &str {
        self.text_for(DEFAULT_REASON_LANGUAGE)
    }

    /// All translations.
    #[must_use]
    pub fn translations(&self) -> &[FaultReasonText] {
        &self.translations
    }
}

/// Body of a fault message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MessageFault {
    code: FaultCode,
    reason: FaultReason,
    detail: Option<serde_json::Value>,
    actor: Option<String>,
    node: Option<String>,
}

impl MessageFault {
    /// Creates a fault without detail.
    #[must_use]
    pub const fn new(code: FaultCode, reason: FaultReason) -> Self {
        Self {
            code,
            reason,
            detail: None,
            actor: None,
            node: None,
        }
    }

    /// Attaches a detail payload.
    #[must_use]
    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Sets the actor URI.
    #[must_use]
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Sets the node URI.
    #[must_use]
    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }

    /// Fault code.
    #[must_use]
    pub const fn code(&self) -> &FaultCode {
        &self.code
    }

    /// Fault reason.
    #[must_use]
    pub const fn reason(&self) -> &FaultReason {
        &self.reason
    }

    /// Detail payload, if any.
    #[must_use]
    pub const fn detail(&self) -> Option<&serde_json::Value> {
        self.detail.as_ref()
    }

    /// Actor URI, if any.
    #[must_use]
    pub fn actor(&self) -> Option<&str> {
        self.actor.as_deref()
    }

    /// Node URI, if any.
    #[must_use]
    pub fn node(&self) -> Option<&str> {
        self.node.as_deref()
    }
}
