//! SOAP envelope and WS-Addressing versions.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Namespace of the SOAP 1.1 envelope.
pub const SOAP11_NAMESPACE: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// Namespace of the SOAP 1.2 envelope.
pub const SOAP12_NAMESPACE: &str = "http://www.w3.org/2003/05/soap-envelope";

/// Namespace of WS-Addressing 1.0.
pub const ADDRESSING10_NAMESPACE: &str = "http://www.w3.org/2005/08/addressing";

/// Default fault action defined by WS-Addressing 1.0.
pub const ADDRESSING10_FAULT_ACTION: &str = "http://www.w3.org/2005/08/addressing/soap/fault";

/// Fault action used by the dispatcher when the binding carries no
/// addressing headers.
pub const DISPATCHER_FAULT_ACTION: &str =
    "http://schemas.microsoft.com/net/2005/12/windowscommunicationfoundation/dispatcher/fault";

/// SOAP envelope version.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum EnvelopeVersion {
    /// SOAP 1.1.
    Soap11,
    /// SOAP 1.2.
    #[default]
    Soap12,
}

impl EnvelopeVersion {
    /// Envelope namespace URI.
    #[must_use]
    pub const fn namespace(self) -> &'static str {
        match self {
            Self::Soap11 => SOAP11_NAMESPACE,
            Self::Soap12 => SOAP12_NAMESPACE,
        }
    }

    /// Local name of the generic "caller is at fault" code.
    #[must_use]
    pub const fn sender_fault_name(self) -> &'static str {
        match self {
            Self::Soap11 => "Client",
            Self::Soap12 => "Sender",
        }
    }

    /// Local name of the generic "service is at fault" code.
    #[must_use]
    pub const fn receiver_fault_name(self) -> &'static str {
        match self {
            Self::Soap11 => "Server",
            Self::Soap12 => "Receiver",
        }
    }
}

/// WS-Addressing version.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum AddressingVersion {
    /// No addressing headers on the wire.
    None,
    /// WS-Addressing 1.0.
    #[default]
    Addressing10,
}

impl AddressingVersion {
    /// Action applied to faults that were not given one explicitly.
    #[must_use]
    pub const fn default_fault_action(self) -> &'static str {
        match self {
            Self::None => DISPATCHER_FAULT_ACTION,
            Self::Addressing10 => ADDRESSING10_FAULT_ACTION,
        }
    }

    /// Namespace URI, when addressing headers are in use.
    #[must_use]
    pub const fn namespace(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Addressing10 => Some(ADDRESSING10_NAMESPACE),
        }
    }
}

/// Combined envelope and addressing version of a message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct MessageVersion {
    /// SOAP envelope version.
    pub envelope: EnvelopeVersion,
    /// WS-Addressing version.
    pub addressing: AddressingVersion,
}

impl MessageVersion {
    /// SOAP 1.1 without addressing.
    pub const SOAP11: Self = Self::new(EnvelopeVersion::Soap11, AddressingVersion::None);
    /// SOAP 1.2 with WS-Addressing 1.0.
    pub const SOAP12_ADDRESSING10: Self =
        Self::new(EnvelopeVersion::Soap12, AddressingVersion::Addressing10);

    /// Combines an envelope and an addressing version.
    #[must_use]
    pub const fn new(envelope: EnvelopeVersion, addressing: AddressingVersion) -> Self {
        Self {
            envelope,
            addressing,
        }
    }

    /// Action applied to faults that were not given one explicitly.
    #[must_use]
    pub const fn default_fault_action(self) -> &'static str {
        self.addressing.default_fault_action()
    }
}
