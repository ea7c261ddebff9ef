//! In-memory message model for the Courier dispatch core.
//!
//! Transports and encoders live outside the core. They hand the dispatcher a
//! [`Message`] whose addressing headers are already decoded into typed fields
//! and whose remaining headers are kept as [`HeaderElement`] trees. Replies
//! and faults travel back the same way.
//!
//! The crate also defines the wire-level fault shape ([`MessageFault`],
//! [`FaultCode`], [`FaultReason`]) and the envelope/addressing versions that
//! decide how generic fault codes and default fault actions are named.

mod address;
mod error;
mod fault;
mod header;
mod headers;
mod message;
mod version;

pub use self::address::EndpointAddress;
pub use self::error::MessageError;
pub use self::fault::{
    DEFAULT_REASON_LANGUAGE, FaultCode, FaultReason, FaultReasonText, MessageFault,
};
pub use self::header::{HeaderAttribute, HeaderContent, HeaderElement, QualifiedName};
pub use self::headers::MessageHeaders;
pub use self::message::{Message, MessageBody, MessageBuffer, MessageState};
pub use self::version::{
    ADDRESSING10_FAULT_ACTION, ADDRESSING10_NAMESPACE, AddressingVersion,
    DISPATCHER_FAULT_ACTION, EnvelopeVersion, MessageVersion, SOAP11_NAMESPACE, SOAP12_NAMESPACE,
};
pub use url::Url;
