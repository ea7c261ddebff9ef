//! Unit tests for fault construction and the error pipeline.

use std::io;
use std::sync::Arc;

use courier_message::{
    ADDRESSING10_FAULT_ACTION, ADDRESSING10_NAMESPACE, DISPATCHER_FAULT_ACTION, FaultCode,
    FaultReason, Message, MessageFault, MessageVersion, Url,
};
use mockall::{Sequence, mock};
use rstest::{fixture, rstest};
use serde_json::json;

use super::*;
use crate::errors::DispatchError;

mock! {
    Handler {}
    impl ErrorHandler for Handler {
        fn name(&self) -> String;
        fn provide_fault(
            &self,
            error: &ServiceError,
            version: MessageVersion,
            fault: &mut Option<Message>,
        ) -> Result<(), BoxError>;
        fn handle_error(&self, error: &ServiceError) -> Result<bool, BoxError>;
    }
}

mock! {
    Converter {}
    impl FaultConverter for Converter {
        fn try_create_fault_message(
            &self,
            error: &ServiceError,
            version: MessageVersion,
        ) -> Option<Message>;
    }
}

/// Handler that leaves the fault alone and reports `handled`.
fn passive_handler(handled: bool) -> MockHandler {
    let mut handler = MockHandler::new();
    handler.expect_provide_fault().returning(|_, _, _| Ok(()));
    handler
        .expect_handle_error()
        .returning(move |_| Ok(handled));
    handler
}

fn custom_fault(version: MessageVersion, action: Option<&str>) -> Message {
    let fault = MessageFault::new(
        FaultCode::sender(Some(FaultCode::new("QuotaExceeded", "urn:billing"))),
        FaultReason::new("quota exceeded"),
    );
    Message::fault(version, fault, action.map(str::to_owned))
}

#[fixture]
fn behavior() -> ErrorBehavior {
    ErrorBehavior::new(MessageVersion::default(), false)
}

#[rstest]
#[case::addressing(MessageVersion::SOAP12_ADDRESSING10, ADDRESSING10_FAULT_ACTION)]
#[case::no_addressing(MessageVersion::SOAP11, DISPATCHER_FAULT_ACTION)]
fn unrecognised_error_gets_last_resort_fault(
    #[case] version: MessageVersion,
    #[case] expected_action: &str,
) {
    let behavior = ErrorBehavior::new(version, false);

    let (info, handled) = behavior
        .process(&ServiceError::application("database offline"))
        .expect("pipeline completes");

    let fault = info.fault.as_ref().expect("a fault is always produced");
    assert_eq!(fault.action(), Some(expected_action));
    let body = fault.peek_fault().expect("fault body");
    assert!(body.code().is_receiver_fault());
    assert!(body.code().contains(INTERNAL_SERVICE_FAULT_CODE, DISPATCHER_NAMESPACE));
    assert_eq!(body.reason().text(), INTERNAL_ERROR_REASON);
    assert!(body.detail().is_none());
    assert!(info.is_considered_unhandled);
    assert!(!handled);
}

#[rstest]
fn exception_detail_is_included_when_enabled() {
    let behavior = ErrorBehavior::new(MessageVersion::default(), true);
    let error = ServiceError::from_source(io::Error::other("disk full"));

    let (info, _) = behavior.process(&error).expect("pipeline completes");

    let body = info
        .fault
        .as_ref()
        .and_then(Message::peek_fault)
        .expect("fault body");
    assert_eq!(body.reason().text(), "disk full");
    assert_eq!(
        body.detail(),
        Some(&json!({
            "kind": "application",
            "message": "disk full",
            "inner": { "kind": "source", "message": "disk full" }
        }))
    );
}

#[rstest]
fn typed_fault_is_recognised(behavior: ErrorBehavior) {
    let error = ServiceError::from(FaultException::access_denied());

    let (info, handled) = behavior.process(&error).expect("pipeline completes");

    let fault = info.fault.as_ref().expect("fault");
    assert!(!info.is_considered_unhandled);
    assert!(handled);
    assert_eq!(fault.action(), Some(ADDRESSING10_FAULT_ACTION));
    let body = fault.peek_fault().expect("fault body");
    assert!(body.code().contains(ACCESS_DENIED_CODE, DISPATCHER_NAMESPACE));
}

#[rstest]
fn typed_fault_keeps_its_own_action(behavior: ErrorBehavior) {
    let error = ServiceError::from(
        FaultException::internal_service_fault("custom").with_action("urn:custom/fault"),
    );

    let (info, _) = behavior.process(&error).expect("pipeline completes");

    assert_eq!(
        info.fault.as_ref().and_then(Message::action),
        Some("urn:custom/fault")
    );
}

#[rstest]
#[case::security(ServiceError::security("no role"), ACCESS_DENIED_CODE, DISPATCHER_NAMESPACE)]
#[case::authentication(
    ServiceError::authentication("bad token"),
    AUTHENTICATION_FAILED_CODE,
    SECURITY_NAMESPACE
)]
fn security_errors_get_generic_faults(
    behavior: ErrorBehavior,
    #[case] error: ServiceError,
    #[case] code: &str,
    #[case] namespace: &str,
) {
    let (info, handled) = behavior.process(&error).expect("pipeline completes");

    let body = info
        .fault
        .as_ref()
        .and_then(Message::peek_fault)
        .expect("fault body");
    assert!(body.code().contains(code, namespace));
    assert!(body.code().is_sender_fault());
    assert!(!body.reason().text().contains("no role"));
    assert!(handled);
}

#[rstest]
fn converter_runs_before_typed_faults() {
    let mut converter = MockConverter::new();
    converter
        .expect_try_create_fault_message()
        .once()
        .returning(|_, version| Some(custom_fault(version, Some("urn:converted"))));
    let behavior =
        ErrorBehavior::new(MessageVersion::default(), false).with_converter(Arc::new(converter));

    let (info, handled) = behavior
        .process(&ServiceError::from(FaultException::access_denied()))
        .expect("pipeline completes");

    let fault = info.fault.as_ref().expect("fault");
    assert_eq!(fault.action(), Some("urn:converted"));
    assert!(
        fault
            .peek_fault()
            .is_some_and(|body| body.code().contains("QuotaExceeded", "urn:billing"))
    );
    assert!(handled);
}

#[rstest]
fn handlers_run_in_registration_order() {
    let mut sequence = Sequence::new();
    let mut first = MockHandler::new();
    let mut second = MockHandler::new();
    first
        .expect_provide_fault()
        .once()
        .in_sequence(&mut sequence)
        .returning(|_, version, fault| {
            *fault = Some(custom_fault(version, None));
            Ok(())
        });
    second
        .expect_provide_fault()
        .once()
        .in_sequence(&mut sequence)
        .returning(|_, _, fault| {
            assert!(matches!(fault, Some(message) if message.is_fault()));
            Ok(())
        });
    first
        .expect_handle_error()
        .once()
        .in_sequence(&mut sequence)
        .returning(|_| Ok(false));
    second
        .expect_handle_error()
        .once()
        .in_sequence(&mut sequence)
        .returning(|_| Ok(true));
    let behavior = ErrorBehavior::new(MessageVersion::default(), false)
        .with_handlers([Arc::new(first) as Arc<dyn ErrorHandler>, Arc::new(second)]);

    let (info, handled) = behavior
        .process(&ServiceError::application("quota"))
        .expect("pipeline completes");

    assert!(handled);
    assert!(!info.is_considered_unhandled);
    assert!(
        info.fault
            .as_ref()
            .and_then(Message::peek_fault)
            .is_some_and(|body| body.code().contains("QuotaExceeded", "urn:billing"))
    );
}

#[rstest]
fn cleared_fault_falls_back_to_last_resort() {
    let mut handler = MockHandler::new();
    handler.expect_provide_fault().returning(|_, _, fault| {
        *fault = None;
        Ok(())
    });
    handler.expect_handle_error().returning(|_| Ok(false));
    let behavior =
        ErrorBehavior::new(MessageVersion::default(), false).with_handler(Arc::new(handler));

    let (info, handled) = behavior
        .process(&ServiceError::from(FaultException::access_denied()))
        .expect("pipeline completes");

    let fault = info.fault.as_ref().expect("a fault is always produced");
    assert!(fault.action().is_some());
    assert!(info.is_considered_unhandled);
    assert!(!handled);
}

#[rstest]
fn handler_supplied_internal_fault_counts_as_unhandled() {
    let mut handler = MockHandler::new();
    handler.expect_provide_fault().returning(|_, version, fault| {
        *fault = Some(FaultException::internal_service_fault("wrapped").create_message(version));
        Ok(())
    });
    handler.expect_handle_error().returning(|_| Ok(false));
    let behavior =
        ErrorBehavior::new(MessageVersion::default(), false).with_handler(Arc::new(handler));

    let (info, handled) = behavior
        .process(&ServiceError::Canceled)
        .expect("pipeline completes");

    assert!(info.is_considered_unhandled);
    assert!(!handled);
}

#[rstest]
fn handler_can_claim_an_unrecognised_error() {
    let behavior = ErrorBehavior::new(MessageVersion::default(), false)
        .with_handler(Arc::new(passive_handler(true)));

    let (info, handled) = behavior
        .process(&ServiceError::Canceled)
        .expect("pipeline completes");

    assert!(info.is_considered_unhandled);
    assert!(handled);
}

#[rstest]
fn failing_provide_fault_escalates() {
    let mut handler = MockHandler::new();
    handler.expect_name().return_const("audit".to_owned());
    handler
        .expect_provide_fault()
        .returning(|_, _, _| Err(io::Error::other("audit log unavailable").into()));
    handler.expect_handle_error().never();
    let behavior =
        ErrorBehavior::new(MessageVersion::default(), false).with_handler(Arc::new(handler));

    let error = behavior
        .process(&ServiceError::application("boom"))
        .expect_err("handler failure escalates");

    assert!(matches!(
        &error,
        DispatchError::ErrorHandlerFailed { handler, .. } if handler == "audit"
    ));
}

#[rstest]
fn failing_handle_error_escalates() {
    let mut handler = MockHandler::new();
    handler.expect_name().return_const("metrics".to_owned());
    handler.expect_provide_fault().returning(|_, _, _| Ok(()));
    handler
        .expect_handle_error()
        .returning(|_| Err(io::Error::other("counter overflow").into()));
    let behavior =
        ErrorBehavior::new(MessageVersion::default(), false).with_handler(Arc::new(handler));

    let error = behavior
        .process(&ServiceError::application("boom"))
        .expect_err("handler failure escalates");

    assert!(error.to_string().contains("metrics"));
}

#[rstest]
fn fault_exception_builds_a_fault_message() {
    let fault = FaultException::action_not_supported(Some("urn:missing"))
        .with_detail(json!({ "hint": "check the contract" }));

    let mut message = fault.create_message(MessageVersion::default());

    assert!(message.action().is_none());
    let body = message.read_fault().expect("fault body");
    assert!(body.code().contains(ACTION_NOT_SUPPORTED_CODE, ADDRESSING10_NAMESPACE));
    assert!(body.reason().text().contains("urn:missing"));
    assert_eq!(body.detail(), Some(&json!({ "hint": "check the contract" })));
}

#[rstest]
fn destination_unreachable_names_the_address() {
    let to = Url::parse("http://a/svc3").expect("valid url");

    let fault = FaultException::destination_unreachable(Some(&to));

    assert!(fault.reason().text().contains("http://a/svc3"));
    assert!(!fault.is_internal_service_fault());
}
