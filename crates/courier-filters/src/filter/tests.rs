//! Unit tests for individual filters.

use std::sync::Arc;

use courier_message::{
    EndpointAddress, HeaderElement, Message, MessageBody, MessageVersion, Url,
};
use rstest::{fixture, rstest};

use super::*;
use crate::error::FilterError;
use crate::uri::UriComparer;

fn message(action: Option<&str>, to: Option<&str>) -> Message {
    let mut message = Message::new(MessageVersion::default(), MessageBody::Empty)
        .with_action(action.map(str::to_owned));
    if let Some(to) = to {
        message = message.with_to(Url::parse(to).expect("test URL"));
    }
    message
}

fn address(uri: &str) -> EndpointAddress {
    EndpointAddress::parse(uri).expect("test address")
}

#[fixture]
fn op_filter() -> ActionFilter {
    ActionFilter::new(["urn:op1", "urn:op2"]).expect("non-empty actions")
}

#[rstest]
#[case(Some("urn:op1"), true)]
#[case(Some("urn:op3"), false)]
#[case(None, false)]
fn action_filter_matches_member_actions(
    op_filter: ActionFilter,
    #[case] action: Option<&str>,
    #[case] expected: bool,
) {
    assert_eq!(op_filter.matches(&message(action, None)), expected);
}

#[test]
fn action_filter_deduplicates() {
    let filter = ActionFilter::new(["urn:a", "urn:b", "urn:a"]).expect("actions");
    assert_eq!(filter.len(), 2);
    assert_eq!(filter.actions().collect::<Vec<_>>(), vec!["urn:a", "urn:b"]);
}

#[test]
fn action_filter_rejects_empty_input() {
    let result = ActionFilter::new(Vec::<String>::new());
    assert!(matches!(result, Err(FilterError::EmptyActions)));
}

#[test]
fn empty_action_matches_messages_without_action() {
    let filter = ActionFilter::new([""]).expect("actions");
    assert!(filter.matches(&message(None, None)));
}

#[rstest]
#[case(true, true)]
#[case(true, false)]
#[case(false, true)]
#[case(false, false)]
fn and_filter_reports_address_half_independently(#[case] first: bool, #[case] second: bool) {
    let pick = |flag: bool| {
        if flag {
            MessageFilter::MatchAll.shared()
        } else {
            MessageFilter::MatchNone.shared()
        }
    };
    let filter = AndFilter::new(pick(first), pick(second));
    let msg = message(None, None);
    let outcome = filter.matches_with_address_flag(&msg);
    assert_eq!(outcome.matched, first && second);
    assert_eq!(outcome.address_matched, first);
    assert_eq!(filter.matches(&msg), first && second);
}

#[test]
fn address_filter_round_trips_required_headers() {
    let target = address("http://host/svc")
        .with_header(HeaderElement::text("Tenant", "urn:t", "a"))
        .with_header(HeaderElement::text("Region", "urn:t", "eu").with_attribute("k", "", "v"));
    let filter = EndpointAddressFilter::new(target.clone(), true);

    let mut inbound = Message::new(MessageVersion::default(), MessageBody::Empty);
    target.apply_to(inbound.headers_mut());
    assert!(filter.matches(&inbound));
}

#[test]
fn address_filter_requires_every_header() {
    let target = address("http://host/svc")
        .with_header(HeaderElement::text("Tenant", "urn:t", "a"))
        .with_header(HeaderElement::text("Tenant", "urn:t", "b"));
    let filter = EndpointAddressFilter::new(target, true);
    let inbound = message(None, Some("http://host/svc"))
        .with_header(HeaderElement::text("Tenant", "urn:t", "a"));
    assert!(!filter.matches(&inbound));
}

#[rstest]
#[case(true, "http://other/svc", false)]
#[case(false, "http://other/svc", true)]
#[case(true, "http://HOST/SVC/", true)]
fn address_filter_honours_comparer(
    #[case] include_host: bool,
    #[case] to: &str,
    #[case] expected: bool,
) {
    let filter = EndpointAddressFilter::new(address("http://host/svc"), include_host);
    assert_eq!(filter.matches(&message(None, Some(to))), expected);
}

#[test]
fn address_filter_without_to_header_does_not_match() {
    let filter = EndpointAddressFilter::new(address("http://host/svc"), true);
    assert!(!filter.matches(&message(Some("urn:op"), None)));
}

#[test]
fn prefix_filter_matches_descendants() {
    let filter =
        PrefixEndpointAddressFilter::new(address("http://host/svc"), UriComparer::HOST_INCLUSIVE)
            .expect("hierarchical address");
    assert!(filter.matches(&message(None, Some("http://host/svc/child"))));
    assert!(!filter.matches(&message(None, Some("http://host/svc2"))));
}

#[test]
fn prefix_filter_rejects_opaque_uris() {
    let result =
        PrefixEndpointAddressFilter::new(address("urn:opaque"), UriComparer::HOST_INCLUSIVE);
    assert!(matches!(result, Err(FilterError::InvalidAddress { .. })));
}

#[test]
fn header_filter_checks_name_and_value() {
    let inbound = message(None, None).with_header(HeaderElement::text("Tenant", "urn:t", "a"));
    assert!(HeaderFilter::new("Tenant", "urn:t").matches(&inbound));
    assert!(HeaderFilter::new("Tenant", "urn:t").with_value("a").matches(&inbound));
    assert!(!HeaderFilter::new("Tenant", "urn:t").with_value("b").matches(&inbound));
    assert!(!HeaderFilter::new("Tenant", "urn:x").matches(&inbound));
}

#[derive(Debug)]
struct HasMessageId;

impl CustomFilter for HasMessageId {
    fn matches(&self, message: &Message) -> bool {
        message.headers().message_id().is_some()
    }
}

#[test]
fn custom_filters_are_consulted() {
    let filter = MessageFilter::Custom(Arc::new(HasMessageId));
    assert!(filter.matches(&message(None, None).with_message_id("urn:uuid:1")));
    assert!(!filter.matches(&message(None, None)));
}

#[test]
fn buffer_matching_leaves_buffer_reusable() {
    let filter = MessageFilter::from(ActionFilter::new(["urn:op"]).expect("actions"));
    let mut original = Message::new(
        MessageVersion::default(),
        MessageBody::Payload(serde_json::json!(1)),
    )
    .with_action("urn:op".to_owned());
    let buffer = original.create_buffer().expect("buffer");
    assert!(filter.matches_buffer(&buffer));
    assert!(filter.matches_buffer(&buffer));
    assert!(buffer.create_message().read_payload().is_ok());
}
