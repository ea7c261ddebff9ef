//! Unit tests for endpoints and endpoint lookup.

use std::sync::Arc;

use courier_filters::{
    ActionFilter, FilterError, MessageFilter, PrefixEndpointAddressFilter, UriComparer,
};
use courier_message::{EndpointAddress, Message, MessageBody, MessageVersion, Url};
use rstest::rstest;

use super::*;
use crate::runtime::DispatchRuntime;
use crate::security::SecurityDefaults;

fn endpoint(uri: &str) -> Arc<EndpointDispatcher> {
    let address = EndpointAddress::parse(uri).expect("valid address");
    let runtime = Arc::new(DispatchRuntime::new(&SecurityDefaults::new()));
    Arc::new(EndpointDispatcher::new(address, "Ledger", runtime))
}

fn contract_endpoint(uri: &str, actions: &[&str]) -> Arc<EndpointDispatcher> {
    let endpoint = endpoint(uri);
    let filter = ActionFilter::new(actions.iter().copied()).expect("non-empty actions");
    endpoint
        .set_contract_filter(MessageFilter::Action(filter).shared())
        .expect("detached endpoint");
    endpoint
}

fn prefix_endpoint(uri: &str, actions: &[&str]) -> Arc<EndpointDispatcher> {
    let endpoint = if actions.is_empty() {
        endpoint(uri)
    } else {
        contract_endpoint(uri, actions)
    };
    let target = EndpointAddress::parse(uri).expect("valid address");
    let filter = PrefixEndpointAddressFilter::new(target, UriComparer::HOST_INCLUSIVE)
        .expect("hierarchical address");
    endpoint
        .set_address_filter(MessageFilter::from(filter).shared())
        .expect("detached endpoint");
    endpoint
}

fn message(to: &str, action: &str) -> Message {
    Message::new(MessageVersion::default(), MessageBody::Empty)
        .with_to(Url::parse(to).expect("valid url"))
        .with_action(action.to_owned())
}

fn resolved(table: &EndpointDispatcherTable, message: &Message) -> Option<Arc<EndpointDispatcher>> {
    table.lookup(message).expect("unambiguous lookup").endpoint
}

#[rstest]
fn setters_are_rejected_while_attached() {
    let endpoint = endpoint("http://a/svc");
    endpoint.mark_attached().expect("first attach");

    let error = endpoint.set_filter_priority(5).expect_err("attached");
    assert!(matches!(
        error,
        DispatchError::EndpointAttached { address } if address == "http://a/svc"
    ));
    assert!(endpoint.set_contract_filter(MessageFilter::MatchNone.shared()).is_err());
    assert!(endpoint.mark_attached().is_err());

    endpoint.mark_detached();
    endpoint.set_filter_priority(5).expect("detached endpoint");
    assert_eq!(endpoint.filter_priority(), 5);
}

#[rstest]
fn endpoint_filter_combines_address_and_contract() {
    let endpoint = endpoint("http://a/svc");
    assert!(Arc::ptr_eq(&endpoint.endpoint_filter(), &endpoint.address_filter()));
    let filter = ActionFilter::new(["urn:op1"]).expect("non-empty actions");

    endpoint
        .set_contract_filter(MessageFilter::Action(filter).shared())
        .expect("detached endpoint");

    let combined = endpoint.endpoint_filter();
    assert!(matches!(*combined, MessageFilter::And(_)));
    assert!(Arc::ptr_eq(&combined, &endpoint.endpoint_filter()));
    assert!(combined.matches(&message("http://a/svc", "urn:op1")));
    assert!(!combined.matches(&message("http://a/svc", "urn:op2")));
}

#[rstest]
fn message_resolves_by_destination_address() {
    let table = EndpointDispatcherTable::default();
    let first = endpoint("http://a/svc");
    let second = endpoint("http://a/svc2");
    table.add(Arc::clone(&first)).expect("registered");
    table.add(Arc::clone(&second)).expect("registered");

    let found = resolved(&table, &message("http://a/svc2", "urn:op1"));
    let missing = table
        .lookup(&message("http://a/svc3", "urn:op1"))
        .expect("no match is not an error");

    assert!(found.is_some_and(|endpoint| Arc::ptr_eq(&endpoint, &second)));
    assert!(missing.endpoint.is_none());
    assert!(!missing.address_matched);
    assert!(!table.is_promoted().expect("table usable"));
}

#[rstest]
fn lookup_is_unchanged_by_promotion() {
    let table = EndpointDispatcherTable::new(2);
    let probe = message("http://a/svc1", "urn:op1");
    let stranger = message("http://b/other", "urn:op1");
    let endpoints: Vec<_> = (0..6).map(|n| endpoint(&format!("http://a/svc{n}"))).collect();
    let mut promoted_at = None;

    for (count, endpoint) in endpoints.iter().enumerate() {
        table.add(Arc::clone(endpoint)).expect("registered");
        let expected = endpoints.get(1).filter(|_| count >= 1);
        let found = resolved(&table, &probe);
        assert_eq!(
            found.as_ref().map(Arc::as_ptr),
            expected.map(Arc::as_ptr),
            "lookup after {} endpoints",
            count + 1
        );
        assert!(resolved(&table, &stranger).is_none());
        if promoted_at.is_none() && table.is_promoted().expect("table usable") {
            promoted_at = Some(count + 1);
        }
    }

    assert_eq!(promoted_at, Some(3));
    for endpoint in endpoints.iter().skip(2) {
        table.remove(endpoint).expect("registered");
    }
    assert!(table.is_promoted().expect("table usable"));
    assert_eq!(table.len().expect("table usable"), 2);
    assert!(resolved(&table, &probe).is_some());
}

#[rstest]
#[case::list(8)]
#[case::table(0)]
fn contract_mismatch_reports_the_address_match(#[case] threshold: usize) {
    let table = EndpointDispatcherTable::new(threshold);
    table
        .add(contract_endpoint("http://a/svc", &["urn:op1", "urn:op2"]))
        .expect("registered");

    let mismatch = table
        .lookup(&message("http://a/svc", "urn:op3"))
        .expect("no match is not an error");
    let matched = table
        .lookup(&message("http://a/svc", "urn:op2"))
        .expect("unambiguous");

    assert!(mismatch.endpoint.is_none());
    assert!(mismatch.address_matched);
    assert!(matched.endpoint.is_some());
}

#[rstest]
#[case::list(8)]
#[case::table(0)]
fn equal_priority_matches_are_ambiguous(#[case] threshold: usize) {
    let table = EndpointDispatcherTable::new(threshold);
    table.add(endpoint("http://a/svc")).expect("registered");
    table.add(endpoint("http://a/svc")).expect("registered");

    let error = table
        .lookup(&message("http://a/svc", "urn:op1"))
        .expect_err("two endpoints match");

    assert!(error.is_ambiguous());
}

#[rstest]
#[case::list(8)]
#[case::table(0)]
fn higher_priority_endpoint_wins(#[case] threshold: usize) {
    let table = EndpointDispatcherTable::new(threshold);
    let preferred = endpoint("http://a/svc");
    preferred.set_filter_priority(10).expect("detached endpoint");
    table.add(endpoint("http://a/svc")).expect("registered");
    table.add(Arc::clone(&preferred)).expect("registered");

    let found = resolved(&table, &message("http://a/svc", "urn:op1"));

    assert!(found.is_some_and(|endpoint| Arc::ptr_eq(&endpoint, &preferred)));
}

#[rstest]
fn same_endpoint_cannot_be_added_twice() {
    let table = EndpointDispatcherTable::default();
    let endpoint = endpoint("http://a/svc");
    table.add(Arc::clone(&endpoint)).expect("registered");

    let error = table.add(Arc::clone(&endpoint)).expect_err("duplicate");

    assert!(matches!(error, DispatchError::Filter(FilterError::DuplicateFilter)));
    assert_eq!(table.len().expect("table usable"), 1);
}

#[rstest]
fn removing_an_unknown_endpoint_fails() {
    let table = EndpointDispatcherTable::default();

    let error = table
        .remove(&endpoint("http://a/svc"))
        .expect_err("never registered");

    assert!(matches!(error, DispatchError::EndpointNotAttached { .. }));
    assert!(table.is_empty().expect("table usable"));
}

#[rstest]
fn overlapping_prefix_endpoints_stay_ambiguous_after_promotion() {
    let table = EndpointDispatcherTable::new(2);
    table.add(prefix_endpoint("http://a/", &[])).expect("registered");
    table.add(prefix_endpoint("http://a/svc", &[])).expect("registered");
    let incoming = message("http://a/svc/x", "urn:op1");

    let listed = table.lookup(&incoming).expect_err("two prefixes match");
    table.add(endpoint("http://b/unrelated")).expect("registered");
    assert!(table.is_promoted().expect("table usable"));
    let promoted = table.lookup(&incoming).expect_err("two prefixes match");

    assert!(listed.is_ambiguous());
    assert!(promoted.is_ambiguous());
}

#[rstest]
#[case::list(8)]
#[case::table(0)]
fn shorter_prefix_endpoint_is_reached_through_its_contract(#[case] threshold: usize) {
    let table = EndpointDispatcherTable::new(threshold);
    let wide = prefix_endpoint("http://a/", &["urn:x"]);
    let narrow = prefix_endpoint("http://a/svc", &["urn:y"]);
    table.add(Arc::clone(&wide)).expect("registered");
    table.add(Arc::clone(&narrow)).expect("registered");

    let incoming = message("http://a/svc", "urn:x");
    let found = table.lookup(&incoming).expect("unambiguous");

    assert!(wide.endpoint_filter().matches(&incoming));
    assert!(found.endpoint.is_some_and(|endpoint| Arc::ptr_eq(&endpoint, &wide)));
    assert!(found.address_matched);
}
