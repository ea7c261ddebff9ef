//! Unit tests for the filter tables.

use std::sync::Arc;
use std::thread;

use courier_message::{
    EndpointAddress, HeaderElement, Message, MessageBody, MessageVersion, Url,
};
use rstest::{fixture, rstest};

use super::*;
use crate::filter::{
    ActionFilter, AndFilter, EndpointAddressFilter, HeaderFilter, PrefixEndpointAddressFilter,
};
use crate::uri::UriComparer;

fn message(action: Option<&str>, to: Option<&str>) -> Message {
    let mut message = Message::new(MessageVersion::default(), MessageBody::Empty)
        .with_action(action.map(str::to_owned));
    if let Some(to) = to {
        message = message.with_to(Url::parse(to).expect("test URL"));
    }
    message
}

fn action(actions: &[&str]) -> Arc<MessageFilter> {
    MessageFilter::from(ActionFilter::new(actions.iter().copied()).expect("actions")).shared()
}

fn address(uri: &str) -> Arc<MessageFilter> {
    let target = EndpointAddress::parse(uri).expect("address");
    MessageFilter::from(EndpointAddressFilter::new(target, true)).shared()
}

fn prefix(uri: &str) -> Arc<MessageFilter> {
    let target = EndpointAddress::parse(uri).expect("address");
    MessageFilter::from(
        PrefixEndpointAddressFilter::new(target, UriComparer::HOST_INCLUSIVE).expect("prefix"),
    )
    .shared()
}

fn and(first: &Arc<MessageFilter>, second: &Arc<MessageFilter>) -> Arc<MessageFilter> {
    MessageFilter::from(AndFilter::new(Arc::clone(first), Arc::clone(second))).shared()
}

#[fixture]
fn mixed_filters() -> Vec<(Arc<MessageFilter>, &'static str)> {
    let svc = address("http://a/svc");
    vec![
        (action(&["urn:op1", "urn:op2"]), "ops"),
        (and(&svc, &action(&["urn:op3"])), "svc-op3"),
        (address("http://a/other"), "other"),
        (prefix("http://a/files"), "files"),
        (prefix("http://a/files/shared"), "shared"),
        (
            MessageFilter::from(HeaderFilter::new("Trace", "urn:t")).shared(),
            "traced",
        ),
    ]
}

#[rstest]
#[case(message(Some("urn:op1"), None), Ok(Some("ops")))]
#[case(message(Some("urn:op3"), Some("http://a/svc")), Ok(Some("svc-op3")))]
#[case(message(Some("urn:op3"), Some("http://a/elsewhere")), Ok(None))]
#[case(message(None, Some("http://a/other")), Ok(Some("other")))]
#[case(message(None, Some("http://a/files/x/y")), Ok(Some("files")))]
#[case(message(None, Some("http://a/files/shared/y")), Err(2))]
#[case(message(Some("urn:none"), None), Ok(None))]
fn indexed_and_sequential_tables_agree(
    mixed_filters: Vec<(Arc<MessageFilter>, &'static str)>,
    #[case] incoming: Message,
    #[case] expected: Result<Option<&'static str>, usize>,
) {
    let mut sequential = SequentialFilterTable::new();
    let mut general = FilterTable::new();
    for (filter, value) in &mixed_filters {
        sequential.add(Arc::clone(filter), *value).expect("sequential add");
        general.add(Arc::clone(filter), *value).expect("general add");
    }
    let outcome = |result: Result<Option<&&'static str>, FilterError>| match result {
        Ok(value) => Ok(value.copied()),
        Err(FilterError::MultipleFiltersMatched { filters }) => Err(filters.len()),
        Err(other) => panic!("unexpected lookup error: {other}"),
    };
    assert_eq!(outcome(sequential.get_matching_value(&incoming)), expected);
    assert_eq!(outcome(general.get_matching_value(&incoming)), expected);
}

#[test]
fn ambiguity_spans_specialised_indexes() {
    let mut table = FilterTable::new();
    let by_action = action(&["urn:op"]);
    let by_address = address("http://a/svc");
    table.add(Arc::clone(&by_action), 1).expect("add");
    table.add(Arc::clone(&by_address), 2).expect("add");

    let error = table
        .get_matching_value(&message(Some("urn:op"), Some("http://a/svc")))
        .expect_err("ambiguous");
    let FilterError::MultipleFiltersMatched { filters } = error else {
        panic!("expected an ambiguity error");
    };
    assert_eq!(filters.len(), 2);
    assert!(filters.iter().any(|found| Arc::ptr_eq(found, &by_action)));
    assert!(filters.iter().any(|found| Arc::ptr_eq(found, &by_address)));
}

#[test]
fn higher_priority_shadows_lower() {
    let mut table = FilterTable::new();
    table
        .add_with_priority(MessageFilter::MatchAll.shared(), "fallback", 0)
        .expect("add");
    table
        .add_with_priority(action(&["urn:op"]), "specific", 5)
        .expect("add");
    table
        .add_with_priority(action(&["urn:op"]), "also-low", 0)
        .expect("add");

    let found = table
        .get_matching_value(&message(Some("urn:op"), None))
        .expect("no ambiguity at the top priority");
    assert_eq!(found, Some(&"specific"));
    let fallback = table
        .get_matching_value(&message(Some("urn:other"), None))
        .expect("single fallback");
    assert_eq!(fallback, Some(&"fallback"));
    assert_eq!(table.highest_priority(), Some(5));
}

#[test]
fn get_matching_values_only_returns_the_winning_priority() {
    let mut table = FilterTable::new();
    table
        .add_with_priority(MessageFilter::MatchAll.shared(), 0, 0)
        .expect("add");
    table.add_with_priority(action(&["urn:op"]), 1, 3).expect("add");
    table.add_with_priority(action(&["urn:op"]), 2, 3).expect("add");

    let mut values = Vec::new();
    assert!(table.get_matching_values(&message(Some("urn:op"), None), &mut values));
    values.sort_unstable();
    assert_eq!(values, vec![&1, &2]);
}

#[test]
fn action_table_counts_match_all_against_action_matches() {
    let mut table = ActionFilterTable::new();
    table.add(MessageFilter::MatchAll.shared(), "all").expect("add");
    table.add(action(&["urn:op"]), "op").expect("add");

    assert_eq!(
        table
            .get_matching_value(&message(Some("urn:other"), None))
            .expect("single"),
        Some(&"all")
    );
    assert!(
        table
            .get_matching_value(&message(Some("urn:op"), None))
            .expect_err("ambiguous")
            .is_ambiguous()
    );
}

#[test]
fn action_table_rejects_other_variants() {
    let mut table = ActionFilterTable::new();
    let result = table.add(address("http://a/svc"), ());
    assert!(matches!(
        result,
        Err(FilterError::UnsupportedFilter {
            kind: "endpoint-address",
            ..
        })
    ));
}

#[test]
fn and_table_shares_first_children() {
    let svc = address("http://a/svc");
    let first = and(&svc, &action(&["urn:op1"]));
    let second = and(&svc, &action(&["urn:op2"]));
    let mut table = AndFilterTable::new();
    table.add(Arc::clone(&first), 1).expect("add");
    table.add(Arc::clone(&second), 2).expect("add");

    let probe = message(Some("urn:op2"), Some("http://a/svc"));
    assert_eq!(table.get_matching_value(&probe).expect("single"), Some(&2));

    assert_eq!(table.remove(&second).expect("remove"), 2);
    assert_eq!(table.get_matching_value(&probe).expect("single"), None);
    assert_eq!(table.remove(&first).expect("remove"), 1);
    assert!(table.is_empty());
}

#[test]
fn address_table_checks_comparer_and_headers() {
    let tenant = HeaderElement::text("Tenant", "urn:t", "a");
    let with_header = MessageFilter::from(EndpointAddressFilter::new(
        EndpointAddress::parse("http://a/svc")
            .expect("address")
            .with_header(tenant.clone()),
        true,
    ))
    .shared();
    let agnostic = MessageFilter::from(EndpointAddressFilter::new(
        EndpointAddress::parse("http://ignored/any").expect("address"),
        false,
    ))
    .shared();

    let mut table = EndpointAddressFilterTable::new();
    table.add(with_header, "tenant").expect("add");
    table.add(agnostic, "any-host").expect("add");

    let bare = message(None, Some("http://a/svc"));
    assert_eq!(table.get_matching_value(&bare).expect("single"), None);
    let tagged = message(None, Some("http://a/svc")).with_header(tenant);
    assert_eq!(table.get_matching_value(&tagged).expect("single"), Some(&"tenant"));
    let elsewhere = message(None, Some("https://b:8443/ANY/"));
    assert_eq!(table.get_matching_value(&elsewhere).expect("single"), None);
    let same_scheme = message(None, Some("http://b:8080/any"));
    assert_eq!(
        table.get_matching_value(&same_scheme).expect("single"),
        Some(&"any-host")
    );
}

#[test]
fn overlapping_prefixes_are_ambiguous() {
    let mut table = PrefixEndpointAddressFilterTable::new();
    table.add(prefix("http://a/svc"), "svc").expect("add");
    table.add(prefix("http://a/svc/orders"), "orders").expect("add");

    let deep = message(None, Some("http://a/svc/orders/42"));
    let error = table.get_matching_value(&deep).expect_err("both prefixes match");
    let FilterError::MultipleFiltersMatched { filters } = error else {
        panic!("expected an ambiguity error");
    };
    assert_eq!(filters.len(), 2);
    let shallow = message(None, Some("http://a/svc/customers"));
    assert_eq!(table.get_matching_value(&shallow).expect("single"), Some(&"svc"));
    let outside = message(None, Some("http://a/other"));
    assert_eq!(table.get_matching_value(&outside).expect("single"), None);
}

#[test]
fn and_table_retests_every_first_child_match() {
    let mut table = FilterTable::new();
    let wide = and(&prefix("http://a/"), &action(&["urn:x"]));
    let narrow = and(&prefix("http://a/svc"), &action(&["urn:y"]));
    table.add(Arc::clone(&wide), "wide").expect("add");
    table.add(Arc::clone(&narrow), "narrow").expect("add");

    let to_wide = message(Some("urn:x"), Some("http://a/svc"));
    let to_narrow = message(Some("urn:y"), Some("http://a/svc/z"));

    assert!(wide.matches(&to_wide));
    assert_eq!(table.get_matching_value(&to_wide).expect("single"), Some(&"wide"));
    assert_eq!(
        table.get_matching_value(&to_narrow).expect("single"),
        Some(&"narrow")
    );
}

#[test]
fn prefix_table_reports_ties_at_the_same_prefix() {
    let mut table = PrefixEndpointAddressFilterTable::new();
    table.add(prefix("http://a/svc"), 1).expect("add");
    table.add(prefix("http://a/svc/"), 2).expect("add");
    assert!(
        table
            .get_matching_value(&message(None, Some("http://a/svc/x")))
            .expect_err("ambiguous")
            .is_ambiguous()
    );
}

#[test]
fn duplicate_handles_are_rejected_and_removal_is_tracked() {
    let filter = action(&["urn:op"]);
    let mut table = FilterTable::new();
    table.add(Arc::clone(&filter), 1).expect("add");
    assert!(matches!(
        table.add_with_priority(Arc::clone(&filter), 2, 9),
        Err(FilterError::DuplicateFilter)
    ));
    assert_eq!(table.get(&filter), Some(&1));
    assert_eq!(table.priority_of(&filter), Some(0));
    if let Some(value) = table.get_mut(&filter) {
        *value = 7;
    }
    assert_eq!(table.remove(&filter).expect("remove"), 7);
    assert!(matches!(table.remove(&filter), Err(FilterError::FilterNotFound)));
    assert!(table.is_empty());
    assert_eq!(table.highest_priority(), None);
}

#[test]
fn equal_filters_with_distinct_handles_are_distinct_entries() {
    let mut table = FilterTable::new();
    table.add(action(&["urn:op"]), 1).expect("add");
    table.add(action(&["urn:op"]), 2).expect("add");
    assert_eq!(table.len(), 2);
    assert!(
        table
            .get_matching_filter(&message(Some("urn:op"), None))
            .expect_err("ambiguous")
            .is_ambiguous()
    );
}

#[test]
fn buffered_lookups_match_like_messages() {
    let mut table = FilterTable::new();
    table.add(action(&["urn:op"]), "op").expect("add");
    let mut original = message(Some("urn:op"), None);
    let buffer = original.create_buffer().expect("buffer");
    assert_eq!(
        table.get_matching_value_in_buffer(&buffer).expect("single"),
        Some(&"op")
    );
    assert!(
        table
            .get_matching_filter_in_buffer(&buffer)
            .expect("single")
            .is_some()
    );
}

#[test]
fn synchronized_table_is_shareable_across_threads() {
    let table = Arc::new(SynchronizedFilterTable::new());
    let handles: Vec<_> = (0..4)
        .map(|index| {
            let table = Arc::clone(&table);
            thread::spawn(move || {
                let name = format!("urn:op{index}");
                let filter = action(&[name.as_str()]);
                table.add(filter, index, 0).expect("add");
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker");
    }
    assert_eq!(table.len(), 4);
    assert_eq!(
        table
            .get_matching_value(&message(Some("urn:op2"), None))
            .expect("single"),
        Some(2)
    );
    assert_eq!(table.get_matching_values(&message(Some("urn:none"), None)), Vec::<i32>::new());
}
