//! Test suites for dispatcher bootstrap and message routing.

mod support;
