//! BDD test world: holds the loader, reporter, bootstrapped host and the
//! outcome of the last dispatched message.

use std::cell::RefCell;
use std::sync::Arc;

use courier_config::Config;
use courier_filters::{ActionFilter, MessageFilter};
use courier_message::{EndpointAddress, Message, MessageBody, MessageVersion, Url};
use serde_json::Value;
use tokio::runtime::Runtime;

use crate::bootstrap::{
    BootstrapError, ConfigLoader, Courier, JsonConfigLoader, StaticConfigLoader, bootstrap_with,
};
use crate::channel::{ChannelContext, DispatchOutcome};
use crate::endpoint::EndpointDispatcher;
use crate::errors::DispatchError;
use crate::security::SecurityDefaults;

use super::{FailingConfigLoader, RecordingHealthReporter, ledger_runtime};

/// Scenario world shared across BDD steps.
pub struct TestWorld {
    loader: Box<dyn ConfigLoader>,
    pub reporter: Arc<RecordingHealthReporter>,
    courier: Option<Courier>,
    bootstrap_error: Option<BootstrapError>,
    endpoints: Vec<Arc<EndpointDispatcher>>,
    outcome: Option<Result<DispatchOutcome, DispatchError>>,
    executor: Runtime,
}

impl TestWorld {
    /// Builds a world with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            loader: Box::new(StaticConfigLoader::default()),
            reporter: Arc::new(RecordingHealthReporter::default()),
            courier: None,
            bootstrap_error: None,
            endpoints: Vec::new(),
            outcome: None,
            executor: tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .expect("failed to build test runtime"),
        }
    }

    /// Installs a loader returning `config`.
    pub fn use_config(&mut self, config: Config) {
        self.loader = Box::new(StaticConfigLoader::new(config));
        self.reset_results();
    }

    /// Installs a loader parsing `document`.
    pub fn use_document(&mut self, document: &str) {
        self.loader = Box::new(JsonConfigLoader::new(document));
        self.reset_results();
    }

    /// Installs a loader that always fails.
    pub fn use_failing_loader(&mut self) {
        self.loader = Box::new(FailingConfigLoader);
        self.reset_results();
    }

    /// Runs the bootstrap sequence once.
    pub fn bootstrap(&mut self) {
        if self.courier.is_some() || self.bootstrap_error.is_some() {
            return;
        }
        let reporter = Arc::clone(&self.reporter);
        match bootstrap_with(
            &*self.loader,
            reporter,
            MessageVersion::default(),
            SecurityDefaults::new(),
        ) {
            Ok(courier) => self.courier = Some(courier),
            Err(error) => self.bootstrap_error = Some(error),
        }
    }

    /// Returns whether bootstrap produced an error.
    #[must_use]
    pub fn bootstrap_error(&self) -> Option<&BootstrapError> {
        self.bootstrap_error.as_ref()
    }

    /// Returns the bootstrapped host.
    #[must_use]
    pub fn courier(&self) -> Option<&Courier> {
        self.courier.as_ref()
    }

    /// Attaches a ledger endpoint at `address` accepting `actions`, or
    /// every action when `actions` is empty.
    pub fn attach_ledger(&mut self, address: &str, actions: &[&str]) {
        let courier = self.courier.as_ref().expect("bootstrap must succeed first");
        let runtime = courier.new_runtime();
        ledger_runtime(&runtime).expect("ledger operations register");
        let address = EndpointAddress::parse(address).expect("valid endpoint address");
        let endpoint = courier
            .new_endpoint(address, "Ledger", runtime)
            .expect("detached endpoint");
        if !actions.is_empty() {
            let filter = ActionFilter::new(actions.iter().copied()).expect("non-empty actions");
            endpoint
                .set_contract_filter(MessageFilter::Action(filter).shared())
                .expect("detached endpoint");
        }
        courier.channel().attach(&endpoint).expect("endpoint attaches");
        self.endpoints.push(endpoint);
    }

    /// Detaches every endpoint attached so far.
    pub fn detach_all(&mut self) {
        let courier = self.courier.as_ref().expect("bootstrap must succeed first");
        for endpoint in self.endpoints.drain(..) {
            courier.channel().detach(&endpoint).expect("endpoint detaches");
        }
    }

    /// Dispatches a message to `to` and records the outcome.
    pub fn send(&mut self, to: &str, action: &str, body: Value) {
        let courier = self.courier.as_ref().expect("bootstrap must succeed first");
        let message = Message::new(MessageVersion::default(), MessageBody::Payload(body))
            .with_to(Url::parse(to).expect("valid destination"))
            .with_action(action.to_owned())
            .with_message_id("urn:uuid:scenario");
        let channel = ChannelContext::new().with_session_id("scenario");
        self.outcome = Some(self.executor.block_on(courier.dispatch(message, &channel)));
    }

    /// Outcome of the last dispatch.
    #[must_use]
    pub fn outcome(&self) -> Option<&Result<DispatchOutcome, DispatchError>> {
        self.outcome.as_ref()
    }

    /// Takes the reply of the last dispatch.
    pub fn take_reply(&mut self) -> Option<Message> {
        self.outcome
            .as_mut()
            .and_then(|outcome| outcome.as_mut().ok())
            .and_then(|outcome| outcome.reply.take())
    }

    fn reset_results(&mut self) {
        self.courier = None;
        self.bootstrap_error = None;
        self.endpoints.clear();
        self.outcome = None;
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Default test world fixture.
#[must_use]
pub fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::new())
}
