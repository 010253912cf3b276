//! Helper functions for integration tests

use std::net::TcpListener;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use itemcheck::{
    CheckRegistry, Dispatcher, MetricKey,
    agent::{AgentRequest, AgentResult, CheckStatus, ResultValue},
    config::AgentConfig,
};

/// What a [`FakeCheck`] reports
#[derive(Debug, Clone)]
pub enum FakeOutcome {
    Value(ResultValue),
    NoValue,
    Failure(Option<&'static str>),
}

/// Check double that counts invocations and remembers the last request
#[derive(Debug, Clone)]
pub struct FakeCheck {
    outcome: FakeOutcome,
    calls: Arc<AtomicUsize>,
    last_request: Arc<std::sync::Mutex<Option<AgentRequest>>>,
}

impl FakeCheck {
    pub fn new(outcome: FakeOutcome) -> Self {
        Self {
            outcome,
            calls: Arc::new(AtomicUsize::new(0)),
            last_request: Arc::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<AgentRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

impl itemcheck::Check for FakeCheck {
    fn run(&self, request: &AgentRequest, result: &mut AgentResult) -> CheckStatus {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());

        match &self.outcome {
            FakeOutcome::Value(value) => {
                result.set_value(value.clone());
                CheckStatus::Ok
            }
            FakeOutcome::NoValue => CheckStatus::Ok,
            FakeOutcome::Failure(msg) => {
                if let Some(msg) = msg {
                    result.set_msg(*msg);
                }
                CheckStatus::Fail
            }
        }
    }
}

/// Dispatcher serving only `key` through `check`
pub fn dispatcher_with(key: MetricKey, check: &FakeCheck) -> Dispatcher {
    Dispatcher::new(CheckRegistry::builder().register(key, check.clone()).build())
}

/// Dispatcher serving every key through the same fake
pub fn dispatcher_for_all(check: &FakeCheck) -> Dispatcher {
    let builder = MetricKey::ALL
        .into_iter()
        .fold(CheckRegistry::builder(), |builder, key| {
            builder.register(key, check.clone())
        });
    Dispatcher::new(builder.build())
}

/// Dispatcher over the built-in checks with a short timeout
pub fn builtin_dispatcher() -> Dispatcher {
    Dispatcher::from_config(&AgentConfig {
        timeout: 2,
        ..AgentConfig::default()
    })
    .unwrap()
}

/// A local port nothing listens on
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}
