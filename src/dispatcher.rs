//! Check dispatcher
//!
//! Maps a metric key to its registered check, builds the composite item key
//! from key and parameters, runs the check and translates its outcome.
//!
//! ```text
//! execute(key, params) → lookup → make_key → parse → Check::run → Result<Option<String>, DispatchError>
//! ```
//!
//! Each call owns its request and result scratch state; nothing is shared
//! between calls except the read-only registry.

use tracing::{debug, instrument, trace};

use crate::agent::{AgentRequest, AgentResult, CheckStatus};
use crate::checks::{Check, CheckRegistry, MetricKey};
use crate::config::AgentConfig;
use crate::error::{DispatchError, DispatchResult, UNKNOWN_ERROR};
use crate::item_key::{make_key, parse_item_key};

#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: CheckRegistry,
}

impl Dispatcher {
    pub fn new(registry: CheckRegistry) -> Self {
        Self { registry }
    }

    /// Dispatcher over the built-in checks, rejecting configs out of range
    pub fn from_config(config: &AgentConfig) -> anyhow::Result<Self> {
        let config = config.clone().validate()?;
        Ok(Self::new(CheckRegistry::builtin(&config)))
    }

    pub fn supported_keys(&self) -> Vec<MetricKey> {
        self.registry.keys()
    }

    /// Run the check registered for `key` with `params`
    ///
    /// Unsupported keys fail before anything else happens. A successful check
    /// yields its value converted to a string, or `None` if it set no value.
    #[instrument(skip(self, params), fields(params = params.len()))]
    pub fn execute<S: AsRef<str>>(&self, key: &str, params: &[S]) -> DispatchResult<Option<String>> {
        let (metric, check) = self.lookup(key)?;
        let composite = make_key(key, params);
        Invocation::new(metric, &composite).run(check)
    }

    /// Run a complete item key such as `net.tcp.port[127.0.0.1,80]`
    ///
    /// The metric name is everything before the first `[`; it is looked up
    /// before the rest of the key is parsed.
    #[instrument(skip(self))]
    pub fn execute_key(&self, text: &str) -> DispatchResult<Option<String>> {
        let name = text.split_once('[').map_or(text, |(name, _)| name);
        let (metric, check) = self.lookup(name)?;
        Invocation::new(metric, text).run(check)
    }

    fn lookup(&self, key: &str) -> DispatchResult<(MetricKey, &dyn Check)> {
        self.registry.get(key).ok_or_else(|| {
            debug!("unsupported metric {key}");
            DispatchError::UnsupportedMetric(key.to_string())
        })
    }
}

/// Scratch state of a single check invocation
///
/// Request and result live exactly as long as the invocation and are
/// released when it goes out of scope, on every return path.
struct Invocation<'a> {
    metric: MetricKey,
    composite: &'a str,
    result: AgentResult,
}

impl<'a> Invocation<'a> {
    fn new(metric: MetricKey, composite: &'a str) -> Self {
        Self {
            metric,
            composite,
            result: AgentResult::new(),
        }
    }

    fn parse(&self) -> DispatchResult<AgentRequest> {
        parse_item_key(self.composite).map_err(|e| {
            debug!("{}: {e}", self.composite);
            DispatchError::InvalidKeyFormat
        })
    }

    fn run(mut self, check: &dyn Check) -> DispatchResult<Option<String>> {
        let request = self.parse()?;

        trace!("{}: running {}", self.composite, self.metric);
        match check.run(&request, &mut self.result) {
            CheckStatus::Ok => Ok(self.result.str_value()),
            CheckStatus::Fail => {
                let msg = self
                    .result
                    .take_msg()
                    .unwrap_or_else(|| UNKNOWN_ERROR.to_string());
                debug!("{}: check failed: {msg}", self.composite);
                Err(DispatchError::CheckFailed(msg))
            }
        }
    }
}
