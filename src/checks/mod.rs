//! Check routines and the registry mapping metric keys to them
//!
//! The set of supported metric keys is closed ([`MetricKey`]). Each key is
//! served by one [`Check`] implementation; the built-in implementations live
//! in the submodules and can be replaced when building a [`CheckRegistry`].

pub mod dns;
pub mod net;
pub mod process;
pub mod service;
pub mod system;
pub mod web;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::{anyhow, bail};
use tracing::debug;

use crate::agent::{AgentRequest, AgentResult, CheckStatus};
use crate::config::AgentConfig;

/// A routine collecting one kind of metric
///
/// Implementations receive the parsed request and write their value or
/// failure message into `result`.
pub trait Check: Send + Sync {
    fn run(&self, request: &AgentRequest, result: &mut AgentResult) -> CheckStatus;
}

impl<F> Check for F
where
    F: Fn(&AgentRequest, &mut AgentResult) -> CheckStatus + Send + Sync,
{
    fn run(&self, request: &AgentRequest, result: &mut AgentResult) -> CheckStatus {
        self(request, result)
    }
}

/// Supported metric keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize)]
pub enum MetricKey {
    #[serde(rename = "system.localtime")]
    SystemLocaltime,
    #[serde(rename = "net.dns")]
    NetDns,
    #[serde(rename = "net.dns.record")]
    NetDnsRecord,
    #[serde(rename = "proc.mem")]
    ProcMem,
    #[serde(rename = "proc.num")]
    ProcNum,
    #[serde(rename = "system.boottime")]
    SystemBoottime,
    #[serde(rename = "web.page.get")]
    WebPageGet,
    #[serde(rename = "web.page.perf")]
    WebPagePerf,
    #[serde(rename = "web.page.regexp")]
    WebPageRegexp,
    #[serde(rename = "net.tcp.listen")]
    NetTcpListen,
    #[serde(rename = "net.tcp.port")]
    NetTcpPort,
    #[serde(rename = "net.tcp.service")]
    NetTcpService,
    #[serde(rename = "net.tcp.service.perf")]
    NetTcpServicePerf,
}

impl MetricKey {
    pub const ALL: [MetricKey; 13] = [
        MetricKey::SystemLocaltime,
        MetricKey::NetDns,
        MetricKey::NetDnsRecord,
        MetricKey::ProcMem,
        MetricKey::ProcNum,
        MetricKey::SystemBoottime,
        MetricKey::WebPageGet,
        MetricKey::WebPagePerf,
        MetricKey::WebPageRegexp,
        MetricKey::NetTcpListen,
        MetricKey::NetTcpPort,
        MetricKey::NetTcpService,
        MetricKey::NetTcpServicePerf,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MetricKey::SystemLocaltime => "system.localtime",
            MetricKey::NetDns => "net.dns",
            MetricKey::NetDnsRecord => "net.dns.record",
            MetricKey::ProcMem => "proc.mem",
            MetricKey::ProcNum => "proc.num",
            MetricKey::SystemBoottime => "system.boottime",
            MetricKey::WebPageGet => "web.page.get",
            MetricKey::WebPagePerf => "web.page.perf",
            MetricKey::WebPageRegexp => "web.page.regexp",
            MetricKey::NetTcpListen => "net.tcp.listen",
            MetricKey::NetTcpPort => "net.tcp.port",
            MetricKey::NetTcpService => "net.tcp.service",
            MetricKey::NetTcpServicePerf => "net.tcp.service.perf",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == name)
    }

    /// Parameters used when testing every key at once
    pub fn test_params(self) -> &'static [&'static str] {
        match self {
            MetricKey::SystemLocaltime
            | MetricKey::SystemBoottime
            | MetricKey::ProcMem
            | MetricKey::ProcNum => &[],
            MetricKey::NetDns | MetricKey::NetDnsRecord => &["", "localhost"],
            MetricKey::WebPageGet | MetricKey::WebPagePerf => &["localhost"],
            MetricKey::WebPageRegexp => &["localhost", "", "", "OK"],
            MetricKey::NetTcpListen => &["80"],
            MetricKey::NetTcpPort => &["", "80"],
            MetricKey::NetTcpService | MetricKey::NetTcpServicePerf => &["ssh"],
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable mapping from metric key to check routine
#[derive(Clone)]
pub struct CheckRegistry {
    checks: HashMap<MetricKey, Arc<dyn Check>>,
}

impl CheckRegistry {
    pub fn builder() -> CheckRegistryBuilder {
        CheckRegistryBuilder::default()
    }

    /// Registry with every built-in check, minus the keys the configuration denies
    pub fn builtin(config: &AgentConfig) -> Self {
        let timeout = config.check_timeout();

        let mut builder = Self::builder()
            .register(MetricKey::SystemLocaltime, system::LocalTime)
            .register(MetricKey::SystemBoottime, system::BootTime)
            .register(MetricKey::NetDns, dns::Dns::query())
            .register(MetricKey::NetDnsRecord, dns::Dns::record())
            .register(MetricKey::ProcNum, process::ProcNum)
            .register(MetricKey::ProcMem, process::ProcMem)
            .register(MetricKey::WebPageGet, web::WebPage::get(timeout))
            .register(MetricKey::WebPagePerf, web::WebPage::perf(timeout))
            .register(MetricKey::WebPageRegexp, web::WebPage::regexp(timeout))
            .register(MetricKey::NetTcpListen, net::TcpListen)
            .register(MetricKey::NetTcpPort, net::TcpPort::new(timeout))
            .register(MetricKey::NetTcpService, service::TcpService::status(timeout))
            .register(MetricKey::NetTcpServicePerf, service::TcpService::perf(timeout));

        for key in &config.deny_keys {
            debug!("disabling metric {key}");
            builder = builder.without(*key);
        }

        builder.build()
    }

    /// Look up the check registered for a metric name
    pub fn get(&self, name: &str) -> Option<(MetricKey, &dyn Check)> {
        let key = MetricKey::from_name(name)?;
        self.checks.get(&key).map(|check| (key, check.as_ref()))
    }

    /// Registered keys in vocabulary order
    pub fn keys(&self) -> Vec<MetricKey> {
        MetricKey::ALL
            .into_iter()
            .filter(|key| self.checks.contains_key(key))
            .collect()
    }
}

impl fmt::Debug for CheckRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.keys()).finish()
    }
}

#[derive(Default)]
pub struct CheckRegistryBuilder {
    checks: HashMap<MetricKey, Arc<dyn Check>>,
}

impl CheckRegistryBuilder {
    /// Register `check` for `key`, replacing any previous registration
    pub fn register(mut self, key: MetricKey, check: impl Check + 'static) -> Self {
        self.checks.insert(key, Arc::new(check));
        self
    }

    pub fn without(mut self, key: MetricKey) -> Self {
        self.checks.remove(&key);
        self
    }

    pub fn build(self) -> CheckRegistry {
        CheckRegistry {
            checks: self.checks,
        }
    }
}

const ORDINALS: [&str; 6] = ["first", "second", "third", "fourth", "fifth", "sixth"];

pub(crate) fn invalid_param(index: usize) -> anyhow::Error {
    match ORDINALS.get(index) {
        Some(ordinal) => anyhow!("Invalid {ordinal} parameter."),
        None => anyhow!("Invalid parameter #{}.", index + 1),
    }
}

pub(crate) fn max_params(request: &AgentRequest, max: usize) -> anyhow::Result<()> {
    if request.param_count() > max {
        bail!("Too many parameters.");
    }
    Ok(())
}

/// String parameter at `index`; missing and empty parameters are `None`
pub(crate) fn string_param(request: &AgentRequest, index: usize) -> anyhow::Result<Option<&str>> {
    let Some(param) = request.param(index) else {
        return Ok(None);
    };

    match param.as_str() {
        None => Err(invalid_param(index)),
        Some("") => Ok(None),
        Some(value) => Ok(Some(value)),
    }
}

/// Port parameter at `index`, `default` when missing
pub(crate) fn port_param(
    request: &AgentRequest,
    index: usize,
    default: Option<u16>,
) -> anyhow::Result<u16> {
    match string_param(request, index)? {
        Some(port) => port.parse().map_err(|_| invalid_param(index)),
        None => default.ok_or_else(|| invalid_param(index)),
    }
}
