//! `net.dns` and `net.dns.record` through the system resolver
//!
//! Only address records can be answered this way; querying a specific
//! name server is rejected.

use std::net::{IpAddr, ToSocketAddrs};

use anyhow::{anyhow, bail};
use tracing::{instrument, trace};

use super::{Check, invalid_param, max_params, string_param};
use crate::agent::{AgentRequest, AgentResult, CheckStatus, ResultValue};

const DEFAULT_NAME: &str = "zabbix.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordType {
    A,
    Aaaa,
    Any,
}

impl RecordType {
    fn parse(kind: Option<&str>) -> Option<Self> {
        match kind.map(str::to_ascii_uppercase).as_deref() {
            None | Some("ANY") => Some(RecordType::Any),
            Some("A") => Some(RecordType::A),
            Some("AAAA") => Some(RecordType::Aaaa),
            _ => None,
        }
    }

    fn of(addr: &IpAddr) -> &'static str {
        match addr {
            IpAddr::V4(_) => "A",
            IpAddr::V6(_) => "AAAA",
        }
    }

    fn accepts(self, addr: &IpAddr) -> bool {
        match self {
            RecordType::Any => true,
            RecordType::A => addr.is_ipv4(),
            RecordType::Aaaa => addr.is_ipv6(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DnsMode {
    Query,
    Record,
}

/// `net.dns[ip,name,type,timeout,count,protocol]` and `net.dns.record[...]`
#[derive(Debug, Clone, Copy)]
pub struct Dns {
    mode: DnsMode,
}

impl Dns {
    pub fn query() -> Self {
        Self {
            mode: DnsMode::Query,
        }
    }

    pub fn record() -> Self {
        Self {
            mode: DnsMode::Record,
        }
    }

    fn lookup(&self, request: &AgentRequest) -> anyhow::Result<ResultValue> {
        max_params(request, 6)?;

        if string_param(request, 0)?.is_some() {
            bail!("Querying a specific DNS server is not supported.");
        }
        let name = string_param(request, 1)?.unwrap_or(DEFAULT_NAME);
        let kind = RecordType::parse(string_param(request, 2)?).ok_or_else(|| invalid_param(2))?;
        check_resolver_options(request)?;

        let resolved = resolve(name, kind);
        match self.mode {
            DnsMode::Query => {
                let found = resolved.is_ok_and(|addrs| !addrs.is_empty());
                Ok(ResultValue::Uint64(u64::from(found)))
            }
            DnsMode::Record => {
                let addrs = resolved.map_err(|e| anyhow!("Cannot perform DNS query: {e}"))?;
                if addrs.is_empty() {
                    bail!("Cannot perform DNS query: no records found.");
                }
                Ok(ResultValue::Text(format_records(name, &addrs)))
            }
        }
    }
}

impl Check for Dns {
    #[instrument(name = "net_dns", skip_all, fields(mode = ?self.mode))]
    fn run(&self, request: &AgentRequest, result: &mut AgentResult) -> CheckStatus {
        result.complete(self.lookup(request))
    }
}

/// Timeout and count must be positive, protocol is `udp` or `tcp`
fn check_resolver_options(request: &AgentRequest) -> anyhow::Result<()> {
    for index in [3, 4] {
        if let Some(value) = string_param(request, index)? {
            match value.parse::<u32>() {
                Ok(n) if n > 0 => {}
                _ => return Err(invalid_param(index)),
            }
        }
    }

    match string_param(request, 5)? {
        None | Some("udp") | Some("tcp") => Ok(()),
        Some(_) => Err(invalid_param(5)),
    }
}

fn resolve(name: &str, kind: RecordType) -> std::io::Result<Vec<IpAddr>> {
    let mut addrs = Vec::new();
    for addr in (name, 0).to_socket_addrs()? {
        let ip = addr.ip();
        if kind.accepts(&ip) && !addrs.contains(&ip) {
            addrs.push(ip);
        }
    }
    trace!("{name}: resolved {addrs:?}");
    Ok(addrs)
}

fn format_records(name: &str, addrs: &[IpAddr]) -> String {
    addrs
        .iter()
        .map(|addr| format!("{name:<20} {:<8} {addr}", RecordType::of(addr)))
        .collect::<Vec<_>>()
        .join("\n")
}
