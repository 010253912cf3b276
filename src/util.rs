//! Environment lookups for the agent binary

use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

const AGENT_PORT: &str = "AGENT_PORT";
const AGENT_ADDR: &str = "AGENT_ADDR";
const AGENT_SECRET: &str = "AGENT_SECRET";
const AGENT_CONFIG: &str = "AGENT_CONFIG";

const DEFAULT_PORT: u16 = 10050;
const DEFAULT_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// Value of `name` parsed as `T`, `default` when unset or unparsable
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

pub fn get_port() -> u16 {
    env_or(AGENT_PORT, DEFAULT_PORT)
}

pub fn get_addr() -> IpAddr {
    env_or(AGENT_ADDR, DEFAULT_ADDR)
}

/// Shared secret expected in the `X-MONITORING-SECRET` header
pub fn get_secret() -> Option<String> {
    env_non_empty(AGENT_SECRET)
}

/// Path of the JSON config file
pub fn get_config_path() -> Option<String> {
    env_non_empty(AGENT_CONFIG)
}
