use std::fs;
use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use anyhow::anyhow;
use tracing::{instrument, trace};

use super::{Check, max_params, port_param, string_param};
use crate::agent::{AgentRequest, AgentResult, CheckStatus, ResultValue};

pub(crate) const DEFAULT_HOST: &str = "127.0.0.1";

/// Connect to the first reachable address of `host:port`
pub(crate) fn tcp_connect(host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
    let mut last_error = io::Error::new(io::ErrorKind::NotFound, "no address resolved");

    for addr in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream.set_read_timeout(Some(timeout))?;
                stream.set_write_timeout(Some(timeout))?;
                return Ok(stream);
            }
            Err(e) => {
                trace!("{addr}: connect failed: {e}");
                last_error = e;
            }
        }
    }

    Err(last_error)
}

/// `net.tcp.port[ip,port]`
#[derive(Debug, Clone, Copy)]
pub struct TcpPort {
    timeout: Duration,
}

impl TcpPort {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn probe(&self, request: &AgentRequest) -> anyhow::Result<ResultValue> {
        max_params(request, 2)?;

        let host = string_param(request, 0)?.unwrap_or(DEFAULT_HOST);
        let port = port_param(request, 1, None)?;

        let open = tcp_connect(host, port, self.timeout).is_ok();
        trace!("{host}:{port} open: {open}");

        Ok(ResultValue::Uint64(u64::from(open)))
    }
}

impl Check for TcpPort {
    #[instrument(name = "net_tcp_port", skip_all)]
    fn run(&self, request: &AgentRequest, result: &mut AgentResult) -> CheckStatus {
        result.complete(self.probe(request))
    }
}

const TCP_TABLES: [&str; 2] = ["/proc/net/tcp", "/proc/net/tcp6"];

const TCP_LISTEN_STATE: &str = "0A";

/// `net.tcp.listen[port]`
#[derive(Debug, Clone, Copy)]
pub struct TcpListen;

impl Check for TcpListen {
    #[instrument(name = "net_tcp_listen", skip_all)]
    fn run(&self, request: &AgentRequest, result: &mut AgentResult) -> CheckStatus {
        result.complete(tcp_listen(request))
    }
}

fn tcp_listen(request: &AgentRequest) -> anyhow::Result<ResultValue> {
    max_params(request, 1)?;
    let port = port_param(request, 0, None)?;

    let mut readable = false;
    for path in TCP_TABLES {
        let Ok(table) = fs::read_to_string(path) else {
            continue;
        };
        readable = true;
        if table_has_listener(&table, port) {
            return Ok(ResultValue::Uint64(1));
        }
    }

    if !readable {
        return Err(anyhow!("Cannot read TCP socket table."));
    }

    Ok(ResultValue::Uint64(0))
}

/// Whether a `/proc/net/tcp` style table has a listening socket on `port`
pub fn table_has_listener(table: &str, port: u16) -> bool {
    table
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let local = fields.nth(1)?;
            let state = fields.nth(1)?;
            Some((local, state))
        })
        .any(|(local, state)| {
            state == TCP_LISTEN_STATE
                && local
                    .rsplit_once(':')
                    .and_then(|(_, hex)| u16::from_str_radix(hex, 16).ok())
                    == Some(port)
        })
}
