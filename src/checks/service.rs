//! `net.tcp.service` and `net.tcp.service.perf`
//!
//! A service counts as up when a TCP connection succeeds and, for protocols
//! that greet the client, the greeting starts with the expected prefix.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use tracing::{debug, instrument, trace};

use super::net::{DEFAULT_HOST, tcp_connect};
use super::{Check, invalid_param, max_params, port_param, string_param};
use crate::agent::{AgentRequest, AgentResult, CheckStatus, ResultValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Ssh,
    Smtp,
    Ftp,
    Pop,
    Nntp,
    Imap,
    Http,
    Https,
    Tcp,
    Telnet,
}

impl Service {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ssh" => Some(Service::Ssh),
            "smtp" => Some(Service::Smtp),
            "ftp" => Some(Service::Ftp),
            "pop" => Some(Service::Pop),
            "nntp" => Some(Service::Nntp),
            "imap" => Some(Service::Imap),
            "http" => Some(Service::Http),
            "https" => Some(Service::Https),
            "tcp" => Some(Service::Tcp),
            "telnet" => Some(Service::Telnet),
            _ => None,
        }
    }

    pub fn default_port(self) -> Option<u16> {
        match self {
            Service::Ssh => Some(22),
            Service::Smtp => Some(25),
            Service::Ftp => Some(21),
            Service::Pop => Some(110),
            Service::Nntp => Some(119),
            Service::Imap => Some(143),
            Service::Http => Some(80),
            Service::Https => Some(443),
            Service::Telnet => Some(23),
            Service::Tcp => None,
        }
    }

    /// Expected greeting prefix and the command closing the session
    fn greeting(self) -> Option<(&'static str, &'static [u8])> {
        match self {
            Service::Ssh => Some(("SSH-", b"0\n")),
            Service::Smtp | Service::Ftp => Some(("220", b"QUIT\r\n")),
            Service::Pop => Some(("+OK", b"QUIT\r\n")),
            Service::Nntp => Some(("20", b"QUIT\r\n")),
            Service::Imap => Some(("* OK", b"a1 LOGOUT\r\n")),
            Service::Http | Service::Https | Service::Tcp | Service::Telnet => None,
        }
    }
}

/// Check whether `service` answers on `host:port`
pub fn probe(service: Service, host: &str, port: u16, timeout: Duration) -> bool {
    if service == Service::Https {
        return probe_https(host, port, timeout);
    }

    let stream = match tcp_connect(host, port, timeout) {
        Ok(stream) => stream,
        Err(e) => {
            debug!("{host}:{port}: cannot connect: {e}");
            return false;
        }
    };

    match service {
        Service::Http => probe_http(stream),
        _ => match service.greeting() {
            Some((prefix, quit)) => probe_greeting(stream, prefix, quit),
            None => true,
        },
    }
}

fn read_line(stream: &TcpStream) -> Option<String> {
    let mut line = String::new();
    match BufReader::new(stream).read_line(&mut line) {
        Ok(0) => None,
        Ok(_) => Some(line),
        Err(e) => {
            trace!("read failed: {e}");
            None
        }
    }
}

fn probe_greeting(mut stream: TcpStream, prefix: &str, quit: &[u8]) -> bool {
    let up = read_line(&stream).is_some_and(|line| line.starts_with(prefix));
    // a refused goodbye does not change the verdict
    let _ = stream.write_all(quit);
    up
}

fn probe_http(mut stream: TcpStream) -> bool {
    if stream.write_all(b"GET / HTTP/1.0\r\n\r\n").is_err() {
        return false;
    }
    read_line(&stream).is_some_and(|line| line.starts_with("HTTP"))
}

fn probe_https(host: &str, port: u16, timeout: Duration) -> bool {
    let client = match reqwest::blocking::Client::builder()
        .timeout(timeout)
        .danger_accept_invalid_certs(true)
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            debug!("cannot build HTTPS client: {e}");
            return false;
        }
    };

    let host = if host.contains(':') {
        format!("[{host}]")
    } else {
        host.to_string()
    };
    client
        .get(format!("https://{host}:{port}/"))
        .send()
        .inspect_err(|e| debug!("{host}:{port}: HTTPS request failed: {e}"))
        .is_ok()
}

/// `net.tcp.service[service,ip,port]` and `net.tcp.service.perf[service,ip,port]`
#[derive(Debug, Clone, Copy)]
pub struct TcpService {
    timeout: Duration,
    perf: bool,
}

impl TcpService {
    pub fn status(timeout: Duration) -> Self {
        Self {
            timeout,
            perf: false,
        }
    }

    pub fn perf(timeout: Duration) -> Self {
        Self {
            timeout,
            perf: true,
        }
    }

    fn check(&self, request: &AgentRequest) -> anyhow::Result<ResultValue> {
        max_params(request, 3)?;

        let service = string_param(request, 0)?
            .and_then(Service::from_name)
            .ok_or_else(|| invalid_param(0))?;
        let host = string_param(request, 1)?.unwrap_or(DEFAULT_HOST);
        let port = port_param(request, 2, service.default_port())?;

        let start = Instant::now();
        let up = probe(service, host, port, self.timeout);
        let elapsed = start.elapsed();
        trace!("{service:?} on {host}:{port} up: {up} ({elapsed:?})");

        Ok(match (self.perf, up) {
            (false, up) => ResultValue::Uint64(u64::from(up)),
            (true, true) => ResultValue::Double(elapsed.as_secs_f64()),
            (true, false) => ResultValue::Double(0.0),
        })
    }
}

impl Check for TcpService {
    #[instrument(name = "net_tcp_service", skip_all, fields(perf = self.perf))]
    fn run(&self, request: &AgentRequest, result: &mut AgentResult) -> CheckStatus {
        result.complete(self.check(request))
    }
}
