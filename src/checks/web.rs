//! `web.page.get`, `web.page.perf` and `web.page.regexp`
//!
//! Pages are fetched with a blocking `reqwest` client built per call, so
//! these checks must run on a thread that is allowed to block.

use std::time::{Duration, Instant};

use anyhow::anyhow;
use regex::{Captures, Regex};
use tracing::{instrument, trace};

use super::{Check, invalid_param, max_params, port_param, string_param};
use crate::agent::{AgentRequest, AgentResult, CheckStatus, ResultValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WebPageMode {
    Get,
    Perf,
    Regexp,
}

#[derive(Debug, Clone, Copy)]
pub struct WebPage {
    mode: WebPageMode,
    timeout: Duration,
}

impl WebPage {
    /// `web.page.get[host,path,port]`
    pub fn get(timeout: Duration) -> Self {
        Self {
            mode: WebPageMode::Get,
            timeout,
        }
    }

    /// `web.page.perf[host,path,port]`
    pub fn perf(timeout: Duration) -> Self {
        Self {
            mode: WebPageMode::Perf,
            timeout,
        }
    }

    /// `web.page.regexp[host,path,port,regexp,length,output]`
    pub fn regexp(timeout: Duration) -> Self {
        Self {
            mode: WebPageMode::Regexp,
            timeout,
        }
    }

    fn check(&self, request: &AgentRequest) -> anyhow::Result<ResultValue> {
        match self.mode {
            WebPageMode::Get => {
                max_params(request, 3)?;
                let url = page_url(request)?;
                Ok(ResultValue::Text(fetch_page(&url, self.timeout)?))
            }
            WebPageMode::Perf => {
                max_params(request, 3)?;
                let url = page_url(request)?;
                let start = Instant::now();
                fetch_page(&url, self.timeout)?;
                Ok(ResultValue::Double(start.elapsed().as_secs_f64()))
            }
            WebPageMode::Regexp => {
                max_params(request, 6)?;
                let url = page_url(request)?;

                let pattern = string_param(request, 3)?.ok_or_else(|| invalid_param(3))?;
                let regex = Regex::new(pattern).map_err(|_| invalid_param(3))?;
                let length = string_param(request, 4)?
                    .map(|length| match length.parse::<usize>() {
                        Ok(length) if length > 0 => Ok(length),
                        _ => Err(invalid_param(4)),
                    })
                    .transpose()?;
                let output = string_param(request, 5)?;

                let page = fetch_page(&url, self.timeout)?;
                Ok(ResultValue::Str(extract(&regex, &page, output, length)))
            }
        }
    }
}

impl Check for WebPage {
    #[instrument(name = "web_page", skip_all, fields(mode = ?self.mode))]
    fn run(&self, request: &AgentRequest, result: &mut AgentResult) -> CheckStatus {
        result.complete(self.check(request))
    }
}

/// Build the page URL from host (0), path (1) and port (2)
///
/// The host may carry an `http://` or `https://` scheme; the port defaults
/// to the scheme's well-known port.
fn page_url(request: &AgentRequest) -> anyhow::Result<String> {
    let host = string_param(request, 0)?.ok_or_else(|| invalid_param(0))?;
    let (scheme, host) = match host.split_once("://") {
        Some((scheme @ ("http" | "https"), host)) => (scheme, host),
        Some(_) => return Err(invalid_param(0)),
        None => ("http", host),
    };
    let default_port = if scheme == "https" { 443 } else { 80 };

    let path = string_param(request, 1)?.unwrap_or_default();
    let port = port_param(request, 2, Some(default_port))?;

    let host = host.trim_end_matches('/');
    if host.is_empty() {
        return Err(invalid_param(0));
    }
    let host = if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]")
    } else {
        host.to_string()
    };

    Ok(format!(
        "{scheme}://{host}:{port}/{}",
        path.trim_start_matches('/')
    ))
}

/// Fetch a page as status line, headers, blank line and body
pub fn fetch_page(url: &str, timeout: Duration) -> anyhow::Result<String> {
    trace!("fetching {url}");

    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| anyhow!("Cannot create HTTP client: {e}"))?;
    let response = client
        .get(url)
        .send()
        .map_err(|e| anyhow!("Cannot get content of web page: {e}"))?;

    let mut page = format!("{:?} {}\r\n", response.version(), response.status());
    for (name, value) in response.headers() {
        page.push_str(&format!(
            "{name}: {}\r\n",
            String::from_utf8_lossy(value.as_bytes())
        ));
    }
    page.push_str("\r\n");

    let body = response
        .text()
        .map_err(|e| anyhow!("Cannot get content of web page: {e}"))?;
    page.push_str(&body);

    Ok(page)
}

/// First line matching `regex`, rendered through `output` and cut to `length` characters
pub fn extract(regex: &Regex, page: &str, output: Option<&str>, length: Option<usize>) -> String {
    let Some(captures) = page.lines().find_map(|line| regex.captures(line)) else {
        return String::new();
    };

    let value = match output {
        Some(template) => render_output(template, &captures),
        None => captures
            .get(0)
            .map_or_else(String::new, |m| m.as_str().to_string()),
    };

    match length {
        Some(length) => value.chars().take(length).collect(),
        None => value,
    }
}

/// Replace `\0`..`\9` in `template` with the matching capture groups
fn render_output(template: &str, captures: &Captures<'_>) -> String {
    let mut output = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\\'
            && let Some(group) = chars.peek().and_then(|next| next.to_digit(10))
        {
            chars.next();
            output.push_str(captures.get(group as usize).map_or("", |m| m.as_str()));
            continue;
        }
        output.push(c);
    }

    output
}
