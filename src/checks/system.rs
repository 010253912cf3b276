use std::fmt::Display;

use anyhow::bail;
use chrono::{DateTime, Local, TimeZone, Utc};
use sysinfo::System;
use tracing::{instrument, trace};

use super::{Check, invalid_param, max_params, string_param};
use crate::agent::{AgentRequest, AgentResult, CheckStatus, ResultValue};

/// `system.localtime[type]`
#[derive(Debug, Clone, Copy)]
pub struct LocalTime;

impl Check for LocalTime {
    #[instrument(name = "system_localtime", skip_all)]
    fn run(&self, request: &AgentRequest, result: &mut AgentResult) -> CheckStatus {
        result.complete(local_time(request))
    }
}

fn local_time(request: &AgentRequest) -> anyhow::Result<ResultValue> {
    max_params(request, 1)?;

    match string_param(request, 0)? {
        None | Some("utc") => {
            let now = Utc::now().timestamp();
            Ok(ResultValue::Uint64(u64::try_from(now)?))
        }
        Some("local") => Ok(ResultValue::Str(format_local_time(&Local::now()))),
        Some(_) => Err(invalid_param(0)),
    }
}

/// `YYYY-MM-DD,hh:mm:ss.mmm,+hh:mm`
pub fn format_local_time<Tz>(time: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    time.format("%Y-%m-%d,%H:%M:%S%.3f,%:z").to_string()
}

/// `system.boottime`
#[derive(Debug, Clone, Copy)]
pub struct BootTime;

impl Check for BootTime {
    #[instrument(name = "system_boottime", skip_all)]
    fn run(&self, request: &AgentRequest, result: &mut AgentResult) -> CheckStatus {
        result.complete(boot_time(request))
    }
}

fn boot_time(request: &AgentRequest) -> anyhow::Result<ResultValue> {
    max_params(request, 0)?;

    let boot_time = System::boot_time();
    if boot_time == 0 {
        bail!("Cannot obtain system boot time.");
    }
    trace!("boot time {boot_time}");

    Ok(ResultValue::Uint64(boot_time))
}
